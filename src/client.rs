//! Pipelined Modbus TCP client
//!
//! One connection task owns the socket and a [`ModbusSession`]; any number
//! of cheap [`ModbusTcpClient`] handles feed it requests over a channel.
//! Requests are written as soon as they are issued, without waiting for
//! earlier responses, and each response is matched back to its request by
//! transaction id, whatever order the server answers in.
//!
//! # API
//!
//! Each supported function has a typed method returning a
//! [`PendingResponse`] future. Argument validation happens before anything
//! is queued, so a bad request fails immediately and never consumes a
//! transaction id:
//!
//! | Function Code | Method | Resolves to |
//! |---------------|--------|-------------|
//! | 0x01 | `read_coils()` | [`ReadBitsResponse`] |
//! | 0x02 | `read_discrete_inputs()` | [`ReadBitsResponse`] |
//! | 0x03 | `read_holding_registers()` | [`ReadRegistersResponse`] |
//! | 0x04 | `read_input_registers()` | [`ReadRegistersResponse`] |
//! | 0x05 | `write_single_coil()` | [`WriteSingleCoilResponse`] |
//! | 0x06 | `write_single_register()` | [`WriteSingleRegisterResponse`] |
//! | 0x0F | `write_multiple_coils()` | [`WriteMultipleResponse`] |
//! | 0x10 | `write_multiple_registers()` | [`WriteMultipleResponse`] |
//!
//! [`ModbusTcpClient::submit`] takes a completion callback instead. The
//! [`ModbusClient`] trait offers the function-code numbered API
//! (`read_03()`, `write_10()`, ...) with an explicit slave id per call.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use modbus_mux::{ClientConfig, ModbusResult, ModbusTcpClient};
//!
//! #[tokio::main]
//! async fn main() -> ModbusResult<()> {
//!     let client = ModbusTcpClient::connect("127.0.0.1:502", ClientConfig::default()).await?;
//!
//!     // Both requests are on the wire before either response arrives
//!     let temperature = client.read_input_registers(0, 2)?;
//!     let alarms = client.read_coils(100, 16)?;
//!     let (temperature, alarms) = tokio::join!(temperature, alarms);
//!
//!     println!("registers: {:?}", temperature?.registers);
//!     println!("coils: {:?}", alarms?.coils);
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval, timeout, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::codec::{prepare_request, PreparedRequest};
use crate::constants::{MBAP_PREFIX_LEN, MODBUS_RESPONSE_BUFFER_SIZE};
use crate::device_limits::DeviceLimits;
use crate::error::{ModbusError, ModbusResult};
use crate::logging::{ClientObserver, TracingObserver};
use crate::protocol::{
    FromResponse, ModbusRequest, ModbusResponse, ReadBitsResponse, ReadRegistersResponse, SlaveId,
    WriteMultipleResponse, WriteSingleCoilResponse, WriteSingleRegisterResponse,
};
use crate::session::{ConnectionState, ModbusSession};
use crate::stats::{StatsCounters, TransportStats};
use crate::transaction::{Outcome, Responder};

/// Default unit id for requests issued through the typed methods
pub const DEFAULT_UNIT_ID: SlaveId = 1;

/// Default time allowed for the TCP connect
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Shortest interval between two request timeout sweeps
const MIN_SWEEP_PERIOD: Duration = Duration::from_millis(10);

// ============================================================================
// Configuration
// ============================================================================

/// Client configuration
#[derive(Clone)]
pub struct ClientConfig {
    /// Unit id used by the typed methods
    pub unit_id: SlaveId,
    /// Per-request quantity limits
    pub limits: DeviceLimits,
    pub connect_timeout: Duration,
    /// Reject requests unanswered for this long; `None` waits forever
    pub request_timeout: Option<Duration>,
    /// Dump every frame as hex through the default observer
    pub packet_logging: bool,
    /// Bytes requested from the transport per read
    pub read_buffer_size: usize,
    /// Receives connection events; defaults to [`TracingObserver`]
    pub observer: Option<Arc<dyn ClientObserver>>,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unit_id(mut self, unit_id: SlaveId) -> Self {
        self.unit_id = unit_id;
        self
    }

    pub fn with_limits(mut self, limits: DeviceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = Some(request_timeout);
        self
    }

    pub fn with_packet_logging(mut self, enabled: bool) -> Self {
        self.packet_logging = enabled;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ClientObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> ModbusResult<()> {
        self.limits.validate()?;
        if self.connect_timeout.is_zero() {
            return Err(ModbusError::configuration("connect timeout must be non-zero"));
        }
        if self.request_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ModbusError::configuration("request timeout must be non-zero"));
        }
        if self.read_buffer_size < MBAP_PREFIX_LEN {
            return Err(ModbusError::configuration(format!(
                "read buffer of {} bytes is smaller than an MBAP header prefix",
                self.read_buffer_size
            )));
        }
        Ok(())
    }

    fn make_observer(&self) -> Arc<dyn ClientObserver> {
        match &self.observer {
            Some(observer) => observer.clone(),
            None => Arc::new(TracingObserver::new(self.packet_logging)),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            unit_id: DEFAULT_UNIT_ID,
            limits: DeviceLimits::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: None,
            packet_logging: false,
            read_buffer_size: MODBUS_RESPONSE_BUFFER_SIZE,
            observer: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("unit_id", &self.unit_id)
            .field("limits", &self.limits)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("packet_logging", &self.packet_logging)
            .field("read_buffer_size", &self.read_buffer_size)
            .field("custom_observer", &self.observer.is_some())
            .finish()
    }
}

// ============================================================================
// Pending responses
// ============================================================================

/// Future resolving to the response of one request
///
/// Resolves to [`ModbusError::ConnectionClosed`] if the connection ends
/// before the response arrives. Dropping it does not cancel the request;
/// the response is discarded when it comes in.
#[must_use = "the response is lost unless the future is awaited"]
pub struct PendingResponse<T> {
    rx: oneshot::Receiver<Outcome>,
    _response: PhantomData<fn() -> T>,
}

impl<T> PendingResponse<T> {
    fn new(rx: oneshot::Receiver<Outcome>) -> Self {
        Self {
            rx,
            _response: PhantomData,
        }
    }
}

impl<T: FromResponse> Future for PendingResponse<T> {
    type Output = ModbusResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome.and_then(T::from_response)),
            Poll::Ready(Err(_)) => Poll::Ready(Err(ModbusError::ConnectionClosed)),
        }
    }
}

impl<T> fmt::Debug for PendingResponse<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingResponse").finish_non_exhaustive()
    }
}

// ============================================================================
// Client handle
// ============================================================================

enum Command {
    Request {
        unit_id: SlaveId,
        prepared: PreparedRequest,
        responder: Responder,
    },
    Close {
        ack: oneshot::Sender<()>,
    },
}

/// Handle to a pipelined Modbus TCP connection
///
/// Cloning is cheap; all clones share the same connection. The connection
/// task ends when [`close`](Self::close) is called, when the server closes
/// the socket, on a transport or framing error, or once every handle is
/// dropped. There is no reconnect.
#[derive(Clone)]
pub struct ModbusTcpClient {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    stats: Arc<StatsCounters>,
    config: Arc<ClientConfig>,
}

impl ModbusTcpClient {
    /// Connect to `addr` and start the connection task
    pub async fn connect<A: ToSocketAddrs>(addr: A, config: ClientConfig) -> ModbusResult<Self> {
        config.validate()?;
        let stream = open_stream(addr, config.connect_timeout).await?;
        if let Ok(peer) = stream.peer_addr() {
            info!("Connected to Modbus TCP server {}", peer);
        }
        Self::from_stream(stream, config)
    }

    /// Start connecting to `host:port` in the background
    ///
    /// Returns immediately in [`ConnectionState::Connecting`]. Requests
    /// issued before the connection is up are queued and written once it
    /// is; if the attempt fails they resolve to
    /// [`ModbusError::ConnectionClosed`]. Must be called inside a tokio runtime.
    pub fn spawn(host: impl Into<String>, port: u16, config: ClientConfig) -> ModbusResult<Self> {
        config.validate()?;
        let addr = format!("{}:{}", host.into(), port);
        let (client, connection) = Self::pair(config, ConnectionState::Connecting);
        let connect_timeout = client.config.connect_timeout;
        tokio::spawn(async move {
            let mut connection = connection;
            connection.session.begin_connect();
            match connection.establish(&addr, connect_timeout).await {
                Ok(stream) => connection.serve(stream).await,
                Err(ack) => connection.finish(ack),
            }
        });
        Ok(client)
    }

    /// Drive an already connected stream
    ///
    /// Any `AsyncRead + AsyncWrite` transport works, which is how the tests
    /// run the client over an in-memory duplex pipe. Must be called inside a
    /// tokio runtime.
    pub fn from_stream<S>(stream: S, config: ClientConfig) -> ModbusResult<Self>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        config.validate()?;
        let (client, mut connection) = Self::pair(config, ConnectionState::Connected);
        connection.session.begin_connect();
        tokio::spawn(connection.serve(stream));
        Ok(client)
    }

    fn pair(config: ClientConfig, initial: ConnectionState) -> (Self, Connection) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(initial);
        let stats = Arc::new(StatsCounters::new());
        let observer = config.make_observer();

        let session = ModbusSession::new(config.limits)
            .with_observer(observer.clone())
            .with_stats(stats.clone());

        let connection = Connection {
            session,
            commands: command_rx,
            state: state_tx,
            observer,
            stats: stats.clone(),
            request_timeout: config.request_timeout,
            read_buffer_size: config.read_buffer_size,
        };
        let client = Self {
            commands: command_tx,
            state: state_rx,
            stats,
            config: Arc::new(config),
        };
        (client, connection)
    }

    // ------------------------------------------------------------------
    // Typed requests
    // ------------------------------------------------------------------

    /// Read coils (0x01)
    pub fn read_coils(
        &self,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<PendingResponse<ReadBitsResponse>> {
        self.request(ModbusRequest::ReadCoils { address, quantity })
    }

    /// Read discrete inputs (0x02)
    pub fn read_discrete_inputs(
        &self,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<PendingResponse<ReadBitsResponse>> {
        self.request(ModbusRequest::ReadDiscreteInputs { address, quantity })
    }

    /// Read holding registers (0x03)
    pub fn read_holding_registers(
        &self,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<PendingResponse<ReadRegistersResponse>> {
        self.request(ModbusRequest::ReadHoldingRegisters { address, quantity })
    }

    /// Read input registers (0x04)
    pub fn read_input_registers(
        &self,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<PendingResponse<ReadRegistersResponse>> {
        self.request(ModbusRequest::ReadInputRegisters { address, quantity })
    }

    /// Write single coil (0x05)
    pub fn write_single_coil(
        &self,
        address: u16,
        value: bool,
    ) -> ModbusResult<PendingResponse<WriteSingleCoilResponse>> {
        self.request(ModbusRequest::WriteSingleCoil { address, value })
    }

    /// Write single register (0x06)
    pub fn write_single_register(
        &self,
        address: u16,
        value: u16,
    ) -> ModbusResult<PendingResponse<WriteSingleRegisterResponse>> {
        self.request(ModbusRequest::WriteSingleRegister { address, value })
    }

    /// Write multiple coils (0x0F)
    pub fn write_multiple_coils(
        &self,
        address: u16,
        values: &[bool],
    ) -> ModbusResult<PendingResponse<WriteMultipleResponse>> {
        self.request(ModbusRequest::WriteMultipleCoils {
            address,
            values: values.to_vec(),
        })
    }

    /// Write multiple registers (0x10)
    pub fn write_multiple_registers(
        &self,
        address: u16,
        values: &[u16],
    ) -> ModbusResult<PendingResponse<WriteMultipleResponse>> {
        self.request(ModbusRequest::WriteMultipleRegisters {
            address,
            values: values.to_vec(),
        })
    }

    // ------------------------------------------------------------------
    // Generic requests
    // ------------------------------------------------------------------

    /// Issue any request to the configured unit
    pub fn send(&self, request: ModbusRequest) -> ModbusResult<PendingResponse<ModbusResponse>> {
        self.request(request)
    }

    /// Issue any request to a specific unit
    pub fn send_to(
        &self,
        unit_id: SlaveId,
        request: ModbusRequest,
    ) -> ModbusResult<PendingResponse<ModbusResponse>> {
        self.request_to(unit_id, request)
    }

    /// Issue a request whose outcome goes to `callback`
    ///
    /// The callback runs exactly once on the connection task, with the
    /// decoded response or the error for this request (server exceptions
    /// arrive as [`ModbusError::Exception`]). It is never invoked if the
    /// connection ends first. It must not block.
    pub fn submit<F>(&self, request: ModbusRequest, callback: F) -> ModbusResult<()>
    where
        F: FnOnce(ModbusResult<ModbusResponse>) + Send + 'static,
    {
        let prepared = prepare_request(&request, &self.config.limits)?;
        self.dispatch(self.config.unit_id, prepared, Responder::callback(callback))
    }

    fn request<T: FromResponse>(&self, request: ModbusRequest) -> ModbusResult<PendingResponse<T>> {
        self.request_to(self.config.unit_id, request)
    }

    fn request_to<T: FromResponse>(
        &self,
        unit_id: SlaveId,
        request: ModbusRequest,
    ) -> ModbusResult<PendingResponse<T>> {
        let prepared = prepare_request(&request, &self.config.limits)?;
        let (responder, rx) = Responder::channel();
        self.dispatch(unit_id, prepared, responder)?;
        Ok(PendingResponse::new(rx))
    }

    fn dispatch(
        &self,
        unit_id: SlaveId,
        prepared: PreparedRequest,
        responder: Responder,
    ) -> ModbusResult<()> {
        self.commands
            .send(Command::Request {
                unit_id,
                prepared,
                responder,
            })
            .map_err(|_| ModbusError::ConnectionClosed)
    }

    // ------------------------------------------------------------------
    // Connection
    // ------------------------------------------------------------------

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Wait until the connection is up
    ///
    /// Fails if the connection attempt failed or the connection already ended.
    pub async fn wait_connected(&self) -> ModbusResult<()> {
        let mut state = self.state.clone();
        loop {
            let current = *state.borrow_and_update();
            match current {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Disconnected => {
                    return Err(ModbusError::connection("connection is not established"))
                }
                ConnectionState::Connecting => {}
            }
            if state.changed().await.is_err() {
                return Err(ModbusError::ConnectionClosed);
            }
        }
    }

    /// Close the connection and wait for the connection task to finish
    ///
    /// Requests still pending resolve to [`ModbusError::ConnectionClosed`].
    /// Closing an already closed client is a no-op.
    pub async fn close(&self) -> ModbusResult<()> {
        let (ack, done) = oneshot::channel();
        if self.commands.send(Command::Close { ack }).is_err() {
            return Ok(());
        }
        // A dropped ack means the task ended on its own
        let _ = done.await;
        Ok(())
    }

    pub fn get_stats(&self) -> TransportStats {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl fmt::Debug for ModbusTcpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModbusTcpClient")
            .field("state", &self.state())
            .field("unit_id", &self.config.unit_id)
            .finish()
    }
}

async fn open_stream<A: ToSocketAddrs>(addr: A, connect_timeout: Duration) -> ModbusResult<TcpStream> {
    let stream = timeout(connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| ModbusError::timeout("connect", connect_timeout.as_millis() as u64))?
        .map_err(|e| ModbusError::connection(format!("connect failed: {}", e)))?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

// ============================================================================
// Connection task
// ============================================================================

/// State owned by the connection task
struct Connection {
    session: ModbusSession,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<ConnectionState>,
    observer: Arc<dyn ClientObserver>,
    stats: Arc<StatsCounters>,
    request_timeout: Option<Duration>,
    read_buffer_size: usize,
}

enum Flow {
    Continue,
    Stop(Option<oneshot::Sender<()>>),
}

impl Connection {
    /// Connect while queueing requests issued in the meantime
    ///
    /// On failure or an early close, returns the close acknowledgement to send
    /// once the connection has been torn down.
    async fn establish(
        &mut self,
        addr: &str,
        connect_timeout: Duration,
    ) -> Result<TcpStream, Option<oneshot::Sender<()>>> {
        let connect = open_stream(addr, connect_timeout);
        tokio::pin!(connect);

        loop {
            tokio::select! {
                result = &mut connect => match result {
                    Ok(stream) => {
                        info!("Connected to Modbus TCP server {}", addr);
                        return Ok(stream);
                    }
                    Err(e) => {
                        self.stats.record_error();
                        self.observer.on_transport_error(&e);
                        return Err(None);
                    }
                },
                command = self.commands.recv() => {
                    if let Flow::Stop(ack) = self.handle_command(command) {
                        return Err(ack);
                    }
                }
            }
        }
    }

    /// Run the connected event loop until the connection ends
    async fn serve<S>(mut self, mut stream: S)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.session.on_connected();
        self.state.send_replace(ConnectionState::Connected);

        let mut read_buf = BytesMut::with_capacity(self.read_buffer_size);
        let mut sweep = self.request_timeout.map(|t| {
            let mut ticker = interval((t / 2).max(MIN_SWEEP_PERIOD));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        let ack = loop {
            if let Err(e) = self.flush(&mut stream).await {
                self.stats.record_error();
                self.observer.on_transport_error(&e);
                break None;
            }

            tokio::select! {
                command = self.commands.recv() => {
                    if let Flow::Stop(ack) = self.handle_command(command) {
                        break ack;
                    }
                }
                read = stream.read_buf(&mut read_buf) => match read {
                    Ok(0) => {
                        info!("Modbus TCP server closed the connection");
                        break None;
                    }
                    Ok(_) => {
                        let result = self.session.on_data(&read_buf);
                        read_buf.clear();
                        if result.is_err() {
                            break None;
                        }
                    }
                    Err(e) => {
                        let e = ModbusError::from(e);
                        self.stats.record_error();
                        self.observer.on_transport_error(&e);
                        break None;
                    }
                },
                now = next_sweep(&mut sweep) => {
                    if let Some(request_timeout) = self.request_timeout {
                        self.session.expire(now, request_timeout);
                    }
                }
            }
        };

        if let Err(e) = stream.shutdown().await {
            debug!("Shutdown after connection end failed: {}", e);
        }
        self.finish(ack);
    }

    fn handle_command(&mut self, command: Option<Command>) -> Flow {
        match command {
            Some(Command::Request {
                unit_id,
                prepared,
                responder,
            }) => {
                // Table errors have already been delivered to the responder
                if let Err(e) = self.session.issue_prepared(unit_id, prepared, responder) {
                    debug!("Request rejected: {}", e);
                }
                Flow::Continue
            }
            Some(Command::Close { ack }) => {
                info!("Closing Modbus TCP connection");
                Flow::Stop(Some(ack))
            }
            None => {
                debug!("All client handles dropped, closing connection");
                Flow::Stop(None)
            }
        }
    }

    async fn flush<S>(&mut self, stream: &mut S) -> ModbusResult<()>
    where
        S: AsyncWrite + Unpin,
    {
        let mut wrote = false;
        while let Some(frame) = self.session.poll_transmit() {
            stream.write_all(&frame).await?;
            wrote = true;
        }
        if wrote {
            stream.flush().await?;
        }
        Ok(())
    }

    /// Drop pending requests, publish the final state and acknowledge a close
    fn finish(mut self, ack: Option<oneshot::Sender<()>>) {
        self.session.on_closed();
        self.state.send_replace(ConnectionState::Disconnected);
        // Stop accepting requests before acknowledging, so none slip in after
        self.commands.close();
        if let Some(ack) = ack {
            let _ = ack.send(());
        }
    }
}

async fn next_sweep(sweep: &mut Option<Interval>) -> Instant {
    match sweep {
        Some(ticker) => ticker.tick().await,
        None => std::future::pending().await,
    }
}

// ============================================================================
// Function-code API
// ============================================================================

/// Function-code numbered Modbus client API
///
/// Every call names the slave explicitly and resolves to the plain values
/// (`Vec<bool>`, `Vec<u16>` or `()`), hiding the response structs.
///
/// # Protocol Limits
///
/// | Operation | Limit |
/// |-----------|-------|
/// | Read Coils (0x01) | 2000 coils |
/// | Read Discrete Inputs (0x02) | 2000 bits |
/// | Read Holding Registers (0x03) | 125 registers |
/// | Read Input Registers (0x04) | 125 registers |
/// | Write Multiple Coils (0x0F) | 1968 coils |
/// | Write Multiple Registers (0x10) | 123 registers |
pub trait ModbusClient: Send + Sync {
    /// Read coils (function code 0x01).
    fn read_01(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<bool>>> + Send;

    /// Read discrete inputs (function code 0x02).
    fn read_02(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<bool>>> + Send;

    /// Read holding registers (function code 0x03).
    fn read_03(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send;

    /// Read input registers (function code 0x04).
    fn read_04(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send;

    /// Write single coil (function code 0x05).
    fn write_05(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        value: bool,
    ) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Write single register (function code 0x06).
    fn write_06(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        value: u16,
    ) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Write multiple coils (function code 0x0F).
    fn write_0f(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        values: &[bool],
    ) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Write multiple registers (function code 0x10).
    fn write_10(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        values: &[u16],
    ) -> impl Future<Output = ModbusResult<()>> + Send;

    fn is_connected(&self) -> bool;

    /// Close the client connection.
    fn close(&mut self) -> impl Future<Output = ModbusResult<()>> + Send;

    fn get_stats(&self) -> TransportStats;
}

impl ModbusClient for ModbusTcpClient {
    async fn read_01(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<bool>> {
        let pending: PendingResponse<ReadBitsResponse> =
            self.request_to(slave_id, ModbusRequest::ReadCoils { address, quantity })?;
        Ok(pending.await?.coils)
    }

    async fn read_02(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<bool>> {
        let pending: PendingResponse<ReadBitsResponse> = self.request_to(
            slave_id,
            ModbusRequest::ReadDiscreteInputs { address, quantity },
        )?;
        Ok(pending.await?.coils)
    }

    async fn read_03(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<u16>> {
        let pending: PendingResponse<ReadRegistersResponse> = self.request_to(
            slave_id,
            ModbusRequest::ReadHoldingRegisters { address, quantity },
        )?;
        Ok(pending.await?.registers)
    }

    async fn read_04(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<u16>> {
        let pending: PendingResponse<ReadRegistersResponse> = self.request_to(
            slave_id,
            ModbusRequest::ReadInputRegisters { address, quantity },
        )?;
        Ok(pending.await?.registers)
    }

    async fn write_05(&mut self, slave_id: SlaveId, address: u16, value: bool) -> ModbusResult<()> {
        let pending: PendingResponse<WriteSingleCoilResponse> =
            self.request_to(slave_id, ModbusRequest::WriteSingleCoil { address, value })?;
        pending.await.map(|_| ())
    }

    async fn write_06(&mut self, slave_id: SlaveId, address: u16, value: u16) -> ModbusResult<()> {
        let pending: PendingResponse<WriteSingleRegisterResponse> =
            self.request_to(slave_id, ModbusRequest::WriteSingleRegister { address, value })?;
        pending.await.map(|_| ())
    }

    async fn write_0f(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        values: &[bool],
    ) -> ModbusResult<()> {
        let pending: PendingResponse<WriteMultipleResponse> = self.request_to(
            slave_id,
            ModbusRequest::WriteMultipleCoils {
                address,
                values: values.to_vec(),
            },
        )?;
        pending.await.map(|_| ())
    }

    async fn write_10(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        values: &[u16],
    ) -> ModbusResult<()> {
        let pending: PendingResponse<WriteMultipleResponse> = self.request_to(
            slave_id,
            ModbusRequest::WriteMultipleRegisters {
                address,
                values: values.to_vec(),
            },
        )?;
        pending.await.map(|_| ())
    }

    fn is_connected(&self) -> bool {
        ModbusTcpClient::is_connected(self)
    }

    async fn close(&mut self) -> ModbusResult<()> {
        ModbusTcpClient::close(self).await
    }

    fn get_stats(&self) -> TransportStats {
        ModbusTcpClient::get_stats(self)
    }
}
