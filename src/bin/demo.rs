//! Modbus Mux Demo
//!
//! Demonstrates the modbus_mux library features including:
//! - Frame encoding and exception decoding without a server
//! - Pipelined requests on one connection, answered in any order
//! - The function-code API (read_03, write_06, etc.)
//!
//! Usage: cargo run --bin demo [server_address]
//! Example: cargo run --bin demo 127.0.0.1:502

use std::sync::Arc;
use std::time::Duration;

use modbus_mux::{
    decode_response, encode_request, CallbackLogger, ClientConfig, DeviceLimits, LogLevel,
    ModbusClient, ModbusFunction, ModbusRequest, ModbusTcpClient, DEFAULT_TCP_PORT,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🚀 {}", modbus_mux::info());
    println!("=============================\n");

    // =========================================================================
    // Part 1: Codec Demo (No connection required)
    // =========================================================================
    println!("📦 Part 1: Frame Codec");
    println!("----------------------");

    let limits = DeviceLimits::default();
    let request = ModbusRequest::ReadInputRegisters {
        address: 0,
        quantity: 1,
    };
    let frame = encode_request(0, 1, &request, &limits)?;
    println!("  {:?}", request);
    println!("  -> frame: {:02X?}", frame.as_ref());

    match decode_response(ModbusFunction::ReadInputRegisters, &[0x84, 0x02], 1) {
        Ok(response) => println!("  Unexpected success: {:?}", response),
        Err(e) => println!("  PDU [84 02] -> {}", e),
    }

    // =========================================================================
    // Part 2: DeviceLimits Demo
    // =========================================================================
    println!("\n🎛️  Part 2: DeviceLimits - Protocol Configuration");
    println!("-------------------------------------------------");

    println!("  Default limits:");
    println!("    Max read registers: {}", limits.max_read_registers);
    println!("    Max write registers: {}", limits.max_write_registers);
    println!("    Max read coils: {}", limits.max_read_coils);

    let custom_limits = DeviceLimits::new()
        .with_max_read_registers(50)
        .with_max_write_registers(20);
    println!("  Custom limits:");
    println!("    Max read registers: {}", custom_limits.max_read_registers);

    // =========================================================================
    // Part 3: Pipelined TCP Client Demo (requires Modbus server)
    // =========================================================================
    println!("\n🔌 Part 3: Pipelined TCP Client");
    println!("--------------------------------");

    let server_address = std::env::args()
        .nth(1)
        .unwrap_or_else(|| format!("127.0.0.1:{}", DEFAULT_TCP_PORT));

    println!("  Connecting to {}...", server_address);

    let logger = CallbackLogger::new(
        Some(Arc::new(|level: LogLevel, message: &str| {
            println!("    [{}] {}", level, message)
        })),
        LogLevel::Info,
    )
    .with_packet_logging(true);
    let config = ClientConfig::new()
        .with_unit_id(1)
        .with_request_timeout(Duration::from_secs(2))
        .with_observer(Arc::new(logger));

    let mut client = match ModbusTcpClient::connect(server_address.as_str(), config).await {
        Ok(client) => {
            println!("  ✅ Connected successfully!");
            client
        }
        Err(e) => {
            println!("  ⚠️  Connection failed: {}", e);
            println!("  (This is expected if no Modbus server is running)");
            println!("\n🎉 Demo completed! (TCP operations skipped)");
            return Ok(());
        }
    };

    // All four requests are written before the first response is read
    println!("\n  📖 Pipelined Reads:");

    let holding = client.read_holding_registers(0, 5)?;
    let input = client.read_input_registers(0, 2)?;
    let coils = client.read_coils(0, 8)?;
    let discrete = client.read_discrete_inputs(0, 8)?;
    let (holding, input, coils, discrete) = tokio::join!(holding, input, coils, discrete);

    match holding {
        Ok(r) => println!("    FC03 Holding registers 0-4: {:?}", r.registers),
        Err(e) => println!("    FC03 Error: {}", e),
    }
    match input {
        Ok(r) => println!("    FC04 Input registers 0-1: {:?}", r.registers),
        Err(e) => println!("    FC04 Error: {}", e),
    }
    match coils {
        Ok(r) => {
            let states: Vec<&str> = r.coils.iter().map(|&c| if c { "ON" } else { "OFF" }).collect();
            println!("    FC01 Coils 0-7: {:?}", states);
        }
        Err(e) => println!("    FC01 Error: {}", e),
    }
    match discrete {
        Ok(r) => println!("    FC02 Discrete inputs 0-7: {:?}", r.coils),
        Err(e) => println!("    FC02 Error: {}", e),
    }

    // Write operations through the function-code API
    println!("\n  ✏️  Write Operations:");

    match client.write_06(1, 100, 0x1234).await {
        Ok(_) => println!("    FC06 Wrote register 100 = 0x1234"),
        Err(e) => println!("    FC06 Error: {}", e),
    }

    match client.write_10(1, 200, &[0x1111, 0x2222]).await {
        Ok(_) => println!("    FC16 Wrote registers 200-201"),
        Err(e) => println!("    FC16 Error: {}", e),
    }

    // Statistics
    let stats = client.get_stats();
    println!("\n  📊 Statistics:");
    println!(
        "    Requests: {}, Responses: {}, Exceptions: {}",
        stats.requests_sent, stats.responses_received, stats.exceptions
    );
    println!(
        "    Bytes sent: {}, received: {}",
        stats.bytes_sent, stats.bytes_received
    );

    if let Err(e) = client.close().await {
        eprintln!("  ⚠️  Close error: {}", e);
    }

    println!("\n🎉 Demo completed!");
    Ok(())
}
