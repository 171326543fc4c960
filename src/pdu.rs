//! Stack-allocated Modbus PDU
//!
//! Request PDUs are built into a fixed-size array so that validating and
//! encoding a request never touches the heap. The transaction id is not part
//! of the PDU, which lets a request be built and validated at the call site
//! before any transaction id is allocated.

use tracing::debug;

use crate::constants::{COIL_OFF, COIL_ON, MAX_PDU_SIZE};
use crate::error::{ModbusError, ModbusResult};
use crate::protocol::{ModbusFunction, ModbusRequest};

/// PDU with stack-allocated fixed array
#[derive(Debug, Clone)]
pub struct ModbusPdu {
    data: [u8; MAX_PDU_SIZE],
    len: usize,
}

impl ModbusPdu {
    /// Create an empty PDU
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0; MAX_PDU_SIZE],
            len: 0,
        }
    }

    /// Copy a PDU out of a byte slice
    pub fn from_slice(data: &[u8]) -> ModbusResult<Self> {
        let mut pdu = Self::new();
        pdu.extend(data)?;
        Ok(pdu)
    }

    /// Push a single byte
    #[inline]
    pub fn push(&mut self, byte: u8) -> ModbusResult<()> {
        if self.len >= MAX_PDU_SIZE {
            return Err(ModbusError::invalid_data(format!(
                "PDU exceeds {} bytes",
                MAX_PDU_SIZE
            )));
        }
        self.data[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    /// Push u16 in big-endian
    #[inline]
    pub fn push_u16(&mut self, value: u16) -> ModbusResult<()> {
        self.extend(&value.to_be_bytes())
    }

    /// Extend with a byte slice
    #[inline]
    pub fn extend(&mut self, data: &[u8]) -> ModbusResult<()> {
        if self.len + data.len() > MAX_PDU_SIZE {
            return Err(ModbusError::invalid_data(format!(
                "PDU would exceed max size: {} + {} > {}",
                self.len,
                data.len(),
                MAX_PDU_SIZE
            )));
        }
        self.data[self.len..self.len + data.len()].copy_from_slice(data);
        self.len += data.len();
        Ok(())
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Function code (first byte)
    #[inline]
    pub fn function_code(&self) -> Option<u8> {
        self.as_slice().first().copied()
    }
}

impl Default for ModbusPdu {
    fn default() -> Self {
        Self::new()
    }
}

/// PDU builder - fluent API
pub struct PduBuilder {
    pdu: ModbusPdu,
}

impl Default for PduBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PduBuilder {
    #[inline]
    pub fn new() -> Self {
        Self {
            pdu: ModbusPdu::new(),
        }
    }

    #[inline]
    pub fn function(mut self, function: ModbusFunction) -> ModbusResult<Self> {
        self.pdu.push(function.to_u8())?;
        Ok(self)
    }

    #[inline]
    pub fn word(mut self, value: u16) -> ModbusResult<Self> {
        self.pdu.push_u16(value)?;
        Ok(self)
    }

    #[inline]
    pub fn byte(mut self, b: u8) -> ModbusResult<Self> {
        self.pdu.push(b)?;
        Ok(self)
    }

    #[inline]
    pub fn data(mut self, data: &[u8]) -> ModbusResult<Self> {
        self.pdu.extend(data)?;
        Ok(self)
    }

    #[inline]
    pub fn build(self) -> ModbusPdu {
        self.pdu
    }

    /// Encode a typed request into its PDU
    ///
    /// Only the wire layout is handled here; quantity limits are checked by
    /// [`crate::codec::prepare_request`].
    pub fn for_request(request: &ModbusRequest) -> ModbusResult<ModbusPdu> {
        let builder = Self::new().function(request.function())?;

        let builder = match request {
            ModbusRequest::ReadCoils { address, quantity }
            | ModbusRequest::ReadDiscreteInputs { address, quantity }
            | ModbusRequest::ReadHoldingRegisters { address, quantity }
            | ModbusRequest::ReadInputRegisters { address, quantity } => {
                builder.word(*address)?.word(*quantity)?
            }
            ModbusRequest::WriteSingleCoil { address, value } => {
                builder
                    .word(*address)?
                    .word(if *value { COIL_ON } else { COIL_OFF })?
            }
            ModbusRequest::WriteSingleRegister { address, value } => {
                builder.word(*address)?.word(*value)?
            }
            ModbusRequest::WriteMultipleCoils { address, values } => {
                let packed = pack_bits(values);
                builder
                    .word(*address)?
                    .word(request.quantity())?
                    .byte(byte_count(packed.len())?)?
                    .data(&packed)?
            }
            ModbusRequest::WriteMultipleRegisters { address, values } => {
                let mut builder = builder
                    .word(*address)?
                    .word(request.quantity())?
                    .byte(byte_count(values.len() * 2)?)?;
                for &value in values {
                    builder = builder.word(value)?;
                }
                builder
            }
        };

        let pdu = builder.build();
        debug!(
            "PDU built: FC={:02X} ({}), total_len={}",
            request.function().to_u8(),
            request.function().name(),
            pdu.len()
        );
        Ok(pdu)
    }
}

fn byte_count(len: usize) -> ModbusResult<u8> {
    u8::try_from(len)
        .map_err(|_| ModbusError::invalid_data(format!("byte count {} exceeds 255", len)))
}

/// Pack booleans into bytes, least significant bit first
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; bits.len().div_ceil(8)];
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            bytes[i / 8] |= 1 << (i % 8);
        }
    }
    bytes
}

/// Unpack `count` booleans from bytes, least significant bit first
///
/// Padding bits beyond `count` are discarded.
pub fn unpack_bits(bytes: &[u8], count: usize) -> Vec<bool> {
    bytes
        .iter()
        .flat_map(|byte| (0..8).map(move |bit| byte & (1 << bit) != 0))
        .take(count)
        .collect()
}
