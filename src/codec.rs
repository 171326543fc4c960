//! # Modbus TCP Frame Codec
//!
//! Stateless translation between typed requests/responses and bytes.
//!
//! ## Frame Layout
//!
//! ```text
//! +----------------+-------------+--------+---------+---------------+
//! | transaction id | protocol id | length | unit id | PDU           |
//! | u16 BE         | u16 BE (=0) | u16 BE | u8      | fc + payload  |
//! +----------------+-------------+--------+---------+---------------+
//! length = 1 (unit id) + len(PDU)
//! ```
//!
//! Encoding is split in two steps. [`prepare_request`] validates a request
//! and builds its PDU without a transaction id; [`encode_frame`] adds the
//! MBAP header once an id has been allocated. A request that fails
//! validation therefore never consumes a transaction id.
//!
//! Decoding works on the PDU alone plus what the pending request remembers:
//! its function code and the requested quantity (coil responses are padded
//! to whole bytes, so the quantity decides how many bits are surfaced).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::constants::{
    ADDRESS_SPACE, COIL_OFF, COIL_ON, MBAP_HEADER_LEN, MIN_MBAP_LENGTH, MODBUS_PROTOCOL_ID,
};
use crate::device_limits::DeviceLimits;
use crate::error::{ModbusError, ModbusResult};
use crate::pdu::{unpack_bits, ModbusPdu, PduBuilder};
use crate::protocol::{
    ExceptionResponse, ModbusFunction, ModbusRequest, ModbusResponse, ReadBitsResponse,
    ReadRegistersResponse, SlaveId, WriteMultipleResponse, WriteSingleCoilResponse,
    WriteSingleRegisterResponse,
};
use crate::transaction::TransactionId;

/// Payload bytes following the function code in a single-write echo
const SINGLE_WRITE_ECHO_LEN: u8 = 4;

// ============================================================================
// MBAP header and frames
// ============================================================================

/// Modbus Application Protocol header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    pub transaction_id: TransactionId,
    pub protocol_id: u16,
    /// Byte count of the unit id plus the PDU
    pub length: u16,
    pub unit_id: SlaveId,
}

impl MbapHeader {
    /// Header for a PDU of `pdu_len` bytes
    pub fn for_pdu(transaction_id: TransactionId, unit_id: SlaveId, pdu_len: usize) -> Self {
        Self {
            transaction_id,
            protocol_id: MODBUS_PROTOCOL_ID,
            length: (pdu_len + 1) as u16,
            unit_id,
        }
    }

    /// Append the 7 header bytes to `buf`
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.transaction_id);
        buf.put_u16(self.protocol_id);
        buf.put_u16(self.length);
        buf.put_u8(self.unit_id);
    }

    /// Parse the header from the first 7 bytes of `bytes`
    pub fn parse(bytes: &[u8]) -> ModbusResult<Self> {
        if bytes.len() < MBAP_HEADER_LEN {
            return Err(ModbusError::frame(format!(
                "MBAP header needs {} bytes, got {}",
                MBAP_HEADER_LEN,
                bytes.len()
            )));
        }
        let mut buf = bytes;
        Ok(Self {
            transaction_id: buf.get_u16(),
            protocol_id: buf.get_u16(),
            length: buf.get_u16(),
            unit_id: buf.get_u8(),
        })
    }

    /// Length of the PDU announced by this header
    #[inline]
    pub fn pdu_len(&self) -> usize {
        (self.length as usize).saturating_sub(1)
    }
}

/// A complete frame cut from the byte stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MbapFrame {
    pub header: MbapHeader,
    raw: Bytes,
}

impl MbapFrame {
    /// Wrap a complete frame (header + PDU)
    pub fn from_bytes(raw: Bytes) -> ModbusResult<Self> {
        let header = MbapHeader::parse(&raw)?;
        let expected = MBAP_HEADER_LEN + header.pdu_len();
        if (header.length as usize) < MIN_MBAP_LENGTH || raw.len() != expected {
            return Err(ModbusError::frame(format!(
                "MBAP length {} does not match frame of {} bytes",
                header.length,
                raw.len()
            )));
        }
        Ok(Self { header, raw })
    }

    #[inline]
    pub fn transaction_id(&self) -> TransactionId {
        self.header.transaction_id
    }

    /// Function code plus payload
    #[inline]
    pub fn pdu(&self) -> &[u8] {
        &self.raw[MBAP_HEADER_LEN..]
    }

    /// Whole frame as received
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }
}

// ============================================================================
// Request encoding
// ============================================================================

/// A validated request PDU waiting for a transaction id
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub function: ModbusFunction,
    /// Coils/registers addressed, needed to decode the response
    pub quantity: u16,
    pub pdu: ModbusPdu,
}

/// Validate `request` against `limits` and build its PDU
pub fn prepare_request(
    request: &ModbusRequest,
    limits: &DeviceLimits,
) -> ModbusResult<PreparedRequest> {
    let function = request.function();
    let count = match request {
        ModbusRequest::WriteMultipleCoils { values, .. } => values.len(),
        ModbusRequest::WriteMultipleRegisters { values, .. } => values.len(),
        _ => request.quantity() as usize,
    };
    limits.check_quantity(function, count)?;

    let end = request.address() as usize + count;
    if end > ADDRESS_SPACE {
        return Err(ModbusError::invalid_data(format!(
            "{} at address {} with quantity {} runs past address 65535",
            function.name(),
            request.address(),
            count
        )));
    }

    Ok(PreparedRequest {
        function,
        quantity: request.quantity(),
        pdu: PduBuilder::for_request(request)?,
    })
}

/// Prefix a PDU with its MBAP header
pub fn encode_frame(transaction_id: TransactionId, unit_id: SlaveId, pdu: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(MBAP_HEADER_LEN + pdu.len());
    MbapHeader::for_pdu(transaction_id, unit_id, pdu.len()).encode(&mut buf);
    buf.put_slice(pdu);
    buf.freeze()
}

/// Validate and encode `request` into a complete Modbus TCP frame
pub fn encode_request(
    transaction_id: TransactionId,
    unit_id: SlaveId,
    request: &ModbusRequest,
    limits: &DeviceLimits,
) -> ModbusResult<Bytes> {
    let prepared = prepare_request(request, limits)?;
    Ok(encode_frame(transaction_id, unit_id, prepared.pdu.as_slice()))
}

// ============================================================================
// Response decoding
// ============================================================================

/// Decode a response PDU for a request of `function` that asked for `quantity` items
///
/// Server exceptions come back as `Err(ModbusError::Exception(..))`.
pub fn decode_response(
    function: ModbusFunction,
    pdu: &[u8],
    quantity: u16,
) -> ModbusResult<ModbusResponse> {
    let (&fc, body) = pdu
        .split_first()
        .ok_or_else(|| ModbusError::protocol("empty response PDU"))?;

    if fc == function.exception_code() {
        let &exception_code = body
            .first()
            .ok_or_else(|| ModbusError::protocol("exception response without exception code"))?;
        let exception = ExceptionResponse::new(fc, exception_code);
        debug!("PDU parsed: FC={:02X} exception: {}", fc, exception);
        return Err(ModbusError::Exception(exception));
    }

    if fc != function.to_u8() {
        return Err(ModbusError::protocol(format!(
            "response function code 0x{:02X} does not match request {}",
            fc, function
        )));
    }

    debug!("PDU parsed: FC={:02X} ({}), data_len={}", fc, function.name(), body.len());

    match function {
        ModbusFunction::ReadCoils | ModbusFunction::ReadDiscreteInputs => {
            decode_bits(function, body, quantity).map(ModbusResponse::ReadBits)
        }
        ModbusFunction::ReadHoldingRegisters | ModbusFunction::ReadInputRegisters => {
            decode_registers(function, body, quantity).map(ModbusResponse::ReadRegisters)
        }
        ModbusFunction::WriteSingleCoil => {
            let (output_address, raw) = decode_single_write_echo(body)?;
            let output_value = match raw {
                COIL_ON => true,
                COIL_OFF => false,
                other => {
                    return Err(ModbusError::invalid_data(format!(
                        "coil value 0x{:04X} is neither 0xFF00 nor 0x0000",
                        other
                    )))
                }
            };
            Ok(ModbusResponse::WriteSingleCoil(WriteSingleCoilResponse {
                function,
                byte_count: SINGLE_WRITE_ECHO_LEN,
                output_address,
                output_value,
            }))
        }
        ModbusFunction::WriteSingleRegister => {
            let (register_address, register_value) = decode_single_write_echo(body)?;
            Ok(ModbusResponse::WriteSingleRegister(
                WriteSingleRegisterResponse {
                    function,
                    byte_count: SINGLE_WRITE_ECHO_LEN,
                    register_address,
                    register_value,
                },
            ))
        }
        ModbusFunction::WriteMultipleCoils | ModbusFunction::WriteMultipleRegisters => {
            if body.len() != 4 {
                return Err(ModbusError::protocol(format!(
                    "{} response needs 4 payload bytes, got {}",
                    function.name(),
                    body.len()
                )));
            }
            let mut buf = body;
            Ok(ModbusResponse::WriteMultiple(WriteMultipleResponse {
                function,
                start_address: buf.get_u16(),
                quantity: buf.get_u16(),
            }))
        }
    }
}

/// Split `byte_count` and its payload, checking they agree
fn counted_payload(body: &[u8]) -> ModbusResult<(u8, &[u8])> {
    let (&byte_count, payload) = body
        .split_first()
        .ok_or_else(|| ModbusError::protocol("read response without byte count"))?;
    if payload.len() != byte_count as usize {
        return Err(ModbusError::protocol(format!(
            "byte count {} but {} payload bytes",
            byte_count,
            payload.len()
        )));
    }
    Ok((byte_count, payload))
}

fn decode_bits(
    function: ModbusFunction,
    body: &[u8],
    quantity: u16,
) -> ModbusResult<ReadBitsResponse> {
    let (byte_count, payload) = counted_payload(body)?;
    if payload.len() * 8 < quantity as usize {
        return Err(ModbusError::protocol(format!(
            "{} bytes cannot hold {} requested bits",
            byte_count, quantity
        )));
    }
    Ok(ReadBitsResponse {
        function,
        byte_count,
        coils: unpack_bits(payload, quantity as usize),
    })
}

fn decode_registers(
    function: ModbusFunction,
    body: &[u8],
    quantity: u16,
) -> ModbusResult<ReadRegistersResponse> {
    let (byte_count, payload) = counted_payload(body)?;
    if byte_count % 2 != 0 {
        return Err(ModbusError::protocol(format!(
            "odd register byte count {}",
            byte_count
        )));
    }
    if payload.len() / 2 != quantity as usize {
        return Err(ModbusError::protocol(format!(
            "{} registers returned, {} requested",
            payload.len() / 2,
            quantity
        )));
    }
    Ok(ReadRegistersResponse {
        function,
        byte_count,
        registers: payload
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect(),
    })
}

/// Address and value of an FC05/FC06 echo
///
/// Accepts the standard echo (`addr value`) and the byte-counted form some
/// gateways send (`0x04 addr value`).
fn decode_single_write_echo(body: &[u8]) -> ModbusResult<(u16, u16)> {
    let mut buf = match body.len() {
        4 => body,
        5 if body[0] == SINGLE_WRITE_ECHO_LEN => &body[1..],
        len => {
            return Err(ModbusError::protocol(format!(
                "single write echo needs 4 payload bytes, got {}",
                len
            )))
        }
    };
    Ok((buf.get_u16(), buf.get_u16()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> DeviceLimits {
        DeviceLimits::default()
    }

    #[test]
    fn test_encode_read_input_registers_frame() {
        let request = ModbusRequest::ReadInputRegisters {
            address: 0,
            quantity: 1,
        };
        let frame = encode_request(0, 1, &request, &limits()).unwrap();
        assert_eq!(
            frame.as_ref(),
            &[0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x01, 0x04, 0x00, 0x00, 0x00, 0x01]
        );
    }

    #[test]
    fn test_encode_frame_length_matches_pdu() {
        let request = ModbusRequest::WriteMultipleRegisters {
            address: 10,
            values: vec![1, 2, 3],
        };
        let frame = encode_request(0xBEEF, 9, &request, &limits()).unwrap();
        let header = MbapHeader::parse(&frame).unwrap();
        assert_eq!(header.transaction_id, 0xBEEF);
        assert_eq!(header.protocol_id, 0);
        assert_eq!(header.unit_id, 9);
        assert_eq!(header.length as usize, 1 + (frame.len() - MBAP_HEADER_LEN));
    }

    #[test]
    fn test_prepare_rejects_out_of_range_requests() {
        let zero = ModbusRequest::ReadCoils {
            address: 0,
            quantity: 0,
        };
        assert!(matches!(
            prepare_request(&zero, &limits()),
            Err(ModbusError::InvalidData { .. })
        ));

        let too_many = ModbusRequest::ReadHoldingRegisters {
            address: 0,
            quantity: 126,
        };
        assert!(prepare_request(&too_many, &limits()).is_err());

        let past_end = ModbusRequest::ReadInputRegisters {
            address: 65535,
            quantity: 2,
        };
        assert!(prepare_request(&past_end, &limits()).is_err());

        let last = ModbusRequest::ReadInputRegisters {
            address: 65535,
            quantity: 1,
        };
        assert!(prepare_request(&last, &limits()).is_ok());

        let empty_write = ModbusRequest::WriteMultipleCoils {
            address: 0,
            values: vec![],
        };
        assert!(prepare_request(&empty_write, &limits()).is_err());
    }

    #[test]
    fn test_decode_read_input_registers() {
        let response =
            decode_response(ModbusFunction::ReadInputRegisters, &[0x04, 0x02, 0x00, 0x2A], 1)
                .unwrap();
        assert_eq!(
            response,
            ModbusResponse::ReadRegisters(ReadRegistersResponse {
                function: ModbusFunction::ReadInputRegisters,
                byte_count: 2,
                registers: vec![42],
            })
        );
    }

    #[test]
    fn test_decode_exception() {
        let err = decode_response(ModbusFunction::ReadInputRegisters, &[0x84, 0x01], 1)
            .unwrap_err();
        assert_eq!(
            err.exception(),
            Some(&ExceptionResponse {
                error_code: 0x84,
                exception_code: 1,
                message: "ILLEGAL FUNCTION",
            })
        );
    }

    #[test]
    fn test_decode_unknown_exception_code() {
        let err = decode_response(ModbusFunction::ReadCoils, &[0x81, 0x42], 8).unwrap_err();
        let exception = err.exception().copied().unwrap();
        assert_eq!(exception.exception_code, 0x42);
        assert_eq!(exception.message, "UNKNOWN EXCEPTION");
    }

    #[test]
    fn test_decode_read_coils_discards_padding() {
        let response =
            decode_response(ModbusFunction::ReadCoils, &[0x01, 0x03, 0x55, 0x55, 0x01], 17)
                .unwrap();
        let ModbusResponse::ReadBits(bits) = response else {
            panic!("expected read bits response");
        };
        assert_eq!(bits.byte_count, 3);
        assert_eq!(
            bits.coils,
            vec![
                true, false, true, false, true, false, true, false, true, false, true, false,
                true, false, true, false, true
            ]
        );
    }

    #[test]
    fn test_decode_write_single_coil_values() {
        let off = decode_response(
            ModbusFunction::WriteSingleCoil,
            &[0x05, 0x00, 0x0D, 0x00, 0x00],
            1,
        )
        .unwrap();
        assert_eq!(
            off,
            ModbusResponse::WriteSingleCoil(WriteSingleCoilResponse {
                function: ModbusFunction::WriteSingleCoil,
                byte_count: 4,
                output_address: 13,
                output_value: false,
            })
        );

        let on = decode_response(
            ModbusFunction::WriteSingleCoil,
            &[0x05, 0x00, 0x0F, 0xFF, 0x00],
            1,
        )
        .unwrap();
        let ModbusResponse::WriteSingleCoil(on) = on else {
            panic!("expected write single coil response");
        };
        assert!(on.output_value);
        assert_eq!(on.output_address, 15);

        let bad = decode_response(
            ModbusFunction::WriteSingleCoil,
            &[0x05, 0x00, 0x0F, 0x12, 0x34],
            1,
        );
        assert!(matches!(bad, Err(ModbusError::InvalidData { .. })));
    }

    #[test]
    fn test_decode_byte_counted_write_echo() {
        let response = decode_response(
            ModbusFunction::WriteSingleRegister,
            &[0x06, 0x04, 0x00, 0x0D, 0x00, 0x2A],
            1,
        )
        .unwrap();
        assert_eq!(
            response,
            ModbusResponse::WriteSingleRegister(WriteSingleRegisterResponse {
                function: ModbusFunction::WriteSingleRegister,
                byte_count: 4,
                register_address: 13,
                register_value: 42,
            })
        );
    }

    #[test]
    fn test_write_echo_reproduces_request() {
        let request = ModbusRequest::WriteSingleRegister {
            address: 0x1234,
            value: 0xABCD,
        };
        let prepared = prepare_request(&request, &limits()).unwrap();
        // A server echoes the request PDU unchanged
        let response =
            decode_response(prepared.function, prepared.pdu.as_slice(), prepared.quantity)
                .unwrap();
        let ModbusResponse::WriteSingleRegister(echo) = response else {
            panic!("expected write single register response");
        };
        assert_eq!(echo.register_address, 0x1234);
        assert_eq!(echo.register_value, 0xABCD);
    }

    #[test]
    fn test_decode_write_multiple() {
        let response = decode_response(
            ModbusFunction::WriteMultipleRegisters,
            &[0x10, 0x00, 0x01, 0x00, 0x02],
            2,
        )
        .unwrap();
        assert_eq!(
            response,
            ModbusResponse::WriteMultiple(WriteMultipleResponse {
                function: ModbusFunction::WriteMultipleRegisters,
                start_address: 1,
                quantity: 2,
            })
        );
    }

    #[test]
    fn test_decode_malformed_payloads() {
        // byte count disagrees with payload
        assert!(decode_response(ModbusFunction::ReadInputRegisters, &[0x04, 0x04, 0x00, 0x2A], 2)
            .is_err());
        // odd register byte count
        assert!(
            decode_response(ModbusFunction::ReadHoldingRegisters, &[0x03, 0x01, 0x00], 1).is_err()
        );
        // fewer registers than requested
        assert!(
            decode_response(ModbusFunction::ReadHoldingRegisters, &[0x03, 0x02, 0x00, 0x01], 2)
                .is_err()
        );
        // not enough bits
        assert!(decode_response(ModbusFunction::ReadCoils, &[0x01, 0x01, 0xFF], 9).is_err());
        // function code mismatch
        assert!(matches!(
            decode_response(ModbusFunction::ReadCoils, &[0x02, 0x01, 0xFF], 8),
            Err(ModbusError::Protocol { .. })
        ));
        // exception without exception code
        assert!(matches!(
            decode_response(ModbusFunction::ReadCoils, &[0x81], 8),
            Err(ModbusError::Protocol { .. })
        ));
        assert!(decode_response(ModbusFunction::ReadCoils, &[], 8).is_err());
    }

    #[test]
    fn test_frame_from_bytes() {
        let raw = Bytes::from_static(&[0x00, 0x07, 0x00, 0x00, 0x00, 0x03, 0x01, 0x84, 0x02]);
        let frame = MbapFrame::from_bytes(raw).unwrap();
        assert_eq!(frame.transaction_id(), 7);
        assert_eq!(frame.pdu(), &[0x84, 0x02]);

        let short = Bytes::from_static(&[0x00, 0x07, 0x00, 0x00, 0x00, 0x05, 0x01, 0x84, 0x02]);
        assert!(matches!(
            MbapFrame::from_bytes(short),
            Err(ModbusError::Frame { .. })
        ));
    }
}
