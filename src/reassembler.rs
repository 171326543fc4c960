//! Reassembly of MBAP frames from an arbitrarily chunked byte stream
//!
//! TCP gives no message boundaries: one read may carry half a frame or
//! several. The reassembler buffers everything and cuts frames using the
//! MBAP length field once the first six bytes of a frame are available.

use bytes::BytesMut;

use crate::codec::MbapFrame;
use crate::constants::{
    MAX_MBAP_LENGTH, MBAP_LENGTH_OFFSET, MBAP_PREFIX_LEN, MIN_MBAP_LENGTH, MODBUS_PROTOCOL_ID,
    MODBUS_RESPONSE_BUFFER_SIZE,
};
use crate::error::{ModbusError, ModbusResult};

/// Accumulates inbound bytes and yields complete frames
#[derive(Debug)]
pub struct FrameReassembler {
    buffer: BytesMut,
}

impl FrameReassembler {
    pub fn new() -> Self {
        Self::with_capacity(MODBUS_RESPONSE_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Append a chunk received from the transport
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Cut the next complete frame off the buffer
    ///
    /// Returns `Ok(None)` while the frame at the head of the buffer is still
    /// incomplete. A header with a non-zero protocol id or an impossible
    /// length is a [`ModbusError::Frame`]; the offending bytes stay buffered,
    /// so every later call reports the same error.
    pub fn next_frame(&mut self) -> ModbusResult<Option<MbapFrame>> {
        if self.buffer.len() < MBAP_PREFIX_LEN {
            return Ok(None);
        }

        let protocol_id = u16::from_be_bytes([self.buffer[2], self.buffer[3]]);
        if protocol_id != MODBUS_PROTOCOL_ID {
            return Err(ModbusError::frame(format!(
                "unexpected protocol id 0x{:04X}",
                protocol_id
            )));
        }

        let length = u16::from_be_bytes([
            self.buffer[MBAP_LENGTH_OFFSET],
            self.buffer[MBAP_LENGTH_OFFSET + 1],
        ]);
        if !(MIN_MBAP_LENGTH..=MAX_MBAP_LENGTH).contains(&(length as usize)) {
            return Err(ModbusError::frame(format!(
                "MBAP length {} outside {}..={}",
                length, MIN_MBAP_LENGTH, MAX_MBAP_LENGTH
            )));
        }

        let total = MBAP_PREFIX_LEN + length as usize;
        if self.buffer.len() < total {
            return Ok(None);
        }

        let raw = self.buffer.split_to(total).freeze();
        MbapFrame::from_bytes(raw).map(Some)
    }

    /// Iterate over every complete frame currently buffered
    ///
    /// The iterator ends when the buffer runs out of complete frames, or
    /// right after yielding a framing error.
    pub fn frames(&mut self) -> Frames<'_> {
        Frames {
            reassembler: self,
            failed: false,
        }
    }

    /// Bytes waiting for the rest of their frame
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drop everything buffered
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator returned by [`FrameReassembler::frames`]
pub struct Frames<'a> {
    reassembler: &'a mut FrameReassembler,
    failed: bool,
}

impl Iterator for Frames<'_> {
    type Item = ModbusResult<MbapFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.reassembler.next_frame() {
            Ok(frame) => frame.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for Frames<'_> {}
