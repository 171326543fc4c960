#![no_main]

use libfuzzer_sys::fuzz_target;
use modbus_mux::{DeviceLimits, FrameReassembler, ModbusRequest, ModbusSession, Responder};

// Arbitrary byte streams cut into arbitrary chunks must never panic, every
// frame handed out must be internally consistent, and a session fed the same
// chunks must complete each pending request at most once.
fuzz_target!(|input: (Vec<u8>, Vec<u8>)| {
    let (stream, cuts) = input;
    let mut reassembler = FrameReassembler::new();

    let mut session = ModbusSession::new(DeviceLimits::default());
    session.begin_connect();
    session.on_connected();
    for address in 0..4u16 {
        let request = ModbusRequest::ReadHoldingRegisters {
            address,
            quantity: 1,
        };
        let _ = session.issue(1, &request, Responder::callback(|_| {}));
    }
    let issued = session.pending_count();

    let mut rest = stream.as_slice();
    let mut reassembler_failed = false;
    let mut session_failed = false;
    let mut delivered = 0;
    for &cut in &cuts {
        if rest.is_empty() {
            break;
        }
        let at = (cut as usize % rest.len()) + 1;
        let (chunk, tail) = rest.split_at(at);
        rest = tail;

        if !reassembler_failed {
            reassembler.push(chunk);
            for frame in reassembler.frames() {
                match frame {
                    Ok(frame) => {
                        assert_eq!(frame.header.protocol_id, 0);
                        assert_eq!(frame.as_bytes().len(), 6 + frame.header.length as usize);
                        assert_eq!(frame.pdu().len(), frame.header.pdu_len());
                    }
                    Err(_) => reassembler_failed = true,
                }
            }
        }

        if !session_failed {
            match session.on_data(chunk) {
                Ok(count) => delivered += count,
                Err(_) => session_failed = true,
            }
        }
    }

    assert!(delivered <= issued);
    assert_eq!(session.pending_count(), issued - delivered);
});
