//! Property tests for stream reassembly and out-of-order correlation

use std::sync::{Arc, Mutex};

use modbus_mux::{
    DeviceLimits, FrameReassembler, ModbusRequest, ModbusResponse, ModbusSession, Responder,
};
use proptest::prelude::*;

fn frame(transaction_id: u16, pdu: &[u8]) -> Vec<u8> {
    let mut frame = Vec::new();
    frame.extend_from_slice(&transaction_id.to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x00]);
    frame.extend_from_slice(&((pdu.len() + 1) as u16).to_be_bytes());
    frame.push(0x01);
    frame.extend_from_slice(pdu);
    frame
}

fn arb_frame() -> impl Strategy<Value = Vec<u8>> {
    (any::<u16>(), prop::collection::vec(any::<u8>(), 1..=253))
        .prop_map(|(id, pdu)| frame(id, &pdu))
}

/// Split `bytes` at the given cut points
fn split_at_cuts(bytes: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut cuts: Vec<usize> = cuts.iter().map(|c| c % (bytes.len() + 1)).collect();
    cuts.sort_unstable();
    cuts.dedup();

    let mut chunks = Vec::new();
    let mut start = 0;
    for cut in cuts {
        chunks.push(bytes[start..cut].to_vec());
        start = cut;
    }
    chunks.push(bytes[start..].to_vec());
    chunks
}

fn collect_frames(chunks: &[Vec<u8>]) -> Vec<Vec<u8>> {
    let mut reassembler = FrameReassembler::new();
    let mut frames = Vec::new();
    for chunk in chunks {
        reassembler.push(chunk);
        for frame in reassembler.frames() {
            frames.push(frame.unwrap().as_bytes().to_vec());
        }
    }
    assert_eq!(reassembler.buffered_len(), 0);
    frames
}

proptest! {
    #[test]
    fn chunking_does_not_change_frames(
        frames in prop::collection::vec(arb_frame(), 1..8),
        cuts in prop::collection::vec(any::<usize>(), 0..16),
    ) {
        let stream: Vec<u8> = frames.concat();
        let whole = collect_frames(&[stream.clone()]);
        let chunked = collect_frames(&split_at_cuts(&stream, &cuts));

        prop_assert_eq!(&whole, &frames);
        prop_assert_eq!(&chunked, &frames);
    }

    #[test]
    fn any_response_order_reaches_each_caller_once(
        order in Just((0u16..16).collect::<Vec<_>>()).prop_shuffle(),
        cuts in prop::collection::vec(any::<usize>(), 0..8),
    ) {
        let mut session = ModbusSession::new(DeviceLimits::default());
        session.begin_connect();
        session.on_connected();

        let outcomes: Vec<Arc<Mutex<Vec<u16>>>> =
            (0..16).map(|_| Arc::new(Mutex::new(Vec::new()))).collect();
        for (address, slot) in outcomes.iter().enumerate() {
            let slot = slot.clone();
            let id = session
                .issue(
                    1,
                    &ModbusRequest::ReadHoldingRegisters { address: address as u16, quantity: 1 },
                    Responder::callback(move |outcome| {
                        if let Ok(ModbusResponse::ReadRegisters(r)) = outcome {
                            slot.lock().unwrap().extend(r.registers);
                        }
                    }),
                )
                .unwrap();
            prop_assert_eq!(id as usize, address);
        }

        // Each response carries its transaction id as the register value
        let stream: Vec<u8> = order
            .iter()
            .flat_map(|&id| {
                let [hi, lo] = id.to_be_bytes();
                frame(id, &[0x03, 0x02, hi, lo])
            })
            .collect();

        let mut delivered = 0;
        for chunk in split_at_cuts(&stream, &cuts) {
            delivered += session.on_data(&chunk).unwrap();
        }

        prop_assert_eq!(delivered, 16);
        prop_assert_eq!(session.pending_count(), 0);
        for (id, slot) in outcomes.iter().enumerate() {
            prop_assert_eq!(slot.lock().unwrap().clone(), vec![id as u16]);
        }
    }
}
