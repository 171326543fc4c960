#![no_main]

use libfuzzer_sys::fuzz_target;
use modbus_mux::{decode_response, ModbusError, ModbusFunction, ModbusResponse};

// Server-controlled PDUs must decode to a value or an error, never a panic.
fuzz_target!(|input: (u8, u16, Vec<u8>)| {
    let (code, quantity, pdu) = input;
    let Ok(function) = ModbusFunction::from_u8(code) else {
        return;
    };

    match decode_response(function, &pdu, quantity) {
        Ok(ModbusResponse::ReadBits(bits)) => assert_eq!(bits.coils.len(), quantity as usize),
        Ok(ModbusResponse::ReadRegisters(regs)) => {
            assert_eq!(regs.registers.len(), quantity as usize)
        }
        Ok(response) => assert_eq!(response.function(), function),
        Err(ModbusError::Exception(exception)) => {
            assert_eq!(exception.error_code, function.exception_code())
        }
        Err(_) => {}
    }
});
