//! Bus doubles for unit tests that need stateful devices or injected
//! failures, which fixed mock expectations express poorly.

use embedded_hal::i2c::{self, I2c, NoAcknowledgeSource};
use embedded_hal::spi::{self, Operation, SpiDevice};

/// SPI device that records every successful chip-select frame and fails the
/// frames whose index is listed in `failing`.
#[derive(Debug, Default)]
pub struct FlakySpi {
    pub frames: Vec<Vec<u8>>,
    failing: Vec<usize>,
    attempts: usize,
}

impl FlakySpi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(frames: &[usize]) -> Self {
        Self {
            failing: frames.to_vec(),
            ..Self::default()
        }
    }
}

impl spi::ErrorType for FlakySpi {
    type Error = spi::ErrorKind;
}

impl SpiDevice for FlakySpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        let index = self.attempts;
        self.attempts += 1;
        if self.failing.contains(&index) {
            return Err(spi::ErrorKind::Other);
        }

        let mut frame = Vec::new();
        for op in operations.iter() {
            if let Operation::Write(bytes) = op {
                frame.extend_from_slice(bytes);
            }
        }
        self.frames.push(frame);
        Ok(())
    }
}

/// Behavioural model of a dual 257-tap potentiometer on I2C.
///
/// Honours write / increment / decrement / read-arm commands, answers reads
/// with the armed register as two bytes, and NAKs any command aimed at a
/// register listed in `nak_registers`.
#[derive(Debug)]
pub struct SimulatedPot {
    pub address: u8,
    pub registers: [u16; 16],
    pub writes: Vec<Vec<u8>>,
    nak_registers: Vec<u8>,
    armed: usize,
}

impl SimulatedPot {
    pub fn new(address: u8) -> Self {
        let mut registers = [0; 16];
        // TCON powers up with every terminal connected
        registers[4] = 0x1FF;
        Self {
            address,
            registers,
            writes: Vec::new(),
            nak_registers: Vec::new(),
            armed: 0,
        }
    }

    pub fn nak_on(mut self, register: u8) -> Self {
        self.nak_registers.push(register);
        self
    }

    fn command(&mut self, bytes: &[u8]) -> Result<(), i2c::ErrorKind> {
        let first = bytes[0];
        let register = first >> 4;
        if self.nak_registers.contains(&register) {
            return Err(i2c::ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data));
        }

        let data = (u16::from(first & 0b11) << 8) | u16::from(bytes.get(1).copied().unwrap_or(0));
        let slot = &mut self.registers[usize::from(register)];
        match (first >> 2) & 0b11 {
            0b00 => *slot = data,
            0b01 => *slot = (*slot + 1).min(0x100),
            0b10 => *slot = slot.saturating_sub(1),
            _ => self.armed = usize::from(register),
        }
        self.writes.push(bytes.to_vec());
        Ok(())
    }
}

impl i2c::ErrorType for SimulatedPot {
    type Error = i2c::ErrorKind;
}

impl I2c for SimulatedPot {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [i2c::Operation<'_>],
    ) -> Result<(), Self::Error> {
        if address != self.address {
            return Err(i2c::ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }

        for op in operations.iter_mut() {
            match op {
                i2c::Operation::Write(bytes) => self.command(bytes)?,
                i2c::Operation::Read(buffer) => {
                    let value = self.registers[self.armed].to_be_bytes();
                    for (dst, src) in buffer.iter_mut().zip(value) {
                        *dst = src;
                    }
                }
            }
        }
        Ok(())
    }
}
