//! Output amplifier: drives both wipers from a solved gain curve.

use embedded_hal::i2c::I2c;

use crate::gain::{self, Taps};
use crate::potentiometer::{AddressPins, Error, Potentiometer, Wiper};
use crate::Waveform;

/// Output amplifier built on the dual potentiometer.
#[derive(Debug)]
pub struct Amplifier<I2C>
where
    I2C: I2c,
{
    pot: Potentiometer<I2C>,
    taps: Taps,
    failed_writes: u32,
}

impl<I2C> Amplifier<I2C>
where
    I2C: I2c,
{
    /// Create a new amplifier on the potentiometer at `pins`.
    pub fn new(i2c: I2C, pins: AddressPins) -> Self {
        Self {
            pot: Potentiometer::new(i2c, pins),
            taps: Taps::default(),
            failed_writes: 0,
        }
    }

    /// Put the potentiometer in the rheostat/attenuator configuration.
    pub fn init(&mut self) -> Result<(), Error<I2C::Error>> {
        self.pot.init().map_err(|e| {
            self.failed_writes += 1;
            e
        })
    }

    /// Set the output to `target_mv` RMS for `waveform`.
    ///
    /// Both wipers are written even if the first write fails; the first
    /// error is returned and every failed write is counted.
    pub fn set(&mut self, target_mv: u16, waveform: Waveform) -> Result<Taps, Error<I2C::Error>> {
        let taps = gain::solve(target_mv, waveform);
        debug!("amp: {=u16} mV -> R0 {=u16}, R1 {=u16}", target_mv, taps.r0, taps.r1);

        let r0 = self.pot.set_wiper(Wiper::R0, taps.r0);
        if r0.is_ok() {
            self.taps.r0 = taps.r0;
        }
        let r1 = self.pot.set_wiper(Wiper::R1, taps.r1);
        if r1.is_ok() {
            self.taps.r1 = taps.r1;
        }

        for result in [&r0, &r1] {
            if result.is_err() {
                warn!("amp: wiper write failed");
                self.failed_writes += 1;
            }
        }

        r0.and(r1).map(|_| taps)
    }

    /// Wiper settings last accepted by the potentiometer.
    pub fn taps(&self) -> Taps {
        self.taps
    }

    /// Number of potentiometer writes that failed since creation.
    pub fn failed_writes(&self) -> u32 {
        self.failed_writes
    }

    /// Direct access to the potentiometer, for diagnostics.
    pub fn potentiometer(&mut self) -> &mut Potentiometer<I2C> {
        &mut self.pot
    }

    /// Destroy the amplifier and return the wrapped I2C interface.
    pub fn destroy(self) -> I2C {
        self.pot.destroy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SimulatedPot;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    const ADDR: u8 = 0x28;

    #[test]
    fn writes_r0_then_r1() {
        let expectations = [
            // R0 full scale, R1 77 taps for 100 mV sine
            I2cTransaction::write(ADDR, vec![0x01, 0x00]),
            I2cTransaction::write(ADDR, vec![0x10, 77]),
        ];

        let i2c = I2cMock::new(&expectations);
        let mut amp = Amplifier::new(i2c, AddressPins::default());

        assert_eq!(amp.set(100, Waveform::Sine).unwrap(), Taps { r0: 256, r1: 77 });
        assert_eq!(amp.failed_writes(), 0);
        amp.destroy().done();
    }

    #[test]
    fn zero_taps_send_a_single_byte() {
        let expectations = [
            I2cTransaction::write(ADDR, vec![0x01, 0x00]),
            I2cTransaction::write(ADDR, vec![0x10]),
        ];

        let i2c = I2cMock::new(&expectations);
        let mut amp = Amplifier::new(i2c, AddressPins::default());

        amp.set(0, Waveform::Square).unwrap();
        amp.destroy().done();
    }

    #[test]
    fn second_wiper_is_written_after_first_fails() {
        let sim = SimulatedPot::new(ADDR).nak_on(0x00);
        let mut amp = Amplifier::new(sim, AddressPins::default());

        assert!(amp.set(1_000, Waveform::Sine).is_err());
        assert_eq!(amp.failed_writes(), 1);
        assert_eq!(amp.taps(), Taps { r0: 0, r1: 256 });

        let sim = amp.destroy();
        assert_eq!(sim.registers[1], 256);
        assert_eq!(sim.writes, vec![vec![0x11, 0x00]]);
    }

    #[test]
    fn both_failures_are_counted() {
        let sim = SimulatedPot::new(ADDR).nak_on(0x00).nak_on(0x01);
        let mut amp = Amplifier::new(sim, AddressPins::default());

        assert!(amp.set(500, Waveform::Triangle).is_err());
        assert_eq!(amp.failed_writes(), 2);
    }

    #[test]
    fn wipers_read_back_the_solved_taps() {
        let mut amp = Amplifier::new(SimulatedPot::new(ADDR), AddressPins::default());

        amp.init().unwrap();
        let taps = amp.set(2_000, Waveform::Sine).unwrap();

        let pot = amp.potentiometer();
        assert_eq!(pot.read_wiper(Wiper::R0).unwrap(), taps.r0);
        assert_eq!(pot.read_wiper(Wiper::R1).unwrap(), taps.r1);
        assert_eq!(pot.read_tcon().unwrap(), 0x0FE);
    }
}
