//! The output channel: engineering-unit front end of the signal chain.
//!
//! Requests are bounds-checked, sent to the devices, and only then
//! committed to the cached [`ChannelState`], so the cache always matches
//! what the hardware last accepted.

use embedded_hal::i2c::I2c;
use embedded_hal::spi::SpiDevice;

use crate::amplifier::Amplifier;
use crate::config::{Config, Limits};
use crate::dds::{self, Dds};
use crate::Waveform;

/// Result code of a rejected channel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelError {
    /// Unrecognised request, e.g. an unknown waveform code
    Unknown,
    /// Value below the configured minimum
    ValueTooSmall,
    /// Value above the configured maximum
    ValueTooLarge,
    /// A device did not accept the change
    Other,
}

/// Cached settings of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelState {
    /// Output frequency in Hz
    pub frequency_hz: u32,
    /// Phase offset in degrees
    pub phase_degrees: u16,
    /// Amplitude in millivolts RMS
    pub amplitude_mv: u16,
    /// Output waveform
    pub waveform: Waveform,
    /// Output gate open
    pub output_enabled: bool,
}

/// One physical output channel: a DDS followed by a programmable-gain
/// amplifier.
#[derive(Debug)]
pub struct OutputChannel<SPI, I2C>
where
    SPI: SpiDevice,
    I2C: I2c,
{
    dds: Dds<SPI>,
    amplifier: Amplifier<I2C>,
    limits: Limits,
    state: ChannelState,
    errors: u32,
}

impl<SPI, I2C> OutputChannel<SPI, I2C>
where
    SPI: SpiDevice,
    I2C: I2c,
{
    /// Create a channel from the DDS SPI device and the potentiometer I2C
    /// bus. No bus traffic happens until [`init`](Self::init).
    pub fn new(spi: SPI, i2c: I2C, config: Config) -> Self {
        Self {
            dds: Dds::new(spi, config.mclk_hz),
            amplifier: Amplifier::new(i2c, config.pot_address),
            limits: config.limits,
            state: ChannelState::default(),
            errors: 0,
        }
    }

    /// Bring both devices up and apply [`reset`](Self::reset).
    pub fn init(&mut self) -> Result<(), ChannelError> {
        info!("channel: init");
        let dds = self.dds.init().map_err(|_| self.transport_failure("dds init"));
        let amp = self.amplifier.init().map_err(|_| self.transport_failure("pot init"));
        let reset = self.reset();

        dds.and(amp).and(reset)
    }

    /// Output frequency in Hz.
    pub fn frequency_hz(&self) -> u32 {
        self.state.frequency_hz
    }

    /// Phase offset in degrees.
    pub fn phase_degrees(&self) -> u16 {
        self.state.phase_degrees
    }

    /// Amplitude in millivolts RMS.
    pub fn amplitude_mv(&self) -> u16 {
        self.state.amplitude_mv
    }

    /// Output waveform.
    pub fn waveform(&self) -> Waveform {
        self.state.waveform
    }

    /// `true` while the output gate is open.
    pub fn output_enabled(&self) -> bool {
        self.state.output_enabled
    }

    /// Snapshot of every cached setting.
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Engineering-unit limits in force.
    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Number of failed device operations and unknown requests so far.
    pub fn error_count(&self) -> u32 {
        self.errors
    }

    /// Program the output frequency.
    pub fn set_frequency_hz(&mut self, hz: u32) -> Result<(), ChannelError> {
        check_range(hz, self.limits.min_frequency_hz, self.limits.max_frequency_hz)?;

        match self.dds.set_frequency(hz) {
            Ok(()) => {
                self.state.frequency_hz = hz;
                info!("channel: frequency {=u32} Hz", hz);
                Ok(())
            }
            Err(dds::Error::FrequencyOutOfRange) => Err(ChannelError::ValueTooLarge),
            Err(dds::Error::Spi(_)) => Err(self.transport_failure("frequency")),
        }
    }

    /// Program the phase offset.
    pub fn set_phase_degrees(&mut self, degrees: u16) -> Result<(), ChannelError> {
        check_range(degrees, self.limits.min_phase_degrees, self.limits.max_phase_degrees)?;

        self.dds
            .set_phase(degrees)
            .map_err(|_| self.transport_failure("phase"))?;
        self.state.phase_degrees = degrees;
        info!("channel: phase {=u16} deg", degrees);
        Ok(())
    }

    /// Program the output amplitude for the current waveform.
    ///
    /// The stored amplitude only changes when both wipers were written.
    pub fn set_amplitude_mv(&mut self, mv: u16) -> Result<(), ChannelError> {
        check_range(mv, self.limits.min_amplitude_mv, self.limits.max_amplitude_mv)?;

        self.amplifier
            .set(mv, self.state.waveform)
            .map_err(|_| self.transport_failure("amplitude"))?;
        self.state.amplitude_mv = mv;
        info!("channel: amplitude {=u16} mV", mv);
        Ok(())
    }

    /// Change the waveform without glitching the output.
    ///
    /// The gate is closed, the waveform selected, the current amplitude
    /// re-solved for the new waveform's gain curve, and the gate returned
    /// to the state it had before the call. Every step runs even if an
    /// earlier one failed; the call succeeds only if all of them did.
    pub fn set_waveform(&mut self, waveform: Waveform) -> Result<(), ChannelError> {
        let was_enabled = self.state.output_enabled;

        let mute = self
            .dds
            .set_output(false)
            .map_err(|_| self.transport_failure("mute"));

        let select = match self.dds.set_waveform(waveform) {
            Ok(()) => {
                self.state.waveform = waveform;
                Ok(())
            }
            Err(_) => Err(self.transport_failure("waveform")),
        };

        let gain = self
            .amplifier
            .set(self.state.amplitude_mv, waveform)
            .map(|_| ())
            .map_err(|_| self.transport_failure("gain curve"));

        let restore = self
            .dds
            .set_output(was_enabled)
            .map_err(|_| self.transport_failure("restore gate"));

        self.state.output_enabled = self.dds.control().output_gate();
        info!("channel: waveform {}", waveform);

        mute.and(select).and(gain).and(restore)
    }

    /// Change the waveform from a raw menu code (see
    /// [`Waveform::from_code`]). Unknown codes are counted and rejected
    /// without touching either device.
    pub fn set_waveform_code(&mut self, code: u8) -> Result<(), ChannelError> {
        match Waveform::from_code(code) {
            Some(waveform) => self.set_waveform(waveform),
            None => {
                warn!("channel: unknown waveform code {=u8}", code);
                self.errors += 1;
                Err(ChannelError::Unknown)
            }
        }
    }

    /// Open or close the output gate.
    pub fn set_output_enabled(&mut self, on: bool) -> Result<(), ChannelError> {
        self.dds
            .set_output(on)
            .map_err(|_| self.transport_failure("gate"))?;
        self.state.output_enabled = on;
        info!("channel: output {=bool}", on);
        Ok(())
    }

    /// Return to the power-on defaults: output off, sine, 0 Hz, 0°, 0 mV.
    ///
    /// Each device write commits its own field, so a partial failure
    /// leaves the cache matching the hardware.
    pub fn reset(&mut self) -> Result<(), ChannelError> {
        info!("channel: reset");

        let control = match self.dds.reset() {
            Ok(()) => {
                self.state.output_enabled = false;
                self.state.waveform = Waveform::Sine;
                Ok(())
            }
            Err(_) => Err(self.transport_failure("dds reset")),
        };

        let frequency = match self.dds.set_frequency(0) {
            Ok(()) => {
                self.state.frequency_hz = 0;
                Ok(())
            }
            Err(_) => Err(self.transport_failure("frequency reset")),
        };

        let phase = match self.dds.set_phase(0) {
            Ok(()) => {
                self.state.phase_degrees = 0;
                Ok(())
            }
            Err(_) => Err(self.transport_failure("phase reset")),
        };

        let amplitude = match self.amplifier.set(0, Waveform::Sine) {
            Ok(_) => {
                self.state.amplitude_mv = 0;
                Ok(())
            }
            Err(_) => Err(self.transport_failure("amplitude reset")),
        };

        control.and(frequency).and(phase).and(amplitude)
    }

    /// Direct access to the DDS driver, for diagnostics.
    pub fn dds(&mut self) -> &mut Dds<SPI> {
        &mut self.dds
    }

    /// Direct access to the amplifier, for diagnostics.
    pub fn amplifier(&mut self) -> &mut Amplifier<I2C> {
        &mut self.amplifier
    }

    /// Destroy the channel and return both bus handles.
    pub fn destroy(self) -> (SPI, I2C) {
        (self.dds.destroy(), self.amplifier.destroy())
    }

    fn transport_failure(&mut self, step: &'static str) -> ChannelError {
        warn!("channel: {=str} failed", step);
        self.errors += 1;
        ChannelError::Other
    }
}

fn check_range<T: PartialOrd>(value: T, min: T, max: T) -> Result<(), ChannelError> {
    if value > max {
        Err(ChannelError::ValueTooLarge)
    } else if value < min {
        Err(ChannelError::ValueTooSmall)
    } else {
        Ok(())
    }
}
