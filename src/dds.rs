//! DDS chip driver (AD9837 / AD9833 register set) over SPI.
//!
//! Every transfer is a 16-bit word sent MSB first. Bits 15:14 of the word
//! select the destination register, so there is no separate address byte:
//!
//! | D15 | D14 | D13 | Destination                 |
//! |----:|----:|----:|-----------------------------|
//! | 0   | 0   | -   | Control register            |
//! | 0   | 1   | -   | FREQ0                       |
//! | 1   | 0   | -   | FREQ1                       |
//! | 1   | 1   | 0   | PHASE0                      |
//! | 1   | 1   | 1   | PHASE1                      |
//!
//! The encoding helpers are pure; only [`Dds`] touches the bus.

use embedded_hal::spi::{Operation, SpiDevice};

/// Width of the frequency tuning word.
pub const TUNING_WORD_BITS: u32 = 28;
/// Mask for a full tuning word.
pub const TUNING_WORD_MASK: u32 = (1 << TUNING_WORD_BITS) - 1;
/// Number of phase steps in one full turn.
pub const PHASE_STEPS: u32 = 4096;

const HALF_WORD_BITS: u32 = 14;
const HALF_WORD_MASK: u16 = 0x3FFF;
const PHASE_MASK: u16 = 0x0FFF;

const TAG_MASK: u16 = 0b11 << 14;
const TAG_FREQ0: u16 = 0b01 << 14;
const TAG_PHASE: u16 = 0b11 << 14;
const PHASE1_SELECT: u16 = 1 << 13;

/// Output waveform produced by the DDS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Waveform {
    /// Sinusoid from the internal SIN ROM
    #[default]
    Sine = 0,
    /// Triangle, SIN ROM bypassed
    Triangle = 1,
    /// Square wave at the programmed frequency (MSB of the DAC data)
    Square = 2,
    /// Square wave at half the programmed frequency (MSB/2)
    SquareDiv2 = 3,
}

impl Waveform {
    /// Map a raw menu code (0..=3) to a waveform.
    ///
    /// Returns `None` for any other code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Waveform::Sine),
            1 => Some(Waveform::Triangle),
            2 => Some(Waveform::Square),
            3 => Some(Waveform::SquareDiv2),
            _ => None,
        }
    }

    /// `true` for both square variants.
    pub fn is_square(self) -> bool {
        matches!(self, Waveform::Square | Waveform::SquareDiv2)
    }
}

/// Power-saving state of the DDS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SleepMode {
    /// Fully running
    #[default]
    Awake,
    /// DAC powered down (SLEEP12)
    DacPoweredDown,
    /// Internal clock disabled (SLEEP1)
    ClockDisabled,
    /// DAC powered down and clock disabled
    Full,
}

macro_rules! control_bits {
    ($($(#[$doc:meta])* $get:ident, $set:ident = $bit:expr;)*) => {
        $(
            $(#[$doc])*
            pub fn $get(&self) -> bool {
                self.0 & (1 << $bit) != 0
            }

            #[doc = concat!("Set or clear the `", stringify!($get), "` bit.")]
            pub fn $set(&mut self, on: bool) {
                if on {
                    self.0 |= 1 << $bit;
                } else {
                    self.0 &= !(1 << $bit);
                }
            }
        )*
    };
}

/// Image of the 16-bit DDS control register.
///
/// Bits 15:14 are the register address tag and are always `00` in the
/// stored image; they are never device state.
///
/// | Bit | Field   | Bit | Field   |
/// |----:|---------|----:|---------|
/// | 13  | B28     | 6   | SLEEP12 |
/// | 12  | HLB     | 5   | OPBITEN |
/// | 11  | FSELECT | 4   | -       |
/// | 10  | PSELECT | 3   | DIV2    |
/// | 9   | -       | 2   | -       |
/// | 8   | RESET   | 1   | MODE    |
/// | 7   | SLEEP1  | 0   | -       |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlRegister(u16);

impl ControlRegister {
    /// All bits clear.
    pub const fn new() -> Self {
        Self(0)
    }

    /// State loaded at power-up and after [`Dds::reset`]: output held in
    /// reset, sine selected, FREQ0/PHASE0 active, consecutive 28-bit
    /// frequency loads enabled.
    pub const fn power_on() -> Self {
        Self((1 << 13) | (1 << 8))
    }

    /// Raw register value, address tag `00` included.
    pub const fn bits(self) -> u16 {
        self.0 & !TAG_MASK
    }

    /// Register value as transmitted, MSB first.
    pub const fn to_bytes(self) -> [u8; 2] {
        self.bits().to_be_bytes()
    }

    control_bits! {
        /// Load the 28-bit frequency word with two consecutive writes.
        b28, set_b28 = 13;
        /// With B28 clear, selects whether a frequency write targets the
        /// 14 MSBs (`true`) or LSBs (`false`).
        hlb, set_hlb = 12;
        /// FREQ1 (`true`) or FREQ0 (`false`) drives the phase accumulator.
        fsel, set_fsel = 11;
        /// PHASE1 (`true`) or PHASE0 (`false`) is added to the accumulator.
        psel, set_psel = 10;
        /// Internal registers held in reset, output at mid-scale.
        reset, set_reset = 8;
        /// Internal MCLK disabled.
        sleep1, set_sleep1 = 7;
        /// DAC powered down.
        sleep12, set_sleep12 = 6;
        /// Output the MSB of the DAC data instead of the DAC itself.
        opbiten, set_opbiten = 5;
        /// With OPBITEN set, output MSB directly (`true`) or MSB/2 (`false`).
        div2, set_div2 = 3;
        /// Bypass the SIN ROM, giving a triangle output.
        mode, set_mode = 1;
    }

    /// Select the output waveform. MODE is cleared whenever OPBITEN is set,
    /// as the chip requires.
    pub fn set_waveform(&mut self, waveform: Waveform) {
        let (opbiten, div2, mode) = match waveform {
            Waveform::Sine => (false, false, false),
            Waveform::Triangle => (false, false, true),
            Waveform::Square => (true, true, false),
            Waveform::SquareDiv2 => (true, false, false),
        };
        self.set_opbiten(opbiten);
        self.set_div2(div2);
        self.set_mode(mode);
    }

    /// Waveform currently selected by OPBITEN / DIV2 / MODE.
    pub fn waveform(&self) -> Waveform {
        match (self.opbiten(), self.div2(), self.mode()) {
            (true, true, _) => Waveform::Square,
            (true, false, _) => Waveform::SquareDiv2,
            (false, _, true) => Waveform::Triangle,
            (false, _, false) => Waveform::Sine,
        }
    }

    /// Open (`true`) or close (`false`) the output gate. The gate is the
    /// inverse of RESET.
    pub fn set_output_gate(&mut self, on: bool) {
        self.set_reset(!on);
    }

    /// `true` while the output is not held in reset.
    pub fn output_gate(&self) -> bool {
        !self.reset()
    }

    /// Program SLEEP1 / SLEEP12.
    pub fn set_sleep_mode(&mut self, mode: SleepMode) {
        let (sleep1, sleep12) = match mode {
            SleepMode::Awake => (false, false),
            SleepMode::DacPoweredDown => (false, true),
            SleepMode::ClockDisabled => (true, false),
            SleepMode::Full => (true, true),
        };
        self.set_sleep1(sleep1);
        self.set_sleep12(sleep12);
    }

    /// Current SLEEP1 / SLEEP12 state.
    pub fn sleep_mode(&self) -> SleepMode {
        match (self.sleep1(), self.sleep12()) {
            (false, false) => SleepMode::Awake,
            (false, true) => SleepMode::DacPoweredDown,
            (true, false) => SleepMode::ClockDisabled,
            (true, true) => SleepMode::Full,
        }
    }
}

/// The two FREQ0 words of a 28-bit frequency load.
///
/// `lsb` must reach the chip first, immediately followed by `msb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrequencyWords {
    /// Tagged upper 14 bits of the tuning word
    pub msb: u16,
    /// Tagged lower 14 bits of the tuning word
    pub lsb: u16,
}

impl FrequencyWords {
    /// Reassemble the 28-bit tuning word, dropping the address tags.
    pub fn tuning_word(&self) -> u32 {
        (u32::from(self.msb & HALF_WORD_MASK) << HALF_WORD_BITS) | u32::from(self.lsb & HALF_WORD_MASK)
    }
}

/// Tuning word for `hz`: `round(hz * 2^28 / mclk_hz)`, masked to 28 bits.
///
/// A zero master clock yields a zero word.
pub fn tuning_word(hz: u32, mclk_hz: u32) -> u32 {
    let mclk = u64::from(mclk_hz);
    let scaled = (u64::from(hz) << TUNING_WORD_BITS) + mclk / 2;
    (scaled.checked_div(mclk).unwrap_or(0) as u32) & TUNING_WORD_MASK
}

/// Split the tuning word for `hz` into the two tagged FREQ0 writes.
pub fn encode_frequency(hz: u32, mclk_hz: u32) -> FrequencyWords {
    let word = tuning_word(hz, mclk_hz);
    let lsb = (word as u16) & HALF_WORD_MASK;
    let msb = ((word >> HALF_WORD_BITS) as u16) & HALF_WORD_MASK;

    FrequencyWords {
        msb: msb | TAG_FREQ0,
        lsb: lsb | TAG_FREQ0,
    }
}

/// PHASE0 word for `degrees`: `round(degrees * 4096 / 360)` in the low
/// 12 bits, `110` in bits 15:13. A full turn (360°) wraps to zero.
pub fn encode_phase(degrees: u16) -> u16 {
    let steps = (u32::from(degrees) * PHASE_STEPS + 180) / 360;
    ((steps as u16) & PHASE_MASK) | (TAG_PHASE & !PHASE1_SELECT)
}

/// DDS driver error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Requested frequency is above the Nyquist limit of the master clock
    FrequencyOutOfRange,
    /// SPI transfer failed
    Spi(E),
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::Spi(e)
    }
}

/// DDS driver.
///
/// Owns the SPI device and a cached image of the control register. The
/// image is only updated once the chip has accepted it.
#[derive(Debug)]
pub struct Dds<SPI>
where
    SPI: SpiDevice,
{
    spi: SPI,
    mclk_hz: u32,
    control: ControlRegister,
}

impl<SPI> Dds<SPI>
where
    SPI: SpiDevice,
{
    /// Create a new driver.
    ///
    /// # Arguments
    ///
    /// * `spi` – SPI device in mode 2 (CPOL=1, CPHA=0), chip select on FSYNC
    /// * `mclk_hz` – master clock applied to the chip
    ///
    /// No bus traffic happens until [`init`](Self::init).
    pub fn new(spi: SPI, mclk_hz: u32) -> Self {
        Self {
            spi,
            mclk_hz,
            control: ControlRegister::power_on(),
        }
    }

    /// Load the power-on control word.
    pub fn init(&mut self) -> Result<(), Error<SPI::Error>> {
        self.write_control(ControlRegister::power_on())
    }

    /// Return the chip to its power-on state: output held in reset, sine
    /// selected, clock and DAC awake.
    pub fn reset(&mut self) -> Result<(), Error<SPI::Error>> {
        self.write_control(ControlRegister::power_on())
    }

    /// Last control word accepted by the chip.
    pub fn control(&self) -> ControlRegister {
        self.control
    }

    /// Master clock the tuning words are computed against.
    pub fn mclk_hz(&self) -> u32 {
        self.mclk_hz
    }

    /// Program FREQ0.
    ///
    /// Both halves go out in one chip-select frame, LSB half first, so no
    /// other register write can land between them.
    pub fn set_frequency(&mut self, hz: u32) -> Result<(), Error<SPI::Error>> {
        if self.mclk_hz == 0 || hz > self.mclk_hz / 2 {
            return Err(Error::FrequencyOutOfRange);
        }

        let words = encode_frequency(hz, self.mclk_hz);
        let lsb = words.lsb.to_be_bytes();
        let msb = words.msb.to_be_bytes();
        debug!("dds: {=u32} Hz -> tuning word {=u32:#x}", hz, words.tuning_word());

        self.spi
            .transaction(&mut [Operation::Write(&lsb), Operation::Write(&msb)])?;
        Ok(())
    }

    /// Program PHASE0.
    pub fn set_phase(&mut self, degrees: u16) -> Result<(), Error<SPI::Error>> {
        let word = encode_phase(degrees);
        debug!("dds: {=u16} deg -> phase word {=u16:#x}", degrees, word);

        self.spi.write(&word.to_be_bytes())?;
        Ok(())
    }

    /// Select the output waveform.
    pub fn set_waveform(&mut self, waveform: Waveform) -> Result<(), Error<SPI::Error>> {
        let mut next = self.control;
        next.set_waveform(waveform);
        self.write_control(next)
    }

    /// Open or close the output gate.
    pub fn set_output(&mut self, on: bool) -> Result<(), Error<SPI::Error>> {
        let mut next = self.control;
        next.set_output_gate(on);
        self.write_control(next)
    }

    /// Program the power-saving bits.
    pub fn set_sleep(&mut self, mode: SleepMode) -> Result<(), Error<SPI::Error>> {
        let mut next = self.control;
        next.set_sleep_mode(mode);
        self.write_control(next)
    }

    /// Destroy the driver and return the wrapped SPI device.
    pub fn destroy(self) -> SPI {
        self.spi
    }

    fn write_control(&mut self, next: ControlRegister) -> Result<(), Error<SPI::Error>> {
        trace!("dds: control {=u16:#x}", next.bits());
        self.spi.write(&next.to_bytes())?;
        self.control = next;
        Ok(())
    }
}
