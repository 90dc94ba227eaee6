//! Board configuration.
//!
//! Everything here is fixed by the hardware build: the DDS master clock,
//! the potentiometer address straps and the engineering-unit limits the
//! output stage is rated for.

use crate::potentiometer::AddressPins;

/// Master clock fed to the DDS chip on the reference board.
pub const DEFAULT_MCLK_HZ: u32 = 16_000_000;

/// Engineering-unit bounds accepted by [`OutputChannel`](crate::OutputChannel).
///
/// Requests above a `max_*` value are rejected with
/// [`ChannelError::ValueTooLarge`](crate::ChannelError::ValueTooLarge),
/// below a `min_*` value with
/// [`ChannelError::ValueTooSmall`](crate::ChannelError::ValueTooSmall).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Limits {
    /// Lowest accepted output frequency in Hz
    pub min_frequency_hz: u32,
    /// Highest accepted output frequency in Hz
    pub max_frequency_hz: u32,
    /// Lowest accepted phase offset in degrees
    pub min_phase_degrees: u16,
    /// Highest accepted phase offset in degrees
    pub max_phase_degrees: u16,
    /// Lowest accepted amplitude in millivolts RMS
    pub min_amplitude_mv: u16,
    /// Highest accepted amplitude in millivolts RMS
    pub max_amplitude_mv: u16,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            min_frequency_hz: 0,
            max_frequency_hz: 8_000_000,
            min_phase_degrees: 0,
            max_phase_degrees: 360,
            min_amplitude_mv: 0,
            max_amplitude_mv: 4000,
        }
    }
}

/// Complete board configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// DDS master clock in Hz
    pub mclk_hz: u32,
    /// Potentiometer A2..A0 strap configuration
    pub pot_address: AddressPins,
    /// Engineering-unit limits
    pub limits: Limits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mclk_hz: DEFAULT_MCLK_HZ,
            pot_address: AddressPins::default(),
            limits: Limits::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_board_defaults() {
        let config = Config::default();

        assert_eq!(config.mclk_hz, 16_000_000);
        assert_eq!(config.pot_address.to_u8(), 0x28);
        assert_eq!(config.limits.max_frequency_hz, 8_000_000);
        assert_eq!(config.limits.max_phase_degrees, 360);
        assert_eq!(config.limits.max_amplitude_mv, 4000);
    }
}
