//! Output-amplitude curves.
//!
//! The DDS delivers roughly 400 mV RMS for sine and triangle and several
//! volts for square. A non-inverting op-amp follows it: R1 divides the
//! signal at the amplifier input, R0 sits in the feedback path and sets the
//! gain. Amplitude is therefore controlled by two tap counts.
//!
//! Sine and triangle use two linear segments split at
//! [`ATTENUATION_LIMIT_MV`]: below it the gain is minimal (R0 at full
//! scale) and R1 attenuates; above it R1 passes everything and R0 lowers
//! its resistance to add gain. Square waves are never amplified since the
//! amplifier distorts them, so R0 stays at full scale and R1 alone tracks
//! the target.
//!
//! All curves are evaluated in Q24.8 fixed point.

use fixed::types::I24F8;

use crate::Waveform;

/// Highest tap count of either wiper.
pub const MAX_TAPS: u16 = 256;
/// Lowest usable R1 setting for sine/triangle; below it the waveform shape
/// falls apart.
pub const MIN_ATTENUATOR_TAPS: u16 = 16;
/// Sine/triangle targets up to this level are reached by attenuation alone.
pub const ATTENUATION_LIMIT_MV: u16 = 350;
/// R0 settings under this resistance add audible noise while 0 Ω does not,
/// so they snap to 0 Ω.
pub const FEEDBACK_NOISE_FLOOR: I24F8 = I24F8::from_bits(80 << 8);
/// Resistance of one tap of the 10 kΩ, 256-step element (39.0625 Ω).
pub const OHMS_PER_TAP: I24F8 = I24F8::from_bits(10_000);

// R1 = 27.73 * mV + 270 (sine/triangle, attenuating)
const ATTENUATE_SLOPE: I24F8 = I24F8::from_bits(7_099);
const ATTENUATE_OFFSET: I24F8 = I24F8::from_bits(270 << 8);
// R0 = -5.68 * mV + 12000 (sine/triangle, amplifying)
const AMPLIFY_SLOPE: I24F8 = I24F8::from_bits(-1_455);
const AMPLIFY_OFFSET: I24F8 = I24F8::from_bits(12_000 << 8);
// R1 = 2.3046875 * mV + 23.25 (square)
const SQUARE_SLOPE: I24F8 = I24F8::from_bits(590);
const SQUARE_OFFSET: I24F8 = I24F8::from_bits(5_952);

/// Wiper settings for one amplitude request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Taps {
    /// Feedback rheostat R0, 0..=256
    pub r0: u16,
    /// Input attenuator R1, 0..=256
    pub r1: u16,
}

/// Solve the tap counts giving `target_mv` RMS for `waveform`.
///
/// Pure and deterministic; the caller bounds `target_mv`.
pub fn solve(target_mv: u16, waveform: Waveform) -> Taps {
    let mv = i32::from(target_mv);

    match waveform {
        Waveform::Sine | Waveform::Triangle if target_mv <= ATTENUATION_LIMIT_MV => {
            let ohms = ATTENUATE_SLOPE * mv + ATTENUATE_OFFSET;
            let r1 = to_taps(ohms);
            debug!("gain: attenuate, R1 {=i32} ohm/256 -> {=u16} taps", ohms.to_bits(), r1);

            Taps {
                r0: MAX_TAPS,
                r1: clamp(r1, MIN_ATTENUATOR_TAPS),
            }
        }
        Waveform::Sine | Waveform::Triangle => {
            let mut ohms = AMPLIFY_SLOPE * mv + AMPLIFY_OFFSET;
            if ohms < FEEDBACK_NOISE_FLOOR {
                trace!("gain: R0 below noise floor, forcing 0 ohm");
                ohms = I24F8::ZERO;
            }
            let r0 = to_taps(ohms);
            debug!("gain: amplify, R0 {=i32} ohm/256 -> {=u16} taps", ohms.to_bits(), r0);

            Taps {
                r0: clamp(r0, 0),
                r1: MAX_TAPS,
            }
        }
        Waveform::Square | Waveform::SquareDiv2 => {
            let ohms = SQUARE_SLOPE * mv + SQUARE_OFFSET;
            let r1 = to_taps(ohms);
            debug!("gain: square, R1 {=i32} ohm/256 -> {=u16} taps", ohms.to_bits(), r1);

            Taps {
                r0: MAX_TAPS,
                r1: clamp(r1, 0),
            }
        }
    }
}

// Both operands share the Q24.8 scale, so the ratio of the raw bits is the
// tap count, truncated.
fn to_taps(ohms: I24F8) -> u16 {
    let taps = ohms.to_bits() / OHMS_PER_TAP.to_bits();
    taps.clamp(0, i32::from(u16::MAX)) as u16
}

fn clamp(taps: u16, floor: u16) -> u16 {
    if taps > MAX_TAPS {
        trace!("gain: upper limit reached");
    } else if taps < floor {
        trace!("gain: lower limit reached");
    }
    taps.clamp(floor, MAX_TAPS)
}
