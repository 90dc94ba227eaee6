//! *Signal-chain control core for a DDS function generator, built on Rust
//! Embedded HAL*
//!
//! The output stage of the generator is made of two chips:
//! - an **AD9837 / AD9833-style DDS** on SPI, producing sine, triangle or
//!   square waves at a programmable frequency and phase,
//! - an **MCP46x1-style dual 257-tap digital potentiometer** on I2C, setting
//!   the input attenuation and the feedback gain of the output amplifier.
//!
//! This crate turns engineering-unit requests (Hz, degrees, mV RMS,
//! waveform) into register writes on both chips, and sequences them so the
//! analog output does not glitch while it changes. It is `no_std` and
//! only depends on the [`embedded_hal`] 1.0 traits.
//!
//! ---
//!
//! ## Layout
//!
//! | Module              | Role                                               |
//! |---------------------|----------------------------------------------------|
//! | [`dds`]             | tuning/phase word encoding, control register, SPI driver |
//! | [`potentiometer`]   | command byte encoding, I2C write/read              |
//! | [`gain`]            | mV RMS + waveform → wiper tap counts               |
//! | [`amplifier`]       | applies solved taps to both wipers                 |
//! | [`channel`]         | validated, commit-on-success channel state         |
//! | [`config`]          | master clock, address straps, limits               |
//!
//! ---
//!
//! ## Initialization
//!
//! Create an [`OutputChannel`] from:
//! - the DDS SPI device implementing [`embedded_hal::spi::SpiDevice`],
//! - the potentiometer bus implementing [`embedded_hal::i2c::I2c`],
//! - a board [`Config`].
//!
//! Then call [`OutputChannel::init`] once to load the power-on state.
//!
//! ```
//! use siggen::{Config, OutputChannel};
//! use embedded_hal_mock::eh1::i2c::Mock as I2cMock;
//! use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};
//!
//! let spi = SpiMock::new(&[
//!     // 1 kHz at 16 MHz: LSB half, then MSB half, in one frame
//!     SpiTransaction::transaction_start(),
//!     SpiTransaction::write_vec(vec![0x41, 0x89]),
//!     SpiTransaction::write_vec(vec![0x40, 0x01]),
//!     SpiTransaction::transaction_end(),
//! ]);
//! let i2c = I2cMock::new(&[]);
//!
//! let mut channel = OutputChannel::new(spi, i2c, Config::default());
//! channel.set_frequency_hz(1_000).unwrap();
//! assert_eq!(channel.frequency_hz(), 1_000);
//!
//! let (mut spi, mut i2c) = channel.destroy();
//! spi.done();
//! i2c.done();
//! ```
//!
//! ---
//!
//! ## Amplitude
//!
//! The requested amplitude is mapped to the two wipers by [`gain::solve`],
//! with a different curve for sine/triangle and for square waves:
//!
//! ```
//! use siggen::{gain, Waveform};
//!
//! let taps = gain::solve(350, Waveform::Sine);
//! assert_eq!((taps.r0, taps.r1), (256, 255));
//!
//! // square waves are never amplified
//! assert_eq!(gain::solve(4_000, Waveform::Square).r0, 256);
//! ```
//!
//! ---
//!
//! ## Results
//!
//! Every channel setter returns `Result<(), ChannelError>`; `Ok(())` means
//! the device accepted the change and the cached value was updated. A
//! rejected request never changes the cached value.
//!
//! ## Logging
//!
//! Enable the `defmt` feature to get `defmt` logs from the drivers and
//! `defmt::Format` on the public types.

#![cfg_attr(not(test), no_std)]
#![warn(missing_debug_implementations, missing_docs)]

mod fmt;

pub mod amplifier;
pub mod channel;
pub mod config;
pub mod dds;
pub mod gain;
pub mod potentiometer;

#[cfg(test)]
mod testing;

pub use amplifier::Amplifier;
pub use channel::{ChannelError, ChannelState, OutputChannel};
pub use config::{Config, Limits};
pub use dds::{Dds, Waveform};
pub use gain::Taps;
pub use potentiometer::{AddressPins, Potentiometer};
