//! Dual 257-tap digital potentiometer (MCP46x1 family) over I2C.
//!
//! Every command starts with a single command byte:
//!
//! ```text
//!  b7  b6  b5  b4  b3  b2  b1  b0
//! AD3 AD2 AD1 AD0  C1  C0  D9  D8
//! ```
//!
//! `AD3..AD0` select the memory location, `C1..C0` the operation and
//! `D9..D8` carry the top of the data word. A second byte with `D7..D0`
//! follows only when the data word is non-zero; the chip treats a missing
//! data byte as zero.
//!
//! On the reference board wiper 0 (R0) sits in the amplifier feedback path
//! and is used as a rheostat, wiper 1 (R1) attenuates the amplifier input.

use embedded_hal::i2c::I2c;

/// Wiper value connecting the wiper to terminal A.
pub const FULL_SCALE: u16 = 0x100;
/// Wiper value at mid travel.
pub const MID_SCALE: u16 = 0x080;
/// Wiper value connecting the wiper to terminal B.
pub const ZERO_SCALE: u16 = 0x000;
/// Largest data word accepted by [`Potentiometer::write`].
pub const MAX_DATA: u16 = FULL_SCALE;
/// Reserved all-ones payload of the bus-level software reset sequence.
/// It is not a valid register value and [`Potentiometer::write`] rejects it.
pub const SOFTWARE_RESET_PAYLOAD: u16 = 0x1FF;
/// TCON value with every terminal connected (power-on default).
pub const TCON_ALL_CONNECTED: u16 = 0x1FF;
/// TCON value with R0B disconnected, turning R0 into a rheostat.
pub const TCON_R0_RHEOSTAT: u16 = 0x0FE;

const BASE_ADDRESS: u8 = 0b0101_000;
const DATA_HIGH_MASK: u16 = 0b11 << 8;

/// Logical state of an address strap pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddrPin {
    /// Pin tied to GND
    #[default]
    Low,
    /// Pin tied to VDD
    High,
}

/// A2..A0 strap configuration.
///
/// | A2 | A1 | A0 | Address |
/// |---:|---:|---:|--------:|
/// | L  | L  | L  | `0x28`  |
/// | L  | L  | H  | `0x29`  |
/// | …  | …  | …  | …       |
/// | H  | H  | H  | `0x2F`  |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AddressPins {
    /// State of the A2 pin
    pub a2: AddrPin,
    /// State of the A1 pin
    pub a1: AddrPin,
    /// State of the A0 pin
    pub a0: AddrPin,
}

impl AddressPins {
    /// Compute the 7-bit I2C address, `0b0101_A2A1A0`.
    pub fn to_u8(self) -> u8 {
        let bit = |pin: AddrPin, shift: u8| match pin {
            AddrPin::Low => 0,
            AddrPin::High => 1 << shift,
        };

        BASE_ADDRESS | bit(self.a2, 2) | bit(self.a1, 1) | bit(self.a0, 0)
    }
}

/// Memory map locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MemoryAddress {
    /// Volatile wiper 0
    Wiper0 = 0x00,
    /// Volatile wiper 1
    Wiper1 = 0x01,
    /// Non-volatile wiper 0 (EEPROM)
    NonVolatileWiper0 = 0x02,
    /// Non-volatile wiper 1 (EEPROM)
    NonVolatileWiper1 = 0x03,
    /// Volatile terminal control register
    Tcon = 0x04,
    /// Status register
    Status = 0x05,
}

impl MemoryAddress {
    /// Map a raw 4-bit memory address, `None` if the location is unknown.
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0x00 => Some(MemoryAddress::Wiper0),
            0x01 => Some(MemoryAddress::Wiper1),
            0x02 => Some(MemoryAddress::NonVolatileWiper0),
            0x03 => Some(MemoryAddress::NonVolatileWiper1),
            0x04 => Some(MemoryAddress::Tcon),
            0x05 => Some(MemoryAddress::Status),
            _ => None,
        }
    }
}

/// Two-bit operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    /// Write the data word
    WriteData = 0b00,
    /// Step the wiper one tap towards terminal A
    Increment = 0b01,
    /// Step the wiper one tap towards terminal B
    Decrement = 0b10,
    /// Arm a read of the location
    ReadData = 0b11,
}

impl Command {
    /// Map a raw opcode, `None` if it does not fit in two bits.
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0b00 => Some(Command::WriteData),
            0b01 => Some(Command::Increment),
            0b10 => Some(Command::Decrement),
            0b11 => Some(Command::ReadData),
            _ => None,
        }
    }
}

/// One of the two volatile wipers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Wiper {
    /// R0, the feedback rheostat
    R0,
    /// R1, the input attenuator
    R1,
}

impl Wiper {
    /// Volatile memory location of this wiper.
    pub fn address(self) -> MemoryAddress {
        match self {
            Wiper::R0 => MemoryAddress::Wiper0,
            Wiper::R1 => MemoryAddress::Wiper1,
        }
    }
}

/// Decoded status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(pub u16);

impl Status {
    /// An EEPROM write cycle is in progress.
    pub fn eeprom_write_active(&self) -> bool {
        self.0 & (1 << 3) != 0
    }

    /// WiperLock is engaged on R1.
    pub fn wiper_lock_r1(&self) -> bool {
        self.0 & (1 << 2) != 0
    }

    /// WiperLock is engaged on R0.
    pub fn wiper_lock_r0(&self) -> bool {
        self.0 & (1 << 1) != 0
    }

    /// EEPROM write protect is set.
    pub fn write_protect(&self) -> bool {
        self.0 & 1 != 0
    }
}

/// Serialized command, one or two bytes long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandBytes {
    bytes: [u8; 2],
    len: usize,
}

impl CommandBytes {
    /// Bytes to put on the bus.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// Serialize a command.
///
/// Returns `None` when `data` exceeds [`MAX_DATA`], or when a command other
/// than [`Command::WriteData`] carries data (those are single-byte commands).
pub fn encode_command(address: MemoryAddress, command: Command, data: u16) -> Option<CommandBytes> {
    if data > MAX_DATA || (command != Command::WriteData && data != 0) {
        return None;
    }

    let first = ((address as u8) << 4) | ((command as u8) << 2) | ((data & DATA_HIGH_MASK) >> 8) as u8;
    let second = (data & 0xFF) as u8;
    let len = if data == 0 { 1 } else { 2 };

    Some(CommandBytes {
        bytes: [first, second],
        len,
    })
}

/// Potentiometer driver error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Memory address outside the memory map
    InvalidAddress,
    /// Opcode outside the command set
    InvalidCommand,
    /// Data word too large, or data supplied to a single-byte command
    InvalidData,
    /// I2C transaction failed (typically not acknowledged)
    I2c(E),
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::I2c(e)
    }
}

/// Potentiometer driver.
#[derive(Debug)]
pub struct Potentiometer<I2C>
where
    I2C: I2c,
{
    i2c: I2C,
    address: u8,
}

impl<I2C> Potentiometer<I2C>
where
    I2C: I2c,
{
    /// Create a new driver instance.
    ///
    /// # Arguments
    ///
    /// * `i2c` – Initialized I2C peripheral
    /// * `pins` – A2..A0 strap configuration
    pub fn new(i2c: I2C, pins: AddressPins) -> Self {
        Self {
            i2c,
            address: pins.to_u8(),
        }
    }

    /// 7-bit bus address in use.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Disconnect R0B so wiper 0 works as a rheostat. TCON comes out of
    /// power-on with every terminal connected.
    pub fn init(&mut self) -> Result<(), Error<I2C::Error>> {
        info!("pot: rheostat mode, disconnecting R0B");
        self.write(MemoryAddress::Tcon, Command::WriteData, TCON_R0_RHEOSTAT)
    }

    /// Send one command.
    ///
    /// Invalid arguments are rejected before any bus activity.
    pub fn write(
        &mut self,
        address: MemoryAddress,
        command: Command,
        data: u16,
    ) -> Result<(), Error<I2C::Error>> {
        let bytes = encode_command(address, command, data).ok_or_else(|| {
            warn!("pot: invalid data {=u16:#x}", data);
            Error::InvalidData
        })?;

        self.i2c.write(self.address, bytes.as_slice())?;
        Ok(())
    }

    /// Send one command given as raw memory address and opcode, as they
    /// arrive from a debug console.
    pub fn write_raw(&mut self, address: u8, command: u8, data: u16) -> Result<(), Error<I2C::Error>> {
        let address = MemoryAddress::from_u8(address).ok_or(Error::InvalidAddress)?;
        let command = Command::from_u8(command).ok_or(Error::InvalidCommand)?;
        self.write(address, command, data)
    }

    /// Read a memory location: arm the read, then fetch two bytes, MSB
    /// first.
    pub fn read(&mut self, address: MemoryAddress) -> Result<u16, Error<I2C::Error>> {
        self.write(address, Command::ReadData, 0)?;

        let mut buffer = [0u8; 2];
        self.i2c.read(self.address, &mut buffer)?;
        Ok(u16::from_be_bytes(buffer))
    }

    /// Move a volatile wiper to `taps` (0..=256).
    pub fn set_wiper(&mut self, wiper: Wiper, taps: u16) -> Result<(), Error<I2C::Error>> {
        self.write(wiper.address(), Command::WriteData, taps)
    }

    /// Step a volatile wiper one tap up.
    pub fn increment(&mut self, wiper: Wiper) -> Result<(), Error<I2C::Error>> {
        self.write(wiper.address(), Command::Increment, 0)
    }

    /// Step a volatile wiper one tap down.
    pub fn decrement(&mut self, wiper: Wiper) -> Result<(), Error<I2C::Error>> {
        self.write(wiper.address(), Command::Decrement, 0)
    }

    /// Current tap count of a volatile wiper.
    pub fn read_wiper(&mut self, wiper: Wiper) -> Result<u16, Error<I2C::Error>> {
        self.read(wiper.address())
    }

    /// Terminal control register.
    pub fn read_tcon(&mut self) -> Result<u16, Error<I2C::Error>> {
        self.read(MemoryAddress::Tcon)
    }

    /// Status register.
    pub fn read_status(&mut self) -> Result<Status, Error<I2C::Error>> {
        self.read(MemoryAddress::Status).map(Status)
    }

    /// Destroy the driver and return the wrapped I2C interface.
    pub fn destroy(self) -> I2C {
        self.i2c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SimulatedPot;
    use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    const ADDR: u8 = 0x28;

    const ALL_ADDRESSES: [MemoryAddress; 6] = [
        MemoryAddress::Wiper0,
        MemoryAddress::Wiper1,
        MemoryAddress::NonVolatileWiper0,
        MemoryAddress::NonVolatileWiper1,
        MemoryAddress::Tcon,
        MemoryAddress::Status,
    ];

    /* ---------------------------------------------------------------------
     * Command byte packing
     * ------------------------------------------------------------------ */

    #[test]
    fn command_byte_layout() {
        let bytes = encode_command(MemoryAddress::Wiper1, Command::WriteData, 0x080).unwrap();
        assert_eq!(bytes.as_slice(), &[0x10, 0x80]);

        // D8 set, low byte zero: the data byte is still sent
        let bytes = encode_command(MemoryAddress::Wiper0, Command::WriteData, 0x100).unwrap();
        assert_eq!(bytes.as_slice(), &[0x01, 0x00]);

        let bytes = encode_command(MemoryAddress::Tcon, Command::WriteData, TCON_R0_RHEOSTAT).unwrap();
        assert_eq!(bytes.as_slice(), &[0x40, 0xFE]);

        let bytes = encode_command(MemoryAddress::Status, Command::ReadData, 0).unwrap();
        assert_eq!(bytes.as_slice(), &[0x5C]);

        let bytes = encode_command(MemoryAddress::Wiper1, Command::Decrement, 0).unwrap();
        assert_eq!(bytes.as_slice(), &[0x18]);
    }

    #[test]
    fn zero_data_is_a_single_byte() {
        let bytes = encode_command(MemoryAddress::Wiper1, Command::WriteData, 0).unwrap();
        assert_eq!(bytes.as_slice(), &[0x10]);
    }

    #[test]
    fn data_limits() {
        assert!(encode_command(MemoryAddress::Wiper0, Command::WriteData, MAX_DATA).is_some());
        assert!(encode_command(MemoryAddress::Wiper0, Command::WriteData, MAX_DATA + 1).is_none());
        assert!(encode_command(MemoryAddress::Wiper0, Command::WriteData, SOFTWARE_RESET_PAYLOAD).is_none());
        assert!(encode_command(MemoryAddress::Wiper0, Command::Increment, 1).is_none());
    }

    #[test]
    fn address_pin_mapping() {
        use AddrPin::*;

        let cases = [
            ((Low, Low, Low), 0x28),
            ((Low, Low, High), 0x29),
            ((Low, High, Low), 0x2A),
            ((High, Low, Low), 0x2C),
            ((High, High, High), 0x2F),
        ];

        for ((a2, a1, a0), expected) in cases {
            assert_eq!(AddressPins { a2, a1, a0 }.to_u8(), expected);
        }
    }

    #[test]
    fn status_bits() {
        let status = Status(0b1010);
        assert!(status.eeprom_write_active());
        assert!(!status.wiper_lock_r1());
        assert!(status.wiper_lock_r0());
        assert!(!status.write_protect());
    }

    /* ---------------------------------------------------------------------
     * Bus traffic
     * ------------------------------------------------------------------ */

    #[test]
    fn init_disconnects_r0b() {
        let expectations = [I2cTransaction::write(ADDR, vec![0x40, 0xFE])];

        let i2c = I2cMock::new(&expectations);
        let mut pot = Potentiometer::new(i2c, AddressPins::default());

        pot.init().unwrap();
        pot.destroy().done();
    }

    #[test]
    fn wiper_write_and_step() {
        let expectations = [
            I2cTransaction::write(ADDR, vec![0x00, 0x40]),
            I2cTransaction::write(ADDR, vec![0x04]),
            I2cTransaction::write(ADDR, vec![0x18]),
        ];

        let i2c = I2cMock::new(&expectations);
        let mut pot = Potentiometer::new(i2c, AddressPins::default());

        pot.set_wiper(Wiper::R0, 0x40).unwrap();
        pot.increment(Wiper::R0).unwrap();
        pot.decrement(Wiper::R1).unwrap();
        pot.destroy().done();
    }

    #[test]
    fn read_arms_then_fetches_two_bytes() {
        let expectations = [
            I2cTransaction::write(ADDR, vec![0x4C]),
            I2cTransaction::read(ADDR, vec![0x01, 0xFE]),
        ];

        let i2c = I2cMock::new(&expectations);
        let mut pot = Potentiometer::new(i2c, AddressPins::default());

        assert_eq!(pot.read_tcon().unwrap(), 0x1FE);
        pot.destroy().done();
    }

    #[test]
    fn invalid_requests_stay_off_the_bus() {
        let i2c = I2cMock::new(&[]);
        let mut pot = Potentiometer::new(i2c, AddressPins::default());

        assert_eq!(
            pot.write(MemoryAddress::Wiper0, Command::WriteData, 257),
            Err(Error::InvalidData)
        );
        assert_eq!(pot.write_raw(0x06, 0, 0), Err(Error::InvalidAddress));
        assert_eq!(pot.write_raw(0x00, 0x04, 0), Err(Error::InvalidCommand));
        pot.destroy().done();
    }

    #[test]
    fn nak_is_reported() {
        let mut pot = Potentiometer::new(SimulatedPot::new(ADDR).nak_on(0x01), AddressPins::default());

        assert_eq!(
            pot.set_wiper(Wiper::R1, 0x80),
            Err(Error::I2c(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)))
        );
        assert!(pot.set_wiper(Wiper::R0, 0x80).is_ok());
    }

    #[test]
    fn wrong_strap_address_is_not_acknowledged() {
        let pins = AddressPins {
            a0: AddrPin::High,
            ..AddressPins::default()
        };
        let mut pot = Potentiometer::new(SimulatedPot::new(ADDR), pins);

        assert!(matches!(pot.set_wiper(Wiper::R0, 1), Err(Error::I2c(_))));
    }

    #[test]
    fn write_then_read_round_trip() {
        let mut pot = Potentiometer::new(SimulatedPot::new(ADDR), AddressPins::default());

        for address in ALL_ADDRESSES {
            for data in 0..=MAX_DATA {
                pot.write(address, Command::WriteData, data).unwrap();
                assert_eq!(pot.read(address).unwrap(), data, "{:?} <- {:#x}", address, data);
            }
        }
    }

    #[test]
    fn status_read() {
        let mut sim = SimulatedPot::new(ADDR);
        sim.registers[5] = 0b0001;
        let mut pot = Potentiometer::new(sim, AddressPins::default());

        let status = pot.read_status().unwrap();
        assert!(status.write_protect());
        assert!(!status.eeprom_write_active());
    }
}
