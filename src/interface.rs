//! Register framing over the two-wire bus.
//!
//! Every access is a single bus transaction: a one-byte command (register
//! pointer) write, followed for reads by a repeated-start read of the data
//! bytes. Multi-byte values travel low byte first.

use device_descriptor::{Proxy, ReadOnlyRegister, Register};
use embedded_hal::i2c::{I2c, Operation};
use register_access::RegisterAccess;

use crate::{descriptors::Command, Error};

pub struct Ina233Interface<I> {
    i2c: I,
    address: u8,
}

impl<I> Ina233Interface<I> {
    pub const fn new(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Consumes the interface, handing the bus back to the owner.
    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I> Ina233Interface<I>
where
    I: I2c,
{
    /// Issues a send-byte command: the command code alone, no data phase.
    pub fn send_command(&mut self, command: Command) -> Result<(), I::Error> {
        self.i2c.write(self.address, &[command as u8])
    }

    /// SMBus block read: command write, then a repeated-start read of the
    /// byte count followed by the payload.
    ///
    /// The advertised count must match the expected payload length exactly;
    /// a short (or long) block is rejected without handing out partial data.
    pub fn read_block(&mut self, command: u8, payload: &mut [u8]) -> Result<(), Error<I>> {
        let mut count = [0];

        self.i2c
            .transaction(
                self.address,
                &mut [
                    Operation::Write(&[command]),
                    Operation::Read(&mut count),
                    Operation::Read(payload),
                ],
            )
            .map_err(Error::Transfer)?;

        if usize::from(count[0]) != payload.len() {
            return Err(Error::BlockLength);
        }

        Ok(())
    }
}

impl<I> RegisterAccess<u16> for Ina233Interface<I>
where
    I: I2c,
{
    type Error = I::Error;

    fn read_register<R>(&mut self) -> Result<R, Self::Error>
    where
        R: ReadOnlyRegister<RegisterWidth = u16>,
    {
        let mut data = [0; 2];
        self.i2c.write_read(self.address, &[R::ADDRESS], &mut data)?;

        Ok(R::from_bits(u16::from_le_bytes(data)))
    }

    fn write_register<R>(&mut self, reg: R) -> Result<(), Self::Error>
    where
        R: Register<RegisterWidth = u16>,
    {
        let data = reg.bits().to_le_bytes();
        self.i2c.write(self.address, &[R::ADDRESS, data[0], data[1]])
    }
}

impl<I> RegisterAccess<u8> for Ina233Interface<I>
where
    I: I2c,
{
    type Error = I::Error;

    fn read_register<R>(&mut self) -> Result<R, Self::Error>
    where
        R: ReadOnlyRegister<RegisterWidth = u8>,
    {
        let mut data = [0];
        self.i2c.write_read(self.address, &[R::ADDRESS], &mut data)?;

        Ok(R::from_bits(data[0]))
    }

    fn write_register<R>(&mut self, reg: R) -> Result<(), Self::Error>
    where
        R: Register<RegisterWidth = u8>,
    {
        self.i2c.write(self.address, &[R::ADDRESS, reg.bits()])
    }
}
