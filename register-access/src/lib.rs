//! Connects `device-descriptor` register maps to a concrete bus interface.
//!
//! A bus interface implements [`RegisterAccess`] once per register width it
//! can move; the [`RegisterReader`]/[`RegisterWriter`] blanket impls then
//! let call sites read `Reg::read(&mut iface)?` and `reg.write(&mut iface)?`
//! for any register of the map.

#![no_std]

use device_descriptor::{ReadOnlyRegister, Register};

pub trait RegisterAccess<RWT> {
    type Error;

    fn read_register<R>(&mut self) -> Result<R, Self::Error>
    where
        R: ReadOnlyRegister<RegisterWidth = RWT>;

    fn write_register<R>(&mut self, reg: R) -> Result<(), Self::Error>
    where
        R: Register<RegisterWidth = RWT>;
}

pub trait RegisterReader<RWT>: Sized {
    fn read<E>(iface: &mut impl RegisterAccess<RWT, Error = E>) -> Result<Self, E>;
}

pub trait RegisterWriter<RWT> {
    fn write<E>(self, iface: &mut impl RegisterAccess<RWT, Error = E>) -> Result<(), E>;
}

impl<T> RegisterReader<T::RegisterWidth> for T
where
    T: ReadOnlyRegister,
{
    fn read<E>(iface: &mut impl RegisterAccess<T::RegisterWidth, Error = E>) -> Result<Self, E> {
        iface.read_register()
    }
}

impl<T> RegisterWriter<T::RegisterWidth> for T
where
    T: Register,
{
    fn write<E>(self, iface: &mut impl RegisterAccess<T::RegisterWidth, Error = E>) -> Result<(), E> {
        iface.write_register(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use device_descriptor::{device, Proxy};

    device! {
        Scratch(u16 @ 0x10, default = 0x0000) {
            value @ 0..16 => u16
        }
    }

    /// Register backend holding a single stored value.
    #[derive(Default)]
    struct Mem {
        stored: u16,
    }

    impl RegisterAccess<u16> for Mem {
        type Error = ();

        fn read_register<R>(&mut self) -> Result<R, Self::Error>
        where
            R: ReadOnlyRegister<RegisterWidth = u16>,
        {
            Ok(R::from_bits(self.stored))
        }

        fn write_register<R>(&mut self, reg: R) -> Result<(), Self::Error>
        where
            R: Register<RegisterWidth = u16>,
        {
            self.stored = reg.bits();
            Ok(())
        }
    }

    #[test]
    fn reader_writer_roundtrip() {
        let mut mem = Mem::default();

        Scratch::new(|w| w.value().write(0xBEEF)).write(&mut mem).unwrap();
        let reg = Scratch::read(&mut mem).unwrap();

        assert_eq!(reg.bits(), 0xBEEF);
    }
}
