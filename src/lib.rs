//! Driver for the TI INA233 power monitor.
//!
//! The INA233 samples the voltage across an external shunt resistor and the
//! bus voltage, and reports current, power and accumulated energy through
//! PMBus-style commands over a two-wire bus. Raw samples are fixed-point
//! counts; the scale of the current and power counts is programmed into the
//! device through its calibration register.
//!
//! The driver is built around two states:
//!
//! * [`Ina233<I, Unconfigured>`] owns the bus and the derived
//!   [`Calibration`] constants but has performed no bus traffic.
//! * [`Ina233::begin`] probes the device, programs and verifies the
//!   calibration register, and returns the [`Ready`] driver that exposes
//!   telemetry. A failed `begin` hands the unconfigured driver back.
//!
//! Reading a device that was never configured is therefore a compile error
//! rather than a silent stream of zeros.

#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate logger;

use core::marker::PhantomData;

use embedded_hal::i2c::{ErrorType, I2c};

pub mod descriptors;
pub mod linear11;

mod interface;

pub use device_descriptor::{Proxy, Register};
pub use interface::Ina233Interface;
pub use register_access::{RegisterAccess, RegisterReader, RegisterWriter};

use descriptors::*;

/// Bus voltage scale, 1.25 mV/bit.
pub const BUS_VOLTAGE_LSB: f32 = 0.001_25;

/// Shunt voltage scale, 2.5 uV/bit.
pub const SHUNT_VOLTAGE_LSB: f32 = 0.000_002_5;

/// Fixed scaling term of the calibration equation.
const CALIBRATION_SCALE: f32 = 0.005_12;

/// Current full scale maps to 2^15 counts.
const CURRENT_LSB_COUNTS: f32 = 32768.0;

const I2C_ADDRESS_MIN: u8 = 0x08;
const I2C_ADDRESS_MAX: u8 = 0x77;

/// Connection of an address select pin.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressPin {
    Gnd = 0,
    Vs = 1,
    Sda = 2,
    Scl = 3,
}

/// Resolves the 7-bit bus address selected by the A0/A1 pin strapping.
///
/// Every strapping combination lands in the 0x40..=0x4F window.
pub const fn device_address(a0: AddressPin, a1: AddressPin) -> u8 {
    0x40 | ((a1 as u8) << 2) | a0 as u8
}

/// Rejected construction-time configuration.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Shunt resistance must be finite and greater than zero.
    ShuntResistance,
    /// Maximum expected current must be finite and greater than zero.
    MaxCurrent,
    /// The calibration value does not fit the 15-bit register field.
    CalibrationOverflow,
    /// Bus address outside the legal 7-bit window (0x08..=0x77).
    Address,
}

/// Failure talking to the device.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<I>
where
    I: ErrorType,
{
    /// The bus transaction failed.
    Transfer(I::Error),
    /// The device did not identify as an INA233.
    DeviceMismatch,
    /// The calibration readback did not match the programmed value.
    Verify,
    /// A block read advertised an unexpected byte count.
    BlockLength,
}

/// Scale factors derived from the shunt resistor and the maximum expected
/// current. Fixed for the lifetime of a device instance; recreate the
/// driver to change them.
#[derive(Clone, Copy, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    current_lsb: f32,
    power_lsb: f32,
    register_value: u16,
}

impl Calibration {
    /// Derives the calibration constants.
    ///
    /// `shunt_resistance` is in ohms, `max_current` in amperes. The register
    /// value is rounded half-up and must fit the 15-bit calibration field;
    /// degenerate inputs are rejected here so they can never reach the
    /// device.
    ///
    /// ```rust
    /// # use ina233::Calibration;
    /// let cal = Calibration::from_shunt(0.01, 10.0).unwrap();
    ///
    /// assert_eq!(cal.register_value(), 1678);
    /// assert!((cal.current_lsb() - 0.000_305_18).abs() < 1e-8);
    /// assert!((cal.power_lsb() - 0.007_629_4).abs() < 1e-7);
    /// ```
    pub fn from_shunt(shunt_resistance: f32, max_current: f32) -> Result<Self, ConfigError> {
        if !shunt_resistance.is_finite() || shunt_resistance <= 0.0 {
            return Err(ConfigError::ShuntResistance);
        }
        if !max_current.is_finite() || max_current <= 0.0 {
            return Err(ConfigError::MaxCurrent);
        }

        let current_lsb = max_current / CURRENT_LSB_COUNTS;

        // Round half-up; the operand is strictly positive here.
        let register_value = CALIBRATION_SCALE / (current_lsb * shunt_resistance) + 0.5;
        if !(register_value >= 1.0 && register_value < 32768.0) {
            return Err(ConfigError::CalibrationOverflow);
        }

        Ok(Self {
            current_lsb,
            power_lsb: current_lsb * 25.0,
            register_value: register_value as u16,
        })
    }

    /// The value programmed into the calibration register.
    pub fn register_value(&self) -> u16 {
        self.register_value
    }

    /// Amperes represented by one current count.
    pub fn current_lsb(&self) -> f32 {
        self.current_lsb
    }

    /// Watts represented by one power count.
    pub fn power_lsb(&self) -> f32 {
        self.power_lsb
    }

    /// Converts a raw bus voltage sample to volts.
    pub fn bus_voltage(&self, raw: i16) -> f32 {
        f32::from(raw) * BUS_VOLTAGE_LSB
    }

    /// Converts a raw shunt voltage sample to volts.
    pub fn shunt_voltage(&self, raw: i16) -> f32 {
        f32::from(raw) * SHUNT_VOLTAGE_LSB
    }

    /// Converts a raw current sample to amperes.
    pub fn current(&self, raw: i16) -> f32 {
        f32::from(raw) * self.current_lsb
    }

    /// Converts a raw power sample to watts.
    pub fn power(&self, raw: i16) -> f32 {
        f32::from(raw) * self.power_lsb
    }

    /// Average power over an accumulator snapshot, in watts.
    ///
    /// Returns 0.0 for a snapshot with no samples.
    pub fn average_power(&self, energy: &EnergyAccumulator) -> f32 {
        if energy.sample_count == 0 {
            return 0.0;
        }

        let total = u32::from(energy.rollover_count) * 65536 + u32::from(energy.accumulator);

        total as f32 * self.power_lsb / energy.sample_count as f32
    }
}

/// Snapshot of the READ_EIN energy accumulator.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EnergyAccumulator {
    /// Running sum of power samples, in power LSB counts.
    pub accumulator: u16,
    /// Number of times the accumulator wrapped since the last clear.
    pub rollover_count: u8,
    /// Number of samples taken since the last clear.
    pub sample_count: u32,
}

/// Type state of a driver that has not configured its device yet.
pub struct Unconfigured;

/// Type state of a driver whose calibration is programmed and verified.
pub struct Ready;

/// A single INA233 behind an owned two-wire bus handle.
///
/// The bus is owned, not global: sharing one physical bus between devices
/// is the bus layer's job (`embedded-hal-bus` and friends), and every
/// accessor here is one self-contained bus transaction.
pub struct Ina233<I, State = Unconfigured> {
    interface: Ina233Interface<I>,
    calibration: Calibration,
    state: PhantomData<State>,
}

impl<I, State> Ina233<I, State> {
    /// The resolved 7-bit bus address.
    pub fn address(&self) -> u8 {
        self.interface.address()
    }

    /// The calibration constants of this instance.
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Direct access to the register interface, for map entries without a
    /// dedicated accessor.
    pub fn interface_mut(&mut self) -> &mut Ina233Interface<I> {
        &mut self.interface
    }

    /// Releases the bus handle, consuming the driver.
    pub fn release(self) -> I {
        self.interface.release()
    }
}

impl<I> Ina233<I, Unconfigured> {
    /// Creates an unconfigured driver with an explicitly supplied address.
    pub fn new(i2c: I, address: u8, calibration: Calibration) -> Result<Self, ConfigError> {
        if !(I2C_ADDRESS_MIN..=I2C_ADDRESS_MAX).contains(&address) {
            return Err(ConfigError::Address);
        }

        Ok(Self::with_interface(
            Ina233Interface::new(i2c, address),
            calibration,
        ))
    }

    /// Creates an unconfigured driver from the A0/A1 pin strapping.
    pub fn with_address_pins(
        i2c: I,
        a0: AddressPin,
        a1: AddressPin,
        calibration: Calibration,
    ) -> Self {
        Self::with_interface(
            Ina233Interface::new(i2c, device_address(a0, a1)),
            calibration,
        )
    }

    const fn with_interface(interface: Ina233Interface<I>, calibration: Calibration) -> Self {
        Self {
            interface,
            calibration,
            state: PhantomData,
        }
    }
}

impl<I> Ina233<I, Unconfigured>
where
    I: I2c,
{
    /// Probes the device, then programs and verifies the calibration
    /// register.
    ///
    /// On failure the untouched driver is handed back along with the error;
    /// a partially configured instance never exists. No retries are
    /// attempted.
    pub fn begin(mut self) -> Result<Ina233<I, Ready>, (Error<I>, Self)> {
        match self.configure() {
            Ok(()) => Ok(Ina233 {
                interface: self.interface,
                calibration: self.calibration,
                state: PhantomData,
            }),
            Err(e) => Err((e, self)),
        }
    }

    fn configure(&mut self) -> Result<(), Error<I>> {
        let id = TiMfrId::read(&mut self.interface).map_err(Error::Transfer)?;
        if id.bits() != TI_MANUFACTURER_ID {
            warn!("Unexpected manufacturer id {:#x}", id.bits());
            return Err(Error::DeviceMismatch);
        }

        let value = self.calibration.register_value();
        let programmed = MfrCalibration::new(|w| w.value().write(value));
        programmed.write(&mut self.interface).map_err(Error::Transfer)?;

        let readback = MfrCalibration::read(&mut self.interface).map_err(Error::Transfer)?;
        if readback.bits() != programmed.bits() {
            warn!(
                "Calibration readback mismatch: {} != {}",
                readback.bits(),
                programmed.bits()
            );
            return Err(Error::Verify);
        }

        info!("INA233 at {:#x} calibrated, CAL = {}", self.address(), value);

        Ok(())
    }
}

impl<I> Ina233<I, Ready>
where
    I: I2c,
{
    /// Raw bus voltage sample (READ_VIN).
    pub fn bus_voltage_raw(&mut self) -> Result<i16, I::Error> {
        Ok(ReadVin::read(&mut self.interface)?.bits() as i16)
    }

    /// Raw shunt voltage sample (MFR_READ_VSHUNT).
    pub fn shunt_voltage_raw(&mut self) -> Result<i16, I::Error> {
        Ok(MfrReadVshunt::read(&mut self.interface)?.bits() as i16)
    }

    /// Raw input current sample (READ_IIN).
    pub fn current_raw(&mut self) -> Result<i16, I::Error> {
        Ok(ReadIin::read(&mut self.interface)?.bits() as i16)
    }

    /// Raw input power sample (READ_PIN).
    pub fn power_raw(&mut self) -> Result<i16, I::Error> {
        Ok(ReadPin::read(&mut self.interface)?.bits() as i16)
    }

    /// Bus voltage in volts.
    pub fn bus_voltage(&mut self) -> Result<f32, I::Error> {
        let raw = self.bus_voltage_raw()?;
        Ok(self.calibration.bus_voltage(raw))
    }

    /// Shunt voltage in volts.
    pub fn shunt_voltage(&mut self) -> Result<f32, I::Error> {
        let raw = self.shunt_voltage_raw()?;
        Ok(self.calibration.shunt_voltage(raw))
    }

    /// Input current in amperes.
    pub fn current(&mut self) -> Result<f32, I::Error> {
        let raw = self.current_raw()?;
        Ok(self.calibration.current(raw))
    }

    /// Input power in watts.
    pub fn power(&mut self) -> Result<f32, I::Error> {
        let raw = self.power_raw()?;
        Ok(self.calibration.power(raw))
    }

    /// Reads the ADC conversion configuration.
    pub fn adc_config(&mut self) -> Result<MfrAdcConfig, I::Error> {
        MfrAdcConfig::read(&mut self.interface)
    }

    /// Writes the ADC conversion configuration.
    ///
    /// ```rust,no_run
    /// # use embedded_hal::i2c::I2c;
    /// # fn demo<I: I2c>(mut ina: ina233::Ina233<I, ina233::Ready>) -> Result<(), I::Error> {
    /// use ina233::{descriptors::AverageCount, Register};
    ///
    /// let config = ina.adc_config()?.modify(|w| w.avg().write(AverageCount::_64));
    /// ina.set_adc_config(config)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn set_adc_config(&mut self, config: MfrAdcConfig) -> Result<(), I::Error> {
        config.write(&mut self.interface)
    }

    /// Summary status flags.
    pub fn status_byte(&mut self) -> Result<StatusByte, I::Error> {
        StatusByte::read(&mut self.interface)
    }

    /// Full status word.
    pub fn status_word(&mut self) -> Result<StatusWord, I::Error> {
        StatusWord::read(&mut self.interface)
    }

    /// Output current status group.
    pub fn status_iout(&mut self) -> Result<StatusIout, I::Error> {
        StatusIout::read(&mut self.interface)
    }

    /// Input status group.
    pub fn status_input(&mut self) -> Result<StatusInput, I::Error> {
        StatusInput::read(&mut self.interface)
    }

    /// Communication fault status group.
    pub fn status_cml(&mut self) -> Result<StatusCml, I::Error> {
        StatusCml::read(&mut self.interface)
    }

    /// Manufacturer alert flags.
    pub fn status_mfr_specific(&mut self) -> Result<StatusMfrSpecific, I::Error> {
        StatusMfrSpecific::read(&mut self.interface)
    }

    /// Clears every latched fault and warning flag.
    pub fn clear_faults(&mut self) -> Result<(), I::Error> {
        self.interface.send_command(Command::ClearFaults)
    }

    /// Overcurrent warning threshold in amperes.
    pub fn current_warn_limit(&mut self) -> Result<f32, I::Error> {
        let reg = IoutOcWarnLimit::read(&mut self.interface)?;
        Ok(self.calibration.current(reg.bits() as i16))
    }

    /// Sets the overcurrent warning threshold, in amperes.
    pub fn set_current_warn_limit(&mut self, amps: f32) -> Result<(), I::Error> {
        let raw = direct_counts(amps, self.calibration.current_lsb());
        IoutOcWarnLimit::new(|w| w.current().write(raw)).write(&mut self.interface)
    }

    /// Bus overvoltage warning threshold in volts.
    pub fn bus_overvoltage_warn_limit(&mut self) -> Result<f32, I::Error> {
        let reg = VinOvWarnLimit::read(&mut self.interface)?;
        Ok(self.calibration.bus_voltage(reg.bits() as i16))
    }

    /// Sets the bus overvoltage warning threshold, in volts.
    pub fn set_bus_overvoltage_warn_limit(&mut self, volts: f32) -> Result<(), I::Error> {
        let raw = direct_counts(volts, BUS_VOLTAGE_LSB);
        VinOvWarnLimit::new(|w| w.voltage().write(raw)).write(&mut self.interface)
    }

    /// Bus undervoltage warning threshold in volts.
    pub fn bus_undervoltage_warn_limit(&mut self) -> Result<f32, I::Error> {
        let reg = VinUvWarnLimit::read(&mut self.interface)?;
        Ok(self.calibration.bus_voltage(reg.bits() as i16))
    }

    /// Sets the bus undervoltage warning threshold, in volts.
    pub fn set_bus_undervoltage_warn_limit(&mut self, volts: f32) -> Result<(), I::Error> {
        let raw = direct_counts(volts, BUS_VOLTAGE_LSB);
        VinUvWarnLimit::new(|w| w.voltage().write(raw)).write(&mut self.interface)
    }

    /// Overpower warning threshold in watts.
    pub fn power_warn_limit(&mut self) -> Result<f32, I::Error> {
        let reg = PinOpWarnLimit::read(&mut self.interface)?;
        Ok(self.calibration.power(reg.bits() as i16))
    }

    /// Sets the overpower warning threshold, in watts.
    pub fn set_power_warn_limit(&mut self, watts: f32) -> Result<(), I::Error> {
        let raw = direct_counts(watts, self.calibration.power_lsb());
        PinOpWarnLimit::new(|w| w.power().write(raw)).write(&mut self.interface)
    }

    /// Snapshot of the energy accumulator (READ_EIN).
    pub fn read_energy(&mut self) -> Result<EnergyAccumulator, Error<I>> {
        let mut payload = [0; 6];
        self.interface.read_block(READ_EIN, &mut payload)?;

        Ok(EnergyAccumulator {
            accumulator: u16::from_le_bytes([payload[0], payload[1]]),
            rollover_count: payload[2],
            sample_count: u32::from_le_bytes([payload[3], payload[4], payload[5], 0]),
        })
    }

    /// Resets the energy accumulator and its sample counter.
    pub fn clear_energy(&mut self) -> Result<(), I::Error> {
        self.interface.send_command(Command::ClearEin)
    }

    /// PMBus manufacturer id block, ASCII ("TI").
    pub fn manufacturer_id(&mut self) -> Result<[u8; 2], Error<I>> {
        let mut id = [0; 2];
        self.interface.read_block(MFR_ID, &mut id)?;
        Ok(id)
    }

    /// PMBus model block, ASCII ("INA233").
    pub fn model(&mut self) -> Result<[u8; 6], Error<I>> {
        let mut model = [0; 6];
        self.interface.read_block(MFR_MODEL, &mut model)?;
        Ok(model)
    }

    /// PMBus die revision block, ASCII.
    pub fn revision(&mut self) -> Result<[u8; 2], Error<I>> {
        let mut revision = [0; 2];
        self.interface.read_block(MFR_REVISION, &mut revision)?;
        Ok(revision)
    }

    /// Restores the device's power-on defaults.
    ///
    /// The calibration register reverts with everything else, so the driver
    /// drops back to [`Unconfigured`] and must run [`Ina233::begin`] again
    /// before telemetry can be read.
    pub fn restore_defaults(mut self) -> Result<Ina233<I, Unconfigured>, (Error<I>, Self)> {
        info!("Restoring power-on defaults");

        match self.interface.send_command(Command::RestoreDefaultAll) {
            Ok(()) => Ok(Ina233 {
                interface: self.interface,
                calibration: self.calibration,
                state: PhantomData,
            }),
            Err(e) => Err((Error::Transfer(e), self)),
        }
    }
}

/// Physical value to direct-format register counts, rounded half-up.
/// Thresholds are non-negative; the saturating cast covers stray input.
fn direct_counts(value: f32, lsb: f32) -> u16 {
    (value / lsb + 0.5) as u16
}
