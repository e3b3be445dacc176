//! PMBus register map of the INA233.
//!
//! Commands are 8-bit codes; data-carrying registers transfer one or two
//! bytes, multi-byte values little-endian. Telemetry registers hold signed
//! two's-complement samples scaled by the calibration LSBs.

use device_descriptor::device;

device! {
    /// PMBus capability advertisement.
    Capability(u8 @ 0x19) {
        /// Packet error checking support.
        pec @ 7 => Support {
            Supported = 1,
            NotSupported = 0
        },
        /// Maximum supported bus speed.
        bus_speed @ 5..7 => BusSpeed {
            _100kHz = 0,
            _400kHz = 1
        },
        /// SMBALERT# pin support.
        smbalert @ 4 => Support
    }

    /// Overcurrent warning threshold, in current LSB counts.
    IoutOcWarnLimit(u16 @ 0x4A, default = 0x7FF8) {
        current @ 0..16 => u16
    }
    /// Bus overvoltage warning threshold, in bus voltage LSB counts.
    VinOvWarnLimit(u16 @ 0x57, default = 0x7FF8) {
        voltage @ 0..16 => u16
    }
    /// Bus undervoltage warning threshold, in bus voltage LSB counts.
    VinUvWarnLimit(u16 @ 0x58, default = 0x0000) {
        voltage @ 0..16 => u16
    }
    /// Input overpower warning threshold, in power LSB counts.
    PinOpWarnLimit(u16 @ 0x6B, default = 0x7FF8) {
        power @ 0..16 => u16
    }

    /// Summary status flags. Flags latch until CLEAR_FAULTS.
    StatusByte(u8 @ 0x78) {
        busy @ 7 => Flag {
            Raised = 1,
            Clear = 0
        },
        off @ 6 => Flag,
        vout_ov @ 5 => Flag,
        iout_oc @ 4 => Flag,
        vin_uv @ 3 => Flag,
        temperature @ 2 => Flag,
        cml @ 1 => Flag,
        none_of_the_above @ 0 => Flag
    }
    /// Two-byte status; the low byte mirrors STATUS_BYTE, the high byte
    /// points at the group status registers with more detail.
    StatusWord(u16 @ 0x79) {
        vout @ 15 => Flag,
        iout @ 14 => Flag,
        input @ 13 => Flag,
        mfr_specific @ 12 => Flag,
        power_not_good @ 11 => Flag,
        busy @ 7 => Flag,
        off @ 6 => Flag,
        vout_ov @ 5 => Flag,
        iout_oc @ 4 => Flag,
        vin_uv @ 3 => Flag,
        temperature @ 2 => Flag,
        cml @ 1 => Flag,
        none_of_the_above @ 0 => Flag
    }
    /// Output current status group.
    StatusIout(u8 @ 0x7B) {
        oc_fault @ 7 => Flag,
        oc_warning @ 5 => Flag
    }
    /// Input voltage/current/power status group.
    StatusInput(u8 @ 0x7C) {
        ov_fault @ 7 => Flag,
        ov_warning @ 6 => Flag,
        uv_warning @ 5 => Flag,
        in_oc_warning @ 1 => Flag,
        pin_op_warning @ 0 => Flag
    }
    /// Communication fault status group.
    StatusCml(u8 @ 0x7E) {
        invalid_command @ 7 => Flag,
        invalid_data @ 6 => Flag,
        other_fault @ 1 => Flag
    }
    /// Manufacturer alert flags; masked by MFR_ALERT_MASK.
    StatusMfrSpecific(u8 @ 0x80) {}

    /// Bus voltage sample, 1.25 mV/bit.
    ReadVin(u16 @ 0x88) {
        voltage @ 0..16 => u16
    }
    /// Input current sample, scaled by the current LSB.
    ReadIin(u16 @ 0x89) {
        current @ 0..16 => u16
    }
    /// Output-side bus voltage; mirrors READ_VIN on this device, which has a
    /// single voltage ADC.
    ReadVout(u16 @ 0x8B) {
        voltage @ 0..16 => u16
    }
    /// Output-side current; mirrors READ_IIN on this device.
    ReadIout(u16 @ 0x8C) {
        current @ 0..16 => u16
    }
    /// Output-side power; mirrors READ_PIN on this device.
    ReadPout(u16 @ 0x96) {
        power @ 0..16 => u16
    }
    /// Input power sample, scaled by the power LSB.
    ReadPin(u16 @ 0x97) {
        power @ 0..16 => u16
    }

    /// ADC conversion control. The upper four bits are fixed by the device;
    /// writes go through the writer proxy so they stay untouched.
    MfrAdcConfig(u16 @ 0xD0, default = 0x4127) {
        /// Number of samples averaged into every reported value.
        avg @ 9..12 => AverageCount {
            _1 = 0,
            _4 = 1,
            _16 = 2,
            _64 = 3,
            _128 = 4,
            _256 = 5,
            _512 = 6,
            _1024 = 7
        },
        /// Bus voltage conversion time.
        vbusct @ 6..9 => ConversionTime {
            _140us = 0,
            _204us = 1,
            _332us = 2,
            _588us = 3,
            _1_1ms = 4,
            _2_116ms = 5,
            _4_156ms = 6,
            _8_244ms = 7
        },
        /// Shunt voltage conversion time.
        vshct @ 3..6 => ConversionTime,
        /// Conversion trigger and channel selection.
        mode @ 0..3 => OperatingMode {
            PowerDown = 0,
            ShuntVoltageTriggered = 1,
            BusVoltageTriggered = 2,
            ShuntAndBusTriggered = 3,
            /// Secondary encoding of power-down.
            PowerDown2 = 4,
            ShuntVoltageContinuous = 5,
            BusVoltageContinuous = 6,
            ShuntAndBusContinuous = 7
        }
    }
    /// Shunt voltage sample, 2.5 uV/bit.
    MfrReadVshunt(u16 @ 0xD1) {
        voltage @ 0..16 => u16
    }
    /// Masks individual STATUS_MFR_SPECIFIC flags off the alert pin.
    MfrAlertMask(u8 @ 0xD2, default = 0x00) {}
    /// Current/power scaling written at configuration time. Bit 15 is
    /// reserved and must stay zero.
    MfrCalibration(u16 @ 0xD4, default = 0x0000) {
        value @ 0..15 => u16
    }
    /// Energy accumulation, alert latching and bus filtering controls.
    MfrDeviceConfig(u8 @ 0xD5, default = 0x02) {}

    /// Manufacturer id, ASCII "TI".
    TiMfrId(u16 @ 0xE0) {
        id @ 0..16 => u16
    }
    TiMfrModel(u16 @ 0xE1) {}
    TiMfrRevision(u16 @ 0xE2) {}
}

/// Send-byte commands: a command code with no data phase.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Command {
    /// Clears every latched fault and warning flag.
    ClearFaults = 0x03,
    /// Restores all registers to their power-on defaults.
    RestoreDefaultAll = 0x12,
    /// Resets the energy accumulator and its sample counter.
    ClearEin = 0xD6,
}

/// READ_EIN energy accumulator, a 6-byte block: power accumulator (16 bit),
/// accumulator rollover count (8 bit), sample count (24 bit).
pub const READ_EIN: u8 = 0x86;
/// Manufacturer id block, 2 bytes ASCII.
pub const MFR_ID: u8 = 0x99;
/// Device model block, 6 bytes ASCII.
pub const MFR_MODEL: u8 = 0x9A;
/// Die revision block, 2 bytes ASCII.
pub const MFR_REVISION: u8 = 0x9B;

/// Value of [`TiMfrId`] on a genuine device, ASCII "TI".
pub const TI_MANUFACTURER_ID: u16 = 0x5449;

#[cfg(test)]
mod test {
    use super::*;
    use device_descriptor::{Proxy, ReadOnlyRegister, Register};

    #[test]
    fn command_codes_match_the_pmbus_assignments() {
        assert_eq!(StatusWord::ADDRESS, 0x79);
        assert_eq!(ReadVin::ADDRESS, 0x88);
        assert_eq!(ReadIin::ADDRESS, 0x89);
        assert_eq!(ReadPin::ADDRESS, 0x97);
        assert_eq!(MfrReadVshunt::ADDRESS, 0xD1);
        assert_eq!(MfrCalibration::ADDRESS, 0xD4);
        assert_eq!(Command::ClearFaults as u8, 0x03);
        assert_eq!(Command::ClearEin as u8, 0xD6);
    }

    #[test]
    fn adc_config_default_decodes() {
        let config = MfrAdcConfig::default();

        assert_eq!(config.avg().read(), Some(AverageCount::_1));
        assert_eq!(config.vbusct().read(), Some(ConversionTime::_1_1ms));
        assert_eq!(config.vshct().read(), Some(ConversionTime::_1_1ms));
        assert_eq!(config.mode().read(), Some(OperatingMode::ShuntAndBusContinuous));
    }

    #[test]
    fn adc_config_modify_keeps_fixed_bits() {
        let config = MfrAdcConfig::default().modify(|w| w.avg().write(AverageCount::_16));

        assert_eq!(config.bits(), 0x4527);
    }

    #[test]
    fn power_down_mode_encodes() {
        let config = MfrAdcConfig::default().modify(|w| w.mode().write(OperatingMode::PowerDown));

        assert_eq!(config.bits(), 0x4120);
        assert_eq!(config.mode().read(), Some(OperatingMode::PowerDown));
    }

    #[test]
    fn calibration_value_spares_the_reserved_bit() {
        let cal = MfrCalibration::new(|w| w.value().write(0x7FFF));

        assert_eq!(cal.bits(), 0x7FFF);
    }

    #[test]
    fn status_flags_decode() {
        let status = StatusByte::from_bits(0x12);

        assert_eq!(status.iout_oc().read(), Some(Flag::Raised));
        assert_eq!(status.cml().read(), Some(Flag::Raised));
        assert_eq!(status.vin_uv().read(), Some(Flag::Clear));
    }
}
