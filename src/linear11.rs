//! PMBus Linear11 floating-point wire format.
//!
//! A Linear11 word packs a 5-bit signed exponent into bits [15:11] and an
//! 11-bit signed mantissa into bits [10:0]; the represented value is
//! `mantissa * 2^exponent`. PMBus hosts exchange thresholds and telemetry
//! in this format on devices that do not use direct-format coefficients.

use micromath::F32Ext;

/// Decodes a Linear11 word.
pub fn decode(raw: u16) -> f32 {
    let mut exponent = ((raw >> 11) & 0x1F) as i16;
    if exponent & 0x10 != 0 {
        // sign extend from bit 4
        exponent |= !0x1F;
    }

    let mut mantissa = (raw & 0x07FF) as i16;
    if mantissa & 0x0400 != 0 {
        // sign extend from bit 10
        mantissa |= !0x07FF;
    }

    f32::from(mantissa) * pow2(exponent)
}

/// Encodes a value as a Linear11 word.
///
/// The mantissa is truncated toward zero, so the result is accurate to one
/// mantissa unit and magnitudes below 1 collapse to zero. Exponents past
/// the 5-bit signed range are not clamped: values above `1023 * 2^15` wrap
/// silently and decode to something unrelated.
pub fn encode(value: f32) -> u16 {
    let mut exponent = 0i16;
    let mut mantissa = value;

    while mantissa.abs() > 1023.0 {
        mantissa /= 2.0;
        exponent += 1;
    }

    ((exponent as u16 & 0x1F) << 11) | (mantissa as i16 as u16 & 0x07FF)
}

/// Exact scale by a power of two, built from the f32 bit layout. The
/// Linear11 exponent range sits far inside the normal exponent range.
fn pow2(exponent: i16) -> f32 {
    f32::from_bits(((127 + i32::from(exponent)) as u32) << 23)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn zero_decodes_to_zero() {
        assert_eq!(decode(0x0000), 0.0);
    }

    #[test]
    fn negative_exponent_decodes() {
        // exponent -6, mantissa 1000
        assert_eq!(decode(0xD3E8), 15.625);
    }

    #[test]
    fn negative_mantissa_sign_extends() {
        // exponent 0, mantissa -1
        assert_eq!(decode(0x07FF), -1.0);
    }

    #[test]
    fn small_values_encode_exactly() {
        assert_eq!(decode(encode(0.0)), 0.0);
        assert_eq!(decode(encode(512.0)), 512.0);
        assert_eq!(decode(encode(-1000.0)), -1000.0);
    }

    #[test]
    fn large_values_round_trip_within_one_mantissa_unit() {
        for value in [2000.0_f32, 300_000.0, 1_000_000.0, -2_000_000.0] {
            let decoded = decode(encode(value));
            let exponent = (value.abs() / 1023.0).log2().ceil() as i32;
            let tolerance = (2.0_f32).powi(exponent);

            assert!(
                (decoded - value).abs() <= tolerance,
                "{value} decoded as {decoded}"
            );
        }
    }

    #[test]
    fn encoder_overflow_wraps_silently() {
        // 2^27 needs exponent 18, which wraps to -14 in the 5-bit field.
        let raw = encode(134_217_728.0);

        assert_eq!(raw >> 11, 18);
        assert_eq!(decode(raw), 512.0 * pow2(-14));
    }
}
