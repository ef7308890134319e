//! Big-endian, zero-stripped numeric conversions.
//!
//! RTL never emits leading zero bytes: the magnitude of an integer, the bit
//! pattern of a float, and the count of a multi-header are all written with
//! their most significant zero bytes removed. Zero itself never reaches the
//! wire as a payload; it encodes as an inline byte or the `Zero` sentinel.

use crate::error::{Result, RtlError};

/// Number of bytes needed for the stripped big-endian form of `i`.
/// Zero still occupies one byte when explicitly written.
pub const fn uint_len(i: u64) -> usize {
    if i == 0 {
        1
    } else {
        8 - (i.leading_zeros() / 8) as usize
    }
}

/// Writes the stripped big-endian form of `i` into the front of `buf`,
/// returning the byte count. Fails with `InsufficientLength` when `buf` is
/// too small.
pub fn write_uint(buf: &mut [u8], i: u64) -> Result<usize> {
    let n = uint_len(i);
    if buf.len() < n {
        return Err(RtlError::InsufficientLength);
    }
    let be = i.to_be_bytes();
    buf[..n].copy_from_slice(&be[8 - n..]);
    Ok(n)
}

/// Stripped big-endian magnitude of `i`; empty for zero.
pub fn uint_to_bytes(i: u64) -> Vec<u8> {
    if i == 0 {
        return Vec::new();
    }
    let n = uint_len(i);
    i.to_be_bytes()[8 - n..].to_vec()
}

/// Sign and stripped magnitude of `i`. `i64::MIN` is handled by its
/// unsigned-absolute reinterpretation.
pub fn int_to_bytes(i: i64) -> (bool, Vec<u8>) {
    (i < 0, uint_to_bytes(i.unsigned_abs()))
}

/// Sign flag and stripped magnitude of the IEEE-754 bit pattern of `f`.
pub fn float32_to_bytes(f: f32) -> (bool, Vec<u8>) {
    let negative = f < 0.0;
    let f = if negative { -f } else { f };
    (negative, uint_to_bytes(u64::from(f.to_bits())))
}

/// Sign flag and stripped magnitude of the IEEE-754 bit pattern of `f`.
pub fn float64_to_bytes(f: f64) -> (bool, Vec<u8>) {
    let negative = f < 0.0;
    let f = if negative { -f } else { f };
    (negative, uint_to_bytes(f.to_bits()))
}

/// Folds the last `width` bytes of `b` into an unsigned big-endian integer.
pub fn bytes_to_uint(b: &[u8], width: usize) -> u64 {
    let start = b.len().saturating_sub(width);
    b[start..].iter().fold(0u64, |acc, &x| (acc << 8) | u64::from(x))
}

pub fn bytes_to_u64(b: &[u8]) -> u64 {
    bytes_to_uint(b, 8)
}

/// Unsigned readback that rejects payloads wider than eight bytes.
pub fn bytes_to_u64_checked(b: &[u8]) -> Result<u64> {
    if b.len() > 8 {
        return Err(RtlError::NumericOverflow("u64"));
    }
    Ok(bytes_to_uint(b, 8))
}

/// Signed readback: magnitude as unsigned, then conditionally negated.
/// Wraps like the wire demands: a negative magnitude of `1 << 63` yields
/// `i64::MIN`.
pub fn bytes_to_i64(b: &[u8], negative: bool) -> i64 {
    let r = bytes_to_uint(b, 8) as i64;
    if negative && r > 0 {
        -r
    } else {
        r
    }
}

/// Signed readback with overflow detection for both directions.
pub fn bytes_to_i64_checked(b: &[u8], negative: bool) -> Result<i64> {
    let mag = bytes_to_u64_checked(b).map_err(|_| RtlError::NumericOverflow("i64"))?;
    if negative {
        if mag > (1u64 << 63) {
            return Err(RtlError::NumericOverflow("i64"));
        }
        Ok((mag as i64).wrapping_neg())
    } else {
        if mag > i64::MAX as u64 {
            return Err(RtlError::NumericOverflow("i64"));
        }
        Ok(mag as i64)
    }
}

/// Reinterprets the payload as an IEEE-754 single, applying the sign flag.
pub fn bytes_to_f32(b: &[u8], negative: bool) -> f32 {
    let r = f32::from_bits(bytes_to_uint(b, 4) as u32);
    if negative && r > 0.0 {
        -r
    } else {
        r
    }
}

/// Reinterprets the payload as an IEEE-754 double, applying the sign flag.
pub fn bytes_to_f64(b: &[u8], negative: bool) -> f64 {
    let r = f64::from_bits(bytes_to_uint(b, 8));
    if negative && r > 0.0 {
        -r
    } else {
        r
    }
}

/// Float readback with width inferred from the payload: four bytes decode as
/// a single, anything else as a double.
pub fn bytes_to_float(b: &[u8], negative: bool) -> Result<f64> {
    if b.len() > 8 {
        return Err(RtlError::NumericOverflow("f64"));
    }
    if b.len() == 4 {
        Ok(f64::from(bytes_to_f32(b, negative)))
    } else {
        Ok(bytes_to_f64(b, negative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stripping() {
        assert!(uint_to_bytes(0).is_empty());
        assert_eq!(uint_to_bytes(1), vec![0x01]);
        assert_eq!(uint_to_bytes(0x7F), vec![0x7F]);
        assert_eq!(uint_to_bytes(0x80), vec![0x80]);
        assert_eq!(uint_to_bytes(0x100), vec![0x01, 0x00]);
        assert_eq!(uint_to_bytes(142_857), vec![0x02, 0x2E, 0xC9]);
        assert_eq!(uint_to_bytes(u64::MAX).len(), 8);
    }

    #[test]
    fn write_uint_bounds() {
        let mut buf = [0u8; 2];
        assert_eq!(write_uint(&mut buf, 0x0102).unwrap(), 2);
        assert_eq!(buf, [0x01, 0x02]);
        assert!(matches!(
            write_uint(&mut buf, 0x010203),
            Err(RtlError::InsufficientLength)
        ));
        let mut one = [0u8; 1];
        assert_eq!(write_uint(&mut one, 0).unwrap(), 1);
        assert_eq!(one, [0x00]);
    }

    #[test]
    fn signed_magnitudes() {
        assert_eq!(int_to_bytes(0), (false, vec![]));
        assert_eq!(int_to_bytes(-1), (true, vec![0x01]));
        assert_eq!(int_to_bytes(i64::MIN), (true, vec![0x80, 0, 0, 0, 0, 0, 0, 0]));
        assert_eq!(bytes_to_i64(&[0x80, 0, 0, 0, 0, 0, 0, 0], true), i64::MIN);
        assert_eq!(bytes_to_i64_checked(&[0x80, 0, 0, 0, 0, 0, 0, 0], true).unwrap(), i64::MIN);
        assert!(bytes_to_i64_checked(&[0x80, 0, 0, 0, 0, 0, 0, 0], false).is_err());
        assert!(bytes_to_i64_checked(&[0x80, 0, 0, 0, 0, 0, 0, 1], true).is_err());
    }

    #[test]
    fn uint_fold_uses_last_width_bytes() {
        assert_eq!(bytes_to_uint(&[0x01, 0x02, 0x03], 2), 0x0203);
        assert_eq!(bytes_to_uint(&[0x01, 0x02, 0x03], 8), 0x010203);
        assert_eq!(bytes_to_uint(&[], 8), 0);
    }

    #[test]
    fn float_roundtrip() {
        for f in [0.5f32, 111.3, 1.0, f32::MAX] {
            let (neg, b) = float32_to_bytes(f);
            assert!(!neg);
            assert_eq!(bytes_to_float(&b, neg).unwrap() as f32, f);
        }
        for f in [-34343434.333f64, 2.0, -0.25, f64::MAX] {
            let (neg, b) = float64_to_bytes(f);
            assert_eq!(neg, f < 0.0);
            assert_eq!(bytes_to_float(&b, neg).unwrap(), f);
        }
    }

    #[test]
    fn float_width_inference() {
        // A four-byte payload is always read back as an f32 pattern.
        let (neg, b) = float32_to_bytes(0.5);
        assert_eq!(b.len(), 4);
        assert_eq!(bytes_to_float(&b, neg).unwrap(), 0.5);
        // Full eight bytes are an f64 pattern.
        let (neg, b) = float64_to_bytes(1.5);
        assert_eq!(b.len(), 8);
        assert_eq!(bytes_to_float(&b, neg).unwrap(), 1.5);
    }
}
