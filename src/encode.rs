//! The recursive value-directed writer engine: host values → RTL bytes.
//!
//! Encoding dispatches on the value's shape through [`Encodable`] impls.
//! Dispatch priority is fixed at the type level: a type wired through the
//! user [`Serialization`](crate::hooks::Serialization) hook owns its framing
//! entirely; the prior types (`Integer`, `Rational`, [`BigFloat`],
//! [`Timestamp`]) carry their specialized forms; everything else encodes
//! structurally.
//!
//! [`BigFloat`]: crate::priors::BigFloat
//! [`Timestamp`]: crate::priors::Timestamp

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::io::Write;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, RtlError};
use crate::header::{self, EMPTY_BYTE, MAX_HEADER_BYTES, TRUE_BYTE, ZERO_BYTE};
use crate::numeric;
use crate::record::{self, Record};
use crate::MAX_NESTED;

/// A value that can be written as RTL bytes.
///
/// `write_value` returns the number of bytes written. `is_zero` reports
/// whether the value is its type's zero form; record encoding uses it to
/// prune trailing zero-valued fields of newer versions.
pub trait Encodable {
    fn write_value(&self, w: &mut dyn Write, nesting: usize) -> Result<usize>;
    fn is_zero(&self) -> bool;
}

/// Encodes `value` into `w`, returning the number of bytes written.
pub fn encode<T: Encodable + ?Sized>(value: &T, w: &mut dyn Write) -> Result<usize> {
    value.write_value(w, 0)
}

/// Encodes `value` into a freshly allocated buffer.
pub fn marshal<T: Encodable + ?Sized>(value: &T) -> Result<Bytes> {
    let mut w = BytesMut::new().writer();
    value.write_value(&mut w, 0)?;
    Ok(w.into_inner().freeze())
}

fn put(w: &mut dyn Write, bytes: &[u8]) -> Result<usize> {
    w.write_all(bytes)?;
    Ok(bytes.len())
}

/// Writes a small-number form: values 0–127 with a positive sign are the
/// inline byte itself; everything else is a numeric header plus the stripped
/// big-endian magnitude.
pub(crate) fn write_small_number(
    w: &mut dyn Write,
    negative: bool,
    magnitude: u64,
) -> Result<usize> {
    if !negative && magnitude <= 127 {
        return put(w, &[magnitude as u8]);
    }
    let mut buf = [0u8; MAX_HEADER_BYTES];
    let l = numeric::write_uint(&mut buf[1..], magnitude)?;
    header::numeric_header(negative, l, &mut buf)?;
    put(w, &buf[..l + 1])
}

/// Writes a numeric frame around an arbitrary-width magnitude (or opaque
/// blob): numeric header for `bytes.len()` followed by the bytes.
pub(crate) fn write_number_frame(
    w: &mut dyn Write,
    negative: bool,
    bytes: &[u8],
) -> Result<usize> {
    if bytes.is_empty() {
        return put(w, &[ZERO_BYTE]);
    }
    let mut hdr = [0u8; MAX_HEADER_BYTES];
    let hl = header::numeric_header(negative, bytes.len(), &mut hdr)?;
    Ok(put(w, &hdr[..hl])? + put(w, bytes)?)
}

/// Writes a byte sequence in string form: empty → `Empty`, a single byte
/// ≤ 127 → the byte itself, otherwise string header plus payload.
pub fn write_byte_sequence(w: &mut dyn Write, bytes: &[u8]) -> Result<usize> {
    if bytes.is_empty() {
        return put(w, &[EMPTY_BYTE]);
    }
    if bytes.len() == 1 && bytes[0] <= 127 {
        return put(w, &bytes[..1]);
    }
    let mut hdr = [0u8; MAX_HEADER_BYTES];
    let hl = header::string_header(bytes.len(), &mut hdr)?;
    Ok(put(w, &hdr[..hl])? + put(w, bytes)?)
}

pub(crate) fn write_str(w: &mut dyn Write, s: &str) -> Result<usize> {
    if s.is_empty() {
        return put(w, &[ZERO_BYTE]);
    }
    write_byte_sequence(w, s.as_bytes())
}

fn write_seq<T: Encodable>(
    w: &mut dyn Write,
    items: &[T],
    fixed: bool,
    nesting: usize,
) -> Result<usize> {
    if items.is_empty() {
        return put(w, &[if fixed { ZERO_BYTE } else { EMPTY_BYTE }]);
    }
    if nesting >= MAX_NESTED {
        return Err(RtlError::NestingOverflow);
    }
    let mut hdr = [0u8; MAX_HEADER_BYTES];
    let hl = header::array_header(items.len(), &mut hdr)?;
    let mut n = put(w, &hdr[..hl])?;
    for item in items {
        n += item.write_value(w, nesting + 1)?;
    }
    Ok(n)
}

fn write_map_entries<'a, K, V, I>(w: &mut dyn Write, len: usize, entries: I, nesting: usize) -> Result<usize>
where
    K: Encodable + 'a,
    V: Encodable + 'a,
    I: Iterator<Item = (&'a K, &'a V)>,
{
    if len == 0 {
        return put(w, &[EMPTY_BYTE]);
    }
    if nesting >= MAX_NESTED {
        return Err(RtlError::NestingOverflow);
    }
    let mut hdr = [0u8; MAX_HEADER_BYTES];
    let hl = header::array_header(len * 2, &mut hdr)?;
    let mut n = put(w, &hdr[..hl])?;
    for (k, v) in entries {
        n += k.write_value(w, nesting + 1)?;
        n += v.write_value(w, nesting + 1)?;
    }
    Ok(n)
}

/// Writes a record as a field-count array, inserting `Zero` bytes at order
/// gaps and pruning trailing zero-valued fields of newer versions.
pub fn write_record<R: Record>(rec: &R, w: &mut dyn Write, nesting: usize) -> Result<usize> {
    let desc = record::descriptor_of::<R>();
    if desc.fields.is_empty() {
        return put(w, &[ZERO_BYTE]);
    }
    if nesting >= MAX_NESTED {
        return Err(RtlError::NestingOverflow);
    }
    let (field_num, fields) = record::versioned_fields(rec, desc);
    let mut hdr = [0u8; MAX_HEADER_BYTES];
    let hl = header::array_header(field_num, &mut hdr)?;
    let mut n = put(w, &hdr[..hl])?;
    let mut order: i64 = -1;
    for f in fields {
        while order + 1 < f.order as i64 {
            n += put(w, &[ZERO_BYTE])?;
            order += 1;
        }
        order = f.order as i64;
        let field = rec
            .field_ref(f.declared_index)
            .ok_or(RtlError::InvalidValue("record field index out of range"))?;
        n += field.write_value(w, nesting + 1)?;
    }
    Ok(n)
}

macro_rules! encodable_uint {
    ($($t:ty)*) => {$(
        impl Encodable for $t {
            fn write_value(&self, w: &mut dyn Write, _nesting: usize) -> Result<usize> {
                write_small_number(w, false, *self as u64)
            }
            fn is_zero(&self) -> bool {
                *self == 0
            }
        }
    )*};
}
encodable_uint!(u8 u16 u32 u64 usize);

macro_rules! encodable_int {
    ($($t:ty)*) => {$(
        impl Encodable for $t {
            fn write_value(&self, w: &mut dyn Write, _nesting: usize) -> Result<usize> {
                write_small_number(w, *self < 0, self.unsigned_abs() as u64)
            }
            fn is_zero(&self) -> bool {
                *self == 0
            }
        }
    )*};
}
encodable_int!(i8 i16 i32 i64 isize);

impl Encodable for f32 {
    fn write_value(&self, w: &mut dyn Write, _nesting: usize) -> Result<usize> {
        let negative = *self < 0.0;
        let f = if negative { -*self } else { *self };
        write_small_number(w, negative, u64::from(f.to_bits()))
    }

    fn is_zero(&self) -> bool {
        *self == 0.0
    }
}

impl Encodable for f64 {
    fn write_value(&self, w: &mut dyn Write, _nesting: usize) -> Result<usize> {
        let negative = *self < 0.0;
        let f = if negative { -*self } else { *self };
        write_small_number(w, negative, f.to_bits())
    }

    fn is_zero(&self) -> bool {
        *self == 0.0
    }
}

impl Encodable for bool {
    fn write_value(&self, w: &mut dyn Write, _nesting: usize) -> Result<usize> {
        put(w, &[if *self { TRUE_BYTE } else { ZERO_BYTE }])
    }

    fn is_zero(&self) -> bool {
        !*self
    }
}

impl Encodable for String {
    fn write_value(&self, w: &mut dyn Write, _nesting: usize) -> Result<usize> {
        write_str(w, self)
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl Encodable for str {
    fn write_value(&self, w: &mut dyn Write, _nesting: usize) -> Result<usize> {
        write_str(w, self)
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Encodable + 'static> Encodable for Vec<T> {
    fn write_value(&self, w: &mut dyn Write, nesting: usize) -> Result<usize> {
        let any: &dyn Any = self;
        if let Some(bytes) = any.downcast_ref::<Vec<u8>>() {
            return write_byte_sequence(w, bytes);
        }
        write_seq(w, self, false, nesting)
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Encodable + 'static, const N: usize> Encodable for [T; N] {
    fn write_value(&self, w: &mut dyn Write, nesting: usize) -> Result<usize> {
        let any: &dyn Any = self;
        if let Some(bytes) = any.downcast_ref::<[u8; N]>() {
            return write_byte_sequence(w, bytes);
        }
        write_seq(w, self, true, nesting)
    }

    fn is_zero(&self) -> bool {
        self.iter().all(Encodable::is_zero)
    }
}

impl<K, V, S> Encodable for HashMap<K, V, S>
where
    K: Encodable,
    V: Encodable,
    S: BuildHasher,
{
    fn write_value(&self, w: &mut dyn Write, nesting: usize) -> Result<usize> {
        write_map_entries(w, self.len(), self.iter(), nesting)
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<K: Encodable, V: Encodable> Encodable for BTreeMap<K, V> {
    fn write_value(&self, w: &mut dyn Write, nesting: usize) -> Result<usize> {
        write_map_entries(w, self.len(), self.iter(), nesting)
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Encodable> Encodable for Option<T> {
    fn write_value(&self, w: &mut dyn Write, nesting: usize) -> Result<usize> {
        match self {
            None => put(w, &[ZERO_BYTE]),
            Some(inner) => inner.write_value(w, nesting),
        }
    }

    fn is_zero(&self) -> bool {
        self.is_none()
    }
}

impl<T: Encodable> Encodable for Box<T> {
    fn write_value(&self, w: &mut dyn Write, nesting: usize) -> Result<usize> {
        (**self).write_value(w, nesting)
    }

    fn is_zero(&self) -> bool {
        (**self).is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enc<T: Encodable + ?Sized>(v: &T) -> Vec<u8> {
        marshal(v).unwrap().to_vec()
    }

    #[test]
    fn inline_integers() {
        for n in 0u64..=127 {
            assert_eq!(enc(&n), vec![n as u8]);
        }
        assert_eq!(enc(&0u32), vec![0x00]);
        assert_eq!(enc(&127i8), vec![0x7F]);
    }

    #[test]
    fn numeric_frames() {
        assert_eq!(enc(&142_857u64), vec![0xA3, 0x02, 0x2E, 0xC9]);
        assert_eq!(enc(&128u32), vec![0xA1, 0x80]);
        assert_eq!(enc(&-1i64), vec![0xA9, 0x01]);
        assert_eq!(enc(&-983i32), vec![0xAA, 0x03, 0xD7]);
        assert_eq!(enc(&u64::MAX).len(), 9);
        assert_eq!(enc(&i64::MIN), vec![0xA8, 0x80, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn booleans_and_sentinels() {
        assert_eq!(enc(&true), vec![0x81]);
        assert_eq!(enc(&false), vec![0x80]);
        assert_eq!(enc(&None::<u64>), vec![0x80]);
        assert_eq!(enc(&Vec::<u64>::new()), vec![0x82]);
        assert_eq!(enc(&Vec::<u8>::new()), vec![0x82]);
        assert_eq!(enc(&String::new()), vec![0x80]);
        assert_eq!(enc(&HashMap::<String, u64>::new()), vec![0x82]);
    }

    #[test]
    fn strings_and_bytes() {
        assert_eq!(enc("dog"), vec![0xC3, 0x64, 0x6F, 0x67]);
        assert_eq!(enc("\x7E"), vec![0x7E]);
        assert_eq!(enc("\u{80}").len(), 3); // two UTF-8 bytes + header
        assert_eq!(enc(&vec![0x7Fu8]), vec![0x7F]);
        assert_eq!(enc(&vec![0x80u8]), vec![0xC1, 0x80]);
        assert_eq!(enc(&vec![1u8, 2, 3]), vec![0xC3, 1, 2, 3]);
        assert_eq!(enc(&[1u8, 2, 3]), vec![0xC3, 1, 2, 3]);
        let long = "a".repeat(33);
        let encoded = enc(long.as_str());
        assert_eq!(&encoded[..2], &[0xE1, 33]);
        assert_eq!(encoded.len(), 35);
    }

    #[test]
    fn sequences() {
        assert_eq!(
            enc(&vec![1i64, 4, 2, 8, 5, 7]),
            vec![0x96, 1, 4, 2, 8, 5, 7]
        );
        // 17 elements switch to the multi form.
        let v: Vec<u64> = (0..17).collect();
        let encoded = enc(&v);
        assert_eq!(&encoded[..2], &[0x89, 17]);
        // Zero-length fixed array is the Zero sentinel.
        let empty: [u64; 0] = [];
        assert_eq!(enc(&empty), vec![0x80]);
    }

    #[test]
    fn maps_are_flattened_pairs() {
        let mut m = BTreeMap::new();
        m.insert(1u64, 2u64);
        m.insert(3u64, 4u64);
        assert_eq!(enc(&m), vec![0x94, 1, 2, 3, 4]);
    }

    #[test]
    fn floats() {
        let encoded = enc(&111.3f32);
        assert_eq!(encoded[0], 0xA4);
        assert_eq!(encoded.len(), 5);
        let encoded = enc(&-1.5f64);
        assert_eq!(encoded[0], 0xA8); // eight magnitude bytes pack as LLL=000
        assert_eq!(encoded[1], 0x3F);
        assert_eq!(enc(&0.0f64), vec![0x00]);
    }

    #[test]
    fn nesting_bound() {
        struct Deep(usize);
        impl Encodable for Deep {
            fn write_value(&self, w: &mut dyn Write, nesting: usize) -> Result<usize> {
                if self.0 == 0 {
                    return 0u8.write_value(w, nesting);
                }
                write_seq(w, &[Deep(self.0 - 1)], true, nesting)
            }
            fn is_zero(&self) -> bool {
                false
            }
        }
        assert!(matches!(
            marshal(&Deep(MAX_NESTED + 1)),
            Err(RtlError::NestingOverflow)
        ));
        assert!(marshal(&Deep(10)).is_ok());
    }
}
