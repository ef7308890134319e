//! Prior types: arbitrary-precision numbers and timestamps that receive
//! specialized wire forms ahead of structural dispatch.
//!
//! - `malachite::Integer` encodes as a plain numeric frame, sharing the
//!   inline-byte form for 0–127 and the `PosBigInt`/`NegBigInt` tags above
//!   eight magnitude bytes.
//! - `malachite::Rational` and [`BigFloat`] encode their binary forms as
//!   opaque blobs inside a positive numeric frame; negative numeric tags are
//!   rejected on decode.
//! - [`Timestamp`] (and any type wired through [`Binary`]) encodes its
//!   binary form as a string-tagged byte sequence.

use std::io::Write;
use std::marker::PhantomData;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use malachite::{Integer, Natural, Rational};

use crate::decode::{Decodable, Sink, Step};
use crate::encode::{self, Encodable};
use crate::error::{Result, RtlError};

fn done<T: 'static>(value: T) -> Result<Step> {
    Ok(Step::Done(Box::new(value)))
}

/// Sign and stripped big-endian magnitude bytes of an integer.
pub fn integer_to_bytes(value: &Integer) -> (bool, Vec<u8>) {
    let negative = *value < Integer::from(0);
    let mut v = if negative { -value.clone() } else { value.clone() };
    let base = Integer::from(256u32);
    let mut out = Vec::new();
    while v > Integer::from(0) {
        let rem = &v % &base;
        out.push(u64::try_from(&rem).unwrap_or(0) as u8);
        v = &v / &base;
    }
    out.reverse();
    (negative, out)
}

/// Folds big-endian magnitude bytes back into an integer.
pub fn bytes_to_integer(bytes: &[u8], negative: bool) -> Integer {
    let mut v = Integer::from(0u32);
    for &b in bytes {
        v = v * Integer::from(256u32) + Integer::from(b);
    }
    if negative {
        -v
    } else {
        v
    }
}

fn natural_to_bytes(value: &Natural) -> Vec<u8> {
    let mut v = value.clone();
    let base = Natural::from(256u32);
    let mut out = Vec::new();
    while v > Natural::from(0u32) {
        let rem = &v % &base;
        out.push(u64::try_from(&rem).unwrap_or(0) as u8);
        v = &v / &base;
    }
    out.reverse();
    out
}

fn natural_from_bytes(bytes: &[u8]) -> Natural {
    let mut v = Natural::from(0u32);
    for &b in bytes {
        v = v * Natural::from(256u32) + Natural::from(b);
    }
    v
}

impl Encodable for Integer {
    fn write_value(&self, w: &mut dyn Write, _nesting: usize) -> Result<usize> {
        if *self >= Integer::from(0) && *self < Integer::from(128) {
            let b = u64::try_from(self).unwrap_or(0) as u8;
            w.write_all(&[b])?;
            return Ok(1);
        }
        let (negative, magnitude) = integer_to_bytes(self);
        encode::write_number_frame(w, negative, &magnitude)
    }

    fn is_zero(&self) -> bool {
        *self == Integer::from(0)
    }
}

struct IntegerSink;

impl Sink for IntegerSink {
    fn expecting(&self) -> &'static str {
        "Integer"
    }

    fn on_byte(&mut self, b: u8) -> Result<Step> {
        done(Integer::from(b))
    }

    fn on_zero(&mut self) -> Result<Step> {
        done(Integer::from(0u32))
    }

    fn on_number(&mut self, positive: bool, payload: &[u8]) -> Result<Step> {
        done(bytes_to_integer(payload, !positive))
    }
}

impl Decodable for Integer {
    fn sink() -> Box<dyn Sink> {
        Box::new(IntegerSink)
    }

    fn zero() -> Self {
        Integer::from(0u32)
    }
}

/// Binary blob form of a rational: flags byte (bit 0 = negative), a 4-byte
/// big-endian numerator length, numerator magnitude, denominator magnitude.
fn rational_to_binary(value: &Rational) -> Vec<u8> {
    let negative = *value < Rational::from(0i64);
    let num = natural_to_bytes(&value.to_numerator());
    let den = natural_to_bytes(&value.to_denominator());
    let mut out = Vec::with_capacity(5 + num.len() + den.len());
    out.push(u8::from(negative));
    out.extend_from_slice(&(num.len() as u32).to_be_bytes());
    out.extend_from_slice(&num);
    out.extend_from_slice(&den);
    out
}

fn rational_from_binary(bytes: &[u8]) -> Result<Rational> {
    if bytes.len() < 5 {
        return Err(RtlError::Unsupported("malformed rational payload".into()));
    }
    let negative = bytes[0] & 1 == 1;
    let num_len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
    let rest = &bytes[5..];
    if rest.len() < num_len {
        return Err(RtlError::Unsupported("malformed rational payload".into()));
    }
    let num = natural_from_bytes(&rest[..num_len]);
    let den = natural_from_bytes(&rest[num_len..]);
    if den == Natural::from(0u32) {
        return Err(RtlError::Unsupported("rational with zero denominator".into()));
    }
    let q = Rational::from(Integer::from(num)) / Rational::from(Integer::from(den));
    Ok(if negative { -q } else { q })
}

impl Encodable for Rational {
    fn write_value(&self, w: &mut dyn Write, _nesting: usize) -> Result<usize> {
        encode::write_number_frame(w, false, &rational_to_binary(self))
    }

    fn is_zero(&self) -> bool {
        *self == Rational::from(0i64)
    }
}

struct RationalSink;

impl Sink for RationalSink {
    fn expecting(&self) -> &'static str {
        "Rational"
    }

    fn on_zero(&mut self) -> Result<Step> {
        done(Rational::from(0i64))
    }

    fn on_number(&mut self, positive: bool, payload: &[u8]) -> Result<Step> {
        if !positive {
            return Err(RtlError::Unsupported(
                "negative numeric frame for a rational".into(),
            ));
        }
        done(rational_from_binary(payload)?)
    }
}

impl Decodable for Rational {
    fn sink() -> Box<dyn Sink> {
        Box::new(RationalSink)
    }

    fn zero() -> Self {
        Rational::from(0i64)
    }
}

/// A minimal arbitrary-precision binary float: `(-1)^sign × mantissa × 2^exponent`.
///
/// The crate only needs a value with unbounded precision and a stable binary
/// form; arithmetic beyond conversion is out of scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigFloat {
    negative: bool,
    mantissa: Natural,
    exponent: i64,
}

impl Default for BigFloat {
    fn default() -> Self {
        BigFloat {
            negative: false,
            mantissa: Natural::from(0u32),
            exponent: 0,
        }
    }
}

impl BigFloat {
    pub fn new(negative: bool, mantissa: Natural, exponent: i64) -> Self {
        BigFloat {
            negative,
            mantissa,
            exponent,
        }
    }

    pub fn is_zero_value(&self) -> bool {
        self.mantissa == Natural::from(0u32)
    }

    /// Exact conversion from a finite `f64`.
    pub fn from_f64(f: f64) -> Option<Self> {
        if !f.is_finite() {
            return None;
        }
        if f == 0.0 {
            return Some(BigFloat::default());
        }
        let bits = f.to_bits();
        let negative = bits >> 63 == 1;
        let biased = ((bits >> 52) & 0x7FF) as i64;
        let fraction = bits & 0x000F_FFFF_FFFF_FFFF;
        let (mantissa, exponent) = if biased == 0 {
            (fraction, -1074)
        } else {
            (fraction | (1 << 52), biased - 1075)
        };
        Some(BigFloat {
            negative,
            mantissa: Natural::from(mantissa),
            exponent,
        })
    }

    /// Approximate conversion back to `f64`.
    pub fn to_f64(&self) -> f64 {
        let mut m = 0.0f64;
        for b in natural_to_bytes(&self.mantissa) {
            m = m * 256.0 + f64::from(b);
        }
        let v = m * 2.0f64.powi(self.exponent.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32);
        if self.negative {
            -v
        } else {
            v
        }
    }

    /// Binary blob form: flags byte, 8-byte big-endian two's-complement
    /// exponent, mantissa magnitude.
    fn to_binary(&self) -> Vec<u8> {
        let mantissa = natural_to_bytes(&self.mantissa);
        let mut out = Vec::with_capacity(9 + mantissa.len());
        out.push(u8::from(self.negative));
        out.extend_from_slice(&self.exponent.to_be_bytes());
        out.extend_from_slice(&mantissa);
        out
    }

    fn from_binary(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 9 {
            return Err(RtlError::Unsupported("malformed big-float payload".into()));
        }
        let negative = bytes[0] & 1 == 1;
        let mut exp = [0u8; 8];
        exp.copy_from_slice(&bytes[1..9]);
        Ok(BigFloat {
            negative,
            mantissa: natural_from_bytes(&bytes[9..]),
            exponent: i64::from_be_bytes(exp),
        })
    }
}

impl Encodable for BigFloat {
    fn write_value(&self, w: &mut dyn Write, _nesting: usize) -> Result<usize> {
        encode::write_number_frame(w, false, &self.to_binary())
    }

    fn is_zero(&self) -> bool {
        self.is_zero_value()
    }
}

struct BigFloatSink;

impl Sink for BigFloatSink {
    fn expecting(&self) -> &'static str {
        "BigFloat"
    }

    fn on_zero(&mut self) -> Result<Step> {
        done(BigFloat::default())
    }

    fn on_number(&mut self, positive: bool, payload: &[u8]) -> Result<Step> {
        if !positive {
            return Err(RtlError::Unsupported(
                "negative numeric frame for a big float".into(),
            ));
        }
        done(BigFloat::from_binary(payload)?)
    }
}

impl Decodable for BigFloat {
    fn sink() -> Box<dyn Sink> {
        Box::new(BigFloatSink)
    }

    fn zero() -> Self {
        BigFloat::default()
    }
}

/// A type with a binary-marshal form carried in RTL's string frames.
///
/// Wire this into the engine with [`impl_codec_via_binary!`]: the binary
/// form is written through the byte-sequence path (so a one-byte form ≤ 127
/// rides inline), and `Zero` decodes to the type's default.
///
/// [`impl_codec_via_binary!`]: crate::impl_codec_via_binary
pub trait Binary: Sized + Default + PartialEq + 'static {
    fn to_binary(&self) -> Result<Vec<u8>>;
    fn from_binary(bytes: &[u8]) -> Result<Self>;
}

/// Decode sink for [`Binary`] types.
pub struct BinarySink<T: Binary> {
    _marker: PhantomData<fn() -> T>,
}

impl<T: Binary> BinarySink<T> {
    pub fn new() -> Self {
        BinarySink {
            _marker: PhantomData,
        }
    }
}

impl<T: Binary> Default for BinarySink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Binary> Sink for BinarySink<T> {
    fn expecting(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn on_byte(&mut self, b: u8) -> Result<Step> {
        done(T::from_binary(&[b])?)
    }

    fn on_zero(&mut self) -> Result<Step> {
        done(T::default())
    }

    fn on_bytes(&mut self, payload: &[u8]) -> Result<Step> {
        done(T::from_binary(payload)?)
    }
}

/// Wires a [`Binary`] type into the engine: encoded as a string-tagged byte
/// sequence of its binary form.
#[macro_export]
macro_rules! impl_codec_via_binary {
    ($t:ty) => {
        impl $crate::Encodable for $t {
            fn write_value(
                &self,
                w: &mut dyn ::std::io::Write,
                _nesting: usize,
            ) -> $crate::Result<usize> {
                let bytes = $crate::Binary::to_binary(self)?;
                $crate::encode::write_byte_sequence(w, &bytes)
            }

            fn is_zero(&self) -> bool {
                self == &<$t as ::std::default::Default>::default()
            }
        }

        impl $crate::Decodable for $t {
            fn sink() -> ::std::boxed::Box<dyn $crate::Sink> {
                ::std::boxed::Box::new($crate::priors::BinarySink::<$t>::new())
            }

            fn zero() -> Self {
                <$t as ::std::default::Default>::default()
            }
        }
    };
}

/// An instant as whole seconds and nanoseconds relative to the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    secs: i64,
    nanos: u32,
}

impl Timestamp {
    pub fn new(secs: i64, nanos: u32) -> Self {
        Timestamp { secs, nanos }
    }

    pub fn secs(&self) -> i64 {
        self.secs
    }

    pub fn nanos(&self) -> u32 {
        self.nanos
    }

    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    pub fn from_system_time(t: SystemTime) -> Self {
        match t.duration_since(UNIX_EPOCH) {
            Ok(d) => Timestamp {
                secs: d.as_secs() as i64,
                nanos: d.subsec_nanos(),
            },
            Err(e) => {
                let d = e.duration();
                // Pre-epoch instants round toward the whole second below.
                let (secs, nanos) = if d.subsec_nanos() == 0 {
                    (-(d.as_secs() as i64), 0)
                } else {
                    (-(d.as_secs() as i64) - 1, 1_000_000_000 - d.subsec_nanos())
                };
                Timestamp { secs, nanos }
            }
        }
    }

    pub fn to_system_time(&self) -> SystemTime {
        if self.secs >= 0 {
            UNIX_EPOCH + Duration::new(self.secs as u64, self.nanos)
        } else {
            let back = Duration::new((-self.secs) as u64, 0);
            UNIX_EPOCH - back + Duration::new(0, self.nanos)
        }
    }
}

impl Binary for Timestamp {
    fn to_binary(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(12);
        out.extend_from_slice(&self.secs.to_be_bytes());
        out.extend_from_slice(&self.nanos.to_be_bytes());
        Ok(out)
    }

    fn from_binary(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 12 {
            return Err(RtlError::Unsupported(format!(
                "timestamp payload must be 12 bytes, got {}",
                bytes.len()
            )));
        }
        let mut secs = [0u8; 8];
        secs.copy_from_slice(&bytes[..8]);
        let mut nanos = [0u8; 4];
        nanos.copy_from_slice(&bytes[8..]);
        Ok(Timestamp {
            secs: i64::from_be_bytes(secs),
            nanos: u32::from_be_bytes(nanos),
        })
    }
}

crate::impl_codec_via_binary!(Timestamp);
