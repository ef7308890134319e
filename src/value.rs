//! A dynamic RTL value.
//!
//! Encoding a dynamic value is fully supported: the concrete variant is
//! known, so it dispatches structurally like any other value. Decoding into
//! a dynamic destination is deliberately shallow — the wire does not say
//! whether a numeric frame was an `i32` or an `f64`, so the decoder maps
//! headers to the widest natural variants: unsigned for inline bytes and
//! positive frames, signed for negative frames, big integers above eight
//! magnitude bytes, strings for byte payloads, and lists for arrays.

use std::any::Any;
use std::io::Write;

use malachite::Integer;

use crate::decode::{take, Child, Decodable, Sink, Step};
use crate::encode::Encodable;
use crate::error::Result;
use crate::header::{EMPTY_BYTE, ZERO_BYTE};
use crate::numeric;
use crate::priors;

/// A self-describing value: the dynamic counterpart of typed encoding.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RtlValue {
    #[default]
    Null,
    Bool(bool),
    Uint(u64),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    BigInt(Integer),
    List(Vec<RtlValue>),
    /// Entries in encoder-chosen order; RTL does not canonicalize maps.
    Map(Vec<(RtlValue, RtlValue)>),
}

impl RtlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RtlValue::Null)
    }
}

impl Encodable for RtlValue {
    fn write_value(&self, w: &mut dyn Write, nesting: usize) -> Result<usize> {
        match self {
            RtlValue::Null => {
                w.write_all(&[ZERO_BYTE])?;
                Ok(1)
            }
            RtlValue::Bool(b) => b.write_value(w, nesting),
            RtlValue::Uint(u) => u.write_value(w, nesting),
            RtlValue::Int(i) => i.write_value(w, nesting),
            RtlValue::Float(f) => f.write_value(w, nesting),
            RtlValue::Str(s) => s.write_value(w, nesting),
            RtlValue::Bytes(b) => b.write_value(w, nesting),
            RtlValue::BigInt(i) => i.write_value(w, nesting),
            RtlValue::List(items) => {
                if items.is_empty() {
                    w.write_all(&[EMPTY_BYTE])?;
                    return Ok(1);
                }
                if nesting >= crate::MAX_NESTED {
                    return Err(crate::RtlError::NestingOverflow);
                }
                let mut hdr = [0u8; crate::header::MAX_HEADER_BYTES];
                let hl = crate::header::array_header(items.len(), &mut hdr)?;
                w.write_all(&hdr[..hl])?;
                let mut n = hl;
                for item in items {
                    n += item.write_value(w, nesting + 1)?;
                }
                Ok(n)
            }
            RtlValue::Map(entries) => {
                if entries.is_empty() {
                    w.write_all(&[EMPTY_BYTE])?;
                    return Ok(1);
                }
                if nesting >= crate::MAX_NESTED {
                    return Err(crate::RtlError::NestingOverflow);
                }
                let mut hdr = [0u8; crate::header::MAX_HEADER_BYTES];
                let hl = crate::header::array_header(entries.len() * 2, &mut hdr)?;
                w.write_all(&hdr[..hl])?;
                let mut n = hl;
                for (k, v) in entries {
                    n += k.write_value(w, nesting + 1)?;
                    n += v.write_value(w, nesting + 1)?;
                }
                Ok(n)
            }
        }
    }

    fn is_zero(&self) -> bool {
        self.is_null()
    }
}

/// Sink for dynamic destinations.
struct AnySink {
    items: Vec<RtlValue>,
    expected: usize,
    next: usize,
    started: bool,
}

impl AnySink {
    fn new() -> Self {
        AnySink {
            items: Vec::new(),
            expected: 0,
            next: 0,
            started: false,
        }
    }
}

impl Sink for AnySink {
    fn expecting(&self) -> &'static str {
        "RtlValue"
    }

    fn on_byte(&mut self, b: u8) -> Result<Step> {
        Ok(Step::Done(Box::new(RtlValue::Uint(u64::from(b)))))
    }

    fn on_zero(&mut self) -> Result<Step> {
        Ok(Step::Done(Box::new(RtlValue::Null)))
    }

    fn on_empty(&mut self) -> Result<Step> {
        Ok(Step::Done(Box::new(RtlValue::List(Vec::new()))))
    }

    fn on_number(&mut self, positive: bool, payload: &[u8]) -> Result<Step> {
        let v = if payload.len() <= 8 {
            if positive {
                RtlValue::Uint(numeric::bytes_to_u64(payload))
            } else {
                RtlValue::Int(numeric::bytes_to_i64(payload, true))
            }
        } else {
            RtlValue::BigInt(priors::bytes_to_integer(payload, !positive))
        };
        Ok(Step::Done(Box::new(v)))
    }

    fn on_bytes(&mut self, payload: &[u8]) -> Result<Step> {
        let v = match std::str::from_utf8(payload) {
            Ok(s) => RtlValue::Str(s.to_string()),
            Err(_) => RtlValue::Bytes(payload.to_vec()),
        };
        Ok(Step::Done(Box::new(v)))
    }

    fn on_array(&mut self, len: usize) -> Result<Step> {
        self.items.reserve(len.min(1024));
        self.expected = len;
        self.started = true;
        Ok(Step::Await)
    }

    fn next_child(&mut self) -> Result<Child> {
        if !self.started {
            return Err(crate::RtlError::InvalidValue("dynamic sink not started"));
        }
        if self.next >= self.expected {
            return Ok(Child::Finish(
                Box::new(RtlValue::List(std::mem::take(&mut self.items))),
                0,
            ));
        }
        self.next += 1;
        Ok(Child::Read(RtlValue::sink()))
    }

    fn accept_child(&mut self, value: Box<dyn Any>) -> Result<()> {
        self.items.push(take::<RtlValue>(value)?);
        Ok(())
    }
}

impl Decodable for RtlValue {
    fn sink() -> Box<dyn Sink> {
        Box::new(AnySink::new())
    }

    fn zero() -> Self {
        RtlValue::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::unmarshal;
    use crate::encode::marshal;

    #[test]
    fn dynamic_decode_maps_headers_to_widest_variants() {
        assert_eq!(unmarshal::<RtlValue>(&[0x2A]).unwrap(), RtlValue::Uint(42));
        assert_eq!(unmarshal::<RtlValue>(&[0x80]).unwrap(), RtlValue::Null);
        assert_eq!(
            unmarshal::<RtlValue>(&[0x82]).unwrap(),
            RtlValue::List(vec![])
        );
        assert_eq!(
            unmarshal::<RtlValue>(&marshal(&142_857u64).unwrap()).unwrap(),
            RtlValue::Uint(142_857)
        );
        assert_eq!(
            unmarshal::<RtlValue>(&marshal(&-7i32).unwrap()).unwrap(),
            RtlValue::Int(-7)
        );
        assert_eq!(
            unmarshal::<RtlValue>(&marshal("dog").unwrap()).unwrap(),
            RtlValue::Str("dog".into())
        );
    }

    #[test]
    fn dynamic_lists_nest() {
        // [[], [[]], [[], [[]]]] — mirrors a recursive empty-list shape.
        let v = RtlValue::List(vec![
            RtlValue::List(vec![]),
            RtlValue::List(vec![RtlValue::List(vec![])]),
            RtlValue::List(vec![
                RtlValue::List(vec![]),
                RtlValue::List(vec![RtlValue::List(vec![])]),
            ]),
        ]);
        let bytes = marshal(&v).unwrap();
        assert_eq!(unmarshal::<RtlValue>(&bytes).unwrap(), v);
    }

    #[test]
    fn dynamic_mixed_list_roundtrip() {
        let v = RtlValue::List(vec![
            RtlValue::Uint(1),
            RtlValue::Uint(0xFF_FFFF),
            RtlValue::List(vec![RtlValue::List(vec![
                RtlValue::Uint(4),
                RtlValue::Uint(5),
                RtlValue::Uint(5),
            ])]),
            RtlValue::Str("abc".into()),
        ]);
        let bytes = marshal(&v).unwrap();
        assert_eq!(unmarshal::<RtlValue>(&bytes).unwrap(), v);
    }

    #[test]
    fn true_header_is_not_a_dynamic_value() {
        assert!(unmarshal::<RtlValue>(&[0x81]).is_err());
    }

    #[test]
    fn wide_numbers_decode_as_big_integers() {
        let wide: Vec<u8> = (1..=12).collect();
        let i = priors::bytes_to_integer(&wide, false);
        let bytes = marshal(&i).unwrap();
        assert_eq!(
            unmarshal::<RtlValue>(&bytes).unwrap(),
            RtlValue::BigInt(i)
        );
    }
}
