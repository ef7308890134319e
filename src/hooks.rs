//! User codec hooks: types that own their wire form entirely.
//!
//! A type wired through [`Serialization`] / [`Deserialization`] bypasses
//! every structural rule: the engine writes no header around its output and
//! reads nothing on its behalf. Both sides must agree on framing; the
//! deserializer consumes exactly the bytes its serializer wrote, straight
//! from the decode stream.

use std::io::{Read, Write};
use std::marker::PhantomData;

use crate::decode::Sink;
use crate::error::Result;

/// Writes the value's own wire form. The engine adds nothing around it.
pub trait Serialization {
    fn serialization(&self, w: &mut dyn Write) -> Result<()>;
}

/// Reads the value's own wire form from the decode stream.
///
/// Returning `Ok(None)` means the wire said "absent": an enclosing optional
/// destination becomes `None`, and a plain destination is left at its
/// default.
pub trait Deserialization: Sized {
    fn deserialization(r: &mut dyn Read) -> Result<Option<Self>>;
}

/// Decode sink for hook types: runs the hook before any header is read.
pub struct HookSink<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> HookSink<T> {
    pub fn new() -> Self {
        HookSink {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for HookSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Sink for HookSink<T>
where
    T: Deserialization + Default + 'static,
{
    fn expecting(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn run_custom(
        &mut self,
        r: &mut dyn Read,
    ) -> Result<Option<(Box<dyn std::any::Any>, bool)>> {
        match T::deserialization(r)? {
            Some(v) => Ok(Some((Box::new(v), false))),
            None => Ok(Some((Box::new(T::default()), true))),
        }
    }
}

/// Wires a [`Serialization`] / [`Deserialization`] pair into the engine.
/// The type must also provide `Default` for the absent case.
#[macro_export]
macro_rules! impl_codec_via_hooks {
    ($t:ty) => {
        impl $crate::Encodable for $t {
            fn write_value(
                &self,
                w: &mut dyn ::std::io::Write,
                _nesting: usize,
            ) -> $crate::Result<usize> {
                $crate::Serialization::serialization(self, w)?;
                Ok(0)
            }

            fn is_zero(&self) -> bool {
                false
            }
        }

        impl $crate::Decodable for $t {
            fn sink() -> ::std::boxed::Box<dyn $crate::Sink> {
                ::std::boxed::Box::new($crate::hooks::HookSink::<$t>::new())
            }

            fn zero() -> Self {
                <$t as ::std::default::Default>::default()
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::unmarshal;
    use crate::encode::marshal;
    use crate::error::RtlError;
    use std::io::Read;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct RawPair {
        a: u16,
        b: u16,
    }

    impl Serialization for RawPair {
        fn serialization(&self, w: &mut dyn std::io::Write) -> Result<()> {
            w.write_all(&self.a.to_be_bytes())?;
            w.write_all(&self.b.to_be_bytes())?;
            Ok(())
        }
    }

    impl Deserialization for RawPair {
        fn deserialization(r: &mut dyn Read) -> Result<Option<Self>> {
            let mut buf = [0u8; 4];
            r.read_exact(&mut buf).map_err(RtlError::Io)?;
            Ok(Some(RawPair {
                a: u16::from_be_bytes([buf[0], buf[1]]),
                b: u16::from_be_bytes([buf[2], buf[3]]),
            }))
        }
    }

    crate::impl_codec_via_hooks!(RawPair);

    #[test]
    fn hooks_own_their_framing() {
        let v = RawPair { a: 0x1234, b: 0xFFFE };
        let bytes = marshal(&v).unwrap();
        // No RTL header: exactly the four raw bytes.
        assert_eq!(bytes.as_ref(), &[0x12, 0x34, 0xFF, 0xFE]);
        assert_eq!(unmarshal::<RawPair>(&bytes).unwrap(), v);
    }

    #[test]
    fn hooks_run_inside_containers() {
        let list = vec![
            RawPair { a: 1, b: 2 },
            RawPair { a: 3, b: 4 },
        ];
        let bytes = marshal(&list).unwrap();
        assert_eq!(bytes[0], 0x92);
        assert_eq!(bytes.len(), 1 + 8);
        assert_eq!(unmarshal::<Vec<RawPair>>(&bytes).unwrap(), list);
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct MaybeAbsent(u8);

    impl Serialization for MaybeAbsent {
        fn serialization(&self, w: &mut dyn std::io::Write) -> Result<()> {
            w.write_all(&[self.0])?;
            Ok(())
        }
    }

    impl Deserialization for MaybeAbsent {
        fn deserialization(r: &mut dyn Read) -> Result<Option<Self>> {
            let mut b = [0u8; 1];
            r.read_exact(&mut b).map_err(RtlError::Io)?;
            if b[0] == 0xFF {
                return Ok(None);
            }
            Ok(Some(MaybeAbsent(b[0])))
        }
    }

    crate::impl_codec_via_hooks!(MaybeAbsent);

    #[test]
    fn absent_clears_optional_destinations() {
        assert_eq!(
            unmarshal::<Option<MaybeAbsent>>(&[0x07]).unwrap(),
            Some(MaybeAbsent(0x07))
        );
        assert_eq!(unmarshal::<Option<MaybeAbsent>>(&[0xFF]).unwrap(), None);
        // A plain destination stays at its default.
        assert_eq!(
            unmarshal::<MaybeAbsent>(&[0xFF]).unwrap(),
            MaybeAbsent::default()
        );
    }
}
