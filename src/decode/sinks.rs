//! Destination sinks for the primitive and container kinds.
//!
//! Each sink implements exactly one row of the header acceptance table: the
//! events it overrides are the headers its destination kind absorbs, and the
//! inherited defaults reject everything else with `TypeMismatch`.

use std::any::{type_name, Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::io::Read;
use std::marker::PhantomData;

use super::{take, Child, Decodable, Sink, Step};
use crate::error::{Result, RtlError};
use crate::numeric;

fn done<T: 'static>(value: T) -> Result<Step> {
    Ok(Step::Done(Box::new(value)))
}

macro_rules! uint_sink {
    ($($name:ident => $t:ty),* $(,)?) => {$(
        struct $name;

        impl Sink for $name {
            fn expecting(&self) -> &'static str {
                stringify!($t)
            }

            fn on_byte(&mut self, b: u8) -> Result<Step> {
                let v = <$t>::try_from(u64::from(b))
                    .map_err(|_| RtlError::NumericOverflow(stringify!($t)))?;
                done(v)
            }

            fn on_zero(&mut self) -> Result<Step> {
                done(0 as $t)
            }

            fn on_number(&mut self, positive: bool, payload: &[u8]) -> Result<Step> {
                if !positive {
                    return Err(RtlError::SignMismatch(stringify!($t)));
                }
                if payload.len() > 8 {
                    return Err(RtlError::NumericOverflow(stringify!($t)));
                }
                let v = <$t>::try_from(numeric::bytes_to_u64(payload))
                    .map_err(|_| RtlError::NumericOverflow(stringify!($t)))?;
                done(v)
            }
        }

        impl Decodable for $t {
            fn sink() -> Box<dyn Sink> {
                Box::new($name)
            }

            fn zero() -> Self {
                0
            }
        }
    )*};
}
uint_sink!(
    U8Sink => u8,
    U16Sink => u16,
    U32Sink => u32,
    U64Sink => u64,
    UsizeSink => usize,
);

macro_rules! int_sink {
    ($($name:ident => $t:ty),* $(,)?) => {$(
        struct $name;

        impl Sink for $name {
            fn expecting(&self) -> &'static str {
                stringify!($t)
            }

            fn on_byte(&mut self, b: u8) -> Result<Step> {
                done(b as $t)
            }

            fn on_zero(&mut self) -> Result<Step> {
                done(0 as $t)
            }

            fn on_number(&mut self, positive: bool, payload: &[u8]) -> Result<Step> {
                let wide = numeric::bytes_to_i64_checked(payload, !positive)
                    .map_err(|_| RtlError::NumericOverflow(stringify!($t)))?;
                let v = <$t>::try_from(wide)
                    .map_err(|_| RtlError::NumericOverflow(stringify!($t)))?;
                done(v)
            }
        }

        impl Decodable for $t {
            fn sink() -> Box<dyn Sink> {
                Box::new($name)
            }

            fn zero() -> Self {
                0
            }
        }
    )*};
}
int_sink!(
    I8Sink => i8,
    I16Sink => i16,
    I32Sink => i32,
    I64Sink => i64,
    IsizeSink => isize,
);

macro_rules! float_sink {
    ($($name:ident => $t:ty),* $(,)?) => {$(
        struct $name;

        impl Sink for $name {
            fn expecting(&self) -> &'static str {
                stringify!($t)
            }

            fn on_byte(&mut self, b: u8) -> Result<Step> {
                // A lone byte is a denormal double pattern, narrowed to the
                // destination width.
                done(f64::from_bits(u64::from(b)) as $t)
            }

            fn on_zero(&mut self) -> Result<Step> {
                done(0.0 as $t)
            }

            fn on_number(&mut self, positive: bool, payload: &[u8]) -> Result<Step> {
                let f = numeric::bytes_to_float(payload, !positive)
                    .map_err(|_| RtlError::NumericOverflow(stringify!($t)))?;
                done(f as $t)
            }
        }

        impl Decodable for $t {
            fn sink() -> Box<dyn Sink> {
                Box::new($name)
            }

            fn zero() -> Self {
                0.0
            }
        }
    )*};
}
float_sink!(F32Sink => f32, F64Sink => f64);

struct BoolSink;

impl Sink for BoolSink {
    fn expecting(&self) -> &'static str {
        "bool"
    }

    fn on_zero(&mut self) -> Result<Step> {
        done(false)
    }

    fn on_true(&mut self) -> Result<Step> {
        done(true)
    }
}

impl Decodable for bool {
    fn sink() -> Box<dyn Sink> {
        Box::new(BoolSink)
    }

    fn zero() -> Self {
        false
    }
}

struct StringSink;

impl Sink for StringSink {
    fn expecting(&self) -> &'static str {
        "String"
    }

    fn on_byte(&mut self, b: u8) -> Result<Step> {
        done(String::from_utf8(vec![b])?)
    }

    fn on_zero(&mut self) -> Result<Step> {
        done(String::new())
    }

    fn on_bytes(&mut self, payload: &[u8]) -> Result<Step> {
        done(String::from_utf8(payload.to_vec())?)
    }
}

impl Decodable for String {
    fn sink() -> Box<dyn Sink> {
        Box::new(StringSink)
    }

    fn zero() -> Self {
        String::new()
    }
}

enum SeqMode {
    Fresh,
    Elements { expected: usize, next: usize },
    Bytes { payload: Vec<u8>, next: usize },
}

/// Sink for growable sequences (`Vec<T>`). The destination always matches
/// the encoded length. Byte payloads fast-path into `Vec<u8>` destinations
/// and otherwise drive one `SingleByte` event per element.
pub(crate) struct SeqSink<T: Decodable> {
    items: Vec<T>,
    mode: SeqMode,
}

impl<T: Decodable> SeqSink<T> {
    pub(crate) fn new() -> Self {
        SeqSink {
            items: Vec::new(),
            mode: SeqMode::Fresh,
        }
    }
}

impl<T: Decodable> Sink for SeqSink<T> {
    fn expecting(&self) -> &'static str {
        type_name::<Vec<T>>()
    }

    fn on_byte(&mut self, b: u8) -> Result<Step> {
        self.mode = SeqMode::Bytes {
            payload: vec![b],
            next: 0,
        };
        Ok(Step::Await)
    }

    fn on_zero(&mut self) -> Result<Step> {
        done(Vec::<T>::new())
    }

    fn on_empty(&mut self) -> Result<Step> {
        done(Vec::<T>::new())
    }

    fn on_bytes(&mut self, payload: &[u8]) -> Result<Step> {
        if TypeId::of::<T>() == TypeId::of::<u8>() {
            let boxed: Box<dyn Any> = Box::new(payload.to_vec());
            return Ok(Step::Done(boxed));
        }
        self.mode = SeqMode::Bytes {
            payload: payload.to_vec(),
            next: 0,
        };
        Ok(Step::Await)
    }

    fn on_array(&mut self, len: usize) -> Result<Step> {
        self.items.reserve(len.min(1024));
        self.mode = SeqMode::Elements {
            expected: len,
            next: 0,
        };
        Ok(Step::Await)
    }

    fn next_child(&mut self) -> Result<Child> {
        match &mut self.mode {
            SeqMode::Elements { expected, next } => {
                if *next >= *expected {
                    return Ok(Child::Finish(Box::new(std::mem::take(&mut self.items)), 0));
                }
                *next += 1;
                Ok(Child::Read(T::sink()))
            }
            SeqMode::Bytes { payload, next } => {
                if *next >= payload.len() {
                    return Ok(Child::Finish(Box::new(std::mem::take(&mut self.items)), 0));
                }
                let b = payload[*next];
                *next += 1;
                Ok(Child::Byte(T::sink(), b))
            }
            SeqMode::Fresh => Err(RtlError::InvalidValue("sequence sink not started")),
        }
    }

    fn accept_child(&mut self, value: Box<dyn Any>) -> Result<()> {
        self.items.push(take::<T>(value)?);
        Ok(())
    }
}

impl<T: Decodable> Decodable for Vec<T> {
    fn sink() -> Box<dyn Sink> {
        Box::new(SeqSink::<T>::new())
    }

    fn zero() -> Self {
        Vec::new()
    }
}

/// Sink for fixed arrays (`[T; N]`). Shorter encoded data leaves the tail at
/// the element type's zero; longer encoded data is skipped element-wise.
struct ArraySink<T: Decodable, const N: usize> {
    items: Vec<T>,
    mode: SeqMode,
}

impl<T: Decodable, const N: usize> ArraySink<T, N> {
    fn new() -> Self {
        ArraySink {
            items: Vec::new(),
            mode: SeqMode::Fresh,
        }
    }
}

/// Moves collected elements into a fixed array, zero-filling the tail.
fn drain_into_array<T: Decodable, const N: usize>(items: &mut Vec<T>) -> Box<dyn Any> {
    let mut it = std::mem::take(items).into_iter();
    let arr: [T; N] = std::array::from_fn(|_| it.next().unwrap_or_else(T::zero));
    Box::new(arr)
}

impl<T: Decodable, const N: usize> Sink for ArraySink<T, N> {
    fn expecting(&self) -> &'static str {
        type_name::<[T; N]>()
    }

    fn on_byte(&mut self, b: u8) -> Result<Step> {
        self.mode = SeqMode::Bytes {
            payload: vec![b],
            next: 0,
        };
        Ok(Step::Await)
    }

    fn on_zero(&mut self) -> Result<Step> {
        Ok(Step::Done(Box::new(std::array::from_fn::<T, N, _>(
            |_| T::zero(),
        ))))
    }

    fn on_bytes(&mut self, payload: &[u8]) -> Result<Step> {
        if TypeId::of::<T>() == TypeId::of::<u8>() {
            let mut arr = [0u8; N];
            let n = payload.len().min(N);
            arr[..n].copy_from_slice(&payload[..n]);
            let boxed: Box<dyn Any> = Box::new(arr);
            return Ok(Step::Done(boxed));
        }
        self.mode = SeqMode::Bytes {
            payload: payload.to_vec(),
            next: 0,
        };
        Ok(Step::Await)
    }

    fn on_array(&mut self, len: usize) -> Result<Step> {
        self.items.reserve(len.min(N));
        self.mode = SeqMode::Elements {
            expected: len,
            next: 0,
        };
        Ok(Step::Await)
    }

    fn next_child(&mut self) -> Result<Child> {
        match &mut self.mode {
            SeqMode::Elements { expected, next } => {
                if *next >= *expected || *next >= N {
                    let extra = expected.saturating_sub(N);
                    return Ok(Child::Finish(drain_into_array::<T, N>(&mut self.items), extra));
                }
                *next += 1;
                Ok(Child::Read(T::sink()))
            }
            SeqMode::Bytes { payload, next } => {
                if *next >= payload.len() || *next >= N {
                    return Ok(Child::Finish(drain_into_array::<T, N>(&mut self.items), 0));
                }
                let b = payload[*next];
                *next += 1;
                Ok(Child::Byte(T::sink(), b))
            }
            SeqMode::Fresh => Err(RtlError::InvalidValue("array sink not started")),
        }
    }

    fn accept_child(&mut self, value: Box<dyn Any>) -> Result<()> {
        self.items.push(take::<T>(value)?);
        Ok(())
    }
}

impl<T: Decodable, const N: usize> Decodable for [T; N] {
    fn sink() -> Box<dyn Sink> {
        Box::new(ArraySink::<T, N>::new())
    }

    fn zero() -> Self {
        std::array::from_fn(|_| T::zero())
    }
}

/// Map destinations a k/v iterator can populate.
pub(crate) trait MapCollect<K, V>: Default + 'static {
    fn insert_pair(&mut self, key: K, value: V);
}

impl<K: Eq + Hash + 'static, V: 'static> MapCollect<K, V> for HashMap<K, V> {
    fn insert_pair(&mut self, key: K, value: V) {
        self.insert(key, value);
    }
}

impl<K: Ord + 'static, V: 'static> MapCollect<K, V> for BTreeMap<K, V> {
    fn insert_pair(&mut self, key: K, value: V) {
        self.insert(key, value);
    }
}

/// Sink for maps: an array source of even length decoded as alternating
/// key and value children.
struct MapSink<K, V, M> {
    map: M,
    expected: usize,
    next: usize,
    pending_key: Option<K>,
    started: bool,
    _value: PhantomData<V>,
}

impl<K, V, M: Default> MapSink<K, V, M> {
    fn new() -> Self {
        MapSink {
            map: M::default(),
            expected: 0,
            next: 0,
            pending_key: None,
            started: false,
            _value: PhantomData,
        }
    }
}

impl<K, V, M> Sink for MapSink<K, V, M>
where
    K: Decodable,
    V: Decodable,
    M: MapCollect<K, V>,
{
    fn expecting(&self) -> &'static str {
        type_name::<M>()
    }

    fn on_zero(&mut self) -> Result<Step> {
        done(M::default())
    }

    fn on_empty(&mut self) -> Result<Step> {
        done(M::default())
    }

    fn on_array(&mut self, len: usize) -> Result<Step> {
        if len % 2 != 0 {
            return Err(RtlError::OddMapLength(len));
        }
        self.expected = len;
        self.started = true;
        Ok(Step::Await)
    }

    fn next_child(&mut self) -> Result<Child> {
        if !self.started {
            return Err(RtlError::InvalidValue("map sink not started"));
        }
        if self.next >= self.expected {
            return Ok(Child::Finish(Box::new(std::mem::take(&mut self.map)), 0));
        }
        let is_key = self.next % 2 == 0;
        self.next += 1;
        if is_key {
            Ok(Child::Read(K::sink()))
        } else {
            Ok(Child::Read(V::sink()))
        }
    }

    fn accept_child(&mut self, value: Box<dyn Any>) -> Result<()> {
        match self.pending_key.take() {
            None => {
                self.pending_key = Some(take::<K>(value)?);
            }
            Some(key) => {
                self.map.insert_pair(key, take::<V>(value)?);
            }
        }
        Ok(())
    }
}

impl<K, V> Decodable for HashMap<K, V>
where
    K: Decodable + Eq + Hash,
    V: Decodable,
{
    fn sink() -> Box<dyn Sink> {
        Box::new(MapSink::<K, V, HashMap<K, V>>::new())
    }

    fn zero() -> Self {
        HashMap::new()
    }
}

impl<K, V> Decodable for BTreeMap<K, V>
where
    K: Decodable + Ord,
    V: Decodable,
{
    fn sink() -> Box<dyn Sink> {
        Box::new(MapSink::<K, V, BTreeMap<K, V>>::new())
    }

    fn zero() -> Self {
        BTreeMap::new()
    }
}

/// Sink for optional (pointer) destinations. `Zero` clears to `None`; every
/// other event forwards to the pointee's sink and the finished pointee is
/// wrapped in `Some`.
struct OptionSink<T: Decodable> {
    inner: Box<dyn Sink>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Decodable> OptionSink<T> {
    fn new() -> Self {
        OptionSink {
            inner: T::sink(),
            _marker: PhantomData,
        }
    }

    fn wrap(&self, step: Step) -> Result<Step> {
        match step {
            Step::Done(v) => done(Some(take::<T>(v)?)),
            Step::Await => Ok(Step::Await),
        }
    }
}

impl<T: Decodable> Sink for OptionSink<T> {
    fn expecting(&self) -> &'static str {
        type_name::<Option<T>>()
    }

    fn run_custom(&mut self, r: &mut dyn Read) -> Result<Option<(Box<dyn Any>, bool)>> {
        match self.inner.run_custom(r)? {
            None => Ok(None),
            Some((_, true)) => Ok(Some((Box::new(None::<T>), false))),
            Some((v, false)) => Ok(Some((Box::new(Some(take::<T>(v)?)), false))),
        }
    }

    fn on_byte(&mut self, b: u8) -> Result<Step> {
        let step = self.inner.on_byte(b)?;
        self.wrap(step)
    }

    fn on_zero(&mut self) -> Result<Step> {
        done(None::<T>)
    }

    fn on_true(&mut self) -> Result<Step> {
        let step = self.inner.on_true()?;
        self.wrap(step)
    }

    fn on_empty(&mut self) -> Result<Step> {
        let step = self.inner.on_empty()?;
        self.wrap(step)
    }

    fn on_number(&mut self, positive: bool, payload: &[u8]) -> Result<Step> {
        let step = self.inner.on_number(positive, payload)?;
        self.wrap(step)
    }

    fn on_bytes(&mut self, payload: &[u8]) -> Result<Step> {
        let step = self.inner.on_bytes(payload)?;
        self.wrap(step)
    }

    fn on_array(&mut self, len: usize) -> Result<Step> {
        let step = self.inner.on_array(len)?;
        self.wrap(step)
    }

    fn on_version(&mut self, version: &[u8]) -> Result<Step> {
        let step = self.inner.on_version(version)?;
        self.wrap(step)
    }

    fn next_child(&mut self) -> Result<Child> {
        match self.inner.next_child()? {
            Child::Finish(v, n) => Ok(Child::Finish(Box::new(Some(take::<T>(v)?)), n)),
            other => Ok(other),
        }
    }

    fn accept_child(&mut self, value: Box<dyn Any>) -> Result<()> {
        self.inner.accept_child(value)
    }
}

impl<T: Decodable> Decodable for Option<T> {
    fn sink() -> Box<dyn Sink> {
        Box::new(OptionSink::<T>::new())
    }

    fn zero() -> Self {
        None
    }
}

/// Sink for boxed destinations: a pointer that is never nil. All events
/// forward to the pointee; `Zero` therefore produces a boxed zero value.
struct BoxSink<T: Decodable> {
    inner: Box<dyn Sink>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Decodable> BoxSink<T> {
    fn new() -> Self {
        BoxSink {
            inner: T::sink(),
            _marker: PhantomData,
        }
    }

    fn wrap(&self, step: Step) -> Result<Step> {
        match step {
            Step::Done(v) => done(Box::new(take::<T>(v)?)),
            Step::Await => Ok(Step::Await),
        }
    }
}

impl<T: Decodable> Sink for BoxSink<T> {
    fn expecting(&self) -> &'static str {
        type_name::<Box<T>>()
    }

    fn run_custom(&mut self, r: &mut dyn Read) -> Result<Option<(Box<dyn Any>, bool)>> {
        match self.inner.run_custom(r)? {
            None => Ok(None),
            Some((v, nil)) => Ok(Some((Box::new(Box::new(take::<T>(v)?)), nil))),
        }
    }

    fn on_byte(&mut self, b: u8) -> Result<Step> {
        let step = self.inner.on_byte(b)?;
        self.wrap(step)
    }

    fn on_zero(&mut self) -> Result<Step> {
        let step = self.inner.on_zero()?;
        self.wrap(step)
    }

    fn on_true(&mut self) -> Result<Step> {
        let step = self.inner.on_true()?;
        self.wrap(step)
    }

    fn on_empty(&mut self) -> Result<Step> {
        let step = self.inner.on_empty()?;
        self.wrap(step)
    }

    fn on_number(&mut self, positive: bool, payload: &[u8]) -> Result<Step> {
        let step = self.inner.on_number(positive, payload)?;
        self.wrap(step)
    }

    fn on_bytes(&mut self, payload: &[u8]) -> Result<Step> {
        let step = self.inner.on_bytes(payload)?;
        self.wrap(step)
    }

    fn on_array(&mut self, len: usize) -> Result<Step> {
        let step = self.inner.on_array(len)?;
        self.wrap(step)
    }

    fn on_version(&mut self, version: &[u8]) -> Result<Step> {
        let step = self.inner.on_version(version)?;
        self.wrap(step)
    }

    fn next_child(&mut self) -> Result<Child> {
        match self.inner.next_child()? {
            Child::Finish(v, n) => Ok(Child::Finish(Box::new(Box::new(take::<T>(v)?)), n)),
            other => Ok(other),
        }
    }

    fn accept_child(&mut self, value: Box<dyn Any>) -> Result<()> {
        self.inner.accept_child(value)
    }
}

impl<T: Decodable> Decodable for Box<T> {
    fn sink() -> Box<dyn Sink> {
        Box::new(BoxSink::<T>::new())
    }

    fn zero() -> Self {
        Box::new(T::zero())
    }
}
