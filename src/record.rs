//! Record (struct) descriptors: field ordering, versions, and the
//! process-wide descriptor cache.
//!
//! A record encodes as an array of its fields placed at their logical
//! `order`. Orders default to declared position, must be unique, and may
//! leave gaps (filled with `Zero` on encode, skipped on decode). Versions
//! group fields added together across type upgrades; encoding prunes the
//! longest all-zero suffix whose versions exceed the retained prefix, so a
//! value that never touched its newer fields stays byte-compatible with the
//! older type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::decode::{take, Child, Decodable, Sink, Step};
use crate::encode::Encodable;
use crate::error::{Result, RtlError};

/// A field's declared annotations, produced by `rtl_record!`.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    order: i64,
    version: i64,
    skipped: bool,
}

impl FieldSpec {
    pub const fn new(name: &'static str) -> Self {
        FieldSpec {
            name,
            order: -1,
            version: -1,
            skipped: false,
        }
    }

    pub const fn order(mut self, order: u32) -> Self {
        self.order = order as i64;
        self
    }

    pub const fn version(mut self, version: u32) -> Self {
        self.version = version as i64;
        self
    }

    pub const fn skip(mut self) -> Self {
        self.skipped = true;
        self
    }
}

/// One field of a normalized descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMeta {
    /// Index of the field in the struct declaration (skipped fields count).
    pub declared_index: usize,
    pub name: &'static str,
    /// Position of the field in the encoded array.
    pub order: usize,
    pub version: u32,
}

/// A record type's sorted, normalized field list.
#[derive(Debug)]
pub struct Descriptor {
    pub fields: Vec<FieldMeta>,
    /// Encoded array length when nothing is pruned: last order + 1.
    pub field_num: usize,
    pub type_name: &'static str,
}

/// A struct participating in record encoding and decoding. Implemented by
/// the `rtl_record!` macro, not by hand.
pub trait Record: Default + 'static {
    fn field_specs() -> &'static [FieldSpec];

    fn record_name() -> &'static str;

    /// Borrow a field by declared index for encoding.
    fn field_ref(&self, declared_index: usize) -> Option<&dyn Encodable>;

    /// A fresh sink for the field at the declared index.
    fn field_sink(declared_index: usize) -> Option<Box<dyn Sink>>;

    /// Install a finished field value by declared index.
    fn set_field(&mut self, declared_index: usize, value: Box<dyn Any>) -> Result<()>;
}

static DESCRIPTORS: Lazy<RwLock<HashMap<TypeId, &'static Descriptor>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// The cached descriptor for a record type, computed on first use.
/// Computing twice under a race is harmless: the descriptor is a pure
/// function of the type and the losing insert is simply dropped.
pub fn descriptor_of<R: Record>() -> &'static Descriptor {
    let key = TypeId::of::<R>();
    if let Ok(map) = DESCRIPTORS.read() {
        if let Some(d) = map.get(&key) {
            return d;
        }
    }
    let built: &'static Descriptor =
        Box::leak(Box::new(build_descriptor(R::field_specs(), R::record_name())));
    if let Ok(mut map) = DESCRIPTORS.write() {
        return *map.entry(key).or_insert(built);
    }
    built
}

/// Sorts by `(order, declared index)` and normalizes defaults. Panics on
/// malformed annotations, which are programming errors in the type
/// definition: a negative-effective order, a duplicate order, or a version
/// that decreases along the sorted list.
fn build_descriptor(specs: &[FieldSpec], type_name: &'static str) -> Descriptor {
    let mut fields: Vec<(usize, FieldSpec)> = specs
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.skipped)
        .map(|(i, s)| (i, *s))
        .collect();
    fields.sort_by(|a, b| (a.1.order, a.0).cmp(&(b.1.order, b.0)));

    let mut metas: Vec<FieldMeta> = Vec::with_capacity(fields.len());
    let mut prev_version: i64 = 0;
    for (i, (declared_index, spec)) in fields.iter().enumerate() {
        let order = if spec.order < 0 {
            i as i64
        } else {
            if spec.order < i as i64 {
                panic!(
                    "record {type_name}: field {} order {} collides below position {i}",
                    spec.name, spec.order
                );
            }
            spec.order
        };
        if let Some(last) = metas.last() {
            if last.order as i64 == order {
                panic!(
                    "record {type_name}: duplicate order {order} on field {}",
                    spec.name
                );
            }
        }
        let version = if spec.version < 0 {
            if i == 0 {
                0
            } else {
                prev_version
            }
        } else {
            if i > 0 && spec.version < prev_version {
                panic!(
                    "record {type_name}: field {} version {} decreases below {prev_version}",
                    spec.name, spec.version
                );
            }
            spec.version
        };
        prev_version = version;
        metas.push(FieldMeta {
            declared_index: *declared_index,
            name: spec.name,
            order: order as usize,
            version: version as u32,
        });
    }
    let field_num = metas.last().map(|f| f.order + 1).unwrap_or(0);
    Descriptor {
        fields: metas,
        field_num,
        type_name,
    }
}

/// Selects the emitted field prefix for one value: retain the longest prefix
/// such that the dropped suffix holds only zero-valued fields whose version
/// exceeds the retained prefix's maximum version. Fields of version 0 are
/// always retained.
pub(crate) fn versioned_fields<'d, R: Record>(
    rec: &R,
    desc: &'d Descriptor,
) -> (usize, &'d [FieldMeta]) {
    let fields = &desc.fields[..];
    if fields.is_empty() {
        return (0, fields);
    }
    let mut max_index = fields.len() - 1;
    let mut max_version = fields[max_index].version;
    if max_version == 0 || max_version == fields[0].version {
        return (fields[max_index].order + 1, fields);
    }
    let mut i = fields.len();
    while i > 0 {
        i -= 1;
        if max_version > fields[i].version {
            max_version = fields[i].version;
            max_index = i;
        }
        if max_version == 0 {
            break;
        }
        let zero = rec
            .field_ref(fields[i].declared_index)
            .map(|f| f.is_zero())
            .unwrap_or(true);
        if !zero {
            break;
        }
    }
    (fields[max_index].order + 1, &fields[..max_index + 1])
}

/// Decode sink for record destinations: walks the sorted field list and the
/// encoded array positionally, skipping data at order gaps and leaving
/// unfilled fields at their zero.
pub struct RecordSink<R: Record> {
    value: R,
    data_size: i64,
    data_idx: i64,
    field_idx: i64,
    started: bool,
}

impl<R: Record> RecordSink<R> {
    pub fn new() -> Self {
        RecordSink {
            value: R::default(),
            data_size: 0,
            data_idx: -1,
            field_idx: -1,
            started: false,
        }
    }
}

impl<R: Record> Default for RecordSink<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> Sink for RecordSink<R> {
    fn expecting(&self) -> &'static str {
        R::record_name()
    }

    fn on_zero(&mut self) -> Result<Step> {
        Ok(Step::Done(Box::new(R::default())))
    }

    fn on_array(&mut self, len: usize) -> Result<Step> {
        self.data_size = len as i64;
        self.started = true;
        Ok(Step::Await)
    }

    fn next_child(&mut self) -> Result<Child> {
        if !self.started {
            return Err(RtlError::InvalidValue("record sink not started"));
        }
        let desc = descriptor_of::<R>();
        let next_field = self.field_idx + 1;
        if (next_field as usize) < desc.fields.len() {
            let field_order = desc.fields[next_field as usize].order as i64;
            self.data_idx += 1;
            if self.data_idx < self.data_size {
                if self.data_idx == field_order {
                    let declared = desc.fields[next_field as usize].declared_index;
                    self.field_idx = next_field;
                    let sink = R::field_sink(declared)
                        .ok_or(RtlError::InvalidValue("record field index out of range"))?;
                    return Ok(Child::Read(sink));
                } else if self.data_idx < field_order {
                    return Ok(Child::Skip(1));
                }
                return Err(RtlError::IllegalOrder {
                    data_index: self.data_idx as usize,
                    order: field_order as usize,
                });
            }
        }
        // Remaining fields keep their zero from Default. Skip whatever
        // encoded elements the field list did not cover.
        let remaining = self.data_size - 1 - self.data_idx;
        let skip = if remaining > 0 { remaining as usize } else { 0 };
        Ok(Child::Finish(
            Box::new(std::mem::take(&mut self.value)),
            skip,
        ))
    }

    fn accept_child(&mut self, value: Box<dyn Any>) -> Result<()> {
        let desc = descriptor_of::<R>();
        let declared = desc
            .fields
            .get(self.field_idx as usize)
            .map(|f| f.declared_index)
            .ok_or(RtlError::InvalidValue("record sink accepted without a field"))?;
        self.value.set_field(declared, value)
    }
}

/// Moves a finished field value into a concrete field slot.
pub fn install_field<T: Decodable>(slot: &mut T, value: Box<dyn Any>) -> Result<()> {
    *slot = take::<T>(value)?;
    Ok(())
}

/// Declares a struct as an RTL record, generating the struct itself plus
/// its `Record`, `Encodable`, and `Decodable` implementations.
///
/// Field annotations mirror the wire semantics: `#[rtl(order = N)]` pins the
/// encoded position, `#[rtl(version = N)]` tags the upgrade generation, and
/// `#[rtl(skip)]` leaves the field out entirely. The struct must provide (or
/// derive) `Default`.
///
/// ```
/// rtl::rtl_record! {
///     #[derive(Debug, Default, Clone, PartialEq)]
///     pub struct Account {
///         pub id: u64,
///         pub name: String,
///         #[rtl(order = 5, version = 1)]
///         pub flags: u32,
///     }
/// }
/// ```
#[macro_export]
macro_rules! rtl_record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[rtl($($opt:tt)*)])?
                $fvis:vis $fname:ident : $ftyp:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $fvis $fname : $ftyp, )*
        }

        impl $crate::Record for $name {
            fn field_specs() -> &'static [$crate::FieldSpec] {
                const FIELDS: &[$crate::FieldSpec] = &[
                    $(
                        $crate::__rtl_field_spec!(
                            $crate::FieldSpec::new(stringify!($fname))
                            $(, $($opt)*)?
                        ),
                    )*
                ];
                FIELDS
            }

            fn record_name() -> &'static str {
                stringify!($name)
            }

            fn field_ref(&self, declared_index: usize) -> Option<&dyn $crate::Encodable> {
                let mut i = 0usize;
                $(
                    if declared_index == i {
                        return Some(&self.$fname);
                    }
                    i += 1;
                )*
                let _ = i;
                None
            }

            fn field_sink(declared_index: usize) -> Option<Box<dyn $crate::Sink>> {
                let mut i = 0usize;
                $(
                    if declared_index == i {
                        return Some(<$ftyp as $crate::Decodable>::sink());
                    }
                    i += 1;
                )*
                let _ = i;
                None
            }

            fn set_field(
                &mut self,
                declared_index: usize,
                value: ::std::boxed::Box<dyn ::std::any::Any>,
            ) -> $crate::Result<()> {
                let mut i = 0usize;
                $(
                    if declared_index == i {
                        return $crate::record::install_field(&mut self.$fname, value);
                    }
                    i += 1;
                )*
                let _ = i;
                let _ = value;
                Err($crate::RtlError::InvalidValue("record field index out of range"))
            }
        }

        impl $crate::Encodable for $name {
            fn write_value(
                &self,
                w: &mut dyn ::std::io::Write,
                nesting: usize,
            ) -> $crate::Result<usize> {
                $crate::encode::write_record(self, w, nesting)
            }

            fn is_zero(&self) -> bool {
                let mut zero = true;
                $(
                    zero = zero && $crate::Encodable::is_zero(&self.$fname);
                )*
                zero
            }
        }

        impl $crate::Decodable for $name {
            fn sink() -> ::std::boxed::Box<dyn $crate::Sink> {
                ::std::boxed::Box::new($crate::record::RecordSink::<$name>::new())
            }

            fn zero() -> Self {
                <$name as ::std::default::Default>::default()
            }
        }
    };
}

/// Folds `#[rtl(...)]` options into a `FieldSpec`. Internal to
/// [`rtl_record!`].
#[doc(hidden)]
#[macro_export]
macro_rules! __rtl_field_spec {
    ($spec:expr) => { $spec };
    ($spec:expr, order = $o:expr) => { $spec.order($o) };
    ($spec:expr, order = $o:expr, $($rest:tt)+) => {
        $crate::__rtl_field_spec!($spec.order($o), $($rest)+)
    };
    ($spec:expr, version = $v:expr) => { $spec.version($v) };
    ($spec:expr, version = $v:expr, $($rest:tt)+) => {
        $crate::__rtl_field_spec!($spec.version($v), $($rest)+)
    };
    ($spec:expr, skip) => { $spec.skip() };
    ($spec:expr, skip, $($rest:tt)+) => {
        $crate::__rtl_field_spec!($spec.skip(), $($rest)+)
    };
}
