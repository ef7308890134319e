//! RTL — a recursive, typed and length-prefixed binary serialization format.
//!
//! Every encoded value starts with a one-byte header carrying a type tag and
//! either an inline value or a (length of a) payload length; composite
//! values are length-prefixed sequences of nested encodings. Values 0–127
//! encode as themselves, so small integers and ASCII stay one byte.
//!
//! # Architecture
//!
//! - **`header`** — the bit-level tag table and header emit/parse
//! - **`numeric`** — big-endian, zero-stripped integer and float conversions
//! - **`reader`** — a counting byte source with header reads, bounded
//!   multi-lengths, whole-value skip, and sticky EOF
//! - **`encode`** — the recursive value-directed writer engine
//! - **`decode`** — the stack-driven decoder: a frame machine over erased
//!   destination sinks, no recursion
//! - **`record`** — struct field descriptors (order, version, skip), the
//!   process-wide descriptor cache, and the [`rtl_record!`] macro
//! - **`value`** — [`RtlValue`], the dynamic value form
//! - **`priors`** — big integer, big rational, big float, and timestamp
//!   codecs routed ahead of structural dispatch
//! - **`hooks`** — user codec hooks that own their framing
//!
//! # Example
//!
//! ```
//! use rtl::{marshal, unmarshal};
//!
//! rtl::rtl_record! {
//!     #[derive(Debug, Default, Clone, PartialEq)]
//!     pub struct Point {
//!         pub x: u64,
//!         pub y: u64,
//!         pub label: String,
//!     }
//! }
//!
//! let p = Point { x: 3, y: 7, label: "origin-ish".into() };
//! let bytes = marshal(&p).unwrap();
//! let back: Point = unmarshal(&bytes).unwrap();
//! assert_eq!(p, back);
//! ```

pub mod decode;
pub mod encode;
pub mod error;
pub mod header;
pub mod hooks;
pub mod numeric;
pub mod priors;
pub mod reader;
pub mod record;
pub mod value;

pub use decode::{decode, decode_from, unmarshal, Child, Decodable, Sink, Step};
pub use encode::{encode, marshal, Encodable};
pub use error::{Result, RtlError};
pub use header::Tag;
pub use hooks::{Deserialization, Serialization};
pub use priors::{BigFloat, Binary, Timestamp};
pub use reader::{ValueReader, MAX_VALUE_BYTES};
pub use record::{Descriptor, FieldSpec, Record};
pub use value::RtlValue;

/// Maximum recursion depth for encoding and decoding. Pointer cycles and
/// hostile inputs both bottom out here.
pub const MAX_NESTED: usize = 100;
