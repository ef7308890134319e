//! The RTL header codec: the bit-level mapping between lead bytes and tags.
//!
//! Every encoded value starts with a one-byte header. The high bits select
//! one of fourteen disjoint tags; the low bits carry either an inline value
//! (`SingleByte`, `Version`), a payload length (`StringSingle`,
//! `PosNumSingle`, ...), an element count (`ArraySingle`), or the byte-length
//! of a big-endian count that follows the header (`ArrayMulti`,
//! `StringMulti`, ...). Low bits of all zeroes in a length field denote the
//! maximum, not zero, because counts are emitted with leading zero bytes
//! stripped and a length of zero never reaches the wire.

use crate::error::{Result, RtlError};
use crate::numeric;

/// How a tag's low bits are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderForm {
    /// The header byte is the whole value; no count, no payload.
    Inline,
    /// The low bits are a payload length or element count directly.
    Single,
    /// The low bits are the byte-length of a big-endian count that follows.
    Multi,
}

/// The fourteen RTL header tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// `0xxxxxxx` — the low seven bits are the value itself (0–127).
    SingleByte,
    /// `10000000` — nil / false / "" / 0 / zero-length fixed array.
    Zero,
    /// `10000001` — boolean true.
    True,
    /// `10000010` — empty (non-nil) sequence or map.
    Empty,
    /// `1001NNNN` — array of 1–16 elements (`0000` means 16).
    ArraySingle,
    /// `10001LLL` — array; LLL bytes of big-endian element count follow.
    ArrayMulti,
    /// `10100LLL` — positive number, 1–8 magnitude bytes (`000` means 8).
    PosNumSingle,
    /// `10101LLL` — negative number, 1–8 magnitude bytes.
    NegNumSingle,
    /// `10110LLL` — positive big integer; LLL bytes of magnitude length follow.
    PosBigInt,
    /// `10111LLL` — negative big integer.
    NegBigInt,
    /// `110NNNNN` — string/bytes of 1–32 payload bytes (`00000` means 32).
    StringSingle,
    /// `11100LLL` — string/bytes; LLL bytes of payload length follow.
    StringMulti,
    /// `1111VVVV` — inline version 0–15.
    Version,
    /// `11101LLL` — version; LLL bytes of big-endian version follow.
    VersionMulti,
}

/// Match order for [`parse`]. Patterns are disjoint, so order only matters
/// for performance; exact-byte sentinels go before the masked families.
const TAGS: [Tag; 14] = [
    Tag::SingleByte,
    Tag::Zero,
    Tag::True,
    Tag::Empty,
    Tag::ArrayMulti,
    Tag::ArraySingle,
    Tag::PosNumSingle,
    Tag::NegNumSingle,
    Tag::PosBigInt,
    Tag::NegBigInt,
    Tag::StringSingle,
    Tag::StringMulti,
    Tag::VersionMulti,
    Tag::Version,
];

impl Tag {
    /// The fixed high bits of this tag's pattern.
    pub const fn code(self) -> u8 {
        match self {
            Tag::SingleByte => 0x00,
            Tag::Zero => 0x80,
            Tag::True => 0x81,
            Tag::Empty => 0x82,
            Tag::ArrayMulti => 0x88,
            Tag::ArraySingle => 0x90,
            Tag::PosNumSingle => 0xA0,
            Tag::NegNumSingle => 0xA8,
            Tag::PosBigInt => 0xB0,
            Tag::NegBigInt => 0xB8,
            Tag::StringSingle => 0xC0,
            Tag::StringMulti => 0xE0,
            Tag::VersionMulti => 0xE8,
            Tag::Version => 0xF0,
        }
    }

    /// The mask selecting this tag's fixed bits.
    pub const fn mask(self) -> u8 {
        match self {
            Tag::SingleByte => 0x80,
            Tag::Zero | Tag::True | Tag::Empty => 0xFF,
            Tag::ArraySingle | Tag::Version => 0xF0,
            Tag::StringSingle => 0xE0,
            _ => 0xF8,
        }
    }

    /// The wildcard bits carrying this tag's packed number.
    pub const fn wildcard(self) -> u8 {
        !self.mask()
    }

    pub const fn form(self) -> HeaderForm {
        match self {
            Tag::SingleByte | Tag::Zero | Tag::True | Tag::Empty | Tag::Version => {
                HeaderForm::Inline
            }
            Tag::ArraySingle
            | Tag::PosNumSingle
            | Tag::NegNumSingle
            | Tag::StringSingle
            | Tag::VersionMulti => HeaderForm::Single,
            Tag::ArrayMulti | Tag::PosBigInt | Tag::NegBigInt | Tag::StringMulti => {
                HeaderForm::Multi
            }
        }
    }

    /// Whether the header is followed by nested encoded values.
    pub const fn nested(self) -> bool {
        matches!(self, Tag::ArraySingle | Tag::ArrayMulti)
    }

    /// Whether the header (after any count resolution) is followed by raw
    /// payload bytes that the decoder buffers before dispatch.
    pub const fn has_payload(self) -> bool {
        matches!(
            self,
            Tag::PosNumSingle
                | Tag::NegNumSingle
                | Tag::PosBigInt
                | Tag::NegBigInt
                | Tag::StringSingle
                | Tag::StringMulti
                | Tag::VersionMulti
        )
    }

    /// Mnemonic used in error messages.
    pub const fn name(self) -> &'static str {
        match self {
            Tag::SingleByte => "Byte",
            Tag::Zero => "Zero",
            Tag::True => "True",
            Tag::Empty => "Empty",
            Tag::ArraySingle => "Array",
            Tag::ArrayMulti => "Array+",
            Tag::PosNumSingle => "PosNum",
            Tag::NegNumSingle => "NegNum",
            Tag::PosBigInt => "PosNum+",
            Tag::NegBigInt => "NegNum+",
            Tag::StringSingle => "String",
            Tag::StringMulti => "String+",
            Tag::Version => "Ver",
            Tag::VersionMulti => "Ver+",
        }
    }

    /// Packs `n` into the tag's wildcard bits.
    pub const fn with_number(self, n: u8) -> u8 {
        self.code() | (n & self.wildcard())
    }
}

/// Parses one lead byte into its tag and packed number.
///
/// For inline tags the number is the value itself. For single and multi
/// headers it is the payload length, element count, or length-of-length,
/// where all-zero wildcard bits decode as `wildcard + 1` (the maximum).
pub fn parse(b: u8) -> Result<(Tag, usize)> {
    for tag in TAGS {
        if b & tag.mask() != tag.code() {
            continue;
        }
        let n = (b & tag.wildcard()) as usize;
        return match tag.form() {
            HeaderForm::Inline => Ok((tag, n)),
            HeaderForm::Single | HeaderForm::Multi => {
                if n == 0 {
                    Ok((tag, tag.wildcard() as usize + 1))
                } else {
                    Ok((tag, n))
                }
            }
        };
    }
    Err(RtlError::UnsupportedHeader(b))
}

/// Maximum bytes any header can occupy: 1 tag byte + an 8-byte count.
pub const MAX_HEADER_BYTES: usize = 9;

/// The `Zero` sentinel byte: nil, false, "", 0, zero-length fixed array.
pub const ZERO_BYTE: u8 = 0x80;
/// The `True` sentinel byte.
pub const TRUE_BYTE: u8 = 0x81;
/// The `Empty` sentinel byte: empty non-nil sequence or map.
pub const EMPTY_BYTE: u8 = 0x82;

/// Emits a string/bytes header for a payload of `len` bytes into `buf`,
/// returning the number of header bytes written. `len == 0` writes nothing.
pub fn string_header(len: usize, buf: &mut [u8; MAX_HEADER_BYTES]) -> Result<usize> {
    if len == 0 {
        return Ok(0);
    }
    if len <= 32 {
        buf[0] = Tag::StringSingle.with_number(len as u8);
        return Ok(1);
    }
    let l = numeric::write_uint(&mut buf[1..], len as u64)?;
    buf[0] = Tag::StringMulti.with_number(l as u8);
    Ok(l + 1)
}

/// Emits an array header for `len` elements. `len == 0` writes nothing.
pub fn array_header(len: usize, buf: &mut [u8; MAX_HEADER_BYTES]) -> Result<usize> {
    if len == 0 {
        return Ok(0);
    }
    if len <= 16 {
        buf[0] = Tag::ArraySingle.with_number(len as u8);
        return Ok(1);
    }
    let l = numeric::write_uint(&mut buf[1..], len as u64)?;
    buf[0] = Tag::ArrayMulti.with_number(l as u8);
    Ok(l + 1)
}

/// Emits a numeric header for a magnitude of `payload_len` stripped bytes.
/// `payload_len == 0` writes nothing.
pub fn numeric_header(
    negative: bool,
    payload_len: usize,
    buf: &mut [u8; MAX_HEADER_BYTES],
) -> Result<usize> {
    if payload_len == 0 {
        return Ok(0);
    }
    if payload_len <= 8 {
        let tag = if negative {
            Tag::NegNumSingle
        } else {
            Tag::PosNumSingle
        };
        buf[0] = tag.with_number(payload_len as u8);
        return Ok(1);
    }
    let l = numeric::write_uint(&mut buf[1..], payload_len as u64)?;
    let tag = if negative { Tag::NegBigInt } else { Tag::PosBigInt };
    buf[0] = tag.with_number(l as u8);
    Ok(l + 1)
}

/// Emits a version header: one `Version` byte for `v <= 15`, otherwise a
/// `VersionMulti` header followed by the stripped big-endian version bytes.
pub fn version_header(v: u64, buf: &mut [u8; MAX_HEADER_BYTES]) -> Result<usize> {
    if v <= 15 {
        buf[0] = Tag::Version.with_number(v as u8);
        return Ok(1);
    }
    let l = numeric::write_uint(&mut buf[1..], v)?;
    buf[0] = Tag::VersionMulti.with_number(l as u8);
    Ok(l + 1)
}
