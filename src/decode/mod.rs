//! The stack-driven decoder engine: RTL bytes → host values.
//!
//! A decode runs as a loop over a heap-allocated stack of frames. Each frame
//! owns a [`Sink`] — an erased builder for one destination value. When a
//! frame has no nested iteration state, the engine reads one full header
//! (resolving multi-header counts and buffering any payload bytes) and
//! dispatches the corresponding event to the sink. Sinks either complete
//! (`Step::Done`, popping the frame and handing the finished value to the
//! parent) or install iteration state (`Step::Await`), after which the engine
//! pulls child actions from them: push a child frame, push a child primed
//! with a single-byte event, skip encoded values, or finish.
//!
//! Nothing in the engine recurses; nesting depth is bounded by `MAX_NESTED`
//! frames.

pub(crate) mod sinks;

use std::any::Any;
use std::io::Read;

use crate::error::{Result, RtlError};
use crate::header::Tag;
use crate::reader::ValueReader;
use crate::MAX_NESTED;

/// Outcome of dispatching one header event to a sink.
pub enum Step {
    /// The destination is complete; pop the frame and deliver the value.
    Done(Box<dyn Any>),
    /// The sink installed nested iteration state; pull children from it.
    Await,
}

/// A child action produced by a sink's iteration state.
pub enum Child {
    /// Push a child frame; its header has not been read yet.
    Read(Box<dyn Sink>),
    /// Push a child frame primed with an inline `SingleByte` event. Used when
    /// a string payload decodes element-wise into a non-byte sequence.
    Byte(Box<dyn Sink>, u8),
    /// Skip `n` whole encoded values, then ask again.
    Skip(usize),
    /// Skip `n` whole encoded values, then pop with the finished value.
    Finish(Box<dyn Any>, usize),
}

/// An erased builder for one destination value.
///
/// Default event handlers reject with `TypeMismatch`: a destination kind
/// accepts exactly the headers of its row in the acceptance table.
pub trait Sink {
    /// Destination description used in mismatch errors.
    fn expecting(&self) -> &'static str;

    /// Runs a user deserialization hook, if this destination has one.
    /// Returns the finished value plus a should-be-nil flag consumed by
    /// enclosing optional destinations.
    fn run_custom(&mut self, _r: &mut dyn Read) -> Result<Option<(Box<dyn Any>, bool)>> {
        Ok(None)
    }

    fn on_byte(&mut self, _b: u8) -> Result<Step> {
        Err(RtlError::mismatch(self.expecting(), Tag::SingleByte.name()))
    }

    fn on_zero(&mut self) -> Result<Step> {
        Err(RtlError::mismatch(self.expecting(), Tag::Zero.name()))
    }

    fn on_true(&mut self) -> Result<Step> {
        Err(RtlError::mismatch(self.expecting(), Tag::True.name()))
    }

    fn on_empty(&mut self) -> Result<Step> {
        Err(RtlError::mismatch(self.expecting(), Tag::Empty.name()))
    }

    fn on_number(&mut self, positive: bool, _payload: &[u8]) -> Result<Step> {
        let tag = if positive { Tag::PosNumSingle } else { Tag::NegNumSingle };
        Err(RtlError::mismatch(self.expecting(), tag.name()))
    }

    fn on_bytes(&mut self, _payload: &[u8]) -> Result<Step> {
        Err(RtlError::mismatch(self.expecting(), Tag::StringSingle.name()))
    }

    fn on_array(&mut self, _len: usize) -> Result<Step> {
        Err(RtlError::mismatch(self.expecting(), Tag::ArraySingle.name()))
    }

    fn on_version(&mut self, _version: &[u8]) -> Result<Step> {
        Err(RtlError::mismatch(self.expecting(), Tag::Version.name()))
    }

    fn next_child(&mut self) -> Result<Child> {
        Err(RtlError::InvalidValue("sink has no nested state"))
    }

    fn accept_child(&mut self, _value: Box<dyn Any>) -> Result<()> {
        Err(RtlError::InvalidValue("sink accepts no children"))
    }
}

/// A destination type RTL can decode into.
pub trait Decodable: Sized + 'static {
    /// A fresh sink for one value of this type.
    fn sink() -> Box<dyn Sink>;

    /// This type's zero value, used for unfilled sequence tails.
    fn zero() -> Self;
}

/// Moves a finished child value out of its erased box.
pub(crate) fn take<T: 'static>(value: Box<dyn Any>) -> Result<T> {
    value
        .downcast::<T>()
        .map(|b| *b)
        .map_err(|_| RtlError::InvalidValue("finished child has unexpected type"))
}

struct Frame {
    sink: Box<dyn Sink>,
    pending: Option<(Tag, usize, Vec<u8>)>,
    awaiting: bool,
    custom_checked: bool,
}

impl Frame {
    fn fresh(sink: Box<dyn Sink>) -> Self {
        Frame {
            sink,
            pending: None,
            awaiting: false,
            custom_checked: false,
        }
    }

    fn primed(sink: Box<dyn Sink>, b: u8) -> Self {
        Frame {
            sink,
            pending: Some((Tag::SingleByte, b as usize, Vec::new())),
            awaiting: false,
            custom_checked: true,
        }
    }
}

enum Act {
    Push(Frame),
    Skip(usize),
    Deliver(Box<dyn Any>),
    DeliverSkipping(Box<dyn Any>, usize),
    Stay,
}

fn drive<R: Read>(r: &mut ValueReader<R>, root: Box<dyn Sink>) -> Result<Box<dyn Any>> {
    let mut stack = vec![Frame::fresh(root)];
    loop {
        if stack.len() > MAX_NESTED {
            return Err(RtlError::NestingOverflow);
        }
        let act = {
            let frame = match stack.last_mut() {
                Some(f) => f,
                None => return Err(RtlError::InvalidValue("empty decode stack")),
            };
            if frame.awaiting {
                match frame.sink.next_child()? {
                    Child::Read(sink) => Act::Push(Frame::fresh(sink)),
                    Child::Byte(sink, b) => Act::Push(Frame::primed(sink, b)),
                    Child::Skip(n) => Act::Skip(n),
                    Child::Finish(v, n) => Act::DeliverSkipping(v, n),
                }
            } else if !frame.custom_checked && frame.pending.is_none() {
                frame.custom_checked = true;
                match frame.sink.run_custom(r)? {
                    Some((v, _should_be_nil)) => Act::Deliver(v),
                    None => Act::Stay,
                }
            } else {
                if frame.pending.is_none() {
                    let (tag, length) = r.read_full_header()?;
                    let payload = if tag.has_payload() {
                        r.read_bytes(length)?
                    } else {
                        Vec::new()
                    };
                    frame.pending = Some((tag, length, payload));
                }
                let Frame {
                    sink,
                    pending,
                    awaiting,
                    ..
                } = &mut *frame;
                let (tag, length, payload) = match pending {
                    Some((t, l, p)) => (*t, *l, &p[..]),
                    None => return Err(RtlError::InvalidValue("missing pending header")),
                };
                let step = match tag {
                    Tag::SingleByte => sink.on_byte(length as u8),
                    Tag::Zero => sink.on_zero(),
                    Tag::True => sink.on_true(),
                    Tag::Empty => sink.on_empty(),
                    Tag::ArraySingle | Tag::ArrayMulti => sink.on_array(length),
                    Tag::PosNumSingle | Tag::PosBigInt => sink.on_number(true, payload),
                    Tag::NegNumSingle | Tag::NegBigInt => sink.on_number(false, payload),
                    Tag::StringSingle | Tag::StringMulti => sink.on_bytes(payload),
                    Tag::Version => sink.on_version(&[length as u8]),
                    Tag::VersionMulti => sink.on_version(payload),
                }?;
                match step {
                    Step::Done(v) => Act::Deliver(v),
                    Step::Await => {
                        *awaiting = true;
                        Act::Stay
                    }
                }
            }
        };
        match act {
            Act::Push(frame) => stack.push(frame),
            Act::Skip(n) => {
                for _ in 0..n {
                    r.skip()?;
                }
            }
            Act::Deliver(v) => {
                if let Some(out) = deliver(&mut stack, v)? {
                    return Ok(out);
                }
            }
            Act::DeliverSkipping(v, n) => {
                for _ in 0..n {
                    r.skip()?;
                }
                if let Some(out) = deliver(&mut stack, v)? {
                    return Ok(out);
                }
            }
            Act::Stay => {}
        }
    }
}

fn deliver(stack: &mut Vec<Frame>, value: Box<dyn Any>) -> Result<Option<Box<dyn Any>>> {
    stack.pop();
    match stack.last_mut() {
        None => Ok(Some(value)),
        Some(parent) => {
            parent.sink.accept_child(value)?;
            Ok(None)
        }
    }
}

/// Decodes one value of type `T` from the reader.
pub fn decode<T: Decodable, R: Read>(r: &mut ValueReader<R>) -> Result<T> {
    take::<T>(drive(r, T::sink())?)
}

/// Decodes one value of type `T` from any byte source.
pub fn decode_from<T: Decodable, R: Read>(source: R) -> Result<T> {
    decode(&mut ValueReader::new(source))
}

/// Decodes one value of type `T` from an in-memory buffer.
pub fn unmarshal<T: Decodable>(buf: &[u8]) -> Result<T> {
    decode(&mut ValueReader::from_slice(buf))
}
