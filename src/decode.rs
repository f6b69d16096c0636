use crate::{
    error::{Error, ErrorHandler},
    tags::Registry,
    value::Value,
};
use std::sync::Arc;
use tracing::trace;

/// Called for tags with no read handler; the default passes the inner value
/// through as [`Value::Tagged`].
pub type UnknownTagHandler = dyn Fn(u64, Value) -> Result<Value, Error> + Send + Sync;

/// Per-call decoder configuration.
///
/// The length ceilings bound the allocation a single hostile item can force.
/// They apply to an individual item, not the whole stream, so callers should
/// still cap the total input size.
#[derive(Clone)]
pub struct DecodeOptions {
    /// Maximum length of a byte string, chunked strings included.
    pub max_len_bytes: usize,
    /// Maximum length of a text string, chunked strings included.
    pub max_len_text: usize,
    /// Maximum number of array elements.
    pub max_len_array: usize,
    /// Maximum number of map entries.
    pub max_size_map: usize,
    /// Maximum nesting depth of containers and tags.
    pub max_recursion: usize,
    /// Reject maps with duplicate keys.
    pub strict_keys: bool,
    pub error_handler: Option<Arc<ErrorHandler>>,
    pub unknown_tag: Option<Arc<UnknownTagHandler>>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_len_bytes: 0x50_0000,
            max_len_text: 0x50_0000,
            max_len_array: 1000,
            max_size_map: 1000,
            max_recursion: 16,
            strict_keys: true,
            error_handler: None,
            unknown_tag: None,
        }
    }
}

struct Reader<'a, 'o> {
    data: &'a [u8],
    offset: usize,
    registry: &'o Registry,
    options: &'o DecodeOptions,
}

impl<'a> Reader<'a, '_> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        let end = self.offset.checked_add(n).ok_or(Error::Underflow)?;
        if end > self.data.len() {
            return Err(Error::Underflow);
        }
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn take_byte(&mut self) -> Result<u8, Error> {
        let b = *self.data.get(self.offset).ok_or(Error::Underflow)?;
        self.offset += 1;
        Ok(b)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        Ok(self.take(N)?.try_into().unwrap())
    }

    fn peek(&self) -> Result<u8, Error> {
        self.data.get(self.offset).copied().ok_or(Error::Underflow)
    }

    fn parse_uint_minor(&mut self, minor: u8) -> Result<u64, Error> {
        match minor {
            val if val < 24 => Ok(val as u64),
            24 => Ok(self.take_byte()? as u64),
            25 => Ok(u16::from_be_bytes(self.take_array()?) as u64),
            26 => Ok(u32::from_be_bytes(self.take_array()?) as u64),
            27 => Ok(u64::from_be_bytes(self.take_array()?)),
            _ => Err(Error::ReservedLength(minor)),
        }
    }

    fn checked_len(&self, len: u64, max: usize) -> Result<usize, Error> {
        if len > max as u64 {
            Err(Error::ItemTooLarge { max, actual: len })
        } else {
            Ok(len as usize)
        }
    }

    /// Offer `err` to the injected handler. The caller must already have
    /// consumed the malformed construct, so a substitution resumes cleanly.
    fn recover(&self, err: Error) -> Result<Value, Error> {
        if let Some(handler) = &self.options.error_handler {
            if let Some(replacement) = handler(err.kind(), &err.to_string()) {
                trace!(
                    kind = err.kind().as_str(),
                    "substituted replacement for malformed item"
                );
                return Ok(replacement);
            }
        }
        Err(err)
    }

    fn parse_value(&mut self, depth: usize) -> Result<Value, Error> {
        let b = self.take_byte()?;
        match (b >> 5, b & 0x1F) {
            (0, minor) => Ok(Value::UnsignedInteger(self.parse_uint_minor(minor)?)),
            (1, minor) => Ok(Value::NegativeInteger(self.parse_uint_minor(minor)?)),
            (2, 31) => self.parse_byte_chunks(),
            (2, minor) => {
                let len = self.parse_uint_minor(minor)?;
                let len = self.checked_len(len, self.options.max_len_bytes)?;
                Ok(Value::Bytes(self.take(len)?.to_vec()))
            }
            (3, 31) => self.parse_text_chunks(),
            (3, minor) => {
                let len = self.parse_uint_minor(minor)?;
                let len = self.checked_len(len, self.options.max_len_text)?;
                let body = self.take(len)?;
                match core::str::from_utf8(body) {
                    Ok(s) => Ok(Value::Text(s.to_string())),
                    Err(e) => self.recover(e.into()),
                }
            }
            (4, 31) => {
                if depth == 0 {
                    return Err(Error::MaxRecursion);
                }
                self.parse_indefinite_array(depth - 1)
            }
            (4, minor) => {
                if depth == 0 {
                    return Err(Error::MaxRecursion);
                }
                let count = self.parse_uint_minor(minor)?;
                let count = self.checked_len(count, self.options.max_len_array)?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.parse_value(depth - 1)?);
                }
                Ok(Value::Array(items))
            }
            (5, 31) => {
                if depth == 0 {
                    return Err(Error::MaxRecursion);
                }
                self.parse_indefinite_map(depth - 1)
            }
            (5, minor) => {
                if depth == 0 {
                    return Err(Error::MaxRecursion);
                }
                let count = self.parse_uint_minor(minor)?;
                let count = self.checked_len(count, self.options.max_size_map)?;
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    let key = self.parse_value(depth - 1)?;
                    let value = self.parse_value(depth - 1)?;
                    self.push_entry(&mut entries, key, value)?;
                }
                Ok(Value::Map(entries))
            }
            (6, 31) => Err(Error::IllegalStream),
            (6, minor) => {
                if depth == 0 {
                    return Err(Error::MaxRecursion);
                }
                let tag = self.parse_uint_minor(minor)?;
                let inner = self.parse_value(depth - 1)?;
                self.apply_tag(tag, inner)
            }
            (7, 20) => Ok(Value::False),
            (7, 21) => Ok(Value::True),
            (7, 22) => Ok(Value::Null),
            (7, 23) => Ok(Value::Undefined),
            (7, minor @ 0..=19) => Ok(Value::Simple(minor)),
            (7, 24) => {
                let v = self.take_byte()?;
                if v < 32 {
                    self.recover(Error::ReservedSimple(v))
                } else {
                    Ok(Value::Simple(v))
                }
            }
            (7, 25) => Ok(Value::Float(
                half::f16::from_be_bytes(self.take_array()?).into(),
            )),
            (7, 26) => Ok(Value::Float(f32::from_be_bytes(self.take_array()?).into())),
            (7, 27) => Ok(Value::Float(f64::from_be_bytes(self.take_array()?))),
            (7, 31) => Err(Error::UnexpectedBreak),
            (7, minor) => Err(Error::ReservedLength(minor)),
            (8.., _) => unreachable!(),
        }
    }

    /// A chunk header must carry the enclosing major type and a definite
    /// length; anything else is an illegal chunk, including a nested
    /// indefinite-length string of the same type.
    fn parse_chunk_len(&mut self, major: u8, max: usize) -> Result<Option<usize>, Error> {
        let b = self.take_byte()?;
        if b == 0xFF {
            return Ok(None);
        }
        if b >> 5 != major || b & 0x1F == 31 {
            return Err(Error::IllegalChunk);
        }
        let len = self.parse_uint_minor(b & 0x1F)?;
        Ok(Some(self.checked_len(len, max)?))
    }

    fn parse_byte_chunks(&mut self) -> Result<Value, Error> {
        let max = self.options.max_len_bytes;
        let mut buffer = Vec::new();
        while let Some(len) = self.parse_chunk_len(2, max)? {
            self.checked_len((buffer.len() + len) as u64, max)?;
            buffer.extend_from_slice(self.take(len)?);
        }
        Ok(Value::Bytes(buffer))
    }

    fn parse_text_chunks(&mut self) -> Result<Value, Error> {
        let max = self.options.max_len_text;
        let mut buffer = String::new();
        while let Some(len) = self.parse_chunk_len(3, max)? {
            self.checked_len((buffer.len() + len) as u64, max)?;
            let body = self.take(len)?;
            match core::str::from_utf8(body) {
                Ok(s) => buffer.push_str(s),
                Err(e) => {
                    // Consume the rest of the stream so a substitution
                    // resumes at the byte after the break
                    while let Some(len) = self.parse_chunk_len(3, max)? {
                        self.take(len)?;
                    }
                    return self.recover(e.into());
                }
            }
        }
        Ok(Value::Text(buffer))
    }

    fn parse_indefinite_array(&mut self, depth: usize) -> Result<Value, Error> {
        let mut items = Vec::new();
        loop {
            if self.peek()? == 0xFF {
                self.offset += 1;
                return Ok(Value::Array(items));
            }
            if items.len() >= self.options.max_len_array {
                return Err(Error::ItemTooLarge {
                    max: self.options.max_len_array,
                    actual: items.len() as u64 + 1,
                });
            }
            items.push(self.parse_value(depth)?);
        }
    }

    fn parse_indefinite_map(&mut self, depth: usize) -> Result<Value, Error> {
        let mut entries = Vec::new();
        let mut pending_key: Option<Value> = None;
        loop {
            if self.peek()? == 0xFF {
                self.offset += 1;
                return match pending_key {
                    None => Ok(Value::Map(entries)),
                    Some(key) => {
                        // The handler's substitution stands in for the
                        // missing value
                        let value = self.recover(Error::MissingMapValue)?;
                        self.push_entry(&mut entries, key, value)?;
                        Ok(Value::Map(entries))
                    }
                };
            }
            match pending_key.take() {
                None => {
                    if entries.len() >= self.options.max_size_map {
                        return Err(Error::ItemTooLarge {
                            max: self.options.max_size_map,
                            actual: entries.len() as u64 + 1,
                        });
                    }
                    pending_key = Some(self.parse_value(depth)?);
                }
                Some(key) => {
                    let value = self.parse_value(depth)?;
                    self.push_entry(&mut entries, key, value)?;
                }
            }
        }
    }

    /// Duplicate keys drop the whole offending pair when the handler
    /// chooses to continue.
    fn push_entry(
        &self,
        entries: &mut Vec<(Value, Value)>,
        key: Value,
        value: Value,
    ) -> Result<(), Error> {
        if self.options.strict_keys && entries.iter().any(|(k, _)| *k == key) {
            self.recover(Error::DuplicateMapKey(format!("{key:?}")))?;
            return Ok(());
        }
        entries.push((key, value));
        Ok(())
    }

    fn apply_tag(&self, tag: u64, inner: Value) -> Result<Value, Error> {
        if let Some(handler) = self.registry.reader(tag) {
            return match handler(inner) {
                Ok(v) => Ok(v),
                Err(e) => self.recover(e),
            };
        }
        if let Some(hook) = &self.options.unknown_tag {
            return hook(tag, inner);
        }
        trace!(tag, "no read handler registered, passing through");
        Ok(Value::Tagged(tag, Box::new(inner)))
    }
}

/// Parse a single value from the front of `data`, returning it with the
/// number of bytes consumed, or `Ok(None)` if `data` is empty.
pub fn try_parse(data: &[u8]) -> Result<Option<(Value, usize)>, Error> {
    try_parse_with(data, crate::default_registry(), &DecodeOptions::default())
}

pub fn try_parse_with(
    data: &[u8],
    registry: &Registry,
    options: &DecodeOptions,
) -> Result<Option<(Value, usize)>, Error> {
    if data.is_empty() {
        return Ok(None);
    }
    let mut reader = Reader {
        data,
        offset: 0,
        registry,
        options,
    };
    let value = reader.parse_value(options.max_recursion)?;
    Ok(Some((value, reader.offset)))
}

/// As [`try_parse`], but an empty source is an underflow.
#[inline]
pub fn parse(data: &[u8]) -> Result<(Value, usize), Error> {
    try_parse(data)?.ok_or(Error::Underflow)
}

#[inline]
pub fn parse_with(
    data: &[u8],
    registry: &Registry,
    options: &DecodeOptions,
) -> Result<(Value, usize), Error> {
    try_parse_with(data, registry, options)?.ok_or(Error::Underflow)
}
