use crate::{error::Error, tags::Registry, value::Value};

/// Per-call encoder configuration.
#[derive(Clone, Debug)]
pub struct EncodeOptions {
    /// Emit the deterministic form: shortest argument widths, length-first
    /// sorted map keys, no indefinite lengths, exact-narrowed floats.
    pub canonical: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self { canonical: true }
    }
}

pub struct Encoder<'o> {
    data: Vec<u8>,
    registry: &'o Registry,
    options: &'o EncodeOptions,
}

impl<'o> Encoder<'o> {
    pub fn new(registry: &'o Registry, options: &'o EncodeOptions) -> Self {
        Self {
            data: Vec::new(),
            registry,
            options,
        }
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }

    fn emit_uint_minor(&mut self, major: u8, val: u64) -> usize {
        if val < 24 {
            self.data.push((major << 5) | (val as u8));
            1
        } else if val <= u8::MAX as u64 {
            self.data.push((major << 5) | 24u8);
            self.data.push(val as u8);
            2
        } else if val <= u16::MAX as u64 {
            self.data.push((major << 5) | 25u8);
            self.data.extend(&(val as u16).to_be_bytes());
            3
        } else if val <= u32::MAX as u64 {
            self.data.push((major << 5) | 26u8);
            self.data.extend(&(val as u32).to_be_bytes());
            5
        } else {
            self.data.push((major << 5) | 27u8);
            self.data.extend(&val.to_be_bytes());
            9
        }
    }

    fn emit_float(&mut self, value: f64) -> usize {
        if value.is_nan() {
            // The canonical quiet NaN is always 16-bit
            self.data.push((7 << 5) | 25);
            self.data.extend(half::f16::NAN.to_be_bytes());
            3
        } else if let Some(f) = lossless_float_coerce::<half::f16>(value) {
            self.data.push((7 << 5) | 25);
            self.data.extend(f.to_be_bytes());
            3
        } else if let Some(f) = lossless_float_coerce::<f32>(value) {
            self.data.push((7 << 5) | 26);
            self.data.extend(f.to_be_bytes());
            5
        } else {
            self.data.push((7 << 5) | 27);
            self.data.extend(value.to_be_bytes());
            9
        }
    }

    fn emit_simple(&mut self, value: u8) -> Result<usize, Error> {
        match value {
            20..=31 => Err(Error::ReservedSimple(value)),
            v if v < 20 => {
                self.data.push((7 << 5) | v);
                Ok(1)
            }
            v => {
                self.data.push((7 << 5) | 24);
                self.data.push(v);
                Ok(2)
            }
        }
    }

    /// Encode one value, returning the number of bytes written.
    pub fn emit(&mut self, value: &Value) -> Result<usize, Error> {
        // Big integers that fit the dedicated carriers take the plain
        // integer form
        if let Value::BigInteger(n) = value {
            let narrowed = Value::integer(n.clone());
            if !matches!(narrowed, Value::BigInteger(_)) {
                return self.emit(&narrowed);
            }
        }

        if let Some((tag, inner)) = self.registry.write(value) {
            let mut len = self.emit_uint_minor(6, tag);
            len += self.emit(&inner)?;
            return Ok(len);
        }

        match value {
            Value::UnsignedInteger(n) => Ok(self.emit_uint_minor(0, *n)),
            Value::NegativeInteger(n) => Ok(self.emit_uint_minor(1, *n)),
            Value::BigInteger(_) => Err(Error::UnrepresentableInteger),
            Value::Float(f) => Ok(self.emit_float(*f)),
            Value::Bytes(b) => {
                let len = self.emit_uint_minor(2, b.len() as u64) + b.len();
                self.data.extend_from_slice(b);
                Ok(len)
            }
            Value::Text(s) => {
                let len = self.emit_uint_minor(3, s.len() as u64) + s.len();
                self.data.extend_from_slice(s.as_bytes());
                Ok(len)
            }
            Value::Array(items) => {
                let mut len = self.emit_uint_minor(4, items.len() as u64);
                for item in items {
                    len += self.emit(item)?;
                }
                Ok(len)
            }
            Value::Map(entries) => self.emit_map(entries),
            Value::Tagged(tag, inner) => {
                let mut len = self.emit_uint_minor(6, *tag);
                len += self.emit(inner)?;
                Ok(len)
            }
            Value::False => {
                self.data.push(0xF4);
                Ok(1)
            }
            Value::True => {
                self.data.push(0xF5);
                Ok(1)
            }
            Value::Null => {
                self.data.push(0xF6);
                Ok(1)
            }
            Value::Undefined => {
                self.data.push(0xF7);
                Ok(1)
            }
            Value::Simple(v) => self.emit_simple(*v),
            // Extended values reach here only when their write handler has
            // been removed from the registry
            v => Err(Error::UnknownValue(v.type_name().to_string())),
        }
    }

    /// Encode map entries as (key-bytes, value-bytes) pairs; canonical
    /// ordering is ascending key length, then lexicographic key bytes.
    fn emit_map(&mut self, entries: &[(Value, Value)]) -> Result<usize, Error> {
        let mut encoded = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let mut sub = Encoder::new(self.registry, self.options);
            sub.emit(key)?;
            let key_bytes = sub.build();
            let mut sub = Encoder::new(self.registry, self.options);
            sub.emit(value)?;
            encoded.push((key_bytes, sub.build()));
        }

        for i in 0..encoded.len() {
            if encoded[..i].iter().any(|(k, _)| *k == encoded[i].0) {
                return Err(Error::DuplicateMapKey(format!("{:?}", entries[i].0)));
            }
        }

        if self.options.canonical {
            encoded.sort_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        }

        let mut len = self.emit_uint_minor(5, entries.len() as u64);
        for (key_bytes, value_bytes) in &encoded {
            self.data.extend_from_slice(key_bytes);
            self.data.extend_from_slice(value_bytes);
            len += key_bytes.len() + value_bytes.len();
        }
        Ok(len)
    }

    pub fn emit_byte_stream<F>(&mut self, f: F) -> Result<usize, Error>
    where
        F: FnOnce(&mut ByteStream),
    {
        if self.options.canonical {
            return Err(Error::DefiniteLengthRequired);
        }
        let mut stream = ByteStream::new(self);
        f(&mut stream);
        Ok(stream.end())
    }

    pub fn emit_text_stream<F>(&mut self, f: F) -> Result<usize, Error>
    where
        F: FnOnce(&mut TextStream),
    {
        if self.options.canonical {
            return Err(Error::DefiniteLengthRequired);
        }
        let mut stream = TextStream::new(self);
        f(&mut stream);
        Ok(stream.end())
    }

    pub fn emit_array_stream<F>(&mut self, f: F) -> Result<usize, Error>
    where
        F: FnOnce(&mut ArrayStream<'_, 'o>) -> Result<(), Error>,
    {
        if self.options.canonical {
            return Err(Error::DefiniteLengthRequired);
        }
        let mut stream = Stream::new(self);
        f(&mut stream)?;
        stream.end()
    }

    pub fn emit_map_stream<F>(&mut self, f: F) -> Result<usize, Error>
    where
        F: FnOnce(&mut MapStream<'_, 'o>) -> Result<(), Error>,
    {
        if self.options.canonical {
            return Err(Error::DefiniteLengthRequired);
        }
        let mut stream = Stream::new(self);
        f(&mut stream)?;
        stream.end()
    }
}

pub struct ByteStream<'a, 'o> {
    encoder: &'a mut Encoder<'o>,
    offset: usize,
}

impl<'a, 'o> ByteStream<'a, 'o> {
    fn new(encoder: &'a mut Encoder<'o>) -> Self {
        encoder.data.push((2 << 5) | 31);
        Self {
            offset: encoder.data.len() - 1,
            encoder,
        }
    }

    pub fn emit(&mut self, chunk: &[u8]) {
        self.encoder.emit_uint_minor(2, chunk.len() as u64);
        self.encoder.data.extend_from_slice(chunk);
    }

    fn end(self) -> usize {
        self.encoder.data.push(0xFF);
        self.encoder.data.len() - self.offset
    }
}

pub struct TextStream<'a, 'o> {
    encoder: &'a mut Encoder<'o>,
    offset: usize,
}

impl<'a, 'o> TextStream<'a, 'o> {
    fn new(encoder: &'a mut Encoder<'o>) -> Self {
        encoder.data.push((3 << 5) | 31);
        Self {
            offset: encoder.data.len() - 1,
            encoder,
        }
    }

    pub fn emit(&mut self, chunk: &str) {
        self.encoder.emit_uint_minor(3, chunk.len() as u64);
        self.encoder.data.extend_from_slice(chunk.as_bytes());
    }

    fn end(self) -> usize {
        self.encoder.data.push(0xFF);
        self.encoder.data.len() - self.offset
    }
}

pub struct Stream<'a, 'o, const D: usize> {
    encoder: &'a mut Encoder<'o>,
    offset: usize,
    idx: usize,
}

pub type ArrayStream<'a, 'o> = Stream<'a, 'o, 1>;
pub type MapStream<'a, 'o> = Stream<'a, 'o, 2>;

impl<'a, 'o, const D: usize> Stream<'a, 'o, D> {
    fn new(encoder: &'a mut Encoder<'o>) -> Self {
        encoder
            .data
            .push(((if D == 1 { 4 } else { 5 }) << 5) | 31);
        Self {
            offset: encoder.data.len() - 1,
            encoder,
            idx: 0,
        }
    }

    pub fn emit(&mut self, value: &Value) -> Result<usize, Error> {
        self.idx += 1;
        self.encoder.emit(value)
    }

    fn end(self) -> Result<usize, Error> {
        if D == 2 && self.idx % 2 == 1 {
            return Err(Error::MissingMapValue);
        }
        self.encoder.data.push(0xFF);
        Ok(self.encoder.data.len() - self.offset)
    }
}

fn lossless_float_coerce<T>(value: f64) -> Option<T>
where
    T: num_traits::FromPrimitive + Into<f64> + Copy,
{
    match <T as num_traits::FromPrimitive>::from_f64(value) {
        Some(f) if <T as Into<f64>>::into(f) == value => Some(f),
        _ => None,
    }
}

/// Encode one value in the canonical form with the built-in tag handlers.
pub fn emit(value: &Value) -> Result<Vec<u8>, Error> {
    emit_with(value, crate::default_registry(), &EncodeOptions::default())
}

pub fn emit_with(
    value: &Value,
    registry: &Registry,
    options: &EncodeOptions,
) -> Result<Vec<u8>, Error> {
    let mut encoder = Encoder::new(registry, options);
    encoder.emit(value)?;
    Ok(encoder.build())
}
