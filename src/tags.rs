use crate::{
    error::Error,
    value::{Decimal, Value},
};
use hashbrown::HashMap;
use num_bigint::{BigInt, Sign};
use num_rational::BigRational;
use num_traits::{ToPrimitive, Zero};
use std::sync::Arc;

/// Positive bignum, on a byte string holding the big-endian magnitude.
pub const TAG_BIGNUM_POS: u64 = 2;
/// Negative bignum; the decoded value is `-1 - U`.
pub const TAG_BIGNUM_NEG: u64 = 3;
/// Decimal fraction, on `[exponent, mantissa]` with a base-10 scale.
pub const TAG_DECIMAL: u64 = 4;
/// Tagged literal, on `[name, form]`.
pub const TAG_LITERAL: u64 = 27;
/// Rational number, on `[numerator, denominator]`.
pub const TAG_RATIONAL: u64 = 30;
/// Identifier; a leading ':' selects the keyword form.
pub const TAG_IDENTIFIER: u64 = 39;

/// Converts a decoded inner value into its domain value.
pub type ReadHandler = Arc<dyn Fn(Value) -> Result<Value, Error> + Send + Sync>;

/// Claims a domain value and returns the tag and inner value to emit, or
/// `None` when the value is not this handler's.
pub type WriteHandler = Arc<dyn Fn(&Value) -> Option<(u64, Value)> + Send + Sync>;

/// Bidirectional tag dispatch table.
///
/// Read handlers are keyed by tag code; write handlers are consulted in
/// registration order, built-ins first. The registry is immutable once
/// handed to the codec and may be shared freely across threads.
pub struct Registry {
    readers: HashMap<u64, ReadHandler>,
    writers: Vec<WriteHandler>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// A registry with the built-in extended-numeric and identifier
    /// handlers installed.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry
            .insert(TAG_BIGNUM_POS, read_bignum_pos, write_big_integer)
            .insert(TAG_BIGNUM_NEG, read_bignum_neg, |_| None)
            .insert(TAG_DECIMAL, read_decimal, write_decimal)
            .insert(TAG_LITERAL, read_literal, write_literal)
            .insert(TAG_RATIONAL, read_rational, write_rational)
            .insert(TAG_IDENTIFIER, read_identifier, write_identifier);
        registry
    }

    pub fn empty() -> Self {
        Self {
            readers: HashMap::new(),
            writers: Vec::new(),
        }
    }

    /// Register a handler pair for `tag`.
    ///
    /// The write handler receives every value about to be encoded and
    /// returns the inner value to emit under `tag`, or `None` to decline.
    /// Its output must be strictly closer to the core shapes than its
    /// input, or encoding will not terminate.
    ///
    /// # Panics
    ///
    /// Panics if `tag` already has a read handler.
    pub fn register<R, W>(&mut self, tag: u64, read: R, write: W) -> &mut Self
    where
        R: Fn(Value) -> Result<Value, Error> + Send + Sync + 'static,
        W: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        assert!(
            self.readers.insert(tag, Arc::new(read)).is_none(),
            "tag {tag} already has a read handler"
        );
        self.writers
            .push(Arc::new(move |v| write(v).map(|inner| (tag, inner))));
        self
    }

    fn insert(
        &mut self,
        tag: u64,
        read: fn(Value) -> Result<Value, Error>,
        write: fn(&Value) -> Option<(u64, Value)>,
    ) -> &mut Self {
        assert!(
            self.readers.insert(tag, Arc::new(read)).is_none(),
            "tag {tag} already has a read handler"
        );
        self.writers.push(Arc::new(write));
        self
    }

    pub fn reader(&self, tag: u64) -> Option<&ReadHandler> {
        self.readers.get(&tag)
    }

    /// The first write handler that claims `value`.
    pub fn write(&self, value: &Value) -> Option<(u64, Value)> {
        self.writers.iter().find_map(|h| h(value))
    }
}

fn incorrect(expected: &str, found: &Value) -> Error {
    Error::IncorrectType(expected.to_string(), found.type_name().to_string())
}

fn int_arg(v: Value) -> Result<BigInt, Error> {
    match v {
        Value::UnsignedInteger(n) => Ok(n.into()),
        Value::NegativeInteger(n) => Ok(-BigInt::from(n) - 1),
        Value::BigInteger(n) => Ok(n),
        v => Err(incorrect("Integer", &v)),
    }
}

fn pair(inner: Value) -> Result<(Value, Value), Error> {
    match inner {
        Value::Array(a) => {
            let mut items = a.into_iter();
            match (items.next(), items.next(), items.next()) {
                (Some(first), Some(second), None) => Ok((first, second)),
                _ => Err(Error::IncorrectType(
                    "2-element Array".to_string(),
                    "Array".to_string(),
                )),
            }
        }
        v => Err(incorrect("2-element Array", &v)),
    }
}

fn read_bignum_pos(inner: Value) -> Result<Value, Error> {
    match inner {
        Value::Bytes(b) => Ok(Value::integer(BigInt::from_bytes_be(Sign::Plus, &b))),
        v => Err(incorrect("Byte String", &v)),
    }
}

fn read_bignum_neg(inner: Value) -> Result<Value, Error> {
    match inner {
        Value::Bytes(b) => Ok(Value::integer(
            -(BigInt::from_bytes_be(Sign::Plus, &b) + 1i32),
        )),
        v => Err(incorrect("Byte String", &v)),
    }
}

fn write_big_integer(value: &Value) -> Option<(u64, Value)> {
    let Value::BigInteger(n) = value else {
        return None;
    };
    if n.sign() == Sign::Minus {
        let (_, bytes) = (-(n.clone() + 1i32)).to_bytes_be();
        Some((TAG_BIGNUM_NEG, Value::Bytes(bytes)))
    } else {
        let (_, bytes) = n.to_bytes_be();
        Some((TAG_BIGNUM_POS, Value::Bytes(bytes)))
    }
}

fn read_decimal(inner: Value) -> Result<Value, Error> {
    let (exponent, mantissa) = pair(inner)?;
    let exponent = int_arg(exponent)?
        .to_i64()
        .ok_or(Error::UnrepresentableInteger)?;
    let scale = exponent.checked_neg().ok_or(Error::UnrepresentableInteger)?;
    Ok(Value::Decimal(Decimal {
        unscaled: int_arg(mantissa)?,
        scale,
    }))
}

fn write_decimal(value: &Value) -> Option<(u64, Value)> {
    let Value::Decimal(d) = value else {
        return None;
    };
    let exponent = -(d.scale as i128);
    Some((
        TAG_DECIMAL,
        Value::Array(vec![exponent.into(), Value::integer(d.unscaled.clone())]),
    ))
}

fn read_rational(inner: Value) -> Result<Value, Error> {
    let (numerator, denominator) = pair(inner)?;
    let numerator = int_arg(numerator)?;
    let denominator = int_arg(denominator)?;
    if denominator.is_zero() {
        return Err(Error::IncorrectType(
            "non-zero denominator".to_string(),
            "Integer 0".to_string(),
        ));
    }
    Ok(Value::Rational(BigRational::new(numerator, denominator)))
}

fn write_rational(value: &Value) -> Option<(u64, Value)> {
    let Value::Rational(r) = value else {
        return None;
    };
    Some((
        TAG_RATIONAL,
        Value::Array(vec![
            Value::integer(r.numer().clone()),
            Value::integer(r.denom().clone()),
        ]),
    ))
}

fn read_identifier(inner: Value) -> Result<Value, Error> {
    match inner {
        Value::Text(s) => Ok(match s.strip_prefix(':') {
            Some(name) => Value::Keyword(name.to_string()),
            None => Value::Symbol(s),
        }),
        v => Err(incorrect("Text String", &v)),
    }
}

fn write_identifier(value: &Value) -> Option<(u64, Value)> {
    match value {
        Value::Symbol(name) => Some((TAG_IDENTIFIER, Value::Text(name.clone()))),
        Value::Keyword(name) => Some((TAG_IDENTIFIER, Value::Text(format!(":{name}")))),
        _ => None,
    }
}

fn read_literal(inner: Value) -> Result<Value, Error> {
    let (name, form) = pair(inner)?;
    match name {
        Value::Text(name) => Ok(Value::Literal(name, Box::new(form))),
        v => Err(incorrect("Text String", &v)),
    }
}

fn write_literal(value: &Value) -> Option<(u64, Value)> {
    let Value::Literal(name, form) = value else {
        return None;
    };
    Some((
        TAG_LITERAL,
        Value::Array(vec![Value::Text(name.clone()), (**form).clone()]),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bignum_round_trip() {
        let n = BigInt::from(2u128.pow(64));
        let (tag, inner) = Registry::new().write(&Value::BigInteger(n.clone())).unwrap();
        assert_eq!(tag, TAG_BIGNUM_POS);
        assert_eq!(
            inner,
            Value::Bytes(vec![0x01, 0, 0, 0, 0, 0, 0, 0, 0])
        );
        assert_eq!(read_bignum_pos(inner).unwrap(), Value::BigInteger(n));
    }

    #[test]
    fn negative_bignum_magnitude() {
        // -18446744073709551617 = -1 - 2^64
        let n = BigInt::from(-(2i128.pow(64)) - 1);
        let (tag, inner) = Registry::new().write(&Value::BigInteger(n.clone())).unwrap();
        assert_eq!(tag, TAG_BIGNUM_NEG);
        assert_eq!(
            inner,
            Value::Bytes(vec![0x01, 0, 0, 0, 0, 0, 0, 0, 0])
        );
        assert_eq!(read_bignum_neg(inner).unwrap(), Value::BigInteger(n));
    }

    #[test]
    fn small_bignum_narrows() {
        assert_eq!(
            read_bignum_pos(Value::Bytes(vec![0x10])).unwrap(),
            Value::UnsignedInteger(16)
        );
        assert_eq!(
            read_bignum_neg(Value::Bytes(vec![0x10])).unwrap(),
            Value::NegativeInteger(16)
        );
    }

    #[test]
    fn identifier_forms() {
        assert_eq!(
            read_identifier(Value::Text("foo".to_string())).unwrap(),
            Value::Symbol("foo".to_string())
        );
        assert_eq!(
            read_identifier(Value::Text(":bar".to_string())).unwrap(),
            Value::Keyword("bar".to_string())
        );
        assert_eq!(
            write_identifier(&Value::Keyword("bar".to_string())),
            Some((TAG_IDENTIFIER, Value::Text(":bar".to_string())))
        );
    }

    #[test]
    fn rational_rejects_zero_denominator() {
        let inner = Value::Array(vec![Value::UnsignedInteger(1), Value::UnsignedInteger(0)]);
        assert!(matches!(
            read_rational(inner),
            Err(Error::IncorrectType(..))
        ));
    }

    #[test]
    fn decimal_negates_exponent() {
        let inner = Value::Array(vec![
            Value::NegativeInteger(1),
            Value::UnsignedInteger(27315),
        ]);
        assert_eq!(
            read_decimal(inner).unwrap(),
            Value::Decimal(Decimal::new(27315, 2))
        );
        let (_, encoded) = write_decimal(&Value::Decimal(Decimal::new(27315, 2))).unwrap();
        assert_eq!(
            encoded,
            Value::Array(vec![
                Value::NegativeInteger(1),
                Value::UnsignedInteger(27315)
            ])
        );
    }

    #[test]
    #[should_panic(expected = "already has a read handler")]
    fn duplicate_registration_panics() {
        Registry::new().register(TAG_DECIMAL, |v| Ok(v), |_| None);
    }
}
