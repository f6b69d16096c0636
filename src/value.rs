use num_bigint::{BigInt, Sign};
use num_rational::BigRational;
use num_traits::ToPrimitive;

/// A decimal fraction: `unscaled * 10^(-scale)`.
///
/// The scale is non-negative for fractions (273.15 is `unscaled` 27315 with
/// `scale` 2) and negative for multiples of powers of ten. On the wire the
/// exponent of tag 4 is the negation of the scale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decimal {
    pub unscaled: BigInt,
    pub scale: i64,
}

impl Decimal {
    pub fn new(unscaled: impl Into<BigInt>, scale: i64) -> Self {
        Self {
            unscaled: unscaled.into(),
            scale,
        }
    }
}

/// A single CBOR data item.
///
/// Integers in the 64-bit unsigned range use the dedicated carriers:
/// `NegativeInteger(n)` holds the major-type-1 argument, so the value it
/// denotes is `-1 - n` and the two carriers together cover
/// [-2^64, 2^64 - 1] without heap allocation. `BigInteger` is only used for
/// magnitudes beyond that range.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    UnsignedInteger(u64),
    NegativeInteger(u64),
    BigInteger(BigInt),
    Float(f64),
    Bytes(Vec<u8>),
    Text(String),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Tagged(u64, Box<Value>),
    Decimal(Decimal),
    Rational(BigRational),
    Symbol(String),
    Keyword(String),
    Literal(String, Box<Value>),
    False,
    True,
    Null,
    Undefined,
    Simple(u8),
}

impl Value {
    /// The narrowest integer carrier for `n`.
    pub fn integer(n: impl Into<BigInt>) -> Self {
        let n = n.into();
        if n.sign() == Sign::Minus {
            let m: BigInt = -(n.clone() + 1i32);
            match m.to_u64() {
                Some(m) => Value::NegativeInteger(m),
                None => Value::BigInteger(n),
            }
        } else {
            match n.to_u64() {
                Some(u) => Value::UnsignedInteger(u),
                None => Value::BigInteger(n),
            }
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::UnsignedInteger(_) => "Unsigned Integer",
            Value::NegativeInteger(_) => "Negative Integer",
            Value::BigInteger(_) => "Big Integer",
            Value::Float(_) => "Float",
            Value::Bytes(_) => "Byte String",
            Value::Text(_) => "Text String",
            Value::Array(_) => "Array",
            Value::Map(_) => "Map",
            Value::Tagged(..) => "Tagged Value",
            Value::Decimal(_) => "Decimal",
            Value::Rational(_) => "Rational",
            Value::Symbol(_) => "Symbol",
            Value::Keyword(_) => "Keyword",
            Value::Literal(..) => "Tagged Literal",
            Value::False => "False",
            Value::True => "True",
            Value::Null => "Null",
            Value::Undefined => "Undefined",
            Value::Simple(_) => "Simple Value",
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        if v {
            Value::True
        } else {
            Value::False
        }
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::UnsignedInteger(v as u64)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::UnsignedInteger(v as u64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UnsignedInteger(v as u64)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UnsignedInteger(v)
    }
}

impl From<u128> for Value {
    fn from(v: u128) -> Self {
        match u64::try_from(v) {
            Ok(u) => Value::UnsignedInteger(u),
            Err(_) => Value::BigInteger(v.into()),
        }
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        (v as i64).into()
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        (v as i64).into()
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        (v as i64).into()
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        if v >= 0 {
            Value::UnsignedInteger(v as u64)
        } else {
            Value::NegativeInteger((-1 - v) as u64)
        }
    }
}

impl From<i128> for Value {
    fn from(v: i128) -> Self {
        if let Ok(u) = u64::try_from(v) {
            Value::UnsignedInteger(u)
        } else if v < 0 {
            match u64::try_from(-1 - v) {
                Ok(m) => Value::NegativeInteger(m),
                Err(_) => Value::BigInteger(v.into()),
            }
        } else {
            Value::BigInteger(v.into())
        }
    }
}

impl From<BigInt> for Value {
    fn from(v: BigInt) -> Self {
        Value::integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<BigRational> for Value {
    fn from(v: BigRational) -> Self {
        Value::Rational(v)
    }
}
