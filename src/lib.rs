/*!
A codec for the Concise Binary Object Representation
([RFC 8949](https://www.rfc-editor.org/rfc/rfc8949.html)).

Values round-trip through the owned [`Value`] tree, with extended numeric
types (bignums, decimal fractions, rationals) carried losslessly via the
registered-tag mechanism of [`tags::Registry`]. Encoding is canonical by
default: shortest argument widths, length-first sorted map keys, no
indefinite lengths, and exact-narrowed floats.

# Example

```rust
use rcbor::{decode, encode, Value};

let value = Value::Array(vec![1u64.into(), Value::Text("hi".into())]);
let bytes = encode::emit(&value).unwrap();
assert_eq!(bytes, vec![0x82, 0x01, 0x62, b'h', b'i']);

let (decoded, len) = decode::parse(&bytes).unwrap();
assert_eq!(decoded, value);
assert_eq!(len, bytes.len());
```

Extended numerics decode to their own variants:

```rust
use rcbor::{decode, Decimal, Value};

// Tag 4: 273.15 as [-2, 27315]
let (v, _) = decode::parse(&[0xC4, 0x82, 0x21, 0x19, 0x6A, 0xB3]).unwrap();
assert_eq!(v, Value::Decimal(Decimal::new(27315, 2)));
```
*/

pub mod decode;
pub mod encode;
pub mod error;
pub mod tags;
pub mod value;



pub use error::{Error, Kind};
pub use value::{Decimal, Value};

/// The shared registry with the built-in tag handlers, used by
/// [`encode::emit`] and [`decode::parse`].
pub fn default_registry() -> &'static tags::Registry {
    use std::sync::OnceLock;
    static REGISTRY: OnceLock<tags::Registry> = OnceLock::new();
    REGISTRY.get_or_init(tags::Registry::new)
}
