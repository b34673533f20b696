use num_bigint::BigInt;

/// A complete scalar value as carried by [`Token::Value`].
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Big(BigInt),
    F32(f32),
    F64(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Scalar {
    /// Human-readable kind name, used in [`crate::Error::WrongType`].
    pub fn kind(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "bool",
            Scalar::Int(_) => "int",
            Scalar::Uint(_) => "uint",
            Scalar::Big(_) => "bigint",
            Scalar::F32(_) => "f32",
            Scalar::F64(_) => "f64",
            Scalar::Text(_) => "text",
            Scalar::Bytes(_) => "bytes",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Scalar::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Unsigned view of any non-negative integer scalar.
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Scalar::Uint(n) => Some(*n),
            Scalar::Int(n) => u64::try_from(*n).ok(),
            Scalar::Big(n) => u64::try_from(n).ok(),
            _ => None,
        }
    }

    /// Whether this scalar may appear in a chunked value sequence.
    /// Only strings can be streamed in parts.
    pub fn is_chunkable(&self) -> bool {
        matches!(self, Scalar::Text(_) | Scalar::Bytes(_))
    }

    /// Numeric-aware equality: integers compare across signedness and
    /// width, floats by f64 value. Everything else is structural.
    pub fn equivalent(&self, other: &Scalar) -> bool {
        use Scalar::*;
        match (self, other) {
            (Int(_) | Uint(_) | Big(_), Int(_) | Uint(_) | Big(_)) => {
                self.to_big() == other.to_big()
            }
            (F32(_) | F64(_), F32(_) | F64(_)) => self.to_f64() == other.to_f64(),
            (a, b) => a == b,
        }
    }

    fn to_big(&self) -> BigInt {
        match self {
            Scalar::Int(n) => BigInt::from(*n),
            Scalar::Uint(n) => BigInt::from(*n),
            Scalar::Big(n) => n.clone(),
            _ => unreachable!("not an integer scalar"),
        }
    }

    fn to_f64(&self) -> f64 {
        match self {
            Scalar::F32(f) => *f as f64,
            Scalar::F64(f) => *f,
            _ => unreachable!("not a float scalar"),
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<u64> for Scalar {
    fn from(v: u64) -> Self {
        Scalar::Uint(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::F64(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

impl From<Vec<u8>> for Scalar {
    fn from(v: Vec<u8>) -> Self {
        Scalar::Bytes(v)
    }
}

/// One element of the producer/consumer alphabet.
///
/// Every decoder emits exactly this alphabet and every encoder accepts
/// exactly it. `ValuePart` streams a large string in chunks; the sequence
/// is terminated by a single `Value` of the same scalar kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    BeginNode,
    Key(String),
    EndNode,
    BeginArray,
    Index(u64),
    EndArray,
    ValuePart(Scalar),
    Value(Scalar),
}

impl Token {
    pub fn name(&self) -> &'static str {
        match self {
            Token::BeginNode => "BeginNode",
            Token::Key(_) => "Key",
            Token::EndNode => "EndNode",
            Token::BeginArray => "BeginArray",
            Token::Index(_) => "Index",
            Token::EndArray => "EndArray",
            Token::ValuePart(_) => "ValuePart",
            Token::Value(_) => "Value",
        }
    }
}

/// What a callback wants the producer to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep going.
    Continue,
    /// Suppress the callbacks for the current subtree. From a
    /// `Key`/`Index` this swallows the entry's whole value; from a
    /// `BeginNode`/`BeginArray` it swallows every descendant but still
    /// delivers the balancing end token; from a `ValuePart` it swallows
    /// the remaining chunks and the terminator.
    SkipSubtree,
    /// Stop the producer. The producer returns success to its caller.
    Abort,
}
