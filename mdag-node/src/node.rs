use mdag_stream::Scalar;

use crate::LINK_KEY;

/// Any value a document can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Node(Node),
    Array(Vec<Value>),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Scalar(s) => s.kind(),
            Value::Node(_) => "node",
            Value::Array(_) => "array",
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_text)
    }

    /// Semantic comparison for values that crossed different codecs:
    /// nodes compare by key set regardless of iteration order, scalars
    /// numerically (see [`Scalar::equivalent`]).
    pub fn equivalent(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => a.equivalent(b),
            (Value::Node(a), Value::Node(b)) => a.equivalent(b),
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equivalent(y))
            }
            _ => false,
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

impl From<Node> for Value {
    fn from(n: Node) -> Self {
        Value::Node(n)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

macro_rules! scalar_into_value {
    ($($from:ty),*) => {
        $(impl From<$from> for Value {
            fn from(v: $from) -> Self {
                Value::Scalar(v.into())
            }
        })*
    };
}

scalar_into_value!(bool, i64, u64, f64, &str, String, Vec<u8>);

/// An ordered mapping from text keys to values.
///
/// Iteration order is insertion order; keys are unique. The pair vector
/// is the storage of choice here because canonical re-encoding depends
/// on reproducing the observed entry order exactly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    entries: Vec<(String, Value)>,
}

impl Node {
    pub fn new() -> Self {
        Node::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts a key. An existing key keeps its position and has its
    /// value replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let at = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(at).1)
    }

    pub fn entries(&self) -> impl Iterator<Item = &(String, Value)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// The link target, if this node is a merkle-link.
    pub fn link_text(&self) -> Option<&str> {
        self.get(LINK_KEY).and_then(Value::as_text)
    }

    pub fn is_link(&self) -> bool {
        self.link_text().is_some()
    }

    /// Order-insensitive semantic comparison; see [`Value::equivalent`].
    pub fn equivalent(&self, other: &Node) -> bool {
        self.len() == other.len()
            && self.entries().all(|(k, v)| {
                other.get(k).map(|w| v.equivalent(w)).unwrap_or(false)
            })
    }
}

impl FromIterator<(String, Value)> for Node {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut node = Node::new();
        for (k, v) in iter {
            node.insert(k, v);
        }
        node
    }
}
