use std::fmt;
use std::io::Read;

use serde::de::{self, DeserializeSeed, MapAccess, SeqAccess, Visitor};

use mdag_stream::{
    Emitter, Error, Flow, PathAtom, ReadSeek, Scalar, StreamSource, Token, TokenSource,
};

/// Streaming JSON decoder.
///
/// Rides `serde_json`'s deserializer with a visitor that replays every
/// parse event as a token. Numbers narrow to the smallest of signed,
/// unsigned or f64 that recovers the literal; object keys are delivered
/// in the order the parser sees them.
pub struct JsonDecoder {
    source: StreamSource,
}

impl JsonDecoder {
    pub fn new(reader: impl Read + Send + 'static) -> Self {
        JsonDecoder {
            source: StreamSource::read_once(reader),
        }
    }

    /// A decoder over a seekable input can be read more than once; it
    /// rewinds to its construction offset on every read.
    pub fn seekable(reader: impl ReadSeek + Send + 'static) -> Result<Self, Error> {
        Ok(JsonDecoder {
            source: StreamSource::seekable(reader)?,
        })
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        JsonDecoder {
            source: StreamSource::from(bytes),
        }
    }
}

impl TokenSource for JsonDecoder {
    fn read<F>(&mut self, f: F) -> Result<(), Error>
    where
        F: FnMut(&[PathAtom], Token) -> Result<Flow, Error>,
    {
        let bytes = self.source.take_all()?;
        let mut emitter = Emitter::new(f);
        let mut failure = None;
        let mut de = serde_json::Deserializer::from_slice(&bytes);
        let seed = TokenSeed {
            emitter: &mut emitter,
            failure: &mut failure,
            pending: None,
        };
        let result = seed.deserialize(&mut de).and_then(|()| de.end());
        match result {
            Ok(()) => Ok(()),
            Err(parse) => match failure {
                Some(Error::Aborted) => Ok(()),
                Some(err) => Err(err),
                None => Err(Error::Malformed(parse.to_string())),
            },
        }
    }
}

// One seed per JSON value. `pending` carries the key or index of the
// entry this value belongs to; it is emitted right before the value's
// own tokens, so an entry token never fires for an entry that does not
// exist.
struct TokenSeed<'a, F> {
    emitter: &'a mut Emitter<F>,
    failure: &'a mut Option<Error>,
    pending: Option<PathAtom>,
}

impl<F> TokenSeed<'_, F>
where
    F: FnMut(&[PathAtom], Token) -> Result<Flow, Error>,
{
    fn lift<E: de::Error>(&mut self, result: Result<(), Error>) -> Result<(), E> {
        result.map_err(|err| {
            let message = err.to_string();
            *self.failure = Some(err);
            E::custom(message)
        })
    }

    fn flush_pending<E: de::Error>(&mut self) -> Result<(), E> {
        match self.pending.take() {
            Some(PathAtom::Key(key)) => {
                let r = self.emitter.key(&key);
                self.lift(r)
            }
            Some(PathAtom::Index(index)) => {
                let r = self.emitter.index(index);
                self.lift(r)
            }
            None => Ok(()),
        }
    }

    fn scalar<E: de::Error>(mut self, value: Scalar) -> Result<(), E> {
        self.flush_pending()?;
        let r = self.emitter.value(value);
        self.lift(r)
    }
}

impl<'de, F> DeserializeSeed<'de> for TokenSeed<'_, F>
where
    F: FnMut(&[PathAtom], Token) -> Result<Flow, Error>,
{
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<(), D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de, F> Visitor<'de> for TokenSeed<'_, F>
where
    F: FnMut(&[PathAtom], Token) -> Result<Flow, Error>,
{
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "any json value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<(), E> {
        self.scalar(Scalar::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<(), E> {
        self.scalar(Scalar::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<(), E> {
        match i64::try_from(v) {
            Ok(n) => self.scalar(Scalar::Int(n)),
            Err(_) => self.scalar(Scalar::Uint(v)),
        }
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<(), E> {
        self.scalar(Scalar::F64(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<(), E> {
        self.scalar(Scalar::Text(v.to_owned()))
    }

    fn visit_unit<E: de::Error>(self) -> Result<(), E> {
        self.scalar(Scalar::Null)
    }

    fn visit_seq<A: SeqAccess<'de>>(mut self, mut seq: A) -> Result<(), A::Error> {
        self.flush_pending()?;
        let r = self.emitter.begin_array();
        self.lift(r)?;
        let mut index = 0u64;
        loop {
            let element = TokenSeed {
                emitter: &mut *self.emitter,
                failure: &mut *self.failure,
                pending: Some(PathAtom::Index(index)),
            };
            match seq.next_element_seed(element)? {
                Some(()) => index += 1,
                None => break,
            }
        }
        let r = self.emitter.end_array();
        self.lift(r)
    }

    fn visit_map<A: MapAccess<'de>>(mut self, mut map: A) -> Result<(), A::Error> {
        self.flush_pending()?;
        let r = self.emitter.begin_node();
        self.lift(r)?;
        while let Some(key) = map.next_key::<String>()? {
            let entry = TokenSeed {
                emitter: &mut *self.emitter,
                failure: &mut *self.failure,
                pending: Some(PathAtom::Key(key)),
            };
            map.next_value_seed(entry)?;
        }
        let r = self.emitter.end_node();
        self.lift(r)
    }
}
