use std::io::Read;

use minicbor::data::{Tag, Type};
use minicbor::Decoder;
use multiaddr::Multiaddr;
use num_bigint::BigInt;
use num_bigint::Sign;

use mdag_node::LINK_KEY;
use mdag_stream::{Emitter, Error, Flow, PathAtom, ReadSeek, Scalar, StreamSource, Token, TokenSource};

use crate::TAG_LINK;

/// Streaming CBOR decoder.
///
/// Accepts definite and indefinite containers; indefinite text and byte
/// strings are replayed chunk by chunk as value parts. Map keys must be
/// definite text. Tags other than the link tag and the bignum tags are
/// transparent.
pub struct CborDecoder {
    source: StreamSource,
}

impl CborDecoder {
    pub fn new(reader: impl Read + Send + 'static) -> Self {
        CborDecoder {
            source: StreamSource::read_once(reader),
        }
    }

    /// A decoder over a seekable input can be read more than once; it
    /// rewinds to its construction offset on every read.
    pub fn seekable(reader: impl ReadSeek + Send + 'static) -> Result<Self, Error> {
        Ok(CborDecoder {
            source: StreamSource::seekable(reader)?,
        })
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        CborDecoder {
            source: StreamSource::from(bytes),
        }
    }
}

impl TokenSource for CborDecoder {
    fn read<F>(&mut self, f: F) -> Result<(), Error>
    where
        F: FnMut(&[PathAtom], Token) -> Result<Flow, Error>,
    {
        let bytes = self.source.take_all()?;
        let mut d = Decoder::new(&bytes);
        let mut em = Emitter::new(f);
        match walk_value(&mut d, &mut em) {
            Err(Error::Aborted) => Ok(()),
            other => other,
        }
    }
}

fn malformed(e: minicbor::decode::Error) -> Error {
    Error::Malformed(e.to_string())
}

fn walk_value<F>(d: &mut Decoder, em: &mut Emitter<F>) -> Result<(), Error>
where
    F: FnMut(&[PathAtom], Token) -> Result<Flow, Error>,
{
    match d.datatype().map_err(malformed)? {
        Type::Bool => em.value(Scalar::Bool(d.bool().map_err(malformed)?)),
        Type::Null => {
            d.null().map_err(malformed)?;
            em.value(Scalar::Null)
        }
        Type::Undefined => {
            d.undefined().map_err(malformed)?;
            em.value(Scalar::Null)
        }
        Type::U8 | Type::U16 | Type::U32 | Type::U64 => {
            em.value(Scalar::Uint(d.u64().map_err(malformed)?))
        }
        Type::I8 | Type::I16 | Type::I32 | Type::I64 => {
            em.value(Scalar::Int(d.i64().map_err(malformed)?))
        }
        Type::Int => {
            // negative values beyond the i64 range
            let wide = i128::from(d.int().map_err(malformed)?);
            match i64::try_from(wide) {
                Ok(n) => em.value(Scalar::Int(n)),
                Err(_) => em.value(Scalar::Big(BigInt::from(wide))),
            }
        }
        Type::F16 => em.value(Scalar::F32(d.f16().map_err(malformed)?)),
        Type::F32 => em.value(Scalar::F32(d.f32().map_err(malformed)?)),
        Type::F64 => em.value(Scalar::F64(d.f64().map_err(malformed)?)),
        Type::Bytes => em.value(Scalar::Bytes(d.bytes().map_err(malformed)?.to_vec())),
        Type::String => em.value(Scalar::Text(d.str().map_err(malformed)?.to_owned())),
        Type::BytesIndef => {
            let mut pending: Option<Vec<u8>> = None;
            for chunk in d.bytes_iter().map_err(malformed)? {
                let chunk = chunk.map_err(malformed)?.to_vec();
                if let Some(part) = pending.replace(chunk) {
                    em.value_part(Scalar::Bytes(part))?;
                }
            }
            em.value(Scalar::Bytes(pending.unwrap_or_default()))
        }
        Type::StringIndef => {
            let mut pending: Option<String> = None;
            for chunk in d.str_iter().map_err(malformed)? {
                let chunk = chunk.map_err(malformed)?.to_owned();
                if let Some(part) = pending.replace(chunk) {
                    em.value_part(Scalar::Text(part))?;
                }
            }
            em.value(Scalar::Text(pending.unwrap_or_default()))
        }
        Type::Array | Type::ArrayIndef => walk_array(d, em),
        Type::Map | Type::MapIndef => walk_map(d, em),
        Type::Tag => walk_tag(d, em),
        other => Err(Error::Malformed(format!(
            "unsupported cbor item {other:?}"
        ))),
    }
}

fn walk_array<F>(d: &mut Decoder, em: &mut Emitter<F>) -> Result<(), Error>
where
    F: FnMut(&[PathAtom], Token) -> Result<Flow, Error>,
{
    em.begin_array()?;
    match d.array().map_err(malformed)? {
        Some(len) => {
            for i in 0..len {
                em.index(i)?;
                walk_value(d, em)?;
            }
        }
        None => {
            let mut i = 0;
            while d.datatype().map_err(malformed)? != Type::Break {
                em.index(i)?;
                walk_value(d, em)?;
                i += 1;
            }
            consume_break(d);
        }
    }
    em.end_array()
}

fn walk_map<F>(d: &mut Decoder, em: &mut Emitter<F>) -> Result<(), Error>
where
    F: FnMut(&[PathAtom], Token) -> Result<Flow, Error>,
{
    em.begin_node()?;
    walk_map_entries(d, em)?;
    em.end_node()
}

// Consumes a map header and its entries without opening a node scope.
fn walk_map_entries<F>(d: &mut Decoder, em: &mut Emitter<F>) -> Result<(), Error>
where
    F: FnMut(&[PathAtom], Token) -> Result<Flow, Error>,
{
    match d.map().map_err(malformed)? {
        Some(len) => {
            for _ in 0..len {
                walk_entry(d, em)?;
            }
        }
        None => {
            while d.datatype().map_err(malformed)? != Type::Break {
                walk_entry(d, em)?;
            }
            consume_break(d);
        }
    }
    Ok(())
}

fn walk_entry<F>(d: &mut Decoder, em: &mut Emitter<F>) -> Result<(), Error>
where
    F: FnMut(&[PathAtom], Token) -> Result<Flow, Error>,
{
    if d.datatype().map_err(malformed)? != Type::String {
        return Err(Error::Malformed("map key must be a text string".into()));
    }
    let key = d.str().map_err(malformed)?.to_owned();
    em.key(&key)?;
    walk_value(d, em)
}

fn walk_tag<F>(d: &mut Decoder, em: &mut Emitter<F>) -> Result<(), Error>
where
    F: FnMut(&[PathAtom], Token) -> Result<Flow, Error>,
{
    match d.tag().map_err(malformed)? {
        Tag::PosBignum => {
            let bytes = d.bytes().map_err(malformed)?;
            em.value(Scalar::Big(BigInt::from_bytes_be(Sign::Plus, bytes)))
        }
        Tag::NegBignum => {
            let bytes = d.bytes().map_err(malformed)?;
            let magnitude = BigInt::from_bytes_be(Sign::Plus, bytes);
            em.value(Scalar::Big(-(magnitude + 1u8)))
        }
        Tag::Unassigned(TAG_LINK) => walk_link(d, em),
        // other tags are transparent
        _ => walk_value(d, em),
    }
}

// A link tag inflates into a node whose first entry is the link key.
fn walk_link<F>(d: &mut Decoder, em: &mut Emitter<F>) -> Result<(), Error>
where
    F: FnMut(&[PathAtom], Token) -> Result<Flow, Error>,
{
    em.begin_node()?;
    match d.datatype().map_err(malformed)? {
        Type::String => {
            let target = d.str().map_err(malformed)?.to_owned();
            em.key(LINK_KEY)?;
            em.value(Scalar::Text(target))?;
        }
        Type::Bytes => {
            let target = multiaddr_text(d.bytes().map_err(malformed)?)?;
            em.key(LINK_KEY)?;
            em.value(Scalar::Text(target))?;
        }
        Type::Array => {
            if d.array().map_err(malformed)? != Some(2) {
                return Err(Error::Malformed(
                    "link tag array must have exactly two elements".into(),
                ));
            }
            let target = match d.datatype().map_err(malformed)? {
                Type::String => d.str().map_err(malformed)?.to_owned(),
                Type::Bytes => multiaddr_text(d.bytes().map_err(malformed)?)?,
                other => {
                    return Err(Error::Malformed(format!(
                        "invalid link payload type {other:?}"
                    )))
                }
            };
            em.key(LINK_KEY)?;
            em.value(Scalar::Text(target))?;
            match d.datatype().map_err(malformed)? {
                Type::Map | Type::MapIndef => walk_map_entries(d, em)?,
                other => {
                    return Err(Error::Malformed(format!(
                        "link metadata must be a map, found {other:?}"
                    )))
                }
            }
        }
        other => {
            return Err(Error::Malformed(format!(
                "invalid link payload type {other:?}"
            )))
        }
    }
    em.end_node()
}

fn multiaddr_text(bytes: &[u8]) -> Result<String, Error> {
    Multiaddr::try_from(bytes.to_vec())
        .map(|ma| ma.to_string())
        .map_err(|e| Error::Malformed(format!("invalid multiaddr in link: {e}")))
}

// A break is always the single byte 0xff; consume it positionally.
fn consume_break(d: &mut Decoder) {
    d.set_position(d.position() + 1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdag_stream::record;

    fn decode_tokens(hex_bytes: &str) -> Vec<(String, Token)> {
        let bytes = hex::decode(hex_bytes).unwrap();
        record(&mut CborDecoder::from_bytes(bytes)).unwrap()
    }

    #[test]
    fn plain_map_decodes_in_wire_order() {
        // {"a": 1, "b": [true, null]}
        let got = decode_tokens("a261610161628205f6");
        let expected = vec![
            ("".into(), Token::BeginNode),
            ("".into(), Token::Key("a".into())),
            ("a".into(), Token::Value(Scalar::Uint(1))),
            ("".into(), Token::Key("b".into())),
            ("b".into(), Token::BeginArray),
            ("b".into(), Token::Index(0)),
            ("b/0".into(), Token::Value(Scalar::Bool(true))),
            ("b".into(), Token::Index(1)),
            ("b/1".into(), Token::Value(Scalar::Null)),
            ("b".into(), Token::EndArray),
            ("".into(), Token::EndNode),
        ];
        assert_eq!(got, expected);
    }

    #[test]
    fn tagged_string_link_inflates_to_a_node() {
        // tag(258) "#/foo/bar"
        let got = decode_tokens("d9010269232f666f6f2f626172");
        let expected = vec![
            ("".into(), Token::BeginNode),
            ("".into(), Token::Key(LINK_KEY.into())),
            ("mlink".into(), Token::Value(Scalar::Text("#/foo/bar".into()))),
            ("".into(), Token::EndNode),
        ];
        assert_eq!(got, expected);
    }

    #[test]
    fn tagged_link_with_meta_keeps_link_first() {
        // tag(258) ["#/foo/bar", {"00": 11, "size": 55}]
        let got = decode_tokens("d901028269232f666f6f2f626172a26230300b6473697a651837");
        let names: Vec<_> = got.iter().map(|(_, t)| t.name()).collect();
        assert_eq!(
            names,
            vec!["BeginNode", "Key", "Value", "Key", "Value", "Key", "Value", "EndNode"]
        );
        assert_eq!(got[1].1, Token::Key(LINK_KEY.into()));
        assert_eq!(got[3].1, Token::Key("00".into()));
        assert_eq!(got[4].1, Token::Value(Scalar::Uint(11)));
        assert_eq!(got[5].1, Token::Key("size".into()));
        assert_eq!(got[6].1, Token::Value(Scalar::Uint(55)));
    }

    #[test]
    fn multiaddr_bytes_link_renders_to_text() {
        let ma: multiaddr::Multiaddr = "/ip4/127.0.0.1/udp/1234".parse().unwrap();
        let mut bytes = hex::decode("d90102").unwrap();
        bytes.push(0x40 | ma.to_vec().len() as u8);
        bytes.extend(ma.to_vec());
        let got = record(&mut CborDecoder::from_bytes(bytes)).unwrap();
        assert_eq!(
            got[2].1,
            Token::Value(Scalar::Text("/ip4/127.0.0.1/udp/1234".into()))
        );
    }

    #[test]
    fn indefinite_text_streams_as_parts() {
        // (_ "str" "eam")
        let got = decode_tokens("7f637374726365616dff");
        assert_eq!(
            got,
            vec![
                ("".into(), Token::ValuePart(Scalar::Text("str".into()))),
                ("".into(), Token::Value(Scalar::Text("eam".into()))),
            ]
        );
    }

    #[test]
    fn bignum_decodes_past_u64() {
        // tag(2) followed by 2^64
        let got = decode_tokens("c249010000000000000000");
        let expected = num_bigint::BigInt::from(u64::MAX) + 1;
        assert_eq!(got[0].1, Token::Value(Scalar::Big(expected)));
    }

    #[test]
    fn non_text_map_keys_are_malformed() {
        // {1: 2}
        let bytes = hex::decode("a10102").unwrap();
        let err = record(&mut CborDecoder::from_bytes(bytes)).unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));
    }

    #[test]
    fn second_read_of_a_plain_stream_is_refused() {
        let bytes = hex::decode("a0").unwrap();
        let mut dec = CborDecoder::new(std::io::Cursor::new(bytes));
        assert!(record(&mut dec).is_ok());
        assert!(matches!(
            record(&mut dec).unwrap_err(),
            Error::AlreadyConsumed
        ));
    }

    #[test]
    fn seekable_stream_reads_twice() {
        let bytes = hex::decode("a0").unwrap();
        let mut dec = CborDecoder::from_bytes(bytes);
        assert!(record(&mut dec).is_ok());
        assert!(record(&mut dec).is_ok());
    }

    #[test]
    fn truncated_input_is_malformed() {
        let bytes = hex::decode("a261").unwrap();
        let err = record(&mut CborDecoder::from_bytes(bytes)).unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));
    }
}
