//! Codec multiplexer for framed merkledag documents.
//!
//! Every encoded artifact starts with the outer [`OUTER_PATH`] header
//! followed by a codec-selecting header; decoding reads both and hands
//! the remaining byte stream to the matching codec. Encoding picks the
//! codec explicitly, or from the document's `@codec` key.

use std::io::{Read, Write};

use tracing::debug;

use mdag_cbor::CborDecoder;
use mdag_json::JsonDecoder;
use mdag_node::{node_from, Node, Value, CODEC_KEY};
use mdag_pb::PbDecoder;
use mdag_stream::{Error, Flow, PathAtom, Token, TokenSource};

mod header;

pub use header::{consume_header, read_header, write_header};

/// Outer header path marking an artifact as a merkledag document.
pub const OUTER_PATH: &str = "/mdagv1";

/// The codec used when a document carries no `@codec` directive.
pub const DEFAULT_CODEC: Codec = Codec::CborTagged;

/// The codecs this multiplexer can frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    CborTagged,
    CborUntagged,
    Json,
    Protobuf,
}

impl Codec {
    /// The inner header path written for (and matched against) this
    /// codec.
    pub fn header_path(&self) -> &'static str {
        match self {
            Codec::CborTagged => mdag_cbor::HEADER_PATH_TAGS,
            Codec::CborUntagged => mdag_cbor::HEADER_PATH,
            Codec::Json => mdag_json::HEADER_PATH,
            Codec::Protobuf => mdag_pb::HEADER_PATH,
        }
    }

    /// Looks up a codec by its header path.
    pub fn from_path(path: &str) -> Option<Codec> {
        match path {
            p if p == mdag_cbor::HEADER_PATH_TAGS => Some(Codec::CborTagged),
            p if p == mdag_cbor::HEADER_PATH => Some(Codec::CborUntagged),
            p if p == mdag_json::HEADER_PATH => Some(Codec::Json),
            p if p == mdag_pb::HEADER_PATH => Some(Codec::Protobuf),
            _ => None,
        }
    }
}

/// A dispatched decoder, ready to replay the framed document.
pub enum AnyDecoder {
    Cbor(CborDecoder),
    Json(JsonDecoder),
    Pb(PbDecoder),
}

impl TokenSource for AnyDecoder {
    fn read<F>(&mut self, f: F) -> Result<(), Error>
    where
        F: FnMut(&[PathAtom], Token) -> Result<Flow, Error>,
    {
        match self {
            AnyDecoder::Cbor(d) => d.read(f),
            AnyDecoder::Json(d) => d.read(f),
            AnyDecoder::Pb(d) => d.read(f),
        }
    }
}

/// Consumes both headers and returns the selected codec together with a
/// decoder over the remaining byte stream.
pub fn decode_source(
    mut reader: impl Read + Send + 'static,
) -> Result<(Codec, AnyDecoder), Error> {
    consume_header(&mut reader, OUTER_PATH)?;
    let path = read_header(&mut reader)?;
    let codec = Codec::from_path(&path).ok_or(Error::UnknownCodec(path))?;
    debug!(codec = codec.header_path(), "dispatching decode");
    let decoder = match codec {
        Codec::CborTagged | Codec::CborUntagged => AnyDecoder::Cbor(CborDecoder::new(reader)),
        Codec::Json => AnyDecoder::Json(JsonDecoder::new(reader)),
        Codec::Protobuf => AnyDecoder::Pb(PbDecoder::new(reader)),
    };
    Ok((codec, decoder))
}

/// Decodes a framed document into a node.
pub fn decode(reader: impl Read + Send + 'static) -> Result<(Codec, Node), Error> {
    let (codec, mut decoder) = decode_source(reader)?;
    let node = node_from(&mut decoder)?;
    Ok((codec, node))
}

/// Byte-slice convenience for [`decode`].
pub fn decode_bytes(bytes: Vec<u8>) -> Result<(Codec, Node), Error> {
    decode(std::io::Cursor::new(bytes))
}

/// Encodes a node under an explicit codec, writing the outer and codec
/// headers first. A top-level `@codec` key is stripped before encoding;
/// leaving it in would change the bytes on the next round trip.
pub fn encode(w: &mut impl Write, node: &Node, codec: Codec) -> Result<(), Error> {
    let stripped;
    let node = if node.contains_key(CODEC_KEY) {
        let mut clone = node.clone();
        clone.remove(CODEC_KEY);
        stripped = clone;
        &stripped
    } else {
        node
    };

    write_header(w, OUTER_PATH)?;
    write_header(w, codec.header_path())?;
    debug!(codec = codec.header_path(), "dispatching encode");
    match codec {
        Codec::CborTagged => mdag_cbor::encode_node(w, node, true),
        Codec::CborUntagged => mdag_cbor::encode_node(w, node, false),
        Codec::Json => mdag_json::encode_node(w, node),
        Codec::Protobuf => mdag_pb::encode(w, node, true),
    }
}

/// Encodes a node under the codec named by its `@codec` key, falling
/// back to [`DEFAULT_CODEC`]. An unknown `@codec` value is an error.
pub fn encode_auto(w: &mut impl Write, node: &Node) -> Result<(), Error> {
    let codec = match node.get(CODEC_KEY).and_then(Value::as_text) {
        Some(path) => Codec::from_path(path).ok_or_else(|| Error::UnknownCodec(path.into()))?,
        None => DEFAULT_CODEC,
    };
    encode(w, node, codec)
}
