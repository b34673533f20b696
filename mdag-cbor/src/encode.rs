use std::cmp::Ordering;
use std::io::Write;

use minicbor::data::Tag;
use minicbor::Encoder;
use multiaddr::Multiaddr;
use num_bigint::{BigInt, Sign};

use mdag_node::{materialize, Node, Value, LINK_KEY};
use mdag_stream::{Error, Scalar, TokenSource};

use crate::TAG_LINK;

type Enc<'a> = Encoder<&'a mut Vec<u8>>;

/// Encodes a value tree as CBOR. With `tags` set, nodes carrying the
/// link key deflate into the link tag; map entries are always emitted
/// in canonical order (key length ascending, then lexicographic).
pub fn encode(w: &mut impl Write, value: &Value, tags: bool) -> Result<(), Error> {
    let mut buf = Vec::new();
    let mut e = Encoder::new(&mut buf);
    write_value(&mut e, value, tags)?;
    w.write_all(&buf)?;
    Ok(())
}

/// Node-rooted variant of [`encode`].
pub fn encode_node(w: &mut impl Write, node: &Node, tags: bool) -> Result<(), Error> {
    let mut buf = Vec::new();
    let mut e = Encoder::new(&mut buf);
    write_node(&mut e, node, tags)?;
    w.write_all(&buf)?;
    Ok(())
}

/// Buffers a token source into a tree and encodes it. Buffering is
/// unavoidable: canonical map ordering needs the whole value.
pub fn encode_from<S: TokenSource>(
    w: &mut impl Write,
    source: &mut S,
    tags: bool,
) -> Result<(), Error> {
    let value = materialize(source)?;
    encode(w, &value, tags)
}

fn failed<E: std::fmt::Display>(e: minicbor::encode::Error<E>) -> Error {
    Error::Malformed(e.to_string())
}

fn write_value(e: &mut Enc, value: &Value, tags: bool) -> Result<(), Error> {
    match value {
        Value::Scalar(s) => write_scalar(e, s),
        Value::Array(items) => {
            e.array(items.len() as u64).map_err(failed)?;
            for item in items {
                write_value(e, item, tags)?;
            }
            Ok(())
        }
        Value::Node(node) => write_node(e, node, tags),
    }
}

fn write_node(e: &mut Enc, node: &Node, tags: bool) -> Result<(), Error> {
    if tags {
        if let Some(target) = node.link_text() {
            return write_link(e, node, target, tags);
        }
    }
    e.map(node.len() as u64).map_err(failed)?;
    for (key, value) in sorted(node, None) {
        e.str(key).map_err(failed)?;
        write_value(e, value, tags)?;
    }
    Ok(())
}

// tag(258) with the bare payload, or [payload, meta] when the link
// carries sibling keys. The payload is the multiaddr binary form when
// the target text survives a parse/re-render round trip, else the text
// itself.
fn write_link(e: &mut Enc, node: &Node, target: &str, tags: bool) -> Result<(), Error> {
    e.tag(Tag::Unassigned(TAG_LINK)).map_err(failed)?;
    let binary = match target.parse::<Multiaddr>() {
        Ok(ma) if ma.to_string() == target => Some(ma.to_vec()),
        _ => None,
    };
    if node.len() > 1 {
        e.array(2).map_err(failed)?;
    }
    match &binary {
        Some(bytes) => e.bytes(bytes).map_err(failed)?,
        None => e.str(target).map_err(failed)?,
    };
    if node.len() > 1 {
        e.map(node.len() as u64 - 1).map_err(failed)?;
        for (key, value) in sorted(node, Some(LINK_KEY)) {
            e.str(key).map_err(failed)?;
            write_value(e, value, tags)?;
        }
    }
    Ok(())
}

fn write_scalar(e: &mut Enc, scalar: &Scalar) -> Result<(), Error> {
    match scalar {
        Scalar::Null => e.null().map_err(failed)?,
        Scalar::Bool(v) => e.bool(*v).map_err(failed)?,
        Scalar::Int(v) => e.i64(*v).map_err(failed)?,
        Scalar::Uint(v) => e.u64(*v).map_err(failed)?,
        Scalar::Big(v) => return write_bignum(e, v),
        Scalar::F32(v) => e.f32(*v).map_err(failed)?,
        Scalar::F64(v) => e.f64(*v).map_err(failed)?,
        Scalar::Text(v) => e.str(v).map_err(failed)?,
        Scalar::Bytes(v) => e.bytes(v).map_err(failed)?,
    };
    Ok(())
}

fn write_bignum(e: &mut Enc, value: &BigInt) -> Result<(), Error> {
    if value.sign() == Sign::Minus {
        let magnitude: BigInt = -(value + 1u8);
        e.tag(Tag::NegBignum).map_err(failed)?;
        e.bytes(&magnitude.to_bytes_be().1).map_err(failed)?;
    } else {
        e.tag(Tag::PosBignum).map_err(failed)?;
        e.bytes(&value.to_bytes_be().1).map_err(failed)?;
    }
    Ok(())
}

// Canonical CBOR entry order: compare keys by encoded length first,
// then by byte content.
fn sorted<'n>(node: &'n Node, except: Option<&str>) -> Vec<(&'n str, &'n Value)> {
    let mut entries: Vec<(&str, &Value)> = node
        .entries()
        .filter(|(k, _)| except != Some(k.as_str()))
        .map(|(k, v)| (k.as_str(), v))
        .collect();
    entries.sort_by(|(a, _), (b, _)| canonical_key_order(a, b));
    entries
}

fn canonical_key_order(a: &str, b: &str) -> Ordering {
    a.len()
        .cmp(&b.len())
        .then_with(|| a.as_bytes().cmp(b.as_bytes()))
}
