use std::io::{Read, Write};

use base58::{FromBase58, ToBase58};

use mdag_node::{Node, LINK_KEY};
use mdag_stream::{
    Emitter, Error, Flow, PathAtom, Scalar, StreamSource, Token, TokenSource,
};

use crate::wire::{read_uvarint, write_uvarint, PbLink, PbNode};
use crate::{DATA_KEY, LINKS_KEY, NAME_KEY, SIZE_KEY};

/// Decoder for a varint-length-prefixed merkledag v1 payload.
///
/// The decoded document is shaped as `data` (bytes, when present on the
/// wire) followed by `links`, an array of link nodes carrying `mlink`
/// (base58 of the hash), `name` and `size` for exactly the fields each
/// wire link has.
pub struct PbDecoder {
    source: StreamSource,
}

impl PbDecoder {
    pub fn new(reader: impl Read + Send + 'static) -> Self {
        PbDecoder {
            source: StreamSource::read_once(reader),
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        PbDecoder {
            source: StreamSource::from(bytes),
        }
    }
}

impl TokenSource for PbDecoder {
    fn read<F>(&mut self, f: F) -> Result<(), Error>
    where
        F: FnMut(&[PathAtom], Token) -> Result<Flow, Error>,
    {
        let bytes = self.source.take_all()?;
        let mut pos = 0;
        let len = read_uvarint(&bytes, &mut pos)?;
        let body = bytes
            .get(pos..)
            .filter(|rest| rest.len() as u64 == len)
            .ok_or_else(|| Error::Malformed("length prefix does not match payload".into()))?;
        let node = PbNode::unmarshal(body)?;
        let mut em = Emitter::new(f);
        match replay(&node, &mut em) {
            Err(Error::Aborted) => Ok(()),
            other => other,
        }
    }
}

fn replay<F>(node: &PbNode, em: &mut Emitter<F>) -> Result<(), Error>
where
    F: FnMut(&[PathAtom], Token) -> Result<Flow, Error>,
{
    em.begin_node()?;
    if let Some(data) = &node.data {
        em.key(DATA_KEY)?;
        em.value(Scalar::Bytes(data.clone()))?;
    }
    em.key(LINKS_KEY)?;
    em.begin_array()?;
    for (i, link) in node.links.iter().enumerate() {
        em.index(i as u64)?;
        em.begin_node()?;
        if let Some(hash) = &link.hash {
            em.key(LINK_KEY)?;
            em.value(Scalar::Text(hash.to_base58()))?;
        }
        if let Some(name) = &link.name {
            em.key(NAME_KEY)?;
            em.value(Scalar::Text(name.clone()))?;
        }
        if let Some(tsize) = link.tsize {
            em.key(SIZE_KEY)?;
            em.value(Scalar::Uint(tsize))?;
        }
        em.end_node()?;
    }
    em.end_array()?;
    em.end_node()
}

/// Encodes a node as a varint-length-prefixed merkledag v1 payload.
///
/// Strict mode requires `data` and `links` at the top level and exactly
/// `mlink`/`name`/`size` in every link, and rejects any link hash whose
/// base58 does not survive a decode/re-encode round trip. Relaxed mode
/// writes whatever subset is present and ignores unknown keys.
pub fn encode(w: &mut impl Write, node: &Node, strict: bool) -> Result<(), Error> {
    let body = encode_raw(node, strict)?;
    let mut prefix = Vec::with_capacity(10);
    write_uvarint(&mut prefix, body.len() as u64);
    w.write_all(&prefix)?;
    w.write_all(&body)?;
    Ok(())
}

/// Body-only variant of [`encode`] (no length prefix).
pub fn encode_raw(node: &Node, strict: bool) -> Result<Vec<u8>, Error> {
    Ok(from_node(node, strict)?.marshal())
}

fn from_node(node: &Node, strict: bool) -> Result<PbNode, Error> {
    let mut pbn = PbNode::default();
    let mut has_data = false;
    let mut has_links = false;

    for (key, value) in node.entries() {
        match key.as_str() {
            DATA_KEY => {
                has_data = true;
                let data = value
                    .as_scalar()
                    .and_then(Scalar::as_bytes)
                    .ok_or_else(|| Error::wrong_type("bytes", value.kind()))?;
                pbn.data = Some(data.to_vec());
            }
            LINKS_KEY => {
                has_links = true;
                let links = value
                    .as_array()
                    .ok_or_else(|| Error::wrong_type("array", value.kind()))?;
                for link in links {
                    let link = link
                        .as_node()
                        .ok_or_else(|| Error::wrong_type("node", link.kind()))?;
                    pbn.links.push(from_link(link, strict)?);
                }
            }
            other => {
                if strict {
                    return Err(Error::StrictSchema(format!(
                        "node contains extra field ({other})"
                    )));
                }
            }
        }
    }

    if strict && !has_data {
        return Err(Error::StrictSchema("no data".into()));
    }
    if strict && !has_links {
        return Err(Error::StrictSchema("no links".into()));
    }
    Ok(pbn)
}

fn from_link(node: &Node, strict: bool) -> Result<PbLink, Error> {
    let mut pbl = PbLink::default();

    for (key, value) in node.entries() {
        match key.as_str() {
            LINK_KEY => {
                let text = value
                    .as_text()
                    .ok_or_else(|| Error::wrong_type("text", value.kind()))?;
                match text.from_base58() {
                    Ok(hash) => {
                        if strict && hash.to_base58() != text {
                            return Err(Error::StrictSchema(
                                "link hash is not canonical base58".into(),
                            ));
                        }
                        pbl.hash = Some(hash);
                    }
                    Err(_) if strict => {
                        return Err(Error::StrictSchema("link hash is not base58".into()))
                    }
                    Err(_) => {}
                }
            }
            NAME_KEY => {
                let text = value
                    .as_text()
                    .ok_or_else(|| Error::wrong_type("text", value.kind()))?;
                pbl.name = Some(text.to_owned());
            }
            SIZE_KEY => {
                let size = value
                    .as_scalar()
                    .and_then(Scalar::as_uint)
                    .ok_or_else(|| Error::wrong_type("unsigned integer", value.kind()))?;
                pbl.tsize = Some(size);
            }
            other => {
                if strict {
                    return Err(Error::StrictSchema(format!(
                        "link contains extra field ({other})"
                    )));
                }
            }
        }
    }

    if strict && (pbl.hash.is_none() || pbl.name.is_none() || pbl.tsize.is_none()) {
        return Err(Error::StrictSchema(
            "link must carry mlink, name and size".into(),
        ));
    }
    Ok(pbl)
}
