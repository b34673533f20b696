use mdag_stream::Error;

// wire types of the merkledag v1 schema
const WIRE_VARINT: u8 = 0;
const WIRE_LEN: u8 = 2;

/// Reads a LEB128 unsigned varint (little-endian 7-bit chunks,
/// continuation bit 0x80).
pub fn read_uvarint(buf: &[u8], pos: &mut usize) -> Result<u64, Error> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    loop {
        let byte = *buf
            .get(*pos)
            .ok_or_else(|| Error::Malformed("truncated varint".into()))?;
        *pos += 1;
        if shift == 63 && byte > 1 {
            return Err(Error::Malformed("varint overflows u64".into()));
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
        if shift > 63 {
            return Err(Error::Malformed("varint overflows u64".into()));
        }
    }
}

pub fn write_uvarint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn read_len_field<'a>(buf: &'a [u8], pos: &mut usize) -> Result<&'a [u8], Error> {
    let len = read_uvarint(buf, pos)?;
    let len = usize::try_from(len)
        .map_err(|_| Error::Malformed("length-delimited field too large".into()))?;
    let end = pos
        .checked_add(len)
        .filter(|end| *end <= buf.len())
        .ok_or_else(|| Error::Malformed("length-delimited field overruns payload".into()))?;
    let field = &buf[*pos..end];
    *pos = end;
    Ok(field)
}

fn field_header(buf: &[u8], pos: &mut usize) -> Result<(u64, u8), Error> {
    let tag = read_uvarint(buf, pos)?;
    Ok((tag >> 3, (tag & 0x7) as u8))
}

fn write_field_header(out: &mut Vec<u8>, field: u64, wire: u8) {
    write_uvarint(out, field << 3 | u64::from(wire));
}

/// The merkledag v1 node message. Field presence is faithful to the
/// wire: an absent optional field stays `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PbNode {
    pub data: Option<Vec<u8>>,
    pub links: Vec<PbLink>,
}

/// One link entry of a [`PbNode`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PbLink {
    pub hash: Option<Vec<u8>>,
    pub name: Option<String>,
    pub tsize: Option<u64>,
}

impl PbNode {
    /// Parses a node payload, accepting only the canonical layout:
    /// fields in ascending order, each optional field at most once, no
    /// unknown fields, nothing after the last byte.
    pub fn unmarshal(buf: &[u8]) -> Result<Self, Error> {
        let mut node = PbNode::default();
        let mut pos = 0;
        while pos < buf.len() {
            match field_header(buf, &mut pos)? {
                (1, WIRE_LEN) => {
                    if node.data.is_some() || !node.links.is_empty() {
                        return Err(Error::Malformed(
                            "non-canonical field order in node".into(),
                        ));
                    }
                    node.data = Some(read_len_field(buf, &mut pos)?.to_vec());
                }
                (2, WIRE_LEN) => {
                    let body = read_len_field(buf, &mut pos)?;
                    node.links.push(PbLink::unmarshal(body)?);
                }
                (field, wire) => {
                    return Err(Error::Malformed(format!(
                        "unknown node field {field} (wire type {wire})"
                    )))
                }
            }
        }
        Ok(node)
    }

    pub fn marshal(&self) -> Vec<u8> {
        let mut out = Vec::new();
        if let Some(data) = &self.data {
            write_field_header(&mut out, 1, WIRE_LEN);
            write_uvarint(&mut out, data.len() as u64);
            out.extend_from_slice(data);
        }
        for link in &self.links {
            let body = link.marshal();
            write_field_header(&mut out, 2, WIRE_LEN);
            write_uvarint(&mut out, body.len() as u64);
            out.extend_from_slice(&body);
        }
        out
    }
}

impl PbLink {
    fn unmarshal(buf: &[u8]) -> Result<Self, Error> {
        let mut link = PbLink::default();
        let mut pos = 0;
        let mut last_field = 0u64;
        while pos < buf.len() {
            let (field, wire) = field_header(buf, &mut pos)?;
            if field <= last_field {
                return Err(Error::Malformed(
                    "non-canonical field order in link".into(),
                ));
            }
            last_field = field;
            match (field, wire) {
                (1, WIRE_LEN) => link.hash = Some(read_len_field(buf, &mut pos)?.to_vec()),
                (2, WIRE_LEN) => {
                    let raw = read_len_field(buf, &mut pos)?;
                    let name = std::str::from_utf8(raw)
                        .map_err(|_| Error::Malformed("link name is not utf-8".into()))?;
                    link.name = Some(name.to_owned());
                }
                (3, WIRE_VARINT) => link.tsize = Some(read_uvarint(buf, &mut pos)?),
                (field, wire) => {
                    return Err(Error::Malformed(format!(
                        "unknown link field {field} (wire type {wire})"
                    )))
                }
            }
        }
        Ok(link)
    }

    fn marshal(&self) -> Vec<u8> {
        let mut out = Vec::new();
        if let Some(hash) = &self.hash {
            write_field_header(&mut out, 1, WIRE_LEN);
            write_uvarint(&mut out, hash.len() as u64);
            out.extend_from_slice(hash);
        }
        if let Some(name) = &self.name {
            write_field_header(&mut out, 2, WIRE_LEN);
            write_uvarint(&mut out, name.len() as u64);
            out.extend_from_slice(name.as_bytes());
        }
        if let Some(tsize) = self.tsize {
            write_field_header(&mut out, 3, WIRE_VARINT);
            write_uvarint(&mut out, tsize);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_round_trip() {
        for value in [0u64, 1, 127, 128, 300, u64::MAX] {
            let mut buf = Vec::new();
            write_uvarint(&mut buf, value);
            let mut pos = 0;
            assert_eq!(read_uvarint(&buf, &mut pos).unwrap(), value);
            assert_eq!(pos, buf.len());
        }
    }

    #[test]
    fn varint_truncation_is_malformed() {
        let mut pos = 0;
        assert!(matches!(
            read_uvarint(&[0x80], &mut pos).unwrap_err(),
            Error::Malformed(_)
        ));
    }

    #[test]
    fn varint_overflow_is_malformed() {
        // eleven continuation bytes can never fit in a u64
        let buf = [0xffu8; 11];
        let mut pos = 0;
        assert!(matches!(
            read_uvarint(&buf, &mut pos).unwrap_err(),
            Error::Malformed(_)
        ));
    }

    #[test]
    fn node_marshal_round_trip() {
        let node = PbNode {
            data: Some(vec![1, 2, 3]),
            links: vec![
                PbLink {
                    hash: Some(vec![0x12, 0x20, 9, 9]),
                    name: Some("child".into()),
                    tsize: Some(300),
                },
                PbLink {
                    hash: Some(vec![0xaa]),
                    name: None,
                    tsize: None,
                },
            ],
        };
        let bytes = node.marshal();
        assert_eq!(PbNode::unmarshal(&bytes).unwrap(), node);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        // field 3, wire type 2 at node level
        let bytes = [0x1a, 0x01, 0xff];
        assert!(matches!(
            PbNode::unmarshal(&bytes).unwrap_err(),
            Error::Malformed(_)
        ));
    }

    #[test]
    fn data_after_links_is_rejected() {
        let link = PbLink {
            hash: Some(vec![1]),
            name: None,
            tsize: None,
        }
        .marshal();
        let mut bytes = Vec::new();
        write_field_header(&mut bytes, 2, WIRE_LEN);
        write_uvarint(&mut bytes, link.len() as u64);
        bytes.extend_from_slice(&link);
        write_field_header(&mut bytes, 1, WIRE_LEN);
        write_uvarint(&mut bytes, 0);
        assert!(matches!(
            PbNode::unmarshal(&bytes).unwrap_err(),
            Error::Malformed(_)
        ));
    }
}
