use std::io::{Read, Write};

use mdag_stream::Error;

// Header paths are short codec identifiers; anything longer is noise.
const MAX_PATH_LEN: usize = 128;

const DELIM: u8 = b'\n';

/// Writes a multicodec header: `\n`, the path, `\n`.
pub fn write_header(w: &mut impl Write, path: &str) -> Result<(), Error> {
    w.write_all(&[DELIM])?;
    w.write_all(path.as_bytes())?;
    w.write_all(&[DELIM])?;
    Ok(())
}

/// Reads one multicodec header and returns its path.
pub fn read_header(r: &mut impl Read) -> Result<String, Error> {
    if read_byte(r)? != DELIM {
        return Err(Error::Malformed("missing multicodec header".into()));
    }
    let mut path = Vec::new();
    loop {
        let byte = read_byte(r)?;
        if byte == DELIM {
            break;
        }
        if path.len() == MAX_PATH_LEN {
            return Err(Error::Malformed("multicodec header path too long".into()));
        }
        path.push(byte);
    }
    String::from_utf8(path)
        .map_err(|_| Error::Malformed("multicodec header path is not utf-8".into()))
}

/// Reads one header and requires it to carry the expected path.
pub fn consume_header(r: &mut impl Read, expected: &str) -> Result<(), Error> {
    let found = read_header(r)?;
    if found != expected {
        return Err(Error::Malformed(format!(
            "expected header {expected}, found {found}"
        )));
    }
    Ok(())
}

fn read_byte(r: &mut impl Read) -> Result<u8, Error> {
    let mut byte = [0u8; 1];
    r.read_exact(&mut byte).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Malformed("truncated multicodec header".into())
        } else {
            Error::Io(e)
        }
    })?;
    Ok(byte[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let mut buf = Vec::new();
        write_header(&mut buf, "/mdagv1").unwrap();
        assert_eq!(buf, b"\n/mdagv1\n");
        let mut r = buf.as_slice();
        assert_eq!(read_header(&mut r).unwrap(), "/mdagv1");
    }

    #[test]
    fn wrong_expected_path_is_malformed() {
        let mut buf = Vec::new();
        write_header(&mut buf, "/json").unwrap();
        let mut r = buf.as_slice();
        assert!(matches!(
            consume_header(&mut r, "/mdagv1").unwrap_err(),
            Error::Malformed(_)
        ));
    }

    #[test]
    fn truncated_header_is_malformed() {
        let mut r = &b"\n/jso"[..];
        assert!(matches!(
            read_header(&mut r).unwrap_err(),
            Error::Malformed(_)
        ));
    }

    #[test]
    fn missing_leading_delimiter_is_malformed() {
        let mut r = &b"/json\n"[..];
        assert!(matches!(
            read_header(&mut r).unwrap_err(),
            Error::Malformed(_)
        ));
    }
}
