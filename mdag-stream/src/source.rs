use std::io::{Read, Seek, SeekFrom};

use crate::Error;

/// Combined bound for inputs that can be rewound between reads.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Input plumbing shared by the decoders.
///
/// A seekable source records its starting offset on construction and
/// rewinds to it for every read, so the same decoder can be driven more
/// than once. A plain stream is read-once: the second attempt fails with
/// [`Error::AlreadyConsumed`].
pub enum StreamSource {
    Once(Option<Box<dyn Read + Send>>),
    Seekable {
        inner: Box<dyn ReadSeek + Send>,
        start: u64,
    },
}

impl StreamSource {
    pub fn read_once(reader: impl Read + Send + 'static) -> Self {
        StreamSource::Once(Some(Box::new(reader)))
    }

    pub fn seekable(mut reader: impl ReadSeek + Send + 'static) -> Result<Self, Error> {
        let start = reader.stream_position()?;
        Ok(StreamSource::Seekable {
            inner: Box::new(reader),
            start,
        })
    }

    /// Buffers the remaining input.
    pub fn take_all(&mut self) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::new();
        match self {
            StreamSource::Once(slot) => {
                let mut reader = slot.take().ok_or(Error::AlreadyConsumed)?;
                reader.read_to_end(&mut buf)?;
            }
            StreamSource::Seekable { inner, start } => {
                inner.seek(SeekFrom::Start(*start))?;
                inner.read_to_end(&mut buf)?;
            }
        }
        Ok(buf)
    }
}

impl From<Vec<u8>> for StreamSource {
    fn from(bytes: Vec<u8>) -> Self {
        StreamSource::seekable(std::io::Cursor::new(bytes)).expect("cursor position is available")
    }
}
