//! Streaming token protocol shared by every merkledag codec.
//!
//! A decoder is anything that can replay a document as a flat stream of
//! tokens (see [`Token`]); an encoder is anything that can consume one.
//! This crate defines the token alphabet, the callback dispatch rules
//! (including subtree skipping and aborts), the path bookkeeping that
//! accompanies every token, and a pull-style adapter on top of the
//! push-style protocol.

use thiserror::Error;

mod path;
mod pull;
mod read;
mod record;
mod source;
mod token;
mod write;

pub use path::{escape_component, join, unescape_component, PathAtom};
pub use pull::{Chunks, Entries, PullReader, Pulled};
pub use read::{Emitter, TokenSource};
pub use record::record;
pub use source::{ReadSeek, StreamSource};
pub use token::{Flow, Scalar, Token};
pub use write::{copy, NodeWriter};

/// Shared error vocabulary for the token protocol and the codecs that
/// speak it.
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying wire format is invalid.
    #[error("malformed input: {0}")]
    Malformed(String),

    /// The token sequence violates the protocol. Seeing this means the
    /// producer is buggy, not the input.
    #[error("unexpected token {0} in stream")]
    UnexpectedToken(&'static str),

    /// No codec is registered under the given header path.
    #[error("unknown codec {0}")]
    UnknownCodec(String),

    /// A second read was attempted on a non-seekable stream.
    #[error("stream already read: unable to read it a second time")]
    AlreadyConsumed,

    /// Strict-mode schema validation failed.
    #[error("invalid merkledag v1 protobuf: {0}")]
    StrictSchema(String),

    /// A value was pulled as one scalar kind but carried another.
    #[error("value is {actual}, expected {expected}")]
    WrongType {
        expected: &'static str,
        actual: &'static str,
    },

    /// A callback asked the producer to stop. Never surfaced by a
    /// decoder's `read`; consumed internally.
    #[error("read aborted by callback")]
    Aborted,

    /// The pull worker went away before the stream was complete.
    #[error("pull worker disconnected mid-stream")]
    Disconnected,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn wrong_type(expected: &'static str, actual: &'static str) -> Self {
        Error::WrongType { expected, actual }
    }
}
