//! Legacy merkledag v1 protobuf codec.
//!
//! The wire schema is fixed:
//!
//! ```text
//! PBNode { optional bytes Data = 1; repeated PBLink Links = 2; }
//! PBLink { optional bytes Hash = 1; optional string Name = 2; optional uint64 Tsize = 3; }
//! ```
//!
//! The payload is preceded by an unsigned varint length prefix. The
//! parser only accepts the canonical field layout (ascending fields, no
//! unknowns, exact length), which is what makes decode-then-re-encode
//! byte-exact for every payload this codec accepts.

mod codec;
mod wire;

pub use codec::{encode, encode_raw, PbDecoder};
pub use wire::{PbLink, PbNode};

/// Multicodec header path for the length-framed protobuf body.
pub const HEADER_PATH: &str = "/protobuf/msgio";

/// Key carrying the node payload bytes.
pub const DATA_KEY: &str = "data";

/// Key carrying the link array.
pub const LINKS_KEY: &str = "links";

/// Link name key inside a link entry.
pub const NAME_KEY: &str = "name";

/// Cumulative target size key inside a link entry.
pub const SIZE_KEY: &str = "size";
