//! CBOR codec for merkledag documents.
//!
//! Decoding walks the raw CBOR item stream and replays it as tokens,
//! inflating the IPLD link tag into a node carrying the reserved link
//! key. Encoding buffers the whole tree (canonical map ordering cannot
//! be streamed) and, in tagged mode, deflates link nodes back into the
//! tag.

mod decode;
mod encode;

pub use decode::CborDecoder;
pub use encode::{encode, encode_from, encode_node};

/// Multicodec header path for untagged CBOR output.
pub const HEADER_PATH: &str = "/cbor";

/// Multicodec header path for link-tagged CBOR output.
pub const HEADER_PATH_TAGS: &str = "/cbor/ipld-tagsv1";

/// CBOR tag marking a merkle-link. This value is the wire contract.
pub const TAG_LINK: u64 = 258;
