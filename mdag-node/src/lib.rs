//! In-memory representation of merkledag documents.
//!
//! A [`Node`] is an insertion-ordered mapping from text keys to values;
//! a value is a scalar, a node, or an array. A *link* is not a distinct
//! kind: it is any node carrying the reserved [`LINK_KEY`] bound to a
//! text string, possibly next to arbitrary metadata keys.

mod node;
mod reader;
mod walk;
mod writer;

pub use mdag_stream::Scalar;
pub use node::{Node, Value};
pub use walk::{get_path, links, walk};
pub use writer::{materialize, node_from, NodeBuilder};

/// Key marking a node as a merkle-link.
pub const LINK_KEY: &str = "mlink";

/// Selects the output codec on encode (stripped before encoding).
pub const CODEC_KEY: &str = "@codec";

/// The type of the object (JSON-LD style).
pub const TYPE_KEY: &str = "@type";

/// The value of the object (JSON-LD style).
pub const VALUE_KEY: &str = "@value";

/// The JSON-LD style context.
pub const CTX_KEY: &str = "@context";

/// The id of the object (JSON-LD style).
pub const ID_KEY: &str = "@id";
