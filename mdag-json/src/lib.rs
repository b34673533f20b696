//! JSON codec for merkledag documents.
//!
//! The decoder walks `serde_json`'s streaming deserializer and replays
//! it as tokens; the encoder emits the compact form with keys in
//! insertion order. Byte strings cross into JSON as base64 text.

mod decode;
mod encode;

pub use decode::JsonDecoder;
pub use encode::{encode, encode_node};

/// Multicodec header path for JSON output.
pub const HEADER_PATH: &str = "/json";
