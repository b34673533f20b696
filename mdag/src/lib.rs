//! Content-addressed linked-data codecs for merkledag documents.
//!
//! The same in-memory document can be serialized into CBOR (with or
//! without IPLD link tags), JSON, or the legacy merkledag v1 protobuf
//! layout, and parsed back out. Every codec speaks the token protocol
//! defined in [`stream`], so documents can be copied codec-to-codec or
//! consumed lazily without materializing them.

#[doc(inline)]
pub use mdag_stream as stream;

#[doc(inline)]
pub use mdag_node as node;

#[doc(inline)]
pub use mdag_coding as coding;

pub mod codecs {
    //! The individual wire codecs behind the multiplexer.

    #[doc(inline)]
    pub use mdag_cbor as cbor;

    #[doc(inline)]
    pub use mdag_json as json;

    #[doc(inline)]
    pub use mdag_pb as pb;
}
