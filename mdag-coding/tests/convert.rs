use base58::ToBase58;

use mdag_coding::{decode_bytes, decode_source, encode, Codec};
use mdag_node::{links, Node, Value};
use mdag_stream::{PullReader, Pulled, Scalar};

fn document() -> Node {
    let mut baz = Node::new();
    baz.insert("mlink", "QmZku7P7KeeHAnwMr6c4HveYfMzmtVinNXzibkiNbfDbPo");
    let mut node = Node::new();
    node.insert("foo", "bar");
    node.insert(
        "bar",
        Value::Array(vec![Value::from(1i64), Value::from(2i64), Value::from(3i64)]),
    );
    node.insert("baz", baz);
    node
}

fn encoded(node: &Node, codec: Codec) -> Vec<u8> {
    let mut buf = Vec::new();
    encode(&mut buf, node, codec).unwrap();
    buf
}

#[test]
fn every_codec_preserves_semantics() {
    let doc = document();
    let codecs = [Codec::CborTagged, Codec::CborUntagged, Codec::Json];
    let decoded: Vec<Node> = codecs
        .iter()
        .map(|codec| decode_bytes(encoded(&doc, *codec)).unwrap().1)
        .collect();
    for (i, a) in decoded.iter().enumerate() {
        assert!(a.equivalent(&doc), "codec {i} changed the document");
        for b in &decoded[i + 1..] {
            assert!(a.equivalent(b));
        }
    }
}

#[test]
fn link_structure_survives_every_codec() {
    let doc = document();
    for codec in [Codec::CborTagged, Codec::CborUntagged, Codec::Json] {
        let (_, decoded) = decode_bytes(encoded(&doc, codec)).unwrap();
        let found = links(&Value::Node(decoded));
        let paths: Vec<_> = found.keys().cloned().collect();
        assert_eq!(paths, vec!["baz"]);
        assert_eq!(
            found["baz"].link_text(),
            Some("QmZku7P7KeeHAnwMr6c4HveYfMzmtVinNXzibkiNbfDbPo")
        );
    }
}

#[test]
fn encode_is_idempotent_through_the_muxer() {
    let doc = document();
    for codec in [Codec::CborTagged, Codec::CborUntagged, Codec::Json] {
        let first = encoded(&doc, codec);
        let (_, decoded) = decode_bytes(first.clone()).unwrap();
        let second = encoded(&decoded, codec);
        assert_eq!(first, second, "{codec:?} did not stabilize");
    }
}

fn pb_document() -> Node {
    let mut link = Node::new();
    link.insert("mlink", vec![0x12u8, 0x20, 1, 2, 3].to_base58());
    link.insert("name", "a-file");
    link.insert("size", 42u64);
    let mut node = Node::new();
    node.insert("data", vec![0xde_u8, 0xad, 0xbe, 0xef]);
    node.insert("links", Value::Array(vec![Value::Node(link)]));
    node
}

#[test]
fn protobuf_frames_round_trip_byte_exact() {
    let framed = encoded(&pb_document(), Codec::Protobuf);
    assert!(framed.starts_with(b"\n/mdagv1\n\n/protobuf/msgio\n"));

    let (codec, decoded) = decode_bytes(framed.clone()).unwrap();
    assert_eq!(codec, Codec::Protobuf);
    let again = encoded(&decoded, Codec::Protobuf);
    assert_eq!(framed, again);
}

#[test]
fn decoders_feed_encoders_directly() {
    let doc = document();
    let framed = encoded(&doc, Codec::Json);
    let (_, mut decoder) = decode_source(std::io::Cursor::new(framed)).unwrap();

    // transcode straight from the token stream
    let mut cbor = Vec::new();
    mdag_cbor::encode_from(&mut cbor, &mut decoder, true).unwrap();
    assert_eq!(cbor, {
        let mut direct = Vec::new();
        mdag_cbor::encode_node(&mut direct, &doc, true).unwrap();
        direct
    });
}

#[test]
fn framed_streams_can_be_pulled_lazily() {
    let framed = encoded(&document(), Codec::Json);
    let (_, decoder) = decode_source(std::io::Cursor::new(framed)).unwrap();

    let mut reader = PullReader::spawn(decoder).unwrap();
    let Pulled::Entries(mut root) = reader.root().unwrap() else {
        panic!("expected entries at the root");
    };
    assert!(root.next().unwrap());
    assert_eq!(root.key(), Some("foo"));
    let Pulled::Scalar(Scalar::Text(v)) = root.value().unwrap() else {
        panic!("expected a text scalar");
    };
    assert_eq!(v, "bar");

    // skip the array wholesale, then read one nested key
    assert!(root.next().unwrap());
    assert_eq!(root.key(), Some("bar"));
    assert!(root.next().unwrap());
    assert_eq!(root.key(), Some("baz"));
    let mut baz = root.children().unwrap();
    assert!(baz.next().unwrap());
    assert_eq!(baz.key(), Some("mlink"));
}
