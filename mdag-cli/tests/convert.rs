use assert_cmd::Command;
use predicates::prelude::*;

use mdag_coding::decode_bytes;

// a framed JSON document still carrying its @codec directive
fn fixture() -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"\n/mdagv1\n\n/json\n");
    buf.extend_from_slice(
        br#"{"@codec":"/json","abc":{"mlink":"QmXg9Pp2ytZ14xgmQjYEiHjVjMFXzCVVEcRTWJBmLgR39V"}}"#,
    );
    buf
}

#[test]
fn converts_between_codecs() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("doc.json.bin");
    let output = dir.path().join("doc.cbor.bin");
    std::fs::write(&input, fixture()).unwrap();

    Command::cargo_bin("mdag-convert")
        .unwrap()
        .args(["-i"])
        .arg(&input)
        .args(["-o"])
        .arg(&output)
        .args(["-c", "/cbor/ipld-tagsv1"])
        .assert()
        .success();

    let converted = std::fs::read(&output).unwrap();
    assert!(converted.starts_with(b"\n/mdagv1\n\n/cbor/ipld-tagsv1\n"));
    let (_, node) = decode_bytes(converted).unwrap();
    // the directive was stripped on the way through
    assert!(node.get("@codec").is_none());
    assert_eq!(
        node.get("abc").unwrap().as_node().unwrap().link_text(),
        Some("QmXg9Pp2ytZ14xgmQjYEiHjVjMFXzCVVEcRTWJBmLgR39V")
    );
}

#[test]
fn unknown_codec_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("doc.bin");
    let output = dir.path().join("out.bin");
    std::fs::write(&input, fixture()).unwrap();

    Command::cargo_bin("mdag-convert")
        .unwrap()
        .args(["-i"])
        .arg(&input)
        .args(["-o"])
        .arg(&output)
        .args(["-c", "/msgpack"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown codec"));
}

#[test]
fn garbage_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("doc.bin");
    let output = dir.path().join("out.bin");
    std::fs::write(&input, b"not a framed document").unwrap();

    Command::cargo_bin("mdag-convert")
        .unwrap()
        .args(["-i"])
        .arg(&input)
        .args(["-o"])
        .arg(&output)
        .args(["-c", "/json"])
        .assert()
        .failure();
}
