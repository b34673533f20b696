use std::io::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use mdag_node::{Node, Value};
use mdag_stream::{Error, Scalar};

/// Encodes a value tree as compact JSON, keys in insertion order.
///
/// Byte strings become base64 text; big integers are written as full
/// decimal literals; floats use the shortest form that re-decodes to
/// the same value and always keep a fractional or exponent part, so a
/// float never comes back as an integer.
pub fn encode(w: &mut impl Write, value: &Value) -> Result<(), Error> {
    write_value(w, value)
}

/// Node-rooted variant of [`encode`].
pub fn encode_node(w: &mut impl Write, node: &Node) -> Result<(), Error> {
    write_node(w, node)
}

fn write_value(w: &mut impl Write, value: &Value) -> Result<(), Error> {
    match value {
        Value::Scalar(s) => write_scalar(w, s),
        Value::Node(node) => write_node(w, node),
        Value::Array(items) => {
            w.write_all(b"[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    w.write_all(b",")?;
                }
                write_value(w, item)?;
            }
            w.write_all(b"]")?;
            Ok(())
        }
    }
}

fn write_node(w: &mut impl Write, node: &Node) -> Result<(), Error> {
    w.write_all(b"{")?;
    for (i, (key, value)) in node.entries().enumerate() {
        if i > 0 {
            w.write_all(b",")?;
        }
        write_text(w, key)?;
        w.write_all(b":")?;
        write_value(w, value)?;
    }
    w.write_all(b"}")?;
    Ok(())
}

fn write_scalar(w: &mut impl Write, scalar: &Scalar) -> Result<(), Error> {
    match scalar {
        Scalar::Null => w.write_all(b"null")?,
        Scalar::Bool(true) => w.write_all(b"true")?,
        Scalar::Bool(false) => w.write_all(b"false")?,
        Scalar::Int(v) => write!(w, "{v}")?,
        Scalar::Uint(v) => write!(w, "{v}")?,
        Scalar::Big(v) => write!(w, "{v}")?,
        Scalar::F32(v) => {
            if !v.is_finite() {
                return Err(non_finite());
            }
            serde_json::to_writer(&mut *w, v).map_err(|e| Error::Malformed(e.to_string()))?;
        }
        Scalar::F64(v) => write_float(w, *v)?,
        Scalar::Text(v) => write_text(w, v)?,
        Scalar::Bytes(v) => write_text(w, &STANDARD.encode(v))?,
    }
    Ok(())
}

fn write_float(w: &mut impl Write, value: f64) -> Result<(), Error> {
    if !value.is_finite() {
        return Err(non_finite());
    }
    serde_json::to_writer(&mut *w, &value).map_err(|e| Error::Malformed(e.to_string()))
}

fn non_finite() -> Error {
    Error::Malformed("json cannot represent a non-finite float".into())
}

fn write_text(w: &mut impl Write, text: &str) -> Result<(), Error> {
    serde_json::to_writer(&mut *w, text).map_err(|e| Error::Malformed(e.to_string()))
}
