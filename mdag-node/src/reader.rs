use mdag_stream::{Emitter, Error, Flow, PathAtom, Token, TokenSource};

use crate::{Node, Value};

// Replaying a materialized tree is how codec-to-codec copies and
// re-encodes start: the tree becomes a source like any decoder.

impl TokenSource for Node {
    fn read<F>(&mut self, f: F) -> Result<(), Error>
    where
        F: FnMut(&[PathAtom], Token) -> Result<Flow, Error>,
    {
        let mut em = Emitter::new(f);
        match emit_node(self, &mut em) {
            Err(Error::Aborted) => Ok(()),
            other => other,
        }
    }
}

impl TokenSource for Value {
    fn read<F>(&mut self, f: F) -> Result<(), Error>
    where
        F: FnMut(&[PathAtom], Token) -> Result<Flow, Error>,
    {
        let mut em = Emitter::new(f);
        match emit_value(self, &mut em) {
            Err(Error::Aborted) => Ok(()),
            other => other,
        }
    }
}

fn emit_value<F>(value: &Value, em: &mut Emitter<F>) -> Result<(), Error>
where
    F: FnMut(&[PathAtom], Token) -> Result<Flow, Error>,
{
    match value {
        Value::Scalar(s) => em.value(s.clone()),
        Value::Node(n) => emit_node(n, em),
        Value::Array(items) => {
            em.begin_array()?;
            for (i, item) in items.iter().enumerate() {
                em.index(i as u64)?;
                emit_value(item, em)?;
            }
            em.end_array()
        }
    }
}

fn emit_node<F>(node: &Node, em: &mut Emitter<F>) -> Result<(), Error>
where
    F: FnMut(&[PathAtom], Token) -> Result<Flow, Error>,
{
    em.begin_node()?;
    for (key, value) in node.entries() {
        em.key(key)?;
        emit_value(value, em)?;
    }
    em.end_node()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_from;
    use mdag_stream::{record, Scalar};

    fn sample() -> Node {
        let mut inner = Node::new();
        inner.insert("mlink", "QmAAA");
        let mut node = Node::new();
        node.insert("title", "demo");
        node.insert("link", inner);
        node.insert(
            "nums",
            Value::Array(vec![Value::from(1i64), Value::from(2i64)]),
        );
        node
    }

    #[test]
    fn replays_in_insertion_order() {
        let got = record(&mut sample()).unwrap();
        let names: Vec<_> = got.iter().map(|(_, t)| t.name()).collect();
        assert_eq!(
            names,
            vec![
                "BeginNode", "Key", "Value", "Key", "BeginNode", "Key", "Value", "EndNode",
                "Key", "BeginArray", "Index", "Value", "Index", "Value", "EndArray", "EndNode"
            ]
        );
        assert_eq!(got[2].0, "title");
        assert_eq!(got[6].1, Token::Value(Scalar::from("QmAAA")));
        assert_eq!(got[6].0, "link/mlink");
    }

    #[test]
    fn round_trips_through_the_builder() {
        let mut original = sample();
        let rebuilt = node_from(&mut original.clone()).unwrap();
        assert_eq!(original, rebuilt);
        // and the token streams match too
        assert_eq!(
            record(&mut original).unwrap(),
            record(&mut rebuilt.clone()).unwrap()
        );
    }

    #[test]
    fn abort_from_callback_is_clean() {
        let mut node = sample();
        let mut seen = 0;
        node.read(|_, _| {
            seen += 1;
            if seen == 3 {
                return Ok(Flow::Abort);
            }
            Ok(Flow::Continue)
        })
        .unwrap();
        assert_eq!(seen, 3);
    }
}
