use mdag_stream::{copy, Error, NodeWriter, Scalar, TokenSource};

use crate::{Node, Value};

enum Level {
    Node { node: Node, key: Option<String> },
    Array { items: Vec<Value> },
}

/// Assembles a value tree from a token stream.
///
/// `BeginNode`/`BeginArray` push a level; scalars land under the current
/// key or get appended to the open array; value parts accumulate until
/// the terminating value.
#[derive(Default)]
pub struct NodeBuilder {
    root: Option<Value>,
    stack: Vec<Level>,
    part: Option<Scalar>,
}

impl NodeBuilder {
    pub fn new() -> Self {
        NodeBuilder::default()
    }

    /// The assembled value. Fails if the stream was unbalanced or empty.
    pub fn into_value(self) -> Result<Value, Error> {
        if !self.stack.is_empty() {
            return Err(Error::UnexpectedToken("EndOfStream"));
        }
        self.root
            .ok_or_else(|| Error::Malformed("token stream has no document".into()))
    }

    fn place(&mut self, value: Value) -> Result<(), Error> {
        match self.stack.last_mut() {
            None => {
                if self.root.is_some() {
                    return Err(Error::UnexpectedToken("Value"));
                }
                self.root = Some(value);
            }
            Some(Level::Node { node, key }) => {
                let key = key.take().ok_or(Error::UnexpectedToken("Value"))?;
                node.insert(key, value);
            }
            Some(Level::Array { items }) => items.push(value),
        }
        Ok(())
    }

    fn merge_part(&mut self, value: Scalar) -> Result<Scalar, Error> {
        match self.part.take() {
            None => Ok(value),
            Some(Scalar::Text(mut acc)) => match value {
                Scalar::Text(tail) => {
                    acc.push_str(&tail);
                    Ok(Scalar::Text(acc))
                }
                other => Err(Error::wrong_type("text", other.kind())),
            },
            Some(Scalar::Bytes(mut acc)) => match value {
                Scalar::Bytes(tail) => {
                    acc.extend_from_slice(&tail);
                    Ok(Scalar::Bytes(acc))
                }
                other => Err(Error::wrong_type("bytes", other.kind())),
            },
            Some(other) => Err(Error::wrong_type("text or bytes", other.kind())),
        }
    }
}

impl NodeWriter for NodeBuilder {
    fn write_value(&mut self, value: Scalar) -> Result<(), Error> {
        let value = self.merge_part(value)?;
        self.place(Value::Scalar(value))
    }

    fn write_value_part(&mut self, value: Scalar) -> Result<(), Error> {
        if !value.is_chunkable() {
            return Err(Error::UnexpectedToken("ValuePart"));
        }
        let merged = self.merge_part(value)?;
        self.part = Some(merged);
        Ok(())
    }

    fn begin_node(&mut self) -> Result<(), Error> {
        self.stack.push(Level::Node {
            node: Node::new(),
            key: None,
        });
        Ok(())
    }

    fn write_key(&mut self, key: &str) -> Result<(), Error> {
        match self.stack.last_mut() {
            Some(Level::Node { key: slot, .. }) => {
                *slot = Some(key.to_owned());
                Ok(())
            }
            _ => Err(Error::UnexpectedToken("Key")),
        }
    }

    fn end_node(&mut self) -> Result<(), Error> {
        match self.stack.pop() {
            Some(Level::Node { node, .. }) => self.place(Value::Node(node)),
            _ => Err(Error::UnexpectedToken("EndNode")),
        }
    }

    fn begin_array(&mut self) -> Result<(), Error> {
        self.stack.push(Level::Array { items: Vec::new() });
        Ok(())
    }

    fn end_array(&mut self) -> Result<(), Error> {
        match self.stack.pop() {
            Some(Level::Array { items }) => self.place(Value::Array(items)),
            _ => Err(Error::UnexpectedToken("EndArray")),
        }
    }
}

/// Materializes whatever the source replays.
pub fn materialize<S: TokenSource>(source: &mut S) -> Result<Value, Error> {
    let mut builder = NodeBuilder::new();
    copy(source, &mut builder)?;
    builder.into_value()
}

/// Materializes a source whose document must be a node.
pub fn node_from<S: TokenSource>(source: &mut S) -> Result<Node, Error> {
    match materialize(source)? {
        Value::Node(node) => Ok(node),
        other => Err(Error::wrong_type("node", other.kind())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdag_stream::{Flow, PathAtom, Token};

    struct Script(Vec<Token>);

    impl TokenSource for Script {
        fn read<F>(&mut self, f: F) -> Result<(), Error>
        where
            F: FnMut(&[PathAtom], Token) -> Result<Flow, Error>,
        {
            let mut em = mdag_stream::Emitter::new(f);
            for token in self.0.drain(..) {
                match token {
                    Token::BeginNode => em.begin_node()?,
                    Token::Key(k) => em.key(&k)?,
                    Token::EndNode => em.end_node()?,
                    Token::BeginArray => em.begin_array()?,
                    Token::Index(i) => em.index(i)?,
                    Token::EndArray => em.end_array()?,
                    Token::ValuePart(v) => em.value_part(v)?,
                    Token::Value(v) => em.value(v)?,
                }
            }
            Ok(())
        }
    }

    #[test]
    fn builds_nested_structures() {
        let mut source = Script(vec![
            Token::BeginNode,
            Token::Key("name".into()),
            Token::Value(Scalar::from("x")),
            Token::Key("list".into()),
            Token::BeginArray,
            Token::Index(0),
            Token::Value(Scalar::Int(1)),
            Token::Index(1),
            Token::BeginNode,
            Token::Key("deep".into()),
            Token::Value(Scalar::Bool(true)),
            Token::EndNode,
            Token::EndArray,
            Token::EndNode,
        ]);
        let node = node_from(&mut source).unwrap();
        assert_eq!(node.get("name"), Some(&Value::from("x")));
        let list = node.get("list").unwrap().as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0], Value::from(1i64));
        let deep = list[1].as_node().unwrap();
        assert_eq!(deep.get("deep"), Some(&Value::from(true)));
    }

    #[test]
    fn concatenates_value_parts() {
        let mut source = Script(vec![
            Token::BeginNode,
            Token::Key("blob".into()),
            Token::ValuePart(Scalar::Bytes(vec![1, 2])),
            Token::ValuePart(Scalar::Bytes(vec![3])),
            Token::Value(Scalar::Bytes(vec![4, 5])),
            Token::EndNode,
        ]);
        let node = node_from(&mut source).unwrap();
        assert_eq!(
            node.get("blob"),
            Some(&Value::from(vec![1u8, 2, 3, 4, 5]))
        );
    }

    #[test]
    fn scalar_document_materializes() {
        let mut source = Script(vec![Token::Value(Scalar::from("just me"))]);
        assert_eq!(materialize(&mut source).unwrap(), Value::from("just me"));
    }
}
