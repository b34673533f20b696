use crate::{Error, Flow, Scalar, Token, TokenSource};

/// Push-style consumer of the token alphabet.
///
/// Keys and container boundaries arrive through dedicated methods so a
/// writer never has to re-parse the stream; `write_value_part` may be
/// called any number of times before the terminating `write_value`.
pub trait NodeWriter {
    fn write_value(&mut self, value: Scalar) -> Result<(), Error>;
    fn write_value_part(&mut self, value: Scalar) -> Result<(), Error>;
    fn begin_node(&mut self) -> Result<(), Error>;
    fn write_key(&mut self, key: &str) -> Result<(), Error>;
    fn end_node(&mut self) -> Result<(), Error>;
    fn begin_array(&mut self) -> Result<(), Error>;
    fn end_array(&mut self) -> Result<(), Error>;
}

/// Pumps a token source into a writer. This is the codec-to-codec copy
/// primitive: any decoder can feed any writer, including the in-memory
/// tree builder.
pub fn copy<S, W>(source: &mut S, writer: &mut W) -> Result<(), Error>
where
    S: TokenSource,
    W: NodeWriter,
{
    source.read(|_path, token| {
        match token {
            Token::BeginNode => writer.begin_node()?,
            Token::Key(k) => writer.write_key(&k)?,
            Token::EndNode => writer.end_node()?,
            Token::BeginArray => writer.begin_array()?,
            Token::Index(_) => {}
            Token::EndArray => writer.end_array()?,
            Token::ValuePart(v) => writer.write_value_part(v)?,
            Token::Value(v) => writer.write_value(v)?,
        }
        Ok(Flow::Continue)
    })
}
