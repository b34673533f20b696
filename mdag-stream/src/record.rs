use crate::{path, Error, Flow, Token, TokenSource};

/// Drains a source and returns every `(path, token)` pair it delivered,
/// with paths rendered as raw `/`-joined strings. Mostly useful for
/// asserting on a decoder's exact token stream.
pub fn record<S: TokenSource>(source: &mut S) -> Result<Vec<(String, Token)>, Error> {
    let mut out = Vec::new();
    source.read(|p, token| {
        out.push((path::join(p), token));
        Ok(Flow::Continue)
    })?;
    Ok(out)
}
