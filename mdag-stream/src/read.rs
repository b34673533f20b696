use crate::{Error, Flow, PathAtom, Scalar, Token};

/// Anything that can replay a document as a token stream.
///
/// The callback receives the path of the enclosing container for
/// `Key`/`Index` tokens and the full path of the value for everything
/// else. Returning [`Flow::Abort`] stops the producer without an error;
/// returning [`Flow::SkipSubtree`] suppresses callbacks as described on
/// [`Flow`]. Implementations consume the internal [`Error::Aborted`] and
/// report success in that case.
pub trait TokenSource {
    fn read<F>(&mut self, f: F) -> Result<(), Error>
    where
        F: FnMut(&[PathAtom], Token) -> Result<Flow, Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Root,
    Node,
    Array,
    Entry,
}

struct Frame {
    kind: FrameKind,
    // callbacks enabled for descendants of this frame
    children: bool,
    // callback enabled for the balancing end token
    end: bool,
    // next expected array index
    next_index: u64,
    // scalar kind of an open chunked value, if any
    part_kind: Option<&'static str>,
}

impl Frame {
    fn new(kind: FrameKind, children: bool, end: bool) -> Self {
        Frame {
            kind,
            children,
            end,
            next_index: 0,
            part_kind: None,
        }
    }
}

/// Token dispatcher used by every decoder.
///
/// Decoders call the `begin_*`/`key`/`index`/`value*`/`end_*` methods in
/// document order; the emitter tracks the current path, enforces the
/// protocol's balance rules and gates callbacks behind the skip state
/// requested by earlier callbacks.
pub struct Emitter<F> {
    cb: F,
    frames: Vec<Frame>,
    path: Vec<PathAtom>,
}

impl<F> Emitter<F>
where
    F: FnMut(&[PathAtom], Token) -> Result<Flow, Error>,
{
    pub fn new(cb: F) -> Self {
        Emitter {
            cb,
            frames: vec![Frame::new(FrameKind::Root, true, true)],
            path: Vec::new(),
        }
    }

    pub fn path(&self) -> &[PathAtom] {
        &self.path
    }

    fn top(&self) -> &Frame {
        self.frames.last().expect("root frame never popped")
    }

    fn top_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("root frame never popped")
    }

    fn enabled(&self) -> bool {
        self.top().children
    }

    fn dispatch(&mut self, token: Token) -> Result<Flow, Error> {
        match (self.cb)(&self.path, token)? {
            Flow::Abort => Err(Error::Aborted),
            flow => Ok(flow),
        }
    }

    // A value may appear at the root or after a pending key/index.
    fn check_value_position(&self, token: &'static str) -> Result<(), Error> {
        match self.top().kind {
            FrameKind::Root | FrameKind::Entry => Ok(()),
            _ => Err(Error::UnexpectedToken(token)),
        }
    }

    // Pops the entry frame (and its path atom) once its value is
    // complete.
    fn finish_entry(&mut self) {
        if self.top().kind == FrameKind::Entry {
            self.frames.pop();
            self.path.pop();
        }
    }

    fn check_no_open_parts(&self, token: &'static str) -> Result<(), Error> {
        if self.top().part_kind.is_some() {
            return Err(Error::UnexpectedToken(token));
        }
        Ok(())
    }

    pub fn begin_node(&mut self) -> Result<(), Error> {
        self.check_value_position("BeginNode")?;
        self.check_no_open_parts("BeginNode")?;
        let on = self.enabled();
        let mut children = on;
        if on && self.dispatch(Token::BeginNode)? == Flow::SkipSubtree {
            children = false;
        }
        self.frames.push(Frame::new(FrameKind::Node, children, on));
        Ok(())
    }

    pub fn end_node(&mut self) -> Result<(), Error> {
        if self.top().kind != FrameKind::Node {
            return Err(Error::UnexpectedToken("EndNode"));
        }
        let frame = self.frames.pop().expect("node frame present");
        if frame.end {
            self.dispatch(Token::EndNode)?;
        }
        self.finish_entry();
        Ok(())
    }

    pub fn begin_array(&mut self) -> Result<(), Error> {
        self.check_value_position("BeginArray")?;
        self.check_no_open_parts("BeginArray")?;
        let on = self.enabled();
        let mut children = on;
        if on && self.dispatch(Token::BeginArray)? == Flow::SkipSubtree {
            children = false;
        }
        self.frames.push(Frame::new(FrameKind::Array, children, on));
        Ok(())
    }

    pub fn end_array(&mut self) -> Result<(), Error> {
        if self.top().kind != FrameKind::Array {
            return Err(Error::UnexpectedToken("EndArray"));
        }
        let frame = self.frames.pop().expect("array frame present");
        if frame.end {
            self.dispatch(Token::EndArray)?;
        }
        self.finish_entry();
        Ok(())
    }

    pub fn key(&mut self, key: &str) -> Result<(), Error> {
        if self.top().kind != FrameKind::Node {
            return Err(Error::UnexpectedToken("Key"));
        }
        let on = self.enabled();
        let mut children = on;
        if on && self.dispatch(Token::Key(key.to_owned()))? == Flow::SkipSubtree {
            children = false;
        }
        self.path.push(PathAtom::Key(key.to_owned()));
        self.frames.push(Frame::new(FrameKind::Entry, children, false));
        Ok(())
    }

    pub fn index(&mut self, index: u64) -> Result<(), Error> {
        {
            let top = self.top_mut();
            if top.kind != FrameKind::Array || index != top.next_index {
                return Err(Error::UnexpectedToken("Index"));
            }
            top.next_index += 1;
        }
        let on = self.enabled();
        let mut children = on;
        if on && self.dispatch(Token::Index(index))? == Flow::SkipSubtree {
            children = false;
        }
        self.path.push(PathAtom::Index(index));
        self.frames.push(Frame::new(FrameKind::Entry, children, false));
        Ok(())
    }

    pub fn value(&mut self, value: Scalar) -> Result<(), Error> {
        self.check_value_position("Value")?;
        if let Some(kind) = self.top().part_kind {
            if kind != value.kind() {
                return Err(Error::UnexpectedToken("Value"));
            }
        }
        self.top_mut().part_kind = None;
        if self.enabled() {
            self.dispatch(Token::Value(value))?;
        }
        self.finish_entry();
        Ok(())
    }

    pub fn value_part(&mut self, value: Scalar) -> Result<(), Error> {
        self.check_value_position("ValuePart")?;
        if !value.is_chunkable() {
            return Err(Error::UnexpectedToken("ValuePart"));
        }
        if let Some(kind) = self.top().part_kind {
            if kind != value.kind() {
                return Err(Error::UnexpectedToken("ValuePart"));
            }
        }
        let kind = value.kind();
        self.top_mut().part_kind = Some(kind);
        if self.enabled() && self.dispatch(Token::ValuePart(value))? == Flow::SkipSubtree {
            self.top_mut().children = false;
        }
        Ok(())
    }
}
