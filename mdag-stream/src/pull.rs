use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace};

use crate::{Error, Flow, PathAtom, Scalar, Token, TokenSource};

type Item = (Vec<PathAtom>, Token);

// Consumer side of the handoff. A worker thread runs the push decoder;
// a rendezvous channel carries one token at a time and a second
// rendezvous channel carries the consumer's ack. The worker suspends on
// "ack received", the consumer on "item available": strictly one item
// in flight, no shared mutable state.
struct Conduit {
    items: Receiver<Item>,
    acks: SyncSender<Flow>,
    worker: Option<JoinHandle<Result<(), Error>>>,
    // a pulled item whose ack has not been sent yet
    pending: bool,
    // nesting depth of the consumed token prefix
    depth: usize,
    // a chunked value whose terminator has not been consumed yet
    open_parts: bool,
}

impl Conduit {
    fn pull(&mut self) -> Result<Option<Item>, Error> {
        debug_assert!(!self.pending, "pull with an unacknowledged item");
        match self.items.recv() {
            Ok(item) => {
                self.pending = true;
                match &item.1 {
                    Token::BeginNode | Token::BeginArray => self.depth += 1,
                    Token::EndNode | Token::EndArray => self.depth -= 1,
                    Token::ValuePart(_) => self.open_parts = true,
                    Token::Value(_) => self.open_parts = false,
                    _ => {}
                }
                Ok(Some(item))
            }
            Err(_) => {
                self.finish()?;
                Ok(None)
            }
        }
    }

    fn ack(&mut self, flow: Flow) -> Result<(), Error> {
        debug_assert!(self.pending, "ack without a pulled item");
        self.pending = false;
        if flow == Flow::SkipSubtree {
            // the producer suppresses the rest of the chunked value
            self.open_parts = false;
        }
        self.acks.send(flow).map_err(|_| Error::Disconnected)
    }

    fn finish(&mut self) -> Result<(), Error> {
        match self.worker.take() {
            Some(handle) => match handle.join() {
                Ok(result) => result,
                Err(_) => Err(Error::Disconnected),
            },
            None => Ok(()),
        }
    }
}

impl Drop for Conduit {
    fn drop(&mut self) {
        if self.pending {
            let _ = self.ack(Flow::Abort);
        }
        while self.items.recv().is_ok() {
            self.pending = true;
            let _ = self.ack(Flow::Abort);
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

enum RootKind {
    Scalar(Scalar),
    Chunk(Scalar),
    Node,
    Array,
}

/// Pull-style view over any [`TokenSource`].
///
/// The source runs on a background thread and is driven exactly as fast
/// as the consumer pulls. Dropping the reader mid-stream aborts the
/// producer and drains it before returning.
pub struct PullReader {
    conduit: Conduit,
    root: Option<RootKind>,
}

impl PullReader {
    pub fn spawn<S>(mut source: S) -> Result<Self, Error>
    where
        S: TokenSource + Send + 'static,
    {
        let (item_tx, item_rx) = sync_channel::<Item>(0);
        let (ack_tx, ack_rx) = sync_channel::<Flow>(0);
        let worker = thread::Builder::new()
            .name("mdag-pull".into())
            .spawn(move || {
                trace!("pull worker running");
                source.read(move |path, token| {
                    if item_tx.send((path.to_vec(), token)).is_err() {
                        debug!("pull consumer went away, aborting producer");
                        return Ok(Flow::Abort);
                    }
                    match ack_rx.recv() {
                        Ok(flow) => Ok(flow),
                        Err(_) => Ok(Flow::Abort),
                    }
                })
            })?;

        let mut conduit = Conduit {
            items: item_rx,
            acks: ack_tx,
            worker: Some(worker),
            pending: false,
            depth: 0,
            open_parts: false,
        };

        let root = match conduit.pull()? {
            None => None,
            Some((_, token)) => Some(match token {
                Token::Value(s) => {
                    conduit.ack(Flow::Continue)?;
                    RootKind::Scalar(s)
                }
                Token::ValuePart(s) => {
                    conduit.ack(Flow::Continue)?;
                    RootKind::Chunk(s)
                }
                Token::BeginNode => {
                    conduit.ack(Flow::Continue)?;
                    RootKind::Node
                }
                Token::BeginArray => {
                    conduit.ack(Flow::Continue)?;
                    RootKind::Array
                }
                other => {
                    let name = other.name();
                    let _ = conduit.ack(Flow::Abort);
                    return Err(Error::UnexpectedToken(name));
                }
            }),
        };

        Ok(PullReader { conduit, root })
    }

    /// Resolves the root of the document: a scalar, a chunked scalar, or
    /// an entry cursor. Returns an error for an empty stream and on any
    /// call after the first.
    pub fn root(&mut self) -> Result<Pulled<'_>, Error> {
        match self.root.take() {
            None => Err(Error::Malformed("token stream has no document".into())),
            Some(RootKind::Scalar(s)) => Ok(Pulled::Scalar(s)),
            Some(RootKind::Chunk(first)) => Ok(Pulled::Chunks(Chunks {
                conduit: &mut self.conduit,
                first: Some(first),
                done: false,
            })),
            Some(RootKind::Node) => Ok(Pulled::Entries(Entries::new(&mut self.conduit, true))),
            Some(RootKind::Array) => Ok(Pulled::Entries(Entries::new(&mut self.conduit, false))),
        }
    }
}

/// A resolved value: either a complete scalar, a chunked scalar being
/// streamed, or a cursor over a node's / array's entries.
pub enum Pulled<'c> {
    Scalar(Scalar),
    Chunks(Chunks<'c>),
    Entries(Entries<'c>),
}

enum Slot {
    Idle,
    // key/index delivered to the caller, ack deferred until the caller
    // decides between value() and next()
    Pending(PathAtom),
    Done,
}

/// Cursor over the entries of one node or array.
///
/// `next` advances to the following key/index; `value` (or `children`)
/// resolves the current entry. Advancing past an unconsumed entry skips
/// its whole subtree on the producer side.
pub struct Entries<'c> {
    conduit: &'c mut Conduit,
    depth: usize,
    is_node: bool,
    slot: Slot,
}

impl<'c> Entries<'c> {
    fn new(conduit: &'c mut Conduit, is_node: bool) -> Self {
        let depth = conduit.depth;
        Entries {
            conduit,
            depth,
            is_node,
            slot: Slot::Idle,
        }
    }

    /// Whether this container is a node (as opposed to an array).
    pub fn is_object(&self) -> bool {
        self.is_node
    }

    /// Current entry's key; `None` for arrays or between entries.
    pub fn key(&self) -> Option<&str> {
        match &self.slot {
            Slot::Pending(PathAtom::Key(k)) => Some(k),
            _ => None,
        }
    }

    /// Current entry's index; `None` for nodes or between entries.
    pub fn index(&self) -> Option<u64> {
        match &self.slot {
            Slot::Pending(PathAtom::Index(i)) => Some(*i),
            _ => None,
        }
    }

    /// Advances to the next entry. `Ok(false)` at the container's end.
    pub fn next(&mut self) -> Result<bool, Error> {
        match std::mem::replace(&mut self.slot, Slot::Idle) {
            Slot::Done => {
                self.slot = Slot::Done;
                return Ok(false);
            }
            Slot::Pending(_) => self.conduit.ack(Flow::SkipSubtree)?,
            Slot::Idle => {}
        }
        self.drain_abandoned_child()?;
        match self.conduit.pull()? {
            None => {
                self.slot = Slot::Done;
                Err(Error::Disconnected)
            }
            Some((_, token)) => match token {
                Token::Key(k) => {
                    self.slot = Slot::Pending(PathAtom::Key(k));
                    Ok(true)
                }
                Token::Index(i) => {
                    self.slot = Slot::Pending(PathAtom::Index(i));
                    Ok(true)
                }
                Token::EndNode | Token::EndArray => {
                    self.conduit.ack(Flow::Continue)?;
                    self.slot = Slot::Done;
                    Ok(false)
                }
                other => {
                    let name = other.name();
                    let _ = self.conduit.ack(Flow::Abort);
                    self.slot = Slot::Done;
                    Err(Error::UnexpectedToken(name))
                }
            },
        }
    }

    /// Resolves the current entry's value.
    pub fn value(&mut self) -> Result<Pulled<'_>, Error> {
        match std::mem::replace(&mut self.slot, Slot::Idle) {
            Slot::Pending(_) => self.conduit.ack(Flow::Continue)?,
            prev => {
                self.slot = prev;
                return Err(Error::UnexpectedToken("Value"));
            }
        }
        match self.conduit.pull()? {
            None => Err(Error::Disconnected),
            Some((_, token)) => match token {
                Token::Value(s) => {
                    self.conduit.ack(Flow::Continue)?;
                    Ok(Pulled::Scalar(s))
                }
                Token::ValuePart(s) => {
                    self.conduit.ack(Flow::Continue)?;
                    Ok(Pulled::Chunks(Chunks {
                        conduit: &mut *self.conduit,
                        first: Some(s),
                        done: false,
                    }))
                }
                Token::BeginNode => {
                    self.conduit.ack(Flow::Continue)?;
                    Ok(Pulled::Entries(Entries::new(&mut *self.conduit, true)))
                }
                Token::BeginArray => {
                    self.conduit.ack(Flow::Continue)?;
                    Ok(Pulled::Entries(Entries::new(&mut *self.conduit, false)))
                }
                other => {
                    let name = other.name();
                    let _ = self.conduit.ack(Flow::Abort);
                    Err(Error::UnexpectedToken(name))
                }
            },
        }
    }

    /// Like [`Entries::value`] but requires the entry to be a container.
    pub fn children(&mut self) -> Result<Entries<'_>, Error> {
        match self.value()? {
            Pulled::Entries(entries) => Ok(entries),
            Pulled::Scalar(s) => Err(Error::wrong_type("node or array", s.kind())),
            Pulled::Chunks(_) => Err(Error::wrong_type("node or array", "chunked string")),
        }
    }

    /// Discards the rest of this container, consuming through its
    /// balancing end token.
    pub fn skip(&mut self) -> Result<(), Error> {
        if matches!(self.slot, Slot::Done) {
            return Ok(());
        }
        if let Slot::Pending(_) = std::mem::replace(&mut self.slot, Slot::Idle) {
            self.conduit.ack(Flow::SkipSubtree)?;
        }
        self.settle_pending()?;
        loop {
            match self.conduit.pull()? {
                None => {
                    self.slot = Slot::Done;
                    return Err(Error::Disconnected);
                }
                Some((_, Token::EndNode | Token::EndArray)) => {
                    self.conduit.ack(Flow::Continue)?;
                    if self.conduit.depth < self.depth {
                        self.slot = Slot::Done;
                        return Ok(());
                    }
                }
                Some((_, Token::Key(_) | Token::Index(_) | Token::ValuePart(_))) => {
                    self.conduit.ack(Flow::SkipSubtree)?
                }
                Some(_) => self.conduit.ack(Flow::Continue)?,
            }
        }
    }

    // An abandoned child cursor may leave its last key or index
    // unacknowledged; answer it with a subtree skip.
    fn settle_pending(&mut self) -> Result<(), Error> {
        if self.conduit.pending {
            self.conduit.ack(Flow::SkipSubtree)?;
        }
        Ok(())
    }

    // Consume whatever is left of an entry value the caller resolved but
    // did not finish iterating.
    fn drain_abandoned_child(&mut self) -> Result<(), Error> {
        self.settle_pending()?;
        while self.conduit.open_parts || self.conduit.depth > self.depth {
            match self.conduit.pull()? {
                None => return Err(Error::Disconnected),
                Some((_, Token::Key(_) | Token::Index(_) | Token::ValuePart(_))) => {
                    self.conduit.ack(Flow::SkipSubtree)?
                }
                Some(_) => self.conduit.ack(Flow::Continue)?,
            }
        }
        Ok(())
    }
}

/// Iterator over the chunks of one streamed string value.
pub struct Chunks<'c> {
    conduit: &'c mut Conduit,
    first: Option<Scalar>,
    done: bool,
}

impl Chunks<'_> {
    /// Next chunk; `None` once the terminating chunk has been returned.
    pub fn next_chunk(&mut self) -> Result<Option<Scalar>, Error> {
        if let Some(first) = self.first.take() {
            return Ok(Some(first));
        }
        if self.done {
            return Ok(None);
        }
        match self.conduit.pull()? {
            None => {
                self.done = true;
                Err(Error::Disconnected)
            }
            Some((_, Token::ValuePart(s))) => {
                self.conduit.ack(Flow::Continue)?;
                Ok(Some(s))
            }
            Some((_, Token::Value(s))) => {
                self.conduit.ack(Flow::Continue)?;
                self.done = true;
                Ok(Some(s))
            }
            Some((_, other)) => {
                let name = other.name();
                let _ = self.conduit.ack(Flow::Abort);
                Err(Error::UnexpectedToken(name))
            }
        }
    }

    /// Abandon the remaining chunks.
    pub fn skip(&mut self) -> Result<(), Error> {
        self.first = None;
        if self.done {
            return Ok(());
        }
        self.done = true;
        match self.conduit.pull()? {
            None => Err(Error::Disconnected),
            Some((_, Token::ValuePart(_))) => self.conduit.ack(Flow::SkipSubtree),
            Some((_, Token::Value(_))) => self.conduit.ack(Flow::Continue),
            Some((_, other)) => {
                let name = other.name();
                let _ = self.conduit.ack(Flow::Abort);
                Err(Error::UnexpectedToken(name))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::tests::Script;

    fn sample() -> Script {
        Script(vec![
            Token::BeginNode,
            Token::Key("name".into()),
            Token::Value(Scalar::from("boombox")),
            Token::Key("meta".into()),
            Token::BeginNode,
            Token::Key("size".into()),
            Token::Value(Scalar::Uint(55)),
            Token::EndNode,
            Token::Key("tags".into()),
            Token::BeginArray,
            Token::Index(0),
            Token::Value(Scalar::from("a")),
            Token::Index(1),
            Token::Value(Scalar::from("b")),
            Token::EndArray,
            Token::EndNode,
        ])
    }

    #[test]
    fn iterates_nested_entries() {
        let mut reader = PullReader::spawn(sample()).unwrap();
        let Pulled::Entries(mut root) = reader.root().unwrap() else {
            panic!("expected entries at the root");
        };
        assert!(root.is_object());

        assert!(root.next().unwrap());
        assert_eq!(root.key(), Some("name"));
        let Pulled::Scalar(v) = root.value().unwrap() else {
            panic!("expected scalar");
        };
        assert_eq!(v, Scalar::from("boombox"));

        assert!(root.next().unwrap());
        assert_eq!(root.key(), Some("meta"));
        {
            let mut meta = root.children().unwrap();
            assert!(meta.next().unwrap());
            assert_eq!(meta.key(), Some("size"));
            let Pulled::Scalar(v) = meta.value().unwrap() else {
                panic!("expected scalar");
            };
            assert_eq!(v, Scalar::Uint(55));
            assert!(!meta.next().unwrap());
        }

        assert!(root.next().unwrap());
        assert_eq!(root.key(), Some("tags"));
        {
            let mut tags = root.children().unwrap();
            assert!(!tags.is_object());
            assert!(tags.next().unwrap());
            assert_eq!(tags.index(), Some(0));
            assert!(tags.next().unwrap());
            assert_eq!(tags.index(), Some(1));
            let Pulled::Scalar(v) = tags.value().unwrap() else {
                panic!("expected scalar");
            };
            assert_eq!(v, Scalar::from("b"));
            assert!(!tags.next().unwrap());
        }

        assert!(!root.next().unwrap());
    }

    #[test]
    fn advancing_past_an_entry_skips_its_subtree() {
        let mut reader = PullReader::spawn(sample()).unwrap();
        let Pulled::Entries(mut root) = reader.root().unwrap() else {
            panic!("expected entries at the root");
        };
        // never resolve any value
        let mut keys = Vec::new();
        while root.next().unwrap() {
            keys.push(root.key().unwrap().to_owned());
        }
        assert_eq!(keys, vec!["name", "meta", "tags"]);
    }

    #[test]
    fn abandoning_a_child_cursor_is_recovered() {
        let mut reader = PullReader::spawn(sample()).unwrap();
        let Pulled::Entries(mut root) = reader.root().unwrap() else {
            panic!("expected entries at the root");
        };
        assert!(root.next().unwrap());
        assert!(root.next().unwrap());
        {
            let mut meta = root.children().unwrap();
            // enter the child but stop midway
            assert!(meta.next().unwrap());
        }
        assert!(root.next().unwrap());
        assert_eq!(root.key(), Some("tags"));
        root.skip().unwrap();
        assert!(!root.next().unwrap());
    }

    #[test]
    fn chunked_values_stream_in_order() {
        let source = Script(vec![
            Token::BeginNode,
            Token::Key("blob".into()),
            Token::ValuePart(Scalar::Bytes(vec![1])),
            Token::ValuePart(Scalar::Bytes(vec![2])),
            Token::Value(Scalar::Bytes(vec![3])),
            Token::EndNode,
        ]);
        let mut reader = PullReader::spawn(source).unwrap();
        let Pulled::Entries(mut root) = reader.root().unwrap() else {
            panic!("expected entries at the root");
        };
        assert!(root.next().unwrap());
        let Pulled::Chunks(mut chunks) = root.value().unwrap() else {
            panic!("expected chunks");
        };
        let mut collected = Vec::new();
        while let Some(Scalar::Bytes(b)) = chunks.next_chunk().unwrap() {
            collected.extend(b);
        }
        assert_eq!(collected, vec![1, 2, 3]);
        assert!(!root.next().unwrap());
    }

    #[test]
    fn dropping_the_reader_aborts_the_producer() {
        let mut reader = PullReader::spawn(sample()).unwrap();
        {
            let Pulled::Entries(mut root) = reader.root().unwrap() else {
                panic!("expected entries at the root");
            };
            assert!(root.next().unwrap());
        }
        drop(reader);
        // nothing to assert beyond a clean, non-hanging teardown
    }

    #[test]
    fn scalar_root_resolves_directly() {
        let mut reader = PullReader::spawn(Script(vec![Token::Value(Scalar::Int(7))])).unwrap();
        match reader.root().unwrap() {
            Pulled::Scalar(Scalar::Int(7)) => {}
            _ => panic!("expected the root scalar"),
        }
    }
}
