use std::fmt;

/// One step into a document: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathAtom {
    Key(String),
    Index(u64),
}

impl PathAtom {
    pub fn as_key(&self) -> Option<&str> {
        match self {
            PathAtom::Key(k) => Some(k),
            PathAtom::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<u64> {
        match self {
            PathAtom::Index(i) => Some(*i),
            PathAtom::Key(_) => None,
        }
    }
}

impl fmt::Display for PathAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathAtom::Key(k) => f.write_str(k),
            PathAtom::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for PathAtom {
    fn from(k: &str) -> Self {
        PathAtom::Key(k.to_owned())
    }
}

impl From<u64> for PathAtom {
    fn from(i: u64) -> Self {
        PathAtom::Index(i)
    }
}

/// Escape a path component. `@` and `\` are escaped so a component can
/// be told apart from directives (keys starting with `@`) when rendered
/// into a flat path string.
pub fn escape_component(comp: &str) -> String {
    let mut out = String::with_capacity(comp.len());
    for c in comp.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '@' => out.push_str("\\@"),
            c => out.push(c),
        }
    }
    out
}

/// Inverse of [`escape_component`]: a backslash makes the next character
/// literal. A trailing lone backslash is kept as-is.
pub fn unescape_component(comp: &str) -> String {
    let mut out = String::with_capacity(comp.len());
    let mut chars = comp.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Join path atoms with `/` for display and diagnostics. Keys are joined
/// raw; use [`escape_component`] when producing addressable paths.
pub fn join(atoms: &[PathAtom]) -> String {
    let mut out = String::new();
    for (i, atom) in atoms.iter().enumerate() {
        if i > 0 {
            out.push('/');
        }
        out.push_str(&atom.to_string());
    }
    out
}
