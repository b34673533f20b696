use std::collections::BTreeMap;

use mdag_stream::{escape_component, unescape_component, Error, Flow};

use crate::{Node, Value};

/// Depth-first traversal over every node in a value tree.
///
/// The visitor receives each node together with its `/`-joined path
/// (root is `""`). Keys that contain `/` cannot be addressed by the path
/// language and are not descended into; the same goes for directive keys
/// (leading `@`, unless escaped as `\@`) and empty keys. Escaped keys
/// appear unescaped in the rendered path.
pub fn walk<F>(value: &Value, visit: &mut F) -> Result<(), Error>
where
    F: FnMut(&Node, &str) -> Result<Flow, Error>,
{
    match walk_inner(value, "", visit) {
        Err(Error::Aborted) => Ok(()),
        other => other,
    }
}

fn walk_inner<F>(value: &Value, path: &str, visit: &mut F) -> Result<(), Error>
where
    F: FnMut(&Node, &str) -> Result<Flow, Error>,
{
    match value {
        Value::Scalar(_) => Ok(()),
        Value::Node(node) => {
            match visit(node, path)? {
                Flow::Continue => {}
                Flow::SkipSubtree => return Ok(()),
                Flow::Abort => return Err(Error::Aborted),
            }
            for (key, child) in node.entries() {
                if key.is_empty() || key.contains('/') || key.starts_with('@') {
                    continue;
                }
                let rendered = unescape_component(key);
                walk_inner(child, &join(path, &rendered), visit)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                walk_inner(item, &join(path, &i.to_string()), visit)?;
            }
            Ok(())
        }
    }
}

fn join(base: &str, comp: &str) -> String {
    if base.is_empty() {
        comp.to_owned()
    } else {
        format!("{base}/{comp}")
    }
}

/// Flattens every merkle-link in the tree into a `path -> link-node`
/// map. Finding the links walks the whole document once.
pub fn links(value: &Value) -> BTreeMap<String, Node> {
    let mut found = BTreeMap::new();
    let walked = walk(value, &mut |node, path| {
        if node.is_link() {
            found.insert(path.to_owned(), node.clone());
        }
        Ok(Flow::Continue)
    });
    debug_assert!(walked.is_ok());
    found
}

/// Resolves a `/`-separated path against a value tree. Components are
/// given unescaped (path language form); directive-looking keys are
/// addressed via their escaped stored form. Empty components are
/// ignored.
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for comp in path.split('/') {
        if comp.is_empty() {
            continue;
        }
        current = match current {
            Value::Node(node) => node.get(&escape_component(comp))?,
            Value::Array(items) => {
                let index: usize = comp.parse().ok()?;
                items.get(index)?
            }
            Value::Scalar(_) => return None,
        };
    }
    Some(current)
}
