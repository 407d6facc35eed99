//! Depth-first flattening of an XML tree into `(path, text)` pairs.

use roxmltree::{Children, Node};

/// One leaf of the tree: its slash-joined path and its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatField<'a> {
    pub path: String,
    pub value: &'a str,
}

struct Frame<'a, 'input> {
    children: Children<'a, 'input>,
    prefix: String,
}

/// Lazy document-order walk over the leaves below a node.
///
/// Only the node's descendants are visited; the node itself contributes
/// through `prefix`. Leaves without text, or with empty text, are skipped.
pub struct FlatPaths<'a, 'input> {
    stack: Vec<Frame<'a, 'input>>,
}

impl<'a, 'input> FlatPaths<'a, 'input> {
    pub fn new(node: Node<'a, 'input>, prefix: impl Into<String>) -> Self {
        Self {
            stack: vec![Frame {
                children: node.children(),
                prefix: prefix.into(),
            }],
        }
    }
}

impl<'a, 'input> Iterator for FlatPaths<'a, 'input> {
    type Item = FlatField<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            let Some(child) = frame.children.next() else {
                self.stack.pop();
                continue;
            };
            if !child.is_element() {
                continue;
            }

            let path = format!("{}/{}", frame.prefix, child.tag_name().name());
            if child.children().any(|n| n.is_element()) {
                self.stack.push(Frame {
                    children: child.children(),
                    prefix: path,
                });
            } else if let Some(value) = child.text().filter(|text| !text.is_empty()) {
                return Some(FlatField { path, value });
            }
        }
    }
}

/// Flatten a whole document, rooted at the root element's own tag.
pub fn flatten_document<'a, 'input>(root: Node<'a, 'input>) -> FlatPaths<'a, 'input> {
    FlatPaths::new(root, root.tag_name().name())
}

/// Flatten the subtree below `node`, which lives at `node_path`.
pub fn flatten_from<'a, 'input>(node: Node<'a, 'input>, node_path: &str) -> FlatPaths<'a, 'input> {
    FlatPaths::new(node, node_path)
}

/// Path with its final segment removed.
pub fn container_path(path: &str) -> Option<&str> {
    path.rfind('/').map(|idx| &path[..idx])
}
