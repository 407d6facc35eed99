//! Reconstruction of repeating groups ("tables") into row records.
//!
//! The flattener visits one leaf at a time, but a row has to be built from all
//! of its element's sub-fields at once. The first leaf that resolves to a
//! group code therefore triggers a direct tree query for every element at the
//! container path, and later leaves of the same group are absorbed.

use crate::config::EngineConfig;
use crate::core::code::field_name;
use crate::core::context::ParseContext;
use crate::core::flatten::{container_path, flatten_from, FlatField};
use crate::core::mapping::MappingIndex;
use crate::Row;
use log::{debug, warn};
use roxmltree::Node;

pub struct GroupReconstructor<'m> {
    index: &'m MappingIndex,
    config: &'m EngineConfig,
}

impl<'m> GroupReconstructor<'m> {
    pub fn new(index: &'m MappingIndex, config: &'m EngineConfig) -> Self {
        Self { index, config }
    }

    /// Resolve the group code for a leaf path, if its container is a table.
    pub fn group_code<'p>(&self, path: &'p str) -> Option<(&'p str, &'m str)> {
        let container = container_path(path)?;
        let depth = container.matches('/').count();
        if !self.config.is_group_depth(depth) {
            return None;
        }
        let code = self
            .index
            .lookup_group(container)
            .or_else(|| self.index.lookup_group(path));
        match code {
            Some(code) => Some((container, code)),
            None => {
                debug!("Container {} is not a mapped group", container);
                None
            }
        }
    }

    /// Claim a leaf for group handling.
    ///
    /// Returns false when the leaf is not part of a mapped group and should go
    /// through scalar handling instead. The group's rows are built on the first
    /// leaf that reaches it.
    pub fn absorb(&self, root: Node, path: &str, ctx: &mut ParseContext) -> bool {
        let Some((container, code)) = self.group_code(path) else {
            return false;
        };
        if ctx.claim_group(code) {
            self.rebuild(root, container, code, ctx);
        }
        true
    }

    fn rebuild(&self, root: Node, container: &str, code: &str, ctx: &mut ParseContext) {
        let elements = find_elements(root, container);
        let mut rows: Vec<Row> = Vec::with_capacity(elements.len());

        for element in &elements {
            let mut fields: Vec<FlatField> = flatten_from(*element, container).collect();
            if fields.len() == 1 {
                if let (Some(parent), Some(parent_path)) =
                    (element.parent_element(), container_path(container))
                {
                    debug!("Re-rooting single-field group element of {} at {}", code, parent_path);
                    fields = flatten_from(parent, parent_path).collect();
                    ctx.stats.rerooted_rows += 1;
                }
            }
            rows.push(self.build_row(&fields, ctx));
        }

        if rows.iter().all(Row::is_empty) {
            debug!("Group {} at {} produced no mapped fields", code, container);
            return;
        }

        ctx.stats.groups += 1;
        ctx.stats.group_rows += rows.len();
        ctx.groups.insert(code.to_string(), rows.clone());
        if !ctx.fields.insert_rows(code, rows) {
            warn!("Group code {} already holds a scalar value", code);
        }
    }

    fn build_row(&self, fields: &[FlatField], ctx: &mut ParseContext) -> Row {
        let mut row = Row::new();
        for field in fields {
            let Some(code) = self.index.lookup_scalar(&field.path) else {
                continue;
            };
            match field_name(code) {
                Some(name) => {
                    row.insert(name, field.value.to_string());
                }
                None => {
                    warn!("Malformed code {} for group field {}", code, field.path);
                    ctx.stats.malformed_codes += 1;
                }
            }
        }
        row
    }
}

/// Every element at `path` below the root, in document order.
///
/// The first segment names the root element itself.
pub fn find_elements<'a, 'input>(root: Node<'a, 'input>, path: &str) -> Vec<Node<'a, 'input>> {
    let mut segments = path.split('/');
    if segments.next() != Some(root.tag_name().name()) {
        return Vec::new();
    }

    let mut frontier = vec![root];
    for segment in segments {
        frontier = frontier
            .iter()
            .flat_map(|node| node.children())
            .filter(|child| child.is_element() && child.tag_name().name() == segment)
            .collect();
        if frontier.is_empty() {
            break;
        }
    }
    frontier
}
