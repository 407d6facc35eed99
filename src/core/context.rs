use crate::core::assembler::FieldMap;
use crate::GroupTable;
use serde::Serialize;
use std::collections::HashSet;

/// Counters gathered while one document is mapped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    pub leaves: usize,
    pub mapped: usize,
    pub unmapped: usize,
    /// Mapped scalar values whose code already held group rows.
    pub discarded_scalars: usize,
    pub malformed_codes: usize,
    pub groups: usize,
    pub group_rows: usize,
    /// Group elements too shallow to form a row, rebuilt from their parent.
    pub rerooted_rows: usize,
}

/// Per-document working state threaded through the traversal.
#[derive(Debug, Default)]
pub struct ParseContext {
    pub fields: FieldMap,
    pub groups: GroupTable,
    pub stats: ParseStats,
    seen_groups: HashSet<String>,
}

impl ParseContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time a group code is claimed for this document.
    pub fn claim_group(&mut self, code: &str) -> bool {
        if self.seen_groups.contains(code) {
            return false;
        }
        self.seen_groups.insert(code.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_are_claimed_once() {
        let mut ctx = ParseContext::new();
        assert!(ctx.claim_group("F9-PC-07-OFFICERS"));
        assert!(!ctx.claim_group("F9-PC-07-OFFICERS"));
        assert!(ctx.claim_group("SR-PC-02-RELATED_ORGS"));
    }
}
