use crate::core::context::ParseStats;
use crate::core::partition::{PrimaryRecord, ScheduleRecord};
use crate::GroupTable;
use serde::Serialize;

/// The three return types a filing can be, read from its `RETURNTYPE` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReturnForm {
    #[serde(rename = "990")]
    Form990,
    #[serde(rename = "990EZ")]
    Form990EZ,
    #[serde(rename = "990PF")]
    Form990PF,
}

impl ReturnForm {
    pub fn from_return_type(value: &str) -> Option<Self> {
        match value.trim() {
            "990" => Some(Self::Form990),
            "990EZ" => Some(Self::Form990EZ),
            "990PF" => Some(Self::Form990PF),
            _ => None,
        }
    }

    /// Collection the primary record is stored in.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Form990 => "990",
            Self::Form990EZ => "990EZ",
            Self::Form990PF => "990PF",
        }
    }
}

/// Everything the engine produced for one source document.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedFiling {
    pub primary: PrimaryRecord,
    pub schedules: Vec<ScheduleRecord>,
    /// Every reconstructed group, including codes the partitioner could not route.
    pub groups: GroupTable,
    pub return_form: Option<ReturnForm>,
    pub stats: ParseStats,
}

impl ParsedFiling {
    pub fn source_link(&self) -> &str {
        &self.primary.source_link
    }

    pub fn ein(&self) -> Option<&str> {
        self.primary.text("FILEREIN")
    }

    pub fn tax_year(&self) -> Option<&str> {
        self.primary.text("TAXYEAR")
    }

    /// Storage key `{EIN}_{TAXYEAR}`, when both are known.
    pub fn record_id(&self) -> Option<String> {
        Some(format!("{}_{}", self.ein()?, self.tax_year()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_types_map_to_collections() {
        assert_eq!(ReturnForm::from_return_type("990"), Some(ReturnForm::Form990));
        assert_eq!(ReturnForm::from_return_type("990PF "), Some(ReturnForm::Form990PF));
        assert_eq!(ReturnForm::from_return_type("990T"), None);
        assert_eq!(ReturnForm::Form990EZ.collection(), "990EZ");
    }
}
