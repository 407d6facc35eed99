//! Splitting the assembled field map into the primary record and schedules.

use crate::config::MetadataPolicy;
use crate::core::assembler::FieldMap;
use crate::core::code::{DecodedCode, FormKind, ScheduleKind};
use crate::core::context::ParseStats;
use crate::FieldValue;
use indexmap::IndexMap;
use log::warn;
use serde::Serialize;

/// Fields that identify a filing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataField {
    FilerEin,
    FilerName,
    TaxYear,
    TaxPeriodBegin,
    TaxPeriodEnd,
    Street,
    City,
    State,
    Zip,
}

impl MetadataField {
    const ALL: [MetadataField; 9] = [
        Self::FilerEin,
        Self::FilerName,
        Self::TaxYear,
        Self::TaxPeriodBegin,
        Self::TaxPeriodEnd,
        Self::Street,
        Self::City,
        Self::State,
        Self::Zip,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::FilerEin => "FILEREIN",
            Self::FilerName => "FILERNAME1",
            Self::TaxYear => "TAXYEAR",
            Self::TaxPeriodBegin => "TAXPERBEGIN",
            Self::TaxPeriodEnd => "TAXPEREND",
            Self::Street => "FILERUS1",
            Self::City => "ADDRESCITYIT",
            Self::State => "ADDRESSTATET",
            Self::Zip => "ADZIIPPCCOOD",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }

    /// Address parts are tracked but not copied onto schedules.
    pub fn is_replicated(self) -> bool {
        !matches!(self, Self::Street | Self::City | Self::State | Self::Zip)
    }
}

/// Running metadata snapshot, filled as the traversal meets each field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    values: IndexMap<MetadataField, FieldValue>,
}

impl Metadata {
    pub fn observe(&mut self, name: &str, value: &FieldValue) {
        if let Some(field) = MetadataField::from_name(name) {
            self.values.insert(field, value.clone());
        }
    }

    pub fn get(&self, field: MetadataField) -> Option<&FieldValue> {
        self.values.get(&field)
    }

    /// Known replicated fields, in the fixed replication order.
    pub fn replicated(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        MetadataField::ALL
            .into_iter()
            .filter(|field| field.is_replicated())
            .filter_map(|field| self.values.get(&field).map(|value| (field.name(), value)))
    }
}

/// The main form's fields for one filing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrimaryRecord {
    #[serde(flatten)]
    pub fields: IndexMap<String, FieldValue>,
    #[serde(rename = "sourceLink")]
    pub source_link: String,
    /// Ids of stored schedule records; only the storage layer sets this.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedules: Option<Vec<String>>,
}

impl PrimaryRecord {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(FieldValue::as_text)
    }
}

/// One schedule's fields plus the replicated filing metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleRecord {
    #[serde(rename = "type")]
    pub kind: ScheduleKind,
    #[serde(flatten)]
    pub fields: IndexMap<String, FieldValue>,
}

impl ScheduleRecord {
    fn new(kind: ScheduleKind) -> Self {
        Self {
            kind,
            fields: IndexMap::new(),
        }
    }

    fn merge(&mut self, name: &str, value: &FieldValue, metadata: &Metadata) {
        self.fields.insert(name.to_string(), value.clone());
        for (key, value) in metadata.replicated() {
            self.fields.insert(key.to_string(), value.clone());
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(FieldValue::as_text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub primary: PrimaryRecord,
    pub schedules: Vec<ScheduleRecord>,
    pub metadata: Metadata,
}

pub struct Partitioner {
    policy: MetadataPolicy,
}

impl Partitioner {
    pub fn new(policy: MetadataPolicy) -> Self {
        Self { policy }
    }

    /// Split `fields` into the primary record and its schedules.
    ///
    /// Pure in `fields`: calling it twice on the same map gives equal output.
    pub fn partition(&self, fields: &FieldMap, stats: &mut ParseStats) -> Partition {
        let decoded: Vec<(DecodedCode, &FieldValue)> = fields
            .iter()
            .filter_map(|(code, value)| match DecodedCode::parse(code) {
                Some(decoded) => Some((decoded, value)),
                None => {
                    warn!("Skipping field with malformed code {}", code);
                    stats.malformed_codes += 1;
                    None
                }
            })
            .collect();

        let (schedules, metadata) = self.schedule_pass(&decoded);
        let primary = primary_pass(&decoded);

        Partition {
            primary,
            schedules,
            metadata,
        }
    }

    fn schedule_pass(&self, decoded: &[(DecodedCode, &FieldValue)]) -> (Vec<ScheduleRecord>, Metadata) {
        let mut metadata = Metadata::default();
        let mut schedules: Vec<ScheduleRecord> = Vec::new();

        for (code, value) in decoded {
            metadata.observe(&code.name, value);

            let FormKind::Schedule(kind) = code.form else {
                continue;
            };
            let position = match schedules.iter().position(|s| s.kind == kind) {
                Some(position) => position,
                None => {
                    schedules.push(ScheduleRecord::new(kind));
                    schedules.len() - 1
                }
            };
            schedules[position].merge(&code.name, value, &metadata);
        }

        if self.policy == MetadataPolicy::Backfill {
            for schedule in &mut schedules {
                for (key, value) in metadata.replicated() {
                    schedule.fields.insert(key.to_string(), value.clone());
                }
            }
        }

        (schedules, metadata)
    }
}

fn primary_pass(decoded: &[(DecodedCode, &FieldValue)]) -> PrimaryRecord {
    let mut primary = PrimaryRecord::default();
    for (code, value) in decoded {
        if code.form == FormKind::Main {
            primary.fields.insert(code.name.clone(), (*value).clone());
        }
    }
    primary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_map(pairs: &[(&str, &str)]) -> FieldMap {
        let mut fields = FieldMap::new();
        for (code, value) in pairs {
            fields.push_text(code, value);
        }
        fields
    }

    #[test]
    fn main_form_codes_land_in_the_primary_record() {
        let fields = field_map(&[("F9-PC-01-FILEREIN", "123456789")]);
        let mut stats = ParseStats::default();
        let partition = Partitioner::new(MetadataPolicy::Forward).partition(&fields, &mut stats);

        assert_eq!(partition.primary.text("FILEREIN"), Some("123456789"));
        assert!(partition.schedules.is_empty());
    }

    #[test]
    fn schedule_records_accumulate_per_type() {
        let fields = field_map(&[
            ("F9-PC-01-FILEREIN", "123456789"),
            ("SA-PC-02-IIUBTICTYMYE3", "13"),
            ("SI-PC-01-GRANTCOUNT", "2"),
            ("SA-PC-02-IIUBTICTYMYE2", "12"),
        ]);
        let mut stats = ParseStats::default();
        let partition = Partitioner::new(MetadataPolicy::Forward).partition(&fields, &mut stats);

        assert_eq!(partition.schedules.len(), 2);
        let schedule_a = &partition.schedules[0];
        assert_eq!(schedule_a.kind, ScheduleKind::A);
        assert_eq!(schedule_a.text("IIUBTICTYMYE3"), Some("13"));
        assert_eq!(schedule_a.text("IIUBTICTYMYE2"), Some("12"));
        assert_eq!(schedule_a.text("FILEREIN"), Some("123456789"));
        assert_eq!(partition.schedules[1].kind, ScheduleKind::I);
    }

    #[test]
    fn metadata_is_forward_only_by_default() {
        let fields = field_map(&[
            ("SB-PC-01-CONTRIBUTOR", "ACME"),
            ("F9-PC-01-TAXYEAR", "2018"),
            ("SC-PC-01-LOBBYING", "0"),
        ]);
        let mut stats = ParseStats::default();
        let forward = Partitioner::new(MetadataPolicy::Forward).partition(&fields, &mut stats);
        assert_eq!(forward.schedules[0].text("TAXYEAR"), None);
        assert_eq!(forward.schedules[1].text("TAXYEAR"), Some("2018"));

        let backfill = Partitioner::new(MetadataPolicy::Backfill).partition(&fields, &mut stats);
        assert_eq!(backfill.schedules[0].text("TAXYEAR"), Some("2018"));
    }

    #[test]
    fn address_parts_are_tracked_but_not_replicated() {
        let fields = field_map(&[
            ("F9-PC-01-ADDRESCITYIT", "NEW CITY"),
            ("SO-PC-01-EXPLANATION", "text"),
        ]);
        let mut stats = ParseStats::default();
        let partition = Partitioner::new(MetadataPolicy::Forward).partition(&fields, &mut stats);
        assert_eq!(
            partition.metadata.get(MetadataField::City),
            Some(&FieldValue::Text("NEW CITY".into()))
        );
        assert_eq!(partition.schedules[0].text("ADDRESCITYIT"), None);
    }

    #[test]
    fn malformed_codes_are_skipped_and_counted() {
        let fields = field_map(&[("BROKEN", "x"), ("F9-PC-01-TAXYEAR", "2018")]);
        let mut stats = ParseStats::default();
        let partition = Partitioner::new(MetadataPolicy::Forward).partition(&fields, &mut stats);
        assert_eq!(stats.malformed_codes, 1);
        assert_eq!(partition.primary.fields.len(), 1);
    }

    #[test]
    fn partition_is_idempotent() {
        let fields = field_map(&[
            ("F9-PC-01-FILEREIN", "123456789"),
            ("SA-PC-02-IIUBTICTYMYE3", "13"),
            ("F9-PC-01-PHONE", "1"),
            ("F9-PC-01-PHONE", "2"),
        ]);
        let partitioner = Partitioner::new(MetadataPolicy::Forward);
        let mut stats = ParseStats::default();
        let first = partitioner.partition(&fields, &mut stats);
        let second = partitioner.partition(&fields, &mut stats);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first.primary).unwrap(),
            serde_json::to_string(&second.primary).unwrap()
        );
    }

    #[test]
    fn schedule_type_serializes_as_marker() {
        let fields = field_map(&[("SA-PC-02-IIUBTICTYMYE3", "13")]);
        let mut stats = ParseStats::default();
        let partition = Partitioner::new(MetadataPolicy::Forward).partition(&fields, &mut stats);
        let json = serde_json::to_value(&partition.schedules[0]).unwrap();
        assert_eq!(json["type"], "SA");
        assert_eq!(json["IIUBTICTYMYE3"], "13");
    }
}
