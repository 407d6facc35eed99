use crate::config::EngineConfig;
use crate::core::assembler::assemble;
use crate::core::context::ParseContext;
use crate::core::filing::{ParsedFiling, ReturnForm};
use crate::core::flatten::flatten_document;
use crate::core::group::GroupReconstructor;
use crate::core::mapping::MappingIndex;
use crate::core::partition::Partitioner;
use crate::error::{FilingError, Result};
use log::{debug, info};
use memmap2::Mmap;
use roxmltree::Document;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

const UTF8_BOM: char = '\u{feff}';

pub trait Parser {
    /// Parse a filing stored at `path`; `source_link` is recorded on the primary record.
    fn parse<P: AsRef<Path>>(&self, path: P, source_link: &str) -> Result<ParsedFiling>;
}

/// Maps filing documents onto records with a shared, read-only concordance.
///
/// Holds no per-document state, so one parser can serve many threads.
#[derive(Debug, Clone)]
pub struct FilingParser {
    index: Arc<MappingIndex>,
    config: EngineConfig,
}

impl FilingParser {
    pub fn new(index: Arc<MappingIndex>, config: EngineConfig) -> Self {
        Self { index, config }
    }

    pub fn index(&self) -> &MappingIndex {
        &self.index
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parse raw XML text. Any tree-level failure aborts the whole document.
    pub fn parse_str(&self, xml: &str, source_link: &str) -> Result<ParsedFiling> {
        let xml = xml.strip_prefix(UTF8_BOM).unwrap_or(xml);
        let doc = Document::parse(xml).map_err(|e| FilingError::structure(source_link, e))?;
        Ok(self.map_document(&doc, source_link))
    }

    /// Map an already parsed tree.
    pub fn map_document(&self, doc: &Document, source_link: &str) -> ParsedFiling {
        let root = doc.root_element();
        let groups = GroupReconstructor::new(&self.index, &self.config);
        let mut ctx = ParseContext::new();

        for field in flatten_document(root) {
            ctx.stats.leaves += 1;
            if groups.absorb(root, &field.path, &mut ctx) {
                continue;
            }
            assemble(&self.index, &mut ctx, &field.path, field.value);
        }

        let partition =
            Partitioner::new(self.config.metadata_policy).partition(&ctx.fields, &mut ctx.stats);
        let mut primary = partition.primary;
        primary.source_link = source_link.to_string();

        let return_form = primary.text("RETURNTYPE").and_then(ReturnForm::from_return_type);

        info!(
            "Mapped {}: {} leaves, {} mapped, {} unmapped, {} groups, {} schedules",
            source_link,
            ctx.stats.leaves,
            ctx.stats.mapped,
            ctx.stats.unmapped,
            ctx.stats.groups,
            partition.schedules.len()
        );

        ParsedFiling {
            primary,
            schedules: partition.schedules,
            groups: ctx.groups,
            return_form,
            stats: ctx.stats,
        }
    }
}

impl Parser for FilingParser {
    fn parse<P: AsRef<Path>>(&self, path: P, source_link: &str) -> Result<ParsedFiling> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| FilingError::io(path, e))?;
        let file_size = file.metadata().map_err(|e| FilingError::io(path, e))?.len();

        if file_size > self.config.mmap_threshold_bytes {
            debug!("Memory-mapping {} ({} bytes)", path.display(), file_size);
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| FilingError::io(path, e))?;
            self.parse_str(decode_utf8(&mmap, source_link)?, source_link)
        } else {
            let bytes = std::fs::read(path).map_err(|e| FilingError::io(path, e))?;
            self.parse_str(decode_utf8(&bytes, source_link)?, source_link)
        }
    }
}

fn decode_utf8<'a>(bytes: &'a [u8], source_link: &str) -> Result<&'a str> {
    std::str::from_utf8(bytes).map_err(|e| FilingError::structure(source_link, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parser() -> FilingParser {
        let mut index = MappingIndex::new();
        index.insert_scalar("Return/ReturnHeader/Filer/EIN", "F9-PC-01-FILEREIN");
        index.insert_scalar("Return/ReturnHeader/ReturnTypeCd", "F9-PC-01-RETURNTYPE");
        FilingParser::new(Arc::new(index), EngineConfig::default())
    }

    #[test]
    fn malformed_xml_aborts_with_source_id() {
        let err = parser()
            .parse_str("<Return><ReturnHeader></Return>", "s3://bucket/1.xml")
            .unwrap_err();
        match err {
            FilingError::Structure { source_id, .. } => assert_eq!(source_id, "s3://bucket/1.xml"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn records_source_link_and_return_form() {
        let xml = "\u{feff}<Return><ReturnHeader><ReturnTypeCd>990EZ</ReturnTypeCd>\
                   <Filer><EIN>123456789</EIN></Filer></ReturnHeader></Return>";
        let filing = parser().parse_str(xml, "local:1.xml").unwrap();
        assert_eq!(filing.source_link(), "local:1.xml");
        assert_eq!(filing.return_form, Some(ReturnForm::Form990EZ));
        assert_eq!(filing.ein(), Some("123456789"));
        assert_eq!(filing.stats.leaves, 2);
    }

    #[test]
    fn parses_from_disk_with_and_without_mmap() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "<Return><ReturnHeader><Filer><EIN>987654321</EIN></Filer></ReturnHeader></Return>"
        )
        .unwrap();

        let buffered = parser().parse(file.path(), "disk").unwrap();
        assert_eq!(buffered.ein(), Some("987654321"));

        let mut config = EngineConfig::default();
        config.mmap_threshold_bytes = 0;
        let mapped = FilingParser::new(Arc::new(parser().index().clone()), config)
            .parse(file.path(), "disk")
            .unwrap();
        assert_eq!(mapped.ein(), Some("987654321"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = parser().parse("/nonexistent/filing.xml", "missing").unwrap_err();
        assert!(matches!(err, FilingError::Io { .. }));
    }

    #[test]
    fn invalid_utf8_is_structural_on_both_read_paths() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"<Return>\xff\xfe</Return>").unwrap();

        let buffered = parser().parse(file.path(), "bad").unwrap_err();
        assert!(matches!(buffered, FilingError::Structure { .. }));

        let mut config = EngineConfig::default();
        config.mmap_threshold_bytes = 0;
        let mapped = FilingParser::new(Arc::new(MappingIndex::new()), config)
            .parse(file.path(), "bad")
            .unwrap_err();
        assert!(matches!(mapped, FilingError::Structure { .. }));
    }
}
