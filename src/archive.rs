// Archive handling - ZIP container in, ZIP container out
// The whole upload is held in memory; entries are opened lazily.

use crate::error::{PipelineError, PipelineResult};
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const DEFAULT_ENTRY_NAME: &str = "data.csv";
pub const DEFAULT_EXTENSION: &str = "csv";

// ============================================================================
// LAYOUT
// ============================================================================

/// Which archive entry carries the tabular payload.
///
/// An entry named exactly `canonical_entry` wins; otherwise the first entry
/// whose name ends in `.extension` (case-insensitive) is taken. Exports are
/// always written under `canonical_entry`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLayout {
    pub canonical_entry: String,
    pub extension: String,
}

impl Default for ArchiveLayout {
    fn default() -> Self {
        ArchiveLayout {
            canonical_entry: DEFAULT_ENTRY_NAME.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

impl ArchiveLayout {
    pub fn new(canonical_entry: impl Into<String>, extension: impl Into<String>) -> Self {
        let extension: String = extension.into();
        ArchiveLayout {
            canonical_entry: canonical_entry.into(),
            extension: extension.trim_start_matches('.').to_lowercase(),
        }
    }

    /// Pick the payload among `(index, name)` pairs given in archive order.
    pub fn select<'n>(&self, entries: &'n [(usize, String)]) -> Option<&'n (usize, String)> {
        if let Some(exact) = entries.iter().find(|(_, name)| *name == self.canonical_entry) {
            return Some(exact);
        }

        let suffix = format!(".{}", self.extension);
        entries
            .iter()
            .find(|(_, name)| name.to_lowercase().ends_with(&suffix))
    }

    fn not_found(&self) -> PipelineError {
        PipelineError::PayloadNotFound {
            canonical: self.canonical_entry.clone(),
            extension: self.extension.clone(),
        }
    }
}

// ============================================================================
// EXTRACTOR
// ============================================================================

/// ArchiveExtractor - read-only view over an uploaded archive
pub struct ArchiveExtractor<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> ArchiveExtractor<'a> {
    pub fn open(bytes: &'a [u8]) -> PipelineResult<Self> {
        if bytes.is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| PipelineError::ArchiveCorrupt(e.to_string()))?;

        Ok(ArchiveExtractor { archive })
    }

    /// File entries in archive order; directories are skipped.
    pub fn entries(&mut self) -> PipelineResult<Vec<(usize, String)>> {
        let mut entries = Vec::with_capacity(self.archive.len());

        for index in 0..self.archive.len() {
            let entry = self
                .archive
                .by_index_raw(index)
                .map_err(|e| PipelineError::ArchiveCorrupt(e.to_string()))?;

            if !entry.is_dir() {
                entries.push((index, entry.name().to_string()));
            }
        }

        Ok(entries)
    }

    /// Open the payload entry chosen by `layout`.
    /// The returned reader borrows the extractor and is released on drop.
    pub fn open_payload(
        &mut self,
        layout: &ArchiveLayout,
    ) -> PipelineResult<(String, Box<dyn Read + '_>)> {
        let entries = self.entries()?;
        let (index, name) = layout
            .select(&entries)
            .cloned()
            .ok_or_else(|| layout.not_found())?;

        let entry = self
            .archive
            .by_index(index)
            .map_err(|e| PipelineError::ArchiveCorrupt(format!("{}: {}", name, e)))?;

        Ok((name, Box::new(entry)))
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Package `payload` as the single entry `entry_name` of a new archive.
pub fn build_archive(entry_name: &str, payload: &[u8]) -> PipelineResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file(entry_name, options).map_err(archive_fault)?;
    writer.write_all(payload).map_err(archive_fault)?;
    let cursor = writer.finish().map_err(archive_fault)?;

    Ok(cursor.into_inner())
}

fn archive_fault(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::ExportFailed(format!("archive: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zip_with(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn read_payload(bytes: &[u8], layout: &ArchiveLayout) -> PipelineResult<(String, String)> {
        let mut extractor = ArchiveExtractor::open(bytes)?;
        let (name, mut reader) = extractor.open_payload(layout)?;
        let mut body = String::new();
        reader.read_to_string(&mut body).unwrap();
        Ok((name, body))
    }

    #[test]
    fn test_empty_input_rejected() {
        let result = ArchiveExtractor::open(&[]);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let result = ArchiveExtractor::open(b"definitely not a zip file");
        assert!(matches!(result, Err(PipelineError::ArchiveCorrupt(_))));
    }

    #[test]
    fn test_canonical_name_preferred_over_earlier_csv() {
        let bytes = zip_with(&[("other.csv", "other"), ("data.csv", "canonical")]);

        let (name, body) = read_payload(&bytes, &ArchiveLayout::default()).unwrap();

        assert_eq!(name, "data.csv");
        assert_eq!(body, "canonical");
    }

    #[test]
    fn test_extension_fallback_is_case_insensitive() {
        let bytes = zip_with(&[("readme.txt", "hi"), ("export/PRICES.CSV", "rows")]);

        let (name, body) = read_payload(&bytes, &ArchiveLayout::default()).unwrap();

        assert_eq!(name, "export/PRICES.CSV");
        assert_eq!(body, "rows");
    }

    #[test]
    fn test_missing_payload() {
        let bytes = zip_with(&[("readme.txt", "hi")]);

        let result = read_payload(&bytes, &ArchiveLayout::default());

        assert!(matches!(result, Err(PipelineError::PayloadNotFound { .. })));
    }

    #[test]
    fn test_layout_normalizes_extension() {
        let layout = ArchiveLayout::new("prices.tsv", ".TSV");
        assert_eq!(layout.extension, "tsv");
    }

    #[test]
    fn test_build_archive_holds_single_entry() {
        let bytes = build_archive("data.csv", b"id,name\n").unwrap();

        let mut extractor = ArchiveExtractor::open(&bytes).unwrap();
        let entries = extractor.entries().unwrap();

        assert_eq!(entries, vec![(0, "data.csv".to_string())]);
        let (_, body) = read_payload(&bytes, &ArchiveLayout::default()).unwrap();
        assert_eq!(body, "id,name\n");
    }
}
