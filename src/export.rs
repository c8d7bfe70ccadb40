// Export flow: ordered store read -> tabular payload -> single-entry archive

use crate::archive::{build_archive, ArchiveLayout};
use crate::db::PriceStore;
use crate::error::{PipelineError, PipelineResult};
use crate::record::{Record, HEADER};
use csv::{Terminator, WriterBuilder};
use sha2::{Digest, Sha256};
use tracing::{error, info};

/// RecordSerializer - in-memory tabular encoder
///
/// The header row is written on construction. Nothing reaches the caller
/// until `finish`, so a failed export never exposes a truncated payload.
pub struct RecordSerializer {
    writer: csv::Writer<Vec<u8>>,
    rows: usize,
}

impl RecordSerializer {
    pub fn new() -> PipelineResult<Self> {
        let mut writer = WriterBuilder::new()
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        writer.write_record(HEADER).map_err(csv_fault)?;

        Ok(RecordSerializer { writer, rows: 0 })
    }

    pub fn write(&mut self, record: &Record) -> PipelineResult<()> {
        self.writer
            .write_record(record.to_fields())
            .map_err(csv_fault)?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn finish(self) -> PipelineResult<Vec<u8>> {
        self.writer
            .into_inner()
            .map_err(|e| PipelineError::ExportFailed(format!("csv flush: {}", e.error())))
    }
}

fn csv_fault(e: csv::Error) -> PipelineError {
    PipelineError::ExportFailed(format!("csv: {}", e))
}

/// Encode records (already in the desired order) into a tabular payload.
pub fn encode_records(records: &[Record]) -> PipelineResult<Vec<u8>> {
    let mut serializer = RecordSerializer::new()?;
    for record in records {
        serializer.write(record)?;
    }
    serializer.finish()
}

/// Hex SHA-256 of a tabular payload. Equal store contents give equal digests.
pub fn payload_digest(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// EXPORT
// ============================================================================

/// A finished export: the archive plus facts about its payload.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub archive: Vec<u8>,
    pub entry_name: String,
    pub rows: usize,
    pub digest: String,
}

/// Export every stored record, ordered by identifier, as a one-entry archive.
pub fn export_archive<S: PriceStore + ?Sized>(
    store: &S,
    layout: &ArchiveLayout,
) -> PipelineResult<ExportArtifact> {
    let result = build_export(store, layout);

    match &result {
        Ok(artifact) => info!(
            rows = artifact.rows,
            archive_bytes = artifact.archive.len(),
            digest = %artifact.digest,
            "export built"
        ),
        Err(e) => error!(error = %e, "export failed"),
    }

    result
}

fn build_export<S: PriceStore + ?Sized>(
    store: &S,
    layout: &ArchiveLayout,
) -> PipelineResult<ExportArtifact> {
    let mut serializer = RecordSerializer::new()?;
    store.scan_ordered(&mut |record| serializer.write(&record))?;

    let rows = serializer.rows();
    let payload = serializer.finish()?;
    let digest = payload_digest(&payload);
    let archive = build_archive(&layout.canonical_entry, &payload)?;

    Ok(ExportArtifact {
        archive,
        entry_name: layout.canonical_entry.clone(),
        rows,
        digest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(id: i64, name: &str, category: &str, price_cents: i64, day: u32) -> Record {
        Record {
            id,
            name: name.to_string(),
            category: category.to_string(),
            price_cents,
            created_at: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
        }
    }

    #[test]
    fn test_header_only_when_empty() {
        let payload = encode_records(&[]).unwrap();
        assert_eq!(payload, b"id,name,category,price,create_date\n");
    }

    #[test]
    fn test_rows_use_two_decimal_prices() {
        let payload = encode_records(&[
            record(1, "A", "cat1", 10_000, 1),
            record(2, "B", "cat2", 50, 2),
        ])
        .unwrap();

        assert_eq!(
            String::from_utf8(payload).unwrap(),
            "id,name,category,price,create_date\n\
             1,A,cat1,100.00,2024-01-01\n\
             2,B,cat2,0.50,2024-01-02\n"
        );
    }

    #[test]
    fn test_fields_with_delimiters_are_quoted() {
        let payload = encode_records(&[record(1, "Nuts, salted", "food", 300, 1)]).unwrap();
        let text = String::from_utf8(payload).unwrap();
        assert!(text.contains("1,\"Nuts, salted\",food,3.00,2024-01-01\n"));
    }

    #[test]
    fn test_digest_is_stable() {
        let a = payload_digest(b"id,name\n");
        let b = payload_digest(b"id,name\n");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, payload_digest(b"id,name\r\n"));
    }
}
