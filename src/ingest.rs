// Ingest flow: archive bytes -> validated records -> atomic commit -> statistics

use crate::archive::{ArchiveExtractor, ArchiveLayout};
use crate::db::PriceStore;
use crate::error::PipelineResult;
use crate::parser::RecordParser;
use crate::record::{BatchCommit, Record};
use crate::schema::RecordValidator;
use std::io::Read;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Decode and validate a whole tabular payload, stopping at the first bad row.
pub fn decode_records<R: Read>(source: R) -> PipelineResult<Vec<Record>> {
    let validator = RecordValidator::new();
    let mut records = Vec::new();

    for row in RecordParser::new(source)? {
        records.push(validator.validate(&row?)?);
    }

    Ok(records)
}

/// Ingest one uploaded archive into `store`.
///
/// The payload is fully decoded and validated before the store is touched,
/// so the write transaction only spans the inserts and the aggregate read.
/// Any error leaves the store exactly as it was.
pub fn ingest_archive<S: PriceStore + ?Sized>(
    store: &S,
    bytes: &[u8],
    layout: &ArchiveLayout,
) -> PipelineResult<BatchCommit> {
    let batch_id = Uuid::new_v4();
    let span = tracing::info_span!("ingest", %batch_id, archive_bytes = bytes.len());
    let _guard = span.enter();

    let records = match extract_records(bytes, layout) {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, code = e.code(), "rejected upload");
            return Err(e);
        }
    };

    match store.commit_batch(&records) {
        Ok(commit) => {
            info!(
                inserted = commit.inserted,
                total_items = commit.stats.total_items,
                total_categories = commit.stats.total_categories,
                total_price = commit.stats.total_price,
                "batch committed"
            );
            Ok(commit)
        }
        Err(e) => {
            error!(error = %e, rows = records.len(), "batch rolled back");
            Err(e)
        }
    }
}

fn extract_records(bytes: &[u8], layout: &ArchiveLayout) -> PipelineResult<Vec<Record>> {
    let mut extractor = ArchiveExtractor::open(bytes)?;
    let (entry, payload) = extractor.open_payload(layout)?;
    info!(%entry, "payload located");

    decode_records(payload)
}
