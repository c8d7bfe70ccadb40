//! Error taxonomy shared by the ingest and export flows.

/// Every way an ingest or export call can fail.
///
/// Client-data problems (bad archive, bad rows, bad fields) are separated
/// from store faults by [`PipelineError::is_client_error`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The uploaded buffer had zero length.
    #[error("empty input: no archive bytes received")]
    EmptyInput,

    /// The buffer is not a readable archive.
    #[error("archive corrupt: {0}")]
    ArchiveCorrupt(String),

    /// No entry in the archive qualifies as the tabular payload.
    #[error("payload not found: no entry named {canonical:?} or ending in .{extension}")]
    PayloadNotFound { canonical: String, extension: String },

    /// The header row is missing or has the wrong arity.
    #[error("header invalid: {0}")]
    HeaderInvalid(String),

    /// A data line could not be decoded into the expected field tuple.
    #[error("row malformed at line {line}: {reason}")]
    RowMalformed { line: u64, reason: String },

    #[error("invalid identifier at line {line}: {value:?}")]
    InvalidIdentifier { line: u64, value: String },

    #[error("invalid {field} at line {line}: must not be empty")]
    InvalidField { line: u64, field: &'static str },

    #[error("invalid price at line {line}: {value:?}")]
    InvalidPrice { line: u64, value: String },

    #[error("invalid date at line {line}: {value:?} (expected YYYY-MM-DD)")]
    InvalidDate { line: u64, value: String },

    /// The store rejected the batch; nothing from this call was kept.
    #[error("insert failed: {0}")]
    InsertFailed(String),

    /// Reading or packaging the store contents failed; no archive produced.
    #[error("export failed: {0}")]
    ExportFailed(String),
}

impl PipelineError {
    /// True when the failure is caused by the submitted data (4xx class).
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            PipelineError::InsertFailed(_) | PipelineError::ExportFailed(_)
        )
    }

    /// Stable machine-readable code for response bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::EmptyInput => "empty_input",
            PipelineError::ArchiveCorrupt(_) => "archive_corrupt",
            PipelineError::PayloadNotFound { .. } => "payload_not_found",
            PipelineError::HeaderInvalid(_) => "header_invalid",
            PipelineError::RowMalformed { .. } => "row_malformed",
            PipelineError::InvalidIdentifier { .. } => "invalid_identifier",
            PipelineError::InvalidField { .. } => "invalid_field",
            PipelineError::InvalidPrice { .. } => "invalid_price",
            PipelineError::InvalidDate { .. } => "invalid_date",
            PipelineError::InsertFailed(_) => "insert_failed",
            PipelineError::ExportFailed(_) => "export_failed",
        }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(PipelineError::EmptyInput.is_client_error());
        assert!(PipelineError::RowMalformed {
            line: 3,
            reason: "x".to_string()
        }
        .is_client_error());
        assert!(!PipelineError::InsertFailed("boom".to_string()).is_client_error());
        assert!(!PipelineError::ExportFailed("boom".to_string()).is_client_error());
    }

    #[test]
    fn test_messages_carry_line_numbers() {
        let err = PipelineError::InvalidPrice {
            line: 4,
            value: "-1".to_string(),
        };
        assert_eq!(err.to_string(), "invalid price at line 4: \"-1\"");
        assert_eq!(err.code(), "invalid_price");
    }
}
