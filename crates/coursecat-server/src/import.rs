//! CSV bulk import.
//!
//! Rows are deserialized into [`CourseDraft`]s by header name, so column order
//! does not matter and unknown columns are ignored. Rows that fail to parse or
//! validate are reported and skipped; the rest go through the service's bulk
//! insert with its partial-success semantics.

use coursecat_core::{CourseDraft, ValidationErrors};
use serde::{Deserialize, Serialize};

use crate::service::{CourseService, RowError, ServiceError, validate_rows};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("CSV file is empty")]
    Empty,

    #[error("CSV header is missing required columns: {0}")]
    MissingColumns(String),

    #[error("CSV file has more than {max} data rows")]
    TooManyRows { max: usize },

    #[error("unreadable CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl From<ImportError> for ServiceError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Service(inner) => inner,
            other => ServiceError::Validation(ValidationErrors::single("file", other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub total_rows: usize,
    pub inserted: u64,
    pub duplicates: u64,
    pub duplicate_ids: Vec<String>,
    pub errors: Vec<RowError>,
}

const REQUIRED_COLUMNS: &[(&str, Option<&str>)] = &[
    ("course_id", Some("courseId")),
    ("title", None),
    ("category", None),
    ("instructor", None),
    ("skill_level", Some("skillLevel")),
];

/// Parsed CSV: numbered drafts plus rows that could not be deserialized.
#[derive(Debug, Default)]
pub struct ParsedCsv {
    pub total_rows: usize,
    pub drafts: Vec<(usize, CourseDraft)>,
    pub errors: Vec<RowError>,
}

pub fn parse_csv(bytes: &[u8], max_rows: usize) -> Result<ParsedCsv, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ImportError::Empty);
    }
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .filter(|(name, alias)| {
            !headers
                .iter()
                .any(|h| h == *name || alias.is_some_and(|a| h == a))
        })
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns(missing.join(", ")));
    }

    let mut parsed = ParsedCsv::default();
    for (index, record) in reader.deserialize::<CourseDraft>().enumerate() {
        let row = index + 1;
        if row > max_rows {
            return Err(ImportError::TooManyRows { max: max_rows });
        }
        parsed.total_rows = row;
        match record {
            Ok(draft) => parsed.drafts.push((row, draft)),
            Err(e) => parsed.errors.push(RowError {
                row,
                course_id: None,
                message: row_error_message(&e),
            }),
        }
    }
    Ok(parsed)
}

fn row_error_message(err: &csv::Error) -> String {
    match err.kind() {
        csv::ErrorKind::Deserialize { err, .. } => match err.field() {
            Some(field) => format!("column {}: {}", field + 1, err.kind()),
            None => err.kind().to_string(),
        },
        _ => err.to_string(),
    }
}

/// Parses, validates and inserts a CSV upload.
pub async fn import_csv(
    service: &CourseService,
    bytes: &[u8],
    max_rows: usize,
) -> Result<ImportReport, ImportError> {
    let parsed = parse_csv(bytes, max_rows)?;
    let (valid, mut errors) = validate_rows(parsed.drafts);
    errors.extend(parsed.errors);
    errors.sort_by_key(|e| e.row);

    let result = service.insert_validated(valid).await?;
    tracing::info!(
        total_rows = parsed.total_rows,
        inserted = result.inserted,
        duplicates = result.duplicates,
        rejected = errors.len(),
        "CSV import finished"
    );

    Ok(ImportReport {
        total_rows: parsed.total_rows,
        inserted: result.inserted,
        duplicates: result.duplicates,
        duplicate_ids: result.duplicate_ids,
        errors,
    })
}
