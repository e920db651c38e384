//! Training data validation
//!
//! The import job fails hours into a run if the interaction file is malformed
//! or too small to train on, so provisioning checks it up front and refuses to
//! create anything when it does not pass.

use csv::{ReaderBuilder, StringRecord};
use recsys_common::defaults::{MIN_DISTINCT_ITEMS, MIN_DISTINCT_USERS, MIN_INTERACTIONS};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Columns of the interactions schema, in file order
pub const INTERACTION_COLUMNS: [&str; 4] = ["USER_ID", "ITEM_ID", "EVENT_TYPE", "TIMESTAMP"];

const USER_ID: usize = 0;
const ITEM_ID: usize = 1;
const EVENT_TYPE: usize = 2;
const TIMESTAMP: usize = 3;

/// Minimum sizes the provider needs to train a model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationThresholds {
    pub min_interactions: usize,
    pub min_users: usize,
    pub min_items: usize,
}

impl Default for ValidationThresholds {
    fn default() -> Self {
        Self {
            min_interactions: MIN_INTERACTIONS,
            min_users: MIN_DISTINCT_USERS,
            min_items: MIN_DISTINCT_ITEMS,
        }
    }
}

/// Summary of a validated interaction file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionStats {
    pub interactions: usize,
    pub distinct_users: usize,
    pub distinct_items: usize,
    pub event_types: usize,
    pub first_timestamp: i64,
    pub last_timestamp: i64,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("cannot read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("header must be {expected}, found {found}")]
    Header { expected: String, found: String },

    #[error("malformed row at line {line}")]
    Malformed {
        line: u64,
        #[source]
        source: csv::Error,
    },

    #[error("empty {column} at line {line}")]
    EmptyField { line: u64, column: &'static str },

    #[error("TIMESTAMP {value:?} at line {line} is not an integer")]
    InvalidTimestamp { line: u64, value: String },

    #[error("TIMESTAMP {current} at line {line} is earlier than the previous row ({previous})")]
    TimestampOrder {
        line: u64,
        previous: i64,
        current: i64,
    },

    #[error("{found} interactions, at least {required} required")]
    TooFewInteractions { found: usize, required: usize },

    #[error("{found} distinct users, at least {required} required")]
    TooFewUsers { found: usize, required: usize },

    #[error("{found} distinct items, at least {required} required")]
    TooFewItems { found: usize, required: usize },
}

fn check_header(header: &StringRecord) -> Result<(), ValidationError> {
    let found: Vec<&str> = header.iter().map(str::trim).collect();
    if found != INTERACTION_COLUMNS {
        return Err(ValidationError::Header {
            expected: INTERACTION_COLUMNS.join(","),
            found: found.join(","),
        });
    }
    Ok(())
}

/// Validate an interaction file against the schema and thresholds.
///
/// Stops at the first problem found.
pub fn validate_interactions(
    path: &Path,
    thresholds: &ValidationThresholds,
) -> Result<InteractionStats, ValidationError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|source| ValidationError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let header = reader
        .headers()
        .map_err(|source| ValidationError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .clone();
    check_header(&header)?;

    let mut users = HashSet::new();
    let mut items = HashSet::new();
    let mut event_types = HashSet::new();
    let mut interactions = 0usize;
    let mut first_timestamp = None;
    let mut previous: Option<i64> = None;

    let mut record = StringRecord::new();
    loop {
        let line = reader.position().line();
        let more = reader
            .read_record(&mut record)
            .map_err(|source| ValidationError::Malformed { line, source })?;
        if !more {
            break;
        }
        let line = record.position().map(|p| p.line()).unwrap_or(line);

        for (index, column) in INTERACTION_COLUMNS.iter().enumerate() {
            if record.get(index).is_none_or(|v| v.trim().is_empty()) {
                return Err(ValidationError::EmptyField {
                    line,
                    column: *column,
                });
            }
        }

        let raw_ts = record[TIMESTAMP].trim();
        let timestamp: i64 = raw_ts
            .parse()
            .map_err(|_| ValidationError::InvalidTimestamp {
                line,
                value: raw_ts.to_string(),
            })?;
        if let Some(previous) = previous {
            if timestamp < previous {
                return Err(ValidationError::TimestampOrder {
                    line,
                    previous,
                    current: timestamp,
                });
            }
        }
        previous = Some(timestamp);
        first_timestamp.get_or_insert(timestamp);

        users.insert(record[USER_ID].trim().to_string());
        items.insert(record[ITEM_ID].trim().to_string());
        event_types.insert(record[EVENT_TYPE].trim().to_string());
        interactions += 1;
    }

    if interactions < thresholds.min_interactions {
        return Err(ValidationError::TooFewInteractions {
            found: interactions,
            required: thresholds.min_interactions,
        });
    }
    if users.len() < thresholds.min_users {
        return Err(ValidationError::TooFewUsers {
            found: users.len(),
            required: thresholds.min_users,
        });
    }
    if items.len() < thresholds.min_items {
        return Err(ValidationError::TooFewItems {
            found: items.len(),
            required: thresholds.min_items,
        });
    }

    let stats = InteractionStats {
        interactions,
        distinct_users: users.len(),
        distinct_items: items.len(),
        event_types: event_types.len(),
        first_timestamp: first_timestamp.unwrap_or_default(),
        last_timestamp: previous.unwrap_or_default(),
    };

    info!(
        path = %path.display(),
        interactions = stats.interactions,
        users = stats.distinct_users,
        items = stats.distinct_items,
        "Training data validated"
    );

    Ok(stats)
}
