//! Interaction file fixtures
//!
//! Writes interaction CSV files in the layout the import job expects
//! (`USER_ID,ITEM_ID,EVENT_TYPE,TIMESTAMP`) so validation and provisioning
//! tests can work against real files on disk.

use std::io::Write;
use tempfile::NamedTempFile;

/// Header row of an interaction file
pub const INTERACTIONS_HEADER: &str = "USER_ID,ITEM_ID,EVENT_TYPE,TIMESTAMP";

/// First timestamp used by generated fixtures
pub const BASE_TIMESTAMP: i64 = 1_700_000_000;

/// Shape of a generated interaction file
#[derive(Debug, Clone, Copy)]
pub struct InteractionShape {
    pub users: usize,
    pub items: usize,
    pub rows: usize,
}

impl Default for InteractionShape {
    fn default() -> Self {
        Self {
            users: 30,
            items: 10,
            rows: 1200,
        }
    }
}

/// Build the CSV body for an interaction file with the given shape.
///
/// Users and items are assigned round-robin and timestamps increase by one
/// second per row.
pub fn interactions_csv(shape: InteractionShape) -> String {
    let mut out = String::with_capacity(shape.rows * 32);
    out.push_str(INTERACTIONS_HEADER);
    out.push('\n');
    for row in 0..shape.rows {
        let user = row % shape.users.max(1);
        let item = row % shape.items.max(1);
        let event = if row % 3 == 0 { "purchase" } else { "view" };
        out.push_str(&format!(
            "{},{},{},{}\n",
            user,
            item,
            event,
            BASE_TIMESTAMP + row as i64
        ));
    }
    out
}

/// Write arbitrary CSV contents to a temporary file.
///
/// The file is deleted when the returned handle is dropped.
pub fn write_csv(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".csv")
        .tempfile()
        .expect("Should create temp file");
    file.write_all(contents.as_bytes())
        .expect("Should write temp file");
    file.flush().expect("Should flush temp file");
    file
}

/// Write an interaction file that satisfies the default thresholds.
pub fn valid_interactions_file() -> NamedTempFile {
    write_csv(&interactions_csv(InteractionShape::default()))
}
