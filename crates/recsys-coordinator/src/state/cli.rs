//! CLI output for run state

use super::types::RunState;
use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use recsys_common::ResourceKind;

/// Build the table printed by the `status` subcommand
pub fn status_table(state: &RunState) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Resource"),
            Cell::new("State"),
            Cell::new("Identifier"),
        ]);

    for kind in ResourceKind::creation_order() {
        let (label, id) = match (state.identifier(kind), state.pending()) {
            (Some(id), _) => ("confirmed", id),
            (None, Some(p)) if p.kind == kind => ("pending", p.identifier.as_str()),
            _ => ("-", ""),
        };
        table.add_row(vec![Cell::new(kind.as_str()), Cell::new(label), Cell::new(id)]);
    }

    let support = &state.support;
    let rows = [
        ("bucket", support.bucket.as_deref()),
        ("data_location", support.data_location.as_deref()),
        (
            "bucket_policy",
            support.bucket_policy.then_some("attached"),
        ),
        ("role", support.role_arn.as_deref().or(support.role_name.as_deref())),
    ];
    for (name, value) in rows {
        let label = match value {
            Some(_) if name == "role" && support.role_adopted => "adopted",
            Some(_) => "created",
            None => "-",
        };
        table.add_row(vec![
            Cell::new(name),
            Cell::new(label),
            Cell::new(value.unwrap_or_default()),
        ]);
    }

    table
}

/// Print the run header and status table
pub fn print_status(state: &RunState) {
    println!("Run:     {}", state.run_id);
    println!("Region:  {}", state.settings.region);
    println!(
        "Updated: {}",
        state.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("{}", status_table(state));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::types::RunSettings;

    #[test]
    fn table_marks_confirmed_and_pending() {
        let mut state = RunState::new(RunSettings::default());
        state.record(ResourceKind::DatasetGroup, "arn:dsg");
        state.set_pending(ResourceKind::Schema, "arn:schema");
        state.support.bucket = Some("acct-us-east-1-bucket".to_string());

        let rendered = status_table(&state).to_string();
        assert!(rendered.contains("confirmed"));
        assert!(rendered.contains("pending"));
        assert!(rendered.contains("arn:schema"));
        assert!(rendered.contains("acct-us-east-1-bucket"));
        assert!(!rendered.contains("adopted"));
    }

    #[test]
    fn table_marks_adopted_role() {
        let mut state = RunState::new(RunSettings::default());
        state.support.role_name = Some("SharedRole".to_string());
        state.support.role_adopted = true;

        let rendered = status_table(&state).to_string();
        assert!(rendered.contains("adopted"));
        assert!(rendered.contains("SharedRole"));
    }
}
