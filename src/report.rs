//! Rendering run results: the results table and the CSV export.

use std::path::Path;

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};

use crate::domain::result::{ExecutionResult, RunSummary};
use crate::domain::script::ScriptType;
use crate::error::Result;

/// Columns exported when none are requested.
pub const DEFAULT_EXPORT_COLUMNS: [&str; 3] = ["Error", "Message", "Output"];

/// Pretty-print `output` when it is JSON, otherwise return it unchanged.
pub fn display_output(output: &str) -> String {
    serde_json::from_str::<serde_json::Value>(output)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| output.to_string())
}

/// Results table: one line per settled row, in row order.
pub fn render_table(summary: &RunSummary) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Request Errored?", "Message", "Output"]);

    for result in &summary.results {
        let errored = if result.error {
            Cell::new("true").fg(Color::Red)
        } else {
            Cell::new("false").fg(Color::Green)
        };
        table.add_row(vec![
            errored,
            Cell::new(&result.message),
            Cell::new(result.output.as_deref().map(display_output).unwrap_or_default()),
        ]);
    }
    table
}

/// Value of one export column for a result.
///
/// `Error`, `Message` and `Output` come from the result; any other name is
/// looked up among the script type's template columns in the source row.
/// Falsy values (a `false` error flag, missing fields) export as empty.
fn column_value(result: &ExecutionResult, column: &str, script_type: ScriptType) -> String {
    match column {
        "Error" => {
            if result.error {
                "true".to_string()
            } else {
                String::new()
            }
        }
        "Message" => result.message.clone(),
        "Output" => result.output.clone().unwrap_or_default(),
        other => script_type
            .layout()
            .position(other)
            .map(|position| result.source_row.field(position).to_string())
            .unwrap_or_default(),
    }
}

/// Build the CSV export.
///
/// The header is the column names joined by commas. Each row wraps every
/// value in double quotes and joins them with `","`. Values are not escaped,
/// so a value containing `"` produces a malformed line.
pub fn export_csv(columns: &[String], results: &[ExecutionResult], script_type: ScriptType) -> String {
    let mut csv = columns.join(",");
    csv.push('\n');

    for result in results {
        let values: Vec<String> = columns
            .iter()
            .map(|column| column_value(result, column, script_type))
            .collect();
        csv.push('"');
        csv.push_str(&values.join("\",\""));
        csv.push_str("\"\n");
    }
    csv
}

/// Write the export for a finished run to `path`.
pub fn write_export(path: &Path, columns: &[String], summary: &RunSummary) -> Result<()> {
    let csv = export_csv(columns, &summary.results, summary.script_type);
    std::fs::write(path, csv)?;
    tracing::info!(path = %path.display(), rows = summary.results.len(), "Wrote results export");
    Ok(())
}

/// One-line outcome, e.g. `Completed: 3 of 4 rows succeeded, 1 failed`.
pub fn summary_line(summary: &RunSummary) -> String {
    let status = if summary.status.is_completed() {
        "Completed"
    } else {
        "Aborted"
    };
    format!(
        "{}: {} of {} rows succeeded, {} failed",
        status,
        summary.succeeded(),
        summary.total,
        summary.failed()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::result::{RunId, RunStatus};
    use crate::domain::row::Row;
    use crate::error::RowError;
    use crate::domain::script::TargetKind;
    use chrono::Utc;

    fn results() -> Vec<ExecutionResult> {
        let ok_row = Row::new(0, vec!["https://a".into(), "ping".into(), "[]".into()]);
        let bad_row = Row::new(1, vec!["https://b".into(), "nope".into(), "".into()]);
        vec![
            ExecutionResult::succeeded(&ok_row, "Method was executed successfully.", Some("{}".into())),
            ExecutionResult::failed(
                &bad_row,
                &RowError::Dispatch {
                    kind: TargetKind::Site,
                    method: "nope".into(),
                },
            ),
        ]
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn export_quotes_every_value() {
        let csv = export_csv(&columns(&DEFAULT_EXPORT_COLUMNS), &results(), ScriptType::Site);
        assert_eq!(
            csv,
            "Error,Message,Output\n\
             \"\",\"Method was executed successfully.\",\"{}\"\n\
             \"true\",\"Error: The method does not exist for this object type.\",\"Unable to process request.\"\n"
        );
    }

    #[test]
    fn export_reads_template_columns_from_source_row() {
        let csv = export_csv(&columns(&["Site Url", "Error", "Bogus"]), &results(), ScriptType::Site);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Site Url,Error,Bogus");
        assert_eq!(lines[1], r#""https://a","","""#);
        assert_eq!(lines[2], r#""https://b","true","""#);
    }

    #[test]
    fn json_output_is_pretty_printed() {
        assert_eq!(display_output(r#"{"a":1}"#), "{\n  \"a\": 1\n}");
        assert_eq!(display_output("plain text"), "plain text");
    }

    #[test]
    fn summary_line_counts() {
        let now = Utc::now();
        let summary = RunSummary {
            run_id: RunId::new(),
            title: "Demo".into(),
            script_type: ScriptType::Site,
            status: RunStatus::Completed,
            results: results(),
            completed: 2,
            total: 2,
            started_at: now,
            finished_at: now,
        };
        assert_eq!(summary_line(&summary), "Completed: 1 of 2 rows succeeded, 1 failed");
        assert_eq!(render_table(&summary).row_iter().count(), 2);
    }

    #[test]
    fn write_export_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Demo_results.csv");
        let now = Utc::now();
        let summary = RunSummary {
            run_id: RunId::new(),
            title: "Demo".into(),
            script_type: ScriptType::Site,
            status: RunStatus::Completed,
            results: results(),
            completed: 2,
            total: 2,
            started_at: now,
            finished_at: now,
        };
        write_export(&path, &columns(&DEFAULT_EXPORT_COLUMNS), &summary).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("Error,Message,Output\n"));
        assert_eq!(written.lines().count(), 3);
    }
}
