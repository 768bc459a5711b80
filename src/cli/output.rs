//! Output formatting utilities for the CLI.

use comfy_table::{presets, Cell, CellAlignment, ContentArrangement, Table};
use console::{style, StyledObject};
use serde::Serialize;

use crate::domain::models::ScoreVector;

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;
    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Create a borderless list table with the given headers.
pub fn list_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h.to_uppercase()).set_alignment(CellAlignment::Left)),
        );
    table
}

/// Render the table under a count line, or a "No ... found." line when empty.
///
/// `noun` is `(singular, plural)`.
pub fn render_list(noun: (&str, &str), table: &Table, total: usize) -> String {
    let (singular, plural) = noun;
    if total == 0 {
        return format!("No {plural} found.");
    }
    let noun = if total == 1 { singular } else { plural };
    format!("{} {noun}:\n{table}", style(total).bold())
}

/// Color a defy state or outcome for terminal display.
pub fn colorize_state(state: &str) -> StyledObject<&str> {
    match state {
        "created" => style(state).blue(),
        "round_in_progress" => style(state).yellow(),
        "one_side_ended" => style(state).cyan(),
        "both_ended" | "won" => style(state).green().bold(),
        "lost" | "draw" => style(state).red(),
        _ => style(state).dim(),
    }
}

/// `[points, attempts, fails, hints]`, the way scores are shown everywhere.
pub fn format_score(score: &ScoreVector) -> String {
    let [points, attempts, fails, hints] = score.as_array();
    format!("[{points}, {attempts}, {fails}, {hints}]")
}

/// First eight characters of an id, enough to tell defies apart in a list.
pub fn short_id(id: &uuid::Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_list_counts() {
        let mut table = list_table(&["name"]);
        assert_eq!(render_list(("defy", "defies"), &table, 0), "No defies found.");

        table.add_row(vec!["alice"]);
        let rendered = render_list(("invite", "invites"), &table, 1);
        assert!(rendered.contains("invite:"));
        assert!(rendered.contains("alice"));
        assert!(rendered.contains("NAME"));
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(&ScoreVector::new(80, 3, 2, 1)), "[80, 3, 2, 1]");
    }

    #[test]
    fn test_short_id() {
        let id = uuid::Uuid::new_v4();
        let short = short_id(&id);
        assert_eq!(short.len(), 8);
        assert!(id.to_string().starts_with(&short));
    }
}
