//! Row interpretation: page name derivation and section selection.

use crate::config::GeneratorConfig;
use crate::model::{FLAG_COLUMNS, IDENTITY_COLUMNS, SheetRow};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

// ASCII classes on purpose: generated page names must stay within
// [A-Za-z0-9_-] no matter what the sheet holds.
static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_\s-]").expect("static pattern"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static pattern"));

/// Derives the generated page name from the four identity columns.
///
/// Empty cells and stray flag marks ("x") are dropped, each surviving part is
/// truncated, stripped to word/space/hyphen characters, and internal
/// whitespace collapses to single underscores. Parts that sanitize away
/// entirely are dropped too. When every identity column is empty the name
/// falls back to a millisecond timestamp; non-empty, but not unique within
/// one tick. When the columns held data but none of it survives
/// sanitization, the result is an empty string and the caller fails the row
/// instead of creating an unnamed page.
pub fn generate_file_name(row: &SheetRow, config: &GeneratorConfig) -> String {
    let raw: Vec<&str> = (0..IDENTITY_COLUMNS)
        .map(|i| row.cell(i).trim())
        .filter(|part| !part.is_empty() && !part.eq_ignore_ascii_case("x"))
        .collect();

    if raw.is_empty() {
        return format!("Generated_Page_{}", Utc::now().timestamp_millis());
    }

    let parts: Vec<String> = raw
        .into_iter()
        .map(|part| {
            let truncated: String = part.chars().take(config.max_filename_part_len).collect();
            let stripped = DISALLOWED.replace_all(&truncated, "");
            WHITESPACE
                .replace_all(stripped.trim(), "_")
                .into_owned()
        })
        .filter(|part| !part.is_empty())
        .collect();

    if parts.is_empty() {
        return String::new();
    }

    let mut name = parts.join("_");
    if config.add_timestamp {
        name.push('_');
        name.push_str(&Utc::now().format("%Y-%m-%d").to_string());
    }
    name
}

/// Returns the section names requested by the row's flag columns, always in
/// canonical schema order. An empty result means the row requests nothing and
/// should be skipped, not treated as an error.
pub fn identify_sections(row: &SheetRow) -> Vec<&'static str> {
    FLAG_COLUMNS
        .iter()
        .filter(|(column, _)| row.cell(*column).trim().eq_ignore_ascii_case("x"))
        .map(|(_, name)| *name)
        .collect()
}
