//! Domain types shared across the generation pipeline.

use crate::host::NodeId;
use serde::{Deserialize, Serialize};

/// Columns 0-3 identify the campaign row and feed the generated page name.
pub const IDENTITY_COLUMNS: usize = 4;

/// The comment column. Never interpreted.
pub const COMMENT_COLUMN: usize = 17;

/// Total columns in the fixed sheet schema (range `A:R`).
pub const SHEET_COLUMNS: usize = 18;

/// The 13 flag columns in canonical schema order, paired with the template
/// section each one requests. An "x" in the cell (case-insensitive, trimmed)
/// includes that section on the generated page. Section order on the page
/// follows this table, not cell order in the sheet.
pub const FLAG_COLUMNS: &[(usize, &str)] = &[
    (4, "Push"),
    (5, "Ring-NewB"),
    (6, "Rides-Interstitial"),
    (7, "Eats-Interstitial"),
    (8, "Rides-Masthead"),
    (9, "Eats-Masthead"),
    (10, "Eats-Billboard"),
    (11, "Email-Module"),
    (12, "LandingPage"),
    (13, "Email"),
    (14, "Ucraft"),
    (15, "Partner-Rewards-Hub"),
    (16, "Eats-Storefront-Ring"),
];

/// One data row from the sheet. Cells are kept as raw strings; interpretation
/// happens in [`crate::row`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRow(pub Vec<String>);

impl SheetRow {
    pub fn new(cells: Vec<String>) -> Self {
        Self(cells)
    }

    /// The cell at `index`, or the empty string for short rows. The values
    /// API omits trailing empty cells.
    pub fn cell(&self, index: usize) -> &str {
        self.0.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|cell| cell.trim().is_empty())
    }
}

impl From<Vec<&str>> for SheetRow {
    fn from(cells: Vec<&str>) -> Self {
        Self(cells.into_iter().map(str::to_string).collect())
    }
}

/// One named template fragment from the template page, unique by name within
/// a catalog.
#[derive(Debug, Clone)]
pub struct TemplateSection {
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub node: NodeId,
}

/// A section clone placed on a generated page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedSection {
    pub section_name: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Why a requested section could not be placed for real. Each reason gets a
/// placeholder frame on the page instead of silently vanishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// No template section with the requested name exists in the catalog.
    TemplateMissing,
    /// The clone kept landing on the wrong parent, even after one retry.
    CloneMisparented,
    /// The clone left the target page after being appended to it.
    AppendMisparented,
    /// The active page never settled on the target before the clone.
    ActivePageLost,
}

impl FailureReason {
    /// Text written into the placeholder frame.
    pub fn placeholder_label(&self) -> &'static str {
        match self {
            FailureReason::TemplateMissing => "Section not found in source file",
            FailureReason::CloneMisparented => "Clone kept landing on the wrong page",
            FailureReason::AppendMisparented => "Clone left the target page after append",
            FailureReason::ActivePageLost => "Active page never settled on the target",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::TemplateMissing => write!(f, "template_missing"),
            FailureReason::CloneMisparented => write!(f, "clone_misparented"),
            FailureReason::AppendMisparented => write!(f, "append_misparented"),
            FailureReason::ActivePageLost => write!(f, "active_page_lost"),
        }
    }
}

/// Per-section failure inside an otherwise successful row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionFailure {
    pub section_name: String,
    pub reason: FailureReason,
}

/// The per-row output artifact: a page plus the accounting of what landed on
/// it. A page with failures is still a success; failure accounting is
/// per-section, not per-row.
#[derive(Debug, Clone)]
pub struct AssembledPage {
    pub page: NodeId,
    pub name: String,
    pub placed: Vec<PlacedSection>,
    pub failures: Vec<SectionFailure>,
}

/// End-of-run accounting, reported in the final summary message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub pages_created: usize,
    pub rows_failed: usize,
    pub rows_skipped: usize,
    pub section_failures: usize,
    pub duplicate_sections: usize,
    pub fonts_failed: usize,
}
