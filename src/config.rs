//! Run configuration.
//!
//! CLI arguments (with env fallbacks) are layered over an optional YAML or
//! JSON config file. The result is an immutable [`GeneratorConfig`] threaded
//! through every call. Per-run credential overrides arriving over the
//! command channel produce a fresh value via [`GeneratorConfig::for_run`],
//! never mutation of shared state.

use crate::guard::RetryPolicy;
use crate::layout::LayoutConfig;
use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_RANGE: &str = "Sheet1!A:R";
pub const DEFAULT_SECTION_SPACING: f64 = 250.0;
pub const DEFAULT_PAGE_MARGIN: f64 = 100.0;
/// Large enough that every section of a row stays on one horizontal row.
pub const DEFAULT_SECTIONS_PER_ROW: usize = 999;
pub const DEFAULT_MAX_FILENAME_PART_LEN: usize = 50;
pub const DEFAULT_INTER_ROW_DELAY_MS: u64 = 250;
pub const MASTER_TEMPLATES_PAGE_NAME: &str = "MASTER TEMPLATES";

/// Credential values that documentation templates ship with. Treated as
/// unconfigured.
const PLACEHOLDER_CREDENTIALS: &[&str] = &[
    "YOUR_API_KEY_HERE",
    "YOUR_SPREADSHEET_ID_HERE",
    "CHANGE_ME",
];

#[derive(Parser, Debug, Default, Clone)]
#[command(name = "campaign-forge", about = "Generates design pages from campaign sheet rows", version)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML or JSON)"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "CAMPAIGN_FORGE_API_KEY",
        value_name = "KEY",
        help = "Google Sheets API key"
    )]
    pub api_key: Option<String>,

    #[arg(
        long,
        env = "CAMPAIGN_FORGE_SPREADSHEET_ID",
        value_name = "ID",
        help = "Spreadsheet identifier from the sheet URL"
    )]
    pub spreadsheet_id: Option<String>,

    #[arg(
        long,
        env = "CAMPAIGN_FORGE_RANGE",
        value_name = "RANGE",
        help = "Cell range to read (18-column schema)"
    )]
    pub range: Option<String>,

    #[arg(
        long,
        value_name = "FILE",
        help = "Document snapshot (JSON) to load into the in-memory host"
    )]
    pub document: Option<PathBuf>,

    #[arg(long, help = "Remove the MASTER TEMPLATES page after generation")]
    pub delete_master_templates: bool,

    #[arg(
        long,
        value_name = "N",
        help = "Cursor guard attempt ceiling per acquisition"
    )]
    pub retry_attempts: Option<u32>,

    #[arg(
        long,
        value_name = "MS",
        help = "Cursor guard settle delay in milliseconds"
    )]
    pub settle_delay_ms: Option<u64>,

    #[arg(
        long,
        value_name = "MS",
        help = "Cursor guard verify delay in milliseconds"
    )]
    pub verify_delay_ms: Option<u64>,

    #[arg(
        long,
        value_name = "MS",
        help = "Pause between processed rows in milliseconds"
    )]
    pub inter_row_delay_ms: Option<u64>,
}

/// Immutable configuration for one generator process, and the template for
/// per-run values.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub api_key: Option<String>,
    pub spreadsheet_id: Option<String>,
    pub range: String,
    pub document: Option<PathBuf>,
    pub delete_master_templates: bool,
    pub section_spacing: f64,
    pub page_margin: f64,
    pub sections_per_row: usize,
    pub max_filename_part_len: usize,
    /// Append the generation date to every page name.
    pub add_timestamp: bool,
    pub master_templates_page: String,
    pub inter_row_delay_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            spreadsheet_id: None,
            range: DEFAULT_RANGE.to_string(),
            document: None,
            delete_master_templates: false,
            section_spacing: DEFAULT_SECTION_SPACING,
            page_margin: DEFAULT_PAGE_MARGIN,
            sections_per_row: DEFAULT_SECTIONS_PER_ROW,
            max_filename_part_len: DEFAULT_MAX_FILENAME_PART_LEN,
            add_timestamp: false,
            master_templates_page: MASTER_TEMPLATES_PAGE_NAME.to_string(),
            inter_row_delay_ms: DEFAULT_INTER_ROW_DELAY_MS,
            retry: RetryPolicy::default(),
        }
    }
}

impl GeneratorConfig {
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            config,
            api_key: cli_api_key,
            spreadsheet_id: cli_spreadsheet_id,
            range: cli_range,
            document: cli_document,
            delete_master_templates: cli_delete_master_templates,
            retry_attempts: cli_retry_attempts,
            settle_delay_ms: cli_settle_delay_ms,
            verify_delay_ms: cli_verify_delay_ms,
            inter_row_delay_ms: cli_inter_row_delay_ms,
        } = args;

        let file = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let defaults = Self::default();
        let retry = RetryPolicy {
            max_attempts: cli_retry_attempts
                .or(file.retry_attempts)
                .unwrap_or(defaults.retry.max_attempts)
                .max(1),
            settle_delay_ms: cli_settle_delay_ms
                .or(file.settle_delay_ms)
                .unwrap_or(defaults.retry.settle_delay_ms),
            verify_delay_ms: cli_verify_delay_ms
                .or(file.verify_delay_ms)
                .unwrap_or(defaults.retry.verify_delay_ms),
        };

        let sections_per_row = file
            .sections_per_row
            .unwrap_or(defaults.sections_per_row)
            .max(1);

        Ok(Self {
            api_key: cli_api_key.or(file.api_key),
            spreadsheet_id: cli_spreadsheet_id.or(file.spreadsheet_id),
            range: cli_range.or(file.range).unwrap_or(defaults.range),
            document: cli_document.or(file.document),
            delete_master_templates: cli_delete_master_templates
                || file.delete_master_templates.unwrap_or(false),
            section_spacing: file.section_spacing.unwrap_or(defaults.section_spacing),
            page_margin: file.page_margin.unwrap_or(defaults.page_margin),
            sections_per_row,
            max_filename_part_len: file
                .max_filename_part_len
                .unwrap_or(defaults.max_filename_part_len)
                .max(1),
            add_timestamp: file.add_timestamp.unwrap_or(false),
            master_templates_page: file
                .master_templates_page
                .unwrap_or(defaults.master_templates_page),
            inter_row_delay_ms: cli_inter_row_delay_ms
                .or(file.inter_row_delay_ms)
                .unwrap_or(defaults.inter_row_delay_ms),
            retry,
        })
    }

    /// A fresh config for one run, with credentials and the cleanup flag
    /// taken from the command when present.
    pub fn for_run(
        &self,
        api_key: Option<String>,
        spreadsheet_id: Option<String>,
        delete_master_templates: Option<bool>,
    ) -> Self {
        let mut run = self.clone();
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            run.api_key = Some(key);
        }
        if let Some(id) = spreadsheet_id.filter(|i| !i.trim().is_empty()) {
            run.spreadsheet_id = Some(id);
        }
        if let Some(flag) = delete_master_templates {
            run.delete_master_templates = flag;
        }
        run
    }

    pub fn layout(&self) -> LayoutConfig {
        LayoutConfig {
            margin: self.page_margin,
            spacing: self.section_spacing,
            sections_per_row: self.sections_per_row,
        }
    }

    pub fn inter_row_delay(&self) -> Duration {
        Duration::from_millis(self.inter_row_delay_ms)
    }

    /// Non-fatal configuration problems. Missing or placeholder credentials
    /// only warn: real values may still arrive with a start command.
    pub fn credential_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        match self.api_key.as_deref() {
            None => warnings.push("Google Sheets API key is not configured".to_string()),
            Some(key) if is_placeholder(key) => {
                warnings.push("Google Sheets API key looks like a placeholder value".to_string())
            }
            Some(_) => {}
        }
        match self.spreadsheet_id.as_deref() {
            None => warnings.push("spreadsheet ID is not configured".to_string()),
            Some(id) if is_placeholder(id) => {
                warnings.push("spreadsheet ID looks like a placeholder value".to_string())
            }
            Some(_) => {}
        }
        warnings
    }
}

fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || PLACEHOLDER_CREDENTIALS
            .iter()
            .any(|p| trimmed.eq_ignore_ascii_case(p))
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialConfig {
    api_key: Option<String>,
    spreadsheet_id: Option<String>,
    range: Option<String>,
    document: Option<PathBuf>,
    delete_master_templates: Option<bool>,
    section_spacing: Option<f64>,
    page_margin: Option<f64>,
    sections_per_row: Option<usize>,
    max_filename_part_len: Option<usize>,
    add_timestamp: Option<bool>,
    master_templates_page: Option<String>,
    inter_row_delay_ms: Option<u64>,
    retry_attempts: Option<u32>,
    settle_delay_ms: Option<u64>,
    verify_delay_ms: Option<u64>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_declared_constants() {
        let config = GeneratorConfig::from_args(CliArgs::default()).unwrap();
        assert_eq!(config.range, DEFAULT_RANGE);
        assert_eq!(config.section_spacing, DEFAULT_SECTION_SPACING);
        assert_eq!(config.page_margin, DEFAULT_PAGE_MARGIN);
        assert_eq!(config.sections_per_row, DEFAULT_SECTIONS_PER_ROW);
        assert_eq!(config.retry, RetryPolicy::default());
        assert!(!config.delete_master_templates);
    }

    #[test]
    fn cli_values_override_the_config_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "api_key: from-file").unwrap();
        writeln!(file, "range: Other!A:R").unwrap();
        writeln!(file, "retry_attempts: 3").unwrap();

        let args = CliArgs {
            config: Some(file.path().to_path_buf()),
            api_key: Some("from-cli".to_string()),
            ..CliArgs::default()
        };
        let config = GeneratorConfig::from_args(args).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("from-cli"));
        assert_eq!(config.range, "Other!A:R");
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "api_keyy: oops").unwrap();

        let args = CliArgs {
            config: Some(file.path().to_path_buf()),
            ..CliArgs::default()
        };
        assert!(GeneratorConfig::from_args(args).is_err());
    }

    #[test]
    fn missing_and_placeholder_credentials_only_warn() {
        let config = GeneratorConfig::default();
        assert_eq!(config.credential_warnings().len(), 2);

        let configured = config.for_run(
            Some("real-key".to_string()),
            Some("real-sheet".to_string()),
            None,
        );
        assert!(configured.credential_warnings().is_empty());

        let placeholder = config.for_run(
            Some("YOUR_API_KEY_HERE".to_string()),
            Some("real-sheet".to_string()),
            None,
        );
        assert_eq!(placeholder.credential_warnings().len(), 1);
    }

    #[test]
    fn for_run_ignores_blank_overrides() {
        let base = GeneratorConfig {
            api_key: Some("configured".to_string()),
            ..GeneratorConfig::default()
        };
        let run = base.for_run(Some("   ".to_string()), None, Some(true));
        assert_eq!(run.api_key.as_deref(), Some("configured"));
        assert!(run.delete_master_templates);
    }
}
