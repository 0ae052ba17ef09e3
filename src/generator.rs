//! Run orchestration: one generation run from command to summary.
//!
//! Row processing is strictly sequential. A fixed delay separates rows to
//! give the host's internal state time to settle, and cancellation is
//! checked between rows only. A row in flight always finishes or fails on
//! its own terms.

use crate::assembler::assemble_page;
use crate::catalog::load_catalog;
use crate::config::GeneratorConfig;
use crate::error::{FetchError, GenerateError, RowError};
use crate::host::{DocumentHost, NodeId};
use crate::model::{RunSummary, SheetRow};
use crate::protocol::{Outcome, Phase, Reporter, RunEvent, StatusEvent, StatusKind};
use crate::row::{generate_file_name, identify_sections};
use crate::sheets::RowSource;
use std::sync::Arc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Name of the scratch page the run works from so that no row mutation ever
/// starts while a template page is active.
const TEMP_WORKING_PAGE: &str = "_TEMP_WORKING_PAGE";

pub struct Generator {
    host: Arc<dyn DocumentHost>,
    rows: Arc<dyn RowSource>,
    reporter: Reporter,
    cancel: CancellationToken,
}

impl Generator {
    pub fn new(
        host: Arc<dyn DocumentHost>,
        rows: Arc<dyn RowSource>,
        reporter: Reporter,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            host,
            rows,
            reporter,
            cancel,
        }
    }

    /// Runs one full generation pass. Fatal errors abort the run; per-row and
    /// per-section problems are reported and counted but never abort.
    pub async fn run(&self, config: &GeneratorConfig) -> Result<RunSummary, GenerateError> {
        let host = self.host.as_ref();
        let mut summary = RunSummary::default();

        self.reporter.status("Validating configuration...");
        for warning in config.credential_warnings() {
            self.reporter.send(
                StatusEvent::new(StatusKind::Warning, warning)
                    .with_event(RunEvent::new(Phase::Validate, Outcome::Completed)),
            );
        }

        self.reporter.status("Looking for template sections...");
        let (catalog, fonts) = load_catalog(host).await?;
        summary.duplicate_sections = catalog.duplicates;
        summary.fonts_failed = fonts.failed.len();
        self.reporter.send(
            StatusEvent::new(
                StatusKind::Status,
                format!("Found {} sections in the template page", catalog.len()),
            )
            .with_event(RunEvent::new(Phase::Catalog, Outcome::Completed)),
        );
        if catalog.duplicates > 0 {
            self.reporter.warning(format!(
                "Found {} duplicate sections in the template page; kept the first of each. \
                 Please clean up the duplicates manually.",
                catalog.duplicates
            ));
        }
        self.reporter.send(
            StatusEvent::new(
                StatusKind::Status,
                format!("Preloaded {} fonts from templates", fonts.loaded),
            )
            .with_event(RunEvent::new(Phase::Fonts, Outcome::Completed)),
        );
        for font in &fonts.failed {
            self.reporter
                .warning(format!("Could not preload font {font}"));
        }

        // Park the active pointer on a scratch page so no mutation can start
        // while a template page is active. Best effort: the page-level guard
        // still runs before every row.
        let temp_page = host.create_page(TEMP_WORKING_PAGE);
        host.set_active(temp_page);

        self.reporter.status("Fetching data from Google Sheets...");
        let api_key = config.api_key.clone().unwrap_or_default();
        let spreadsheet_id = config.spreadsheet_id.clone().unwrap_or_default();
        let all_rows = match self
            .rows
            .fetch_rows(&api_key, &spreadsheet_id, &config.range)
            .await
        {
            Ok(rows) => rows,
            Err(err) => {
                self.remove_temp_page(temp_page, &[]);
                return Err(err.into());
            }
        };

        // Row 0 is the header.
        let data_rows: Vec<&SheetRow> = all_rows
            .iter()
            .skip(1)
            .filter(|row| !row.is_empty())
            .collect();
        if data_rows.is_empty() {
            self.remove_temp_page(temp_page, &[]);
            return Err(GenerateError::NoRows);
        }
        self.reporter.send(
            StatusEvent::new(
                StatusKind::Status,
                format!(
                    "Found {} rows to process. Starting generation...",
                    data_rows.len()
                ),
            )
            .with_event(RunEvent::new(Phase::Fetch, Outcome::Completed)),
        );

        let mut created_pages: Vec<NodeId> = Vec::new();
        for (index, sheet_row) in data_rows.iter().enumerate() {
            if self.cancel.is_cancelled() {
                self.reporter.warning("Generation cancelled");
                self.remove_temp_page(temp_page, &created_pages);
                return Err(GenerateError::Cancelled);
            }

            let row_number = index + 1;
            let sections = identify_sections(sheet_row);

            if sections.is_empty() {
                tracing::debug!(row = row_number, "no sections flagged, skipping row");
                summary.rows_skipped += 1;
                self.reporter.send(
                    StatusEvent::new(
                        StatusKind::Status,
                        format!("Row {row_number}: no sections marked, skipped"),
                    )
                    .with_event(RunEvent::new(Phase::Row, Outcome::Skipped).row(row_number)),
                );
                continue;
            }

            let page_name = generate_file_name(sheet_row, config);
            if page_name.is_empty() {
                summary.rows_failed += 1;
                self.reporter.send(
                    StatusEvent::new(
                        StatusKind::Warning,
                        format!("Row {row_number} failed: {}", RowError::EmptyPageName),
                    )
                    .with_event(RunEvent::new(Phase::Row, Outcome::Failed).row(row_number)),
                );
                continue;
            }

            self.reporter.status(format!(
                "Processing row {row_number} of {}: {page_name}",
                data_rows.len()
            ));

            match assemble_page(host, &catalog, &page_name, &sections, config).await {
                Ok(page) => {
                    summary.pages_created += 1;
                    summary.section_failures += page.failures.len();
                    for failure in &page.failures {
                        self.reporter.send(
                            StatusEvent::new(
                                StatusKind::Warning,
                                format!(
                                    "Row {row_number}: section \"{}\" failed ({})",
                                    failure.section_name, failure.reason
                                ),
                            )
                            .with_event(
                                RunEvent::new(Phase::Section, Outcome::Failed)
                                    .row(row_number)
                                    .section(failure.section_name.clone()),
                            ),
                        );
                    }
                    self.reporter.send(
                        StatusEvent::new(
                            StatusKind::Status,
                            format!(
                                "Row {row_number}: created \"{}\" with {} sections",
                                page.name,
                                page.placed.len()
                            ),
                        )
                        .with_event(RunEvent::new(Phase::Row, Outcome::Completed).row(row_number)),
                    );
                    created_pages.push(page.page);
                }
                Err(err) => {
                    summary.rows_failed += 1;
                    self.reporter.send(
                        StatusEvent::new(
                            StatusKind::Warning,
                            format!("Row {row_number} failed: {err}"),
                        )
                        .with_event(RunEvent::new(Phase::Row, Outcome::Failed).row(row_number)),
                    );
                }
            }

            // Breathing room for the host before the next page switch.
            sleep(config.inter_row_delay()).await;
        }

        if config.delete_master_templates {
            if created_pages.is_empty() {
                self.reporter.warning(
                    "Could not clean up the MASTER TEMPLATES page - no pages were created",
                );
            } else {
                self.reporter.status("Cleaning up template pages...");
                self.cleanup_master_templates(config, created_pages[0]);
            }
        }

        self.reporter.status("Cleaning up temporary working page...");
        self.remove_temp_page(temp_page, &created_pages);

        let mut message = format!(
            "Generation complete! {} pages created successfully",
            summary.pages_created
        );
        if summary.rows_failed > 0 {
            message.push_str(&format!(", {} rows failed", summary.rows_failed));
        }
        if summary.section_failures > 0 {
            message.push_str(&format!(
                ", {} sections substituted with placeholders",
                summary.section_failures
            ));
        }
        self.reporter.send(
            StatusEvent::new(StatusKind::Success, message)
                .with_event(RunEvent::new(Phase::Summary, Outcome::Completed))
                .with_summary(summary.clone()),
        );

        Ok(summary)
    }

    /// Fetches the sheet and reports how many rows it holds.
    pub async fn test_connection(&self, config: &GeneratorConfig) -> Result<usize, FetchError> {
        self.reporter.status("Testing Google Sheets connection...");
        let api_key = config.api_key.clone().unwrap_or_default();
        let spreadsheet_id = config.spreadsheet_id.clone().unwrap_or_default();
        let rows = self
            .rows
            .fetch_rows(&api_key, &spreadsheet_id, &config.range)
            .await?;
        if rows.is_empty() {
            return Err(FetchError::NoData);
        }
        self.reporter.success(format!(
            "Connection successful! Found {} rows",
            rows.len()
        ));
        Ok(rows.len())
    }

    /// Standalone master-templates removal, requested over the command
    /// channel.
    pub fn delete_master_templates(&self, config: &GeneratorConfig) {
        self.reporter
            .status("Looking for MASTER TEMPLATES page...");
        let Some(master) = self.find_page(&config.master_templates_page) else {
            self.reporter.error("MASTER TEMPLATES page not found");
            return;
        };

        if self.host.active() == master {
            let Some(other) = self.host.pages().into_iter().find(|p| *p != master) else {
                self.reporter
                    .error("Cannot delete MASTER TEMPLATES page - no other pages available");
                return;
            };
            self.host.set_active(other);
        }

        if self.host.remove_node(master) {
            self.reporter.send(
                StatusEvent::new(
                    StatusKind::Success,
                    "MASTER TEMPLATES page deleted successfully",
                )
                .with_event(RunEvent::new(Phase::Cleanup, Outcome::Completed)),
            );
        } else {
            self.reporter
                .error("Failed to delete MASTER TEMPLATES page");
        }
    }

    fn cleanup_master_templates(&self, config: &GeneratorConfig, fallback: NodeId) {
        let Some(master) = self.find_page(&config.master_templates_page) else {
            tracing::debug!("no MASTER TEMPLATES page to remove");
            return;
        };
        if self.host.active() == master {
            self.host.set_active(fallback);
        }
        if self.host.remove_node(master) {
            self.reporter.send(
                StatusEvent::new(StatusKind::Status, "Removed MASTER TEMPLATES page")
                    .with_event(RunEvent::new(Phase::Cleanup, Outcome::Completed)),
            );
        } else {
            self.reporter
                .warning("Could not remove MASTER TEMPLATES page");
        }
    }

    /// Removes the scratch page, parking the active pointer on the first
    /// created page when there is one. If the scratch page is the only page
    /// left the host will refuse and it stays behind.
    fn remove_temp_page(&self, temp_page: NodeId, created_pages: &[NodeId]) {
        let next_active = created_pages.first().copied().or_else(|| {
            self.host
                .pages()
                .into_iter()
                .find(|page| *page != temp_page)
        });
        if let Some(page) = next_active {
            self.host.set_active(page);
        }
        self.host.remove_node(temp_page);
    }

    fn find_page(&self, name: &str) -> Option<NodeId> {
        self.host.pages().into_iter().find(|page| {
            self.host
                .node_name(*page)
                .is_some_and(|page_name| page_name == name)
        })
    }
}
