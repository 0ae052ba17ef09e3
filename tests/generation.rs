//! End-to-end generation runs against the in-memory host.

use assert_matches::assert_matches;
use async_trait::async_trait;
use campaign_forge::error::{FetchError, GenerateError};
use campaign_forge::host::{DocumentHost, MemoryHost};
use campaign_forge::model::SheetRow;
use campaign_forge::protocol::{Outcome, Phase, Reporter, StatusEvent, StatusKind};
use campaign_forge::sheets::RowSource;
use campaign_forge::{Generator, GeneratorConfig};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Serves a fixed set of rows instead of hitting the sheets API.
struct StaticRows(Result<Vec<Vec<&'static str>>, (u16, &'static str)>);

#[async_trait]
impl RowSource for StaticRows {
    async fn fetch_rows(
        &self,
        _api_key: &str,
        _spreadsheet_id: &str,
        _range: &str,
    ) -> Result<Vec<SheetRow>, FetchError> {
        match &self.0 {
            Ok(rows) => Ok(rows.iter().map(|r| SheetRow::from(r.clone())).collect()),
            Err((status, detail)) => Err(FetchError::Status {
                status: *status,
                detail: (*detail).to_string(),
            }),
        }
    }
}

const HEADER: &[&str] = &["Account", "Trigger", "Key Message", "Dates"];

/// A row with the given identity cells and "x" marks in the given flag
/// columns.
fn data_row(identity: [&'static str; 4], flags: &[usize]) -> Vec<&'static str> {
    let mut cells: Vec<&'static str> = vec![""; 18];
    cells[..4].copy_from_slice(&identity);
    for column in flags {
        cells[*column] = "x";
    }
    cells
}

fn template_host(template_page_name: &str) -> Arc<MemoryHost> {
    let host = MemoryHost::new();
    let template = host.create_page(template_page_name);
    host.add_section(template, "Push", 120.0, 60.0);
    host.add_section(template, "Ring-NewB", 200.0, 100.0);
    host.add_section(template, "Email", 300.0, 150.0);
    Arc::new(host)
}

fn generator(
    host: Arc<MemoryHost>,
    rows: Vec<Vec<&'static str>>,
) -> (Generator, mpsc::UnboundedReceiver<StatusEvent>) {
    let (reporter, rx) = Reporter::channel();
    let generator = Generator::new(
        host,
        Arc::new(StaticRows(Ok(rows))),
        reporter,
        CancellationToken::new(),
    );
    (generator, rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<StatusEvent>) -> Vec<StatusEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn run_creates_one_page_per_flagged_row() {
    let host = template_host("Source_Template");
    let rows = vec![
        HEADER.to_vec(),
        data_row(["Acme", "Welcome", "50% off", "Jan"], &[4, 13]),
        data_row(["Beta", "Lapsed", "", ""], &[5]),
        // No flags: skipped, not failed.
        data_row(["Gamma", "Quiet", "", ""], &[]),
    ];
    let (generator, mut rx) = generator(host.clone(), rows);

    let summary = generator.run(&GeneratorConfig::default()).await.unwrap();
    assert_eq!(summary.pages_created, 2);
    assert_eq!(summary.rows_skipped, 1);
    assert_eq!(summary.rows_failed, 0);
    assert_eq!(summary.section_failures, 0);

    let first = host.page_by_name("Acme_Welcome_50_off_Jan").unwrap();
    assert_eq!(host.children(first).len(), 2);
    assert!(host.page_by_name("Beta_Lapsed").is_some());

    // The scratch page is gone and the first created page is active.
    assert!(host.page_by_name("_TEMP_WORKING_PAGE").is_none());
    assert_eq!(host.active(), first);

    let events = drain(&mut rx);
    let success = events
        .iter()
        .find(|e| e.kind == StatusKind::Success)
        .expect("summary event");
    assert_eq!(success.summary.as_ref().unwrap().pages_created, 2);
}

#[tokio::test(start_paused = true)]
async fn sections_are_packed_in_canonical_order() {
    let host = template_host("Source_Template");
    // Email (col 13) flagged "first" in the sheet makes no difference: Push
    // and Ring-NewB come before it in the schema.
    let rows = vec![
        HEADER.to_vec(),
        data_row(["Acme", "", "", ""], &[13, 5, 4]),
    ];
    let (generator, _rx) = generator(host.clone(), rows);
    generator.run(&GeneratorConfig::default()).await.unwrap();

    let page = host.page_by_name("Acme").unwrap();
    let children = host.children(page);
    let names: Vec<String> = children
        .iter()
        .filter_map(|c| host.node_name(*c))
        .collect();
    assert_eq!(names, vec!["Push", "Ring-NewB", "Email"]);

    // margin, then prefix sums of width + spacing.
    assert_eq!(host.node_position(children[0]), Some((100.0, 100.0)));
    assert_eq!(
        host.node_position(children[1]),
        Some((100.0 + 120.0 + 250.0, 100.0))
    );
    assert_eq!(
        host.node_position(children[2]),
        Some((100.0 + 120.0 + 250.0 + 200.0 + 250.0, 100.0))
    );
}

#[tokio::test(start_paused = true)]
async fn missing_template_yields_placeholder_and_row_still_succeeds() {
    let host = Arc::new(MemoryHost::new());
    let template = host.create_page("Source_Template");
    host.add_section(template, "Push", 120.0, 60.0);

    // Requests Push (exists) and Email (missing from the catalog).
    let rows = vec![HEADER.to_vec(), data_row(["Acme", "", "", ""], &[4, 13])];
    let (generator, mut rx) = generator(host.clone(), rows);

    let summary = generator.run(&GeneratorConfig::default()).await.unwrap();
    assert_eq!(summary.pages_created, 1);
    assert_eq!(summary.rows_failed, 0);
    assert_eq!(summary.section_failures, 1);

    let page = host.page_by_name("Acme").unwrap();
    // One real clone plus one placeholder frame.
    assert_eq!(host.children(page).len(), 2);

    let events = drain(&mut rx);
    let section_failure = events
        .iter()
        .filter_map(|e| e.event.as_ref())
        .find(|e| e.phase == Phase::Section && e.outcome == Outcome::Failed)
        .expect("structured section failure");
    assert_eq!(section_failure.section.as_deref(), Some("Email"));
    assert_eq!(section_failure.row_index, Some(1));
}

#[tokio::test(start_paused = true)]
async fn unsettleable_active_pointer_fails_rows_without_crashing_the_run() {
    let host = template_host("Source_Template");
    host.deny_activation();
    let rows = vec![HEADER.to_vec(), data_row(["Acme", "", "", ""], &[4])];
    let (generator, mut rx) = generator(host.clone(), rows);

    let summary = generator.run(&GeneratorConfig::default()).await.unwrap();
    assert_eq!(summary.rows_failed, 1);
    assert_eq!(summary.pages_created, 0);
    assert!(host.page_by_name("Acme").is_none());

    let events = drain(&mut rx);
    let row_failure = events
        .iter()
        .filter_map(|e| e.event.as_ref())
        .find(|e| e.phase == Phase::Row && e.outcome == Outcome::Failed)
        .expect("structured row failure");
    assert_eq!(row_failure.row_index, Some(1));
}

#[tokio::test(start_paused = true)]
async fn duplicate_template_sections_warn_but_generate() {
    let host = Arc::new(MemoryHost::new());
    let template = host.create_page("Source_Template");
    host.add_section(template, "Push", 120.0, 60.0);
    host.add_section(template, "Email", 300.0, 150.0);
    host.add_section(template, "Push", 999.0, 999.0);

    let rows = vec![HEADER.to_vec(), data_row(["Acme", "", "", ""], &[4])];
    let (generator, _rx) = generator(host.clone(), rows);

    let summary = generator.run(&GeneratorConfig::default()).await.unwrap();
    assert_eq!(summary.duplicate_sections, 1);
    assert_eq!(summary.pages_created, 1);

    // First occurrence won: the clone has the original footprint.
    let page = host.page_by_name("Acme").unwrap();
    let clone = host.children(page)[0];
    assert_eq!(host.node_size(clone), Some((120.0, 60.0)));
}

#[tokio::test(start_paused = true)]
async fn master_templates_cleanup_runs_after_successful_generation() {
    let host = template_host("MASTER TEMPLATES");
    let rows = vec![HEADER.to_vec(), data_row(["Acme", "", "", ""], &[4])];
    let (generator, _rx) = generator(host.clone(), rows);

    let config = GeneratorConfig {
        delete_master_templates: true,
        ..GeneratorConfig::default()
    };
    let summary = generator.run(&config).await.unwrap();
    assert_eq!(summary.pages_created, 1);
    assert!(host.page_by_name("MASTER TEMPLATES").is_none());
    assert!(host.page_by_name("Acme").is_some());
}

#[tokio::test(start_paused = true)]
async fn cleanup_is_skipped_when_nothing_was_generated() {
    let host = template_host("MASTER TEMPLATES");
    // One data row with no flags: run succeeds but creates nothing.
    let rows = vec![HEADER.to_vec(), data_row(["Acme", "", "", ""], &[])];
    let (generator, mut rx) = generator(host.clone(), rows);

    let config = GeneratorConfig {
        delete_master_templates: true,
        ..GeneratorConfig::default()
    };
    generator.run(&config).await.unwrap();
    assert!(host.page_by_name("MASTER TEMPLATES").is_some());

    let events = drain(&mut rx);
    assert!(
        events
            .iter()
            .any(|e| e.kind == StatusKind::Warning && e.message.contains("no pages were created"))
    );
}

#[tokio::test(start_paused = true)]
async fn fetch_errors_abort_the_run() {
    let host = template_host("Source_Template");
    let (reporter, _rx) = Reporter::channel();
    let generator = Generator::new(
        host.clone(),
        Arc::new(StaticRows(Err((403, "The caller does not have permission")))),
        reporter,
        CancellationToken::new(),
    );

    let err = generator.run(&GeneratorConfig::default()).await.unwrap_err();
    assert_matches!(
        err,
        GenerateError::Fetch(FetchError::Status { status: 403, .. })
    );
    // The scratch page does not leak.
    assert!(host.page_by_name("_TEMP_WORKING_PAGE").is_none());
}

#[tokio::test(start_paused = true)]
async fn unusable_identity_cells_fail_the_row_instead_of_naming_a_page_nothing() {
    let host = template_host("Source_Template");
    // The identity cells carry data, but nothing survives sanitization.
    let rows = vec![HEADER.to_vec(), data_row(["!!!", "???", "", ""], &[4])];
    let (generator, mut rx) = generator(host.clone(), rows);

    let summary = generator.run(&GeneratorConfig::default()).await.unwrap();
    assert_eq!(summary.rows_failed, 1);
    assert_eq!(summary.pages_created, 0);
    assert!(host.page_by_name("").is_none());

    let events = drain(&mut rx);
    let row_failure = events
        .iter()
        .filter_map(|e| e.event.as_ref())
        .find(|e| e.phase == Phase::Row && e.outcome == Outcome::Failed)
        .expect("structured row failure");
    assert_eq!(row_failure.row_index, Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_connection_reports_row_count_or_empty_sheet() {
    let host = template_host("Source_Template");
    let rows = vec![HEADER.to_vec(), data_row(["Acme", "", "", ""], &[4])];
    let (generator, _rx) = generator(host.clone(), rows);
    let count = generator
        .test_connection(&GeneratorConfig::default())
        .await
        .unwrap();
    assert_eq!(count, 2);

    let (reporter, _rx) = Reporter::channel();
    let empty = Generator::new(
        host,
        Arc::new(StaticRows(Ok(vec![]))),
        reporter,
        CancellationToken::new(),
    );
    let err = empty
        .test_connection(&GeneratorConfig::default())
        .await
        .unwrap_err();
    assert_matches!(err, FetchError::NoData);
}

#[tokio::test(start_paused = true)]
async fn header_only_sheets_are_no_rows() {
    let host = template_host("Source_Template");
    let (generator, _rx) = generator(host.clone(), vec![HEADER.to_vec()]);
    let err = generator.run(&GeneratorConfig::default()).await.unwrap_err();
    assert_matches!(err, GenerateError::NoRows);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_the_run_between_rows() {
    let host = template_host("Source_Template");
    let rows = vec![HEADER.to_vec(), data_row(["Acme", "", "", ""], &[4])];
    let (reporter, _rx) = Reporter::channel();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let generator = Generator::new(host.clone(), Arc::new(StaticRows(Ok(rows))), reporter, cancel);

    let err = generator.run(&GeneratorConfig::default()).await.unwrap_err();
    assert_matches!(err, GenerateError::Cancelled);
    assert!(host.page_by_name("Acme").is_none());
}

#[tokio::test(start_paused = true)]
async fn standalone_master_templates_deletion() {
    let host = template_host("MASTER TEMPLATES");
    let master = host.page_by_name("MASTER TEMPLATES").unwrap();
    host.set_active(master);

    let (reporter, mut rx) = Reporter::channel();
    let generator = Generator::new(
        host.clone(),
        Arc::new(StaticRows(Ok(vec![]))),
        reporter,
        CancellationToken::new(),
    );
    generator.delete_master_templates(&GeneratorConfig::default());

    assert!(host.page_by_name("MASTER TEMPLATES").is_none());
    // The active pointer was parked elsewhere before removal.
    assert_ne!(host.active(), master);
    let events = drain(&mut rx);
    assert!(events.iter().any(|e| e.kind == StatusKind::Success));
}

#[tokio::test(start_paused = true)]
async fn deleting_a_missing_master_page_reports_an_error() {
    let host = Arc::new(MemoryHost::new());
    let (reporter, mut rx) = Reporter::channel();
    let generator = Generator::new(
        host,
        Arc::new(StaticRows(Ok(vec![]))),
        reporter,
        CancellationToken::new(),
    );
    generator.delete_master_templates(&GeneratorConfig::default());

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| e.kind == StatusKind::Error));
}
