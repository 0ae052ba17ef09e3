//! Page assembly: turns one row's requested section names into a generated
//! page of positioned clones.
//!
//! Every mutating step runs under the cursor guard. The page-level lock is
//! acquired once up front; each clone re-acquires it because the host can
//! displace the active pointer between sections. Failure accounting is
//! per-section: a missing template or a misbehaving clone produces a
//! placeholder and a recorded failure, never a row abort. Only failing to
//! lock the fresh page at all kills the row, and then no partial page is
//! left behind.

use crate::catalog::SectionCatalog;
use crate::config::GeneratorConfig;
use crate::error::RowError;
use crate::guard;
use crate::host::{DocumentHost, NodeId};
use crate::layout::LayoutCursor;
use crate::model::{
    AssembledPage, FailureReason, PlacedSection, SectionFailure, TemplateSection,
};

/// Footprint reserved for a placeholder frame.
pub const PLACEHOLDER_WIDTH: f64 = 300.0;
pub const PLACEHOLDER_HEIGHT: f64 = 200.0;

/// Assembles one page. `section_names` must already be in canonical order.
pub async fn assemble_page(
    host: &dyn DocumentHost,
    catalog: &SectionCatalog,
    page_name: &str,
    section_names: &[&str],
    config: &GeneratorConfig,
) -> Result<AssembledPage, RowError> {
    let page = host.create_page(page_name);

    if let Err(source) = guard::acquire(host, page, config.retry).await {
        // No partial page: the row aborts before anything landed on it.
        host.remove_node(page);
        return Err(RowError::PageLock {
            page: page_name.to_string(),
            source,
        });
    }

    let mut cursor = LayoutCursor::new(config.layout());
    let mut placed = Vec::new();
    let mut failures = Vec::new();

    for name in section_names {
        match catalog.get(name) {
            None => {
                tracing::warn!(section = %name, page = %page_name, "template missing");
                record_failure(
                    host,
                    page,
                    name,
                    FailureReason::TemplateMissing,
                    &mut cursor,
                    &mut failures,
                );
            }
            Some(section) => match place_section(host, section, page, config, &mut cursor).await {
                Ok(placement) => placed.push(placement),
                Err(reason) => {
                    tracing::warn!(section = %name, page = %page_name, %reason, "section failed");
                    record_failure(host, page, name, reason, &mut cursor, &mut failures);
                }
            },
        }
    }

    Ok(AssembledPage {
        page,
        name: page_name.to_string(),
        placed,
        failures,
    })
}

/// Clones one section onto `page` at the cursor position and advances the
/// cursor. Returns the failure reason when the clone cannot be trusted to
/// live on the target page.
async fn place_section(
    host: &dyn DocumentHost,
    section: &TemplateSection,
    page: NodeId,
    config: &GeneratorConfig,
    cursor: &mut LayoutCursor,
) -> Result<PlacedSection, FailureReason> {
    // The host may have displaced the active pointer since the last section.
    guard::acquire(host, page, config.retry)
        .await
        .map_err(|_| FailureReason::ActivePageLost)?;

    let clone = clone_onto(host, section, page)?;

    let (x, y) = cursor.position();
    host.set_position(clone, x, y);
    host.append_to_page(clone, page);
    if host.parent(clone) != Some(page) {
        host.remove_node(clone);
        return Err(FailureReason::AppendMisparented);
    }

    cursor.advance(section.width, section.height);
    Ok(PlacedSection {
        section_name: section.name.clone(),
        x,
        y,
        width: section.width,
        height: section.height,
    })
}

/// Clones the section, tolerating exactly one wrong-parent landing.
fn clone_onto(
    host: &dyn DocumentHost,
    section: &TemplateSection,
    page: NodeId,
) -> Result<NodeId, FailureReason> {
    for _ in 0..2 {
        let clone = host.clone_section(section.node);
        if host.parent(clone) == Some(page) {
            return Ok(clone);
        }
        tracing::debug!(section = %section.name, "clone landed on the wrong parent, retrying");
        host.remove_node(clone);
    }
    Err(FailureReason::CloneMisparented)
}

fn record_failure(
    host: &dyn DocumentHost,
    page: NodeId,
    section_name: &str,
    reason: FailureReason,
    cursor: &mut LayoutCursor,
    failures: &mut Vec<SectionFailure>,
) {
    let (x, y) = cursor.position();
    host.create_placeholder(
        page,
        section_name,
        reason.placeholder_label(),
        x,
        y,
        PLACEHOLDER_WIDTH,
        PLACEHOLDER_HEIGHT,
    );
    cursor.advance(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT);
    failures.push(SectionFailure {
        section_name: section_name.to_string(),
        reason,
    });
}
