//! Template section discovery and font preloading.

use crate::error::CatalogError;
use crate::host::{DocumentHost, FontRef, NodeId, NodeKind};
use crate::model::TemplateSection;
use indexmap::{IndexMap, IndexSet};

/// Page names recognized as the template container. The first top-level page
/// matching either alias wins.
pub const TEMPLATE_PAGE_ALIASES: &[&str] = &["Source_Template", "MASTER TEMPLATES"];

/// Ordered, name-unique view of the template page's sections. Loaded once per
/// run and shared read-only afterwards.
#[derive(Debug)]
pub struct SectionCatalog {
    sections: IndexMap<String, TemplateSection>,
    /// Section-typed children dropped because their name was already taken.
    pub duplicates: usize,
    pub template_page: NodeId,
}

impl SectionCatalog {
    pub fn get(&self, name: &str) -> Option<&TemplateSection> {
        self.sections.get(name)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TemplateSection> {
        self.sections.values()
    }
}

/// What font preloading accomplished. Failures are warnings, never fatal:
/// the host falls back to a default rendering font when cloning.
#[derive(Debug, Default)]
pub struct FontPreloadReport {
    pub loaded: usize,
    pub failed: Vec<FontRef>,
}

/// Finds the template page, collects its unique sections, and preloads every
/// font they reference so later clones never block on font I/O.
pub async fn load_catalog(
    host: &dyn DocumentHost,
) -> Result<(SectionCatalog, FontPreloadReport), CatalogError> {
    let catalog = scan_sections(host)?;
    let fonts = preload_fonts(host, &catalog).await;
    Ok((catalog, fonts))
}

/// Section discovery only. Scans direct children of the template page;
/// nested sections are invisible by design of the template layout.
pub fn scan_sections(host: &dyn DocumentHost) -> Result<SectionCatalog, CatalogError> {
    let template_page = host
        .pages()
        .into_iter()
        .find(|page| {
            host.node_name(*page)
                .is_some_and(|name| TEMPLATE_PAGE_ALIASES.contains(&name.as_str()))
        })
        .ok_or(CatalogError::TemplatePageNotFound)?;
    let page_name = host
        .node_name(template_page)
        .unwrap_or_else(|| template_page.to_string());

    let mut sections = IndexMap::new();
    let mut duplicates = 0;
    for child in host.children(template_page) {
        if host.node_kind(child) != Some(NodeKind::Section) {
            continue;
        }
        let Some(name) = host.node_name(child) else {
            continue;
        };
        let Some((width, height)) = host.node_size(child) else {
            continue;
        };
        if sections.contains_key(&name) {
            duplicates += 1;
            tracing::warn!(
                section = %name,
                page = %page_name,
                "duplicate section in template page, keeping the first occurrence"
            );
            continue;
        }
        sections.insert(
            name.clone(),
            TemplateSection {
                name,
                width,
                height,
                node: child,
            },
        );
    }

    if sections.is_empty() {
        return Err(CatalogError::NoSections { page: page_name });
    }

    tracing::info!(
        page = %page_name,
        sections = sections.len(),
        duplicates,
        "section catalog loaded"
    );
    Ok(SectionCatalog {
        sections,
        duplicates,
        template_page,
    })
}

/// Loads each distinct (family, style) pair referenced by the catalog exactly
/// once.
pub async fn preload_fonts(
    host: &dyn DocumentHost,
    catalog: &SectionCatalog,
) -> FontPreloadReport {
    let mut fonts: IndexSet<FontRef> = IndexSet::new();
    for section in catalog.iter() {
        fonts.extend(host.section_fonts(section.node));
    }

    let mut report = FontPreloadReport::default();
    for font in fonts {
        match host.load_font(&font).await {
            Ok(()) => report.loaded += 1,
            Err(err) => {
                tracing::warn!(font = %err.font, "font preload failed, host will fall back");
                report.failed.push(font);
            }
        }
    }
    report
}
