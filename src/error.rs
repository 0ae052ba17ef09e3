//! Error taxonomy for the generation pipeline.
//!
//! Severity follows the propagation policy: fetch and catalog problems abort
//! the whole run, row problems skip one row, section problems are recorded as
//! [`crate::model::SectionFailure`] data rather than errors. Configuration
//! problems are warnings only, since credentials may still arrive over the
//! command channel.

use thiserror::Error;

/// Fatal problems locating or reading the template catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(
        "template page not found; create a page named \"Source_Template\" or \
         \"MASTER TEMPLATES\" holding the template sections"
    )]
    TemplatePageNotFound,

    #[error("template page {page:?} contains no sections")]
    NoSections { page: String },
}

/// Fatal problems fetching sheet data.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Non-2xx response. Carries the response body as detail.
    #[error("sheets API error ({status}): {detail}")]
    Status { status: u16, detail: String },

    #[error("sheets API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The request succeeded but the range holds no rows at all.
    #[error("no data found in sheet")]
    NoData,
}

/// The cursor guard exhausted its retry budget without the active page
/// settling on the target.
#[derive(Debug, Error)]
#[error("active page never settled on {target:?} after {attempts} attempts")]
pub struct GuardError {
    pub target: String,
    pub attempts: u32,
}

/// A single row could not produce a page. The run continues past it.
#[derive(Debug, Error)]
pub enum RowError {
    #[error("could not derive a page name from row data")]
    EmptyPageName,

    #[error("could not lock the active page onto {page:?}: {source}")]
    PageLock {
        page: String,
        #[source]
        source: GuardError,
    },
}

/// Run-level failure. Anything here aborts the whole generation run.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("no data rows found in the configured range")]
    NoRows,

    #[error("generation cancelled")]
    Cancelled,
}
