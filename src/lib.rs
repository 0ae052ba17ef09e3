//! campaign-forge: generates design-document pages from marketing-campaign
//! spreadsheet rows.
//!
//! Each data row selects a set of named template sections via "x" marks; the
//! generator clones those sections from a template page onto a fresh page,
//! packed left to right with fixed spacing. Every mutation of the host's
//! global active-page pointer goes through the cursor guard in [`guard`],
//! which retries until the eventually-consistent pointer is observed stable.

pub mod assembler;
pub mod catalog;
pub mod config;
pub mod error;
pub mod generator;
pub mod guard;
pub mod host;
pub mod layout;
pub mod logging;
pub mod model;
pub mod protocol;
pub mod row;
pub mod server;
pub mod sheets;

pub use config::{CliArgs, GeneratorConfig};
pub use error::{CatalogError, FetchError, GenerateError, GuardError, RowError};
pub use generator::Generator;
pub use guard::RetryPolicy;
pub use host::{DocumentHost, MemoryHost};
pub use logging::{LoggingConfig, init_logging};
pub use model::RunSummary;
pub use protocol::{Reporter, StatusEvent, UiCommand};
pub use server::run_stdio;
pub use sheets::{RowSource, SheetsClient};
