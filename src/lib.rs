//! punchcard - day/hour activity punch cards for repositories and wiki editors
//!
//! A resource string is resolved to one of a fixed set of sources, normalized to
//! that source's canonical key, and turned into `[dayOfWeek, hour, count]` points:
//! input string → dispatcher → source adapter → activity series.
//!
//! ## Sources
//!
//! - **GitHub**: `owner/repo` or a `https://github.com/...` URL; the repository's
//!   commit punch card
//! - **Wikipedia**: `user@xx.wikipedia.org` or a `Special:Contributions` URL; the
//!   user's last 500 article edits

pub mod adapters;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod transport;
pub mod types;

pub use adapters::Source;
pub use config::{RetrieverConfig, WikiTransport};
pub use dispatcher::Dispatcher;
pub use error::RetrieveError;
pub use transport::{HttpTransport, PrintOpener, ReqwestTransport, SystemOpener, UrlOpener};
pub use types::{ActivityGrid, ActivityPoint, ActivitySeries, SourceKind, TimeBasis};

/// Crate version, sent in the default `User-Agent`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name used in the default `User-Agent`
pub const PRODUCER_NAME: &str = "punchcard";
