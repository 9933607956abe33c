//! Remote source adapters
//!
//! Each adapter recognizes its own resource formats, fetches raw activity from
//! its remote service, and maps it to `[dayOfWeek, hour, count]` points. The set
//! of sources is closed; [`Source`] is the tagged union the dispatcher iterates.

pub mod github;
pub mod jsonp;
pub mod wikipedia;

pub use github::GitHubSource;
pub use jsonp::CallbackRegistry;
pub use wikipedia::WikipediaSource;

use crate::error::RetrieveError;
use crate::types::{ActivitySeries, SourceKind};

/// A supported remote data source
#[derive(Clone)]
pub enum Source {
    GitHub(GitHubSource),
    Wikipedia(WikipediaSource),
}

impl Source {
    pub fn kind(&self) -> SourceKind {
        match self {
            Source::GitHub(_) => SourceKind::GitHub,
            Source::Wikipedia(_) => SourceKind::Wikipedia,
        }
    }

    /// Canonical key for `raw`, or `None` if this source does not accept it
    pub fn normalize(&self, raw: &str) -> Option<String> {
        match self {
            Source::GitHub(s) => s.normalize(raw),
            Source::Wikipedia(s) => s.normalize(raw),
        }
    }

    pub async fn fetch(&self, raw: &str) -> Result<ActivitySeries, RetrieveError> {
        match self {
            Source::GitHub(s) => s.fetch(raw).await,
            Source::Wikipedia(s) => s.fetch(raw).await,
        }
    }

    /// Present the resource's public page
    pub fn open(&self, raw: &str) -> Result<(), RetrieveError> {
        match self {
            Source::GitHub(s) => s.open(raw),
            Source::Wikipedia(s) => s.open(raw),
        }
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Source").field(&self.kind()).finish()
    }
}
