//! Resource dispatch
//!
//! This module provides the public API for punchcard. It picks the source for an
//! arbitrary resource string and delegates to it.

use std::sync::Arc;
use tracing::debug;

use crate::adapters::{GitHubSource, Source, WikipediaSource};
use crate::config::RetrieverConfig;
use crate::error::RetrieveError;
use crate::transport::{HttpTransport, ReqwestTransport, SystemOpener, UrlOpener};
use crate::types::ActivitySeries;

/// Routes resource strings to the first source that accepts them.
///
/// Sources are tried in registration order, so a string both sources would accept
/// goes to the one registered first. The default order is GitHub, then Wikipedia.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    sources: Vec<Source>,
}

impl Dispatcher {
    /// Default sources over the real network and the system URL opener
    pub fn new(config: &RetrieverConfig) -> Result<Self, RetrieveError> {
        let transport = Arc::new(ReqwestTransport::new(config)?);
        Ok(Self::with_io(config, transport, Arc::new(SystemOpener)))
    }

    /// Default sources over the given collaborators
    pub fn with_io(
        config: &RetrieverConfig,
        transport: Arc<dyn HttpTransport>,
        opener: Arc<dyn UrlOpener>,
    ) -> Self {
        Self::with_sources(vec![
            Source::GitHub(GitHubSource::new(
                transport.clone(),
                opener.clone(),
                config.github_api_base.clone(),
            )),
            Source::Wikipedia(WikipediaSource::new(
                transport,
                opener,
                config.wiki_transport,
                config.time_basis,
            )),
        ])
    }

    /// Explicit sources, tried in the given order
    pub fn with_sources(sources: Vec<Source>) -> Self {
        Self { sources }
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Find the source responsible for `raw`.
    pub fn resolve(&self, raw: &str) -> Result<&Source, RetrieveError> {
        if raw.is_empty() {
            return Err(RetrieveError::InvalidInput);
        }
        let source = self
            .sources
            .iter()
            .find(|s| s.normalize(raw).is_some())
            .ok_or_else(|| RetrieveError::UnknownFormat(raw.to_string()))?;
        debug!(resource = raw, source = %source.kind(), "resolved resource");
        Ok(source)
    }

    /// Canonical key for `raw`, or `None` if no source accepts it. Never fails.
    pub fn ensure(&self, raw: &str) -> Option<String> {
        match self.resolve(raw) {
            Ok(source) => source.normalize(raw),
            Err(e) => {
                debug!(resource = raw, error = %e, "resource not recognized");
                None
            }
        }
    }

    /// Open the public page for `raw`
    pub fn open(&self, raw: &str) -> Result<(), RetrieveError> {
        self.resolve(raw)?.open(raw)
    }

    /// Fetch the activity series for `raw`
    pub async fn fetch(&self, raw: &str) -> Result<ActivitySeries, RetrieveError> {
        self.resolve(raw)?.fetch(raw).await
    }
}
