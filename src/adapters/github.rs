//! GitHub repository adapter
//!
//! Accepts `owner/repo` or `https://github.com/owner/repo[/...]` and reads the
//! repository's commit punch card from the statistics API.

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::RetrieveError;
use crate::transport::{HttpTransport, UrlOpener};
use crate::types::{ActivityPoint, ActivitySeries, SourceKind};

pub const GITHUB_WEB_BASE: &str = "https://github.com";

static SHORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^/]+/[^/]+$").expect("valid regex"));

static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https://github\.com/([^/?#]+)/([^/?#]+)").expect("valid regex")
});

/// Canonicalize a GitHub resource to `owner/repo`.
///
/// - `octocat/Hello-World` is returned unchanged
/// - `https://github.com/octocat/Hello-World/commits` → `octocat/Hello-World`
/// - `https://github.com/octocat/Hello-World.git` → `octocat/Hello-World`
pub fn normalize(raw: &str) -> Option<String> {
    if SHORT_RE.is_match(raw) {
        return Some(raw.to_string());
    }

    let caps = URL_RE.captures(raw)?;
    let owner = caps.get(1)?.as_str();
    let repo = caps.get(2)?.as_str();
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    if repo.is_empty() {
        return None;
    }
    Some(format!("{owner}/{repo}"))
}

/// Percent-encode each segment of an `owner/repo` key for use in a URL path
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Repository punch card source
#[derive(Clone)]
pub struct GitHubSource {
    transport: Arc<dyn HttpTransport>,
    opener: Arc<dyn UrlOpener>,
    api_base: String,
}

impl GitHubSource {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        opener: Arc<dyn UrlOpener>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            opener,
            api_base: api_base.into(),
        }
    }

    pub fn normalize(&self, raw: &str) -> Option<String> {
        normalize(raw)
    }

    fn ensure(&self, raw: &str) -> Result<String, RetrieveError> {
        normalize(raw).ok_or_else(|| RetrieveError::invalid_resource(SourceKind::GitHub, raw))
    }

    pub fn stats_url(&self, key: &str) -> String {
        format!("{}/repos/{}/stats/punch_card", self.api_base, encode_key(key))
    }

    pub fn profile_url(key: &str) -> String {
        format!("{GITHUB_WEB_BASE}/{}", encode_key(key))
    }

    /// Fetch the punch card. The endpoint already aggregates by day and hour, so
    /// the triples are returned as-is.
    pub async fn fetch(&self, raw: &str) -> Result<ActivitySeries, RetrieveError> {
        let key = self.ensure(raw)?;
        let url = self.stats_url(&key);
        let resp = self.transport.get(&url).await?;

        match resp.status {
            202 => {
                warn!(repo = %key, "punch card not computed yet");
                return Err(RetrieveError::fetch(format!(
                    "Statistics for {key} are still being computed"
                )));
            }
            204 => {
                debug!(repo = %key, "empty repository");
                return Ok(Vec::new());
            }
            _ if resp.is_success() => {}
            status => {
                warn!(repo = %key, status, "punch card request failed");
                return Err(RetrieveError::fetch(format!(
                    "Failed to fetch {key}: HTTP {status}"
                )));
            }
        }

        let series: Vec<ActivityPoint> = serde_json::from_str(&resp.body).map_err(|e| {
            RetrieveError::fetch(format!("Unexpected punch card payload for {key}: {e}"))
        })?;

        info!(repo = %key, points = series.len(), "fetched punch card");
        Ok(series)
    }

    pub fn open(&self, raw: &str) -> Result<(), RetrieveError> {
        let key = self.ensure(raw)?;
        self.opener.open(&Self::profile_url(&key))
    }
}
