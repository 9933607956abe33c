//! Wikipedia contributions adapter
//!
//! Accepts `user@xx.wikipedia.org` or a `Special:Contributions` URL and turns the
//! user's most recent main-namespace edits into one `[day, hour, 1]` point each.

use chrono::DateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::jsonp::CallbackRegistry;
use crate::config::WikiTransport;
use crate::error::RetrieveError;
use crate::transport::{HttpTransport, UrlOpener};
use crate::types::{ActivityPoint, ActivitySeries, SourceKind, TimeBasis};

/// Most recent contributions requested per fetch
pub const CONTRIBUTION_LIMIT: u32 = 500;

/// Main (article) namespace
pub const CONTRIBUTION_NAMESPACE: u32 = 0;

static SHORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@]+@[a-z]{2,3}\.wikipedia\.org$").expect("valid regex")
});

static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^https?://([a-z]{2,3}\.wikipedia\.org)/(?:wiki/|w/index\.php\?title=)Special:Contributions/([^/?#&]+)",
    )
    .expect("valid regex")
});

/// `/wiki/User:Name`, `/wiki/Benutzer:Name` and other namespaced user pages
static USER_PAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://([a-z]{2,3}\.wikipedia\.org)/wiki/([^/:?#]+):([^/?#&]+)(?:[/?#].*)?$")
        .expect("valid regex")
});

/// Canonicalize a Wikipedia resource to `user@host`.
///
/// - `Jimbo_Wales@en.wikipedia.org` is returned unchanged
/// - `https://en.wikipedia.org/wiki/Special:Contributions/Jimbo_Wales` →
///   `Jimbo_Wales@en.wikipedia.org`
/// - `https://de.wikipedia.org/wiki/Benutzer:Jimbo_Wales` → `Jimbo_Wales@de.wikipedia.org`
pub fn normalize(raw: &str) -> Option<String> {
    if SHORT_RE.is_match(raw) {
        return Some(raw.to_string());
    }

    let (host, encoded) = if let Some(caps) = URL_RE.captures(raw) {
        (caps.get(1)?.as_str(), caps.get(2)?.as_str())
    } else {
        let caps = USER_PAGE_RE.captures(raw)?;
        if caps.get(2)?.as_str() == "Special" {
            return None;
        }
        (caps.get(1)?.as_str(), caps.get(3)?.as_str())
    };

    let user = urlencoding::decode(encoded).ok()?;
    // `@` makes the key ambiguous to split; `/` would hand it to the GitHub short form
    if user.is_empty() || user.contains('@') || user.contains('/') {
        return None;
    }
    Some(format!("{user}@{host}"))
}

/// Split a canonical key into `(user, host)`
fn split_key(key: &str) -> Option<(&str, &str)> {
    key.rsplit_once('@')
}

#[derive(Debug, Deserialize)]
struct ContribsPayload {
    query: Option<ContribsQuery>,
}

#[derive(Debug, Deserialize)]
struct ContribsQuery {
    usercontribs: Option<Vec<Contribution>>,
}

#[derive(Debug, Deserialize)]
struct Contribution {
    timestamp: String,
}

/// Map a `usercontribs` API response to activity points, keeping the service's order
pub fn parse_contributions(json: &str, basis: TimeBasis) -> Result<ActivitySeries, RetrieveError> {
    let payload: ContribsPayload = serde_json::from_str(json)
        .map_err(|e| RetrieveError::fetch(format!("Malformed contributions payload: {e}")))?;

    let contribs = payload
        .query
        .and_then(|q| q.usercontribs)
        .ok_or_else(|| {
            RetrieveError::fetch("Failed to fetch contributions or no data available.")
        })?;

    contribs
        .iter()
        .map(|c| {
            let ts = DateTime::parse_from_rfc3339(&c.timestamp).map_err(|e| {
                RetrieveError::fetch(format!("Invalid contribution timestamp {}: {e}", c.timestamp))
            })?;
            let (day, hour) = basis.locate(&ts);
            ActivityPoint::single(day, hour)
        })
        .collect()
}

/// Wikipedia user contributions source
#[derive(Clone)]
pub struct WikipediaSource {
    transport: Arc<dyn HttpTransport>,
    opener: Arc<dyn UrlOpener>,
    callbacks: Arc<CallbackRegistry>,
    mode: WikiTransport,
    basis: TimeBasis,
}

impl WikipediaSource {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        opener: Arc<dyn UrlOpener>,
        mode: WikiTransport,
        basis: TimeBasis,
    ) -> Self {
        Self {
            transport,
            opener,
            callbacks: Arc::new(CallbackRegistry::new()),
            mode,
            basis,
        }
    }

    pub fn normalize(&self, raw: &str) -> Option<String> {
        normalize(raw)
    }

    /// In-flight JSONP callbacks of this source
    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    fn ensure(&self, raw: &str) -> Result<(String, String), RetrieveError> {
        let invalid = || RetrieveError::invalid_resource(SourceKind::Wikipedia, raw);
        let key = normalize(raw).ok_or_else(invalid)?;
        let (user, host) = split_key(&key).ok_or_else(invalid)?;
        Ok((user.to_string(), host.to_string()))
    }

    /// Contributions API URL; `callback` is appended only for JSONP requests.
    pub fn contributions_url(user: &str, host: &str, callback: Option<&str>) -> String {
        let mut url = format!(
            "https://{host}/w/api.php?action=query&list=usercontribs&ucuser={}&ucnamespace={CONTRIBUTION_NAMESPACE}&format=json&ucprop=timestamp&uclimit={CONTRIBUTION_LIMIT}",
            urlencoding::encode(user)
        );
        if let Some(cb) = callback {
            url.push_str("&callback=");
            url.push_str(cb);
        }
        url
    }

    pub fn profile_url(user: &str, host: &str) -> String {
        format!(
            "https://{host}/wiki/Special:Contributions/{}",
            urlencoding::encode(user)
        )
    }

    pub async fn fetch(&self, raw: &str) -> Result<ActivitySeries, RetrieveError> {
        let (user, host) = self.ensure(raw)?;

        let series = match self.mode {
            WikiTransport::Jsonp => {
                // Released on every exit path, including cancellation of this future
                let callback = self.callbacks.register();
                let url = Self::contributions_url(&user, &host, Some(callback.name()));
                debug!(user = %user, host = %host, callback = callback.name(), "requesting contributions");

                let body = self.request(&url).await?;
                parse_contributions(callback.payload(&body)?, self.basis)
            }
            WikiTransport::Json => {
                let url = Self::contributions_url(&user, &host, None);
                debug!(user = %user, host = %host, "requesting contributions");

                let body = self.request(&url).await?;
                parse_contributions(&body, self.basis)
            }
        };

        match &series {
            Ok(points) => info!(user = %user, host = %host, points = points.len(), "fetched contributions"),
            Err(e) => warn!(user = %user, host = %host, error = %e, "contributions payload rejected"),
        }
        series
    }

    async fn request(&self, url: &str) -> Result<String, RetrieveError> {
        let resp = self.transport.get(url).await?;
        if !resp.is_success() {
            warn!(url, status = resp.status, "contributions request failed");
            return Err(RetrieveError::fetch(format!(
                "Failed to fetch contributions: HTTP {}",
                resp.status
            )));
        }
        Ok(resp.body)
    }

    pub fn open(&self, raw: &str) -> Result<(), RetrieveError> {
        let (user, host) = self.ensure(raw)?;
        self.opener.open(&Self::profile_url(&user, &host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{callback_param, MockTransport, RecordingOpener};
    use chrono::{Datelike, Local, Timelike};
    use pretty_assertions::assert_eq;

    const TWO_CONTRIBS: &str = r#"{
        "batchcomplete": "",
        "query": {
            "usercontribs": [
                {"userid": 24, "user": "Jimbo Wales", "timestamp": "2024-01-15T09:05:00Z"},
                {"userid": 24, "user": "Jimbo Wales", "timestamp": "2024-01-13T22:45:10Z"}
            ]
        }
    }"#;

    fn source(transport: Arc<MockTransport>, mode: WikiTransport) -> WikipediaSource {
        WikipediaSource::new(
            transport,
            Arc::new(RecordingOpener::default()),
            mode,
            TimeBasis::utc(),
        )
    }

    #[test]
    fn test_normalize_short_form() {
        assert_eq!(
            normalize("Jimbo_Wales@en.wikipedia.org"),
            Some("Jimbo_Wales@en.wikipedia.org".to_string())
        );
        assert_eq!(
            normalize("Jimbo Wales@simple.wikipedia.org"),
            None,
            "language code is 2-3 letters"
        );
        assert_eq!(normalize("Jimbo_Wales@en.wikipedia.com"), None);
        assert_eq!(normalize("@en.wikipedia.org"), None);
    }

    #[test]
    fn test_normalize_url_form() {
        assert_eq!(
            normalize("https://en.wikipedia.org/wiki/Special:Contributions/Jimbo_Wales"),
            Some("Jimbo_Wales@en.wikipedia.org".to_string())
        );
        assert_eq!(
            normalize("https://de.wikipedia.org/wiki/Special:Contributions/J%C3%BCrgen_M%C3%BCller?offset=1"),
            Some("Jürgen_Müller@de.wikipedia.org".to_string())
        );
        assert_eq!(
            normalize("https://en.wikipedia.org/w/index.php?title=Special:Contributions/Jimbo_Wales&limit=50"),
            Some("Jimbo_Wales@en.wikipedia.org".to_string())
        );
    }

    #[test]
    fn test_normalize_user_page_form() {
        assert_eq!(
            normalize("https://en.wikipedia.org/wiki/User:Jimbo_Wales"),
            Some("Jimbo_Wales@en.wikipedia.org".to_string())
        );
        assert_eq!(
            normalize("https://de.wikipedia.org/wiki/Benutzer:J%C3%BCrgen"),
            Some("Jürgen@de.wikipedia.org".to_string())
        );
        assert_eq!(
            normalize("https://en.wikipedia.org/wiki/User:Jimbo_Wales/sandbox"),
            Some("Jimbo_Wales@en.wikipedia.org".to_string())
        );
        assert_eq!(
            normalize("http://fr.wikipedia.org/wiki/Utilisateur:Jean_Dupont#top"),
            Some("Jean_Dupont@fr.wikipedia.org".to_string())
        );
    }

    #[test]
    fn test_normalize_rejects() {
        assert_eq!(
            normalize("https://en.wikipedia.com/wiki/Special:Contributions/Jimbo_Wales"),
            None
        );
        assert_eq!(
            normalize("https://en.wikimedia.org/wiki/Special:Contributions/Jimbo_Wales"),
            None
        );
        assert_eq!(
            normalize("https://en.wikipedia.org/wiki/Special:Contributions/a%40b"),
            None
        );
        assert_eq!(
            normalize("https://en.wikipedia.org/wiki/Special:Contributions/a%2Fb"),
            None
        );
        assert_eq!(normalize("https://en.wikipedia.org/wiki/User:a%2Fb"), None);
        assert_eq!(normalize("https://en.wikipedia.org/wiki/Special:Random"), None);
        assert_eq!(normalize("https://en.wikipedia.org/wiki/Main_Page"), None);
        assert_eq!(normalize("Jimbo_Wales"), None);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in [
            "Jimbo_Wales@en.wikipedia.org",
            "https://en.wikipedia.org/wiki/Special:Contributions/Jimbo_Wales",
            "https://fr.wikipedia.org/wiki/Special:Contributions/Jean%20Dupont",
            "https://en.wikipedia.org/wiki/User:Jimbo_Wales",
        ] {
            let once = normalize(raw).unwrap();
            assert_eq!(normalize(&once), Some(once.clone()), "input {raw}");
        }
    }

    #[test]
    fn test_contributions_url() {
        assert_eq!(
            WikipediaSource::contributions_url("Jimbo Wales", "en.wikipedia.org", Some("jsonpCallback_3")),
            "https://en.wikipedia.org/w/api.php?action=query&list=usercontribs&ucuser=Jimbo%20Wales&ucnamespace=0&format=json&ucprop=timestamp&uclimit=500&callback=jsonpCallback_3"
        );
        assert!(!WikipediaSource::contributions_url("a", "en.wikipedia.org", None).contains("callback"));
    }

    #[test]
    fn test_parse_contributions_utc() {
        let series = parse_contributions(TWO_CONTRIBS, TimeBasis::utc()).unwrap();
        // Monday 09:xx, then Saturday 22:xx
        assert_eq!(
            series,
            vec![
                ActivityPoint::single(1, 9).unwrap(),
                ActivityPoint::single(6, 22).unwrap(),
            ]
        );
    }

    #[test]
    fn test_parse_contributions_local_time() {
        let series = parse_contributions(TWO_CONTRIBS, TimeBasis::Local).unwrap();
        let expected: Vec<ActivityPoint> = ["2024-01-15T09:05:00Z", "2024-01-13T22:45:10Z"]
            .iter()
            .map(|ts| {
                let t = DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Local);
                ActivityPoint::single(t.weekday().num_days_from_sunday() as u8, t.hour() as u8)
                    .unwrap()
            })
            .collect();
        assert_eq!(series, expected);
    }

    #[test]
    fn test_parse_contributions_missing_field() {
        for body in [
            r#"{"batchcomplete": ""}"#,
            r#"{"query": {}}"#,
            r#"{"error": {"code": "baduser"}}"#,
        ] {
            assert!(matches!(
                parse_contributions(body, TimeBasis::utc()),
                Err(RetrieveError::Fetch(_))
            ));
        }
        assert!(parse_contributions("null", TimeBasis::utc()).is_err());
        assert!(parse_contributions(
            r#"{"query": {"usercontribs": [{"timestamp": "yesterday"}]}}"#,
            TimeBasis::utc()
        )
        .is_err());
    }

    #[test]
    fn test_parse_empty_contributions() {
        let series =
            parse_contributions(r#"{"query": {"usercontribs": []}}"#, TimeBasis::utc()).unwrap();
        assert!(series.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_jsonp_and_cleanup() {
        let transport = Arc::new(MockTransport::new().route("ucuser=Jimbo_Wales", 200, TWO_CONTRIBS));
        let wiki = source(transport.clone(), WikiTransport::Jsonp);

        let series = wiki
            .fetch("https://en.wikipedia.org/wiki/Special:Contributions/Jimbo_Wales")
            .await
            .unwrap();
        assert_eq!(series.len(), 2);
        assert!(series.iter().all(|p| p.count == 1));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with("https://en.wikipedia.org/w/api.php?"));
        assert!(requests[0].contains("uclimit=500"));
        assert!(requests[0].contains("ucnamespace=0"));
        assert!(callback_param(&requests[0]).is_some());
        assert!(wiki.callbacks().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_cleans_up_callback() {
        let transport = Arc::new(
            MockTransport::new()
                .route("ucuser=Nobody", 200, r#"{"batchcomplete": ""}"#)
                .route("ucuser=Down", 503, ""),
        );
        let wiki = source(transport, WikiTransport::Jsonp);

        assert!(matches!(
            wiki.fetch("Nobody@en.wikipedia.org").await,
            Err(RetrieveError::Fetch(_))
        ));
        assert!(matches!(
            wiki.fetch("Down@en.wikipedia.org").await,
            Err(RetrieveError::Fetch(_))
        ));
        assert!(wiki.callbacks().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_plain_json_mode() {
        let transport = Arc::new(MockTransport::new().route("ucuser=Jimbo_Wales", 200, TWO_CONTRIBS));
        let wiki = source(transport.clone(), WikiTransport::Json);

        let series = wiki.fetch("Jimbo_Wales@en.wikipedia.org").await.unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(callback_param(&transport.requests()[0]), None);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_use_distinct_callbacks() {
        let transport = Arc::new(
            MockTransport::gated()
                .route("ucuser=Alice", 200, r#"{"query":{"usercontribs":[{"timestamp":"2024-01-15T09:05:00Z"}]}}"#)
                .route("ucuser=Bob", 200, TWO_CONTRIBS),
        );
        let wiki = source(transport.clone(), WikiTransport::Jsonp);

        let driver = async {
            while transport.requests().len() < 2 {
                tokio::task::yield_now().await;
            }
            let in_flight = wiki.callbacks().pending();
            assert_eq!(in_flight.len(), 2);
            assert_ne!(in_flight[0], in_flight[1]);

            // Let one request finish; the other registration must survive
            transport.release(1);
            while wiki.callbacks().len() > 1 {
                tokio::task::yield_now().await;
            }
            let survivor = wiki.callbacks().pending();
            assert_eq!(survivor.len(), 1);
            assert!(in_flight.contains(&survivor[0]));

            transport.release(1);
        };

        let (alice, bob, ()) = tokio::join!(
            wiki.fetch("Alice@en.wikipedia.org"),
            wiki.fetch("Bob@en.wikipedia.org"),
            driver
        );

        assert_eq!(alice.unwrap(), vec![ActivityPoint::single(1, 9).unwrap()]);
        assert_eq!(bob.unwrap().len(), 2);
        assert!(wiki.callbacks().is_empty());

        let names: Vec<String> = transport
            .requests()
            .iter()
            .filter_map(|u| callback_param(u))
            .collect();
        assert_eq!(names.len(), 2);
        assert_ne!(names[0], names[1]);
    }

    #[tokio::test]
    async fn test_fetch_invalid_resource() {
        let wiki = source(Arc::new(MockTransport::new()), WikiTransport::Jsonp);
        assert!(matches!(
            wiki.fetch("octocat/Hello-World").await,
            Err(RetrieveError::InvalidResource {
                kind: SourceKind::Wikipedia,
                ..
            })
        ));
        assert!(wiki.callbacks().is_empty());
    }

    #[test]
    fn test_open_contributions_page() {
        let opener = Arc::new(RecordingOpener::default());
        let wiki = WikipediaSource::new(
            Arc::new(MockTransport::new()),
            opener.clone(),
            WikiTransport::Jsonp,
            TimeBasis::utc(),
        );

        wiki.open("Jean Dupont@fr.wikipedia.org").unwrap();
        assert_eq!(
            opener.opened(),
            vec!["https://fr.wikipedia.org/wiki/Special:Contributions/Jean%20Dupont"]
        );
        assert!(wiki.open("Jean Dupont").is_err());
    }
}
