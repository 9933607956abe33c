//! Collaborator seams
//!
//! Sources never talk to the network or the desktop directly. They go through an
//! [`HttpTransport`] for remote data and a [`UrlOpener`] for the "open profile page"
//! action, so both can be replaced in tests.

use async_trait::async_trait;
use std::process::Command;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RetrieverConfig;
use crate::error::RetrieveError;

/// Status and body of a completed GET request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal async HTTP client used by the sources
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, RetrieveError>;
}

/// [`HttpTransport`] backed by `reqwest`
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &RetrieverConfig) -> Result<Self, RetrieveError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| RetrieveError::Config(format!("building http client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, RetrieveError> {
        debug!(url, "http get");
        let resp = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = ?e, url, "http request failed");
                return Err(e.into());
            }
        };
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(HttpResponse { status, body })
    }
}

/// Presents a URL to the user
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<(), RetrieveError>;
}

/// Opens URLs with the platform's default handler
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl UrlOpener for SystemOpener {
    fn open(&self, url: &str) -> Result<(), RetrieveError> {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", "start", ""]);
            c
        } else if cfg!(target_os = "macos") {
            Command::new("open")
        } else {
            Command::new("xdg-open")
        };

        let status = cmd.arg(url).status().map_err(|e| RetrieveError::Open {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if !status.success() {
            return Err(RetrieveError::Open {
                url: url.to_string(),
                reason: format!("opener exited with {status}"),
            });
        }
        Ok(())
    }
}

/// Writes the URL to stdout instead of opening it
#[derive(Debug, Default, Clone, Copy)]
pub struct PrintOpener;

impl UrlOpener for PrintOpener {
    fn open(&self, url: &str) -> Result<(), RetrieveError> {
        println!("{url}");
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;

    #[test]
    fn test_response_success_range() {
        let ok = HttpResponse {
            status: 204,
            body: String::new(),
        };
        let bad = HttpResponse {
            status: 404,
            body: String::new(),
        };
        assert!(ok.is_success());
        assert!(!bad.is_success());
    }

    #[test]
    fn test_callback_param_extraction() {
        assert_eq!(
            callback_param("https://x/w/api.php?action=query&callback=jsonpCallback_7"),
            Some("jsonpCallback_7".to_string())
        );
        assert_eq!(callback_param("https://x/w/api.php?action=query"), None);
    }

    #[tokio::test]
    async fn test_mock_wraps_jsonp_and_falls_back_to_404() {
        let transport = MockTransport::new().route("api.php", 200, "{}");

        let resp = transport
            .get("https://en.wikipedia.org/w/api.php?callback=cb_1")
            .await
            .unwrap();
        assert_eq!(resp.body, "/**/cb_1({})");

        let missing = transport.get("https://elsewhere").await.unwrap();
        assert_eq!(missing.status, 404);
        assert_eq!(transport.requests().len(), 2);
    }

    #[test]
    fn test_reqwest_transport_builds_from_config() {
        let config = RetrieverConfig::default();
        assert!(ReqwestTransport::new(&config).is_ok());
    }
}
