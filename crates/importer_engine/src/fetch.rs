use std::sync::OnceLock;
use std::time::Duration;

use futures_util::StreamExt;
use importer_logging::import_trace;
use reqwest::header::{ACCEPT, CONTENT_TYPE};

use crate::types::{FailureKind, FetchError};

/// Client limits shared by feed and asset downloads.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub user_agent: String,
    /// Sent as the `Accept` header when set.
    pub accept: Option<String>,
    /// Accepted `Content-Type` values; empty accepts anything.
    pub allowed_content_types: Vec<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            redirect_limit: 5,
            max_bytes: 50 * 1024 * 1024,
            user_agent: concat!("importer/", env!("CARGO_PKG_VERSION")).to_string(),
            accept: None,
            allowed_content_types: Vec::new(),
        }
    }
}

impl FetchSettings {
    /// Settings for JSON feed documents.
    pub fn for_feeds() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_bytes: 10 * 1024 * 1024,
            accept: Some("application/feed+json, application/json;q=0.9".to_string()),
            allowed_content_types: vec![
                "application/feed+json".to_string(),
                "application/json".to_string(),
                "text/plain".to_string(),
            ],
            ..Self::default()
        }
    }

    fn accepts(&self, content_type: &str) -> bool {
        if self.allowed_content_types.is_empty() {
            return true;
        }
        let mime = content_type.split(';').next().unwrap_or(content_type).trim();
        self.allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(mime))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub original_url: String,
    /// Differs from `original_url` when redirects were followed.
    pub final_url: String,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

/// Raw HTTP GET. Asset and feed handling sit on top of this.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError>;
}

/// reqwest-backed fetcher. The client is built on first use and shared.
#[derive(Debug)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
    client: OnceLock<reqwest::Client>,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self {
            settings,
            client: OnceLock::new(),
        }
    }

    fn client(&self) -> Result<&reqwest::Client, FetchError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(self.settings.redirect_limit))
            .user_agent(self.settings.user_agent.as_str())
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        // A racing caller may have won; either client is equivalent.
        Ok(self.client.get_or_init(|| client))
    }

    fn too_large(&self, actual: u64) -> FetchError {
        FetchError::new(
            FailureKind::TooLarge {
                max_bytes: self.settings.max_bytes,
                actual: Some(actual),
            },
            "response too large",
        )
    }

    /// Reject on status, declared length or content type before reading the body.
    fn check_response(&self, response: &reqwest::Response) -> Result<Option<String>, FetchError> {
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        if let Some(declared) = response.content_length() {
            if declared > self.settings.max_bytes {
                return Err(self.too_large(declared));
            }
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        match content_type.as_deref() {
            Some(mime) if !self.settings.accepts(mime) => Err(FetchError::new(
                FailureKind::UnsupportedContentType {
                    content_type: mime.to_string(),
                },
                "unsupported content type",
            )),
            _ => Ok(content_type),
        }
    }

    /// Stream the body, stopping as soon as it outgrows the byte cap.
    async fn read_capped(&self, response: reqwest::Response) -> Result<Vec<u8>, FetchError> {
        let mut body = Vec::new();
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let total = (body.len() + chunk.len()) as u64;
            if total > self.settings.max_bytes {
                return Err(self.too_large(total));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let mut request = self.client()?.get(parsed);
        if let Some(accept) = &self.settings.accept {
            request = request.header(ACCEPT, accept.as_str());
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let final_url = response.url().to_string();
        let content_type = self.check_response(&response)?;
        let bytes = self.read_capped(response).await?;
        import_trace!("GET {url} -> {final_url} ({} bytes)", bytes.len());

        Ok(FetchOutput {
            metadata: FetchMetadata {
                original_url: url.to_string(),
                final_url,
                content_type,
                byte_len: bytes.len() as u64,
            },
            bytes,
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    let kind = if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_redirect() {
        FailureKind::RedirectLimitExceeded
    } else {
        FailureKind::Network
    };
    FetchError::new(kind, err.to_string())
}
