use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, Method};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_REDIRECTS: usize = 10;

/// A failure of one probe attempt. Never leaves [`UrlProbe`].
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Probe transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeMethod {
    Head,
    Get,
}

impl From<ProbeMethod> for Method {
    fn from(method: ProbeMethod) -> Self {
        match method {
            ProbeMethod::Head => Self::HEAD,
            ProbeMethod::Get => Self::GET,
        }
    }
}

/// Sends one request and reports the final status code after redirects.
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    async fn status(&self, method: ProbeMethod, url: &str) -> Result<u16, ProbeError>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .redirect(Policy::limited(MAX_REDIRECTS))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ProbeTransport for HttpTransport {
    async fn status(&self, method: ProbeMethod, url: &str) -> Result<u16, ProbeError> {
        let response = self.client.request(method.into(), url).send().await?;
        Ok(response.status().as_u16())
    }
}

/// Prepends `http://` to anything that does not parse as an absolute URL,
/// e.g. a bare `cla.umn.edu/path`.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if url::Url::parse(trimmed).is_ok() {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

/// Two-stage reachability check: HEAD first, GET when HEAD does not answer
/// exactly 200. Every failure counts as unreachable.
pub struct UrlProbe<T> {
    transport: T,
}

impl<T: ProbeTransport> UrlProbe<T> {
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn is_reachable(&self, raw_url: &str) -> bool {
        let url = normalize_url(raw_url);

        match self.transport.status(ProbeMethod::Head, &url).await {
            Ok(200) => return true,
            Ok(status) => debug!(%url, status, "HEAD did not return 200, retrying with GET"),
            Err(e) => debug!(%url, error = %e, "HEAD failed, retrying with GET"),
        }

        match self.transport.status(ProbeMethod::Get, &url).await {
            Ok(status) => status == 200,
            Err(e) => {
                debug!(%url, error = %e, "GET failed");
                false
            }
        }
    }
}
