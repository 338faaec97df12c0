pub mod types;

pub use types::{Owner, Repository, SearchResult};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::decode::{DecodeError, FromJson};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const ACCEPT_HEADER: &str = "application/vnd.github.v3+json";
const USER_AGENT: &str = concat!("gh-search/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("GitHub API returned HTTP {status}: {}", .message.as_deref().unwrap_or("(no error message)"))]
    Status {
        status: u16,
        message: Option<String>,
    },
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Failed to decode response: {0}")]
    Decode(#[from] DecodeError),

    #[error("Response body was not a JSON object")]
    UnexpectedResponse,

    #[error("Request failed: {0}")]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
}

/// One kind of API request: where it goes, what it sends, and what the
/// response decodes into. The response type is fixed at compile time.
pub trait Endpoint {
    type Response: FromJson;

    fn path(&self) -> &str;
    fn method(&self) -> HttpMethod;
    fn parameters(&self) -> Vec<(&'static str, String)>;
}

/// `GET search/repositories` — one page of repository search results.
#[derive(Debug, Clone)]
pub struct SearchRepositories {
    pub query: String,
    pub page: u32,
}

impl Endpoint for SearchRepositories {
    type Response = SearchResult<Repository>;

    fn path(&self) -> &str {
        "search/repositories"
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Get
    }

    fn parameters(&self) -> Vec<(&'static str, String)> {
        vec![("q", self.query.clone()), ("page", self.page.to_string())]
    }
}

/// The wire collaborator. Returns the raw response body on success so the
/// executor owns all JSON handling; everything non-2xx is a `TransportError`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        path: &str,
        parameters: &[(&'static str, String)],
    ) -> Result<String, TransportError>;
}

/// reqwest-backed transport for the real GitHub API.
///
/// The request timeout set here is what bounds a stalled server; the layers
/// above carry no timeout or cancellation of their own.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.http.timeout_secs))
            .build()?;
        Ok(HttpTransport {
            client,
            base_url: config.api_url().trim_end_matches('/').to_string(),
            token: config.github_token(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, parameters))]
    async fn get(
        &self,
        path: &str,
        parameters: &[(&'static str, String)],
    ) -> Result<String, TransportError> {
        let url = format!("{}/{}", self.base_url, path);
        let mut request = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", ACCEPT_HEADER)
            .query(parameters);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "received response");

        if !status.is_success() {
            // Keep the status as the error's identity; the server's own
            // message only augments the description.
            return Err(TransportError::Status {
                status: status.as_u16(),
                message: extract_server_message(&body),
            });
        }
        Ok(body)
    }
}

/// Pull the `message` string out of a GitHub error body, if there is one.
fn extract_server_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    json.get("message")?.as_str().map(str::to_owned)
}

/// Executes typed requests: hands the endpoint to the transport, then
/// decodes the body into the endpoint's declared response type.
pub struct GitHubApi<T: Transport> {
    transport: T,
}

impl<T: Transport> GitHubApi<T> {
    pub fn new(transport: T) -> Self {
        GitHubApi { transport }
    }

    /// Every call resolves to exactly one of a decoded value or an error:
    /// transport failures and decode failures propagate unchanged, and a
    /// 2xx body that is not a JSON object is `ApiError::UnexpectedResponse`.
    #[instrument(skip(self, endpoint), fields(path = endpoint.path()))]
    pub async fn request<E: Endpoint>(&self, endpoint: &E) -> Result<E::Response, ApiError> {
        let parameters = endpoint.parameters();
        let body = match endpoint.method() {
            HttpMethod::Get => self.transport.get(endpoint.path(), &parameters).await?,
        };

        let json: Value =
            serde_json::from_str(&body).map_err(|_| ApiError::UnexpectedResponse)?;
        let object = json.as_object().ok_or(ApiError::UnexpectedResponse)?;
        Ok(E::Response::from_json(object)?)
    }
}
