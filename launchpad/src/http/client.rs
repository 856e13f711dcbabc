//! HTTP client implementation

use std::time::Duration;

use reqwest::{header, Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use crate::errors::PipelineError;

/// JSON-over-HTTP client shared by the platform and notification integrations
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: Option<SecretString>,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str) -> Result<Self, PipelineError> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// Create a new HTTP client with a request timeout
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, PipelineError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Attach a bearer token sent with every request
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    fn url(&self, path: &str) -> String {
        if path.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(
                header::AUTHORIZATION,
                format!("Bearer {}", token.expose_secret()),
            ),
            None => request,
        }
    }

    /// Make a POST request
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, PipelineError> {
        let url = self.url(path);
        debug!("POST {}", url);

        let response = self
            .authorize(self.client.post(&url).json(body))
            .send()
            .await?;
        Self::parse("POST", response).await
    }

    /// Make a POST request and ignore the response body
    pub async fn post_no_content<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), PipelineError> {
        let url = self.url(path);
        debug!("POST {}", url);

        let response = self
            .authorize(self.client.post(&url).json(body))
            .send()
            .await?;
        Self::check("POST", response).await.map(|_| ())
    }

    async fn check(
        method: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, PipelineError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!("HTTP {} failed: {} - {}", method, status, body);
        Err(PipelineError::PlatformError(format!("{}: {}", status, body)))
    }

    async fn parse<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> Result<T, PipelineError> {
        let response = Self::check(method, response).await?;
        Ok(response.json().await?)
    }
}
