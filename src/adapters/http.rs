//! reqwest implementation of the control endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::domain::run::ProcessSnapshot;

use super::{ControlApi, RequestError, SalesPeriod, ServerEnvironment};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the backend's `Menu` and `Settings` controllers
#[derive(Debug, Clone)]
pub struct HttpControlApi {
    /// Base API url, without a trailing slash
    base_url: String,
    client: Client,
}

impl HttpControlApi {
    /// Build a client for `api_url`. Cookies are kept across requests so an
    /// authenticated session carries over.
    pub fn new(api_url: &str) -> Result<Self, RequestError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: api_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RequestError> {
        let response = self.client.get(self.endpoint(path)).send().await?;
        let body = checked(response).await?;
        serde_json::from_str(&body).map_err(|e| RequestError::Decode(e.to_string()))
    }

    async fn post_empty(&self, path: &str) -> Result<(), RequestError> {
        let response = self.client.post(self.endpoint(path)).send().await?;
        checked(response).await.map(|_| ())
    }
}

/// The response body on success, `RequestError::Status` otherwise.
async fn checked(response: Response) -> Result<String, RequestError> {
    let status = response.status();
    let body = response.text().await?;
    debug!(status = status.as_u16(), bytes = body.len(), "Control response");

    if !status.is_success() {
        return Err(RequestError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

#[async_trait]
impl ControlApi for HttpControlApi {
    #[instrument(skip(self))]
    async fn process_state(&self) -> Result<ProcessSnapshot, RequestError> {
        let body: Value = self.get_json("Menu/GetProcessState").await?;
        Ok(ProcessSnapshot::from_value(&body))
    }

    #[instrument(skip(self))]
    async fn start_run(&self) -> Result<(), RequestError> {
        self.post_empty("Menu/StartICMRun").await
    }

    #[instrument(skip(self))]
    async fn reset_process_state(&self) -> Result<(), RequestError> {
        self.post_empty("Menu/ResetProcessState").await
    }

    #[instrument(skip(self))]
    async fn server_environment(&self) -> Result<ServerEnvironment, RequestError> {
        self.get_json("Settings/GetServerEnvironmentData").await
    }

    #[instrument(skip(self))]
    async fn current_sales_period(&self) -> Result<SalesPeriod, RequestError> {
        self.get_json("Settings/GetCurrentSalesPeriod").await
    }
}
