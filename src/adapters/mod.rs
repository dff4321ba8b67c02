//! Request/response collaborators.
//!
//! The console talks to the backend over plain HTTP for everything that is
//! not pushed: the authoritative run snapshot, starting and acknowledging a
//! run, and the header data. [`ControlApi`] is the seam; [`HttpControlApi`]
//! is the production implementation.

pub mod http;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::run::ProcessSnapshot;
use crate::domain::timestamp::{deserialize_lenient, LastRun, Timestamp};

pub use http::HttpControlApi;

/// Failure of a control request
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status; `body` is the server's text, verbatim
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl RequestError {
    /// The server's own explanation, when it sent one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } if !body.trim().is_empty() => Some(body.as_str()),
            _ => None,
        }
    }
}

/// Header data from the environment endpoint
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerEnvironment {
    #[serde(default, alias = "ServerName")]
    pub server_name: Option<String>,

    #[serde(default, alias = "Status")]
    pub status: Option<String>,

    #[serde(default, alias = "DtLastRun", deserialize_with = "deserialize_lenient")]
    pub dt_last_run: Option<Timestamp>,
}

impl ServerEnvironment {
    pub fn last_run(&self) -> LastRun {
        self.dt_last_run.map(LastRun::At).unwrap_or_default()
    }
}

/// The current sales period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesPeriod {
    #[serde(alias = "Month")]
    pub month: u32,

    #[serde(alias = "Year")]
    pub year: i32,
}

impl fmt::Display for SalesPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SP{:02} / FY{}", self.month, self.year)
    }
}

/// Backend control endpoints used by the console
#[async_trait]
pub trait ControlApi: Send + Sync {
    /// The authoritative "current run state"
    async fn process_state(&self) -> Result<ProcessSnapshot, RequestError>;

    /// Ask the backend to start a run
    async fn start_run(&self) -> Result<(), RequestError>;

    /// Acknowledge a finished run so it is not replayed on the next load
    async fn reset_process_state(&self) -> Result<(), RequestError>;

    async fn server_environment(&self) -> Result<ServerEnvironment, RequestError>;

    async fn current_sales_period(&self) -> Result<SalesPeriod, RequestError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_environment_sentinel_last_run_is_never() {
        let env: ServerEnvironment = serde_json::from_value(json!({
            "serverName": "ICM-PROD-01",
            "status": "Idle",
            "dtLastRun": "0001-01-01T00:00:00"
        }))
        .unwrap();

        assert_eq!(env.server_name.as_deref(), Some("ICM-PROD-01"));
        assert_eq!(env.last_run(), LastRun::Never);
    }

    #[test]
    fn test_environment_pascal_case() {
        let env: ServerEnvironment = serde_json::from_value(json!({
            "ServerName": "ICM-UAT",
            "DtLastRun": "2025-06-01T08:30:00"
        }))
        .unwrap();

        assert_eq!(env.server_name.as_deref(), Some("ICM-UAT"));
        assert_eq!(env.last_run().label(), "01/06/2025 08:30");
    }

    #[test]
    fn test_sales_period_label() {
        let period: SalesPeriod = serde_json::from_value(json!({"month": 6, "year": 2025})).unwrap();
        assert_eq!(period.to_string(), "SP06 / FY2025");
    }

    #[test]
    fn test_server_message_only_for_non_empty_body() {
        let err = RequestError::Status {
            status: 409,
            body: "A process is already running".to_string(),
        };
        assert_eq!(err.server_message(), Some("A process is already running"));

        let err = RequestError::Status {
            status: 500,
            body: "  ".to_string(),
        };
        assert_eq!(err.server_message(), None);
        assert_eq!(RequestError::Decode("x".into()).server_message(), None);
    }
}
