//! Header status widget.
//!
//! Shows server name, sales period, process status and last run. The
//! status string is server vocabulary: live events may flip it to
//! `Running`, but a finished run triggers a fresh query instead of deriving
//! the final status locally.

use std::fmt;

use tracing::{instrument, warn};

use crate::adapters::{ControlApi, RequestError, SalesPeriod, ServerEnvironment};
use crate::core::bus::{Effect, Effects, Subscriber};
use crate::domain::events::{DomainEvent, DomainEventKind, Topic};
use crate::domain::run::StepStatus;
use crate::domain::timestamp::LastRun;

/// Status shown as soon as a step reports progress
pub const RUNNING_STATUS: &str = "Running";

const UNKNOWN: &str = "Unknown";

/// One header value
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Field {
    #[default]
    Loading,
    Ready(String),
    Error,
}

impl Field {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => f.write_str("Loading..."),
            Self::Ready(value) => f.write_str(value),
            Self::Error => f.write_str("Error"),
        }
    }
}

/// Everything one header refresh fetches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub environment: ServerEnvironment,
    pub sales_period: SalesPeriod,
}

impl ServerInfo {
    /// Query both header endpoints.
    #[instrument(skip(api))]
    pub async fn load(api: &dyn ControlApi) -> Result<Self, RequestError> {
        let environment = api.server_environment().await?;
        let sales_period = api.current_sales_period().await?;
        Ok(Self {
            environment,
            sales_period,
        })
    }
}

#[derive(Debug, Default)]
pub struct HeaderStatusWidget {
    server: Field,
    sales_period: Field,
    status: Field,
    last_run: Field,
}

impl HeaderStatusWidget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the result of a refresh. Any failure marks every field.
    pub fn apply_server_info(&mut self, result: Result<ServerInfo, RequestError>) {
        match result {
            Ok(info) => {
                let env = info.environment;
                self.server = Field::Ready(env.server_name.clone().unwrap_or_else(|| UNKNOWN.into()));
                self.status = Field::Ready(env.status.clone().unwrap_or_else(|| UNKNOWN.into()));
                self.last_run = Field::Ready(env.last_run().label());
                self.sales_period = Field::Ready(info.sales_period.to_string());
            }
            Err(err) => {
                warn!(error = %err, "Failed to load server info");
                self.server = Field::Error;
                self.sales_period = Field::Error;
                self.status = Field::Error;
                self.last_run = Field::Error;
            }
        }
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Field::Ready(status.into());
    }

    pub fn set_last_run(&mut self, last_run: LastRun) {
        self.last_run = Field::Ready(last_run.label());
    }

    pub fn server(&self) -> &Field {
        &self.server
    }

    pub fn sales_period(&self) -> &Field {
        &self.sales_period
    }

    pub fn status(&self) -> &Field {
        &self.status
    }

    pub fn last_run(&self) -> &Field {
        &self.last_run
    }
}

impl fmt::Display for HeaderStatusWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Server: {} | {} | Status: {} | Last run: {}",
            self.server, self.sales_period, self.status, self.last_run
        )
    }
}

impl Subscriber for HeaderStatusWidget {
    fn topics(&self) -> &'static [Topic] {
        &[Topic::StepUpdate, Topic::RunFinished, Topic::ServerStatus]
    }

    fn on_event(&mut self, event: &DomainEvent, effects: &mut Effects) {
        match &event.kind {
            DomainEventKind::StepUpdate(change) => {
                if change.status == Some(StepStatus::InProgress) {
                    self.set_status(RUNNING_STATUS);
                }
            }
            DomainEventKind::RunFinished(_) => effects.push(Effect::RefreshServerInfo),
            DomainEventKind::ServerStatus(update) => {
                if let Some(status) = &update.status {
                    self.set_status(status.clone());
                }
                if let Some(last_run) = update.last_run {
                    self.set_last_run(last_run);
                }
            }
            DomainEventKind::StepsInit(_) => {}
        }
    }
}
