//! Applications of seekers to positions, and their status machine.
mod service;

pub use service::*;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::portfolio::PortfolioItem;
use crate::position::Position;
use crate::profile::{CompanySummary, SeekerSummary};

/// `PENDING` is the only non-terminal status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Pending,
    Accepted,
    Rejected,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "PENDING",
            Status::Accepted => "ACCEPTED",
            Status::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::Pending)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown status `{0}`")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Status::Pending),
            "ACCEPTED" => Ok(Status::Accepted),
            "REJECTED" => Ok(Status::Rejected),
            other => Err(UnknownStatus(other.to_owned())),
        }
    }
}

/// Outcome an employer may give to a pending application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Accepted,
    Rejected,
}

impl From<Decision> for Status {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Accepted => Status::Accepted,
            Decision::Rejected => Status::Rejected,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: Uuid,
    pub position_id: Uuid,
    pub seeker_id: Uuid,
    pub portfolio_id: Uuid,
    pub applied_at: DateTime<Utc>,
    pub status: Status,
    pub notes: Option<String>,
}

impl Application {
    /// Move a pending application to its final status.
    ///
    /// Returns the current status when the application is already decided.
    pub fn decide(&mut self, decision: Decision, notes: Option<String>) -> Result<(), Status> {
        if self.status.is_terminal() {
            return Err(self.status);
        }

        self.status = decision.into();
        if notes.is_some() {
            self.notes = notes;
        }
        Ok(())
    }
}

/// Application as seen by the employer owning the position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedApplication {
    #[serde(flatten)]
    pub application: Application,
    pub position: Option<Position>,
    pub seeker: Option<SeekerSummary>,
    pub portfolio: Option<PortfolioItem>,
}

/// Application as seen by the seeker who sent it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentApplication {
    #[serde(flatten)]
    pub application: Application,
    pub position: Option<Position>,
    pub company: Option<CompanySummary>,
}
