use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, ServerError};
use crate::position::{MAX_CAPACITY, Position, PositionView};
use crate::profile::CompanySummary;

/// Position creation request, with dates as sent by the client.
#[derive(Debug, Clone)]
pub struct NewPosition {
    pub name: String,
    pub capacity: i64,
    pub description: String,
    pub submission_start: String,
    pub submission_end: String,
}

/// Parse an RFC 3339 timestamp or a `YYYY-MM-DD` date (midnight UTC).
pub fn parse_date(field: &'static str, value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Ok(date.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date| date.and_utc())
        .ok_or_else(|| ServerError::field(field, "date", "Date must be RFC 3339 or YYYY-MM-DD."))
}

/// Position creation and listings.
pub struct PositionService<'a> {
    db: &'a Database,
}

impl<'a> PositionService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn create(&self, employer_id: Uuid, new: NewPosition) -> Result<Position> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(ServerError::field("name", "length", "Name cannot be empty."));
        }
        let capacity = u32::try_from(new.capacity)
            .ok()
            .filter(|capacity| (1..=MAX_CAPACITY).contains(capacity))
            .ok_or_else(|| {
                ServerError::field("capacity", "range", "Capacity must be between 1 and 2147483647.")
            })?;

        let submission_start = parse_date("submissionStart", &new.submission_start)?;
        let submission_end = parse_date("submissionEnd", &new.submission_end)?;
        if submission_end <= submission_start {
            return Err(ServerError::field(
                "submissionEnd",
                "range",
                "Submission end must be after submission start.",
            ));
        }

        if self.db.profiles.find_employer(employer_id).await?.is_none() {
            return Err(ServerError::NotFound("company profile"));
        }

        let position = Position {
            id: Uuid::new_v4(),
            employer_id,
            name: name.to_owned(),
            capacity,
            description: new.description.trim().to_owned(),
            submission_start,
            submission_end,
            is_active: true,
            created_at: Utc::now(),
        };
        self.db.positions.insert(&position).await?;

        tracing::info!(%employer_id, position_id = %position.id, "position created");
        Ok(position)
    }

    /// Active positions still accepting applications, newest first, with
    /// their company.
    pub async fn list_public(&self) -> Result<Vec<PositionView>> {
        let positions = self.db.positions.list_listed(Utc::now()).await?;

        let mut companies: HashMap<Uuid, Option<CompanySummary>> = HashMap::new();
        let mut views = Vec::with_capacity(positions.len());
        for position in positions {
            let company = match companies.get(&position.employer_id) {
                Some(company) => company.clone(),
                None => {
                    let company = self
                        .db
                        .profiles
                        .find_employer(position.employer_id)
                        .await?
                        .map(|profile| profile.summary());
                    companies.insert(position.employer_id, company.clone());
                    company
                },
            };
            views.push(PositionView { position, company });
        }
        Ok(views)
    }

    /// Positions owned by the caller, newest first.
    pub async fn list_own(&self, employer_id: Uuid) -> Result<Vec<Position>> {
        Ok(self.db.positions.list_by_employer(employer_id).await?)
    }
}
