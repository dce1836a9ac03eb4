//! Job positions posted by employers.
mod service;

pub use service::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::profile::CompanySummary;

/// Largest capacity the store can hold.
pub const MAX_CAPACITY: u32 = i32::MAX as u32;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: Uuid,
    pub employer_id: Uuid,
    pub name: String,
    pub capacity: u32,
    pub description: String,
    pub submission_start: DateTime<Utc>,
    pub submission_end: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Position {
    /// Whether the position shows up in the public listing.
    pub fn is_listed_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.submission_end >= now
    }

    /// Whether `now` is inside the submission window.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.submission_start <= now && now <= self.submission_end
    }
}

/// Position with the owning company, as listed publicly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionView {
    #[serde(flatten)]
    pub position: Position,
    pub company: Option<CompanySummary>,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn position(start: i64, end: i64) -> Position {
        let now = Utc::now();
        Position {
            id: Uuid::new_v4(),
            employer_id: Uuid::new_v4(),
            name: "Backend engineer".into(),
            capacity: 2,
            description: "Rust".into(),
            submission_start: now + Duration::days(start),
            submission_end: now + Duration::days(end),
            is_active: true,
            created_at: now,
        }
    }

    #[test]
    fn test_listed_until_end() {
        let now = Utc::now();
        assert!(position(1, 5).is_listed_at(now));
        assert!(position(-5, 1).is_listed_at(now));
        assert!(!position(-5, -1).is_listed_at(now));

        let mut inactive = position(-1, 1);
        inactive.is_active = false;
        assert!(!inactive.is_listed_at(now));
    }

    #[test]
    fn test_open_inside_window_only() {
        let now = Utc::now();
        assert!(position(-1, 1).is_open_at(now));
        assert!(!position(1, 5).is_open_at(now));
        assert!(!position(-5, -1).is_open_at(now));
    }
}
