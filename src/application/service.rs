use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use crate::application::{Application, Decision, ReceivedApplication, SentApplication, Status};
use crate::database::{Database, StoreError};
use crate::error::{Result, ServerError};
use crate::position::Position;
use crate::profile::{CompanySummary, SeekerSummary};

/// Application submission request.
#[derive(Debug, Clone, Default)]
pub struct ApplyRequest {
    pub notes: Option<String>,
    /// Portfolio item to attach. Defaults to the most recent one.
    pub portfolio_id: Option<Uuid>,
}

/// Application submission, decisions and listings.
pub struct ApplicationService<'a> {
    db: &'a Database,
    enforce_window: bool,
}

impl<'a> ApplicationService<'a> {
    pub fn new(db: &'a Database, enforce_window: bool) -> Self {
        Self { db, enforce_window }
    }

    /// Apply to a position with a portfolio snapshot.
    pub async fn apply(
        &self,
        seeker_id: Uuid,
        position_id: Uuid,
        request: ApplyRequest,
    ) -> Result<Application> {
        let position = self
            .db
            .positions
            .find_by_id(position_id)
            .await?
            .ok_or(ServerError::NotFound("position"))?;

        let now = Utc::now();
        let accepting = if self.enforce_window {
            position.is_open_at(now)
        } else {
            position.is_listed_at(now)
        };
        if !accepting {
            return Err(ServerError::PreconditionFailed(
                "Position is not accepting applications.".into(),
            ));
        }

        let items = self.db.portfolios.list_by_seeker(seeker_id).await?;
        let portfolio = match request.portfolio_id {
            _ if items.is_empty() => {
                return Err(ServerError::PreconditionFailed("Create portfolio first.".into()));
            },
            Some(id) => items
                .iter()
                .find(|item| item.id == id)
                .ok_or(ServerError::NotFound("portfolio"))?,
            None => &items[0],
        };

        if self
            .db
            .applications
            .find_by_pair(position_id, seeker_id)
            .await?
            .is_some()
        {
            return Err(ServerError::Conflict("Already applied to this position.".into()));
        }

        let application = Application {
            id: Uuid::new_v4(),
            position_id,
            seeker_id,
            portfolio_id: portfolio.id,
            applied_at: now,
            status: Status::Pending,
            notes: request
                .notes
                .map(|notes| notes.trim().to_owned())
                .filter(|notes| !notes.is_empty()),
        };

        match self.db.applications.insert(&application).await {
            Ok(()) => {},
            Err(StoreError::Duplicate { .. }) => {
                return Err(ServerError::Conflict("Already applied to this position.".into()));
            },
            Err(err) => return Err(err.into()),
        }

        metrics::counter!("applications_submitted_total").increment(1);
        tracing::info!(%seeker_id, %position_id, application_id = %application.id, "application submitted");

        Ok(application)
    }

    /// Accept or reject a pending application of one of the caller's
    /// positions.
    pub async fn decide(
        &self,
        employer_id: Uuid,
        application_id: Uuid,
        decision: Decision,
        notes: Option<String>,
    ) -> Result<Application> {
        let mut application = self
            .db
            .applications
            .find_by_id(application_id)
            .await?
            .ok_or(ServerError::NotFound("application"))?;

        self.owned_position(employer_id, application.position_id)
            .await?;

        let notes = notes
            .map(|notes| notes.trim().to_owned())
            .filter(|notes| !notes.is_empty());
        application
            .decide(decision, notes)
            .map_err(ServerError::InvalidTransition)?;

        if !self
            .db
            .applications
            .update_status(&application, Status::Pending)
            .await?
        {
            // Decided concurrently.
            let current = self
                .db
                .applications
                .find_by_id(application_id)
                .await?
                .map_or(application.status, |stored| stored.status);
            return Err(ServerError::InvalidTransition(current));
        }

        metrics::counter!("applications_decided_total", "status" => application.status.as_str())
            .increment(1);
        tracing::info!(%employer_id, %application_id, status = %application.status, "application decided");

        Ok(application)
    }

    async fn owned_position(&self, employer_id: Uuid, position_id: Uuid) -> Result<Position> {
        match self.db.positions.find_by_id(position_id).await? {
            Some(position) if position.employer_id == employer_id => Ok(position),
            _ => Err(ServerError::Forbidden(
                "This position belongs to another company.".into(),
            )),
        }
    }

    /// Applications to one of the caller's positions.
    pub async fn list_for_position(
        &self,
        employer_id: Uuid,
        position_id: Uuid,
    ) -> Result<Vec<ReceivedApplication>> {
        let position = self
            .db
            .positions
            .find_by_id(position_id)
            .await?
            .ok_or(ServerError::NotFound("position"))?;
        if position.employer_id != employer_id {
            return Err(ServerError::Forbidden(
                "This position belongs to another company.".into(),
            ));
        }

        let applications = self.db.applications.list_by_positions(&[position_id]).await?;
        self.received(applications, vec![position]).await
    }

    /// Applications to any of the caller's positions.
    pub async fn list_for_company(&self, employer_id: Uuid) -> Result<Vec<ReceivedApplication>> {
        let positions = self.db.positions.list_by_employer(employer_id).await?;
        if positions.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = positions.iter().map(|p| p.id).collect();
        let applications = self.db.applications.list_by_positions(&ids).await?;
        self.received(applications, positions).await
    }

    /// Applications sent by the caller.
    pub async fn list_mine(&self, seeker_id: Uuid) -> Result<Vec<SentApplication>> {
        let applications = self.db.applications.list_by_seeker(seeker_id).await?;

        let mut positions: HashMap<Uuid, Option<Position>> = HashMap::new();
        let mut companies: HashMap<Uuid, Option<CompanySummary>> = HashMap::new();
        let mut sent = Vec::with_capacity(applications.len());

        for application in applications {
            if !positions.contains_key(&application.position_id) {
                let position = self.db.positions.find_by_id(application.position_id).await?;
                positions.insert(application.position_id, position);
            }
            let position = positions.get(&application.position_id).cloned().flatten();

            let company = match &position {
                Some(position) => match companies.get(&position.employer_id) {
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
                },
                None => None,
            };

            sent.push(SentApplication {
                application,
                position,
                company,
            });
        }
        Ok(sent)
    }

    async fn received(
        &self,
        applications: Vec<Application>,
        positions: Vec<Position>,
    ) -> Result<Vec<ReceivedApplication>> {
        let positions: HashMap<Uuid, Position> =
            positions.into_iter().map(|p| (p.id, p)).collect();
        let mut seekers: HashMap<Uuid, Option<SeekerSummary>> = HashMap::new();
        let mut received = Vec::with_capacity(applications.len());

        for application in applications {
            let seeker = match seekers.get(&application.seeker_id) {
                Some(seeker) => seeker.clone(),
                None => {
                    let seeker = self.seeker_summary(application.seeker_id).await?;
                    seekers.insert(application.seeker_id, seeker.clone());
                    seeker
                },
            };
            let portfolio = self
                .db
                .portfolios
                .find_by_id(application.portfolio_id)
                .await?;

            received.push(ReceivedApplication {
                position: positions.get(&application.position_id).cloned(),
                seeker,
                portfolio,
                application,
            });
        }
        Ok(received)
    }

    async fn seeker_summary(&self, seeker_id: Uuid) -> Result<Option<SeekerSummary>> {
        let Some(user) = self.db.users.find_by_id(seeker_id).await? else {
            return Ok(None);
        };
        let profile = self.db.profiles.find_seeker(seeker_id).await?;

        Ok(Some(match profile {
            Some(profile) => SeekerSummary {
                user_id: user.id,
                name: if profile.name.is_empty() { user.name } else { profile.name },
                email: user.email,
                phone: profile.phone,
                photo_url: profile.photo_url,
            },
            None => SeekerSummary {
                user_id: user.id,
                name: user.name,
                email: user.email,
                phone: String::new(),
                photo_url: None,
            },
        }))
    }
}
