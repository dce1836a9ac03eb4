use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::blob::{BlobStore, Upload, release};
use crate::database::Database;
use crate::error::{Result, ServerError};
use crate::profile::{EmployerPatch, EmployerProfile, Gender, SeekerPatch, SeekerProfile};

const LOGO_PREFIX: &str = "logos";
const PHOTO_PREFIX: &str = "photos";

/// Fields required to complete an employer profile.
#[derive(Debug, Clone)]
pub struct EmployerDetails {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub description: String,
}

/// Fields required to complete a seeker profile.
#[derive(Debug, Clone)]
pub struct SeekerDetails {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
}

/// Trim a present field and refuse to blank it.
pub fn non_empty(field: &'static str, value: Option<String>) -> Result<Option<String>> {
    match value {
        Some(value) if value.trim().is_empty() => Err(ServerError::field(
            field,
            "length",
            &format!("{field} cannot be empty."),
        )),
        Some(value) => Ok(Some(value.trim().to_owned())),
        None => Ok(None),
    }
}

fn required(field: &'static str, value: String) -> Result<String> {
    non_empty(field, Some(value)).map(Option::unwrap_or_default)
}

/// Profile completion, reads and partial updates.
pub struct ProfileService<'a> {
    db: &'a Database,
    blob: &'a dyn BlobStore,
}

impl<'a> ProfileService<'a> {
    pub fn new(db: &'a Database, blob: &'a dyn BlobStore) -> Self {
        Self { db, blob }
    }

    /// Upload `upload` and point `slot` at it. Returns the superseded URL.
    async fn swap_asset(
        &self,
        slot: &mut Option<String>,
        upload: Option<Upload>,
        prefix: &str,
        owner: Uuid,
    ) -> Result<Option<String>> {
        match upload {
            Some(upload) => {
                let url = upload.store(self.blob, prefix, owner).await?;
                Ok(slot.replace(url))
            },
            None => Ok(None),
        }
    }

    /// Release the superseded asset once the new one is saved, or the new
    /// one when saving failed.
    async fn settle<T>(
        &self,
        saved: crate::database::Result<()>,
        uploaded: Option<&String>,
        superseded: Option<String>,
        value: T,
    ) -> Result<T> {
        match saved {
            Ok(()) => {
                if let Some(old) = superseded {
                    release(self.blob, &old).await;
                }
                Ok(value)
            },
            Err(err) => {
                if let Some(new) = uploaded {
                    release(self.blob, new).await;
                }
                Err(err.into())
            },
        }
    }

    pub async fn complete_employer(
        &self,
        user_id: Uuid,
        details: EmployerDetails,
        logo: Option<Upload>,
    ) -> Result<EmployerProfile> {
        let mut profile = self
            .db
            .profiles
            .find_employer(user_id)
            .await?
            .unwrap_or_else(|| EmployerProfile::empty(user_id));

        profile.name = required("name", details.name)?;
        profile.address = required("address", details.address)?;
        profile.phone = required("phone", details.phone)?;
        profile.description = required("description", details.description)?;

        let uploaded = logo.is_some();
        let superseded = self
            .swap_asset(&mut profile.logo_url, logo, LOGO_PREFIX, user_id)
            .await?;
        profile.is_profile_complete = true;
        profile.updated_at = Utc::now();

        let saved = self.db.profiles.save_employer(&profile).await;
        let new_url = profile.logo_url.clone().filter(|_| uploaded);
        let profile = self
            .settle(saved, new_url.as_ref(), superseded, profile)
            .await?;

        tracing::info!(%user_id, "employer profile completed");
        Ok(profile)
    }

    pub async fn complete_seeker(
        &self,
        user_id: Uuid,
        details: SeekerDetails,
        photo: Option<Upload>,
    ) -> Result<SeekerProfile> {
        if details.gender == Gender::Unspecified {
            return Err(ServerError::field("gender", "gender", "Gender must be Male, Female or Other."));
        }

        let mut profile = self
            .db
            .profiles
            .find_seeker(user_id)
            .await?
            .unwrap_or_else(|| SeekerProfile::empty(user_id));

        profile.name = required("name", details.name)?;
        profile.address = required("address", details.address)?;
        profile.phone = required("phone", details.phone)?;
        profile.date_of_birth = Some(details.date_of_birth);
        profile.gender = details.gender;

        let uploaded = photo.is_some();
        let superseded = self
            .swap_asset(&mut profile.photo_url, photo, PHOTO_PREFIX, user_id)
            .await?;
        profile.is_profile_complete = true;
        profile.updated_at = Utc::now();

        let saved = self.db.profiles.save_seeker(&profile).await;
        let new_url = profile.photo_url.clone().filter(|_| uploaded);
        let profile = self
            .settle(saved, new_url.as_ref(), superseded, profile)
            .await?;

        tracing::info!(%user_id, "seeker profile completed");
        Ok(profile)
    }

    pub async fn employer(&self, user_id: Uuid) -> Result<EmployerProfile> {
        self.db
            .profiles
            .find_employer(user_id)
            .await?
            .ok_or(ServerError::NotFound("company profile"))
    }

    pub async fn seeker(&self, user_id: Uuid) -> Result<SeekerProfile> {
        self.db
            .profiles
            .find_seeker(user_id)
            .await?
            .ok_or(ServerError::NotFound("society profile"))
    }

    /// Apply present fields only. A new logo replaces the previous one.
    pub async fn update_employer(
        &self,
        user_id: Uuid,
        patch: EmployerPatch,
        logo: Option<Upload>,
    ) -> Result<EmployerProfile> {
        let patch = EmployerPatch {
            name: non_empty("name", patch.name)?,
            address: non_empty("address", patch.address)?,
            phone: non_empty("phone", patch.phone)?,
            description: non_empty("description", patch.description)?,
        };

        let mut profile = self.employer(user_id).await?;
        patch.apply(&mut profile);

        let uploaded = logo.is_some();
        let superseded = self
            .swap_asset(&mut profile.logo_url, logo, LOGO_PREFIX, user_id)
            .await?;

        let saved = self.db.profiles.save_employer(&profile).await;
        let new_url = profile.logo_url.clone().filter(|_| uploaded);
        let profile = self
            .settle(saved, new_url.as_ref(), superseded, profile)
            .await?;

        tracing::debug!(%user_id, "employer profile updated");
        Ok(profile)
    }

    /// Apply present fields only. A new photo replaces the previous one.
    pub async fn update_seeker(
        &self,
        user_id: Uuid,
        patch: SeekerPatch,
        photo: Option<Upload>,
    ) -> Result<SeekerProfile> {
        if patch.gender == Some(Gender::Unspecified) {
            return Err(ServerError::field("gender", "gender", "Gender must be Male, Female or Other."));
        }
        let patch = SeekerPatch {
            name: non_empty("name", patch.name)?,
            address: non_empty("address", patch.address)?,
            phone: non_empty("phone", patch.phone)?,
            ..patch
        };

        let mut profile = self.seeker(user_id).await?;
        patch.apply(&mut profile);

        let uploaded = photo.is_some();
        let superseded = self
            .swap_asset(&mut profile.photo_url, photo, PHOTO_PREFIX, user_id)
            .await?;

        let saved = self.db.profiles.save_seeker(&profile).await;
        let new_url = profile.photo_url.clone().filter(|_| uploaded);
        let profile = self
            .settle(saved, new_url.as_ref(), superseded, profile)
            .await?;

        tracing::debug!(%user_id, "seeker profile updated");
        Ok(profile)
    }
}
