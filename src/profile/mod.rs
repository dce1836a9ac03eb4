//! Role-specific profiles, one per user.
mod service;

pub use service::*;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
    /// Not filled in yet.
    #[default]
    #[serde(rename = "")]
    Unspecified,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
            Gender::Unspecified => "",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown gender `{0}`")]
pub struct UnknownGender(pub String);

impl FromStr for Gender {
    type Err = UnknownGender;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Male" => Ok(Gender::Male),
            "Female" => Ok(Gender::Female),
            "Other" => Ok(Gender::Other),
            "" => Ok(Gender::Unspecified),
            other => Err(UnknownGender(other.to_owned())),
        }
    }
}

/// Company profile of an employer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployerProfile {
    pub user_id: Uuid,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub description: String,
    pub logo_url: Option<String>,
    pub is_profile_complete: bool,
    pub updated_at: DateTime<Utc>,
}

impl EmployerProfile {
    /// Empty profile created at registration.
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            name: String::default(),
            address: String::default(),
            phone: String::default(),
            description: String::default(),
            logo_url: None,
            is_profile_complete: false,
            updated_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> CompanySummary {
        CompanySummary {
            name: self.name.clone(),
            address: self.address.clone(),
            logo_url: self.logo_url.clone(),
        }
    }
}

/// Personal profile of a job seeker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeekerProfile {
    pub user_id: Uuid,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Gender,
    pub photo_url: Option<String>,
    pub is_profile_complete: bool,
    pub updated_at: DateTime<Utc>,
}

impl SeekerProfile {
    /// Empty profile created at registration.
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            name: String::default(),
            address: String::default(),
            phone: String::default(),
            date_of_birth: None,
            gender: Gender::Unspecified,
            photo_url: None,
            is_profile_complete: false,
            updated_at: Utc::now(),
        }
    }
}

/// Company fields embedded in position listings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanySummary {
    pub name: String,
    pub address: String,
    pub logo_url: Option<String>,
}

/// Applicant fields embedded in employer-side application listings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeekerSummary {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub photo_url: Option<String>,
}

/// Fields an employer may change. `None` leaves the stored value untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EmployerPatch {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub description: Option<String>,
}

impl EmployerPatch {
    pub fn apply(self, profile: &mut EmployerProfile) {
        if let Some(name) = self.name {
            profile.name = name;
        }
        if let Some(address) = self.address {
            profile.address = address;
        }
        if let Some(phone) = self.phone {
            profile.phone = phone;
        }
        if let Some(description) = self.description {
            profile.description = description;
        }
        profile.updated_at = Utc::now();
    }
}

/// Fields a seeker may change. `None` leaves the stored value untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SeekerPatch {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
}

impl SeekerPatch {
    pub fn apply(self, profile: &mut SeekerProfile) {
        if let Some(name) = self.name {
            profile.name = name;
        }
        if let Some(address) = self.address {
            profile.address = address;
        }
        if let Some(phone) = self.phone {
            profile.phone = phone;
        }
        if let Some(date_of_birth) = self.date_of_birth {
            profile.date_of_birth = Some(date_of_birth);
        }
        if let Some(gender) = self.gender {
            profile.gender = gender;
        }
        profile.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_keeps_absent_fields() {
        let mut profile = EmployerProfile::empty(Uuid::new_v4());
        profile.name = "Acme".into();
        profile.phone = "555-0100".into();

        EmployerPatch {
            address: Some("1 Main St".into()),
            ..Default::default()
        }
        .apply(&mut profile);

        assert_eq!(profile.name, "Acme");
        assert_eq!(profile.phone, "555-0100");
        assert_eq!(profile.address, "1 Main St");
    }

    #[test]
    fn test_gender_unspecified_is_empty_string() {
        assert_eq!(serde_json::to_string(&Gender::Unspecified).unwrap(), "\"\"");
        assert_eq!("".parse::<Gender>().unwrap(), Gender::Unspecified);
        assert!("Robot".parse::<Gender>().is_err());
    }
}
