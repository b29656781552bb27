use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use uuid::Uuid;

/// Principal types served by the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Patient,
    Doctor,
    Consultant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Consultant => "consultant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role `{0}`")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "consultant" => Ok(Role::Consultant),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientProfile {
    pub reports: Vec<Uuid>,
    pub feedbacks: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoctorProfile {
    pub specialization: Option<String>,
    pub patients: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConsultantProfile {
    pub expertise: Option<String>,
    pub referred_patients: Vec<Uuid>,
}

/// How a stored account proves its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Password { hash: String },
    FederatedOnly { external_id: String },
    KeyGated { role: Role },
}

/// Row as stored in the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub role: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub federated_id: Option<String>,
    pub display_name: Option<String>,
    pub patient_profile: Json<PatientProfile>,
    pub doctor_profile: Json<DoctorProfile>,
    pub consultant_profile: Json<ConsultantProfile>,
}

/// User record with its credential resolved. Never serialized directly;
/// responses go through [`PublicUser`].
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub role: Role,
    pub email: String,
    pub credential: Credential,
    pub federated_id: Option<String>,
    pub display_name: Option<String>,
    pub patient_profile: PatientProfile,
    pub doctor_profile: DoctorProfile,
    pub consultant_profile: ConsultantProfile,
}

impl User {
    pub fn password_hash(&self) -> Option<&str> {
        match &self.credential {
            Credential::Password { hash } => Some(hash),
            _ => None,
        }
    }
}

pub(crate) fn credential_for(
    role: Role,
    password_hash: Option<String>,
    federated_id: Option<&str>,
) -> Option<Credential> {
    match (password_hash, role) {
        (Some(hash), _) => Some(Credential::Password { hash }),
        (None, Role::Doctor | Role::Consultant) => Some(Credential::KeyGated { role }),
        (None, Role::Patient) => federated_id.map(|id| Credential::FederatedOnly {
            external_id: id.to_string(),
        }),
    }
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: Role = row.role.parse()?;
        let credential = credential_for(role, row.password_hash, row.federated_id.as_deref())
            .ok_or_else(|| anyhow::anyhow!("user {} has no usable credential", row.id))?;
        Ok(User {
            id: row.id,
            role,
            email: row.email,
            credential,
            federated_id: row.federated_id,
            display_name: row.display_name,
            patient_profile: row.patient_profile.0,
            doctor_profile: row.doctor_profile.0,
            consultant_profile: row.consultant_profile.0,
        })
    }
}

/// Fields required to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub role: Role,
    pub email: String,
    pub password_hash: Option<String>,
    pub federated_id: Option<String>,
    pub display_name: Option<String>,
}

/// Public part of the user returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub email: String,
    pub role: Role,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}
