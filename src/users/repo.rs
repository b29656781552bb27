use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::repo_types::{
    ConsultantProfile, DoctorProfile, NewUser, PatientProfile, User, UserRow,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint (email or federated id) rejected the write.
    #[error("user already exists")]
    Duplicate,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err.as_database_error() {
            Some(db) if db.is_unique_violation() => StoreError::Duplicate,
            _ => StoreError::Backend(err.into()),
        }
    }
}

/// Persistence of user records. Email and federated id are unique.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_federated_id(&self, federated_id: &str) -> Result<Option<User>, StoreError>;
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
    /// Sets `federated_id` when the record has none yet and replaces
    /// `display_name` when one is given.
    async fn link_federated(
        &self,
        id: Uuid,
        federated_id: &str,
        display_name: Option<&str>,
    ) -> Result<User, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn into_user(row: UserRow) -> Result<User, StoreError> {
    Ok(User::try_from(row)?)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, role, email, password_hash, federated_id, display_name,
                   patient_profile, doctor_profile, consultant_profile
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(into_user).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, role, email, password_hash, federated_id, display_name,
                   patient_profile, doctor_profile, consultant_profile
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        row.map(into_user).transpose()
    }

    async fn find_by_federated_id(&self, federated_id: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, role, email, password_hash, federated_id, display_name,
                   patient_profile, doctor_profile, consultant_profile
            FROM users
            WHERE federated_id = $1
            "#,
        )
        .bind(federated_id)
        .fetch_optional(&self.db)
        .await?;
        row.map(into_user).transpose()
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (role, email, password_hash, federated_id, display_name,
                               patient_profile, doctor_profile, consultant_profile)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, role, email, password_hash, federated_id, display_name,
                      patient_profile, doctor_profile, consultant_profile
            "#,
        )
        .bind(user.role.as_str())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.federated_id)
        .bind(&user.display_name)
        .bind(Json(PatientProfile::default()))
        .bind(Json(DoctorProfile::default()))
        .bind(Json(ConsultantProfile::default()))
        .fetch_one(&self.db)
        .await?;
        into_user(row)
    }

    async fn link_federated(
        &self,
        id: Uuid,
        federated_id: &str,
        display_name: Option<&str>,
    ) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
               SET federated_id = COALESCE(federated_id, $2),
                   display_name = COALESCE($3, display_name)
             WHERE id = $1
            RETURNING id, role, email, password_hash, federated_id, display_name,
                      patient_profile, doctor_profile, consultant_profile
            "#,
        )
        .bind(id)
        .bind(federated_id)
        .bind(display_name)
        .fetch_one(&self.db)
        .await?;
        into_user(row)
    }
}
