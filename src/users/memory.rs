use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    repo::{StoreError, UserStore},
    repo_types::{credential_for, NewUser, User},
};

/// In-process store enforcing the same unique constraints as the `users` table.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<User>>,
}

impl MemoryUserStore {
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_federated_id(&self, federated_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.federated_id.as_deref() == Some(federated_id))
            .cloned())
    }

    async fn insert(&self, new: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        let taken = users.iter().any(|u| {
            u.email == new.email
                || (new.federated_id.is_some() && u.federated_id == new.federated_id)
        });
        if taken {
            return Err(StoreError::Duplicate);
        }
        let credential = credential_for(new.role, new.password_hash, new.federated_id.as_deref())
            .ok_or_else(|| anyhow::anyhow!("new user has no usable credential"))?;
        let user = User {
            id: Uuid::new_v4(),
            role: new.role,
            email: new.email,
            credential,
            federated_id: new.federated_id,
            display_name: new.display_name,
            patient_profile: Default::default(),
            doctor_profile: Default::default(),
            consultant_profile: Default::default(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn link_federated(
        &self,
        id: Uuid,
        federated_id: &str,
        display_name: Option<&str>,
    ) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users
            .iter()
            .any(|u| u.id != id && u.federated_id.as_deref() == Some(federated_id))
        {
            return Err(StoreError::Duplicate);
        }
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| anyhow::anyhow!("user {id} not found"))?;
        if user.federated_id.is_none() {
            user.federated_id = Some(federated_id.to_string());
        }
        if let Some(name) = display_name {
            user.display_name = Some(name.to_string());
        }
        Ok(user.clone())
    }
}

/// Every call fails as if the database were unreachable.
pub struct UnavailableUserStore;

fn unavailable() -> StoreError {
    StoreError::Backend(anyhow::anyhow!("connection refused"))
}

#[async_trait]
impl UserStore for UnavailableUserStore {
    async fn find_by_id(&self, _id: Uuid) -> Result<Option<User>, StoreError> {
        Err(unavailable())
    }

    async fn find_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
        Err(unavailable())
    }

    async fn find_by_federated_id(&self, _federated_id: &str) -> Result<Option<User>, StoreError> {
        Err(unavailable())
    }

    async fn insert(&self, _user: NewUser) -> Result<User, StoreError> {
        Err(unavailable())
    }

    async fn link_federated(
        &self,
        _id: Uuid,
        _federated_id: &str,
        _display_name: Option<&str>,
    ) -> Result<User, StoreError> {
        Err(unavailable())
    }
}
