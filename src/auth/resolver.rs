use tracing::{info, warn};

use super::error::{AuthError, Rejection};
use crate::users::{NewUser, Role, StoreError, User, UserStore};

/// Provider identity after the required fields have been checked.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub external_id: String,
    pub email: String,
    pub display_name: Option<String>,
}

#[derive(Debug)]
pub struct Resolved {
    pub user: User,
    pub created: bool,
}

async fn find_linked(
    users: &dyn UserStore,
    identity: &VerifiedIdentity,
) -> Result<Option<User>, StoreError> {
    if let Some(user) = users.find_by_federated_id(&identity.external_id).await? {
        return Ok(Some(user));
    }
    users.find_by_email(&identity.email).await
}

async fn reconcile(
    users: &dyn UserStore,
    user: User,
    identity: &VerifiedIdentity,
) -> Result<User, AuthError> {
    // Checked before any write so a privileged account is never linked here.
    if user.role != Role::Patient {
        warn!(
            user_id = %user.id,
            role = %user.role,
            "federated login for privileged account refused"
        );
        return Err(Rejection::FederatedRoleNotAllowed.into());
    }

    let needs_link = user.federated_id.is_none();
    let rename = identity
        .display_name
        .as_deref()
        .filter(|name| user.display_name.as_deref() != Some(*name));
    if !needs_link && rename.is_none() {
        return Ok(user);
    }

    let updated = users
        .link_federated(user.id, &identity.external_id, rename)
        .await?;
    if needs_link {
        info!(user_id = %updated.id, "federated id linked to existing account");
    }
    Ok(updated)
}

/// Finds the account for a federated identity, by external id first and then
/// by email, or creates a patient account for it.
pub async fn resolve_federated(
    users: &dyn UserStore,
    identity: &VerifiedIdentity,
) -> Result<Resolved, AuthError> {
    if let Some(user) = find_linked(users, identity).await? {
        let user = reconcile(users, user, identity).await?;
        return Ok(Resolved {
            user,
            created: false,
        });
    }

    let new = NewUser {
        role: Role::Patient,
        email: identity.email.clone(),
        password_hash: None,
        federated_id: Some(identity.external_id.clone()),
        display_name: identity.display_name.clone(),
    };
    match users.insert(new).await {
        Ok(user) => {
            info!(user_id = %user.id, "account created from federated identity");
            Ok(Resolved {
                user,
                created: true,
            })
        }
        // A concurrent login for the same identity won the insert.
        Err(StoreError::Duplicate) => match find_linked(users, identity).await? {
            Some(user) => {
                let user = reconcile(users, user, identity).await?;
                Ok(Resolved {
                    user,
                    created: false,
                })
            }
            None => Err(StoreError::Duplicate.into()),
        },
        Err(e) => Err(e.into()),
    }
}
