use tracing::{info, warn};

use super::{
    dto::{GoogleLoginRequest, LoginRequest, RegisterRequest},
    error::{AuthError, Rejection},
    password::hash_password,
    resolver::{resolve_federated, VerifiedIdentity},
};
use crate::{
    notify::{spawn_welcome, WelcomeMessage},
    oauth::FederatedProfile,
    state::AppState,
    users::{NewUser, Role, User},
};

/// Successful registration or login: the account and its fresh token.
#[derive(Debug)]
pub struct AuthOutcome {
    pub user: User,
    pub token: String,
}

fn normalize_email(email: Option<&str>) -> Option<String> {
    email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
}

fn requested_role(role: Option<&str>) -> Result<Role, Rejection> {
    match role.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(Role::Patient),
        Some(r) => r.parse().map_err(|_| Rejection::UnknownRole),
    }
}

fn issue(state: &AppState, user: User) -> Result<AuthOutcome, AuthError> {
    let token = state.jwt.sign(user.id)?;
    Ok(AuthOutcome { user, token })
}

pub async fn register(state: &AppState, req: RegisterRequest) -> Result<AuthOutcome, AuthError> {
    let email = normalize_email(req.email.as_deref()).ok_or(Rejection::EmailRequired)?;
    let role = requested_role(req.role.as_deref())?;

    let password = role
        .policy()
        .validate_registration(&state.config.role_keys, &req)
        .inspect_err(|r| warn!(%email, %role, reason = %r, "registration rejected"))?;
    let password_hash = password.map(hash_password).transpose()?;

    // The unique index on email decides "User already exists".
    let user = state
        .users
        .insert(NewUser {
            role,
            email,
            password_hash,
            federated_id: None,
            display_name: req.display_name.filter(|n| !n.is_empty()),
        })
        .await
        .map_err(AuthError::from)
        .inspect_err(|e| {
            if let Some(r) = e.rejection() {
                warn!(reason = %r, "registration rejected");
            }
        })?;

    let outcome = issue(state, user)?;
    spawn_welcome(
        state.notifier.clone(),
        WelcomeMessage::registered(&outcome.user),
    );
    info!(user_id = %outcome.user.id, role = %outcome.user.role, "user registered");
    Ok(outcome)
}

pub async fn login(state: &AppState, req: LoginRequest) -> Result<AuthOutcome, AuthError> {
    let email = normalize_email(req.email.as_deref()).ok_or(Rejection::LoginEmailRequired)?;
    let role = requested_role(req.role.as_deref())?;

    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!(%email, "login unknown email");
        return Err(Rejection::UnknownEmail.into());
    };

    if user.role != role {
        warn!(user_id = %user.id, stored = %user.role, requested = %role, "login role mismatch");
        return Err(Rejection::RoleMismatch.into());
    }

    role.policy()
        .validate_login(&state.config.role_keys, &user, &req)
        .inspect_err(|e| {
            if let Some(r) = e.rejection() {
                warn!(user_id = %user.id, reason = %r, "login rejected");
            }
        })?;

    let outcome = issue(state, user)?;
    info!(user_id = %outcome.user.id, role = %outcome.user.role, "user logged in");
    Ok(outcome)
}

/// Shared by the OAuth callback and the mobile/SPA Google login.
pub async fn federated_login(
    state: &AppState,
    requested: Option<&str>,
    profile: FederatedProfile,
) -> Result<AuthOutcome, AuthError> {
    let external_id = profile.external_id.filter(|id| !id.trim().is_empty());
    let email = normalize_email(profile.email.as_deref());
    let (Some(external_id), Some(email)) = (external_id, email) else {
        warn!("federated login without id or email");
        return Err(Rejection::MissingFederatedData.into());
    };

    if requested_role(requested) != Ok(Role::Patient) {
        warn!(%email, "federated login for non-patient role refused");
        return Err(Rejection::FederatedRoleNotAllowed.into());
    }

    let display_name = profile.display_name.filter(|n| !n.is_empty()).or_else(|| {
        let joined = [profile.given_name, profile.family_name]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        (!joined.is_empty()).then_some(joined)
    });

    let identity = VerifiedIdentity {
        external_id,
        email,
        display_name,
    };
    let resolved = resolve_federated(state.users.as_ref(), &identity).await?;
    if resolved.created {
        spawn_welcome(
            state.notifier.clone(),
            WelcomeMessage::federated(&resolved.user),
        );
    }

    let outcome = issue(state, resolved.user)?;
    info!(user_id = %outcome.user.id, "user logged in with google");
    Ok(outcome)
}

impl From<GoogleLoginRequest> for FederatedProfile {
    fn from(req: GoogleLoginRequest) -> Self {
        Self {
            external_id: req.google_id,
            display_name: req.display_name,
            email: req.email,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::UserStore;

    fn patient(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            role: Some("patient".into()),
            display_name: Some("A".into()),
            email: Some(email.into()),
            password: Some(password.into()),
            admin_key: None,
        }
    }

    fn doctor(email: &str, key: &str) -> RegisterRequest {
        RegisterRequest {
            role: Some("doctor".into()),
            email: Some(email.into()),
            admin_key: Some(key.into()),
            ..Default::default()
        }
    }

    fn login_req(
        role: &str,
        email: &str,
        password: Option<&str>,
        key: Option<&str>,
    ) -> LoginRequest {
        LoginRequest {
            role: Some(role.into()),
            email: Some(email.into()),
            password: password.map(Into::into),
            admin_key: key.map(Into::into),
        }
    }

    fn rejection(err: AuthError) -> Rejection {
        err.rejection().cloned().expect("validation rejection")
    }

    #[tokio::test]
    async fn patient_registers_then_logs_in() {
        let (state, store, notifier) = AppState::fake_parts();

        let registered = register(&state, patient("A@X.com ", "secret1")).await.unwrap();
        assert_eq!(registered.user.email, "a@x.com");
        assert_eq!(registered.user.role, Role::Patient);
        assert_eq!(state.jwt.verify(&registered.token).map(|c| c.id), Some(registered.user.id));

        let logged_in = login(&state, login_req("patient", "a@x.com", Some("secret1"), None))
            .await
            .unwrap();
        assert_eq!(logged_in.user.id, registered.user.id);
        assert_eq!(logged_in.user.role, Role::Patient);

        assert_eq!(store.len().await, 1);
        let sent = notifier.wait_for(1).await;
        assert_eq!(sent[0].body, "Welcome A, thanks for joining!");
    }

    #[tokio::test]
    async fn registration_validation_order() {
        let state = AppState::fake();

        let mut req = patient("", "secret1");
        req.role = Some("doctor".into());
        assert_eq!(rejection(register(&state, req).await.unwrap_err()), Rejection::EmailRequired);

        let mut req = patient("a@x.com", "");
        req.display_name = None;
        assert_eq!(
            rejection(register(&state, req).await.unwrap_err()),
            Rejection::PatientFieldsRequired
        );

        let mut req = patient("a@x.com", "secret1");
        req.role = Some("admin".into());
        assert_eq!(rejection(register(&state, req).await.unwrap_err()), Rejection::UnknownRole);
    }

    #[tokio::test]
    async fn wrong_admin_key_creates_nothing() {
        let (state, store, _) = AppState::fake_parts();

        let err = register(&state, doctor("d@x.com", "WRONG")).await.unwrap_err();
        assert_eq!(rejection(err), Rejection::InvalidAdminKey(Role::Doctor));

        let mut req = doctor("c@x.com", "doctor-key");
        req.role = Some("consultant".into());
        let err = register(&state, req).await.unwrap_err();
        assert_eq!(rejection(err), Rejection::InvalidAdminKey(Role::Consultant));

        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn email_is_unique_across_roles() {
        let state = AppState::fake();
        register(&state, patient("a@x.com", "secret1")).await.unwrap();

        let err = register(&state, patient("a@x.com", "other")).await.unwrap_err();
        assert_eq!(rejection(err), Rejection::UserExists);

        let err = register(&state, doctor("a@x.com", "doctor-key")).await.unwrap_err();
        assert_eq!(rejection(err), Rejection::UserExists);
    }

    #[tokio::test]
    async fn concurrent_duplicate_registrations_create_one_user() {
        let (state, store, _) = AppState::fake_parts();
        let (a, b) = tokio::join!(
            register(&state, patient("race@x.com", "secret1")),
            register(&state, patient("race@x.com", "secret1")),
        );
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn doctor_registers_and_logs_in_with_key_only() {
        let (state, store, _) = AppState::fake_parts();
        let registered = register(&state, doctor("d@x.com", "doctor-key")).await.unwrap();
        let stored = store.find_by_id(registered.user.id).await.unwrap().unwrap();
        assert!(stored.password_hash().is_none());

        let ok = login(&state, login_req("doctor", "d@x.com", None, Some("doctor-key")))
            .await
            .unwrap();
        assert_eq!(ok.user.id, registered.user.id);

        let err = login(&state, login_req("doctor", "d@x.com", None, Some("nope")))
            .await
            .unwrap_err();
        assert_eq!(rejection(err), Rejection::InvalidLoginKey(Role::Doctor));
    }

    #[tokio::test]
    async fn login_rejections() {
        let state = AppState::fake();
        register(&state, patient("a@x.com", "secret1")).await.unwrap();

        let cases = [
            (login_req("patient", "  ", Some("secret1"), None), Rejection::LoginEmailRequired),
            (login_req("patient", "b@x.com", Some("secret1"), None), Rejection::UnknownEmail),
            (login_req("doctor", "a@x.com", None, Some("doctor-key")), Rejection::RoleMismatch),
            (login_req("patient", "a@x.com", None, None), Rejection::PasswordRequired),
            (login_req("patient", "a@x.com", Some("secret2"), None), Rejection::InvalidPassword),
        ];
        for (req, expected) in cases {
            assert_eq!(rejection(login(&state, req).await.unwrap_err()), expected);
        }
    }

    #[tokio::test]
    async fn federated_login_links_local_account() {
        let (state, store, notifier) = AppState::fake_parts();
        let local = register(&state, patient("a@x.com", "secret1")).await.unwrap();
        notifier.wait_for(1).await;

        let profile = FederatedProfile {
            external_id: Some("g-1".into()),
            email: Some("a@x.com".into()),
            display_name: Some("A".into()),
            ..Default::default()
        };
        let outcome = federated_login(&state, None, profile).await.unwrap();
        assert_eq!(outcome.user.id, local.user.id);
        assert_eq!(outcome.user.federated_id.as_deref(), Some("g-1"));
        assert_eq!(store.len().await, 1);

        // Password login still works after linking.
        login(&state, login_req("patient", "a@x.com", Some("secret1"), None))
            .await
            .unwrap();
        assert_eq!(notifier.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn federated_login_requires_data_and_patient_role() {
        let state = AppState::fake();

        let missing = FederatedProfile {
            external_id: Some("g-1".into()),
            ..Default::default()
        };
        let err = federated_login(&state, None, missing).await.unwrap_err();
        assert_eq!(rejection(err), Rejection::MissingFederatedData);

        let profile = FederatedProfile {
            external_id: Some("g-1".into()),
            email: Some("g@x.com".into()),
            ..Default::default()
        };
        let err = federated_login(&state, Some("doctor"), profile.clone())
            .await
            .unwrap_err();
        assert_eq!(rejection(err), Rejection::FederatedRoleNotAllowed);

        let created = federated_login(&state, Some("patient"), profile).await.unwrap();
        assert_eq!(created.user.role, Role::Patient);
    }

    #[tokio::test]
    async fn federated_name_falls_back_to_given_and_family() {
        let (state, _, notifier) = AppState::fake_parts();
        let profile = FederatedProfile {
            external_id: Some("g-7".into()),
            email: Some("n@x.com".into()),
            given_name: Some("Ann".into()),
            family_name: Some("Lee".into()),
            ..Default::default()
        };
        let outcome = federated_login(&state, None, profile).await.unwrap();
        assert_eq!(outcome.user.display_name.as_deref(), Some("Ann Lee"));
        let sent = notifier.wait_for(1).await;
        assert_eq!(sent[0].body, "Welcome Ann Lee, thanks for joining with Google!");
    }
}
