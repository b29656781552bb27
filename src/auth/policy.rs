use super::{
    dto::{LoginRequest, RegisterRequest},
    error::{AuthError, Rejection},
    password::verify_password,
    role_gate::admit_role,
};
use crate::{
    config::RoleKeys,
    users::{Role, User},
};

/// Per-role registration and login rules.
pub trait RolePolicy: Send + Sync {
    /// Validates a registration and returns the plaintext password to hash, if
    /// this role stores one.
    fn validate_registration<'a>(
        &self,
        keys: &RoleKeys,
        req: &'a RegisterRequest,
    ) -> Result<Option<&'a str>, Rejection>;

    /// Checks the credentials of a login for `user`, whose role already
    /// matches the requested one.
    fn validate_login(
        &self,
        keys: &RoleKeys,
        user: &User,
        req: &LoginRequest,
    ) -> Result<(), AuthError>;
}

pub struct PatientPolicy;

/// Doctors and consultants: admitted by their role's admin key on every
/// registration and login, no password.
pub struct KeyGatedPolicy(Role);

static PATIENT: PatientPolicy = PatientPolicy;
static DOCTOR: KeyGatedPolicy = KeyGatedPolicy(Role::Doctor);
static CONSULTANT: KeyGatedPolicy = KeyGatedPolicy(Role::Consultant);

impl Role {
    pub fn policy(self) -> &'static dyn RolePolicy {
        match self {
            Role::Patient => &PATIENT,
            Role::Doctor => &DOCTOR,
            Role::Consultant => &CONSULTANT,
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl RolePolicy for PatientPolicy {
    fn validate_registration<'a>(
        &self,
        _keys: &RoleKeys,
        req: &'a RegisterRequest,
    ) -> Result<Option<&'a str>, Rejection> {
        match (present(&req.password), present(&req.display_name)) {
            (Some(password), Some(_)) => Ok(Some(password)),
            _ => Err(Rejection::PatientFieldsRequired),
        }
    }

    fn validate_login(
        &self,
        _keys: &RoleKeys,
        user: &User,
        req: &LoginRequest,
    ) -> Result<(), AuthError> {
        let password = present(&req.password).ok_or(Rejection::PasswordRequired)?;
        // Accounts created through Google have nothing to compare against.
        let hash = user.password_hash().ok_or(Rejection::InvalidPassword)?;
        if !verify_password(password, hash)? {
            return Err(Rejection::InvalidPassword.into());
        }
        Ok(())
    }
}

impl RolePolicy for KeyGatedPolicy {
    fn validate_registration<'a>(
        &self,
        keys: &RoleKeys,
        req: &'a RegisterRequest,
    ) -> Result<Option<&'a str>, Rejection> {
        admit_role(keys, self.0, req.admin_key.as_deref())
            .map_err(|_| Rejection::InvalidAdminKey(self.0))?;
        Ok(None)
    }

    fn validate_login(
        &self,
        keys: &RoleKeys,
        _user: &User,
        req: &LoginRequest,
    ) -> Result<(), AuthError> {
        admit_role(keys, self.0, req.admin_key.as_deref())
            .map_err(|_| Rejection::InvalidLoginKey(self.0))?;
        Ok(())
    }
}
