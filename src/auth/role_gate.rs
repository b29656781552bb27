use crate::{config::RoleKeys, users::Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid admin key for role {0}")]
pub struct InvalidKey(pub Role);

/// Patients are always admitted; doctors and consultants only with the exact
/// configured secret for their role.
pub fn admit_role(keys: &RoleKeys, role: Role, supplied: Option<&str>) -> Result<(), InvalidKey> {
    let expected = match role {
        Role::Patient => return Ok(()),
        Role::Doctor => keys.doctor.as_str(),
        Role::Consultant => keys.consultant.as_str(),
    };
    match supplied {
        Some(key) if key == expected => Ok(()),
        _ => Err(InvalidKey(role)),
    }
}
