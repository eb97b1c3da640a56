use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Roles issued by the identity provider. The backend only consumes role
/// claims; token issuance lives outside this system.
pub const ROLE_RESIDENT: &str = "RESIDENT";
pub const ROLE_MANAGER: &str = "MANAGER";
pub const ROLE_ACCOUNTANT: &str = "ACCOUNTANT";
pub const ROLE_RECEPTIONIST: &str = "RECEPTIONIST";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: Option<String>,
    pub role: String,
    /// Primary residence, present on resident tokens.
    pub apartment_id: Option<Uuid>,
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }

    pub fn is_staff(&self) -> bool {
        matches!(
            self.role.as_str(),
            ROLE_MANAGER | ROLE_ACCOUNTANT | ROLE_RECEPTIONIST
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: &str) -> Claims {
        Claims {
            sub: Uuid::new_v4().to_string(),
            email: None,
            role: role.to_string(),
            apartment_id: None,
            exp: 0,
        }
    }

    #[test]
    fn staff_roles_are_recognized() {
        assert!(claims(ROLE_MANAGER).is_staff());
        assert!(claims(ROLE_ACCOUNTANT).is_staff());
        assert!(claims(ROLE_RECEPTIONIST).is_staff());
        assert!(!claims(ROLE_RESIDENT).is_staff());
    }

    #[test]
    fn non_uuid_subject_yields_no_user_id() {
        let mut c = claims(ROLE_RESIDENT);
        c.sub = "service-account".into();
        assert!(c.user_id().is_none());
    }
}
