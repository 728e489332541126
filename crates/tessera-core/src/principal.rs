//! The authenticated caller. Built by the server's auth middleware from
//! either an API key or a session cookie, then threaded through every
//! handler and into `CoreService` so authorization stays in one place.

use uuid::Uuid;

use crate::error::{ErrorCode, Result, TesseraError};
use crate::types::{ApiKeyScope, UserRole};

/// Widens a role into the scopes it implicitly carries. Mirrors the
/// role-to-scope table: a plain user can only read, a team admin can read
/// and write within their team, and a global admin can do anything.
pub fn scopes_for_role(role: UserRole) -> Vec<ApiKeyScope> {
    match role {
        UserRole::User => vec![ApiKeyScope::Read],
        UserRole::TeamAdmin => vec![ApiKeyScope::Read, ApiKeyScope::Write],
        UserRole::Admin => vec![ApiKeyScope::Read, ApiKeyScope::Write, ApiKeyScope::Admin],
    }
}

#[derive(Debug, Clone)]
pub struct Principal {
    pub team_id: Uuid,
    pub user_id: Option<Uuid>,
    pub scopes: Vec<ApiKeyScope>,
    /// `None` for an API-key principal; an API key has no notion of a name.
    pub user_email: Option<String>,
}

impl Principal {
    pub fn has_scope(&self, scope: ApiKeyScope) -> bool {
        self.scopes.contains(&scope)
    }

    pub fn require_scope(&self, scope: ApiKeyScope) -> Result<()> {
        if self.has_scope(scope) {
            Ok(())
        } else {
            Err(TesseraError::forbidden(
                ErrorCode::InsufficientScope,
                format!("caller lacks required scope: {scope:?}"),
            ))
        }
    }

    pub fn is_admin(&self) -> bool {
        self.has_scope(ApiKeyScope::Admin)
    }

    /// Resource-level ownership check: the caller's team matches
    /// `owner_team_id`, or the caller holds the admin scope.
    pub fn owns_or_admin(&self, owner_team_id: Uuid) -> Result<()> {
        if self.is_admin() || self.team_id == owner_team_id {
            Ok(())
        } else {
            Err(TesseraError::forbidden(
                ErrorCode::UnauthorizedTeam,
                "caller's team does not own this resource",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_scope_widening() {
        assert_eq!(scopes_for_role(UserRole::User), vec![ApiKeyScope::Read]);
        assert_eq!(
            scopes_for_role(UserRole::TeamAdmin),
            vec![ApiKeyScope::Read, ApiKeyScope::Write]
        );
        assert_eq!(
            scopes_for_role(UserRole::Admin),
            vec![ApiKeyScope::Read, ApiKeyScope::Write, ApiKeyScope::Admin]
        );
    }

    #[test]
    fn owns_or_admin_allows_owner_and_admin_denies_others() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let p = Principal {
            team_id: owner,
            user_id: None,
            scopes: vec![ApiKeyScope::Read, ApiKeyScope::Write],
            user_email: None,
        };
        assert!(p.owns_or_admin(owner).is_ok());
        assert!(p.owns_or_admin(other).is_err());

        let admin = Principal {
            team_id: other,
            user_id: None,
            scopes: vec![ApiKeyScope::Admin],
            user_email: None,
        };
        assert!(admin.owns_or_admin(owner).is_ok());
    }
}
