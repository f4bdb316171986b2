//! Admin identity as returned by the auth endpoints and cached in the store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Admin role. Opaque to the session layer beyond display and route visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    SuperAdmin,
    Admin,
    Viewer,
}

impl AdminRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminRole::SuperAdmin => "super_admin",
            AdminRole::Admin => "admin",
            AdminRole::Viewer => "viewer",
        }
    }
}

impl fmt::Display for AdminRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated admin profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminProfile {
    pub admin_id: String,
    pub username: String,
    pub email: String,
    pub role: AdminRole,
    pub display_name: String,
    /// Capability flags derived server-side from the role.
    #[serde(default)]
    pub permissions: BTreeMap<String, bool>,
}

impl AdminProfile {
    /// Whether the server granted `permission`. Unknown flags are denied.
    pub fn can(&self, permission: &str) -> bool {
        self.permissions.get(permission).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_wire_shape() {
        let profile: AdminProfile = serde_json::from_value(serde_json::json!({
            "admin_id": "adm_1",
            "username": "admin",
            "email": "admin@example.com",
            "role": "super_admin",
            "display_name": "Site Admin",
            "permissions": {
                "can_manage_admins": true,
                "can_view_analytics": true,
                "can_manage_settings": false
            }
        }))
        .unwrap();

        assert_eq!(profile.role, AdminRole::SuperAdmin);
        assert!(profile.can("can_manage_admins"));
        assert!(!profile.can("can_manage_settings"));
        assert!(!profile.can("can_launch_rockets"));
    }

    #[test]
    fn test_missing_permissions_default_to_empty() {
        let profile: AdminProfile = serde_json::from_value(serde_json::json!({
            "admin_id": "adm_2",
            "username": "viewer",
            "email": "viewer@example.com",
            "role": "viewer",
            "display_name": "Read Only"
        }))
        .unwrap();

        assert!(profile.permissions.is_empty());
        assert_eq!(profile.role.to_string(), "viewer");
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let result: Result<AdminRole, _> = serde_json::from_str("\"owner\"");
        assert!(result.is_err());
    }
}
