//! Storage key constants.

/// Storage keys used by the token store
pub struct StorageKeys;

impl StorageKeys {
    /// Short-lived bearer credential
    pub const ACCESS_TOKEN: &'static str = "admin_access_token";

    /// Credential exchanged for a new access token
    pub const REFRESH_TOKEN: &'static str = "admin_refresh_token";

    /// Cached admin profile (JSON)
    pub const PROFILE: &'static str = "admin_profile";

    /// All session keys, in write order.
    pub const SESSION: [&'static str; 3] = [Self::ACCESS_TOKEN, Self::REFRESH_TOKEN, Self::PROFILE];
}
