use serde::{Deserialize, Serialize};

const DEFAULT_USERNAME: &str = "Player";
const NIL_UUID: &str = "00000000-0000-0000-0000-000000000000";
const OFFLINE_TOKEN: &str = "offline_access_token";
const LEGACY_USER_TYPE: &str = "legacy";

/// Identity handed to the game. Supplied by the caller; nothing here
/// generates or stores credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LaunchAccountProfile {
    pub username: String,
    pub uuid: String,
    pub access_token: String,
    pub user_type: String,
}

impl Default for LaunchAccountProfile {
    fn default() -> Self {
        Self::offline(DEFAULT_USERNAME)
    }
}

impl LaunchAccountProfile {
    pub fn offline(username: &str) -> Self {
        Self {
            username: username.trim().to_string(),
            uuid: NIL_UUID.into(),
            access_token: OFFLINE_TOKEN.into(),
            user_type: LEGACY_USER_TYPE.into(),
        }
    }

    /// Fill blank fields with placeholders the game accepts.
    pub fn sanitized(mut self) -> Self {
        if self.username.trim().is_empty() {
            self.username = DEFAULT_USERNAME.into();
        }
        if self.uuid.trim().is_empty() {
            self.uuid = NIL_UUID.into();
        }
        if self.access_token.trim().is_empty() {
            self.access_token = OFFLINE_TOKEN.into();
        }
        if self.user_type.trim().is_empty() {
            self.user_type = LEGACY_USER_TYPE.into();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitized_fills_blank_fields() {
        let profile = LaunchAccountProfile {
            username: "  ".into(),
            uuid: String::new(),
            access_token: String::new(),
            user_type: String::new(),
        }
        .sanitized();

        assert_eq!(profile.username, "Player");
        assert_eq!(profile.uuid, NIL_UUID);
        assert_eq!(profile.access_token, OFFLINE_TOKEN);
        assert_eq!(profile.user_type, "legacy");
    }

    #[test]
    fn sanitized_keeps_supplied_values() {
        let profile = LaunchAccountProfile {
            username: "Alex".into(),
            uuid: "c0ffee00-0000-0000-0000-000000000001".into(),
            access_token: "token".into(),
            user_type: "msa".into(),
        };
        assert_eq!(profile.clone().sanitized(), profile);
    }

    #[test]
    fn offline_trims_the_name() {
        let profile = LaunchAccountProfile::offline(" Steve ");
        assert_eq!(profile.username, "Steve");
        assert_eq!(profile.user_type, "legacy");
    }
}
