use std::fmt;

/// Customer-service session id (`external_userid` on the WeCom side).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Corp id + app secret used to obtain an access token.
#[derive(Clone, PartialEq, Eq)]
pub struct AppCredentials {
    pub corp_id: String,
    pub secret: String,
}

impl fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppCredentials")
            .field("corp_id", &self.corp_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Token as returned by the identity endpoint, before caching.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    /// Provider-reported lifetime in seconds, if present.
    pub expires_in: Option<u64>,
}

/// Who is currently handling a customer-service session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceState {
    Untreated,
    Bot,
    /// Waiting in the human agents' queue.
    Queued,
    Human,
    Closed,
    Other(i64),
}

impl ServiceState {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => ServiceState::Untreated,
            1 => ServiceState::Bot,
            2 => ServiceState::Queued,
            3 => ServiceState::Human,
            4 => ServiceState::Closed,
            other => ServiceState::Other(other),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            ServiceState::Untreated => 0,
            ServiceState::Bot => 1,
            ServiceState::Queued => 2,
            ServiceState::Human => 3,
            ServiceState::Closed => 4,
            ServiceState::Other(c) => c,
        }
    }

    /// Queued for, or already served by, a human agent.
    pub fn is_human_engaged(self) -> bool {
        matches!(self, ServiceState::Queued | ServiceState::Human)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_state_codes() {
        for code in 0..=4 {
            assert_eq!(ServiceState::from_code(code).code(), code);
        }
        assert_eq!(ServiceState::from_code(9), ServiceState::Other(9));
        assert!(ServiceState::from_code(2).is_human_engaged());
        assert!(ServiceState::from_code(3).is_human_engaged());
        assert!(!ServiceState::from_code(1).is_human_engaged());
        assert!(!ServiceState::from_code(-1).is_human_engaged());
    }

    #[test]
    fn credentials_debug_hides_secret() {
        let creds = AppCredentials {
            corp_id: "ww123".to_string(),
            secret: "hunter2".to_string(),
        };
        let s = format!("{creds:?}");
        assert!(s.contains("ww123"));
        assert!(!s.contains("hunter2"));
    }
}
