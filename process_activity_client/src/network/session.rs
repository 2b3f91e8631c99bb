use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fmt;

/// Login credentials held for silent token refresh.
///
/// Keeping the plaintext password in memory is a deliberate simplification:
/// the server only re-issues tokens against the original credentials. A
/// stricter deployment can replace this holder with a token-only refresh
/// scheme without touching any call site.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Externally observable connection state, polled by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    NotConnected,
    Connected,
    Failed,
    ServerUnavailable,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::NotConnected => "Not connected",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Failed => "Failed",
            ConnectionStatus::ServerUnavailable => "Server unavailable",
            ConnectionStatus::Error => "Error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the unauthenticated liveness probe. Probe failures of any kind
/// surface as `Unreachable`, never as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerProbe {
    Reachable,
    Unreachable,
}

impl ServerProbe {
    pub fn is_reachable(self) -> bool {
        self == ServerProbe::Reachable
    }
}

/// Mutable authentication state owned by the API client.
///
/// Invariant: `token_validated` is only set by [`Session::authenticated`],
/// which also sets the token and the refresh timestamp, so a validated
/// session always has both.
#[derive(Debug, Default)]
pub struct Session {
    token: Option<String>,
    token_validated: bool,
    last_token_refresh: Option<DateTime<Utc>>,
    credentials: Option<Credentials>,
    user_id: Option<i64>,
    role: Option<String>,
    permissions: HashMap<String, bool>,
    status: ConnectionStatus,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn token_validated(&self) -> bool {
        self.token_validated
    }

    pub fn last_token_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_token_refresh
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn remember_credentials(&mut self, username: &str, password: &str) {
        self.credentials = Some(Credentials::new(username, password));
    }

    /// Records a successful login or refresh.
    pub fn authenticated(
        &mut self,
        token: String,
        user_id: Option<i64>,
        role: Option<String>,
        permissions: HashMap<String, bool>,
        now: DateTime<Utc>,
    ) {
        self.token = Some(token);
        self.token_validated = true;
        self.last_token_refresh = Some(now);
        self.user_id = user_id;
        self.role = role;
        self.permissions = permissions;
        self.status = ConnectionStatus::Connected;
    }

    /// Records a failed login or refresh. The token may still be present but
    /// is no longer trusted.
    pub fn auth_failed(&mut self, status: ConnectionStatus) {
        self.token_validated = false;
        self.status = status;
    }

    /// Marks the token as rejected by the server (403) so the next
    /// `ensure_valid_token` refreshes it.
    pub fn invalidate_token(&mut self) {
        self.token_validated = false;
    }

    /// Full local reset; no network interaction.
    pub fn logout(&mut self) {
        *self = Session::default();
    }

    /// Staleness decision for `ensure_valid_token`. Pure so the "no network
    /// call when fresh" property is checkable in isolation.
    pub fn needs_refresh(&self, now: DateTime<Utc>, interval: Duration, force: bool) -> bool {
        if force {
            return true;
        }
        let Some(last_refresh) = self.last_token_refresh else {
            return true;
        };
        if now - last_refresh >= interval {
            return true;
        }
        self.token.is_none() || !self.token_validated
    }

    /// Deny-by-default permission lookup over the login payload's map.
    pub fn check_permission(&self, key: &str) -> bool {
        self.permissions.get(key).copied().unwrap_or(false)
    }

    /// The backend encodes roles as EMPLOYEE / ADMIN / SUPERADMIN; a
    /// superadmin therefore also counts as admin.
    pub fn is_admin(&self) -> bool {
        self.role.as_deref().is_some_and(|role| role.contains("ADMIN"))
    }

    pub fn is_superadmin(&self) -> bool {
        self.role
            .as_deref()
            .is_some_and(|role| role.contains("SUPERADMIN"))
    }
}
