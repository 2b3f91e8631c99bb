use crate::app_config::Settings;
use crate::errors::AppError;
use crate::event_types::ActivityRecord;
use crate::network::session::{ConnectionStatus, ServerProbe, Session};
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
struct LoginPayload {
    token: Option<String>,
    #[serde(rename = "userId")]
    user_id: Option<i64>,
    role: Option<String>,
    #[serde(default)]
    permissions: HashMap<String, bool>,
}

enum LoginAttempt {
    Authenticated,
    /// 200 without a token in the payload; not retried.
    NoToken,
    /// Credential or authorization failure; not retried.
    Rejected(String),
    /// Connection failure, 5xx or other request error; retried, and the
    /// carried status is what the session reports if retries run out.
    Transient(ConnectionStatus),
}

enum BatchAttempt {
    Accepted,
    /// 403: the server no longer accepts the token.
    TokenRejected,
    Transient(String),
}

/// Authenticated client for the tracking server.
///
/// All network failures are absorbed here: the public operations report
/// success or failure plus an updated [`ConnectionStatus`] on the session,
/// never a transport error.
pub struct ApiClient {
    http: Client,
    settings: Arc<Settings>,
    session: Session,
}

impl ApiClient {
    pub fn new(settings: Arc<Settings>) -> Result<Self, AppError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10)) // Connection phase timeout
            .user_agent(format!(
                "process-activity-client/{}",
                env!("CARGO_PKG_VERSION")
            ))
            .use_rustls_tls()
            .build()?;
        Ok(Self {
            http,
            settings,
            session: Session::new(),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Authenticates against `/api/users/login` and stores the credentials
    /// for silent refresh. Transient failures are retried with exponential
    /// backoff; credential failures are not.
    pub async fn login(&mut self, username: &str, password: &str) -> bool {
        self.session.remember_credentials(username, password);
        self.login_with_retries(username, password).await
    }

    async fn login_with_retries(&mut self, username: &str, password: &str) -> bool {
        let mut attempt: u32 = 0;
        loop {
            match self.try_login(username, password).await {
                LoginAttempt::Authenticated => {
                    tracing::info!("Authentication successful");
                    return true;
                }
                LoginAttempt::NoToken => {
                    tracing::error!("Authentication response contained no token");
                    self.session.auth_failed(ConnectionStatus::Failed);
                    return false;
                }
                LoginAttempt::Rejected(reason) => {
                    tracing::error!("Authentication rejected: {}", reason);
                    self.session.auth_failed(ConnectionStatus::Failed);
                    return false;
                }
                LoginAttempt::Transient(status) => {
                    if attempt >= self.settings.max_retries {
                        tracing::error!(
                            "Authentication failed after {} retries",
                            self.settings.max_retries
                        );
                        self.session.auth_failed(status);
                        return false;
                    }
                    attempt += 1;
                    let delay = login_backoff(attempt);
                    tracing::warn!(
                        "Authentication attempt failed, retrying in {:?} (attempt {}/{})",
                        delay,
                        attempt,
                        self.settings.max_retries
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    async fn try_login(&mut self, username: &str, password: &str) -> LoginAttempt {
        tracing::debug!("Attempting authentication for '{}'", username);
        let url = format!("{}/api/users/login", self.settings.server_url);
        let result = self
            .http
            .post(&url)
            .timeout(Duration::from_secs(self.settings.login_timeout_secs))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) if e.is_connect() => {
                tracing::warn!("Connection error during login: {}", e);
                return LoginAttempt::Transient(ConnectionStatus::ServerUnavailable);
            }
            Err(e) => {
                tracing::warn!("Login request error: {}", e);
                return LoginAttempt::Transient(ConnectionStatus::Error);
            }
        };

        let status = response.status();
        if status.is_server_error() {
            tracing::warn!("Login failed with server error: {}", status);
            return LoginAttempt::Transient(ConnectionStatus::ServerUnavailable);
        }
        if status != StatusCode::OK {
            return LoginAttempt::Rejected(format!("status {}", status));
        }

        let payload: LoginPayload = match response.json().await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Failed to read login response body: {}", e);
                return LoginAttempt::Transient(ConnectionStatus::Error);
            }
        };

        match payload.token {
            Some(token) if !token.is_empty() => {
                self.session.authenticated(
                    token,
                    payload.user_id,
                    payload.role,
                    payload.permissions,
                    Utc::now(),
                );
                LoginAttempt::Authenticated
            }
            _ => LoginAttempt::NoToken,
        }
    }

    /// Single choke point guaranteeing a fresh token before every
    /// authenticated call. Issues no network traffic while the current token
    /// is validated and younger than the refresh interval.
    pub async fn ensure_valid_token(&mut self, force_refresh: bool) -> bool {
        let interval = chrono::Duration::seconds(self.settings.token_refresh_interval_secs as i64);
        if !self.session.needs_refresh(Utc::now(), interval, force_refresh) {
            return true;
        }

        let Some(credentials) = self.session.credentials().cloned() else {
            tracing::warn!("Token refresh required but no credentials are stored");
            return false;
        };
        tracing::info!("Refreshing authentication token (forced: {})", force_refresh);
        self.login_with_retries(credentials.username(), credentials.password())
            .await
    }

    /// Submits one batch to `/api/logs/batch`. A 403 forces a token refresh
    /// and a resubmission of the same batch; other failures are retried with
    /// linear backoff. Both paths share the `max_retries` bound.
    pub async fn send_batch(&mut self, batch: &[ActivityRecord]) -> bool {
        let mut retry_count: u32 = 0;
        loop {
            if !self.ensure_valid_token(false).await {
                tracing::error!("Cannot send batch: no valid token");
                return false;
            }

            if batch.is_empty() {
                tracing::debug!("Empty batch, nothing to send");
                return true;
            }

            match self.post_batch(batch).await {
                BatchAttempt::Accepted => {
                    tracing::info!("Batch of {} records sent", batch.len());
                    return true;
                }
                BatchAttempt::TokenRejected => {
                    if retry_count >= self.settings.max_retries {
                        tracing::error!("Token still rejected after {} retries", retry_count);
                        return false;
                    }
                    tracing::warn!("Token rejected (403), forcing refresh");
                    self.session.invalidate_token();
                    if !self.ensure_valid_token(true).await {
                        return false;
                    }
                    retry_count += 1;
                }
                BatchAttempt::Transient(reason) => {
                    if retry_count >= self.settings.max_retries {
                        tracing::error!(
                            "Failed to send batch after {} retries: {}",
                            retry_count,
                            reason
                        );
                        return false;
                    }
                    retry_count += 1;
                    let delay = batch_backoff(retry_count);
                    tracing::warn!(
                        "Batch send failed ({}), retrying in {:?} (attempt {}/{})",
                        reason,
                        delay,
                        retry_count,
                        self.settings.max_retries
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    async fn post_batch(&self, batch: &[ActivityRecord]) -> BatchAttempt {
        tracing::debug!("Sending batch with {} records", batch.len());
        let url = format!("{}/api/logs/batch", self.settings.server_url);
        // Gated by ensure_valid_token, so the token is present here.
        let token = self.session.token().unwrap_or_default();
        let result = self
            .http
            .post(&url)
            .timeout(Duration::from_secs(self.settings.batch_timeout_secs))
            .bearer_auth(token)
            .json(batch)
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status();
                if status == StatusCode::OK {
                    BatchAttempt::Accepted
                } else if status == StatusCode::FORBIDDEN {
                    BatchAttempt::TokenRejected
                } else {
                    let body = response.text().await.unwrap_or_default();
                    BatchAttempt::Transient(format!("status {}: {}", status, body))
                }
            }
            Err(e) => BatchAttempt::Transient(e.to_string()),
        }
    }

    /// Clears the whole session. Purely local, always succeeds.
    pub fn logout(&mut self) {
        tracing::info!("Logging out, clearing session state");
        self.session.logout();
    }

    /// Unauthenticated liveness probe against `/api/test/tracking`. Any
    /// failure, including a timeout, reports the server as unreachable.
    pub async fn check_server_status(&self) -> ServerProbe {
        let url = format!("{}/api/test/tracking", self.settings.server_url);
        let result = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(self.settings.probe_timeout_secs))
            .send()
            .await;
        match result {
            Ok(response) if response.status() == StatusCode::OK => ServerProbe::Reachable,
            Ok(response) => {
                tracing::debug!("Liveness probe returned {}", response.status());
                ServerProbe::Unreachable
            }
            Err(e) => {
                tracing::debug!("Liveness probe failed: {}", e);
                ServerProbe::Unreachable
            }
        }
    }

    pub fn check_permission(&self, key: &str) -> bool {
        self.session.check_permission(key)
    }

    pub fn is_admin(&self) -> bool {
        self.session.is_admin()
    }

    pub fn is_superadmin(&self) -> bool {
        self.session.is_superadmin()
    }
}

fn login_backoff(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt))
}

fn batch_backoff(retry_count: u32) -> Duration {
    Duration::from_secs(2 * retry_count as u64)
}
