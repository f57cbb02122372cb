//! Seam to the per-carrier authentication token store.
//!
//! Token issuance lives outside this crate; the workflow only asks whether
//! a usable token exists and whether a refresh succeeded.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CarrierId(pub String);

impl CarrierId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for CarrierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug)]
pub struct AuthToken {
    pub value: SecretString,
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self { value: SecretString::from(value.into()), expires_at }
    }

    /// Expired, or expiring within `grace_secs`. A window too large to
    /// represent counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>, grace_secs: i64) -> bool {
        Duration::try_seconds(grace_secs)
            .and_then(|grace| now.checked_add_signed(grace))
            .map_or(true, |deadline| self.expires_at <= deadline)
    }
}

#[async_trait]
pub trait TokenAccessor: Send + Sync {
    fn get(&self, carrier: &CarrierId) -> Option<AuthToken>;

    /// Missing tokens count as expired.
    fn is_expired(&self, carrier: &CarrierId, grace_secs: i64) -> bool;

    async fn refresh(&self, carrier: &CarrierId) -> bool;

    fn is_session_active(&self) -> bool;
}

/// Result of one authentication check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthVerdict {
    Recovered,
    Lost,
}

/// Checks `carrier`'s token, refreshing it when it is missing or inside
/// the expiry grace window. An inactive session is lost without a refresh.
pub async fn check_authentication(
    tokens: &dyn TokenAccessor,
    carrier: &CarrierId,
    grace_secs: i64,
) -> AuthVerdict {
    if !tokens.is_session_active() {
        return AuthVerdict::Lost;
    }
    if !tokens.is_expired(carrier, grace_secs) {
        return AuthVerdict::Recovered;
    }
    if tokens.refresh(carrier).await {
        AuthVerdict::Recovered
    } else {
        AuthVerdict::Lost
    }
}

/// Token store backed by a map, with scripted refresh results.
#[derive(Clone)]
pub struct InMemoryTokenAccessor {
    inner: Arc<Mutex<TokenTable>>,
    clock: Arc<dyn Clock>,
}

struct TokenTable {
    tokens: HashMap<CarrierId, AuthToken>,
    refreshed: HashMap<CarrierId, AuthToken>,
    session_active: bool,
    refresh_calls: u32,
}

impl Default for InMemoryTokenAccessor {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl InMemoryTokenAccessor {
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TokenTable {
                tokens: HashMap::new(),
                refreshed: HashMap::new(),
                session_active: true,
                refresh_calls: 0,
            })),
            clock,
        }
    }

    pub fn insert(&self, carrier: CarrierId, token: AuthToken) {
        self.with_table(|table| {
            table.tokens.insert(carrier, token);
        });
    }

    /// Token handed out by the next successful `refresh` for `carrier`;
    /// without one, refresh fails.
    pub fn stage_refresh(&self, carrier: CarrierId, token: AuthToken) {
        self.with_table(|table| {
            table.refreshed.insert(carrier, token);
        });
    }

    pub fn set_session_active(&self, active: bool) {
        self.with_table(|table| table.session_active = active);
    }

    pub fn refresh_calls(&self) -> u32 {
        self.with_table(|table| table.refresh_calls)
    }

    fn with_table<T>(&self, f: impl FnOnce(&mut TokenTable) -> T) -> T {
        match self.inner.lock() {
            Ok(mut table) => f(&mut table),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

#[async_trait]
impl TokenAccessor for InMemoryTokenAccessor {
    fn get(&self, carrier: &CarrierId) -> Option<AuthToken> {
        self.with_table(|table| table.tokens.get(carrier).cloned())
    }

    fn is_expired(&self, carrier: &CarrierId, grace_secs: i64) -> bool {
        let now = self.clock.now();
        self.get(carrier).map_or(true, |token| token.is_expired_at(now, grace_secs))
    }

    async fn refresh(&self, carrier: &CarrierId) -> bool {
        self.with_table(|table| {
            table.refresh_calls += 1;
            match table.refreshed.remove(carrier) {
                Some(token) => {
                    table.tokens.insert(carrier.clone(), token);
                    true
                }
                None => false,
            }
        })
    }

    fn is_session_active(&self) -> bool {
        self.with_table(|table| table.session_active)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use secrecy::ExposeSecret;

    use super::{
        check_authentication, AuthToken, AuthVerdict, CarrierId, InMemoryTokenAccessor,
        TokenAccessor,
    };
    use crate::clock::{Clock, ManualClock};

    #[test]
    fn grace_window_counts_as_expired() {
        let now = Utc::now();
        let token = AuthToken::new("t", now + Duration::seconds(30));
        assert!(token.is_expired_at(now, 60));
        assert!(!token.is_expired_at(now, 10));
    }

    #[test]
    fn unrepresentable_grace_window_counts_as_expired() {
        let now = Utc::now();
        let token = AuthToken::new("t", now + Duration::days(365));
        assert!(token.is_expired_at(now, i64::MAX));
        assert!(token.is_expired_at(now, i64::MIN));
    }

    #[tokio::test]
    async fn refresh_swaps_in_staged_token_once() {
        let clock = ManualClock::default();
        let tokens = InMemoryTokenAccessor::with_clock(Arc::new(clock.clone()));
        let carrier = CarrierId::new("estes");

        assert!(tokens.is_expired(&carrier, 0));
        let fresh = AuthToken::new("fresh", clock.now() + Duration::hours(1));
        tokens.stage_refresh(carrier.clone(), fresh);

        assert!(tokens.refresh(&carrier).await);
        assert!(!tokens.is_expired(&carrier, 60));
        assert_eq!(
            tokens.get(&carrier).map(|token| token.value.expose_secret().to_owned()),
            Some("fresh".to_owned())
        );
        assert!(!tokens.refresh(&carrier).await);
        assert_eq!(tokens.refresh_calls(), 2);
    }

    #[test]
    fn token_values_stay_out_of_debug_output() {
        let token = AuthToken::new("super-secret-token", Utc::now());
        assert!(!format!("{token:?}").contains("super-secret-token"));
    }

    #[tokio::test]
    async fn check_skips_refresh_for_a_live_token() {
        let clock = ManualClock::default();
        let tokens = InMemoryTokenAccessor::with_clock(Arc::new(clock.clone()));
        let carrier = CarrierId::new("saia");
        tokens.insert(carrier.clone(), AuthToken::new("live", clock.now() + Duration::hours(2)));

        assert_eq!(check_authentication(&tokens, &carrier, 60).await, AuthVerdict::Recovered);
        assert_eq!(tokens.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn check_falls_back_to_refresh_and_reports_failure() {
        let clock = ManualClock::default();
        let tokens = InMemoryTokenAccessor::with_clock(Arc::new(clock.clone()));
        let carrier = CarrierId::new("saia");
        tokens.insert(carrier.clone(), AuthToken::new("old", clock.now() + Duration::seconds(20)));

        assert_eq!(check_authentication(&tokens, &carrier, 60).await, AuthVerdict::Lost);
        assert_eq!(tokens.refresh_calls(), 1);

        let renewed = AuthToken::new("new", clock.now() + Duration::hours(1));
        tokens.stage_refresh(carrier.clone(), renewed);
        assert_eq!(check_authentication(&tokens, &carrier, 60).await, AuthVerdict::Recovered);
    }

    #[tokio::test]
    async fn inactive_session_is_lost_without_refreshing() {
        let tokens = InMemoryTokenAccessor::default();
        tokens.set_session_active(false);

        assert_eq!(
            check_authentication(&tokens, &CarrierId::new("rl"), 60).await,
            AuthVerdict::Lost
        );
        assert_eq!(tokens.refresh_calls(), 0);
    }
}
