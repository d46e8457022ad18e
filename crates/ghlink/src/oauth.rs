use base64::Engine;
use eyre::eyre;
use ghlink_store::{StateRecord, StateStore};
use reqwest::Url;
use ring::rand::{SecureRandom, SystemRandom};
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

use crate::config::GitHubConfig;
use crate::error::OAuthError;
use crate::github::{ExchangeCode, TokenPair};

pub const STATE_TTL: Duration = Duration::from_secs(5 * 60);

const OAUTH_SCOPES: &str = "user repo";
const CLOUD_CALLBACK_PATH: &str = "/rest/app/cloud/github-callback";
const NONCE_BYTES: usize = 16;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectUrl {
    pub redirect_url: String,
    pub state: String,
}

/// Drives both halves of the authorization-code flow: minting the GitHub
/// authorize redirect, and validating the callback before the code is
/// exchanged for tokens.
#[derive(Clone)]
pub struct OAuthService<S> {
    store: S,
    authorize_url: Url,
    callback_uri: String,
    client_id: String,
    state_ttl: Duration,
}

impl<S: StateStore> OAuthService<S> {
    pub fn new(store: S, config: &GitHubConfig) -> eyre::Result<Self> {
        let authorize_url = Url::parse(&format!(
            "{}/login/oauth/authorize",
            config.base_url.trim_end_matches('/')
        ))?;

        Ok(Self {
            store,
            authorize_url,
            callback_uri: format!(
                "{}{}",
                config.app_url.trim_end_matches('/'),
                CLOUD_CALLBACK_PATH
            ),
            client_id: config.client_id.clone(),
            state_ttl: STATE_TTL,
        })
    }

    #[cfg(test)]
    fn with_state_ttl(mut self, ttl: Duration) -> Self {
        self.state_ttl = ttl;
        self
    }

    // Anti-CSRF state parameter, per
    // https://auth0.com/docs/secure/attack-protection/state-parameters
    async fn create_state(&self, host: &str) -> Result<String, OAuthError> {
        let mut bytes = [0u8; NONCE_BYTES];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| eyre!("failed to generate state nonce"))?;

        let nonce = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);
        let record = StateRecord::new(host, self.state_ttl);
        self.store.put(&nonce, &record, self.state_ttl).await?;

        Ok(nonce)
    }

    // Absent, expired, and already-consumed nonces are deliberately
    // indistinguishable to the caller.
    async fn consume_state(&self, nonce: &str) -> Result<StateRecord, OAuthError> {
        match self.store.take(nonce).await? {
            Some(record) if !record.is_expired() => Ok(record),
            _ => Err(OAuthError::InvalidOrExpiredState),
        }
    }

    pub async fn redirect_url(
        &self,
        host: &str,
        enterprise_id: Option<&str>,
    ) -> Result<RedirectUrl, OAuthError> {
        if enterprise_id.is_some() {
            warn!("GitHub Enterprise flow requested but not supported");
            return Err(OAuthError::UnsupportedFlow);
        }

        let state = self.create_state(host).await?;

        let mut url = self.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("scope", OAUTH_SCOPES)
            .append_pair("redirect_uri", &self.callback_uri)
            .append_pair("state", &state);

        Ok(RedirectUrl {
            redirect_url: url.to_string(),
            state,
        })
    }

    /// Validates the callback and, only once every check has passed, trades
    /// the authorization code for tokens. The first failing check settles the
    /// outcome; the nonce is gone after the consume either way, so a failed
    /// exchange means restarting from a fresh redirect.
    pub async fn exchange(
        &self,
        host: &str,
        enterprise_id: Option<&str>,
        code: &str,
        state: &str,
        exchanger: &impl ExchangeCode,
    ) -> Result<TokenPair, OAuthError> {
        if code.is_empty() {
            warn!("callback arrived without a code");
            return Err(OAuthError::MissingCode);
        }

        if state.is_empty() {
            warn!("callback arrived without a state");
            return Err(OAuthError::MissingState);
        }

        if enterprise_id.is_some() {
            warn!("GitHub Enterprise flow requested but not supported");
            return Err(OAuthError::UnsupportedFlow);
        }

        let record = self.consume_state(state).await?;

        if record.host != host {
            warn!(
                bound = %record.host,
                claimed = %host,
                "state was minted for a different host"
            );
            return Err(OAuthError::HostMismatch);
        }

        exchanger.exchange_code(code, state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghlink_moka::{MokaConfig, MokaStore};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockExchanger {
        calls: AtomicUsize,
        codes: Mutex<Vec<String>>,
    }

    impl MockExchanger {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                codes: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ExchangeCode for MockExchanger {
        async fn exchange_code(&self, code: &str, _state: &str) -> Result<TokenPair, OAuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.codes.lock().unwrap().push(code.to_string());

            Ok(TokenPair {
                access_token: "a1".to_string(),
                refresh_token: "r1".to_string(),
            })
        }
    }

    /// Store that fails the test if any operation reaches it.
    struct UntouchableStore;

    impl StateStore for UntouchableStore {
        async fn put(
            &self,
            _nonce: &str,
            _record: &StateRecord,
            _ttl: Duration,
        ) -> eyre::Result<()> {
            panic!("state store must not be accessed");
        }

        async fn take(&self, _nonce: &str) -> eyre::Result<Option<StateRecord>> {
            panic!("state store must not be accessed");
        }
    }

    fn github_config() -> GitHubConfig {
        GitHubConfig {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            app_url: "https://app.example.com".to_string(),
            base_url: "https://github.com".to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }

    async fn service() -> OAuthService<MokaStore> {
        let store = MokaStore::new(MokaConfig {
            max_capacity: 100,
            ttl: Duration::from_secs(300),
        })
        .await
        .unwrap();

        OAuthService::new(store, &github_config()).unwrap()
    }

    fn service_with_store<S: StateStore>(store: S) -> OAuthService<S> {
        OAuthService::new(store, &github_config()).unwrap()
    }

    #[tokio::test]
    async fn test_redirect_url_contents() {
        let service = service().await;
        let redirect = service.redirect_url("host-a", None).await.unwrap();

        let url = Url::parse(&redirect.redirect_url).unwrap();
        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("github.com"));
        assert_eq!(url.path(), "/login/oauth/authorize");
        assert_eq!(params["client_id"], "client-id");
        assert_eq!(params["scope"], "user repo");
        assert_eq!(
            params["redirect_uri"],
            "https://app.example.com/rest/app/cloud/github-callback"
        );
        assert_eq!(params["state"], redirect.state);
        assert!(!redirect.state.is_empty());
    }

    #[tokio::test]
    async fn test_redirect_states_are_unique() {
        let service = service().await;

        let first = service.redirect_url("host-a", None).await.unwrap();
        let second = service.redirect_url("host-a", None).await.unwrap();

        assert_ne!(first.state, second.state);
    }

    #[tokio::test]
    async fn test_enterprise_redirect_unsupported() {
        let service = service_with_store(UntouchableStore);

        let err = service
            .redirect_url("host-a", Some("uuid-1"))
            .await
            .unwrap_err();

        assert!(matches!(err, OAuthError::UnsupportedFlow));
    }

    #[tokio::test]
    async fn test_happy_path() {
        let service = service().await;
        let exchanger = MockExchanger::new();

        let redirect = service.redirect_url("host-a", None).await.unwrap();
        let tokens = service
            .exchange("host-a", None, "code-123", &redirect.state, &exchanger)
            .await
            .unwrap();

        assert_eq!(tokens.access_token, "a1");
        assert_eq!(tokens.refresh_token, "r1");
        assert_eq!(exchanger.calls(), 1);
        assert_eq!(*exchanger.codes.lock().unwrap(), vec!["code-123"]);
    }

    #[tokio::test]
    async fn test_state_is_single_use() {
        let service = service().await;
        let exchanger = MockExchanger::new();

        let redirect = service.redirect_url("host-a", None).await.unwrap();

        service
            .exchange("host-a", None, "code-123", &redirect.state, &exchanger)
            .await
            .unwrap();

        let err = service
            .exchange("host-a", None, "code-123", &redirect.state, &exchanger)
            .await
            .unwrap_err();

        assert!(matches!(err, OAuthError::InvalidOrExpiredState));
        assert_eq!(exchanger.calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_state() {
        let service = service().await.with_state_ttl(Duration::from_millis(50));
        let exchanger = MockExchanger::new();

        let redirect = service.redirect_url("host-a", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let err = service
            .exchange("host-a", None, "code-123", &redirect.state, &exchanger)
            .await
            .unwrap_err();

        assert!(matches!(err, OAuthError::InvalidOrExpiredState));
        assert_eq!(exchanger.calls(), 0);
    }

    #[tokio::test]
    async fn test_host_binding() {
        let service = service().await;
        let exchanger = MockExchanger::new();

        let redirect = service.redirect_url("host-a", None).await.unwrap();
        let err = service
            .exchange("host-b", None, "code-123", &redirect.state, &exchanger)
            .await
            .unwrap_err();

        assert!(matches!(err, OAuthError::HostMismatch));
        assert_eq!(exchanger.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_code() {
        let service = service_with_store(UntouchableStore);
        let exchanger = MockExchanger::new();

        let err = service
            .exchange("host-a", None, "", "state-1", &exchanger)
            .await
            .unwrap_err();

        assert!(matches!(err, OAuthError::MissingCode));
        assert_eq!(exchanger.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_state() {
        let service = service_with_store(UntouchableStore);
        let exchanger = MockExchanger::new();

        let err = service
            .exchange("host-a", None, "code-123", "", &exchanger)
            .await
            .unwrap_err();

        assert!(matches!(err, OAuthError::MissingState));
        assert_eq!(exchanger.calls(), 0);
    }

    #[tokio::test]
    async fn test_enterprise_callback_unsupported() {
        let service = service_with_store(UntouchableStore);
        let exchanger = MockExchanger::new();

        let err = service
            .exchange("host-a", Some("uuid-1"), "code-123", "state-1", &exchanger)
            .await
            .unwrap_err();

        assert!(matches!(err, OAuthError::UnsupportedFlow));
        assert_eq!(exchanger.calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_replay() {
        let service = service().await;
        let exchanger = MockExchanger::new();

        let redirect = service.redirect_url("host-a", None).await.unwrap();

        let (first, second) = tokio::join!(
            service.exchange("host-a", None, "code-123", &redirect.state, &exchanger),
            service.exchange("host-a", None, "code-123", &redirect.state, &exchanger),
        );

        let outcomes = [first, second];
        let successes = outcomes.iter().filter(|r| r.is_ok()).count();
        let replays = outcomes
            .iter()
            .filter(|r| matches!(r, Err(OAuthError::InvalidOrExpiredState)))
            .count();

        assert_eq!(successes, 1);
        assert_eq!(replays, 1);
        assert_eq!(exchanger.calls(), 1);
    }
}
