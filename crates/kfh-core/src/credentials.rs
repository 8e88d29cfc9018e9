//! Access-token cache.
//!
//! Holds a single bearer token and its absolute expiry. The token is fetched
//! lazily and reused until `now >= expires_at`. Refreshes are serialised, so
//! concurrent callers hitting an empty cache share one authentication call.

use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::{domain::AppCredentials, errors::Error, ports::KfServiceApi, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedToken {
    pub token: String,
    /// Unix seconds.
    pub expires_at: u64,
}

pub struct TokenCache {
    api: Arc<dyn KfServiceApi>,
    credentials: AppCredentials,
    ttl: Duration,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    /// `ttl` is the local lifetime; keep it below the provider's real TTL.
    pub fn new(api: Arc<dyn KfServiceApi>, credentials: AppCredentials, ttl: Duration) -> Self {
        Self {
            api,
            credentials,
            ttl,
            cached: Mutex::new(None),
        }
    }

    pub async fn get_token(&self) -> Result<String> {
        self.get_token_at(unix_now()).await
    }

    /// Same as [`get_token`](Self::get_token) with an explicit clock (Unix seconds).
    pub async fn get_token_at(&self, now: u64) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(tok) = cached.as_ref() {
            if now < tok.expires_at {
                return Ok(tok.token.clone());
            }
        }

        let fetched = match self.api.fetch_token(&self.credentials).await {
            Ok(t) if t.token.trim().is_empty() => {
                Err(Error::Decode("empty access_token".to_string()))
            }
            other => other,
        };

        let access = match fetched {
            Ok(a) => a,
            Err(e) => {
                error!(corp_id = %self.credentials.corp_id, error = %e, "access token fetch failed");
                return Err(e);
            }
        };

        let mut ttl = self.ttl.as_secs();
        if let Some(provider_ttl) = access.expires_in {
            ttl = ttl.min(provider_ttl);
        }
        let expires_at = now.saturating_add(ttl);
        debug!(expires_at, "access token refreshed");

        *cached = Some(CachedToken {
            token: access.token.clone(),
            expires_at,
        });
        Ok(access.token)
    }

    /// Drop the cached token so the next call re-authenticates.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    pub async fn snapshot(&self) -> Option<CachedToken> {
        self.cached.lock().await.clone()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccessToken, ServiceState, SessionId};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Identity endpoint double: pops scripted responses, counts calls.
    #[derive(Default)]
    struct FakeIdentity {
        calls: AtomicUsize,
        script: StdMutex<Vec<Result<AccessToken>>>,
    }

    impl FakeIdentity {
        fn with(script: Vec<Result<AccessToken>>) -> Arc<Self> {
            let mut script = script;
            script.reverse();
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                script: StdMutex::new(script),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn ok(token: &str, expires_in: Option<u64>) -> Result<AccessToken> {
        Ok(AccessToken {
            token: token.to_string(),
            expires_in,
        })
    }

    #[async_trait]
    impl KfServiceApi for FakeIdentity {
        async fn fetch_token(&self, _credentials: &AppCredentials) -> Result<AccessToken> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(Error::Transport("script exhausted".to_string())))
        }

        async fn service_state(
            &self,
            _access_token: &str,
            _open_kfid: &str,
            _session: &SessionId,
        ) -> Result<ServiceState> {
            unreachable!("not used by the cache")
        }

        async fn transfer(
            &self,
            _access_token: &str,
            _open_kfid: &str,
            _session: &SessionId,
            _target: ServiceState,
        ) -> Result<()> {
            unreachable!("not used by the cache")
        }
    }

    fn cache(api: Arc<FakeIdentity>, ttl_secs: u64) -> TokenCache {
        TokenCache::new(
            api,
            AppCredentials {
                corp_id: "ww1".to_string(),
                secret: "s".to_string(),
            },
            Duration::from_secs(ttl_secs),
        )
    }

    #[tokio::test]
    async fn reuses_token_until_expiry() {
        let api = FakeIdentity::with(vec![ok("t1", None)]);
        let c = cache(api.clone(), 7000);

        assert_eq!(c.get_token_at(1_000).await.unwrap(), "t1");
        assert_eq!(c.get_token_at(1_001).await.unwrap(), "t1");
        assert_eq!(c.get_token_at(7_999).await.unwrap(), "t1");
        assert_eq!(api.calls(), 1);
        assert_eq!(c.snapshot().await.unwrap().expires_at, 8_000);
    }

    #[tokio::test]
    async fn refreshes_exactly_once_after_expiry() {
        let api = FakeIdentity::with(vec![ok("t1", None), ok("t2", None)]);
        let c = cache(api.clone(), 100);

        assert_eq!(c.get_token_at(0).await.unwrap(), "t1");
        // expires_at == 100: at 100 the token is no longer usable.
        assert_eq!(c.get_token_at(100).await.unwrap(), "t2");
        assert_eq!(c.get_token_at(150).await.unwrap(), "t2");
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test]
    async fn failure_is_not_cached() {
        let api = FakeIdentity::with(vec![
            Err(Error::Api {
                errcode: 40001,
                errmsg: "invalid credential".to_string(),
            }),
            ok("t1", None),
        ]);
        let c = cache(api.clone(), 7000);

        let err = c.get_token_at(0).await.unwrap_err();
        assert_eq!(err.errcode(), Some(40001));
        assert!(c.snapshot().await.is_none());

        assert_eq!(c.get_token_at(1).await.unwrap(), "t1");
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test]
    async fn empty_token_is_rejected() {
        let api = FakeIdentity::with(vec![ok("  ", None)]);
        let c = cache(api, 7000);
        assert!(matches!(c.get_token_at(0).await, Err(Error::Decode(_))));
        assert!(c.snapshot().await.is_none());
    }

    #[tokio::test]
    async fn provider_ttl_clamps_local_ttl() {
        let api = FakeIdentity::with(vec![ok("t1", Some(60))]);
        let c = cache(api, 7000);
        c.get_token_at(10).await.unwrap();
        assert_eq!(c.snapshot().await.unwrap().expires_at, 70);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let api = FakeIdentity::with(vec![ok("t1", None), ok("t2", None)]);
        let c = cache(api.clone(), 7000);
        c.get_token_at(0).await.unwrap();
        c.invalidate().await;
        assert_eq!(c.get_token_at(1).await.unwrap(), "t2");
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test]
    async fn concurrent_first_fetch_shares_one_call() {
        let api = FakeIdentity::with(vec![ok("t1", None), ok("t2", None)]);
        let c = Arc::new(cache(api.clone(), 7000));

        let a = tokio::spawn({
            let c = c.clone();
            async move { c.get_token_at(5).await }
        });
        let b = tokio::spawn({
            let c = c.clone();
            async move { c.get_token_at(5).await }
        });

        assert_eq!(a.await.unwrap().unwrap(), "t1");
        assert_eq!(b.await.unwrap().unwrap(), "t1");
        assert_eq!(api.calls(), 1);
    }
}
