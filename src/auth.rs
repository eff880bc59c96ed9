use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::store::CredentialStore;

// Treat tokens this close to expiry as already expired.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Authorized-user credential. Carries the client identity so it can refresh itself
/// without the client secrets file.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_uri: String,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry
            .map_or(false, |expiry| now + Duration::seconds(EXPIRY_SKEW_SECS) >= expiry)
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.token.is_empty() && !self.is_expired(now)
    }
}

#[async_trait]
pub trait Authorizer {
    /// Trade the refresh token for a new access token.
    async fn refresh(&self, credential: &Credential) -> anyhow::Result<Credential>;

    /// Ask the user to grant access from scratch.
    async fn authorize(&self) -> anyhow::Result<Credential>;
}

/// Returns a usable credential, refreshing or re-authorizing and saving as needed.
pub async fn obtain<S, A>(
    store: &S,
    authorizer: &A,
    now: DateTime<Utc>,
) -> anyhow::Result<Credential>
where
    S: CredentialStore + ?Sized,
    A: Authorizer + ?Sized,
{
    let cached = load(store)?;

    if let Some(credential) = &cached {
        if credential.is_valid(now) {
            return Ok(credential.clone());
        }
    }

    let fresh = match cached {
        Some(credential) if credential.is_expired(now) && credential.refresh_token.is_some() => {
            info!("access token expired, refreshing");
            authorizer.refresh(&credential).await.context(
                "failed to refresh the cached credential (run `weektally logout` to sign in again)",
            )?
        }
        _ => {
            info!("no usable cached credential, starting authorization");
            authorizer
                .authorize()
                .await
                .context("authorization failed")?
        }
    };

    let blob = serde_json::to_string(&fresh)?;
    store.save(&blob)?;

    Ok(fresh)
}

fn load<S: CredentialStore + ?Sized>(store: &S) -> anyhow::Result<Option<Credential>> {
    let Some(blob) = store.load()? else {
        return Ok(None);
    };

    match serde_json::from_str(&blob) {
        Ok(credential) => Ok(Some(credential)),
        Err(err) => {
            warn!(error = %err, "ignoring unreadable cached credential");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::store::{FileStore, MemoryStore};

    #[derive(Default)]
    struct FakeAuthorizer {
        calls: Mutex<Vec<&'static str>>,
        fail_refresh: bool,
    }

    impl FakeAuthorizer {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Authorizer for FakeAuthorizer {
        async fn refresh(&self, credential: &Credential) -> anyhow::Result<Credential> {
            self.calls.lock().unwrap().push("refresh");
            if self.fail_refresh {
                anyhow::bail!("invalid_grant");
            }
            Ok(Credential {
                token: "refreshed".to_owned(),
                expiry: Some(now() + Duration::hours(1)),
                ..credential.clone()
            })
        }

        async fn authorize(&self) -> anyhow::Result<Credential> {
            self.calls.lock().unwrap().push("authorize");
            Ok(credential("authorized", Some("refresh-me"), Some(now() + Duration::hours(1))))
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2022-11-21T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn credential(token: &str, refresh: Option<&str>, expiry: Option<DateTime<Utc>>) -> Credential {
        Credential {
            token: token.to_owned(),
            refresh_token: refresh.map(str::to_owned),
            token_uri: "https://oauth2.googleapis.com/token".to_owned(),
            client_id: "client".to_owned(),
            client_secret: Some("secret".to_owned()),
            scopes: vec!["https://www.googleapis.com/auth/calendar.readonly".to_owned()],
            expiry,
        }
    }

    fn stored(credential: &Credential) -> MemoryStore {
        MemoryStore::with(&serde_json::to_string(credential).unwrap())
    }

    fn saved(store: &MemoryStore) -> Credential {
        serde_json::from_str(&store.blob().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_valid_cached_credential_is_reused() {
        let cached = credential("cached", Some("r"), Some(now() + Duration::minutes(30)));
        let store = stored(&cached);
        let authorizer = FakeAuthorizer::default();

        let result = obtain(&store, &authorizer, now()).await.unwrap();

        assert_eq!(result, cached);
        assert!(authorizer.calls().is_empty());
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_credential_is_refreshed_and_saved() {
        let cached = credential("stale", Some("r"), Some(now() - Duration::minutes(5)));
        let store = stored(&cached);
        let authorizer = FakeAuthorizer::default();

        let result = obtain(&store, &authorizer, now()).await.unwrap();

        assert_eq!(result.token, "refreshed");
        assert_eq!(result.refresh_token.as_deref(), Some("r"));
        assert_eq!(authorizer.calls(), vec!["refresh"]);
        assert_eq!(saved(&store), result);
    }

    #[tokio::test]
    async fn test_nearly_expired_credential_is_refreshed() {
        let cached = credential("stale", Some("r"), Some(now() + Duration::seconds(30)));
        let store = stored(&cached);
        let authorizer = FakeAuthorizer::default();

        obtain(&store, &authorizer, now()).await.unwrap();
        assert_eq!(authorizer.calls(), vec!["refresh"]);
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token_reauthorizes() {
        let cached = credential("stale", None, Some(now() - Duration::minutes(5)));
        let store = stored(&cached);
        let authorizer = FakeAuthorizer::default();

        let result = obtain(&store, &authorizer, now()).await.unwrap();

        assert_eq!(result.token, "authorized");
        assert_eq!(authorizer.calls(), vec!["authorize"]);
        assert_eq!(saved(&store), result);
    }

    #[tokio::test]
    async fn test_missing_cache_authorizes() {
        let store = MemoryStore::default();
        let authorizer = FakeAuthorizer::default();

        let result = obtain(&store, &authorizer, now()).await.unwrap();

        assert_eq!(result.token, "authorized");
        assert_eq!(authorizer.calls(), vec!["authorize"]);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_cache_is_treated_as_missing() {
        let store = MemoryStore::with("\u{80}not json at all");
        let authorizer = FakeAuthorizer::default();

        let result = obtain(&store, &authorizer, now()).await.unwrap();

        assert_eq!(result.token, "authorized");
        assert_eq!(authorizer.calls(), vec!["authorize"]);
        assert_eq!(saved(&store), result);
    }

    #[tokio::test]
    async fn test_binary_cache_file_authorizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, [0x80, 0x04, 0x95, 0xff, 0x00]).unwrap();
        let store = FileStore::new(&path);
        let authorizer = FakeAuthorizer::default();

        let result = obtain(&store, &authorizer, now()).await.unwrap();

        assert_eq!(result.token, "authorized");
        assert_eq!(authorizer.calls(), vec!["authorize"]);
        let written: Credential =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, result);
    }

    #[tokio::test]
    async fn test_empty_token_reauthorizes() {
        let cached = credential("", Some("r"), None);
        let store = stored(&cached);
        let authorizer = FakeAuthorizer::default();

        obtain(&store, &authorizer, now()).await.unwrap();
        assert_eq!(authorizer.calls(), vec!["authorize"]);
    }

    #[tokio::test]
    async fn test_failed_refresh_is_fatal() {
        let cached = credential("stale", Some("revoked"), Some(now() - Duration::minutes(5)));
        let store = stored(&cached);
        let authorizer = FakeAuthorizer {
            fail_refresh: true,
            ..FakeAuthorizer::default()
        };

        let err = obtain(&store, &authorizer, now()).await.unwrap_err();

        assert!(format!("{err:#}").contains("invalid_grant"));
        assert_eq!(authorizer.calls(), vec!["refresh"]);
        assert_eq!(store.save_count(), 0);
        assert_eq!(saved(&store), cached);
    }

    #[test]
    fn test_credential_without_expiry_never_expires() {
        let cred = credential("t", None, None);
        assert!(!cred.is_expired(now()));
        assert!(cred.is_valid(now()));
    }
}
