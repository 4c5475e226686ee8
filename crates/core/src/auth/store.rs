use std::sync::Arc;

use tracing::{info, warn};

use super::{
    strategy::{AcquireError, AcquisitionStrategy, Credential},
    token_file::TokenFile,
};
use crate::error::{ApiError, ApiResult};

/// Scheme prefix the service expects in the `Authorization` header.
pub const AUTH_SCHEME: &str = "XBL3.0 x=";

/// What [`CredentialStore::renew_if_needed`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renewal {
    /// The credential was still valid.
    NotNeeded,
    /// The memoized strategy produced a new credential.
    Renewed,
    /// The credential is stale but no strategy is recorded; the call goes
    /// ahead with what is there.
    Unavailable,
}

/// Holds the active credential and the strategy that last produced it.
///
/// Once any strategy has succeeded, later expiries are healed by invoking
/// that same strategy again.
pub struct CredentialStore {
    credential: Option<Credential>,
    last_strategy: Option<Arc<dyn AcquisitionStrategy>>,
    token_file: Option<TokenFile>,
    warned_without_strategy: bool,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore {
    /// Store without durable persistence.
    pub fn new() -> Self {
        Self {
            credential: None,
            last_strategy: None,
            token_file: None,
            warned_without_strategy: false,
        }
    }

    /// Store that mirrors every acquired credential to `token_file`.
    pub fn with_token_file(token_file: TokenFile) -> Self {
        Self {
            token_file: Some(token_file),
            ..Self::new()
        }
    }

    /// Load a previously persisted credential. Returns whether one was usable.
    pub fn restore(&mut self) -> bool {
        let Some(file) = &self.token_file else {
            return false;
        };
        match file.restore() {
            Some(credential) => {
                info!("token restored from {}", file.path().display());
                self.credential = Some(credential);
                true
            }
            None => false,
        }
    }

    /// Record `strategy` as the renewal path without acquiring now.
    pub fn remember(&mut self, strategy: Arc<dyn AcquisitionStrategy>) {
        self.last_strategy = Some(strategy);
    }

    /// Current credential, if any.
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Name of the strategy future renewals will use.
    pub fn last_strategy_name(&self) -> Option<&'static str> {
        self.last_strategy.as_ref().map(|strategy| strategy.name())
    }

    /// Header value for the active credential.
    pub fn authorization(&self) -> Option<String> {
        self.credential
            .as_ref()
            .map(|credential| format!("{AUTH_SCHEME}{}", credential.token))
    }

    /// A stored credential without expiry is always valid; no credential is not.
    pub fn is_valid(&self) -> bool {
        self.credential
            .as_ref()
            .map(Credential::is_valid)
            .unwrap_or(false)
    }

    /// Acquire through `strategy` and memoize it for later renewals.
    ///
    /// Persisted state is discarded before the attempt, so a failure never
    /// leaves a stale record behind.
    pub fn authenticate(
        &mut self,
        strategy: Arc<dyn AcquisitionStrategy>,
    ) -> Result<(), AcquireError> {
        self.last_strategy = Some(Arc::clone(&strategy));
        self.acquire_with(strategy.as_ref())
    }

    /// Renew through the memoized strategy when the credential is no longer valid.
    pub fn renew_if_needed(&mut self) -> ApiResult<Renewal> {
        if self.is_valid() {
            return Ok(Renewal::NotNeeded);
        }

        let Some(strategy) = self.last_strategy.clone() else {
            if self.credential.is_none() {
                return Err(ApiError::RenewalFailed(
                    "no token and no way to obtain one".to_string(),
                ));
            }
            warn!(
                "token expired and no method is recorded to obtain a new one; \
                 the request may fail"
            );
            return Ok(Renewal::Unavailable);
        };

        warn!(strategy = strategy.name(), "token expired, trying to obtain it again");
        self.acquire_with(strategy.as_ref())
            .map_err(|err| ApiError::RenewalFailed(err.to_string()))?;
        Ok(Renewal::Renewed)
    }

    /// Re-acquire through the memoized strategy regardless of expiry.
    ///
    /// Used when the service rejects a credential whose expiry has not passed.
    pub fn force_renew(&mut self) -> ApiResult<()> {
        let strategy = self.last_strategy.clone().ok_or_else(|| {
            ApiError::RenewalFailed("no method is recorded to obtain a new token".to_string())
        })?;
        warn!(strategy = strategy.name(), "token rejected, trying to obtain it again");
        self.acquire_with(strategy.as_ref())
            .map_err(|err| ApiError::RenewalFailed(err.to_string()))
    }

    /// Run `op` with a fresh `Authorization` header value.
    ///
    /// This is the only place a renewal check happens before a remote call.
    pub fn with_auth<T>(&mut self, op: impl FnOnce(&str) -> ApiResult<T>) -> ApiResult<T> {
        self.renew_if_needed()?;
        if self.last_strategy.is_none() && !self.warned_without_strategy {
            warn!(
                "there is no backup method to retrieve the token \
                 if it expires during the process"
            );
            self.warned_without_strategy = true;
        }
        let header = self
            .authorization()
            .ok_or_else(|| ApiError::RenewalFailed("no token available".to_string()))?;
        op(&header)
    }

    fn acquire_with(&mut self, strategy: &dyn AcquisitionStrategy) -> Result<(), AcquireError> {
        self.credential = None;
        if let Some(file) = &self.token_file {
            if let Err(err) = file.discard() {
                warn!("{err:#}");
            }
        }

        let credential = strategy.acquire()?;
        if !credential.is_valid() {
            return Err(AcquireError::Expired(strategy.name()));
        }

        if let Some(file) = &self.token_file {
            if let Err(err) = file.persist(&credential) {
                warn!("failed to save token: {err:#}");
            }
        }
        info!(strategy = strategy.name(), "token obtained successfully");
        self.credential = Some(credential);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedStrategy;
    use anyhow::Result;
    use chrono::{Duration, Utc};
    use tempfile::tempdir;

    #[test]
    fn authorization_carries_scheme_prefix() -> Result<()> {
        let mut store = CredentialStore::new();
        store.authenticate(Arc::new(ScriptedStrategy::valid("hash;abc")))?;
        assert_eq!(store.authorization().as_deref(), Some("XBL3.0 x=hash;abc"));
        assert_eq!(store.last_strategy_name(), Some("scripted"));
        Ok(())
    }

    #[test]
    fn expired_credential_is_renewed_with_last_strategy() -> Result<()> {
        let expired = Credential::new("old").with_expiry(Utc::now() - Duration::minutes(1));
        let fresh = Credential::new("new").with_expiry(Utc::now() + Duration::hours(1));
        let strategy = Arc::new(ScriptedStrategy::sequence(vec![Ok(fresh.clone())]));

        let mut store = CredentialStore::new();
        store.remember(strategy.clone());
        store.credential = Some(expired);
        assert!(!store.is_valid());

        let seen = store.with_auth(|header| Ok(header.to_string()))?;
        assert_eq!(seen, "XBL3.0 x=new");
        assert_eq!(strategy.calls(), 1);
        assert_eq!(store.credential(), Some(&fresh));

        assert_eq!(store.renew_if_needed()?, Renewal::NotNeeded);
        assert_eq!(strategy.calls(), 1);
        Ok(())
    }

    #[test]
    fn failed_renewal_surfaces_as_renewal_failure() {
        let mut store = CredentialStore::new();
        store.remember(Arc::new(ScriptedStrategy::failing()));
        store.credential =
            Some(Credential::new("old").with_expiry(Utc::now() - Duration::seconds(5)));

        let result = store.with_auth(|_| Ok(()));
        assert!(matches!(result, Err(ApiError::RenewalFailed(_))));
        assert!(store.credential().is_none());
    }

    #[test]
    fn stale_credential_without_strategy_is_still_used() -> Result<()> {
        let mut store = CredentialStore::new();
        store.credential =
            Some(Credential::new("old").with_expiry(Utc::now() - Duration::seconds(5)));

        assert_eq!(store.renew_if_needed()?, Renewal::Unavailable);
        let header = store.with_auth(|header| Ok(header.to_string()))?;
        assert_eq!(header, "XBL3.0 x=old");
        Ok(())
    }

    #[test]
    fn missing_credential_without_strategy_fails() {
        let mut store = CredentialStore::new();
        let mut called = false;
        let result = store.with_auth(|_| {
            called = true;
            Ok(())
        });
        assert!(matches!(result, Err(ApiError::RenewalFailed(_))));
        assert!(!called);
    }

    #[test]
    fn acquisition_persists_and_failed_acquisition_clears_record() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("token.json");
        let mut store = CredentialStore::with_token_file(TokenFile::new(&path));

        store.authenticate(Arc::new(ScriptedStrategy::valid("hash;abc")))?;
        assert!(path.exists());

        let mut restored = CredentialStore::with_token_file(TokenFile::new(&path));
        assert!(restored.restore());
        assert_eq!(restored.credential().map(|c| c.token.as_str()), Some("hash;abc"));

        assert!(store
            .authenticate(Arc::new(ScriptedStrategy::failing()))
            .is_err());
        assert!(!path.exists());
        assert_eq!(store.last_strategy_name(), Some("scripted"));
        Ok(())
    }

    #[test]
    fn force_renew_replaces_a_rejected_token() -> Result<()> {
        let strategy = Arc::new(ScriptedStrategy::sequence(vec![
            Ok(Credential::new("first")),
            Ok(Credential::new("second")),
        ]));
        let mut store = CredentialStore::new();
        store.authenticate(strategy.clone())?;
        store.force_renew()?;
        assert_eq!(store.authorization().as_deref(), Some("XBL3.0 x=second"));
        assert_eq!(strategy.calls(), 2);
        Ok(())
    }

    #[test]
    fn strategy_returning_expired_token_is_rejected() {
        let strategy = ScriptedStrategy::sequence(vec![Ok(
            Credential::new("old").with_expiry(Utc::now() - Duration::seconds(1))
        )]);
        let mut store = CredentialStore::new();
        assert!(matches!(
            store.authenticate(Arc::new(strategy)),
            Err(AcquireError::Expired("scripted"))
        ));
    }
}
