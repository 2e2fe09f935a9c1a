//! Turns a cached token file into a usable credential.

use tracing::{debug, info, warn};

use crate::error::{ErrorCategory, ProviderResult};
use crate::provider::Authorizer;
use crate::tokens::{Credential, CredentialStore};

/// Loads, refreshes, or obtains a credential for a scope set.
#[derive(Debug)]
pub struct CredentialLoader<S, A> {
    store: S,
    authorizer: A,
}

impl<S, A> CredentialLoader<S, A>
where
    S: CredentialStore,
    A: Authorizer,
{
    pub fn new(store: S, authorizer: A) -> Self {
        Self { store, authorizer }
    }

    /// Returns a valid credential covering `scopes`.
    ///
    /// A cached credential that is still valid is returned without any
    /// network call. An expired one with a refresh token is refreshed. In
    /// every other case the consent flow runs. Refreshed and newly consented
    /// credentials are saved before they are returned.
    pub async fn obtain(&self, scopes: &[String]) -> ProviderResult<Credential> {
        let cached = match self.store.load(scopes) {
            Ok(cached) => cached,
            Err(e) if e.category() == ErrorCategory::Configuration => {
                warn!("ignoring unusable token file: {}", e);
                None
            }
            Err(e) => return Err(e),
        };

        if let Some(credential) = cached {
            if !credential.has_scopes(scopes) {
                info!("cached credential does not cover the requested scopes");
            } else if credential.is_valid() {
                debug!("using cached credential");
                return Ok(credential);
            } else if credential.refresh_token.is_some() {
                debug!("cached credential expired, refreshing");
                let refreshed = self.authorizer.refresh(&credential).await?;
                self.store.save(scopes, &refreshed)?;
                return Ok(refreshed);
            } else {
                info!("cached credential expired and cannot be refreshed");
            }
        }

        let fresh = self.authorizer.authorize(scopes).await?;
        self.store.save(scopes, &fresh)?;
        Ok(fresh)
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }
}
