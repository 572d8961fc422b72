//! Client credential verification

use std::error;

use async_trait::async_trait;
use thiserror::Error;

use crate::{ClientIdRef, ClientSecretRef, Grant, Scope, Scopes};

/// An error indicating that a client could not be granted the scopes it asked for
#[derive(Debug, Error)]
pub enum AuthenticationError {
    /// The client ID is not known, or the secret does not match it
    #[error("unknown client or mismatched secret")]
    UnknownClient,

    /// The client is known, but one of the requested scopes is not permitted
    ///
    /// A single disallowed scope fails the whole request; no partial grant is
    /// ever produced.
    #[error("scope not allowed: {scope}")]
    ScopeNotAllowed {
        /// The first requested scope that was refused
        scope: Scope,
    },

    /// The backing credential store could not be consulted
    #[error("credential store unavailable")]
    Backend(#[source] Box<dyn error::Error + Send + Sync + 'static>),
}

/// A source of truth for client credentials and the scopes each client may hold
///
/// Implementations may be backed by an in-memory table, a database, or a
/// remote identity provider. Callers only ever depend on this trait.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Confirms the client's identity and that every requested scope is
    /// permitted for it
    ///
    /// On success, the returned grant carries the identity resolved by the
    /// authenticator and exactly the requested scopes.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are not recognized or if any of
    /// the requested scopes is not permitted for the client.
    async fn authenticate(
        &self,
        client_id: &ClientIdRef,
        secret: &ClientSecretRef,
        scopes: Scopes,
    ) -> Result<Grant, AuthenticationError>;
}

macro_rules! delegate_impls {
    ($($ty:ty)*) => {
        $(
            #[async_trait]
            impl<T> Authenticator for $ty
            where
                T: Authenticator + ?Sized,
            {
                async fn authenticate(
                    &self,
                    client_id: &ClientIdRef,
                    secret: &ClientSecretRef,
                    scopes: Scopes,
                ) -> Result<Grant, AuthenticationError> {
                    T::authenticate(self, client_id, secret, scopes).await
                }
            }
        )*
    }
}

delegate_impls!(
    &'_ T
    Box<T>
    std::sync::Arc<T>
);
