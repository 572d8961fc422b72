//! A table-backed authenticator

use std::collections::HashMap;
#[cfg(feature = "file")]
use std::path::Path;

use async_trait::async_trait;
use constant_time_eq::constant_time_eq;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    AuthenticationError, Authenticator, ClientId, ClientIdRef, ClientSecret, ClientSecretRef,
    Grant, Identity, Scope, ScopeRef, Scopes,
};

/// An error occurring while loading a client table
#[derive(Debug, Error)]
pub enum ClientTableError {
    /// The client table file could not be read
    #[error("unable to read client table")]
    Io(#[from] std::io::Error),

    /// The client table is not valid JSON or has an unexpected shape
    #[error("malformed client table")]
    Malformed(#[from] serde_json::Error),
}

/// The scopes a registered client may request
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeRule {
    /// Any scope may be requested
    #[default]
    Any,

    /// Any scope except the listed ones may be requested
    Deny(Vec<Scope>),

    /// Only the listed scopes may be requested
    Only(Vec<Scope>),
}

impl ScopeRule {
    /// Whether a client under this rule may hold `scope`
    pub fn permits(&self, scope: &ScopeRef) -> bool {
        match self {
            Self::Any => true,
            Self::Deny(denied) => !denied.iter().any(|d| d.as_str() == scope.as_str()),
            Self::Only(allowed) => allowed.iter().any(|a| a.as_str() == scope.as_str()),
        }
    }
}

/// A single client entry in a [`ClientTable`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredClient {
    client_id: ClientId,
    secret: ClientSecret,
    identity: Identity,
    #[serde(default)]
    scopes: ScopeRule,
}

impl RegisteredClient {
    /// Registers a client which may request any scope
    pub fn new(client_id: ClientId, secret: ClientSecret, identity: Identity) -> Self {
        Self {
            client_id,
            secret,
            identity,
            scopes: ScopeRule::Any,
        }
    }

    /// Restricts the scopes this client may request
    pub fn with_scope_rule(self, scopes: ScopeRule) -> Self {
        Self { scopes, ..self }
    }

    /// The client ID the client authenticates with
    pub fn client_id(&self) -> &ClientIdRef {
        &self.client_id
    }
}

#[derive(Deserialize)]
struct ClientTableDto {
    clients: Vec<RegisteredClient>,
}

/// An in-memory table of registered clients
///
/// The table is immutable once built, so it can be shared freely between
/// concurrent requests. A table may be assembled in code, parsed from JSON,
/// or loaded from a JSON file:
///
/// ```json
/// {
///   "clients": [
///     { "client_id": "admin", "secret": "admin", "identity": "1" },
///     {
///       "client_id": "user",
///       "secret": "secret",
///       "identity": "2",
///       "scopes": { "deny": ["repository_create", "simulator_create"] }
///     }
///   ]
/// }
/// ```
///
/// If the same client ID is registered more than once, the last entry wins.
#[derive(Clone, Debug, Default)]
pub struct ClientTable {
    clients: HashMap<ClientId, RegisteredClient>,
}

impl ClientTable {
    /// Constructs an empty table, which rejects every client
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a client to the table
    pub fn with_client(mut self, client: RegisteredClient) -> Self {
        self.clients.insert(client.client_id.clone(), client);
        self
    }

    /// The reference table
    ///
    /// * `admin` / `admin` resolves to identity `1` and may request any scope.
    /// * `user` / `secret` resolves to identity `2` and may request any scope
    ///   except `repository_create` and `simulator_create`.
    pub fn reference() -> Self {
        Self::new()
            .with_client(RegisteredClient::new(
                ClientId::from_static("admin"),
                ClientSecret::from_static("admin"),
                Identity::from_static("1"),
            ))
            .with_client(
                RegisteredClient::new(
                    ClientId::from_static("user"),
                    ClientSecret::from_static("secret"),
                    Identity::from_static("2"),
                )
                .with_scope_rule(ScopeRule::Deny(vec![
                    Scope::from_static("repository_create"),
                    Scope::from_static("simulator_create"),
                ])),
            )
    }

    /// Parses a table from its JSON representation
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, ClientTableError> {
        let dto: ClientTableDto = serde_json::from_str(json)?;
        Ok(dto.clients.into_iter().fold(Self::new(), Self::with_client))
    }

    /// Loads a table from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its contents are malformed.
    #[cfg(feature = "file")]
    #[cfg_attr(docsrs, doc(cfg(feature = "file")))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ClientTableError> {
        let path = path.as_ref();
        let data = tokio::fs::read_to_string(path).await?;
        let table = Self::from_json(&data)?;
        tracing::debug!(path = %path.display(), clients = table.len(), "client table loaded");
        Ok(table)
    }

    /// The number of registered clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether no clients are registered
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Synchronously checks credentials and requested scopes against the table
    ///
    /// # Errors
    ///
    /// Returns an error if the client is unknown, the secret does not match,
    /// or any requested scope is not permitted for the client.
    pub fn verify(
        &self,
        client_id: &ClientIdRef,
        secret: &ClientSecretRef,
        scopes: Scopes,
    ) -> Result<Grant, AuthenticationError> {
        let client = self
            .clients
            .get(client_id)
            .filter(|c| constant_time_eq(c.secret.as_str().as_bytes(), secret.as_str().as_bytes()))
            .ok_or_else(|| {
                tracing::debug!(%client_id, "client authentication failed");
                AuthenticationError::UnknownClient
            })?;

        if let Some(scope) = scopes.iter().find(|s| !client.scopes.permits(s)) {
            tracing::debug!(%client_id, %scope, "requested scope not allowed");
            return Err(AuthenticationError::ScopeNotAllowed {
                scope: scope.to_owned(),
            });
        }

        tracing::debug!(%client_id, identity = %client.identity, %scopes, "client authenticated");

        Ok(Grant::new(client.identity.clone(), scopes))
    }
}

#[async_trait]
impl Authenticator for ClientTable {
    async fn authenticate(
        &self,
        client_id: &ClientIdRef,
        secret: &ClientSecretRef,
        scopes: Scopes,
    ) -> Result<Grant, AuthenticationError> {
        self.verify(client_id, secret, scopes)
    }
}
