use std::borrow::Borrow;

use crate::{Identity, IdentityRef, ScopeRef, Scopes};

/// The binding between a resolved client identity and the scopes it holds
///
/// A grant is created by an [`Authenticator`](crate::Authenticator) when a
/// token is requested, or reconstructed by a
/// [`TokenGenerator`](crate::TokenGenerator) from a presented token. It does
/// not carry any notion of validity itself; a grant is only meaningful while
/// the token it came from has a valid signature and has not expired.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grant {
    identity: Identity,
    scopes: Scopes,
}

impl Grant {
    /// Constructs a new grant
    #[inline]
    pub fn new(identity: Identity, scopes: Scopes) -> Self {
        Self { identity, scopes }
    }

    /// The identity the grant was issued to
    #[inline]
    pub fn identity(&self) -> &IdentityRef {
        &self.identity
    }

    /// The scopes held under this grant
    #[inline]
    pub fn scopes(&self) -> &Scopes {
        &self.scopes
    }

    /// Whether the grant holds `scope`
    #[inline]
    pub fn has_scope(&self, scope: &ScopeRef) -> bool {
        self.scopes.contains(scope)
    }

    /// Whether the grant holds every one of the `required` scopes
    #[inline]
    pub fn has_scopes<I, T>(&self, required: I) -> bool
    where
        I: IntoIterator<Item = T>,
        T: Borrow<ScopeRef>,
    {
        self.scopes.contains_all(required)
    }

    /// Splits the grant into its identity and scopes
    #[inline]
    pub fn into_parts(self) -> (Identity, Scopes) {
        (self.identity, self.scopes)
    }
}
