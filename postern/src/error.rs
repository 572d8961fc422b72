//! Common errors

use thiserror::Error;

/// Reasons a presented token was refused
///
/// Every variant is terminal for the request that presented the token. The
/// HTTP layer reports all of them identically so that callers cannot learn
/// which check failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
#[non_exhaustive]
pub enum TokenRejected {
    /// The token could not be parsed into a header, payload, and signature
    #[error("malformed token")]
    Malformed,

    /// The token names a signing algorithm other than the configured one
    #[error("token signed with an unexpected algorithm")]
    AlgorithmMismatch,

    /// The signature does not match the token contents
    #[error("token signature invalid")]
    InvalidSignature,

    /// A claim required to reconstruct the grant is absent
    #[error("required {0} claim missing")]
    MissingClaim(&'static str),

    /// A claim is present but does not have the expected shape
    #[error("{0} claim has an invalid value")]
    InvalidClaim(&'static str),

    /// The current time is at or past the token's `exp` claim
    #[error("token expired")]
    Expired,
}

impl TokenRejected {
    /// Whether the token was refused only because it has expired
    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired)
    }
}

/// An error occurring while minting a token
///
/// These are server faults, not authentication failures.
#[derive(Debug, Error)]
pub enum TokenCreationError {
    /// The claims or header could not be serialized, or the key refused to sign
    #[error("unable to sign token")]
    Signing(#[from] aliri::error::JwtSigningError),

    /// The computed expiry does not fit in a timestamp
    #[error("token expiry out of range")]
    ExpiryOutOfRange,
}
