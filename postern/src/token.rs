//! Issued tokens and the codec contract

use aliri_clock::UnixTime;
use serde::{Deserialize, Serialize};

use crate::{AccessToken, AccessTokenRef, Grant, TokenCreationError, TokenRejected};

/// The token type reported to clients
///
/// Only bearer tokens are issued.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// A bearer token, presented as `Authorization: Bearer <token>`
    #[default]
    Bearer,
}

/// A freshly minted token, as returned from the token endpoint
///
/// Serializes to the usual OAuth2 token response shape, with the expiry
/// given as an RFC 3339 timestamp:
///
/// ```json
/// {
///   "access_token": "eyJhbGciOiJIUzI1NiJ9…",
///   "expiry": "2024-05-01T12:00:00Z",
///   "token_type": "bearer"
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    access_token: AccessToken,
    #[serde(with = "rfc3339")]
    expiry: UnixTime,
    token_type: TokenType,
}

impl IssuedToken {
    /// Constructs a bearer token response
    pub fn bearer(access_token: AccessToken, expiry: UnixTime) -> Self {
        Self {
            access_token,
            expiry,
            token_type: TokenType::Bearer,
        }
    }

    /// The signed access token
    #[inline]
    pub fn access_token(&self) -> &AccessTokenRef {
        &self.access_token
    }

    /// The time at and after which the token is no longer accepted
    #[inline]
    pub fn expiry(&self) -> UnixTime {
        self.expiry
    }

    /// The token type
    #[inline]
    pub fn token_type(&self) -> TokenType {
        self.token_type
    }
}

/// Mints and verifies access tokens
///
/// A conforming generator upholds the round-trip law: for any grant `g`,
/// validating the access token produced by `create(g)` before it expires
/// yields a grant equal to `g`.
pub trait TokenGenerator: Send + Sync {
    /// Mints a token for the grant
    ///
    /// # Errors
    ///
    /// Returns an error only on server faults, such as a failure to serialize
    /// or sign the token.
    fn create(&self, grant: &Grant) -> Result<IssuedToken, TokenCreationError>;

    /// Verifies a presented token and recovers the grant it carries
    ///
    /// # Errors
    ///
    /// Returns an error if the token is malformed, was not signed by the
    /// configured key and algorithm, lacks the expected claims, or has
    /// expired. No partial grant is returned on failure.
    fn validate(&self, token: &AccessTokenRef) -> Result<Grant, TokenRejected>;
}

macro_rules! delegate_impls {
    ($($ty:ty)*) => {
        $(
            impl<T> TokenGenerator for $ty
            where
                T: TokenGenerator + ?Sized,
            {
                #[inline]
                fn create(&self, grant: &Grant) -> Result<IssuedToken, TokenCreationError> {
                    T::create(self, grant)
                }

                #[inline]
                fn validate(&self, token: &AccessTokenRef) -> Result<Grant, TokenRejected> {
                    T::validate(self, token)
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

mod rfc3339 {
    use std::convert::TryFrom;

    use aliri_clock::UnixTime;
    use serde::{de, ser, Deserialize, Deserializer, Serializer};
    use time::{format_description::well_known::Rfc3339, OffsetDateTime};

    pub(super) fn serialize<S: Serializer>(time: &UnixTime, serializer: S) -> Result<S::Ok, S::Error> {
        let secs = i64::try_from(time.0).map_err(ser::Error::custom)?;
        let formatted = OffsetDateTime::from_unix_timestamp(secs)
            .map_err(ser::Error::custom)?
            .format(&Rfc3339)
            .map_err(ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<UnixTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        let parsed = OffsetDateTime::parse(&s, &Rfc3339).map_err(de::Error::custom)?;
        u64::try_from(parsed.unix_timestamp())
            .map(UnixTime)
            .map_err(de::Error::custom)
    }
}
