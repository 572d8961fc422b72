//! A [`TokenGenerator`] that issues signed JSON Web Tokens
//!
//! Issued tokens carry the grant in two private claims alongside the
//! registered `iat` and `exp` claims:
//!
//! ```json
//! { "id": "1", "scope": ["read", "write"], "iat": 1700000000, "exp": 1700003600 }
//! ```
//!
//! Tokens are signed with a single key and algorithm fixed at construction.
//! A token naming any other algorithm in its header is rejected before the
//! signature is even looked at.
//!
//! ```
//! use aliri::jwa;
//! use aliri_base64::Base64Url;
//! use postern::{scopes, Grant, Identity, JwtTokenGenerator, SigningConfig, TokenGenerator};
//!
//! let config = SigningConfig::hmac(Base64Url::from_raw(&b"a shared secret"[..]), jwa::Algorithm::HS256);
//! let generator = JwtTokenGenerator::new(config);
//!
//! let grant = Grant::new(Identity::from_static("1"), scopes!["read"]);
//! let token = generator.create(&grant).unwrap();
//!
//! assert_eq!(generator.validate(token.access_token()).unwrap(), grant);
//! ```

use std::time::Duration;

use aliri::{
    error::{ClaimsRejected, JwtVerifyError},
    jwa, jwk,
    jwt::{self, HasAlgorithm},
    Jwk, Jwt, JwtRef,
};
use aliri_base64::Base64Url;
use aliri_clock::{Clock, System, UnixTime};
use serde::{Deserialize, Serialize};

use crate::{
    AccessToken, AccessTokenRef, Grant, Identity, IssuedToken, Scopes, TokenCreationError,
    TokenGenerator, TokenRejected,
};

const DEFAULT_LIFETIME: Duration = Duration::from_secs(60 * 60);

/// The key, algorithm, and token lifetime used to mint and verify tokens
///
/// The configuration is immutable once handed to a [`JwtTokenGenerator`].
#[derive(Clone, Debug)]
#[must_use]
pub struct SigningConfig {
    key: Jwk,
    algorithm: jwa::Algorithm,
    key_id: Option<jwk::KeyId>,
    lifetime: Duration,
}

impl SigningConfig {
    /// Signs and verifies with `key`, bound to `algorithm`
    ///
    /// Tokens last one hour unless configured otherwise.
    pub fn new(key: Jwk, algorithm: jwa::Algorithm) -> Self {
        Self {
            key: key.with_algorithm(algorithm),
            algorithm,
            key_id: None,
            lifetime: DEFAULT_LIFETIME,
        }
    }

    /// Signs and verifies with a shared HMAC secret
    pub fn hmac(secret: impl Into<Base64Url>, algorithm: jwa::Algorithm) -> Self {
        Self::new(Jwk::from(jwa::Hmac::new(secret)), algorithm)
    }

    /// Sets how long issued tokens remain valid
    ///
    /// Sub-second precision is discarded.
    pub fn with_lifetime(self, lifetime: Duration) -> Self {
        Self { lifetime, ..self }
    }

    /// Names the key in the `kid` header of issued tokens
    pub fn with_key_id(self, key_id: jwk::KeyId) -> Self {
        Self {
            key_id: Some(key_id),
            ..self
        }
    }

    /// The only algorithm tokens may be signed with
    #[inline]
    pub fn algorithm(&self) -> jwa::Algorithm {
        self.algorithm
    }

    /// How long issued tokens remain valid
    #[inline]
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    fn headers(&self) -> jwt::BasicHeaders {
        match &self.key_id {
            Some(kid) => jwt::BasicHeaders::with_key_id(self.algorithm, kid.clone()),
            None => jwt::BasicHeaders::new(self.algorithm),
        }
    }
}

#[derive(Serialize)]
struct IssuedClaims<'a> {
    id: &'a str,
    scope: &'a Scopes,
    iat: UnixTime,
    exp: UnixTime,
}

/// Claims as presented; nothing is trusted until each one has been checked
#[derive(Deserialize)]
struct PresentedClaims {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    scope: Option<serde_json::Value>,
    #[serde(default)]
    exp: Option<UnixTime>,
}

static NO_AUDIENCES: jwt::Audiences = jwt::Audiences::empty();

impl jwt::CoreClaims for PresentedClaims {
    fn nbf(&self) -> Option<UnixTime> {
        None
    }

    fn exp(&self) -> Option<UnixTime> {
        self.exp
    }

    fn aud(&self) -> &jwt::Audiences {
        &NO_AUDIENCES
    }

    fn iss(&self) -> Option<&jwt::IssuerRef> {
        None
    }

    fn sub(&self) -> Option<&jwt::SubjectRef> {
        None
    }
}

impl PresentedClaims {
    fn into_grant(self, now: UnixTime) -> Result<Grant, TokenRejected> {
        let exp = self.exp.ok_or(TokenRejected::MissingClaim("exp"))?;
        if now >= exp {
            return Err(TokenRejected::Expired);
        }

        let identity = match self.id {
            Some(serde_json::Value::String(id)) => Identity::new(id),
            Some(_) => return Err(TokenRejected::InvalidClaim("id")),
            None => return Err(TokenRejected::MissingClaim("id")),
        };

        let scopes = match self.scope {
            Some(scope) => serde_json::from_value::<Scopes>(scope)
                .map_err(|_| TokenRejected::InvalidClaim("scope"))?,
            None => return Err(TokenRejected::MissingClaim("scope")),
        };

        Ok(Grant::new(identity, scopes))
    }
}

/// Issues and validates JWT access tokens
///
/// The clock defaults to the system clock; tests can substitute a fixed one
/// with [`with_clock`](Self::with_clock).
#[derive(Clone, Debug)]
pub struct JwtTokenGenerator<C = System> {
    config: SigningConfig,
    validator: jwt::CoreValidator,
    clock: C,
}

impl JwtTokenGenerator {
    /// Constructs a generator from a signing configuration
    pub fn new(config: SigningConfig) -> Self {
        // Expiry is checked against our own clock once the signature holds,
        // so that a token is dead at exactly `exp`.
        let validator = jwt::CoreValidator::default()
            .ignore_expiration()
            .add_approved_algorithm(config.algorithm);

        Self {
            config,
            validator,
            clock: System,
        }
    }
}

impl<C> JwtTokenGenerator<C> {
    /// Replaces the clock used to stamp and check token lifetimes
    pub fn with_clock<D: Clock>(self, clock: D) -> JwtTokenGenerator<D> {
        JwtTokenGenerator {
            config: self.config,
            validator: self.validator,
            clock,
        }
    }

    /// The signing configuration
    #[inline]
    pub fn config(&self) -> &SigningConfig {
        &self.config
    }
}

fn classify(error: JwtVerifyError) -> TokenRejected {
    match error {
        JwtVerifyError::JwkVerifyError(err)
            if err.is_incompatible_alg() || err.is_usage_mismatch() =>
        {
            TokenRejected::AlgorithmMismatch
        }
        JwtVerifyError::JwkVerifyError(_) => TokenRejected::InvalidSignature,
        JwtVerifyError::ClaimsRejected(ClaimsRejected::InvalidAlgorithm) => {
            TokenRejected::AlgorithmMismatch
        }
        JwtVerifyError::ClaimsRejected(ClaimsRejected::TokenExpired) => TokenRejected::Expired,
        JwtVerifyError::ClaimsRejected(ClaimsRejected::MissingRequiredClaim(claim)) => {
            TokenRejected::MissingClaim(claim)
        }
        _ => TokenRejected::Malformed,
    }
}

impl<C> TokenGenerator for JwtTokenGenerator<C>
where
    C: Clock + Send + Sync,
{
    fn create(&self, grant: &Grant) -> Result<IssuedToken, TokenCreationError> {
        let iat = self.clock.now();
        let exp = iat
            .0
            .checked_add(self.config.lifetime.as_secs())
            .map(UnixTime)
            .ok_or(TokenCreationError::ExpiryOutOfRange)?;

        let claims = IssuedClaims {
            id: grant.identity().as_str(),
            scope: grant.scopes(),
            iat,
            exp,
        };

        let jwt = Jwt::try_from_parts_with_signature(&self.config.headers(), &claims, &self.config.key)
            .map_err(|err| {
                let error: &dyn std::error::Error = &err;
                tracing::warn!(error, "unable to sign token");
                err
            })?;

        tracing::debug!(
            identity = %grant.identity(),
            scopes = %grant.scopes(),
            exp = exp.0,
            "token minted"
        );

        Ok(IssuedToken::bearer(AccessToken::new(jwt.take()), exp))
    }

    fn validate(&self, token: &AccessTokenRef) -> Result<Grant, TokenRejected> {
        let jwt = JwtRef::from_str(token.as_str());

        let decomposed = jwt.decompose::<jwt::BasicHeaders>().map_err(|err| {
            let error: &dyn std::error::Error = &err;
            tracing::debug!(error, "token rejected: unable to decompose");
            TokenRejected::Malformed
        })?;

        let alg = decomposed.alg();
        if alg != self.config.algorithm {
            tracing::debug!(%alg, expected = %self.config.algorithm, "token rejected: algorithm mismatch");
            return Err(TokenRejected::AlgorithmMismatch);
        }

        let validated: jwt::Validated<PresentedClaims, jwt::BasicHeaders> = decomposed
            .verify(&self.config.key, &self.validator)
            .map_err(|err| {
                let rejected = classify(err);
                tracing::debug!(reason = %rejected, "token rejected");
                rejected
            })?;

        let (_, claims) = validated.extract();

        let grant = claims.into_grant(self.clock.now()).map_err(|rejected| {
            tracing::debug!(reason = %rejected, "token rejected");
            rejected
        })?;

        tracing::trace!(identity = %grant.identity(), "token valid");

        Ok(grant)
    }
}
