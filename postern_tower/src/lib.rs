//! Tower middleware and a token endpoint for `postern` client-credentials
//! grants, for use with `tower_http` and other constructs in the ecosystem,
//! including `axum`.
//!
//! The pipeline has three stages:
//!
//! 1. [`ExtractBearer`] resolves the `Authorization: Bearer` token on every
//!    request and attaches an [`Authentication`] outcome to the request
//!    extensions. It never rejects a request.
//! 2. [`RequireGrant`] rejects requests that did not present a valid token.
//! 3. [`RequireScopes`] additionally rejects requests whose grant lacks any
//!    of a set of scopes.
//!
//! Tokens are obtained from the [`IssueToken`] service. An [`Authorizer`]
//! builds all of these around one shared token generator.
//!
//! ```
//! use std::sync::Arc;
//!
//! use aliri::jwa;
//! use aliri_base64::Base64Url;
//! use axum::{routing::get, Extension, Router};
//! use postern::{scopes, ClientTable, Grant, JwtTokenGenerator, SigningConfig, TokenGenerator};
//! use postern_tower::Authorizer;
//!
//! let generator: Arc<dyn TokenGenerator> = Arc::new(JwtTokenGenerator::new(
//!     SigningConfig::hmac(Base64Url::from_raw(&b"a shared secret"[..]), jwa::Algorithm::HS256),
//! ));
//!
//! let authorizer = Authorizer::new(generator)
//!     .with_terse_error_handler::<axum::body::Body>();
//!
//! let app: Router = Router::new()
//!     .route(
//!         "/repositories",
//!         get(list_repositories).layer(authorizer.require_scopes_layer(scopes!["read"])),
//!     )
//!     .route("/me", get(whoami).layer(authorizer.require_layer()))
//!     .layer(authorizer.extract_layer())
//!     .route_service("/token", authorizer.token_endpoint(ClientTable::reference()));
//!
//! async fn list_repositories() -> &'static str {
//!     "[]"
//! }
//!
//! async fn whoami(Extension(grant): Extension<Grant>) -> String {
//!     grant.identity().to_string()
//! }
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

use std::{fmt, marker::PhantomData};

use bytes::Bytes;
use http_body_util::Full;

mod authorizer;
mod context;
mod extract;
mod issue;
mod require;
pub mod util;

pub use authorizer::Authorizer;
pub use context::Authentication;
pub use extract::{bearer_token, ExtractBearer};
pub use issue::{IssueError, IssueToken};
pub use require::{OnAuthError, RequireGrant, RequireScopes};

/// Terse responders for authorization failures
///
/// Every failure responds `401 Unauthorized` with a bare
/// `www-authenticate: Bearer error="invalid_token"` challenge, so callers
/// cannot learn which check failed.
pub struct TerseErrorHandler<ResBody = Full<Bytes>> {
    _ty: PhantomData<fn() -> ResBody>,
}

impl<ResBody> TerseErrorHandler<ResBody> {
    /// Instantiates a new instance over a given body type
    #[inline]
    pub fn new() -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> fmt::Debug for TerseErrorHandler<ResBody> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("TerseErrorHandler")
    }
}

impl<ResBody> Default for TerseErrorHandler<ResBody> {
    #[inline]
    fn default() -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> Clone for TerseErrorHandler<ResBody> {
    #[inline]
    fn clone(&self) -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> Copy for TerseErrorHandler<ResBody> {}

/// Verbose responders for authorization failures
///
/// Failures respond `401 Unauthorized` like [`TerseErrorHandler`], but the
/// challenge carries an `error_description` naming the check that failed.
/// Intended for development.
pub struct VerboseErrorHandler<ResBody = Full<Bytes>> {
    _ty: PhantomData<fn() -> ResBody>,
}

impl<ResBody> VerboseErrorHandler<ResBody> {
    /// Instantiates a new instance over a given body type
    #[inline]
    pub fn new() -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> fmt::Debug for VerboseErrorHandler<ResBody> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("VerboseErrorHandler")
    }
}

impl<ResBody> Default for VerboseErrorHandler<ResBody> {
    #[inline]
    fn default() -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> Clone for VerboseErrorHandler<ResBody> {
    #[inline]
    fn clone(&self) -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> Copy for VerboseErrorHandler<ResBody> {}
