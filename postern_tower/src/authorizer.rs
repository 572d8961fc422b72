use std::fmt;

use bytes::Bytes;
use postern::{Authenticator, Scopes, TokenGenerator};
use tower_http::validate_request::ValidateRequestHeaderLayer;

use crate::{
    ExtractBearer, IssueToken, OnAuthError, RequireGrant, RequireScopes, TerseErrorHandler,
    VerboseErrorHandler,
};

/// Builder for the layers that authenticate bearer tokens and authorize access
/// based on granted scopes, and for the matching token endpoint
///
/// Every layer and endpoint produced by one authorizer shares the same token
/// generator, so tokens issued by the endpoint are accepted by the layers.
pub struct Authorizer<G, OnError> {
    generator: G,
    on_error: OnError,
}

impl<G, OnError> Clone for Authorizer<G, OnError>
where
    G: Clone,
    OnError: Clone,
{
    fn clone(&self) -> Self {
        Self {
            generator: self.generator.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

impl<G, OnError> fmt::Debug for Authorizer<G, OnError>
where
    OnError: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Authorizer")
            .field("on_error", &self.on_error)
            .finish_non_exhaustive()
    }
}

impl<G> Authorizer<G, ()> {
    /// Constructs a new authorizer around a token generator
    ///
    /// An error handler must be attached before any layers can be built.
    #[inline]
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            on_error: (),
        }
    }

    /// Attaches a custom error handler to generate responses
    /// in the event of an authorization failure
    #[inline]
    pub fn with_error_handler<OnError>(self, on_error: OnError) -> Authorizer<G, OnError> {
        Authorizer {
            generator: self.generator,
            on_error,
        }
    }

    /// Attaches the default terse error handler: [`TerseErrorHandler`]
    ///
    /// This error handler responds `401 Unauthorized` without describing
    /// which check failed
    #[inline]
    pub fn with_terse_error_handler<ResBody: From<Bytes>>(
        self,
    ) -> Authorizer<G, TerseErrorHandler<ResBody>> {
        self.with_error_handler(TerseErrorHandler::new())
    }

    /// Attaches the verbose error handler: [`VerboseErrorHandler`]
    ///
    /// This error handler responds `401 Unauthorized` with an
    /// `error_description` naming the check that failed
    #[inline]
    pub fn with_verbose_error_handler<ResBody: From<Bytes>>(
        self,
    ) -> Authorizer<G, VerboseErrorHandler<ResBody>> {
        self.with_error_handler(VerboseErrorHandler::new())
    }
}

impl<G, OnError> Authorizer<G, OnError>
where
    G: TokenGenerator + Clone,
    OnError: OnAuthError + Clone,
    OnError::Body: From<Bytes>,
{
    /// Layer that resolves the bearer token on every request
    ///
    /// The resulting [`Authentication`](crate::Authentication) outcome is made
    /// available through [`Request::extensions`][http::Request::extensions].
    /// This layer never rejects a request by itself.
    pub fn extract_layer(&self) -> ValidateRequestHeaderLayer<ExtractBearer<G, OnError::Body>> {
        ValidateRequestHeaderLayer::custom(ExtractBearer::new(self.generator.clone()))
    }

    /// Layer that rejects requests without a valid bearer token
    ///
    /// Must run after [`extract_layer`](Self::extract_layer).
    pub fn require_layer(&self) -> ValidateRequestHeaderLayer<RequireGrant<OnError>> {
        ValidateRequestHeaderLayer::custom(RequireGrant::new(self.on_error.clone()))
    }

    /// Layer that rejects requests whose grant lacks any of the `required`
    /// scopes
    ///
    /// Must run after [`extract_layer`](Self::extract_layer).
    pub fn require_scopes_layer(
        &self,
        required: Scopes,
    ) -> ValidateRequestHeaderLayer<RequireScopes<OnError>> {
        ValidateRequestHeaderLayer::custom(RequireScopes::new(required, self.on_error.clone()))
    }

    /// Token endpoint issuing tokens that this authorizer's layers accept
    pub fn token_endpoint<A>(&self, authenticator: A) -> IssueToken<A, G, OnError::Body>
    where
        A: Authenticator,
    {
        IssueToken::new(authenticator, self.generator.clone())
    }
}
