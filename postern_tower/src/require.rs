use std::fmt;

use bytes::Bytes;
use http::{Extensions, Request, Response};
use postern::{Grant, ScopeRef, Scopes, TokenRejected};
use tower_http::validate_request::ValidateRequest;

use crate::{util::unauthorized, Authentication, TerseErrorHandler, VerboseErrorHandler};

/// Handler for responding to requests that fail authorization
pub trait OnAuthError {
    /// The body type returned on an error
    type Body;

    /// Response when no bearer token was presented
    fn on_absent(&self) -> Response<Self::Body>;

    /// Response when the presented token was refused
    fn on_rejected(&self, reason: TokenRejected) -> Response<Self::Body>;

    /// Response when the grant lacks a required scope
    fn on_insufficient_scope(&self, missing: &ScopeRef) -> Response<Self::Body>;
}

macro_rules! delegate_impls {
    ($($ty:ty)*) => {
        $(
            impl<T> OnAuthError for $ty
            where
                T: OnAuthError,
            {
                type Body = T::Body;

                fn on_absent(&self) -> Response<Self::Body> {
                    T::on_absent(self)
                }

                fn on_rejected(&self, reason: TokenRejected) -> Response<Self::Body> {
                    T::on_rejected(self, reason)
                }

                fn on_insufficient_scope(&self, missing: &ScopeRef) -> Response<Self::Body> {
                    T::on_insufficient_scope(self, missing)
                }
            }
        )*
    }
}

delegate_impls!(
    &'_ T
    Box<T>
    std::rc::Rc<T>
    std::sync::Arc<T>
);

/// Every failure is reported as a bare `401 Unauthorized`
impl<ResBody> OnAuthError for TerseErrorHandler<ResBody>
where
    ResBody: From<Bytes>,
{
    type Body = ResBody;

    #[inline]
    fn on_absent(&self) -> Response<Self::Body> {
        tracing::debug!("authorization failed: bearer token is missing or malformed");
        unauthorized("")
    }

    #[inline]
    fn on_rejected(&self, reason: TokenRejected) -> Response<Self::Body> {
        tracing::debug!(%reason, "authorization failed");
        unauthorized("")
    }

    #[inline]
    fn on_insufficient_scope(&self, missing: &ScopeRef) -> Response<Self::Body> {
        tracing::debug!(%missing, "authorization failed: required scope not granted");
        unauthorized("")
    }
}

/// Failures are reported as `401 Unauthorized` with an `error_description`
/// naming the check that failed
impl<ResBody> OnAuthError for VerboseErrorHandler<ResBody>
where
    ResBody: From<Bytes>,
{
    type Body = ResBody;

    #[inline]
    fn on_absent(&self) -> Response<Self::Body> {
        let message = "bearer token is missing or malformed";
        tracing::debug!("authorization failed: {message}");
        unauthorized(message)
    }

    #[inline]
    fn on_rejected(&self, reason: TokenRejected) -> Response<Self::Body> {
        let message = reason.to_string();
        tracing::debug!("authorization failed: {message}");
        unauthorized(&message)
    }

    #[inline]
    fn on_insufficient_scope(&self, missing: &ScopeRef) -> Response<Self::Body> {
        let message = format!("required scope not granted: {missing}");
        tracing::debug!("authorization failed: {message}");
        unauthorized(&message)
    }
}

fn require_grant<'a, OnError>(
    extensions: &'a Extensions,
    on_error: &OnError,
) -> Result<&'a Grant, Response<OnError::Body>>
where
    OnError: OnAuthError,
{
    match Authentication::read(extensions) {
        Authentication::Granted(grant) => Ok(grant),
        Authentication::Rejected(reason) => Err(on_error.on_rejected(*reason)),
        Authentication::Absent => Err(on_error.on_absent()),
    }
}

/// Validator that only admits requests carrying a valid bearer token
///
/// The [`Authentication`] outcome is expected to have already been attached
/// by [`ExtractBearer`](crate::ExtractBearer).
#[derive(Clone)]
pub struct RequireGrant<OnError> {
    on_error: OnError,
}

impl<OnError> RequireGrant<OnError> {
    /// Constructs a new validator that reports failures through `on_error`
    #[inline]
    pub fn new(on_error: OnError) -> Self {
        Self { on_error }
    }
}

impl<OnError> fmt::Debug for RequireGrant<OnError>
where
    OnError: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RequireGrant")
            .field("on_error", &self.on_error)
            .finish()
    }
}

impl<OnError, ReqBody> ValidateRequest<ReqBody> for RequireGrant<OnError>
where
    OnError: OnAuthError,
{
    type ResponseBody = OnError::Body;

    fn validate(
        &mut self,
        request: &mut Request<ReqBody>,
    ) -> Result<(), Response<Self::ResponseBody>> {
        let grant = require_grant(request.extensions(), &self.on_error)?;
        tracing::trace!(identity = %grant.identity(), "grant present");
        Ok(())
    }
}

/// Validator that only admits requests whose grant holds every one of a set
/// of scopes
///
/// Membership is exact and case-sensitive. The order in which scopes were
/// granted or required does not matter, and neither do duplicates. An empty
/// requirement admits any request carrying a valid token.
#[derive(Clone)]
pub struct RequireScopes<OnError> {
    required: Scopes,
    on_error: OnError,
}

impl<OnError> RequireScopes<OnError> {
    /// Constructs a new validator requiring every scope in `required`
    #[inline]
    pub fn new(required: Scopes, on_error: OnError) -> Self {
        Self { required, on_error }
    }

    /// The scopes a grant must hold
    #[inline]
    pub fn required(&self) -> &Scopes {
        &self.required
    }
}

impl<OnError> fmt::Debug for RequireScopes<OnError>
where
    OnError: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RequireScopes")
            .field("required", &self.required)
            .field("on_error", &self.on_error)
            .finish()
    }
}

impl<OnError, ReqBody> ValidateRequest<ReqBody> for RequireScopes<OnError>
where
    OnError: OnAuthError,
{
    type ResponseBody = OnError::Body;

    fn validate(
        &mut self,
        request: &mut Request<ReqBody>,
    ) -> Result<(), Response<Self::ResponseBody>> {
        let grant = require_grant(request.extensions(), &self.on_error)?;

        tracing::trace!(granted = %grant.scopes(), required = %self.required, "evaluating scopes");

        if let Some(missing) = grant.scopes().first_missing(self.required.iter()) {
            return Err(self.on_error.on_insufficient_scope(missing));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use http::{header, StatusCode};
    use postern::{scopes, Identity};

    use super::*;

    fn request_granted(scopes: Scopes) -> Request<()> {
        let mut request = Request::new(());
        Authentication::Granted(Grant::new(Identity::from_static("1"), scopes))
            .attach(request.extensions_mut());
        request
    }

    fn request_with(outcome: Authentication) -> Request<()> {
        let mut request = Request::new(());
        outcome.attach(request.extensions_mut());
        request
    }

    fn challenge(resp: &Response<Bytes>) -> &str {
        resp.headers()[header::WWW_AUTHENTICATE].to_str().unwrap()
    }

    #[test]
    fn require_grant_admits_valid_token() {
        let mut require = RequireGrant::new(TerseErrorHandler::<Bytes>::new());

        assert!(require.validate(&mut request_granted(Scopes::empty())).is_ok());
    }

    #[test]
    fn require_grant_refuses_absent_and_rejected() {
        let mut require = RequireGrant::new(TerseErrorHandler::<Bytes>::new());

        for outcome in [
            Authentication::Absent,
            Authentication::Rejected(TokenRejected::Expired),
            Authentication::Rejected(TokenRejected::InvalidSignature),
        ] {
            let resp = require.validate(&mut request_with(outcome)).unwrap_err();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(resp.body(), &Bytes::from_static(b"Unauthorized"));
        }
    }

    #[test]
    fn require_grant_refuses_request_never_extracted() {
        let mut require = RequireGrant::new(TerseErrorHandler::<Bytes>::new());

        let resp = require.validate(&mut Request::new(())).unwrap_err();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn require_scopes_needs_every_scope() {
        let mut require = RequireScopes::new(scopes!["a", "b"], TerseErrorHandler::<Bytes>::new());

        assert!(require.validate(&mut request_granted(scopes!["a"])).is_err());
        assert!(require.validate(&mut request_granted(scopes!["b"])).is_err());
        assert!(require.validate(&mut request_granted(Scopes::empty())).is_err());
        assert!(require
            .validate(&mut request_granted(scopes!["a", "b", "c"]))
            .is_ok());
    }

    #[test]
    fn require_scopes_ignores_order_and_duplicates() {
        let mut require = RequireScopes::new(scopes!["a", "b", "a"], TerseErrorHandler::<Bytes>::new());

        assert!(require.validate(&mut request_granted(scopes!["b", "a"])).is_ok());
        assert!(require
            .validate(&mut request_granted(scopes!["b", "b", "a"]))
            .is_ok());
    }

    #[test]
    fn require_scopes_is_case_sensitive() {
        let mut require = RequireScopes::new(scopes!["read"], TerseErrorHandler::<Bytes>::new());

        assert!(require.validate(&mut request_granted(scopes!["READ"])).is_err());
    }

    #[test]
    fn empty_requirement_only_needs_a_grant() {
        let mut require = RequireScopes::new(Scopes::empty(), TerseErrorHandler::<Bytes>::new());

        assert!(require.validate(&mut request_granted(Scopes::empty())).is_ok());
        assert!(require.validate(&mut request_with(Authentication::Absent)).is_err());
    }

    #[test]
    fn require_scopes_refuses_rejected_token_before_checking_scopes() {
        let mut require = RequireScopes::new(Scopes::empty(), VerboseErrorHandler::<Bytes>::new());

        let resp = require
            .validate(&mut request_with(Authentication::Rejected(TokenRejected::Expired)))
            .unwrap_err();

        assert_eq!(
            challenge(&resp),
            r#"Bearer error="invalid_token" error_description="token expired""#
        );
    }

    #[test]
    fn terse_handler_reveals_nothing() {
        let mut require = RequireScopes::new(scopes!["admin"], TerseErrorHandler::<Bytes>::new());

        let resp = require.validate(&mut request_granted(scopes!["read"])).unwrap_err();

        assert_eq!(challenge(&resp), r#"Bearer error="invalid_token""#);
    }

    #[test]
    fn verbose_handler_names_the_missing_scope() {
        let mut require = RequireScopes::new(
            scopes!["read", "admin"],
            VerboseErrorHandler::<Bytes>::new(),
        );

        let resp = require.validate(&mut request_granted(scopes!["read"])).unwrap_err();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            challenge(&resp),
            r#"Bearer error="invalid_token" error_description="required scope not granted: admin""#
        );
    }

    #[test]
    fn verbose_handler_describes_absent_token() {
        let mut require = RequireGrant::new(VerboseErrorHandler::<Bytes>::new());

        let resp = require.validate(&mut Request::new(())).unwrap_err();

        assert_eq!(
            challenge(&resp),
            r#"Bearer error="invalid_token" error_description="bearer token is missing or malformed""#
        );
    }
}
