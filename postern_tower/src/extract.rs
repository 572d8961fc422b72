use std::{fmt, marker::PhantomData};

use http::{header, HeaderMap, Request, Response};
use postern::{AccessTokenRef, TokenGenerator};
use tower_http::validate_request::ValidateRequest;

use crate::Authentication;

/// Validator that resolves the bearer token on a request and attaches the
/// [`Authentication`] outcome to the request extensions
///
/// The token is validated on every request, replacing any outcome an earlier
/// extractor attached. This validator never rejects a request. Pair it with
/// [`RequireGrant`](crate::RequireGrant) or
/// [`RequireScopes`](crate::RequireScopes) to turn outcomes into responses.
pub struct ExtractBearer<G, ResBody> {
    generator: G,
    _ty: PhantomData<fn() -> ResBody>,
}

impl<G, ResBody> ExtractBearer<G, ResBody> {
    /// Constructs a new extractor around a token generator
    #[inline]
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            _ty: PhantomData,
        }
    }
}

impl<G, ResBody> Clone for ExtractBearer<G, ResBody>
where
    G: Clone,
{
    #[inline]
    fn clone(&self) -> Self {
        Self {
            generator: self.generator.clone(),
            _ty: PhantomData,
        }
    }
}

impl<G, ResBody> fmt::Debug for ExtractBearer<G, ResBody>
where
    G: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ExtractBearer")
            .field("generator", &self.generator)
            .finish()
    }
}

impl<G, ResBody> ExtractBearer<G, ResBody>
where
    G: TokenGenerator,
{
    /// Resolves the bearer token in `headers`, if any
    pub fn authenticate(&self, headers: &HeaderMap) -> Authentication {
        let Some(token) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
        else {
            tracing::trace!("no bearer token presented");
            return Authentication::Absent;
        };

        match self.generator.validate(token) {
            Ok(grant) => {
                tracing::trace!(identity = %grant.identity(), "bearer token accepted");
                Authentication::Granted(grant)
            }
            Err(reason) => {
                tracing::debug!(%reason, "bearer token rejected");
                Authentication::Rejected(reason)
            }
        }
    }
}

impl<G, ReqBody, ResBody> ValidateRequest<ReqBody> for ExtractBearer<G, ResBody>
where
    G: TokenGenerator,
{
    type ResponseBody = ResBody;

    fn validate(
        &mut self,
        request: &mut Request<ReqBody>,
    ) -> Result<(), Response<Self::ResponseBody>> {
        self.authenticate(request.headers())
            .attach(request.extensions_mut());

        Ok(())
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value
///
/// The scheme is matched case-insensitively and must be followed by a single
/// space. Everything after that space is the token, which must not be empty.
///
/// ```
/// use postern_tower::bearer_token;
///
/// assert_eq!(bearer_token("Bearer abc123").map(|t| t.as_str()), Some("abc123"));
/// assert_eq!(bearer_token("bearer abc123").map(|t| t.as_str()), Some("abc123"));
/// assert!(bearer_token("abc123").is_none());
/// assert!(bearer_token("Bearer ").is_none());
/// assert!(bearer_token("Basic YWRtaW46YWRtaW4=").is_none());
/// ```
pub fn bearer_token(auth: &str) -> Option<&AccessTokenRef> {
    let scheme = auth.get(..7)?;
    if !scheme.eq_ignore_ascii_case("bearer ") {
        return None;
    }

    match &auth[7..] {
        "" => None,
        token => Some(AccessTokenRef::from_str(token)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use aliri::jwa;
    use aliri_base64::Base64Url;
    use color_eyre::Result;
    use http::HeaderValue;
    use postern::{scopes, Grant, Identity, JwtTokenGenerator, SigningConfig, TokenRejected};

    use super::*;

    fn generator() -> Arc<dyn TokenGenerator> {
        Arc::new(JwtTokenGenerator::new(SigningConfig::hmac(
            Base64Url::from_raw(&b"extract test secret"[..]),
            jwa::Algorithm::HS256,
        )))
    }

    fn request_with(auth: Option<&str>) -> Request<()> {
        let mut builder = Request::builder().uri("/");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        builder.body(()).unwrap()
    }

    fn extract(
        extractor: &mut ExtractBearer<Arc<dyn TokenGenerator>, ()>,
        request: &mut Request<()>,
    ) -> Authentication {
        assert!(extractor.validate(request).is_ok());
        Authentication::read(request.extensions()).clone()
    }

    #[test]
    fn extracts_bearer_tokens() {
        assert_eq!(bearer_token("Bearer abc123").unwrap().as_str(), "abc123");
        assert_eq!(bearer_token("BEARER abc123").unwrap().as_str(), "abc123");
        assert_eq!(bearer_token("bEaReR a.b.c").unwrap().as_str(), "a.b.c");
    }

    #[test]
    fn ignores_anything_else() {
        for auth in ["", "abc123", "Bearer", "Bearer ", "Bearerabc123", "Token abc123", "Bearér x"] {
            assert!(bearer_token(auth).is_none(), "input: {auth:?}");
        }
    }

    #[test]
    fn missing_header_is_absent() {
        let mut extractor = ExtractBearer::new(generator());

        let outcome = extract(&mut extractor, &mut request_with(None));

        assert_eq!(outcome, Authentication::Absent);
    }

    #[test]
    fn malformed_header_is_absent() {
        let mut extractor = ExtractBearer::new(generator());

        let outcome = extract(&mut extractor, &mut request_with(Some("Basic YWRtaW46YWRtaW4=")));

        assert_eq!(outcome, Authentication::Absent);
    }

    #[test]
    fn non_ascii_header_is_absent() {
        let mut extractor = ExtractBearer::new(generator());
        let mut request = request_with(None);
        request.headers_mut().insert(
            header::AUTHORIZATION,
            HeaderValue::from_bytes(b"Bearer \xff\xfe").unwrap(),
        );

        assert_eq!(extract(&mut extractor, &mut request), Authentication::Absent);
    }

    #[test]
    fn valid_token_is_granted() -> Result<()> {
        let generator = generator();
        let grant = Grant::new(Identity::from_static("1"), scopes!["read"]);
        let token = generator.create(&grant)?;
        let mut extractor = ExtractBearer::new(generator);

        let auth = format!("Bearer {}", token.access_token().as_str());
        let mut request = request_with(Some(&auth));
        let outcome = extract(&mut extractor, &mut request);

        assert_eq!(outcome, Authentication::Granted(grant.clone()));
        assert_eq!(request.extensions().get::<Grant>(), Some(&grant));
        Ok(())
    }

    #[test]
    fn invalid_token_is_rejected_but_request_continues() {
        let mut extractor = ExtractBearer::new(generator());

        let outcome = extract(&mut extractor, &mut request_with(Some("Bearer not-a-token")));

        assert_eq!(outcome, Authentication::Rejected(TokenRejected::Malformed));
    }

    #[test]
    fn earlier_outcome_is_replaced() -> Result<()> {
        let generator = generator();
        let grant = Grant::new(Identity::from_static("1"), scopes!["read"]);
        let token = generator.create(&grant)?;
        let mut extractor = ExtractBearer::new(generator);

        let auth = format!("Bearer {}", token.access_token().as_str());
        let mut request = request_with(Some(&auth));
        Authentication::Rejected(TokenRejected::Expired).attach(request.extensions_mut());

        assert_eq!(
            extract(&mut extractor, &mut request),
            Authentication::Granted(grant)
        );
        Ok(())
    }

    #[test]
    fn earlier_grant_is_checked_again() -> Result<()> {
        let other = JwtTokenGenerator::new(SigningConfig::hmac(
            Base64Url::from_raw(&b"some other secret"[..]),
            jwa::Algorithm::HS256,
        ));
        let grant = Grant::new(Identity::from_static("1"), scopes!["read"]);
        let token = other.create(&grant)?;
        let mut extractor = ExtractBearer::new(generator());

        let auth = format!("Bearer {}", token.access_token().as_str());
        let mut request = request_with(Some(&auth));
        Authentication::Granted(grant).attach(request.extensions_mut());

        assert_eq!(
            extract(&mut extractor, &mut request),
            Authentication::Rejected(TokenRejected::InvalidSignature)
        );
        assert!(request.extensions().get::<Grant>().is_none());
        Ok(())
    }

    #[test]
    fn extra_whitespace_is_left_for_the_generator() {
        let mut extractor = ExtractBearer::new(generator());

        let outcome = extract(&mut extractor, &mut request_with(Some("Bearer  abc")));

        assert_eq!(outcome, Authentication::Rejected(TokenRejected::Malformed));
    }
}
