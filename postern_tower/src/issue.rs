use std::{
    convert::Infallible,
    error, fmt,
    future::Future,
    marker::PhantomData,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use aliri_base64::Base64;
use bytes::Bytes;
use http::{header, request::Parts, HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, Limited};
use postern::{
    AuthenticationError, Authenticator, ClientId, ClientSecret, IssuedToken, Scopes,
    TokenCreationError, TokenGenerator,
};
use thiserror::Error;
use tower_service::Service;

use crate::util::plain_status;

const MAX_FORM_LEN: usize = 64 * 1024;
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const CLIENT_CREDENTIALS: &str = "client_credentials";

/// An error occurring while handling a token request
#[derive(Debug, Error)]
pub enum IssueError {
    /// The request did not use `POST`
    #[error("method not allowed: {0}")]
    MethodNotAllowed(Method),

    /// The `grant_type` was missing or not `client_credentials`
    #[error("unsupported grant type")]
    UnsupportedGrantType,

    /// The request could not be read or lacked client credentials
    #[error("malformed token request: {0}")]
    MalformedRequest(&'static str),

    /// The client could not be granted the scopes it asked for
    #[error("client authentication failed")]
    Authentication(#[from] AuthenticationError),

    /// The token could not be minted
    #[error("unable to create token")]
    Token(#[from] TokenCreationError),

    /// The token response could not be serialized
    #[error("unable to serialize token response")]
    Serialization(#[source] serde_json::Error),
}

impl IssueError {
    /// Whether this error is the server's fault rather than the client's
    #[must_use]
    pub fn is_server_fault(&self) -> bool {
        matches!(self, Self::Token(_) | Self::Serialization(_))
    }

    /// The status code reported to the client
    #[must_use]
    pub fn status(&self) -> StatusCode {
        if self.is_server_fault() {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::UNAUTHORIZED
        }
    }
}

/// Form fields gathered from the body and query string, first occurrence wins
struct Form(Vec<(String, String)>);

impl Form {
    fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

struct Credentials {
    client_id: ClientId,
    secret: ClientSecret,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("secret", &self.secret)
            .finish()
    }
}

/// Decodes `Authorization: Basic <base64(id:secret)>`
fn basic_credentials(headers: &HeaderMap) -> Option<Credentials> {
    let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    if !auth.get(..6)?.eq_ignore_ascii_case("basic ") {
        return None;
    }

    let decoded = Base64::from_encoded(auth[6..].trim()).ok()?.into_inner();
    let decoded = String::from_utf8(decoded).ok()?;
    let (client_id, secret) = decoded.split_once(':')?;

    Some(Credentials {
        client_id: ClientId::new(client_id.to_owned()),
        secret: ClientSecret::new(secret.to_owned()),
    })
}

fn form_credentials(form: &Form) -> Option<Credentials> {
    Some(Credentials {
        client_id: ClientId::new(form.get("client_id")?.to_owned()),
        secret: ClientSecret::new(form.get("client_secret")?.to_owned()),
    })
}

fn accepts_form_body(headers: &HeaderMap) -> bool {
    match headers.get(header::CONTENT_TYPE) {
        None => true,
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|ct| ct.split(';').next())
            .map_or(false, |mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE)),
    }
}

struct Inner<A, G> {
    authenticator: A,
    generator: G,
}

/// A service implementing the client-credentials token endpoint
///
/// Only `POST` requests with `grant_type=client_credentials` are accepted.
/// Client credentials are read from HTTP Basic authentication when present
/// and well-formed, or else from the `client_id` and `client_secret` form
/// fields. Requested scopes are read from the space-delimited `scope` field.
/// Form fields are taken from an `application/x-www-form-urlencoded` body,
/// then from the query string; where a field appears more than once, the
/// first occurrence wins.
///
/// On success, responds `200 OK` with the JSON-serialized [`IssuedToken`].
/// Server faults while minting or serializing the token respond
/// `500 Internal Server Error`; every other failure responds
/// `401 Unauthorized`.
pub struct IssueToken<A, G, ResBody = Full<Bytes>> {
    inner: Arc<Inner<A, G>>,
    _ty: PhantomData<fn() -> ResBody>,
}

impl<A, G, ResBody> IssueToken<A, G, ResBody> {
    /// Constructs a token endpoint from an authenticator and token generator
    pub fn new(authenticator: A, generator: G) -> Self {
        Self {
            inner: Arc::new(Inner {
                authenticator,
                generator,
            }),
            _ty: PhantomData,
        }
    }
}

impl<A, G, ResBody> Clone for IssueToken<A, G, ResBody> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _ty: PhantomData,
        }
    }
}

impl<A, G, ResBody> fmt::Debug for IssueToken<A, G, ResBody> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("IssueToken").finish_non_exhaustive()
    }
}

impl<A, G> Inner<A, G>
where
    A: Authenticator,
    G: TokenGenerator,
{
    async fn read_form<B>(parts: &Parts, body: B) -> Result<Form, IssueError>
    where
        B: http_body::Body,
        B::Error: Into<Box<dyn error::Error + Send + Sync>>,
    {
        let mut fields = Vec::new();

        if accepts_form_body(&parts.headers) {
            let bytes = Limited::new(body, MAX_FORM_LEN)
                .collect()
                .await
                .map_err(|err| {
                    tracing::debug!(error = %err, "unable to read request body");
                    IssueError::MalformedRequest("unreadable body")
                })?
                .to_bytes();

            fields = serde_urlencoded::from_bytes::<Vec<(String, String)>>(&bytes)
                .map_err(|_| IssueError::MalformedRequest("malformed form body"))?;
        }

        if let Some(query) = parts.uri.query() {
            let query = serde_urlencoded::from_str::<Vec<(String, String)>>(query)
                .map_err(|_| IssueError::MalformedRequest("malformed query string"))?;
            fields.extend(query);
        }

        Ok(Form(fields))
    }

    #[tracing::instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
    async fn issue<B>(&self, request: Request<B>) -> Result<Vec<u8>, IssueError>
    where
        B: http_body::Body,
        B::Error: Into<Box<dyn error::Error + Send + Sync>>,
    {
        if request.method() != Method::POST {
            return Err(IssueError::MethodNotAllowed(request.method().clone()));
        }

        let (parts, body) = request.into_parts();
        let form = Self::read_form(&parts, body).await?;

        if form.get("grant_type") != Some(CLIENT_CREDENTIALS) {
            return Err(IssueError::UnsupportedGrantType);
        }

        let credentials = match basic_credentials(&parts.headers) {
            Some(credentials) => {
                tracing::trace!("using basic authentication credentials");
                credentials
            }
            None => form_credentials(&form)
                .ok_or(IssueError::MalformedRequest("missing client credentials"))?,
        };

        let scopes: Scopes = form.get("scope").unwrap_or_default().parse().unwrap_or_default();

        let grant = self
            .authenticator
            .authenticate(&credentials.client_id, &credentials.secret, scopes)
            .await?;

        let token: IssuedToken = self.generator.create(&grant)?;

        let body = serde_json::to_vec(&token).map_err(IssueError::Serialization)?;

        tracing::info!(
            client_id = %credentials.client_id,
            identity = %grant.identity(),
            scopes = %grant.scopes(),
            "token issued"
        );

        Ok(body)
    }

    async fn respond<B, ResBody>(&self, request: Request<B>) -> Response<ResBody>
    where
        B: http_body::Body,
        B::Error: Into<Box<dyn error::Error + Send + Sync>>,
        ResBody: From<Bytes>,
    {
        match self.issue(request).await {
            Ok(body) => {
                let mut resp = Response::new(ResBody::from(Bytes::from(body)));
                resp.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                resp
            }
            Err(err) => {
                if err.is_server_fault() {
                    let error: &dyn error::Error = &err;
                    tracing::error!(error, "token request failed");
                } else {
                    tracing::debug!(error = %err, "token request refused");
                }
                plain_status(err.status())
            }
        }
    }
}

impl<A, G, ReqBody, ResBody> Service<Request<ReqBody>> for IssueToken<A, G, ResBody>
where
    A: Authenticator + 'static,
    G: TokenGenerator + 'static,
    ReqBody: http_body::Body + Send + 'static,
    ReqBody::Data: Send,
    ReqBody::Error: Into<Box<dyn error::Error + Send + Sync>>,
    ResBody: From<Bytes> + Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    #[inline]
    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { Ok(inner.respond(request).await) })
    }
}
