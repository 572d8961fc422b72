//! Utilities for generating HTTP responses on authorization failures

use bytes::Bytes;
use http::{header, HeaderValue, Response, StatusCode};

/// Build a `401 Unauthorized` response with the appropriate `www-authenticate`
/// header
///
/// The description provided will be automatically escaped to make sure it
/// is header-friendly.
///
/// The prepared response will have the form:
///
/// ```http
/// HTTP/1.1 401 Unauthorized
/// content-type: text/plain; charset=utf-8
/// www-authenticate: Bearer error="invalid_token" error_description="{description}"
///
/// Unauthorized
/// ```
///
/// `error_description` is omitted if `description` is empty.
pub fn unauthorized<Body: From<Bytes>>(description: &str) -> Response<Body> {
    let mut resp = plain_status(StatusCode::UNAUTHORIZED);
    resp.headers_mut()
        .insert(header::WWW_AUTHENTICATE, invalid_token(description));
    resp
}

/// Build a response whose body is the canonical reason phrase of `status`
///
/// ```http
/// HTTP/1.1 500 Internal Server Error
/// content-type: text/plain; charset=utf-8
///
/// Internal Server Error
/// ```
pub fn plain_status<Body: From<Bytes>>(status: StatusCode) -> Response<Body> {
    let reason = status.canonical_reason().unwrap_or_default();
    let mut resp = Response::new(Body::from(Bytes::from_static(reason.as_bytes())));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    resp
}

fn invalid_token(description: &str) -> HeaderValue {
    if description.is_empty() {
        HeaderValue::from_static(r#"Bearer error="invalid_token""#)
    } else {
        HeaderValue::try_from(format!(
            r#"Bearer error="invalid_token" error_description="{}""#,
            description.escape_default()
        ))
        .expect("escaped description is a valid header value")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use http_body_util::{BodyExt, Full};
    use postern::TokenRejected;

    use super::*;

    #[test]
    fn rejection_reason_becomes_the_description() {
        let resp = unauthorized::<Bytes>(&TokenRejected::Expired.to_string());

        let headers = extract_www_authenticate_headers(&resp);

        let expected =
            BTreeSet::from([r#"Bearer error="invalid_token" error_description="token expired""#]);

        assert_eq!(headers, expected);
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(resp.body(), &Bytes::from_static(b"Unauthorized"));
    }

    #[test]
    fn quotes_in_description_are_escaped() {
        let resp = unauthorized::<Bytes>(r#"scope "admin" missing"#);

        let headers = extract_www_authenticate_headers(&resp);

        let expected = BTreeSet::from([
            r#"Bearer error="invalid_token" error_description="scope \"admin\" missing""#,
        ]);

        assert_eq!(headers, expected);
    }

    #[test]
    fn in_unauthorized_with_empty_description_doesnt_include_description() {
        let resp = unauthorized::<Bytes>("");

        let headers = extract_www_authenticate_headers(&resp);

        let expected = BTreeSet::from([r#"Bearer error="invalid_token""#]);

        assert_eq!(headers, expected);
    }

    #[test]
    fn unauthorized_has_plain_text_body() {
        let resp = unauthorized::<Bytes>("token expired");

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(resp.body(), &Bytes::from_static(b"Unauthorized"));
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn server_error_reads_as_reason_phrase() -> color_eyre::Result<()> {
        let resp = plain_status::<Full<Bytes>>(StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp.headers().get(header::WWW_AUTHENTICATE).is_none());

        let body = resp.into_body().collect().await?.to_bytes();
        assert_eq!(body, "Internal Server Error");
        Ok(())
    }

    fn extract_www_authenticate_headers<B>(resp: &Response<B>) -> BTreeSet<&str> {
        resp.headers()
            .get_all(header::WWW_AUTHENTICATE)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect::<BTreeSet<_>>()
    }
}
