use aliri_braid::braid;
use std::fmt;

macro_rules! limited_reveal {
    ($ty:ty: $hidden:literal, $default:literal) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    f.write_str("\"")?;
                    limited_reveal(&self.0, &mut *f, $default)?;
                    f.write_str("\"")
                } else {
                    f.write_str(concat!("***", $hidden, "***"))
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    limited_reveal(&self.0, &mut *f, usize::MAX)
                } else {
                    f.write_str(concat!("***", $hidden, "***"))
                }
            }
        }
    };
}

fn limited_reveal(unprotected: &str, f: &mut fmt::Formatter, default_len: usize) -> fmt::Result {
    let max_len = f.width().unwrap_or(default_len);
    if max_len <= 1 {
        f.write_str("…")
    } else if max_len > unprotected.len() {
        f.write_str(unprotected)
    } else {
        match unprotected.char_indices().nth(max_len - 2) {
            Some((idx, c)) if idx + c.len_utf8() < unprotected.len() => {
                f.write_str(&unprotected[0..idx + c.len_utf8()])?;
                f.write_str("…")
            }
            _ => f.write_str(unprotected),
        }
    }
}

/// The client ID presented by a caller when requesting a token
#[braid(serde, ref_doc = "A borrowed reference to a [`ClientId`]")]
pub struct ClientId;

/// The secret presented alongside a [`ClientId`]
///
/// Formatting this value hides its contents unless the alternate form
/// (`{:#}` or `{:#?}`) is requested explicitly.
#[braid(
    serde,
    debug = "owned",
    display = "owned",
    ref_doc = "A borrowed reference to a [`ClientSecret`]"
)]
pub struct ClientSecret;

limited_reveal!(ClientSecretRef: "CLIENT SECRET", 5);

/// The identity an authenticator resolved a client to
///
/// This is what ends up in the `id` claim of an issued token and what
/// downstream handlers see. It is not necessarily the same string as the
/// [`ClientId`] the caller authenticated with.
#[braid(serde, ref_doc = "A borrowed reference to an [`Identity`]")]
pub struct Identity;

/// A single OAuth2 scope, naming one permission
#[braid(serde, ref_doc = "A borrowed reference to a [`Scope`]")]
pub struct Scope;

/// A signed access token
///
/// Formatting this value hides its contents unless the alternate form
/// (`{:#}` or `{:#?}`) is requested explicitly.
#[braid(
    serde,
    debug = "owned",
    display = "owned",
    ref_doc = "A borrowed reference to an [`AccessToken`]"
)]
pub struct AccessToken;

limited_reveal!(AccessTokenRef: "ACCESS TOKEN", 15);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_secret_is_hidden_by_default() {
        let secret = ClientSecret::from_static("hunter2");
        assert_eq!(format!("{:?}", secret), "***CLIENT SECRET***");
        assert_eq!(format!("{}", secret), "***CLIENT SECRET***");
    }

    #[test]
    fn client_secret_reveals_prefix_in_alternate_debug() {
        let secret = ClientSecret::from_static("hunter2");
        assert_eq!(format!("{:#?}", secret), "\"hunt…\"");
    }

    #[test]
    fn access_token_reveals_everything_in_alternate_display() {
        let token = AccessToken::from_static("abc.def.ghi");
        assert_eq!(format!("{:#}", token), "abc.def.ghi");
        assert_eq!(format!("{}", token), "***ACCESS TOKEN***");
    }

    #[test]
    fn width_controls_revealed_length() {
        let token = AccessTokenRef::from_str("abcdefghij");
        assert_eq!(format!("{:#4?}", token), "\"abc…\"");
        assert_eq!(format!("{:#1?}", token), "\"…\"");
    }
}
