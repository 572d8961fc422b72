//! Client-credentials token issuance and verification
//!
//! A client exchanges its ID and secret for a signed, time-limited bearer
//! token carrying an identity and a list of scopes. Later requests present
//! that token, and the grant it carries is recovered without consulting the
//! credential store again.
//!
//! The moving parts are small and independently replaceable:
//!
//! * An [`Authenticator`] confirms a client's credentials and that it may
//!   hold each requested scope, producing a [`Grant`]. [`ClientTable`] is an
//!   in-memory implementation that can be built in code or loaded from JSON.
//! * A [`TokenGenerator`] turns a grant into an [`IssuedToken`] and back
//!   again. [`JwtTokenGenerator`] signs JSON Web Tokens with a single key and
//!   algorithm fixed by a [`SigningConfig`].
//!
//! ```
//! use aliri::jwa;
//! use aliri_base64::Base64Url;
//! use postern::{
//!     scopes, Authenticator, ClientIdRef, ClientSecretRef, ClientTable, JwtTokenGenerator,
//!     SigningConfig, TokenGenerator,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")] async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let clients = ClientTable::reference();
//! let generator = JwtTokenGenerator::new(SigningConfig::hmac(
//!     Base64Url::from_raw(&b"a shared secret"[..]),
//!     jwa::Algorithm::HS256,
//! ));
//!
//! let grant = clients
//!     .authenticate(
//!         ClientIdRef::from_str("admin"),
//!         ClientSecretRef::from_str("admin"),
//!         scopes!["read", "write"],
//!     )
//!     .await?;
//!
//! let token = generator.create(&grant)?;
//! let recovered = generator.validate(token.access_token())?;
//!
//! assert_eq!(recovered.identity().as_str(), "1");
//! assert!(recovered.has_scope(postern::ScopeRef::from_str("write")));
//! # Ok(()) }
//! ```
//!
//! HTTP integration lives in the `postern_tower` crate.
//!
//! # Features
//!
//! * `file` (default): Allows loading a [`ClientTable`] from a JSON file.

#![cfg_attr(docsrs, feature(doc_cfg))]
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

mod authenticator;
mod braids;
mod client_table;
pub mod error;
mod grant;
pub mod jwt;
pub mod scope;
mod token;

pub use authenticator::{AuthenticationError, Authenticator};
pub use braids::*;
pub use client_table::{ClientTable, ClientTableError, RegisteredClient, ScopeRule};
pub use error::{TokenCreationError, TokenRejected};
pub use grant::Grant;
pub use jwt::{JwtTokenGenerator, SigningConfig};
pub use scope::Scopes;
pub use token::{IssuedToken, TokenGenerator, TokenType};
