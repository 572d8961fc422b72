//! A small resource server with a client-credentials token endpoint
//!
//! ```sh
//! POSTERN_SECRET=change-me cargo run -p postern_tower --example token_server
//!
//! curl -u admin:admin -d grant_type=client_credentials -d scope='read repository_create' \
//!     http://127.0.0.1:8080/token
//! curl -H "Authorization: Bearer $TOKEN" http://127.0.0.1:8080/repositories
//! ```

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use aliri::jwa;
use aliri_base64::Base64Url;
use axum::{
    body::Body,
    routing::{get, post},
    Extension, Router,
};
use clap::Parser;
use postern::{scopes, ClientTable, Grant, JwtTokenGenerator, SigningConfig, TokenGenerator};
use postern_tower::Authorizer;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Opts {
    /// Address to listen on
    #[arg(long, env = "POSTERN_LISTEN", default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    /// Shared secret used to sign and verify tokens with HS256
    #[arg(long, env = "POSTERN_SECRET", hide_env_values = true)]
    secret: String,

    /// Lifetime of issued tokens, in seconds
    #[arg(long, env = "POSTERN_TOKEN_LIFETIME", default_value_t = 3600)]
    lifetime: u64,

    /// JSON file listing registered clients; the reference clients are used if omitted
    #[arg(long, env = "POSTERN_CLIENTS")]
    clients: Option<PathBuf>,
}

async fn list_repositories(Extension(grant): Extension<Grant>) -> String {
    format!("repositories visible to {}", grant.identity())
}

async fn create_repository(Extension(grant): Extension<Grant>) -> String {
    format!("repository created by {}", grant.identity())
}

async fn create_simulator(Extension(grant): Extension<Grant>) -> String {
    format!("simulator created by {}", grant.identity())
}

async fn whoami(Extension(grant): Extension<Grant>) -> String {
    format!("{} [{}]", grant.identity(), grant.scopes())
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,postern=debug,postern_tower=debug")),
        )
        .init();

    let opts = Opts::parse();

    let clients = match &opts.clients {
        Some(path) => ClientTable::load(path).await?,
        None => {
            tracing::warn!("no clients file given; serving the reference clients");
            ClientTable::reference()
        }
    };

    let config = SigningConfig::hmac(
        Base64Url::from_raw(opts.secret.into_bytes()),
        jwa::Algorithm::HS256,
    )
    .with_lifetime(Duration::from_secs(opts.lifetime));

    let generator: Arc<dyn TokenGenerator> = Arc::new(JwtTokenGenerator::new(config));
    let authorizer = Authorizer::new(generator).with_terse_error_handler::<Body>();

    let app = Router::new()
        .route(
            "/repositories",
            get(list_repositories)
                .layer(authorizer.require_scopes_layer(scopes!["read"]))
                .merge(
                    post(create_repository)
                        .layer(authorizer.require_scopes_layer(scopes!["repository_create"])),
                ),
        )
        .route(
            "/simulators",
            post(create_simulator)
                .layer(authorizer.require_scopes_layer(scopes!["simulator_create"])),
        )
        .route("/me", get(whoami).layer(authorizer.require_layer()))
        .layer(authorizer.extract_layer())
        .route_service("/token", authorizer.token_endpoint(clients));

    let listener = tokio::net::TcpListener::bind(opts.listen).await?;
    tracing::info!(address = %opts.listen, "listening; press Ctrl+C to exit");

    axum::serve(listener, app).await?;

    Ok(())
}
