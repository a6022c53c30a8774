use axum::extract::FromRef;
use shared::identity::IdentityClient;
use shared::live::ChangeFeed;
use sqlx::{Pool, Postgres};
use tokio_util::sync::CancellationToken;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db: Db,
    pub feed: ChangeFeed,
    pub identity: Identity,
    /// Process-wide shutdown; live sockets close when it fires.
    pub shutdown: CancellationToken,
}

#[derive(Clone)]
pub struct Db {
    pub pool: Pool<Postgres>,
}

/// `client` is `None` when no identity provider is configured; sign-in then answers 503.
#[derive(Clone)]
pub struct Identity {
    pub client: Option<IdentityClient>,
}
