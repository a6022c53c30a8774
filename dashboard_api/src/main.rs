use dashboard_api::state::{AppState, Db, Identity};
use dashboard_api::{app, session_layer};
use shared::error::{ConfigError, InitializationError};
use shared::identity::IdentityClient;
use shared::live::ChangeFeed;
use shared::{init_tracing, initialize_db, load_config, shutdown_listener};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinError;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tower_sessions::ExpiredDeletion;
use tower_sessions_sqlx_store::PostgresStore;
use tracing::{info, warn};

const SESSION_PRUNE_INTERVAL: Duration = Duration::from_secs(60 * 10);

#[derive(Debug, Error)]
enum MainError {
    #[error(transparent)]
    Initialization(#[from] InitializationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Join(#[from] JoinError),
}

#[tokio::main]
async fn main() -> Result<(), MainError> {
    // Set up config and logging
    let config = load_config().map_err(InitializationError::from)?;
    init_tracing(&config.logging)?;

    // Initialize DB and the session table
    let db_pool = initialize_db(&config.postgres, true).await?;
    let session_store = PostgresStore::new(db_pool.clone());
    session_store.migrate().await?;
    let sessions = session_layer(session_store.clone(), &config.sessions)?;

    let identity = Identity {
        client: config
            .identity
            .as_ref()
            .map(|identity| IdentityClient::new_with_client(reqwest::Client::new(), identity)),
    };
    if identity.client.is_none() {
        warn!("no [identity] section configured, sign-in is disabled");
    }

    // Cancellation token shared across tasks; listener cancels on SIGINT/SIGTERM.
    let shutdown_token = CancellationToken::new();
    let feed = ChangeFeed::detached();

    let state = AppState {
        db: Db {
            pool: db_pool.clone(),
        },
        feed: feed.clone(),
        identity,
        shutdown: shutdown_token.clone(),
    };

    // Spawn listener, axum, change feed and session pruning tasks
    let mut signal_handle = tokio::spawn(shutdown_listener(Some(shutdown_token.clone())));
    let mut axum_handle = tokio::spawn(run_server(
        config.server.listen_addr.clone(),
        app(state, sessions),
        shutdown_token.clone(),
    ));
    let mut feed_handle = tokio::spawn(feed.run(db_pool.clone(), shutdown_token.clone()));
    let prune_handle = tokio::spawn(prune_sessions(session_store, shutdown_token.clone()));

    let mut first_err: Option<MainError> = None;
    let mut axum_done = false;
    let mut feed_done = false;

    tokio::select! {
        res = &mut axum_handle => {
            info!("axum task completed first, propagating cancellation token to other tasks");
            axum_done = true;
            shutdown_token.cancel();
            match res {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(error = ?e, "axum task completed due to error");
                    first_err.get_or_insert(e.into());
                }
                Err(join) => {
                    warn!(error = ?join, "axum task completed due to error");
                    first_err.get_or_insert(join.into());
                }
            }
        }
        res = &mut feed_handle => {
            info!("change feed task completed first, propagating cancellation token to other tasks");
            feed_done = true;
            shutdown_token.cancel();
            match res {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(error = ?e, "change feed task completed due to error");
                    first_err.get_or_insert(e.into());
                }
                Err(join) => {
                    warn!(error = ?join, "change feed task completed due to error");
                    first_err.get_or_insert(join.into());
                }
            }
        }
        res = &mut signal_handle => {
            info!("SIGINT/SIGTERM listener task completed first, propagating cancellation token to other tasks");
            shutdown_token.cancel();
            if let Err(join) = res {
                warn!(error = ?join, "error with SIGINT/SIGTERM listener task");
                first_err.get_or_insert(join.into());
            }
        }
    }

    if !axum_done {
        info!("awaiting completion of axum task");
        match axum_handle.await {
            Ok(Ok(())) => info!("axum task completed successfully"),
            Ok(Err(e)) => {
                info!(error = ?e, "axum task completed with error");
                first_err.get_or_insert(e.into());
            }
            Err(join) => {
                info!(error = ?join, "axum task completed with error");
                first_err.get_or_insert(join.into());
            }
        }
    }
    if !feed_done {
        info!("awaiting completion of change feed task");
        match feed_handle.await {
            Ok(Ok(())) => info!("change feed task completed successfully"),
            Ok(Err(e)) => {
                info!(error = ?e, "change feed task completed with error");
                first_err.get_or_insert(e.into());
            }
            Err(join) => {
                info!(error = ?join, "change feed task completed with error");
                first_err.get_or_insert(join.into());
            }
        }
    }
    if let Err(join) = prune_handle.await {
        info!(error = ?join, "session pruning task completed with error");
    }

    if let Some(err) = first_err {
        Err(err)
    } else {
        Ok(())
    }
}

async fn run_server(
    listen_addr: String,
    app: axum::Router,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    info!(name: "server.starting", listen_addr = %listen_addr, "starting server");
    let listener = TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    Ok(())
}

/// Deletes expired session rows until shutdown.
async fn prune_sessions(store: PostgresStore, shutdown: CancellationToken) {
    let mut ticker = interval(SESSION_PRUNE_INTERVAL);
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = store.delete_expired().await {
                    warn!(error = ?e, "failed to delete expired sessions");
                }
            }
        }
    }
}
