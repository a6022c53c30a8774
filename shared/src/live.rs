//! Live queries over Postgres `LISTEN/NOTIFY`.
//!
//! Triggers on the watched tables notify `requests_changed` and `linemen_changed` with the
//! changed row id. One [`ChangeFeed`] task holds the listener connection and fans every
//! notification out over a broadcast channel. Each [`Subscription`] re-runs its query on a
//! relevant change and hands the full result set to its callback.

use crate::models::{ClearanceRequest, Lineman};
use crate::store::{QueryError, linemen, requests};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sqlx::postgres::PgListener;
use sqlx::{Pool, Postgres};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

const FEED_CAPACITY: usize = 64;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Collection {
    Requests,
    Linemen,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Requests, Collection::Linemen];

    pub const fn channel(self) -> &'static str {
        match self {
            Collection::Requests => "requests_changed",
            Collection::Linemen => "linemen_changed",
        }
    }

    pub fn from_channel(channel: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.channel() == channel)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Change {
    pub collection: Collection,
    pub id: String,
}

/// Broadcast hub for row changes. Cloning shares the same channel.
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<Change>,
    last_change: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::detached()
    }
}

impl ChangeFeed {
    /// A feed with no database listener attached. Changes arrive only through [`Self::publish`].
    pub fn detached() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            sender,
            last_change: Arc::new(RwLock::new(None)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.sender.subscribe()
    }

    pub fn publish(&self, change: Change) {
        *self.last_change.write() = Some(Utc::now());
        // No receivers just means nobody is watching right now.
        self.sender.send(change).ok();
    }

    /// When the last change notification was seen, if any.
    pub fn last_change(&self) -> Option<DateTime<Utc>> {
        *self.last_change.read()
    }

    /// Listens on every watched channel and publishes notifications until `shutdown` fires.
    pub async fn run(
        self,
        pool: Pool<Postgres>,
        shutdown: CancellationToken,
    ) -> Result<(), sqlx::Error> {
        let mut listener = PgListener::connect_with(&pool).await?;
        listener
            .listen_all(Collection::ALL.map(Collection::channel))
            .await?;
        info!(name: "live.listening", "Listening for row changes via Postgres NOTIFY");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("shutdown requested, stopping change feed");
                    break;
                }
                recv = listener.recv() => {
                    match recv {
                        Ok(notification) => {
                            trace!(
                                channel = notification.channel(),
                                payload = notification.payload(),
                                "received change notification"
                            );
                            if let Some(collection) = Collection::from_channel(notification.channel()) {
                                self.publish(Change {
                                    collection,
                                    id: notification.payload().to_string(),
                                });
                            }
                        }
                        Err(e) => {
                            warn!(error = ?e, "error receiving Postgres notification");
                            sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// A query whose result set can be re-fetched whenever its collection changes.
pub trait LiveQuery: Send + Sync + 'static {
    type Item: Send + 'static;
    const COLLECTION: Collection;

    fn fetch(&self) -> impl Future<Output = Result<Vec<Self::Item>, QueryError>> + Send;
}

/// Every request, newest first.
#[derive(Clone)]
pub struct RequestsQuery {
    pool: Pool<Postgres>,
}

impl RequestsQuery {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

impl LiveQuery for RequestsQuery {
    type Item = ClearanceRequest;
    const COLLECTION: Collection = Collection::Requests;

    async fn fetch(&self) -> Result<Vec<ClearanceRequest>, QueryError> {
        requests::fetch_requests(&self.pool).await
    }
}

/// Linemen whose status is `active`.
#[derive(Clone)]
pub struct ActiveLinemenQuery {
    pool: Pool<Postgres>,
}

impl ActiveLinemenQuery {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

impl LiveQuery for ActiveLinemenQuery {
    type Item = Lineman;
    const COLLECTION: Collection = Collection::Linemen;

    async fn fetch(&self) -> Result<Vec<Lineman>, QueryError> {
        linemen::fetch_active_linemen(&self.pool).await
    }
}

/// Handle to a running live query. Dropping it cancels the query.
pub struct Subscription {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Stops further callbacks. Safe to call more than once.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Resolves once the subscription task has exited, either cancelled or after a failed
    /// re-query.
    pub async fn finished(&mut self) {
        (&mut self.handle).await.ok();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Runs `query` now and again on every change to its collection, passing each full result
/// set to `callback`.
///
/// A failed fetch is logged and ends the subscription. There is no retry.
pub fn subscribe<Q, F>(query: Q, feed: &ChangeFeed, mut callback: F) -> Subscription
where
    Q: LiveQuery,
    F: FnMut(Vec<Q::Item>) + Send + 'static,
{
    let token = CancellationToken::new();
    // Subscribe before the first fetch so no change between the two is missed.
    let mut changes = feed.subscribe();
    let task_token = token.clone();

    let handle = tokio::spawn(async move {
        if !deliver(&query, &task_token, &mut callback).await {
            return;
        }

        loop {
            tokio::select! {
                biased;
                () = task_token.cancelled() => break,
                recv = changes.recv() => match recv {
                    Ok(change) if change.collection == Q::COLLECTION => {}
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, collection = ?Q::COLLECTION, "live query lagged, re-querying");
                    }
                    Err(RecvError::Closed) => break,
                },
            }

            if !deliver(&query, &task_token, &mut callback).await {
                break;
            }
        }
    });

    Subscription { token, handle }
}

async fn deliver<Q, F>(query: &Q, token: &CancellationToken, callback: &mut F) -> bool
where
    Q: LiveQuery,
    F: FnMut(Vec<Q::Item>),
{
    let result = tokio::select! {
        biased;
        () = token.cancelled() => return false,
        result = query.fetch() => result,
    };

    match result {
        Ok(items) if !token.is_cancelled() => {
            callback(items);
            true
        }
        Ok(_) => false,
        Err(e) => {
            warn!(
                name: "live.query_failed",
                collection = ?Q::COLLECTION,
                error = %e,
                "Live query failed, ending subscription"
            );
            false
        }
    }
}
