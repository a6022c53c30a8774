use crate::state::Db;
use crate::v1::api_models::{LinemenSnapshotItem, LiveSnapshot, RequestView};
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use shared::live::{
    ActiveLinemenQuery, ChangeFeed, LiveQuery, RequestsQuery, Subscription, subscribe,
};
use shared::map::MapMarker;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Streams every request, newest first, on connect and after every change.
pub async fn requests_live(
    ws: WebSocketUpgrade,
    State(db): State<Db>,
    State(feed): State<ChangeFeed>,
    State(shutdown): State<CancellationToken>,
) -> impl IntoResponse {
    let query = RequestsQuery::new(db.pool);
    ws.on_upgrade(move |socket| stream_snapshots(socket, query, feed, shutdown, RequestView::from))
}

/// Streams active linemen with their map markers on connect and after every change.
pub async fn linemen_live(
    ws: WebSocketUpgrade,
    State(db): State<Db>,
    State(feed): State<ChangeFeed>,
    State(shutdown): State<CancellationToken>,
) -> impl IntoResponse {
    let query = ActiveLinemenQuery::new(db.pool);
    ws.on_upgrade(move |socket| {
        stream_snapshots(socket, query, feed, shutdown, |lineman| LinemenSnapshotItem {
            marker: MapMarker::for_lineman(&lineman),
            lineman,
        })
    })
}

/// Serialized snapshots of `query`, keeping only the newest one.
///
/// A slow reader skips the frames it missed instead of queueing them. The sender is dropped
/// when the subscription ends, so the receiver sees the channel close.
fn snapshot_frames<Q, T, F>(
    query: Q,
    feed: &ChangeFeed,
    to_item: F,
) -> (Subscription, watch::Receiver<String>)
where
    Q: LiveQuery,
    T: Serialize,
    F: Fn(Q::Item) -> T + Send + 'static,
{
    let (tx, rx) = watch::channel(String::new());
    let subscription = subscribe(query, feed, move |items| {
        let snapshot = LiveSnapshot {
            sent_at: Utc::now(),
            items: items.into_iter().map(&to_item).collect(),
        };
        match serde_json::to_string(&snapshot) {
            Ok(frame) => {
                tx.send_replace(frame);
            }
            Err(e) => warn!(error = ?e, "failed to serialize live snapshot"),
        }
    });
    (subscription, rx)
}

/// Forwards each snapshot of `query` to the socket as a JSON text frame.
///
/// The socket is closed when the client hangs up, the server shuts down, or the live query
/// fails. Closing the socket cancels the subscription.
async fn stream_snapshots<Q, T, F>(
    socket: WebSocket,
    query: Q,
    feed: ChangeFeed,
    shutdown: CancellationToken,
    to_item: F,
) where
    Q: LiveQuery,
    T: Serialize,
    F: Fn(Q::Item) -> T + Send + 'static,
{
    let collection = Q::COLLECTION;
    info!(name: "live.connected", collection = ?collection, "Live socket connected");

    let (subscription, mut rx) = snapshot_frames(query, &feed, to_item);
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                sink.send(Message::Close(None)).await.ok();
                break;
            }
            changed = rx.changed() => match changed {
                Ok(()) => {
                    let frame = rx.borrow_and_update().clone();
                    if sink.send(Message::Text(frame.into())).await.is_err() {
                        debug!(collection = ?collection, "live socket sink closed");
                        break;
                    }
                }
                // The subscription ended after a failed query.
                Err(_) => {
                    sink.send(Message::Close(None)).await.ok();
                    break;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(collection = ?collection, error = %e, "live socket receive error");
                    break;
                }
            },
        }
    }

    subscription.cancel();
    info!(name: "live.disconnected", collection = ?collection, "Live socket disconnected");
}
