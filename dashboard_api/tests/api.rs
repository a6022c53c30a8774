//! Router-level tests. Sign-in goes to a small fake identity server bound on a random local
//! port. Tests without a database use a lazily connected pool that is never touched; the
//! `#[ignore]`d ones need `DATABASE_URL` and run with `--ignored`.

use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, TimeDelta, Utc};
use dashboard_api::state::{AppState, Db, Identity};
use dashboard_api::{app, session_layer};
use futures::StreamExt;
use serde_json::{Value, json};
use shared::identity::IdentityClient;
use shared::live::{Change, ChangeFeed, Collection};
use shared::{IdentityConfig, SessionsConfig};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

const SUPERVISOR: &str = "s@x.com";

fn app_with(
    pool: PgPool,
    feed: ChangeFeed,
    identity: Option<IdentityClient>,
    shutdown: CancellationToken,
) -> Router {
    let state = AppState {
        db: Db { pool },
        feed,
        identity: Identity { client: identity },
        shutdown,
    };
    let sessions = session_layer(
        MemoryStore::default(),
        &SessionsConfig {
            inactivity: "1h".into(),
            secure_cookies: false,
        },
    )
    .unwrap();
    app(state, sessions)
}

fn build_app(identity: Option<IdentityClient>) -> Router {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/line_clearance_unused")
        .unwrap();
    app_with(
        pool,
        ChangeFeed::detached(),
        identity,
        CancellationToken::new(),
    )
}

async fn build_db_app(pool: PgPool) -> Router {
    app_with(
        pool,
        ChangeFeed::detached(),
        Some(fake_identity_server().await),
        CancellationToken::new(),
    )
}

async fn fake_identity_server() -> IdentityClient {
    async fn sign_in(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        if body["password"] == "wrong" {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": { "code": 400, "message": "INVALID_PASSWORD" } })),
            );
        }
        (
            StatusCode::OK,
            Json(json!({
                "localId": "uid-1",
                "email": body["email"],
                "idToken": "token",
            })),
        )
    }

    async fn sign_up(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        if body["email"] == "taken@x.com" {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": { "code": 400, "message": "EMAIL_EXISTS" } })),
            );
        }
        (
            StatusCode::OK,
            Json(json!({
                "localId": "uid-new",
                "email": body["email"],
                "idToken": "token",
            })),
        )
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = Router::new()
        .route("/v1/accounts:signInWithPassword", post(sign_in))
        .route("/v1/accounts:signUp", post(sign_up));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    IdentityClient::new_with_client(
        reqwest::Client::new(),
        &IdentityConfig {
            api_key: "test-key".into(),
            base_url: Some(format!("http://{addr}")),
        },
    )
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn session_cookie(response: &Response) -> String {
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("sign-in should set a session cookie")
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

async fn sign_in(app: &Router) -> String {
    let response = send(
        app,
        post_json(
            "/v1/auth/login",
            json!({ "email": SUPERVISOR, "password": "secret" }),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    session_cookie(&response)
}

async fn act(app: &Router, cookie: &str, id: &str, body: Value) -> Response {
    send(
        app,
        post_json(&format!("/v1/requests/{id}/actions"), body, Some(cookie)),
    )
    .await
}

async fn insert_request(
    pool: &PgPool,
    id: &str,
    substation: &str,
    status: &str,
    lineman_id: Option<&str>,
    resolved_at: Option<DateTime<Utc>>,
) {
    sqlx::query(
        "INSERT INTO requests (id, substation, fault_type, status, lineman_id, updated_at, resolved_at)
         VALUES ($1, $2, 'Line Fault', $3::request_status, $4, $5, $5)",
    )
    .bind(id)
    .bind(substation)
    .bind(status)
    .bind(lineman_id)
    .bind(resolved_at)
    .execute(pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn health_reports_no_changes_yet() {
    let app = build_app(None);
    let response = send(&app, get("/health", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "No change notifications yet");
}

#[tokio::test]
async fn unknown_route_returns_json_404() {
    let app = build_app(None);
    let response = send(&app, get("/v2/nothing-here", None)).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["statusCode"], 404);
}

#[tokio::test]
async fn protected_routes_require_a_session() {
    let app = build_app(None);
    for uri in [
        "/v1/requests",
        "/v1/requests/abc",
        "/v1/requests/live",
        "/v1/linemen/active",
        "/v1/linemen/abc",
        "/v1/linemen/live",
        "/v1/audit",
        "/v1/audit/export",
    ] {
        let response = send(&app, get(uri, None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        let json = body_json(response).await;
        assert_eq!(json["statusCode"], 401);
    }

    for uri in ["/v1/requests/abc/actions", "/v1/linemen/sample"] {
        let response = send(&app, post_json(uri, json!({ "action": "approve" }), None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn me_without_session_is_unauthorized() {
    let app = build_app(None);
    let response = send(&app, get("/v1/auth/me", None)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["statusCode"], 401);
    assert_eq!(json["message"], "sign in required");
}

#[tokio::test]
async fn login_rejects_blank_credentials() {
    let app = build_app(None);
    for uri in ["/v1/auth/login", "/v1/auth/register"] {
        let response = send(
            &app,
            post_json(uri, json!({ "email": " ", "password": "" }), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn login_without_identity_provider_is_unavailable() {
    let app = build_app(None);
    for uri in ["/v1/auth/login", "/v1/auth/register"] {
        let response = send(
            &app,
            post_json(uri, json!({ "email": SUPERVISOR, "password": "secret" }), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE, "{uri}");
    }
}

#[tokio::test]
async fn rejected_credentials_are_unauthorized() {
    let app = build_app(Some(fake_identity_server().await));
    let response = send(
        &app,
        post_json(
            "/v1/auth/login",
            json!({ "email": SUPERVISOR, "password": "wrong" }),
            None,
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["message"], "invalid email or password");
}

#[tokio::test]
async fn session_lifecycle() {
    let app = build_app(Some(fake_identity_server().await));

    let response = send(
        &app,
        post_json(
            "/v1/auth/login",
            json!({ "email": SUPERVISOR, "password": "secret" }),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response);
    let json = body_json(response).await;
    assert_eq!(json["email"], SUPERVISOR);
    assert_eq!(json["uid"], "uid-1");

    let response = send(&app, get("/v1/auth/me", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["email"], SUPERVISOR);

    // Signed in, so the auth layer lets the request through to body validation.
    let response = act(&app, &cookie, "abc", json!({ "action": "archive" })).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = send(
        &app,
        post_json("/v1/auth/logout", json!({}), Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, get("/v1/auth/me", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_starts_a_session() {
    let app = build_app(Some(fake_identity_server().await));

    let response = send(
        &app,
        post_json(
            "/v1/auth/register",
            json!({ "email": "new@x.com", "password": "secret1" }),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = session_cookie(&response);
    assert_eq!(body_json(response).await["uid"], "uid-new");

    let response = send(&app, get("/v1/auth/me", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["email"], "new@x.com");
}

#[tokio::test]
async fn registration_with_a_taken_email_is_refused() {
    let app = build_app(Some(fake_identity_server().await));

    let response = send(
        &app,
        post_json(
            "/v1/auth/register",
            json!({ "email": "taken@x.com", "password": "secret1" }),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(body_json(response).await["message"], "EMAIL_EXISTS");
}

#[tokio::test]
async fn list_params_are_validated() {
    let app = build_app(Some(fake_identity_server().await));
    let cookie = sign_in(&app).await;

    for uri in [
        "/v1/requests?pageSize=0",
        "/v1/requests?pageSize=101",
        "/v1/requests?status=archived",
        "/v1/audit?window=decade",
        "/v1/audit/export?status=archived",
    ] {
        let response = send(&app, get(uri, Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[sqlx::test(migrations = "../shared/migrations")]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn request_actions_follow_the_status_rules(pool: PgPool) {
    insert_request(&pool, "1", "Gota", "pending", None, None).await;
    let app = build_db_app(pool).await;
    let cookie = sign_in(&app).await;

    let response = act(
        &app,
        &cookie,
        "1",
        json!({ "action": "approve", "notes": "  clear to proceed " }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let applied = body_json(response).await;
    assert_eq!(applied["status"], "approved");
    assert_eq!(applied["reviewedBy"], SUPERVISOR);
    assert_eq!(applied["lastUpdatedBy"], SUPERVISOR);
    assert_eq!(applied["supervisorNotes"], "clear to proceed");
    assert!(applied["resolvedAt"].is_null());

    let response = act(&app, &cookie, "1", json!({ "action": "deny" })).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["statusCode"], 409);

    let response = act(&app, &cookie, "1", json!({ "action": "complete" })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let applied = body_json(response).await;
    assert_eq!(applied["status"], "completed");
    assert!(applied["resolvedAt"].is_string());
    // Notes from the approval survive an update without notes.
    assert_eq!(applied["supervisorNotes"], "clear to proceed");

    let response = send(&app, get("/v1/requests/1", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let request = body_json(response).await;
    assert_eq!(request["status"], "completed");
    assert_eq!(request["allowedActions"], json!([]));

    let response = send(&app, get("/v1/requests?status=completed", Some(&cookie))).await;
    let list = body_json(response).await;
    assert_eq!(list["totalItems"], 1);
    assert_eq!(list["summary"]["completed"], 1);
    assert_eq!(list["summary"]["completionRate"], 100);

    let response = act(&app, &cookie, "missing", json!({ "action": "approve" })).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../shared/migrations")]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn audit_log_filters_by_window_and_exports_csv(pool: PgPool) {
    let now = Utc::now();
    insert_request(&pool, "1", "Gota", "completed", Some("L-1"), Some(now)).await;
    insert_request(
        &pool,
        "2",
        "Naroda, East",
        "denied",
        None,
        Some(now - TimeDelta::days(60)),
    )
    .await;
    insert_request(&pool, "3", "Vasna", "pending", None, None).await;
    let app = build_db_app(pool).await;
    let cookie = sign_in(&app).await;

    let all = body_json(send(&app, get("/v1/audit", Some(&cookie))).await).await;
    assert_eq!(all["totalItems"], 2);
    assert_eq!(all["analytics"]["total"], 2);
    assert_eq!(all["analytics"]["completionRate"], 50.0);

    let month = body_json(send(&app, get("/v1/audit?window=month", Some(&cookie))).await).await;
    assert_eq!(month["totalItems"], 1);
    assert_eq!(month["items"][0]["id"], "1");

    let naroda = body_json(send(&app, get("/v1/audit?search=naroda", Some(&cookie))).await).await;
    assert_eq!(naroda["totalItems"], 1);
    assert_eq!(naroda["items"][0]["supervisorDisplay"], "N/A");

    let response = send(&app, get("/v1/audit/export", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/csv"));
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"audit_log_"));
    assert!(disposition.ends_with(".csv\""));

    let csv = body_text(response).await;
    let lines: Vec<&str> = csv.split("\r\n").filter(|l| !l.is_empty()).collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Substation,Fault Type,Date Completed,Status,Lineman ID");
    assert!(lines[1].starts_with("Gota,Line Fault,"));
    assert!(lines[1].ends_with(",completed,L-1"));
    assert!(lines[2].starts_with("\"Naroda, East\",Line Fault,"));
    assert!(lines[2].ends_with(",denied,N/A"));

    let response = send(&app, get("/v1/audit/export?window=today", Some(&cookie))).await;
    let csv = body_text(response).await;
    assert_eq!(csv.split("\r\n").filter(|l| !l.is_empty()).count(), 2);
}

#[sqlx::test(migrations = "../shared/migrations")]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn sample_linemen_show_on_the_map(pool: PgPool) {
    let app = build_db_app(pool).await;
    let cookie = sign_in(&app).await;

    let response = send(&app, post_json("/v1/linemen/sample", json!({}), Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        body_json(response).await,
        json!({ "inserted": 3, "skipped": false })
    );
    let response = send(&app, post_json("/v1/linemen/sample", json!({}), Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["skipped"], true);

    let active = body_json(send(&app, get("/v1/linemen/active", Some(&cookie))).await).await;
    assert_eq!(active["linemen"].as_array().unwrap().len(), 3);
    let markers = active["markers"].as_array().unwrap();
    assert_eq!(markers.len(), 3);

    let id = markers[0]["id"].as_str().unwrap();
    let response = send(&app, get(&format!("/v1/linemen/{id}"), Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let details = body_json(response).await;
    assert_eq!(details["id"], id);
    assert_eq!(details["initials"].as_str().unwrap().chars().count(), 2);
    let priority = details["priority"].as_str().unwrap();
    assert_eq!(priority, priority.to_uppercase());

    let response = send(&app, get("/v1/linemen/nope", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

async fn next_message<S>(socket: &mut S) -> Option<WsMessage>
where
    S: StreamExt<Item = Result<WsMessage, tungstenite::Error>> + Unpin,
{
    loop {
        match timeout(Duration::from_secs(5), socket.next()).await.unwrap() {
            Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => continue,
            Some(Ok(message)) => return Some(message),
            Some(Err(_)) | None => return None,
        }
    }
}

async fn next_snapshot<S>(socket: &mut S) -> Value
where
    S: StreamExt<Item = Result<WsMessage, tungstenite::Error>> + Unpin,
{
    match next_message(socket).await {
        Some(WsMessage::Text(text)) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected a snapshot frame, got {other:?}"),
    }
}

#[sqlx::test(migrations = "../shared/migrations")]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn live_requests_socket_streams_snapshots(pool: PgPool) {
    insert_request(&pool, "1", "Gota", "pending", None, None).await;

    let feed = ChangeFeed::detached();
    let shutdown = CancellationToken::new();
    let app = app_with(
        pool.clone(),
        feed.clone(),
        Some(fake_identity_server().await),
        shutdown.clone(),
    );
    let cookie = sign_in(&app).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = app.clone();
    tokio::spawn(async move {
        axum::serve(listener, server).await.ok();
    });

    let mut request = format!("ws://{addr}/v1/requests/live")
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert("cookie", HeaderValue::from_str(&cookie).unwrap());
    let (mut socket, _) = tokio_tungstenite::connect_async(request).await.unwrap();

    let snapshot = next_snapshot(&mut socket).await;
    assert!(snapshot["sentAt"].is_string());
    let items = snapshot["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], "1");
    assert_eq!(items[0]["allowedActions"], json!(["approve", "deny"]));

    insert_request(&pool, "2", "Naroda", "pending", None, None).await;
    feed.publish(Change {
        collection: Collection::Requests,
        id: "2".into(),
    });

    let snapshot = next_snapshot(&mut socket).await;
    let ids: Vec<&str> = snapshot["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["2", "1"]);

    // Server shutdown closes the socket.
    shutdown.cancel();
    assert!(matches!(
        next_message(&mut socket).await,
        Some(WsMessage::Close(_)) | None
    ));
}
