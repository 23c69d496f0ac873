use axum::{
    Router,
    extract::{Request, State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use carelink_gateway::connection;

use crate::messages;
use crate::middleware::require_auth;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route(
            "/conversations/{partner_id}/messages",
            get(messages::get_transcript).post(messages::send_message),
        )
        .route("/conversations/{partner_id}/read", post(messages::mark_read))
        .route("/inbox", get(messages::get_inbox))
        .route("/unread", get(messages::get_unread_count))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state);

    Router::new().merge(protected_routes).merge(ws_route)
}

/// Router with CORS and request tracing. Spans record only the path so
/// query strings never reach the logs.
pub fn app(state: AppState) -> Router {
    router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request| {
            tracing::debug_span!("request", method = %req.method(), path = %req.uri().path())
        }))
}

/// The token is checked in-band by the gateway's Identify handshake.
async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    let jwt_secret = state.jwt_secret.clone();
    let heartbeat_interval = state.heartbeat_interval;
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, dispatcher, jwt_secret, heartbeat_interval)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    use axum::http::StatusCode;
    use tracing_subscriber::fmt::MakeWriter;

    use anyhow::anyhow;
    use axum::body::Body;
    use axum::http::{Request, Response};
    use jsonwebtoken::{EncodingKey, Header, encode};
    use tower::ServiceExt;

    use carelink_gateway::dispatcher::Dispatcher;
    use carelink_index::{MemoryStore, MessageStore, NewMessage};
    use carelink_types::api::Claims;
    use carelink_types::events::GatewayEvent;
    use carelink_types::models::{Message, Role};

    use crate::state::AppStateInner;

    const SECRET: &str = "test-secret";

    struct DownStore;

    impl MessageStore for DownStore {
        fn append(&self, _new: NewMessage) -> anyhow::Result<Message> {
            Err(anyhow!("disk I/O error"))
        }

        fn mark_read(&self, _sender_id: &str, _receiver_id: &str) -> anyhow::Result<usize> {
            Err(anyhow!("disk I/O error"))
        }

        fn between(&self, _a: &str, _b: &str) -> anyhow::Result<Vec<Message>> {
            Err(anyhow!("disk I/O error"))
        }

        fn involving(&self, _user_id: &str) -> anyhow::Result<Vec<Message>> {
            Err(anyhow!("disk I/O error"))
        }

        fn count_unread(&self, _receiver_id: &str) -> anyhow::Result<usize> {
            Err(anyhow!("disk I/O error"))
        }
    }

    fn test_state() -> AppState {
        AppStateInner::new(Arc::new(MemoryStore::new()), Dispatcher::new(), SECRET.into())
    }

    fn token(user_id: &str, role: Role) -> String {
        let claims = Claims {
            sub: user_id.into(),
            role,
            exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn make_request(method: &str, uri: &str, token: Option<&str>, body: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {t}"));
        }
        match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn response_json(response: Response<Body>) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 65536)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn send(state: &AppState, from: &str, to: &str, content: &str) -> StatusCode {
        let req = make_request(
            "POST",
            &format!("/conversations/{to}/messages"),
            Some(&token(from, Role::Patient)),
            Some(&serde_json::json!({ "content": content }).to_string()),
        );
        router(state.clone()).oneshot(req).await.unwrap().status()
    }

    /// Collects formatted log output in memory.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[tokio::test]
    async fn request_spans_omit_query_string() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(logs.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let bob = token("bob", Role::Doctor);
        for uri in ["/inbox?token=SECRETJWT", "/gateway?token=SECRETJWT"] {
            app(test_state())
                .oneshot(make_request("GET", uri, Some(&bob), None))
                .await
                .unwrap();
        }

        let output = logs.contents();
        assert!(output.contains("path=/inbox"), "no request span in: {output}");
        assert!(output.contains("path=/gateway"), "no request span in: {output}");
        assert!(!output.contains("SECRETJWT"), "query string leaked: {output}");
        assert!(!output.contains(&bob), "bearer token leaked: {output}");
    }

    #[tokio::test]
    async fn inbox_requires_auth() {
        let app = router(test_state());
        let response = app
            .oneshot(make_request("GET", "/inbox", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_token_returns_401() {
        let app = router(test_state());
        let response = app
            .oneshot(make_request("GET", "/unread", Some("not-a-jwt"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn send_read_flow() {
        let state = test_state();
        assert_eq!(send(&state, "alice", "bob", "Hi").await, StatusCode::CREATED);
        assert_eq!(send(&state, "bob", "alice", "Hello").await, StatusCode::CREATED);

        let bob = token("bob", Role::Doctor);

        let response = router(state.clone())
            .oneshot(make_request("GET", "/inbox", Some(&bob), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let inbox = response_json(response).await;
        assert_eq!(inbox.as_array().unwrap().len(), 1);
        assert_eq!(inbox[0]["partner_id"], "alice");
        assert_eq!(inbox[0]["unread_count"], 1);
        assert_eq!(inbox[0]["last_message_content"], "Hello");

        let response = router(state.clone())
            .oneshot(make_request("POST", "/conversations/alice/read", Some(&bob), None))
            .await
            .unwrap();
        assert_eq!(response_json(response).await["updated"], 1);

        let response = router(state.clone())
            .oneshot(make_request("GET", "/unread", Some(&bob), None))
            .await
            .unwrap();
        assert_eq!(response_json(response).await["unread_count"], 0);

        let alice = token("alice", Role::Patient);
        let response = router(state)
            .oneshot(make_request("GET", "/unread", Some(&alice), None))
            .await
            .unwrap();
        assert_eq!(response_json(response).await["unread_count"], 1);
    }

    #[tokio::test]
    async fn transcript_matches_from_both_sides() {
        let state = test_state();
        send(&state, "alice", "bob", "one").await;
        send(&state, "bob", "alice", "two").await;

        let mut bodies = Vec::new();
        for (me, partner) in [("alice", "bob"), ("bob", "alice")] {
            let response = router(state.clone())
                .oneshot(make_request(
                    "GET",
                    &format!("/conversations/{partner}/messages"),
                    Some(&token(me, Role::Patient)),
                    None,
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            bodies.push(response_json(response).await);
        }

        assert_eq!(bodies[0], bodies[1]);
        assert_eq!(bodies[0][0]["content"], "one");
        assert_eq!(bodies[0][1]["content"], "two");
    }

    #[tokio::test]
    async fn invalid_sends_return_400() {
        let state = test_state();
        assert_eq!(send(&state, "alice", "alice", "self").await, StatusCode::BAD_REQUEST);
        assert_eq!(send(&state, "alice", "bob", "  ").await, StatusCode::BAD_REQUEST);
        assert!(state.index.store().involving("alice").unwrap().is_empty());
    }

    #[tokio::test]
    async fn storage_failure_returns_500() {
        let state = AppStateInner::new(Arc::new(DownStore), Dispatcher::new(), SECRET.into());
        assert_eq!(
            send(&state, "alice", "bob", "Hi").await,
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let response = router(state)
            .oneshot(make_request("GET", "/inbox", Some(&token("bob", Role::Doctor)), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn send_and_read_push_gateway_events() {
        let state = test_state();
        let (_bob_conn, mut bob_rx) = state.dispatcher.register_user_channel("bob").await;
        let (_alice_conn, mut alice_rx) = state.dispatcher.register_user_channel("alice").await;

        let req = make_request(
            "POST",
            "/conversations/bob/messages",
            Some(&token("alice", Role::Doctor)),
            Some(r#"{"content":"Your results are in"}"#),
        );
        let response = router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        match bob_rx.recv().await {
            Some(GatewayEvent::MessageCreate { message, sender_role }) => {
                assert_eq!(message.sender_id, "alice");
                assert_eq!(message.content, "Your results are in");
                assert_eq!(sender_role, Role::Doctor);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let response = router(state.clone())
            .oneshot(make_request(
                "POST",
                "/conversations/alice/read",
                Some(&token("bob", Role::Patient)),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        match alice_rx.recv().await {
            Some(GatewayEvent::MessagesRead { reader_id, count }) => {
                assert_eq!(reader_id, "bob");
                assert_eq!(count, 1);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        // Nothing left to mark, so no second receipt
        router(state)
            .oneshot(make_request(
                "POST",
                "/conversations/alice/read",
                Some(&token("bob", Role::Patient)),
                None,
            ))
            .await
            .unwrap();
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn offline_receiver_does_not_fail_send() {
        let state = test_state();
        assert!(!state.dispatcher.is_online("bob").await);
        assert_eq!(send(&state, "alice", "bob", "Hi").await, StatusCode::CREATED);
        assert_eq!(state.index.unread_count("bob").unwrap(), 1);
    }
}
