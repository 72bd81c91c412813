//! Token refresh on 401 through a client session

use consult_config::ConsultConfig;
use consult_http::{
    ApiError, ChannelNotifier, ClientSession, ClientSessionBuilder, HttpMethod, InMemoryTokenStore,
    MockReply, MockTransport, Notification, RequestOptions, Token,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

const PROFILE: &str = "/patient/profile";
const EARNINGS: &str = "/doctor/earnings";
const REFRESH: &str = "/auth/refresh";
const STATS: &str = "/public/stats";

/// Answers 200 only to the renewed token
fn protected() -> MockReply {
    MockReply::from_fn(|request| match request.header("Authorization") {
        Some("Bearer renewed") => MockReply::json(200, json!({"id": 7, "email": "pat@example.org"})),
        _ => MockReply::json(401, json!({"message": "Token expired"})),
    })
}

fn session(mock: Arc<MockTransport>) -> (ClientSession, UnboundedReceiver<Notification>) {
    let mut config = ConsultConfig::default();
    config.http.base_url = "http://api.test".to_string();

    let store = InMemoryTokenStore::with_token(Token::with_lifetime("stale", Duration::from_secs(600)));
    let (notifier, events) = ChannelNotifier::new();
    let session = ClientSessionBuilder::from_config(&config)
        .transport(mock)
        .token_store(Arc::new(store))
        .notifier(Arc::new(notifier))
        .build()
        .expect("session should build");
    (session, events)
}

fn drain(events: &mut UnboundedReceiver<Notification>) -> Vec<Notification> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_unauthorized_calls_share_one_refresh() {
    let mock = Arc::new(
        MockTransport::new()
            .on(HttpMethod::Get, PROFILE, protected())
            .on(HttpMethod::Get, EARNINGS, protected())
            .on(
                HttpMethod::Post,
                REFRESH,
                MockReply::json(200, json!({"token": "renewed"})).after(Duration::from_millis(100)),
            ),
    );
    let (session, mut events) = session(mock.clone());

    let (profile, earnings) = tokio::join!(
        session.get::<Value>(PROFILE, RequestOptions::new()),
        session.get::<Value>(EARNINGS, RequestOptions::new()),
    );

    assert_eq!(profile.unwrap()["id"], 7);
    assert_eq!(earnings.unwrap()["id"], 7);
    assert_eq!(mock.call_count(HttpMethod::Post, REFRESH), 1);
    assert_eq!(mock.call_count(HttpMethod::Get, PROFILE), 2);
    assert_eq!(mock.call_count(HttpMethod::Get, EARNINGS), 2);
    assert_eq!(session.token_store().get().unwrap().value, "renewed");
    assert_eq!(session.refresh_coordinator().refresh_count(), 1);
    assert!(drain(&mut events).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_replay_carries_the_new_token() {
    let mock = Arc::new(
        MockTransport::new()
            .on(HttpMethod::Get, PROFILE, protected())
            .on(HttpMethod::Post, REFRESH, MockReply::json(200, json!({"token": "renewed"}))),
    );
    let (session, _events) = session(mock.clone());

    session.get::<Value>(PROFILE, RequestOptions::new()).await.unwrap();

    let calls = mock.calls();
    let authorizations: Vec<_> = calls
        .iter()
        .map(|call| (call.method, call.header("Authorization").map(str::to_string)))
        .collect();
    assert_eq!(
        authorizations,
        vec![
            (HttpMethod::Get, Some("Bearer stale".to_string())),
            (HttpMethod::Post, Some("Bearer stale".to_string())),
            (HttpMethod::Get, Some("Bearer renewed".to_string())),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_refresh_failure_expires_the_session_once() {
    let mock = Arc::new(
        MockTransport::new()
            .on(HttpMethod::Get, PROFILE, protected())
            .on(HttpMethod::Get, EARNINGS, protected())
            .on(
                HttpMethod::Post,
                REFRESH,
                MockReply::json(401, json!({"message": "Refresh token expired"}))
                    .after(Duration::from_millis(50)),
            ),
    );
    let (session, mut events) = session(mock.clone());

    let (profile, earnings) = tokio::join!(
        session.get::<Value>(PROFILE, RequestOptions::new()),
        session.get::<Value>(EARNINGS, RequestOptions::new()),
    );

    assert_eq!(profile.unwrap_err(), ApiError::AuthExpired);
    assert_eq!(earnings.unwrap_err(), ApiError::AuthExpired);
    assert_eq!(mock.call_count(HttpMethod::Post, REFRESH), 1);
    assert!(session.token_store().get().is_none());
    assert_eq!(drain(&mut events), vec![Notification::SessionExpired]);
}

#[tokio::test(start_paused = true)]
async fn test_unauthorized_after_refresh_is_not_replayed_again() {
    let mock = Arc::new(
        MockTransport::new()
            .on(HttpMethod::Get, PROFILE, MockReply::status(401))
            .on(HttpMethod::Get, STATS, MockReply::json(200, json!({"patients": 120})))
            .on(HttpMethod::Post, REFRESH, MockReply::json(200, json!({"token": "renewed"}))),
    );
    let (session, mut events) = session(mock.clone());
    session.get::<Value>(STATS, RequestOptions::new()).await.unwrap();

    let error = session
        .get::<Value>(PROFILE, RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(error, ApiError::AuthExpired);
    session.get::<Value>(STATS, RequestOptions::new()).await.unwrap();
    assert_eq!(mock.call_count(HttpMethod::Get, STATS), 2, "expiry must drop cached reads");
    assert_eq!(mock.call_count(HttpMethod::Get, PROFILE), 2);
    assert_eq!(mock.call_count(HttpMethod::Post, REFRESH), 1);
    assert!(session.token_store().get().is_none());
    assert_eq!(drain(&mut events), vec![Notification::SessionExpired]);
}

#[tokio::test(start_paused = true)]
async fn test_skip_auth_refresh_surfaces_the_401() {
    let mock = Arc::new(MockTransport::new().on(
        HttpMethod::Get,
        PROFILE,
        MockReply::json(401, json!({"message": "Token expired"})),
    ));
    let (session, _events) = session(mock.clone());

    let error = session
        .get::<Value>(PROFILE, RequestOptions::new().skip_auth_refresh())
        .await
        .unwrap_err();

    assert_eq!(
        error,
        ApiError::Client {
            status: 401,
            message: "Token expired".to_string()
        }
    );
    assert_eq!(mock.call_count(HttpMethod::Post, REFRESH), 0);
    assert_eq!(session.token_store().get().unwrap().value, "stale");
}

#[tokio::test(start_paused = true)]
async fn test_queued_callers_replay_in_arrival_order() {
    // Each caller's first 401 arrives after its own delay: c, then a, then b
    let unauthorized_after = |millis: u64| {
        MockReply::from_fn(move |request| match request.header("Authorization") {
            Some("Bearer renewed") => MockReply::json(200, json!({})),
            _ => MockReply::status(401).after(Duration::from_millis(millis)),
        })
    };
    let mock = Arc::new(
        MockTransport::new()
            .on(HttpMethod::Get, "/queue/a", unauthorized_after(20))
            .on(HttpMethod::Get, "/queue/b", unauthorized_after(30))
            .on(HttpMethod::Get, "/queue/c", unauthorized_after(10))
            .on(
                HttpMethod::Post,
                REFRESH,
                MockReply::json(200, json!({"token": "renewed"})).after(Duration::from_millis(100)),
            ),
    );
    let (session, _events) = session(mock.clone());

    let callers: Vec<_> = ["/queue/a", "/queue/b", "/queue/c"]
        .into_iter()
        .map(|path| {
            let session = session.clone();
            tokio::spawn(async move { session.get::<Value>(path, RequestOptions::new()).await })
        })
        .collect();
    for caller in callers {
        caller.await.unwrap().unwrap();
    }

    let replays: Vec<String> = mock
        .calls()
        .iter()
        .filter(|call| call.method == HttpMethod::Get && call.header("Authorization") == Some("Bearer renewed"))
        .map(|call| call.url.rsplit('/').next().unwrap_or_default().to_string())
        .collect();
    assert_eq!(replays, vec!["c", "a", "b"]);
    assert_eq!(mock.call_count(HttpMethod::Post, REFRESH), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_drops_cached_reads() {
    let mock = Arc::new(
        MockTransport::new()
            .on(HttpMethod::Get, PROFILE, protected())
            .on(HttpMethod::Get, STATS, MockReply::json(200, json!({"patients": 120})))
            .on(HttpMethod::Post, REFRESH, MockReply::status(401)),
    );
    let (session, _events) = session(mock.clone());

    session.get::<Value>(STATS, RequestOptions::new()).await.unwrap();
    session.get::<Value>(STATS, RequestOptions::new()).await.unwrap();
    assert_eq!(mock.call_count(HttpMethod::Get, STATS), 1);

    let error = session.get::<Value>(PROFILE, RequestOptions::new()).await.unwrap_err();
    assert_eq!(error, ApiError::AuthExpired);

    session.get::<Value>(STATS, RequestOptions::new()).await.unwrap();
    assert_eq!(mock.call_count(HttpMethod::Get, STATS), 2);
}
