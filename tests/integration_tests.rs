// Integration tests for the GameVerse client

use std::sync::Arc;
use std::time::Duration;

use gameverse_client::config::{ApiSettings, CacheSettings};
use gameverse_client::models::AuthTokens;
use gameverse_client::store::{LobbyBackend, LobbyError, MockLobbyBackend, MockRecommendations};
use gameverse_client::views::{DashboardView, DiscoverScreen, DiscoverView, LobbyView};
use gameverse_client::{ApiClient, ApiError, CatalogCache, LocalStorage, Session, Store};
use mockito::{Matcher, Server};

fn tokens(token: &str, refresh_token: &str) -> AuthTokens {
    AuthTokens {
        token: token.to_string(),
        refresh_token: refresh_token.to_string(),
        expires_in: None,
        is_new_user: false,
    }
}

fn jwt_expiring_in(secs: i64) -> String {
    let claims = serde_json::json!({ "sub": "1", "exp": chrono::Utc::now().timestamp() + secs });
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(b"server-secret"),
    )
    .unwrap()
}

fn session() -> Arc<Session> {
    Arc::new(Session::new(LocalStorage::in_memory()))
}

fn store_with(url: &str, session: Arc<Session>) -> Store {
    let settings = ApiSettings {
        base_url: url.to_string(),
        timeout_secs: 5,
    };
    let api = Arc::new(ApiClient::new(&settings, session).unwrap());
    Store::new(api, CatalogCache::new(&CacheSettings::default()))
        .with_lobby_backend(Arc::new(MockLobbyBackend::new(Duration::ZERO)))
        .with_recommendations(Arc::new(MockRecommendations::new(Duration::ZERO)))
}

const PROFILE: &str = r#"{
    "success": true,
    "data": {
        "id": 1,
        "userId": 1,
        "avatarId": "cyber-warrior-03",
        "displayName": "StealthGamer",
        "bio": "Night owl",
        "interestTags": ["FPS", "Strategy"],
        "gameExperience": "ADVANCED",
        "gamesPlayed": ["CHESS"],
        "totalGamesWon": 45,
        "totalGamesPlayed": 60
    }
}"#;

#[tokio::test]
async fn test_expired_token_is_refreshed_and_replayed() {
    let mut server = Server::new_async().await;
    let stale = server
        .mock("GET", "/profile/me")
        .match_header("authorization", "Bearer stale-token")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/auth/refresh-token")
        .match_body(Matcher::PartialJson(serde_json::json!({ "refreshToken": "refresh-1" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success":true,"data":{"accessToken":"fresh-token","refreshToken":"refresh-2"}}"#)
        .expect(1)
        .create_async()
        .await;
    let fresh = server
        .mock("GET", "/profile/me")
        .match_header("authorization", "Bearer fresh-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(PROFILE)
        .expect(1)
        .create_async()
        .await;

    let session = session();
    session.store_tokens(&tokens("stale-token", "refresh-1")).unwrap();
    let store = store_with(&server.url(), Arc::clone(&session));

    let profile = store.fetch_profile().await.unwrap();
    assert_eq!(profile.display_name, "StealthGamer");
    assert_eq!(session.token().as_deref(), Some("fresh-token"));
    assert_eq!(session.refresh_token().as_deref(), Some("refresh-2"));

    stale.assert_async().await;
    refresh.assert_async().await;
    fresh.assert_async().await;
}

#[tokio::test]
async fn test_failed_refresh_logs_out() {
    let mut server = Server::new_async().await;
    let _balance = server
        .mock("GET", "/gamecoins/balance")
        .with_status(401)
        .create_async()
        .await;
    let _refresh = server
        .mock("POST", "/auth/refresh-token")
        .with_status(401)
        .create_async()
        .await;

    let session = session();
    session.store_tokens(&tokens("stale-token", "refresh-1")).unwrap();
    let store = store_with(&server.url(), Arc::clone(&session));
    let watcher = store.watch_session();
    assert!(store.select(|s| s.auth.is_authenticated).await);

    let err = store.fetch_balance().await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
    assert!(!session.is_authenticated());
    assert_eq!(session.refresh_token(), None);

    let error = store.select(|s| s.gamecoin.error.clone()).await;
    assert!(error.is_some());

    for _ in 0..50 {
        if !store.select(|s| s.auth.is_authenticated).await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!store.select(|s| s.auth.is_authenticated).await);
    watcher.abort();
}

#[tokio::test]
async fn test_second_unauthorized_is_not_retried() {
    let mut server = Server::new_async().await;
    let rooms = server
        .mock("GET", "/rooms")
        .with_status(401)
        .expect(2)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/auth/refresh-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"token":"fresh-token","refreshToken":"refresh-2"}"#)
        .expect(1)
        .create_async()
        .await;

    let session = session();
    session.store_tokens(&tokens("stale-token", "refresh-1")).unwrap();
    let store = store_with(&server.url(), session);

    let err = store.fetch_rooms().await.unwrap_err();
    assert!(matches!(err, ApiError::Status { status: 401, .. }));

    rooms.assert_async().await;
    refresh.assert_async().await;
}

#[tokio::test]
async fn test_scheduled_refresh_waits_for_expiry() {
    let fresh = jwt_expiring_in(3600);
    let mut server = Server::new_async().await;
    let refresh = server
        .mock("POST", "/auth/refresh-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(serde_json::json!({ "token": fresh.as_str(), "refreshToken": "refresh-2" }).to_string())
        .expect(1)
        .create_async()
        .await;

    let session = session();
    let long_lived = jwt_expiring_in(3600);
    session.store_tokens(&tokens(&long_lived, "refresh-1")).unwrap();
    let store = store_with(&server.url(), Arc::clone(&session));
    let refresher = store.schedule_token_refresh(Duration::from_millis(20));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(session.token(), Some(long_lived));

    session.store_tokens(&tokens(&jwt_expiring_in(0), "refresh-1")).unwrap();
    for _ in 0..50 {
        if session.token().as_deref() == Some(fresh.as_str()) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(session.token(), Some(fresh));
    assert_eq!(session.refresh_token().as_deref(), Some("refresh-2"));

    tokio::time::sleep(Duration::from_millis(60)).await;
    refresher.abort();
    refresh.assert_async().await;
}

#[tokio::test]
async fn test_login_flow() {
    let mut server = Server::new_async().await;
    let _otp = server
        .mock("POST", "/auth/send-otp")
        .match_body(Matcher::PartialJson(serde_json::json!({ "phoneNumber": "+15550001111" })))
        .with_status(200)
        .with_body(r#"{"success":true,"message":"OTP sent"}"#)
        .create_async()
        .await;
    let _verify = server
        .mock("POST", "/auth/verify-otp")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success":true,"data":{"token":"access-1","refreshToken":"refresh-1","isNewUser":true}}"#)
        .create_async()
        .await;

    let session = session();
    let store = store_with(&server.url(), Arc::clone(&session));

    store.send_otp("+15550001111").await.unwrap();
    let auth = store.select(|s| s.auth.clone()).await;
    assert!(auth.otp_sent);
    assert_eq!(auth.phone_number.as_deref(), Some("+15550001111"));

    let issued = store.verify_otp("+15550001111", "123456").await.unwrap();
    assert!(issued.is_new_user);
    assert!(store.select(|s| s.auth.is_authenticated).await);
    assert_eq!(session.token().as_deref(), Some("access-1"));
    assert!(session.last_refreshed().is_some());
}

#[tokio::test]
async fn test_logout_clears_session_even_when_backend_fails() {
    let mut server = Server::new_async().await;
    let _logout = server
        .mock("POST", "/auth/logout")
        .with_status(500)
        .create_async()
        .await;

    let session = session();
    session.store_tokens(&tokens("access-1", "refresh-1")).unwrap();
    let store = store_with(&server.url(), Arc::clone(&session));

    store.logout().await;
    assert!(!session.is_authenticated());
    assert!(!store.select(|s| s.auth.is_authenticated).await);
}

#[tokio::test]
async fn test_dashboard_from_backend() {
    let mut server = Server::new_async().await;
    let _profile = server
        .mock("GET", "/profile/me")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(PROFILE)
        .create_async()
        .await;
    let _balance = server
        .mock("GET", "/gamecoins/balance")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success":true,"data":{"balance":1250,"dailyBonusAvailable":false}}"#)
        .create_async()
        .await;

    let store = store_with(&server.url(), session());
    store.fetch_profile().await.unwrap();
    store.fetch_balance().await.unwrap();

    let view = store.select(DashboardView::from_state).await;
    assert_eq!(view.display_name, "StealthGamer");
    assert_eq!(view.win_rate_label(), "75%");
    assert_eq!(view.balance_label(), "1250 GameCoins");
    assert!(!view.daily_bonus_available);
}

#[tokio::test]
async fn test_catalogs_are_cached_until_logout() {
    let mut server = Server::new_async().await;
    let avatars = server
        .mock("GET", "/profile/avatars")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"["cyber-warrior-01","cyber-warrior-02"]"#)
        .expect(2)
        .create_async()
        .await;
    let _logout = server
        .mock("POST", "/auth/logout")
        .with_status(200)
        .create_async()
        .await;

    let store = store_with(&server.url(), session());
    assert_eq!(store.fetch_available_avatars().await.unwrap().len(), 2);
    assert_eq!(store.fetch_available_avatars().await.unwrap().len(), 2);

    store.logout().await;
    store.fetch_available_avatars().await.unwrap();

    avatars.assert_async().await;
    let state = store.select(|s| s.profile.available_avatars.clone()).await;
    assert_eq!(state.len(), 2);
}

#[tokio::test]
async fn test_room_join_and_messages() {
    let mut server = Server::new_async().await;
    let _join = server
        .mock("POST", "/rooms/7/join")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":7,"name":"The Lounge","isActive":true,"participantCount":3,"maxCapacity":50}"#)
        .create_async()
        .await;
    let _messages = server
        .mock("GET", "/rooms/7/messages")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"[{"id":1,"content":"gg","senderDisplayName":"PixelMaster","timestamp":"2024-05-01T10:00:00Z","messageType":"CHAT"}]"#,
        )
        .create_async()
        .await;
    let _leave = server
        .mock("POST", "/rooms/7/leave")
        .with_status(200)
        .create_async()
        .await;

    let store = store_with(&server.url(), session());
    let room = store.join_room("7").await.unwrap();
    assert_eq!(room.id, "7");
    store.fetch_messages("7").await.unwrap();

    let state = store.select(|s| s.room.clone()).await;
    assert_eq!(state.current_room.map(|r| r.name).as_deref(), Some("The Lounge"));
    assert_eq!(state.messages.len(), 1);

    store.leave_room("7").await.unwrap();
    let state = store.select(|s| s.room.clone()).await;
    assert!(state.current_room.is_none());
    assert!(state.messages.is_empty());
}

#[tokio::test]
async fn test_daily_bonus_records_transaction() {
    let mut server = Server::new_async().await;
    let _bonus = server
        .mock("POST", "/gamecoins/daily-bonus")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success":true,"data":{"newBalance":1350,"bonusAmount":100}}"#)
        .create_async()
        .await;

    let store = store_with(&server.url(), session());
    store.claim_daily_bonus().await.unwrap();

    let wallet = store.select(|s| s.gamecoin.clone()).await;
    assert_eq!(wallet.balance, 1350.0);
    assert!(!wallet.daily_bonus_available);
    assert_eq!(wallet.transactions[0].description, "Daily Bonus");
}

#[tokio::test]
async fn test_private_lobby_flow() {
    let store = store_with("http://127.0.0.1:9", session());

    let lobby = store.create_private_lobby(Some("chess")).await.unwrap();
    assert_eq!(lobby.max_capacity, 2);
    assert_eq!(lobby.invite_code.len(), 6);

    let view = LobbyView::new(&lobby, MockLobbyBackend::CURRENT_USER_ID);
    assert!(view.is_creator());
    assert!(!view.can_start());
    assert_eq!(view.capacity_label(), "1/2");

    let err = store.start_game().await.unwrap_err();
    assert_eq!(err, LobbyError::NotEnoughPlayers);

    let err = store.join_lobby_by_code(" full ").await.unwrap_err();
    assert_eq!(err, LobbyError::Full);
    let error = store.select(|s| s.lobby.error.clone()).await;
    assert_eq!(error.as_deref(), Some("This lobby is full"));
}

#[tokio::test]
async fn test_discover_like_removes_card() {
    let store = store_with("http://127.0.0.1:9", session());
    let mut view = DiscoverView::new();
    view.load(&store).await.unwrap();

    let state = store.select(|s| s.compatibility.clone()).await;
    let first = match view.screen(&state) {
        DiscoverScreen::Card(card) => card.id,
        other => panic!("unexpected screen {:?}", other),
    };

    view.deck_mut().begin_drag();
    view.deck_mut().drag_to(150.0);
    view.release(&store).await.unwrap();

    let state = store.select(|s| s.compatibility.clone()).await;
    assert!(state.recommendations.iter().all(|r| r.id != first));
    assert_eq!(view.deck().index(), 0);
}

#[test]
fn test_mock_lobby_codes() {
    let backend = MockLobbyBackend::new(Duration::ZERO);

    let err = tokio_test::block_on(backend.join("EXPIRE")).unwrap_err();
    assert_eq!(err.to_string(), "This invite code has expired");
    let err = tokio_test::block_on(backend.join("NOTFND")).unwrap_err();
    assert_eq!(err, LobbyError::NotFound);

    let lobby = tokio_test::assert_ok!(tokio_test::block_on(backend.join("AB12CD")));
    assert_eq!(lobby.participants.len(), 2);
    assert_eq!(lobby.max_capacity, 8);
}

#[test]
fn test_file_storage_survives_restart() {
    let path = std::env::temp_dir().join(format!("gameverse-{}.json", uuid::Uuid::new_v4()));

    let session = Session::new(tokio_test::assert_ok!(LocalStorage::open(&path)));
    session.store_tokens(&tokens("access-1", "refresh-1")).unwrap();

    let reopened = Session::new(tokio_test::assert_ok!(LocalStorage::open(&path)));
    assert_eq!(reopened.token().as_deref(), Some("access-1"));
    assert_eq!(reopened.refresh_token().as_deref(), Some("refresh-1"));

    let _ = std::fs::remove_file(&path);
}
