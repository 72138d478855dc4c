use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use patrol_rust::config::ClientOptions;
use patrol_rust::error::Error;
use patrol_rust::storage::{OfflineStore, Role, VisitRecord};
use patrol_rust::Patrol;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn jwt(exp_offset_secs: i64) -> String {
    encode(
        &Header::default(),
        &json!({
            "sub": 12,
            "email": "guard@example.com",
            "rol": "guardia",
            "exp": Utc::now().timestamp() + exp_offset_secs
        }),
        &EncodingKey::from_secret(b"server-secret"),
    )
    .unwrap()
}

fn login_body(token: &str) -> Value {
    json!({
        "access_token": token,
        "token_type": "bearer",
        "user": {
            "id": 12,
            "email": "guard@example.com",
            "nombre": "Pedro",
            "rol": "guardia",
            "servicio_id": 3,
            "servicio_nombre": "Planta Norte"
        }
    })
}

async fn mount_login(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({
            "email": "guard@example.com",
            "password": "secret"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body(token)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_caches_user_and_sends_bearer() {
    // モックサーバーの起動
    let mock_server = MockServer::start().await;
    let token = jwt(3600);
    mount_login(&mock_server, &token).await;

    Mock::given(method("GET"))
        .and(path("/alerts/count"))
        .and(header("Authorization", format!("Bearer {}", token).as_str()))
        .and(header_exists("X-Client-Info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 3, "alta": 1, "media": 1, "baja": 1
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let patrol = Patrol::new(&mock_server.uri());
    let response = patrol.auth().login("guard@example.com", "secret").await.unwrap();

    assert_eq!(response.user.role, Role::Guard);
    assert!(patrol.auth().is_logged_in());
    assert_eq!(patrol.store().load_token().await, Some(token.clone()));

    let cached = patrol.store().load_user().await.unwrap();
    assert_eq!(cached.name, "Pedro");
    assert_eq!(cached.service_id, Some(3));

    let claims = patrol.auth().session_claims().unwrap();
    assert_eq!(claims.user_id(), Some(12));
    assert_eq!(claims.role.as_deref(), Some("guardia"));

    // 認証ヘッダー付きのリクエスト
    let count = patrol.lookups().alerts_count(None).await.unwrap();
    assert_eq!(count.total, 3);
    assert_eq!(count.high, 1);
}

#[tokio::test]
async fn test_login_failure_surfaces_detail() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Incorrect email or password"})),
        )
        .mount(&mock_server)
        .await;

    let patrol = Patrol::new(&mock_server.uri());
    let result = patrol.auth().login("guard@example.com", "wrong").await;

    match result {
        Err(Error::Api { status, message }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "Incorrect email or password");
        }
        other => panic!("Expected Api error, got {:?}", other.map(|r| r.access_token)),
    }
    assert!(!patrol.auth().is_logged_in());
    assert_eq!(patrol.store().load_token().await, None);
}

#[tokio::test]
async fn test_current_user_refreshes_cache() {
    let mock_server = MockServer::start().await;
    let token = jwt(3600);
    mount_login(&mock_server, &token).await;

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 12,
            "email": "guard@example.com",
            "nombre": "Pedro Soto",
            "rol": "supervisor",
            "servicio_id": 3
        })))
        .mount(&mock_server)
        .await;

    let patrol = Patrol::new(&mock_server.uri());
    patrol.auth().login("guard@example.com", "secret").await.unwrap();

    let user = patrol.auth().current_user().await.unwrap();
    assert_eq!(user.role, Role::Supervisor);
    assert_eq!(patrol.store().load_user().await.unwrap().name, "Pedro Soto");
}

#[tokio::test]
async fn test_rejected_session_is_forgotten() {
    let mock_server = MockServer::start().await;
    let token = jwt(3600);
    mount_login(&mock_server, &token).await;

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid or expired token"})),
        )
        .mount(&mock_server)
        .await;

    let patrol = Patrol::new(&mock_server.uri());
    patrol.auth().login("guard@example.com", "secret").await.unwrap();

    let result = patrol.auth().current_user().await;
    assert_eq!(result.unwrap_err().status(), Some(401));
    assert!(!patrol.auth().is_logged_in());
    assert_eq!(patrol.store().load_token().await, None);
}

#[tokio::test]
async fn test_current_user_requires_login() {
    let patrol = Patrol::new("http://127.0.0.1:9");
    let result = patrol.auth().current_user().await;
    assert!(matches!(result, Err(Error::Auth(_))));
}

#[tokio::test]
async fn test_session_survives_restart() {
    let mock_server = MockServer::start().await;
    let token = jwt(3600);
    mount_login(&mock_server, &token).await;

    let dir = tempfile::tempdir().unwrap();
    let options = ClientOptions::default().with_store_dir(dir.path());

    {
        let patrol = Patrol::open(&mock_server.uri(), options.clone()).await.unwrap();
        patrol.auth().login("guard@example.com", "secret").await.unwrap();
    }

    // 再起動後にセッションを復元
    let patrol = Patrol::open(&mock_server.uri(), options).await.unwrap();
    assert_eq!(patrol.auth().get_token(), Some(token));
    assert_eq!(patrol.store().load_user().await.unwrap().email, "guard@example.com");
}

#[tokio::test]
async fn test_expired_token_is_discarded_on_restore() {
    let dir = tempfile::tempdir().unwrap();
    let store = OfflineStore::open(dir.path()).await.unwrap();
    store.save_token(&jwt(-60)).await;
    drop(store);

    let options = ClientOptions::default().with_store_dir(dir.path());
    let patrol = Patrol::open("http://127.0.0.1:9", options).await.unwrap();

    assert!(!patrol.auth().is_logged_in());
    assert_eq!(patrol.store().load_token().await, None);
}

#[tokio::test]
async fn test_logout_clears_everything() {
    let mock_server = MockServer::start().await;
    let token = jwt(3600);
    mount_login(&mock_server, &token).await;

    let store = Arc::new(OfflineStore::in_memory());
    let patrol = Patrol::with_store(&mock_server.uri(), ClientOptions::default(), store.clone());
    patrol.auth().login("guard@example.com", "secret").await.unwrap();
    store
        .append_visit(VisitRecord::new(3, 17, 12, -33.45, -70.66))
        .await
        .unwrap();

    patrol.auth().logout().await;

    assert!(!patrol.auth().is_logged_in());
    assert_eq!(store.load_token().await, None);
    assert_eq!(store.load_user().await, None);
    assert_eq!(store.pending_count().await, 0);
}
