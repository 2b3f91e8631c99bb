//! Exercises the API client against a scripted in-process HTTP server.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use actix_web::http::StatusCode;
use actix_web::{App, HttpResponse, HttpServer, web};

use process_activity_client::app_config::Settings;
use process_activity_client::collection::collector::ActivityCollector;
use process_activity_client::collection::process_source::ProcessEntry;
use process_activity_client::event_types::ActivityRecord;
use process_activity_client::network::api_client::ApiClient;
use process_activity_client::network::session::ConnectionStatus;
use process_activity_client::services::reporter::split_batches;

#[derive(Clone, Copy)]
enum LoginScript {
    Ok,
    OkWithoutToken,
    Status(u16),
}

struct ServerState {
    login_calls: AtomicUsize,
    batch_calls: AtomicUsize,
    // Scripted responses, consumed front to back; exhausted scripts fall back
    // to plain success.
    login_script: Mutex<VecDeque<LoginScript>>,
    batch_script: Mutex<VecDeque<u16>>,
}

impl ServerState {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            login_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
            login_script: Mutex::new(VecDeque::new()),
            batch_script: Mutex::new(VecDeque::new()),
        })
    }

    fn script_logins(&self, steps: &[LoginScript]) {
        self.login_script.lock().unwrap().extend(steps.iter().copied());
    }

    fn script_batches(&self, statuses: &[u16]) {
        self.batch_script.lock().unwrap().extend(statuses.iter().copied());
    }

    fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }
}

async fn login_handler(
    state: web::Data<ServerState>,
    _body: web::Json<serde_json::Value>,
) -> HttpResponse {
    let call = state.login_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let step = state
        .login_script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or(LoginScript::Ok);
    match step {
        LoginScript::Ok => HttpResponse::Ok().json(serde_json::json!({
            "token": format!("token-{}", call),
            "userId": 20,
            "role": "EMPLOYEE",
            "permissions": {
                "canTrackProcesses": true,
                "canViewOwnStats": true,
                "canManageUsers": false
            }
        })),
        LoginScript::OkWithoutToken => HttpResponse::Ok().json(serde_json::json!({
            "userId": 20,
            "role": "EMPLOYEE"
        })),
        LoginScript::Status(code) => {
            HttpResponse::build(StatusCode::from_u16(code).unwrap()).finish()
        }
    }
}

async fn batch_handler(
    state: web::Data<ServerState>,
    body: web::Json<Vec<ActivityRecord>>,
) -> HttpResponse {
    state.batch_calls.fetch_add(1, Ordering::SeqCst);
    assert!(!body.is_empty(), "client must never post an empty batch");
    let status = state
        .batch_script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or(200);
    HttpResponse::build(StatusCode::from_u16(status).unwrap()).finish()
}

async fn probe_handler() -> HttpResponse {
    HttpResponse::Ok().body("tracking ok")
}

async fn spawn_server(state: Arc<ServerState>) -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");
    let data = web::Data::from(state);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .route("/api/users/login", web::post().to(login_handler))
            .route("/api/logs/batch", web::post().to(batch_handler))
            .route("/api/test/tracking", web::get().to(probe_handler))
    })
    .listen(listener)
    .expect("listen on test socket")
    .workers(1)
    .run();
    actix_web::rt::spawn(server);
    format!("http://{}", addr)
}

fn test_settings(server_url: &str, max_retries: u32) -> Arc<Settings> {
    Arc::new(Settings {
        server_url: server_url.trim_end_matches('/').to_string(),
        username: "collector".to_string(),
        password: "collector-pass".to_string(),
        user_id: Some(20),
        collection_interval_secs: 60,
        max_batch_size: 3,
        token_refresh_interval_secs: 300,
        max_retries,
        login_timeout_secs: 10,
        batch_timeout_secs: 15,
        probe_timeout_secs: 5,
        internal_log_level: "info".to_string(),
        internal_log_file_dir: PathBuf::from("logs"),
        internal_log_file_name: "test.log".to_string(),
    })
}

fn sample_records(count: usize) -> Vec<ActivityRecord> {
    let mut collector = ActivityCollector::new();
    collector.set_user_id(Some(20)).unwrap();
    let entries: Vec<ProcessEntry> = (0..count)
        .map(|i| ProcessEntry {
            pid: i as u32 + 100,
            name: format!("proc{}.exe", i),
            executable_path: None,
            window_title: Some(format!("window {}", i)),
        })
        .collect();
    collector.build_records(&entries).unwrap()
}

#[actix_web::test]
async fn login_success_marks_session_connected() {
    let state = ServerState::new();
    let url = spawn_server(state.clone()).await;
    let mut client = ApiClient::new(test_settings(&url, 3)).unwrap();

    assert!(client.login("collector", "collector-pass").await);

    let session = client.session();
    assert!(session.token_validated());
    assert!(session.token().is_some());
    assert!(session.last_token_refresh().is_some());
    assert_eq!(session.status(), ConnectionStatus::Connected);
    assert_eq!(session.user_id(), Some(20));
    assert_eq!(session.role(), Some("EMPLOYEE"));
    assert!(client.check_permission("canTrackProcesses"));
    assert!(!client.check_permission("canManageUsers"));
    assert!(!client.check_permission("unknownPermission"));
    assert!(!client.is_admin());
    assert!(!client.is_superadmin());
    assert_eq!(state.login_calls(), 1);
}

#[actix_web::test]
async fn rejected_credentials_fail_without_retry() {
    let state = ServerState::new();
    state.script_logins(&[LoginScript::Status(401)]);
    let url = spawn_server(state.clone()).await;
    let mut client = ApiClient::new(test_settings(&url, 3)).unwrap();

    assert!(!client.login("collector", "wrong-pass").await);
    assert_eq!(state.login_calls(), 1);
    assert!(!client.session().token_validated());
    assert_eq!(client.session().status(), ConnectionStatus::Failed);
}

#[actix_web::test]
async fn ok_response_without_token_fails_login() {
    let state = ServerState::new();
    state.script_logins(&[LoginScript::OkWithoutToken]);
    let url = spawn_server(state.clone()).await;
    let mut client = ApiClient::new(test_settings(&url, 3)).unwrap();

    assert!(!client.login("collector", "collector-pass").await);
    assert_eq!(state.login_calls(), 1);
    assert!(!client.session().token_validated());
    assert_eq!(client.session().status(), ConnectionStatus::Failed);
}

#[actix_web::test]
async fn server_errors_are_retried_then_reported_unavailable() {
    let state = ServerState::new();
    state.script_logins(&[LoginScript::Status(500), LoginScript::Status(503)]);
    let url = spawn_server(state.clone()).await;
    // One retry keeps the backoff sleep short.
    let mut client = ApiClient::new(test_settings(&url, 1)).unwrap();

    assert!(!client.login("collector", "collector-pass").await);
    assert_eq!(state.login_calls(), 2);
    assert_eq!(
        client.session().status(),
        ConnectionStatus::ServerUnavailable
    );
}

#[actix_web::test]
async fn empty_batch_is_a_noop_success() {
    let state = ServerState::new();
    let url = spawn_server(state.clone()).await;
    let mut client = ApiClient::new(test_settings(&url, 3)).unwrap();

    assert!(client.login("collector", "collector-pass").await);
    assert!(client.send_batch(&[]).await);
    assert_eq!(state.batch_calls(), 0);
}

#[actix_web::test]
async fn fresh_token_skips_refresh_traffic() {
    let state = ServerState::new();
    let url = spawn_server(state.clone()).await;
    let mut client = ApiClient::new(test_settings(&url, 3)).unwrap();

    assert!(client.login("collector", "collector-pass").await);
    assert_eq!(state.login_calls(), 1);

    assert!(client.ensure_valid_token(false).await);
    assert!(client.ensure_valid_token(false).await);
    assert_eq!(state.login_calls(), 1);

    // A forced refresh does go to the server.
    assert!(client.ensure_valid_token(true).await);
    assert_eq!(state.login_calls(), 2);
}

#[actix_web::test]
async fn rejected_token_forces_exactly_one_refresh_and_resend() {
    let state = ServerState::new();
    state.script_batches(&[403]);
    let url = spawn_server(state.clone()).await;
    let mut client = ApiClient::new(test_settings(&url, 3)).unwrap();

    assert!(client.login("collector", "collector-pass").await);
    assert_eq!(state.login_calls(), 1);

    let records = sample_records(2);
    assert!(client.send_batch(&records).await);

    // One rejected submission, one forced re-login, one resubmission.
    assert_eq!(state.batch_calls(), 2);
    assert_eq!(state.login_calls(), 2);
    assert!(client.session().token_validated());
}

#[actix_web::test]
async fn logout_then_send_fails_without_touching_the_server() {
    let state = ServerState::new();
    let url = spawn_server(state.clone()).await;
    let mut client = ApiClient::new(test_settings(&url, 3)).unwrap();

    assert!(client.login("collector", "collector-pass").await);
    client.logout();
    assert_eq!(client.session().status(), ConnectionStatus::NotConnected);

    let records = sample_records(1);
    assert!(!client.send_batch(&records).await);
    // No credentials remain for a silent refresh, so neither endpoint is hit.
    assert_eq!(state.batch_calls(), 0);
    assert_eq!(state.login_calls(), 1);
}

#[actix_web::test]
async fn failed_batch_does_not_affect_its_siblings() {
    let state = ServerState::new();
    // Second batch fails on both attempts, first and third succeed.
    state.script_batches(&[200, 400, 400, 200]);
    let url = spawn_server(state.clone()).await;
    let mut client = ApiClient::new(test_settings(&url, 1)).unwrap();

    assert!(client.login("collector", "collector-pass").await);

    let batches = split_batches(sample_records(7), 3);
    let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![3, 3, 1]);

    let mut results = Vec::new();
    for batch in &batches {
        results.push(client.send_batch(batch).await);
    }
    assert_eq!(results, vec![true, false, true]);
    assert_eq!(state.batch_calls(), 4);
}

#[actix_web::test]
async fn liveness_probe_reports_reachable_server() {
    let state = ServerState::new();
    let url = spawn_server(state).await;
    let client = ApiClient::new(test_settings(&url, 3)).unwrap();

    assert!(client.check_server_status().await.is_reachable());
}

#[actix_web::test]
async fn liveness_probe_swallows_connection_failures() {
    // Grab a free port and release it so nothing is listening there.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = ApiClient::new(test_settings(&url, 3)).unwrap();
    assert!(!client.check_server_status().await.is_reachable());
}
