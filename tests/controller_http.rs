use pretty_assertions::assert_eq;
use scrape_panel::modules::api::HttpApi;
use scrape_panel::modules::controller::{Controller, DEFAULT_POLL_INTERVAL};
use scrape_panel::modules::errors::PanelError;
use scrape_panel::modules::state::RunState;
use scrape_panel::modules::types::LogLevel;
use scrape_panel::modules::view::{Action, PanelView};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FALLBACK_TEXT: &str = r#"{
  "download_dir": "./downloads",
  "auth_url": "https://login.openathens.net/auth/cobbcounty.org/o/72388178",
  "library_credentials": {
    "Cobb County Library": {
      "username": "YOUR_LIBRARY_CARD_NUMBER",
      "password": "YOUR_PIN"
    }
  },
  "search_parameters": {
    "state": "Georgia",
    "include_unverified": true,
    "include_closed": false
  },
  "pages_per_batch": 10,
  "pages_to_download": "all",
  "state_file": "reference_usa_state.json"
}"#;

fn panel_for(server: &MockServer) -> Controller<HttpApi> {
    let api = HttpApi::new(&server.uri(), None).expect("valid mock uri");
    Controller::new(api, DEFAULT_POLL_INTERVAL)
}

fn messages(view: &PanelView, level: LogLevel) -> Vec<String> {
    view.feed
        .entries()
        .iter()
        .filter(|entry| entry.level == level)
        .map(|entry| entry.message.clone())
        .collect()
}

async fn accept_run(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/run"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn load_failure_shows_fallback_config_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/config"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "yaml broke"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut panel = panel_for(&server);
    let err = panel.load_config().await.unwrap_err();

    assert!(matches!(err, PanelError::Status { .. }));
    assert_eq!(panel.view().config_text, FALLBACK_TEXT);
    let status = panel.view().status.clone().expect("status banner");
    assert_eq!(status.severity, LogLevel::Error);
    assert_eq!(
        status.text,
        "Error: Failed to load configuration: 500 Internal Server Error (yaml broke)"
    );
}

#[tokio::test]
async fn error_field_in_ok_payload_counts_as_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "no config yet"})))
        .mount(&server)
        .await;

    let mut panel = panel_for(&server);
    let err = panel.load_config().await.unwrap_err();

    assert!(matches!(err, PanelError::Application { .. }));
    assert_eq!(panel.view().config_text, FALLBACK_TEXT);
    assert_eq!(
        messages(panel.view(), LogLevel::Error),
        vec!["Error: Failed to load configuration: no config yet"]
    );
}

#[tokio::test]
async fn loaded_config_is_pretty_printed_in_server_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/config"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"zeta":1,"alpha":{"pages":[1,2]}}"#, "application/json"),
        )
        .mount(&server)
        .await;

    let mut panel = panel_for(&server);
    panel.init().await;

    assert_eq!(
        panel.view().config_text,
        "{\n  \"zeta\": 1,\n  \"alpha\": {\n    \"pages\": [\n      1,\n      2\n    ]\n  }\n}"
    );
    assert_eq!(
        messages(panel.view(), LogLevel::Success),
        vec!["Configuration loaded successfully"]
    );
    assert_eq!(panel.state(), RunState::Idle);
}

#[tokio::test]
async fn unreachable_server_gets_a_connection_hint() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = HttpApi::new(&format!("http://{addr}"), None).unwrap();
    let mut panel = Controller::new(api, DEFAULT_POLL_INTERVAL);
    let err = panel.load_config().await.unwrap_err();

    assert!(err.is_transport());
    assert_eq!(panel.view().config_text, FALLBACK_TEXT);
    let status = panel.view().status.clone().unwrap();
    assert_eq!(status.text, "Server connection failed. Is the server running?");
    let errors = messages(panel.view(), LogLevel::Error);
    assert!(errors.contains(&"Connection to server failed. Make sure the server is running.".to_string()));
    let infos = messages(panel.view(), LogLevel::Info);
    assert!(infos.contains(&format!("The server should be running at: http://{addr}")));
}

#[tokio::test]
async fn empty_batch_fields_send_default_range() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/run"))
        .and(body_json(json!({"startBatch": 1, "endBatch": 10})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/stop"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&server)
        .await;

    let mut panel = panel_for(&server);
    assert!(panel.set_batch_inputs(Some(""), Some("")));
    panel.run_scraper().await.unwrap();
    panel.stop_scraper().await.unwrap();

    assert!(panel.set_batch_inputs(Some("1"), Some("10")));
    panel.run_scraper().await.unwrap();
    assert!(panel.state().is_running());
}

#[tokio::test]
async fn inverted_range_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut panel = panel_for(&server);
    panel.set_batch_inputs(Some("5"), Some("1"));
    assert!(panel.press(Action::Run).await);

    assert_eq!(
        messages(panel.view(), LogLevel::Error),
        vec!["Error: Start batch cannot be greater than end batch"]
    );
    assert_eq!(panel.state(), RunState::Idle);
    assert!(!panel.polling_active());
}

#[tokio::test]
async fn run_presses_while_running_are_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/run"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let mut panel = panel_for(&server);
    assert!(panel.press(Action::Run).await);
    assert!(!panel.press(Action::Run).await);
    assert!(!panel.press(Action::Save).await);

    assert!(panel.polling_active());
    let controls = panel.view().controls;
    assert!(controls.stop && !controls.run && !controls.save && !controls.batch_inputs);
}

#[tokio::test]
async fn failed_stop_keeps_polling() {
    let server = MockServer::start().await;
    accept_run(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/stop"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "browser hung"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut panel = panel_for(&server);
    panel.run_scraper().await.unwrap();
    let err = panel.stop_scraper().await.unwrap_err();

    assert!(matches!(err, PanelError::Status { .. }));
    assert!(panel.state().is_running());
    assert!(panel.polling_active());
    assert!(panel.view().controls.stop);
    assert_eq!(
        messages(panel.view(), LogLevel::Warning),
        vec!["Stopping scraper..."]
    );
}

#[tokio::test]
async fn identical_polls_render_identically() {
    let server = MockServer::start().await;
    accept_run(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/logs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"timestamp": "09:00:00", "level": "info", "message": "Starting batch: 1"},
            {"timestamp": "09:00:02", "level": "warning", "message": "slow page"}
        ])))
        .expect(2)
        .mount(&server)
        .await;

    let mut panel = panel_for(&server);
    panel.run_scraper().await.unwrap();

    panel.poll_tick().await.unwrap();
    let first = panel.view().feed.lines();
    panel.poll_tick().await.unwrap();

    assert_eq!(panel.view().feed.lines(), first);
    assert_eq!(
        first,
        vec!["[09:00:00] Starting batch: 1", "[09:00:02] slow page"]
    );
    assert!(panel.state().is_running());
}

#[tokio::test]
async fn poll_reporting_not_running_stops_the_panel() {
    let server = MockServer::start().await;
    accept_run(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/logs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "logs": [{"timestamp": "09:10:00", "level": "success", "message": "Scraper completed successfully"}],
            "running": false
        })))
        .mount(&server)
        .await;

    let mut panel = panel_for(&server);
    panel.run_scraper().await.unwrap();
    panel.poll_tick().await.unwrap();

    assert_eq!(panel.state(), RunState::Idle);
    assert!(!panel.polling_active());
    assert!(panel.view().controls.run);
}

#[tokio::test]
async fn failed_poll_leaves_feed_alone() {
    let server = MockServer::start().await;
    accept_run(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/logs"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let mut panel = panel_for(&server);
    panel.run_scraper().await.unwrap();
    let before = panel.view().feed.clone();

    assert!(panel.poll_tick().await.is_err());
    assert_eq!(panel.view().feed, before);
    assert!(panel.state().is_running());
}

#[tokio::test]
async fn invalid_json_is_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/config"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut panel = panel_for(&server);
    panel.set_config_text("{\"pages_per_batch\": }");
    assert!(panel.press(Action::Save).await);

    let errors = messages(panel.view(), LogLevel::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Invalid JSON:"));
}

#[tokio::test]
async fn rejected_save_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/config"))
        .and(body_json(json!({"pages_per_batch": 5})))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "read-only fs"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut panel = panel_for(&server);
    panel.set_config_text("{\"pages_per_batch\": 5}");
    assert!(panel.save_config().await.is_err());

    let status = panel.view().status.clone().unwrap();
    assert_eq!(
        status.text,
        "Error: Failed to save configuration: 500 Internal Server Error (read-only fs)"
    );
    assert_eq!(panel.view().config_text, "{\"pages_per_batch\": 5}");
}

#[tokio::test]
async fn armed_timer_ticks_after_one_interval() {
    let server = MockServer::start().await;
    accept_run(&server).await;

    let api = HttpApi::new(&server.uri(), None).unwrap();
    let mut panel = Controller::new(api, std::time::Duration::from_millis(20));
    panel.run_scraper().await.unwrap();

    let started = tokio::time::Instant::now();
    tokio::time::timeout(std::time::Duration::from_secs(2), panel.next_tick())
        .await
        .expect("armed timer ticks");
    assert!(started.elapsed() >= std::time::Duration::from_millis(10));
}
