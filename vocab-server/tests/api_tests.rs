//! Integration tests for the vocab-server HTTP API
//!
//! Each test runs the full router against a fresh on-disk database in a
//! temporary root folder.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method
use vocab_common::config::SiteConfig;
use vocab_common::db::init_database;
use vocab_common::events::{EventBus, VocabEvent};
use vocab_server::db::{iris, vocabulary};
use vocab_server::services::accounts;
use vocab_server::{build_router, AppState};

const DOMAIN: &str = "https://example.org/";

const EXAMPLE_ROW: &str = "https://example.org/verbs/run,,[\"Run\"],[],[],[],,,[],[],[],[],[],[],[],[],[],,,[],,[],[],[]";

struct TestApp {
    app: Router,
    pool: SqlitePool,
    event_bus: EventBus,
    _root: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        let root = tempfile::tempdir().expect("Should create temp dir");
        let config = SiteConfig::with_domain(root.path().to_path_buf(), DOMAIN);
        let pool = init_database(&config.db_path)
            .await
            .expect("Should initialize database");
        let event_bus = EventBus::new(64);
        let app = build_router(AppState::new(pool.clone(), config, event_bus.clone()));

        Self {
            app,
            pool,
            event_bus,
            _root: root,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        (status, extract_json(response.into_body()).await)
    }

    /// Register a user and return its token
    async fn register(&self, username: &str) -> String {
        let (status, body) = self
            .send(json_request(
                "POST",
                "/api/users",
                None,
                json!({
                    "username": username,
                    "email": format!("{}@example.org", username),
                    "password": "secret",
                    "password_confirmation": "secret",
                }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["token"].as_str().expect("token").to_string()
    }

    async fn register_admin(&self, username: &str) -> String {
        let token = self.register(username).await;
        accounts::grant_admin(&self.pool, username).await.unwrap();
        token
    }
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn upload_request(token: &str, file_name: &str, content: &str) -> Request<Body> {
    let boundary = "vocab-test-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: text/csv\r\n\r\n{c}\r\n--{b}--\r\n",
        b = boundary,
        f = file_name,
        c = content
    );

    Request::builder()
        .method("POST")
        .uri("/api/uploads/vocabulary")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(body))
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

fn row_with(address: &str, created: &str) -> String {
    let mut cells = vec![""; 24];
    cells[0] = address;
    cells[17] = created;
    cells.join(",")
}

fn adl_verbs_run() -> Value {
    json!({"iris": [{"vocabulary_path": "adl", "term_type": "verbs", "term": "run"}]})
}

// =============================================================================
// Public endpoints
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let t = TestApp::new().await;

    let (status, body) = t.send(get_request("/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "vocab-server");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_template_download() {
    let t = TestApp::new().await;

    let response = t
        .app
        .clone()
        .oneshot(get_request("/vocabtemplate.csv", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"vocabtemplate.csv\""
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.starts_with("IRI,rdf:type,skos:prefLabel,"));
    assert_eq!(text.trim_end().split(',').count(), 24);
}

// =============================================================================
// Accounts and authentication
// =============================================================================

#[tokio::test]
async fn test_unauthenticated_access_is_401() {
    let t = TestApp::new().await;

    let (status, body) = t.send(get_request("/api/iris/mine", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = t.send(get_request("/api/iris/mine", Some("not-a-token"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_duplicate_username_is_409_without_password_echo() {
    let t = TestApp::new().await;
    t.register("alice").await;

    let (status, body) = t
        .send(json_request(
            "POST",
            "/api/users",
            None,
            json!({
                "username": "alice",
                "email": "another@example.org",
                "password": "secret",
                "password_confirmation": "secret",
            }),
        ))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["message"], "User alice already exists");
    assert_eq!(body["input"]["username"], "alice");
    assert!(body["input"].get("password").is_none());
}

#[tokio::test]
async fn test_token_issue_and_profile() {
    let t = TestApp::new().await;
    t.register("alice").await;

    let (status, body) = t
        .send(json_request(
            "POST",
            "/api/auth/token",
            None,
            json!({"username": "alice", "password": "secret"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, profile) = t.send(get_request("/api/users/me", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["username"], "alice");
    assert_eq!(profile["pending"], 0);

    let (status, _) = t
        .send(json_request(
            "POST",
            "/api/auth/token",
            None,
            json!({"username": "alice", "password": "wrong"}),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// IRI registration
// =============================================================================

#[tokio::test]
async fn test_create_iri_dispatches_created_event() {
    let t = TestApp::new().await;
    let token = t.register("alice").await;
    let mut rx = t.event_bus.subscribe();

    let (status, body) = t
        .send(json_request("POST", "/api/iris", Some(&token), adl_verbs_run()))
        .await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["iris"][0]["full_iri"], "https://example.org/adl/verbs/run");
    assert_eq!(body["iris"][0]["accepted"], false);
    assert_eq!(body["iris"][0]["reviewed"], false);

    match rx.try_recv().expect("event should be dispatched") {
        VocabEvent::IriCreated { address, .. } => {
            assert_eq!(address, "https://example.org/adl/verbs/run")
        }
        other => panic!("unexpected event {:?}", other),
    }

    let (status, mine) = t.send(get_request("/api/iris/mine", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["iris"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_from_address() {
    let t = TestApp::new().await;
    let token = t.register("alice").await;

    let (status, body) = t
        .send(json_request(
            "POST",
            "/api/iris",
            Some(&token),
            json!({"iris": [{"full_iri": "https://example.org/cmi5/extensions/score"}]}),
        ))
        .await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["iris"][0]["vocabulary_path"], "cmi5");
    assert_eq!(body["iris"][0]["term_type"], "extensions");
    assert_eq!(body["iris"][0]["term"], "score");
}

#[tokio::test]
async fn test_term_without_type_is_rejected_with_input() {
    let t = TestApp::new().await;
    let token = t.register("alice").await;
    let submission = json!({"iris": [{"vocabulary_path": "adl", "term_type": "", "term": "run"}]});

    let (status, body) = t
        .send(json_request("POST", "/api/iris", Some(&token), submission))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONSTRAINT_VIOLATION");
    assert_eq!(body["input"]["iris"][0]["term"], "run");
}

#[tokio::test]
async fn test_unknown_term_type_in_address_is_400() {
    let t = TestApp::new().await;
    let token = t.register("alice").await;

    let (status, body) = t
        .send(json_request(
            "POST",
            "/api/iris",
            Some(&token),
            json!({"iris": [{"full_iri": "https://example.org/adl/widgets/run"}]}),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_duplicate_tuple_is_409() {
    let t = TestApp::new().await;
    let token = t.register("alice").await;

    let (status, _) = t
        .send(json_request("POST", "/api/iris", Some(&token), adl_verbs_run()))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = t
        .send(json_request("POST", "/api/iris", Some(&token), adl_verbs_run()))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONSTRAINT_VIOLATION");
}

// =============================================================================
// Review workflow
// =============================================================================

#[tokio::test]
async fn test_non_admin_review_is_403() {
    let t = TestApp::new().await;
    let token = t.register("alice").await;
    t.send(json_request("POST", "/api/iris", Some(&token), adl_verbs_run()))
        .await;

    let (status, _) = t
        .send(json_request(
            "POST",
            "/api/admin/iris/review",
            Some(&token),
            json!({"vocabulary_path": "adl", "term_type": "verbs", "term": "run", "action": "accept"}),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.send(get_request("/api/admin/iris", Some(&token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.send(get_request("/api/admin/iris", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_accept_then_second_accept_is_404() {
    let t = TestApp::new().await;
    let token = t.register("alice").await;
    let admin = t.register_admin("root").await;
    t.send(json_request("POST", "/api/iris", Some(&token), adl_verbs_run()))
        .await;

    let (status, pending) = t.send(get_request("/api/admin/iris", Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending["iris"].as_array().unwrap().len(), 1);

    let mut rx = t.event_bus.subscribe();
    let review = json!({"vocabulary_path": "adl", "term_type": "verbs", "term": "run", "action": "accept"});

    let (status, body) = t
        .send(json_request("POST", "/api/admin/iris/review", Some(&admin), review.clone()))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["accepted"], true);
    assert_eq!(body["reviewed"], true);

    assert_eq!(rx.try_recv().unwrap().event_type(), "RedirectRequested");
    match rx.try_recv().unwrap() {
        VocabEvent::ReviewDecided { recipient_email, accepted, .. } => {
            assert_eq!(recipient_email.as_deref(), Some("alice@example.org"));
            assert!(accepted);
        }
        other => panic!("unexpected event {:?}", other),
    }

    let (status, body) = t
        .send(json_request("POST", "/api/admin/iris/review", Some(&admin), review))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, search) = t.send(get_request("/api/iris/search?q=run", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(search["total_results"], 1);
    assert_eq!(search["page"], 1);
    assert_eq!(search["results"][0]["full_iri"], "https://example.org/adl/verbs/run");
}

#[tokio::test]
async fn test_search_hides_pending() {
    let t = TestApp::new().await;
    let token = t.register("alice").await;
    t.send(json_request("POST", "/api/iris", Some(&token), adl_verbs_run()))
        .await;

    let (status, search) = t.send(get_request("/api/iris/search?q=adl", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(search["total_results"], 0);
    assert!(search["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_removed_user_leaves_ownerless_registrations() {
    let t = TestApp::new().await;
    let token = t.register("alice").await;
    t.send(json_request("POST", "/api/iris", Some(&token), adl_verbs_run()))
        .await;

    accounts::remove_user(&t.pool, "alice").await.unwrap();

    let iri = iris::find_by_address(&t.pool, "https://example.org/adl/verbs/run")
        .await
        .unwrap()
        .expect("registration should survive its owner");
    assert_eq!(iri.owner_id, None);

    let (status, _) = t.send(get_request("/api/iris/mine", Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Vocabulary metadata
// =============================================================================

#[tokio::test]
async fn test_csv_upload_example_row() {
    let t = TestApp::new().await;
    let token = t.register("alice").await;

    let response = t
        .app
        .clone()
        .oneshot(upload_request(&token, "terms.csv", EXAMPLE_ROW))
        .await
        .unwrap();
    let status = response.status();
    let body = extract_json(response.into_body()).await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["imported"], 1);
    assert_eq!(body["iris"][0]["full_iri"], "https://example.org/verbs/run");

    let iri = iris::find_by_address(&t.pool, "https://example.org/verbs/run")
        .await
        .unwrap()
        .unwrap();
    let data = vocabulary::find_by_base_iri(&t.pool, iri.guid)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(data.metadata.skos_pref_label, vec!["Run".to_string()]);
}

#[tokio::test]
async fn test_csv_upload_wrong_prefix_names_row() {
    let t = TestApp::new().await;
    let token = t.register("alice").await;
    let csv = format!(
        "{}\n{}\n",
        row_with("https://example.org/adl", ""),
        row_with("https://elsewhere.org/adl", "")
    );

    let (status, body) = t.send(upload_request(&token, "terms.csv", &csv)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "FORMAT_ERROR");
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.starts_with("Row 2:"), "{}", message);
    assert!(message.contains("https://elsewhere.org/adl"), "{}", message);
}

#[tokio::test]
async fn test_csv_upload_bad_date_persists_nothing() {
    let t = TestApp::new().await;
    let token = t.register("alice").await;
    let csv = format!(
        "{}\n{}\n",
        row_with("https://example.org/adl", "01/15/2020"),
        row_with("https://example.org/cmi5", "13/45/2020")
    );

    let (status, body) = t.send(upload_request(&token, "terms.csv", &csv)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("13/45/2020"));
    assert!(iris::find_by_address(&t.pool, "https://example.org/adl")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_csv_upload_requires_csv_name() {
    let t = TestApp::new().await;
    let token = t.register("alice").await;

    let (status, body) = t.send(upload_request(&token, "terms.txt", EXAMPLE_ROW)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "FORMAT_ERROR");
}

#[tokio::test]
async fn test_metadata_form_and_term_tags() {
    let t = TestApp::new().await;
    let token = t.register("alice").await;
    let (_, created) = t
        .send(json_request(
            "POST",
            "/api/iris",
            Some(&token),
            json!({"iris": [{"vocabulary_path": "adl"}]}),
        ))
        .await;
    let iri_id = created["iris"][0]["guid"].as_str().unwrap().to_string();

    let (status, data) = t
        .send(json_request(
            "POST",
            "/api/vocabularies",
            Some(&token),
            json!({"base_iri_id": iri_id, "rdf_type": "skos:ConceptScheme"}),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", data);
    let data_id = data["guid"].as_str().unwrap().to_string();

    let (status, again) = t
        .send(json_request(
            "POST",
            "/api/vocabularies",
            Some(&token),
            json!({"base_iri_id": iri_id}),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(again["input"]["base_iri_id"], iri_id.as_str());

    let (status, term_type) = t
        .send(json_request(
            "POST",
            &format!("/api/vocabularies/{}/term-types", data_id),
            Some(&token),
            json!({"name": "verbs"}),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let term_type_id = term_type["guid"].as_str().unwrap().to_string();

    let (status, _) = t
        .send(json_request(
            "POST",
            &format!("/api/term-types/{}/terms", term_type_id),
            Some(&token),
            json!({"name": "run"}),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, view) = t
        .send(get_request("/api/vocabulary-paths/adl", Some(&token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    let entry = &view["entries"][0];
    assert_eq!(entry["address"], "https://example.org/adl");
    assert_eq!(entry["rdf_type"], "skos:ConceptScheme");
    assert_eq!(entry["term_types"][0]["name"], "verbs");
    assert_eq!(entry["term_types"][0]["terms"][0]["name"], "run");
}

#[tokio::test]
async fn test_csv_imported_iri_can_be_reviewed() {
    let t = TestApp::new().await;
    let token = t.register("alice").await;
    let admin = t.register_admin("root").await;

    let (status, body) = t.send(upload_request(&token, "terms.csv", EXAMPLE_ROW)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["iris"][0]["vocabulary_path"], "verbs/run");

    let (status, body) = t
        .send(json_request(
            "POST",
            "/api/admin/iris/review",
            Some(&admin),
            json!({"vocabulary_path": "verbs/run", "action": "accept"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["full_iri"], "https://example.org/verbs/run");
    assert_eq!(body["accepted"], true);

    let (_, pending) = t.send(get_request("/api/admin/iris", Some(&admin))).await;
    assert!(pending["iris"].as_array().unwrap().is_empty());

    let (status, view) = t
        .send(get_request("/api/vocabulary-paths/verbs/run", Some(&token)))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", view);
    assert_eq!(view["vocabulary_path"], "verbs/run");
    assert_eq!(view["entries"][0]["address"], "https://example.org/verbs/run");
    assert_eq!(view["entries"][0]["skos_prefLabel"], json!(["Run"]));
}

#[tokio::test]
async fn test_address_variants_share_one_identity() {
    let t = TestApp::new().await;
    let alice = t.register("alice").await;
    let bob = t.register("bob").await;

    let (status, body) = t
        .send(json_request(
            "POST",
            "/api/iris",
            Some(&alice),
            json!({"iris": [{"full_iri": "https://example.org/adl/verbs/"}]}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "FORMAT_ERROR");

    let (status, _) = t
        .send(json_request(
            "POST",
            "/api/iris",
            Some(&alice),
            json!({"iris": [{"full_iri": "https://example.org/adl/verbs"}]}),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = t
        .send(json_request(
            "POST",
            "/api/iris",
            Some(&bob),
            json!({"iris": [{"vocabulary_path": "adl", "term_type": "verbs"}]}),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);

    let (_, bobs) = t.send(get_request("/api/iris/mine", Some(&bob))).await;
    assert!(bobs["iris"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_csv_upload_rejects_overlong_path() {
    let t = TestApp::new().await;
    let token = t.register("alice").await;
    let address = format!("https://example.org/{}", "x".repeat(80));

    let (status, body) = t
        .send(upload_request(&token, "terms.csv", &row_with(&address, "")))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "FORMAT_ERROR");
    assert!(body["error"]["message"].as_str().unwrap().starts_with("Row 1:"));
    assert!(iris::find_by_address(&t.pool, &address).await.unwrap().is_none());
}
