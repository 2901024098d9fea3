//! HTTP tests for the push webhook endpoint

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use git2::Repository;
use tempfile::TempDir;

use crate::config::RepositoryConfig;
use crate::handlers::configure_webhook_routes;
use crate::services::directory::CheckoutDirectory;
use crate::services::testutil::{commit_files, fixture_remote, FIXTURE_BRANCH};
use crate::services::webhook::{sign_push_body, SIGNATURE_HEADER};
use crate::AppState;

const SECRET: &str = "webhook-secret";

struct Fixture {
    remote: TempDir,
    _data_dir: TempDir,
    url: String,
    state: web::Data<AppState>,
}

fn fixture() -> Fixture {
    let remote = fixture_remote();
    let data_dir = tempfile::tempdir().expect("data dir");
    let url = remote.path().to_str().expect("utf8 path").to_string();
    let directory = CheckoutDirectory::open(
        data_dir.path(),
        &[RepositoryConfig {
            url: url.clone(),
            name: Some("repo".to_string()),
            private_key: None,
            passphrase: None,
            public: false,
            depth: None,
        }],
    )
    .expect("open directory");
    let state = web::Data::new(AppState {
        directory: Arc::new(directory),
        access_gate: None,
        webhook_secret: Some(SECRET.to_string()),
    });
    Fixture {
        remote,
        _data_dir: data_dir,
        url,
        state,
    }
}

macro_rules! test_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data($state.clone())
                .configure(configure_webhook_routes),
        )
        .await
    };
}

fn push_body(ssh_url: &str) -> Vec<u8> {
    serde_json::json!({ "repository": { "ssh_url": ssh_url } })
        .to_string()
        .into_bytes()
}

#[actix_web::test]
async fn verified_push_refreshes_the_checkout() {
    let fixture = fixture();
    let app = test_app!(fixture.state);

    let repo = Repository::open(fixture.remote.path()).expect("open remote");
    commit_files(&repo, FIXTURE_BRANCH, &[("hooked.txt", b"hooked\n")]);

    let body = push_body(&fixture.url);
    let req = test::TestRequest::post()
        .uri("/public/github/webhook")
        .insert_header((SIGNATURE_HEADER, sign_push_body(SECRET.as_bytes(), &body)))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let files = fixture
        .state
        .directory
        .get("repo")
        .expect("alias")
        .ls_files(FIXTURE_BRANCH)
        .expect("ls files");
    assert!(files.contains(&"hooked.txt".to_string()));
}

#[actix_web::test]
async fn bad_signature_is_403() {
    let fixture = fixture();
    let app = test_app!(fixture.state);

    let body = push_body(&fixture.url);
    let req = test::TestRequest::post()
        .uri("/public/github/webhook")
        .insert_header((SIGNATURE_HEADER, sign_push_body(b"wrong-secret", &body)))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let body = push_body(&fixture.url);
    let req = test::TestRequest::post()
        .uri("/public/github/webhook")
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn malformed_and_unknown_events_are_400() {
    let fixture = fixture();
    let app = test_app!(fixture.state);

    let body = b"not json".to_vec();
    let req = test::TestRequest::post()
        .uri("/public/github/webhook")
        .insert_header((SIGNATURE_HEADER, sign_push_body(SECRET.as_bytes(), &body)))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body = push_body("git@example.com:unknown/repo.git");
    let req = test::TestRequest::post()
        .uri("/public/github/webhook")
        .insert_header((SIGNATURE_HEADER, sign_push_body(SECRET.as_bytes(), &body)))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body = br#"{"ref": "refs/heads/master"}"#.to_vec();
    let req = test::TestRequest::post()
        .uri("/public/github/webhook")
        .insert_header((SIGNATURE_HEADER, sign_push_body(SECRET.as_bytes(), &body)))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn failing_refresh_is_500() {
    let fixture = fixture();
    let app = test_app!(fixture.state);

    let remote_path = fixture.remote.path().to_path_buf();
    drop(fixture.remote);
    assert!(!remote_path.exists());

    let body = push_body(&fixture.url);
    let req = test::TestRequest::post()
        .uri("/public/github/webhook")
        .insert_header((SIGNATURE_HEADER, sign_push_body(SECRET.as_bytes(), &body)))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn unconfigured_secret_disables_the_endpoint() {
    let fixture = fixture();
    let state = web::Data::new(AppState {
        directory: fixture.state.directory.clone(),
        access_gate: None,
        webhook_secret: None,
    });
    let app = test_app!(state);

    let body = push_body(&fixture.url);
    let req = test::TestRequest::post()
        .uri("/public/github/webhook")
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
