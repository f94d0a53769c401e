//! HTTP tests driving the router directly with `oneshot`.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use hackboard_grader::{Grader, GraderConfig};
use hackboard_leaderboard::{
    build_router, AppState, LeaderboardEntry, LeaderboardService, MemoryStorage, Submission,
};
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "hackboard-test-boundary";
const PERFECT: &str = "newsgroup\nsci.space\nrec.autos\nsci.med\n";

fn test_service(limit: u32) -> Arc<LeaderboardService> {
    let grader = Grader::from_reference(
        &["sci.space", "rec.autos", "sci.med"],
        GraderConfig::default(),
    )
    .unwrap();
    let service = LeaderboardService::new(
        Arc::new(MemoryStorage::new()),
        Arc::new(grader),
        "production",
        limit,
    );
    service.register_team("alpha", Some("alpha-key")).unwrap();
    Arc::new(service)
}

fn router(service: Arc<LeaderboardService>) -> Router {
    build_router(AppState::new(service, 1024 * 1024))
}

fn multipart_body(team_key: &str, csv: &str) -> String {
    format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"team_key\"\r\n\r\n{team_key}\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"submission\"; filename=\"predictions.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n{csv}\r\n--{b}--\r\n",
        b = BOUNDARY
    )
}

fn upload(uri: &str, team_key: &str, csv: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(team_key, csv)))
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn form_submission_redirects_to_leaderboard() {
    let service = test_service(5);
    let response = router(service.clone())
        .oneshot(upload("/submit", "alpha-key", PERFECT))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");

    let page = router(service)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(page.status(), StatusCode::OK);
    let html = body_string(page).await;
    assert!(html.contains("alpha"));
    assert!(html.contains("1.00000"));
    assert!(!html.contains("alpha-key"));
}

#[tokio::test]
async fn form_submission_shows_grading_error() {
    let service = test_service(5);
    let response = router(service.clone())
        .oneshot(upload("/submit", "alpha-key", "newsgroup\nsci.space\nalt.atheism\nsci.med\n"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let html = body_string(response).await;
    assert!(html.contains("Label 1 (alt.atheism) is not a valid label."));
    assert!(service.leaderboard().unwrap().is_empty());
}

#[tokio::test]
async fn form_submission_unknown_team() {
    let response = router(test_service(5))
        .oneshot(upload("/submit", "wrong-key", PERFECT))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(body_string(response).await.contains("Team Key not found"));
}

#[tokio::test]
async fn api_submission_respects_limit() {
    let service = test_service(1);

    let first = router(service.clone())
        .oneshot(upload("/api/submissions", "alpha-key", PERFECT))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let submission: Submission = serde_json::from_str(&body_string(first).await).unwrap();
    assert_eq!(submission.number, 1);
    assert_eq!(submission.score, 1.0);

    let second = router(service)
        .oneshot(upload("/api/submissions", "alpha-key", PERFECT))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: serde_json::Value = serde_json::from_str(&body_string(second).await).unwrap();
    assert!(body["error"].as_str().unwrap().contains("Submission count exceeded"));
}

#[tokio::test]
async fn api_leaderboard_and_history() {
    let service = test_service(5);
    service.submit("alpha-key", PERFECT.as_bytes()).unwrap();

    let response = router(service.clone())
        .oneshot(
            Request::builder()
                .uri("/api/leaderboard")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let board: Vec<LeaderboardEntry> =
        serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].team_name, "alpha");
    assert_eq!(board[0].rank, 1);

    let response = router(service.clone())
        .oneshot(
            Request::builder()
                .uri("/api/teams/1/submissions")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let history: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(history["submissions"].as_array().unwrap().len(), 1);
    assert!(history["team"].get("key").is_none());

    let missing = router(service)
        .oneshot(
            Request::builder()
                .uri("/api/teams/42/submissions")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_file_is_rejected() {
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"team_key\"\r\n\r\nalpha-key\r\n--{b}--\r\n",
        b = BOUNDARY
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/submissions")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = router(test_service(5)).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response).await.contains("Submission file is required"));
}

#[tokio::test]
async fn health_reports_grader_shape() {
    let response = router(test_service(5))
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let health: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["expected_rows"], 3);
    assert_eq!(health["classes"], 3);
    assert_eq!(health["averaging"], "macro");
    assert_eq!(health["submission_limit"], 5);
}

#[tokio::test]
async fn submit_form_page_renders() {
    let response = router(test_service(5))
        .oneshot(Request::builder().uri("/submit").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("name=\"team_key\""));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_uploads_stop_at_limit() {
    let service = test_service(2);
    let app = router(service.clone());

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move {
                app.oneshot(upload("/api/submissions", "alpha-key", PERFECT))
                    .await
                    .unwrap()
                    .status()
            })
        })
        .collect();

    let mut accepted = 0;
    let mut limited = 0;
    for task in tasks {
        match task.await.unwrap() {
            StatusCode::OK => accepted += 1,
            StatusCode::TOO_MANY_REQUESTS => limited += 1,
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(accepted, 2);
    assert_eq!(limited, 6);
    assert_eq!(service.leaderboard().unwrap()[0].submissions, 2);
}
