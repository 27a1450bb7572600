use std::sync::Arc;

use coursecat_db_memory::InMemoryStorage;
use coursecat_server::import::{self, ImportError};
use coursecat_server::{AppConfig, AppState, CourseService, LocalCache, build_router};
use coursecat_storage::SearchQuery;
use reqwest::{Client, StatusCode, multipart};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

const CSV: &str = "\
course_id,title,description,category,instructor,duration,price,rating,skill_level
cs101,Intro to CS,Programs and data,Computer Science,Grace Hopper,12 weeks,Free,4.2,beginner
cs201,Data Structures,Trees and graphs,Computer Science,Edsger Dijkstra,10 weeks,$49,4.7,Intermediate
cs301,Compilers,,Computer Science,Frances Allen,14 weeks,$99,nine,advanced
cs101,Intro again,,Computer Science,Grace Hopper,,,3.1,beginner
,Nameless,,Computer Science,Nobody,,,2.0,beginner
";

fn service() -> CourseService {
    CourseService::new(Arc::new(InMemoryStorage::new()), Arc::new(LocalCache::new()))
}

#[tokio::test]
async fn import_reports_every_row() {
    let service = service();
    let report = import::import_csv(&service, CSV.as_bytes(), 100).await.unwrap();

    assert_eq!(report.total_rows, 5);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.duplicate_ids, vec!["cs101"]);

    let rows: Vec<usize> = report.errors.iter().map(|e| e.row).collect();
    assert_eq!(rows, vec![3, 5]);

    let first = service.get_course("cs101").await.unwrap().value;
    assert_eq!(first.title, "Intro to CS");
    assert_eq!(first.rating, 4.2);
    assert!(service.get_course("cs301").await.is_err());
}

#[tokio::test]
async fn import_invalidates_cached_searches() {
    let service = service();
    let query = SearchQuery::new("data structures");
    let before = service.search(&query).await.unwrap();
    assert_eq!(before.value.pagination.total, 0);
    assert!(service.search(&query).await.unwrap().cached);

    import::import_csv(&service, CSV.as_bytes(), 100).await.unwrap();

    let after = service.search(&query).await.unwrap();
    assert!(!after.cached);
    assert_eq!(after.value.courses[0].course_id, "cs201");
}

#[tokio::test]
async fn rejected_files_insert_nothing() {
    let service = service();

    let err = import::import_csv(&service, b"title,category\nIntro,CS\n", 100)
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::MissingColumns(_)));

    let err = import::import_csv(&service, CSV.as_bytes(), 2).await.unwrap_err();
    assert!(matches!(err, ImportError::TooManyRows { max: 2 }));

    let stats = service.stats().await.unwrap();
    assert_eq!(stats.value.total_courses, 0);
}

async fn start_server() -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    let mut cfg = AppConfig::default();
    cfg.storage.backend = "memory".into();
    cfg.auth.admin_password = Some("import-admin-pass".into());
    cfg.auth.jwt_secret = Some("fedcba9876543210fedcba9876543210".into());

    let state = AppState::new(
        &cfg,
        Arc::new(InMemoryStorage::new()),
        Arc::new(LocalCache::new()),
    )
    .expect("build state");
    let app = build_router(state, cfg.server.body_limit_bytes);

    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    (format!("http://{addr}"), tx, server)
}

fn csv_form(content: &str) -> multipart::Form {
    let part = multipart::Part::bytes(content.as_bytes().to_vec())
        .file_name("courses.csv")
        .mime_str("text/csv")
        .unwrap();
    multipart::Form::new().part("file", part)
}

#[tokio::test]
async fn multipart_upload() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = Client::new();

    let token: Value = client
        .post(format!("{base}/api/auth/login"))
        .json(&json!({ "username": "admin", "password": "import-admin-pass" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let token = token["token"].as_str().unwrap().to_string();

    // Needs a token like every other write
    let resp = client
        .post(format!("{base}/api/courses/import"))
        .multipart(csv_form(CSV))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client
        .post(format!("{base}/api/courses/import"))
        .bearer_auth(&token)
        .multipart(csv_form(CSV))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["total_rows"], 5);
    assert_eq!(body["data"]["inserted"], 2);
    assert_eq!(body["data"]["duplicates"], 1);
    assert_eq!(body["data"]["errors"].as_array().unwrap().len(), 2);

    // Missing file field
    let form = multipart::Form::new().text("note", "no file here");
    let resp = client
        .post(format!("{base}/api/courses/import"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["violations"][0]["field"], "file");

    // Header without required columns
    let resp = client
        .post(format!("{base}/api/courses/import"))
        .bearer_auth(&token)
        .multipart(csv_form("title\nIntro\n"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}
