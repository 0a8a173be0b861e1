use std::{collections::HashMap, sync::Arc};

use super::*;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use shared::{
    domain::{PageSize, SortDirection, SortField, ViewMode},
    error::ErrorCode,
};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct ServerState {
    predict_bodies: Arc<Mutex<Vec<serde_json::Value>>>,
    list_queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

const PREDICT_BODY: &str = r#"{"predictions":{"2030":"Diabetes","2025":"Healthy","2035":2}}"#;

async fn handle_predict(
    State(state): State<ServerState>,
    Json(body): Json<serde_json::Value>,
) -> &'static str {
    state.predict_bodies.lock().await.push(body);
    PREDICT_BODY
}

async fn handle_list_patients(
    State(state): State<ServerState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<PatientPage> {
    let page: i64 = params
        .get("page")
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(1);
    state.list_queries.lock().await.push(params);
    Json(PatientPage {
        patients: vec![sample_patient(page * 100), sample_patient(page * 100 + 1)],
        total_pages: 4,
    })
}

async fn handle_fetch_patient(Path(id): Path<i64>) -> Result<Json<PatientRecord>, (StatusCode, &'static str)> {
    if id == 404 {
        return Err((StatusCode::NOT_FOUND, r#"{"detail":"Patient not found"}"#));
    }
    Ok(Json(sample_patient(id)))
}

fn sample_patient(id: i64) -> PatientRecord {
    PatientRecord {
        patient_id: PatientId(id),
        age: 52.0,
        bmi: 30.2,
        cholesterol: 210.5,
        blood_pressure: 135.0,
        glucose: 101.3,
    }
}

async fn spawn_dashboard_server() -> anyhow::Result<(String, ServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();
    let app = Router::new()
        .route("/predict", post(handle_predict))
        .route("/patients", get(handle_list_patients))
        .route("/patient/:id", get(handle_fetch_patient))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), state))
}

async fn spawn_raw_server(status: StatusCode, body: &'static str) -> anyhow::Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new()
        .route("/predict", post(move || async move { (status, body) }))
        .route("/patients", get(move || async move { (status, body) }));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

fn sample_request() -> PredictRequest {
    PredictRequest {
        cholesterol: 200.0,
        blood_pressure: 130.0,
        age: 45.0,
        glucose: 110.0,
        bmi: 27.0,
    }
}

#[tokio::test]
async fn predict_posts_biomarkers_and_keeps_year_order() {
    let (server_url, state) = spawn_dashboard_server().await.expect("spawn server");
    let client = DashboardClient::with_base_url(&server_url).expect("client");

    let timeline = client.predict(sample_request()).await.expect("predict");

    assert_eq!(
        timeline.into_entries(),
        vec![
            YearPrediction::new("2030", "Diabetes"),
            YearPrediction::new("2025", "Healthy"),
            YearPrediction::new("2035", "Heart Disease"),
        ]
    );
    let bodies = state.predict_bodies.lock().await;
    assert_eq!(
        bodies.as_slice(),
        &[serde_json::json!({
            "cholesterol": 200.0,
            "blood_pressure": 130.0,
            "age": 45.0,
            "glucose": 110.0,
            "bmi": 27.0,
        })]
    );
}

#[tokio::test]
async fn list_patients_sends_wire_query_parameters() {
    let (server_url, state) = spawn_dashboard_server().await.expect("spawn server");
    let client = DashboardClient::with_base_url(&server_url).expect("client");

    let page = client
        .list_patients(ListQuery {
            page: 2,
            page_size: PageSize::Thirty,
            sort_by: SortField::BloodPressure,
            sort_dir: SortDirection::Desc,
            q: Some("4 2".to_string()),
        })
        .await
        .expect("list");
    assert_eq!(page.total_pages, 4);
    assert_eq!(page.patients[0].patient_id, PatientId(200));

    client
        .list_patients(ListQuery::default())
        .await
        .expect("list default");

    let queries = state.list_queries.lock().await;
    let expected: HashMap<String, String> = [
        ("page", "2"),
        ("page_size", "30"),
        ("sort_by", "blood_pressure"),
        ("sort_dir", "desc"),
        ("q", "4 2"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    assert_eq!(queries[0], expected);
    assert!(!queries[1].contains_key("q"));
    assert_eq!(queries[1].get("page_size").map(String::as_str), Some("15"));
}

#[tokio::test]
async fn fetch_patient_reads_single_record() {
    let (server_url, _state) = spawn_dashboard_server().await.expect("spawn server");
    let client = DashboardClient::with_base_url(&format!("{server_url}/"))
        .expect("client");

    let record = client.fetch_patient(PatientId(7)).await.expect("fetch");

    assert_eq!(record, sample_patient(7));
}

#[tokio::test]
async fn error_status_surfaces_server_detail() {
    let (server_url, _state) = spawn_dashboard_server().await.expect("spawn server");
    let client = DashboardClient::with_base_url(&server_url).expect("client");

    let err = client
        .fetch_patient(PatientId(404))
        .await
        .expect_err("must fail");

    assert_eq!(
        err,
        ClientError::Server {
            status: 404,
            code: ErrorCode::NotFound,
            message: "Patient not found".to_string(),
        }
    );
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server_url = spawn_raw_server(StatusCode::OK, r#"{"patients":"nope"}"#)
        .await
        .expect("spawn server");
    let client = DashboardClient::with_base_url(&server_url).expect("client");

    let err = client
        .list_patients(ListQuery::default())
        .await
        .expect_err("must fail");

    match err {
        ClientError::Decode { context, .. } => assert_eq!(context, "patient list"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn predict_accepts_bare_year_map_with_class_codes() {
    let server_url = spawn_raw_server(StatusCode::OK, r#"{"2025":0,"2030":1}"#)
        .await
        .expect("spawn server");
    let client = DashboardClient::with_base_url(&server_url).expect("client");

    let timeline = client.predict(sample_request()).await.expect("predict");

    assert_eq!(
        timeline.into_entries(),
        vec![
            YearPrediction::new("2025", "Healthy"),
            YearPrediction::new("2030", "Diabetes"),
        ]
    );
}

#[tokio::test]
async fn server_failure_is_retryable() {
    let server_url = spawn_raw_server(StatusCode::INTERNAL_SERVER_ERROR, "model not loaded")
        .await
        .expect("spawn server");
    let client = DashboardClient::with_base_url(&server_url).expect("client");

    let err = client.predict(sample_request()).await.expect_err("must fail");

    assert_eq!(
        err,
        ClientError::Server {
            status: 500,
            code: ErrorCode::Internal,
            message: "model not loaded".to_string(),
        }
    );
    assert!(err.is_retryable());
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let client = DashboardClient::with_base_url(&format!("http://{addr}")).expect("client");

    let err = client.predict(sample_request()).await.expect_err("must fail");

    assert!(matches!(err, ClientError::Transport(_)), "{err:?}");
}

#[test]
fn invalid_base_url_is_a_config_error() {
    let err = DashboardClient::with_base_url("http://exa mple.org").expect_err("must fail");
    assert!(matches!(err, ClientError::Config(_)));
}

#[tokio::test]
async fn controllers_drive_the_http_client_end_to_end() {
    let (server_url, state) = spawn_dashboard_server().await.expect("spawn server");
    let client = Arc::new(DashboardClient::with_base_url(&server_url).expect("client"));

    let listing = PatientListController::new(client.clone());
    listing.reload().await.expect("first page");
    listing.set_page(3).await.expect("third page");
    listing.set_view_mode(ViewMode::Card).await;

    let snapshot = listing.snapshot().await;
    assert_eq!(snapshot.total_pages, 4);
    assert_eq!(snapshot.query.page, 3);
    assert_eq!(
        snapshot
            .patients
            .iter()
            .map(|patient| patient.patient_id)
            .collect::<Vec<_>>(),
        vec![PatientId(300), PatientId(301)]
    );
    assert_eq!(state.list_queries.lock().await.len(), 2);

    let form = PredictionFormController::new(client);
    form.update_field(shared::domain::BiomarkerField::Age, "45").await;
    form.update_field(shared::domain::BiomarkerField::Cholesterol, "200").await;
    form.update_field(shared::domain::BiomarkerField::BloodPressure, "130").await;
    form.update_field(shared::domain::BiomarkerField::Glucose, "110").await;
    form.update_field(shared::domain::BiomarkerField::Bmi, "27").await;
    assert_eq!(form.submit().await, Ok(Outcome::Applied));
    assert_eq!(form.predictions().await.len(), 3);
}
