use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use draftsync_core::{DraftRecord, FormType, SubjectId};
use draftsync_crypto::{EnvelopeAead, LocalKek, parse_master_key};
use draftsync_lifecycle::{BucketConfig, EnvelopeCryptoStore, InfraProvisioner, LifecycleMetrics};
use draftsync_provider::{
    BucketNotification, IamPolicy, InfraAdmin, MemoryObjectStore, NotificationRequest,
    ProviderError,
};
use draftsync_server::api::{AppState, router};
use draftsync_state::{DraftStore, DraftTransaction};
use draftsync_state_memory::MemoryDraftStore;

const SUBJECT: &str = "01017012345";

// -- Read-only admin double -----------------------------------------------

struct StaticAdmin;

#[async_trait]
impl InfraAdmin for StaticAdmin {
    async fn list_topics(&self, project_id: &str) -> Result<Vec<String>, ProviderError> {
        Ok(vec![format!("projects/{project_id}/topics/drafts-events")])
    }

    async fn create_topic(&self, _topic_path: &str) -> Result<(), ProviderError> {
        unreachable!("describe never creates")
    }

    async fn list_topic_subscriptions(&self, topic_path: &str) -> Result<Vec<String>, ProviderError> {
        Ok(vec![format!("{}-sub", topic_path.replace("/topics/", "/subscriptions/"))])
    }

    async fn create_pull_subscription(
        &self,
        _subscription_path: &str,
        _topic_path: &str,
        _ack_deadline_seconds: u32,
    ) -> Result<(), ProviderError> {
        unreachable!("describe never creates")
    }

    async fn get_topic_policy(&self, _topic_path: &str) -> Result<IamPolicy, ProviderError> {
        Ok(IamPolicy::default())
    }

    async fn set_topic_policy(
        &self,
        _topic_path: &str,
        policy: &IamPolicy,
    ) -> Result<IamPolicy, ProviderError> {
        Ok(policy.clone())
    }

    async fn storage_service_account(&self, project_id: &str) -> Result<String, ProviderError> {
        Ok(format!("service-{project_id}@gs-project-accounts.iam.gserviceaccount.com"))
    }

    async fn list_notifications(&self, _bucket: &str) -> Result<Vec<BucketNotification>, ProviderError> {
        Ok(Vec::new())
    }

    async fn create_notification(
        &self,
        _bucket: &str,
        _request: &NotificationRequest,
    ) -> Result<BucketNotification, ProviderError> {
        unreachable!("describe never creates")
    }
}

// -- Helpers --------------------------------------------------------------

fn build_state(store: Arc<MemoryDraftStore>, provisioner: Option<Arc<InfraProvisioner>>) -> AppState {
    let key = parse_master_key(&"17".repeat(32)).unwrap();
    let aead = Arc::new(EnvelopeAead::new(Arc::new(LocalKek::new(key))));
    AppState {
        metrics: Arc::new(LifecycleMetrics::default()),
        store,
        drafts: Arc::new(EnvelopeCryptoStore::new(
            Arc::new(MemoryObjectStore::new()),
            aead,
            "drafts",
        )),
        provisioner,
        bucket: Arc::new(BucketConfig::for_bucket("proj", "drafts")),
    }
}

fn test_state() -> AppState {
    build_state(Arc::new(MemoryDraftStore::new()), None)
}

fn request(method: &str, uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-subject-id", SUBJECT)
        .body(body)
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

// -- Tests ----------------------------------------------------------------

#[tokio::test]
async fn health_reports_metrics() {
    let state = test_state();
    state.metrics.increment_received();

    let response = router(state)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["metrics"]["received"], 1);
}

#[tokio::test]
async fn draft_put_get_delete() {
    let app = router(test_state());

    let response = app
        .clone()
        .oneshot(request("PUT", "/drafts/standard", Body::from("{\"step\":2}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["draftId"].as_str().unwrap().parse::<uuid::Uuid>().is_ok());

    let response = app
        .clone()
        .oneshot(request("GET", "/drafts/STANDARD", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"{\"step\":2}");

    let response = app
        .clone()
        .oneshot(request("DELETE", "/drafts/standard", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(request("GET", "/drafts/standard", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn drafts_are_scoped_to_the_subject() {
    let app = router(test_state());
    app.clone()
        .oneshot(request("PUT", "/drafts/abroad", Body::from("mine")))
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::get("/drafts/abroad")
                .header("x-subject-id", "02028054321")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_subject_is_rejected() {
    let response = router(test_state())
        .oneshot(Request::get("/drafts/standard").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("x-subject-id"));
}

#[tokio::test]
async fn unknown_form_is_rejected() {
    let response = router(test_state())
        .oneshot(request("PUT", "/drafts/pension", Body::from("x")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_without_draft_is_not_found() {
    let response = router(test_state())
        .oneshot(request("DELETE", "/drafts/abroad", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_reflects_open_record() {
    let store = Arc::new(MemoryDraftStore::new());
    let draft_id = uuid::Uuid::new_v4();
    let mut tx = store.begin().await.unwrap();
    tx.insert(&DraftRecord::created(
        SubjectId::parse(SUBJECT).unwrap(),
        FormType::Standard,
        draft_id,
    ))
    .await
    .unwrap();
    tx.commit().await.unwrap();
    let app = router(build_state(store, None));

    let json = body_json(
        app.clone()
            .oneshot(request("GET", "/drafts/standard/status", Body::empty()))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(json["formType"], "STANDARD");
    assert_eq!(json["open"], true);
    assert_eq!(json["draftId"], draft_id.to_string());

    let json = body_json(
        app.oneshot(request("GET", "/drafts/abroad/status", Body::empty()))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(json["open"], false);
    assert!(json.get("draftId").is_none());
}

fn upload(content_type: &str, filename: Option<&str>, body: &'static [u8]) -> Request<Body> {
    let mut builder = Request::post("/attachments")
        .header("x-subject-id", SUBJECT)
        .header("content-type", content_type);
    if let Some(name) = filename {
        builder = builder.header("x-filename", name);
    }
    builder.body(Body::from(body)).unwrap()
}

#[tokio::test]
async fn attachment_upload_download_delete() {
    let app = router(test_state());

    let response = app
        .clone()
        .oneshot(upload("application/pdf", Some("payslip.pdf"), b"%PDF-1.7"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = body_json(response).await["id"].as_str().unwrap().to_owned();
    assert!(id.parse::<uuid::Uuid>().is_ok());

    let response = app
        .clone()
        .oneshot(request("GET", &format!("/attachments/{id}"), Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/pdf");
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"payslip.pdf\""
    );
    assert_eq!(body_bytes(response).await, b"%PDF-1.7");

    let response = app
        .clone()
        .oneshot(request("DELETE", &format!("/attachments/{id}"), Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(request("GET", &format!("/attachments/{id}"), Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn attachment_of_unaccepted_type_is_rejected() {
    let response = router(test_state())
        .oneshot(upload("text/html", None, b"<html></html>"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn attachments_are_scoped_to_the_subject() {
    let app = router(test_state());
    let response = app
        .clone()
        .oneshot(upload("image/png", None, b"png"))
        .await
        .unwrap();
    let id = body_json(response).await["id"].as_str().unwrap().to_owned();

    let response = app
        .oneshot(
            Request::get(format!("/attachments/{id}"))
                .header("x-subject-id", "02028054321")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn attachment_routes_do_not_reach_drafts() {
    let app = router(test_state());
    app.clone()
        .oneshot(request("PUT", "/drafts/standard", Body::from("draft")))
        .await
        .unwrap();

    let response = app
        .oneshot(request("GET", "/attachments/STANDARD", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_without_provisioner_is_unavailable() {
    let response = router(test_state())
        .oneshot(Request::get("/admin/iac").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn admin_describes_sections() {
    let provisioner = Arc::new(InfraProvisioner::new(Arc::new(StaticAdmin)));
    let app = router(build_state(Arc::new(MemoryDraftStore::new()), Some(provisioner)));

    let json = body_json(
        app.clone()
            .oneshot(Request::get("/admin/iac").body(Body::empty()).unwrap())
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(json["topics"], serde_json::json!(["drafts-events"]));
    assert_eq!(
        json["subscriptions"]["drafts-events"],
        serde_json::json!(["drafts-events-sub"])
    );
    assert_eq!(json["notifications"], serde_json::json!([]));

    let json = body_json(
        app.oneshot(Request::get("/admin/iac/topics").body(Body::empty()).unwrap())
            .await
            .unwrap(),
    )
    .await;
    assert!(json.get("subscriptions").is_none());
    assert!(json.get("notifications").is_none());
}
