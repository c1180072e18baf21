#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use actix_http::Request;
use actix_web::body::{self, MessageBody};
use actix_web::dev::{Service, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use serde_json::{json, Value};

use tripmates_api::db::memory::MemoryStore;
use tripmates_api::middleware::auth::generate_token;
use tripmates_api::routes;
use tripmates_api::services::email_service::EmailService;
use tripmates_api::services::gemini::{AiError, GeneratedImage, Generative};
use tripmates_api::state::AppState;

pub const SECRET: &str = "integration-test-secret";

/// Scripted stand-in for the generative API. Replies are consumed in order;
/// an empty queue behaves like an outage.
#[derive(Clone, Default)]
pub struct StubModel {
    json_replies: Arc<Mutex<VecDeque<Result<Value, AiError>>>>,
    text_replies: Arc<Mutex<VecDeque<String>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl StubModel {
    pub fn push_json(&self, reply: Value) {
        self.json_replies.lock().unwrap().push_back(Ok(reply));
    }

    pub fn push_failure(&self, error: AiError) {
        self.json_replies.lock().unwrap().push_back(Err(error));
    }

    pub fn push_text(&self, reply: &str) {
        self.text_replies.lock().unwrap().push_back(reply.to_string());
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn outage() -> AiError {
        AiError::Api {
            status: 503,
            message: "The model is overloaded. Please try again later.".to_string(),
        }
    }
}

impl Generative for StubModel {
    async fn generate_json(&self, prompt: &str, _schema: &Value) -> Result<Value, AiError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.json_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::outage()))
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, AiError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.text_replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(Self::outage)
    }

    async fn generate_image(&self, _prompt: &str) -> Result<GeneratedImage, AiError> {
        Ok(GeneratedImage {
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
            mime_type: "image/png".to_string(),
        })
    }
}

pub struct TestApp {
    pub state: web::Data<AppState<MemoryStore, StubModel>>,
    pub ai: StubModel,
}

impl TestApp {
    pub fn new() -> Self {
        let ai = StubModel::default();
        let state = AppState::new(
            MemoryStore::new(),
            ai.clone(),
            None,
            EmailService::new("invites@example.com", "http://localhost:3000"),
        );
        Self {
            state: web::Data::new(state),
            ai,
        }
    }

    pub fn create_app(
        &self,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new()
            .app_data(self.state.clone())
            .route(
                "/health",
                web::get().to(routes::health::health_check::<MemoryStore, StubModel>),
            )
            .configure(|cfg| routes::configure::<MemoryStore, StubModel>(cfg, SECRET))
    }
}

pub fn bearer(user: &str) -> (header::HeaderName, String) {
    bearer_with_role(user, None)
}

pub fn admin_bearer(user: &str) -> (header::HeaderName, String) {
    bearer_with_role(user, Some("admin"))
}

fn bearer_with_role(user: &str, role: Option<&str>) -> (header::HeaderName, String) {
    let token = generate_token(SECRET, user, &email(user), Some(user), role).unwrap();
    (header::AUTHORIZATION, format!("Bearer {}", token))
}

pub fn email(user: &str) -> String {
    format!("{}@example.com", user)
}

/// Calls the app and decodes the JSON body, including middleware rejections.
pub async fn send<S, B>(app: &S, req: Request) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let (status, bytes) = match test::try_call_service(app, req).await {
        Ok(resp) => {
            let status = resp.status();
            (status, test::read_body(resp).await)
        }
        Err(err) => {
            let resp = err.error_response();
            let status = resp.status();
            (status, body::to_bytes(resp.into_body()).await.unwrap())
        }
    };
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

/// Creates a trip owned by `owner` with everyone in `members` invited and joined.
pub async fn trip_with_members<S, B>(app: &S, owner: &str, members: &[&str]) -> String
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let invited: Vec<String> = members.iter().map(|m| email(m)).collect();
    let req = test::TestRequest::post()
        .uri("/api/trips")
        .insert_header(bearer(owner))
        .set_json(json!({
            "name": "Lisbon long weekend",
            "destination": "Lisbon",
            "start_date": "2026-06-05",
            "end_date": "2026-06-07",
            "invited_emails": invited,
        }))
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let trip_id = body["data"]["_id"].as_str().unwrap().to_string();

    for member in members {
        let req = test::TestRequest::post()
            .uri(&format!("/api/trips/{}/join", trip_id))
            .insert_header(bearer(member))
            .to_request();
        let (status, body) = send(app, req).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
    }
    trip_id
}

pub async fn add_activity<S, B>(app: &S, trip_id: &str, user: &str, name: &str) -> String
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri(&format!("/api/trips/{}/activities", trip_id))
        .insert_header(bearer(user))
        .set_json(json!({
            "name": name,
            "location": "Lisbon",
            "duration_minutes": 90,
        }))
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["data"]["_id"].as_str().unwrap().to_string()
}

pub async fn vote<S, B>(
    app: &S,
    trip_id: &str,
    activity_id: &str,
    user: &str,
    liked: bool,
) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::put()
        .uri(&format!(
            "/api/trips/{}/activities/{}/vote",
            trip_id, activity_id
        ))
        .insert_header(bearer(user))
        .set_json(json!({ "liked": liked }))
        .to_request();
    send(app, req).await
}
