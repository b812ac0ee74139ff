use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use edu_access::{
    InMemoryIdentityProvider, InMemoryPortalPreferences, PortalRegistry, RouteTable, UnmatchedRolePolicy, PORTALS,
};
use edu_common::{Role, User};
use edu_enrollment::infrastructure::{
    InMemoryCourseCatalog, InMemoryRecordStore, InMemoryStudentDirectory, NoOpEventPublisher, ScriptedGateway,
    ScriptedResponse,
};
use edu_enrollment::{
    BatchEnrollmentPayment, Course, Enrollment, EnrollmentConfig, EnrollmentService, ServicePorts,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use crate::{build_router, webhook, AppState};

const SECRET: &str = "webhook-secret";

struct TestApp {
    router: Router,
    identity: InMemoryIdentityProvider,
    gateway: Arc<ScriptedGateway>,
    tenant: Uuid,
    course_id: Uuid,
}

impl TestApp {
    fn new() -> Self {
        let tenant = Uuid::new_v4();
        let course_id = Uuid::new_v4();

        let catalog = InMemoryCourseCatalog::new();
        catalog.add_course(Course {
            id: course_id,
            tenant_id: tenant,
            name: "Pedagogia".into(),
        });

        let gateway = Arc::new(ScriptedGateway::new());
        let ports = ServicePorts {
            enrollments: Arc::new(InMemoryRecordStore::<Enrollment>::new()),
            batches: Arc::new(InMemoryRecordStore::<BatchEnrollmentPayment>::new()),
            courses: Arc::new(catalog),
            students: Arc::new(InMemoryStudentDirectory::new()),
            gateway: gateway.clone(),
            events: Arc::new(NoOpEventPublisher),
        };
        let service = EnrollmentService::new(ports, &EnrollmentConfig::default()).unwrap();
        let identity = InMemoryIdentityProvider::new();

        let state = AppState {
            enrollments: Arc::new(service),
            identity: Arc::new(identity.clone()),
            portals: Arc::new(PortalRegistry::new(UnmatchedRolePolicy::Reject)),
            routes: Arc::new(RouteTable::from_portals(&PORTALS)),
            preferences: Arc::new(InMemoryPortalPreferences::new()),
            cookie_name: "session".into(),
            webhook_secret: SECRET.into(),
        };

        Self {
            router: build_router(state),
            identity,
            gateway,
            tenant,
            course_id,
        }
    }

    /// Cookie header for a fresh user of `role` in `tenant`
    fn login_in(&self, role: Role, tenant: Uuid) -> String {
        let mut user = User::new(role, tenant);
        user.email = format!("{}@escola.example", user.id);
        let credential = self.identity.with_session(user);
        format!("theme=dark; session={}", credential.as_str())
    }

    fn login(&self, role: Role) -> String {
        self.login_in(role, self.tenant)
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    async fn post(&self, uri: &str, cookie: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::COOKIE, cookie)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn webhook(&self, body: Value, signature: Option<String>) -> (StatusCode, Value) {
        let payload = body.to_string();
        let mut request = Request::builder()
            .method(Method::POST)
            .uri("/webhooks/payments")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(signature) = signature {
            request = request.header(webhook::SIGNATURE_HEADER, signature);
        }
        self.send(request.body(Body::from(payload)).unwrap()).await
    }

    fn enrollment_body(&self) -> Value {
        json!({
            "courseId": self.course_id,
            "studentName": "Maria da Silva",
            "studentEmail": "maria@example.com",
            "studentCpf": "529.982.247-25",
            "amount": 15000,
            "installments": 3,
            "paymentMethod": "CREDIT_CARD"
        })
    }
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_anonymous_requests_are_unauthorized() {
    let app = TestApp::new();

    let (status, body) = app.get("/api/enrollments", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "authentication required");

    let (status, _) = app.get("/api/enrollments", Some("session=forged")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_enrollment_returns_payment_link() {
    let app = TestApp::new();
    let cookie = app.login(Role::Partner);

    let (status, body) = app.post("/api/enrollments", &cookie, app.enrollment_body()).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "waiting_payment");
    assert_eq!(body["amount"], 15000);
    assert!(body["paymentUrl"].as_str().unwrap().starts_with("https://"));

    let id = body["id"].as_str().unwrap();
    let (status, fetched) = app.get(&format!("/api/enrollments/{id}"), Some(&cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], body["id"]);

    let (status, listed) = app
        .get("/api/enrollments?status=waiting_payment", Some(&cookie))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_cpf_names_the_field() {
    let app = TestApp::new();
    let cookie = app.login(Role::Hub);
    let mut body = app.enrollment_body();
    body["studentCpf"] = json!("111.111.111-11");

    let (status, error) = app.post("/api/enrollments", &cookie, body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["field"], "studentCpf");
    assert_eq!(app.gateway.calls(), 0);
}

#[tokio::test]
async fn test_students_are_forbidden() {
    let app = TestApp::new();
    let cookie = app.login(Role::Student);

    let (status, body) = app.post("/api/enrollments", &cookie, app.enrollment_body()).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn test_gateway_rejection_is_reported_verbatim() {
    let app = TestApp::new();
    let cookie = app.login(Role::Partner);
    app.gateway.push(ScriptedResponse::Reject("Cartão recusado".into()));

    let (status, body) = app.post("/api/enrollments", &cookie, app.enrollment_body()).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Cartão recusado");
    let id = body["enrollmentId"].as_str().unwrap();

    let (_, stored) = app.get(&format!("/api/enrollments/{id}"), Some(&cookie)).await;
    assert_eq!(stored["status"], "failed");
    assert_eq!(stored["failureReason"], "Cartão recusado");
}

#[tokio::test]
async fn test_other_tenant_gets_not_found() {
    let app = TestApp::new();
    let owner = app.login(Role::Partner);
    let (_, body) = app.post("/api/enrollments", &owner, app.enrollment_body()).await;
    let id = body["id"].as_str().unwrap();

    let outsider = app.login_in(Role::Admin, Uuid::new_v4());
    let (status, _) = app.get(&format!("/api/enrollments/{id}"), Some(&outsider)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_signed_webhook_confirms_payment() {
    let app = TestApp::new();
    let cookie = app.login(Role::Partner);
    let (_, enrollment) = app.post("/api/enrollments", &cookie, app.enrollment_body()).await;

    let notification = json!({
        "transactionId": enrollment["transactionId"],
        "outcome": "confirmed"
    });

    let (status, _) = app
        .webhook(notification.clone(), Some("sha256=deadbeef".into()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.webhook(notification.clone(), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let signature = webhook::sign(SECRET, notification.to_string().as_bytes()).unwrap();
    let (status, outcome) = app.webhook(notification.clone(), Some(signature.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["result"], "applied");
    assert_eq!(outcome["status"], "payment_confirmed");

    let (status, replay) = app.webhook(notification, Some(signature)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replay["result"], "already_applied");
}

#[tokio::test]
async fn test_finalize_and_cancel_routes() {
    let app = TestApp::new();
    let admin = app.login(Role::Admin);
    let (_, enrollment) = app.post("/api/enrollments", &admin, app.enrollment_body()).await;
    let id = enrollment["id"].as_str().unwrap();

    let (status, body) = app
        .post(&format!("/api/enrollments/{id}/finalize"), &admin, json!({ "studentId": Uuid::new_v4() }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "studentId");

    let (status, cancelled) = app
        .post(&format!("/api/enrollments/{id}/cancel"), &admin, json!({ "reason": "desistência" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");

    let (status, body) = app
        .post(&format!("/api/enrollments/{id}/cancel"), &admin, json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["enrollmentId"], enrollment["id"]);
}

#[tokio::test]
async fn test_portal_listing_and_selection() {
    let app = TestApp::new();

    let teacher = app.login(Role::Teacher);
    let (status, view) = app.get("/api/portals", Some(&teacher)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["portals"].as_array().unwrap().len(), 1);
    assert_eq!(view["current"]["id"], "teacher");

    let (status, _) = app
        .post("/api/portals/select", &teacher, json!({ "portal": "admin" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = app.login(Role::Admin);
    let (status, portal) = app
        .post("/api/portals/select", &admin, json!({ "portal": "partner" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(portal["baseRoute"], "/partner");

    let (_, view) = app.get("/api/portals", Some(&admin)).await;
    assert_eq!(view["portals"].as_array().unwrap().len(), 5);
    assert_eq!(view["current"]["id"], "partner");

    let (status, _) = app
        .post("/api/portals/select", &admin, json!({ "portal": "coordinator" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_route_authorization() {
    let app = TestApp::new();

    let (status, check) = app.get("/api/authorize?path=/admin/users", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(check["decision"], "redirect_to_login");

    let teacher = app.login(Role::Teacher);
    let (_, check) = app.get("/api/authorize?path=/teacher/classes", Some(&teacher)).await;
    assert_eq!(check["decision"], "render");
    assert!(check.get("redirect").is_none());

    let (_, check) = app.get("/api/authorize?path=/admin/users", Some(&teacher)).await;
    assert_eq!(check["decision"], "redirect_to_home");

    let admin = app.login(Role::Admin);
    app.post("/api/portals/select", &admin, json!({ "portal": "hub" })).await;
    let (_, check) = app.get("/api/authorize?path=/partner/leads", Some(&admin)).await;
    assert_eq!(check["decision"], "render");
    assert_eq!(check["redirect"], "/");
    assert_eq!(check["path"], "/partner/leads");
}
