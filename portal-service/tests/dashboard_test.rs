mod common;

use axum::http::StatusCode;
use common::{StubBackend, TestApp};
use portal_service::config::PortalConfig;
use portal_service::services::Resource;
use serde_json::json;

fn seeded() -> std::sync::Arc<StubBackend> {
    let backend = StubBackend::new();
    backend.respond(
        Resource::Users,
        json!([
            { "id": 1, "email": "a@x.io", "role": "CLIENT" },
            { "id": 2, "email": "b@x.io", "role": "AGENT" }
        ]),
    );
    backend.respond(
        Resource::Invoices,
        json!({ "data": [
            { "id": 1, "amount": 100, "status": "PAID", "clientId": "c1" },
            { "id": 2, "amount": 40, "status": "UNPAID", "clientId": "c1" },
            { "id": 3, "amount": 60, "status": "overdue", "clientId": "c2" }
        ]}),
    );
    backend.respond(
        Resource::Payments,
        json!([{ "id": 1, "amount": 100, "status": "COMPLETED", "clientId": "c1" }]),
    );
    backend.respond(
        Resource::Subscriptions,
        json!([{ "id": 1, "amount": 25, "status": "ACTIVE", "clientId": "c1" }]),
    );
    backend.respond(
        Resource::ServiceRequests,
        json!([
            { "id": 1, "status": "QUOTED", "quoteAmount": 200, "clientId": "c1", "agentId": "a1" },
            { "id": 2, "status": "COMPLETED", "clientId": "c2", "agentId": "a2" }
        ]),
    );
    backend
}

#[tokio::test]
async fn admin_dashboard_without_failures_has_no_warning() {
    let app = TestApp::with_backend(PortalConfig::default(), seeded());

    let response = app.get("/api/dashboard/admin", &[]).await;
    assert_eq!(response.status, StatusCode::OK);

    let body = response.json();
    assert!(body.get("warning").is_none());
    assert_eq!(body["stats"]["totalUsers"], 2);
    assert_eq!(body["stats"]["totalInvoices"], 3);
    assert_eq!(body["stats"]["totalRevenue"], 100.0);
    assert_eq!(body["stats"]["outstandingAmount"], 100.0);
    assert_eq!(body["stats"]["openServiceRequests"], 1);
}

#[tokio::test]
async fn two_of_five_failures_yield_partial_stats_and_one_warning() {
    let backend = seeded();
    backend.fail(Resource::Payments);
    backend.fail(Resource::Users);
    let app = TestApp::with_backend(PortalConfig::default(), backend);

    let response = app
        .get("/api/dashboard/admin", &[("x-portal-session", "sess-1")])
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let body = response.json();
    assert!(body["warning"].is_string());
    assert_eq!(body["stats"]["totalUsers"], 0);
    assert_eq!(body["stats"]["totalPayments"], 0);
    assert_eq!(body["stats"]["totalInvoices"], 3);
    assert_eq!(body["stats"]["activeSubscriptions"], 1);
    assert_eq!(body["stats"]["openServiceRequests"], 1);

    let queued = app.state.notifications.list("sess-1");
    assert_eq!(queued.len(), 1);
    assert_eq!(
        serde_json::to_value(&queued[0]).unwrap()["type"],
        "warning"
    );
}

#[tokio::test]
async fn slow_source_times_out_like_a_failure() {
    let backend = seeded();
    backend.hang(Resource::Subscriptions);
    let mut config = PortalConfig::default();
    config.dashboard.fetch_timeout_ms = 50;
    let app = TestApp::with_backend(config, backend);

    let body = app.get("/api/dashboard/admin", &[]).await.json();

    assert!(body["warning"].is_string());
    assert_eq!(body["stats"]["activeSubscriptions"], 0);
    assert_eq!(body["stats"]["totalInvoices"], 3);
}

#[tokio::test]
async fn client_dashboard_is_scoped_to_client() {
    let app = TestApp::with_backend(PortalConfig::default(), seeded());

    let body = app.get("/api/dashboard/clients/c1", &[]).await.json();

    assert_eq!(body["stats"]["totalInvoices"], 2);
    assert_eq!(body["stats"]["amountDue"], 40.0);
    assert_eq!(body["stats"]["amountPaid"], 100.0);
    assert_eq!(body["stats"]["openServiceRequests"], 1);

    let fetches = app.backend.fetches.lock().unwrap();
    assert!(fetches
        .iter()
        .filter(|(resource, _)| *resource != Resource::SystemSettings)
        .all(|(_, query)| query.contains(&("clientId".to_string(), "c1".to_string()))));
}

#[tokio::test]
async fn agent_dashboard_sums_quoted_value() {
    let backend = seeded();
    backend.respond(Resource::Clients, json!([{ "id": "c1", "email": "c@x.io" }]));
    let app = TestApp::with_backend(PortalConfig::default(), backend);

    let body = app.get("/api/dashboard/agents/a1", &[]).await.json();

    assert_eq!(body["stats"]["assignedRequests"], 1);
    assert_eq!(body["stats"]["quotedValue"], 200.0);
    assert_eq!(body["stats"]["clientCount"], 1);
}

#[tokio::test]
async fn failure_without_session_does_not_queue_notifications() {
    let backend = seeded();
    backend.fail(Resource::Invoices);
    let app = TestApp::with_backend(PortalConfig::default(), backend);

    let body = app.get("/api/dashboard/admin", &[]).await.json();

    assert!(body["warning"].is_string());
    assert_eq!(app.state.notifications.subscriber_count(), 0);
}
