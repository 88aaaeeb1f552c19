use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use agrisk_api::app::services::build_in_memory_services;
use agrisk_core::{FarmId, ItemId, LotId, UserId, WarehouseId};
use agrisk_infra::clock::FixedClock;
use agrisk_infra::collaborators::InMemoryReferenceData;
use agrisk_infra::config::EngineConfig;
use agrisk_inventory::{LotRef, MovementType, StockMovement};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(data: Arc<InMemoryReferenceData>) -> Self {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let services = build_in_memory_services(EngineConfig::default(), data, Arc::new(FixedClock::new(now)));

        // Same router as prod, bound to an ephemeral port.
        let app = agrisk_api::app::build_app(Arc::new(services));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct Seeded {
    farm_id: FarmId,
    farmers: Vec<UserId>,
}

/// One farm with an expired lot (10 kg), a lot expiring in 5 days (4 kg) and one
/// expiring in 40 days (7 kg), plus two farmers.
fn seed(data: &InMemoryReferenceData) -> Seeded {
    let today = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap().date_naive();
    let farm_id = FarmId::new();
    data.add_farm(farm_id, "Green Valley");

    for (days, qty) in [(-1, 10), (5, 4), (40, 7)] {
        let lot_id = LotId::new();
        data.add_lot(LotRef {
            lot_id,
            farm_id,
            farm_name: "Green Valley".to_string(),
            item_id: ItemId::new(),
            item_name: format!("Fertilizer {days}"),
            lot_code: format!("GV-{days}"),
            expiry_date: Some(today + Duration::days(days)),
            unit: "kg".to_string(),
        });
        data.record_movement(StockMovement {
            lot_id,
            warehouse_id: WarehouseId::new(),
            location_id: None,
            movement_type: MovementType::In,
            quantity: Decimal::from(qty),
            occurred_at: Utc::now() - Duration::days(90),
        });
    }

    let farmers = vec![UserId::new(), UserId::new()];
    for f in &farmers {
        data.add_farm_user(farm_id, *f);
    }
    Seeded { farm_id, farmers }
}

async fn seeded_server() -> (TestServer, Seeded) {
    let data = Arc::new(InMemoryReferenceData::new());
    let seeded = seed(&data);
    (TestServer::spawn(data).await, seeded)
}

async fn refresh(client: &reqwest::Client, server: &TestServer) -> Value {
    let res = client
        .post(server.url("/admin/alerts/refresh"))
        .json(&json!({ "windowDays": 30 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

fn expired_alert_id(report: &Value) -> String {
    report["alerts"]
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["type"] == "INVENTORY_EXPIRED")
        .map(|a| a["id"].as_str().unwrap().to_string())
        .unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let server = TestServer::spawn(Arc::new(InMemoryReferenceData::new())).await;
    let res = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn risk_summary_reports_expired_and_expiring_lots() {
    let (server, seeded) = seeded_server().await;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url("/admin/inventory/risk/summary?windowDays=30&includeExpiring=true"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();

    assert_eq!(body["expiredLots"], 1);
    assert_eq!(body["expiringLots"], 1);
    assert_eq!(body["qtyAtRisk"].as_str().unwrap().parse::<Decimal>().unwrap(), Decimal::from(14));
    assert_eq!(body["farms"][0]["farmId"], seeded.farm_id.to_string());
    assert_eq!(body["farms"][0]["farmName"], "Green Valley");
}

#[tokio::test]
async fn risk_lots_are_paginated_and_validated() {
    let (server, seeded) = seeded_server().await;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url(&format!(
            "/admin/inventory/risk/lots?farmId={}&status=RISK&page=0&size=1",
            seeded.farm_id
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["total"], 2);
    assert_eq!(body["hasMore"], true);
    assert_eq!(body["items"][0]["status"], "EXPIRED");

    let res = client
        .get(server.url("/admin/inventory/risk/lots?size=0"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let res = client
        .get(server.url("/admin/inventory/risk/lots?status=ROTTEN"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .get(server.url("/admin/inventory/risk/summary?windowDays=-1"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn on_hand_search_matches_lot_code() {
    let (server, _) = seeded_server().await;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url("/admin/inventory/on-hand?q=gv-40"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["lotCode"], "GV-40");
}

#[tokio::test]
async fn refresh_is_idempotent_within_the_day() {
    let (server, _) = seeded_server().await;
    let client = reqwest::Client::new();

    let first = refresh(&client, &server).await;
    let alerts = first["alerts"].as_array().unwrap();
    assert_eq!(alerts.len(), 2);
    assert!(alerts.iter().all(|a| a["created"] == true && a["status"] == "NEW"));
    assert!(first["failures"].as_array().unwrap().is_empty());

    let second = refresh(&client, &server).await;
    assert!(second["alerts"].as_array().unwrap().iter().all(|a| a["created"] == false));
    assert_eq!(expired_alert_id(&first), expired_alert_id(&second));

    let res = client.get(server.url("/admin/alerts")).send().await.unwrap();
    let listed: Value = res.json().await.unwrap();
    assert_eq!(listed["total"], 2);
}

#[tokio::test]
async fn send_fans_out_to_farmers_and_rejects_resend() {
    let (server, seeded) = seeded_server().await;
    let client = reqwest::Client::new();
    let alert_id = expired_alert_id(&refresh(&client, &server).await);

    let send_body = json!({ "channel": "IN_APP", "recipientMode": "ALL_FARMERS_IN_FARM" });
    let res = client
        .post(server.url(&format!("/admin/alerts/{alert_id}/send")))
        .json(&send_body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let sent: Value = res.json().await.unwrap();
    assert_eq!(sent["status"], "SENT");
    assert!(sent["sentAt"].is_string());
    assert_eq!(sent["recipientFarmerIds"].as_array().unwrap().len(), 2);

    let res = client
        .post(server.url(&format!("/admin/alerts/{alert_id}/send")))
        .json(&send_body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .get(server.url(&format!("/admin/alerts/{alert_id}/notifications")))
        .send()
        .await
        .unwrap();
    let notifications: Value = res.json().await.unwrap();
    assert_eq!(notifications.as_array().unwrap().len(), 2);

    // Inbox + read flow for the first farmer.
    let farmer = seeded.farmers[0];
    let res = client
        .get(server.url(&format!("/users/{farmer}/notifications?unreadOnly=true")))
        .send()
        .await
        .unwrap();
    let inbox: Value = res.json().await.unwrap();
    assert_eq!(inbox["total"], 1);
    let nid = inbox["items"][0]["id"].as_str().unwrap().to_string();
    assert_eq!(inbox["items"][0]["alertId"], alert_id);

    let other = seeded.farmers[1];
    let res = client
        .post(server.url(&format!("/users/{other}/notifications/{nid}/read")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .post(server.url(&format!("/users/{farmer}/notifications/{nid}/read")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let read: Value = res.json().await.unwrap();
    assert!(read["readAt"].is_string());

    let res = client
        .get(server.url(&format!("/users/{farmer}/notifications?unreadOnly=true")))
        .send()
        .await
        .unwrap();
    let inbox: Value = res.json().await.unwrap();
    assert_eq!(inbox["total"], 0);
}

#[tokio::test]
async fn send_validates_request() {
    let (server, _) = seeded_server().await;
    let client = reqwest::Client::new();
    let alert_id = expired_alert_id(&refresh(&client, &server).await);

    for body in [
        json!({ "channel": "IN_APP", "recipientMode": "SELECTED_FARMERS", "recipientFarmerIds": [] }),
        json!({ "channel": "SMS", "recipientMode": "ALL_FARMERS_IN_FARM" }),
        json!({ "channel": "IN_APP", "recipientMode": "SELECTED_FARMERS", "recipientFarmerIds": ["nope"] }),
    ] {
        let res = client
            .post(server.url(&format!("/admin/alerts/{alert_id}/send")))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "body: {body}");
    }

    let res = client.get(server.url(&format!("/admin/alerts/{alert_id}"))).send().await.unwrap();
    let alert: Value = res.json().await.unwrap();
    assert_eq!(alert["status"], "NEW");
}

#[tokio::test]
async fn malformed_refresh_body_is_rejected_without_creating_alerts() {
    let (server, _) = seeded_server().await;
    let client = reqwest::Client::new();

    for body in [r#"{"windowDays":"3"}"#, "{not json", r#""thirty""#] {
        let res = client
            .post(server.url("/admin/alerts/refresh"))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "body: {body}");
        let err: Value = res.json().await.unwrap();
        assert_eq!(err["error"], "validation_error");
        assert!(err["message"].is_string());
    }

    let res = client.get(server.url("/admin/alerts")).send().await.unwrap();
    let listed: Value = res.json().await.unwrap();
    assert_eq!(listed["total"], 0);

    // A 3-day window leaves only the expired lot at risk.
    let res = client
        .post(server.url("/admin/alerts/refresh"))
        .json(&json!({ "windowDays": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let report: Value = res.json().await.unwrap();
    let alerts = report["alerts"].as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["type"], "INVENTORY_EXPIRED");
}

#[tokio::test]
async fn refresh_without_body_uses_defaults() {
    let (server, _) = seeded_server().await;
    let client = reqwest::Client::new();

    let res = client.post(server.url("/admin/alerts/refresh")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let report: Value = res.json().await.unwrap();
    assert_eq!(report["alerts"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn malformed_query_and_body_fields_get_json_errors() {
    let (server, _) = seeded_server().await;
    let client = reqwest::Client::new();
    let alert_id = expired_alert_id(&refresh(&client, &server).await);

    let inbox = format!("/users/{}/notifications?unreadOnly=maybe", uuid::Uuid::now_v7());
    for path in [
        "/admin/inventory/risk/summary?windowDays=abc",
        "/admin/inventory/risk/lots?page=-1",
        "/admin/alerts?size=lots",
        inbox.as_str(),
    ] {
        let res = client.get(server.url(path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "path: {path}");
        let err: Value = res.json().await.unwrap();
        assert_eq!(err["error"], "validation_error", "path: {path}");
    }

    let res = client
        .post(server.url(&format!("/admin/alerts/{alert_id}/send")))
        .json(&json!({ "channel": "IN_APP" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["error"], "validation_error");
}

#[tokio::test]
async fn resend_with_unknown_selected_farmers_is_a_conflict() {
    let (server, _) = seeded_server().await;
    let client = reqwest::Client::new();
    let alert_id = expired_alert_id(&refresh(&client, &server).await);

    let res = client
        .post(server.url(&format!("/admin/alerts/{alert_id}/send")))
        .json(&json!({ "channel": "IN_APP", "recipientMode": "ALL_FARMERS_IN_FARM" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(server.url(&format!("/admin/alerts/{alert_id}/send")))
        .json(&json!({
            "channel": "IN_APP",
            "recipientMode": "SELECTED_FARMERS",
            "recipientFarmerIds": [uuid::Uuid::now_v7().to_string()],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["error"], "conflict");
}

#[tokio::test]
async fn unknown_or_malformed_alert_ids() {
    let (server, _) = seeded_server().await;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url(&format!("/admin/alerts/{}", uuid::Uuid::now_v7())))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_found");

    let res = client.get(server.url("/admin/alerts/not-a-uuid")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn operator_lifecycle_transitions() {
    let (server, _) = seeded_server().await;
    let client = reqwest::Client::new();
    let alert_id = expired_alert_id(&refresh(&client, &server).await);

    let res = client
        .post(server.url(&format!("/admin/alerts/{alert_id}/acknowledge")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let alert: Value = res.json().await.unwrap();
    assert_eq!(alert["status"], "ACKNOWLEDGED");

    let res = client
        .post(server.url(&format!("/admin/alerts/{alert_id}/dismiss")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(server.url(&format!("/admin/alerts/{alert_id}/resolve")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .get(server.url("/admin/alerts?status=DISMISSED&type=INVENTORY_EXPIRED"))
        .send()
        .await
        .unwrap();
    let listed: Value = res.json().await.unwrap();
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["items"][0]["id"], alert_id);
}
