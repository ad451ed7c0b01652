//! HTTP-level tests: token handling, authorization, and the materials ledger
//! driven through the real router with in-memory stores.

use std::net::SocketAddr;
use std::ops::AsyncFnMut;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header};
use serde::Serialize;
use serde_json::{Value, json};

const SECRET: &str = "test-secret";

#[derive(Serialize)]
struct WireClaims {
    sub: String,
    roles: Vec<String>,
    iat: i64,
    exp: i64,
}

fn mint_token(roles: &[&str]) -> String {
    let now = Utc::now().timestamp();
    let claims = WireClaims {
        sub: uuid::Uuid::now_v7().to_string(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        iat: now - 30,
        exp: now + 3600,
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

async fn spawn_server() -> SocketAddr {
    let app = siteops_api::app::build_app(SECRET.to_string()).await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Projections are fed by a background subscriber, so reads after a write can
/// lag by a beat. Poll until the condition holds or time runs out.
async fn wait_until<F>(mut condition: F)
where
    F: AsyncFnMut() -> bool,
{
    for _ in 0..100 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached within timeout");
}

#[tokio::test(flavor = "multi_thread")]
async fn health_is_public_but_domain_routes_require_a_token() {
    let addr = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = client
        .get(format!("http://{addr}/materials"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let response = client
        .get(format!("http://{addr}/materials"))
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test(flavor = "multi_thread")]
async fn ledger_flow_over_http() {
    let addr = spawn_server().await;
    let client = reqwest::Client::new();
    let admin = mint_token(&["admin"]);

    // Create Cement: 100 on hand, reorder level 20.
    let response = client
        .post(format!("http://{addr}/materials"))
        .bearer_auth(&admin)
        .json(&json!({
            "name": "Cement",
            "unit": "bags",
            "reorder_level": 20,
            "initial_quantity": 100,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    let material_id = body["id"].as_str().unwrap().to_string();

    wait_until(async || {
        let response = client
            .get(format!("http://{addr}/materials/{material_id}"))
            .bearer_auth(&admin)
            .send()
            .await
            .unwrap();
        if response.status() != 200 {
            return false;
        }
        let body: Value = response.json().await.unwrap();
        body["quantity"].as_i64() == Some(100)
    })
    .await;

    // Outflow 85 -> 15 on hand, now low on stock.
    let response = client
        .post(format!("http://{addr}/materials/{material_id}/transactions"))
        .bearer_auth(&admin)
        .json(&json!({ "transaction_type": "outflow", "quantity": 85 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    assert!(body["transaction_id"].as_str().is_some());

    wait_until(async || {
        let response = client
            .get(format!("http://{addr}/materials/low-stock"))
            .bearer_auth(&admin)
            .send()
            .await
            .unwrap();
        let body: Value = response.json().await.unwrap();
        body.as_array()
            .is_some_and(|low| low.iter().any(|m| m["material_id"] == material_id.as_str()))
    })
    .await;

    // Inflow 200 -> 215, back above the threshold.
    client
        .post(format!("http://{addr}/materials/{material_id}/transactions"))
        .bearer_auth(&admin)
        .json(&json!({ "transaction_type": "inflow", "quantity": 200 }))
        .send()
        .await
        .unwrap();

    wait_until(async || {
        let response = client
            .get(format!("http://{addr}/materials/{material_id}"))
            .bearer_auth(&admin)
            .send()
            .await
            .unwrap();
        let body: Value = response.json().await.unwrap();
        body["quantity"].as_i64() == Some(215)
    })
    .await;

    // Over-drawing outflow is rejected and changes nothing.
    let response = client
        .post(format!("http://{addr}/materials/{material_id}/transactions"))
        .bearer_auth(&admin)
        .json(&json!({ "transaction_type": "outflow", "quantity": 9000 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 422);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "invariant_violation");

    let response = client
        .get(format!("http://{addr}/materials/{material_id}"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["quantity"].as_i64(), Some(215));
    assert_eq!(body["transactions"].as_array().unwrap().len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn roles_gate_the_ledger() {
    let addr = spawn_server().await;
    let client = reqwest::Client::new();
    let admin = mint_token(&["admin"]);
    let clerk = mint_token(&["client"]);

    let response = client
        .post(format!("http://{addr}/materials"))
        .bearer_auth(&admin)
        .json(&json!({ "name": "Sand", "unit": "tons", "reorder_level": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    let material_id = body["id"].as_str().unwrap().to_string();

    // Clients can neither record transactions nor read the inventory.
    let response = client
        .post(format!("http://{addr}/materials/{material_id}/transactions"))
        .bearer_auth(&clerk)
        .json(&json!({ "transaction_type": "inflow", "quantity": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    let response = client
        .get(format!("http://{addr}/materials"))
        .bearer_auth(&clerk)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
}

#[tokio::test(flavor = "multi_thread")]
async fn request_decisions_are_final() {
    let addr = spawn_server().await;
    let client = reqwest::Client::new();
    let admin = mint_token(&["admin"]);

    let response = client
        .post(format!("http://{addr}/material-requests"))
        .bearer_auth(&admin)
        .json(&json!({
            "material_id": uuid::Uuid::now_v7().to_string(),
            "project_id": uuid::Uuid::now_v7().to_string(),
            "quantity": 40,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    let request_id = body["id"].as_str().unwrap().to_string();

    let response = client
        .post(format!("http://{addr}/material-requests/{request_id}/decision"))
        .bearer_auth(&admin)
        .json(&json!({ "decision": "approve" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    // A second decision is an invalid transition and leaves the status alone.
    let response = client
        .post(format!("http://{addr}/material-requests/{request_id}/decision"))
        .bearer_auth(&admin)
        .json(&json!({ "decision": "reject" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "invalid_transition");

    wait_until(async || {
        let response = client
            .get(format!("http://{addr}/material-requests/{request_id}"))
            .bearer_auth(&admin)
            .send()
            .await
            .unwrap();
        if response.status() != 200 {
            return false;
        }
        let body: Value = response.json().await.unwrap();
        body["status"] == "approved"
    })
    .await;
}
