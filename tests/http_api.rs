//! HTTP API over a real listener

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use receipts::calendar::{Calendar, DayMonth};
use receipts::club::{Club, ClubSettings};
use receipts::model::{Participant, SharedDocument};
use receipts::notify::MockNotifier;
use receipts::server::create_router;
use receipts::store::MemoryStore;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

fn doc() -> SharedDocument {
    let mut doc = SharedDocument::default();
    for (name, day, code) in [
        ("Ana", "15/06", "ana1506-aaa111"),
        ("Bo", "01/02", "bo0102-bbb222"),
        ("Cy", "20/12", "cy2012-ccc333"),
    ] {
        let mut p = Participant::new(name, day);
        p.access_secret = Some(code.to_string());
        doc.participants.push(p);
    }
    doc
}

async fn serve() -> SocketAddr {
    let club = Arc::new(Club::new(
        Arc::new(MemoryStore::with_document(&doc()).unwrap()),
        Arc::new(MockNotifier::new()),
        ClubSettings {
            admin_secret: "setup25".to_string(),
            site_url: "https://club.example".to_string(),
            calendar: Calendar::pinned(DayMonth::new(15, 6)),
        },
    ));
    club.load().await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(club, None);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn login(client: &Client, addr: SocketAddr, code: &str) -> String {
    let response = client
        .post(format!("http://{addr}/api/login"))
        .json(&json!({ "code": code }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let addr = serve().await;
    let body = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_login_then_timeline() {
    let addr = serve().await;
    let client = Client::new();
    let token = login(&client, addr, "ANA1506-AAA111").await;

    let session: Value = client
        .get(format!("http://{addr}/api/session"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session["role"], "participant");
    assert_eq!(session["currentUser"], "Ana");

    let timeline: Value = client
        .get(format!("http://{addr}/api/timeline"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(timeline[0]["name"], "Ana");
    assert_eq!(timeline[0]["state"], "your_turn");
    assert_eq!(timeline[0]["isYou"], true);
    assert_eq!(timeline[2]["state"], "locked");
    assert_eq!(timeline[2]["unlocks"], "20/12");
}

#[tokio::test]
async fn test_save_and_read_back() {
    let addr = serve().await;
    let client = Client::new();
    let ana = login(&client, addr, "ana1506-aaa111").await;
    let bo = login(&client, addr, "bo0102-bbb222").await;

    let saved: Value = client
        .put(format!("http://{addr}/api/me/reflection"))
        .bearer_auth(&ana)
        .json(&json!({ "text": "a good year" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(saved["message"], "locked in. nice work.");
    assert_eq!(saved["firstPost"], true);
    assert!(saved.get("warning").is_none());

    let read: Value = client
        .get(format!("http://{addr}/api/reflections/Ana"))
        .bearer_auth(&bo)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(read["content"], "a good year");
}

#[tokio::test]
async fn test_error_statuses() {
    let addr = serve().await;
    let client = Client::new();

    let anonymous = client
        .get(format!("http://{addr}/api/timeline"))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let too_early = client
        .post(format!("http://{addr}/api/login"))
        .json(&json!({ "code": "cy2012-ccc333" }))
        .send()
        .await
        .unwrap();
    assert_eq!(too_early.status(), StatusCode::FORBIDDEN);
    let body: Value = too_early.json().await.unwrap();
    assert_eq!(body["error"], "not_yet_eligible");
    assert_eq!(body["anniversary"], "20/12");

    let token = login(&client, addr, "ana1506-aaa111").await;
    let roster = client
        .get(format!("http://{addr}/api/roster"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(roster.status(), StatusCode::FORBIDDEN);

    let empty = client
        .put(format!("http://{addr}/api/me/reflection"))
        .bearer_auth(&token)
        .json(&json!({ "text": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_roster_round() {
    let addr = serve().await;
    let client = Client::new();
    let admin = login(&client, addr, "setup25").await;

    let added = client
        .post(format!("http://{addr}/api/roster/participants"))
        .bearer_auth(&admin)
        .json(&json!({ "name": "Eli", "birthday": "1/1", "email": "eli@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(added.status(), StatusCode::CREATED);
    let body: Value = added.json().await.unwrap();
    assert_eq!(body["codes"][0]["name"], "Eli");
    assert_eq!(body["missingEmails"], 3);

    let roster: Value = client
        .get(format!("http://{addr}/api/roster"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(roster[0]["anniversary"], "01/01");

    let removed = client
        .delete(format!("http://{addr}/api/roster/participants/0"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(removed.status(), StatusCode::OK);

    let logout = client
        .post(format!("http://{addr}/api/logout"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);

    let after = client
        .get(format!("http://{addr}/api/roster"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_event_stream_ends_after_logout() {
    let addr = serve().await;
    let client = Client::new();
    let token = login(&client, addr, "ana1506-aaa111").await;

    let stream = client
        .get(format!("http://{addr}/api/events"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(stream.status(), StatusCode::OK);

    let logout = client
        .post(format!("http://{addr}/api/logout"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);

    // The body only completes once the server closes the stream
    let body = tokio::time::timeout(Duration::from_secs(5), stream.bytes())
        .await
        .expect("event stream still open after logout")
        .unwrap();
    assert!(!String::from_utf8_lossy(&body).contains("event: updated"));
}
