#![allow(dead_code)]

use std::{fmt, fs::File, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Method, Request},
};
use cucumber::{given, then, when, World as _};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use tripsync::{
    auth::AUTH_HEADER,
    config::AppConfig,
    db::{init_pool, migrate},
    error::AppError,
    models::trip::GeoLocation,
    routes::create_router,
    services::{
        geocode::{Directions, Geocoder},
        messaging::{LogMailer, LogSms},
    },
    state::AppState,
};

#[derive(Debug, cucumber::World, Default)]
struct AppWorld {
    state: Option<TestState>,
    token: Option<String>,
    refresh_token: Option<String>,
    user_id: Option<String>,
    trip_id: Option<String>,
    notification_id: Option<String>,
    status: u16,
    body: Value,
}

impl AppWorld {
    fn app_state(&self) -> &AppState {
        self.state
            .as_ref()
            .expect("state must be initialised first")
            .app()
    }

    fn result(&self) -> &Value {
        &self.body["result"]
    }

    async fn call(&mut self, method: Method, uri: &str, body: Option<Value>) {
        let token = self.token.clone();
        self.call_with_token(method, uri, body, token).await;
    }

    async fn call_with_token(
        &mut self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<String>,
    ) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTH_HEADER, token);
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = create_router(self.app_state().clone())
            .oneshot(request)
            .await
            .expect("router is infallible");
        self.status = response.status().as_u16();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        self.body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    }

    fn remember_trip(&mut self) {
        if let Some(id) = self.result()["id"].as_str() {
            self.trip_id = Some(id.to_string());
        }
    }

    fn trip_id(&self) -> String {
        self.trip_id.clone().expect("a trip must exist first")
    }

    fn user_id(&self) -> String {
        self.user_id.clone().expect("a user must be logged in first")
    }
}

struct TestState {
    app: AppState,
    _root: TempDir,
}

impl fmt::Debug for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestState").finish()
    }
}

impl TestState {
    async fn new() -> anyhow::Result<Self> {
        let root = TempDir::new().context("create temp dir for bdd world")?;
        let db_path = root.path().join("bdd.sqlite");
        File::create(&db_path)?;
        let database_url = format!("sqlite://{}", db_path.to_string_lossy());

        let config = AppConfig {
            database_url: database_url.clone(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            jwt_secret: "bdd-jwt-secret".into(),
            access_token_ttl: Duration::from_secs(600),
            refresh_token_ttl: Duration::from_secs(3600),
            otp_ttl: Duration::from_secs(300),
            google_maps_api_key: None,
            client_url: "http://localhost:5173".into(),
            mail_sender: "no-reply@tripsync.test".into(),
        };

        let db = init_pool(&config.database_url).await?;
        migrate(&db).await?;

        let app = AppState::new(
            config,
            db,
            Arc::new(StubGeocoder),
            Arc::new(LogMailer),
            Arc::new(LogSms),
        );
        Ok(Self { app, _root: root })
    }

    fn app(&self) -> &AppState {
        &self.app
    }
}

/// Resolves any address except ones containing "nowhere".
struct StubGeocoder;

#[async_trait]
impl Geocoder for StubGeocoder {
    async fn geocode(&self, address: &str) -> Result<GeoLocation, AppError> {
        if address.contains("nowhere") {
            return Err(AppError::Geocode("No results for the given location".into()));
        }
        Ok(GeoLocation {
            lat: 37.33,
            lng: -122.03,
            address: Some(format!("{address}, resolved")),
        })
    }

    async fn reverse_geocode(&self, lat: f64, lng: f64) -> Result<String, AppError> {
        Ok(format!("{lat},{lng}"))
    }

    async fn directions(
        &self,
        _origin: &str,
        _destination: &str,
        with_traffic: bool,
    ) -> Result<Directions, AppError> {
        Ok(Directions {
            distance: "5 km".into(),
            distance_meters: 5_000,
            duration: "10 mins".into(),
            duration_seconds: 600,
            duration_in_traffic_seconds: with_traffic.then_some(900),
            steps: vec!["Head east".into()],
            route: Vec::new(),
        })
    }
}

#[given("a fresh application state")]
async fn given_fresh_state(world: &mut AppWorld) {
    world.state = Some(TestState::new().await.expect("state"));
    world.token = None;
    world.refresh_token = None;
    world.user_id = None;
    world.trip_id = None;
    world.notification_id = None;
}

// accounts

#[when(regex = r#"^I register "([^"]+)" with email "([^"]+)" and password "([^"]+)"$"#)]
async fn when_register(world: &mut AppWorld, name: String, email: String, password: String) {
    world
        .call(
            Method::POST,
            "/api/users/register",
            Some(json!({"name": name, "email": email, "password": password})),
        )
        .await;
}

#[when(regex = r#"^I log in with email "([^"]+)" and password "([^"]+)"$"#)]
async fn when_login(world: &mut AppWorld, email: String, password: String) {
    world
        .call(
            Method::POST,
            "/api/users/login",
            Some(json!({"email": email, "password": password})),
        )
        .await;
    if world.status == 200 {
        world.token = world.result()["token"].as_str().map(str::to_string);
        world.refresh_token = world.result()["refreshToken"].as_str().map(str::to_string);
        world.user_id = world.result()["user"]["id"].as_str().map(str::to_string);
    }
}

#[given(regex = r#"^I am logged in as "([^"]+)" with email "([^"]+)"$"#)]
async fn given_logged_in(world: &mut AppWorld, name: String, email: String) {
    when_register(world, name, email.clone(), "secret1".into()).await;
    assert_eq!(world.status, 201, "register failed: {}", world.body);
    when_login(world, email, "secret1".into()).await;
    assert_eq!(world.status, 200, "login failed: {}", world.body);
}

#[when("I request my profile")]
async fn when_profile(world: &mut AppWorld) {
    world.call(Method::GET, "/api/users/profile", None).await;
}

#[when("I request my profile without a token")]
async fn when_profile_anonymous(world: &mut AppWorld) {
    world
        .call_with_token(Method::GET, "/api/users/profile", None, None)
        .await;
}

#[when("I log out")]
async fn when_logout(world: &mut AppWorld) {
    world.call(Method::POST, "/api/auth/logout", None).await;
}

#[when("I refresh my access token")]
async fn when_refresh(world: &mut AppWorld) {
    let refresh = world.refresh_token.clone();
    world
        .call(
            Method::POST,
            "/api/auth/refresh-token",
            Some(json!({ "refreshToken": refresh })),
        )
        .await;
}

#[then("the response carries a token")]
async fn then_has_token(world: &mut AppWorld) {
    assert!(
        world.result()["token"].as_str().is_some_and(|t| !t.is_empty()),
        "no token in {}",
        world.body
    );
    assert!(world.result()["user"].get("passwordHash").is_none());
}

// trips

#[when(regex = r#"^user "([^"]+)" starts a trip from "([^"]+)" by "([^"]+)"$"#)]
async fn when_start_trip(world: &mut AppWorld, user_id: String, address: String, mode: String) {
    world
        .call(
            Method::POST,
            "/api/trips/start",
            Some(json!({"userId": user_id, "startLocation": address, "travelMode": mode})),
        )
        .await;
    world.remember_trip();
}

#[given(regex = r#"^user "([^"]+)" has started a trip from "([^"]+)" by "([^"]+)"$"#)]
async fn given_started_trip(world: &mut AppWorld, user_id: String, address: String, mode: String) {
    when_start_trip(world, user_id, address, mode).await;
    assert_eq!(world.status, 200, "start failed: {}", world.body);
}

#[given("I have started a trip")]
async fn given_my_trip(world: &mut AppWorld) {
    let user_id = world.user_id();
    given_started_trip(world, user_id, "1 Main Street".into(), "car".into()).await;
}

#[when(regex = r#"^I end the trip at "([^"]+)" with notes "([^"]*)"$"#)]
async fn when_end_trip(world: &mut AppWorld, address: String, notes: String) {
    let trip_id = world.trip_id();
    world
        .call(
            Method::POST,
            "/api/trips/end",
            Some(json!({"tripId": trip_id, "endLocation": address, "notes": notes})),
        )
        .await;
}

#[given("the trip has ended")]
async fn given_trip_ended(world: &mut AppWorld) {
    when_end_trip(world, "2 Side Street".into(), String::new()).await;
    assert_eq!(world.status, 200, "end failed: {}", world.body);
}

#[when(regex = r#"^I report traffic "([^"]*)" and weather "([^"]*)"$"#)]
async fn when_report(world: &mut AppWorld, traffic: String, weather: String) {
    let uri = format!("/api/trips/{}/update", world.trip_id());
    world
        .call(
            Method::PUT,
            &uri,
            Some(json!({"trafficCondition": traffic, "weatherCondition": weather})),
        )
        .await;
}

#[when("I fetch the trip")]
async fn when_fetch_trip(world: &mut AppWorld) {
    let uri = format!("/api/trips/{}", world.trip_id());
    world.call(Method::GET, &uri, None).await;
}

#[when(regex = r#"^I fetch the trip history of "([^"]+)"$"#)]
async fn when_history(world: &mut AppWorld, user_id: String) {
    world
        .call(Method::GET, &format!("/api/trips/history/{user_id}"), None)
        .await;
}

#[then(regex = r#"^the trip status is "([^"]+)"$"#)]
async fn then_trip_status(world: &mut AppWorld, status: String) {
    assert_eq!(world.result()["status"], json!(status), "{}", world.body);
}

#[then(regex = r#"^the trip start address is "([^"]+)"$"#)]
async fn then_start_address(world: &mut AppWorld, address: String) {
    assert_eq!(world.result()["startLocation"]["address"], json!(address));
    assert!(world.result()["timestamps"]["startedAt"].is_string());
}

#[then("the trip has no end location")]
async fn then_no_end(world: &mut AppWorld) {
    assert!(world.result().get("endLocation").is_none());
    assert!(world.result()["timestamps"].get("endedAt").is_none());
}

#[then("the trip has an end location")]
async fn then_has_end(world: &mut AppWorld) {
    assert!(world.result()["endLocation"]["lat"].is_number());
    assert!(world.result()["timestamps"]["endedAt"].is_string());
}

#[then(regex = r"^the trip has (\d+) traffic conditions?$")]
async fn then_traffic_count(world: &mut AppWorld, count: usize) {
    let conditions = world.result()["trafficConditions"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    assert_eq!(conditions.len(), count, "{}", world.body);
}

#[then(regex = r"^the history lists (\d+) trips?$")]
async fn then_history_len(world: &mut AppWorld, count: usize) {
    let trips = world.result().as_array().cloned().unwrap_or_default();
    assert_eq!(trips.len(), count, "{}", world.body);
}

// sync

#[when("I sync a trip creation, an unknown item and a note for my trip")]
async fn when_sync_mixed(world: &mut AppWorld) {
    let user_id = world.user_id();
    let trip_id = world.trip_id();
    let batch = json!({
        "userId": user_id,
        "offlineData": [
            {"type": "trip", "action": "create", "data": {
                "startLocation": {"lat": 48.1, "lng": 11.5, "address": "Marienplatz"},
                "travelMode": "bicycle",
                "trafficConditions": ["light"]
            }},
            {"type": "garbage", "action": "x", "data": {}},
            {"type": "note", "action": "addNote", "data": {"tripId": trip_id, "notes": "synced"}}
        ]
    });
    world.call(Method::POST, "/api/sync", Some(batch)).await;
}

#[when(regex = r#"^I sync an update to my trip with traffic "([^"]+)"$"#)]
async fn when_sync_update(world: &mut AppWorld, traffic: String) {
    let batch = json!({
        "userId": world.user_id(),
        "offlineData": [
            {"type": "trip", "action": "update", "data": {
                "tripId": world.trip_id(),
                "trafficConditions": [traffic]
            }}
        ]
    });
    world.call(Method::POST, "/api/sync", Some(batch)).await;
}

#[when(regex = r#"^I sync a batch on behalf of "([^"]+)"$"#)]
async fn when_sync_other(world: &mut AppWorld, user_id: String) {
    let batch = json!({
        "userId": user_id,
        "offlineData": [{"type": "garbage", "action": "x", "data": {}}]
    });
    world.call(Method::POST, "/api/sync", Some(batch)).await;
}

#[when("I sync an empty batch")]
async fn when_sync_empty(world: &mut AppWorld) {
    let batch = json!({"userId": world.user_id(), "offlineData": []});
    world.call(Method::POST, "/api/sync", Some(batch)).await;
}

#[then(regex = r#"^the sync results are "([^"]+)"$"#)]
async fn then_sync_results(world: &mut AppWorld, expected: String) {
    let statuses: Vec<String> = world.result()["results"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .iter()
        .map(|r| r["status"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(statuses.join(","), expected, "{}", world.body);
}

#[then(regex = r#"^sync result (\d+) says "([^"]+)"$"#)]
async fn then_sync_msg(world: &mut AppWorld, index: usize, msg: String) {
    let result = &world.result()["results"][index - 1];
    assert_eq!(result["msg"], json!(msg), "{}", world.body);
}

// ratings

#[when(regex = r"^I rate the trip (\d+) with feedback ([^ ]+)$")]
async fn when_rate(world: &mut AppWorld, rating: i64, feedback: String) {
    let trip_id = world.trip_id();
    world
        .call(
            Method::POST,
            "/api/ratings",
            Some(json!({"tripId": trip_id, "rating": rating, "feedback": feedback})),
        )
        .await;
}

#[when("I fetch my average rating")]
async fn when_average(world: &mut AppWorld) {
    let uri = format!("/api/ratings/user/{}", world.user_id());
    world.call(Method::GET, &uri, None).await;
}

#[then(regex = r#"^the average rating is "([^"]+)" over (\d+) trips?$"#)]
async fn then_average(world: &mut AppWorld, average: String, total: u64) {
    assert_eq!(world.result()["averageRating"], json!(average), "{}", world.body);
    assert_eq!(world.result()["totalRatings"], json!(total));
}

// notifications

#[when(regex = r#"^I send myself a notification titled "([^"]+)"$"#)]
async fn when_notify_self(world: &mut AppWorld, title: String) {
    let user_id = world.user_id();
    world
        .call(
            Method::POST,
            "/api/notifications",
            Some(json!({"userId": user_id, "title": title, "message": "Trip saved"})),
        )
        .await;
    world.notification_id = world.result()["id"].as_str().map(str::to_string);
}

#[when("I mark the notification as read")]
async fn when_mark_read(world: &mut AppWorld) {
    let id = world.notification_id.clone().expect("a notification must exist");
    world
        .call(Method::PATCH, &format!("/api/notifications/{id}"), None)
        .await;
}

#[when("I delete the notification")]
async fn when_delete_notification(world: &mut AppWorld) {
    let id = world.notification_id.clone().expect("a notification must exist");
    world
        .call(Method::DELETE, &format!("/api/notifications/{id}"), None)
        .await;
}

// envelope

#[then(regex = r"^the response status is (\d+)$")]
async fn then_status(world: &mut AppWorld, status: u16) {
    assert_eq!(world.status, status, "body: {}", world.body);
    assert_eq!(world.body["status"], json!(status), "envelope mismatch");
}

#[then(regex = r#"^the response message is "([^"]+)"$"#)]
async fn then_message(world: &mut AppWorld, message: String) {
    assert_eq!(world.body["message"], json!(message), "{}", world.body);
}

#[tokio::main]
async fn main() {
    AppWorld::cucumber()
        .fail_on_skipped()
        .with_default_cli()
        .run("tests/features")
        .await;
}
