use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use showtime::{app, config::Config, middleware::Claims, store::MemoryStore, AppState};

const SECRET: &str = "integration-secret";
const ADMIN: &str = "admin-1";

struct TestApp {
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        let config = Config::from_lookup(|key| match key {
            "JWT_SECRET" => Some(SECRET.to_string()),
            "BOOTSTRAP_ADMINS" => Some(ADMIN.to_string()),
            _ => None,
        })
        .unwrap();
        let state = AppState::with_store(Arc::new(MemoryStore::new()), None, config);
        Self { router: app(state) }
    }

    fn token(user_id: &str) -> String {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    async fn send(&self, method: Method, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", Self::token(user)));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register(&self, user_id: &str) {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/user/create-or-update",
                Some(user_id),
                Some(json!({ "name": format!("User {}", user_id), "email": format!("{}@example.com", user_id) })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
    }

    /// Registers the admin, a movie and one show three days out. Returns the show id.
    async fn seed_show(&self, price: f64) -> i64 {
        self.register(ADMIN).await;
        let (status, _) = self
            .send(
                Method::POST,
                "/api/show/movies",
                Some(ADMIN),
                Some(json!({ "id": 550, "title": "Fight Club", "runtime": 139 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let date = (Utc::now() + Duration::days(3)).format("%Y-%m-%d").to_string();
        let (status, body) = self
            .send(
                Method::POST,
                "/api/show/add",
                Some(ADMIN),
                Some(json!({
                    "movieId": 550,
                    "showPrice": price,
                    "theater": "Grand",
                    "showsInput": [{ "date": date, "time": ["18:00"] }]
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["shows"][0]["id"].as_i64().unwrap()
    }

    async fn book(&self, user: &str, show_id: i64, seats: &[&str], amount: f64) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/api/booking/create",
            Some(user),
            Some(json!({ "showId": show_id, "bookedSeats": seats, "amount": amount })),
        )
        .await
    }
}

#[tokio::test]
async fn health_and_banner() {
    let app = TestApp::new();
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn overlapping_booking_is_rejected_and_seats_stay_with_first_buyer() {
    let app = TestApp::new();
    let show_id = app.seed_show(10.0).await;
    app.register("u1").await;
    app.register("u2").await;

    let (status, body) = app.book("u1", show_id, &["A1", "A2"], 20.0).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["success"], true);
    assert_eq!(body["booking"]["bookedSeats"], json!(["A1", "A2"]));
    assert_eq!(body["booking"]["isPaid"], false);

    let (status, body) = app.book("u2", show_id, &["A2", "A3"], 20.0).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Selected seats are not available: A2");

    let (status, body) = app
        .send(Method::GET, &format!("/api/booking/seats/{}", show_id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["occupiedSeats"], json!(["A1", "A2"]));

    let (_, body) = app
        .send(Method::POST, "/api/booking/check", None, Some(json!({ "showId": show_id, "seats": ["A3"] })))
        .await;
    assert_eq!(body["available"], true);
    let (_, body) = app
        .send(Method::POST, "/api/booking/check", None, Some(json!({ "showId": show_id, "seats": ["A3", "A1"] })))
        .await;
    assert_eq!(body["available"], false);
}

#[tokio::test]
async fn amount_must_match_server_price() {
    let app = TestApp::new();
    let show_id = app.seed_show(12.0).await;
    app.register("u1").await;

    let (status, body) = app.book("u1", show_id, &["B1", "B2"], 5.0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (_, body) = app
        .send(Method::GET, &format!("/api/booking/seats/{}", show_id), None, None)
        .await;
    assert_eq!(body["occupiedSeats"], json!([]));
}

#[tokio::test]
async fn unknown_show_and_malformed_body() {
    let app = TestApp::new();
    app.register("u1").await;

    let (status, body) = app.send(Method::GET, "/api/booking/seats/9999", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Show not found");

    let (_, body) = app
        .send(Method::POST, "/api/booking/check", None, Some(json!({ "showId": 9999, "seats": ["A1"] })))
        .await;
    assert_eq!(body["available"], false);

    let (status, body) = app
        .send(Method::POST, "/api/booking/create", Some("u1"), Some(json!({ "bookedSeats": ["A1"] })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn missing_token_is_401_and_non_admin_is_403() {
    let app = TestApp::new();
    app.register("u1").await;

    let (status, body) = app.send(Method::GET, "/api/user/bookings", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let request = Request::builder()
        .uri("/api/user/bookings")
        .header(header::AUTHORIZATION, "Bearer forged.token.value")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (status, _) = app.send(Method::GET, "/api/admin/dashboard", Some("u1"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send(Method::GET, "/api/admin/is-admin", Some("u1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isAdmin"], false);
}

#[tokio::test]
async fn bootstrap_admin_sees_paid_bookings_on_dashboard() {
    let app = TestApp::new();
    let show_id = app.seed_show(8.0).await;
    app.register("u1").await;

    let (_, body) = app.send(Method::GET, "/api/admin/is-admin", Some(ADMIN), None).await;
    assert_eq!(body["isAdmin"], true);

    let (_, body) = app.book("u1", show_id, &["C1", "C2", "C3"], 24.0).await;
    let booking_id = body["booking"]["id"].as_i64().unwrap();

    let (_, body) = app.send(Method::GET, "/api/admin/dashboard", Some(ADMIN), None).await;
    assert_eq!(body["dashboardData"]["totalBookings"], 0);

    let (status, body) = app
        .send(Method::PATCH, &format!("/api/admin/bookings/{}/paid", booking_id), Some(ADMIN), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking"]["isPaid"], true);

    let (_, body) = app.send(Method::GET, "/api/admin/dashboard", Some(ADMIN), None).await;
    assert_eq!(body["dashboardData"]["totalBookings"], 1);
    assert_eq!(body["dashboardData"]["totalRevenue"], 24.0);
    assert_eq!(body["dashboardData"]["totalUser"], 2);

    let (_, body) = app.send(Method::GET, "/api/admin/shows", Some(ADMIN), None).await;
    assert_eq!(body["shows"][0]["report"]["seatsSold"], 3);
    assert_eq!(body["shows"][0]["movie"]["title"], "Fight Club");
}

#[tokio::test]
async fn movie_page_groups_shows_by_date() {
    let app = TestApp::new();
    let show_id = app.seed_show(9.5).await;
    app.register("u1").await;
    app.book("u1", show_id, &["D4"], 9.5).await;

    let (status, body) = app.send(Method::GET, "/api/show/550", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["movie"]["title"], "Fight Club");

    let date = (Utc::now() + Duration::days(3)).format("%Y-%m-%d").to_string();
    let slot = &body["dateTime"][&date][0];
    assert_eq!(slot["showId"], show_id);
    assert_eq!(slot["price"], 9.5);
    assert_eq!(slot["occupiedSeats"], json!(["D4"]));

    let (_, body) = app.send(Method::GET, "/api/show/all", None, None).await;
    assert_eq!(body["shows"][0]["id"], 550);
}

#[tokio::test]
async fn booked_upcoming_show_cannot_be_deleted() {
    let app = TestApp::new();
    let show_id = app.seed_show(10.0).await;
    app.register("u1").await;
    app.book("u1", show_id, &["A1"], 10.0).await;

    let (status, body) = app
        .send(Method::DELETE, &format!("/api/show/{}", show_id), Some(ADMIN), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (status, _) = app.send(Method::DELETE, "/api/show/424242", Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn favorite_toggle_twice_restores_state() {
    let app = TestApp::new();
    app.seed_show(10.0).await;
    app.register("u1").await;

    let toggle = || app.send(Method::POST, "/api/user/update-favorite", Some("u1"), Some(json!({ "movieId": 550 })));

    let (_, body) = toggle().await;
    assert_eq!(body["isFavorite"], true);
    let (_, body) = app.send(Method::GET, "/api/user/favorites", Some("u1"), None).await;
    assert_eq!(body["movies"][0]["id"], 550);

    let (_, body) = toggle().await;
    assert_eq!(body["isFavorite"], false);
    let (_, body) = app.send(Method::GET, "/api/user/favorites", Some("u1"), None).await;
    assert_eq!(body["movies"], json!([]));

    let (status, _) = app.send(Method::POST, "/api/user/favorites/777", Some("u1"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn theater_rules() {
    let app = TestApp::new();
    app.seed_show(10.0).await;

    let theater = json!({ "name": "Grand", "location": "Downtown", "capacity": 120 });
    let (status, body) = app
        .send(Method::POST, "/api/admin/theaters", Some(ADMIN), Some(theater.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let id = body["theater"]["id"].as_i64().unwrap();

    let (status, body) = app
        .send(Method::POST, "/api/admin/theaters", Some(ADMIN), Some(theater))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "A theater with this name and location already exists");

    // the seeded show plays at "Grand"
    let (status, _) = app
        .send(Method::DELETE, &format!("/api/admin/theaters/{}", id), Some(ADMIN), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app
        .send(Method::PATCH, &format!("/api/admin/theaters/{}/toggle", id), Some(ADMIN), None)
        .await;
    assert_eq!(body["theater"]["isActive"], false);

    let (_, body) = app
        .send(Method::GET, "/api/admin/theaters?isActive=false&search=gra", Some(ADMIN), None)
        .await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["totalPages"], 1);
}
