use chrono::{Duration as ChronoDuration, Utc};
use innkeep_api::AppConfig;
use innkeep_auth::{JwtClaims, Role};
use innkeep_core::{BookingId, HotelId, RoomId, UserId};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, bound to an ephemeral port.
        let (app, _services) =
            innkeep_api::app::build_app(&AppConfig::with_jwt_secret(SECRET)).expect("failed to build app");
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

fn mint_jwt(user_id: UserId, hotel_id: Option<HotelId>, roles: Vec<Role>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: user_id,
        hotel_id,
        roles,
        issued_at: now - ChronoDuration::seconds(5),
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn send_json(builder: reqwest::RequestBuilder, expected: StatusCode) -> Value {
    let res = builder.send().await.unwrap();
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    assert_eq!(status, expected, "unexpected status, body={body}");
    if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&body).unwrap()
    }
}

/// A hotel with sheets (complimentary, 500/800) and towels (200/300), two of each per room,
/// and one occupied room.
struct Hotel {
    token: String,
    sheets: String,
    towels: String,
    room: RoomId,
    booking: BookingId,
    guest: UserId,
}

async fn furnished_hotel(srv: &TestServer, client: &reqwest::Client) -> Hotel {
    let hotel_id = HotelId::new();
    let token = mint_jwt(UserId::new(), Some(hotel_id), vec![Role::ADMIN]);

    let mut item_ids = Vec::new();
    for (name, category, unit, replacement, complimentary) in [
        ("Bed sheet set", "linen", 500, 800, true),
        ("Bath towel", "towel", 200, 300, false),
    ] {
        let item = send_json(
            client
                .post(srv.url("/catalog/items"))
                .bearer_auth(&token)
                .json(&json!({
                    "name": name,
                    "category": category,
                    "unit_price": unit,
                    "replacement_price": replacement,
                    "complimentary": complimentary,
                })),
            StatusCode::CREATED,
        )
        .await;
        item_ids.push(item["id"].as_str().unwrap().to_string());
    }
    let (sheets, towels) = (item_ids[0].clone(), item_ids[1].clone());

    let template = send_json(
        client
            .post(srv.url("/catalog/templates"))
            .bearer_auth(&token)
            .json(&json!({
                "name": "Standard double",
                "room_types": ["double"],
                "lines": [
                    { "item_id": sheets, "default_quantity": 2 },
                    { "item_id": towels, "default_quantity": 2 },
                ],
            })),
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(template["version"], 1);

    let room = RoomId::new();
    let booking = BookingId::new();
    let guest = UserId::new();

    let snapshot = send_json(
        client
            .post(srv.url(&format!("/rooms/{room}/snapshot")))
            .bearer_auth(&token)
            .json(&json!({ "template_id": template["id"] })),
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(snapshot["lines"].as_array().unwrap().len(), 2);

    send_json(
        client
            .post(srv.url(&format!("/rooms/{room}/booking")))
            .bearer_auth(&token)
            .json(&json!({ "booking_id": booking, "guest_id": guest })),
        StatusCode::OK,
    )
    .await;

    Hotel {
        token,
        sheets,
        towels,
        room,
        booking,
        guest,
    }
}

fn line<'a>(snapshot: &'a Value, item_id: &str) -> &'a Value {
    snapshot["lines"]
        .as_array()
        .unwrap()
        .iter()
        .find(|l| l["item_id"] == item_id)
        .expect("line present")
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    let client = reqwest::Client::new();
    let res = client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn hotel_context_is_derived_from_token() {
    let srv = TestServer::spawn().await;

    let hotel_id = HotelId::new();
    let user_id = UserId::new();
    let token = mint_jwt(user_id, Some(hotel_id), vec![Role::STAFF]);

    let client = reqwest::Client::new();
    let body = send_json(client.get(srv.url("/whoami")).bearer_auth(token), StatusCode::OK).await;
    assert_eq!(body["hotel_id"].as_str().unwrap(), hotel_id.to_string());
    assert_eq!(body["user_id"].as_str().unwrap(), user_id.to_string());
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "staff"));
}

#[tokio::test]
async fn staff_cannot_manage_the_catalog() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(UserId::new(), Some(HotelId::new()), vec![Role::STAFF]);

    let client = reqwest::Client::new();
    let body = send_json(
        client.post(srv.url("/catalog/items")).bearer_auth(token).json(&json!({
            "name": "Robe",
            "category": "amenity",
            "unit_price": 1000,
            "replacement_price": 2500,
            "complimentary": false,
        })),
        StatusCode::FORBIDDEN,
    )
    .await;
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn another_hotel_cannot_read_or_touch_a_room() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let hotel = furnished_hotel(&srv, &client).await;

    let intruder = mint_jwt(UserId::new(), Some(HotelId::new()), vec![Role::ADMIN]);
    let body = send_json(
        client
            .get(srv.url(&format!("/rooms/{}/inventory", hotel.room)))
            .bearer_auth(&intruder),
        StatusCode::FORBIDDEN,
    )
    .await;
    assert_eq!(body["error"], "hotel_mismatch");

    send_json(
        client
            .post(srv.url(&format!("/bookings/{}/checkout", hotel.booking)))
            .bearer_auth(&intruder),
        StatusCode::FORBIDDEN,
    )
    .await;
}

#[tokio::test]
async fn malformed_and_unknown_ids_are_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(UserId::new(), Some(HotelId::new()), vec![Role::ADMIN]);

    let body = send_json(
        client.get(srv.url("/rooms/not-a-uuid/inventory")).bearer_auth(&token),
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert_eq!(body["error"], "invalid_id");

    send_json(
        client
            .get(srv.url(&format!("/rooms/{}/inventory", RoomId::new())))
            .bearer_auth(&token),
        StatusCode::NOT_FOUND,
    )
    .await;
}

#[tokio::test]
async fn extra_towel_is_marked_up_and_raises_the_room_quantity() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let hotel = furnished_hotel(&srv, &client).await;

    let tx = send_json(
        client.post(srv.url("/transactions")).bearer_auth(&hotel.token).json(&json!({
            "room_id": hotel.room,
            "booking_id": hotel.booking,
            "transaction_type": "extra_request",
            "entries": [{ "item_id": hotel.towels, "units": 1, "quantity_delta": 1, "chargeable": true }],
        })),
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(tx["total_amount"], 300);
    assert_eq!(tx["status"], "completed");
    assert_eq!(tx["charged_to_guest"], true);

    let snapshot = send_json(
        client
            .get(srv.url(&format!("/rooms/{}/inventory", hotel.room)))
            .bearer_auth(&hotel.token),
        StatusCode::OK,
    )
    .await;
    assert_eq!(line(&snapshot, &hotel.towels)["current_quantity"], 3);

    // Complimentary sheets within the template quantity cannot be charged.
    let body = send_json(
        client.post(srv.url("/transactions")).bearer_auth(&hotel.token).json(&json!({
            "room_id": hotel.room,
            "booking_id": hotel.booking,
            "transaction_type": "extra_request",
            "entries": [{ "item_id": hotel.sheets, "units": 1, "chargeable": true }],
        })),
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn checkout_with_missing_sheet_is_gated_until_charged_and_invoiced() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let hotel = furnished_hotel(&srv, &client).await;

    let checkout = send_json(
        client
            .post(srv.url(&format!("/bookings/{}/checkout", hotel.booking)))
            .bearer_auth(&hotel.token),
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(checkout["status"], "requested");
    let checkout_id = checkout["id"].as_str().unwrap().to_string();

    // A second open checkout for the same booking conflicts.
    send_json(
        client
            .post(srv.url(&format!("/bookings/{}/checkout", hotel.booking)))
            .bearer_auth(&hotel.token),
        StatusCode::CONFLICT,
    )
    .await;

    send_json(
        client
            .post(srv.url(&format!("/checkouts/{checkout_id}/begin")))
            .bearer_auth(&hotel.token),
        StatusCode::OK,
    )
    .await;

    let view = send_json(
        client
            .post(srv.url(&format!("/checkouts/{checkout_id}/inspection")))
            .bearer_auth(&hotel.token)
            .json(&json!({
                "checklist": [{ "label": "Minibar checked", "passed": true }],
                "findings": [
                    { "item_id": hotel.sheets, "observed_quantity": 1, "condition": "good", "charge_guest": true },
                    { "item_id": hotel.towels, "observed_quantity": 2, "condition": "good" },
                ],
            })),
        StatusCode::OK,
    )
    .await;
    assert_eq!(view["checkout"]["status"], "pending_charges");
    assert_eq!(view["checkout"]["total_charges"], 1600);
    assert_eq!(view["can_checkout"], false);
    let outstanding = view["outstanding"].as_array().unwrap();
    assert_eq!(outstanding.len(), 1);
    let charge_id = outstanding[0].as_str().unwrap().to_string();

    let snapshot = send_json(
        client
            .get(srv.url(&format!("/rooms/{}/inventory", hotel.room)))
            .bearer_auth(&hotel.token),
        StatusCode::OK,
    )
    .await;
    let sheets = line(&snapshot, &hotel.sheets);
    assert_eq!(sheets["current_quantity"], 1);
    assert_eq!(sheets["condition"], "missing");

    // Nothing is confirmed while the charge is pending.
    send_json(
        client
            .post(srv.url(&format!("/checkouts/{checkout_id}/confirm")))
            .bearer_auth(&hotel.token),
        StatusCode::CONFLICT,
    )
    .await;

    let completed = send_json(
        client
            .post(srv.url(&format!("/transactions/{charge_id}/complete")))
            .bearer_auth(&hotel.token),
        StatusCode::OK,
    )
    .await;
    assert_eq!(completed["status"], "completed");
    assert_eq!(completed["kind"], "checkout_charge");

    let reconciliation = send_json(
        client
            .post(srv.url(&format!("/bookings/{}/reconcile", hotel.booking)))
            .bearer_auth(&hotel.token),
        StatusCode::OK,
    )
    .await;
    let lines = reconciliation["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["amount"], 1600);
    assert!(reconciliation["invoice_id"].is_string());

    // Reconciling again with nothing new yields no lines.
    let again = send_json(
        client
            .post(srv.url(&format!("/bookings/{}/reconcile", hotel.booking)))
            .bearer_auth(&hotel.token),
        StatusCode::OK,
    )
    .await;
    assert!(again["lines"].as_array().unwrap().is_empty());
    assert!(again["invoice_id"].is_null());

    let view = send_json(
        client
            .post(srv.url(&format!("/checkouts/{checkout_id}/confirm")))
            .bearer_auth(&hotel.token),
        StatusCode::OK,
    )
    .await;
    assert_eq!(view["checkout"]["status"], "passed");
    assert_eq!(view["can_checkout"], true);

    // The guest sees the settled charge on their own statement.
    let guest_token = mint_jwt(hotel.guest, None, vec![Role::GUEST]);
    let statement = send_json(
        client.get(srv.url("/me/charges")).bearer_auth(&guest_token),
        StatusCode::OK,
    )
    .await;
    assert_eq!(statement["total_amount"], 1600);
    assert_eq!(statement["charges"].as_array().unwrap().len(), 1);

    // Guests cannot read another guest's statement.
    send_json(
        client
            .get(srv.url(&format!("/guests/{}/charges", UserId::new())))
            .bearer_auth(&guest_token),
        StatusCode::FORBIDDEN,
    )
    .await;
}
