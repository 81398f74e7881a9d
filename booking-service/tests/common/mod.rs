//! Common test utilities for booking-service integration tests.

use booking_service::config::{BookingConfig, Config, DatabaseConfig, ServerConfig, StripeConfig};
use booking_service::Application;
use chrono::{DateTime, Utc};
use secrecy::Secret;
use serde_json::{json, Value};
use service_core::utils::signature::hmac_sha256_hex;
use sqlx::postgres::PgPool;
use sqlx::Row;
use std::sync::Once;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,booking_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub struct TestApp {
    pub address: String,
    pub pool: PgPool,
    pub gateway: MockServer,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Spawn a test application against `TEST_DATABASE_URL`, with a mock
    /// gateway standing in for the Stripe API. Returns `None` (and the test
    /// should bail out) when no test database is configured.
    pub async fn spawn() -> Option<TestApp> {
        init_tracing();

        let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set; skipping database-backed test");
            return None;
        };

        let gateway = MockServer::start().await;

        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            database: DatabaseConfig {
                url: Secret::new(database_url.clone()),
                max_connections: 2,
                min_connections: 1,
            },
            stripe: StripeConfig {
                secret_key: Secret::new("sk_test_123".to_string()),
                webhook_secret: Secret::new(WEBHOOK_SECRET.to_string()),
                api_base_url: gateway.uri(),
                success_url: "https://example.test/pay/success".to_string(),
                cancel_url: "https://example.test/pay/cancel".to_string(),
            },
            booking: BookingConfig {
                default_currency: "NPR".to_string(),
                cancel_cutoff_hours: 12,
            },
            service_name: "booking-service-test".to_string(),
        };

        let app = Application::build(config)
            .await
            .expect("Failed to build application");
        let port = app.port();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let pool = PgPool::connect(&database_url)
            .await
            .expect("Failed to connect test pool");

        Some(TestApp {
            address: format!("http://127.0.0.1:{}", port),
            pool,
            gateway,
            client: reqwest::Client::new(),
        })
    }

    // =========================================================================
    // HTTP helpers
    // =========================================================================

    pub async fn post_as(&self, user_id: Uuid, route: &str, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, route))
            .header("x-user-id", user_id.to_string())
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post_as_admin(
        &self,
        user_id: Uuid,
        route: &str,
        body: Value,
    ) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, route))
            .header("x-user-id", user_id.to_string())
            .header("x-capabilities", "ADMIN")
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get_as(&self, user_id: Uuid, route: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, route))
            .header("x-user-id", user_id.to_string())
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get_public(&self, route: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, route))
            .send()
            .await
            .expect("Failed to execute request")
    }

    // =========================================================================
    // Gateway mock + webhook helpers
    // =========================================================================

    /// Stub the gateway to answer the next session creation with the given
    /// id. One-shot, so tests can stage several sessions in sequence.
    pub async fn mock_checkout_session(&self, session_id: &str) {
        Mock::given(method("POST"))
            .and(path("/checkout/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": session_id,
                "url": format!("https://checkout.test/pay/{}", session_id),
            })))
            .up_to_n_times(1)
            .mount(&self.gateway)
            .await;
    }

    /// Stub the gateway to fail session creation.
    pub async fn mock_checkout_session_error(&self) {
        Mock::given(method("POST"))
            .and(path("/checkout/sessions"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": { "type": "api_error", "message": "boom" }
            })))
            .mount(&self.gateway)
            .await;
    }

    pub fn sign_webhook(&self, body: &str) -> String {
        let timestamp = Utc::now().timestamp();
        let payload = format!("{}.{}", timestamp, body);
        let signature = hmac_sha256_hex(WEBHOOK_SECRET, payload.as_bytes()).unwrap();
        format!("t={},v1={}", timestamp, signature)
    }

    /// Deliver a signed webhook payload.
    pub async fn deliver_webhook(&self, body: &Value) -> reqwest::Response {
        let body = body.to_string();
        let header = self.sign_webhook(&body);
        self.deliver_webhook_raw(&body, &header).await
    }

    pub async fn deliver_webhook_raw(&self, body: &str, signature: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/webhooks/stripe", self.address))
            .header("stripe-signature", signature)
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .expect("Failed to execute request")
    }

    // =========================================================================
    // Seed helpers (verification/activation are external workflows, so tests
    // write catalog state directly)
    // =========================================================================

    pub async fn seed_court(&self, owner_user_id: Uuid, status: &str, is_active: bool) -> Uuid {
        let court_id = Uuid::new_v4();
        // Unique normalized pair per test court
        let name = format!("Court {}", court_id);
        sqlx::query(
            r#"
            INSERT INTO courts (court_id, name, location, description, name_normalized, location_normalized, status, owner_user_id, is_active)
            VALUES ($1, $2, 'Kathmandu', 'Test court', $3, 'kathmandu', $4, $5, $6)
            "#,
        )
        .bind(court_id)
        .bind(&name)
        .bind(name.to_lowercase())
        .bind(status)
        .bind(owner_user_id)
        .bind(is_active)
        .execute(&self.pool)
        .await
        .expect("Failed to seed court");
        court_id
    }

    pub async fn seed_verified_court(&self, owner_user_id: Uuid) -> Uuid {
        self.seed_court(owner_user_id, "VERIFIED", true).await
    }

    pub async fn seed_slot(
        &self,
        court_id: Uuid,
        start_utc: DateTime<Utc>,
        price: i64,
    ) -> Uuid {
        let slot_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO slots (slot_id, court_id, start_utc, end_utc, price)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(slot_id)
        .bind(court_id)
        .bind(start_utc)
        .bind(start_utc + chrono::Duration::hours(1))
        .bind(price)
        .execute(&self.pool)
        .await
        .expect("Failed to seed slot");
        slot_id
    }

    pub async fn seed_booking(&self, user_id: Uuid, slot_id: Uuid) -> Uuid {
        let booking_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO bookings (booking_id, user_id, slot_id, status)
            VALUES ($1, $2, $3, 'CONFIRMED')
            "#,
        )
        .bind(booking_id)
        .bind(user_id)
        .bind(slot_id)
        .execute(&self.pool)
        .await
        .expect("Failed to seed booking");
        booking_id
    }

    pub async fn seed_payment(
        &self,
        slot_id: Uuid,
        session_id: &str,
        status: &str,
        booking_id: Option<Uuid>,
    ) -> Uuid {
        let payment_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO payments (payment_id, booking_id, slot_id, amount, currency, status, gateway_session_id)
            VALUES ($1, $2, $3, 1500, 'NPR', $4, $5)
            "#,
        )
        .bind(payment_id)
        .bind(booking_id)
        .bind(slot_id)
        .bind(status)
        .bind(session_id)
        .execute(&self.pool)
        .await
        .expect("Failed to seed payment");
        payment_id
    }

    // =========================================================================
    // Event payloads
    // =========================================================================

    pub fn completed_event(
        session_id: &str,
        payment_id: Uuid,
        slot_id: Uuid,
        actor_id: Uuid,
    ) -> Value {
        json!({
            "id": format!("evt_{}", Uuid::new_v4().simple()),
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "id": session_id,
                    "metadata": {
                        "payment_id": payment_id.to_string(),
                        "slot_id": slot_id.to_string(),
                        "actor_id": actor_id.to_string(),
                    }
                }
            }
        })
    }

    pub fn expired_event(session_id: &str, payment_id: Uuid) -> Value {
        json!({
            "id": format!("evt_{}", Uuid::new_v4().simple()),
            "type": "checkout.session.expired",
            "data": {
                "object": {
                    "id": session_id,
                    "metadata": {
                        "payment_id": payment_id.to_string(),
                    }
                }
            }
        })
    }

    // =========================================================================
    // State inspection
    // =========================================================================

    /// (status, booking_id) of a payment, or None when the row is gone.
    pub async fn payment_state(&self, payment_id: Uuid) -> Option<(String, Option<Uuid>)> {
        sqlx::query("SELECT status, booking_id FROM payments WHERE payment_id = $1")
            .bind(payment_id)
            .fetch_optional(&self.pool)
            .await
            .expect("Failed to query payment")
            .map(|row| (row.get("status"), row.get("booking_id")))
    }

    /// (booking_id, user_id) of the CONFIRMED booking on a slot, if any.
    pub async fn confirmed_booking(&self, slot_id: Uuid) -> Option<(Uuid, Uuid)> {
        sqlx::query(
            "SELECT booking_id, user_id FROM bookings WHERE slot_id = $1 AND status = 'CONFIRMED'",
        )
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await
        .expect("Failed to query booking")
        .map(|row| (row.get("booking_id"), row.get("user_id")))
    }

    pub async fn booking_exists(&self, booking_id: Uuid) -> bool {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE booking_id = $1")
            .bind(booking_id)
            .fetch_one(&self.pool)
            .await
            .expect("Failed to query booking");
        count > 0
    }

    pub async fn payments_for_slot(&self, slot_id: Uuid) -> Vec<Uuid> {
        sqlx::query_scalar("SELECT payment_id FROM payments WHERE slot_id = $1")
            .bind(slot_id)
            .fetch_all(&self.pool)
            .await
            .expect("Failed to query payments")
    }
}

/// A slot start comfortably past the cancellation cutoff.
pub fn far_future() -> DateTime<Utc> {
    Utc::now() + chrono::Duration::days(2)
}

/// A slot start inside the cancellation cutoff window.
pub fn near_future() -> DateTime<Utc> {
    Utc::now() + chrono::Duration::hours(2)
}
