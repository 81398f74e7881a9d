pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::middleware::from_fn;
use axum::{
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::middleware::tracing::request_id_middleware;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use config::Config;
use services::{metrics::init_metrics, AuditRecorder, Database, StripeClient};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub stripe: StripeClient,
    pub audit: AuditRecorder,
}

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        init_metrics();

        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;

        db.run_migrations().await?;

        let stripe = StripeClient::new(config.stripe.clone());
        if stripe.is_configured() {
            tracing::info!("Payment gateway client initialized");
        } else {
            tracing::warn!("Payment gateway not configured - checkout is disabled");
        }

        let audit = AuditRecorder::new(db.pool().clone());

        let state = AppState {
            config: config.clone(),
            db,
            stripe,
            audit,
        };

        let router = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/metrics", get(handlers::metrics))
            // Catalog
            .route("/courts", post(handlers::courts::create_court))
            .route(
                "/slots",
                get(handlers::slots::list_slots).post(handlers::slots::create_slot),
            )
            .route(
                "/slots/:id/deactivate",
                post(handlers::slots::deactivate_slot),
            )
            // Booking ledger
            .route("/bookings", post(handlers::bookings::create_booking))
            .route(
                "/bookings/:id/cancel",
                post(handlers::bookings::cancel_booking),
            )
            .route(
                "/bookings/:id/admin-cancel",
                post(handlers::bookings::admin_cancel_booking),
            )
            // Checkout and settlement
            .route("/payments/start", post(handlers::payments::start_payment))
            .route("/payments/cancel", get(handlers::payments::cancel_payment))
            .route("/webhooks/stripe", post(handlers::webhook::stripe_webhook))
            .layer(from_fn(request_id_middleware))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                        version = ?request.version(),
                    )
                }),
            )
            .with_state(state);

        let listener =
            TcpListener::bind(format!("{}:{}", config.server.host, config.server.port)).await?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Booking service listener bound");

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        tracing::info!(
            service = "booking-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, self.router).await?;

        Ok(())
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}
