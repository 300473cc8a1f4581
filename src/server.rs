use crate::booking::BookingService;
use crate::clock::{SharedClock, SystemClock};
use crate::config::Config;
use crate::error::Result;
use crate::handlers::{
    available_slots, create_appointment, health_check, list_appointments, remaining_limits,
    AppState,
};
use crate::middleware::logging_middleware;
use crate::rate_limit::RateLimiter;
use crate::store::{AppointmentStore, FileStorage};
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builds the application router over the given state.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        // Booking endpoints
        .route(
            "/api/appointments",
            post(create_appointment).get(list_appointments),
        )
        .route("/api/slots/:date", get(available_slots))
        .route("/api/limits", get(remaining_limits))
        // Health endpoint
        .route("/health", get(health_check))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(logging_middleware)),
        )
}

pub struct Server {
    app: Router,
    bind_addr: SocketAddr,
}

impl Server {
    /// Wires the clock, storage, store, limiter, and orchestrator together
    /// once at startup; all handlers share these via `AppState`.
    pub fn new(config: Config) -> Result<Self> {
        let clock: SharedClock = Arc::new(SystemClock);
        let storage = Box::new(FileStorage::new(config.data_dir.clone()));
        let store = Arc::new(AppointmentStore::open(storage, clock.clone())?);
        let limiter = Arc::new(RateLimiter::new(config.rate_limits.clone(), clock));
        let booking = Arc::new(BookingService::new(
            limiter,
            store,
            config.business_hours,
        ));

        let app = create_app(AppState { booking });

        Ok(Self {
            app,
            bind_addr: config.bind_addr,
        })
    }

    pub async fn run(self) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;

        tracing::info!("Booking server starting on {}", self.bind_addr);
        tracing::info!("Health check available at /health");

        // Run server with graceful shutdown
        axum::serve(
            listener,
            self.app
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
