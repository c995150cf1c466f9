use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::services::{
    BookingStore, InMemoryBookingStore, NotificationDispatcher, SupabaseBookingStore,
    TracingNotifier,
};
use appointment_cell::AppState;
use doctor_cell::services::{
    DoctorDirectory, InMemoryScheduleStore, ScheduleService, ScheduleStore, SupabaseScheduleStore,
};
use doctor_cell::DoctorCellState;
use shared_config::AppConfig;
use shared_database::SupabaseClient;

type Stores = (Arc<dyn ScheduleStore>, Arc<dyn DoctorDirectory>, Arc<dyn BookingStore>);

fn build_stores(config: &AppConfig) -> Stores {
    if config.is_configured() {
        info!("Using Supabase stores at {}", config.supabase_url);
        let supabase = Arc::new(SupabaseClient::new(config));
        let schedules = Arc::new(SupabaseScheduleStore::with_client(supabase.clone()));
        let bookings: Arc<dyn BookingStore> = Arc::new(SupabaseBookingStore::with_client(supabase));
        return (schedules.clone(), schedules, bookings);
    }

    warn!("Supabase not configured, schedules and bookings are kept in memory");
    let schedules = Arc::new(InMemoryScheduleStore::new());
    let bookings: Arc<dyn BookingStore> = Arc::new(InMemoryBookingStore::new());
    (schedules.clone(), schedules, bookings)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic scheduling API server");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());

    let (schedule_store, directory, bookings) = build_stores(&config);
    let schedules = Arc::new(ScheduleService::new(schedule_store, directory));
    let notifier: Arc<dyn NotificationDispatcher> = Arc::new(TracingNotifier);

    let doctor_state = DoctorCellState::new(config.clone(), schedules.clone());
    let appointment_state = AppState::new(config.clone(), schedules, bookings, notifier);

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(doctor_state, appointment_state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
