use clap::Parser;
use jwt_simple::algorithms::HS256Key;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tutorbase::auth;
use tutorbase::config::Config;
use tutorbase::db::{create_pool, init_db, queries, AppState};
use tutorbase::handlers;
use tutorbase::models::{CreateBooking, CreateSubject, CreateUser, UserRole};
use tutorbase::payments::MidtransConfig;

#[derive(Parser, Debug)]
#[command(name = "tutorbase")]
#[command(about = "Booking and payment backend for a tutoring marketplace")]
struct Cli {
    /// Seed the database with dev data (student, teacher, subject, booking)
    #[arg(long)]
    seed: bool,
}

/// Seeds the database with dev data for local testing.
/// Only runs in dev mode and when the database is empty.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    if queries::get_user_by_email(&conn, "student@tutorbase.local")
        .expect("Failed to query users")
        .is_some()
    {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    let student = queries::create_user(
        &conn,
        &CreateUser {
            email: "student@tutorbase.local".to_string(),
            name: "Dev Student".to_string(),
            phone: Some("+620000000001".to_string()),
            role: UserRole::Student,
        },
    )
    .expect("Failed to create dev student");

    let teacher = queries::create_user(
        &conn,
        &CreateUser {
            email: "teacher@tutorbase.local".to_string(),
            name: "Dev Teacher".to_string(),
            phone: None,
            role: UserRole::Teacher,
        },
    )
    .expect("Failed to create dev teacher");

    let admin = queries::create_user(
        &conn,
        &CreateUser {
            email: "admin@tutorbase.local".to_string(),
            name: "Dev Admin".to_string(),
            phone: None,
            role: UserRole::Admin,
        },
    )
    .expect("Failed to create dev admin");

    let subject = queries::create_subject(
        &conn,
        &CreateSubject {
            name: "Mathematics".to_string(),
        },
    )
    .expect("Failed to create dev subject");

    let booking = queries::create_booking(
        &conn,
        &student.id,
        &CreateBooking {
            teacher_id: teacher.id.clone(),
            subject_id: subject.id.clone(),
            scheduled_at: chrono::Utc::now().timestamp() + 86_400,
            duration_minutes: 60,
            total_price: 100_000,
        },
    )
    .expect("Failed to create dev booking");

    let student_token = auth::issue_token(&state.jwt_key, &student.id, UserRole::Student)
        .expect("Failed to sign dev token");
    let teacher_token = auth::issue_token(&state.jwt_key, &teacher.id, UserRole::Teacher)
        .expect("Failed to sign dev token");
    let admin_token = auth::issue_token(&state.jwt_key, &admin.id, UserRole::Admin)
        .expect("Failed to sign dev token");

    tracing::info!("============================================");
    tracing::info!("SEEDED DEV DATA");
    tracing::info!("Student: {} (token: {})", student.id, student_token);
    tracing::info!("Teacher: {} (token: {})", teacher.id, teacher_token);
    tracing::info!("Admin:   {} (token: {})", admin.id, admin_token);
    tracing::info!("Booking: {} (pending, 100000)", booking.id);
    tracing::info!("============================================");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tutorbase=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.midtrans_server_key.is_empty() {
        tracing::warn!("MIDTRANS_SERVER_KEY is not set - payment initiation will fail");
    }

    let pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = pool.get().expect("Failed to get db connection");
        init_db(&conn).expect("Failed to initialize schema");
    }

    let state = AppState {
        db: pool,
        midtrans: MidtransConfig {
            server_key: config.midtrans_server_key.clone(),
            snap_base_url: config.midtrans_snap_url.clone(),
        },
        jwt_key: HS256Key::from_bytes(config.jwt_secret.as_bytes()),
        http_client: reqwest::Client::new(),
        push_webhook_url: config.push_webhook_url.clone(),
    };

    if cli.seed {
        if config.dev_mode {
            seed_dev_data(&state);
        } else {
            tracing::warn!("--seed ignored outside dev mode (set TUTORBASE_ENV=dev)");
        }
    }

    let app = handlers::router(state.clone())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind address");

    tracing::info!("Tutorbase server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
