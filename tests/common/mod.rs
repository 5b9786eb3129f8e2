//! Test utilities and fixtures for Tutorbase integration tests

#![allow(dead_code)]

use rusqlite::Connection;
use sha2::{Digest, Sha512};

pub use tutorbase::db::{init_db, queries};
pub use tutorbase::models::*;
pub use tutorbase::payments::{MidtransClient, MidtransConfig, SignatureVerifier};
pub use tutorbase::reconcile::GatewayNotification;

/// Shared gateway secret for signature tests.
pub const TEST_SERVER_KEY: &str = "SB-Mid-server-test-key";

/// Create an in-memory test database with schema initialized.
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Gateway client wired to the test server key (never performs I/O in
/// these tests - only signature verification).
pub fn test_gateway() -> MidtransClient {
    MidtransClient::new(
        reqwest::Client::new(),
        &MidtransConfig {
            server_key: TEST_SERVER_KEY.to_string(),
            snap_base_url: "https://app.sandbox.midtrans.com".to_string(),
        },
    )
}

/// Compute the gateway signature the way the real gateway does.
pub fn sign(order_id: &str, status_code: &str, gross_amount: &str, server_key: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Build a correctly signed webhook payload.
pub fn signed_note(
    order_id: &str,
    transaction_status: &str,
    fraud_status: Option<&str>,
    gross_amount: &str,
) -> GatewayNotification {
    let status_code = "200";
    serde_json::from_value(serde_json::json!({
        "order_id": order_id,
        "transaction_status": transaction_status,
        "fraud_status": fraud_status,
        "status_code": status_code,
        "gross_amount": gross_amount,
        "signature_key": sign(order_id, status_code, gross_amount, TEST_SERVER_KEY),
    }))
    .expect("valid notification payload")
}

pub fn create_test_user(conn: &Connection, email: &str, role: UserRole) -> User {
    queries::create_user(
        conn,
        &CreateUser {
            email: email.to_string(),
            name: format!("Test {}", email),
            phone: None,
            role,
        },
    )
    .expect("Failed to create test user")
}

pub fn create_test_subject(conn: &Connection, name: &str) -> Subject {
    queries::create_subject(
        conn,
        &CreateSubject {
            name: name.to_string(),
        },
    )
    .expect("Failed to create test subject")
}

/// Create a pending booking with the standard test price (100000).
pub fn create_test_booking(
    conn: &Connection,
    student: &User,
    teacher: &User,
    subject: &Subject,
) -> Booking {
    queries::create_booking(
        conn,
        &student.id,
        &CreateBooking {
            teacher_id: teacher.id.clone(),
            subject_id: subject.id.clone(),
            scheduled_at: chrono::Utc::now().timestamp() + 86_400,
            duration_minutes: 60,
            total_price: 100_000,
        },
    )
    .expect("Failed to create test booking")
}

/// Create a pending transaction for a booking.
pub fn create_test_transaction(conn: &Connection, booking: &Booking, order_id: &str) -> Transaction {
    queries::create_transaction(
        conn,
        &CreateTransaction {
            booking_id: booking.id.clone(),
            provider: "midtrans".to_string(),
            provider_ref: order_id.to_string(),
            snap_token: Some("test-snap-token".to_string()),
            redirect_url: Some("https://app.sandbox.midtrans.com/snap/v4/redirection/test".to_string()),
            amount: booking.total_price,
        },
    )
    .expect("Failed to create test transaction")
}

/// Full fixture: student, teacher, subject, pending booking, pending
/// transaction with the given order reference.
pub struct PaymentFixture {
    pub student: User,
    pub teacher: User,
    pub booking: Booking,
    pub transaction: Transaction,
}

pub fn setup_payment_fixture(conn: &Connection, order_id: &str) -> PaymentFixture {
    let student = create_test_user(conn, "student@test.local", UserRole::Student);
    let teacher = create_test_user(conn, "teacher@test.local", UserRole::Teacher);
    let subject = create_test_subject(conn, "Physics");
    let booking = create_test_booking(conn, &student, &teacher, &subject);
    let transaction = create_test_transaction(conn, &booking, order_id);
    PaymentFixture {
        student,
        teacher,
        booking,
        transaction,
    }
}
