use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Accounts (students, teachers, admins)
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            phone TEXT,
            role TEXT NOT NULL CHECK (role IN ('student', 'teacher', 'admin')),
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);

        -- Teachable subjects
        CREATE TABLE IF NOT EXISTS subjects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        );

        -- Scheduled sessions
        CREATE TABLE IF NOT EXISTS bookings (
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL REFERENCES users(id),
            teacher_id TEXT NOT NULL REFERENCES users(id),
            subject_id TEXT NOT NULL REFERENCES subjects(id),
            scheduled_at INTEGER NOT NULL,
            duration_minutes INTEGER NOT NULL,
            total_price INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'confirmed', 'cancelled', 'completed')),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_bookings_student ON bookings(student_id);
        CREATE INDEX IF NOT EXISTS idx_bookings_teacher ON bookings(teacher_id);

        -- Payment attempts, 1:1 with bookings.
        -- provider_ref is the webhook idempotency key; rows are never deleted.
        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            booking_id TEXT NOT NULL UNIQUE REFERENCES bookings(id),
            provider TEXT NOT NULL,
            provider_ref TEXT NOT NULL UNIQUE,
            snap_token TEXT,
            redirect_url TEXT,
            amount INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'paid', 'failed', 'expired')),
            is_refunded INTEGER NOT NULL DEFAULT 0,
            refunded_amount INTEGER,
            refund_reason TEXT,
            refunded_at INTEGER,
            refunded_by TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_transactions_provider_ref
            ON transactions(provider_ref);

        -- Best-effort in-app notifications
        CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            kind TEXT NOT NULL,
            payload TEXT,
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id);
        "#,
    )
}
