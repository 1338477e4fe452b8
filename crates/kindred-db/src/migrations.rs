use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                   TEXT PRIMARY KEY,
            name                 TEXT NOT NULL,
            username             TEXT NOT NULL UNIQUE,
            email                TEXT NOT NULL UNIQUE,
            password             TEXT NOT NULL,
            avatar               TEXT,
            bio                  TEXT,
            bio_visibility       INTEGER NOT NULL DEFAULT 1,
            interests_visibility INTEGER NOT NULL DEFAULT 1,
            city                 TEXT,
            state                TEXT,
            payment_tier         TEXT NOT NULL DEFAULT 'Free'
                CHECK (payment_tier IN ('Free', 'Basic', 'Premium', 'Owner')),
            billing_customer_id  TEXT,
            created_at           TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS interests (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            category    TEXT NOT NULL,
            visibility  INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_interests_user
            ON interests(user_id);

        CREATE TABLE IF NOT EXISTS items (
            id          TEXT PRIMARY KEY,
            interest_id TEXT NOT NULL REFERENCES interests(id) ON DELETE CASCADE,
            name        TEXT NOT NULL CHECK (length(trim(name)) > 0),
            rating      INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 10),
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_items_interest
            ON items(interest_id);

        CREATE TABLE IF NOT EXISTS friend_requests (
            id          TEXT PRIMARY KEY,
            sender_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            receiver_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            status      TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'accepted', 'rejected')),
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- At most one pending request per ordered (sender, receiver) pair.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_friend_requests_pending
            ON friend_requests(sender_id, receiver_id) WHERE status = 'pending';

        CREATE INDEX IF NOT EXISTS idx_friend_requests_receiver
            ON friend_requests(receiver_id, status);

        -- Friendship is symmetric: rows always exist in (a,b)/(b,a) pairs,
        -- written together in one transaction on acceptance.
        CREATE TABLE IF NOT EXISTS friendships (
            user_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            friend_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (user_id, friend_id)
        );

        CREATE TABLE IF NOT EXISTS notifications (
            id         TEXT PRIMARY KEY,
            user_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            content    TEXT NOT NULL,
            type       TEXT NOT NULL,
            read       INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_user
            ON notifications(user_id, created_at);

        -- Set once the external payment cleanup for an account closure has
        -- completed; a retried closure skips the processor calls.
        CREATE TABLE IF NOT EXISTS billing_cleanups (
            user_id    TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
