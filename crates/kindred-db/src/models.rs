/// Database row types — these map directly to SQLite rows.
/// Distinct from the kindred-types API models to keep the DB layer
/// independent.

#[derive(Debug)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub bio_visibility: bool,
    pub interests_visibility: bool,
    pub city: Option<String>,
    pub state: Option<String>,
    pub payment_tier: String,
    pub billing_customer_id: Option<String>,
    pub created_at: String,
}

/// Card fields for user listings. Never includes the password.
pub struct UserCardRow {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
}

pub struct InterestRow {
    pub id: String,
    pub user_id: String,
    pub category: String,
    pub visibility: bool,
}

pub struct ItemRow {
    pub id: String,
    pub interest_id: String,
    pub name: String,
    pub rating: i64,
}

pub struct FriendRequestRow {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub status: String,
    pub created_at: String,
}

/// Pending incoming request joined with the sender's card fields.
pub struct PendingRequestRow {
    pub id: String,
    pub sender_id: String,
    pub status: String,
    pub name: String,
    pub username: String,
    pub avatar: Option<String>,
}

pub struct FriendRow {
    pub id: String,
    pub name: String,
    pub username: String,
    pub avatar: Option<String>,
}

/// Non-friend listing row: card fields plus any outstanding request
/// between the two users, in either direction.
pub struct NotFriendRow {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub request_status: Option<String>,
    pub request_id: Option<String>,
}

pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub kind: String,
    pub read: bool,
    pub created_at: String,
}
