/// Database row types — these map directly to SQLite rows.
/// Distinct from bolo-types API models to keep the DB layer independent.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub avatar_image: String,
    pub about: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub seq: i64,
    pub id: String,
    pub from_id: String,
    pub to_id: String,
    pub kind: String,
    pub text: String,
    pub image: String,
    pub audio: String,
    pub read: bool,
    /// Fixed-width RFC 3339 UTC with microseconds, so string order is time order.
    pub created_at: String,
}

/// Insert shape for `users`. `password` is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub avatar_image: String,
    pub about: String,
}
