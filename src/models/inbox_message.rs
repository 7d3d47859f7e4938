use chrono::{DateTime, Utc};

/// Append-only secret message left for an ex-partner; deleted once read.
#[derive(Debug, Clone)]
pub struct InboxMessage {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
