use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result, Row};

use crate::models::{
    gender::Gender, inbox_message::InboxMessage, preference::Preference, user::User,
    user_status::UserStatus,
};

pub struct Database {
    connection: Connection,
}

impl Database {
    pub fn new(db_path: &str) -> Result<Self> {
        let connection = Connection::open(db_path)?;
        Self::with_connection(connection)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(connection: Connection) -> Result<Self> {
        connection.execute(
            "CREATE TABLE IF NOT EXISTS users (
                  telegram_id INTEGER PRIMARY KEY,
                  username TEXT NOT NULL DEFAULT '',
                  first_name TEXT NOT NULL DEFAULT '',
                  language_code TEXT NOT NULL DEFAULT 'en',
                  gender TEXT NOT NULL DEFAULT '',
                  preference TEXT NOT NULL DEFAULT '',
                  location TEXT NOT NULL DEFAULT '',
                  current_mood TEXT NOT NULL DEFAULT '',
                  status TEXT NOT NULL DEFAULT 'onboarding',
                  partner_id INTEGER NOT NULL DEFAULT 0,
                  last_partner_id INTEGER NOT NULL DEFAULT 0,
                  last_message_id INTEGER NOT NULL DEFAULT 0,
                  is_vip INTEGER NOT NULL DEFAULT 0,
                  vip_expires_at TEXT,
                  last_charge_id TEXT NOT NULL DEFAULT '',
                  is_banned INTEGER NOT NULL DEFAULT 0,
                  created_at TEXT NOT NULL
                  )",
            [],
        )?;
        connection.execute(
            "CREATE TABLE IF NOT EXISTS inbox_messages (
                  id INTEGER PRIMARY KEY AUTOINCREMENT,
                  sender_id INTEGER NOT NULL,
                  receiver_id INTEGER NOT NULL,
                  body TEXT NOT NULL,
                  created_at TEXT NOT NULL
                  )",
            [],
        )?;
        Ok(Database { connection })
    }

    pub fn create_user(&self, user: &User) -> Result<()> {
        self.connection.execute(
            "INSERT INTO users (telegram_id, username, first_name, language_code, gender,
                  preference, location, current_mood, status, partner_id, last_partner_id,
                  last_message_id, is_vip, vip_expires_at, last_charge_id, is_banned, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                user.telegram_id,
                user.username,
                user.first_name,
                user.language_code,
                user.gender.map(|g| g.as_str()).unwrap_or(""),
                user.preference.map(|p| p.as_str()).unwrap_or(""),
                user.location,
                user.current_mood,
                user.status.as_str(),
                user.partner_id,
                user.last_partner_id,
                user.last_message_id,
                user.is_vip,
                user.vip_expires_at.map(|t| t.to_rfc3339()),
                user.last_charge_id,
                user.is_banned,
                user.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Point lookup. A VIP whose expiry has passed is downgraded here before
    /// the record is handed to the caller, so stale flags never grant
    /// privilege.
    pub fn get_user(&self, telegram_id: i64) -> Result<Option<User>> {
        let mut stmt = self
            .connection
            .prepare("SELECT * FROM users WHERE telegram_id = ?1")?;
        let mut rows = stmt.query_map(params![telegram_id], row_to_user)?;

        let mut user = match rows.next() {
            Some(user) => user?,
            None => return Ok(None),
        };

        if vip_expired(&user) {
            user.is_vip = false;
            user.vip_expires_at = None;
            self.update_user(&user)?;
            log::info!("user {} VIP expired, downgraded", user.telegram_id);
        }

        Ok(Some(user))
    }

    /// Full-record, last-writer-wins write. There is no concurrency token;
    /// the matchmaker compensates by re-validating right before it commits.
    pub fn update_user(&self, user: &User) -> Result<()> {
        write_user(&self.connection, user)?;
        Ok(())
    }

    /// Everyone queued under `mood`, ordered by id so the matchmaker's
    /// nested scan is stable across re-reads of an unchanged queue.
    pub fn list_queued(&self, mood: &str) -> Result<Vec<User>> {
        let mut stmt = self.connection.prepare(
            "SELECT * FROM users
             WHERE status = 'queue' AND current_mood = ?1
             ORDER BY telegram_id",
        )?;
        let rows = stmt.query_map(params![mood], row_to_user)?;
        rows.collect()
    }

    /// Persist both sides of a pairing in one transaction. Either both user
    /// records flip to chatting or neither does.
    pub fn commit_pair(&mut self, a: &User, b: &User) -> Result<()> {
        let tx = self.connection.transaction()?;
        write_user(&tx, a)?;
        write_user(&tx, b)?;
        tx.commit()
    }

    pub fn count_users(&self) -> Result<i64> {
        self.connection
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
    }

    /// (chatting, queued, vip) counts for /stats.
    pub fn live_stats(&self) -> Result<(i64, i64, i64)> {
        let count = |sql: &str| -> Result<i64> {
            self.connection.query_row(sql, [], |row| row.get(0))
        };
        Ok((
            count("SELECT COUNT(*) FROM users WHERE status = 'chatting'")?,
            count("SELECT COUNT(*) FROM users WHERE status = 'queue'")?,
            count("SELECT COUNT(*) FROM users WHERE is_vip = 1")?,
        ))
    }

    pub fn all_user_ids(&self) -> Result<Vec<i64>> {
        let mut stmt = self.connection.prepare("SELECT telegram_id FROM users")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect()
    }

    pub fn save_inbox_message(&self, sender_id: i64, receiver_id: i64, body: &str) -> Result<()> {
        self.connection.execute(
            "INSERT INTO inbox_messages (sender_id, receiver_id, body, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![sender_id, receiver_id, body, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn inbox_for(&self, receiver_id: i64) -> Result<Vec<InboxMessage>> {
        let mut stmt = self.connection.prepare(
            "SELECT id, sender_id, receiver_id, body, created_at
             FROM inbox_messages WHERE receiver_id = ?1 ORDER BY created_at",
        )?;
        let rows = stmt.query_map(params![receiver_id], |row| {
            Ok(InboxMessage {
                id: row.get(0)?,
                sender_id: row.get(1)?,
                receiver_id: row.get(2)?,
                body: row.get(3)?,
                created_at: parse_timestamp(row.get::<_, String>(4)?.as_str()),
            })
        })?;
        rows.collect()
    }

    pub fn clear_inbox(&self, receiver_id: i64) -> Result<()> {
        self.connection.execute(
            "DELETE FROM inbox_messages WHERE receiver_id = ?1",
            params![receiver_id],
        )?;
        Ok(())
    }
}

fn vip_expired(user: &User) -> bool {
    // No expiry date on a VIP means lifetime access.
    match (user.is_vip, user.vip_expires_at) {
        (true, Some(expires_at)) => Utc::now() > expires_at,
        _ => false,
    }
}

fn write_user(connection: &Connection, user: &User) -> Result<usize> {
    connection.execute(
        "UPDATE users SET
              username = ?2, first_name = ?3, language_code = ?4, gender = ?5,
              preference = ?6, location = ?7, current_mood = ?8, status = ?9,
              partner_id = ?10, last_partner_id = ?11, last_message_id = ?12,
              is_vip = ?13, vip_expires_at = ?14, last_charge_id = ?15, is_banned = ?16
         WHERE telegram_id = ?1",
        params![
            user.telegram_id,
            user.username,
            user.first_name,
            user.language_code,
            user.gender.map(|g| g.as_str()).unwrap_or(""),
            user.preference.map(|p| p.as_str()).unwrap_or(""),
            user.location,
            user.current_mood,
            user.status.as_str(),
            user.partner_id,
            user.last_partner_id,
            user.last_message_id,
            user.is_vip,
            user.vip_expires_at.map(|t| t.to_rfc3339()),
            user.last_charge_id,
            user.is_banned,
        ],
    )
}

fn row_to_user(row: &Row) -> Result<User> {
    Ok(User {
        telegram_id: row.get("telegram_id")?,
        username: row.get("username")?,
        first_name: row.get("first_name")?,
        language_code: row.get("language_code")?,
        gender: Gender::from_code(row.get::<_, String>("gender")?.as_str()),
        preference: Preference::from_code(row.get::<_, String>("preference")?.as_str()),
        location: row.get("location")?,
        current_mood: row.get("current_mood")?,
        status: UserStatus::from_code(row.get::<_, String>("status")?.as_str()),
        partner_id: row.get("partner_id")?,
        last_partner_id: row.get("last_partner_id")?,
        last_message_id: row.get("last_message_id")?,
        is_vip: row.get("is_vip")?,
        vip_expires_at: row
            .get::<_, Option<String>>("vip_expires_at")?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc)),
        last_charge_id: row.get("last_charge_id")?,
        is_banned: row.get("is_banned")?,
        created_at: parse_timestamp(row.get::<_, String>("created_at")?.as_str()),
    })
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn sample_user(id: i64) -> User {
        let mut user = User::new(id, format!("user{id}"), format!("User {id}"), "en".into());
        user.gender = Some(Gender::Male);
        user.preference = Some(Preference::Both);
        user.status = UserStatus::Idle;
        user
    }

    #[test]
    fn create_get_update_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let mut user = sample_user(7);
        user.location = "🇮🇩 Indonesia".into();
        db.create_user(&user).unwrap();

        let mut stored = db.get_user(7).unwrap().unwrap();
        assert_eq!(stored.username, "user7");
        assert_eq!(stored.gender, Some(Gender::Male));
        assert_eq!(stored.location, "🇮🇩 Indonesia");
        assert_eq!(stored.status, UserStatus::Idle);

        stored.status = UserStatus::Queue;
        stored.current_mood = "fun".into();
        db.update_user(&stored).unwrap();

        let again = db.get_user(7).unwrap().unwrap();
        assert_eq!(again.status, UserStatus::Queue);
        assert_eq!(again.current_mood, "fun");
    }

    #[test]
    fn missing_user_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_user(404).unwrap().is_none());
    }

    #[test]
    fn list_queued_filters_by_status_and_mood() {
        let db = Database::open_in_memory().unwrap();
        for id in 1..=4 {
            let mut user = sample_user(id);
            user.status = if id == 4 { UserStatus::Idle } else { UserStatus::Queue };
            user.current_mood = if id == 3 { "fun".into() } else { "dating".into() };
            db.create_user(&user).unwrap();
        }

        let queued: Vec<i64> = db
            .list_queued("dating")
            .unwrap()
            .into_iter()
            .map(|u| u.telegram_id)
            .collect();
        assert_eq!(queued, vec![1, 2]);
    }

    #[test]
    fn expired_vip_is_downgraded_on_read() {
        let db = Database::open_in_memory().unwrap();
        let mut user = sample_user(9);
        user.is_vip = true;
        user.vip_expires_at = Some(Utc::now() - Duration::hours(1));
        db.create_user(&user).unwrap();

        let stored = db.get_user(9).unwrap().unwrap();
        assert!(!stored.is_vip);
        assert!(stored.vip_expires_at.is_none());

        // The downgrade is persisted, not just applied to the returned copy.
        let again = db.get_user(9).unwrap().unwrap();
        assert!(!again.is_vip);
    }

    #[test]
    fn lifetime_vip_is_not_downgraded() {
        let db = Database::open_in_memory().unwrap();
        let mut user = sample_user(10);
        user.is_vip = true;
        user.vip_expires_at = None;
        db.create_user(&user).unwrap();

        assert!(db.get_user(10).unwrap().unwrap().is_vip);
    }

    #[test]
    fn commit_pair_writes_both_records() {
        let mut db = Database::open_in_memory().unwrap();
        let mut a = sample_user(1);
        let mut b = sample_user(2);
        db.create_user(&a).unwrap();
        db.create_user(&b).unwrap();

        a.status = UserStatus::Chatting;
        a.partner_id = 2;
        b.status = UserStatus::Chatting;
        b.partner_id = 1;
        db.commit_pair(&a, &b).unwrap();

        assert_eq!(db.get_user(1).unwrap().unwrap().partner_id, 2);
        assert_eq!(db.get_user(2).unwrap().unwrap().partner_id, 1);
    }

    #[test]
    fn inbox_round_trip_and_clear() {
        let db = Database::open_in_memory().unwrap();
        db.save_inbox_message(1, 2, "hello").unwrap();
        db.save_inbox_message(3, 2, "again").unwrap();
        db.save_inbox_message(1, 5, "other").unwrap();

        let inbox = db.inbox_for(2).unwrap();
        assert_eq!(inbox.len(), 2);
        assert_eq!(inbox[0].body, "hello");

        db.clear_inbox(2).unwrap();
        assert!(db.inbox_for(2).unwrap().is_empty());
        assert_eq!(db.inbox_for(5).unwrap().len(), 1);
    }
}
