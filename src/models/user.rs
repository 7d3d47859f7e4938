use chrono::{DateTime, Utc};

use super::{gender::Gender, preference::Preference, user_status::UserStatus};

/// One row per Telegram account. Created on first contact, never deleted;
/// mutated concurrently by the menu layer, the matchmaker and the payment
/// flow. `partner_id == 0` means no partner.
#[derive(Debug, Clone)]
pub struct User {
    pub telegram_id: i64,
    pub username: String,
    pub first_name: String,
    pub language_code: String,
    pub gender: Option<Gender>,
    pub preference: Option<Preference>,
    pub location: String,
    pub current_mood: String,
    pub status: UserStatus,
    pub partner_id: i64,
    pub last_partner_id: i64,
    pub last_message_id: i32,
    pub is_vip: bool,
    pub vip_expires_at: Option<DateTime<Utc>>,
    pub last_charge_id: String,
    pub is_banned: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(telegram_id: i64, username: String, first_name: String, language_code: String) -> Self {
        Self {
            telegram_id,
            username,
            first_name,
            language_code,
            gender: None,
            preference: None,
            location: String::new(),
            current_mood: String::new(),
            status: UserStatus::Onboarding,
            partner_id: 0,
            last_partner_id: 0,
            last_message_id: 0,
            is_vip: false,
            vip_expires_at: None,
            last_charge_id: String::new(),
            is_banned: false,
            created_at: Utc::now(),
        }
    }

    /// Gender and preference must both be set before any matching feature.
    pub fn profile_complete(&self) -> bool {
        self.gender.is_some() && self.preference.is_some()
    }
}
