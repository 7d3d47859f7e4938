//! AFK monitor for active chats. Tracks the last relay activity per user in
//! memory and nudges quiet chatters twice; purely advisory, never mutates
//! user records.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use rust_i18n::t;
use teloxide::prelude::*;
use tokio::sync::Mutex as TokioMutex;

use crate::database::Database;
use crate::models::user_status::UserStatus;

static LAST_ACTIVITY: Lazy<Mutex<HashMap<i64, Instant>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

pub fn touch(telegram_id: i64) {
    LAST_ACTIVITY
        .lock()
        .unwrap()
        .insert(telegram_id, Instant::now());
}

pub fn forget(telegram_id: i64) {
    LAST_ACTIVITY.lock().unwrap().remove(&telegram_id);
}

pub async fn run(bot: Bot, db: &'static TokioMutex<Database>) {
    log::info!("afk monitor started");
    loop {
        tokio::time::sleep(Duration::from_secs(60)).await;
        sweep(&bot, db).await;
    }
}

async fn sweep(bot: &Bot, db: &TokioMutex<Database>) {
    let snapshot: Vec<(i64, u64)> = LAST_ACTIVITY
        .lock()
        .unwrap()
        .iter()
        .map(|(id, last_seen)| (*id, last_seen.elapsed().as_secs() / 60))
        .collect();

    for (telegram_id, idle_minutes) in snapshot {
        let key = match idle_minutes {
            5 => "afk_alert_1",
            20 => "afk_alert_2",
            _ => continue,
        };
        nudge(bot, db, telegram_id, key).await;
    }
}

async fn nudge(bot: &Bot, db: &TokioMutex<Database>, telegram_id: i64, key: &str) {
    let user = match db.lock().await.get_user(telegram_id) {
        Ok(Some(user)) => user,
        _ => {
            forget(telegram_id);
            return;
        }
    };
    if user.status != UserStatus::Chatting {
        forget(telegram_id);
        return;
    }

    let text = t!(key, locale = &user.language_code);
    if let Err(err) = bot.send_message(ChatId(telegram_id), text).await {
        log::debug!("afk nudge to {telegram_id} failed: {err}");
    }
}
