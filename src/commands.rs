//! Command endpoints and the session transitions they drive. Everything here
//! works against the live user record; the matchmaker may mutate the same
//! row between any two statements.

use chrono::{Duration, Utc};
use rust_i18n::t;
use teloxide::{
    payloads::SendMessageSetters,
    prelude::*,
    types::{MessageId, ParseMode},
    utils::command::BotCommands,
};

use crate::models::{user::User, user_status::UserStatus};
use crate::{afk, config, db, keyboards, menu, HandlerResult};

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "👋 main menu / restart")]
    Start,

    #[command(description = "🔍 find a partner")]
    Search,

    #[command(description = "⏭ skip & search again")]
    Next,

    #[command(description = "⛔ end the chat")]
    Stop,

    #[command(description = "👤 my profile")]
    Profile,

    #[command(description = "🌟 vip upgrade")]
    Vip,

    #[command(description = "🔄 reconnect with your last partner")]
    Reconnect,

    #[command(description = "🤝 exchange usernames")]
    Share,

    #[command(description = "💌 read your secret messages")]
    Inbox,

    #[command(description = "🚨 report your partner")]
    Report,

    #[command(description = "🌐 change language")]
    Lang,

    #[command(description = "❓ help center")]
    Help,

    #[command(description = "admin: live stats")]
    Stats,

    #[command(description = "admin: message everyone")]
    Broadcast(String),

    #[command(description = "admin: grant vip days")]
    AddVip(String),
}

/// Load the caller's record; unknown users are routed into onboarding and
/// users with an incomplete profile are parked on the gender selector.
/// Returns `None` when the calling handler should stop.
pub(crate) async fn prepared_user(bot: &Bot, msg: &Message) -> Result<Option<User>, crate::Error> {
    let user = db().lock().await.get_user(msg.chat.id.0)?;

    let Some(user) = user else {
        start_onboarding(bot, msg).await?;
        return Ok(None);
    };

    if !user.profile_complete() && user.status != UserStatus::AwaitingLocation {
        let lang = user.language_code.as_str();
        bot.send_message(msg.chat.id, t!("profile_incomplete", locale = lang))
            .await?;
        menu::send_gender_selector(bot, &user, None).await?;
        return Ok(None);
    }

    Ok(Some(user))
}

pub(crate) async fn start_onboarding(bot: &Bot, msg: &Message) -> HandlerResult {
    let (username, first_name, lang) = match msg.from() {
        Some(from) => (
            from.username.clone().unwrap_or_default(),
            from.first_name.clone(),
            from.language_code
                .as_deref()
                .map(|code| code.chars().take(2).collect::<String>())
                .unwrap_or_else(|| config::get().default_lang.clone()),
        ),
        None => return Ok(()),
    };

    let user = User::new(msg.chat.id.0, username, first_name, lang);
    db().lock().await.create_user(&user)?;
    log::info!("new user {}", user.telegram_id);

    bot.send_message(msg.chat.id, t!("welcome", locale = &user.language_code))
        .await?;
    menu::send_gender_selector(bot, &user, None).await
}

pub async fn start(bot: Bot, msg: Message) -> HandlerResult {
    let Some(user) = prepared_user(&bot, &msg).await? else {
        return Ok(());
    };
    menu::send_main_menu(&bot, &user, None).await
}

pub async fn search(bot: Bot, msg: Message) -> HandlerResult {
    let Some(user) = prepared_user(&bot, &msg).await? else {
        return Ok(());
    };
    if user.status == UserStatus::Chatting {
        bot.send_message(msg.chat.id, t!("search_in_chat", locale = &user.language_code))
            .await?;
        return Ok(());
    }
    let user = clean_idle_state(user).await?;
    menu::send_mood_selector(&bot, &user, None).await
}

pub async fn stop(bot: Bot, msg: Message) -> HandlerResult {
    let Some(user) = prepared_user(&bot, &msg).await? else {
        return Ok(());
    };
    stop_chat(&bot, user).await
}

pub async fn next(bot: Bot, msg: Message) -> HandlerResult {
    let Some(user) = prepared_user(&bot, &msg).await? else {
        return Ok(());
    };
    skip_partner(&bot, user).await
}

pub async fn profile(bot: Bot, msg: Message) -> HandlerResult {
    let Some(user) = prepared_user(&bot, &msg).await? else {
        return Ok(());
    };
    menu::send_profile(&bot, &user, None).await
}

pub async fn vip(bot: Bot, msg: Message) -> HandlerResult {
    let Some(user) = prepared_user(&bot, &msg).await? else {
        return Ok(());
    };
    menu::send_vip_info(&bot, &user, None).await
}

pub async fn lang(bot: Bot, msg: Message) -> HandlerResult {
    let Some(user) = prepared_user(&bot, &msg).await? else {
        return Ok(());
    };
    menu::send_lang_selector(&bot, &user, None, "menu").await
}

pub async fn help(bot: Bot, msg: Message) -> HandlerResult {
    let Some(user) = prepared_user(&bot, &msg).await? else {
        return Ok(());
    };
    menu::send_help_menu(&bot, &user, None).await
}

pub async fn reconnect(bot: Bot, msg: Message) -> HandlerResult {
    let Some(user) = prepared_user(&bot, &msg).await? else {
        return Ok(());
    };
    reconnect_last_partner(&bot, user).await
}

pub async fn share(bot: Bot, msg: Message) -> HandlerResult {
    let Some(user) = prepared_user(&bot, &msg).await? else {
        return Ok(());
    };
    request_reveal(&bot, user).await
}

pub async fn inbox(bot: Bot, msg: Message) -> HandlerResult {
    let Some(user) = prepared_user(&bot, &msg).await? else {
        return Ok(());
    };
    let lang = user.language_code.as_str();

    let messages = {
        let store = db().lock().await;
        let messages = store.inbox_for(user.telegram_id)?;
        if !messages.is_empty() {
            store.clear_inbox(user.telegram_id)?;
        }
        messages
    };

    if messages.is_empty() {
        bot.send_message(msg.chat.id, t!("inbox_empty", locale = lang))
            .await?;
        return Ok(());
    }

    let mut text = t!("inbox_header", locale = lang);
    for message in &messages {
        text.push_str("\n\n💌 <i>");
        text.push_str(&menu::escape_html(&message.body));
        text.push_str("</i>");
    }
    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

pub async fn report(bot: Bot, msg: Message) -> HandlerResult {
    let Some(user) = prepared_user(&bot, &msg).await? else {
        return Ok(());
    };
    let lang = user.language_code.as_str();

    if user.partner_id == 0 && user.last_partner_id == 0 {
        bot.send_message(msg.chat.id, t!("report_error_no_chat", locale = lang))
            .await?;
        return Ok(());
    }

    bot.send_message(msg.chat.id, t!("report_menu_title", locale = lang))
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboards::report_reasons(lang))
        .await?;
    Ok(())
}

// ── session transitions ──────────────────────────────────────────────────

/// `queue`/`idle` housekeeping before showing the mood selector again.
pub(crate) async fn clean_idle_state(mut user: User) -> Result<User, crate::Error> {
    if user.status == UserStatus::Queue || user.status == UserStatus::Idle {
        user.status = UserStatus::Idle;
        user.partner_id = 0;
        db().lock().await.update_user(&user)?;
    }
    Ok(user)
}

pub(crate) async fn stop_chat(bot: &Bot, mut user: User) -> HandlerResult {
    let lang = user.language_code.to_string();

    match user.status {
        UserStatus::Queue => {
            user.status = UserStatus::Idle;
            user.partner_id = 0;
            db().lock().await.update_user(&user)?;

            let cancelled = t!("search_cancelled", locale = &lang);
            if user.last_message_id != 0 {
                let edit = bot
                    .edit_message_text(
                        ChatId(user.telegram_id),
                        MessageId(user.last_message_id),
                        cancelled.clone(),
                    )
                    .await;
                if edit.is_err() {
                    bot.send_message(ChatId(user.telegram_id), cancelled).await?;
                }
            } else {
                bot.send_message(ChatId(user.telegram_id), cancelled).await?;
            }
            menu::send_mood_selector(bot, &user, None).await
        }

        UserStatus::Chatting => {
            let partner_id = user.partner_id;
            afk::forget(user.telegram_id);

            user.last_partner_id = partner_id;
            user.status = UserStatus::Idle;
            user.partner_id = 0;
            db().lock().await.update_user(&user)?;

            bot.send_message(ChatId(user.telegram_id), t!("chat_ended", locale = &lang))
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboards::after_chat(&lang))
                .await?;
            menu::send_mood_selector(bot, &user, None).await?;

            release_partner(bot, user.telegram_id, partner_id).await
        }

        // Not searching, not chatting: just offer the selector.
        _ => menu::send_mood_selector(bot, &user, None).await,
    }
}

/// The "skip" variant: the initiator goes straight back into the queue with
/// the same mood while the partner drops to idle.
pub(crate) async fn skip_partner(bot: &Bot, mut user: User) -> HandlerResult {
    match user.status {
        UserStatus::Queue => menu::send_search_status(bot, &user, true).await,

        UserStatus::Chatting => {
            let partner_id = user.partner_id;
            afk::forget(user.telegram_id);

            user.last_partner_id = partner_id;
            user.status = UserStatus::Queue;
            user.partner_id = 0;
            db().lock().await.update_user(&user)?;

            menu::send_search_status(bot, &user, true).await?;
            release_partner(bot, user.telegram_id, partner_id).await
        }

        _ => menu::send_mood_selector(bot, &user, None).await,
    }
}

/// Drop the other half of a finished chat back to idle, but only if it still
/// points at the initiator; anything else means a concurrent transition beat
/// us and the record is not ours to touch.
async fn release_partner(bot: &Bot, initiator_id: i64, partner_id: i64) -> HandlerResult {
    if partner_id == 0 {
        return Ok(());
    }

    let partner = db().lock().await.get_user(partner_id)?;
    let Some(mut partner) = partner else {
        return Ok(());
    };
    if partner.partner_id != initiator_id {
        return Ok(());
    }

    afk::forget(partner_id);
    partner.last_partner_id = initiator_id;
    partner.status = UserStatus::Idle;
    partner.partner_id = 0;
    db().lock().await.update_user(&partner)?;

    let lang = partner.language_code.as_str();
    let notify = bot
        .send_message(ChatId(partner_id), t!("partner_left", locale = lang))
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboards::after_chat(lang))
        .await;
    if let Err(err) = notify {
        log::debug!("partner-left notice to {partner_id} failed: {err}");
        return Ok(());
    }

    menu::send_mood_selector(bot, &partner, None).await
}

/// VIP-only re-pairing with the saved ex-partner, bypassing the matchmaker.
/// Only valid while the ex-partner is idle; the write path is the same
/// transactional commit the matchmaker uses.
pub(crate) async fn reconnect_last_partner(bot: &Bot, mut user: User) -> HandlerResult {
    let lang = user.language_code.to_string();
    let chat_id = ChatId(user.telegram_id);

    if !user.is_vip {
        bot.send_message(chat_id, t!("vip_pitch", locale = &lang))
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboards::vip_pitch(&lang))
            .await?;
        return Ok(());
    }

    if user.last_partner_id == 0 {
        bot.send_message(chat_id, t!("reconnect_no_partner", locale = &lang))
            .await?;
        return Ok(());
    }

    let partner = db().lock().await.get_user(user.last_partner_id)?;
    let Some(mut partner) = partner else {
        bot.send_message(chat_id, t!("reconnect_partner_missing", locale = &lang))
            .await?;
        return Ok(());
    };

    if partner.status != UserStatus::Idle {
        bot.send_message(chat_id, t!("reconnect_partner_busy", locale = &lang))
            .await?;
        return Ok(());
    }

    user.status = UserStatus::Chatting;
    user.partner_id = partner.telegram_id;
    partner.status = UserStatus::Chatting;
    partner.partner_id = user.telegram_id;
    db().lock().await.commit_pair(&user, &partner)?;

    for side in [&user, &partner] {
        if side.last_message_id != 0 {
            let _ = bot
                .delete_message(ChatId(side.telegram_id), MessageId(side.last_message_id))
                .await;
        }
    }

    bot.send_message(chat_id, t!("reconnect_done_initiator", locale = &lang))
        .parse_mode(ParseMode::Html)
        .await?;
    let notify = bot
        .send_message(
            ChatId(partner.telegram_id),
            t!("reconnect_done_partner", locale = &partner.language_code),
        )
        .parse_mode(ParseMode::Html)
        .await;
    if let Err(err) = notify {
        log::debug!("reconnect notice to {} failed: {err}", partner.telegram_id);
    }
    Ok(())
}

/// Ask the partner for consent before any username changes hands.
pub(crate) async fn request_reveal(bot: &Bot, user: User) -> HandlerResult {
    let lang = user.language_code.as_str();
    let chat_id = ChatId(user.telegram_id);

    if user.status != UserStatus::Chatting || user.partner_id == 0 {
        bot.send_message(chat_id, t!("not_in_chat", locale = lang))
            .await?;
        return Ok(());
    }
    if user.username.is_empty() {
        bot.send_message(chat_id, t!("share_error_no_username", locale = lang))
            .await?;
        return Ok(());
    }

    bot.send_message(chat_id, t!("share_request_sent", locale = lang))
        .await?;

    let partner = db().lock().await.get_user(user.partner_id)?;
    let Some(partner) = partner else {
        return Ok(());
    };
    let partner_lang = partner.language_code.as_str();
    bot.send_message(
        ChatId(partner.telegram_id),
        t!("share_request_received", locale = partner_lang),
    )
    .parse_mode(ParseMode::Html)
    .reply_markup(keyboards::reveal_confirm(partner_lang))
    .await?;
    Ok(())
}

// ── admin ────────────────────────────────────────────────────────────────

fn admin_only(msg: &Message) -> bool {
    config::get().is_admin(msg.chat.id.0)
}

pub async fn stats(bot: Bot, msg: Message) -> HandlerResult {
    if !admin_only(&msg) {
        return Ok(());
    }

    let (total, chatting, queued, vips) = {
        let store = db().lock().await;
        let (chatting, queued, vips) = store.live_stats()?;
        (store.count_users()?, chatting, queued, vips)
    };

    bot.send_message(
        msg.chat.id,
        format!(
            "📊 <b>REAL-TIME STATS</b>\n\n👥 Total users: {total}\n💬 Chatting: {chatting} ({} pairs)\n⏳ Queued: {queued}\n🌟 VIPs: {vips}",
            chatting / 2
        ),
    )
    .parse_mode(ParseMode::Html)
    .await?;
    Ok(())
}

pub async fn broadcast(bot: Bot, msg: Message, text: String) -> HandlerResult {
    if !admin_only(&msg) {
        return Ok(());
    }
    if text.trim().is_empty() {
        bot.send_message(msg.chat.id, "Usage: /broadcast <text>").await?;
        return Ok(());
    }

    let ids = db().lock().await.all_user_ids()?;
    let mut delivered = 0usize;
    for id in &ids {
        if bot.send_message(ChatId(*id), text.clone()).await.is_ok() {
            delivered += 1;
        }
    }
    log::info!("broadcast delivered to {delivered}/{} users", ids.len());

    bot.send_message(
        msg.chat.id,
        format!("📢 Broadcast delivered to {delivered}/{} users.", ids.len()),
    )
    .await?;
    Ok(())
}

pub async fn add_vip(bot: Bot, msg: Message, args: String) -> HandlerResult {
    if !admin_only(&msg) {
        return Ok(());
    }

    let mut parts = args.split_whitespace();
    let target = parts.next().and_then(|raw| raw.parse::<i64>().ok());
    let days = parts.next().and_then(|raw| raw.parse::<i64>().ok());
    let (Some(target), Some(days)) = (target, days) else {
        bot.send_message(msg.chat.id, "Usage: /addvip <telegram_id> <days>")
            .await?;
        return Ok(());
    };

    let updated = {
        let store = db().lock().await;
        match store.get_user(target)? {
            Some(mut user) => {
                user.is_vip = true;
                // days <= 0 grants lifetime access.
                user.vip_expires_at =
                    (days > 0).then(|| Utc::now() + Duration::days(days));
                store.update_user(&user)?;
                true
            }
            None => false,
        }
    };

    let reply = if updated {
        format!("🌟 User {target} is now VIP for {days} days.")
    } else {
        format!("User {target} not found.")
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}
