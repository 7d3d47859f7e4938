//! Menu rendering shared by the command, callback and message layers. New
//! menu messages record their id on the user so later edits and cleanups can
//! target them.

use rust_i18n::t;
use teloxide::{
    payloads::{EditMessageTextSetters, SendMessageSetters},
    prelude::*,
    types::{InlineKeyboardMarkup, MessageId, ParseMode},
};

use crate::config::MatchPolicy;
use crate::keyboards;
use crate::models::user::User;
use crate::{db, HandlerResult};

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Edit in place when a source message id is given, otherwise send a new
/// message and remember its id as the user's current menu. Edit failures are
/// logged only; the menu will be replaced on the next interaction anyway.
pub async fn send_or_edit(
    bot: &Bot,
    chat_id: ChatId,
    text: String,
    markup: InlineKeyboardMarkup,
    edit: Option<MessageId>,
) -> HandlerResult {
    if let Some(message_id) = edit {
        match bot
            .edit_message_text(chat_id, message_id, text.clone())
            .parse_mode(ParseMode::Html)
            .reply_markup(markup.clone())
            .await
        {
            Ok(_) => return Ok(()),
            // The target may already be gone (e.g. swept by the matchmaker);
            // fall through to a fresh send.
            Err(err) => log::debug!("menu edit in {chat_id} failed: {err}"),
        }
    }

    let sent = bot
        .send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(markup)
        .await?;

    let store = db().lock().await;
    if let Some(mut user) = store.get_user(chat_id.0)? {
        user.last_message_id = sent.id.0;
        store.update_user(&user)?;
    }
    Ok(())
}

pub async fn send_main_menu(bot: &Bot, user: &User, edit: Option<MessageId>) -> HandlerResult {
    let lang = user.language_code.as_str();
    send_or_edit(
        bot,
        ChatId(user.telegram_id),
        t!("welcome_caption", locale = lang),
        keyboards::main_menu(lang),
        edit,
    )
    .await
}

pub async fn send_profile(bot: &Bot, user: &User, edit: Option<MessageId>) -> HandlerResult {
    let lang = user.language_code.as_str();

    let gender = match user.gender {
        Some(g) => t!(&format!("btn_{}", g.as_str()), locale = lang),
        None => "—".to_string(),
    };
    let preference = match user.preference {
        Some(p) => t!(&format!("btn_{}", p.as_str()), locale = lang),
        None => "—".to_string(),
    };
    let location = if user.location.is_empty() || user.location == "-" {
        "🌍 Global / Not Set".to_string()
    } else {
        user.location.clone()
    };
    let status = if user.is_vip {
        t!("profile_status_vip", locale = lang)
    } else {
        t!("profile_status_free", locale = lang)
    };

    let text = t!(
        "profile_view",
        locale = lang,
        name = escape_html(&user.first_name),
        gender = gender,
        preference = preference,
        location = location,
        status = status
    );

    send_or_edit(
        bot,
        ChatId(user.telegram_id),
        text,
        keyboards::profile_menu(lang),
        edit,
    )
    .await
}

pub async fn send_gender_selector(bot: &Bot, user: &User, edit: Option<MessageId>) -> HandlerResult {
    let lang = user.language_code.as_str();
    let with_back = edit.is_some() && user.profile_complete();
    send_or_edit(
        bot,
        ChatId(user.telegram_id),
        t!("ask_gender", locale = lang),
        keyboards::gender_selector(lang, with_back),
        edit,
    )
    .await
}

pub async fn send_preference_selector(
    bot: &Bot,
    user: &User,
    edit: Option<MessageId>,
) -> HandlerResult {
    let lang = user.language_code.as_str();
    let with_back = edit.is_some() && user.profile_complete();
    send_or_edit(
        bot,
        ChatId(user.telegram_id),
        t!("ask_preference", locale = lang),
        keyboards::preference_selector(lang, with_back),
        edit,
    )
    .await
}

pub async fn send_lang_selector(
    bot: &Bot,
    user: &User,
    edit: Option<MessageId>,
    origin: &str,
) -> HandlerResult {
    let lang = user.language_code.as_str();
    send_or_edit(
        bot,
        ChatId(user.telegram_id),
        t!("ask_lang", locale = lang),
        keyboards::lang_selector(lang, origin),
        edit,
    )
    .await
}

pub async fn send_location_selector(
    bot: &Bot,
    user: &User,
    edit: Option<MessageId>,
) -> HandlerResult {
    let lang = user.language_code.as_str();
    send_or_edit(
        bot,
        ChatId(user.telegram_id),
        t!("ask_location", locale = lang),
        keyboards::location_selector(lang),
        edit,
    )
    .await
}

pub async fn send_mood_selector(bot: &Bot, user: &User, edit: Option<MessageId>) -> HandlerResult {
    let lang = user.language_code.as_str();
    send_or_edit(
        bot,
        ChatId(user.telegram_id),
        t!("select_mood", locale = lang),
        keyboards::mood_selector(lang),
        edit,
    )
    .await
}

pub async fn send_vip_info(bot: &Bot, user: &User, edit: Option<MessageId>) -> HandlerResult {
    let lang = user.language_code.as_str();
    send_or_edit(
        bot,
        ChatId(user.telegram_id),
        t!("vip_info", locale = lang),
        keyboards::vip_plans(lang),
        edit,
    )
    .await
}

pub async fn send_help_menu(bot: &Bot, user: &User, edit: Option<MessageId>) -> HandlerResult {
    let lang = user.language_code.as_str();
    send_or_edit(
        bot,
        ChatId(user.telegram_id),
        t!("help_menu", locale = lang),
        keyboards::help_menu(lang),
        edit,
    )
    .await
}

/// The "searching…" card with a cancel button, shown while queued. Edits the
/// previous menu message when we still know it.
pub async fn send_search_status(bot: &Bot, user: &User, skipping: bool) -> HandlerResult {
    let lang = user.language_code.as_str();
    let mood_label = t!(
        &MatchPolicy::mood_label_key(&user.current_mood),
        locale = lang
    );

    let mut text = String::new();
    if skipping {
        text.push_str(&t!("skipping", locale = lang));
        text.push('\n');
    }
    text.push_str(&t!("joined_queue", locale = lang, mood = mood_label));
    text.push_str("\n\n⏳ <i>");
    text.push_str(&t!("searching_hint", locale = lang));
    text.push_str("</i>");

    let edit = if user.last_message_id != 0 {
        Some(MessageId(user.last_message_id))
    } else {
        None
    };
    send_or_edit(
        bot,
        ChatId(user.telegram_id),
        text,
        keyboards::cancel_search(lang),
        edit,
    )
    .await
}
