//! Callback-query routing. Data strings follow the `verb:arg` convention
//! produced by `keyboards.rs`.

use rust_i18n::t;
use teloxide::{
    payloads::SendMessageSetters,
    prelude::*,
    types::{MessageId, ParseMode},
};

use crate::models::{gender::Gender, preference::Preference, user::User, user_status::UserStatus};
use crate::{commands, config, db, keyboards, menu, payments, HandlerResult};

pub async fn on_callback(bot: Bot, q: CallbackQuery) -> HandlerResult {
    if let Err(err) = bot.answer_callback_query(q.id.clone()).await {
        log::debug!("callback ack failed: {err}");
    }

    let Some(data) = q.data else {
        return Ok(());
    };
    let Some(message) = q.message else {
        return Ok(());
    };
    let chat_id = message.chat.id;
    let msg_id = message.id;

    let user = db().lock().await.get_user(chat_id.0)?;
    let Some(user) = user else {
        return Ok(());
    };

    // Profile gate: until gender and preference are set, only the setup
    // actions are reachable.
    let is_setup = data.starts_with("gender:")
        || data.starts_with("pref:")
        || data.starts_with("setlang:")
        || data == "edit:lang_from_menu";
    if !user.profile_complete() && !is_setup {
        return menu::send_gender_selector(&bot, &user, Some(msg_id)).await;
    }

    let (verb, arg) = data.split_once(':').unwrap_or((data.as_str(), ""));
    match verb {
        "cmd" => handle_command_button(&bot, user, chat_id, msg_id, arg).await,
        "back" => handle_back(&bot, user, chat_id, msg_id, arg).await,
        "edit" => handle_edit(&bot, user, chat_id, msg_id, arg).await,
        "help" => {
            let lang = user.language_code.as_str();
            let content = t!(&format!("help_content_{arg}"), locale = lang);
            menu::send_or_edit(&bot, chat_id, content, keyboards::back_to_help(lang), Some(msg_id))
                .await
        }
        "gender" => set_gender(&bot, user, msg_id, arg).await,
        "pref" => set_preference(&bot, user, chat_id, msg_id, arg).await,
        "setlang" => set_language(&bot, user, chat_id, msg_id, arg).await,
        "setloc" => set_location(&bot, user, msg_id, arg).await,
        "mood" => enqueue(&bot, user, msg_id, arg).await,
        "buy" => payments::send_invoice(&bot, chat_id, arg, &user.language_code).await,
        "reveal" => handle_reveal(&bot, user, chat_id, msg_id, arg).await,
        "report" => handle_report(&bot, user, chat_id, msg_id, arg).await,
        _ => Ok(()),
    }
}

async fn handle_command_button(
    bot: &Bot,
    user: User,
    chat_id: ChatId,
    msg_id: MessageId,
    arg: &str,
) -> HandlerResult {
    match arg {
        "stop" => commands::stop_chat(bot, user).await,

        "search" => {
            let _ = bot.delete_message(chat_id, msg_id).await;
            let user = commands::clean_idle_state(user).await?;
            menu::send_mood_selector(bot, &user, None).await
        }

        "profile" => {
            let _ = bot.delete_message(chat_id, msg_id).await;
            menu::send_profile(bot, &user, None).await
        }

        "vip" => {
            let _ = bot.delete_message(chat_id, msg_id).await;
            menu::send_vip_info(bot, &user, None).await
        }

        "help" => {
            let _ = bot.delete_message(chat_id, msg_id).await;
            menu::send_help_menu(bot, &user, None).await
        }

        "reconnect_teaser" => {
            if user.is_vip {
                commands::reconnect_last_partner(bot, user).await
            } else {
                let lang = user.language_code.as_str();
                bot.send_message(chat_id, t!("vip_pitch", locale = lang))
                    .parse_mode(ParseMode::Html)
                    .reply_markup(keyboards::vip_pitch(lang))
                    .await?;
                Ok(())
            }
        }

        "secret" => begin_secret(bot, user, chat_id).await,

        "dismiss" => {
            let _ = bot.delete_message(chat_id, msg_id).await;
            Ok(())
        }

        _ => Ok(()),
    }
}

async fn handle_back(
    bot: &Bot,
    user: User,
    chat_id: ChatId,
    msg_id: MessageId,
    arg: &str,
) -> HandlerResult {
    match arg {
        "menu" => {
            let _ = bot.delete_message(chat_id, msg_id).await;
            menu::send_main_menu(bot, &user, None).await
        }
        "profile" => menu::send_profile(bot, &user, Some(msg_id)).await,
        "help_menu" => menu::send_help_menu(bot, &user, Some(msg_id)).await,
        _ => Ok(()),
    }
}

async fn handle_edit(
    bot: &Bot,
    mut user: User,
    chat_id: ChatId,
    msg_id: MessageId,
    arg: &str,
) -> HandlerResult {
    match arg {
        "gender" => menu::send_gender_selector(bot, &user, Some(msg_id)).await,
        "pref" => menu::send_preference_selector(bot, &user, Some(msg_id)).await,
        "loc" => menu::send_location_selector(bot, &user, Some(msg_id)).await,
        "loc_text" => {
            user.status = UserStatus::AwaitingLocation;
            db().lock().await.update_user(&user)?;
            bot.send_message(chat_id, t!("ask_location_text", locale = &user.language_code))
                .await?;
            Ok(())
        }
        "lang_from_menu" => {
            let _ = bot.delete_message(chat_id, msg_id).await;
            menu::send_lang_selector(bot, &user, None, "menu").await
        }
        "lang_from_profile" => menu::send_lang_selector(bot, &user, Some(msg_id), "profile").await,
        _ => Ok(()),
    }
}

async fn set_gender(bot: &Bot, mut user: User, msg_id: MessageId, code: &str) -> HandlerResult {
    let Some(gender) = Gender::from_code(code) else {
        return Ok(());
    };
    user.gender = Some(gender);
    db().lock().await.update_user(&user)?;

    // Mid-onboarding the next step is the preference question.
    if user.status == UserStatus::Onboarding || user.preference.is_none() {
        menu::send_preference_selector(bot, &user, Some(msg_id)).await
    } else {
        menu::send_profile(bot, &user, Some(msg_id)).await
    }
}

async fn set_preference(
    bot: &Bot,
    mut user: User,
    chat_id: ChatId,
    msg_id: MessageId,
    code: &str,
) -> HandlerResult {
    let Some(preference) = Preference::from_code(code) else {
        return Ok(());
    };
    user.preference = Some(preference);

    if user.status == UserStatus::Onboarding {
        user.status = UserStatus::Idle;
        db().lock().await.update_user(&user)?;

        bot.send_message(chat_id, t!("setup_complete", locale = &user.language_code))
            .await?;
        let _ = bot.delete_message(chat_id, msg_id).await;
        menu::send_main_menu(bot, &user, None).await
    } else {
        db().lock().await.update_user(&user)?;
        menu::send_profile(bot, &user, Some(msg_id)).await
    }
}

async fn set_language(
    bot: &Bot,
    mut user: User,
    chat_id: ChatId,
    msg_id: MessageId,
    arg: &str,
) -> HandlerResult {
    let (code, origin) = arg.split_once(':').unwrap_or((arg, "menu"));
    user.language_code = code.to_string();
    db().lock().await.update_user(&user)?;

    if origin == "menu" {
        let _ = bot.delete_message(chat_id, msg_id).await;
        menu::send_main_menu(bot, &user, None).await
    } else {
        menu::send_profile(bot, &user, Some(msg_id)).await
    }
}

async fn set_location(bot: &Bot, mut user: User, msg_id: MessageId, arg: &str) -> HandlerResult {
    let (label, icon) = arg.split_once('|').unwrap_or((arg, ""));
    user.location = if icon.is_empty() {
        label.to_string()
    } else {
        format!("{icon} {label}")
    };
    db().lock().await.update_user(&user)?;
    menu::send_profile(bot, &user, Some(msg_id)).await
}

/// `idle → queue`: the only way into a pool. The selector message becomes
/// the "searching…" card and stays addressable through `last_message_id` so
/// the matchmaker can sweep it on a match.
async fn enqueue(bot: &Bot, mut user: User, msg_id: MessageId, code: &str) -> HandlerResult {
    // Never yank someone out of a live chat through a stale selector.
    if user.status == UserStatus::Chatting {
        return Ok(());
    }

    let known = config::get()
        .matching
        .moods
        .iter()
        .any(|mood| mood.code == code);
    if !known {
        return Ok(());
    }

    user.current_mood = code.to_string();
    user.status = UserStatus::Queue;
    user.partner_id = 0;
    user.last_message_id = msg_id.0;
    db().lock().await.update_user(&user)?;

    menu::send_search_status(bot, &user, false).await
}

async fn begin_secret(bot: &Bot, mut user: User, chat_id: ChatId) -> HandlerResult {
    let lang = user.language_code.to_string();
    if user.last_partner_id == 0 {
        bot.send_message(chat_id, t!("secret_no_target", locale = &lang))
            .await?;
        return Ok(());
    }

    user.status = UserStatus::AwaitingSecret;
    db().lock().await.update_user(&user)?;
    bot.send_message(chat_id, t!("secret_prompt", locale = &lang))
        .await?;
    Ok(())
}

async fn handle_reveal(
    bot: &Bot,
    user: User,
    chat_id: ChatId,
    msg_id: MessageId,
    arg: &str,
) -> HandlerResult {
    // Either way the request card must not be clickable twice.
    let _ = bot.delete_message(chat_id, msg_id).await;

    match arg {
        "agree" => execute_reveal(bot, user).await,
        "reject" => {
            bot.send_message(chat_id, t!("share_rejected", locale = &user.language_code))
                .await?;
            Ok(())
        }
        _ => Ok(()),
    }
}

async fn execute_reveal(bot: &Bot, accepter: User) -> HandlerResult {
    if accepter.status != UserStatus::Chatting || accepter.partner_id == 0 {
        return Ok(());
    }

    let requester = db().lock().await.get_user(accepter.partner_id)?;
    let Some(requester) = requester else {
        return Ok(());
    };

    if accepter.username.is_empty() || requester.username.is_empty() {
        let text = t!("share_error_no_username", locale = &accepter.language_code);
        bot.send_message(ChatId(accepter.telegram_id), text).await?;
        let text = t!("share_error_no_username", locale = &requester.language_code);
        bot.send_message(ChatId(requester.telegram_id), text).await?;
        return Ok(());
    }

    bot.send_message(
        ChatId(accepter.telegram_id),
        t!(
            "share_accepted",
            locale = &accepter.language_code,
            name = menu::escape_html(&requester.first_name),
            username = requester.username
        ),
    )
    .parse_mode(ParseMode::Html)
    .await?;

    bot.send_message(
        ChatId(requester.telegram_id),
        t!(
            "share_accepted",
            locale = &requester.language_code,
            name = menu::escape_html(&accepter.first_name),
            username = accepter.username
        ),
    )
    .parse_mode(ParseMode::Html)
    .await?;
    Ok(())
}

async fn handle_report(
    bot: &Bot,
    reporter: User,
    chat_id: ChatId,
    msg_id: MessageId,
    reason: &str,
) -> HandlerResult {
    let _ = bot.delete_message(chat_id, msg_id).await;
    let lang = reporter.language_code.as_str();

    let target_id = if reporter.partner_id != 0 {
        reporter.partner_id
    } else {
        reporter.last_partner_id
    };
    if target_id == 0 {
        bot.send_message(chat_id, t!("report_error_no_chat", locale = lang))
            .await?;
        return Ok(());
    }

    let reason_label = match reason {
        "porn" => "🔞 Pornography",
        "harass" => "🤬 Harassment",
        "spam" => "📢 Spam",
        "scam" => "👺 Scam",
        _ => "Other",
    };

    for admin_id in &config::get().admin_ids {
        let notify = bot
            .send_message(
                ChatId(*admin_id),
                format!(
                    "🚨 <b>REPORT</b>\nReporter: <code>{}</code>\nTarget: <code>{target_id}</code>\nReason: {reason_label}",
                    reporter.telegram_id
                ),
            )
            .parse_mode(ParseMode::Html)
            .await;
        if let Err(err) = notify {
            log::warn!("report notification to admin {admin_id} failed: {err}");
        }
    }

    bot.send_message(chat_id, t!("report_sent", locale = lang))
        .await?;
    Ok(())
}
