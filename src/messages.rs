//! Non-command traffic: relaying between paired users and the free-text
//! inputs (location, secret messages) the menu layer asked for.

use rust_i18n::t;
use teloxide::{
    payloads::{SendPhotoSetters, SendVideoSetters},
    prelude::*,
    types::{ChatAction, InputFile},
};

use crate::models::{user::User, user_status::UserStatus};
use crate::{afk, commands, db, menu, payments, HandlerResult};

pub async fn on_message(bot: Bot, msg: Message) -> HandlerResult {
    if let Some(payment) = msg.successful_payment() {
        return payments::activate(&bot, &msg, payment).await;
    }

    let Some(user) = commands::prepared_user(&bot, &msg).await? else {
        return Ok(());
    };

    match user.status {
        UserStatus::AwaitingLocation => save_location(&bot, &msg, user).await,
        UserStatus::AwaitingSecret => save_secret(&bot, &msg, user).await,
        UserStatus::Chatting => relay(&bot, &msg, user).await,
        UserStatus::Queue => {
            bot.send_message(msg.chat.id, t!("still_searching", locale = &user.language_code))
                .await?;
            Ok(())
        }
        _ => menu::send_main_menu(&bot, &user, None).await,
    }
}

async fn save_location(bot: &Bot, msg: &Message, mut user: User) -> HandlerResult {
    let lang = user.language_code.to_string();
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, t!("ask_location_text", locale = &lang))
            .await?;
        return Ok(());
    };

    user.location = text.trim().to_string();
    user.status = UserStatus::Idle;
    db().lock().await.update_user(&user)?;

    bot.send_message(
        msg.chat.id,
        t!("location_saved", locale = &lang, location = user.location),
    )
    .await?;
    menu::send_profile(bot, &user, None).await
}

async fn save_secret(bot: &Bot, msg: &Message, mut user: User) -> HandlerResult {
    let lang = user.language_code.to_string();
    let target_id = user.last_partner_id;

    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, t!("secret_prompt", locale = &lang))
            .await?;
        return Ok(());
    };

    user.status = UserStatus::Idle;
    if target_id == 0 {
        db().lock().await.update_user(&user)?;
        bot.send_message(msg.chat.id, t!("secret_no_target", locale = &lang))
            .await?;
        return Ok(());
    }

    {
        let store = db().lock().await;
        store.save_inbox_message(user.telegram_id, target_id, text)?;
        store.update_user(&user)?;
    }
    bot.send_message(msg.chat.id, t!("secret_sent", locale = &lang))
        .await?;

    // Best-effort nudge; the message waits in the inbox either way.
    if let Ok(Some(target)) = db().lock().await.get_user(target_id) {
        let notify = bot
            .send_message(
                ChatId(target_id),
                t!("secret_received", locale = &target.language_code),
            )
            .await;
        if let Err(err) = notify {
            log::debug!("secret notification to {target_id} failed: {err}");
        }
    }
    Ok(())
}

/// Copy the incoming message to the partner. Photos and videos go out behind
/// a spoiler; everything else is a plain copy. A delivery failure counts as
/// the partner having left.
async fn relay(bot: &Bot, msg: &Message, mut sender: User) -> HandlerResult {
    if sender.partner_id == 0 {
        // The other half of a pairing never landed; self-heal to idle.
        sender.status = UserStatus::Idle;
        db().lock().await.update_user(&sender)?;
        bot.send_message(
            msg.chat.id,
            t!("partner_lost", locale = &sender.language_code),
        )
        .await?;
        return Ok(());
    }

    afk::touch(sender.telegram_id);
    let partner = ChatId(sender.partner_id);

    let delivery = if let Some(best) = msg.photo().and_then(|sizes| sizes.last()) {
        let _ = bot.send_chat_action(partner, ChatAction::UploadPhoto).await;
        let mut request = bot
            .send_photo(partner, InputFile::file_id(&best.file.id))
            .has_spoiler(true);
        if let Some(caption) = msg.caption() {
            request = request.caption(caption);
        }
        request.await.map(|_| ())
    } else if let Some(video) = msg.video() {
        let _ = bot.send_chat_action(partner, ChatAction::UploadVideo).await;
        let mut request = bot
            .send_video(partner, InputFile::file_id(&video.file.id))
            .has_spoiler(true);
        if let Some(caption) = msg.caption() {
            request = request.caption(caption);
        }
        request.await.map(|_| ())
    } else if msg.voice().is_some() {
        let _ = bot.send_chat_action(partner, ChatAction::RecordVoice).await;
        bot.copy_message(partner, msg.chat.id, msg.id).await.map(|_| ())
    } else if msg.sticker().is_some() {
        bot.copy_message(partner, msg.chat.id, msg.id).await.map(|_| ())
    } else {
        let _ = bot.send_chat_action(partner, ChatAction::Typing).await;
        bot.copy_message(partner, msg.chat.id, msg.id).await.map(|_| ())
    };

    if let Err(err) = delivery {
        log::warn!(
            "relay {} -> {} failed: {err}",
            sender.telegram_id,
            sender.partner_id
        );
        commands::stop_chat(bot, sender).await?;
    }
    Ok(())
}
