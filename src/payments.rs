//! Telegram Stars payment flow: invoice → pre-checkout → activation.
//! Activation is idempotent by charge id, so a re-delivered payment update
//! never grants double time.

use chrono::{Duration, Utc};
use rust_i18n::t;
use teloxide::{
    payloads::AnswerPreCheckoutQuerySetters,
    prelude::*,
    types::{LabeledPrice, PreCheckoutQuery, SuccessfulPayment},
};

use crate::{config, db, HandlerResult};

pub async fn send_invoice(bot: &Bot, chat_id: ChatId, plan_id: &str, lang: &str) -> HandlerResult {
    let Some(plan) = config::get().vip_plans.iter().find(|p| p.id == plan_id) else {
        log::error!("plan '{plan_id}' not found in pricing.json");
        bot.send_message(chat_id, t!("plan_missing", locale = lang))
            .await?;
        return Ok(());
    };

    let title = t!(&plan.title_key, locale = lang);
    let description = t!(&plan.desc_key, locale = lang);

    // Stars invoices use the XTR currency with an empty provider token.
    let sent = bot
        .send_invoice(
            chat_id,
            title.clone(),
            description,
            plan.id.clone(),
            "",
            "XTR",
            vec![LabeledPrice::new(title, plan.price as i32)],
        )
        .await;

    if let Err(err) = sent {
        log::error!("failed to send invoice for {plan_id}: {err}");
        bot.send_message(chat_id, t!("payment_error", locale = lang))
            .await?;
    }
    Ok(())
}

/// Approve only plans that still exist; everything else is declined before
/// any money moves.
pub async fn pre_checkout(bot: Bot, query: PreCheckoutQuery) -> HandlerResult {
    let known = config::get()
        .vip_plans
        .iter()
        .any(|plan| plan.id == query.invoice_payload);

    if known {
        bot.answer_pre_checkout_query(query.id, true).await?;
    } else {
        bot.answer_pre_checkout_query(query.id, false)
            .error_message("This plan no longer exists.")
            .await?;
    }
    Ok(())
}

pub async fn activate(bot: &Bot, msg: &Message, payment: &SuccessfulPayment) -> HandlerResult {
    let telegram_id = msg.chat.id.0;
    let charge_id = payment.telegram_payment_charge_id.as_str();

    let user = db().lock().await.get_user(telegram_id)?;
    let Some(mut user) = user else {
        return Ok(());
    };
    let lang = user.language_code.to_string();

    if user.last_charge_id == charge_id {
        log::warn!("duplicate payment update ignored: {charge_id}");
        return Ok(());
    }

    let days = config::get()
        .vip_plans
        .iter()
        .find(|plan| plan.id == payment.invoice_payload)
        .map(|plan| plan.days)
        .unwrap_or(0);
    if days == 0 {
        log::error!("unknown plan payload '{}'", payment.invoice_payload);
        bot.send_message(msg.chat.id, t!("payment_error", locale = &lang))
            .await?;
        return Ok(());
    }

    // Stack onto remaining time when the subscription is still running.
    let now = Utc::now();
    let start = match user.vip_expires_at {
        Some(expires_at) if user.is_vip && expires_at > now => expires_at,
        _ => now,
    };

    user.is_vip = true;
    user.vip_expires_at = Some(start + Duration::days(days));
    user.last_charge_id = charge_id.to_string();

    if let Err(err) = db().lock().await.update_user(&user) {
        log::error!("VIP activation write for {telegram_id} failed: {err}");
        bot.send_message(msg.chat.id, t!("payment_error", locale = &lang))
            .await?;
        return Ok(());
    }

    log::info!("user {telegram_id} bought {days} VIP days");
    bot.send_message(
        msg.chat.id,
        t!("payment_success", locale = &lang, days = days),
    )
    .await?;
    Ok(())
}
