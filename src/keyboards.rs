//! Inline keyboard builders. Callback data uses the `verb:arg` convention
//! routed in `callbacks.rs`.

use rust_i18n::t;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::config;

const LANGUAGES: &[(&str, &str, &str)] = &[
    ("id", "Indonesia", "🇮🇩"),
    ("en", "English", "🇺🇸"),
    ("ru", "Русский", "🇷🇺"),
];

const COUNTRIES: &[(&str, &str)] = &[
    ("Indonesia", "🇮🇩"),
    ("Malaysia", "🇲🇾"),
    ("Singapore", "🇸🇬"),
    ("Russia", "🇷🇺"),
    ("USA", "🇺🇸"),
    ("India", "🇮🇳"),
    ("International", "🌍"),
];

fn rows_of_two(buttons: Vec<InlineKeyboardButton>) -> Vec<Vec<InlineKeyboardButton>> {
    buttons.chunks(2).map(|chunk| chunk.to_vec()).collect()
}

fn main_menu_row(_lang: &str) -> Vec<InlineKeyboardButton> {
    vec![InlineKeyboardButton::callback("🏠 Main Menu", "back:menu")]
}

pub fn main_menu(lang: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            t!("btn_search", locale = lang),
            "cmd:search",
        )],
        vec![
            InlineKeyboardButton::callback(t!("btn_profile", locale = lang), "cmd:profile"),
            InlineKeyboardButton::callback(t!("btn_vip", locale = lang), "cmd:vip"),
        ],
        vec![
            InlineKeyboardButton::callback(t!("btn_help", locale = lang), "cmd:help"),
            InlineKeyboardButton::callback(t!("btn_lang", locale = lang), "edit:lang_from_menu"),
        ],
    ])
}

pub fn gender_selector(lang: &str, with_back: bool) -> InlineKeyboardMarkup {
    let mut rows = vec![vec![
        InlineKeyboardButton::callback(t!("btn_male", locale = lang), "gender:male"),
        InlineKeyboardButton::callback(t!("btn_female", locale = lang), "gender:female"),
    ]];
    if with_back {
        rows.push(vec![InlineKeyboardButton::callback(
            t!("btn_back", locale = lang),
            "back:profile",
        )]);
    }
    InlineKeyboardMarkup::new(rows)
}

pub fn preference_selector(lang: &str, with_back: bool) -> InlineKeyboardMarkup {
    let mut rows = vec![
        vec![
            InlineKeyboardButton::callback(t!("btn_male", locale = lang), "pref:male"),
            InlineKeyboardButton::callback(t!("btn_female", locale = lang), "pref:female"),
        ],
        vec![InlineKeyboardButton::callback(
            t!("btn_both", locale = lang),
            "pref:both",
        )],
    ];
    if with_back {
        rows.push(vec![InlineKeyboardButton::callback(
            t!("btn_back", locale = lang),
            "back:profile",
        )]);
    }
    InlineKeyboardMarkup::new(rows)
}

pub fn lang_selector(lang: &str, origin: &str) -> InlineKeyboardMarkup {
    let buttons = LANGUAGES
        .iter()
        .map(|(code, label, icon)| {
            InlineKeyboardButton::callback(
                format!("{icon} {label}"),
                format!("setlang:{code}:{origin}"),
            )
        })
        .collect();

    let mut rows = rows_of_two(buttons);
    let back = if origin == "menu" { "back:menu" } else { "back:profile" };
    rows.push(vec![InlineKeyboardButton::callback(
        t!("btn_back", locale = lang),
        back,
    )]);
    InlineKeyboardMarkup::new(rows)
}

pub fn location_selector(lang: &str) -> InlineKeyboardMarkup {
    let buttons = COUNTRIES
        .iter()
        .map(|(label, icon)| {
            InlineKeyboardButton::callback(
                format!("{icon} {label}"),
                format!("setloc:{label}|{icon}"),
            )
        })
        .collect();

    let mut rows = rows_of_two(buttons);
    rows.push(vec![InlineKeyboardButton::callback(
        t!("btn_type_location", locale = lang),
        "edit:loc_text",
    )]);
    rows.push(vec![InlineKeyboardButton::callback(
        t!("btn_back", locale = lang),
        "back:profile",
    )]);
    InlineKeyboardMarkup::new(rows)
}

pub fn mood_selector(lang: &str) -> InlineKeyboardMarkup {
    let buttons = config::get()
        .matching
        .moods
        .iter()
        .map(|mood| {
            InlineKeyboardButton::callback(
                t!(&config::MatchPolicy::mood_label_key(&mood.code), locale = lang),
                format!("mood:{}", mood.code),
            )
        })
        .collect();

    let mut rows = rows_of_two(buttons);
    rows.push(main_menu_row(lang));
    InlineKeyboardMarkup::new(rows)
}

pub fn cancel_search(lang: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        t!("btn_cancel_stop", locale = lang),
        "cmd:stop",
    )]])
}

pub fn profile_menu(lang: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback(t!("btn_edit_gender", locale = lang), "edit:gender"),
            InlineKeyboardButton::callback(t!("btn_edit_pref", locale = lang), "edit:pref"),
        ],
        vec![
            InlineKeyboardButton::callback(t!("btn_edit_loc", locale = lang), "edit:loc"),
            InlineKeyboardButton::callback(t!("btn_lang", locale = lang), "edit:lang_from_profile"),
        ],
        main_menu_row(lang),
    ])
}

pub fn vip_plans(lang: &str) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = config::get()
        .vip_plans
        .iter()
        .map(|plan| {
            vec![InlineKeyboardButton::callback(
                t!("btn_buy_format", locale = lang, days = plan.days, price = plan.price),
                format!("buy:{}", plan.id),
            )]
        })
        .collect();
    rows.push(main_menu_row(lang));
    InlineKeyboardMarkup::new(rows)
}

pub fn help_menu(lang: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback(t!("help_btn_basic", locale = lang), "help:basic"),
            InlineKeyboardButton::callback(t!("help_btn_cmd", locale = lang), "help:cmd"),
        ],
        vec![InlineKeyboardButton::callback(
            t!("help_btn_rules", locale = lang),
            "help:rules",
        )],
        main_menu_row(lang),
    ])
}

pub fn back_to_help(lang: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        t!("btn_back", locale = lang),
        "back:help_menu",
    )]])
}

/// Shown after a chat ends: reconnect upsell plus the secret-message teaser.
pub fn after_chat(lang: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            t!("btn_reconnect", locale = lang),
            "cmd:reconnect_teaser",
        )],
        vec![InlineKeyboardButton::callback(
            t!("btn_secret", locale = lang),
            "cmd:secret",
        )],
    ])
}

pub fn vip_pitch(lang: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        t!("btn_vip", locale = lang),
        "cmd:vip",
    )]])
}

pub fn reveal_confirm(lang: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(t!("btn_accept", locale = lang), "reveal:agree"),
        InlineKeyboardButton::callback(t!("btn_reject", locale = lang), "reveal:reject"),
    ]])
}

pub fn report_reasons(lang: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            t!("report_reason_porn", locale = lang),
            "report:porn",
        )],
        vec![InlineKeyboardButton::callback(
            t!("report_reason_harass", locale = lang),
            "report:harass",
        )],
        vec![InlineKeyboardButton::callback(
            t!("report_reason_spam", locale = lang),
            "report:spam",
        )],
        vec![InlineKeyboardButton::callback(
            t!("report_reason_scam", locale = lang),
            "report:scam",
        )],
        vec![InlineKeyboardButton::callback(
            t!("report_btn_cancel", locale = lang),
            "cmd:dismiss",
        )],
    ])
}
