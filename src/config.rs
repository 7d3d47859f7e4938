use std::{env, fs};

use once_cell::sync::OnceCell;
use serde::Deserialize;

static CONFIG: OnceCell<Config> = OnceCell::new();

/// One purchasable VIP package, loaded from `config/pricing.json`. Adding a
/// plan there makes it show up in the /vip menu without touching code.
#[derive(Debug, Clone, Deserialize)]
pub struct VipPlan {
    pub id: String,
    pub days: i64,
    pub price: u32,
    pub title_key: String,
    pub desc_key: String,
}

/// One topic pool processed by the matchmaker.
#[derive(Debug, Clone)]
pub struct MoodSpec {
    pub code: String,
    /// Gender preference is always enforced in this pool, VIP or not.
    pub strict: bool,
}

/// Matchmaking policy. Which mood is strict, which is the catch-all, and
/// what counts as a "global" location are product decisions, so they live
/// here instead of in the matchmaker.
#[derive(Debug, Clone)]
pub struct MatchPolicy {
    /// Processing order of one tick.
    pub moods: Vec<MoodSpec>,
    /// Members of this pool are eligible against every other pool.
    pub catch_all: String,
    pub tick_secs: u64,
    /// Location values containing any of these match anybody.
    pub global_markers: Vec<String>,
}

impl MatchPolicy {
    pub fn mood_label_key(code: &str) -> String {
        format!("mood_{}", code)
    }

    /// Empty, "-" and the configured global markers all mean "anywhere".
    pub fn location_is_global(&self, location: &str) -> bool {
        if location.is_empty() || location == "-" {
            return true;
        }
        self.global_markers.iter().any(|m| location.contains(m.as_str()))
    }
}

#[derive(Debug)]
pub struct Config {
    pub bot_token: String,
    pub database_path: String,
    pub admin_ids: Vec<i64>,
    pub default_lang: String,
    pub vip_plans: Vec<VipPlan>,
    pub matching: MatchPolicy,
}

impl Config {
    pub fn load() -> Self {
        dotenv::dotenv().ok();

        let bot_token = env::var("BOT_TOKEN").unwrap_or_default();
        if bot_token.is_empty() {
            panic!("BOT_TOKEN required");
        }

        let admin_ids = env::var("ADMIN_IDS")
            .unwrap_or_default()
            .split(',')
            .filter_map(|s| s.trim().parse::<i64>().ok())
            .collect();

        let tick_secs = env::var("MATCH_TICK_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);

        Config {
            bot_token,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "otterchat.db".into()),
            admin_ids,
            default_lang: env::var("DEFAULT_LANG").unwrap_or_else(|_| "en".into()),
            vip_plans: load_pricing(),
            matching: MatchPolicy {
                moods: vec![
                    MoodSpec { code: "dating".into(), strict: true },
                    MoodSpec { code: "deeptalk".into(), strict: false },
                    MoodSpec { code: "fun".into(), strict: false },
                    MoodSpec { code: "debate".into(), strict: false },
                    MoodSpec { code: "mabar".into(), strict: false },
                    MoodSpec { code: "all".into(), strict: false },
                ],
                catch_all: "all".into(),
                tick_secs,
                global_markers: vec!["International".into()],
            },
        }
    }

    pub fn is_admin(&self, telegram_id: i64) -> bool {
        self.admin_ids.contains(&telegram_id)
    }
}

fn load_pricing() -> Vec<VipPlan> {
    let raw = match fs::read_to_string("config/pricing.json") {
        Ok(raw) => raw,
        Err(err) => {
            log::warn!("could not load config/pricing.json: {err}; VIP purchases disabled");
            return Vec::new();
        }
    };

    match serde_json::from_str::<Vec<VipPlan>>(&raw) {
        Ok(plans) => {
            log::info!("loaded {} VIP plans", plans.len());
            plans
        }
        Err(err) => {
            log::error!("error parsing pricing.json: {err}");
            Vec::new()
        }
    }
}

pub fn init(cfg: Config) -> &'static Config {
    CONFIG.get_or_init(|| cfg)
}

pub fn get() -> &'static Config {
    CONFIG.get().expect("config is initialised at startup")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> MatchPolicy {
        MatchPolicy {
            moods: vec![],
            catch_all: "all".into(),
            tick_secs: 3,
            global_markers: vec!["International".into()],
        }
    }

    #[test]
    fn unset_and_sentinel_locations_are_global() {
        let p = policy();
        assert!(p.location_is_global(""));
        assert!(p.location_is_global("-"));
        assert!(p.location_is_global("🌍 International"));
        assert!(!p.location_is_global("🇮🇩 Indonesia"));
    }
}
