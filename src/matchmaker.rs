//! Background pairing engine.
//!
//! One tick scans every configured mood pool in order, evaluates candidate
//! pairs with pure compatibility rules and commits matches. The store has no
//! optimistic locking, so both sides are re-fetched immediately before the
//! commit; a candidate whose live state changed since the snapshot is
//! dropped without touching the other side. The commit itself writes both
//! records in one transaction.

use std::collections::HashSet;
use std::time::Duration;

use rust_i18n::t;
use teloxide::{
    payloads::SendMessageSetters,
    prelude::*,
    types::{MessageId, ParseMode},
};
use tokio::sync::Mutex as TokioMutex;

use crate::config::{self, MatchPolicy, MoodSpec};
use crate::database::Database;
use crate::models::{user::User, user_status::UserStatus};

pub async fn run(bot: Bot, db: &'static TokioMutex<Database>) {
    let policy = &config::get().matching;
    log::info!(
        "matchmaker started: {} moods, {}s tick",
        policy.moods.len(),
        policy.tick_secs
    );

    loop {
        for mood in &policy.moods {
            process_mood(&bot, db, mood, policy).await;
        }
        tokio::time::sleep(Duration::from_secs(policy.tick_secs)).await;
    }
}

/// One mood's share of a tick: snapshot the pool, pair it, notify winners.
/// Store errors abort this mood only; the loop itself never dies.
async fn process_mood(bot: &Bot, db: &TokioMutex<Database>, mood: &MoodSpec, policy: &MatchPolicy) {
    let pool = {
        let store = db.lock().await;

        let specific = match store.list_queued(&mood.code) {
            Ok(users) => users,
            Err(err) => {
                log::error!("matchmaker: queue scan for {} failed: {err}", mood.code);
                return;
            }
        };

        if mood.code == policy.catch_all {
            specific
        } else {
            // Fast-match users ride along in every specific pool.
            match store.list_queued(&policy.catch_all) {
                Ok(general) => merge_pool(specific, general),
                Err(err) => {
                    log::error!("matchmaker: catch-all scan failed: {err}");
                    specific
                }
            }
        }
    };

    if pool.len() < 2 {
        return;
    }

    for (a, b) in pair_pool(db, &pool, mood.strict, policy, &mood.code).await {
        announce(bot, &a, &b, &mood.code).await;
    }
}

/// Union of the mood's own queue and the catch-all queue, de-duplicated by
/// identity with the specific members first.
fn merge_pool(specific: Vec<User>, general: Vec<User>) -> Vec<User> {
    let mut seen: HashSet<i64> = HashSet::new();
    let mut pool = Vec::with_capacity(specific.len() + general.len());

    for user in specific.into_iter().chain(general) {
        if seen.insert(user.telegram_id) {
            pool.push(user);
        }
    }
    pool
}

/// Pure pairwise decision: location gate plus both directions of the gender
/// preference gate. In a strict pool the preference filter is always active;
/// elsewhere only for the VIP side.
pub fn is_compatible(a: &User, b: &User, strict: bool, policy: &MatchPolicy) -> bool {
    location_compatible(a, b, policy) && accepts(a, b, strict) && accepts(b, a, strict)
}

fn location_compatible(a: &User, b: &User, policy: &MatchPolicy) -> bool {
    if policy.location_is_global(&a.location) || policy.location_is_global(&b.location) {
        return true;
    }
    a.location == b.location
}

fn accepts(who: &User, other: &User, strict: bool) -> bool {
    let filter_active = strict || who.is_vip;
    if !filter_active {
        return true;
    }
    match who.preference {
        // Nothing to filter on yet.
        None => true,
        Some(pref) => pref.accepts(other.gender),
    }
}

/// Scan the pool in stable nested-loop order and commit every first-fit
/// compatible pair that survives re-validation. Consumption is tracked by
/// identity, never by pool index, so each user is matched at most once per
/// tick even though the pool mixes two queues.
pub async fn pair_pool(
    db: &TokioMutex<Database>,
    pool: &[User],
    strict: bool,
    policy: &MatchPolicy,
    mood: &str,
) -> Vec<(User, User)> {
    let mut consumed: HashSet<i64> = HashSet::new();
    let mut pairs = Vec::new();

    for i in 0..pool.len() {
        let a = &pool[i];
        if consumed.contains(&a.telegram_id) {
            continue;
        }

        for j in (i + 1)..pool.len() {
            let b = &pool[j];
            if consumed.contains(&b.telegram_id) || b.telegram_id == a.telegram_id {
                continue;
            }
            if !is_compatible(a, b, strict, policy) {
                continue;
            }

            // The snapshot said yes; check live state right before writing.
            let fresh_a = match db.lock().await.get_user(a.telegram_id) {
                Ok(user) => user,
                Err(err) => {
                    log::error!("matchmaker: re-fetch of {} failed: {err}", a.telegram_id);
                    break;
                }
            };
            let Some(mut fresh_a) = fresh_a else {
                consumed.insert(a.telegram_id);
                break;
            };
            if fresh_a.status != UserStatus::Queue || fresh_a.is_banned {
                consumed.insert(a.telegram_id);
                break;
            }

            let fresh_b = match db.lock().await.get_user(b.telegram_id) {
                Ok(user) => user,
                Err(err) => {
                    log::error!("matchmaker: re-fetch of {} failed: {err}", b.telegram_id);
                    continue;
                }
            };
            let Some(mut fresh_b) = fresh_b else {
                consumed.insert(b.telegram_id);
                continue;
            };
            if fresh_b.status != UserStatus::Queue || fresh_b.is_banned {
                consumed.insert(b.telegram_id);
                continue;
            }

            fresh_a.status = UserStatus::Chatting;
            fresh_a.partner_id = fresh_b.telegram_id;
            fresh_b.status = UserStatus::Chatting;
            fresh_b.partner_id = fresh_a.telegram_id;

            if let Err(err) = db.lock().await.commit_pair(&fresh_a, &fresh_b) {
                // The transaction rolled back, so both stay eligible.
                log::error!(
                    "matchmaker: commit {} <-> {} failed: {err}",
                    fresh_a.telegram_id,
                    fresh_b.telegram_id
                );
                continue;
            }

            log::info!(
                "match ({mood}): {} <-> {}",
                fresh_a.telegram_id,
                fresh_b.telegram_id
            );
            consumed.insert(fresh_a.telegram_id);
            consumed.insert(fresh_b.telegram_id);
            pairs.push((fresh_a, fresh_b));
            break;
        }
    }

    pairs
}

/// Post-commit plumbing: drop each side's stale menu message and deliver the
/// localized match cards. Failures here are logged, never rolled back.
async fn announce(bot: &Bot, a: &User, b: &User, mood: &str) {
    clear_stale_menu(bot, a).await;
    clear_stale_menu(bot, b).await;
    send_match_card(bot, a, b, mood).await;
    send_match_card(bot, b, a, mood).await;
}

async fn clear_stale_menu(bot: &Bot, user: &User) {
    if user.last_message_id == 0 {
        return;
    }
    if let Err(err) = bot
        .delete_message(ChatId(user.telegram_id), MessageId(user.last_message_id))
        .await
    {
        log::debug!("stale menu delete for {} failed: {err}", user.telegram_id);
    }
}

async fn send_match_card(bot: &Bot, receiver: &User, partner: &User, mood: &str) {
    let text = build_match_card(receiver, partner, mood);
    if let Err(err) = bot
        .send_message(ChatId(receiver.telegram_id), text)
        .parse_mode(ParseMode::Html)
        .await
    {
        log::error!("match notification to {} failed: {err}", receiver.telegram_id);
    }
}

/// Partner is described by profile-safe attributes only, never the raw id.
fn build_match_card(receiver: &User, partner: &User, mood: &str) -> String {
    let lang = receiver.language_code.as_str();

    let location = if partner.location.is_empty() || partner.location == "-" {
        "🌍 Global".to_string()
    } else {
        partner.location.clone()
    };
    let gender_icon = partner.gender.map(|g| g.icon()).unwrap_or("❔");
    let topic = t!(&MatchPolicy::mood_label_key(mood), locale = lang);

    format!(
        "{}\n\n🎭 {}: <code>{}</code>\n{} · 📍 {}\n\n{}",
        t!("match_title", locale = lang),
        t!("match_topic", locale = lang),
        topic,
        gender_icon,
        location,
        t!("match_tip", locale = lang),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{gender::Gender, preference::Preference};

    fn policy() -> MatchPolicy {
        MatchPolicy {
            moods: vec![
                MoodSpec { code: "dating".into(), strict: true },
                MoodSpec { code: "fun".into(), strict: false },
                MoodSpec { code: "all".into(), strict: false },
            ],
            catch_all: "all".into(),
            tick_secs: 3,
            global_markers: vec!["International".into()],
        }
    }

    fn queued(id: i64, mood: &str, gender: Gender, pref: Preference, location: &str) -> User {
        let mut user = User::new(id, format!("u{id}"), format!("U{id}"), "en".into());
        user.gender = Some(gender);
        user.preference = Some(pref);
        user.location = location.into();
        user.current_mood = mood.into();
        user.status = UserStatus::Queue;
        user
    }

    fn seeded_db(users: &[User]) -> TokioMutex<Database> {
        let db = Database::open_in_memory().unwrap();
        for user in users {
            db.create_user(user).unwrap();
        }
        TokioMutex::new(db)
    }

    // ── evaluator ────────────────────────────────────────────────────────

    #[test]
    fn strict_preference_is_symmetric() {
        let p = policy();
        let a = queued(1, "dating", Gender::Female, Preference::Male, "");
        let b = queued(2, "dating", Gender::Male, Preference::Both, "");
        assert!(is_compatible(&a, &b, true, &p));

        let c = queued(3, "dating", Gender::Female, Preference::Both, "");
        // a seeks men; c is a woman.
        assert!(!is_compatible(&a, &c, true, &p));
    }

    #[test]
    fn non_strict_free_users_match_first_available() {
        let p = policy();
        let a = queued(1, "fun", Gender::Male, Preference::Female, "");
        let b = queued(2, "fun", Gender::Male, Preference::Female, "");
        // Both prefer women, but neither pays, so the filter is inactive.
        assert!(is_compatible(&a, &b, false, &p));
    }

    #[test]
    fn vip_preference_is_enforced_in_non_strict_pools() {
        let p = policy();
        let mut a = queued(1, "fun", Gender::Male, Preference::Female, "");
        a.is_vip = true;
        let b = queued(2, "fun", Gender::Male, Preference::Female, "");
        // a pays, so a's filter applies even though the pool is lax.
        assert!(!is_compatible(&a, &b, false, &p));

        let c = queued(3, "fun", Gender::Female, Preference::Male, "");
        assert!(is_compatible(&a, &c, false, &p));
    }

    #[test]
    fn vip_with_both_matches_anyone_eligible() {
        let p = policy();
        let mut a = queued(1, "fun", Gender::Female, Preference::Both, "");
        a.is_vip = true;
        let b = queued(2, "fun", Gender::Male, Preference::Female, "");
        assert!(is_compatible(&a, &b, false, &p));
    }

    #[test]
    fn location_gate() {
        let p = policy();
        let here = |id, loc: &str| queued(id, "fun", Gender::Male, Preference::Both, loc);

        assert!(is_compatible(&here(1, "🇮🇩 Indonesia"), &here(2, "🇮🇩 Indonesia"), false, &p));
        assert!(!is_compatible(&here(1, "🇮🇩 Indonesia"), &here(2, "🇲🇾 Malaysia"), false, &p));
        assert!(is_compatible(&here(1, "🌍 International"), &here(2, "🇲🇾 Malaysia"), false, &p));
        assert!(is_compatible(&here(1, ""), &here(2, "🇲🇾 Malaysia"), false, &p));
        assert!(is_compatible(&here(1, "-"), &here(2, "🇲🇾 Malaysia"), false, &p));
    }

    // ── pool construction ────────────────────────────────────────────────

    #[test]
    fn merge_pool_dedupes_and_keeps_specific_first() {
        let a = queued(1, "dating", Gender::Male, Preference::Both, "");
        let b = queued(2, "all", Gender::Female, Preference::Both, "");
        let a_again = queued(1, "all", Gender::Male, Preference::Both, "");

        let pool = merge_pool(vec![a], vec![b, a_again]);
        let ids: Vec<i64> = pool.iter().map(|u| u.telegram_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(pool[0].current_mood, "dating");
    }

    // ── executor ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn dating_scenario_pairs_and_commits_both_sides() {
        let p = policy();
        let a = queued(1, "dating", Gender::Female, Preference::Male, "X");
        let b = queued(2, "dating", Gender::Male, Preference::Female, "X");
        let db = seeded_db(&[a.clone(), b.clone()]);

        let pairs = pair_pool(&db, &[a, b], true, &p, "dating").await;
        assert_eq!(pairs.len(), 1);

        let store = db.lock().await;
        let a = store.get_user(1).unwrap().unwrap();
        let b = store.get_user(2).unwrap().unwrap();
        assert_eq!(a.status, UserStatus::Chatting);
        assert_eq!(b.status, UserStatus::Chatting);
        assert_eq!(a.partner_id, 2);
        assert_eq!(b.partner_id, 1);
    }

    #[tokio::test]
    async fn differing_concrete_locations_stay_queued() {
        let p = policy();
        let a = queued(1, "dating", Gender::Female, Preference::Male, "X");
        let b = queued(2, "dating", Gender::Male, Preference::Female, "Y");
        let db = seeded_db(&[a.clone(), b.clone()]);

        let pairs = pair_pool(&db, &[a, b], true, &p, "dating").await;
        assert!(pairs.is_empty());

        let store = db.lock().await;
        assert_eq!(store.get_user(1).unwrap().unwrap().status, UserStatus::Queue);
        assert_eq!(store.get_user(2).unwrap().unwrap().status, UserStatus::Queue);
    }

    #[tokio::test]
    async fn stale_candidate_is_rejected_without_consuming_counterpart() {
        let p = policy();
        let a = queued(1, "fun", Gender::Male, Preference::Both, "");
        let b = queued(2, "fun", Gender::Female, Preference::Both, "");
        let c = queued(3, "fun", Gender::Male, Preference::Both, "");
        let db = seeded_db(&[a.clone(), b.clone(), c.clone()]);

        // a cancelled between snapshot and commit.
        {
            let store = db.lock().await;
            let mut live_a = store.get_user(1).unwrap().unwrap();
            live_a.status = UserStatus::Idle;
            store.update_user(&live_a).unwrap();
        }

        let pairs = pair_pool(&db, &[a, b, c], false, &p, "fun").await;
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0.telegram_id, 2);
        assert_eq!(pairs[0].1.telegram_id, 3);

        let store = db.lock().await;
        assert_eq!(store.get_user(1).unwrap().unwrap().status, UserStatus::Idle);
        assert_eq!(store.get_user(2).unwrap().unwrap().partner_id, 3);
    }

    #[tokio::test]
    async fn banned_candidate_is_skipped() {
        let p = policy();
        let mut a = queued(1, "fun", Gender::Male, Preference::Both, "");
        a.is_banned = true;
        let b = queued(2, "fun", Gender::Female, Preference::Both, "");
        let db = seeded_db(&[a.clone(), b.clone()]);

        let pairs = pair_pool(&db, &[a, b], false, &p, "fun").await;
        assert!(pairs.is_empty());
        let store = db.lock().await;
        assert_eq!(store.get_user(2).unwrap().unwrap().status, UserStatus::Queue);
    }

    #[tokio::test]
    async fn each_identity_pairs_at_most_once_per_tick() {
        let p = policy();
        let pool: Vec<User> = (1..=5)
            .map(|id| queued(id, "fun", Gender::Male, Preference::Both, ""))
            .collect();
        let db = seeded_db(&pool);

        let pairs = pair_pool(&db, &pool, false, &p, "fun").await;
        assert_eq!(pairs.len(), 2);

        let mut seen = HashSet::new();
        for (a, b) in &pairs {
            assert!(seen.insert(a.telegram_id));
            assert!(seen.insert(b.telegram_id));
        }

        // The odd one out is still waiting.
        let store = db.lock().await;
        let leftover = (1..=5)
            .filter(|id| !seen.contains(id))
            .collect::<Vec<i64>>();
        assert_eq!(leftover.len(), 1);
        assert_eq!(
            store.get_user(leftover[0]).unwrap().unwrap().status,
            UserStatus::Queue
        );
    }

    #[tokio::test]
    async fn evaluation_is_deterministic_for_an_unchanged_snapshot() {
        let p = policy();
        let pool: Vec<User> = vec![
            queued(1, "fun", Gender::Male, Preference::Both, ""),
            queued(2, "fun", Gender::Female, Preference::Both, "🇮🇩 Indonesia"),
            queued(3, "fun", Gender::Male, Preference::Both, "🇮🇩 Indonesia"),
            queued(4, "fun", Gender::Female, Preference::Both, "🇲🇾 Malaysia"),
        ];

        let first = pair_pool(&seeded_db(&pool), &pool, false, &p, "fun").await;
        let second = pair_pool(&seeded_db(&pool), &pool, false, &p, "fun").await;

        let ids = |pairs: &[(User, User)]| {
            pairs
                .iter()
                .map(|(a, b)| (a.telegram_id, b.telegram_id))
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(&first), ids(&second));
    }

    #[tokio::test]
    async fn catch_all_users_match_specific_seekers() {
        let p = policy();
        let a = queued(1, "dating", Gender::Female, Preference::Male, "");
        let b = queued(2, "all", Gender::Male, Preference::Female, "");
        let db = seeded_db(&[a.clone(), b.clone()]);

        let pool = {
            let store = db.lock().await;
            merge_pool(
                store.list_queued("dating").unwrap(),
                store.list_queued("all").unwrap(),
            )
        };
        assert_eq!(pool.len(), 2);

        let pairs = pair_pool(&db, &pool, true, &p, "dating").await;
        assert_eq!(pairs.len(), 1);
    }

    #[tokio::test]
    async fn two_catch_all_users_match_each_other() {
        let p = policy();
        let a = queued(1, "all", Gender::Male, Preference::Both, "");
        let b = queued(2, "all", Gender::Female, Preference::Both, "");
        let db = seeded_db(&[a.clone(), b.clone()]);

        let pool = db.lock().await.list_queued("all").unwrap();
        let pairs = pair_pool(&db, &pool, false, &p, "all").await;
        assert_eq!(pairs.len(), 1);
    }
}
