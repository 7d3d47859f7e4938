mod afk;
mod callbacks;
mod commands;
mod config;
mod database;
mod error;
mod keyboards;
mod matchmaker;
mod menu;
mod messages;
mod models;
mod payments;

use once_cell::sync::OnceCell;
use teloxide::{dispatching::UpdateHandler, prelude::*, utils::command::BotCommands};
use tokio::sync::Mutex as TokioMutex;

use crate::commands::Command;
use crate::database::Database;
pub use crate::error::{Error, HandlerResult};

rust_i18n::i18n!("locales", fallback = "en");

static DATABASE: OnceCell<TokioMutex<Database>> = OnceCell::new();

pub fn db() -> &'static TokioMutex<Database> {
    DATABASE.get().expect("database is initialised at startup")
}

#[tokio::main]
async fn main() {
    pretty_env_logger::init();
    log::info!("starting otterchat...");

    let cfg = config::init(config::Config::load());
    rust_i18n::set_locale(&cfg.default_lang);

    let database = Database::new(&cfg.database_path).expect("failed to open database");
    let db = DATABASE.get_or_init(|| TokioMutex::new(database));

    let bot = Bot::new(cfg.bot_token.clone());

    if let Err(err) = bot.set_my_commands(Command::bot_commands()).await {
        log::warn!("failed to register bot commands: {err}");
    }

    tokio::spawn(matchmaker::run(bot.clone(), db));
    tokio::spawn(afk::run(bot.clone(), db));

    log::info!("bot is running, polling for updates");
    Dispatcher::builder(bot, schema())
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn schema() -> UpdateHandler<Error> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start].endpoint(commands::start))
        .branch(case![Command::Search].endpoint(commands::search))
        .branch(case![Command::Next].endpoint(commands::next))
        .branch(case![Command::Stop].endpoint(commands::stop))
        .branch(case![Command::Profile].endpoint(commands::profile))
        .branch(case![Command::Vip].endpoint(commands::vip))
        .branch(case![Command::Reconnect].endpoint(commands::reconnect))
        .branch(case![Command::Share].endpoint(commands::share))
        .branch(case![Command::Inbox].endpoint(commands::inbox))
        .branch(case![Command::Report].endpoint(commands::report))
        .branch(case![Command::Lang].endpoint(commands::lang))
        .branch(case![Command::Help].endpoint(commands::help))
        .branch(case![Command::Stats].endpoint(commands::stats))
        .branch(case![Command::Broadcast(text)].endpoint(commands::broadcast))
        .branch(case![Command::AddVip(args)].endpoint(commands::add_vip));

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .endpoint(messages::on_message);

    dptree::entry()
        .branch(Update::filter_pre_checkout_query().endpoint(payments::pre_checkout))
        .branch(message_handler)
        .branch(Update::filter_callback_query().endpoint(callbacks::on_callback))
}
