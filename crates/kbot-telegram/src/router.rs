use std::{collections::HashMap, sync::Arc};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio::sync::{Mutex, OwnedMutexGuard};

use kbot_core::{
    config::Config,
    domain::ChatId,
    knowledge::KnowledgeCache,
    messaging::{
        port::ChatTransport,
        throttled::{ThrottleConfig, ThrottledTransport},
    },
    model::client::AnswerGenerator,
    router::{MessageRouter, RouterSettings},
    state::BotState,
};

use crate::handlers;
use crate::TelegramTransport;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<MessageRouter>,
    pub chat_locks: Arc<ChatLocks>,
}

/// One async lock per chat so a chat's messages are routed one at a time.
#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<HashMap<ChatId, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: ChatId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Long-poll Telegram and route every text message until the process stops.
pub async fn run_polling(
    cfg: Arc<Config>,
    state: Arc<BotState>,
    knowledge: Arc<KnowledgeCache>,
    generator: Arc<dyn AnswerGenerator>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    let bot_username = match bot.get_me().await {
        Ok(me) => {
            let username = me.user.username.clone();
            tracing::info!("bot started: @{}", username.as_deref().unwrap_or("?"));
            username
        }
        Err(e) => {
            tracing::warn!("get_me failed (continuing without @mention checks): {e}");
            None
        }
    };
    tracing::info!(
        targets = ?cfg.target_chats.iter().map(|c| c.0).collect::<Vec<_>>(),
        daily_limit = cfg.daily_limit,
        mode = ?cfg.mode,
        "routing configured"
    );

    let raw: Arc<dyn ChatTransport> = Arc::new(TelegramTransport::new(bot.clone()));
    let transport: Arc<dyn ChatTransport> =
        Arc::new(ThrottledTransport::new(raw, ThrottleConfig::default()));

    let router = Arc::new(MessageRouter::new(
        RouterSettings::from_config(&cfg).with_bot_username(bot_username),
        state,
        knowledge,
        generator,
        transport,
    ));

    let app = Arc::new(AppState {
        router,
        chat_locks: Arc::new(ChatLocks::default()),
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    tracing::info!("bot is running and ready to receive messages");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![app])
        .build()
        .dispatch()
        .await;

    Ok(())
}
