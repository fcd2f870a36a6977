//! Message router: classify one inbound message, enforce the chat's daily
//! quota, and perform at most one outbound reply.

use std::{sync::Arc, time::Duration};

use chrono::NaiveDate;

use crate::{
    commands::{classify, Inbound},
    config::{BotMode, Config},
    domain::{ChatId, InboundMessage, UserId},
    errors::Error,
    knowledge::KnowledgeCache,
    messaging::port::ChatTransport,
    model::client::AnswerGenerator,
    quota::{QuotaBook, QuotaDecision},
    state::BotState,
    Result,
};

pub const GREETING: &str = "I'm a bot, please talk to me!";
pub const UNAUTHORIZED_REPLY: &str = "You are not authorized to use this command.";
pub const ADMIN_ADDED_REPLY: &str = "Admin added successfully.";
pub const ADMIN_USAGE_REPLY: &str = "Usage: /addadmin <user_id>";
pub const QUESTION_USAGE_REPLY: &str = "Usage: /p <question>";
pub const ECHO_SUFFIX: &str = " - claude";

const MAX_DIAGNOSTIC_CHARS: usize = 200;

pub fn limit_reached_reply(limit: u32) -> String {
    format!("GPT limit for this group has been reached ({limit} msgs a day).")
}

pub fn failure_reply(diagnostic: &str) -> String {
    let truncated = if diagnostic.chars().count() > MAX_DIAGNOSTIC_CHARS {
        format!(
            "{}...",
            diagnostic.chars().take(MAX_DIAGNOSTIC_CHARS).collect::<String>()
        )
    } else {
        diagnostic.to_string()
    };
    format!("❌ Error: Error processing request: {truncated}")
}

/// Routing knobs, usually derived from [`Config`].
#[derive(Clone, Debug)]
pub struct RouterSettings {
    pub target_chats: Vec<ChatId>,
    pub mode: BotMode,
    pub implicit_group_prompts: bool,
    pub generator_timeout: Duration,
    /// Our own handle (without `@`); commands addressed to other bots are ignored.
    pub bot_username: Option<String>,
}

impl RouterSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            target_chats: cfg.target_chats.clone(),
            mode: cfg.mode,
            implicit_group_prompts: cfg.implicit_group_prompts,
            generator_timeout: cfg.generator_timeout,
            bot_username: None,
        }
    }

    pub fn with_bot_username(mut self, username: Option<String>) -> Self {
        self.bot_username = username;
        self
    }

    fn serves(&self, chat_id: ChatId) -> bool {
        self.target_chats.contains(&chat_id)
    }
}

/// What the router did with a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Routed {
    /// Not a served chat or not a recognized shape; nothing was sent.
    Ignored,
    Greeted,
    Echoed,
    /// Generator answered; `used` is the chat's count after this Question.
    Answered { used: u32 },
    QuotaExceeded { limit: u32 },
    /// Generation failed after the quota unit was consumed.
    GeneratorFailed { used: u32, reason: String },
    AdminAdded(UserId),
    Unauthorized,
    /// Malformed command argument; usage text was sent.
    Usage,
}

pub struct MessageRouter {
    settings: RouterSettings,
    state: Arc<BotState>,
    knowledge: Arc<KnowledgeCache>,
    generator: Arc<dyn AnswerGenerator>,
    transport: Arc<dyn ChatTransport>,
}

impl MessageRouter {
    pub fn new(
        settings: RouterSettings,
        state: Arc<BotState>,
        knowledge: Arc<KnowledgeCache>,
        generator: Arc<dyn AnswerGenerator>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            settings,
            state,
            knowledge,
            generator,
            transport,
        }
    }

    pub fn state(&self) -> &Arc<BotState> {
        &self.state
    }

    pub async fn handle(&self, msg: &InboundMessage) -> Result<Routed> {
        self.handle_at(msg, QuotaBook::today()).await
    }

    /// Route `msg` as if it arrived on calendar day `today`.
    ///
    /// A reply send failure is returned as `Error::Transport`; state changes made
    /// before the send are kept.
    pub async fn handle_at(&self, msg: &InboundMessage, today: NaiveDate) -> Result<Routed> {
        let chat_id = msg.chat_id;
        tracing::debug!(chat_id = chat_id.0, sender = msg.sender_id.0, "received message");

        if !self.settings.serves(chat_id) {
            tracing::debug!(chat_id = chat_id.0, "chat is not a target; ignoring");
            return Ok(Routed::Ignored);
        }

        let inbound = classify(
            &msg.text,
            msg.chat_kind,
            self.settings.implicit_group_prompts,
            self.settings.bot_username.as_deref(),
        );

        if inbound == Inbound::Start {
            self.reply(chat_id, GREETING).await?;
            return Ok(Routed::Greeted);
        }

        // Every other served message rolls the daily counter over.
        self.state.quotas.lock().await.roll_over_at(chat_id, today);

        match inbound {
            Inbound::Question(question) => self.handle_question(chat_id, question, today).await,
            Inbound::AddAdmin(arg) => self.handle_add_admin(chat_id, msg.sender_id, &arg).await,
            Inbound::Start | Inbound::Other => Ok(Routed::Ignored),
        }
    }

    async fn handle_question(
        &self,
        chat_id: ChatId,
        question: String,
        today: NaiveDate,
    ) -> Result<Routed> {
        if question.trim().is_empty() {
            self.reply(chat_id, QUESTION_USAGE_REPLY).await?;
            return Ok(Routed::Usage);
        }

        if self.settings.mode == BotMode::Echo {
            self.reply(chat_id, &format!("{question}{ECHO_SUFFIX}"))
                .await?;
            return Ok(Routed::Echoed);
        }

        let decision = self.state.quotas.lock().await.try_consume_at(chat_id, today);
        let used = match decision {
            QuotaDecision::Granted { used } => used,
            QuotaDecision::Exhausted { limit } => {
                tracing::info!(chat_id = chat_id.0, limit, "daily limit reached");
                self.reply(chat_id, &limit_reached_reply(limit)).await?;
                return Ok(Routed::QuotaExceeded { limit });
            }
        };

        tracing::info!(chat_id = chat_id.0, used, "forwarding question to generator");
        match self.answer(&question).await {
            Ok(text) => {
                self.reply(chat_id, &text).await?;
                Ok(Routed::Answered { used })
            }
            Err(err) => {
                // The quota unit stays consumed: a failed attempt still costs one.
                let reason = err.to_string();
                tracing::warn!(chat_id = chat_id.0, "generation failed: {reason}");
                self.reply(chat_id, &failure_reply(&user_diagnostic(&err))).await?;
                Ok(Routed::GeneratorFailed { used, reason })
            }
        }
    }

    async fn answer(&self, question: &str) -> Result<String> {
        let doc = self.knowledge.current().await?;
        let timeout = self.settings.generator_timeout;

        match tokio::time::timeout(timeout, self.generator.generate(question, &doc.text)).await {
            Ok(Ok(text)) if text.trim().is_empty() => {
                Err(Error::Generator("empty response".to_string()))
            }
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(timeout)),
        }
    }

    async fn handle_add_admin(&self, chat_id: ChatId, sender: UserId, arg: &str) -> Result<Routed> {
        let mut admins = self.state.admins.lock().await;
        if !admins.contains(sender) {
            drop(admins);
            tracing::warn!(sender = sender.0, "unauthorized admin command");
            self.reply(chat_id, UNAUTHORIZED_REPLY).await?;
            return Ok(Routed::Unauthorized);
        }

        let Some(new_admin) = parse_user_id(arg) else {
            drop(admins);
            self.reply(chat_id, ADMIN_USAGE_REPLY).await?;
            return Ok(Routed::Usage);
        };

        admins.add(new_admin);
        drop(admins);
        tracing::info!(by = sender.0, admin = new_admin.0, "admin added");
        self.reply(chat_id, ADMIN_ADDED_REPLY).await?;
        Ok(Routed::AdminAdded(new_admin))
    }

    async fn reply(&self, chat_id: ChatId, text: &str) -> Result<()> {
        let text = fit_message(text, self.transport.max_message_len());
        self.transport
            .send_reply(chat_id, &text)
            .await
            .map_err(|e| match e {
                Error::Transport(_) => e,
                other => Error::Transport(other.to_string()),
            })
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut.
fn fit_message(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    const MARK: &str = "\n…";
    let keep = max_chars.saturating_sub(MARK.chars().count());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(MARK);
    out
}

/// Chat-facing text for a failed answer. Knowledge errors carry server paths.
fn user_diagnostic(err: &Error) -> String {
    match err {
        Error::Knowledge(_) => "knowledge base unavailable".to_string(),
        other => other.to_string(),
    }
}

/// Exactly one positive numeric token.
fn parse_user_id(arg: &str) -> Option<UserId> {
    let mut tokens = arg.split_whitespace();
    let id = tokens.next()?.parse::<i64>().ok().filter(|id| *id > 0)?;
    if tokens.next().is_some() {
        return None;
    }
    Some(UserId(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::ChatKind,
        knowledge::store::{Fingerprint, KnowledgeStore},
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    const GROUP: ChatId = ChatId(-4718382612);
    const SEED: UserId = UserId(1);

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
    }

    #[derive(Default)]
    struct FakeTransport {
        sent: Mutex<Vec<(ChatId, String)>>,
        fail: bool,
    }

    impl FakeTransport {
        fn sent(&self) -> Vec<(ChatId, String)> {
            self.sent.lock().unwrap().clone()
        }

        fn last(&self) -> Option<String> {
            self.sent.lock().unwrap().last().map(|(_, t)| t.clone())
        }
    }

    #[async_trait]
    impl ChatTransport for FakeTransport {
        fn max_message_len(&self) -> usize {
            4096
        }

        async fn send_reply(&self, chat_id: ChatId, text: &str) -> Result<()> {
            if self.fail {
                return Err(Error::External("network down".to_string()));
            }
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }
    }

    enum Behavior {
        Answer(&'static str),
        Fail(&'static str),
        Hang,
    }

    struct FakeGenerator {
        behavior: Behavior,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl FakeGenerator {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AnswerGenerator for FakeGenerator {
        async fn generate(&self, question: &str, context: &str) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((question.to_string(), context.to_string()));
            match self.behavior {
                Behavior::Answer(text) => Ok(text.to_string()),
                Behavior::Fail(reason) => Err(Error::Generator(reason.to_string())),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok("too late".to_string())
                }
            }
        }
    }

    struct StaticStore(&'static str);

    struct MissingStore;

    #[async_trait]
    impl KnowledgeStore for MissingStore {
        async fn current_fingerprint(&self) -> Result<Fingerprint> {
            Err(Error::Knowledge(
                "cannot read /srv/kbot/knowledge-base/all.txt: No such file or directory".to_string(),
            ))
        }

        async fn load(&self) -> Result<String> {
            Err(Error::Knowledge("unreachable".to_string()))
        }
    }

    #[async_trait]
    impl KnowledgeStore for StaticStore {
        async fn current_fingerprint(&self) -> Result<Fingerprint> {
            Ok(Fingerprint(self.0.to_string()))
        }

        async fn load(&self) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Harness {
        router: MessageRouter,
        transport: Arc<FakeTransport>,
        generator: Arc<FakeGenerator>,
    }

    fn harness_with(
        limit: u32,
        mode: BotMode,
        behavior: Behavior,
        transport: FakeTransport,
    ) -> Harness {
        harness_with_store(limit, mode, behavior, transport, Arc::new(StaticStore("APE DOCS")))
    }

    fn harness_with_store(
        limit: u32,
        mode: BotMode,
        behavior: Behavior,
        transport: FakeTransport,
        store: Arc<dyn KnowledgeStore>,
    ) -> Harness {
        let transport = Arc::new(transport);
        let generator = Arc::new(FakeGenerator::new(behavior));
        let router = MessageRouter::new(
            RouterSettings {
                target_chats: vec![GROUP],
                mode,
                implicit_group_prompts: true,
                generator_timeout: Duration::from_millis(50),
                bot_username: Some("ape_bot".to_string()),
            },
            Arc::new(BotState::new(limit, SEED)),
            Arc::new(KnowledgeCache::new(store)),
            generator.clone(),
            transport.clone(),
        );
        Harness {
            router,
            transport,
            generator,
        }
    }

    fn harness(limit: u32, behavior: Behavior) -> Harness {
        harness_with(limit, BotMode::Answer, behavior, FakeTransport::default())
    }

    fn group_msg(sender: i64, text: &str) -> InboundMessage {
        InboundMessage {
            chat_id: GROUP,
            sender_id: UserId(sender),
            text: text.to_string(),
            chat_kind: ChatKind::Group,
        }
    }

    async fn used_today(h: &Harness) -> Option<u32> {
        h.router
            .state()
            .quotas
            .lock()
            .await
            .get(GROUP)
            .map(|r| r.messages_today)
    }

    #[tokio::test]
    async fn eleventh_question_hits_the_limit() {
        let h = harness(10, Behavior::Answer("answer"));

        for i in 1..=10 {
            let out = h
                .router
                .handle_at(&group_msg(7, "/p What is ApeWorX?"), day(1))
                .await
                .unwrap();
            assert_eq!(out, Routed::Answered { used: i });
        }
        assert_eq!(h.generator.calls().len(), 10);

        let out = h
            .router
            .handle_at(&group_msg(7, "/p one more"), day(1))
            .await
            .unwrap();
        assert_eq!(out, Routed::QuotaExceeded { limit: 10 });
        assert_eq!(
            h.transport.last().unwrap(),
            "GPT limit for this group has been reached (10 msgs a day)."
        );
        assert_eq!(h.generator.calls().len(), 10);
        assert_eq!(used_today(&h).await, Some(10));
    }

    #[tokio::test]
    async fn question_reaches_generator_with_document_and_stripped_text() {
        let h = harness(10, Behavior::Answer("Ape is a framework."));
        h.router
            .handle_at(&group_msg(7, "/prompt@ape_bot What is ApeWorX?"), day(1))
            .await
            .unwrap();
        h.router
            .handle_at(&group_msg(7, "How do I deploy?"), day(1))
            .await
            .unwrap();

        assert_eq!(
            h.generator.calls(),
            vec![
                ("What is ApeWorX?".to_string(), "APE DOCS".to_string()),
                ("How do I deploy?".to_string(), "APE DOCS".to_string()),
            ]
        );
        assert_eq!(h.transport.last().unwrap(), "Ape is a framework.");
        assert_eq!(used_today(&h).await, Some(2));
    }

    #[tokio::test]
    async fn new_day_resets_on_any_message_before_limit_check() {
        let h = harness(1, Behavior::Answer("ok"));
        h.router.handle_at(&group_msg(7, "/p q"), day(1)).await.unwrap();
        assert_eq!(
            h.router.handle_at(&group_msg(7, "/p q"), day(1)).await.unwrap(),
            Routed::QuotaExceeded { limit: 1 }
        );

        // A non-Question message on the next day still resets the counter.
        assert_eq!(
            h.router.handle_at(&group_msg(7, "/unknown"), day(2)).await.unwrap(),
            Routed::Ignored
        );
        assert_eq!(used_today(&h).await, Some(0));

        assert_eq!(
            h.router.handle_at(&group_msg(7, "/p q"), day(2)).await.unwrap(),
            Routed::Answered { used: 1 }
        );
    }

    #[tokio::test]
    async fn start_never_touches_quota_or_admins() {
        let h = harness(1, Behavior::Answer("ok"));
        let out = h
            .router
            .handle_at(&group_msg(99, "/start"), day(1))
            .await
            .unwrap();
        assert_eq!(out, Routed::Greeted);
        assert_eq!(h.transport.last().unwrap(), GREETING);
        assert_eq!(used_today(&h).await, None);
        assert!(!h.router.state().admins.lock().await.contains(UserId(99)));
    }

    #[tokio::test]
    async fn greeting_still_works_when_quota_is_exhausted() {
        let h = harness(1, Behavior::Answer("ok"));
        h.router.handle_at(&group_msg(7, "/p q"), day(1)).await.unwrap();
        h.router.handle_at(&group_msg(7, "/p q"), day(1)).await.unwrap();
        assert_eq!(
            h.router.handle_at(&group_msg(7, "/start"), day(1)).await.unwrap(),
            Routed::Greeted
        );
    }

    #[tokio::test]
    async fn unauthorized_admin_command_changes_nothing() {
        let h = harness(10, Behavior::Answer("ok"));
        let out = h
            .router
            .handle_at(&group_msg(5, "/addadmin 12345"), day(1))
            .await
            .unwrap();
        assert_eq!(out, Routed::Unauthorized);
        assert_eq!(h.transport.last().unwrap(), UNAUTHORIZED_REPLY);

        assert!(!h.router.state().admins.lock().await.contains(UserId(12345)));
    }

    #[tokio::test]
    async fn added_admin_passes_later_checks() {
        let h = harness(10, Behavior::Answer("ok"));
        let out = h
            .router
            .handle_at(&group_msg(SEED.0, "/addadmin 12345"), day(1))
            .await
            .unwrap();
        assert_eq!(out, Routed::AdminAdded(UserId(12345)));
        assert_eq!(h.transport.last().unwrap(), "Admin added successfully.");

        let out = h
            .router
            .handle_at(&group_msg(12345, "/add_admin 777"), day(1))
            .await
            .unwrap();
        assert_eq!(out, Routed::AdminAdded(UserId(777)));
    }

    #[tokio::test]
    async fn malformed_admin_argument_gets_usage() {
        let h = harness(10, Behavior::Answer("ok"));
        for arg in ["/addadmin", "/addadmin bob", "/addadmin 1 2", "/addadmin -5", "/addadmin 0"] {
            let out = h.router.handle_at(&group_msg(SEED.0, arg), day(1)).await.unwrap();
            assert_eq!(out, Routed::Usage);
            assert_eq!(h.transport.last().unwrap(), ADMIN_USAGE_REPLY);
        }
        let admins = h.router.state().admins.lock().await;
        assert!(!admins.contains(UserId(-5)));
        assert!(!admins.contains(UserId(0)));
    }

    #[tokio::test]
    async fn timeout_reports_error_and_keeps_the_increment() {
        let h = harness(10, Behavior::Hang);
        let out = h
            .router
            .handle_at(&group_msg(7, "/p slow question"), day(1))
            .await
            .unwrap();
        assert!(matches!(out, Routed::GeneratorFailed { used: 1, .. }));

        let reply = h.transport.last().unwrap();
        assert!(reply.starts_with("❌ Error:"), "got: {reply}");
        assert!(reply.contains("timed out"), "got: {reply}");
        assert_eq!(used_today(&h).await, Some(1));
    }

    #[tokio::test]
    async fn commands_for_another_bot_are_ignored() {
        let h = harness(10, Behavior::Answer("ok"));
        for text in ["/p@other_bot q", "/start@other_bot", "/addadmin@other_bot 5"] {
            let out = h
                .router
                .handle_at(&group_msg(SEED.0, text), day(1))
                .await
                .unwrap();
            assert_eq!(out, Routed::Ignored, "{text}");
        }
        assert!(h.transport.sent().is_empty());
        assert!(h.generator.calls().is_empty());
        assert_eq!(used_today(&h).await, Some(0));
        assert!(!h.router.state().admins.lock().await.contains(UserId(5)));
    }

    #[tokio::test]
    async fn missing_knowledge_base_spends_the_unit_and_hides_the_path() {
        let h = harness_with_store(
            10,
            BotMode::Answer,
            Behavior::Answer("unused"),
            FakeTransport::default(),
            Arc::new(MissingStore),
        );
        let out = h
            .router
            .handle_at(&group_msg(7, "/p q"), day(1))
            .await
            .unwrap();
        assert!(matches!(out, Routed::GeneratorFailed { used: 1, .. }));
        assert!(h.generator.calls().is_empty());
        assert_eq!(used_today(&h).await, Some(1));

        let reply = h.transport.last().unwrap();
        assert_eq!(
            reply,
            "❌ Error: Error processing request: knowledge base unavailable"
        );
        assert!(!reply.contains("/srv/kbot"));
    }

    #[tokio::test]
    async fn generator_error_is_reported_with_diagnostic() {
        let h = harness(10, Behavior::Fail("overloaded"));
        h.router.handle_at(&group_msg(7, "/p q"), day(1)).await.unwrap();
        let reply = h.transport.last().unwrap();
        assert!(reply.contains("overloaded"), "got: {reply}");
        assert_eq!(used_today(&h).await, Some(1));
    }

    #[tokio::test]
    async fn foreign_chat_is_ignored_without_state_changes() {
        let h = harness(10, Behavior::Answer("ok"));
        let msg = InboundMessage {
            chat_id: ChatId(-999),
            sender_id: SEED,
            text: "/p hello".to_string(),
            chat_kind: ChatKind::Group,
        };
        for text in ["/p hello", "/start", "/addadmin 5", "plain"] {
            let msg = InboundMessage {
                text: text.to_string(),
                ..msg.clone()
            };
            assert_eq!(h.router.handle_at(&msg, day(1)).await.unwrap(), Routed::Ignored);
        }
        assert!(h.transport.sent().is_empty());
        assert!(h.generator.calls().is_empty());
        assert!(h.router.state().quotas.lock().await.snapshot().is_empty());
        assert!(!h.router.state().admins.lock().await.contains(UserId(5)));
    }

    #[tokio::test]
    async fn empty_prompt_gets_usage_without_consuming_quota() {
        let h = harness(10, Behavior::Answer("ok"));
        assert_eq!(
            h.router.handle_at(&group_msg(7, "/p   "), day(1)).await.unwrap(),
            Routed::Usage
        );
        assert_eq!(h.transport.last().unwrap(), QUESTION_USAGE_REPLY);
        assert_eq!(used_today(&h).await, Some(0));
    }

    #[tokio::test]
    async fn echo_mode_replies_without_generation_or_quota() {
        let h = harness_with(
            1,
            BotMode::Echo,
            Behavior::Answer("unused"),
            FakeTransport::default(),
        );
        for _ in 0..3 {
            assert_eq!(
                h.router.handle_at(&group_msg(7, "gm"), day(1)).await.unwrap(),
                Routed::Echoed
            );
        }
        assert_eq!(h.transport.last().unwrap(), "gm - claude");
        assert!(h.generator.calls().is_empty());
        assert_eq!(used_today(&h).await, Some(0));
    }

    #[tokio::test]
    async fn send_failure_surfaces_as_transport_error_after_increment() {
        let h = harness_with(
            10,
            BotMode::Answer,
            Behavior::Answer("ok"),
            FakeTransport {
                fail: true,
                ..Default::default()
            },
        );
        let err = h
            .router
            .handle_at(&group_msg(7, "/p q"), day(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(used_today(&h).await, Some(1));
    }

    #[test]
    fn long_answers_are_cut_to_the_transport_limit() {
        let cut = fit_message(&"é".repeat(5000), 4096);
        assert_eq!(cut.chars().count(), 4096);
        assert!(cut.ends_with('…'));
        assert_eq!(fit_message("short", 4096), "short");
    }

    #[test]
    fn failure_reply_truncates_long_diagnostics() {
        let reply = failure_reply(&"x".repeat(500));
        assert!(reply.ends_with("..."));
        assert!(reply.chars().count() < 300);
    }
}
