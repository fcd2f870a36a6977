use crate::domain::ChatKind;

/// Commands answering with the fixed greeting.
const START_COMMANDS: &[&str] = &["start"];
/// Commands whose argument is a Question.
const PROMPT_COMMANDS: &[&str] = &["p", "prompt"];
/// Commands adding an admin.
const ADD_ADMIN_COMMANDS: &[&str] = &["addadmin", "add_admin"];

/// The shape of an inbound message, before any state is consulted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    Start,
    /// Question text with the command token removed (may be empty).
    Question(String),
    /// Raw argument string of an add-admin command.
    AddAdmin(String),
    Other,
}

/// A `/cmd@botname rest` token split into its parts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandToken {
    /// Lowercased command name without the slash.
    pub name: String,
    /// The `@botname` suffix, if any.
    pub addressee: Option<String>,
    /// Argument text, trimmed.
    pub rest: String,
}

impl CommandToken {
    /// True unless the command explicitly names a different bot.
    pub fn is_for(&self, bot_username: Option<&str>) -> bool {
        match (self.addressee.as_deref(), bot_username) {
            (Some(target), Some(me)) => target.eq_ignore_ascii_case(me.trim_start_matches('@')),
            _ => true,
        }
    }
}

pub fn parse_command(text: &str) -> Option<CommandToken> {
    let text = text.trim();
    let head = text.strip_prefix('/')?;

    let mut parts = head.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("").trim().to_string();

    let (name, addressee) = match first.split_once('@') {
        Some((name, bot)) => (name, Some(bot.to_string())),
        None => (first, None),
    };

    Some(CommandToken {
        name: name.to_lowercase(),
        addressee,
        rest,
    })
}

/// `bot_username` is our own handle; commands addressed to another bot are `Other`.
pub fn classify(
    text: &str,
    chat_kind: ChatKind,
    implicit_group_prompts: bool,
    bot_username: Option<&str>,
) -> Inbound {
    let Some(token) = parse_command(text) else {
        if chat_kind == ChatKind::Group && implicit_group_prompts && !text.trim().is_empty() {
            return Inbound::Question(text.trim().to_string());
        }
        return Inbound::Other;
    };

    if !token.is_for(bot_username) {
        return Inbound::Other;
    }

    let cmd = token.name.as_str();
    if START_COMMANDS.contains(&cmd) {
        Inbound::Start
    } else if PROMPT_COMMANDS.contains(&cmd) {
        Inbound::Question(token.rest)
    } else if ADD_ADMIN_COMMANDS.contains(&cmd) {
        Inbound::AddAdmin(token.rest)
    } else {
        Inbound::Other
    }
}
