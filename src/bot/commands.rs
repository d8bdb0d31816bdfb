use teloxide::utils::command::{BotCommands, ParseError};
use thiserror::Error;

use crate::alerts::formatter::escape_html;
use crate::state::RegistryError;

/// Rejections shown to the caller as reply text.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("⛔ Only admins can change the watch list")]
    Unauthorized,

    /// Carries the command's description, which ends with its usage line.
    #[error("❌ {0}")]
    Usage(String),

    #[error("❌ Invalid Solana address: {0}")]
    InvalidAddress(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Storage unavailable: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Bot commands. Names are the lowercased variant names, matched exactly.
#[derive(BotCommands, Debug, Clone, PartialEq, Eq)]
#[command(
    rename_rule = "lowercase",
    description = "🐋 Whale Tracker commands (watch list changes are admin only):"
)]
pub enum Command {
    #[command(description = "Show the welcome message")]
    Start,
    #[command(description = "Show this help message")]
    Help,
    #[command(description = "List all tracked whales")]
    Whales,
    #[command(description = "Alerts switch, watch list summary and this chat's id")]
    Status,
    #[command(description = "Show this chat's id for ALLOWED_CHAT_IDS")]
    GetChatId,
    #[command(description = "Show build version and database info")]
    Version,
    #[command(
        description = "Add a whale. Usage: /addwhale <label> <address>",
        parse_with = label_and_address
    )]
    AddWhale { label: String, address: String },
    #[command(
        description = "Remove a whale. Usage: /removewhale <label|address>",
        parse_with = identifier
    )]
    RemoveWhale(String),
    #[command(
        description = "Pause tracking. Usage: /pausewhale <label|address>",
        parse_with = identifier
    )]
    PauseWhale(String),
    #[command(
        description = "Resume tracking. Usage: /resumewhale <label|address>",
        parse_with = identifier
    )]
    ResumeWhale(String),
    #[command(description = "Pause all whales")]
    PauseAll,
    #[command(description = "Resume all whales")]
    ResumeAll,
    #[command(description = "Turn trade alerts on")]
    AlertsOn,
    #[command(description = "Turn trade alerts off")]
    AlertsOff,
}

/// A command message: either one of [`Command`] or a name nobody registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Command(Command),
    Unknown(String),
}

impl Incoming {
    /// Parse a message. Returns None for text that is not a command.
    ///
    /// Any `@botname` suffix is dropped before matching, so commands work in
    /// groups regardless of how the bot is addressed. A wrong argument count
    /// is a `Usage` error carrying the command's description.
    pub fn parse(text: &str) -> Option<Result<Incoming, CommandError>> {
        let name = command_name(text)?;
        let rest = text
            .trim_start()
            .split_once(char::is_whitespace)
            .map_or("", |(_, rest)| rest);
        let normalized = format!("/{name} {rest}");

        let parsed = match Command::parse(&normalized, "") {
            Ok(command) => Ok(Incoming::Command(command)),
            Err(ParseError::UnknownCommand(_)) => Ok(Incoming::Unknown(name.to_string())),
            Err(_) => Err(CommandError::Usage(usage(name))),
        };
        Some(parsed)
    }
}

/// `/help` reply, built from the command descriptions.
pub fn help_text() -> String {
    escape_html(&Command::descriptions().to_string())
}

/// Whether a command name is one of the mutating commands. Used to apply the
/// admin gate before argument validation.
pub fn is_admin_command(name: &str) -> bool {
    matches!(
        name,
        "addwhale"
            | "removewhale"
            | "pausewhale"
            | "resumewhale"
            | "pauseall"
            | "resumeall"
            | "alertson"
            | "alertsoff"
    )
}

/// First token of a command message with `/` and `@botname` removed.
pub fn command_name(text: &str) -> Option<&str> {
    let head = text.split_whitespace().next()?.strip_prefix('/')?;
    Some(head.split_once('@').map_or(head, |(name, _)| name))
}

fn usage(name: &str) -> String {
    Command::bot_commands()
        .into_iter()
        .find(|c| c.command.trim_start_matches('/') == name)
        .map_or_else(|| format!("/{name}"), |c| c.description)
}

// ---------------------------------------------------------------------------
// Argument parsers
// ---------------------------------------------------------------------------

/// Exactly `N` whitespace-separated words.
fn words<const N: usize>(input: &str) -> Result<[String; N], ParseError> {
    let args: Vec<String> = input.split_whitespace().map(str::to_string).collect();
    let found = args.len();
    args.try_into().map_err(|_| {
        let message = format!("expected {N} argument(s), got {found}");
        if found < N {
            ParseError::TooFewArguments { expected: N, found, message }
        } else {
            ParseError::TooManyArguments { expected: N, found, message }
        }
    })
}

fn identifier(input: String) -> Result<(String,), ParseError> {
    let [identifier] = words::<1>(&input)?;
    Ok((identifier,))
}

fn label_and_address(input: String) -> Result<(String, String), ParseError> {
    let [label, address] = words::<2>(&input)?;
    Ok((label, address))
}
