use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::alerts::formatter::{
    escape_html, format_chat_info, format_status, format_version, format_whale_list,
};
use crate::api::health::PipelineStats;
use crate::bot::commands::{
    command_name, help_text, is_admin_command, Command, CommandError, Incoming,
};
use crate::state::{AlertSwitch, Registry, RegistryError};
use crate::types::WatchStatus;

/// Solana public keys are 32 bytes.
const PUBKEY_LEN: usize = 32;

/// Turns chat messages into registry operations and reply text.
/// Transport-agnostic: the Telegram dispatcher only passes caller id and text.
pub struct AdminCommandHandler {
    registry: Arc<Registry>,
    alerts: Arc<AlertSwitch>,
    admins: HashSet<i64>,
    stats: Arc<PipelineStats>,
    /// Shown by `/version`.
    db_path: String,
}

impl AdminCommandHandler {
    pub fn new(
        registry: Arc<Registry>,
        alerts: Arc<AlertSwitch>,
        admins: HashSet<i64>,
        stats: Arc<PipelineStats>,
        db_path: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            alerts,
            admins,
            stats,
            db_path: db_path.into(),
        }
    }

    pub fn is_admin(&self, caller: Option<i64>) -> bool {
        caller.map_or(false, |id| self.admins.contains(&id))
    }

    /// Reply text for `text` sent by `caller` in `chat_id`, or None when it is
    /// not a command.
    ///
    /// Mutating commands are gated on the caller before their arguments are
    /// looked at, so an unauthorized caller never learns about usage errors.
    pub async fn handle(&self, caller: Option<i64>, chat_id: i64, text: &str) -> Option<String> {
        let name = command_name(text)?;
        if is_admin_command(name) && !self.is_admin(caller) {
            warn!(?caller, chat_id, command = name, "[CMD] unauthorized");
            return Some(CommandError::Unauthorized.to_string());
        }

        let reply = match Incoming::parse(text)? {
            Ok(Incoming::Command(command)) => {
                info!(?caller, chat_id, command = name, "[CMD] received");
                self.execute(command, chat_id).await
            }
            Ok(Incoming::Unknown(name)) => Ok(format!(
                "Unknown command /{}. Use /help for commands.",
                escape_html(&name)
            )),
            Err(e) => Err(e),
        };

        Some(reply.unwrap_or_else(|e| {
            warn!(?caller, chat_id, command = name, "[CMD] rejected: {e}");
            error_reply(&e)
        }))
    }

    async fn execute(&self, command: Command, chat_id: i64) -> Result<String, CommandError> {
        let reply = match command {
            Command::Start => "🐋 <b>Whale Tracker</b>\n\nUse /help for commands.".to_string(),
            Command::Help => help_text(),
            Command::Whales => format_whale_list(&self.registry.list()),
            Command::Status => format_status(
                self.alerts.is_enabled(),
                &self.registry.list(),
                self.stats.delivered(),
                chat_id,
            ),
            Command::GetChatId => format_chat_info(chat_id),
            Command::Version => format_version(&self.db_path, &self.registry.list(), chat_id),
            Command::AddWhale { label, address } => {
                validate_address(&address)?;
                let entry = self.registry.add(&label, &address).await?;
                format!("✅ Added whale: {}", escape_html(&entry.label))
            }
            Command::RemoveWhale(identifier) => {
                let entry = self.registry.remove(&identifier).await?;
                format!("✅ Removed: {}", escape_html(&entry.label))
            }
            Command::PauseWhale(identifier) => {
                let entry = self
                    .registry
                    .set_status(&identifier, WatchStatus::Paused)
                    .await?;
                format!("⏸️ Paused: {}", escape_html(&entry.label))
            }
            Command::ResumeWhale(identifier) => {
                let entry = self
                    .registry
                    .set_status(&identifier, WatchStatus::Active)
                    .await?;
                format!("✅ Resumed: {}", escape_html(&entry.label))
            }
            Command::PauseAll => {
                let count = self.registry.pause_all().await?;
                format!("⏸️ Paused all {count} whales")
            }
            Command::ResumeAll => {
                let count = self.registry.resume_all().await?;
                format!("✅ Resumed all {count} whales")
            }
            Command::AlertsOn => {
                self.alerts.set(true).await?;
                "🔔 Alerts enabled".to_string()
            }
            Command::AlertsOff => {
                self.alerts.set(false).await?;
                "🔕 Alerts disabled".to_string()
            }
        };
        Ok(reply)
    }
}

/// Base58 that decodes to a 32-byte public key.
pub fn validate_address(address: &str) -> Result<(), CommandError> {
    match bs58::decode(address).into_vec() {
        Ok(bytes) if bytes.len() == PUBKEY_LEN => Ok(()),
        _ => Err(CommandError::InvalidAddress(address.to_string())),
    }
}

fn error_reply(error: &CommandError) -> String {
    match error {
        CommandError::Registry(RegistryError::DuplicateAddress(address)) => {
            format!("❌ Whale already exists: <code>{}</code>", escape_html(address))
        }
        CommandError::Registry(RegistryError::DuplicateLabel(label)) => {
            format!("❌ Label already in use: {}", escape_html(label))
        }
        CommandError::Registry(RegistryError::NotFound(identifier)) => {
            format!("❌ Not found: {}", escape_html(identifier))
        }
        CommandError::Registry(RegistryError::Persistence(_)) | CommandError::Storage(_) => {
            "⚠️ Storage unavailable, nothing was changed. Try again shortly.".to_string()
        }
        other => escape_html(&other.to_string()),
    }
}
