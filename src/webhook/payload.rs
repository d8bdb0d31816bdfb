use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;
use tracing::warn;

use crate::error::WebhookError;

static PARSE_FAILURES: AtomicU64 = AtomicU64::new(0);

/// Native SOL movement between two accounts, in lamports.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NativeTransfer {
    pub from_user_account: String,
    pub to_user_account: String,
    pub amount: u64,
}

/// SPL token movement. `token_amount` is already scaled by the mint's decimals.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenTransfer {
    pub from_user_account: String,
    pub to_user_account: String,
    pub mint: String,
    pub token_amount: Option<serde_json::Number>,
    pub symbol: Option<String>,
}

/// Unscaled integer amount plus the mint's decimal exponent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTokenAmount {
    /// Signed base-unit delta as a decimal string, e.g. "-1500000".
    pub token_amount: String,
    pub decimals: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenBalanceChange {
    /// Owner wallet of the token account.
    pub user_account: String,
    pub token_account: String,
    pub mint: String,
    pub raw_token_amount: RawTokenAmount,
}

/// Per-account balance deltas for one transaction.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountData {
    pub account: String,
    /// Lamports; negative means the account paid out.
    pub native_balance_change: i64,
    pub token_balance_changes: Vec<TokenBalanceChange>,
    /// Present on some providers' entries for mint accounts.
    pub token_symbol: Option<String>,
}

/// One inbound swap notification (enhanced-transaction shape). Every field
/// is defaulted so partial payloads still deserialize and can be classified
/// as unrecognized instead of rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawNotification {
    pub signature: String,
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Venue hint, e.g. "PUMP_AMM", "RAYDIUM".
    pub source: Option<String>,
    pub transaction_error: Option<serde_json::Value>,
    pub native_transfers: Vec<NativeTransfer>,
    pub token_transfers: Vec<TokenTransfer>,
    pub account_data: Vec<AccountData>,
}

impl RawNotification {
    /// Every account this notification mentions, first-seen order, no repeats.
    /// Token balance owners are included so a wallet that only shows up via
    /// its token accounts is still considered.
    pub fn involved_accounts(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for data in &self.account_data {
            push_unique(&mut seen, &data.account);
            for change in &data.token_balance_changes {
                push_unique(&mut seen, &change.user_account);
            }
        }
        for transfer in &self.native_transfers {
            push_unique(&mut seen, &transfer.from_user_account);
            push_unique(&mut seen, &transfer.to_user_account);
        }
        for transfer in &self.token_transfers {
            push_unique(&mut seen, &transfer.from_user_account);
            push_unique(&mut seen, &transfer.to_user_account);
        }
        seen
    }

    pub fn failed(&self) -> bool {
        self.transaction_error
            .as_ref()
            .map_or(false, |e| !e.is_null())
    }
}

fn push_unique<'a>(seen: &mut Vec<&'a str>, account: &'a str) {
    if !account.is_empty() && !seen.contains(&account) {
        seen.push(account);
    }
}

/// Result of splitting one webhook body into notifications.
#[derive(Debug, Default)]
pub struct ParsedBatch {
    pub notifications: Vec<RawNotification>,
    /// Items that were present but did not deserialize.
    pub rejected: usize,
}

/// Split a webhook body into notifications.
///
/// The provider sends either a single object or an array of objects. Items
/// that fail to deserialize are skipped and counted; the request is only
/// rejected when the body is not an object/array, is empty, or no item at
/// all could be read.
pub fn parse_webhook_body(body: &serde_json::Value) -> Result<ParsedBatch, WebhookError> {
    let items: Vec<&serde_json::Value> = match body {
        serde_json::Value::Array(items) => items.iter().collect(),
        serde_json::Value::Object(_) => vec![body],
        _ => {
            return Err(WebhookError::Malformed(
                "expected a JSON object or array".to_string(),
            ))
        }
    };

    if items.is_empty() {
        return Err(WebhookError::Empty);
    }

    let mut batch = ParsedBatch::default();
    for item in items {
        match RawNotification::deserialize(item) {
            Ok(notification) if item.is_object() => batch.notifications.push(notification),
            Ok(_) => batch.rejected += 1,
            Err(e) => {
                batch.rejected += 1;
                let count = PARSE_FAILURES.fetch_add(1, Ordering::Relaxed) + 1;
                if count <= 10 || count % 1000 == 0 {
                    warn!(count, "[WEBHOOK PARSE] unreadable notification: {e}");
                }
            }
        }
    }

    if batch.notifications.is_empty() {
        return Err(WebhookError::Malformed(format!(
            "none of {} items could be read",
            batch.rejected
        )));
    }
    Ok(batch)
}
