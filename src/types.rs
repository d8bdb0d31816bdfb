use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Watch list
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchStatus {
    Active,
    Paused,
}

impl WatchStatus {
    pub fn is_active(self) -> bool {
        self == WatchStatus::Active
    }
}

impl std::fmt::Display for WatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchStatus::Active => write!(f, "active"),
            WatchStatus::Paused => write!(f, "paused"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedAddress {
    /// Row id; ascending ids give insertion order.
    pub id: i64,
    pub address: String,
    pub label: String,
    pub status: WatchStatus,
    /// Unix seconds.
    pub added_at: i64,
}

impl WatchedAddress {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

// ---------------------------------------------------------------------------
// Trade events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeDirection {
    /// Native asset spent, token received.
    Buy,
    /// Token spent, native asset received.
    Sell,
}

impl std::fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeDirection::Buy => write!(f, "BUY"),
            TradeDirection::Sell => write!(f, "SELL"),
        }
    }
}

/// A classified swap by one watched address. Ephemeral: built per
/// notification, formatted, delivered, dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeEvent {
    pub direction: TradeDirection,
    pub signature: String,
    pub watched_address: String,
    /// Filled from the registry by the pipeline. None if the entry vanished mid-flight.
    pub label: Option<String>,
    pub token_mint: String,
    pub token_symbol: Option<String>,
    /// Absolute SOL-equivalent amount spent (BUY) or received (SELL).
    pub native_amount: Decimal,
    /// Absolute token amount, already scaled by the token's decimals.
    pub token_amount: Decimal,
    /// native_amount / token_amount in SOL per token; None when token_amount is zero.
    pub estimated_unit_price: Option<Decimal>,
    pub venue: String,
    /// Unix seconds from the notification, 0 if absent.
    pub timestamp: i64,
}

impl TradeEvent {
    /// Token symbol if known, otherwise the shortened mint.
    pub fn token_display(&self) -> String {
        match self.token_symbol.as_deref().map(str::trim) {
            Some(symbol) if !symbol.is_empty() => symbol.to_string(),
            _ => short_address(&self.token_mint),
        }
    }

    /// Label for display; falls back to the raw address.
    pub fn label_display(&self) -> &str {
        match self.label.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => label,
            _ => &self.watched_address,
        }
    }
}

/// `ABCDEFGH...UVWXYZ` for long addresses, unchanged for short ones.
pub fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 16 {
        return address.to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 6..].iter().collect();
    format!("{head}...{tail}")
}

// ---------------------------------------------------------------------------
// Formatted output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkButton {
    pub text: String,
    pub url: String,
}

/// Alert text (Telegram HTML) plus one row of deep-link buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedAlert {
    pub text: String,
    pub buttons: Vec<LinkButton>,
}

// ---------------------------------------------------------------------------
// Pipeline outcomes
// ---------------------------------------------------------------------------

/// Terminal state of one (notification, watched address) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineOutcome {
    NotWatched,
    AlertsDisabled,
    Unrecognized,
    Duplicate,
    PersistenceFailed,
    RateLimited,
    DeliveryFailed,
    Delivered,
}
