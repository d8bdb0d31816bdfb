//! Telegram HTML rendering for trade alerts and command replies.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::links;
use crate::state::WatchList;
use crate::types::{short_address, FormattedAlert, LinkButton, TradeDirection, TradeEvent};

const NATIVE_SYMBOL: &str = "SOL";
const NATIVE_DECIMALS: u32 = 3;
const TOKEN_DECIMALS: u32 = 2;
const PRICE_DECIMALS: u32 = 6;
/// Smallest values are shown with at most this many places.
const MAX_SMALL_DECIMALS: u32 = 8;

// ---------------------------------------------------------------------------
// Trade alerts
// ---------------------------------------------------------------------------

/// Render one trade. Never fails: a missing label falls back to the address
/// and a missing price drops the price line.
pub fn format_trade(event: &TradeEvent) -> FormattedAlert {
    let glyph = match event.direction {
        TradeDirection::Buy => "🟢",
        TradeDirection::Sell => "🔴",
    };
    let label = escape_html(event.label_display());
    let token = escape_html(&event.token_display());
    let venue = escape_html(&event.venue);
    let native = format_amount(event.native_amount, NATIVE_DECIMALS);
    let amount = format_amount(event.token_amount, TOKEN_DECIMALS);

    let summary = match event.direction {
        TradeDirection::Buy => {
            format!("{label} swapped {native} {NATIVE_SYMBOL} for {amount} {token}")
        }
        TradeDirection::Sell => {
            format!("{label} swapped {amount} {token} for {native} {NATIVE_SYMBOL}")
        }
    };

    let mut text = format!(
        "{glyph} <b>{} {token} on {venue}</b>\n<b>{label}</b>\n\n{summary}",
        event.direction
    );
    if let Some(price) = event.estimated_unit_price.filter(|p| !p.is_zero()) {
        text.push_str(&format!(
            "\nAvg: {} {NATIVE_SYMBOL} (est)",
            format_amount(price, PRICE_DECIMALS)
        ));
    }

    FormattedAlert {
        text,
        buttons: token_links(&event.token_mint),
    }
}

fn token_links(mint: &str) -> Vec<LinkButton> {
    vec![
        LinkButton {
            text: "DexScreener".to_string(),
            url: format!("{}/{mint}", links::DEXSCREENER),
        },
        LinkButton {
            text: "Solscan".to_string(),
            url: format!("{}/{mint}", links::SOLSCAN_TOKEN),
        },
        LinkButton {
            text: "Pump.fun".to_string(),
            url: format!("{}/{mint}", links::PUMP_FUN),
        },
    ]
}

/// Compact human amount: `1.2M`, `10.5`, `0.00000875`.
///
/// Values of at least a thousand get a K/M/B suffix, chosen after rounding so
/// `999999.5` prints as `1M`. Values below one get up to `decimals + 4`
/// places (capped at 8). Trailing zeros are trimmed.
pub fn format_amount(value: Decimal, decimals: u32) -> String {
    const SUFFIXES: [&str; 4] = ["", "K", "M", "B"];
    let thousand = Decimal::from(1_000u64);
    let round = |d: Decimal, places: u32| {
        d.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero)
    };

    let sign = if value.is_sign_negative() && !value.is_zero() { "-" } else { "" };
    let abs = value.abs();

    let mut tier = 0;
    let mut scaled = abs;
    while tier < SUFFIXES.len() - 1 && scaled >= thousand {
        scaled /= thousand;
        tier += 1;
    }

    let places = if abs < Decimal::ONE {
        (decimals + 4).min(MAX_SMALL_DECIMALS)
    } else {
        decimals
    };
    let mut rounded = round(scaled, places);
    if tier < SUFFIXES.len() - 1 && rounded >= thousand {
        rounded = round(rounded / thousand, places);
        tier += 1;
    }

    if rounded.is_zero() && !abs.is_zero() {
        return format!("{sign}<{}", Decimal::new(1, places));
    }
    format!("{sign}{}{}", rounded.normalize(), SUFFIXES[tier])
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Command replies
// ---------------------------------------------------------------------------

pub fn format_whale_list(list: &WatchList) -> String {
    if list.is_empty() {
        return "No whales configured.".to_string();
    }

    let mut message = format!(
        "<b>🐋 Tracked Whales ({}, {} active):</b>\n\n",
        list.len(),
        list.active_count()
    );
    for whale in list {
        let status = if whale.is_active() { "✅ Active" } else { "⏸️ Paused" };
        message.push_str(&format!(
            "<b>{}</b>\nStatus: {status}\nAddress: <code>{}</code>\n\n",
            escape_html(&whale.label),
            short_address(&whale.address),
        ));
    }
    message.trim_end().to_string()
}

/// `/status` body: the alerts switch, watch-list counts, delivered total and
/// the id of the chat asking.
pub fn format_status(alerts_enabled: bool, list: &WatchList, delivered: u64, chat_id: i64) -> String {
    let alerts = if alerts_enabled { "🟢 ON" } else { "🔴 OFF" };
    format!(
        "📊 <b>Status</b>\n\n<b>Chat ID:</b> <code>{chat_id}</code>\n<b>Alerts:</b> {alerts}\n<b>Tracked Whales:</b> {} ({} active)\n<b>Alerts Sent:</b> {delivered}",
        list.len(),
        list.active_count()
    )
}

pub fn format_chat_info(chat_id: i64) -> String {
    format!(
        "📋 <b>Chat Information</b>\n\n<b>Chat ID:</b> <code>{chat_id}</code>\n\n<i>Add to ALLOWED_CHAT_IDS or use as ALERT_CHAT_ID</i>"
    )
}

/// `/version` body: package version, database file, watch-list size and the
/// caller's chat id.
pub fn format_version(db_path: &str, list: &WatchList, chat_id: i64) -> String {
    format!(
        "🔧 <b>{} v{}</b>\n\n<b>Database:</b> <code>{}</code>\n<b>Whales in DB:</b> {} ({} active)\n<b>Your Chat ID:</b> <code>{chat_id}</code>",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        escape_html(db_path),
        list.len(),
        list.active_count()
    )
}
