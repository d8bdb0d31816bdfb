use std::str::FromStr;

use rust_decimal::Decimal;

use crate::config::{LAMPORTS_DECIMALS, WSOL_MINT};
use crate::types::{TradeDirection, TradeEvent};
use crate::webhook::RawNotification;

/// Why a notification was not turned into a trade for a given wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnrecognizedReason {
    MissingSignature,
    FailedTransaction,
    /// No non-zero SOL-side change for the wallet.
    NoNativeDelta,
    /// No non-zero token change for the wallet.
    NoTokenDelta,
    /// More than one token moved (multi-hop route, LP action, airdrop batch).
    MultipleTokenDeltas,
    /// Both sides moved the same way (e.g. a plain transfer out of SOL and token).
    AmbiguousDirection,
    /// Summing the wallet's deltas left the decimal range.
    AmountOverflow,
}

impl std::fmt::Display for UnrecognizedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UnrecognizedReason::MissingSignature => "missing_signature",
            UnrecognizedReason::FailedTransaction => "failed_transaction",
            UnrecognizedReason::NoNativeDelta => "no_native_delta",
            UnrecognizedReason::NoTokenDelta => "no_token_delta",
            UnrecognizedReason::MultipleTokenDeltas => "multiple_token_deltas",
            UnrecognizedReason::AmbiguousDirection => "ambiguous_direction",
            UnrecognizedReason::AmountOverflow => "amount_overflow",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Trade(TradeEvent),
    Unrecognized(UnrecognizedReason),
}

/// Net balance movement of one wallet within one transaction.
#[derive(Debug, Default, PartialEq)]
struct BalanceDeltas {
    /// SOL-equivalent change (native lamports plus wrapped SOL).
    native: Decimal,
    /// mint → net change, first-seen order. Zero entries removed.
    tokens: Vec<(String, Decimal)>,
}

impl BalanceDeltas {
    fn add_native(&mut self, delta: Decimal) -> Option<()> {
        self.native = self.native.checked_add(delta)?;
        Some(())
    }

    fn add_token(&mut self, mint: &str, delta: Decimal) -> Option<()> {
        match self.tokens.iter_mut().find(|(m, _)| m == mint) {
            Some((_, total)) => *total = total.checked_add(delta)?,
            None => self.tokens.push((mint.to_string(), delta)),
        }
        Some(())
    }
}

/// Classify `notification` from the point of view of `watched`.
///
/// Direction comes only from the signs of the wallet's own deltas: SOL down
/// and token up is a BUY, SOL up and token down is a SELL. Anything that is
/// not exactly one SOL-side and one token-side change is unrecognized. Never
/// panics on odd payloads; unreadable amounts are treated as absent.
pub fn classify(notification: &RawNotification, watched: &str) -> Classification {
    if notification.signature.trim().is_empty() {
        return Classification::Unrecognized(UnrecognizedReason::MissingSignature);
    }
    if notification.failed() {
        return Classification::Unrecognized(UnrecognizedReason::FailedTransaction);
    }

    let Some(deltas) = balance_deltas(notification, watched) else {
        return Classification::Unrecognized(UnrecognizedReason::AmountOverflow);
    };

    let (mint, token_delta) = match deltas.tokens.as_slice() {
        [] => return Classification::Unrecognized(UnrecognizedReason::NoTokenDelta),
        [single] => single.clone(),
        _ => return Classification::Unrecognized(UnrecognizedReason::MultipleTokenDeltas),
    };
    if deltas.native.is_zero() {
        return Classification::Unrecognized(UnrecognizedReason::NoNativeDelta);
    }

    let direction = if deltas.native.is_sign_negative() && token_delta.is_sign_positive() {
        TradeDirection::Buy
    } else if deltas.native.is_sign_positive() && token_delta.is_sign_negative() {
        TradeDirection::Sell
    } else {
        return Classification::Unrecognized(UnrecognizedReason::AmbiguousDirection);
    };

    let native_amount = deltas.native.abs();
    let token_amount = token_delta.abs();
    let estimated_unit_price = if token_amount.is_zero() {
        None
    } else {
        native_amount.checked_div(token_amount)
    };

    Classification::Trade(TradeEvent {
        direction,
        signature: notification.signature.clone(),
        watched_address: watched.to_string(),
        label: None,
        token_symbol: token_symbol(notification, &mint),
        token_mint: mint,
        native_amount,
        token_amount,
        estimated_unit_price,
        venue: venue_name(notification.source.as_deref()),
        timestamp: notification.timestamp,
    })
}

/// Collect the wallet's deltas.
///
/// Account-level balance changes are preferred since they carry unscaled
/// integer amounts with the mint's decimals. Transfer lists are the fallback
/// when the provider omitted account data for the wallet. None if a sum
/// overflows.
fn balance_deltas(notification: &RawNotification, watched: &str) -> Option<BalanceDeltas> {
    let mut deltas = BalanceDeltas::default();

    let own_account = notification
        .account_data
        .iter()
        .find(|data| data.account == watched);
    if let Some(data) = own_account {
        deltas.add_native(Decimal::new(data.native_balance_change, LAMPORTS_DECIMALS))?;
    } else {
        for transfer in &notification.native_transfers {
            let amount = lamports_to_sol(transfer.amount);
            if transfer.from_user_account == watched {
                deltas.add_native(-amount)?;
            }
            if transfer.to_user_account == watched {
                deltas.add_native(amount)?;
            }
        }
    }

    let mut saw_token_changes = false;
    for change in notification
        .account_data
        .iter()
        .flat_map(|data| data.token_balance_changes.iter())
        .filter(|change| change.user_account == watched)
    {
        saw_token_changes = true;
        let Some(amount) = scaled_amount(&change.raw_token_amount.token_amount, change.raw_token_amount.decimals) else {
            continue;
        };
        if change.mint == WSOL_MINT {
            deltas.add_native(amount)?;
        } else {
            deltas.add_token(&change.mint, amount)?;
        }
    }

    if !saw_token_changes {
        // Wrapping shows up both as a native transfer and a WSOL transfer;
        // only count WSOL when SOL itself did not move.
        let count_wsol = deltas.native.is_zero();
        for transfer in &notification.token_transfers {
            let Some(amount) = transfer.token_amount.as_ref().and_then(number_to_decimal) else {
                continue;
            };
            let mut signed = Decimal::ZERO;
            if transfer.from_user_account == watched {
                signed = signed.checked_sub(amount)?;
            }
            if transfer.to_user_account == watched {
                signed = signed.checked_add(amount)?;
            }
            if transfer.mint == WSOL_MINT {
                if count_wsol {
                    deltas.add_native(signed)?;
                }
            } else {
                deltas.add_token(&transfer.mint, signed)?;
            }
        }
    }

    deltas.tokens.retain(|(_, delta)| !delta.is_zero());
    Some(deltas)
}

fn lamports_to_sol(lamports: u64) -> Decimal {
    Decimal::from_i128_with_scale(i128::from(lamports), LAMPORTS_DECIMALS)
}

/// `raw / 10^decimals` for a signed integer string. None if unreadable.
fn scaled_amount(raw: &str, decimals: u32) -> Option<Decimal> {
    let value = raw.trim().parse::<i128>().ok()?;
    Decimal::try_from_i128_with_scale(value, decimals).ok()
}

fn number_to_decimal(number: &serde_json::Number) -> Option<Decimal> {
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Symbol from transfer metadata, or from the mint's own account entry.
fn token_symbol(notification: &RawNotification, mint: &str) -> Option<String> {
    notification
        .token_transfers
        .iter()
        .filter(|t| t.mint == mint)
        .find_map(|t| t.symbol.clone())
        .or_else(|| {
            notification
                .account_data
                .iter()
                .filter(|a| a.account == mint)
                .find_map(|a| a.token_symbol.clone())
        })
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Human venue name for the provider's source tag.
pub fn venue_name(source: Option<&str>) -> String {
    let Some(source) = source.map(str::trim).filter(|s| !s.is_empty()) else {
        return "Unknown".to_string();
    };
    let name = match source.to_ascii_uppercase().as_str() {
        "PUMP_AMM" | "PUMPSWAP" | "PUMP_SWAP" => "PumpSwap",
        "PUMP_FUN" | "PUMPFUN" => "Pump.fun",
        "RAYDIUM" | "RAYDIUM_CLMM" | "RAYDIUM_CPMM" => "Raydium",
        "RAYDIUM_LAUNCHPAD" => "LaunchLab",
        "JUPITER" => "Jupiter",
        "ORCA" | "WHIRLPOOL" => "Orca",
        "METEORA" | "METEORA_DLMM" | "METEORA_DAMM" => "Meteora",
        "MOONSHOT" => "Moonshot",
        "PHOENIX" => "Phoenix",
        "UNKNOWN" => "Unknown",
        _ => return title_case(source),
    };
    name.to_string()
}

fn title_case(tag: &str) -> String {
    tag.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let lower = part.to_ascii_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{swap_notification, SwapSpec};
    use serde_json::json;

    const WHALE: &str = "WhaleWallet1111";
    const MINT: &str = "TokenMint1111";

    fn trade(classification: Classification) -> TradeEvent {
        match classification {
            Classification::Trade(event) => event,
            Classification::Unrecognized(reason) => panic!("expected trade, got {reason}"),
        }
    }

    #[test]
    fn buy_shape_is_buy_with_exact_price() {
        let n = swap_notification(&SwapSpec {
            signature: "tx123",
            wallet: WHALE,
            mint: MINT,
            lamports: -10_500_000_000,
            raw_token: "1200000000000",
            decimals: 6,
            source: Some("PUMP_AMM"),
            symbol: Some("TOKEN"),
        });

        let event = trade(classify(&n, WHALE));
        assert_eq!(event.direction, TradeDirection::Buy);
        assert_eq!(event.native_amount, Decimal::from_str("10.5").unwrap());
        assert_eq!(event.token_amount, Decimal::from(1_200_000));
        assert_eq!(
            event.estimated_unit_price,
            Some(Decimal::from_str("0.00000875").unwrap())
        );
        assert_eq!(event.venue, "PumpSwap");
        assert_eq!(event.token_symbol.as_deref(), Some("TOKEN"));
        assert_eq!(event.signature, "tx123");
    }

    #[test]
    fn sell_shape_is_sell() {
        let n = swap_notification(&SwapSpec {
            signature: "tx9",
            wallet: WHALE,
            mint: MINT,
            lamports: 2_000_000_000,
            raw_token: "-500000000",
            decimals: 6,
            source: None,
            symbol: None,
        });

        let event = trade(classify(&n, WHALE));
        assert_eq!(event.direction, TradeDirection::Sell);
        assert_eq!(event.native_amount, Decimal::from(2));
        assert_eq!(event.token_amount, Decimal::from(500));
        assert_eq!(event.venue, "Unknown");
        assert_eq!(event.token_symbol, None);
    }

    #[test]
    fn same_sign_deltas_are_ambiguous() {
        let n = swap_notification(&SwapSpec {
            signature: "tx",
            wallet: WHALE,
            mint: MINT,
            lamports: -5_000,
            raw_token: "-100",
            decimals: 0,
            source: None,
            symbol: None,
        });
        assert_eq!(
            classify(&n, WHALE),
            Classification::Unrecognized(UnrecognizedReason::AmbiguousDirection)
        );
    }

    #[test]
    fn zero_native_delta_is_unrecognized() {
        let n = swap_notification(&SwapSpec {
            signature: "tx",
            wallet: WHALE,
            mint: MINT,
            lamports: 0,
            raw_token: "100",
            decimals: 0,
            source: None,
            symbol: None,
        });
        assert_eq!(
            classify(&n, WHALE),
            Classification::Unrecognized(UnrecognizedReason::NoNativeDelta)
        );
    }

    #[test]
    fn multi_hop_is_unrecognized() {
        let n: RawNotification = serde_json::from_value(json!({
            "signature": "hop",
            "accountData": [{
                "account": WHALE,
                "nativeBalanceChange": -1_000_000_000i64,
                "tokenBalanceChanges": [
                    { "userAccount": WHALE, "mint": "MintA", "rawTokenAmount": { "tokenAmount": "100", "decimals": 0 } },
                    { "userAccount": WHALE, "mint": "MintB", "rawTokenAmount": { "tokenAmount": "-50", "decimals": 0 } }
                ]
            }]
        }))
        .unwrap();
        assert_eq!(
            classify(&n, WHALE),
            Classification::Unrecognized(UnrecognizedReason::MultipleTokenDeltas)
        );
    }

    #[test]
    fn plain_sol_transfer_is_unrecognized() {
        let n: RawNotification = serde_json::from_value(json!({
            "signature": "transfer",
            "nativeTransfers": [
                { "fromUserAccount": WHALE, "toUserAccount": "Friend", "amount": 1_000_000_000u64 }
            ]
        }))
        .unwrap();
        assert_eq!(
            classify(&n, WHALE),
            Classification::Unrecognized(UnrecognizedReason::NoTokenDelta)
        );
    }

    #[test]
    fn failed_and_unsigned_transactions_are_unrecognized() {
        let mut n = swap_notification(&SwapSpec {
            signature: "tx",
            wallet: WHALE,
            mint: MINT,
            lamports: -1_000,
            raw_token: "1",
            decimals: 0,
            source: None,
            symbol: None,
        });
        n.transaction_error = Some(json!({ "InstructionError": [0, "Custom"] }));
        assert_eq!(
            classify(&n, WHALE),
            Classification::Unrecognized(UnrecognizedReason::FailedTransaction)
        );

        n.transaction_error = None;
        n.signature = String::new();
        assert_eq!(
            classify(&n, WHALE),
            Classification::Unrecognized(UnrecognizedReason::MissingSignature)
        );
    }

    #[test]
    fn deltas_of_other_wallets_are_ignored() {
        let n = swap_notification(&SwapSpec {
            signature: "tx",
            wallet: "SomeoneElse",
            mint: MINT,
            lamports: -1_000_000_000,
            raw_token: "10",
            decimals: 0,
            source: None,
            symbol: None,
        });
        assert_eq!(
            classify(&n, WHALE),
            Classification::Unrecognized(UnrecognizedReason::NoTokenDelta)
        );
    }

    #[test]
    fn wrapped_sol_counts_toward_native_side() {
        let n: RawNotification = serde_json::from_value(json!({
            "signature": "wsol",
            "accountData": [{
                "account": WHALE,
                "nativeBalanceChange": -2_039_280i64,
                "tokenBalanceChanges": [
                    { "userAccount": WHALE, "mint": WSOL_MINT, "rawTokenAmount": { "tokenAmount": "-3000000000", "decimals": 9 } },
                    { "userAccount": WHALE, "mint": MINT, "rawTokenAmount": { "tokenAmount": "42000", "decimals": 3 } }
                ]
            }]
        }))
        .unwrap();

        let event = trade(classify(&n, WHALE));
        assert_eq!(event.direction, TradeDirection::Buy);
        assert_eq!(event.native_amount, Decimal::from_str("3.00203928").unwrap());
        assert_eq!(event.token_amount, Decimal::from(42));
        assert_eq!(event.token_mint, MINT);
    }

    #[test]
    fn transfer_lists_are_used_without_account_data() {
        let n: RawNotification = serde_json::from_value(json!({
            "signature": "fallback",
            "source": "RAYDIUM",
            "nativeTransfers": [
                { "fromUserAccount": "Pool", "toUserAccount": WHALE, "amount": 750_000_000u64 }
            ],
            "tokenTransfers": [
                { "fromUserAccount": WHALE, "toUserAccount": "Pool", "mint": MINT, "tokenAmount": 1234.5, "symbol": "BONK" }
            ]
        }))
        .unwrap();

        let event = trade(classify(&n, WHALE));
        assert_eq!(event.direction, TradeDirection::Sell);
        assert_eq!(event.native_amount, Decimal::from_str("0.75").unwrap());
        assert_eq!(event.token_amount, Decimal::from_str("1234.5").unwrap());
        assert_eq!(event.token_symbol.as_deref(), Some("BONK"));
        assert_eq!(event.venue, "Raydium");
    }

    #[test]
    fn unreadable_amounts_never_panic() {
        let n: RawNotification = serde_json::from_value(json!({
            "signature": "junk",
            "accountData": [{
                "account": WHALE,
                "nativeBalanceChange": -1i64,
                "tokenBalanceChanges": [
                    { "userAccount": WHALE, "mint": MINT, "rawTokenAmount": { "tokenAmount": "lots", "decimals": 250 } }
                ]
            }]
        }))
        .unwrap();
        assert_eq!(
            classify(&n, WHALE),
            Classification::Unrecognized(UnrecognizedReason::NoTokenDelta)
        );
    }

    #[test]
    fn oversized_balance_sums_are_unrecognized() {
        let max = "79228162514264337593543950335";
        let n: RawNotification = serde_json::from_value(json!({
            "signature": "huge",
            "accountData": [{
                "account": WHALE,
                "nativeBalanceChange": -1_000_000_000i64,
                "tokenBalanceChanges": [
                    { "userAccount": WHALE, "mint": MINT, "rawTokenAmount": { "tokenAmount": max, "decimals": 0 } },
                    { "userAccount": WHALE, "mint": MINT, "rawTokenAmount": { "tokenAmount": max, "decimals": 0 } }
                ]
            }]
        }))
        .unwrap();
        assert_eq!(
            classify(&n, WHALE),
            Classification::Unrecognized(UnrecognizedReason::AmountOverflow)
        );
    }

    #[test]
    fn oversized_transfer_sums_are_unrecognized() {
        let n: RawNotification = serde_json::from_value(json!({
            "signature": "huge",
            "nativeTransfers": [
                { "fromUserAccount": WHALE, "toUserAccount": "Pool", "amount": 1_000_000_000u64 }
            ],
            "tokenTransfers": [
                { "fromUserAccount": "Pool", "toUserAccount": WHALE, "mint": MINT, "tokenAmount": 7.9e28 },
                { "fromUserAccount": "Pool", "toUserAccount": WHALE, "mint": MINT, "tokenAmount": 7.9e28 }
            ]
        }))
        .unwrap();
        assert_eq!(
            classify(&n, WHALE),
            Classification::Unrecognized(UnrecognizedReason::AmountOverflow)
        );
    }

    #[test]
    fn venue_names_map_known_sources() {
        assert_eq!(venue_name(Some("PUMP_AMM")), "PumpSwap");
        assert_eq!(venue_name(Some("pump_fun")), "Pump.fun");
        assert_eq!(venue_name(Some("UNKNOWN")), "Unknown");
        assert_eq!(venue_name(Some("  ")), "Unknown");
        assert_eq!(venue_name(None), "Unknown");
        assert_eq!(venue_name(Some("LIFINITY_V2")), "Lifinity V2");
    }
}
