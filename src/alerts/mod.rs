pub mod formatter;
pub mod notifier;

pub use formatter::format_trade;
pub use notifier::{DeliveryError, Notifier, TelegramNotifier};
