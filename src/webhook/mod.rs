pub mod payload;

pub use payload::{parse_webhook_body, RawNotification};
