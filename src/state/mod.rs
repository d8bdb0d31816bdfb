pub mod alert_switch;
pub mod watchlist;

pub use alert_switch::AlertSwitch;
pub use watchlist::{Registry, RegistryError, WatchList};
