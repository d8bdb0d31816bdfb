pub mod commands;
pub mod handler;
pub mod telegram;

pub use handler::AdminCommandHandler;
pub use telegram::CommandBot;
