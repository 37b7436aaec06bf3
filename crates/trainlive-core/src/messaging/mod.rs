//! Outbound chat messaging (Telegram today, behind a port).

pub mod port;
pub mod reveal;
pub mod throttled;
pub mod types;
