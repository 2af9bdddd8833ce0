//! Telegram adapter
//!
//! Parses webhook updates into engine events and renders engine actions as
//! Bot API calls. Platform quirks stay in here.

mod transport;
pub mod types;

pub use transport::{LogTransport, TelegramTransport, DEFAULT_API_URL};
pub use types::Update;
