//! Notification delivery
//!
//! The monitor only needs "send this text, tell me if it arrived". The
//! Telegram sender is the production implementation; tests and the CLI's
//! console fallback provide their own.

use crate::error::{Error, Result};
use std::time::Duration;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivers one rendered message. A returned error means nothing reached
/// the recipient; partial delivery is not modeled.
pub trait Notifier {
    fn send(&self, text: &str) -> Result<()>;
}

/// Sends messages through the Telegram Bot API.
pub struct TelegramNotifier {
    client: reqwest::blocking::Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| Error::Notify(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            bot_token,
            chat_id,
        })
    }
}

impl Notifier for TelegramNotifier {
    fn send(&self, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", TELEGRAM_API_BASE, self.bot_token);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "HTML",
            }))
            .send()
            .map_err(|e| Error::Notify(format!("telegram request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(Error::Notify(format!(
                "telegram returned {}: {}",
                status, body
            )));
        }

        tracing::debug!(chars = text.len(), "Telegram message delivered");
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::cell::RefCell;

    /// Records sent messages; optionally fails every send.
    #[derive(Default)]
    pub struct FakeNotifier {
        pub sent: RefCell<Vec<String>>,
        pub fail: bool,
    }

    impl Notifier for FakeNotifier {
        fn send(&self, text: &str) -> Result<()> {
            if self.fail {
                return Err(Error::Notify("delivery refused".to_string()));
            }
            self.sent.borrow_mut().push(text.to_string());
            Ok(())
        }
    }
}
