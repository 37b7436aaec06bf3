use std::fmt;

use crate::{errors::Error, Result};

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

const MAX_TRAIN_NUMBER_LEN: usize = 10;

/// Validated train number: 1..=10 ASCII digits.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrainNumber(String);

impl TrainNumber {
    pub fn parse(raw: &str) -> Result<Self> {
        let s = raw.trim();
        if s.is_empty()
            || s.len() > MAX_TRAIN_NUMBER_LEN
            || !s.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(Error::InvalidTrainNumber(raw.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrainNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for TrainNumber {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn train_number_accepts_digits_and_trims() {
        let t = TrainNumber::parse(" 12303 ").unwrap();
        assert_eq!(t.as_str(), "12303");
        assert_eq!(t.to_string(), "12303");
    }

    #[test]
    fn train_number_rejects_garbage() {
        for raw in ["", "   ", "12a03", "-1", "12 303", "12345678901"] {
            assert!(
                matches!(TrainNumber::parse(raw), Err(Error::InvalidTrainNumber(_))),
                "{raw:?} should be rejected"
            );
        }
    }
}
