use std::{env, fs, io, path::Path, time::Duration};

use crate::{errors::Error, Result};

/// Typed configuration, read from the environment (and an optional `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,
    pub train_api_url: String,
    pub train_api_timeout: Duration,

    // Polling
    pub poll_interval: Duration,
    pub first_poll_delay: Duration,
    pub max_trains_per_chat: usize,
    pub max_concurrent_fetches: usize,

    // Presentation
    pub utc_offset_minutes: i32,
    pub reveal_delay: Duration,
    pub reveal_lines_per_step: usize,

    // Transport
    /// Public base URL; when set the bot runs a webhook server instead of long polling.
    pub webhook_url: Option<String>,
    pub port: u16,
}

const DEFAULT_TRAIN_API_URL: &str = "http://localhost:3000/api/train";
const MAX_OFFSET_MINUTES: i32 = 14 * 60;
const DEFAULT_PORT: u16 = 8443;

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"))?;
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup (the environment in
    /// production, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);
        let get_u64 = |key: &str| get(key).and_then(|s| s.trim().parse::<u64>().ok());
        let get_usize = |key: &str| get(key).and_then(|s| s.trim().parse::<usize>().ok());

        // Required
        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN")
            .or_else(|| get("BOT_TOKEN"))
            .ok_or_else(|| {
                Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
            })?;

        let train_api_url = get("TRAIN_API_URL")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| DEFAULT_TRAIN_API_URL.to_string());
        if !(train_api_url.starts_with("http://") || train_api_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "TRAIN_API_URL must be an http(s) URL, got {train_api_url:?}"
            )));
        }
        let train_api_timeout =
            Duration::from_secs(get_u64("TRAIN_API_TIMEOUT_SECS").unwrap_or(10).max(1));

        // Polling
        let poll_interval =
            Duration::from_secs(get_u64("TRAIN_POLL_INTERVAL_SECS").unwrap_or(60).max(1));
        let first_poll_delay =
            Duration::from_secs(get_u64("TRAIN_FIRST_POLL_DELAY_SECS").unwrap_or(2));
        let max_trains_per_chat = get_usize("TRAIN_MAX_PER_CHAT").unwrap_or(3).max(1);
        let max_concurrent_fetches = get_usize("TRAIN_MAX_CONCURRENT_FETCHES")
            .unwrap_or(4)
            .max(1);

        // Presentation
        let utc_offset_minutes = match get("TRAIN_TZ_OFFSET_MINUTES") {
            None => 330,
            Some(raw) => match raw.trim().parse::<i32>() {
                Ok(m) if m.abs() <= MAX_OFFSET_MINUTES => m,
                _ => {
                    return Err(Error::Config(format!(
                        "TRAIN_TZ_OFFSET_MINUTES must be within +/-{MAX_OFFSET_MINUTES}, got {raw:?}"
                    )))
                }
            },
        };
        let reveal_delay = Duration::from_millis(get_u64("TRAIN_REVEAL_DELAY_MS").unwrap_or(0));
        let reveal_lines_per_step = get_usize("TRAIN_REVEAL_LINES_PER_STEP")
            .unwrap_or(2)
            .max(1);

        // Transport
        let webhook_url = get("WEBHOOK_URL").map(|s| s.trim().trim_end_matches('/').to_string());
        if let Some(url) = &webhook_url {
            if !url.starts_with("https://") {
                return Err(Error::Config(format!(
                    "WEBHOOK_URL must be an https URL, got {url:?}"
                )));
            }
        }
        let port = match get("PORT") {
            None => DEFAULT_PORT,
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("PORT must be a port number, got {raw:?}")))?,
        };

        Ok(Self {
            telegram_bot_token,
            train_api_url,
            train_api_timeout,
            poll_interval,
            first_poll_delay,
            max_trains_per_chat,
            max_concurrent_fetches,
            utc_offset_minutes,
            reveal_delay,
            reveal_lines_per_step,
            webhook_url,
            port,
        })
    }
}

fn load_dotenv_if_present(path: &Path) -> Result<()> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
    Ok(())
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn missing_token_is_fatal() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, Error::Config(m) if m.contains("TELEGRAM_BOT_TOKEN")));

        let err = Config::from_lookup(lookup(&[("TELEGRAM_BOT_TOKEN", "   ")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn defaults_apply() {
        let cfg = Config::from_lookup(lookup(&[("BOT_TOKEN", "123:abc")])).unwrap();
        assert_eq!(cfg.telegram_bot_token, "123:abc");
        assert_eq!(cfg.train_api_url, DEFAULT_TRAIN_API_URL);
        assert_eq!(cfg.poll_interval, Duration::from_secs(60));
        assert_eq!(cfg.first_poll_delay, Duration::from_secs(2));
        assert_eq!(cfg.train_api_timeout, Duration::from_secs(10));
        assert_eq!(cfg.max_trains_per_chat, 3);
        assert_eq!(cfg.max_concurrent_fetches, 4);
        assert_eq!(cfg.utc_offset_minutes, 330);
        assert!(cfg.reveal_delay.is_zero());
        assert_eq!(cfg.webhook_url, None);
        assert_eq!(cfg.port, 8443);
    }

    #[test]
    fn webhook_keys() {
        let cfg = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("WEBHOOK_URL", " https://trainlive.onrender.com/ "),
            ("PORT", "10000"),
        ]))
        .unwrap();
        assert_eq!(
            cfg.webhook_url.as_deref(),
            Some("https://trainlive.onrender.com")
        );
        assert_eq!(cfg.port, 10000);

        for bad in [
            ("WEBHOOK_URL", "http://plain.example"),
            ("PORT", "70000"),
            ("PORT", "eighty"),
        ] {
            let err = Config::from_lookup(lookup(&[("TELEGRAM_BOT_TOKEN", "t"), bad])).unwrap_err();
            assert!(matches!(err, Error::Config(m) if m.contains(bad.0)), "{bad:?}");
        }
    }

    #[test]
    fn overrides_and_validation() {
        let cfg = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("BOT_TOKEN", "ignored"),
            ("TRAIN_API_URL", "https://rail.example/api"),
            ("TRAIN_POLL_INTERVAL_SECS", "15"),
            ("TRAIN_MAX_PER_CHAT", "0"),
            ("TRAIN_TZ_OFFSET_MINUTES", "-300"),
        ]))
        .unwrap();
        assert_eq!(cfg.telegram_bot_token, "t");
        assert_eq!(cfg.train_api_url, "https://rail.example/api");
        assert_eq!(cfg.poll_interval, Duration::from_secs(15));
        assert_eq!(cfg.max_trains_per_chat, 1);
        assert_eq!(cfg.utc_offset_minutes, -300);

        let err = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("TRAIN_API_URL", "ftp://nope"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("TRAIN_TZ_OFFSET_MINUTES", "5000"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn dotenv_parsing() {
        let parsed = parse_dotenv(
            "# comment\nBOT_TOKEN=\"abc\"\nexport TRAIN_API_URL='https://x'\nnoequals\n=empty\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("BOT_TOKEN".to_string(), "abc".to_string()),
                ("TRAIN_API_URL".to_string(), "https://x".to_string()),
            ]
        );
    }
}
