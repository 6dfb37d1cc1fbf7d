/*!
Server configuration.

Defaults suit a launcher running next to the compositor. Each field can be
overridden from a `TOPLEVELS_WS_*` environment variable; unparsable values are
logged and ignored.
*/

use std::fmt::Display;
use std::str::FromStr;

use toplevels::{Toplevels, ToplevelsBuilder};

use crate::DEFAULT_WS_PORT;

const ENV_PORT: &str = "TOPLEVELS_WS_PORT";
const ENV_CONNECT_ATTEMPTS: &str = "TOPLEVELS_WS_CONNECT_ATTEMPTS";
const ENV_RETRY_DELAY_MS: &str = "TOPLEVELS_WS_RETRY_DELAY_MS";
const ENV_REFRESH_INTERVAL_MS: &str = "TOPLEVELS_WS_REFRESH_INTERVAL_MS";
const ENV_FOCUS_DELAY_MS: &str = "TOPLEVELS_WS_FOCUS_DELAY_MS";
const ENV_MIN_SCORE: &str = "TOPLEVELS_WS_MIN_SCORE";

/// Settings for the `toplevels-ws` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
  /// Listen on `127.0.0.1:port`.
  pub port: u16,
  pub connect_attempts: u32,
  pub retry_delay_ms: u64,
  /// Background event drain interval. 0 turns it off.
  pub refresh_interval_ms: u64,
  /// Let the launcher close before focus moves.
  pub focus_delay_ms: u64,
  pub min_score: i32,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      port: DEFAULT_WS_PORT,
      connect_attempts: 10,
      retry_delay_ms: 1000,
      refresh_interval_ms: 250,
      focus_delay_ms: 100,
      min_score: 20,
    }
  }
}

impl Config {
  /// Defaults overridden by the process environment.
  pub fn from_env() -> Self {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
    let defaults = Self::default();
    Self {
      port: parse_or(&lookup, ENV_PORT, defaults.port),
      connect_attempts: parse_or(&lookup, ENV_CONNECT_ATTEMPTS, defaults.connect_attempts),
      retry_delay_ms: parse_or(&lookup, ENV_RETRY_DELAY_MS, defaults.retry_delay_ms),
      refresh_interval_ms: parse_or(
        &lookup,
        ENV_REFRESH_INTERVAL_MS,
        defaults.refresh_interval_ms,
      ),
      focus_delay_ms: parse_or(&lookup, ENV_FOCUS_DELAY_MS, defaults.focus_delay_ms),
      min_score: parse_or(&lookup, ENV_MIN_SCORE, defaults.min_score),
    }
  }

  /// A `Toplevels` builder carrying these settings.
  pub fn builder(&self) -> ToplevelsBuilder {
    let builder = Toplevels::builder()
      .connect_attempts(self.connect_attempts)
      .retry_delay_ms(self.retry_delay_ms)
      .focus_delay_ms(self.focus_delay_ms)
      .min_score(self.min_score);
    if self.refresh_interval_ms > 0 {
      builder.refresh_interval_ms(self.refresh_interval_ms)
    } else {
      builder
    }
  }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
  T: FromStr + Display,
  T::Err: Display,
{
  let Some(raw) = lookup(key) else {
    return default;
  };
  match raw.trim().parse() {
    Ok(value) => value,
    Err(e) => {
      log::warn!("Ignoring {key}={raw:?} ({e}), using {default}");
      default
    }
  }
}
