use std::env;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use url::Url;

use crate::challenges::{ChallengeProviders, ChallengeSolver, PollPolicy};
use crate::environment::{AcmeServices, LETS_ENCRYPT_PRODUCTION, LETS_ENCRYPT_STAGING};
use crate::orders::{OrchestratorSettings, RenewalSchedule};

pub const PROD_DIRECTORY_ENV: &str = "CERTHUB_ACME_PROD_DIRECTORY";
pub const STAGING_DIRECTORY_ENV: &str = "CERTHUB_ACME_STAGING_DIRECTORY";
pub const HTTP_TIMEOUT_ENV: &str = "CERTHUB_HTTP_TIMEOUT_SECS";
pub const ORDER_WORKERS_ENV: &str = "CERTHUB_ORDER_WORKERS";
pub const ORDER_QUEUE_CAPACITY_ENV: &str = "CERTHUB_ORDER_QUEUE_CAPACITY";
pub const AUTO_ORDERING_ENV: &str = "CERTHUB_AUTO_ORDERING";
pub const RENEWAL_THRESHOLD_ENV: &str = "CERTHUB_RENEWAL_THRESHOLD_DAYS";
pub const RENEWAL_HOUR_ENV: &str = "CERTHUB_RENEWAL_HOUR";
pub const RENEWAL_MINUTE_ENV: &str = "CERTHUB_RENEWAL_MINUTE";
pub const CHALLENGE_POLL_ATTEMPTS_ENV: &str = "CERTHUB_CHALLENGE_POLL_ATTEMPTS";
pub const CHALLENGE_POLL_SECS_ENV: &str = "CERTHUB_CHALLENGE_POLL_SECS";
pub const ORDER_POLL_ATTEMPTS_ENV: &str = "CERTHUB_ORDER_POLL_ATTEMPTS";
pub const ORDER_POLL_SECS_ENV: &str = "CERTHUB_ORDER_POLL_SECS";

/// [`RENEWAL_THRESHOLD_ENV`] için kabul edilen üst sınır (gün).
pub const MAX_RENEWAL_THRESHOLD_DAYS: i64 = 3650;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} geçersiz: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Issuer ayarları.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerConfig {
    pub production_directory: Url,
    pub staging_directory: Url,
    pub http_timeout: Duration,
    pub order_workers: usize,
    pub order_queue_capacity: usize,
    pub auto_ordering: bool,
    pub renewal_threshold_days: i64,
    pub renewal_hour: u8,
    pub renewal_minute: u8,
    pub challenge_poll: PollPolicy,
    pub order_poll: PollPolicy,
}

impl IssuerConfig {
    /// Ayarları `CERTHUB_*` ortam değişkenlerinden okur.
    ///
    /// # Errors
    ///
    /// Değer ayrıştırılamazsa veya izin verilen aralığın dışındaysa
    /// [`ConfigError::Invalid`] döner.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(|key: &'static str| match env::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(env::VarError::NotUnicode(_)) => {
                Err(ConfigError::invalid(key, "geçerli UTF-8 değil"))
            }
        })
    }

    /// Ayarları verilen anahtar okuyucusundan üretir.
    ///
    /// # Errors
    ///
    /// [`IssuerConfig::from_env`] ile aynı.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::load(|key: &'static str| Ok(lookup(key)))
    }

    fn load<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Result<Option<String>, ConfigError>,
    {
        let read = |key: &'static str| -> Result<Option<String>, ConfigError> {
            Ok(lookup(key)?
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty()))
        };

        let production_directory =
            parse_directory(PROD_DIRECTORY_ENV, read(PROD_DIRECTORY_ENV)?, LETS_ENCRYPT_PRODUCTION)?;
        let staging_directory = parse_directory(
            STAGING_DIRECTORY_ENV,
            read(STAGING_DIRECTORY_ENV)?,
            LETS_ENCRYPT_STAGING,
        )?;

        let http_timeout_secs: u64 = parse_number(HTTP_TIMEOUT_ENV, read(HTTP_TIMEOUT_ENV)?, 30)?;
        if http_timeout_secs == 0 {
            return Err(ConfigError::invalid(HTTP_TIMEOUT_ENV, "sıfır olamaz"));
        }

        let order_workers: usize = parse_number(ORDER_WORKERS_ENV, read(ORDER_WORKERS_ENV)?, 3)?;
        if order_workers == 0 {
            return Err(ConfigError::invalid(ORDER_WORKERS_ENV, "en az 1 olmalı"));
        }
        let order_queue_capacity: usize =
            parse_number(ORDER_QUEUE_CAPACITY_ENV, read(ORDER_QUEUE_CAPACITY_ENV)?, 64)?;
        if order_queue_capacity == 0 {
            return Err(ConfigError::invalid(ORDER_QUEUE_CAPACITY_ENV, "en az 1 olmalı"));
        }

        let auto_ordering = parse_flag(AUTO_ORDERING_ENV, read(AUTO_ORDERING_ENV)?, true)?;
        let renewal_threshold_days: i64 =
            parse_number(RENEWAL_THRESHOLD_ENV, read(RENEWAL_THRESHOLD_ENV)?, 40)?;
        if renewal_threshold_days < 0 {
            return Err(ConfigError::invalid(RENEWAL_THRESHOLD_ENV, "negatif olamaz"));
        }
        if renewal_threshold_days > MAX_RENEWAL_THRESHOLD_DAYS {
            return Err(ConfigError::invalid(
                RENEWAL_THRESHOLD_ENV,
                format!("en fazla {MAX_RENEWAL_THRESHOLD_DAYS} gün olabilir"),
            ));
        }
        let renewal_hour: u8 = parse_number(RENEWAL_HOUR_ENV, read(RENEWAL_HOUR_ENV)?, 3)?;
        if renewal_hour > 23 {
            return Err(ConfigError::invalid(RENEWAL_HOUR_ENV, "0 ile 23 arasında olmalı"));
        }
        let renewal_minute: u8 = parse_number(RENEWAL_MINUTE_ENV, read(RENEWAL_MINUTE_ENV)?, 12)?;
        if renewal_minute > 59 {
            return Err(ConfigError::invalid(RENEWAL_MINUTE_ENV, "0 ile 59 arasında olmalı"));
        }

        let challenge_poll = parse_poll(
            (CHALLENGE_POLL_ATTEMPTS_ENV, read(CHALLENGE_POLL_ATTEMPTS_ENV)?),
            (CHALLENGE_POLL_SECS_ENV, read(CHALLENGE_POLL_SECS_ENV)?),
        )?;
        let order_poll = parse_poll(
            (ORDER_POLL_ATTEMPTS_ENV, read(ORDER_POLL_ATTEMPTS_ENV)?),
            (ORDER_POLL_SECS_ENV, read(ORDER_POLL_SECS_ENV)?),
        )?;

        Ok(Self {
            production_directory,
            staging_directory,
            http_timeout: Duration::from_secs(http_timeout_secs),
            order_workers,
            order_queue_capacity,
            auto_ordering,
            renewal_threshold_days,
            renewal_hour,
            renewal_minute,
            challenge_poll,
            order_poll,
        })
    }

    /// ACME istekleri için paylaşılan HTTP istemcisi.
    ///
    /// # Errors
    ///
    /// TLS arka ucu başlatılamazsa `reqwest` hatası döner.
    pub fn http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(self.http_timeout)
            .user_agent(concat!("certhub/", env!("CARGO_PKG_VERSION")))
            .build()
    }

    /// `challenge_poll` ayarını uygulayan bir challenge çözücü kurar.
    #[must_use]
    pub fn challenge_solver(
        &self,
        services: AcmeServices,
        providers: ChallengeProviders,
        shutdown: CancellationToken,
    ) -> ChallengeSolver {
        ChallengeSolver::new(services, providers, shutdown).with_poll_policy(self.challenge_poll)
    }

    #[must_use]
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        let renewal = if self.auto_ordering {
            RenewalSchedule::daily_at(
                self.renewal_hour,
                self.renewal_minute,
                time::Duration::seconds(self.renewal_threshold_days.saturating_mul(86_400)),
            )
            .ok()
        } else {
            None
        };
        OrchestratorSettings {
            workers: self.order_workers,
            queue_capacity: self.order_queue_capacity,
            poll: self.order_poll,
            renewal,
        }
    }
}

fn parse_directory(
    key: &'static str,
    value: Option<String>,
    default: &str,
) -> Result<Url, ConfigError> {
    let raw = value.as_deref().unwrap_or(default);
    let url = Url::parse(raw)
        .map_err(|err| ConfigError::invalid(key, format!("geçerli bir URL değil: {err}")))?;
    if url.scheme() != "https" {
        return Err(ConfigError::invalid(key, "https şeması zorunludur"));
    }
    if url.host_str().is_some_and(|host| !host.ends_with("api.letsencrypt.org")) {
        warn!(key, directory = %url, "Let's Encrypt dışı bir ACME dizini yapılandırıldı");
    }
    Ok(url)
}

fn parse_number<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.map_or(Ok(default), |raw| {
        raw.parse()
            .map_err(|err| ConfigError::invalid(key, format!("geçerli bir sayı değil: {err}")))
    })
}

fn parse_flag(key: &'static str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = value else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid(
            key,
            format!("geçerli bir bayrak değil: {other}"),
        )),
    }
}

fn parse_poll(
    attempts: (&'static str, Option<String>),
    interval: (&'static str, Option<String>),
) -> Result<PollPolicy, ConfigError> {
    let count: u32 = parse_number(attempts.0, attempts.1, PollPolicy::DEFAULT_ATTEMPTS)?;
    if count == 0 {
        return Err(ConfigError::invalid(attempts.0, "en az 1 olmalı"));
    }
    let secs: u64 = parse_number(interval.0, interval.1, PollPolicy::DEFAULT_INTERVAL.as_secs())?;
    if secs == 0 {
        return Err(ConfigError::invalid(interval.0, "sıfır olamaz"));
    }
    Ok(PollPolicy::new(count, Duration::from_secs(secs)))
}
