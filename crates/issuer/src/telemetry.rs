#![allow(clippy::module_name_repetitions)]

use std::env;

use thiserror::Error;
use tracing::subscriber::{set_global_default, SetGlobalDefaultError};
use tracing_subscriber::filter::{EnvFilter, ParseError};
use tracing_subscriber::fmt::time::SystemTime;
use tracing_subscriber::layer::SubscriberExt;

/// Telemetri kurulumu sırasında oluşabilecek hatalar.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Log filtresi geçersizdir.
    #[error("log filtresi geçersiz: {0}")]
    InvalidFilter(#[from] ParseError),
    /// Global abonelik kurulamadı.
    #[error("tracing aboneliği kurulamadı: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

/// Kurulan aboneliği temsil eder.
#[must_use]
#[derive(Debug)]
pub struct TelemetryGuard {
    service_name: String,
}

impl TelemetryGuard {
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

/// Ortam değişkenlerinden tracing aboneliğini başlatır.
///
/// `CERTHUB_LOG` veya `RUST_LOG` log filtresini belirler; ikisi de yoksa `info`.
///
/// # Errors
///
/// Geçersiz log filtresi ya da abonelik kurulumu başarısız olursa hata döner.
pub fn init_tracing(service_name: &str) -> Result<TelemetryGuard, TelemetryError> {
    let filter = env::var("CERTHUB_LOG")
        .or_else(|_| env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    init_tracing_with_filter(service_name, &filter)
}

/// Verilen filtreyle tracing aboneliğini başlatır.
///
/// # Errors
///
/// [`init_tracing`] ile aynı.
pub fn init_tracing_with_filter(
    service_name: &str,
    filter: &str,
) -> Result<TelemetryGuard, TelemetryError> {
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::try_new(filter)?)
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(SystemTime)
                .with_target(true),
        );
    set_global_default(subscriber)?;
    tracing::info!(service = service_name, filter, "tracing başlatıldı");
    Ok(TelemetryGuard {
        service_name: service_name.to_owned(),
    })
}
