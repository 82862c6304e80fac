use std::fmt;
use std::sync::Arc;

use certhub_acme::{AcmeApi, AcmeClient, AcmeClientError};
use tracing::info;
use url::Url;

/// Let's Encrypt üretim dizini.
pub const LETS_ENCRYPT_PRODUCTION: &str = "https://acme-v02.api.letsencrypt.org/directory";
/// Let's Encrypt staging dizini.
pub const LETS_ENCRYPT_STAGING: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

/// Sertifikanın üretildiği ACME dizini.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AcmeEnvironment {
    #[default]
    Production,
    Staging,
}

impl AcmeEnvironment {
    #[must_use]
    pub const fn from_staging_flag(is_staging: bool) -> Self {
        if is_staging {
            Self::Staging
        } else {
            Self::Production
        }
    }

    #[must_use]
    pub const fn is_staging(self) -> bool {
        matches!(self, Self::Staging)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Staging => "staging",
        }
    }
}

impl fmt::Display for AcmeEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ortam başına bir ACME servisi; çözücü, authorization işleyicisi ve
/// order işçileri tarafından paylaşılır.
#[derive(Clone)]
pub struct AcmeServices {
    production: Arc<dyn AcmeApi>,
    staging: Arc<dyn AcmeApi>,
}

impl AcmeServices {
    #[must_use]
    pub fn new(production: Arc<dyn AcmeApi>, staging: Arc<dyn AcmeApi>) -> Self {
        Self {
            production,
            staging,
        }
    }

    /// Paylaşılan HTTP istemcisiyle iki dizine de bağlanır.
    ///
    /// # Errors
    ///
    /// Dizin belgelerinden biri alınamaz veya ayrıştırılamazsa hata döner.
    pub async fn connect(
        http: reqwest::Client,
        production: &Url,
        staging: &Url,
    ) -> Result<Self, AcmeClientError> {
        let production_client = AcmeClient::connect(http.clone(), production).await?;
        let staging_client = AcmeClient::connect(http, staging).await?;
        info!(%production, %staging, "ACME servisleri hazır");
        Ok(Self::new(
            Arc::new(production_client),
            Arc::new(staging_client),
        ))
    }

    #[must_use]
    pub fn for_environment(&self, environment: AcmeEnvironment) -> &Arc<dyn AcmeApi> {
        match environment {
            AcmeEnvironment::Production => &self.production,
            AcmeEnvironment::Staging => &self.staging,
        }
    }
}

impl fmt::Debug for AcmeServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcmeServices").finish_non_exhaustive()
    }
}
