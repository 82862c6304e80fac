//! Bir order'ın authorization'larının tamamlanması.
//!
//! Her authorization URL'i kendi görevinde işlenir. Bir URL için yapılan iş
//! süreç genelinde tekilleştirilir; aynı authorization'ı paylaşan order'lar
//! aynı çözücü çalışmasını bekler.

use std::sync::Arc;

use certhub_acme::{AccountKey, AcmeClientError, AuthorizationStatus, ChallengeStatus};
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};
use url::Url;

use crate::challenges::{ChallengeMethod, ChallengeSolver, SolveError};
use crate::environment::{AcmeEnvironment, AcmeServices};
use crate::singleflight::SingleFlight;

#[derive(Debug, Error)]
pub enum FulfillError {
    #[error("authorization fulfillment sonrasında hâlâ pending")]
    AuthStillPending,
    #[error("bilinmeyen authorization durumu: {status}")]
    UnknownStatus { status: String },
    #[error(transparent)]
    Acme(#[from] AcmeClientError),
    #[error(transparent)]
    Solve(#[from] SolveError),
    #[error("authorization görevi tamamlanamadı: {0}")]
    Task(#[from] JoinError),
}

/// URL bazındaki sonuçları order için tek bir duruma indirger.
#[derive(Debug, Clone)]
pub struct AuthorizationFulfiller {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    services: AcmeServices,
    solver: Arc<ChallengeSolver>,
    flights: SingleFlight<Url, AuthorizationStatus>,
}

impl AuthorizationFulfiller {
    #[must_use]
    pub fn new(services: AcmeServices, solver: Arc<ChallengeSolver>) -> Self {
        Self {
            inner: Arc::new(Inner {
                services,
                solver,
                flights: SingleFlight::new(),
            }),
        }
    }

    /// Üzerinde çalışılan authorization URL sayısı.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.flights.in_flight()
    }

    /// Tüm URL'leri eşzamanlı işler ve sonuçları birleştirir.
    ///
    /// Biri başarısız olsa da bütün görevler sonuna kadar çalışır. Toplanan
    /// ilk hata döner; birden fazla hata varsa hangisinin döneceği belirsizdir.
    ///
    /// # Errors
    ///
    /// Görev hatası veya işlem sonrası `pending` kalan authorization varsa
    /// [`FulfillError::AuthStillPending`].
    pub async fn fulfill_authorizations(
        &self,
        urls: &[Url],
        method: &ChallengeMethod,
        key: &AccountKey,
        environment: AcmeEnvironment,
    ) -> Result<AuthorizationStatus, FulfillError> {
        let mut tasks = JoinSet::new();
        for url in urls {
            let fulfiller = self.clone();
            let url = url.clone();
            let method = method.clone();
            let key = key.clone();
            tasks.spawn(async move {
                fulfiller
                    .fulfill_authorization(&url, &method, &key, environment)
                    .await
            });
        }

        let mut statuses = Vec::with_capacity(urls.len());
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined.map_err(FulfillError::from).and_then(|result| result) {
                Ok(status) => statuses.push(status),
                Err(err) => {
                    warn!(error = %err, "authorization tamamlanamadı");
                    first_error.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        aggregate(&statuses)
    }

    /// Tek bir authorization'ı işler; `url` için süren bir çalışma varsa ona
    /// katılır. Katılınan çalışma başarısız olursa bekleyenlerden biri yeniden dener.
    ///
    /// # Errors
    ///
    /// Authorization okunurken veya challenge çözülürken oluşan hatalar.
    pub async fn fulfill_authorization(
        &self,
        url: &Url,
        method: &ChallengeMethod,
        key: &AccountKey,
        environment: AcmeEnvironment,
    ) -> Result<AuthorizationStatus, FulfillError> {
        self.inner
            .flights
            .run(url.clone(), || self.auth_worker(url, method, key, environment))
            .await
    }

    async fn auth_worker(
        &self,
        url: &Url,
        method: &ChallengeMethod,
        key: &AccountKey,
        environment: AcmeEnvironment,
    ) -> Result<AuthorizationStatus, FulfillError> {
        let acme = self.inner.services.for_environment(environment);
        let authorization = acme.get_authorization(url, key).await?;
        debug!(%url, status = authorization.status().as_str(), "authorization alındı");

        let status = match authorization.status() {
            AuthorizationStatus::Pending => {
                let solved = self
                    .inner
                    .solver
                    .solve(
                        authorization.identifier(),
                        authorization.challenges(),
                        method,
                        key,
                        environment,
                    )
                    .await?;
                match solved {
                    ChallengeStatus::Valid => AuthorizationStatus::Valid,
                    _ => AuthorizationStatus::Invalid,
                }
            }
            other => other.clone(),
        };

        match status {
            AuthorizationStatus::Unknown(status) => Err(FulfillError::UnknownStatus { status }),
            known => Ok(known),
        }
    }
}

fn aggregate(statuses: &[AuthorizationStatus]) -> Result<AuthorizationStatus, FulfillError> {
    if statuses.contains(&AuthorizationStatus::Pending) {
        return Err(FulfillError::AuthStillPending);
    }
    if statuses
        .iter()
        .all(|status| *status == AuthorizationStatus::Valid)
    {
        Ok(AuthorizationStatus::Valid)
    } else {
        Ok(AuthorizationStatus::Invalid)
    }
}
