use std::sync::Arc;
use std::time::Duration;

use certhub_acme::{
    AccountKey, AcmeApi, AcmeClientError, Challenge, ChallengeStatus, OrderIdentifier,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::provider::{ChallengeMethod, ChallengeProvider, ChallengeProviders, ProviderError};
use crate::environment::{AcmeEnvironment, AcmeServices};

/// Doğrulama istendikten sonra challenge'ın ne sıklıkla yeniden okunacağı.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl PollPolicy {
    pub const DEFAULT_ATTEMPTS: u32 = 5;
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(20);

    #[must_use]
    pub const fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ATTEMPTS, Self::DEFAULT_INTERVAL)
    }
}

#[derive(Debug, Error)]
pub enum SolveError {
    #[error("authorization {kind} türünde challenge içermiyor")]
    ChallengeTypeNotFound { kind: String },
    #[error("challenge token içermiyor")]
    MissingToken,
    #[error("{method} yöntemi için sağlayıcı tanımlı değil")]
    ProviderNotConfigured { method: String },
    #[error("challenge kaynağı hazırlanamadı: {0}")]
    Provision(#[source] ProviderError),
    #[error(transparent)]
    Acme(#[from] AcmeClientError),
    #[error("challenge {attempts} denemede sonuçlanmadı")]
    RetriesExhausted { attempts: u32 },
    #[error("kapatma sinyali alındı; challenge doğrulaması yarıda kesildi")]
    Shutdown,
}

/// Bir authorization'ın challenge'ını hazırlıktan sonuç durumuna kadar yürütür.
#[derive(Debug)]
pub struct ChallengeSolver {
    services: AcmeServices,
    providers: ChallengeProviders,
    poll: PollPolicy,
    shutdown: CancellationToken,
}

impl ChallengeSolver {
    #[must_use]
    pub fn new(
        services: AcmeServices,
        providers: ChallengeProviders,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            services,
            providers,
            poll: PollPolicy::default(),
            shutdown,
        }
    }

    #[must_use]
    pub const fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    #[must_use]
    pub const fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    /// `challenges` içinden `method` türündeki challenge'ı çözer.
    ///
    /// Sağlayıcı bulunduktan sonra kanıt kaynağı her çıkış yolunda kaldırılır.
    /// Kaldırma hataları loglanır, sonucun yerine geçmez.
    ///
    /// # Errors
    ///
    /// Bkz. [`SolveError`]. `valid` ve `invalid` iki durum da başarılı dönüştür.
    pub async fn solve(
        &self,
        identifier: &OrderIdentifier,
        challenges: &[Challenge],
        method: &ChallengeMethod,
        key: &AccountKey,
        environment: AcmeEnvironment,
    ) -> Result<ChallengeStatus, SolveError> {
        let challenge = challenges
            .iter()
            .rev()
            .find(|challenge| challenge.kind() == method.kind())
            .ok_or_else(|| SolveError::ChallengeTypeNotFound {
                kind: method.kind().as_str().to_owned(),
            })?;
        let token = challenge.token().ok_or(SolveError::MissingToken)?;
        let provider =
            self.providers
                .get(method)
                .ok_or_else(|| SolveError::ProviderNotConfigured {
                    method: method.id().to_owned(),
                })?;
        let acme = self.services.for_environment(environment);

        let outcome = self
            .provision_and_validate(provider.as_ref(), acme, identifier, challenge, token, key)
            .await;

        if let Err(err) = provider.deprovision(identifier, token, key).await {
            warn!(
                identifier = %identifier.value(),
                method = %method,
                error = %err,
                "challenge kaynağı kaldırılamadı"
            );
        }

        match &outcome {
            Ok(status) => info!(
                identifier = %identifier.value(),
                %environment,
                %status,
                "challenge sonuçlandı"
            ),
            Err(err) => warn!(
                identifier = %identifier.value(),
                %environment,
                error = %err,
                "challenge çözülemedi"
            ),
        }
        outcome
    }

    async fn provision_and_validate(
        &self,
        provider: &dyn ChallengeProvider,
        acme: &Arc<dyn AcmeApi>,
        identifier: &OrderIdentifier,
        challenge: &Challenge,
        token: &str,
        key: &AccountKey,
    ) -> Result<ChallengeStatus, SolveError> {
        provider
            .provision(identifier, token, key)
            .await
            .map_err(SolveError::Provision)?;
        debug!(identifier = %identifier.value(), url = %challenge.url(), "challenge hazır, doğrulama isteniyor");

        acme.validate_challenge(challenge.url(), key).await?;
        self.poll_challenge(acme.as_ref(), challenge, key).await
    }

    async fn poll_challenge(
        &self,
        acme: &dyn AcmeApi,
        challenge: &Challenge,
        key: &AccountKey,
    ) -> Result<ChallengeStatus, SolveError> {
        for attempt in 1..=self.poll.attempts {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return Err(SolveError::Shutdown),
                () = tokio::time::sleep(self.poll.interval) => {}
            }

            let current = acme.get_challenge(challenge.url(), key).await?;
            match current.status() {
                status @ (ChallengeStatus::Valid | ChallengeStatus::Invalid) => return Ok(status),
                status => debug!(
                    url = %challenge.url(),
                    attempt,
                    %status,
                    "challenge henüz sonuçlanmadı"
                ),
            }
        }

        Err(SolveError::RetriesExhausted {
            attempts: self.poll.attempts,
        })
    }
}
