#![allow(clippy::module_name_repetitions)]

use async_trait::async_trait;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

/// Bu pencere içinde süresi dolacak sertifikalar yenilenir.
pub const DEFAULT_RENEWAL_THRESHOLD: Duration = Duration::days(40);

/// En son geçerli order'ı depoda bilinen yönetilen sertifika.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedCertificate {
    certificate_id: i64,
    name: String,
    expires_at: OffsetDateTime,
}

impl ManagedCertificate {
    #[must_use]
    pub fn new(certificate_id: i64, name: impl Into<String>, expires_at: OffsetDateTime) -> Self {
        Self {
            certificate_id,
            name: name.into(),
            expires_at,
        }
    }

    #[must_use]
    pub const fn certificate_id(&self) -> i64 {
        self.certificate_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn expires_at(&self) -> OffsetDateTime {
        self.expires_at
    }
}

/// Yenileme penceresine girmiş sertifika.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewalCandidate {
    certificate: ManagedCertificate,
    time_until_expiry: Duration,
}

impl RenewalCandidate {
    #[must_use]
    pub const fn certificate_id(&self) -> i64 {
        self.certificate.certificate_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.certificate.name
    }

    #[must_use]
    pub const fn expires_at(&self) -> OffsetDateTime {
        self.certificate.expires_at
    }

    /// Sertifikanın süresi dolmuşsa negatiftir.
    #[must_use]
    pub const fn time_until_expiry(&self) -> Duration {
        self.time_until_expiry
    }
}

/// Yenileme için değerlendirilecek sertifikaların kaynağı.
#[async_trait]
pub trait RenewalInventory: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn load(&self) -> Result<Vec<ManagedCertificate>, Self::Error>;
}

#[derive(Debug, Error)]
pub enum RenewalJobError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error("yenileme eşiği negatif olamaz")]
    NegativeThreshold,
    #[error("yenileme penceresi desteklenen tarih aralığını aşıyor")]
    ThresholdOutOfRange,
    #[error("sertifika envanteri okunamadı: {0}")]
    Inventory(#[source] E),
}

/// Verilen andan itibaren `threshold` içinde süresi dolacak sertifikaları seçer.
#[derive(Debug, Clone)]
pub struct RenewalJob<S> {
    inventory: S,
    threshold: Duration,
}

impl<S> RenewalJob<S> {
    #[must_use]
    pub const fn new(inventory: S, threshold: Duration) -> Self {
        Self {
            inventory,
            threshold,
        }
    }

    #[must_use]
    pub const fn threshold(&self) -> Duration {
        self.threshold
    }
}

impl<S> RenewalJob<S>
where
    S: RenewalInventory,
{
    /// Yenileme adaylarını bitiş zamanına göre, en yakını önce olacak şekilde döndürür.
    ///
    /// # Errors
    ///
    /// * [`RenewalJobError::NegativeThreshold`] - pencere negatifse.
    /// * [`RenewalJobError::ThresholdOutOfRange`] - `now + threshold` temsil
    ///   edilebilir bir tarih değilse.
    /// * [`RenewalJobError::Inventory`] - envanter okunamazsa.
    pub async fn scan(
        &self,
        now: OffsetDateTime,
    ) -> Result<Vec<RenewalCandidate>, RenewalJobError<S::Error>> {
        if self.threshold.is_negative() {
            return Err(RenewalJobError::NegativeThreshold);
        }
        let window_end = now
            .checked_add(self.threshold)
            .ok_or(RenewalJobError::ThresholdOutOfRange)?;

        let mut candidates: Vec<RenewalCandidate> = self
            .inventory
            .load()
            .await
            .map_err(RenewalJobError::Inventory)?
            .into_iter()
            .filter(|certificate| certificate.expires_at <= window_end)
            .map(|certificate| RenewalCandidate {
                time_until_expiry: certificate.expires_at - now,
                certificate,
            })
            .collect();
        candidates.sort_by_key(RenewalCandidate::expires_at);
        Ok(candidates)
    }
}
