use std::collections::HashMap;

use async_trait::async_trait;
use certhub_acme::{AccountKey, Dns01TxtRecord, KeyAuthorization, OrderIdentifier};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info};

use super::provider::{ChallengeProvider, ProviderError};

/// TXT kaydı yayınlandıktan sonra sağlayıcı tarafından döndürülen referans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecordHandle {
    record_id: String,
    record: Dns01TxtRecord,
}

impl DnsRecordHandle {
    #[must_use]
    pub fn new(record_id: impl Into<String>, record: Dns01TxtRecord) -> Self {
        Self {
            record_id: record_id.into(),
            record,
        }
    }

    /// Sağlayıcıya özgü kayıt kimliğini döndürür.
    #[must_use]
    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    #[must_use]
    pub const fn record(&self) -> &Dns01TxtRecord {
        &self.record
    }
}

/// DNS sağlayıcı katmanında oluşabilecek hatalar.
#[derive(Debug, Error)]
pub enum DnsProviderError {
    /// Sağlayıcı kimlik doğrulaması başarısız oldu.
    #[error("DNS sağlayıcısına kimlik doğrulama yapılamadı: {message}")]
    Authentication { message: String },
    /// Sağlayıcı isteği reddetti.
    #[error("DNS sağlayıcısı isteği reddetti: {message}")]
    Provider { message: String },
}

/// DNS sağlayıcıları için ortak arayüz.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Kısa sağlayıcı adı; hata mesajlarında kullanılır.
    fn name(&self) -> &'static str;

    /// TXT kaydını yayınlar ve sağlayıcıya özgü tanımlayıcıyı döndürür.
    async fn publish_txt_record(
        &self,
        record: &Dns01TxtRecord,
    ) -> Result<DnsRecordHandle, DnsProviderError>;

    /// Daha önce yayınlanan TXT kaydını siler.
    async fn remove_txt_record(&self, handle: &DnsRecordHandle) -> Result<(), DnsProviderError>;
}

/// dns-01 challenge'larını bir [`DnsProvider`] üzerinden çözer.
///
/// Yayınlanan kayıtlar token ile eşlenir; deprovision aynı kaydı siler.
pub struct Dns01Provider<P> {
    dns: P,
    published: Mutex<HashMap<String, DnsRecordHandle>>,
}

impl<P> Dns01Provider<P>
where
    P: DnsProvider,
{
    pub fn new(dns: P) -> Self {
        Self {
            dns,
            published: Mutex::new(HashMap::new()),
        }
    }

    pub const fn dns(&self) -> &P {
        &self.dns
    }

    /// Henüz kaldırılmamış kayıt sayısı.
    pub fn published(&self) -> usize {
        self.published.lock().len()
    }
}

#[async_trait]
impl<P> ChallengeProvider for Dns01Provider<P>
where
    P: DnsProvider,
{
    async fn provision(
        &self,
        identifier: &OrderIdentifier,
        token: &str,
        key: &AccountKey,
    ) -> Result<(), ProviderError> {
        let record = KeyAuthorization::new(token, key)?.dns01_record(identifier)?;
        let handle = self
            .dns
            .publish_txt_record(&record)
            .await
            .map_err(|err| ProviderError::backend(self.dns.name(), err))?;
        info!(
            provider = self.dns.name(),
            record = %handle.record().name(),
            "dns-01 TXT kaydı yayınlandı"
        );
        self.published.lock().insert(token.to_owned(), handle);
        Ok(())
    }

    async fn deprovision(
        &self,
        _identifier: &OrderIdentifier,
        token: &str,
        _key: &AccountKey,
    ) -> Result<(), ProviderError> {
        let Some(handle) = self.published.lock().remove(token) else {
            debug!(token, "kaldırılacak dns-01 kaydı yok");
            return Ok(());
        };
        self.dns
            .remove_txt_record(&handle)
            .await
            .map_err(|err| ProviderError::backend(self.dns.name(), err))?;
        info!(
            provider = self.dns.name(),
            record = %handle.record().name(),
            "dns-01 TXT kaydı kaldırıldı"
        );
        Ok(())
    }
}
