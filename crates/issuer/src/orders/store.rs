use std::sync::Arc;

use async_trait::async_trait;
use certhub_acme::renewal::{ManagedCertificate, RenewalInventory};
use certhub_acme::{AccountKey, CertificateChain, Order};
use thiserror::Error;
use url::Url;

use crate::challenges::ChallengeMethod;
use crate::environment::AcmeEnvironment;

/// Order hattının ihtiyaç duyduğu biçimde yönetilen sertifika.
#[derive(Debug, Clone)]
pub struct CertificateRecord {
    pub id: i64,
    pub name: String,
    /// DNS adları; ilk eleman konu adıdır.
    pub identifiers: Vec<String>,
    pub account_key: AccountKey,
    pub challenge_method: ChallengeMethod,
    pub environment: AcmeEnvironment,
    /// Finalize sırasında gönderilen DER kodlu CSR.
    pub csr_der: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub id: i64,
    pub certificate_id: i64,
    pub location: Url,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} bulunamadı: {id}")]
    NotFound { entity: &'static str, id: i64 },
    #[error("depolama hatası: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Backend(source.into())
    }
}

/// Order hattının okuduğu ve sonuç yazdığı kalıcı depo.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn certificate(&self, certificate_id: i64) -> Result<CertificateRecord, StoreError>;

    async fn order(&self, order_id: i64) -> Result<OrderRecord, StoreError>;

    /// Yeni oluşturulan order'ı kaydeder ve kimliğini döndürür.
    async fn insert_order(&self, certificate_id: i64, order: &Order) -> Result<i64, StoreError>;

    /// Order'ın sunucudaki son halini saklar.
    async fn update_order(&self, order_id: i64, order: &Order) -> Result<(), StoreError>;

    async fn mark_order_invalid(&self, order_id: i64) -> Result<(), StoreError>;

    async fn save_certificate(
        &self,
        order_id: i64,
        chain: &CertificateChain,
    ) -> Result<(), StoreError>;

    /// Yenileme taraması için güncel bitiş tarihleriyle sertifikalar.
    async fn managed_certificates(&self) -> Result<Vec<ManagedCertificate>, StoreError>;
}

#[derive(Clone)]
pub(crate) struct StoreInventory {
    store: Arc<dyn OrderStore>,
}

impl StoreInventory {
    pub(crate) fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RenewalInventory for StoreInventory {
    type Error = StoreError;

    async fn load(&self) -> Result<Vec<ManagedCertificate>, Self::Error> {
        self.store.managed_certificates().await
    }
}
