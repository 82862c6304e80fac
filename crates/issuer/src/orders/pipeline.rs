use std::sync::Arc;

use certhub_acme::{
    AcmeApi, AcmeClientError, AuthorizationStatus, CertificateError, FinalizeRequest,
    NewOrderError, NewOrderRequest, Order, OrderStatus,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::store::{CertificateRecord, OrderStore, StoreError};
use crate::authorizations::{AuthorizationFulfiller, FulfillError};
use crate::challenges::PollPolicy;
use crate::environment::AcmeServices;

/// Bir order işinin nihai sonucu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderOutcome {
    /// Sertifika üretildi ve kaydedildi.
    Issued,
    /// Order veya authorization'larından biri `invalid` oldu.
    Invalid,
}

#[derive(Debug, Error)]
pub enum OrderJobError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Acme(#[from] AcmeClientError),
    #[error(transparent)]
    Fulfill(#[from] FulfillError),
    #[error("sertifika identifier listesi geçersiz: {0}")]
    Identifiers(#[from] NewOrderError),
    #[error("CSR kullanılamadı: {0}")]
    Csr(#[from] CertificateError),
    #[error("order {order_id} valid fakat sertifika adresi içermiyor")]
    MissingCertificateUrl { order_id: i64 },
    #[error("order {attempts} denemede sonuçlanmadı")]
    StillProcessing { attempts: u32 },
    #[error("kapatma sinyali alındı; order işlenmesi yarıda kesildi")]
    Shutdown,
    #[error("order kuyruğu kapalı")]
    QueueClosed,
    #[error("order işi sonuç bildirmeden sonlandı")]
    Cancelled,
}

/// Kayıtlı bir order'ı sunucudaki mevcut durumundan nihai duruma yürütür.
pub(crate) struct OrderPipeline {
    store: Arc<dyn OrderStore>,
    services: AcmeServices,
    fulfiller: AuthorizationFulfiller,
    poll: PollPolicy,
    shutdown: CancellationToken,
}

struct ActiveOrder<'a> {
    id: i64,
    location: Url,
    certificate: CertificateRecord,
    acme: &'a Arc<dyn AcmeApi>,
    polls: u32,
}

impl OrderPipeline {
    pub(crate) fn new(
        store: Arc<dyn OrderStore>,
        services: AcmeServices,
        fulfiller: AuthorizationFulfiller,
        poll: PollPolicy,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            services,
            fulfiller,
            poll,
            shutdown,
        }
    }

    pub(crate) const fn store(&self) -> &Arc<dyn OrderStore> {
        &self.store
    }

    /// Yönetilen sertifika için `newOrder` gönderir ve sonucu kaydeder.
    pub(crate) async fn place_new_order(&self, certificate_id: i64) -> Result<i64, OrderJobError> {
        let certificate = self.store.certificate(certificate_id).await?;
        let request = NewOrderRequest::for_dns_names(&certificate.identifiers)?;
        let acme = self.services.for_environment(certificate.environment);
        let order = acme.new_order(&request, &certificate.account_key).await?;
        let order_id = self.store.insert_order(certificate_id, &order).await?;
        info!(
            certificate_id,
            order_id,
            certificate = %certificate.name,
            environment = %certificate.environment,
            "yeni ACME order oluşturuldu"
        );
        Ok(order_id)
    }

    pub(crate) async fn process(&self, order_id: i64) -> Result<OrderOutcome, OrderJobError> {
        let record = self.store.order(order_id).await?;
        let certificate = self.store.certificate(record.certificate_id).await?;
        let acme = self.services.for_environment(certificate.environment);
        let mut active = ActiveOrder {
            id: order_id,
            location: record.location,
            certificate,
            acme,
            polls: 0,
        };

        let mut order = self.fetch(&active).await?;
        let mut fulfilled = false;
        loop {
            debug!(order_id, status = %order.status(), "order durumu");
            match order.status() {
                OrderStatus::Pending if !fulfilled => {
                    let status = self
                        .fulfiller
                        .fulfill_authorizations(
                            order.authorizations(),
                            &active.certificate.challenge_method,
                            &active.certificate.account_key,
                            active.certificate.environment,
                        )
                        .await?;
                    if status != AuthorizationStatus::Valid {
                        warn!(order_id, "order authorization'ları geçersiz");
                        self.store.mark_order_invalid(order_id).await?;
                        return Ok(OrderOutcome::Invalid);
                    }
                    fulfilled = true;
                    order = self.fetch(&active).await?;
                }
                OrderStatus::Pending | OrderStatus::Processing => {
                    order = self.wait_and_fetch(&mut active).await?;
                }
                OrderStatus::Ready => {
                    let request = FinalizeRequest::from_der(&active.certificate.csr_der)?;
                    let finalized = active
                        .acme
                        .finalize_order(order.finalize(), &request, &active.certificate.account_key)
                        .await?;
                    self.store.update_order(order_id, &finalized).await?;
                    info!(order_id, status = %finalized.status(), "order finalize edildi");
                    order = finalized;
                    if order.status() == OrderStatus::Ready {
                        order = self.wait_and_fetch(&mut active).await?;
                    }
                }
                OrderStatus::Valid => {
                    let url = order
                        .certificate()
                        .ok_or(OrderJobError::MissingCertificateUrl { order_id })?;
                    let chain = active
                        .acme
                        .download_certificate(url, &active.certificate.account_key)
                        .await?;
                    self.store.save_certificate(order_id, &chain).await?;
                    info!(
                        order_id,
                        certificate = %active.certificate.name,
                        chain_length = chain.certificates().len(),
                        "sertifika kaydedildi"
                    );
                    return Ok(OrderOutcome::Issued);
                }
                OrderStatus::Invalid => {
                    warn!(order_id, problem = ?order.error(), "order geçersiz");
                    self.store.mark_order_invalid(order_id).await?;
                    return Ok(OrderOutcome::Invalid);
                }
            }
        }
    }

    async fn fetch(&self, active: &ActiveOrder<'_>) -> Result<Order, OrderJobError> {
        let order = active
            .acme
            .get_order(&active.location, &active.certificate.account_key)
            .await?;
        self.store.update_order(active.id, &order).await?;
        Ok(order)
    }

    async fn wait_and_fetch(&self, active: &mut ActiveOrder<'_>) -> Result<Order, OrderJobError> {
        if active.polls >= self.poll.attempts {
            return Err(OrderJobError::StillProcessing {
                attempts: self.poll.attempts,
            });
        }
        active.polls += 1;
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => return Err(OrderJobError::Shutdown),
            () = tokio::time::sleep(self.poll.interval) => {}
        }
        self.fetch(active).await
    }
}
