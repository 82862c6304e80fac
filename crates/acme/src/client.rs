//! [`SignedTransport`] üzerinde ACME kaynak işlemleri.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::authorization::{Authorization, AuthorizationError, Challenge, ChallengeError};
use crate::certificate::{CertificateChain, CertificateError, FinalizeRequest};
use crate::directory::{AcmeDirectory, AcmeDirectoryError};
use crate::jws::AccountKey;
use crate::order::{NewOrderRequest, Order, OrderError};
use crate::transport::{SignedResponse, SignedTransport, TransportError};

#[derive(Debug, Error)]
pub enum AcmeClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("ACME directory alınamadı: {0}")]
    DirectoryFetch(#[source] reqwest::Error),
    #[error(transparent)]
    Directory(#[from] AcmeDirectoryError),
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
    #[error(transparent)]
    Challenge(#[from] ChallengeError),
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    Certificate(#[from] CertificateError),
    #[error("ACME yanıtında Location başlığı yok: {url}")]
    MissingLocation { url: Url },
}

impl AcmeClientError {
    /// Taşıma hatasının taşıdığı problem belgesi (varsa).
    #[must_use]
    pub const fn problem(&self) -> Option<&crate::problem::AcmeProblem> {
        match self {
            Self::Transport(err) => err.problem(),
            _ => None,
        }
    }
}

/// Sertifika üretim katmanının kullandığı ACME servis yeteneği.
///
/// Her çağrı verilen hesap anahtarıyla imzalanır; kaynak okumaları
/// POST-as-GET ile yapılır.
#[async_trait]
pub trait AcmeApi: Send + Sync {
    async fn get_authorization(
        &self,
        url: &Url,
        key: &AccountKey,
    ) -> Result<Authorization, AcmeClientError>;

    /// Sunucuya challenge'ın doğrulanmaya hazır olduğunu bildirir.
    async fn validate_challenge(
        &self,
        url: &Url,
        key: &AccountKey,
    ) -> Result<Challenge, AcmeClientError>;

    async fn get_challenge(&self, url: &Url, key: &AccountKey)
        -> Result<Challenge, AcmeClientError>;

    /// Yeni order oluşturur; dönen order `Location` değerini taşır.
    async fn new_order(
        &self,
        request: &NewOrderRequest,
        key: &AccountKey,
    ) -> Result<Order, AcmeClientError>;

    async fn get_order(&self, url: &Url, key: &AccountKey) -> Result<Order, AcmeClientError>;

    async fn finalize_order(
        &self,
        finalize_url: &Url,
        request: &FinalizeRequest,
        key: &AccountKey,
    ) -> Result<Order, AcmeClientError>;

    async fn download_certificate(
        &self,
        url: &Url,
        key: &AccountKey,
    ) -> Result<CertificateChain, AcmeClientError>;
}

/// Tek bir ACME dizini için [`AcmeApi`] gerçeklemesi.
pub struct AcmeClient {
    directory: AcmeDirectory,
    transport: SignedTransport,
}

impl AcmeClient {
    /// Dizin belgesini çeker ve bu dizin için imzalı taşıyıcıyı hazırlar.
    ///
    /// # Errors
    ///
    /// Dizin alınamaz veya ayrıştırılamazsa [`AcmeClientError`] döner.
    pub async fn connect(
        http: reqwest::Client,
        directory_url: &Url,
    ) -> Result<Self, AcmeClientError> {
        let body = http
            .get(directory_url.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(AcmeClientError::DirectoryFetch)?
            .bytes()
            .await
            .map_err(AcmeClientError::DirectoryFetch)?;
        let directory = AcmeDirectory::from_json_slice(&body)?;
        info!(directory = %directory_url, "ACME directory yüklendi");
        Ok(Self::from_directory(http, directory))
    }

    #[must_use]
    pub fn from_directory(http: reqwest::Client, directory: AcmeDirectory) -> Self {
        let transport = SignedTransport::new(http, directory.new_nonce.clone());
        Self {
            directory,
            transport,
        }
    }

    #[must_use]
    pub const fn directory(&self) -> &AcmeDirectory {
        &self.directory
    }

    #[must_use]
    pub const fn transport(&self) -> &SignedTransport {
        &self.transport
    }

    fn order_from(
        response: &SignedResponse,
        location: Option<Url>,
    ) -> Result<Order, AcmeClientError> {
        let order = Order::from_json_slice(response.body())?;
        Ok(match location {
            Some(location) => order.with_location(location),
            None => order,
        })
    }
}

#[async_trait]
impl AcmeApi for AcmeClient {
    async fn get_authorization(
        &self,
        url: &Url,
        key: &AccountKey,
    ) -> Result<Authorization, AcmeClientError> {
        let response = self.transport.post_as_get(url, key).await?;
        Ok(Authorization::from_json_slice(response.body())?)
    }

    async fn validate_challenge(
        &self,
        url: &Url,
        key: &AccountKey,
    ) -> Result<Challenge, AcmeClientError> {
        debug!(challenge = %url, "challenge doğrulaması isteniyor");
        let response = self
            .transport
            .post_signed(&serde_json::json!({}), url, key)
            .await?;
        Ok(Challenge::from_json_slice(response.body())?)
    }

    async fn get_challenge(
        &self,
        url: &Url,
        key: &AccountKey,
    ) -> Result<Challenge, AcmeClientError> {
        let response = self.transport.post_as_get(url, key).await?;
        Ok(Challenge::from_json_slice(response.body())?)
    }

    async fn new_order(
        &self,
        request: &NewOrderRequest,
        key: &AccountKey,
    ) -> Result<Order, AcmeClientError> {
        let url = &self.directory.new_order;
        let response = self.transport.post_signed(request, url, key).await?;
        let location = response
            .location(url)
            .ok_or_else(|| AcmeClientError::MissingLocation { url: url.clone() })?;
        info!(
            order = %location,
            identifiers = request.identifiers().len(),
            "ACME order oluşturuldu"
        );
        Self::order_from(&response, Some(location))
    }

    async fn get_order(&self, url: &Url, key: &AccountKey) -> Result<Order, AcmeClientError> {
        let response = self.transport.post_as_get(url, key).await?;
        Self::order_from(&response, Some(url.clone()))
    }

    async fn finalize_order(
        &self,
        finalize_url: &Url,
        request: &FinalizeRequest,
        key: &AccountKey,
    ) -> Result<Order, AcmeClientError> {
        let response = self
            .transport
            .post_signed(request, finalize_url, key)
            .await?;
        let location = response.location(finalize_url);
        Self::order_from(&response, location)
    }

    async fn download_certificate(
        &self,
        url: &Url,
        key: &AccountKey,
    ) -> Result<CertificateChain, AcmeClientError> {
        let response = self.transport.post_as_get(url, key).await?;
        Ok(CertificateChain::from_pem_chain(&response.text())?)
    }
}
