//! Nonce havuzu ile JWS imzalamayı birleştiren kimlik doğrulamalı POST taşıyıcısı.

use http::header::{HeaderMap, CONTENT_TYPE, LOCATION};
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::jws::{AccountKey, JwsError};
use crate::nonce::{NonceManager, NonceManagerError, ReplayNonce};
use crate::problem::AcmeProblem;

/// İmzalı ACME isteklerinin içerik türü.
pub const JOSE_CONTENT_TYPE: &str = "application/jose+json";

/// `badNonce` ile reddedilen bir isteğin yeniden imzalanıp gönderilme sayısı.
pub const MAX_BAD_NONCE_RETRIES: usize = 3;

/// [`SignedTransport`] hataları; her hata sınıfının kendi varyantı vardır.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP isteği gönderilemedi veya yanıt okunamadı.
    #[error("ACME HTTP isteği başarısız: {0}")]
    Http(#[from] reqwest::Error),
    /// Havuzdan ya da `newNonce` uç noktasından nonce alınamadı.
    #[error("ACME nonce alınamadı: {0}")]
    Nonce(#[from] NonceManagerError),
    /// JWS imzası üretilemedi.
    #[error("ACME isteği imzalanamadı: {0}")]
    Signing(#[from] JwsError),
    #[error("ACME istek gövdesi JSON olarak kodlanamadı: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("ACME yanıt gövdesi JSON olarak çözümlenemedi: {0}")]
    Decode(#[source] serde_json::Error),
    /// Sunucu bir problem belgesi döndürdü.
    #[error("ACME sunucusu hata döndürdü: {0}")]
    Problem(AcmeProblem),
    /// Başarısız durum kodu, ayrıştırılabilir problem belgesi olmadan.
    #[error("ACME sunucusu beklenmeyen durum döndürdü: {status}")]
    UnexpectedStatus { status: StatusCode, body: String },
}

impl TransportError {
    /// Hata bir ACME problemi taşıyorsa onu döndürür.
    #[must_use]
    pub const fn problem(&self) -> Option<&AcmeProblem> {
        match self {
            Self::Problem(problem) => Some(problem),
            _ => None,
        }
    }
}

/// İmzalı bir isteğe verilen başarılı yanıt.
#[derive(Debug, Clone)]
pub struct SignedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl SignedResponse {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Gövdeyi JSON olarak çözümler.
    ///
    /// # Errors
    ///
    /// Gövde `T` ile eşleşmezse [`TransportError::Decode`] döner.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_slice(&self.body).map_err(TransportError::Decode)
    }

    /// Geçersiz diziler değiştirilerek UTF-8 çözülmüş gövde.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// `Location` başlığını ayrıştırır; göreli değerler `base` üzerinden çözülür.
    #[must_use]
    pub fn location(&self, base: &Url) -> Option<Url> {
        let value = self.headers.get(LOCATION)?.to_str().ok()?;
        base.join(value).ok()
    }
}

/// Bir ACME sunucusuna imzalı POST istekleri gönderir.
///
/// Her istek tam olarak bir nonce tüketir. Başarılı ve başarısız yanıtlardaki
/// nonce'lar havuza döner; `badNonce` retlerinde gelen nonce yalnızca aynı
/// isteği yeniden göndermek için kullanılır.
pub struct SignedTransport {
    http: reqwest::Client,
    nonces: NonceManager<reqwest::Client>,
}

impl SignedTransport {
    #[must_use]
    pub fn new(http: reqwest::Client, new_nonce_url: Url) -> Self {
        Self {
            nonces: NonceManager::new(http.clone(), new_nonce_url),
            http,
        }
    }

    #[must_use]
    pub const fn nonces(&self) -> &NonceManager<reqwest::Client> {
        &self.nonces
    }

    /// `payload` değerini JSON olarak imzalayıp `url` adresine gönderir.
    ///
    /// # Errors
    ///
    /// Kodlama, nonce, imza, ağ veya ACME protokol hatalarında
    /// [`TransportError`] döner.
    pub async fn post_signed<T: Serialize + ?Sized>(
        &self,
        payload: &T,
        url: &Url,
        key: &AccountKey,
    ) -> Result<SignedResponse, TransportError> {
        let body = serde_json::to_vec(payload).map_err(TransportError::Encode)?;
        self.post(&body, url, key).await
    }

    /// POST-as-GET: boş yüklü imzalı istek (RFC 8555 §6.3).
    ///
    /// # Errors
    ///
    /// [`SignedTransport::post_signed`] ile aynı.
    pub async fn post_as_get(
        &self,
        url: &Url,
        key: &AccountKey,
    ) -> Result<SignedResponse, TransportError> {
        self.post(&[], url, key).await
    }

    async fn post(
        &self,
        payload: &[u8],
        url: &Url,
        key: &AccountKey,
    ) -> Result<SignedResponse, TransportError> {
        let mut scoped_nonce: Option<ReplayNonce> = None;
        let mut retries = 0;
        loop {
            let nonce = match scoped_nonce.take() {
                Some(nonce) => nonce,
                None => self.nonces.nonce().await?,
            };
            let envelope = key.sign_payload(payload, &nonce, url)?;
            let body = serde_json::to_vec(&envelope).map_err(TransportError::Encode)?;

            debug!(url = %url, alg = key.algorithm(), "imzalı ACME isteği gönderiliyor");
            let response = self
                .http
                .post(url.clone())
                .header(CONTENT_TYPE, JOSE_CONTENT_TYPE)
                .body(body)
                .send()
                .await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?.to_vec();

            let problem = AcmeProblem::from_response(status, &headers, &body);
            if let Some(problem) = problem.as_ref().filter(|problem| problem.is_bad_nonce()) {
                if retries >= MAX_BAD_NONCE_RETRIES {
                    warn!(url = %url, retries, "badNonce yeniden deneme hakkı tükendi");
                    return Err(TransportError::Problem(problem.clone()));
                }
                retries += 1;
                scoped_nonce = match ReplayNonce::from_headers(&headers) {
                    Ok(nonce) => nonce,
                    Err(err) => {
                        warn!(url = %url, error = %err, "badNonce yanıtındaki nonce okunamadı");
                        None
                    }
                };
                debug!(url = %url, retries, "badNonce alındı; istek yeniden imzalanıyor");
                continue;
            }

            if let Err(err) = self.nonces.absorb_response(&headers).await {
                warn!(url = %url, error = %err, "yanıttaki Replay-Nonce saklanamadı");
            }

            if let Some(problem) = problem {
                return Err(TransportError::Problem(problem));
            }
            if !status.is_success() {
                return Err(TransportError::UnexpectedStatus {
                    status,
                    body: String::from_utf8_lossy(&body).into_owned(),
                });
            }
            return Ok(SignedResponse {
                status,
                headers,
                body,
            });
        }
    }
}
