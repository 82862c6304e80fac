use std::collections::VecDeque;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use http::header::{HeaderMap, ToStrError};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

/// ACME protokolünde kullanılan `Replay-Nonce` başlığının adı.
pub const REPLAY_NONCE_HEADER: &str = "Replay-Nonce";

/// Havuzun varsayılan kapasitesi.
const DEFAULT_POOL_CAPACITY: usize = 4;

/// Nonce doğrulama ve havuzu ile ilişkili hata türleri.
#[derive(Debug, Error)]
pub enum NonceError {
    /// Boş bir nonce değeri ile karşılaşıldı.
    #[error("Replay-Nonce değeri boş olamaz")]
    Empty,
    /// Nonce base64url (padding'siz) formatında değil.
    #[error("Replay-Nonce değeri base64url olarak ayrıştırılamadı: {0}")]
    InvalidBase64(#[source] base64::DecodeError),
    /// HTTP başlığındaki nonce UTF-8 olarak çözümlenemedi.
    #[error("Replay-Nonce HTTP başlığı UTF-8 olarak çözümlenemedi: {0}")]
    InvalidHeaderEncoding(#[source] ToStrError),
    /// Havuz kapasitesi sıfır olarak yapılandırılmaya çalışıldı.
    #[error("nonce havuzu kapasitesi en az 1 olmalıdır")]
    InvalidCapacity,
}

/// Sunucunun verdiği tek kullanımlık anti-replay değeri (padding'siz base64url).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReplayNonce(String);

impl ReplayNonce {
    /// Metinsel bir değerden nonce üretir; çevreleyen boşluklar atılır.
    ///
    /// # Errors
    ///
    /// * `NonceError::Empty` - değer yalnızca boşluklardan oluştuğunda.
    /// * `NonceError::InvalidBase64` - değer base64url olarak çözümlenemediğinde.
    pub fn parse(value: &str) -> Result<Self, NonceError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(NonceError::Empty);
        }
        URL_SAFE_NO_PAD
            .decode(value)
            .map_err(NonceError::InvalidBase64)?;
        Ok(Self(value.to_owned()))
    }

    /// Yanıttaki `Replay-Nonce` başlığını okur; havuza eklemez.
    ///
    /// # Errors
    ///
    /// Başlık UTF-8 değilse veya değer geçersizse `NonceError` döner.
    pub fn from_headers(headers: &HeaderMap) -> Result<Option<Self>, NonceError> {
        headers
            .get(REPLAY_NONCE_HEADER)
            .map(|value| {
                value
                    .to_str()
                    .map_err(NonceError::InvalidHeaderEncoding)
                    .and_then(Self::parse)
            })
            .transpose()
    }

    /// Nonce değerini base64url kodlu metin olarak döndürür.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `newNonce` uç noktasına yapılan istek sırasında oluşan taşıma hatası.
#[derive(Debug, Error)]
#[error("newNonce isteği başarısız oldu: {source}")]
pub struct NonceRequestError {
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

impl NonceRequestError {
    /// Herhangi bir taşıma hatasını sarar.
    #[must_use]
    pub fn transport<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            source: Box::new(source),
        }
    }
}

/// `newNonce` uç noktasına HEAD isteği atıp yanıt başlıklarını döndüren istemci.
#[async_trait]
pub trait NewNonceRequester: Send + Sync {
    /// `url` adresine istek atar ve yanıt başlıklarını döndürür.
    ///
    /// # Errors
    ///
    /// İstek gönderilemezse veya sunucu başarısız durum kodu dönerse
    /// `NonceRequestError` döner.
    async fn request_new_nonce(&self, url: &Url) -> Result<HeaderMap, NonceRequestError>;
}

#[async_trait]
impl NewNonceRequester for reqwest::Client {
    async fn request_new_nonce(&self, url: &Url) -> Result<HeaderMap, NonceRequestError> {
        let response = self
            .head(url.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(NonceRequestError::transport)?;
        Ok(response.headers().clone())
    }
}

/// [`NonceManager::nonce`] çağrısında oluşabilecek hatalar.
#[derive(Debug, Error)]
pub enum NonceManagerError {
    /// Sunucunun döndürdüğü nonce geçersiz.
    #[error(transparent)]
    Nonce(#[from] NonceError),
    /// `newNonce` isteği başarısız oldu.
    #[error(transparent)]
    Request(#[from] NonceRequestError),
    /// `newNonce` yanıtında `Replay-Nonce` başlığı yoktu.
    #[error("ACME sunucusu Replay-Nonce başlığı döndürmedi")]
    MissingReplayNonce,
}

/// Yanıtlardan toplanan nonce'ları tutan sınırlı havuz.
///
/// Havuz tek bir kilit arkasındadır; her çekim tek bir çağırana gider. Havuz
/// boşken `newNonce` ile alınan değer doğrudan çağırana verilir, havuza girmez.
/// Kapasite dolunca en eski değer atılır, aynı değer iki kez eklenmez.
pub struct NonceManager<C> {
    client: C,
    new_nonce_url: Url,
    capacity: usize,
    pool: Mutex<VecDeque<ReplayNonce>>,
}

impl<C> NonceManager<C> {
    /// Varsayılan kapasiteli (4) boş bir havuzla yönetici oluşturur.
    #[must_use]
    pub fn new(client: C, new_nonce_url: Url) -> Self {
        Self {
            client,
            new_nonce_url,
            capacity: DEFAULT_POOL_CAPACITY,
            pool: Mutex::new(VecDeque::with_capacity(DEFAULT_POOL_CAPACITY)),
        }
    }

    /// Belirtilen kapasite ile yeni bir yönetici oluşturur.
    ///
    /// # Errors
    ///
    /// Kapasite sıfırsa `NonceError::InvalidCapacity` döner.
    pub fn with_capacity(
        client: C,
        new_nonce_url: Url,
        capacity: usize,
    ) -> Result<Self, NonceError> {
        if capacity == 0 {
            return Err(NonceError::InvalidCapacity);
        }
        Ok(Self {
            client,
            new_nonce_url,
            capacity,
            pool: Mutex::new(VecDeque::with_capacity(capacity)),
        })
    }

    /// Havuz boşken çağrılan `newNonce` uç noktası.
    #[must_use]
    pub const fn new_nonce_url(&self) -> &Url {
        &self.new_nonce_url
    }

    /// Havuzun kapasitesini döndürür.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Havuzda bekleyen nonce sayısını döndürür.
    pub async fn pooled(&self) -> usize {
        self.pool.lock().await.len()
    }

    /// Havuzdaki en eski nonce'ı verir; havuz boşsa sunucudan yenisini alır.
    ///
    /// # Errors
    ///
    /// `newNonce` isteği başarısız olursa veya yanıtta geçerli bir
    /// `Replay-Nonce` yoksa `NonceManagerError` döner. Yeniden denenmez.
    pub async fn nonce(&self) -> Result<ReplayNonce, NonceManagerError>
    where
        C: NewNonceRequester,
    {
        if let Some(nonce) = self.pool.lock().await.pop_front() {
            return Ok(nonce);
        }

        debug!(url = %self.new_nonce_url, "nonce havuzu boş; newNonce çağrılıyor");
        let headers = self.client.request_new_nonce(&self.new_nonce_url).await?;
        ReplayNonce::from_headers(&headers)?.ok_or(NonceManagerError::MissingReplayNonce)
    }

    /// Sunucudan gelen ham değeri doğrulayıp havuza ekler.
    ///
    /// Havuzda zaten bulunan değer tekrar eklenmez; kapasite doluysa en eski
    /// değer atılır.
    ///
    /// # Errors
    ///
    /// Değer geçersizse `NonceError` döner; havuz değişmez.
    pub async fn save_nonce(&self, value: &str) -> Result<ReplayNonce, NonceError> {
        let nonce = ReplayNonce::parse(value)?;
        self.store(nonce.clone()).await;
        Ok(nonce)
    }

    /// Yanıt başlıklarında `Replay-Nonce` varsa havuza ekler.
    ///
    /// # Errors
    ///
    /// Başlık geçersizse `NonceError` döner.
    pub async fn absorb_response(
        &self,
        headers: &HeaderMap,
    ) -> Result<Option<ReplayNonce>, NonceError> {
        let nonce = ReplayNonce::from_headers(headers)?;
        if let Some(nonce) = &nonce {
            self.store(nonce.clone()).await;
        }
        Ok(nonce)
    }

    async fn store(&self, nonce: ReplayNonce) {
        let mut pool = self.pool.lock().await;
        if pool.contains(&nonce) {
            return;
        }
        if pool.len() == self.capacity {
            pool.pop_front();
        }
        pool.push_back(nonce);
    }
}
