use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use certhub_acme::{AccountKey, ChallengeKind, OrderIdentifier, ValidationError};
use thiserror::Error;

/// Yapılandırılmış bir challenge çözme yöntemi: hangi ACME challenge türünü
/// yanıtladığı ve arkasındaki sağlayıcı.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChallengeMethod {
    id: String,
    kind: ChallengeKind,
}

impl ChallengeMethod {
    #[must_use]
    pub fn new(id: impl Into<String>, kind: ChallengeKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    /// Süreç içi [`Http01Responder`](super::Http01Responder) ile sunulan `http-01`.
    #[must_use]
    pub fn http01_internal() -> Self {
        Self::new("http-01-internal", ChallengeKind::Http01)
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn kind(&self) -> &ChallengeKind {
        &self.kind
    }
}

impl fmt::Display for ChallengeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.kind.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("key authorization hazırlanamadı: {0}")]
    KeyAuthorization(#[from] ValidationError),
    #[error("{provider} sağlayıcısı işlemi tamamlayamadı: {source}")]
    Backend {
        provider: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ProviderError {
    pub fn backend<E>(provider: &'static str, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Backend {
            provider,
            source: source.into(),
        }
    }
}

/// Bir challenge için kanıt kaynağını yerleştirir ve kaldırır.
#[async_trait]
pub trait ChallengeProvider: Send + Sync {
    async fn provision(
        &self,
        identifier: &OrderIdentifier,
        token: &str,
        key: &AccountKey,
    ) -> Result<(), ProviderError>;

    async fn deprovision(
        &self,
        identifier: &OrderIdentifier,
        token: &str,
        key: &AccountKey,
    ) -> Result<(), ProviderError>;
}

/// [`ChallengeMethod::id`] ile anahtarlanmış sağlayıcılar.
#[derive(Clone, Default)]
pub struct ChallengeProviders {
    providers: HashMap<String, Arc<dyn ChallengeProvider>>,
}

impl ChallengeProviders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `method` için `provider` kaydeder; önceki kayıt varsa değiştirilir.
    #[must_use]
    pub fn with(mut self, method: &ChallengeMethod, provider: Arc<dyn ChallengeProvider>) -> Self {
        self.providers.insert(method.id().to_owned(), provider);
        self
    }

    #[must_use]
    pub fn get(&self, method: &ChallengeMethod) -> Option<Arc<dyn ChallengeProvider>> {
        self.providers.get(method.id()).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for ChallengeProviders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("ChallengeProviders")
            .field("methods", &ids)
            .finish()
    }
}
