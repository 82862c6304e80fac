use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use pem::Pem;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("CSR PEM ayrıştırılamadı: {0}")]
    InvalidCsrPem(String),
    /// Finalize için boş CSR verildi.
    #[error("CSR DER verisi boş")]
    EmptyCsr,
    #[error("sertifika zinciri PEM verisi geçersiz: {0}")]
    InvalidCertificate(String),
    /// İndirilen zincirde hiç sertifika yok.
    #[error("sertifika zinciri boş")]
    EmptyChain,
}

/// Finalize isteğinin gövdesi (RFC 8555 §7.4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalizeRequest {
    pub csr: String,
}

impl FinalizeRequest {
    /// DER kodlu CSR'dan finalize gövdesi üretir.
    ///
    /// # Errors
    ///
    /// CSR boşsa [`CertificateError::EmptyCsr`] döner.
    pub fn from_der(csr_der: &[u8]) -> Result<Self, CertificateError> {
        if csr_der.is_empty() {
            return Err(CertificateError::EmptyCsr);
        }
        Ok(Self {
            csr: URL_SAFE_NO_PAD.encode(csr_der),
        })
    }

    /// PEM kodlu CSR'dan finalize gövdesi üretir.
    ///
    /// # Errors
    ///
    /// PEM ayrıştırılamazsa veya `CERTIFICATE REQUEST` bloğu içermiyorsa
    /// [`CertificateError::InvalidCsrPem`] döner.
    pub fn from_pem(csr_pem: &str) -> Result<Self, CertificateError> {
        let parsed =
            pem::parse(csr_pem).map_err(|err| CertificateError::InvalidCsrPem(err.to_string()))?;
        if parsed.tag() != "CERTIFICATE REQUEST" && parsed.tag() != "NEW CERTIFICATE REQUEST" {
            return Err(CertificateError::InvalidCsrPem(format!(
                "beklenmeyen PEM etiketi: {}",
                parsed.tag()
            )));
        }
        Self::from_der(parsed.contents())
    }
}

/// İndirilen sertifika zinciri; ilk eleman yaprak sertifikadır.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateChain {
    certificates: Vec<String>,
}

impl CertificateChain {
    /// Verilen PEM bloklarından zincir oluşturur.
    ///
    /// # Errors
    ///
    /// Hiç sertifika verilmezse [`CertificateError::EmptyChain`] döner.
    pub fn new(certificates: Vec<String>) -> Result<Self, CertificateError> {
        if certificates.is_empty() {
            return Err(CertificateError::EmptyChain);
        }
        Ok(Self { certificates })
    }

    /// `application/pem-certificate-chain` gövdesini ayrıştırır.
    ///
    /// # Errors
    ///
    /// PEM blokları çözümlenemezse, `CERTIFICATE` dışında etiket varsa veya
    /// zincir boşsa [`CertificateError`] döner.
    pub fn from_pem_chain(body: &str) -> Result<Self, CertificateError> {
        let mut certificates = Vec::new();
        for section in pem::parse_many(body.as_bytes())
            .map_err(|err| CertificateError::InvalidCertificate(err.to_string()))?
        {
            if section.tag() != "CERTIFICATE" {
                return Err(CertificateError::InvalidCertificate(format!(
                    "beklenen CERTIFICATE etiketi, bulundu {}",
                    section.tag()
                )));
            }
            certificates.push(pem::encode(&Pem::new("CERTIFICATE", section.contents())));
        }
        Self::new(certificates)
    }

    #[must_use]
    pub fn certificates(&self) -> &[String] {
        &self.certificates
    }

    #[must_use]
    pub fn leaf(&self) -> &str {
        &self.certificates[0]
    }

    #[must_use]
    pub fn intermediates(&self) -> &[String] {
        &self.certificates[1..]
    }

    /// Zinciri tek bir PEM metni olarak birleştirir.
    #[must_use]
    pub fn to_pem(&self) -> String {
        self.certificates.concat()
    }
}
