#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use certhub_acme::renewal::ManagedCertificate;
use certhub_acme::{
    AccountKey, AcmeApi, AcmeClientError, AcmeProblem, Authorization, AuthorizationStatus,
    CertificateChain, Challenge, ChallengeKind, ChallengeStatus,
    FinalizeRequest, NewOrderRequest, Order, OrderIdentifier, OrderStatus, TransportError,
};
use certhub_issuer::{
    AcmeEnvironment, AcmeServices, CertificateRecord, ChallengeMethod, ChallengeProvider,
    OrderRecord, OrderStore, ProviderError, StoreError,
};
use parking_lot::Mutex;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha20Rng;
use url::Url;

pub const LEAF_PEM: &str = "-----BEGIN CERTIFICATE-----\nTUlJQmxlYWY=\n-----END CERTIFICATE-----\n";

pub fn url(path: &str) -> Url {
    Url::parse(&format!("https://acme.test{path}")).unwrap()
}

pub fn account_key(seed: u64) -> AccountKey {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    AccountKey::generate_p256(&mut rng)
        .with_kid(format!("https://acme.test/acct/{seed}"))
}

pub fn http01(token: &str, chal: &str) -> Challenge {
    Challenge::new(
        ChallengeKind::Http01,
        ChallengeStatus::Pending,
        url(chal),
        Some(token.to_owned()),
    )
}

pub fn dns01(token: &str, chal: &str) -> Challenge {
    Challenge::new(
        ChallengeKind::Dns01,
        ChallengeStatus::Pending,
        url(chal),
        Some(token.to_owned()),
    )
}

pub fn pending_authorization(name: &str, challenges: Vec<Challenge>) -> Authorization {
    Authorization::new(
        OrderIdentifier::dns(name).unwrap(),
        AuthorizationStatus::Pending,
        challenges,
    )
}

pub fn not_found(target: &Url) -> AcmeClientError {
    AcmeClientError::Transport(TransportError::Problem(
        AcmeProblem::new(
            "urn:ietf:params:acme:error:malformed",
            Some(format!("{target} bulunamadı")),
        )
        .with_status(404),
    ))
}

#[derive(Debug, Default)]
pub struct Calls {
    pub get_authorization: AtomicUsize,
    pub validate_challenge: AtomicUsize,
    pub get_challenge: AtomicUsize,
    pub new_order: AtomicUsize,
    pub get_order: AtomicUsize,
    pub finalize_order: AtomicUsize,
    pub download_certificate: AtomicUsize,
}

impl Calls {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct MockState {
    authorizations: HashMap<Url, Authorization>,
    challenge_statuses: HashMap<Url, VecDeque<ChallengeStatus>>,
    orders: HashMap<Url, VecDeque<Order>>,
    new_orders: VecDeque<Order>,
    finalized: HashMap<Url, Order>,
    certificates: HashMap<Url, CertificateChain>,
}

/// Senaryolu ACME sunucusu. Senaryo dizileri baştan sona tüketilir,
/// son eleman tekrar eder.
#[derive(Default)]
pub struct MockAcme {
    state: Mutex<MockState>,
    authorization_delay: Mutex<Duration>,
    pub calls: Calls,
}

fn next_scripted<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

impl MockAcme {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_authorization(&self, at: &Url, authorization: Authorization) {
        self.state
            .lock()
            .authorizations
            .insert(at.clone(), authorization);
    }

    pub fn script_challenge(&self, at: &Url, statuses: &[ChallengeStatus]) {
        self.state
            .lock()
            .challenge_statuses
            .insert(at.clone(), statuses.iter().copied().collect());
    }

    pub fn script_order(&self, at: &Url, orders: Vec<Order>) {
        self.state.lock().orders.insert(at.clone(), orders.into());
    }

    pub fn queue_new_order(&self, order: Order) {
        self.state.lock().new_orders.push_back(order);
    }

    pub fn finalize_to(&self, finalize: &Url, order: Order) {
        self.state.lock().finalized.insert(finalize.clone(), order);
    }

    pub fn add_certificate(&self, at: &Url, chain: CertificateChain) {
        self.state.lock().certificates.insert(at.clone(), chain);
    }

    pub fn delay_authorizations(&self, delay: Duration) {
        *self.authorization_delay.lock() = delay;
    }
}

#[async_trait]
impl AcmeApi for MockAcme {
    async fn get_authorization(
        &self,
        url: &Url,
        _key: &AccountKey,
    ) -> Result<Authorization, AcmeClientError> {
        self.calls.get_authorization.fetch_add(1, Ordering::SeqCst);
        let delay = *self.authorization_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.state
            .lock()
            .authorizations
            .get(url)
            .cloned()
            .ok_or_else(|| not_found(url))
    }

    async fn validate_challenge(
        &self,
        url: &Url,
        _key: &AccountKey,
    ) -> Result<Challenge, AcmeClientError> {
        self.calls.validate_challenge.fetch_add(1, Ordering::SeqCst);
        Ok(Challenge::new(
            ChallengeKind::Http01,
            ChallengeStatus::Processing,
            url.clone(),
            None,
        ))
    }

    async fn get_challenge(
        &self,
        url: &Url,
        _key: &AccountKey,
    ) -> Result<Challenge, AcmeClientError> {
        self.calls.get_challenge.fetch_add(1, Ordering::SeqCst);
        let status = self
            .state
            .lock()
            .challenge_statuses
            .get_mut(url)
            .and_then(next_scripted)
            .unwrap_or(ChallengeStatus::Pending);
        Ok(Challenge::new(ChallengeKind::Http01, status, url.clone(), None))
    }

    async fn new_order(
        &self,
        _request: &NewOrderRequest,
        _key: &AccountKey,
    ) -> Result<Order, AcmeClientError> {
        self.calls.new_order.fetch_add(1, Ordering::SeqCst);
        let target = url("/acme/new-order");
        self.state
            .lock()
            .new_orders
            .pop_front()
            .ok_or_else(|| not_found(&target))
    }

    async fn get_order(&self, url: &Url, _key: &AccountKey) -> Result<Order, AcmeClientError> {
        self.calls.get_order.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .orders
            .get_mut(url)
            .and_then(next_scripted)
            .ok_or_else(|| not_found(url))
    }

    async fn finalize_order(
        &self,
        finalize_url: &Url,
        request: &FinalizeRequest,
        _key: &AccountKey,
    ) -> Result<Order, AcmeClientError> {
        self.calls.finalize_order.fetch_add(1, Ordering::SeqCst);
        assert!(!request.csr.is_empty());
        self.state
            .lock()
            .finalized
            .get(finalize_url)
            .cloned()
            .ok_or_else(|| not_found(finalize_url))
    }

    async fn download_certificate(
        &self,
        url: &Url,
        _key: &AccountKey,
    ) -> Result<CertificateChain, AcmeClientError> {
        self.calls.download_certificate.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .certificates
            .get(url)
            .cloned()
            .ok_or_else(|| not_found(url))
    }
}

pub fn services(production: &Arc<MockAcme>, staging: &Arc<MockAcme>) -> AcmeServices {
    AcmeServices::new(
        Arc::clone(production) as Arc<dyn AcmeApi>,
        Arc::clone(staging) as Arc<dyn AcmeApi>,
    )
}

/// Çağrıları kaydeden, istenirse hazırlığı başarısız kılan sağlayıcı.
#[derive(Default)]
pub struct RecordingProvider {
    pub provisioned: Mutex<Vec<String>>,
    pub deprovisions: AtomicUsize,
    pub fail_provision: bool,
    pub fail_deprovision: bool,
}

impl RecordingProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_provision: true,
            ..Self::default()
        })
    }

    pub fn provisioned(&self) -> Vec<String> {
        self.provisioned.lock().clone()
    }

    pub fn deprovisions(&self) -> usize {
        self.deprovisions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChallengeProvider for RecordingProvider {
    async fn provision(
        &self,
        _identifier: &OrderIdentifier,
        token: &str,
        _key: &AccountKey,
    ) -> Result<(), ProviderError> {
        if self.fail_provision {
            return Err(ProviderError::backend("recording", "kayıt reddedildi"));
        }
        self.provisioned.lock().push(token.to_owned());
        Ok(())
    }

    async fn deprovision(
        &self,
        _identifier: &OrderIdentifier,
        _token: &str,
        _key: &AccountKey,
    ) -> Result<(), ProviderError> {
        self.deprovisions.fetch_add(1, Ordering::SeqCst);
        if self.fail_deprovision {
            return Err(ProviderError::backend("recording", "silme başarısız"));
        }
        Ok(())
    }
}

#[derive(Default)]
struct StoreState {
    certificates: HashMap<i64, CertificateRecord>,
    orders: HashMap<i64, OrderRecord>,
    statuses: HashMap<i64, Vec<OrderStatus>>,
    invalid: HashSet<i64>,
    saved: HashMap<i64, CertificateChain>,
    processed: Vec<i64>,
    managed: Vec<ManagedCertificate>,
    next_order_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_certificate(&self, record: CertificateRecord) {
        self.state.lock().certificates.insert(record.id, record);
    }

    pub fn add_order(&self, record: OrderRecord) {
        let mut state = self.state.lock();
        state.next_order_id = state.next_order_id.max(record.id);
        state.orders.insert(record.id, record);
    }

    pub fn add_managed(&self, certificate: ManagedCertificate) {
        self.state.lock().managed.push(certificate);
    }

    pub fn statuses(&self, order_id: i64) -> Vec<OrderStatus> {
        self.state
            .lock()
            .statuses
            .get(&order_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_invalid(&self, order_id: i64) -> bool {
        self.state.lock().invalid.contains(&order_id)
    }

    pub fn saved(&self, order_id: i64) -> Option<CertificateChain> {
        self.state.lock().saved.get(&order_id).cloned()
    }

    pub fn saved_count(&self) -> usize {
        self.state.lock().saved.len()
    }

    pub fn order_count(&self) -> usize {
        self.state.lock().orders.len()
    }

    /// İlk durum güncellemesinin geliş sırasına göre order kimlikleri.
    pub fn processed(&self) -> Vec<i64> {
        self.state.lock().processed.clone()
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn certificate(&self, certificate_id: i64) -> Result<CertificateRecord, StoreError> {
        self.state
            .lock()
            .certificates
            .get(&certificate_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "certificate",
                id: certificate_id,
            })
    }

    async fn order(&self, order_id: i64) -> Result<OrderRecord, StoreError> {
        self.state
            .lock()
            .orders
            .get(&order_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "order",
                id: order_id,
            })
    }

    async fn insert_order(&self, certificate_id: i64, order: &Order) -> Result<i64, StoreError> {
        let location = order
            .location()
            .cloned()
            .ok_or_else(|| StoreError::backend("order konumu yok"))?;
        let mut state = self.state.lock();
        state.next_order_id += 1;
        let id = state.next_order_id;
        state.orders.insert(
            id,
            OrderRecord {
                id,
                certificate_id,
                location,
            },
        );
        Ok(id)
    }

    async fn update_order(&self, order_id: i64, order: &Order) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if !state.statuses.contains_key(&order_id) {
            state.processed.push(order_id);
        }
        state
            .statuses
            .entry(order_id)
            .or_default()
            .push(order.status());
        Ok(())
    }

    async fn mark_order_invalid(&self, order_id: i64) -> Result<(), StoreError> {
        self.state.lock().invalid.insert(order_id);
        Ok(())
    }

    async fn save_certificate(
        &self,
        order_id: i64,
        chain: &CertificateChain,
    ) -> Result<(), StoreError> {
        self.state.lock().saved.insert(order_id, chain.clone());
        Ok(())
    }

    async fn managed_certificates(&self) -> Result<Vec<ManagedCertificate>, StoreError> {
        Ok(self.state.lock().managed.clone())
    }
}

pub fn certificate_record(id: i64, names: &[&str], environment: AcmeEnvironment) -> CertificateRecord {
    CertificateRecord {
        id,
        name: format!("sertifika-{id}"),
        identifiers: names.iter().map(|name| (*name).to_owned()).collect(),
        account_key: account_key(7),
        challenge_method: ChallengeMethod::http01_internal(),
        environment,
        csr_der: vec![0x30, 0x82, 0x01, 0x0a],
    }
}

/// `acme` üzerinde bir order için tam başarılı akışı kurar: bekleyen tek bir
/// http-01 authorization'ı; işlemeden sonra ready, finalize sonrası processing, ardından valid.
pub fn script_issuance(acme: &MockAcme, order_path: &str, name: &str) -> Url {
    let location = url(order_path);
    let authz = url(&format!("{order_path}/authz"));
    let chal = url(&format!("{order_path}/chal"));
    let finalize = url(&format!("{order_path}/finalize"));
    let cert = url(&format!("{order_path}/cert"));

    acme.add_authorization(
        &authz,
        pending_authorization(name, vec![http01("dG9rZW4", chal.path())]),
    );
    acme.script_challenge(&chal, &[ChallengeStatus::Valid]);
    let order = |status| Order::new(status, vec![authz.clone()], finalize.clone());
    acme.script_order(
        &location,
        vec![
            order(OrderStatus::Pending),
            order(OrderStatus::Ready),
            order(OrderStatus::Valid).with_certificate(cert.clone()),
        ],
    );
    acme.finalize_to(&finalize, order(OrderStatus::Processing));
    acme.add_certificate(&cert, CertificateChain::new(vec![LEAF_PEM.to_owned()]).unwrap());
    location
}
