//! Order işleme: yüksek ve düşük öncelikli iki kuyruktan beslenen sabit
//! sayıda işçi, bir order'ın aynı anda iki işçide yürümesini önleyen süreç
//! içi takipçi ve günlük yenileme zamanlayıcısı.

mod pipeline;
mod scheduler;
mod store;

use std::sync::Arc;

use certhub_acme::renewal::RenewalJob;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use self::pipeline::OrderPipeline;
use self::store::StoreInventory;
use crate::authorizations::AuthorizationFulfiller;
use crate::challenges::PollPolicy;
use crate::environment::AcmeServices;
use crate::singleflight::SingleFlight;

pub use pipeline::{OrderJobError, OrderOutcome};
pub use scheduler::{next_run_after, next_run_delay, RenewalSchedule};
pub use store::{CertificateRecord, OrderRecord, OrderStore, StoreError};

type JobResult = Result<OrderOutcome, OrderJobError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Etkileşimli istekler.
    High,
    /// Arka plan yenilemeleri.
    Low,
}

#[derive(Debug)]
struct OrderJob {
    order_id: i64,
    reply: oneshot::Sender<JobResult>,
}

/// Kuyruğa alınmış order işinin tutamacı.
#[derive(Debug)]
pub struct JobTicket {
    order_id: i64,
    reply: oneshot::Receiver<JobResult>,
}

impl JobTicket {
    #[must_use]
    pub const fn order_id(&self) -> i64 {
        self.order_id
    }

    /// İşin bitmesini bekler.
    ///
    /// # Errors
    ///
    /// İşin hatası; işçi yanıt vermeden durduysa
    /// [`OrderJobError::Cancelled`].
    pub async fn outcome(self) -> JobResult {
        self.reply.await.unwrap_or(Err(OrderJobError::Cancelled))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub workers: usize,
    pub queue_capacity: usize,
    /// Order sunucuda `pending` veya `processing` iken yoklama politikası.
    pub poll: PollPolicy,
    /// `None` otomatik yenilemeyi kapatır.
    pub renewal: Option<RenewalSchedule>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            workers: 3,
            queue_capacity: 64,
            poll: PollPolicy::default(),
            renewal: None,
        }
    }
}

/// Order işlerini kuyruğa alır; klonlaması ucuzdur.
#[derive(Clone)]
pub struct OrderSubmitter {
    pipeline: Arc<OrderPipeline>,
    high: mpsc::Sender<OrderJob>,
    low: mpsc::Sender<OrderJob>,
}

impl OrderSubmitter {
    /// Yönetilen sertifika için order oluşturur ve kuyruğa alır.
    ///
    /// # Errors
    ///
    /// Order oluşturulurken depo veya ACME hataları ya da
    /// [`OrderJobError::QueueClosed`].
    pub async fn place_new_order(
        &self,
        certificate_id: i64,
        priority: Priority,
    ) -> Result<JobTicket, OrderJobError> {
        let order_id = self.pipeline.place_new_order(certificate_id).await?;
        self.submit(order_id, priority).await
    }

    /// Var olan bir order'ı kuyruğa alır.
    ///
    /// # Errors
    ///
    /// İşçiler durduysa [`OrderJobError::QueueClosed`].
    pub async fn submit(&self, order_id: i64, priority: Priority) -> Result<JobTicket, OrderJobError> {
        let (reply, receiver) = oneshot::channel();
        let queue = match priority {
            Priority::High => &self.high,
            Priority::Low => &self.low,
        };
        queue
            .send(OrderJob { order_id, reply })
            .await
            .map_err(|_| OrderJobError::QueueClosed)?;
        debug!(order_id, ?priority, "order işi kuyruğa alındı");
        Ok(JobTicket {
            order_id,
            reply: receiver,
        })
    }
}

impl std::fmt::Debug for OrderSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderSubmitter").finish_non_exhaustive()
    }
}

struct JobQueues {
    high: mpsc::Receiver<OrderJob>,
    low: mpsc::Receiver<OrderJob>,
}

/// Çalışan işçi havuzu ve yenileme zamanlayıcısı.
#[derive(Debug)]
pub struct OrderOrchestrator {
    submitter: OrderSubmitter,
    tracker: Arc<SingleFlight<i64, OrderOutcome>>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl OrderOrchestrator {
    /// İşçileri ve `settings.renewal` tanımlıysa zamanlayıcıyı başlatır.
    /// Bir tokio çalışma zamanı içinde çağrılmalıdır.
    #[must_use]
    pub fn start(
        store: Arc<dyn OrderStore>,
        services: AcmeServices,
        fulfiller: AuthorizationFulfiller,
        settings: OrchestratorSettings,
        shutdown: CancellationToken,
    ) -> Self {
        let capacity = settings.queue_capacity.max(1);
        let (high_tx, high_rx) = mpsc::channel(capacity);
        let (low_tx, low_rx) = mpsc::channel(capacity);
        let pipeline = Arc::new(OrderPipeline::new(
            store,
            services,
            fulfiller,
            settings.poll,
            shutdown.clone(),
        ));
        let queues = Arc::new(Mutex::new(JobQueues {
            high: high_rx,
            low: low_rx,
        }));
        let tracker = Arc::new(SingleFlight::new());
        let submitter = OrderSubmitter {
            pipeline: Arc::clone(&pipeline),
            high: high_tx,
            low: low_tx,
        };

        let workers = settings.workers.max(1);
        let mut tasks = Vec::with_capacity(workers + 1);
        for worker in 0..workers {
            tasks.push(tokio::spawn(run_worker(
                worker,
                Arc::clone(&queues),
                Arc::clone(&pipeline),
                Arc::clone(&tracker),
                shutdown.clone(),
            )));
        }
        if let Some(schedule) = settings.renewal {
            let job = RenewalJob::new(
                StoreInventory::new(Arc::clone(pipeline.store())),
                schedule.threshold(),
            );
            tasks.push(tokio::spawn(scheduler::run_renewal_scheduler(
                job,
                schedule,
                submitter.clone(),
                shutdown.clone(),
            )));
        }
        info!(
            workers,
            queue_capacity = capacity,
            renewal = settings.renewal.is_some(),
            "order orkestratörü başlatıldı"
        );

        Self {
            submitter,
            tracker,
            shutdown,
            tasks,
        }
    }

    #[must_use]
    pub fn submitter(&self) -> OrderSubmitter {
        self.submitter.clone()
    }

    /// Bkz. [`OrderSubmitter::place_new_order`].
    ///
    /// # Errors
    ///
    /// [`OrderSubmitter::place_new_order`] ile aynı.
    pub async fn place_new_order(
        &self,
        certificate_id: i64,
        priority: Priority,
    ) -> Result<JobTicket, OrderJobError> {
        self.submitter.place_new_order(certificate_id, priority).await
    }

    /// Bkz. [`OrderSubmitter::submit`].
    ///
    /// # Errors
    ///
    /// [`OrderSubmitter::submit`] ile aynı.
    pub async fn submit(&self, order_id: i64, priority: Priority) -> Result<JobTicket, OrderJobError> {
        self.submitter.submit(order_id, priority).await
    }

    /// Şu anda bir işçide yürüyen order sayısı.
    #[must_use]
    pub fn in_process(&self) -> usize {
        self.tracker.in_flight()
    }

    /// Kapatma sinyali verir; işçilerin ve zamanlayıcının durmasını bekler.
    /// Kuyrukta bekleyen işler atılır; tutamaçları
    /// [`OrderJobError::Cancelled`] ile sonuçlanır.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for task in self.tasks {
            if let Err(err) = task.await {
                error!(error = %err, "order görevi düzgün sonlanmadı");
            }
        }
        info!("order orkestratörü durdu");
    }
}

async fn run_worker(
    worker: usize,
    queues: Arc<Mutex<JobQueues>>,
    pipeline: Arc<OrderPipeline>,
    tracker: Arc<SingleFlight<i64, OrderOutcome>>,
    shutdown: CancellationToken,
) {
    debug!(worker, "order işçisi başladı");
    loop {
        let job = {
            let mut guard = queues.lock().await;
            let JobQueues { high, low } = &mut *guard;
            tokio::select! {
                biased;
                () = shutdown.cancelled() => None,
                Some(job) = high.recv() => Some(job),
                Some(job) = low.recv() => Some(job),
            }
        };
        let Some(OrderJob { order_id, reply }) = job else {
            break;
        };

        if tracker.is_in_flight(&order_id) {
            debug!(worker, order_id, "order zaten işleniyor; mevcut iş bekleniyor");
        }
        let result = tracker
            .run(order_id, || pipeline.process(order_id))
            .await;
        match &result {
            Ok(outcome) => info!(worker, order_id, ?outcome, "order işi tamamlandı"),
            Err(err) => error!(worker, order_id, error = %err, "order işi başarısız"),
        }
        if reply.send(result).is_err() {
            debug!(order_id, "order sonucu için bekleyen yok");
        }
    }
    debug!(worker, "order işçisi durdu");
}
