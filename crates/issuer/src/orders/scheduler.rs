use std::time::Duration as StdDuration;

use certhub_acme::renewal::{RenewalCandidate, RenewalJob, RenewalJobError};
use time::{Duration, OffsetDateTime, Time, UtcOffset};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::store::{StoreError, StoreInventory};
use super::{OrderSubmitter, Priority};

/// Günlük yenileme taraması saati (UTC) ve bitiş penceresi.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalSchedule {
    at: Time,
    threshold: Duration,
}

impl RenewalSchedule {
    /// # Errors
    ///
    /// `hour` veya `minute` aralık dışındaysa hata döner.
    pub fn daily_at(
        hour: u8,
        minute: u8,
        threshold: Duration,
    ) -> Result<Self, time::error::ComponentRange> {
        Ok(Self {
            at: Time::from_hms(hour, minute, 0)?,
            threshold,
        })
    }

    #[must_use]
    pub const fn at(&self) -> Time {
        self.at
    }

    #[must_use]
    pub const fn threshold(&self) -> Duration {
        self.threshold
    }
}

/// `now` anından kesin olarak sonraki ilk UTC `at` zamanı.
#[must_use]
pub fn next_run_after(now: OffsetDateTime, at: Time) -> OffsetDateTime {
    let now = now.to_offset(UtcOffset::UTC);
    let today = now.replace_time(at);
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// `now` ile [`next_run_after`] arasındaki süre. `now` ile çakışan çalışma
/// zamanı ertesi güne planlanır.
#[must_use]
pub fn next_run_delay(now: OffsetDateTime, at: Time) -> Duration {
    next_run_after(now, at) - now
}

pub(crate) async fn run_renewal_scheduler(
    job: RenewalJob<StoreInventory>,
    schedule: RenewalSchedule,
    submitter: OrderSubmitter,
    shutdown: CancellationToken,
) {
    info!(at = %schedule.at(), threshold_days = schedule.threshold().whole_days(), "ACME yenileme zamanlayıcısı başlatıldı");
    let mut next_run = next_run_after(OffsetDateTime::now_utc(), schedule.at());
    loop {
        let delay = next_run - OffsetDateTime::now_utc();
        let sleep = StdDuration::try_from(delay).unwrap_or(StdDuration::ZERO);
        debug!(seconds = sleep.as_secs(), "sonraki yenileme taraması bekleniyor");
        tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            () = tokio::time::sleep(sleep) => {}
        }
        if !execute_scan(&job, &submitter).await {
            break;
        }
        next_run = next_run_after(next_run.max(OffsetDateTime::now_utc()), schedule.at());
    }
    info!("ACME yenileme zamanlayıcısı durdu");
}

async fn execute_scan(job: &RenewalJob<StoreInventory>, submitter: &OrderSubmitter) -> bool {
    match job.scan(OffsetDateTime::now_utc()).await {
        Ok(candidates) => {
            handle_candidates(candidates, submitter).await;
            true
        }
        Err(err) => handle_scan_error(err),
    }
}

fn log_candidate(candidate: &RenewalCandidate) {
    let remaining = candidate.time_until_expiry();
    info!(
        certificate_id = candidate.certificate_id(),
        certificate = candidate.name(),
        expires_at = %candidate.expires_at(),
        remaining_days = remaining.whole_days(),
        remaining_hours = remaining.whole_hours(),
        "ACME sertifikası yenileme eşiğinde"
    );
}

async fn handle_candidates(candidates: Vec<RenewalCandidate>, submitter: &OrderSubmitter) {
    if candidates.is_empty() {
        debug!("ACME yenileme taramasında bekleyen sertifika yok");
        return;
    }
    for candidate in candidates {
        log_candidate(&candidate);
        match submitter
            .place_new_order(candidate.certificate_id(), Priority::Low)
            .await
        {
            Ok(ticket) => debug!(
                certificate_id = candidate.certificate_id(),
                order_id = ticket.order_id(),
                "yenileme order'ı kuyruğa alındı"
            ),
            Err(err) => error!(
                certificate_id = candidate.certificate_id(),
                error = %err,
                "yenileme order'ı oluşturulamadı"
            ),
        }
    }
}

fn handle_scan_error(err: RenewalJobError<StoreError>) -> bool {
    match err {
        RenewalJobError::NegativeThreshold => {
            error!("ACME yenileme eşiği negatif yapılandırıldı; zamanlayıcı durduruluyor");
            false
        }
        RenewalJobError::ThresholdOutOfRange => {
            error!("ACME yenileme eşiği tarih aralığını aşıyor; zamanlayıcı durduruluyor");
            false
        }
        RenewalJobError::Inventory(err) => {
            error!(error = %err, "ACME yenileme taraması sırasında envanter okunamadı");
            true
        }
    }
}
