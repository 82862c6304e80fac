//! Anahtar bazında kaydol-ya-da-katıl yürütmesi.
//!
//! Bir anahtar için ilk çağıran işin sahibidir; iş sürerken gelenler
//! tamamlanma sinyalini bekler ve başarılı sonucu paylaşır. Başarısız ya da
//! yarıda bırakılan çalışma paylaşılmaz; bekleyenler döngüye girer ve
//! içlerinden biri yeni sahip olur.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;

use parking_lot::Mutex;
use tokio::sync::watch;

#[derive(Debug, Clone)]
enum Flight<T> {
    Running,
    Done(T),
    Failed,
}

enum Registration<T> {
    Owner(watch::Sender<Flight<T>>),
    Joiner(watch::Receiver<Flight<T>>),
}

/// `K` ile anahtarlanan eşzamanlı işlerin süreç içi tekilleştirilmesi.
pub struct SingleFlight<K, T> {
    flights: Mutex<HashMap<K, watch::Receiver<Flight<T>>>>,
}

impl<K, T> Default for SingleFlight<K, T> {
    fn default() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, T> fmt::Debug for SingleFlight<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.flights.lock().len())
            .finish()
    }
}

impl<K, T> SingleFlight<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Üzerinde iş süren anahtar sayısı.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }

    #[must_use]
    pub fn is_in_flight(&self, key: &K) -> bool {
        self.flights.lock().contains_key(key)
    }

    /// Başka bir çağıran yürütmüyorsa `key` için `work` çalıştırır.
    ///
    /// `work`, bu çağıranın kazandığı her kayıt için en fazla bir kez çalışır;
    /// yalnızca katılınan çalışma hatayla bittiyse yeniden çağrılır.
    ///
    /// # Errors
    ///
    /// Çalışmayı bu çağıran yürüttüyse `work` hatasını döndürür.
    pub async fn run<F, Fut, E>(&self, key: K, mut work: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        loop {
            match self.register(&key) {
                Registration::Owner(sender) => {
                    let guard = FlightGuard {
                        flights: &self.flights,
                        key: key.clone(),
                        sender,
                        outcome: None,
                    };
                    let result = work().await;
                    guard.finish(result.as_ref().ok().cloned());
                    return result;
                }
                Registration::Joiner(mut receiver) => {
                    let shared = match receiver
                        .wait_for(|flight| !matches!(flight, Flight::Running))
                        .await
                    {
                        Ok(flight) => match &*flight {
                            Flight::Done(value) => Some(value.clone()),
                            Flight::Running | Flight::Failed => None,
                        },
                        Err(_) => None,
                    };
                    if let Some(value) = shared {
                        return Ok(value);
                    }
                }
            }
        }
    }

    fn register(&self, key: &K) -> Registration<T> {
        let mut flights = self.flights.lock();
        if let Some(receiver) = flights.get(key) {
            return Registration::Joiner(receiver.clone());
        }
        let (sender, receiver) = watch::channel(Flight::Running);
        flights.insert(key.clone(), receiver);
        Registration::Owner(sender)
    }
}

/// Sonucu yayınlar ve anahtarın kaydını siler; sahip future bitmeden
/// düşürülse de çalışır.
struct FlightGuard<'a, K, T>
where
    K: Eq + Hash,
{
    flights: &'a Mutex<HashMap<K, watch::Receiver<Flight<T>>>>,
    key: K,
    sender: watch::Sender<Flight<T>>,
    outcome: Option<T>,
}

impl<K, T> FlightGuard<'_, K, T>
where
    K: Eq + Hash,
{
    fn finish(mut self, value: Option<T>) {
        self.outcome = value;
    }
}

impl<K, T> Drop for FlightGuard<'_, K, T>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        self.flights.lock().remove(&self.key);
        let flight = self.outcome.take().map_or(Flight::Failed, Flight::Done);
        self.sender.send_replace(flight);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_run() {
        let flights = Arc::new(SingleFlight::<&'static str, u32>::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flights = Arc::clone(&flights);
            let runs = Arc::clone(&runs);
            handles.push(tokio::spawn(async move {
                flights
                    .run("authz-1", || {
                        let runs = Arc::clone(&runs);
                        async move {
                            runs.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_secs(5)).await;
                            Ok::<_, String>(42)
                        }
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(42));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn joiner_retries_after_failed_run() {
        let flights = Arc::new(SingleFlight::<u8, &'static str>::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let owner = {
            let flights = Arc::clone(&flights);
            let runs = Arc::clone(&runs);
            tokio::spawn(async move {
                flights
                    .run(1, || {
                        let runs = Arc::clone(&runs);
                        async move {
                            runs.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_secs(1)).await;
                            Err::<&str, _>("geçici hata")
                        }
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        assert!(flights.is_in_flight(&1));

        let joined = flights
            .run(1, || {
                let runs = Arc::clone(&runs);
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, &str>("ikinci deneme")
                }
            })
            .await;

        assert_eq!(owner.await.unwrap(), Err("geçici hata"));
        assert_eq!(joined, Ok("ikinci deneme"));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dropped_owner_releases_key() {
        let flights = SingleFlight::<u8, u8>::new();
        let pending = flights.run(7, || std::future::pending::<Result<u8, ()>>());
        tokio::select! {
            biased;
            _ = pending => unreachable!("pending future never resolves"),
            () = tokio::task::yield_now() => {}
        }
        assert_eq!(flights.in_flight(), 0);

        let value = flights.run(7, || async { Ok::<_, ()>(3) }).await;
        assert_eq!(value, Ok(3));
    }
}
