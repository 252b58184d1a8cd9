use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

use crate::config::{is_valid_cron, SchedulerConfig};
use crate::engine::{PriceRefreshEngine, RefreshResult};
use crate::notify::fanout::NotificationFanout;
use crate::store::ProductStore;
use crate::{AppError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub products_checked: usize,
    pub updated: usize,
    pub fetch_failures: usize,
    pub extraction_failures: usize,
    pub internal_failures: usize,
    pub events_emitted: usize,
    pub notifications_delivered: usize,
    pub notifications_failed: usize,
}

/// Runs one full pass over all tracked products. Products refresh
/// sequentially to stay polite toward the scraped origin, and each emitted
/// event is fanned out completely before the next product is touched.
pub struct SweepRunner {
    engine: Arc<PriceRefreshEngine>,
    fanout: Arc<NotificationFanout>,
    store: Arc<dyn ProductStore>,
    sweep_lock: Mutex<()>,
}

impl SweepRunner {
    pub fn new(
        engine: Arc<PriceRefreshEngine>,
        fanout: Arc<NotificationFanout>,
        store: Arc<dyn ProductStore>,
    ) -> Self {
        Self {
            engine,
            fanout,
            store,
            sweep_lock: Mutex::new(()),
        }
    }

    /// Returns `None` when a sweep is already in progress; overlapping
    /// sweeps never start.
    pub async fn try_run_sweep(&self) -> Result<Option<SweepReport>> {
        let Ok(_guard) = self.sweep_lock.try_lock() else {
            warn!("sweep already in progress, skipping this trigger");
            return Ok(None);
        };

        let products = self.store.list_products().await?;
        info!(products = products.len(), "starting sweep");

        let mut report = SweepReport::default();
        for product in &products {
            report.products_checked += 1;
            match self.engine.refresh(&product.id).await {
                Ok(RefreshResult::Updated { product, event }) => {
                    report.updated += 1;
                    if let Some(event) = event {
                        report.events_emitted += 1;
                        // All destinations receive every drop notification
                        let destinations = self.store.list_destinations().await?;
                        let delivery = self.fanout.notify(&product, &event, &destinations).await;
                        report.notifications_delivered += delivery.delivered();
                        report.notifications_failed += delivery.failed();
                    }
                }
                Ok(RefreshResult::FetchFailed { .. }) => report.fetch_failures += 1,
                Ok(RefreshResult::ExtractionFailed { .. }) => report.extraction_failures += 1,
                Ok(RefreshResult::NotFound) => {
                    warn!(product_id = %product.id, "product disappeared mid-sweep");
                }
                Err(e) => {
                    warn!(product_id = %product.id, error = %e, "refresh errored, continuing sweep");
                    report.internal_failures += 1;
                }
            }
        }

        info!(
            checked = report.products_checked,
            updated = report.updated,
            events = report.events_emitted,
            fetch_failures = report.fetch_failures,
            extraction_failures = report.extraction_failures,
            "sweep complete"
        );
        Ok(Some(report))
    }
}

/// Periodic driver for sweeps. Owns its scheduler lifecycle; the cron job
/// only triggers the runner, which enforces the no-overlap guard.
pub struct RefreshScheduler {
    scheduler: JobScheduler,
    runner: Arc<SweepRunner>,
    config: SchedulerConfig,
}

impl RefreshScheduler {
    pub async fn new(runner: Arc<SweepRunner>, config: SchedulerConfig) -> Result<Self> {
        if !is_valid_cron(&config.sweep_interval) {
            return Err(AppError::Validation(format!(
                "invalid sweep interval cron expression: {}",
                config.sweep_interval
            )));
        }

        let scheduler = JobScheduler::new().await?;
        Ok(Self {
            scheduler,
            runner,
            config,
        })
    }

    pub async fn start(&self) -> Result<()> {
        let runner = Arc::clone(&self.runner);
        let job = Job::new_async(self.config.sweep_interval.as_str(), move |_uuid, _l| {
            let runner = Arc::clone(&runner);
            Box::pin(async move {
                if let Err(e) = runner.try_run_sweep().await {
                    tracing::error!(error = %e, "scheduled sweep failed");
                }
            })
        })?;

        self.scheduler.add(job).await?;
        self.scheduler.start().await?;
        info!(interval = %self.config.sweep_interval, "refresh scheduler started");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.scheduler.shutdown().await?;
        info!("refresh scheduler shutdown");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::PageFetcher;
    use crate::models::NotificationDestination;
    use crate::notify::transport::NotificationTransport;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::str::FromStr;
    use std::sync::Mutex as StdMutex;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn plain_page(price: &str) -> String {
        format!(
            r#"<html><body>
            <div class="apphub_AppName">Example Game</div>
            <div class="game_purchase_price">{price}</div>
            </body></html>"#
        )
    }

    fn discount_page(original: &str, reduced: &str) -> String {
        format!(
            r#"<html><body>
            <div class="apphub_AppName">Example Game</div>
            <div class="discount_original_price">{original}</div>
            <div class="discount_final_price">{reduced}</div>
            </body></html>"#
        )
    }

    /// Serves pages per URL; unknown URLs behave like a dead origin.
    #[derive(Default)]
    struct MapFetcher {
        pages: StdMutex<HashMap<String, String>>,
    }

    impl MapFetcher {
        fn set(&self, url: &str, page: String) {
            self.pages.lock().unwrap().insert(url.to_string(), page);
        }

        fn remove(&self, url: &str) {
            self.pages.lock().unwrap().remove(url);
        }
    }

    #[async_trait]
    impl PageFetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> crate::Result<String> {
            self.pages
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .ok_or_else(|| AppError::Fetch {
                    url: url.to_string(),
                    message: "connection refused".to_string(),
                })
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        sent: StdMutex<Vec<(NotificationDestination, String)>>,
    }

    #[async_trait]
    impl NotificationTransport for RecordingTransport {
        async fn send(
            &self,
            destination: &NotificationDestination,
            text: &str,
        ) -> crate::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((destination.clone(), text.to_string()));
            Ok(())
        }
    }

    struct Harness {
        store: Arc<MemoryStore>,
        fetcher: Arc<MapFetcher>,
        engine: Arc<PriceRefreshEngine>,
        transport: Arc<RecordingTransport>,
        runner: Arc<SweepRunner>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(MapFetcher::default());
        let engine = Arc::new(PriceRefreshEngine::new(store.clone(), fetcher.clone()));
        let transport = Arc::new(RecordingTransport::default());
        let fanout = Arc::new(NotificationFanout::new(transport.clone()));
        let runner = Arc::new(SweepRunner::new(engine.clone(), fanout, store.clone()));
        Harness {
            store,
            fetcher,
            engine,
            transport,
            runner,
        }
    }

    #[tokio::test]
    async fn test_empty_sweep() {
        let h = harness();
        let report = h.runner.try_run_sweep().await.unwrap().unwrap();
        assert_eq!(report, SweepReport::default());
    }

    #[tokio::test]
    async fn test_sweep_isolates_fetch_failures() {
        let h = harness();
        let urls: Vec<String> = (1..=3)
            .map(|n| format!("https://store.example/app/{n}"))
            .collect();
        for url in &urls {
            h.fetcher.set(url, plain_page("100,00"));
            h.engine.track(url).await.unwrap();
        }

        // Second product's origin goes dark; the others get a discount
        h.fetcher.set(&urls[0], discount_page("100,00", "50,00"));
        h.fetcher.remove(&urls[1]);
        h.fetcher.set(&urls[2], discount_page("100,00", "70,00"));

        h.store
            .add_destination(&NotificationDestination::Flat { chat_id: 1 })
            .await
            .unwrap();

        let report = h.runner.try_run_sweep().await.unwrap().unwrap();
        assert_eq!(report.products_checked, 3);
        assert_eq!(report.updated, 2);
        assert_eq!(report.fetch_failures, 1);
        assert_eq!(report.events_emitted, 2);
        assert_eq!(report.notifications_delivered, 2);

        // First and third products still had their stored state refreshed
        let products = h.store.list_products().await.unwrap();
        assert_eq!(products[0].current_price, dec("50.00"));
        assert_eq!(products[1].current_price, dec("100.00"));
        assert_eq!(products[2].current_price, dec("70.00"));
    }

    #[tokio::test]
    async fn test_sweep_counts_extraction_failures() {
        let h = harness();
        let url = "https://store.example/app/1";
        h.fetcher.set(url, plain_page("100,00"));
        h.engine.track(url).await.unwrap();

        h.fetcher
            .set(url, "<html><body>layout changed</body></html>".to_string());
        let report = h.runner.try_run_sweep().await.unwrap().unwrap();
        assert_eq!(report.extraction_failures, 1);
        assert_eq!(report.updated, 0);
    }

    #[tokio::test]
    async fn test_second_sweep_emits_nothing_new() {
        let h = harness();
        let url = "https://store.example/app/1";
        h.fetcher.set(url, plain_page("100,00"));
        h.engine.track(url).await.unwrap();
        h.store
            .add_destination(&NotificationDestination::Flat { chat_id: 1 })
            .await
            .unwrap();

        h.fetcher.set(url, discount_page("100,00", "80,00"));
        let report = h.runner.try_run_sweep().await.unwrap().unwrap();
        assert_eq!(report.events_emitted, 1);

        let report = h.runner.try_run_sweep().await.unwrap().unwrap();
        assert_eq!(report.events_emitted, 0);
        assert_eq!(h.transport.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_guard_blocks_overlap() {
        let h = harness();
        let _guard = h.runner.sweep_lock.lock().await;

        let result = h.runner.try_run_sweep().await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_scheduler_lifecycle() {
        let h = harness();
        let config = SchedulerConfig {
            sweep_interval: "0 0 3 * * *".to_string(),
        };

        let mut scheduler = RefreshScheduler::new(h.runner.clone(), config).await.unwrap();
        scheduler.start().await.unwrap();
        scheduler.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_scheduler_rejects_bad_cron() {
        let h = harness();
        let config = SchedulerConfig {
            sweep_interval: "whenever".to_string(),
        };

        let result = RefreshScheduler::new(h.runner.clone(), config).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
