//! Checkpointed, paced collection of travel times for a list of route pairs.
//!
//! Pairs are attempted one at a time through a single page session. Each
//! success is appended to a [`Checkpoint`] that is flushed every few pairs and
//! at the end of the run, so a killed run resumes where it left off and never
//! re-queries a completed pair. A failed pair yields no record and stays
//! pending for the next run.

mod checkpoint;
mod extract;
mod http_page;
mod pacing;
mod session;
mod text;

pub use checkpoint::{Checkpoint, checkpoint_path, open_checkpoint_store};
pub use extract::{CAPTURE_PATTERNS, CapturedResponse, ExtractionMethod, PageSnapshot, extract};
pub use http_page::{HttpBrowser, HttpPage, captured_from_page, snapshot_from_page};
pub use pacing::{Pacer, PacingConfig};
pub use session::{Browser, PageDriver, SessionHandle, SessionState};
pub use text::{DurationText, parse_distance_text, parse_duration_text};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::geo::GeoPoint;
use crate::parser::ExtractedRoute;
use crate::sampler::RoutePair;
use crate::store::KeyValueStore;

pub const DEFAULT_BASE_URL: &str = "https://www.google.com";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectConfig {
    /// Successful pairs between checkpoint flushes.
    pub checkpoint_every: usize,
    /// Give pairs that failed one more attempt at the end of the same run.
    pub retry_failed_in_run: bool,
    pub navigation_timeout_secs: u64,
    pub base_url: String,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            checkpoint_every: 10,
            retry_failed_in_run: false,
            navigation_timeout_secs: 45,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// One successful extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub duration_s: f64,
    pub duration_in_traffic_s: f64,
    pub distance_m: f64,
    #[serde(default)]
    pub duration_text: String,
    #[serde(default)]
    pub distance_text: String,
    pub method: ExtractionMethod,
    pub observed_at: DateTime<Utc>,
}

impl Observation {
    pub fn new(method: ExtractionMethod, route: ExtractedRoute, observed_at: DateTime<Utc>) -> Self {
        Self {
            duration_s: route.duration.value,
            duration_in_traffic_s: route.duration_in_traffic.value,
            distance_m: route.distance.value,
            duration_text: route.duration_in_traffic.text,
            distance_text: route.distance.text,
            method,
            observed_at,
        }
    }

    /// Traffic-aware duration when known, else the typical duration.
    pub fn effective_duration_s(&self) -> f64 {
        if self.duration_in_traffic_s > 0.0 {
            self.duration_in_traffic_s
        } else {
            self.duration_s
        }
    }
}

/// A route pair, its observation and the window it was collected for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(flatten)]
    pub pair: RoutePair,
    pub observation: Observation,
    pub time_period: String,
    pub departure_time: DateTime<FixedOffset>,
}

/// Which window is being collected and the departure it is queried for.
#[derive(Debug, Clone)]
pub struct CollectTarget {
    pub period: String,
    pub departure: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Exhausted,
    Budget,
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectSummary {
    pub period: String,
    pub total_pairs: usize,
    /// Completed by an earlier run.
    pub skipped: usize,
    pub attempted: usize,
    pub succeeded: usize,
    /// Pairs that ended this run without a record.
    pub failed: usize,
    /// Pairs never reached because the run stopped early.
    pub not_reached: usize,
    pub stop_reason: StopReason,
}

pub struct CollectOutcome {
    /// Every record in the checkpoint, earlier runs first.
    pub results: Vec<ResultRecord>,
    pub summary: CollectSummary,
}

/// `{base}/maps/dir/{olat},{olon}/{dlat},{dlon}?departure_time={unix}`
pub fn directions_url(base: &str, origin: GeoPoint, dest: GeoPoint, departure_unix: i64) -> String {
    format!(
        "{}/maps/dir/{},{}/{},{}?departure_time={}",
        base.trim_end_matches('/'),
        origin.lat,
        origin.lon,
        dest.lat,
        dest.lon,
        departure_unix
    )
}

pub struct Collector {
    config: CollectConfig,
    pacer: Pacer,
    session: SessionState,
    stop: Arc<AtomicBool>,
}

/// Mutable state of one `collect` call.
struct Run<'a> {
    target: &'a CollectTarget,
    started: Instant,
    budget: Option<Duration>,
    checkpoint: Checkpoint,
    unflushed: usize,
    attempted: usize,
    succeeded: usize,
}

impl Collector {
    pub fn new(config: CollectConfig, pacer: Pacer) -> Self {
        Self {
            config,
            pacer,
            session: SessionState::Closed,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that ends the run before the next pair when set.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub async fn open<B: Browser + ?Sized>(&mut self, browser: &B) -> Result<()> {
        self.session.open(browser).await
    }

    pub async fn close(&mut self) {
        self.session.close().await;
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// One window in its own session: open, [`Collector::collect`], close.
    /// `budget` applies to this window alone.
    pub async fn collect_window<B, S>(
        &mut self,
        browser: &B,
        pairs: &[RoutePair],
        target: &CollectTarget,
        budget: Option<Duration>,
        store: &mut S,
    ) -> Result<CollectOutcome>
    where
        B: Browser + ?Sized,
        S: KeyValueStore<Checkpoint>,
    {
        self.open(browser).await?;
        let outcome = self.collect(pairs, target, budget, store).await;
        self.close().await;
        outcome
    }

    /// Collects every pair not already in the checkpoint stored under
    /// `target.period`, stopping early once `budget` has elapsed.
    ///
    /// Budget exhaustion and interruption are normal terminations: the
    /// checkpoint is flushed and the partial results returned.
    ///
    /// # Errors
    ///
    /// [`crate::error::Error::SessionClosed`] if no session is open, or a
    /// storage error while flushing the checkpoint.
    #[instrument(skip_all, fields(period = %target.period, pairs = pairs.len()))]
    pub async fn collect<S: KeyValueStore<Checkpoint>>(
        &mut self,
        pairs: &[RoutePair],
        target: &CollectTarget,
        budget: Option<Duration>,
        store: &mut S,
    ) -> Result<CollectOutcome> {
        self.session.handle()?;

        let checkpoint = store.get(&target.period).unwrap_or_default();
        let skipped = (0..pairs.len()).filter(|i| checkpoint.is_complete(*i)).count();
        info!(
            completed = checkpoint.completed.len(),
            results = checkpoint.results.len(),
            departure = %target.departure,
            "Loaded checkpoint"
        );

        let mut run = Run {
            target,
            started: Instant::now(),
            budget,
            checkpoint,
            unflushed: 0,
            attempted: 0,
            succeeded: 0,
        };

        let pending: Vec<usize> = (0..pairs.len()).filter(|i| !run.checkpoint.is_complete(*i)).collect();
        let (mut stop_reason, mut failed) = self.pass(pairs, &pending, &mut run, store).await?;

        if stop_reason == StopReason::Exhausted && self.config.retry_failed_in_run && !failed.is_empty() {
            info!(failed = failed.len(), "Retrying failed pairs");
            let (reason, retried) = self.pass(pairs, &failed, &mut run, store).await?;
            stop_reason = reason;
            debug!(still_failing = retried.len(), "Retry pass finished");
            // pairs the retry pass never reached are still failures
            failed.retain(|i| !run.checkpoint.is_complete(*i));
        }

        store.put(&target.period, run.checkpoint.clone());
        store.flush()?;

        let succeeded = run.succeeded;
        let not_reached = pairs.len().saturating_sub(skipped + succeeded + failed.len());
        let summary = CollectSummary {
            period: target.period.clone(),
            total_pairs: pairs.len(),
            skipped,
            attempted: run.attempted,
            succeeded,
            failed: failed.len(),
            not_reached,
            stop_reason,
        };
        info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            not_reached = summary.not_reached,
            ?stop_reason,
            "Collection finished"
        );

        Ok(CollectOutcome {
            results: run.checkpoint.results,
            summary,
        })
    }

    /// Attempts `indices` in order; returns why the pass ended and the
    /// indices that failed.
    async fn pass<S: KeyValueStore<Checkpoint>>(
        &mut self,
        pairs: &[RoutePair],
        indices: &[usize],
        run: &mut Run<'_>,
        store: &mut S,
    ) -> Result<(StopReason, Vec<usize>)> {
        let mut failed = Vec::new();

        for &i in indices {
            if self.stop.load(Ordering::SeqCst) {
                info!("Stop requested");
                return Ok((StopReason::Interrupted, failed));
            }
            if let Some(budget) = run.budget {
                if run.started.elapsed() >= budget {
                    info!(elapsed = ?run.started.elapsed(), "Time budget reached");
                    return Ok((StopReason::Budget, failed));
                }
            }

            run.attempted += 1;
            match self.attempt(&pairs[i], run.target).await? {
                Some(observation) => {
                    run.checkpoint.record(
                        i,
                        ResultRecord {
                            pair: pairs[i].clone(),
                            observation,
                            time_period: run.target.period.clone(),
                            departure_time: run.target.departure,
                        },
                    );
                    run.succeeded += 1;
                    run.unflushed += 1;
                    if run.unflushed >= self.config.checkpoint_every.max(1) {
                        store.put(&run.target.period, run.checkpoint.clone());
                        store.flush()?;
                        run.unflushed = 0;
                        info!(completed = run.checkpoint.completed.len(), "Saved checkpoint");
                    }
                    self.pacer.pause().await;
                }
                None => failed.push(i),
            }

            if run.attempted % 10 == 0 {
                info!(
                    attempted = run.attempted,
                    completed = run.checkpoint.completed.len(),
                    failed = failed.len(),
                    total = pairs.len(),
                    "Collection progress"
                );
            }
        }

        Ok((StopReason::Exhausted, failed))
    }

    async fn attempt(&mut self, pair: &RoutePair, target: &CollectTarget) -> Result<Option<Observation>> {
        let url = directions_url(
            &self.config.base_url,
            pair.origin,
            pair.destination,
            target.departure.timestamp(),
        );
        let timeout = Duration::from_secs(self.config.navigation_timeout_secs);
        let handle = self.session.handle()?;

        let snapshot = match handle.load(&url, timeout).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(url = %url, error = %e, "Navigation failed");
                return Ok(None);
            }
        };

        match extract(&snapshot) {
            Some((method, route)) => Ok(Some(Observation::new(method, route, Utc::now()))),
            None => {
                warn!(url = %url, "No extraction strategy produced a route");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::rng::SamplerRng;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const LEG: &str = r#"{"routes":[{"legs":[{"duration":{"text":"30 min","value":1800},"distance":{"text":"18 km","value":18000}}]}]}"#;

    /// Serves a fixed leg for every URL. A URL containing a key of `failures`
    /// fails that many times before it starts succeeding.
    #[derive(Clone, Default)]
    struct FakeBrowser {
        failures: Arc<Mutex<HashMap<String, usize>>>,
        latency: Duration,
        visited: Arc<Mutex<Vec<String>>>,
    }

    impl FakeBrowser {
        fn fail(&self, url_fragment: &str, times: usize) {
            self.failures.lock().unwrap().insert(url_fragment.to_string(), times);
        }

        fn visits(&self) -> usize {
            self.visited.lock().unwrap().len()
        }
    }

    struct FakePage {
        browser: FakeBrowser,
        captured: Vec<CapturedResponse>,
    }

    #[async_trait]
    impl Browser for FakeBrowser {
        async fn launch(&self) -> anyhow::Result<Box<dyn PageDriver>> {
            Ok(Box::new(FakePage {
                browser: self.clone(),
                captured: Vec::new(),
            }))
        }
    }

    #[async_trait]
    impl PageDriver for FakePage {
        async fn navigate(&mut self, url: &str, _timeout: Duration) -> anyhow::Result<PageSnapshot> {
            tokio::time::sleep(self.browser.latency).await;
            self.browser.visited.lock().unwrap().push(url.to_string());
            {
                let mut failures = self.browser.failures.lock().unwrap();
                if let Some(left) = failures
                    .iter_mut()
                    .find_map(|(fragment, left)| (url.contains(fragment.as_str()) && *left > 0).then_some(left))
                {
                    *left -= 1;
                    anyhow::bail!("net::ERR_TIMED_OUT");
                }
            }
            self.captured.push(CapturedResponse {
                url: format!("{url}&rbt"),
                body: LEG.into(),
            });
            Ok(PageSnapshot {
                url: url.to_string(),
                captured: self.captured.clone(),
                ..Default::default()
            })
        }

        fn clear_captured(&mut self) {
            self.captured.clear();
        }

        async fn shutdown(self: Box<Self>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    /// Pair `i` starts at latitude `-6.0 - i/100`, e.g. `-6.02` for pair 2.
    fn pairs(n: usize) -> Vec<RoutePair> {
        (0..n)
            .map(|i| {
                RoutePair::new(
                    i as u64,
                    GeoPoint::new(-6.0 - i as f64 / 100.0, 106.8),
                    1000 + i as u64,
                    GeoPoint::new(-6.5, 106.9),
                )
            })
            .collect()
    }

    fn target() -> CollectTarget {
        CollectTarget {
            period: "peak_am".into(),
            departure: DateTime::parse_from_rfc3339("2024-03-04T07:00:00+07:00").unwrap(),
        }
    }

    fn collector(config: CollectConfig) -> Collector {
        let pacing = PacingConfig {
            min_seconds: 1.0,
            max_seconds: 1.0,
        };
        Collector::new(config, Pacer::new(pacing, SamplerRng::new(7)))
    }

    #[test]
    fn test_directions_url() {
        let url = directions_url(
            "https://www.google.com/",
            GeoPoint::new(-6.2, 106.8),
            GeoPoint::new(-6.3, 106.85),
            1_709_510_400,
        );
        assert_eq!(
            url,
            "https://www.google.com/maps/dir/-6.2,106.8/-6.3,106.85?departure_time=1709510400"
        );
    }

    #[tokio::test]
    async fn test_collect_requires_open_session() {
        let mut collector = collector(CollectConfig::default());
        let mut store = MemoryStore::new();
        let err = collector.collect(&pairs(2), &target(), None, &mut store).await;
        assert!(matches!(err, Err(Error::SessionClosed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_all_and_flush_periodically() {
        let browser = FakeBrowser::default();
        let mut collector = collector(CollectConfig {
            checkpoint_every: 2,
            ..Default::default()
        });
        collector.open(&browser).await.unwrap();
        let mut store = MemoryStore::new();

        let outcome = collector.collect(&pairs(5), &target(), None, &mut store).await.unwrap();

        assert_eq!(outcome.results.len(), 5);
        assert_eq!(outcome.summary.succeeded, 5);
        assert_eq!(outcome.summary.stop_reason, StopReason::Exhausted);
        // two periodic flushes plus the final one
        assert_eq!(store.flushes, 3);
        assert_eq!(store.get("peak_am").unwrap().completed.len(), 5);

        let record = &outcome.results[0];
        assert_eq!(record.observation.method, ExtractionMethod::CapturedResponse);
        assert_eq!(record.observation.effective_duration_s(), 1800.0);
        assert_eq!(record.time_period, "peak_am");
        assert_eq!(record.departure_time, target().departure);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_skips_completed_and_keeps_prior_results() {
        let browser = FakeBrowser::default();
        browser.fail("/-6.02,", 1);
        browser.fail("/-6.03,", 1);
        let mut collector = collector(CollectConfig::default());
        collector.open(&browser).await.unwrap();
        let mut store = MemoryStore::new();
        let all = pairs(5);

        let first = collector.collect(&all, &target(), None, &mut store).await.unwrap();
        assert_eq!(first.summary.succeeded, 3);
        assert_eq!(first.summary.failed, 2);
        assert_eq!(browser.visits(), 5);
        let prior = first.results.clone();

        let second = collector.collect(&all, &target(), None, &mut store).await.unwrap();

        assert_eq!(second.summary.skipped, 3);
        assert_eq!(second.summary.attempted, 2);
        assert_eq!(browser.visits(), 7);
        assert_eq!(&second.results[..prior.len()], &prior[..]);
        let completed = &store.get("peak_am").unwrap().completed;
        assert_eq!(completed.iter().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_pair_waits_for_next_run_by_default() {
        let browser = FakeBrowser::default();
        browser.fail("/-6.01,", 1);
        let mut collector = collector(CollectConfig::default());
        collector.open(&browser).await.unwrap();
        let mut store = MemoryStore::new();

        let outcome = collector.collect(&pairs(3), &target(), None, &mut store).await.unwrap();

        assert_eq!(outcome.summary.attempted, 3);
        assert_eq!(outcome.summary.failed, 1);
        assert!(!store.get("peak_am").unwrap().is_complete(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_pairs_retried_in_run_when_enabled() {
        let browser = FakeBrowser::default();
        browser.fail("/-6.01,", 1);
        let mut collector = collector(CollectConfig {
            retry_failed_in_run: true,
            ..Default::default()
        });
        collector.open(&browser).await.unwrap();
        let mut store = MemoryStore::new();

        let outcome = collector.collect(&pairs(3), &target(), None, &mut store).await.unwrap();

        assert_eq!(outcome.summary.attempted, 4);
        assert_eq!(outcome.summary.succeeded, 3);
        assert_eq!(outcome.summary.failed, 0);
        // the retried pair lands last
        assert_eq!(outcome.results[2].pair.origin_node, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_cut_short_keeps_unretried_pairs_failed() {
        let browser = FakeBrowser {
            latency: Duration::from_secs(4),
            ..Default::default()
        };
        browser.fail("/-6,", 5);
        browser.fail("/-6.01,", 5);
        let mut collector = collector(CollectConfig {
            retry_failed_in_run: true,
            ..Default::default()
        });
        collector.open(&browser).await.unwrap();
        let mut store = MemoryStore::new();

        // first pass ends at 13s; the retry pass gets one pair in before 14s
        let outcome = collector
            .collect(&pairs(3), &target(), Some(Duration::from_secs(14)), &mut store)
            .await
            .unwrap();

        assert_eq!(outcome.summary.stop_reason, StopReason::Budget);
        assert_eq!(outcome.summary.attempted, 4);
        assert_eq!(outcome.summary.succeeded, 1);
        assert_eq!(outcome.summary.failed, 2);
        assert_eq!(outcome.summary.not_reached, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_window_gets_the_full_budget() {
        let browser = FakeBrowser {
            latency: Duration::from_secs(4),
            ..Default::default()
        };
        let mut collector = collector(CollectConfig::default());
        let budget = Some(Duration::from_secs(12));
        let evening = CollectTarget {
            period: "peak_pm".into(),
            departure: DateTime::parse_from_rfc3339("2024-03-04T17:00:00+07:00").unwrap(),
        };
        let mut store = MemoryStore::new();

        let morning = collector
            .collect_window(&browser, &pairs(10), &target(), budget, &mut store)
            .await
            .unwrap();
        let evening = collector
            .collect_window(&browser, &pairs(10), &evening, budget, &mut store)
            .await
            .unwrap();

        assert_eq!(morning.summary.succeeded, 3);
        assert_eq!(evening.summary.succeeded, 3);
        assert_eq!(evening.summary.stop_reason, StopReason::Budget);
        assert_eq!(store.get("peak_pm").unwrap().results.len(), 3);
        assert!(!collector.session.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_stops_between_pairs() {
        let browser = FakeBrowser {
            latency: Duration::from_secs(4),
            ..Default::default()
        };
        let mut collector = collector(CollectConfig::default());
        collector.open(&browser).await.unwrap();
        let mut store = MemoryStore::new();

        let started = Instant::now();
        let budget = Duration::from_secs(12);
        let outcome = collector
            .collect(&pairs(10), &target(), Some(budget), &mut store)
            .await
            .unwrap();

        // each pair takes 4s navigation plus 1s pacing
        let per_pair = Duration::from_secs(5);
        assert!(started.elapsed() <= budget + per_pair);
        assert_eq!(outcome.summary.stop_reason, StopReason::Budget);
        assert_eq!(outcome.summary.succeeded, 3);
        assert_eq!(outcome.summary.not_reached, 7);
        assert_eq!(store.get("peak_am").unwrap().results.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_flag_ends_run_with_checkpoint() {
        let browser = FakeBrowser::default();
        let mut collector = collector(CollectConfig::default());
        collector.open(&browser).await.unwrap();
        collector.stop_handle().store(true, Ordering::SeqCst);
        let mut store = MemoryStore::new();

        let outcome = collector.collect(&pairs(4), &target(), None, &mut store).await.unwrap();

        assert_eq!(outcome.summary.stop_reason, StopReason::Interrupted);
        assert_eq!(outcome.summary.attempted, 0);
        assert_eq!(outcome.summary.not_reached, 4);
        assert_eq!(store.flushes, 1);

        collector.close().await;
        let err = collector.collect(&pairs(1), &target(), None, &mut store).await;
        assert!(matches!(err, Err(Error::SessionClosed)));
    }
}
