//! The poll loop.
//!
//! Every tick, each due source is fetched and its watched region
//! fingerprinted. A fingerprint change extracts the latest announcement,
//! classifies it against the last relayed one and hands it to the
//! dispatcher. Sources are processed one after another in configuration
//! order.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::Result;
use crate::models::{Announcement, Config, PollConfig, StateSnapshot, WatchedSource};
use crate::services::{
    ChangeClassifier, ChangeKind, PageDocument, PageFetcher, RetryPolicy, extract,
    fetch_with_retry, fingerprint_region,
};
use crate::storage::StateStore;

use super::dispatch::Dispatcher;

/// Ticks can fire a little late; a source this close to due is polled.
const SCHEDULE_SLACK: Duration = Duration::from_secs(1);

/// What one cycle did with a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    /// First fingerprint recorded, nothing relayed
    Baseline,
    Unchanged,
    /// Relayed to at least one channel
    Relayed {
        kind: ChangeKind,
        delivered: usize,
        failed: usize,
    },
    /// No channel accepted the change; it is retried next cycle
    Undelivered { kind: ChangeKind },
    /// The page lacks the watched elements
    Missing,
    /// Its interval has not elapsed yet
    NotDue,
    /// Another source was relayed first in this cycle
    Skipped,
}

/// Outcome of every source in one cycle, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub outcomes: Vec<(String, SourceOutcome)>,
}

impl CycleReport {
    pub fn outcome(&self, source_id: &str) -> Option<&SourceOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == source_id)
            .map(|(_, outcome)| outcome)
    }

    /// Number of sources relayed this cycle.
    pub fn relayed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, SourceOutcome::Relayed { .. }))
            .count()
    }
}

/// Result of looking at a fetched page, computed before any await so the
/// parsed document never lives across one.
enum Inspection {
    RegionMissing,
    Baseline(String),
    Unchanged,
    Changed {
        fingerprint: String,
        announcement: Announcement,
    },
}

fn inspect(source: &WatchedSource, body: &str, last: Option<&str>) -> Result<Inspection> {
    let document = PageDocument::parse(&source.url, body)?;
    let Some(fingerprint) = fingerprint_region(&document, &source.region)? else {
        return Ok(Inspection::RegionMissing);
    };
    match last {
        None => Ok(Inspection::Baseline(fingerprint)),
        Some(last) if last == fingerprint => Ok(Inspection::Unchanged),
        Some(_) => Ok(Inspection::Changed {
            announcement: extract(source, &document)?,
            fingerprint,
        }),
    }
}

pub struct PollLoop {
    sources: Vec<WatchedSource>,
    poll: PollConfig,
    fetcher: Box<dyn PageFetcher>,
    retry: RetryPolicy,
    classifier: ChangeClassifier,
    dispatcher: Dispatcher,
    store: Box<dyn StateStore>,
    state: StateSnapshot,
    last_polled: HashMap<String, Instant>,
}

impl PollLoop {
    pub fn new(
        config: &Config,
        fetcher: Box<dyn PageFetcher>,
        dispatcher: Dispatcher,
        store: Box<dyn StateStore>,
    ) -> Self {
        Self {
            sources: config.sources.clone(),
            poll: config.poll.clone(),
            fetcher,
            retry: RetryPolicy::from_config(&config.fetch),
            classifier: ChangeClassifier::new(config.poll.similarity_threshold),
            dispatcher,
            store,
            state: StateSnapshot::default(),
            last_polled: HashMap::new(),
        }
    }

    pub fn state(&self) -> &StateSnapshot {
        &self.state
    }

    /// Smallest source interval; the scheduler ticks at this period.
    pub fn tick_period(&self) -> Duration {
        self.sources
            .iter()
            .map(|source| source.interval(self.poll.interval_secs))
            .min()
            .unwrap_or_else(|| self.poll.interval())
            .max(Duration::from_secs(1))
    }

    /// Load saved state and take a baseline for sources that have none.
    pub async fn init(&mut self) -> Result<()> {
        self.state = self.store.load().await?;
        log::info!(
            "Loaded state for {} of {} sources",
            self.sources
                .iter()
                .filter(|s| self.state.fingerprint(&s.id).is_some())
                .count(),
            self.sources.len()
        );

        let mut changed = false;
        for source in self.sources.clone() {
            if self.state.fingerprint(&source.id).is_some() {
                continue;
            }
            let body = fetch_with_retry(self.fetcher.as_ref(), &source.url, &self.retry).await?;
            match inspect(&source, &body, None) {
                Ok(Inspection::Baseline(fingerprint)) => {
                    log::info!("{}: baseline {}", source.id, fingerprint);
                    self.state.entry(&source.id).last_fingerprint = Some(fingerprint);
                    changed = true;
                }
                Ok(_) => log::warn!(
                    "{}: nothing matches '{}', baseline postponed",
                    source.id,
                    source.region
                ),
                Err(e) => log::warn!("{}: {}", source.id, e),
            }
        }
        if changed {
            self.persist().await;
        }
        Ok(())
    }

    /// Poll every due source once.
    ///
    /// Only an exhausted fetch is fatal. Missing elements and dispatch
    /// failures are logged and the cycle goes on.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let started = Instant::now();
        let mut report = CycleReport::default();
        let mut relayed = false;

        for source in self.sources.clone() {
            let outcome = if relayed && self.poll.exclusive_cycles {
                SourceOutcome::Skipped
            } else if !self.is_due(&source, started) {
                SourceOutcome::NotDue
            } else {
                self.last_polled.insert(source.id.clone(), started);
                self.poll_source(&source).await?
            };

            if matches!(outcome, SourceOutcome::Relayed { .. }) {
                relayed = true;
            }
            report.outcomes.push((source.id.clone(), outcome));
        }
        Ok(report)
    }

    /// Poll on the scheduler until `shutdown` resolves.
    ///
    /// A cycle in progress always completes before shutdown is honored.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let period = self.tick_period();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        log::info!(
            "Watching {} sources every {:?}",
            self.sources.len(),
            period
        );
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    log::info!("Shutdown requested, stopping");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            let report = self.run_cycle().await?;
            log::debug!("Cycle done, {} sources relayed", report.relayed());
        }
    }

    fn is_due(&self, source: &WatchedSource, now: Instant) -> bool {
        match self.last_polled.get(&source.id) {
            Some(last) => {
                now.duration_since(*last) + SCHEDULE_SLACK
                    >= source.interval(self.poll.interval_secs)
            }
            None => true,
        }
    }

    async fn poll_source(&mut self, source: &WatchedSource) -> Result<SourceOutcome> {
        let body = fetch_with_retry(self.fetcher.as_ref(), &source.url, &self.retry).await?;
        let last = self.state.get(&source.id).cloned().unwrap_or_default();

        let inspection = match inspect(source, &body, last.last_fingerprint.as_deref()) {
            Ok(inspection) => inspection,
            Err(e) => {
                log::warn!("{}: {}", source.id, e);
                return Ok(SourceOutcome::Missing);
            }
        };

        let (fingerprint, announcement) = match inspection {
            Inspection::RegionMissing => {
                log::warn!("{}: nothing matches '{}'", source.id, source.region);
                return Ok(SourceOutcome::Missing);
            }
            Inspection::Unchanged => {
                log::debug!("{}: no change", source.id);
                return Ok(SourceOutcome::Unchanged);
            }
            Inspection::Baseline(fingerprint) => {
                log::info!("{}: baseline {}", source.id, fingerprint);
                let entry = self.state.entry(&source.id);
                entry.last_fingerprint = Some(fingerprint);
                entry.updated_at = Some(Utc::now());
                self.persist().await;
                return Ok(SourceOutcome::Baseline);
            }
            Inspection::Changed {
                fingerprint,
                announcement,
            } => (fingerprint, announcement),
        };

        let old = last.last_fingerprint.as_deref().unwrap_or_default();
        log::info!("{}: {} =/= {}", source.id, old, fingerprint);

        let kind = self.classifier.classify(
            old,
            &fingerprint,
            &announcement.title.plain,
            &announcement.body.plain,
            &last.last_title,
            &last.last_body,
        );
        if kind == ChangeKind::NoChange {
            // absorb the new markup, the relayed text and handles stay
            log::info!("{}: markup changed but the text did not", source.id);
            let entry = self.state.entry(&source.id);
            entry.last_fingerprint = Some(fingerprint);
            entry.updated_at = Some(Utc::now());
            self.persist().await;
            return Ok(SourceOutcome::Unchanged);
        }
        log::info!(
            "{}: {:?} \"{}\"",
            source.id,
            kind,
            announcement.title.plain
        );

        let report = self
            .dispatcher
            .dispatch(&announcement, kind, &last.handles)
            .await;
        if !report.any_delivered() {
            log::error!(
                "{}: no channel accepted the announcement, retrying next cycle",
                source.id
            );
            return Ok(SourceOutcome::Undelivered { kind });
        }

        let delivered = report.handles.len();
        let failed = report.failures.len();
        let entry = self.state.entry(&source.id);
        entry.last_fingerprint = Some(fingerprint);
        entry.last_title = announcement.title.plain;
        entry.last_body = announcement.body.plain;
        match kind {
            ChangeKind::Edit => entry.handles.extend(report.handles),
            _ => entry.handles = report.handles,
        }
        entry.updated_at = Some(Utc::now());
        self.persist().await;

        Ok(SourceOutcome::Relayed {
            kind,
            delivered,
            failed,
        })
    }

    async fn persist(&mut self) {
        self.state.updated_at = Some(Utc::now());
        if let Err(e) = self.store.save(&self.state).await {
            log::error!("Failed to save state: {}", e);
        }
    }
}
