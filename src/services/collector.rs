//! Poll, reconcile and append loop.
//!
//! One tick polls the activity source, filters the rows through the seen set
//! and appends whatever is new to the query log under a single timestamp.
//! [`Collector::run`] repeats ticks on a fixed interval until cancelled.

use crate::Result;
use crate::services::{Poller, SeenSet};
use crate::storage::{ActivitySource, QueryLog};
use chrono::Utc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Outcome of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Rows returned by the poll, including NULL rows.
    pub polled: usize,
    /// Queries appended to the log.
    pub captured: usize,
    /// Size of the seen set after the tick.
    pub total_seen: usize,
}

/// Totals for a finished [`Collector::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Ticks completed.
    pub ticks: u64,
    /// Queries appended to the log during the run.
    pub captured: usize,
    /// Size of the seen set when the run ended.
    pub total_seen: usize,
}

/// Drives the capture loop.
pub struct Collector<S> {
    poller: Poller<S>,
    log: QueryLog,
    seen: SeenSet,
}

impl<S: ActivitySource> Collector<S> {
    /// Creates a collector. `seen` should come from [`QueryLog::load_seen`]
    /// on the same log.
    #[must_use]
    pub const fn new(poller: Poller<S>, log: QueryLog, seen: SeenSet) -> Self {
        Self { poller, log, seen }
    }

    /// Returns the seen set.
    #[must_use]
    pub const fn seen(&self) -> &SeenSet {
        &self.seen
    }

    /// Returns the query log.
    #[must_use]
    pub const fn log(&self) -> &QueryLog {
        &self.log
    }

    /// Runs one poll, reconcile and append cycle.
    ///
    /// Novel queries enter the seen set before they are written, and all of
    /// them share one timestamp captured just before the append.
    ///
    /// # Errors
    ///
    /// Returns the poll error or the append error; neither is retried.
    #[instrument(skip(self), fields(operation = "tick"))]
    pub async fn tick(&mut self) -> Result<TickReport> {
        let rows = self.poller.poll().await?;
        let polled = rows.len();

        let novel = self.seen.reconcile(rows);
        let captured = if novel.is_empty() {
            0
        } else {
            let written = self.log.append(&novel, Utc::now())?;
            tracing::info!(
                "captured {written} new queries (total_seen={})",
                self.seen.len()
            );
            written
        };

        Ok(TickReport {
            polled,
            captured,
            total_seen: self.seen.len(),
        })
    }

    /// Ticks every `interval` until `cancel` fires.
    ///
    /// The first tick runs immediately. Cancellation is observed between
    /// ticks only: a poll or append in flight always completes. Late ticks
    /// are delayed rather than bursted.
    ///
    /// # Errors
    ///
    /// Stops at the first failing tick and returns its error.
    #[instrument(skip(self, cancel), fields(operation = "run", interval = ?interval))]
    pub async fn run(
        &mut self,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut summary = RunSummary {
            total_seen: self.seen.len(),
            ..RunSummary::default()
        };

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {},
            }

            let report = self.tick().await?;
            summary.ticks += 1;
            summary.captured += report.captured;
            summary.total_seen = report.total_seen;
        }

        tracing::debug!(
            ticks = summary.ticks,
            captured = summary.captured,
            "Collector stopped"
        );
        Ok(summary)
    }

    /// Returns the activity source so its connection can be released.
    pub fn into_source(self) -> S {
        self.poller.into_source()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::storage::ActivityRow;
    use std::collections::VecDeque;
    use tempfile::TempDir;

    /// Replays scripted batches, then cancels the token once exhausted.
    struct ScriptedSource {
        batches: VecDeque<Result<Vec<ActivityRow>>>,
        cancel: CancellationToken,
    }

    impl ScriptedSource {
        fn new(batches: Vec<Result<Vec<ActivityRow>>>, cancel: CancellationToken) -> Self {
            Self {
                batches: batches.into(),
                cancel,
            }
        }
    }

    impl ActivitySource for ScriptedSource {
        async fn fetch_active(&mut self, _target: &str) -> Result<Vec<ActivityRow>> {
            let next = self.batches.pop_front().unwrap_or_else(|| Ok(Vec::new()));
            if self.batches.is_empty() {
                self.cancel.cancel();
            }
            next
        }
    }

    fn rows(texts: &[&str]) -> Vec<ActivityRow> {
        texts.iter().map(|t| Some((*t).to_string())).collect()
    }

    fn collector(
        dir: &TempDir,
        batches: Vec<Result<Vec<ActivityRow>>>,
        cancel: &CancellationToken,
    ) -> Collector<ScriptedSource> {
        let log = QueryLog::new(dir.path().join("queries.log"));
        let seen = log.load_seen().unwrap();
        let source = ScriptedSource::new(batches, cancel.clone());
        Collector::new(Poller::new(source, "aurena"), log, seen)
    }

    fn log_lines(dir: &TempDir) -> Vec<String> {
        std::fs::read_to_string(dir.path().join("queries.log"))
            .unwrap_or_default()
            .lines()
            .map(String::from)
            .collect()
    }

    #[tokio::test]
    async fn test_tick_appends_novel_queries() {
        let dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let mut collector = collector(
            &dir,
            vec![Ok(vec![
                Some("SELECT  1".to_string()),
                None,
                Some(String::new()),
                Some("SELECT\n2".to_string()),
            ])],
            &cancel,
        );

        let report = collector.tick().await.unwrap();
        assert_eq!(
            report,
            TickReport {
                polled: 4,
                captured: 2,
                total_seen: 2
            }
        );

        let lines = log_lines(&dir);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("] SELECT 1"));
        assert!(lines[1].ends_with("] SELECT 2"));
    }

    #[tokio::test]
    async fn test_tick_without_novel_queries_leaves_log_untouched() {
        let dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let mut collector = collector(&dir, vec![Ok(Vec::new())], &cancel);

        let report = collector.tick().await.unwrap();
        assert_eq!(report.captured, 0);
        assert!(!dir.path().join("queries.log").exists());
    }

    #[tokio::test]
    async fn test_run_until_cancelled() {
        let dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let mut collector = collector(
            &dir,
            vec![
                Ok(rows(&["SELECT 1", "SELECT 2"])),
                Ok(rows(&["SELECT 2", "SELECT 3"])),
                Ok(rows(&["SELECT 1"])),
            ],
            &cancel,
        );

        let summary = collector
            .run(Duration::from_millis(1), &cancel)
            .await
            .unwrap();

        assert_eq!(summary.ticks, 3);
        assert_eq!(summary.captured, 3);
        assert_eq!(summary.total_seen, 3);
        assert_eq!(log_lines(&dir).len(), 3);
    }

    #[tokio::test]
    async fn test_run_with_cancelled_token_does_not_poll() {
        let dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut collector = collector(&dir, vec![Ok(rows(&["SELECT 1"]))], &cancel);

        let summary = collector
            .run(Duration::from_millis(1), &cancel)
            .await
            .unwrap();

        assert_eq!(summary.ticks, 0);
        assert_eq!(collector.into_source().batches.len(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_poll_error() {
        let dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let mut collector = collector(
            &dir,
            vec![
                Ok(rows(&["SELECT 1"])),
                Err(Error::Query {
                    cause: "server closed the connection".to_string(),
                }),
                Ok(rows(&["SELECT 2"])),
            ],
            &cancel,
        );

        let err = collector
            .run(Duration::from_millis(1), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Query { .. }));
        assert_eq!(log_lines(&dir).len(), 1);
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_batch_shares_one_timestamp() {
        let dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let mut collector = collector(&dir, vec![Ok(rows(&["a", "b", "c"]))], &cancel);

        collector.tick().await.unwrap();

        let prefixes: Vec<String> = log_lines(&dir)
            .iter()
            .map(|line| line.split_once("] ").unwrap().0.to_string())
            .collect();
        assert_eq!(prefixes.len(), 3);
        assert!(prefixes.iter().all(|p| p == &prefixes[0]));
    }
}
