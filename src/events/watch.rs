// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Reconnecting event watch loop
//!
//! Keeps one watch connection open at a time and feeds every notification
//! through the pipeline before asking for the next one. Connections that end
//! (server-side timeout) or break (transport error) are reopened without
//! limit. Each reopen resumes after the last resource version seen, so the
//! server does not replay what was already delivered; a 410 Gone drops the
//! resume point.
//!
//! Only the very first connection can be fatal: failing to open it, or it
//! being rejected before anything is delivered (auth errors arrive as the
//! first stream item), ends the session with `ConnectionSetup`.
//!
//! Reopen attempts that fail, and connections that close immediately without
//! delivering anything, are rate limited with a capped exponential backoff.
//! The backoff resets once a connection is healthy again.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, trace, warn};

use super::model::{Event, RawEvent};
use super::pipeline::{Outcome, Pipeline};
use crate::error::WatchError;
use crate::output::{RowSink, StreamNotice};

/// Per-connection liveness bound requested from the session
pub const WATCH_TIMEOUT: Duration = Duration::from_secs(300);

/// First delay after a failed reopen (doubles each consecutive failure)
const RECONNECT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Upper bound for the reconnect delay
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(30);

/// A connection shorter than this that delivered nothing counts as a failure
const MIN_HEALTHY_CONNECTION: Duration = Duration::from_secs(1);

/// A quiet connection is announced once it has survived this long
const ANNOUNCE_GRACE: Duration = Duration::from_millis(500);

pub type RawEventStream = BoxStream<'static, Result<RawEvent, WatchError>>;

/// The cluster session capability the watch loop consumes
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Context this source is bound to
    fn context(&self) -> &str;

    /// Open one watch connection over events in all namespaces, starting
    /// after `resume_from` or, when `None`, from the server's cache.
    ///
    /// An `Err` item ends the connection: `ConnectionSetup` when the server
    /// rejected the watch, `Expired` when `resume_from` is too old, otherwise
    /// `Transport`. End of stream means the connection closed.
    async fn open_watch(
        &self,
        timeout: Duration,
        resume_from: Option<&str>,
    ) -> Result<RawEventStream, WatchError>;
}

/// Capped exponential backoff over consecutive failures
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    base: Duration,
    max: Duration,
    failures: u32,
}

impl ReconnectBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: 0,
        }
    }

    /// Delay before the next attempt; counts one more failure
    pub fn next_delay(&mut self) -> Duration {
        let factor = 2u32.saturating_pow(self.failures.min(16));
        self.failures = self.failures.saturating_add(1);
        self.base.saturating_mul(factor).min(self.max)
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new(RECONNECT_BASE_DELAY, RECONNECT_MAX_DELAY)
    }
}

/// Counters for one watch session
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WatchSummary {
    pub received: u64,
    pub malformed: u64,
    pub filtered: u64,
    pub duplicates: u64,
    pub rendered: u64,
    pub reconnects: u64,
    pub failed_reopens: u64,
}

pub struct EventWatcher<S> {
    source: S,
    label: String,
    timeout: Duration,
    backoff: ReconnectBackoff,
}

impl<S: EventSource> EventWatcher<S> {
    /// `label` names the component in every log line of the session
    pub fn new(source: S, label: impl Into<String>) -> Self {
        Self {
            source,
            label: label.into(),
            timeout: WATCH_TIMEOUT,
            backoff: ReconnectBackoff::default(),
        }
    }

    #[cfg(test)]
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff = ReconnectBackoff::new(base, max);
        self
    }

    /// Watch until `shutdown` fires.
    ///
    /// Returns `ConnectionSetup` if the first connection cannot be opened and
    /// `Render` if the sink fails; everything else is handled here.
    pub async fn run(
        &self,
        pipeline: &mut Pipeline,
        sink: &mut dyn RowSink,
        shutdown: &CancellationToken,
    ) -> Result<WatchSummary, WatchError> {
        let span = info_span!(
            "watch",
            component = %self.label,
            context = %self.source.context()
        );
        self.watch(pipeline, sink, shutdown).instrument(span).await
    }

    async fn watch(
        &self,
        pipeline: &mut Pipeline,
        sink: &mut dyn RowSink,
        shutdown: &CancellationToken,
    ) -> Result<WatchSummary, WatchError> {
        let context = self.source.context().to_string();
        let mut summary = WatchSummary::default();
        let mut backoff = self.backoff.clone();
        let mut resume: Option<String> = None;

        info!(
            filters = %pipeline.filter().summary(),
            timeout_secs = self.timeout.as_secs(),
            "Opening event watch"
        );

        let opened = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(summary),
            opened = self.source.open_watch(self.timeout, None) => opened,
        };
        let mut stream = opened.map_err(|e| as_setup_error(&context, e))?;

        let mut initial = true;
        let mut announced = false;
        let mut opened_at = Instant::now();
        let mut delivered = 0u64;

        loop {
            let announce_at = tokio::time::Instant::from_std(opened_at + ANNOUNCE_GRACE);
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!(rendered = summary.rendered, "Watch cancelled");
                    return Ok(summary);
                }
                next = stream.next() => next,
                _ = tokio::time::sleep_until(announce_at), if !announced => {
                    announced = true;
                    sink.notice(&StreamNotice::Connected {
                        context: context.clone(),
                    })?;
                    continue;
                }
            };

            let mut rejected = false;
            let reason = match next {
                Some(Ok(raw)) => {
                    if !announced {
                        announced = true;
                        sink.notice(&StreamNotice::Connected {
                            context: context.clone(),
                        })?;
                    }
                    summary.received += 1;
                    delivered += 1;
                    if let Some(version) = &raw.resource_version {
                        resume = Some(version.clone());
                    }
                    self.handle(raw, &context, pipeline, sink, &mut summary)?;
                    continue;
                }
                Some(Err(e)) if initial && delivered == 0 => {
                    warn!(error = %e, "Event watch rejected before delivering anything");
                    return Err(as_setup_error(&context, e));
                }
                Some(Err(WatchError::Expired(detail))) => {
                    warn!(detail = %detail, "Resume point expired, restarting from the server cache");
                    resume = None;
                    format!("resource version expired: {}", detail)
                }
                Some(Err(e)) => {
                    rejected = matches!(e, WatchError::ConnectionSetup { .. });
                    warn!(error = %e, delivered, "Watch stream broken, reconnecting");
                    e.to_string()
                }
                None => {
                    warn!(
                        delivered,
                        elapsed_secs = opened_at.elapsed().as_secs(),
                        "Watch connection closed, reconnecting"
                    );
                    "watch connection closed".to_string()
                }
            };

            initial = false;
            summary.reconnects += 1;
            if rejected {
                summary.failed_reopens += 1;
            }
            let immediate = delivered == 0 && opened_at.elapsed() < MIN_HEALTHY_CONNECTION;
            if !immediate && !rejected {
                backoff.reset();
            }

            let attempt = Reopen {
                context: &context,
                reason,
                delay_first: immediate || rejected,
            };
            match self
                .reopen(attempt, &mut resume, &mut backoff, sink, shutdown, &mut summary)
                .await?
            {
                Some(reopened) => {
                    stream = reopened;
                    opened_at = Instant::now();
                    delivered = 0;
                    announced = false;
                }
                None => {
                    info!(rendered = summary.rendered, "Watch cancelled during reconnect");
                    return Ok(summary);
                }
            }
        }
    }

    /// Reopen until it works or we are cancelled (`Ok(None)`)
    async fn reopen(
        &self,
        attempt: Reopen<'_>,
        resume: &mut Option<String>,
        backoff: &mut ReconnectBackoff,
        sink: &mut dyn RowSink,
        shutdown: &CancellationToken,
        summary: &mut WatchSummary,
    ) -> Result<Option<RawEventStream>, WatchError> {
        let Reopen {
            context,
            mut reason,
            mut delay_first,
        } = attempt;

        loop {
            let delay = delay_first.then(|| backoff.next_delay());
            sink.notice(&StreamNotice::Reconnecting {
                context: context.to_string(),
                reason: reason.clone(),
                delay,
            })?;

            if let Some(delay) = delay {
                debug!(delay_ms = delay.as_millis() as u64, "Backing off before reconnect");
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return Ok(None),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let opened = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(None),
                opened = self.source.open_watch(self.timeout, resume.as_deref()) => opened,
            };

            match opened {
                Ok(stream) => {
                    debug!(
                        failures = backoff.failures(),
                        resume_from = resume.as_deref().unwrap_or("0"),
                        "Watch reopened"
                    );
                    return Ok(Some(stream));
                }
                Err(e) => {
                    summary.failed_reopens += 1;
                    warn!(
                        error = %e,
                        attempt = backoff.failures() + 1,
                        "Failed to reopen event watch"
                    );
                    if matches!(e, WatchError::Expired(_)) {
                        *resume = None;
                    }
                    reason = e.to_string();
                    delay_first = true;
                }
            }
        }
    }

    fn handle(
        &self,
        raw: RawEvent,
        context: &str,
        pipeline: &mut Pipeline,
        sink: &mut dyn RowSink,
        summary: &mut WatchSummary,
    ) -> Result<(), WatchError> {
        let event = match Event::normalize(raw, context) {
            Ok(event) => event,
            Err(e) => {
                summary.malformed += 1;
                debug!(error = %e, "Skipping malformed event");
                return Ok(());
            }
        };

        match pipeline.process(&event) {
            Outcome::Rendered(row) => {
                summary.rendered += 1;
                sink.emit(row)?;
            }
            Outcome::Filtered => summary.filtered += 1,
            Outcome::Duplicate => {
                summary.duplicates += 1;
                trace!(name = %event.name, "Suppressed duplicate event");
            }
        }
        Ok(())
    }
}

/// Why and how the next reconnect starts
struct Reopen<'a> {
    context: &'a str,
    reason: String,
    delay_first: bool,
}

fn as_setup_error(context: &str, err: WatchError) -> WatchError {
    match err {
        WatchError::ConnectionSetup { .. } => err,
        other => WatchError::setup(context, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::filter::FilterSpec;
    use crate::events::format::{DedupBy, MessageMode, RenderRow, RowFormatter, SeenSet};
    use crate::events::model::tests::raw;
    use futures::stream;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Script {
        Connection(Vec<Result<RawEvent, WatchError>>),
        SetupFailure(&'static str),
    }

    /// Replays scripted connections, then cancels the session
    struct ScriptedSource {
        scripts: Mutex<VecDeque<Script>>,
        opens: AtomicUsize,
        resumes: Mutex<Vec<Option<String>>>,
        done: CancellationToken,
    }

    impl ScriptedSource {
        fn new(scripts: Vec<Script>, done: CancellationToken) -> Self {
            Self {
                scripts: Mutex::new(scripts.into()),
                opens: AtomicUsize::new(0),
                resumes: Mutex::new(Vec::new()),
                done,
            }
        }
    }

    #[async_trait]
    impl<'a> EventSource for &'a ScriptedSource {
        fn context(&self) -> &str {
            "staging"
        }

        async fn open_watch(
            &self,
            _timeout: Duration,
            resume_from: Option<&str>,
        ) -> Result<RawEventStream, WatchError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            self.resumes.lock().unwrap().push(resume_from.map(str::to_string));
            let next = self.scripts.lock().unwrap().pop_front();
            match next {
                Some(Script::Connection(items)) => Ok(stream::iter(items).boxed()),
                Some(Script::SetupFailure(reason)) => Err(WatchError::setup("staging", reason)),
                None => {
                    self.done.cancel();
                    Ok(stream::pending::<Result<RawEvent, WatchError>>().boxed())
                }
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        rows: Vec<RenderRow>,
        notices: Vec<StreamNotice>,
    }

    impl RowSink for RecordingSink {
        fn emit(&mut self, row: RenderRow) -> io::Result<()> {
            self.rows.push(row);
            Ok(())
        }

        fn notice(&mut self, notice: &StreamNotice) -> io::Result<()> {
            self.notices.push(notice.clone());
            Ok(())
        }
    }

    fn pipeline(pattern: Option<&str>) -> Pipeline {
        Pipeline::new(
            FilterSpec::new(pattern, None).unwrap(),
            RowFormatter::new("staging", MessageMode::MultiLine),
            SeenSet::default(),
            DedupBy::TimeName,
        )
    }

    fn ok(name: &str) -> Result<RawEvent, WatchError> {
        Ok(raw(name, "default", "Normal", "Started container"))
    }

    fn ok_at(name: &str, version: u64) -> Result<RawEvent, WatchError> {
        let mut event = raw(name, "default", "Normal", "Started container");
        event.resource_version = Some(version.to_string());
        Ok(event)
    }

    fn reconnect_delays(sink: &RecordingSink) -> Vec<Option<Duration>> {
        sink.notices
            .iter()
            .filter_map(|n| match n {
                StreamNotice::Reconnecting { delay, .. } => Some(*delay),
                _ => None,
            })
            .collect()
    }

    /// Behaves like the API server's watch cache: replays every event newer
    /// than the resume point, then closes. Cancels after `connections` opens.
    struct ReplayingSource {
        cached: Vec<(String, u64)>,
        connections: usize,
        opens: AtomicUsize,
        done: CancellationToken,
    }

    #[async_trait]
    impl<'a> EventSource for &'a ReplayingSource {
        fn context(&self) -> &str {
            "staging"
        }

        async fn open_watch(
            &self,
            _timeout: Duration,
            resume_from: Option<&str>,
        ) -> Result<RawEventStream, WatchError> {
            if self.opens.fetch_add(1, Ordering::SeqCst) >= self.connections {
                self.done.cancel();
                return Ok(stream::pending::<Result<RawEvent, WatchError>>().boxed());
            }
            let after: u64 = resume_from.and_then(|v| v.parse().ok()).unwrap_or(0);
            let items: Vec<Result<RawEvent, WatchError>> = self
                .cached
                .iter()
                .filter(|(_, version)| *version > after)
                .map(|(name, version)| ok_at(name, *version))
                .collect();
            Ok(stream::iter(items).boxed())
        }
    }

    fn names(sink: &RecordingSink) -> Vec<String> {
        sink.rows.iter().map(|r| r.name.trim_end().to_string()).collect()
    }

    async fn run_script(
        scripts: Vec<Script>,
        pattern: Option<&str>,
    ) -> (Result<WatchSummary, WatchError>, RecordingSink, usize) {
        let token = CancellationToken::new();
        let source = ScriptedSource::new(scripts, token.clone());
        let watcher = EventWatcher::new(&source, "test-watch")
            .with_backoff(Duration::from_millis(1), Duration::from_millis(4));
        let mut pipeline = pipeline(pattern);
        let mut sink = RecordingSink::default();
        let result = watcher.run(&mut pipeline, &mut sink, &token).await;
        (result, sink, source.opens.load(Ordering::SeqCst))
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut backoff = ReconnectBackoff::new(Duration::from_millis(500), Duration::from_secs(3));
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(2000));
        assert_eq!(backoff.next_delay(), Duration::from_secs(3));
        assert_eq!(backoff.next_delay(), Duration::from_secs(3));
        assert_eq!(backoff.failures(), 5);
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_backoff_never_overflows() {
        let mut backoff = ReconnectBackoff::default();
        for _ in 0..100 {
            assert!(backoff.next_delay() <= RECONNECT_MAX_DELAY);
        }
    }

    #[tokio::test]
    async fn test_initial_setup_failure_is_fatal() {
        let (result, sink, opens) =
            run_script(vec![Script::SetupFailure("Unauthorized")], None).await;
        match result {
            Err(WatchError::ConnectionSetup { context, reason }) => {
                assert_eq!(context, "staging");
                assert_eq!(reason, "Unauthorized");
            }
            other => panic!("expected setup error, got {:?}", other),
        }
        assert_eq!(opens, 1);
        assert!(sink.rows.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_record_is_skipped() {
        let mut broken = raw("bad", "default", "Normal", "x");
        broken.involved_kind = None;
        let (result, sink, _) = run_script(
            vec![Script::Connection(vec![Ok(broken), ok("good-1"), ok("good-2")])],
            None,
        )
        .await;

        let summary = result.unwrap();
        assert_eq!(summary.malformed, 1);
        assert_eq!(summary.received, 3);
        assert_eq!(names(&sink), vec!["good-1", "good-2"]);
    }

    #[tokio::test]
    async fn test_identical_event_twice_renders_once() {
        let (result, sink, _) =
            run_script(vec![Script::Connection(vec![ok("pod-a"), ok("pod-a")])], None).await;
        let summary = result.unwrap();
        assert_eq!(sink.rows.len(), 1);
        assert_eq!(summary.duplicates, 1);
    }

    #[tokio::test]
    async fn test_dedup_survives_reconnect() {
        let (result, sink, opens) = run_script(
            vec![
                Script::Connection(vec![ok("pod-a"), ok("pod-b")]),
                // server-side timeout, then redelivery of what we already saw
                Script::Connection(vec![ok("pod-a"), ok("pod-b")]),
            ],
            None,
        )
        .await;

        let summary = result.unwrap();
        assert_eq!(names(&sink), vec!["pod-a", "pod-b"]);
        assert_eq!(summary.duplicates, 2);
        assert!(opens >= 3);
    }

    #[tokio::test]
    async fn test_transport_failure_mid_stream() {
        let (result, sink, _) = run_script(
            vec![
                Script::Connection(vec![
                    ok("pod-1"),
                    ok("pod-2"),
                    Err(WatchError::Transport("connection reset by peer".to_string())),
                    // never delivered: the broken connection is dropped
                    ok("pod-lost"),
                ]),
                Script::Connection(vec![ok("pod-1"), ok("pod-2"), ok("pod-3")]),
            ],
            None,
        )
        .await;

        let summary = result.unwrap();
        assert_eq!(names(&sink), vec!["pod-1", "pod-2", "pod-3"]);
        assert_eq!(summary.duplicates, 2);
        assert!(summary.reconnects >= 1);
        assert!(sink.notices.iter().any(|n| matches!(
            n,
            StreamNotice::Reconnecting { reason, .. } if reason.contains("connection reset")
        )));
    }

    #[tokio::test]
    async fn test_failed_reopens_back_off_and_recover() {
        let (result, sink, _) = run_script(
            vec![
                Script::Connection(vec![ok("pod-1")]),
                Script::SetupFailure("connection refused"),
                Script::SetupFailure("connection refused"),
                Script::Connection(vec![ok("pod-1"), ok("pod-2")]),
            ],
            None,
        )
        .await;

        let summary = result.unwrap();
        assert_eq!(names(&sink), vec!["pod-1", "pod-2"]);
        assert_eq!(summary.failed_reopens, 2);

        let delays = reconnect_delays(&sink);
        // first attempt is immediate, the two retries after failures are delayed
        assert_eq!(delays[0], None);
        assert_eq!(delays[1], Some(Duration::from_millis(1)));
        assert_eq!(delays[2], Some(Duration::from_millis(2)));
    }

    #[tokio::test]
    async fn test_empty_connections_are_rate_limited() {
        let (result, sink, _) = run_script(
            vec![
                Script::Connection(vec![]),
                Script::Connection(vec![]),
                Script::Connection(vec![ok("pod-1")]),
            ],
            None,
        )
        .await;

        result.unwrap();
        assert_eq!(names(&sink), vec!["pod-1"]);
        assert!(sink.notices.iter().any(|n| matches!(
            n,
            StreamNotice::Reconnecting { delay: Some(_), .. }
        )));
    }

    #[tokio::test]
    async fn test_end_to_end_filter_scenario() {
        let (result, sink, _) = run_script(
            vec![Script::Connection(vec![
                Ok(raw("pod-a-123", "default", "Warning", "(oom) killed")),
                Ok(raw("pod-b-999", "default", "Warning", "ok")),
            ])],
            Some("pod-a"),
        )
        .await;

        let summary = result.unwrap();
        assert_eq!(sink.rows.len(), 1);
        assert_eq!(sink.rows[0].name.trim_end(), "pod-a-123");
        assert_eq!(sink.rows[0].message, "[oom] killed");
        assert_eq!(summary.filtered, 1);
    }

    #[tokio::test]
    async fn test_rejected_first_connection_is_fatal() {
        let (result, sink, opens) = run_script(
            vec![
                Script::Connection(vec![Err(WatchError::setup(
                    "staging",
                    "Unauthorized (401: Unauthorized)",
                ))]),
                Script::Connection(vec![ok("never")]),
            ],
            None,
        )
        .await;

        match result {
            Err(WatchError::ConnectionSetup { context, reason }) => {
                assert_eq!(context, "staging");
                assert!(reason.contains("401"));
            }
            other => panic!("expected setup error, got {:?}", other),
        }
        assert_eq!(opens, 1);
        assert!(sink.rows.is_empty());
        assert!(sink.notices.is_empty());
    }

    #[tokio::test]
    async fn test_broken_first_connection_is_fatal() {
        let (result, _, opens) = run_script(
            vec![Script::Connection(vec![Err(WatchError::Transport(
                "connection reset by peer".to_string(),
            ))])],
            None,
        )
        .await;

        assert!(matches!(result, Err(WatchError::ConnectionSetup { .. })));
        assert_eq!(opens, 1);
    }

    #[tokio::test]
    async fn test_rejection_after_healthy_session_backs_off() {
        let (result, sink, _) = run_script(
            vec![
                Script::Connection(vec![ok("pod-1")]),
                Script::Connection(vec![Err(WatchError::setup("staging", "Unauthorized"))]),
                Script::Connection(vec![ok("pod-2")]),
            ],
            None,
        )
        .await;

        let summary = result.unwrap();
        assert_eq!(names(&sink), vec!["pod-1", "pod-2"]);
        assert_eq!(summary.failed_reopens, 1);
        let delays = reconnect_delays(&sink);
        assert_eq!(delays[0], None);
        assert_eq!(delays[1], Some(Duration::from_millis(1)));
    }

    #[tokio::test]
    async fn test_connected_announced_on_first_event() {
        let (result, sink, _) =
            run_script(vec![Script::Connection(vec![ok("pod-1")])], None).await;

        result.unwrap();
        assert_eq!(
            sink.notices.first(),
            Some(&StreamNotice::Connected {
                context: "staging".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_reconnect_resumes_after_last_version() {
        let token = CancellationToken::new();
        let source = ScriptedSource::new(
            vec![
                Script::Connection(vec![ok_at("pod-1", 10), ok_at("pod-2", 11)]),
                Script::Connection(vec![Err(WatchError::Expired(
                    "too old resource version".to_string(),
                ))]),
                Script::Connection(vec![]),
            ],
            token.clone(),
        );
        let watcher = EventWatcher::new(&source, "test-watch")
            .with_backoff(Duration::from_millis(1), Duration::from_millis(4));
        let mut pipeline = pipeline(None);
        let mut sink = RecordingSink::default();

        watcher.run(&mut pipeline, &mut sink, &token).await.unwrap();

        let resumes = source.resumes.lock().unwrap().clone();
        assert_eq!(
            resumes,
            vec![None, Some("11".to_string()), None, None],
            "410 Gone drops the resume point"
        );
    }

    #[tokio::test]
    async fn test_replay_larger_than_seen_set_is_not_rerendered() {
        let token = CancellationToken::new();
        let source = ReplayingSource {
            cached: vec![
                ("pod-1".to_string(), 1),
                ("pod-2".to_string(), 2),
                ("pod-3".to_string(), 3),
            ],
            connections: 3,
            opens: AtomicUsize::new(0),
            done: token.clone(),
        };
        let watcher = EventWatcher::new(&source, "test-watch")
            .with_backoff(Duration::from_millis(1), Duration::from_millis(4));
        let mut pipeline = Pipeline::new(
            FilterSpec::new(None, None).unwrap(),
            RowFormatter::new("staging", MessageMode::MultiLine),
            SeenSet::new(2),
            DedupBy::TimeName,
        );
        let mut sink = RecordingSink::default();

        let summary = watcher.run(&mut pipeline, &mut sink, &token).await.unwrap();
        assert_eq!(names(&sink), vec!["pod-1", "pod-2", "pod-3"]);
        assert_eq!(summary.rendered, 3);
        assert_eq!(summary.duplicates, 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let source = ScriptedSource::new(vec![Script::Connection(vec![ok("x")])], token.clone());
        let watcher = EventWatcher::new(&source, "test-watch");
        let mut pipeline = pipeline(None);
        let mut sink = RecordingSink::default();

        let summary = watcher.run(&mut pipeline, &mut sink, &token).await.unwrap();
        assert_eq!(summary, WatchSummary::default());
        assert_eq!(source.opens.load(Ordering::SeqCst), 0);
    }
}
