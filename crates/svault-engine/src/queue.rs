//! Per-sink dispatch queue.
//!
//! One queue per configured sink. Each queue owns a single drain task —
//! the only place its rate-limit state is mutated and the only source of
//! requests to that sink, so at most one request per sink is outstanding
//! and dispatch order is FIFO. Failures are swallowed at the queue level
//! (the task's reply carries the error) so the drain moves on to the next
//! task.

use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, warn};

use svault_core::{Sink, VaultError, VaultResult};

use crate::retry::{retry_with_backoff, BackoffPolicy};
use crate::transport::{RateLimit, SinkResponse, TransportError};

/// One send attempt, built by the upload orchestrator. Must be re-callable:
/// the queue invokes it once per retry attempt.
pub type SendTask =
    Box<dyn Fn() -> BoxFuture<'static, Result<SinkResponse, TransportError>> + Send + Sync>;

struct QueuedSend {
    task: SendTask,
    reply: oneshot::Sender<VaultResult<String>>,
}

/// Handle to a sink's dispatch queue. Cheap to share; dropping every
/// handle shuts the drain task down once its backlog is finished.
pub struct SinkQueue {
    sink_url: String,
    tx: mpsc::UnboundedSender<QueuedSend>,
}

impl SinkQueue {
    /// Spawn the drain task for `sink`. `max_attempts` bounds retries per
    /// send (linear backoff, attempt × 1s).
    pub fn new(sink: Sink, max_attempts: u32) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(drain(sink.url.clone(), rx, max_attempts));
        Self { sink_url: sink.url, tx }
    }

    pub fn sink_url(&self) -> &str {
        &self.sink_url
    }

    /// Append a send task; resolves with the sink-assigned URL once the
    /// task completes, or the final error once retries are exhausted.
    pub async fn enqueue(&self, task: SendTask) -> VaultResult<String> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(QueuedSend { task, reply: reply_tx })
            .map_err(|_| VaultError::SendFailed("dispatch queue stopped".into()))?;
        reply_rx
            .await
            .map_err(|_| VaultError::SendFailed("dispatch queue dropped the task".into()))?
    }
}

/// Rate-limit budget for one sink. Mutated only by that sink's drain task.
struct RateState {
    remaining: u32,
    reset_at: Option<Instant>,
}

impl RateState {
    const DEFAULT_REMAINING: u32 = 5;

    fn new() -> Self {
        Self {
            remaining: Self::DEFAULT_REMAINING,
            reset_at: None,
        }
    }

    /// Apply provider headers. Absent or unparsable values fall back to
    /// the defaults; this never fails.
    fn update(&mut self, rate_limit: &RateLimit) {
        self.remaining = rate_limit.remaining.unwrap_or(Self::DEFAULT_REMAINING);
        if let Some(secs) = rate_limit.reset_after_secs {
            self.reset_at = Some(Instant::now() + Duration::from_secs_f64(secs.max(0.0)));
        }
    }

    async fn wait_for_budget(&self, sink_url: &str) {
        if self.remaining == 0 {
            if let Some(reset_at) = self.reset_at {
                debug!(sink = sink_url, "rate budget exhausted, sleeping until reset");
                tokio::time::sleep_until(reset_at).await;
            }
        }
    }
}

async fn drain(sink_url: String, mut rx: mpsc::UnboundedReceiver<QueuedSend>, max_attempts: u32) {
    let mut rate = RateState::new();

    while let Some(QueuedSend { task, reply }) = rx.recv().await {
        rate.wait_for_budget(&sink_url).await;

        // Rate headers observed during the retry loop are collected here
        // and folded into the drain's state afterwards, keeping the state
        // itself single-writer.
        let observed: Mutex<Option<RateLimit>> = Mutex::new(None);

        let outcome = retry_with_backoff(
            max_attempts,
            BackoffPolicy::linear(Duration::from_secs(1)),
            |_attempt| {
                let attempt_fut = (task)();
                let observed = &observed;
                async move {
                    match attempt_fut.await {
                        Ok(response) => {
                            *observed.lock().unwrap() = Some(response.rate_limit);
                            Ok(response.url)
                        }
                        Err(TransportError::RateLimited(rate_limit)) => {
                            *observed.lock().unwrap() = Some(rate_limit);
                            Err(TransportError::RateLimited(rate_limit))
                        }
                        Err(err) => Err(err),
                    }
                }
            },
        )
        .await;

        if let Some(rate_limit) = observed.into_inner().unwrap() {
            rate.update(&rate_limit);
        }

        let result = outcome.map_err(|e| {
            warn!(sink = %sink_url, error = %e, "send permanently failed");
            VaultError::SendFailed(format!("sink {sink_url}: {e}"))
        });

        // Caller may have gone away (aborted upload) — drop the result
        // and keep draining.
        let _ = reply.send(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn ok_response(url: &str, rate_limit: RateLimit) -> SinkResponse {
        SinkResponse {
            url: url.to_string(),
            rate_limit,
        }
    }

    fn queue() -> SinkQueue {
        SinkQueue::new(Sink::new("https://sink.example/hook"), 3)
    }

    fn task<F>(f: F) -> SendTask
    where
        F: Fn() -> Result<SinkResponse, TransportError> + Send + Sync + 'static,
    {
        Box::new(move || {
            let result = f();
            Box::pin(async move { result })
        })
    }

    #[tokio::test]
    async fn enqueue_resolves_with_url() {
        let q = queue();
        let url = q
            .enqueue(task(|| Ok(ok_response("https://cdn.example/1", RateLimit::default()))))
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example/1");
    }

    #[tokio::test]
    async fn tasks_run_fifo_one_at_a_time() {
        let q = Arc::new(queue());
        let active = Arc::new(AtomicU32::new(0));
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..8u32 {
            let q = q.clone();
            let active = active.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                q.enqueue(Box::new(move || {
                    let active = active.clone();
                    let order = order.clone();
                    Box::pin(async move {
                        let now_active = active.fetch_add(1, Ordering::SeqCst) + 1;
                        assert_eq!(now_active, 1, "queue must serialize sends");
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        order.lock().unwrap().push(i);
                        active.fetch_sub(1, Ordering::SeqCst);
                        Ok(ok_response(&format!("https://cdn.example/{i}"), RateLimit::default()))
                    })
                }))
                .await
            }));
            // Give the enqueue a chance to land before the next, so FIFO
            // order is deterministic in this test.
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(*order.lock().unwrap(), (0..8).collect::<Vec<u32>>());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_delays_next_send() {
        let q = queue();

        // First send reports an exhausted budget resetting in 2s
        q.enqueue(task(|| {
            Ok(ok_response(
                "https://cdn.example/1",
                RateLimit {
                    remaining: Some(0),
                    reset_after_secs: Some(2.0),
                },
            ))
        }))
        .await
        .unwrap();

        let started = Instant::now();
        let sent_at = Arc::new(Mutex::new(None));
        let sent_at_clone = sent_at.clone();
        q.enqueue(Box::new(move || {
            let sent_at = sent_at_clone.clone();
            Box::pin(async move {
                *sent_at.lock().unwrap() = Some(Instant::now());
                Ok(SinkResponse {
                    url: "https://cdn.example/2".into(),
                    rate_limit: RateLimit::default(),
                })
            })
        }))
        .await
        .unwrap();

        let waited = sent_at.lock().unwrap().unwrap() - started;
        assert!(
            waited >= Duration::from_secs(2),
            "second send must wait out the reset window, waited {waited:?}"
        );
        assert!(
            waited < Duration::from_millis(2100),
            "only scheduling slack beyond the reset, waited {waited:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_retry_then_succeed() {
        let q = queue();
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let url = q
            .enqueue(task(move || {
                if attempts_clone.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TransportError::Failed("flaky".into()))
                } else {
                    Ok(ok_response("https://cdn.example/ok", RateLimit::default()))
                }
            }))
            .await
            .unwrap();

        assert_eq!(url, "https://cdn.example/ok");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_rejects_but_queue_survives() {
        let q = queue();
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let err = q
            .enqueue(task(move || {
                attempts_clone.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::Failed("sink is down".into()))
            }))
            .await
            .unwrap_err();

        assert!(matches!(err, VaultError::SendFailed(_)));
        assert_eq!(attempts.load(Ordering::SeqCst), 3, "3 attempts then reject");

        // Queue keeps draining after a permanently failed task
        let url = q
            .enqueue(task(|| Ok(ok_response("https://cdn.example/next", RateLimit::default()))))
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example/next");
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_attempt_counts_toward_retries() {
        let q = queue();
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let url = q
            .enqueue(task(move || {
                if attempts_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(TransportError::RateLimited(RateLimit {
                        remaining: Some(0),
                        reset_after_secs: Some(1.0),
                    }))
                } else {
                    Ok(ok_response("https://cdn.example/after-429", RateLimit::default()))
                }
            }))
            .await
            .unwrap();

        assert_eq!(url, "https://cdn.example/after-429");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
