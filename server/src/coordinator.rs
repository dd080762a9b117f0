//! Request fan-out to client game drivers.
//!
//! [`call_all`] sends one request per target, waits for each target's
//! `:success` / `:fail` acknowledgement, retries failed or silent targets and
//! fails the whole call as soon as one target is out of attempts. Listeners
//! are RAII guards: whatever way a call ends, every registration it made is
//! gone when it returns.

use crate::{
    connection::Connection,
    error::ExecError,
    protocol::{ActionKind, ServerMsg, Topic},
};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tokio_retry::strategy::FixedInterval;
use tokio_util::sync::CancellationToken;

/// One recipient of a request.
#[derive(Debug, Clone)]
pub struct Target {
    pub conn: Connection,
    /// Human readable name used in logs and errors.
    pub label: String,
    pub request: ServerMsg,
}

#[derive(Debug, Clone)]
pub struct CallSpec {
    pub kind: ActionKind,
    /// Per attempt.
    pub timeout: Duration,
    /// Attempts per target, first one included.
    pub attempts: u32,
    pub backoff: Duration,
    /// A failure detail equal to this counts as success.
    pub tolerated_error: Option<String>,
}

impl CallSpec {
    pub fn new(kind: ActionKind, timeout: Duration, attempts: u32, backoff: Duration) -> Self {
        CallSpec {
            kind,
            timeout,
            attempts: attempts.max(1),
            backoff,
            tolerated_error: None,
        }
    }

    pub fn tolerate(mut self, detail: impl Into<String>) -> Self {
        self.tolerated_error = Some(detail.into());
        self
    }
}

/// Run `spec` against every target concurrently.
///
/// `on_success(done, total)` fires each time a target succeeds. Results are
/// returned in target order.
pub async fn call_all<T, F>(
    targets: &[Target],
    spec: &CallSpec,
    cancel: &CancellationToken,
    mut on_success: F,
) -> Result<Vec<T>, ExecError>
where
    T: DeserializeOwned,
    F: FnMut(usize, usize),
{
    let total = targets.len();
    let mut results: Vec<Option<T>> = (0..total).map(|_| None).collect();

    let mut pending: FuturesUnordered<_> = targets
        .iter()
        .enumerate()
        .map(|(i, target)| async move { (i, call_one::<T>(target, spec, cancel).await) })
        .collect();

    let mut done = 0;
    while let Some((i, outcome)) = pending.next().await {
        // an early return drops the remaining calls and their listeners
        results[i] = Some(outcome?);
        done += 1;
        on_success(done, total);
    }
    Ok(results.into_iter().flatten().collect())
}

/// Run `spec` against a single target.
pub async fn call<T: DeserializeOwned>(
    target: &Target,
    spec: &CallSpec,
    cancel: &CancellationToken,
) -> Result<T, ExecError> {
    call_one(target, spec, cancel).await
}

async fn call_one<T: DeserializeOwned>(
    target: &Target,
    spec: &CallSpec,
    cancel: &CancellationToken,
) -> Result<T, ExecError> {
    let retries = spec.attempts.saturating_sub(1) as usize;
    let mut backoff = FixedInterval::new(spec.backoff).take(retries);
    let mut attempt = 1;

    loop {
        let err = match attempt_once(target, spec, cancel).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => e,
            Err(e) => return Err(e),
        };
        let Some(delay) = backoff.next() else {
            log::warn!(
                "{} for {} gave up after {attempt} attempt(s): {err}",
                spec.kind,
                target.label
            );
            return Err(err);
        };
        log::info!(
            "{} for {} failed (attempt {attempt}/{}): {err}; retrying",
            spec.kind,
            target.label,
            spec.attempts
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExecError::PipelineCancelled),
            _ = target.conn.closed() => return Err(disconnected(target, spec)),
            _ = sleep(delay) => {}
        }
        attempt += 1;
    }
}

async fn attempt_once<T: DeserializeOwned>(
    target: &Target,
    spec: &CallSpec,
    cancel: &CancellationToken,
) -> Result<T, ExecError> {
    // listen before emitting so a fast reply cannot be missed
    let mut listener = target.conn.once(Topic::Action(spec.kind));
    if !target.conn.emit(target.request.clone()) {
        return Err(disconnected(target, spec));
    }

    let reply = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ExecError::PipelineCancelled),
        _ = target.conn.closed() => return Err(disconnected(target, spec)),
        reply = listener.recv() => reply,
        _ = sleep(spec.timeout) => {
            return Err(ExecError::RemoteActionTimeout {
                kind: spec.kind,
                target: target.label.clone(),
            })
        }
    };

    match reply {
        None => Err(disconnected(target, spec)),
        Some(Ok(value)) => decode(target, spec, value),
        Some(Err(detail)) if spec.tolerated_error.as_deref() == Some(detail.as_str()) => {
            log::info!(
                "{} for {} reported `{detail}`, accepted",
                spec.kind,
                target.label
            );
            decode(target, spec, Value::Null)
        }
        Some(Err(detail)) => Err(ExecError::RemoteActionFailed {
            kind: spec.kind,
            target: target.label.clone(),
            detail,
        }),
    }
}

fn decode<T: DeserializeOwned>(target: &Target, spec: &CallSpec, value: Value) -> Result<T, ExecError> {
    serde_json::from_value(value).map_err(|e| ExecError::BadReply {
        kind: spec.kind,
        target: target.label.clone(),
        detail: e.to_string(),
    })
}

fn disconnected(target: &Target, spec: &CallSpec) -> ExecError {
    ExecError::RemoteActionDisconnected {
        kind: spec.kind,
        target: target.label.clone(),
    }
}
