//! The retry controller: a bounded fix-verify-retry state machine.
//!
//! One investigation runs as a single sequential pipeline:
//! `Pending(n) -> Generating -> Executing -> Classifying ->
//! (Succeeded | RetryPending | Exhausted)`. Attempts are strictly ordered;
//! attempt `n + 1` never starts before attempt `n` is classified. The
//! session's execution cell is torn down exactly once on every exit path,
//! including cancellation and catastrophic provisioning failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::classify;
use crate::domain::{
    Attempt, ExecutionResult, FixRequest, GeneratedFix, Investigation, InvestigationRequest,
    Outcome, Result, Verdict,
};
use crate::events::{EventSink, InvestigationEvent, StageKind, TracingSink};
use crate::fallback::FallbackProvider;
use crate::generator::FixGenerator;
use crate::obs;
use crate::sandbox::{ExecutionCell, SandboxFactory};

/// Handle for cancelling an in-flight investigation.
///
/// Cancellation is honored between attempts, not mid-execution; the
/// controller still runs teardown before returning.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Signal the controller to stop before the next attempt.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Retry-controller state. One value is live at a time; transitions follow
/// the rules below.
enum State {
    /// Ready to start attempt `n` (cancellation checkpoint).
    Pending(u32),
    /// Requesting a fix for attempt `n`.
    Generating(u32),
    /// Running attempt `n`'s candidate in the execution cell.
    Executing(u32, GeneratedFix),
    /// Judging attempt `n`'s execution result.
    Classifying(u32, GeneratedFix, ExecutionResult),
    /// Attempt `n` failed with budget remaining.
    RetryPending(u32),
    /// Loop finished.
    Terminal(Outcome),
}

/// Drives investigations: request a fix, execute it, classify, retry with
/// accumulated history, stop on success or exhaustion.
pub struct Investigator {
    factory: Arc<dyn SandboxFactory>,
    generator: Arc<dyn FixGenerator>,
    fallback: Arc<dyn FallbackProvider>,
    sink: Arc<dyn EventSink>,
    cancel: CancelHandle,
}

impl Investigator {
    /// Create an investigator over the given capabilities. Events go to the
    /// tracing sink unless [`with_sink`](Self::with_sink) overrides it.
    pub fn new(
        factory: Arc<dyn SandboxFactory>,
        generator: Arc<dyn FixGenerator>,
        fallback: Arc<dyn FallbackProvider>,
    ) -> Self {
        Self {
            factory,
            generator,
            fallback,
            sink: Arc::new(TracingSink),
            cancel: CancelHandle::default(),
        }
    }

    /// Replace the event sink (e.g. with a channel sink for streaming).
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Handle for cancelling this investigator's in-flight run.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Run one investigation to its terminal state.
    ///
    /// Every judged path returns `Ok` with exactly one terminal
    /// [`Outcome`]; the only `Err` is catastrophic provisioning (the
    /// session network could not be created), which carries no attempt to
    /// judge.
    pub async fn run(&self, request: InvestigationRequest) -> Result<Investigation> {
        request.validate()?;
        let _span = obs::InvestigationSpan::enter(&request.bug_id);
        let started_at = Utc::now();
        let mut seq = 0u64;

        obs::emit_investigation_started(&request.bug_id, request.max_attempts);
        self.emit(
            &mut seq,
            StageKind::Started {
                bug_id: request.bug_id.clone(),
                max_attempts: request.max_attempts,
            },
            format!(
                "starting investigation for {} (max {} attempts)",
                request.bug_id, request.max_attempts
            ),
        );

        let cell = self.factory.provision(&request.bug_id).await?;
        self.emit(
            &mut seq,
            StageKind::SessionReady {
                bug_id: request.bug_id.clone(),
            },
            "execution environment provisioned",
        );

        let mut attempts = Vec::new();
        let outcome = self
            .drive(&request, cell.as_ref(), &mut seq, &mut attempts)
            .await;

        // Scoped-resource guarantee: the session is released exactly once,
        // whatever terminal state the loop reached.
        cell.teardown().await;
        self.emit(
            &mut seq,
            StageKind::TornDown {
                bug_id: request.bug_id.clone(),
            },
            "session resources released",
        );

        let investigation = Investigation {
            bug_id: request.bug_id.clone(),
            attempts,
            outcome,
            started_at,
            finished_at: Utc::now(),
        };
        obs::emit_investigation_finished(
            &request.bug_id,
            investigation.total_attempts(),
            investigation.outcome.is_success(),
        );
        Ok(investigation)
    }

    /// Execute the state machine until a terminal outcome.
    async fn drive(
        &self,
        request: &InvestigationRequest,
        cell: &dyn ExecutionCell,
        seq: &mut u64,
        attempts: &mut Vec<Attempt>,
    ) -> Outcome {
        let fix_request = FixRequest {
            bug_id: request.bug_id.clone(),
            error_message: request.error_message.clone(),
            code: request.code.clone(),
            file_path: request.file_path.clone(),
            context: request.context.clone(),
        };

        let mut state = State::Pending(1);
        loop {
            state = match state {
                State::Pending(n) => {
                    if self.cancel.is_cancelled() {
                        warn!(bug_id = %request.bug_id, "investigation cancelled before attempt {n}");
                        State::Terminal(Outcome::ExhaustedNoFallback {
                            last_error: "investigation cancelled by caller".to_string(),
                        })
                    } else {
                        self.emit(
                            seq,
                            StageKind::FixRequested { attempt: n },
                            format!("attempt {n}: requesting fix"),
                        );
                        State::Generating(n)
                    }
                }

                State::Generating(n) => match self
                    .generator
                    .generate(&fix_request, attempts.as_slice())
                    .await
                {
                    Ok(fix) => {
                        self.emit(
                            seq,
                            StageKind::FixGenerated {
                                attempt: n,
                                confidence: fix.confidence,
                            },
                            format!(
                                "attempt {n}: fix generated (confidence {:.0}%)",
                                fix.confidence * 100.0
                            ),
                        );
                        State::Executing(n, fix)
                    }
                    // No code was produced, so there is nothing to judge:
                    // this is not an attempt. Abort straight to a terminal
                    // state determined by fallback enablement.
                    Err(e) => {
                        warn!(bug_id = %request.bug_id, error = %e, "fix generator unavailable");
                        State::Terminal(
                            self.generation_failed(
                                &fix_request,
                                attempts.as_slice(),
                                &e.to_string(),
                                seq,
                            )
                            .await,
                        )
                    }
                },

                State::Executing(n, fix) => {
                    self.emit(
                        seq,
                        StageKind::ExecutionStarted { attempt: n },
                        format!("attempt {n}: executing candidate in sandbox"),
                    );
                    let execution = match cell.execute(&fix.fixed_code, request.language).await {
                        Ok(result) => result,
                        // An internal sandbox fault is recovered locally and
                        // folded into history as a failed run.
                        Err(e) => ExecutionResult::failure(1, format!("sandbox error: {e}"), 0),
                    };
                    State::Classifying(n, fix, execution)
                }

                State::Classifying(n, fix, execution) => {
                    let verdict = classify::verdict(&execution);
                    self.emit(
                        seq,
                        StageKind::AttemptClassified {
                            attempt: n,
                            verdict,
                            timed_out: execution.timed_out,
                        },
                        format!(
                            "attempt {n}: {}",
                            match verdict {
                                Verdict::Passed => "PASSED",
                                Verdict::Failed => "FAILED",
                            }
                        ),
                    );
                    attempts.push(Attempt::record(n, fix, execution, verdict));
                    obs::emit_attempt_classified(&request.bug_id, n, verdict.is_passed());

                    match verdict {
                        Verdict::Passed => {
                            self.emit(
                                seq,
                                StageKind::Succeeded { attempt: n },
                                format!("fix verified on attempt {n}"),
                            );
                            State::Terminal(Outcome::Succeeded { winning_attempt: n })
                        }
                        Verdict::Failed if n < request.max_attempts => State::RetryPending(n),
                        Verdict::Failed => State::Terminal(
                            self.exhausted(&fix_request, attempts.as_slice(), seq).await,
                        ),
                    }
                }

                State::RetryPending(n) => State::Pending(n + 1),

                State::Terminal(outcome) => return outcome,
            };
        }
    }

    /// Terminal state after generator unavailability (bypasses the attempt
    /// loop: no attempt record is created for the failed call).
    async fn generation_failed(
        &self,
        fix_request: &FixRequest,
        attempts: &[Attempt],
        api_error: &str,
        seq: &mut u64,
    ) -> Outcome {
        if self.fallback.is_enabled() {
            self.emit(
                seq,
                StageKind::FallbackEngaged {
                    attempts: attempts.len() as u32,
                },
                "generator unavailable; producing manual-debugging guidance",
            );
            Outcome::ExhaustedWithFallback {
                guidance: self
                    .fallback
                    .api_failure_guidance(fix_request, api_error)
                    .await,
            }
        } else {
            self.emit(
                seq,
                StageKind::Exhausted {
                    attempts: attempts.len() as u32,
                },
                "generator unavailable and fallback disabled",
            );
            Outcome::ExhaustedNoFallback {
                last_error: format!("fix generation unavailable: {api_error}"),
            }
        }
    }

    /// Terminal state after the attempt budget is spent.
    async fn exhausted(
        &self,
        fix_request: &FixRequest,
        attempts: &[Attempt],
        seq: &mut u64,
    ) -> Outcome {
        if self.fallback.is_enabled() {
            self.emit(
                seq,
                StageKind::FallbackEngaged {
                    attempts: attempts.len() as u32,
                },
                format!(
                    "all {} attempts failed; producing manual-debugging guidance",
                    attempts.len()
                ),
            );
            Outcome::ExhaustedWithFallback {
                guidance: self.fallback.guidance(fix_request, attempts).await,
            }
        } else {
            self.emit(
                seq,
                StageKind::Exhausted {
                    attempts: attempts.len() as u32,
                },
                format!("all {} attempts failed; fallback disabled", attempts.len()),
            );
            Outcome::ExhaustedNoFallback {
                last_error: attempts
                    .last()
                    .and_then(|a| a.new_error.clone())
                    .unwrap_or_else(|| "no error captured".to_string()),
            }
        }
    }

    fn emit(&self, seq: &mut u64, kind: StageKind, message: impl Into<String>) {
        self.sink
            .emit(&InvestigationEvent::new(*seq, kind, message));
        *seq += 1;
    }
}
