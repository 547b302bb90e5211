//! Activation scheduler
//!
//! Per-page state machine gating scans behind a trailing-edge debounce and
//! activations behind a cooldown:
//!
//! ```text
//! Idle -> Debouncing -> Evaluating -> (Activating | Suppressed) -> Idle
//! ```
//!
//! The scheduler owns a single debounce deadline. Re-arming replaces it, so a
//! burst of triggers collapses into one evaluation timed from the last one.
//! Time is always passed in by the caller, which keeps the machine testable
//! on a paused tokio clock.

use std::time::Duration;

use ac_core::{EffectiveActivationState, Settings};
use chrono::{SecondsFormat, Utc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::eligibility::find_candidate;
use crate::scope::ObservableScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Debouncing,
    Evaluating,
    Activating,
    Suppressed,
}

/// An activation (simulated or real) to report to the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    pub origin: String,
    pub label: String,
    /// ISO-8601 timestamp
    pub at: String,
    pub dry_run: bool,
}

/// Result of one evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Page is not active; nothing was scanned
    Inactive,
    /// Within the cooldown window; nothing was scanned
    CooldownSuppressed { remaining: Duration },
    NoCandidate,
    Activated(ActivationReport),
    /// The native activation failed; retried on a later cycle
    ActivationFailed { label: String, error: String },
}

/// Ephemeral per-page scan state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSession {
    /// Start of the last activation attempt (dry-run included)
    pub last_action: Option<Instant>,
    /// Time of the last successful activation
    pub last_activation_iso: Option<String>,
    /// Pending debounce deadline
    pub deadline: Option<Instant>,
}

#[derive(Debug)]
pub struct ActivationScheduler {
    phase: Phase,
    session: ScanSession,
}

impl Default for ActivationScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivationScheduler {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            session: ScanSession::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.session.deadline
    }

    /// Arm (or re-arm) the debounce timer. Returns the new deadline.
    pub fn trigger(&mut self, now: Instant, debounce: Duration) -> Instant {
        let deadline = now + debounce;
        self.session.deadline = Some(deadline);
        self.phase = Phase::Debouncing;
        deadline
    }

    /// Drop any pending debounce without evaluating.
    pub fn cancel(&mut self) {
        self.session.deadline = None;
        if self.phase == Phase::Debouncing {
            self.phase = Phase::Idle;
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.session.deadline.is_some_and(|deadline| deadline <= now)
    }

    /// Run one evaluation. Consumes the pending deadline.
    pub async fn evaluate(
        &mut self,
        now: Instant,
        state: &EffectiveActivationState,
        settings: &Settings,
        scope: &dyn ObservableScope,
    ) -> ScanOutcome {
        self.session.deadline = None;
        self.phase = Phase::Evaluating;

        let outcome = self.run(now, state, settings, scope).await;
        self.phase = Phase::Idle;
        outcome
    }

    async fn run(
        &mut self,
        now: Instant,
        state: &EffectiveActivationState,
        settings: &Settings,
        scope: &dyn ObservableScope,
    ) -> ScanOutcome {
        if !state.active {
            return ScanOutcome::Inactive;
        }

        let cooldown = Duration::from_millis(settings.cooldown_ms);
        if let Some(last) = self.session.last_action {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < cooldown {
                self.phase = Phase::Suppressed;
                let remaining = cooldown - elapsed;
                debug!(origin = %state.origin, remaining_ms = remaining.as_millis() as u64, "Scan suppressed by cooldown");
                return ScanOutcome::CooldownSuppressed { remaining };
            }
        }

        let document = scope.snapshot();
        let Some(candidate) = find_candidate(&document, settings) else {
            debug!(origin = %state.origin, "No candidate");
            return ScanOutcome::NoCandidate;
        };

        self.phase = Phase::Activating;
        self.session.last_action = Some(now);
        let label = candidate.label;

        if state.dry_run {
            info!(origin = %state.origin, label = %label, "Dry-run candidate");
        } else {
            match scope.activate(&candidate.element).await {
                Ok(()) => info!(origin = %state.origin, label = %label, "Activated"),
                Err(e) => {
                    warn!(origin = %state.origin, label = %label, error = %e, "Activation failed");
                    return ScanOutcome::ActivationFailed {
                        label,
                        error: e.to_string(),
                    };
                }
            }
        }

        let at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.session.last_activation_iso = Some(at.clone());
        ScanOutcome::Activated(ActivationReport {
            origin: state.origin.clone(),
            label,
            at,
            dry_run: state.dry_run,
        })
    }
}
