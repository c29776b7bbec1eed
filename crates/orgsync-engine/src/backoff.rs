//! Drain backoff state.
//!
//! One error streak shared by all kinds, one next-allowed-run timestamp per
//! kind. The streak advances 0 → 1 → 3 → 6 once per tick that leaves any
//! kind incomplete, and every kind left incomplete by that tick is paused for
//! five minutes per streak step. Consecutive failing ticks therefore pause
//! for 5, 15 and then 30 minutes.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use orgsync_core::EntityKind;
use tracing::{error, warn};

/// Minutes of pause per streak step.
const PAUSE_MINUTES_PER_STEP: i64 = 5;

/// Streak value from which pause notices are logged as errors.
pub const ESCALATION_STREAK: u32 = 6;

/// Error streak and per-kind pause deadlines.
#[derive(Debug, Default, Clone)]
pub struct BackoffState {
    streak: u32,
    next_allowed: HashMap<EntityKind, DateTime<Utc>>,
}

impl BackoffState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current error streak.
    #[must_use]
    pub fn streak(&self) -> u32 {
        self.streak
    }

    /// When `kind` may next be drained. `None` if it was never paused.
    #[must_use]
    pub fn next_allowed_run(&self, kind: EntityKind) -> Option<DateTime<Utc>> {
        self.next_allowed.get(&kind).copied()
    }

    /// Whether `kind` may be drained at `now`.
    #[must_use]
    pub fn is_allowed(&self, kind: EntityKind, now: DateTime<Utc>) -> bool {
        self.next_allowed
            .get(&kind)
            .map_or(true, |next| now >= *next)
    }

    /// A tick made progress: a call succeeded or a batch fully resolved.
    pub fn record_success(&mut self) {
        self.streak = 0;
    }

    /// A tick at `now` left `kinds` incomplete. Advances the streak once and
    /// pauses each of `kinds` by the same amount, which is returned.
    pub fn record_incomplete(&mut self, kinds: &[EntityKind], now: DateTime<Utc>) -> Duration {
        self.streak = next_streak(self.streak);
        let pause = Duration::minutes(PAUSE_MINUTES_PER_STEP * i64::from(self.streak));
        let next = now + pause;

        for &kind in kinds {
            self.next_allowed.insert(kind, next);
            if self.streak >= ESCALATION_STREAK {
                error!(
                    kind = %kind,
                    streak = self.streak,
                    pause_minutes = pause.num_minutes(),
                    next_allowed_run = %next,
                    "Registry keeps failing, pausing drain"
                );
            } else {
                warn!(
                    kind = %kind,
                    streak = self.streak,
                    pause_minutes = pause.num_minutes(),
                    next_allowed_run = %next,
                    "Incomplete batch, pausing drain"
                );
            }
        }
        pause
    }
}

fn next_streak(streak: u32) -> u32 {
    match streak {
        0 => 1,
        1 => 3,
        _ => ESCALATION_STREAK,
    }
}
