//! Animation pacing and deferred phase transitions.
//!
//! Sessions are advanced by an external per-frame delta; nothing here
//! touches wall-clock time. The fixed pauses between phases are modeled
//! as [`Deferred`] entries keyed by the phase the session is expected to
//! still be in when the entry fires. A reset or a new run changes the
//! phase, so leftover entries drain without effect instead of corrupting
//! the newer run.

/// Seconds of animation per simulated millisecond of latency
/// (200 ms of latency plays back in 0.6 s).
pub const ANIMATION_SPEED: f64 = 0.003;

/// Floor on any latency-scaled leg so short hops stay perceptible.
pub const MIN_LEG_DURATION: f64 = 0.3;

/// Pause after an acknowledgment flash before the next phase.
pub const ACK_PAUSE_SECS: f64 = 0.4;

/// Pause on the race result before settling into `complete`.
pub const RESULT_PAUSE_SECS: f64 = 0.6;

/// Animation duration in seconds for a leg covering `latency_ms`.
pub fn leg_duration(latency_ms: u64) -> f64 {
    (latency_ms as f64 * ANIMATION_SPEED).max(MIN_LEG_DURATION)
}

/// A one-shot transition scheduled against a session's own elapsed time.
#[derive(Debug, Clone)]
pub struct Deferred<P, A> {
    /// Session-elapsed seconds at which the entry becomes due
    pub fire_at: f64,

    /// Phase the session must still be in for the action to apply
    pub expect: P,

    /// What to do when due
    pub action: A,
}

/// Removes every due entry and returns the actions whose expected phase
/// matches the session's current phase. Stale entries (phase moved on)
/// are discarded silently.
pub fn drain_due<P: PartialEq, A>(
    pending: &mut Vec<Deferred<P, A>>,
    now: f64,
    phase: &P,
) -> Vec<A> {
    let mut due = Vec::new();
    let mut i = 0;
    while i < pending.len() {
        if pending[i].fire_at <= now {
            let entry = pending.remove(i);
            if entry.expect == *phase {
                due.push(entry.action);
            }
        } else {
            i += 1;
        }
    }
    due
}
