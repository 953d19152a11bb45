//! MM Timer Management
//!
//! The seven mobility management timers of TS 04.08 section 11.2. Timers are
//! one-shot countdowns against a caller supplied clock: the owner calls
//! [`MmTimerSet::perform_tick`] with the current [`Instant`] and receives one
//! [`TimerExpiryEvent`] per timer that ran out. Timers never run MM logic
//! themselves.
//!
//! # MM Timer Definitions (3GPP TS 04.08)
//!
//! - T3210: Location update response timeout
//! - T3211: Location update retry delay
//! - T3212: Periodic location update (value broadcast by the network)
//! - T3213: Delay after a random access failure during location update
//! - T3220: IMSI detach acknowledgement wait
//! - T3230: MM connection establishment timeout
//! - T3240: RR release wait after an MM procedure

use std::fmt;
use std::time::{Duration, Instant};

// ============================================================================
// Timer Identifiers
// ============================================================================

/// Identity of an MM timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MmTimerId {
    T3210,
    T3211,
    T3212,
    T3213,
    T3220,
    T3230,
    T3240,
}

impl MmTimerId {
    /// All timers, in table order.
    pub const ALL: [MmTimerId; 7] = [
        MmTimerId::T3210,
        MmTimerId::T3211,
        MmTimerId::T3212,
        MmTimerId::T3213,
        MmTimerId::T3220,
        MmTimerId::T3230,
        MmTimerId::T3240,
    ];

    /// Numeric timer code (e.g. 3210 for T3210)
    pub fn code(&self) -> u16 {
        match self {
            MmTimerId::T3210 => 3210,
            MmTimerId::T3211 => 3211,
            MmTimerId::T3212 => 3212,
            MmTimerId::T3213 => 3213,
            MmTimerId::T3220 => 3220,
            MmTimerId::T3230 => 3230,
            MmTimerId::T3240 => 3240,
        }
    }

    /// Short description used in log lines.
    pub fn description(&self) -> &'static str {
        match self {
            MmTimerId::T3210 => "loc. upd. timeout",
            MmTimerId::T3211 => "loc. upd. retry delay",
            MmTimerId::T3212 => "periodic loc. upd. delay",
            MmTimerId::T3213 => "delay after RA failure",
            MmTimerId::T3220 => "IMSI detach keepalive",
            MmTimerId::T3230 => "MM connection timeout",
            MmTimerId::T3240 => "RR release timeout",
        }
    }

    fn index(&self) -> usize {
        match self {
            MmTimerId::T3210 => 0,
            MmTimerId::T3211 => 1,
            MmTimerId::T3212 => 2,
            MmTimerId::T3213 => 3,
            MmTimerId::T3220 => 4,
            MmTimerId::T3230 => 5,
            MmTimerId::T3240 => 6,
        }
    }
}

impl fmt::Display for MmTimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.code())
    }
}

// ============================================================================
// Single Timer
// ============================================================================

/// One-shot MM timer.
///
/// Tracks the deadline of the current run and how often the timer expired.
#[derive(Debug, Clone)]
pub struct MmTimer {
    id: MmTimerId,
    /// Interval of the current (or last) run
    interval: Duration,
    /// Deadline while running
    deadline: Option<Instant>,
    /// Number of times the timer has expired
    expiry_count: u32,
}

impl MmTimer {
    /// Create a stopped timer.
    pub fn new(id: MmTimerId) -> Self {
        Self {
            id,
            interval: Duration::ZERO,
            deadline: None,
            expiry_count: 0,
        }
    }

    /// (Re)arm the timer to expire `interval` after `now`.
    pub fn start(&mut self, now: Instant, interval: Duration) {
        self.interval = interval;
        self.deadline = Some(now + interval);
    }

    /// Stop the timer. Returns `true` if it was running.
    pub fn stop(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Check for expiry. Returns `true` if the timer expired on this tick.
    pub fn perform_tick(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.expiry_count += 1;
                true
            }
            _ => false,
        }
    }

    /// Move the deadline so that `remaining` is left from `now`, keeping the
    /// timer running.
    pub fn set_remaining(&mut self, now: Instant, remaining: Duration) {
        if self.deadline.is_some() {
            self.deadline = Some(now + remaining);
        }
    }

    pub fn id(&self) -> MmTimerId {
        self.id
    }

    pub fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Remaining time, `None` when stopped.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    pub fn expiry_count(&self) -> u32 {
        self.expiry_count
    }
}

impl fmt::Display for MmTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_running() {
            write!(f, "{}: int[{}]", self.id, self.interval.as_secs())
        } else {
            write!(f, "{}: .", self.id)
        }
    }
}

// ============================================================================
// Timer Expiry Event
// ============================================================================

/// Event generated when an MM timer expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerExpiryEvent {
    pub timer: MmTimerId,
    /// Number of times the timer has expired so far
    pub expiry_count: u32,
}

// ============================================================================
// Timer Set
// ============================================================================

/// The MM timer set.
pub struct MmTimerSet {
    timers: [MmTimer; 7],
}

impl MmTimerSet {
    pub fn new() -> Self {
        Self {
            timers: MmTimerId::ALL.map(MmTimer::new),
        }
    }

    pub fn get(&self, id: MmTimerId) -> &MmTimer {
        &self.timers[id.index()]
    }

    pub fn get_mut(&mut self, id: MmTimerId) -> &mut MmTimer {
        &mut self.timers[id.index()]
    }

    /// Start a timer.
    ///
    /// T3212 is only started with a nonzero interval and when not already
    /// running; the other timers are (re)armed unconditionally. Returns
    /// `true` if the timer was armed.
    pub fn start(&mut self, id: MmTimerId, now: Instant, interval: Duration) -> bool {
        if id == MmTimerId::T3212 && (interval.is_zero() || self.is_running(id)) {
            return false;
        }
        self.get_mut(id).start(now, interval);
        true
    }

    /// Stop a timer. Returns `true` if it was running; stopping a stopped
    /// timer has no effect.
    pub fn stop(&mut self, id: MmTimerId) -> bool {
        self.get_mut(id).stop()
    }

    pub fn is_running(&self, id: MmTimerId) -> bool {
        self.get(id).is_running()
    }

    pub fn remaining(&self, id: MmTimerId, now: Instant) -> Option<Duration> {
        self.get(id).remaining(now)
    }

    /// Check all timers and return one event per expired timer.
    pub fn perform_tick(&mut self, now: Instant) -> Vec<TimerExpiryEvent> {
        self.timers
            .iter_mut()
            .filter_map(|timer| {
                timer.perform_tick(now).then(|| TimerExpiryEvent {
                    timer: timer.id(),
                    expiry_count: timer.expiry_count(),
                })
            })
            .collect()
    }

    /// Stop all running timers.
    pub fn stop_all(&mut self) {
        for timer in &mut self.timers {
            timer.stop();
        }
    }

    /// Identities of all running timers.
    pub fn running_timers(&self) -> Vec<MmTimerId> {
        self.timers
            .iter()
            .filter(|t| t.is_running())
            .map(MmTimer::id)
            .collect()
    }

    /// Earliest deadline of any running timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.iter().filter_map(MmTimer::deadline).min()
    }
}

impl Default for MmTimerSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MmTimerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let running = self.running_timers();
        if running.is_empty() {
            write!(f, "MmTimerSet {{ no running timers }}")
        } else {
            write!(f, "MmTimerSet {{ running: {running:?} }}")
        }
    }
}
