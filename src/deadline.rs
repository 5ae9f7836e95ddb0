use std::time::{Duration, Instant};

/// A monotonic deadline threaded through every long-running solve.
///
/// Loops check `expired()` between iterations and return their best-so-far
/// result marked partial instead of aborting. `Deadline::none()` never
/// expires.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    end: Option<Instant>,
}

impl Deadline {
    /// A deadline that never expires.
    #[inline]
    pub fn none() -> Self {
        Self { end: None }
    }

    /// A deadline `secs` seconds from now.
    #[inline]
    pub fn after_secs(secs: f64) -> Self {
        Self::after(Duration::from_secs_f64(secs.max(0.0)))
    }

    /// A deadline `dur` from now.
    #[inline]
    pub fn after(dur: Duration) -> Self {
        Self { end: Some(Instant::now() + dur) }
    }

    /// True once the deadline has passed.
    #[inline]
    pub fn expired(&self) -> bool {
        self.end.is_some_and(|end| Instant::now() >= end)
    }

    /// Time left, or `None` for an unbounded deadline.
    #[inline]
    pub fn remaining(&self) -> Option<Duration> {
        self.end.map(|end| end.saturating_duration_since(Instant::now()))
    }

    /// The earlier of this deadline and `secs` seconds from now.
    /// Used to derive per-block solver budgets from the pipeline deadline.
    pub fn capped_at_secs(&self, secs: f64) -> Self {
        let cap = Instant::now() + Duration::from_secs_f64(secs.max(0.0));
        let end = match self.end {
            Some(end) => end.min(cap),
            None => cap,
        };
        Self { end: Some(end) }
    }
}
