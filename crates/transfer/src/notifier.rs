use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Minimum default window span used for the instant-rate calculation.
pub const DEFAULT_WINDOW_SPAN: Duration = Duration::from_secs(2);

/// Samples older than the window span are dropped, but never below this
/// count, so a burst of widely-spaced samples still has a baseline to
/// compute a rate against.
pub const DEFAULT_MIN_SAMPLES: usize = 2;

/// How often [`Notifier::probe`] is allowed to fire a throttled `progressed`
/// callback.
pub const PROGRESS_UPDATE_INTERVAL: Duration = Duration::from_millis(200);

/// How often a sparse `instant_rate` fires when progress probes are rare.
pub const RATE_UPDATE_INTERVAL: Duration = Duration::from_millis(500);

/// Emitted (throttled) to tell a UI that progress counters have moved.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressEvent {
    /// Bytes transferred so far.
    pub total_transferred: u64,
    /// Total payload size.
    pub total_size: u64,
}

/// Emitted whenever an instantaneous transfer rate is computed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RateEvent {
    /// Bytes per second over the sliding window.
    pub bytes_per_second: f64,
    /// Whether a `progressed` callback was fired immediately after this one.
    pub followed_by_progress: bool,
}

type ProgressCallback = Box<dyn FnMut(ProgressEvent) + Send>;
type RateCallback = Box<dyn FnMut(RateEvent) + Send>;

/// Throttled progress and instantaneous-rate reporting over a sliding
/// window of `(instant, total_transferred)` samples.
///
/// Callers drive this by calling [`Notifier::probe`] whenever the owning
/// [`payload::Manager`]'s transferred-byte counter changes, and
/// [`Notifier::tick`] on an external timer to keep `instant_rate` flowing
/// even when probes are sparse. Registered callbacks fire synchronously,
/// inline in whichever call triggered them.
pub struct Notifier {
    total_size: u64,
    window: VecDeque<(Instant, u64)>,
    window_span: Duration,
    min_samples: usize,
    last_progress_emit: Option<Instant>,
    last_rate_emit: Option<Instant>,
    start: Instant,
    ended_at: Option<(Instant, u64)>,
    on_progress: Option<ProgressCallback>,
    on_rate: Option<RateCallback>,
}

impl Notifier {
    /// Builds a notifier for a transfer of `total_size` bytes.
    #[must_use]
    pub fn new(total_size: u64) -> Self {
        Self {
            total_size,
            window: VecDeque::new(),
            window_span: DEFAULT_WINDOW_SPAN,
            min_samples: DEFAULT_MIN_SAMPLES,
            last_progress_emit: None,
            last_rate_emit: None,
            start: Instant::now(),
            ended_at: None,
            on_progress: None,
            on_rate: None,
        }
    }

    /// Registers the callback invoked on a throttled progress edge.
    pub fn on_progress(&mut self, callback: impl FnMut(ProgressEvent) + Send + 'static) {
        self.on_progress = Some(Box::new(callback));
    }

    /// Registers the callback invoked whenever an instantaneous rate is
    /// computed.
    pub fn on_rate(&mut self, callback: impl FnMut(RateEvent) + Send + 'static) {
        self.on_rate = Some(Box::new(callback));
    }

    fn prune(&mut self, now: Instant) {
        while self.window.len() > self.min_samples {
            let Some(&(oldest, _)) = self.window.front() else { break };
            if now.duration_since(oldest) <= self.window_span {
                break;
            }
            self.window.pop_front();
        }
    }

    fn instant_rate(&self, now: Instant, total_transferred: u64) -> Option<f64> {
        let (oldest_at, oldest_total) = *self.window.front()?;
        let elapsed = now.duration_since(oldest_at).as_secs_f64();
        if elapsed <= 0.0 {
            return None;
        }
        Some((total_transferred.saturating_sub(oldest_total)) as f64 / elapsed)
    }

    /// Records a new `total_transferred` sample and fires throttled
    /// callbacks as appropriate. Should be called every time the manager's
    /// transferred-byte counter advances.
    pub fn probe(&mut self, total_transferred: u64) {
        let now = Instant::now();
        self.window.push_back((now, total_transferred));
        self.prune(now);

        let due = self
            .last_progress_emit
            .map_or(true, |last| now.duration_since(last) >= PROGRESS_UPDATE_INTERVAL);
        if due {
            if let Some(rate) = self.instant_rate(now, total_transferred) {
                self.emit_rate(rate, true);
            }
            self.emit_progress(total_transferred);
            self.last_progress_emit = Some(now);
            self.last_rate_emit = Some(now);
        }
    }

    /// Fires a sparse `instant_rate` if [`RATE_UPDATE_INTERVAL`] has elapsed
    /// since the last one. Intended to be driven by an external timer so
    /// rate reporting keeps flowing between infrequent `probe` calls.
    pub fn tick(&mut self, total_transferred: u64) {
        let now = Instant::now();
        let due = self
            .last_rate_emit
            .map_or(true, |last| now.duration_since(last) >= RATE_UPDATE_INTERVAL);
        if due {
            if let Some(rate) = self.instant_rate(now, total_transferred) {
                self.emit_rate(rate, false);
            }
            self.last_rate_emit = Some(now);
        }
    }

    /// Marks the transfer finished: emits a final `progressed` and records
    /// the total duration for [`Notifier::average_rate`].
    pub fn transfer_end(&mut self, total_transferred: u64) {
        let now = Instant::now();
        self.ended_at = Some((now, total_transferred));
        self.emit_progress(total_transferred);
    }

    /// `total_size * 1000 / max(duration_ms, 1)`, once [`Notifier::transfer_end`]
    /// has been called.
    #[must_use]
    pub fn average_rate(&self) -> Option<f64> {
        let (end, _) = self.ended_at?;
        let duration_ms = end.duration_since(self.start).as_millis().max(1) as f64;
        Some(self.total_size as f64 * 1000.0 / duration_ms)
    }

    fn emit_progress(&mut self, total_transferred: u64) {
        if let Some(callback) = &mut self.on_progress {
            callback(ProgressEvent {
                total_transferred,
                total_size: self.total_size,
            });
        }
    }

    fn emit_rate(&mut self, bytes_per_second: f64, followed_by_progress: bool) {
        if let Some(callback) = &mut self.on_rate {
            callback(RateEvent {
                bytes_per_second,
                followed_by_progress,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn probe_emits_progress_on_first_call() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut notifier = Notifier::new(100);
        let events_clone = events.clone();
        notifier.on_progress(move |e| events_clone.lock().unwrap().push(e));

        notifier.probe(10);
        assert_eq!(events.lock().unwrap().len(), 1);
        assert_eq!(events.lock().unwrap()[0].total_transferred, 10);
    }

    #[test]
    fn probe_throttles_rapid_calls() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut notifier = Notifier::new(100);
        let events_clone = events.clone();
        notifier.on_progress(move |e| events_clone.lock().unwrap().push(e));

        notifier.probe(10);
        notifier.probe(20);
        notifier.probe(30);
        assert_eq!(events.lock().unwrap().len(), 1, "calls within the throttle window should collapse");
    }

    #[test]
    fn average_rate_is_none_before_transfer_end() {
        let notifier = Notifier::new(100);
        assert_eq!(notifier.average_rate(), None);
    }

    #[test]
    fn average_rate_is_available_after_transfer_end() {
        let mut notifier = Notifier::new(1000);
        notifier.probe(500);
        notifier.transfer_end(1000);
        assert!(notifier.average_rate().unwrap() > 0.0);
    }
}
