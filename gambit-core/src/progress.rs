//! Progress reporting for long running operations
//!
//! Callers pass a [`ProgressConfig`] explicitly to every operation that reports
//! progress. The operation calls [`ProgressConfig::start`] once with the total
//! amount of work and then increments the returned [`Progress`] handle.

use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::sync::Arc;

/// Receiver of progress updates, for custom progress displays
pub trait ProgressMeter: Send + Sync {
    /// Called once before any increments
    fn start(&self, total: u64, desc: &str);

    fn increment(&self, n: u64);

    /// Called once after the last increment, including on early exit
    fn finish(&self);
}

/// How an operation should report its progress
#[derive(Clone, Default)]
pub enum ProgressConfig {
    #[default]
    Off,
    /// Terminal progress bar on stderr
    Bar,
    Custom(Arc<dyn ProgressMeter>),
}

impl fmt::Debug for ProgressConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressConfig::Off => f.write_str("Off"),
            ProgressConfig::Bar => f.write_str("Bar"),
            ProgressConfig::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl ProgressConfig {
    pub fn custom<M: ProgressMeter + 'static>(meter: M) -> Self {
        Self::Custom(Arc::new(meter))
    }

    /// Bar if `enabled`, otherwise off
    pub fn bar_if(enabled: bool) -> Self {
        if enabled {
            Self::Bar
        } else {
            Self::Off
        }
    }

    /// Begin tracking `total` units of work
    pub fn start(&self, total: u64, desc: &str) -> Progress {
        match self {
            ProgressConfig::Off => Progress::Off,
            ProgressConfig::Bar => {
                let bar = ProgressBar::new(total);
                let style = ProgressStyle::default_bar()
                    .template("{msg} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar());
                bar.set_style(style);
                bar.set_message(desc.to_string());
                Progress::Bar(bar)
            }
            ProgressConfig::Custom(meter) => {
                meter.start(total, desc);
                Progress::Custom(Arc::clone(meter))
            }
        }
    }
}

/// Handle to an active progress display, shareable across worker threads
pub enum Progress {
    Off,
    Bar(ProgressBar),
    Custom(Arc<dyn ProgressMeter>),
}

impl Progress {
    pub fn increment(&self, n: u64) {
        match self {
            Progress::Off => {}
            Progress::Bar(bar) => bar.inc(n),
            Progress::Custom(meter) => meter.increment(n),
        }
    }

    pub fn finish(self) {
        match self {
            Progress::Off => {}
            Progress::Bar(bar) => bar.finish_and_clear(),
            Progress::Custom(meter) => meter.finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct Counter {
        total: AtomicU64,
        value: AtomicU64,
        finished: AtomicU64,
    }

    impl ProgressMeter for Counter {
        fn start(&self, total: u64, _desc: &str) {
            self.total.store(total, Ordering::SeqCst);
        }

        fn increment(&self, n: u64) {
            self.value.fetch_add(n, Ordering::SeqCst);
        }

        fn finish(&self) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_custom_meter_receives_updates() {
        let counter = Arc::new(Counter::default());
        let config = ProgressConfig::Custom(counter.clone());

        let progress = config.start(10, "test");
        progress.increment(4);
        progress.increment(6);
        progress.finish();

        assert_eq!(counter.total.load(Ordering::SeqCst), 10);
        assert_eq!(counter.value.load(Ordering::SeqCst), 10);
        assert_eq!(counter.finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_off_is_noop() {
        let progress = ProgressConfig::Off.start(5, "nothing");
        progress.increment(5);
        progress.finish();
        assert!(matches!(ProgressConfig::bar_if(false), ProgressConfig::Off));
    }
}
