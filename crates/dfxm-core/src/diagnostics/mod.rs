//! Run diagnostics: map statistics and a peak-memory monitor.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// NaN-aware summary of one moment map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub nan_count: usize,
}

/// Min, max and mean over finite values; NaN pixels are counted separately.
pub fn map_stats(map: &[f64]) -> MapStats {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0f64;
    let mut finite = 0usize;
    let mut nan_count = 0usize;

    for &v in map {
        if v.is_nan() {
            nan_count += 1;
            continue;
        }
        min = min.min(v);
        max = max.max(v);
        sum += v;
        finite += 1;
    }

    if finite == 0 {
        MapStats {
            min: f64::NAN,
            max: f64::NAN,
            mean: f64::NAN,
            nan_count,
        }
    } else {
        MapStats {
            min,
            max,
            mean: sum / finite as f64,
            nan_count,
        }
    }
}

/// Background thread sampling the process RSS while a pipeline runs.
///
/// Only implemented on Linux (`/proc/self/status`); elsewhere `stop`
/// reports no measurement.
pub struct MemoryMonitor {
    stop: Arc<AtomicBool>,
    peak_kb: Arc<AtomicUsize>,
    handle: Option<JoinHandle<()>>,
}

impl MemoryMonitor {
    /// Start sampling at roughly 10 Hz.
    pub fn start() -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let peak_kb = Arc::new(AtomicUsize::new(0));

        let handle = {
            let stop = Arc::clone(&stop);
            let peak_kb = Arc::clone(&peak_kb);
            std::thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    if let Some(rss) = current_rss_kb() {
                        peak_kb.fetch_max(rss, Ordering::Relaxed);
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
            })
        };

        Self {
            stop,
            peak_kb,
            handle: Some(handle),
        }
    }

    /// Stop sampling and report the peak RSS in kilobytes, if any sample
    /// succeeded.
    pub fn stop(mut self) -> Option<usize> {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        match self.peak_kb.load(Ordering::Relaxed) {
            0 => None,
            kb => Some(kb),
        }
    }
}

impl Drop for MemoryMonitor {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(target_os = "linux")]
fn current_rss_kb() -> Option<usize> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    status
        .lines()
        .find(|line| line.starts_with("VmRSS:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse().ok())
}

#[cfg(not(target_os = "linux"))]
fn current_rss_kb() -> Option<usize> {
    None
}
