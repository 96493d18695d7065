// Library metrics module
//
// Lightweight counters for installs, overlay traffic and reports

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters collected over the lifetime of a library.
///
/// Uses atomic operations so the overlay, installer and report pipeline can
/// share one instance behind an `Arc` without locking.
#[derive(Debug)]
pub struct Metrics {
    /// Archives installed successfully
    pub mods_installed: AtomicUsize,

    /// Archive installs that ended in an error
    pub install_failures: AtomicUsize,

    /// Files copied into the virtual directory
    pub overlay_files_copied: AtomicUsize,

    /// Files removed from the virtual directory
    pub overlay_files_removed: AtomicUsize,

    pub plugins_scanned: AtomicUsize,

    pub warnings_reported: AtomicUsize,

    /// Time spent in the extraction tool, in milliseconds
    pub total_extraction_time_ms: AtomicU64,

    /// Change events that had no subscriber
    pub unobserved_changes: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            mods_installed: AtomicUsize::new(0),
            install_failures: AtomicUsize::new(0),
            overlay_files_copied: AtomicUsize::new(0),
            overlay_files_removed: AtomicUsize::new(0),
            plugins_scanned: AtomicUsize::new(0),
            warnings_reported: AtomicUsize::new(0),
            total_extraction_time_ms: AtomicU64::new(0),
            unobserved_changes: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_mod_installed(&self) {
        self.mods_installed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_install_failure(&self) {
        self.install_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_files_copied(&self, count: usize) {
        self.overlay_files_copied.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_files_removed(&self, count: usize) {
        self.overlay_files_removed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_plugins_scanned(&self, count: usize) {
        self.plugins_scanned.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_warnings_reported(&self, count: usize) {
        self.warnings_reported.fetch_add(count, Ordering::Relaxed);
    }

    /// Record time spent extracting one archive
    pub fn record_extraction_time(&self, duration: Duration) {
        self.total_extraction_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_unobserved_change(&self) {
        self.unobserved_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average extraction time per installed archive in milliseconds
    pub fn avg_extraction_time_ms(&self) -> f64 {
        let total = self.total_extraction_time_ms.load(Ordering::Relaxed);
        let count = self.mods_installed.load(Ordering::Relaxed)
            + self.install_failures.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Library Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Installs: {} succeeded, {} failed (avg extraction: {:.2}ms)",
            self.mods_installed.load(Ordering::Relaxed),
            self.install_failures.load(Ordering::Relaxed),
            self.avg_extraction_time_ms()
        );
        tracing::info!(
            "Overlay: {} file(s) copied, {} removed",
            self.overlay_files_copied.load(Ordering::Relaxed),
            self.overlay_files_removed.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Reports: {} plugin(s) scanned, {} warning(s)",
            self.plugins_scanned.load(Ordering::Relaxed),
            self.warnings_reported.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        assert_eq!(metrics.mods_installed.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.overlay_files_copied.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_overlay_counters() {
        let metrics = Metrics::new();
        metrics.record_files_copied(3);
        metrics.record_files_copied(2);
        metrics.record_files_removed(1);

        assert_eq!(metrics.overlay_files_copied.load(Ordering::Relaxed), 5);
        assert_eq!(metrics.overlay_files_removed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_avg_extraction_time() {
        let metrics = Metrics::new();
        assert_eq!(metrics.avg_extraction_time_ms(), 0.0);

        metrics.record_mod_installed();
        metrics.record_extraction_time(Duration::from_millis(100));
        metrics.record_install_failure();
        metrics.record_extraction_time(Duration::from_millis(200));

        assert_eq!(metrics.avg_extraction_time_ms(), 150.0);
    }

    #[test]
    fn test_uptime() {
        let metrics = Metrics::new();
        thread::sleep(Duration::from_millis(10));
        assert!(metrics.uptime().as_millis() >= 10);
    }
}
