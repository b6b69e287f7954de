use serde::{Deserialize, Serialize};

/// Throughput snapshot exposed by `get_stats()`. Pure read, side-effect-free.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStats {
    pub processed_count: u64,
    pub failed_count: u64,
    pub current_tps: u64,
    pub peak_tps: u64,
    pub average_tps: f64,
    pub success_rate: f64,
    pub pending_queue_size: usize,
}

/// TPS accounting over one-second windows.
///
/// `current_tps` is the count of the last completed window; `peak_tps` the
/// running maximum; `average_tps` is cumulative over uptime.
#[derive(Debug)]
pub struct TpsMeter {
    started_ms: u64,
    processed: u64,
    failed: u64,
    window_start_ms: u64,
    window_count: u64,
    current_tps: u64,
    peak_tps: u64,
}

impl TpsMeter {
    pub fn new(now_ms: u64) -> Self {
        Self {
            started_ms: now_ms,
            processed: 0,
            failed: 0,
            window_start_ms: now_ms,
            window_count: 0,
            current_tps: 0,
            peak_tps: 0,
        }
    }

    /// Closes elapsed one-second windows. A fully idle window resets
    /// `current_tps` to 0.
    fn roll_window(&mut self, now_ms: u64) {
        let elapsed = now_ms.saturating_sub(self.window_start_ms);
        if elapsed < 1_000 {
            return;
        }
        let windows = elapsed / 1_000;
        self.current_tps = if windows == 1 { self.window_count } else { 0 };
        self.peak_tps = self.peak_tps.max(self.window_count);
        self.window_start_ms += windows * 1_000;
        self.window_count = 0;
    }

    pub fn record_processed(&mut self, now_ms: u64) {
        self.roll_window(now_ms);
        self.processed += 1;
        self.window_count += 1;
    }

    pub fn record_failed(&mut self) {
        self.failed += 1;
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn snapshot(&mut self, now_ms: u64, pending_queue_size: usize) -> PipelineStats {
        self.roll_window(now_ms);

        let uptime_secs = (now_ms.saturating_sub(self.started_ms) as f64 / 1_000.0).max(1.0);
        let submitted = self.processed + self.failed;
        let success_rate = if submitted == 0 {
            1.0
        } else {
            self.processed as f64 / submitted as f64
        };

        PipelineStats {
            processed_count: self.processed,
            failed_count: self.failed,
            current_tps: self.current_tps,
            peak_tps: self.peak_tps.max(self.window_count),
            average_tps: self.processed as f64 / uptime_secs,
            success_rate,
            pending_queue_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_of_k_yields_tps_k() {
        let mut meter = TpsMeter::new(0);
        for i in 0..7 {
            meter.record_processed(i * 100); // all within the first second
        }
        let stats = meter.snapshot(1_000, 0);
        assert_eq!(stats.current_tps, 7);
        assert_eq!(stats.peak_tps, 7);
        assert_eq!(stats.processed_count, 7);
    }

    #[test]
    fn test_idle_windows_drop_current_but_keep_peak() {
        let mut meter = TpsMeter::new(0);
        meter.record_processed(10);
        meter.record_processed(20);

        // 5 seconds of silence
        let stats = meter.snapshot(5_000, 0);
        assert_eq!(stats.current_tps, 0);
        assert_eq!(stats.peak_tps, 2);
    }

    #[test]
    fn test_failures_affect_success_rate_only() {
        let mut meter = TpsMeter::new(0);
        meter.record_processed(10);
        meter.record_failed();

        let stats = meter.snapshot(500, 3);
        assert_eq!(stats.processed_count, 1);
        assert_eq!(stats.failed_count, 1);
        assert!((stats.success_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(stats.pending_queue_size, 3);
    }
}
