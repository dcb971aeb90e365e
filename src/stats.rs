use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Denominator for progress: the full IPv4 space. Shards report their
/// progress against the whole space, not their own partition, so all
/// participants in a distributed scan show comparable percentages.
pub const TOTAL_ADDRESS_SPACE: u64 = 1 << 32;

/// Number of one-second rate samples in the sliding window.
const RATE_WINDOW: usize = 5;

/// Monotonic scan counters, incremented concurrently by every worker.
pub struct ScanStats {
	processed: AtomicU64,
	success: AtomicU64,
	failed: AtomicU64,
	cname: AtomicU64,
	started: Instant,
}

/// Point-in-time view of the counters plus the smoothed rate.
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
	pub processed: u64,
	pub success: u64,
	pub failed: u64,
	pub cname: u64,
	pub elapsed: Duration,
	/// Sliding-window mean of per-second throughput
	pub rate: f64,
}

impl ScanStats {
	pub fn new() -> ScanStats {
		ScanStats {
			processed: AtomicU64::new(0),
			success: AtomicU64::new(0),
			failed: AtomicU64::new(0),
			cname: AtomicU64::new(0),
			started: Instant::now(),
		}
	}

	pub fn add_processed(&self) {
		self.processed.fetch_add(1, Ordering::Relaxed);
	}

	pub fn add_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub fn add_failed(&self) {
		self.failed.fetch_add(1, Ordering::Relaxed);
	}

	pub fn add_cname(&self) {
		self.cname.fetch_add(1, Ordering::Relaxed);
	}

	pub fn processed(&self) -> u64 {
		self.processed.load(Ordering::Relaxed)
	}

	pub fn snapshot(&self, rate: f64) -> StatsSnapshot {
		StatsSnapshot {
			processed: self.processed.load(Ordering::Relaxed),
			success: self.success.load(Ordering::Relaxed),
			failed: self.failed.load(Ordering::Relaxed),
			cname: self.cname.load(Ordering::Relaxed),
			elapsed: self.started.elapsed(),
			rate,
		}
	}
}

impl StatsSnapshot {
	pub fn percent_complete(&self) -> f64 {
		self.processed as f64 / TOTAL_ADDRESS_SPACE as f64 * 100.0
	}
}

/// Fixed-size sliding window of throughput samples.
///
/// The low-frequency sampler pushes one addresses-per-second reading
/// roughly every second; the mean of the window is the displayed rate.
/// Bounded history damps bursty per-second variance without retaining
/// the whole run.
pub struct RateWindow {
	samples: VecDeque<f64>,
	last_processed: u64,
	last_time: Instant,
}

impl RateWindow {
	pub fn new() -> RateWindow {
		RateWindow {
			samples: VecDeque::with_capacity(RATE_WINDOW),
			last_processed: 0,
			last_time: Instant::now(),
		}
	}

	/// Record the current processed count and return the smoothed rate.
	///
	/// Returns the previous mean unchanged if less than a second has
	/// passed since the last accepted sample.
	pub fn observe(&mut self, processed: u64) -> f64 {
		let now = Instant::now();
		let elapsed = now.duration_since(self.last_time).as_secs_f64();
		if elapsed >= 1.0 {
			let delta = processed.saturating_sub(self.last_processed);
			self.push(delta as f64 / elapsed);
			self.last_processed = processed;
			self.last_time = now;
		}
		self.mean()
	}

	fn push(&mut self, rate: f64) {
		if self.samples.len() == RATE_WINDOW {
			self.samples.pop_front();
		}
		self.samples.push_back(rate);
	}

	pub fn mean(&self) -> f64 {
		if self.samples.is_empty() {
			return 0.0;
		}
		self.samples.iter().sum::<f64>() / self.samples.len() as f64
	}
}
