use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use crate::config::ScanConfig;
use crate::dns::RecordKind;
use crate::generator::{self, Ipv4Range};
use crate::lookup::LookupEngine;
use crate::output::{OutputRecord, OutputSink};
use crate::stats::{RateWindow, ScanStats, StatsSnapshot};

/// How often the throughput sampler wakes up.
const SAMPLE_PERIOD: Duration = Duration::from_secs(1);

/// How often the resolver pool is checked for staleness.
const POOL_MAINTENANCE_PERIOD: Duration = Duration::from_secs(60 * 60);

/// Event stream consumed by the display layer; the core only produces.
#[derive(Debug, Clone)]
pub enum ScanEvent {
	/// A successful resolution, in completion order
	Result(OutputRecord),
	/// A failed lookup, emitted only when debug is enabled
	Debug { ip: Ipv4Addr, reason: String },
	/// Periodic counter snapshot
	Stats(StatsSnapshot),
}

/// Run a scan pass to completion and return the final counters.
///
/// Lifecycle: a producer task feeds the generator's sequence into a
/// bounded queue (capacity = concurrency, so generation blocks when
/// every worker is busy); N workers drain it until the queue closes,
/// then finish their in-flight lookups and exit. Under `loop_forever`
/// the producer re-creates the generator pass with the same seed and
/// shard whenever it exhausts, and the queue never closes.
///
/// A failed lookup is terminal for its address within a pass; retries
/// happen inside the lookup engine, never by re-enqueueing.
pub async fn run(
	config: ScanConfig,
	range: Ipv4Range,
	engine: LookupEngine,
	sink: OutputSink,
	events: mpsc::UnboundedSender<ScanEvent>,
) -> StatsSnapshot {
	let stats = Arc::new(ScanStats::new());
	let engine = Arc::new(engine);
	let sink = Arc::new(sink);

	let (jobs_tx, jobs_rx) = mpsc::channel::<Ipv4Addr>(config.concurrency.max(1));
	let jobs_rx = Arc::new(Mutex::new(jobs_rx));

	let mut workers = Vec::with_capacity(config.concurrency);
	for _ in 0..config.concurrency.max(1) {
		workers.push(tokio::spawn(worker(
			jobs_rx.clone(),
			engine.clone(),
			stats.clone(),
			sink.clone(),
			events.clone(),
			config.debug,
		)));
	}

	let producer = {
		let shard = config.shard;
		let seed = config.seed;
		let loop_forever = config.loop_forever;
		tokio::spawn(async move {
			loop {
				for ip in generator::stream(range, shard, seed) {
					if jobs_tx.send(ip).await.is_err() {
						return;
					}
				}
				if !loop_forever {
					break;
				}
			}
			// Dropping the sender closes the queue and drains the workers
		})
	};

	let sampler = {
		let stats = stats.clone();
		let events = events.clone();
		tokio::spawn(async move {
			let mut window = RateWindow::new();
			let mut ticker = tokio::time::interval(SAMPLE_PERIOD);
			ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
			loop {
				ticker.tick().await;
				let rate = window.observe(stats.processed());
				if events.send(ScanEvent::Stats(stats.snapshot(rate))).is_err() {
					return;
				}
			}
		})
	};

	let maintenance = engine.pool().cloned().map(|pool| {
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(POOL_MAINTENANCE_PERIOD);
			ticker.tick().await;
			loop {
				ticker.tick().await;
				pool.refresh_if_stale().await;
			}
		})
	});

	for handle in workers {
		handle.await.ok();
	}
	producer.await.ok();
	sampler.abort();
	if let Some(handle) = maintenance {
		handle.abort();
	}

	let final_snapshot = stats.snapshot(0.0);
	events.send(ScanEvent::Stats(final_snapshot.clone())).ok();
	final_snapshot
}

/// One worker: pull addresses until the queue closes, resolve each,
/// and fan the outcome out to stats, the sink, and the display hook.
/// Every per-address error stops here.
async fn worker(
	jobs: Arc<Mutex<mpsc::Receiver<Ipv4Addr>>>,
	engine: Arc<LookupEngine>,
	stats: Arc<ScanStats>,
	sink: Arc<OutputSink>,
	events: mpsc::UnboundedSender<ScanEvent>,
	debug: bool,
) {
	loop {
		let ip = {
			let mut rx = jobs.lock().await;
			rx.recv().await
		};
		let Some(ip) = ip else {
			return;
		};

		let outcome = engine.resolve(ip).await;
		stats.add_processed();

		match outcome {
			Ok(resolution) => {
				stats.add_success();
				if resolution.kind == RecordKind::Cname {
					stats.add_cname();
				}

				let record = OutputRecord::new(ip, &resolution);
				if let Err(e) = sink.write(&record) {
					eprintln!("warning: output write failed: {}", e);
				}
				events.send(ScanEvent::Result(record)).ok();
			}
			Err(e) => {
				stats.add_failed();
				if debug {
					events.send(ScanEvent::Debug { ip, reason: e.to_string() }).ok();
				}
			}
		}
	}
}
