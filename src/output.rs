use std::fs::{File, OpenOptions};
use std::io::Write;
use std::net::Ipv4Addr;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::lookup::Resolution;
use crate::stats::StatsSnapshot;

/// One line of the NDJSON stream: a single successful resolution.
///
/// `target` is present only for CNAME records. `ttl` is 0 on the
/// system-resolver fallback path, which does not surface TTLs.
#[derive(Debug, Clone, Serialize)]
pub struct OutputRecord {
	pub timestamp: String,
	pub ip_addr: String,
	pub dns_server: String,
	pub ptr_record: String,
	pub record_type: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub target: Option<String>,
	pub ttl: u32,
}

impl OutputRecord {
	pub fn new(ip: Ipv4Addr, resolution: &Resolution) -> OutputRecord {
		OutputRecord {
			timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
			ip_addr: ip.to_string(),
			dns_server: resolution.resolver.clone(),
			ptr_record: resolution.name.clone(),
			record_type: resolution.kind.as_str(),
			target: resolution.target.clone(),
			ttl: resolution.ttl,
		}
	}
}

/// Append-only NDJSON destination shared by all workers.
///
/// Serialization and the append happen under one lock, so concurrent
/// writers never interleave or truncate lines. Without a configured
/// path every write is a no-op.
pub struct OutputSink {
	file: Option<Mutex<File>>,
}

impl OutputSink {
	/// No-op sink for runs without an output path.
	pub fn disabled() -> OutputSink {
		OutputSink { file: None }
	}

	/// Open (or create) the output file for appending. An unwritable
	/// path is a startup error.
	pub fn create(path: &str) -> Result<OutputSink> {
		let file = OpenOptions::new()
			.create(true)
			.append(true)
			.open(path)
			.map_err(|e| anyhow!("failed to open output file '{}': {}", path, e))?;
		Ok(OutputSink { file: Some(Mutex::new(file)) })
	}

	pub fn is_enabled(&self) -> bool {
		self.file.is_some()
	}

	/// Serialize the record and append it as one line.
	pub fn write(&self, record: &OutputRecord) -> Result<()> {
		let Some(file) = &self.file else {
			return Ok(());
		};

		let mut guard = file.lock().unwrap();
		let mut line = serde_json::to_string(record)?;
		line.push('\n');
		guard.write_all(line.as_bytes())?;
		Ok(())
	}
}

/// Render a stats snapshot as the one-line progress readout.
pub fn progress_line(snap: &StatsSnapshot) -> String {
	let success_pct = if snap.processed > 0 {
		snap.success as f64 / snap.processed as f64 * 100.0
	} else {
		0.0
	};
	let failed_pct = if snap.processed > 0 {
		snap.failed as f64 / snap.processed as f64 * 100.0
	} else {
		0.0
	};

	format!(
		"count {} | progress {:.4}% | rate {:.0}/s | ok {} ({:.1}%) | failed {} ({:.1}%)",
		snap.processed,
		snap.percent_complete(),
		snap.rate,
		snap.success,
		success_pct,
		snap.failed,
		failed_pct,
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dns::RecordKind;
	use std::sync::Arc;

	fn ptr_resolution(name: &str) -> Resolution {
		Resolution {
			name: name.to_string(),
			kind: RecordKind::Ptr,
			target: None,
			ttl: 300,
			resolver: "1.1.1.1".to_string(),
		}
	}

	fn temp_path(tag: &str) -> std::path::PathBuf {
		std::env::temp_dir().join(format!("ptrscan-output-{}-{}.ndjson", tag, std::process::id()))
	}

	#[test]
	fn test_ptr_record_omits_target() {
		let record = OutputRecord::new(Ipv4Addr::new(1, 2, 3, 4), &ptr_resolution("host.example.com"));
		let json = serde_json::to_string(&record).unwrap();
		assert!(json.contains("\"ip_addr\":\"1.2.3.4\""));
		assert!(json.contains("\"record_type\":\"PTR\""));
		assert!(json.contains("\"ttl\":300"));
		assert!(!json.contains("\"target\""));
	}

	#[test]
	fn test_cname_record_includes_target() {
		let resolution = Resolution {
			name: "4.3.2.1.in-addr.arpa".to_string(),
			kind: RecordKind::Cname,
			target: Some("4.0-24.3.2.1.in-addr.arpa".to_string()),
			ttl: 600,
			resolver: "8.8.8.8".to_string(),
		};
		let record = OutputRecord::new(Ipv4Addr::new(1, 2, 3, 4), &resolution);
		let json = serde_json::to_string(&record).unwrap();
		assert!(json.contains("\"record_type\":\"CNAME\""));
		assert!(json.contains("\"target\":\"4.0-24.3.2.1.in-addr.arpa\""));
	}

	#[test]
	fn test_disabled_sink_is_noop() {
		let sink = OutputSink::disabled();
		assert!(!sink.is_enabled());
		let record = OutputRecord::new(Ipv4Addr::new(1, 2, 3, 4), &ptr_resolution("h"));
		assert!(sink.write(&record).is_ok());
	}

	#[test]
	fn test_concurrent_writes_produce_whole_lines() {
		let path = temp_path("concurrent");
		let sink = Arc::new(OutputSink::create(path.to_str().unwrap()).unwrap());

		let mut handles = Vec::new();
		for worker in 0..8 {
			let sink = sink.clone();
			handles.push(std::thread::spawn(move || {
				for i in 0..50 {
					let name = format!("host-{}-{}.example.com", worker, i);
					let record = OutputRecord::new(
						Ipv4Addr::new(10, 0, worker, i),
						&ptr_resolution(&name),
					);
					sink.write(&record).unwrap();
				}
			}));
		}
		for handle in handles {
			handle.join().unwrap();
		}

		let content = std::fs::read_to_string(&path).unwrap();
		std::fs::remove_file(&path).ok();

		let lines: Vec<&str> = content.lines().collect();
		assert_eq!(lines.len(), 8 * 50);
		for line in lines {
			let value: serde_json::Value = serde_json::from_str(line).unwrap();
			assert!(value["ptr_record"].as_str().unwrap().ends_with(".example.com"));
		}
	}

	#[test]
	fn test_writes_append_across_sinks() {
		let path = temp_path("append");
		{
			let sink = OutputSink::create(path.to_str().unwrap()).unwrap();
			sink.write(&OutputRecord::new(Ipv4Addr::new(1, 1, 1, 1), &ptr_resolution("a"))).unwrap();
		}
		{
			let sink = OutputSink::create(path.to_str().unwrap()).unwrap();
			sink.write(&OutputRecord::new(Ipv4Addr::new(2, 2, 2, 2), &ptr_resolution("b"))).unwrap();
		}

		let content = std::fs::read_to_string(&path).unwrap();
		std::fs::remove_file(&path).ok();
		assert_eq!(content.lines().count(), 2);
	}

	#[test]
	fn test_progress_line_contents() {
		let snap = StatsSnapshot {
			processed: 200,
			success: 150,
			failed: 50,
			cname: 3,
			elapsed: std::time::Duration::from_secs(10),
			rate: 20.0,
		};
		let line = progress_line(&snap);
		assert!(line.contains("count 200"));
		assert!(line.contains("ok 150 (75.0%)"));
		assert!(line.contains("failed 50 (25.0%)"));
		assert!(line.contains("rate 20/s"));
	}
}
