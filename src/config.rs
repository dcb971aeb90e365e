use std::time::Duration;

use anyhow::{anyhow, Result};

/// Shard assignment within a distributed scan.
///
/// `{1, 1}` means no sharding. Invariant: 1 <= index <= total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSpec {
	pub index: u32,
	pub total: u32,
}

impl ShardSpec {
	pub const SOLO: ShardSpec = ShardSpec { index: 1, total: 1 };

	/// Parse a shard spec of the form "index/total" (e.g. "2/4").
	///
	/// An empty string means no sharding.
	pub fn parse(input: &str) -> Result<ShardSpec> {
		let trimmed = input.trim();
		if trimmed.is_empty() {
			return Ok(ShardSpec::SOLO);
		}

		let (index_str, total_str) = trimmed.split_once('/')
			.ok_or_else(|| anyhow!("invalid shard format '{}' (expected index/total)", trimmed))?;

		let index: u32 = index_str.trim().parse()
			.map_err(|e| anyhow!("invalid shard index '{}': {}", index_str, e))?;
		let total: u32 = total_str.trim().parse()
			.map_err(|e| anyhow!("invalid shard total '{}': {}", total_str, e))?;

		if index < 1 || index > total {
			return Err(anyhow!(
				"shard index must be between 1 and {} (got {})", total, index,
			));
		}

		Ok(ShardSpec { index, total })
	}
}

/// Scan configuration shared by the pipeline and its workers.
#[derive(Debug, Clone)]
pub struct ScanConfig {
	pub concurrency: usize,
	pub timeout: Duration,
	pub retries: u32,
	pub seed: u64,
	pub shard: ShardSpec,
	pub debug: bool,
	pub loop_forever: bool,
}
