use clap::Parser;

/// Reverse-DNS scanner for the IPv4 address space
#[derive(Parser, Debug)]
#[command(name = "ptrscan")]
#[command(about = "Stream reverse-DNS (PTR) records across the IPv4 address space")]
pub struct Cli {
	/// Concurrency level
	#[arg(short = 'c', long = "concurrency", default_value = "100")]
	pub concurrency: usize,

	/// Per-query timeout in milliseconds
	#[arg(short = 't', long = "timeout", default_value = "2000")]
	pub timeout: u64,

	/// Number of lookup attempts per address
	#[arg(short = 'r', long = "retries", default_value = "2")]
	pub retries: u32,

	/// File containing DNS servers (one per line); without it the
	/// public default list is fetched
	#[arg(short = 'f', long = "resolvers")]
	pub resolver_file: Option<String>,

	/// Path to the NDJSON output file
	#[arg(short = 'o', long = "output")]
	pub output: Option<String>,

	/// Seed for address generation (0 for random)
	#[arg(short = 's', long = "seed", default_value = "0")]
	pub seed: u64,

	/// Shard specification (e.g. 1/4 for the first shard of four)
	#[arg(long = "shard", default_value = "1/1")]
	pub shard: String,

	/// Show unsuccessful lookups
	#[arg(long = "debug")]
	pub debug: bool,

	/// Restart the address stream when a pass exhausts
	#[arg(long = "loop")]
	pub loop_forever: bool,
}
