mod cli;
mod config;
mod dns;
mod generator;
mod lookup;
mod output;
mod pipeline;
mod resolver;
mod stats;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;

use crate::cli::Cli;
use crate::config::{ScanConfig, ShardSpec};
use crate::generator::Ipv4Range;
use crate::lookup::LookupEngine;
use crate::output::{progress_line, OutputRecord, OutputSink};
use crate::pipeline::ScanEvent;
use crate::resolver::ResolverPool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();

	let shard = ShardSpec::parse(&cli.shard)?;
	let seed = if cli.seed == 0 { rand::random() } else { cli.seed };

	let config = ScanConfig {
		concurrency: cli.concurrency.max(1),
		timeout: Duration::from_millis(cli.timeout),
		retries: cli.retries.max(1),
		seed,
		shard,
		debug: cli.debug,
		loop_forever: cli.loop_forever,
	};

	let sink = match &cli.output {
		Some(path) => OutputSink::create(path)?,
		None => OutputSink::disabled(),
	};

	// A resolver file is used as-is; otherwise try the public default
	// list, degrading to the OS resolver if the fetch fails.
	let engine = match &cli.resolver_file {
		Some(path) => {
			let pool = Arc::new(ResolverPool::from_file(path)?);
			eprintln!("loaded {} DNS servers from {}", pool.len(), path);
			LookupEngine::with_pool(pool, config.timeout, config.retries)
		}
		None => match ResolverPool::from_remote().await {
			Ok(pool) => {
				let pool = Arc::new(pool);
				eprintln!("fetched {} DNS servers from the public list", pool.len());
				LookupEngine::with_pool(pool, config.timeout, config.retries)
			}
			Err(e) => {
				eprintln!("warning: could not fetch the default resolver list ({}), using the system resolver", e);
				LookupEngine::with_system_resolver(config.timeout)?
			}
		},
	};

	print_config_summary(&config, cli.output.as_deref());

	let (events_tx, mut events_rx) = mpsc::unbounded_channel();
	let printer = tokio::spawn(async move {
		while let Some(event) = events_rx.recv().await {
			match event {
				ScanEvent::Result(record) => println!("{}", format_result_line(&record)),
				ScanEvent::Debug { ip, reason } => {
					eprintln!("{:>15}  {}", ip, reason);
				}
				ScanEvent::Stats(snap) => eprintln!("{}", progress_line(&snap)),
			}
		}
	});

	let snapshot = pipeline::run(config, Ipv4Range::FULL, engine, sink, events_tx).await;
	printer.await?;

	eprintln!(
		"done: {} addresses, {} resolved, {} failed in {:.0?}",
		snapshot.processed, snapshot.success, snapshot.failed, snapshot.elapsed,
	);
	Ok(())
}

fn print_config_summary(config: &ScanConfig, output: Option<&str>) {
	eprintln!("concurrency:  {}", config.concurrency);
	eprintln!("timeout:      {} ms", config.timeout.as_millis());
	eprintln!("retries:      {}", config.retries);
	// Printed so a run can be reproduced with -s
	eprintln!("seed:         {}", config.seed);
	if config.shard != ShardSpec::SOLO {
		eprintln!("shard:        {}/{}", config.shard.index, config.shard.total);
	}
	if let Some(path) = output {
		eprintln!("output:       {}", path);
	}
	if config.loop_forever {
		eprintln!("loop:         enabled");
	}
}

/// One human-readable line per resolved address.
fn format_result_line(record: &OutputRecord) -> String {
	let name = match &record.target {
		Some(target) => format!("{} -> {}", record.ptr_record, target),
		None => record.ptr_record.clone(),
	};
	if record.dns_server.is_empty() {
		format!("{} {:>15}  {}", record.timestamp, record.ip_addr, name)
	} else {
		format!(
			"{} {:>15}  {:>15}  {}",
			record.timestamp, record.ip_addr, record.dns_server, name,
		)
	}
}
