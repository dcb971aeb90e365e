use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use rand::seq::SliceRandom;

/// Remote source of default resolvers when no file is given.
pub const DEFAULT_LIST_URL: &str = "https://public-dns.info/nameservers.txt";

/// Pools built from the remote default list are refreshed after this long.
const REFRESH_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

/// Round-robin list of DNS servers.
///
/// The endpoint list and rotation cursor live behind one mutex, so a
/// cursor advance and a list swap can never interleave: concurrent
/// callers see either the old list or the new one. The lock is held
/// only for the in-memory rotation step, never across I/O.
pub struct ResolverPool {
	rotation: Mutex<Rotation>,
	// Only pools built from the remote default list refresh themselves
	refreshes: bool,
	last_refresh: Mutex<Instant>,
}

struct Rotation {
	servers: Vec<SocketAddr>,
	cursor: usize,
}

impl ResolverPool {
	pub fn from_servers(servers: Vec<SocketAddr>) -> ResolverPool {
		ResolverPool {
			rotation: Mutex::new(Rotation { servers, cursor: 0 }),
			refreshes: false,
			last_refresh: Mutex::new(Instant::now()),
		}
	}

	/// Build a pool from a resolver file. File-based pools are never
	/// auto-refreshed.
	pub fn from_file(path: &str) -> Result<ResolverPool> {
		let servers = read_server_file(path)?;
		Ok(ResolverPool::from_servers(servers))
	}

	/// Build a pool from the remote default list, shuffled so that
	/// concurrent scanners do not all hammer the list head.
	pub async fn from_remote() -> Result<ResolverPool> {
		let mut servers = fetch_default_servers().await?;
		servers.shuffle(&mut rand::thread_rng());
		Ok(ResolverPool {
			rotation: Mutex::new(Rotation { servers, cursor: 0 }),
			refreshes: true,
			last_refresh: Mutex::new(Instant::now()),
		})
	}

	pub fn len(&self) -> usize {
		self.rotation.lock().unwrap().servers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Return the next server in round-robin order, or None if the
	/// pool is empty. Rotation is shared across all callers: retries
	/// continue around the ring rather than restarting it.
	pub fn next_server(&self) -> Option<SocketAddr> {
		let mut rotation = self.rotation.lock().unwrap();
		if rotation.servers.is_empty() {
			return None;
		}
		let server = rotation.servers[rotation.cursor];
		rotation.cursor = (rotation.cursor + 1) % rotation.servers.len();
		Some(server)
	}

	/// Re-fetch the remote default list if it is older than 24 hours.
	///
	/// The staleness check happens before any lock on the rotation is
	/// taken, and the fetch runs without holding either lock. On fetch
	/// failure the pool keeps its last-known-good list and the error is
	/// reported, never raised. Intended to be driven by a single
	/// maintenance task.
	pub async fn refresh_if_stale(&self) {
		if !self.refreshes {
			return;
		}
		{
			let last = self.last_refresh.lock().unwrap();
			if last.elapsed() < REFRESH_AFTER {
				return;
			}
		}

		match fetch_default_servers().await {
			Ok(mut servers) => {
				servers.shuffle(&mut rand::thread_rng());
				let count = servers.len();
				self.swap_servers(servers);
				*self.last_refresh.lock().unwrap() = Instant::now();
				eprintln!("refreshed resolver list: {} servers", count);
			}
			Err(e) => {
				eprintln!("warning: resolver list refresh failed, keeping current list: {}", e);
			}
		}
	}

	/// Replace the endpoint list wholesale and reset the cursor.
	fn swap_servers(&self, servers: Vec<SocketAddr>) {
		let mut rotation = self.rotation.lock().unwrap();
		rotation.servers = servers;
		rotation.cursor = 0;
	}
}

/// Parse a DNS server address string into a SocketAddr.
///
/// Supports formats:
///   "1.1.1.1"              -- IPv4, default port 53
///   "1.1.1.1:53"           -- IPv4 with explicit port
///   "2606:4700::1111"      -- bare IPv6, default port 53
///   "[2606:4700::1111]:53" -- bracketed IPv6 with port
pub fn parse_server(input: &str) -> Result<SocketAddr> {
	let trimmed = input.trim();
	if trimmed.is_empty() {
		return Err(anyhow!("empty DNS server address"));
	}

	let addr: SocketAddr = if trimmed.starts_with('[') {
		// Bracketed IPv6 with port: [::1]:53
		trimmed.parse()
			.map_err(|e| anyhow!("invalid bracketed IPv6 address '{}': {}", trimmed, e))?
	} else if trimmed.contains("::") || trimmed.matches(':').count() > 1 {
		// Bare IPv6 address without port
		let ip = trimmed.parse()
			.map_err(|e| anyhow!("invalid IPv6 address '{}': {}", trimmed, e))?;
		SocketAddr::new(ip, 53)
	} else if let Ok(addr) = trimmed.parse::<SocketAddr>() {
		// IPv4 with port (e.g. "8.8.8.8:5353")
		addr
	} else {
		// Plain IPv4 without port
		let ip = trimmed.parse()
			.map_err(|e| anyhow!("invalid IP address '{}': {}", trimmed, e))?;
		SocketAddr::new(ip, 53)
	};

	Ok(addr)
}

/// Read DNS server addresses from a file, one per line.
///
/// Blank lines and lines starting with '#' are skipped. A file with no
/// usable servers is a configuration error.
pub fn read_server_file(path: &str) -> Result<Vec<SocketAddr>> {
	let content = std::fs::read_to_string(path)
		.map_err(|e| anyhow!("failed to read DNS server file '{}': {}", path, e))?;
	let mut servers = Vec::new();
	for line in content.lines() {
		let trimmed = line.trim();
		if trimmed.is_empty() || trimmed.starts_with('#') {
			continue;
		}
		servers.push(parse_server(trimmed)?);
	}
	if servers.is_empty() {
		return Err(anyhow!("no valid DNS servers found in '{}'", path));
	}
	Ok(servers)
}

/// Fetch the public default resolver list.
///
/// Only plain IPv4 entries are kept; the scan targets the IPv4 space
/// and the list marks IPv6 servers with colons. Unparseable lines are
/// dropped rather than failing the whole fetch.
async fn fetch_default_servers() -> Result<Vec<SocketAddr>> {
	let body = reqwest::get(DEFAULT_LIST_URL).await
		.map_err(|e| anyhow!("failed to fetch resolver list: {}", e))?
		.error_for_status()
		.map_err(|e| anyhow!("resolver list fetch returned an error: {}", e))?
		.text().await
		.map_err(|e| anyhow!("failed to read resolver list body: {}", e))?;

	let servers: Vec<SocketAddr> = body.lines()
		.map(|line| line.trim())
		.filter(|line| !line.is_empty() && !line.starts_with('#') && !line.contains(':'))
		.filter_map(|line| parse_server(line).ok())
		.collect();

	if servers.is_empty() {
		return Err(anyhow!("remote resolver list contained no usable servers"));
	}
	Ok(servers)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn pool_of(addrs: &[&str]) -> ResolverPool {
		let servers = addrs.iter().map(|a| parse_server(a).unwrap()).collect();
		ResolverPool::from_servers(servers)
	}

	#[test]
	fn test_parse_ipv4_no_port() {
		let addr = parse_server("1.1.1.1").unwrap();
		assert_eq!(addr.port(), 53);
		assert_eq!(addr.ip().to_string(), "1.1.1.1");
	}

	#[test]
	fn test_parse_ipv4_with_port() {
		let addr = parse_server("8.8.8.8:5353").unwrap();
		assert_eq!(addr.port(), 5353);
		assert_eq!(addr.ip().to_string(), "8.8.8.8");
	}

	#[test]
	fn test_parse_ipv6_bare() {
		let addr = parse_server("2606:4700::1111").unwrap();
		assert_eq!(addr.port(), 53);
	}

	#[test]
	fn test_parse_ipv6_bracketed() {
		let addr = parse_server("[2606:4700::1111]:53").unwrap();
		assert_eq!(addr.port(), 53);
	}

	#[test]
	fn test_parse_invalid_input() {
		assert!(parse_server("not-an-ip").is_err());
		assert!(parse_server("").is_err());
	}

	#[test]
	fn test_rotation_alternates() {
		let pool = pool_of(&["1.1.1.1", "8.8.8.8"]);
		let a = pool.next_server().unwrap();
		let b = pool.next_server().unwrap();
		let c = pool.next_server().unwrap();
		assert_ne!(a, b);
		assert_eq!(a, c);
	}

	#[test]
	fn test_consecutive_servers_differ() {
		// With more than one endpoint, consecutive picks never repeat
		let pool = pool_of(&["1.1.1.1", "8.8.8.8", "9.9.9.9"]);
		let mut prev = pool.next_server().unwrap();
		for _ in 0..20 {
			let next = pool.next_server().unwrap();
			assert_ne!(prev, next);
			prev = next;
		}
	}

	#[test]
	fn test_single_server_repeats() {
		let pool = pool_of(&["1.1.1.1"]);
		assert_eq!(pool.next_server(), pool.next_server());
	}

	#[test]
	fn test_empty_pool_returns_none() {
		let pool = ResolverPool::from_servers(Vec::new());
		assert!(pool.is_empty());
		assert_eq!(pool.next_server(), None);
	}

	#[test]
	fn test_swap_resets_cursor() {
		let pool = pool_of(&["1.1.1.1", "8.8.8.8"]);
		pool.next_server();

		let replacement = vec![parse_server("9.9.9.9").unwrap()];
		pool.swap_servers(replacement);
		assert_eq!(pool.len(), 1);
		assert_eq!(pool.next_server().unwrap().ip().to_string(), "9.9.9.9");
	}

	#[test]
	fn test_read_server_file() {
		let path = std::env::temp_dir().join("ptrscan-resolver-file-test.txt");
		std::fs::write(&path, "# comment\n1.1.1.1\n\n8.8.8.8:5353\n").unwrap();

		let servers = read_server_file(path.to_str().unwrap()).unwrap();
		std::fs::remove_file(&path).ok();

		assert_eq!(servers.len(), 2);
		assert_eq!(servers[0].port(), 53);
		assert_eq!(servers[1].port(), 5353);
	}

	#[test]
	fn test_read_server_file_empty_is_error() {
		let path = std::env::temp_dir().join("ptrscan-resolver-empty-test.txt");
		std::fs::write(&path, "# only comments\n\n").unwrap();

		let result = read_server_file(path.to_str().unwrap());
		std::fs::remove_file(&path).ok();
		assert!(result.is_err());
	}

	#[tokio::test]
	async fn test_file_pool_never_refreshes() {
		let pool = pool_of(&["1.1.1.1"]);
		// Must return immediately without any network activity
		pool.refresh_if_stale().await;
		assert_eq!(pool.len(), 1);
	}
}
