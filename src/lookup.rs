use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use hickory_proto::op::ResponseCode;
use hickory_resolver::TokioResolver;
use thiserror::Error;
use tokio::net::UdpSocket;

use crate::dns::{build_ptr_query, canonical_name, classify_answer, parse_response, RecordKind};
use crate::resolver::ResolverPool;

/// Why a reverse lookup produced no record.
///
/// Per-address failures are absorbed at the worker boundary and turned
/// into counters; nothing here is fatal to the pipeline.
#[derive(Debug, Error)]
pub enum LookupError {
	#[error("no DNS servers available")]
	NoServers,
	#[error("timed out")]
	Timeout,
	#[error("socket error: {0}")]
	Socket(String),
	#[error("bad response: {0}")]
	Protocol(String),
	#[error("server returned {0}")]
	ResponseCode(String),
	#[error("no PTR record")]
	NoRecord,
	#[error("system resolver: {0}")]
	System(String),
}

/// A successful reverse lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
	/// Canonical record name, trimmed with the trailing dot stripped
	pub name: String,
	pub kind: RecordKind,
	/// Alias target for CNAME answers
	pub target: Option<String>,
	pub ttl: u32,
	/// Host of the server that answered, without port. Empty in
	/// system-resolver fallback mode.
	pub resolver: String,
}

/// Issues PTR queries with a bounded timeout, rotating through the
/// resolver pool on retry. Without a pool it falls back to the
/// operating system's resolver: single attempt, no rotation, TTL
/// reported as 0.
pub struct LookupEngine {
	pool: Option<Arc<ResolverPool>>,
	system: Option<TokioResolver>,
	timeout: Duration,
	retries: u32,
}

impl LookupEngine {
	pub fn with_pool(pool: Arc<ResolverPool>, timeout: Duration, retries: u32) -> LookupEngine {
		LookupEngine {
			pool: Some(pool),
			system: None,
			timeout,
			retries: retries.max(1),
		}
	}

	/// Build an engine over the OS default resolution mechanism.
	pub fn with_system_resolver(timeout: Duration) -> Result<LookupEngine> {
		let mut opts = hickory_resolver::config::ResolverOpts::default();
		opts.timeout = timeout;
		opts.attempts = 1;

		let resolver = TokioResolver::builder_tokio()
			.map_err(|e| anyhow!("failed to read system resolver config: {}", e))?
			.with_options(opts)
			.build();

		Ok(LookupEngine {
			pool: None,
			system: Some(resolver),
			timeout,
			retries: 1,
		})
	}

	pub fn pool(&self) -> Option<&Arc<ResolverPool>> {
		self.pool.as_ref()
	}

	/// Resolve one address to at most one outcome.
	///
	/// Attempts are strictly sequential, at most `retries` of them, and
	/// each retry obtains the next server from the rotation; an empty
	/// pool fails immediately without entering the retry loop.
	pub async fn resolve(&self, ip: Ipv4Addr) -> Result<Resolution, LookupError> {
		let Some(pool) = &self.pool else {
			return self.resolve_via_system(ip).await;
		};

		let mut server = pool.next_server().ok_or(LookupError::NoServers)?;
		let mut attempt = 0;
		loop {
			let failure = match self.query_server(ip, server).await {
				Ok(resolution) => return Ok(resolution),
				Err(e) => e,
			};

			attempt += 1;
			if attempt >= self.retries {
				return Err(failure);
			}
			server = pool.next_server().ok_or(LookupError::NoServers)?;
		}
	}

	/// One PTR query against one server over a dedicated UDP socket.
	///
	/// The socket is per-query so concurrent workers never steal each
	/// other's responses. Mismatched transaction IDs keep the receive
	/// loop listening until the attempt's deadline.
	async fn query_server(
		&self,
		ip: Ipv4Addr,
		server: SocketAddr,
	) -> Result<Resolution, LookupError> {
		let txid: u16 = rand::random();
		let query_bytes = build_ptr_query(ip, txid)
			.map_err(|e| LookupError::Protocol(e.to_string()))?;

		let bind_addr = if server.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
		let socket = UdpSocket::bind(bind_addr).await
			.map_err(|e| LookupError::Socket(e.to_string()))?;
		socket.send_to(&query_bytes, server).await
			.map_err(|e| LookupError::Socket(e.to_string()))?;

		let start = Instant::now();
		// 4096 bytes handles EDNS-extended responses
		let mut buf = vec![0u8; 4096];
		loop {
			let elapsed = start.elapsed();
			if elapsed >= self.timeout {
				return Err(LookupError::Timeout);
			}
			let remaining = self.timeout - elapsed;

			let (len, _src) = match tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await {
				Ok(Ok(received)) => received,
				Ok(Err(e)) => return Err(LookupError::Socket(e.to_string())),
				Err(_) => return Err(LookupError::Timeout),
			};

			let message = match parse_response(&buf[..len], txid) {
				Ok(message) => message,
				// txid mismatch or garbage; keep listening
				Err(_) => continue,
			};

			if message.response_code() != ResponseCode::NoError {
				return Err(LookupError::ResponseCode(
					message.response_code().to_string(),
				));
			}

			let classified = classify_answer(&message).ok_or(LookupError::NoRecord)?;
			let name = canonical_name(&classified.names)
				.ok_or(LookupError::NoRecord)?
				.to_string();

			return Ok(Resolution {
				name,
				kind: classified.kind,
				target: classified.target,
				ttl: classified.ttl,
				resolver: server.ip().to_string(),
			});
		}
	}

	async fn resolve_via_system(&self, ip: Ipv4Addr) -> Result<Resolution, LookupError> {
		let resolver = self.system.as_ref()
			.ok_or_else(|| LookupError::System("resolver not initialized".to_string()))?;

		let lookup = tokio::time::timeout(self.timeout, resolver.reverse_lookup(IpAddr::V4(ip)))
			.await
			.map_err(|_| LookupError::Timeout)?
			.map_err(|e| LookupError::System(e.to_string()))?;

		let names: Vec<String> = lookup.iter()
			.map(|ptr| crate::dns::clean_name(&ptr.0.to_utf8()))
			.collect();
		let name = canonical_name(&names)
			.ok_or(LookupError::NoRecord)?
			.to_string();

		// The high-level resolver does not expose the record TTL
		Ok(Resolution {
			name,
			kind: RecordKind::Ptr,
			target: None,
			ttl: 0,
			resolver: String::new(),
		})
	}
}
