use std::net::Ipv4Addr;

use crate::config::ShardSpec;

/// A contiguous range of IPv4 addresses described by a start address and a
/// length. The full address space is `Ipv4Range::FULL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Range {
	pub start: u32,
	pub len: u64,
}

impl Ipv4Range {
	/// The entire IPv4 address space (0.0.0.0/0).
	pub const FULL: Ipv4Range = Ipv4Range { start: 0, len: 1 << 32 };

	pub fn new(start: Ipv4Addr, len: u64) -> Ipv4Range {
		Ipv4Range { start: u32::from(start), len }
	}
}

// Full-period LCG multiplier (Numerical Recipes). Satisfies the
// Hull-Dobell conditions for any power-of-two modulus together with
// an odd increment, so one cycle visits every residue exactly once.
const LCG_MULTIPLIER: u64 = 1664525;

/// A lazy, deterministic pseudo-random permutation of an IPv4 range,
/// optionally restricted to one shard of a distributed scan.
///
/// For a fixed `(range, seed)`, the sequences produced for shards
/// `1..=total` are disjoint and together cover the range exactly once.
/// The order is reproducible from the seed, and a pass is finite:
/// re-creating the stream with the same arguments replays the same
/// sequence from the beginning.
///
/// Internally a full-period LCG over the next power of two above the
/// range length, cycle-walking past values outside the range. Shard k
/// of n keeps every n-th surviving value, starting at position k-1.
pub struct AddressStream {
	state: u64,
	incr: u64,
	mask: u64,
	start: u32,
	len: u64,
	shard: ShardSpec,
	// Raw LCG steps left in the cycle and the position of the next
	// in-range value within the permutation.
	raw_left: u64,
	pos: u64,
}

/// Create the address stream for one shard of a range.
pub fn stream(range: Ipv4Range, shard: ShardSpec, seed: u64) -> AddressStream {
	// Modulus must cover the range; a floor of 4 keeps the LCG
	// well-defined for tiny ranges.
	let modulus = range.len.next_power_of_two().max(4);
	let mask = modulus - 1;

	AddressStream {
		state: seed & mask,
		incr: (seed >> 16) | 1,
		mask,
		start: range.start,
		len: range.len,
		shard,
		raw_left: modulus,
		pos: 0,
	}
}

impl Iterator for AddressStream {
	type Item = Ipv4Addr;

	fn next(&mut self) -> Option<Ipv4Addr> {
		while self.raw_left > 0 {
			self.raw_left -= 1;
			let value = self.state;
			self.state = LCG_MULTIPLIER
				.wrapping_mul(self.state)
				.wrapping_add(self.incr) & self.mask;

			// Cycle-walk: skip values beyond the range length
			if value >= self.len {
				continue;
			}

			let position = self.pos;
			self.pos += 1;

			if position % self.shard.total as u64 == (self.shard.index - 1) as u64 {
				let offset = value as u32;
				return Some(Ipv4Addr::from(self.start.wrapping_add(offset)));
			}
		}
		None
	}
}
