use std::net::Ipv4Addr;

use anyhow::{anyhow, Result};
use hickory_proto::op::{Message, MessageType, Query};
use hickory_proto::rr::{Name, RData, RecordType};

/// Kind of record that satisfied a reverse lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
	Ptr,
	Cname,
}

impl RecordKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			RecordKind::Ptr => "PTR",
			RecordKind::Cname => "CNAME",
		}
	}
}

/// Usable content extracted from a reverse-lookup answer section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
	pub kind: RecordKind,
	pub names: Vec<String>,
	/// Alias target, present only for CNAME answers
	pub target: Option<String>,
	pub ttl: u32,
}

/// Build the reverse-lookup name for an IPv4 address
/// (e.g. 1.2.3.4 -> "4.3.2.1.in-addr.arpa").
pub fn reverse_name(ip: Ipv4Addr) -> String {
	let o = ip.octets();
	format!("{}.{}.{}.{}.in-addr.arpa", o[3], o[2], o[1], o[0])
}

/// Trim whitespace and strip the trailing root dot from a DNS name.
pub fn clean_name(name: &str) -> String {
	let trimmed = name.trim();
	trimmed.strip_suffix('.').unwrap_or(trimmed).to_string()
}

/// Build a PTR query message for the given IPv4 address.
///
/// Returns the serialized query bytes ready to send over UDP.
pub fn build_ptr_query(ip: Ipv4Addr, txid: u16) -> Result<Vec<u8>> {
	let name = Name::from_ascii(&reverse_name(ip))
		.map_err(|e| anyhow!("invalid reverse name for '{}': {}", ip, e))?;

	let mut message = Message::new();
	message.set_id(txid);
	message.set_recursion_desired(true);
	message.add_query(Query::query(name, RecordType::PTR));

	let bytes = message.to_vec()
		.map_err(|e| anyhow!("failed to serialize DNS query: {}", e))?;
	Ok(bytes)
}

/// Parse a DNS response, validating the transaction ID.
///
/// Returns an error if the response cannot be parsed, the txid does not
/// match, or the message is not a response.
pub fn parse_response(bytes: &[u8], expected_txid: u16) -> Result<Message> {
	let message = Message::from_vec(bytes)
		.map_err(|e| anyhow!("failed to parse DNS response: {}", e))?;

	if message.id() != expected_txid {
		return Err(anyhow!(
			"txid mismatch: expected {}, got {}",
			expected_txid, message.id()
		));
	}

	if message.message_type() != MessageType::Response {
		return Err(anyhow!("received a query instead of a response"));
	}

	Ok(message)
}

/// Classify the answer section of a reverse-lookup response.
///
/// PTR records win over CNAMEs; a CNAME with no PTR is reported as an
/// alias carrying the record's owner name and the alias target. Returns
/// None when the answer section holds nothing usable. Classification is
/// a pure function of the message, so an identical response always
/// yields an identical result.
pub fn classify_answer(message: &Message) -> Option<Classified> {
	let mut ptr_names = Vec::new();
	let mut ptr_ttl = 0u32;
	for record in message.answers() {
		if let RData::PTR(ptr) = record.data() {
			if ptr_names.is_empty() {
				ptr_ttl = record.ttl();
			}
			ptr_names.push(clean_name(&ptr.0.to_utf8()));
		}
	}
	if !ptr_names.is_empty() {
		return Some(Classified {
			kind: RecordKind::Ptr,
			names: ptr_names,
			target: None,
			ttl: ptr_ttl,
		});
	}

	for record in message.answers() {
		if let RData::CNAME(cname) = record.data() {
			return Some(Classified {
				kind: RecordKind::Cname,
				names: vec![clean_name(&record.name().to_utf8())],
				target: Some(clean_name(&cname.0.to_utf8())),
				ttl: record.ttl(),
			});
		}
	}

	None
}

/// Pick the canonical record from a list of answer names: the first
/// entry that is non-empty after cleaning.
pub fn canonical_name(names: &[String]) -> Option<&str> {
	names.iter()
		.map(|n| n.as_str())
		.find(|n| !n.is_empty())
}

#[cfg(test)]
mod tests {
	use super::*;
	use hickory_proto::rr::rdata::{CNAME, PTR};
	use hickory_proto::rr::Record;

	fn ptr_record(owner: &str, target: &str, ttl: u32) -> Record {
		Record::from_rdata(
			Name::from_ascii(owner).unwrap(),
			ttl,
			RData::PTR(PTR(Name::from_ascii(target).unwrap())),
		)
	}

	fn cname_record(owner: &str, target: &str, ttl: u32) -> Record {
		Record::from_rdata(
			Name::from_ascii(owner).unwrap(),
			ttl,
			RData::CNAME(CNAME(Name::from_ascii(target).unwrap())),
		)
	}

	#[test]
	fn test_reverse_name() {
		assert_eq!(reverse_name(Ipv4Addr::new(1, 2, 3, 4)), "4.3.2.1.in-addr.arpa");
		assert_eq!(reverse_name(Ipv4Addr::new(0, 0, 0, 0)), "0.0.0.0.in-addr.arpa");
	}

	#[test]
	fn test_clean_name() {
		assert_eq!(clean_name("host.example.com."), "host.example.com");
		assert_eq!(clean_name("  host.example.com  "), "host.example.com");
		assert_eq!(clean_name("."), "");
	}

	#[test]
	fn test_build_ptr_query() {
		let bytes = build_ptr_query(Ipv4Addr::new(8, 8, 8, 8), 1234).unwrap();
		// DNS header is 12 bytes minimum
		assert!(bytes.len() >= 12);
		// Verify txid in first two bytes (big-endian)
		assert_eq!(bytes[0], (1234 >> 8) as u8);
		assert_eq!(bytes[1], (1234 & 0xff) as u8);

		let message = Message::from_vec(&bytes).unwrap();
		let query = &message.queries()[0];
		assert_eq!(query.query_type(), RecordType::PTR);
		assert_eq!(query.name().to_utf8(), "8.8.8.8.in-addr.arpa.");
	}

	#[test]
	fn test_parse_txid_mismatch() {
		let query_bytes = build_ptr_query(Ipv4Addr::new(1, 1, 1, 1), 1111).unwrap();
		let mut response = Message::from_vec(&query_bytes).unwrap();
		response.set_message_type(MessageType::Response);
		let response_bytes = response.to_vec().unwrap();

		let result = parse_response(&response_bytes, 2222);
		assert!(result.is_err());
		assert!(result.unwrap_err().to_string().contains("txid mismatch"));
	}

	#[test]
	fn test_parse_rejects_query() {
		let query_bytes = build_ptr_query(Ipv4Addr::new(1, 1, 1, 1), 42).unwrap();
		assert!(parse_response(&query_bytes, 42).is_err());
	}

	#[test]
	fn test_parse_truncated_buffer() {
		let bytes = vec![0u8; 5];
		assert!(parse_response(&bytes, 0).is_err());
	}

	#[test]
	fn test_classify_ptr_answer() {
		let mut message = Message::new();
		message.set_message_type(MessageType::Response);
		message.add_answer(ptr_record(
			"4.3.2.1.in-addr.arpa.", "host.example.com.", 300,
		));

		let classified = classify_answer(&message).unwrap();
		assert_eq!(classified.kind, RecordKind::Ptr);
		assert_eq!(classified.names, vec!["host.example.com".to_string()]);
		assert_eq!(classified.target, None);
		assert_eq!(classified.ttl, 300);
	}

	#[test]
	fn test_classify_cname_answer() {
		let mut message = Message::new();
		message.set_message_type(MessageType::Response);
		message.add_answer(cname_record(
			"4.3.2.1.in-addr.arpa.", "4.0-24.3.2.1.in-addr.arpa.", 600,
		));

		let classified = classify_answer(&message).unwrap();
		assert_eq!(classified.kind, RecordKind::Cname);
		assert_eq!(classified.names, vec!["4.3.2.1.in-addr.arpa".to_string()]);
		assert_eq!(classified.target, Some("4.0-24.3.2.1.in-addr.arpa".to_string()));
		assert_eq!(classified.ttl, 600);
	}

	#[test]
	fn test_ptr_wins_over_cname() {
		let mut message = Message::new();
		message.set_message_type(MessageType::Response);
		message.add_answer(cname_record(
			"4.3.2.1.in-addr.arpa.", "alias.example.com.", 60,
		));
		message.add_answer(ptr_record(
			"alias.example.com.", "host.example.com.", 120,
		));

		let classified = classify_answer(&message).unwrap();
		assert_eq!(classified.kind, RecordKind::Ptr);
		assert_eq!(classified.ttl, 120);
	}

	#[test]
	fn test_classify_empty_answer() {
		let mut message = Message::new();
		message.set_message_type(MessageType::Response);
		assert_eq!(classify_answer(&message), None);
	}

	#[test]
	fn test_classify_is_idempotent() {
		let mut message = Message::new();
		message.set_message_type(MessageType::Response);
		message.add_answer(ptr_record(
			"8.8.8.8.in-addr.arpa.", "dns.google.", 100,
		));

		let first = classify_answer(&message);
		let second = classify_answer(&message);
		assert_eq!(first, second);
	}

	#[test]
	fn test_canonical_name_skips_empty() {
		let names = vec!["".to_string(), "host.example.com".to_string()];
		assert_eq!(canonical_name(&names), Some("host.example.com"));
		assert_eq!(canonical_name(&[]), None);
		assert_eq!(canonical_name(&["".to_string()]), None);
	}
}
