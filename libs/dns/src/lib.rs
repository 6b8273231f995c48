//! Discovery record synthesis.
//!
//! This library turns the set of running instances (with their addresses)
//! into the record set consumed by name resolution on every VM:
//!
//! - **Records**: ordered `(ip, fqdn)` pairs, one per instance address, plus
//!   an optional legacy index-named alias right after each one.
//! - **Record infos**: the structured tuple behind each record, keyed by the
//!   fixed `record_keys` schema.
//! - **Digest**: SHA-256 over the serialized set, so publishers can skip
//!   pushing a set that did not change.
//!
//! # Invariants
//!
//! - Output order is insertion order; nothing is sorted implicitly
//! - Same records, same order, same flags always give the same digest
//! - Index aliases never appear in `record_infos`

mod canonical;
mod error;
mod records;

pub use canonical::canonicalize;
pub use error::DnsError;
pub use records::{DnsRecords, RecordInfo, SerializedRecords, RECORD_KEYS};
