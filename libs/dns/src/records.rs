//! The discovery record set and its digest.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::DnsError;

/// Column names for each entry of `record_infos`, in tuple order.
pub const RECORD_KEYS: [&str; 6] = ["id", "instance_group", "az", "network", "deployment", "ip"];

type RecordTuple = (String, String, Option<String>, String, String, String);

/// Structured attributes behind a single record.
///
/// Serialized as a positional array in [`RECORD_KEYS`] order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RecordTuple", into = "RecordTuple")]
pub struct RecordInfo {
    pub id: String,
    pub instance_group: String,
    pub az: Option<String>,
    pub network: String,
    pub deployment: String,
    pub ip: String,
}

impl From<RecordTuple> for RecordInfo {
    fn from((id, instance_group, az, network, deployment, ip): RecordTuple) -> Self {
        Self {
            id,
            instance_group,
            az,
            network,
            deployment,
            ip,
        }
    }
}

impl From<RecordInfo> for RecordTuple {
    fn from(info: RecordInfo) -> Self {
        (
            info.id,
            info.instance_group,
            info.az,
            info.network,
            info.deployment,
            info.ip,
        )
    }
}

/// Wire form of a record set.
///
/// Field order is part of the digest, so it must not be rearranged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedRecords {
    pub records: Vec<(String, String)>,
    pub version: i64,
    pub record_keys: Vec<String>,
    pub record_infos: Vec<RecordInfo>,
}

/// Builder for one publish cycle's record set.
#[derive(Debug, Clone)]
pub struct DnsRecords {
    version: i64,
    include_index_records: bool,
    domain_name: String,
    records: Vec<(String, String)>,
    record_infos: Vec<RecordInfo>,
}

impl DnsRecords {
    /// Create an empty record set.
    ///
    /// `version` is supplied by the caller and is expected to grow with every
    /// publish cycle.
    pub fn new(version: i64, include_index_records: bool, domain_name: impl Into<String>) -> Self {
        Self {
            version,
            include_index_records,
            domain_name: domain_name.into(),
            records: Vec::new(),
            record_infos: Vec::new(),
        }
    }

    /// Append one instance address.
    ///
    /// Adds the id-named record, then (when index records are on) the
    /// index-named alias for the same address.
    #[allow(clippy::too_many_arguments)]
    pub fn add_record(
        &mut self,
        instance_id: &str,
        index: &str,
        instance_group: &str,
        az: Option<&str>,
        network: &str,
        deployment: &str,
        ip: &str,
    ) {
        self.records.push((
            ip.to_string(),
            self.fqdn(instance_id, instance_group, network, deployment),
        ));

        if self.include_index_records {
            self.records.push((
                ip.to_string(),
                self.fqdn(index, instance_group, network, deployment),
            ));
        }

        self.record_infos.push(RecordInfo {
            id: instance_id.to_string(),
            instance_group: instance_group.to_string(),
            az: az.map(str::to_string),
            network: network.to_string(),
            deployment: deployment.to_string(),
            ip: ip.to_string(),
        });
    }

    fn fqdn(&self, head: &str, instance_group: &str, network: &str, deployment: &str) -> String {
        format!(
            "{}.{}.{}.{}.{}",
            head, instance_group, network, deployment, self.domain_name
        )
    }

    /// Caller-supplied version of this set.
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Replace the version, typically once the set is known to differ from
    /// the last published one.
    pub fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    /// Number of `(ip, fqdn)` pairs, including index aliases.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no record was added.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Produce the wire form.
    pub fn serialize(&self) -> SerializedRecords {
        SerializedRecords {
            records: self.records.clone(),
            version: self.version,
            record_keys: RECORD_KEYS.iter().map(|k| k.to_string()).collect(),
            record_infos: self.record_infos.clone(),
        }
    }

    /// Compact JSON for the wire form.
    pub fn to_json(&self) -> Result<String, DnsError> {
        Ok(serde_json::to_string(&self.serialize())?)
    }

    /// Hex SHA-256 of [`Self::to_json`].
    pub fn shasum(&self) -> Result<String, DnsError> {
        let json = self.to_json()?;
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}
