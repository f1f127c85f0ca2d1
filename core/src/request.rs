//! Request types produced by workload sources

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Index of a logical workload pool
pub type PoolId = usize;

/// Unique request identifier
///
/// Only sources that care about per-request results (e.g. trace replay)
/// attach ids to their requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Operation kind of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OpType {
    /// Write a key from the key population
    Set,
    /// Write a key that is never read back
    LoneSet,
    /// Read a key from the key population
    Get,
    /// Read a key outside the key population (expected miss)
    LoneGet,
    /// Delete a key
    Del,
    /// Read-modify-write of an existing key
    Update,
    /// Append to a chained item
    AddChained,
    /// Read of a key that may or may not exist
    CouldExist,
}

impl OpType {
    /// Whether the stressor dispatches this kind to the cache
    pub fn is_supported(self) -> bool {
        matches!(
            self,
            OpType::Set | OpType::LoneSet | OpType::Get | OpType::LoneGet | OpType::Del
        )
    }
}

impl std::fmt::Display for OpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OpType::Set => "set",
            OpType::LoneSet => "loneSet",
            OpType::Get => "get",
            OpType::LoneGet => "loneGet",
            OpType::Del => "del",
            OpType::Update => "update",
            OpType::AddChained => "addChained",
            OpType::CouldExist => "couldExist",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for OpType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "set" => Ok(OpType::Set),
            "loneSet" => Ok(OpType::LoneSet),
            "get" => Ok(OpType::Get),
            "loneGet" => Ok(OpType::LoneGet),
            "del" | "delete" => Ok(OpType::Del),
            "update" => Ok(OpType::Update),
            "addChained" => Ok(OpType::AddChained),
            "couldExist" => Ok(OpType::CouldExist),
            other => Err(format!("unknown operation '{other}'")),
        }
    }
}

/// Outcome of a dispatched request, reported back to the workload source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpResult {
    /// Nothing was executed (unsupported operation kind)
    Nop,
    /// Read found the key
    GetHit,
    /// Read did not find the key
    GetMiss,
    /// Write stored the value
    SetSuccess,
    /// Write was rejected by the engine
    SetFailure,
    /// Delete removed the key
    DelSuccess,
    /// Delete found nothing to remove
    DelNotFound,
    /// The engine reported an error
    Error,
}

/// A single synthetic cache operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Key the operation targets
    pub key: Arc<str>,

    /// Operation kind
    pub op: OpType,

    /// Payload size for writes
    pub size: Option<usize>,

    /// Identifier for result notification
    pub id: Option<RequestId>,

    /// Time-to-live for writes, in seconds (0 = no expiry)
    pub ttl_secs: u32,
}

impl Request {
    /// Create a request without size, id or TTL
    pub fn new(key: impl Into<Arc<str>>, op: OpType) -> Self {
        Self {
            key: key.into(),
            op,
            size: None,
            id: None,
            ttl_secs: 0,
        }
    }

    /// Attach a payload size
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// Attach a request id
    pub fn with_id(mut self, id: impl Into<RequestId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach a TTL
    pub fn with_ttl(mut self, ttl_secs: u32) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let req = Request::new("key-1", OpType::Set)
            .with_size(16)
            .with_id(7)
            .with_ttl(30);

        assert_eq!(&*req.key, "key-1");
        assert_eq!(req.op, OpType::Set);
        assert_eq!(req.size, Some(16));
        assert_eq!(req.id, Some(RequestId(7)));
        assert_eq!(req.ttl_secs, 30);
    }

    #[test]
    fn test_supported_ops() {
        assert!(OpType::Set.is_supported());
        assert!(OpType::LoneSet.is_supported());
        assert!(OpType::Get.is_supported());
        assert!(OpType::LoneGet.is_supported());
        assert!(OpType::Del.is_supported());
        assert!(!OpType::Update.is_supported());
        assert!(!OpType::AddChained.is_supported());
        assert!(!OpType::CouldExist.is_supported());
    }

    #[test]
    fn test_op_type_parse_matches_display() {
        for op in [
            OpType::Set,
            OpType::LoneSet,
            OpType::Get,
            OpType::LoneGet,
            OpType::Del,
            OpType::Update,
            OpType::AddChained,
            OpType::CouldExist,
        ] {
            assert_eq!(op.to_string().parse::<OpType>().unwrap(), op);
        }
        assert_eq!("delete".parse::<OpType>().unwrap(), OpType::Del);
        assert!("scan".parse::<OpType>().is_err());
    }

    #[test]
    fn test_op_type_camel_case_serialization() {
        assert_eq!(serde_json::to_string(&OpType::LoneGet).unwrap(), "\"loneGet\"");
        assert_eq!(serde_json::to_string(&OpResult::GetMiss).unwrap(), "\"get_miss\"");
    }
}
