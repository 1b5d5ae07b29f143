//! Continuation tokens
//!
//! Token layout:
//!
//! ```text
//! [checksum: u32 big-endian][payload: JSON]
//! ```
//!
//! The checksum is CRC32 over the payload. The payload records the
//! continuation hash of the plan that produced the token and the cursor
//! position reached, so a token replayed against an incompatible plan is
//! rejected instead of resuming at a wrong position.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use thiserror::Error;

use crate::index::{IndexEntry, IndexKey};
use crate::plan::{PlanHashKind, PlanHashable, QueryPlan};

/// Continuation decoding and validation failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContinuationError {
    /// Fewer bytes than the checksum header
    #[error("continuation is {0} bytes, shorter than its header")]
    Truncated(usize),

    /// Payload does not match its checksum
    #[error("continuation checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    Checksum { stored: u32, computed: u32 },

    /// Payload is not a valid position
    #[error("continuation payload is invalid: {0}")]
    Payload(String),

    /// Position does not fit the plan node it is applied to
    #[error("continuation position {0} does not fit the plan")]
    Shape(String),

    /// Token produced by a different plan
    #[error("continuation belongs to plan {found}, not {expected}")]
    PlanMismatch { expected: i32, found: i32 },
}

/// Where a cursor stopped, per plan node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CursorPosition {
    /// Nothing left to return
    Exhausted,
    /// Record scan, after the given primary key
    Scan { after: Option<IndexKey> },
    /// Index scan, after the given entry
    Index { after: Option<IndexEntry> },
    /// IN-join, inside the inner run for `value`
    InJoin {
        index: usize,
        value: Json,
        inner: Option<Box<CursorPosition>>,
    },
    /// Ordered union, one position per branch
    OrderedUnion { children: Vec<CursorPosition> },
    /// Unordered union, inside branch `branch`
    Concat {
        branch: usize,
        inner: Option<Box<CursorPosition>>,
    },
    /// Primary-key distinct with the keys already returned
    Distinct {
        seen: Vec<IndexKey>,
        inner: Box<CursorPosition>,
    },
}

impl CursorPosition {
    /// Short name for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            CursorPosition::Exhausted => "exhausted",
            CursorPosition::Scan { .. } => "scan",
            CursorPosition::Index { .. } => "index",
            CursorPosition::InJoin { .. } => "in_join",
            CursorPosition::OrderedUnion { .. } => "ordered_union",
            CursorPosition::Concat { .. } => "concat",
            CursorPosition::Distinct { .. } => "distinct",
        }
    }
}

/// Decoded continuation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Continuation {
    /// `ForContinuation` hash of the producing plan
    pub plan_hash: i32,
    /// Position reached
    pub position: CursorPosition,
}

const HEADER_LEN: usize = 4;

impl Continuation {
    /// Continuation for `plan` at `position`
    pub fn new(plan: &QueryPlan, position: CursorPosition) -> Self {
        Self {
            plan_hash: plan.plan_hash(PlanHashKind::ForContinuation),
            position,
        }
    }

    /// Encodes the token
    pub fn to_bytes(&self) -> Result<Vec<u8>, ContinuationError> {
        let payload =
            serde_json::to_vec(self).map_err(|e| ContinuationError::Payload(e.to_string()))?;
        let checksum = crc32fast::hash(&payload);
        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(&checksum.to_be_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Decodes a token, verifying its checksum
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ContinuationError> {
        if bytes.len() < HEADER_LEN {
            return Err(ContinuationError::Truncated(bytes.len()));
        }
        let (header, payload) = bytes.split_at(HEADER_LEN);
        let stored = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let computed = crc32fast::hash(payload);
        if stored != computed {
            return Err(ContinuationError::Checksum { stored, computed });
        }
        serde_json::from_slice(payload).map_err(|e| ContinuationError::Payload(e.to_string()))
    }

    /// Checks the token was produced by a plan compatible with `plan`
    pub fn validate_for(&self, plan: &QueryPlan) -> Result<(), ContinuationError> {
        let expected = plan.plan_hash(PlanHashKind::ForContinuation);
        if self.plan_hash == expected {
            Ok(())
        } else {
            Err(ContinuationError::PlanMismatch {
                expected,
                found: self.plan_hash,
            })
        }
    }
}
