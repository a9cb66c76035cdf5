//! Local plan anchor
//!
//! Stands in for the external trust anchor (a chain RPC in the original
//! deployment). Derives a deterministic anchor id from the plan hash and
//! a sequence number, so anchored plans remain traceable in logs without
//! any network dependency.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::application::ports::{AnchorError, AnchorReceipt, PlanAnchor};

pub struct LocalPlanAnchor {
    sequence: AtomicU64,
}

impl LocalPlanAnchor {
    pub fn new() -> Self {
        Self {
            sequence: AtomicU64::new(1),
        }
    }
}

impl Default for LocalPlanAnchor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlanAnchor for LocalPlanAnchor {
    async fn anchor(&self, plan_hash: &str) -> Result<AnchorReceipt, AnchorError> {
        if plan_hash.is_empty() {
            return Err(AnchorError::Rejected("empty plan hash".into()));
        }

        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let mut hasher = Sha256::new();
        hasher.update(plan_hash.as_bytes());
        hasher.update(seq.to_be_bytes());
        let anchor_id = format!("anchor-{}", hex::encode(&hasher.finalize()[..8]));

        info!(plan_hash, %anchor_id, "Plan hash anchored");
        Ok(AnchorReceipt { anchor_id })
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn anchors_produce_distinct_ids() {
        let anchor = LocalPlanAnchor::new();
        let a = anchor.anchor("deadbeef").await.unwrap();
        let b = anchor.anchor("deadbeef").await.unwrap();
        assert!(a.anchor_id.starts_with("anchor-"));
        assert_ne!(a.anchor_id, b.anchor_id);
    }

    #[tokio::test]
    async fn empty_hash_is_rejected() {
        let anchor = LocalPlanAnchor::new();
        assert!(matches!(
            anchor.anchor("").await,
            Err(AnchorError::Rejected(_))
        ));
    }
}
