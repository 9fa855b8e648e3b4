//! Chain RPC access and epoch-to-slot resolution.
//!
//! The `ChainRpc` trait abstracts over the JSON-RPC endpoint so resolution
//! logic can be exercised against a fixed schedule in tests. Nothing here
//! caches: every call is a live query.

pub mod resolver;
pub mod rpc;

pub use resolver::{EpochResolver, ResolutionError};
pub use rpc::{JsonRpcClient, DEFAULT_RPC_ENDPOINT};

use crate::domain::{Epoch, Slot};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest epoch length during warmup.
pub const MINIMUM_SLOTS_PER_EPOCH: u64 = 32;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("rpc transport error: {0}")]
    Transport(String),

    #[error("rpc endpoint returned HTTP {status}")]
    Status { status: u16 },

    #[error("rpc error {code}: {message}")]
    Response { code: i64, message: String },

    #[error("malformed rpc response: {0}")]
    Decode(String),
}

/// Epoch schedule as reported by `getEpochSchedule`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochSchedule {
    pub slots_per_epoch: u64,
    pub leader_schedule_slot_offset: u64,
    pub warmup: bool,
    pub first_normal_epoch: u64,
    pub first_normal_slot: u64,
}

impl EpochSchedule {
    /// Schedule without warmup: every epoch has `slots_per_epoch` slots.
    pub fn without_warmup(slots_per_epoch: u64) -> Self {
        Self {
            slots_per_epoch,
            leader_schedule_slot_offset: slots_per_epoch,
            warmup: false,
            first_normal_epoch: 0,
            first_normal_slot: 0,
        }
    }

    /// First slot of `epoch`, `None` on overflow.
    pub fn first_slot_in_epoch(&self, epoch: Epoch) -> Option<Slot> {
        let epoch = epoch.get();
        let slot = if epoch <= self.first_normal_epoch {
            let exp = u32::try_from(epoch).ok()?;
            2u64.checked_pow(exp)?
                .checked_sub(1)?
                .checked_mul(MINIMUM_SLOTS_PER_EPOCH)?
        } else {
            (epoch - self.first_normal_epoch)
                .checked_mul(self.slots_per_epoch)?
                .checked_add(self.first_normal_slot)?
        };
        Some(Slot(slot))
    }

    /// Number of slots in `epoch`, `None` on overflow.
    pub fn slots_in_epoch(&self, epoch: Epoch) -> Option<u64> {
        let epoch = epoch.get();
        if epoch < self.first_normal_epoch {
            let exp = u32::try_from(epoch)
                .ok()?
                .checked_add(MINIMUM_SLOTS_PER_EPOCH.trailing_zeros())?;
            2u64.checked_pow(exp)
        } else {
            Some(self.slots_per_epoch)
        }
    }

    /// Last slot of `epoch`, `None` on overflow or a zero-length epoch.
    pub fn last_slot_in_epoch(&self, epoch: Epoch) -> Option<Slot> {
        let first = self.first_slot_in_epoch(epoch)?.get();
        let len = self.slots_in_epoch(epoch)?;
        first.checked_add(len)?.checked_sub(1).map(Slot)
    }
}

/// Current position of the chain as reported by `getEpochInfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochInfo {
    pub epoch: Epoch,
    pub absolute_slot: Slot,
    pub slot_index: u64,
    pub slots_in_epoch: u64,
    #[serde(default)]
    pub block_height: Option<u64>,
}

/// The two RPC queries the pipeline needs.
pub trait ChainRpc: Send + Sync {
    fn epoch_schedule(&self) -> Result<EpochSchedule, RpcError>;

    fn epoch_info(&self) -> Result<EpochInfo, RpcError>;
}
