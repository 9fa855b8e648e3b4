//! Epoch to terminal-slot resolution.

use super::{ChainRpc, RpcError};
use crate::domain::{Epoch, Slot};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("epoch {epoch} has no schedule yet (chain is at epoch {live})")]
    NotScheduled { epoch: Epoch, live: Epoch },

    #[error("slot arithmetic overflowed for epoch {epoch}")]
    Overflow { epoch: Epoch },
}

/// Resolves epochs against a live RPC endpoint.
pub struct EpochResolver<'a> {
    rpc: &'a dyn ChainRpc,
}

impl<'a> EpochResolver<'a> {
    pub fn new(rpc: &'a dyn ChainRpc) -> Self {
        Self { rpc }
    }

    /// Last slot belonging to `epoch`.
    ///
    /// Epochs past the chain's current one are rejected: their snapshots
    /// cannot exist yet.
    pub fn last_slot(&self, epoch: Epoch) -> Result<Slot, ResolutionError> {
        let live = self.live_epoch()?;
        if epoch > live {
            return Err(ResolutionError::NotScheduled { epoch, live });
        }

        let schedule = self.rpc.epoch_schedule()?;
        let slot = schedule
            .last_slot_in_epoch(epoch)
            .ok_or(ResolutionError::Overflow { epoch })?;
        debug!(%epoch, %slot, "resolved terminal slot");
        Ok(slot)
    }

    /// Epoch the chain is currently in.
    pub fn live_epoch(&self) -> Result<Epoch, ResolutionError> {
        Ok(self.rpc.epoch_info()?.epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{EpochInfo, EpochSchedule};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedChain {
        live: Epoch,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FixedChain {
        fn at(live: u64) -> Self {
            Self {
                live: Epoch(live),
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ChainRpc for FixedChain {
        fn epoch_schedule(&self) -> Result<EpochSchedule, RpcError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RpcError::Transport("connection refused".into()));
            }
            Ok(EpochSchedule::without_warmup(432_000))
        }

        fn epoch_info(&self) -> Result<EpochInfo, RpcError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RpcError::Transport("connection refused".into()));
            }
            Ok(EpochInfo {
                epoch: self.live,
                absolute_slot: Slot(self.live.get() * 432_000 + 10),
                slot_index: 10,
                slots_in_epoch: 432_000,
                block_height: None,
            })
        }
    }

    #[test]
    fn resolves_completed_epoch() {
        let chain = FixedChain::at(520);
        let resolver = EpochResolver::new(&chain);
        assert_eq!(resolver.last_slot(Epoch(516)).unwrap(), Slot(223_343_999));
    }

    #[test]
    fn future_epoch_is_not_scheduled() {
        let chain = FixedChain::at(520);
        let resolver = EpochResolver::new(&chain);
        let err = resolver.last_slot(Epoch(521)).unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::NotScheduled { epoch: Epoch(521), live: Epoch(520) }
        ));
    }

    #[test]
    fn rpc_failure_surfaces() {
        let mut chain = FixedChain::at(520);
        chain.fail = true;
        let resolver = EpochResolver::new(&chain);
        assert!(matches!(
            resolver.last_slot(Epoch(516)),
            Err(ResolutionError::Rpc(RpcError::Transport(_)))
        ));
    }

    #[test]
    fn every_call_queries_the_endpoint() {
        let chain = FixedChain::at(520);
        let resolver = EpochResolver::new(&chain);
        resolver.last_slot(Epoch(516)).unwrap();
        resolver.last_slot(Epoch(516)).unwrap();
        assert_eq!(chain.calls.load(Ordering::SeqCst), 4);
    }
}
