use crate::render::cache::AssemblyInfo;
use crate::render::cancel::CancelToken;
use crate::render::tile::TileHandle;
use std::collections::VecDeque;

/// Which in-flight passes survive when newer ones arrive or finish.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelPolicy {
    /// Cancel every outstanding pass before a new one starts. Only the newest pass can
    /// deliver.
    #[default]
    CancelBeforeExecNewer,
    /// Let older passes run; when a pass finishes, cancel every older one still outstanding.
    CancelAfterNewerDone,
    /// Never cancel. Every pass delivers, possibly out of sequence order.
    NoCancel,
}

impl std::str::FromStr for CancelPolicy {
    type Err = crate::foundation::error::TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cancel_before_exec_newer" | "before" => Ok(Self::CancelBeforeExecNewer),
            "cancel_after_newer_done" | "after" => Ok(Self::CancelAfterNewerDone),
            "no_cancel" | "none" => Ok(Self::NoCancel),
            other => Err(crate::foundation::error::TesseraError::validation(format!(
                "unknown cancel policy '{other}'"
            ))),
        }
    }
}

/// Lifecycle of a render pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassState {
    /// Submitted, assembly not started yet.
    Queued,
    /// Assembly in progress.
    Running,
    /// Assembled and delivered.
    Completed,
    /// Superseded; delivers nothing.
    Cancelled,
    /// Assembly failed; delivers nothing.
    Failed,
}

impl PassState {
    /// Completed, cancelled and failed passes are terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

pub(crate) struct PassRecord {
    seq: u64,
    state: PassState,
    cancel: CancelToken,
    /// Every tile this pass composites, reused ones included.
    tiles: Vec<TileHandle>,
}

/// Sequence counter plus FIFO of outstanding passes, in sequence order.
///
/// Lives inside the renderer lock; every method assumes the caller holds it.
#[derive(Default)]
pub(crate) struct PassQueue {
    next_seq: u64,
    outstanding: VecDeque<PassRecord>,
}

impl PassQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Allocate the next sequence number.
    pub(crate) fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub(crate) fn enqueue(&mut self, seq: u64, cancel: CancelToken, tiles: Vec<TileHandle>) {
        debug_assert!(self.outstanding.back().is_none_or(|r| r.seq < seq));
        self.outstanding.push_back(PassRecord {
            seq,
            state: PassState::Queued,
            cancel,
            tiles,
        });
    }

    /// QUEUED -> RUNNING. Returns `false` when the pass is no longer outstanding.
    pub(crate) fn mark_running(&mut self, seq: u64) -> bool {
        match self.outstanding.iter_mut().find(|r| r.seq == seq) {
            Some(r) if r.state == PassState::Queued => {
                r.state = PassState::Running;
                true
            }
            _ => false,
        }
    }

    /// Cancel and dequeue every outstanding pass. Returns their sequence numbers.
    pub(crate) fn cancel_outstanding(&mut self, cache: &AssemblyInfo) -> Vec<u64> {
        let swept: Vec<PassRecord> = self.outstanding.drain(..).collect();
        self.cancel_swept(swept, cache)
    }

    /// Remove pass `seq` after it reached `terminal`, applying `policy` to older passes.
    /// Returns the sequence numbers cancelled as a consequence.
    ///
    /// The pass may already be gone: a concurrent submission or retirement can sweep it first.
    pub(crate) fn retire(
        &mut self,
        seq: u64,
        terminal: PassState,
        policy: CancelPolicy,
        cache: &AssemblyInfo,
    ) -> Vec<u64> {
        debug_assert!(terminal.is_terminal());
        match policy {
            CancelPolicy::CancelAfterNewerDone => {
                let mut swept = Vec::new();
                while let Some(head) = self.outstanding.front() {
                    if head.seq > seq {
                        break;
                    }
                    let Some(rec) = self.outstanding.pop_front() else {
                        break;
                    };
                    if rec.seq == seq {
                        break;
                    }
                    swept.push(rec);
                }
                self.cancel_swept(swept, cache)
            }
            CancelPolicy::CancelBeforeExecNewer | CancelPolicy::NoCancel => {
                if let Some(pos) = self.outstanding.iter().position(|r| r.seq == seq) {
                    self.outstanding.remove(pos);
                }
                Vec::new()
            }
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<(u64, PassState)> {
        self.outstanding.iter().map(|r| (r.seq, r.state)).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.outstanding.len()
    }

    // Tiles still referenced by the cache or a surviving pass keep running.
    fn cancel_swept(&self, swept: Vec<PassRecord>, cache: &AssemblyInfo) -> Vec<u64> {
        let mut cancelled = Vec::with_capacity(swept.len());
        for rec in swept {
            rec.cancel.cancel();
            for t in &rec.tiles {
                if !cache.holds(t) && !self.references(t) {
                    t.cancel();
                }
            }
            cancelled.push(rec.seq);
        }
        cancelled
    }

    fn references(&self, tile: &TileHandle) -> bool {
        self.outstanding
            .iter()
            .any(|r| r.tiles.iter().any(|t| t.same_tile(tile)))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/scheduler.rs"]
mod tests;
