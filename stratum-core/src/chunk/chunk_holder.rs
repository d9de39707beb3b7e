//! Per-position generation state.

use std::sync::Arc;

use parking_lot::Mutex;
use stratum_utils::ChunkPos;

use crate::chunk::chunk_access::{ChunkAccess, ChunkStatus};
use crate::chunk::chunk_pyramid::StageLadder;
use crate::fatal::fatal_invariant;

/// Outcome of asking a holder for a stage.
#[derive(Debug, Clone)]
pub enum ChunkResult {
    Ready(Arc<ChunkAccess>),
    /// The stage is scheduled and will resolve.
    Pending,
    /// The stage failed, or the holder's level will never reach it.
    Failed,
}

impl ChunkResult {
    #[must_use]
    pub fn ready(self) -> Option<Arc<ChunkAccess>> {
        match self {
            Self::Ready(chunk) => Some(chunk),
            Self::Pending | Self::Failed => None,
        }
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Empty,
    Ready,
    Failed,
}

struct HolderState {
    chunk: Option<Arc<ChunkAccess>>,
    slots: [Slot; 12],
    generating: Option<(ChunkStatus, Arc<ChunkAccess>)>,
    history: Vec<ChunkStatus>,
    ticket_level: u32,
    ticking: bool,
}

pub struct ChunkHolder {
    pos: ChunkPos,
    pause_on_fatal: bool,
    state: Mutex<HolderState>,
}

impl ChunkHolder {
    #[must_use]
    pub fn new(pos: ChunkPos, ticket_level: u32, pause_on_fatal: bool) -> Self {
        Self {
            pos,
            pause_on_fatal,
            state: Mutex::new(HolderState {
                chunk: None,
                slots: [Slot::Empty; 12],
                generating: None,
                history: Vec::new(),
                ticket_level,
                ticking: false,
            }),
        }
    }

    #[inline]
    #[must_use]
    pub const fn pos(&self) -> ChunkPos {
        self.pos
    }

    #[must_use]
    pub fn ticket_level(&self) -> u32 {
        self.state.lock().ticket_level
    }

    pub fn set_ticket_level(&self, level: u32) {
        self.state.lock().ticket_level = level;
    }

    /// The stage this holder's level drives it to.
    #[must_use]
    pub fn target_status(&self, ladder: &StageLadder) -> Option<ChunkStatus> {
        ladder.status_for_level(self.ticket_level())
    }

    /// Resolves immediately when `stage` is done, pending while the level
    /// still covers it, failed otherwise.
    #[must_use]
    pub fn future_for(&self, stage: ChunkStatus, ladder: &StageLadder) -> ChunkResult {
        let state = self.state.lock();
        match state.slots[stage.index()] {
            Slot::Ready => match &state.chunk {
                Some(chunk) => ChunkResult::Ready(chunk.clone()),
                None => ChunkResult::Failed,
            },
            Slot::Failed => ChunkResult::Failed,
            Slot::Empty => {
                let covered = ladder
                    .status_for_level(state.ticket_level)
                    .is_some_and(|target| target >= stage);
                if covered { ChunkResult::Pending } else { ChunkResult::Failed }
            }
        }
    }

    /// The accessor and status of a stage running right now.
    #[must_use]
    pub fn currently_generating(&self) -> Option<(ChunkStatus, Arc<ChunkAccess>)> {
        self.state.lock().generating.clone()
    }

    #[must_use]
    pub fn chunk(&self) -> Option<Arc<ChunkAccess>> {
        self.state.lock().chunk.clone()
    }

    /// Highest completed stage.
    #[must_use]
    pub fn latest_status(&self) -> Option<ChunkStatus> {
        let state = self.state.lock();
        ChunkStatus::ALL
            .into_iter()
            .rev()
            .find(|status| state.slots[status.index()] == Slot::Ready)
    }

    /// The stage that would run next, if nothing is running or failed.
    #[must_use]
    pub fn next_status(&self) -> Option<ChunkStatus> {
        let state = self.state.lock();
        if state.generating.is_some() || state.slots.contains(&Slot::Failed) {
            return None;
        }
        match ChunkStatus::ALL
            .into_iter()
            .rev()
            .find(|status| state.slots[status.index()] == Slot::Ready)
        {
            Some(latest) => latest.next(),
            None => Some(ChunkStatus::Empty),
        }
    }

    #[must_use]
    pub fn full_chunk(&self) -> Option<Arc<ChunkAccess>> {
        let state = self.state.lock();
        if state.slots[ChunkStatus::Full.index()] == Slot::Ready {
            state.chunk.clone()
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state.lock().generating.is_some()
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.state.lock().slots.contains(&Slot::Failed)
    }

    #[must_use]
    pub fn is_ticking(&self) -> bool {
        self.state.lock().ticking
    }

    pub fn set_ticking(&self, ticking: bool) {
        self.state.lock().ticking = ticking;
    }

    /// Stages entered, in order.
    #[must_use]
    pub fn history(&self) -> Vec<ChunkStatus> {
        self.state.lock().history.clone()
    }

    /// Adopts a chunk read from storage; every stage up to its status is done.
    pub fn install_loaded(&self, chunk: Arc<ChunkAccess>) {
        let mut state = self.state.lock();
        let status = chunk.status();
        for stage in ChunkStatus::ALL.into_iter().take_while(|s| *s <= status) {
            state.slots[stage.index()] = Slot::Ready;
        }
        state.chunk = Some(chunk);
    }

    /// Records that `status` started on `chunk`. Stages must be entered in
    /// ladder order, one at a time.
    pub fn begin_stage(&self, status: ChunkStatus, chunk: Arc<ChunkAccess>) {
        let mut state = self.state.lock();
        let latest = ChunkStatus::ALL
            .into_iter()
            .rev()
            .find(|s| state.slots[s.index()] == Slot::Ready);
        let expected = latest.map_or(Some(ChunkStatus::Empty), ChunkStatus::next);
        if expected != Some(status) || state.generating.is_some() {
            let running = state.generating.as_ref().map(|(s, _)| *s);
            drop(state);
            fatal_invariant(
                self.pause_on_fatal,
                &format!(
                    "Chunk {} entered {status} out of order (latest {latest:?}, running {running:?})",
                    self.pos
                ),
            );
        }
        state.history.push(status);
        state.generating = Some((status, chunk));
    }

    /// Publishes `status` as done and clears the in-flight shortcut.
    pub fn finish_stage(&self, status: ChunkStatus) {
        let mut state = self.state.lock();
        match state.generating.take() {
            Some((running, chunk)) if running == status => {
                chunk.upgrade_status(status);
                state.slots[status.index()] = Slot::Ready;
                state.chunk = Some(chunk);
            }
            other => {
                let running = other.map(|(s, _)| s);
                drop(state);
                fatal_invariant(
                    self.pause_on_fatal,
                    &format!("Chunk {} finished {status} while running {running:?}", self.pos),
                );
            }
        }
    }

    /// Fails `status` and everything after it.
    pub fn fail_stage(&self, status: ChunkStatus) {
        let mut state = self.state.lock();
        state.generating = None;
        for stage in ChunkStatus::ALL.into_iter().skip(status.index()) {
            state.slots[stage.index()] = Slot::Failed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_ticket_manager::FULL_CHUNK_LEVEL;

    fn chunk() -> Arc<ChunkAccess> {
        Arc::new(ChunkAccess::new(ChunkPos::new(1, 1), 0, 32))
    }

    #[test]
    fn futures_follow_level_and_progress() {
        let ladder = StageLadder::overworld();
        let holder = ChunkHolder::new(ChunkPos::new(1, 1), FULL_CHUNK_LEVEL + 2, false);
        assert!(holder.future_for(ChunkStatus::Carvers, &ladder).is_pending());
        assert!(matches!(holder.future_for(ChunkStatus::Features, &ladder), ChunkResult::Failed));

        let chunk = chunk();
        holder.begin_stage(ChunkStatus::Empty, chunk.clone());
        assert_eq!(holder.currently_generating().map(|(s, _)| s), Some(ChunkStatus::Empty));
        holder.finish_stage(ChunkStatus::Empty);
        assert!(holder.future_for(ChunkStatus::Empty, &ladder).ready().is_some());
        assert_eq!(holder.next_status(), Some(ChunkStatus::StructureStarts));
        assert!(holder.currently_generating().is_none());
    }

    #[test]
    #[should_panic(expected = "out of order")]
    fn skipping_a_stage_is_fatal() {
        let holder = ChunkHolder::new(ChunkPos::new(1, 1), FULL_CHUNK_LEVEL, false);
        holder.begin_stage(ChunkStatus::Noise, chunk());
    }

    #[test]
    fn loaded_chunks_resolve_up_to_their_status() {
        let ladder = StageLadder::overworld();
        let holder = ChunkHolder::new(ChunkPos::new(1, 1), FULL_CHUNK_LEVEL, false);
        let chunk = chunk();
        chunk.upgrade_status(ChunkStatus::Surface);
        holder.install_loaded(chunk);
        assert!(holder.future_for(ChunkStatus::Noise, &ladder).ready().is_some());
        assert!(holder.future_for(ChunkStatus::Carvers, &ladder).is_pending());
        assert_eq!(holder.next_status(), Some(ChunkStatus::Carvers));
    }

    #[test]
    fn failure_poisons_later_stages() {
        let ladder = StageLadder::overworld();
        let holder = ChunkHolder::new(ChunkPos::new(1, 1), FULL_CHUNK_LEVEL, false);
        holder.begin_stage(ChunkStatus::Empty, chunk());
        holder.fail_stage(ChunkStatus::Empty);
        assert!(holder.is_failed());
        assert!(matches!(holder.future_for(ChunkStatus::Full, &ladder), ChunkResult::Failed));
        assert_eq!(holder.next_status(), None);
    }
}
