//! Tickets and the chunk levels they propagate.
//!
//! A ticket at level `L` gives every chunk within Chebyshev distance `d` the
//! level `L + d`; a chunk's level is the minimum over all tickets. Lower is
//! stronger: at or below [`FULL_CHUNK_LEVEL`] a chunk is driven to `Full`,
//! above the ladder's max level it is unloaded.

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};
use stratum_utils::ChunkPos;

pub const FULL_CHUNK_LEVEL: u32 = 33;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TicketType {
    /// Spawn area.
    Start,
    Player,
    Forced,
    /// Added by a blocking chunk request; lives for one tick.
    Unknown,
}

impl TicketType {
    /// Ticks a ticket survives, or `None` for tickets that stay until removed.
    #[must_use]
    pub const fn timeout(self) -> Option<u64> {
        match self {
            Self::Unknown => Some(1),
            Self::Start | Self::Player | Self::Forced => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Player => "player",
            Self::Forced => "forced",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub kind: TicketType,
    pub pos: ChunkPos,
    pub level: u32,
    pub owner: u64,
    pub created_tick: u64,
}

impl Ticket {
    #[must_use]
    pub const fn new(kind: TicketType, pos: ChunkPos, level: u32, owner: u64) -> Self {
        Self {
            kind,
            pos,
            level,
            owner,
            created_tick: 0,
        }
    }

    fn same_identity(&self, other: &Self) -> bool {
        self.kind == other.kind && self.level == other.level && self.owner == other.owner
    }

    fn is_expired(&self, game_time: u64) -> bool {
        self.kind
            .timeout()
            .is_some_and(|timeout| self.created_tick + timeout <= game_time)
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} level {} owner {:#x} (tick {})",
            self.kind.name(),
            self.pos,
            self.level,
            self.owner,
            self.created_tick
        )
    }
}

/// A level change produced by [`DistanceManager::run_all_updates`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelChange {
    pub pos: ChunkPos,
    pub old: Option<u32>,
    pub new: Option<u32>,
}

/// Tickets by position plus the levels they propagate, recomputed lazily.
#[derive(Debug, Default)]
struct TicketSet {
    tickets: FxHashMap<ChunkPos, Vec<Ticket>>,
    levels: FxHashMap<ChunkPos, u32>,
    dirty: bool,
}

impl TicketSet {
    fn add(&mut self, ticket: Ticket) -> bool {
        let list = self.tickets.entry(ticket.pos).or_default();
        if let Some(existing) = list.iter_mut().find(|t| t.same_identity(&ticket)) {
            existing.created_tick = ticket.created_tick;
            return false;
        }
        list.push(ticket);
        self.dirty = true;
        true
    }

    fn remove(&mut self, ticket: &Ticket) -> bool {
        let Some(list) = self.tickets.get_mut(&ticket.pos) else {
            return false;
        };
        let before = list.len();
        list.retain(|t| !t.same_identity(ticket));
        let removed = list.len() != before;
        if list.is_empty() {
            self.tickets.remove(&ticket.pos);
        }
        self.dirty |= removed;
        removed
    }

    fn retain(&mut self, mut keep: impl FnMut(&Ticket) -> bool) -> usize {
        let mut removed = 0;
        self.tickets.retain(|_, list| {
            let before = list.len();
            list.retain(&mut keep);
            removed += before - list.len();
            !list.is_empty()
        });
        self.dirty |= removed > 0;
        removed
    }

    fn len(&self) -> usize {
        self.tickets.values().map(Vec::len).sum()
    }

    fn recompute(&mut self, max_level: u32) -> FxHashMap<ChunkPos, u32> {
        let mut levels = FxHashMap::default();
        for ticket in self.tickets.values().flatten() {
            if ticket.level > max_level {
                continue;
            }
            let radius = (max_level - ticket.level) as i32;
            for dz in -radius..=radius {
                for dx in -radius..=radius {
                    let pos = ticket.pos.offset(dx, dz);
                    let level = ticket.level + dx.unsigned_abs().max(dz.unsigned_abs());
                    levels
                        .entry(pos)
                        .and_modify(|current: &mut u32| *current = (*current).min(level))
                        .or_insert(level);
                }
            }
        }
        self.dirty = false;
        std::mem::replace(&mut self.levels, levels)
    }
}

pub struct DistanceManager {
    loading: TicketSet,
    ticking: TicketSet,
    forced: FxHashSet<ChunkPos>,
    max_level: u32,
    game_time: u64,
}

impl DistanceManager {
    #[must_use]
    pub fn new(max_level: u32) -> Self {
        Self {
            loading: TicketSet::default(),
            ticking: TicketSet::default(),
            forced: FxHashSet::default(),
            max_level,
            game_time: 0,
        }
    }

    #[must_use]
    pub const fn max_level(&self) -> u32 {
        self.max_level
    }

    /// Adds a ticket stamped with the current game time. Re-adding an
    /// identical ticket only refreshes its timestamp.
    pub fn add_ticket(&mut self, mut ticket: Ticket) -> bool {
        ticket.created_tick = self.game_time;
        self.loading.add(ticket)
    }

    pub fn remove_ticket(&mut self, ticket: &Ticket) -> bool {
        self.loading.remove(ticket)
    }

    /// Keeps every chunk within `radius` of `pos` at `Full`.
    pub fn add_region_ticket(&mut self, kind: TicketType, pos: ChunkPos, radius: u32, owner: u64) -> bool {
        self.add_ticket(Ticket::new(kind, pos, region_level(radius), owner))
    }

    pub fn remove_region_ticket(&mut self, kind: TicketType, pos: ChunkPos, radius: u32, owner: u64) -> bool {
        self.remove_ticket(&Ticket::new(kind, pos, region_level(radius), owner))
    }

    /// Makes chunks within `radius` of `pos` eligible for ticking.
    pub fn register_ticking(&mut self, pos: ChunkPos, radius: u32, owner: u64) -> bool {
        let mut ticket = Ticket::new(TicketType::Player, pos, region_level(radius), owner);
        ticket.created_tick = self.game_time;
        self.ticking.add(ticket)
    }

    pub fn release_ticking(&mut self, pos: ChunkPos, radius: u32, owner: u64) -> bool {
        self.ticking
            .remove(&Ticket::new(TicketType::Player, pos, region_level(radius), owner))
    }

    /// Forced chunks stay loaded at `Full` and always tick.
    pub fn update_forced(&mut self, pos: ChunkPos, forced: bool) -> bool {
        let ticket = Ticket::new(TicketType::Forced, pos, FULL_CHUNK_LEVEL, pos.as_long());
        if forced {
            self.forced.insert(pos);
            self.add_ticket(ticket)
        } else {
            self.forced.remove(&pos);
            self.remove_ticket(&ticket)
        }
    }

    /// Drops tickets whose timeout elapsed by `game_time`.
    pub fn purge_expired(&mut self, game_time: u64) -> usize {
        self.game_time = game_time;
        let purged = self.loading.retain(|ticket| !ticket.is_expired(game_time));
        if purged > 0 {
            log::debug!("Purged {purged} expired tickets at tick {game_time}");
        }
        purged
    }

    #[must_use]
    pub fn has_pending_updates(&self) -> bool {
        self.loading.dirty || self.ticking.dirty
    }

    /// Recomputes levels and returns every position whose level changed,
    /// sorted by position.
    pub fn run_all_updates(&mut self) -> Vec<LevelChange> {
        if self.ticking.dirty {
            self.ticking.recompute(FULL_CHUNK_LEVEL);
        }
        if !self.loading.dirty {
            return Vec::new();
        }

        let old = self.loading.recompute(self.max_level);
        let new = &self.loading.levels;
        let mut changes: Vec<LevelChange> = new
            .iter()
            .filter(|(pos, level)| old.get(pos) != Some(level))
            .map(|(&pos, &level)| LevelChange {
                pos,
                old: old.get(&pos).copied(),
                new: Some(level),
            })
            .collect();
        changes.extend(
            old.iter()
                .filter(|(pos, _)| !new.contains_key(pos))
                .map(|(&pos, &level)| LevelChange {
                    pos,
                    old: Some(level),
                    new: None,
                }),
        );
        changes.sort_unstable_by_key(|change| change.pos);
        changes
    }

    /// Level as of the last update pass.
    #[must_use]
    pub fn level(&self, pos: ChunkPos) -> Option<u32> {
        self.loading.levels.get(&pos).copied()
    }

    #[must_use]
    pub fn is_ticking(&self, pos: ChunkPos) -> bool {
        self.forced.contains(&pos) || self.ticking.levels.contains_key(&pos)
    }

    #[must_use]
    pub fn is_forced(&self, pos: ChunkPos) -> bool {
        self.forced.contains(&pos)
    }

    pub fn forced(&self) -> impl Iterator<Item = ChunkPos> + '_ {
        self.forced.iter().copied()
    }

    /// Tickets placed directly on `pos`.
    #[must_use]
    pub fn tickets_at(&self, pos: ChunkPos) -> Vec<Ticket> {
        self.loading.tickets.get(&pos).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn ticket_count(&self) -> usize {
        self.loading.len()
    }

    /// Tickets on `pos` or close enough to reach it, strongest first.
    #[must_use]
    pub fn ticket_summary(&self, pos: ChunkPos) -> String {
        let mut reaching: Vec<&Ticket> = self
            .loading
            .tickets
            .values()
            .flatten()
            .filter(|t| t.level + pos.chebyshev_distance(t.pos) as u32 <= self.max_level)
            .collect();
        reaching.sort_by_key(|t| t.level + pos.chebyshev_distance(t.pos) as u32);
        if reaching.is_empty() {
            return "none".to_string();
        }
        reaching
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

const fn region_level(radius: u32) -> u32 {
    FULL_CHUNK_LEVEL.saturating_sub(radius)
}
