use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};

use crate::config::PoolConfig;

/// Direction of a pattern note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NoteKind {
    Left,
    Right,
}

impl NoteKind {
    pub const ALL: [NoteKind; 2] = [NoteKind::Left, NoteKind::Right];

    fn slot(self) -> usize {
        match self {
            NoteKind::Left => 0,
            NoteKind::Right => 1,
        }
    }
}

/// Identifier handed out by [`NotePool::acquire`].
///
/// Serials increase monotonically for the lifetime of the pool, so an id is
/// never reused even after its token has been recycled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NoteId {
    serial: u64,
    kind: NoteKind,
}

impl NoteId {
    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn kind(&self) -> NoteKind {
        self.kind
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.kind {
            NoteKind::Left => 'L',
            NoteKind::Right => 'R',
        };
        write!(f, "{tag}#{}", self.serial)
    }
}

/// Opaque reference to whatever the presentation layer draws for a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderHandle(pub u64);

/// Creates renderable counterparts for new pool tokens.
pub trait NoteFactory {
    fn create(&mut self, kind: NoteKind) -> RenderHandle;
}

/// Factory for sessions without a presentation layer.
#[derive(Debug, Default)]
pub struct HeadlessFactory {
    next: u64,
}

impl NoteFactory for HeadlessFactory {
    fn create(&mut self, _kind: NoteKind) -> RenderHandle {
        let handle = RenderHandle(self.next);
        self.next += 1;
        handle
    }
}

/// Pooled note. Only the pool mutates tokens; everyone else holds a [`NoteId`].
#[derive(Debug, Clone, PartialEq)]
pub struct NoteToken {
    pub kind: NoteKind,
    pub handle: RenderHandle,
    pub active: bool,
    /// Id of the current activation, `None` while the token sits in a free list.
    pub id: Option<NoteId>,
    /// Horizontal placement relative to the centre of the note lane.
    pub position: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub acquired: u64,
    pub released: u64,
    pub growth_events: u64,
    pub created: usize,
}

/// Free-list backed store of note tokens.
pub struct NotePool {
    factory: Box<dyn NoteFactory>,
    tokens: Vec<NoteToken>,
    free: [Vec<usize>; 2],
    active: HashMap<NoteId, usize>,
    next_serial: u64,
    expand_amount: usize,
    stats: PoolStats,
}

impl NotePool {
    pub fn new(config: &PoolConfig) -> Self {
        Self::with_factory(config, Box::new(HeadlessFactory::default()))
    }

    pub fn with_factory(config: &PoolConfig, factory: Box<dyn NoteFactory>) -> Self {
        let mut pool = Self {
            factory,
            tokens: Vec::new(),
            free: [Vec::new(), Vec::new()],
            active: HashMap::new(),
            next_serial: 0,
            expand_amount: config.expand_amount.max(1),
            stats: PoolStats::default(),
        };

        for kind in NoteKind::ALL {
            pool.create_tokens(kind, config.initial_size);
        }

        pool
    }

    /// Activates a token of `kind`, growing that kind's free list first when
    /// it is empty.
    pub fn acquire(&mut self, kind: NoteKind) -> (NoteId, &NoteToken) {
        if self.free[kind.slot()].is_empty() {
            tracing::debug!(?kind, amount = self.expand_amount, "expanding note pool");
            self.create_tokens(kind, self.expand_amount);
            self.stats.growth_events += 1;
        }

        let index = self.free[kind.slot()]
            .pop()
            .unwrap_or_else(|| self.push_token(kind));

        let id = NoteId {
            serial: self.next_serial,
            kind,
        };
        self.next_serial += 1;

        let token = &mut self.tokens[index];
        token.active = true;
        token.id = Some(id);
        token.position = 0.0;

        self.active.insert(id, index);
        self.stats.acquired += 1;

        (id, &self.tokens[index])
    }

    /// Returns a token to its free list. Unknown or already released ids are
    /// logged and ignored.
    pub fn release(&mut self, id: NoteId) -> bool {
        let Some(index) = self.active.remove(&id) else {
            tracing::warn!(%id, "release of a note that is not active");
            return false;
        };

        let token = &mut self.tokens[index];
        token.active = false;
        token.id = None;
        token.position = 0.0;

        self.free[token.kind.slot()].push(index);
        self.stats.released += 1;
        true
    }

    /// Releases every active token and returns how many there were.
    pub fn release_all(&mut self) -> usize {
        let mut ids: Vec<NoteId> = self.active.keys().copied().collect();
        ids.sort_unstable();

        for id in &ids {
            self.release(*id);
        }

        ids.len()
    }

    /// Moves an active token. Returns `false` for ids that are not active.
    pub fn place(&mut self, id: NoteId, position: f32) -> bool {
        match self.active.get(&id) {
            Some(&index) => {
                self.tokens[index].position = position;
                true
            }
            None => false,
        }
    }

    pub fn token(&self, id: NoteId) -> Option<&NoteToken> {
        self.active.get(&id).map(|&index| &self.tokens[index])
    }

    pub fn is_active(&self, id: NoteId) -> bool {
        self.active.contains_key(&id)
    }

    /// Active ids in acquisition order.
    pub fn active_ids(&self) -> Vec<NoteId> {
        let mut ids: Vec<NoteId> = self.active.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn available(&self, kind: NoteKind) -> usize {
        self.free[kind.slot()].len()
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    fn create_tokens(&mut self, kind: NoteKind, amount: usize) {
        for _ in 0..amount {
            let index = self.push_token(kind);
            self.free[kind.slot()].push(index);
        }
    }

    fn push_token(&mut self, kind: NoteKind) -> usize {
        let handle = self.factory.create(kind);
        self.tokens.push(NoteToken {
            kind,
            handle,
            active: false,
            id: None,
            position: 0.0,
        });
        self.stats.created = self.tokens.len();
        self.tokens.len() - 1
    }
}

impl fmt::Debug for NotePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotePool")
            .field("tokens", &self.tokens.len())
            .field("active", &self.active.len())
            .field("free_left", &self.free[0].len())
            .field("free_right", &self.free[1].len())
            .field("next_serial", &self.next_serial)
            .field("stats", &self.stats)
            .finish()
    }
}
