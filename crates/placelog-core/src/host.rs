//! Host services the logger reads from
//!
//! Sessions, spatial anchors, region codes and social-graph contacts are all
//! owned by the hosting engine. These traits are the only surface the
//! pipeline sees; [`MemoryHost`] backs tests and the simulator.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

/// Identifier of a connected session
pub type SessionId = u64;

/// Where the process is running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostEnvironment {
    /// True for a deployed server, false for local/studio runs
    pub production: bool,
}

impl HostEnvironment {
    pub fn production() -> Self {
        Self { production: true }
    }

    pub fn local() -> Self {
        Self { production: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Coordinates rounded to the nearest integer
    pub fn rounded(&self) -> [i64; 3] {
        [
            self.x.round() as i64,
            self.y.round() as i64,
            self.z.round() as i64,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: SessionId,
    /// Account identifier used by the social graph
    pub user_id: u64,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("lookup failed: {0}")]
    Lookup(String),
    #[error("unknown session {0}")]
    UnknownSession(SessionId),
}

/// Currently connected sessions and their spatial anchors
pub trait SessionDirectory: Send + Sync {
    fn sessions(&self) -> Vec<SessionInfo>;

    fn session(&self, id: SessionId) -> Option<SessionInfo>;

    /// `None` when the session has no resolvable anchor (not spawned yet, dead, ...)
    fn anchor_position(&self, id: SessionId) -> Option<Position>;
}

/// Resolves the region code of a session
#[async_trait]
pub trait RegionLookup: Send + Sync {
    async fn region_for(&self, session: &SessionInfo) -> Result<String, HostError>;
}

/// Resolves a session's social-graph contacts
#[async_trait]
pub trait FriendsLookup: Send + Sync {
    async fn friend_user_ids(&self, session: &SessionInfo) -> Result<Vec<u64>, HostError>;
}

#[derive(Default)]
struct HostState {
    sessions: BTreeMap<SessionId, SessionInfo>,
    positions: HashMap<SessionId, Position>,
    regions: HashMap<SessionId, String>,
    friends: HashMap<u64, Vec<u64>>,
    fail_lookups: bool,
}

/// In-process host: a session table plus canned lookup answers
#[derive(Default)]
pub struct MemoryHost {
    state: RwLock<HostState>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HostState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HostState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn connect(&self, session: SessionInfo) {
        self.write().sessions.insert(session.id, session);
    }

    pub fn disconnect(&self, id: SessionId) -> Option<SessionInfo> {
        let mut state = self.write();
        state.positions.remove(&id);
        state.regions.remove(&id);
        state.sessions.remove(&id)
    }

    pub fn set_position(&self, id: SessionId, position: Option<Position>) {
        let mut state = self.write();
        match position {
            Some(p) => state.positions.insert(id, p),
            None => state.positions.remove(&id),
        };
    }

    pub fn set_region(&self, id: SessionId, region: impl Into<String>) {
        self.write().regions.insert(id, region.into());
    }

    pub fn set_friends(&self, user_id: u64, friends: Vec<u64>) {
        self.write().friends.insert(user_id, friends);
    }

    /// Make every region and friends lookup fail
    pub fn fail_lookups(&self, fail: bool) {
        self.write().fail_lookups = fail;
    }
}

impl SessionDirectory for MemoryHost {
    fn sessions(&self) -> Vec<SessionInfo> {
        self.read().sessions.values().cloned().collect()
    }

    fn session(&self, id: SessionId) -> Option<SessionInfo> {
        self.read().sessions.get(&id).cloned()
    }

    fn anchor_position(&self, id: SessionId) -> Option<Position> {
        self.read().positions.get(&id).copied()
    }
}

#[async_trait]
impl RegionLookup for MemoryHost {
    async fn region_for(&self, session: &SessionInfo) -> Result<String, HostError> {
        let state = self.read();
        if state.fail_lookups {
            return Err(HostError::Lookup("region service unavailable".to_string()));
        }
        state
            .regions
            .get(&session.id)
            .cloned()
            .ok_or(HostError::UnknownSession(session.id))
    }
}

#[async_trait]
impl FriendsLookup for MemoryHost {
    async fn friend_user_ids(&self, session: &SessionInfo) -> Result<Vec<u64>, HostError> {
        let state = self.read();
        if state.fail_lookups {
            return Err(HostError::Lookup("friends service unavailable".to_string()));
        }
        Ok(state.friends.get(&session.user_id).cloned().unwrap_or_default())
    }
}
