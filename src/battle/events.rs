//! Battle event log
//!
//! Everything observable that happens in a session is recorded here in
//! order, so a presentation layer (or a replay) can follow the battle
//! without poking at session internals.

use serde::{Deserialize, Serialize};

use crate::battle::entity::DamageReport;
use crate::battle::hex::HexCoord;
use crate::battle::subsystem::OperationalCondition;
use crate::battle::templates::EffectType;
use crate::core::types::{EntityId, Loyalty, Round};

/// Battle phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BattlePhase {
    #[default]
    Setup, // Placing units, no turn started yet
    Active,
    Finished,
}

/// Battle outcome, from the player's side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BattleOutcome {
    #[default]
    Undecided,
    Victory,
    Defeat,
    /// Round limit reached
    Stalemate,
}

/// Log entry for battle events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleEvent {
    pub round: Round,
    pub kind: BattleEventKind,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BattleEventKind {
    BattleStarted,
    TurnStarted {
        faction: Loyalty,
    },
    EntitySpawned {
        entity: EntityId,
        at: HexCoord,
    },
    OccupancyChanged {
        hex: HexCoord,
        occupant: Option<EntityId>,
    },
    EntityMoved {
        entity: EntityId,
        from: HexCoord,
        to: HexCoord,
        cost: u32,
    },
    SystemOperated {
        entity: EntityId,
        subsystem: String,
        target: HexCoord,
    },
    EntityAffected {
        entity: EntityId,
        effect: EffectType,
        report: DamageReport,
    },
    SubsystemHit {
        entity: EntityId,
        subsystem: String,
        condition: OperationalCondition,
    },
    HexEffectPlaced {
        hex: HexCoord,
        effect: String,
    },
    EntityShutDown {
        entity: EntityId,
        overheated: bool,
    },
    EntityDestroyed {
        entity: EntityId,
        at: HexCoord,
    },
    BattleEnded {
        outcome: BattleOutcome,
    },
}

/// Ordered log of everything that happened in a session
#[derive(Debug, Clone, Default)]
pub struct BattleEventLog {
    events: Vec<BattleEvent>,
}

impl BattleEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: BattleEventKind, description: String, round: Round) {
        self.events.push(BattleEvent {
            round,
            kind,
            description,
        });
    }

    pub fn events(&self) -> &[BattleEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Take every event recorded so far
    pub fn drain(&mut self) -> Vec<BattleEvent> {
        std::mem::take(&mut self.events)
    }
}
