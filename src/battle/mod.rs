//! Battle system - turn-based tactics on a hex grid
//!
//! Key pieces:
//! - The grid owns terrain and occupancy; the session owns entities
//! - Sight is ray-cast, radar ignores obstructions
//! - Active units run on energy and shed heat; overload shuts them down
//! - AI factions play greedily from a priority queue of scored actions

pub mod actions;
pub mod ai;
pub mod constants;
pub mod entity;
pub mod events;
pub mod grid;
pub mod hex;
pub mod pathfinding;
pub mod session;
pub mod subsystem;
pub mod templates;
pub mod terrain;
pub mod turn;
pub mod visibility;

// Re-exports for convenient access
pub use actions::{ActionOutcome, PotentialAction};
pub use ai::{AiCommander, AiProfile, BattleAi, TargetValuation, UniformValuation};
pub use constants::*;
pub use entity::{DamageReport, Entity, PowerState, TurnStart};
pub use events::{BattleEvent, BattleEventKind, BattleEventLog, BattleOutcome, BattlePhase};
pub use grid::{HexCell, HexEffect, HexGrid};
pub use hex::HexCoord;
pub use pathfinding::{
    find_all_reachable, find_approach_path, find_path, hex_distance, path_cost, zero_heuristic,
    Reachable,
};
pub use session::BattleSession;
pub use subsystem::{OperationalCondition, Subsystem};
pub use templates::{
    ActiveTemplate, DeliveryMethod, EffectType, EntityTemplate, HexEffectTemplate,
    MobilityTemplate, SubsystemTemplate, TargetMask, TemplateLibrary,
};
pub use terrain::{Biome, MovementType, TerrainCost};
pub use turn::{Controller, TurnScheduler};
pub use visibility::{can_target, resolve_in_range, SightSets};
