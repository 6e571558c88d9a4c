//! Battle session: the grid, its entities and everything that changes them
//!
//! A session owns all mutable battle state. Entities are only created,
//! damaged or removed through it, so grid occupancy, sight counters and the
//! event log always agree with the entity table.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::battle::entity::{DamageReport, Entity, TurnStart};
use crate::battle::events::{
    BattleEvent, BattleEventKind, BattleEventLog, BattleOutcome, BattlePhase,
};
use crate::battle::grid::{HexCell, HexGrid};
use crate::battle::hex::HexCoord;
use crate::battle::subsystem::Subsystem;
use crate::battle::templates::{EffectType, EntityTemplate, TemplateLibrary};
use crate::battle::terrain::{Biome, TerrainCost};
use crate::battle::turn::{Controller, TurnScheduler};
use crate::battle::visibility::{resolve_in_range, SightSets};
use crate::core::config::BattleConfig;
use crate::core::error::{Result, TacticsError};
use crate::core::types::{EntityId, Loyalty, Round};

/// Complete state of one battle
pub struct BattleSession {
    pub(crate) grid: HexGrid,
    pub(crate) entities: BTreeMap<EntityId, Entity>,
    /// Destroyed entities, in order of destruction
    pub(crate) fallen: Vec<Entity>,
    pub(crate) scheduler: TurnScheduler,
    pub(crate) config: BattleConfig,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) events: BattleEventLog,
    pub(crate) phase: BattlePhase,
    pub(crate) outcome: BattleOutcome,
    next_id: u32,
}

impl std::fmt::Debug for BattleSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BattleSession")
            .field("round", &self.round())
            .field("current_faction", &self.current_faction())
            .field("entities", &self.entities.len())
            .field("phase", &self.phase)
            .field("outcome", &self.outcome)
            .finish()
    }
}

impl BattleSession {
    pub fn new(grid: HexGrid, config: BattleConfig) -> Result<Self> {
        config.validate()?;
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Ok(Self {
            grid,
            entities: BTreeMap::new(),
            fallen: Vec::new(),
            scheduler: TurnScheduler::new(),
            config,
            rng,
            events: BattleEventLog::new(),
            phase: BattlePhase::Setup,
            outcome: BattleOutcome::Undecided,
            next_id: 1,
        })
    }

    pub fn grid(&self) -> &HexGrid {
        &self.grid
    }

    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    pub fn set_terrain(&mut self, coord: HexCoord, terrain: TerrainCost) {
        self.grid.set_terrain(coord, terrain);
    }

    pub fn set_biome(&mut self, coord: HexCoord, biome: Biome) {
        self.grid.set_biome(coord, biome);
    }

    /// Register a faction; turn order is registration order
    pub fn add_faction(&mut self, loyalty: Loyalty, controller: Controller) -> Result<()> {
        self.scheduler.add_faction(loyalty, controller)
    }

    pub fn phase(&self) -> BattlePhase {
        self.phase
    }

    pub fn outcome(&self) -> BattleOutcome {
        self.outcome
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, BattlePhase::Finished)
    }

    pub fn round(&self) -> Round {
        self.scheduler.round()
    }

    /// Faction whose turn it is (`None` before the first turn)
    pub fn current_faction(&self) -> Option<Loyalty> {
        self.scheduler.current()
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn fallen(&self) -> &[Entity] {
        &self.fallen
    }

    pub fn entity_at(&self, coord: HexCoord) -> Option<&Entity> {
        self.grid.occupant(coord).and_then(|id| self.entities.get(&id))
    }

    /// Living entities of one side, in id order
    pub fn units_of(&self, loyalty: Loyalty) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| e.loyalty == loyalty)
            .map(|e| e.id())
            .collect()
    }

    pub fn events(&self) -> &[BattleEvent] {
        self.events.events()
    }

    pub fn drain_events(&mut self) -> Vec<BattleEvent> {
        self.events.drain()
    }

    pub(crate) fn log(&mut self, kind: BattleEventKind, description: String) {
        let round = self.scheduler.round();
        self.events.push(kind, description, round);
    }

    /// Place a new entity with an explicit loadout
    pub fn spawn(
        &mut self,
        template: Arc<EntityTemplate>,
        subsystems: Vec<Subsystem>,
        loyalty: Loyalty,
        at: HexCoord,
    ) -> Result<EntityId> {
        if !self.grid.contains(at) {
            return Err(TacticsError::HexNotFound(at));
        }
        let id = EntityId(self.next_id);
        let entity = Entity::new(id, template, loyalty, at, subsystems)?;
        self.grid.set_occupant(at, Some(id))?;
        self.next_id += 1;

        tracing::debug!("Spawned {} {:?} ({:?}) at {:?}", entity.name(), id, loyalty, at);
        let description = format!("{} enters at {:?}", entity.name(), at);
        self.entities.insert(id, entity);
        self.log(BattleEventKind::EntitySpawned { entity: id, at }, description);
        self.log(
            BattleEventKind::OccupancyChanged {
                hex: at,
                occupant: Some(id),
            },
            format!("{:?} now holds {:?}", at, id),
        );
        self.refresh_visibility(id)?;
        Ok(id)
    }

    /// Place a new entity built from a named library template
    pub fn spawn_named(
        &mut self,
        library: &TemplateLibrary,
        name: &str,
        loyalty: Loyalty,
        at: HexCoord,
    ) -> Result<EntityId> {
        let template = library.entity(name)?;
        let subsystems = library.build_loadout(&template)?;
        self.spawn(template, subsystems, loyalty, at)
    }

    /// Does `cell` stop the sight of `viewer`?
    pub(crate) fn blocks_sight(&self, cell: &HexCell, viewer: EntityId) -> bool {
        cell.terrain.blocks_sight()
            || cell.occupant().is_some_and(|o| {
                o != viewer && self.entities.get(&o).is_some_and(|e| e.obstructs_sight())
            })
    }

    /// Recompute what an entity sees and detects
    ///
    /// Sight counters are only kept for the faction whose turn it is.
    pub fn refresh_visibility(&mut self, id: EntityId) -> Result<()> {
        let entity = self.entities.get(&id).ok_or(TacticsError::EntityNotFound(id))?;
        let origin = entity.position();
        let sight_range = entity.template().sight_range;
        let radar_range = entity.template().radar_range;
        let register = self.scheduler.current() == Some(entity.loyalty);
        let step = self.config.ray_step;

        let seen = resolve_in_range(&self.grid, origin, 0, sight_range, step, |_| true, |cell| {
            self.blocks_sight(cell, id)
        });
        let detected =
            resolve_in_range(&self.grid, origin, 0, radar_range, step, |_| true, |_| false);

        let Some(entity) = self.entities.get_mut(&id) else {
            return Err(TacticsError::EntityNotFound(id));
        };
        let old = std::mem::replace(&mut entity.sight, SightSets { seen, detected });
        if entity.sight_registered {
            self.grid.update_sight_counts(&old.seen, std::iter::empty(), false);
            self.grid.update_sight_counts(&old.detected, std::iter::empty(), true);
        }
        if register {
            self.grid.update_sight_counts(std::iter::empty(), &entity.sight.seen, false);
            self.grid.update_sight_counts(std::iter::empty(), &entity.sight.detected, true);
        }
        entity.sight_registered = register;
        Ok(())
    }

    /// Zero the grid's sight counters and forget who was counted
    pub(crate) fn reset_sight(&mut self) {
        self.grid.reset_sight_counts();
        for entity in self.entities.values_mut() {
            entity.sight_registered = false;
        }
    }

    /// Hexes the given side currently sees (or detects, with radar)
    pub fn faction_visibility(
        &self,
        loyalty: Loyalty,
        use_radar: bool,
    ) -> ahash::AHashSet<HexCoord> {
        let mut visible = ahash::AHashSet::new();
        for entity in self.entities.values().filter(|e| e.loyalty == loyalty) {
            visible.extend(entity.sight().seen.iter().copied());
            if use_radar {
                visible.extend(entity.sight().detected.iter().copied());
            }
        }
        visible
    }

    /// Apply an effect to an entity: shields, hull, subsystem hit, destruction
    pub fn affect(
        &mut self,
        target: EntityId,
        strength: i32,
        effect: EffectType,
    ) -> Result<DamageReport> {
        let round = self.scheduler.round();
        let entity = self
            .entities
            .get_mut(&target)
            .ok_or(TacticsError::EntityNotFound(target))?;

        let report = entity.affect(strength, effect);
        self.events.push(
            BattleEventKind::EntityAffected {
                entity: target,
                effect,
                report,
            },
            format!("{} takes {} {:?}", entity.name(), strength, effect),
            round,
        );

        if report.internal > 0 && effect.can_disable() {
            let per_point = self.config.subsystem_hit_chance_per_point;
            let chance = (report.internal as f32 * per_point).min(1.0);
            let candidates = entity.operational_subsystems();
            if chance > 0.0 && !candidates.is_empty() && self.rng.gen::<f32>() < chance {
                let index = candidates[self.rng.gen_range(0..candidates.len())];
                if let Some(condition) = entity.hit_subsystem(index, effect) {
                    let subsystem = entity
                        .subsystem(index)
                        .map(|s| s.name().to_string())
                        .unwrap_or_default();
                    tracing::debug!("{:?} subsystem {} now {:?}", target, subsystem, condition);
                    self.events.push(
                        BattleEventKind::SubsystemHit {
                            entity: target,
                            subsystem: subsystem.clone(),
                            condition,
                        },
                        format!("{}'s {} is {:?}", entity.name(), subsystem, condition),
                        round,
                    );
                }
            }
        }

        if entity.should_be_destroyed() {
            self.destroy(target)?;
        }
        Ok(report)
    }

    /// Remove an entity from the battle
    pub fn destroy(&mut self, id: EntityId) -> Result<()> {
        let mut entity = self.entities.remove(&id).ok_or(TacticsError::EntityNotFound(id))?;
        let at = entity.position();
        self.grid.set_occupant(at, None)?;
        if entity.sight_registered {
            self.grid.update_sight_counts(&entity.sight.seen, std::iter::empty(), false);
            self.grid.update_sight_counts(&entity.sight.detected, std::iter::empty(), true);
            entity.sight_registered = false;
        }
        entity.action_cache = None;

        tracing::info!("{} {:?} destroyed at {:?}", entity.name(), id, at);
        let description = format!("{} destroyed", entity.name());
        self.fallen.push(entity);
        self.log(BattleEventKind::EntityDestroyed { entity: id, at }, description);
        self.log(
            BattleEventKind::OccupancyChanged {
                hex: at,
                occupant: None,
            },
            format!("{:?} is empty", at),
        );

        if let Some(outcome) = self.check_battle_end() {
            self.end_battle(outcome);
        }
        Ok(())
    }

    /// Victory when no enemy or neutral remains, defeat when no player does
    pub fn check_battle_end(&self) -> Option<BattleOutcome> {
        if self.is_finished() {
            return None;
        }
        let player_alive = self.entities.values().any(|e| e.loyalty == Loyalty::Player);
        let hostiles_alive = self
            .entities
            .values()
            .any(|e| matches!(e.loyalty, Loyalty::Enemy | Loyalty::Neutral));

        if !player_alive {
            Some(BattleOutcome::Defeat)
        } else if !hostiles_alive {
            Some(BattleOutcome::Victory)
        } else {
            None
        }
    }

    /// End the battle with an outcome
    pub fn end_battle(&mut self, outcome: BattleOutcome) {
        if self.is_finished() {
            return;
        }
        self.phase = BattlePhase::Finished;
        self.outcome = outcome;
        tracing::info!("Battle ended in round {}: {:?}", self.round(), outcome);
        self.log(
            BattleEventKind::BattleEnded { outcome },
            format!("Battle ended: {:?}", outcome),
        );
    }

    /// Turn-start recovery for one unit of the incoming faction
    pub(crate) fn begin_unit_turn(&mut self, id: EntityId) -> Result<()> {
        let Some(entity) = self.entities.get_mut(&id) else {
            return Ok(());
        };
        entity.action_cache = None;
        match entity.begin_turn() {
            TurnStart::Destroyed => {
                tracing::warn!("{} {:?} burned out after a second shutdown", entity.name(), id);
                self.destroy(id)
            }
            TurnStart::ShutDown { overheated } => {
                let description = format!(
                    "{} shuts down ({})",
                    entity.name(),
                    if overheated { "overheated" } else { "drained" }
                );
                self.log(BattleEventKind::EntityShutDown { entity: id, overheated }, description);
                self.refresh_visibility(id)
            }
            TurnStart::Online => self.refresh_visibility(id),
        }
    }

    /// Pulse every hex effect once and age it
    pub(crate) fn tick_hex_effects(&mut self) -> Result<()> {
        for coord in self.grid.coords() {
            let Some(cell) = self.grid.cell_mut(coord) else {
                continue;
            };
            if cell.effects.is_empty() {
                continue;
            }

            let occupant = cell.occupant();
            let pulses: Vec<(EffectType, i32)> = cell
                .effects
                .iter()
                .map(|e| (e.template.effect, e.template.strength))
                .collect();
            for effect in cell.effects.iter_mut() {
                effect.remaining_turns = effect.remaining_turns.saturating_sub(1);
            }
            cell.effects.retain(|e| !e.is_exhausted());

            if let Some(target) = occupant {
                for (effect, strength) in pulses {
                    if !self.entities.contains_key(&target) || self.is_finished() {
                        break;
                    }
                    self.affect(target, strength, effect)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::templates::{ActiveTemplate, SubsystemTemplate};
    use crate::battle::terrain::MovementType;

    fn config() -> BattleConfig {
        BattleConfig {
            subsystem_hit_chance_per_point: 0.0,
            ..BattleConfig::default()
        }
    }

    fn drone() -> (Arc<EntityTemplate>, Vec<Subsystem>) {
        let template = EntityTemplate::new("drone", 5)
            .with_sensors(3, 5)
            .with_active(ActiveTemplate {
                max_energy: 4,
                max_heat: 6,
                max_shield: 2,
                heat_loss_rate: 1,
                shield_recharge_rate: 1,
                system_slots: 1,
            })
            .with_mobility(MovementType::Hover, 3);
        let gun = Subsystem::new(
            Arc::new(SubsystemTemplate::weapon("gun", EffectType::Physical, 2, 3)),
            None,
        );
        (Arc::new(template), vec![gun])
    }

    fn spawn_drone(session: &mut BattleSession, loyalty: Loyalty, at: HexCoord) -> EntityId {
        let (template, loadout) = drone();
        session.spawn(template, loadout, loyalty, at).unwrap()
    }

    #[test]
    fn test_ids_increase() {
        let mut session = BattleSession::new(HexGrid::new(6, 6), config()).unwrap();
        let a = spawn_drone(&mut session, Loyalty::Player, HexCoord::new(0, 0));
        let b = spawn_drone(&mut session, Loyalty::Enemy, HexCoord::new(3, 3));
        assert!(a < b);
        assert_eq!(session.entity_at(HexCoord::new(3, 3)).map(|e| e.id()), Some(b));
    }

    #[test]
    fn test_spawn_onto_occupied_hex_fails() {
        let mut session = BattleSession::new(HexGrid::new(6, 6), config()).unwrap();
        spawn_drone(&mut session, Loyalty::Player, HexCoord::new(2, 2));
        let (template, loadout) = drone();
        let result = session.spawn(template, loadout, Loyalty::Enemy, HexCoord::new(2, 2));
        assert!(matches!(result, Err(TacticsError::OccupancyConflict { .. })));
        assert_eq!(session.entities().count(), 1);
    }

    #[test]
    fn test_shielded_hit_leaves_health() {
        let mut session = BattleSession::new(HexGrid::new(6, 6), config()).unwrap();
        spawn_drone(&mut session, Loyalty::Player, HexCoord::new(0, 0));
        let target = spawn_drone(&mut session, Loyalty::Enemy, HexCoord::new(3, 3));

        let report = session.affect(target, 4, EffectType::Physical).unwrap();
        assert_eq!(report.shield_absorbed, 2);
        let entity = session.entity(target).unwrap();
        assert_eq!(entity.shield(), 0);
        assert_eq!(entity.health, 3);
    }

    #[test]
    fn test_lethal_hit_frees_hex_and_ends_battle() {
        let mut session = BattleSession::new(HexGrid::new(6, 6), config()).unwrap();
        spawn_drone(&mut session, Loyalty::Player, HexCoord::new(0, 0));
        let target = spawn_drone(&mut session, Loyalty::Enemy, HexCoord::new(3, 3));

        session.affect(target, 10, EffectType::Physical).unwrap();
        assert!(session.entity(target).is_none());
        assert_eq!(session.grid().occupant(HexCoord::new(3, 3)), None);
        assert_eq!(session.fallen().len(), 1);
        assert_eq!(session.outcome(), BattleOutcome::Victory);
        assert!(session.is_finished());
    }

    #[test]
    fn test_guaranteed_subsystem_hit_destroys_single_system_unit() {
        let config = BattleConfig {
            subsystem_hit_chance_per_point: 1.0,
            ..BattleConfig::default()
        };
        let mut session = BattleSession::new(HexGrid::new(6, 6), config).unwrap();
        spawn_drone(&mut session, Loyalty::Player, HexCoord::new(0, 0));
        spawn_drone(&mut session, Loyalty::Enemy, HexCoord::new(5, 5));
        let target = spawn_drone(&mut session, Loyalty::Enemy, HexCoord::new(3, 3));

        // 3 past the shields: EMP neutralises the only subsystem
        session.affect(target, 5, EffectType::Emp).unwrap();
        assert!(session.entity(target).is_none());
        assert!(session
            .events()
            .iter()
            .any(|e| matches!(e.kind, BattleEventKind::SubsystemHit { .. })));
        assert!(!session.is_finished());
    }

    #[test]
    fn test_sight_blocked_by_obstacle_entity() {
        let mut session = BattleSession::new(HexGrid::new(12, 12), config()).unwrap();
        let rock = Arc::new(EntityTemplate::obstacle("rock", 20));
        session
            .spawn(rock, Vec::new(), Loyalty::Inactive, HexCoord::new(5, 4))
            .unwrap();
        let viewer = spawn_drone(&mut session, Loyalty::Player, HexCoord::new(3, 4));

        let sight = session.entity(viewer).unwrap().sight();
        assert!(sight.is_seen(HexCoord::new(5, 4)));
        assert!(!sight.is_seen(HexCoord::new(6, 4)));
        // Radar ignores the rock
        assert!(sight.is_detected(HexCoord::new(6, 4)));
    }

    #[test]
    fn test_unknown_entity_is_error() {
        let mut session = BattleSession::new(HexGrid::new(3, 3), config()).unwrap();
        assert!(matches!(
            session.destroy(EntityId(99)),
            Err(TacticsError::EntityNotFound(EntityId(99)))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = BattleConfig {
            max_rounds: 0,
            ..BattleConfig::default()
        };
        assert!(BattleSession::new(HexGrid::new(3, 3), config).is_err());
    }
}
