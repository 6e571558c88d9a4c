//! Potential actions: generation, caching, legality and commit
//!
//! Candidates are generated per entity and cached against the grid's
//! occupancy revision. Any spawn, move or destruction bumps the revision,
//! so a stale cache is regenerated on the next request. Cached candidates
//! are always re-filtered for legality before they are handed out, since
//! energy, ammo and movement change without touching occupancy.

use ahash::AHashSet;

use crate::battle::entity::Entity;
use crate::battle::events::BattleEventKind;
use crate::battle::grid::{HexCell, HexEffect};
use crate::battle::hex::HexCoord;
use crate::battle::pathfinding::find_all_reachable;
use crate::battle::session::BattleSession;
use crate::battle::subsystem::Subsystem;
use crate::battle::templates::{DeliveryMethod, TargetMask};
use crate::battle::visibility::{can_target, resolve_in_range};
use crate::core::error::{Result, TacticsError};
use crate::core::types::EntityId;

/// Something an entity could do right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PotentialAction {
    /// Walk `path` (start hex first) for `cost` movement points
    Move {
        entity: EntityId,
        path: Vec<HexCoord>,
        cost: u32,
    },
    /// Fire or use subsystem `subsystem` on `target`
    OperateSystem {
        entity: EntityId,
        subsystem: usize,
        target: HexCoord,
    },
}

impl PotentialAction {
    pub fn entity(&self) -> EntityId {
        match self {
            PotentialAction::Move { entity, .. }
            | PotentialAction::OperateSystem { entity, .. } => *entity,
        }
    }

    /// Where a move ends
    pub fn destination(&self) -> Option<HexCoord> {
        match self {
            PotentialAction::Move { path, .. } => path.last().copied(),
            PotentialAction::OperateSystem { .. } => None,
        }
    }

    /// Hex a subsystem is aimed at
    pub fn target(&self) -> Option<HexCoord> {
        match self {
            PotentialAction::OperateSystem { target, .. } => Some(*target),
            PotentialAction::Move { .. } => None,
        }
    }
}

/// Candidate actions valid for one occupancy revision
#[derive(Debug, Clone)]
pub struct ActionCache {
    pub revision: u64,
    pub actions: Vec<PotentialAction>,
}

/// What a committed action did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Moved {
        entity: EntityId,
        from: HexCoord,
        to: HexCoord,
        cost: u32,
    },
    SystemOperated {
        entity: EntityId,
        target: HexCoord,
        struck: Option<EntityId>,
        target_destroyed: bool,
    },
}

impl BattleSession {
    /// Does `mask` allow `entity` to aim at whatever stands on `cell`?
    pub(crate) fn target_matches(&self, entity: &Entity, mask: TargetMask, cell: &HexCell) -> bool {
        match cell.occupant() {
            None => mask.empty_hexes,
            Some(occupant) if occupant == entity.id() => false,
            Some(occupant) => match self.entities.get(&occupant) {
                Some(other) if other.loyalty == entity.loyalty => mask.friendly,
                Some(_) => mask.enemy,
                None => false,
            },
        }
    }

    /// Direct fire stops at any occupant and at sight-blocking terrain
    fn blocks_fire(cell: &HexCell) -> bool {
        cell.is_occupied() || cell.terrain.blocks_sight()
    }

    fn can_operate(&self, entity: &Entity, subsystem: &Subsystem) -> bool {
        entity.is_online()
            && subsystem.can_operate()
            && entity.energy() >= subsystem.template().energy_cost
    }

    fn targets_for(&self, entity: &Entity, subsystem: &Subsystem) -> Vec<HexCoord> {
        let template = subsystem.template();
        let include = |cell: &HexCell| self.target_matches(entity, template.targets, cell);
        let found: AHashSet<HexCoord> = match template.delivery {
            DeliveryMethod::Direct => resolve_in_range(
                &self.grid,
                entity.position(),
                template.min_range,
                template.max_range,
                self.config.ray_step,
                include,
                Self::blocks_fire,
            ),
            DeliveryMethod::Unobstructed => resolve_in_range(
                &self.grid,
                entity.position(),
                template.min_range,
                template.max_range,
                self.config.ray_step,
                include,
                |_| false,
            ),
        };
        let mut targets: Vec<HexCoord> = found.into_iter().collect();
        targets.sort_by_key(|c| (c.y, c.x));
        targets
    }

    fn generate_actions(&self, entity: &Entity) -> Vec<PotentialAction> {
        let mut actions = Vec::new();
        if !entity.is_online() {
            return actions;
        }

        for (index, subsystem) in entity.subsystems().iter().enumerate() {
            if !self.can_operate(entity, subsystem) {
                continue;
            }
            for target in self.targets_for(entity, subsystem) {
                actions.push(PotentialAction::OperateSystem {
                    entity: entity.id(),
                    subsystem: index,
                    target,
                });
            }
        }

        if let Some(mobility) = entity.mobility() {
            if entity.movement_left > 0 {
                let reachable = find_all_reachable(
                    &self.grid,
                    entity.position(),
                    entity.movement_left,
                    mobility.movement_type,
                );
                for (_, reach) in reachable {
                    actions.push(PotentialAction::Move {
                        entity: entity.id(),
                        path: reach.path,
                        cost: reach.cost,
                    });
                }
            }
        }

        actions
    }

    /// Candidate actions for an entity, from cache when still current
    pub fn potential_actions(&mut self, id: EntityId) -> Result<Vec<PotentialAction>> {
        let revision = self.grid.occupancy_revision();
        let entity = self.entities.get(&id).ok_or(TacticsError::EntityNotFound(id))?;
        if let Some(cache) = &entity.action_cache {
            if cache.revision == revision {
                return Ok(cache.actions.clone());
            }
        }

        let actions = self.generate_actions(entity);
        tracing::trace!("{:?}: {} candidate actions at revision {}", id, actions.len(), revision);
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.action_cache = Some(ActionCache {
                revision,
                actions: actions.clone(),
            });
        }
        Ok(actions)
    }

    /// Candidate actions that are legal right now
    pub fn legal_actions(&mut self, id: EntityId) -> Result<Vec<PotentialAction>> {
        let candidates = self.potential_actions(id)?;
        Ok(candidates
            .into_iter()
            .filter(|action| self.is_legal(action))
            .collect())
    }

    /// Could this action be committed right now?
    pub fn is_legal(&self, action: &PotentialAction) -> bool {
        if self.is_finished() {
            return false;
        }
        let Some(entity) = self.entities.get(&action.entity()) else {
            return false;
        };

        match action {
            PotentialAction::Move { path, cost, .. } => {
                let Some(mobility) = entity.mobility() else {
                    return false;
                };
                if !entity.is_online() || *cost > entity.movement_left || path.len() < 2 {
                    return false;
                }
                if path.first() != Some(&entity.position()) {
                    return false;
                }
                let mut total = 0;
                for window in path.windows(2) {
                    if window[0].distance(&window[1]) != 1 {
                        return false;
                    }
                    match self.grid.traversal_cost(window[1], mobility.movement_type) {
                        Some(step) => total += step,
                        None => return false,
                    }
                }
                total == *cost
            }
            PotentialAction::OperateSystem {
                subsystem, target, ..
            } => {
                let Some(subsystem) = entity.subsystem(*subsystem) else {
                    return false;
                };
                let Some(cell) = self.grid.cell(*target) else {
                    return false;
                };
                if !self.can_operate(entity, subsystem)
                    || !self.target_matches(entity, subsystem.template().targets, cell)
                {
                    return false;
                }
                let template = subsystem.template();
                can_target(
                    &self.grid,
                    entity.position(),
                    *target,
                    template.delivery,
                    template.min_range,
                    template.max_range,
                    self.config.ray_step,
                    Self::blocks_fire,
                )
            }
        }
    }

    /// Carry out an action
    pub fn commit(&mut self, action: &PotentialAction) -> Result<ActionOutcome> {
        if !self.is_legal(action) {
            return Err(TacticsError::IllegalAction(format!("{:?}", action)));
        }

        match action {
            PotentialAction::Move { entity, path, cost } => self.commit_move(*entity, path, *cost),
            PotentialAction::OperateSystem {
                entity,
                subsystem,
                target,
            } => self.commit_operation(*entity, *subsystem, *target),
        }
    }

    fn commit_move(&mut self, id: EntityId, path: &[HexCoord], cost: u32) -> Result<ActionOutcome> {
        let entity = self.entities.get(&id).ok_or(TacticsError::EntityNotFound(id))?;
        let from = entity.position();
        let to = path.last().copied().unwrap_or(from);
        let name = entity.name().to_string();

        self.grid.relocate(from, to, id)?;
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.position = to;
            entity.movement_left -= cost;
        }

        tracing::debug!("{} {:?} moves {:?} -> {:?} for {}", name, id, from, to, cost);
        self.log(
            BattleEventKind::EntityMoved {
                entity: id,
                from,
                to,
                cost,
            },
            format!("{} moves to {:?}", name, to),
        );
        self.log(
            BattleEventKind::OccupancyChanged {
                hex: from,
                occupant: None,
            },
            format!("{:?} is empty", from),
        );
        self.log(
            BattleEventKind::OccupancyChanged {
                hex: to,
                occupant: Some(id),
            },
            format!("{:?} now holds {:?}", to, id),
        );
        self.refresh_visibility(id)?;

        Ok(ActionOutcome::Moved {
            entity: id,
            from,
            to,
            cost,
        })
    }

    fn commit_operation(
        &mut self,
        id: EntityId,
        index: usize,
        target: HexCoord,
    ) -> Result<ActionOutcome> {
        let entity = self.entities.get_mut(&id).ok_or(TacticsError::EntityNotFound(id))?;
        let name = entity.name().to_string();
        let (template, hex_effect) = {
            let active = entity
                .active
                .as_mut()
                .ok_or_else(|| TacticsError::IllegalAction(format!("{:?} has no subsystems", id)))?;
            let subsystem = active.subsystems.get_mut(index).ok_or_else(|| {
                TacticsError::IllegalAction(format!("{:?} has no subsystem {}", id, index))
            })?;
            let template = subsystem.template().clone();
            let hex_effect = subsystem.hex_effect().cloned();
            subsystem.expend();
            active.energy -= template.energy_cost;
            active.heat += template.heat_generated;
            (template, hex_effect)
        };

        tracing::debug!("{} {:?} fires {} at {:?}", name, id, template.name, target);
        self.log(
            BattleEventKind::SystemOperated {
                entity: id,
                subsystem: template.name.clone(),
                target,
            },
            format!("{} uses {} on {:?}", name, template.name, target),
        );

        let struck = self.grid.occupant(target);
        let mut target_destroyed = false;
        if let Some(victim) = struck {
            self.affect(victim, template.strength, template.effect)?;
            target_destroyed = !self.entities.contains_key(&victim);
        }

        if let Some(effect) = hex_effect {
            if let Some(cell) = self.grid.cell_mut(target) {
                cell.effects.push(HexEffect::new(effect.clone()));
                self.log(
                    BattleEventKind::HexEffectPlaced {
                        hex: target,
                        effect: effect.name.clone(),
                    },
                    format!("{} burns on {:?} for {} turns", effect.name, target, effect.duration),
                );
            }
        }

        // Spending the last round can leave the operator with nothing working
        if self.entities.get(&id).is_some_and(|e| e.should_be_destroyed()) {
            self.destroy(id)?;
        }

        Ok(ActionOutcome::SystemOperated {
            entity: id,
            target,
            struck,
            target_destroyed,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::battle::grid::HexGrid;
    use crate::battle::subsystem::OperationalCondition;
    use crate::battle::templates::{ActiveTemplate, EffectType, EntityTemplate, SubsystemTemplate};
    use crate::battle::terrain::{MovementType, TerrainCost};
    use crate::core::config::BattleConfig;
    use crate::core::types::Loyalty;

    fn session(width: u32, height: u32) -> BattleSession {
        let config = BattleConfig {
            subsystem_hit_chance_per_point: 0.0,
            ..BattleConfig::default()
        };
        BattleSession::new(HexGrid::new(width, height), config).unwrap()
    }

    fn walker(
        speed: u32,
        systems: Vec<SubsystemTemplate>,
    ) -> (Arc<EntityTemplate>, Vec<Subsystem>) {
        let template = EntityTemplate::new("walker", 6)
            .with_sensors(6, 6)
            .with_active(ActiveTemplate {
                max_energy: 10,
                max_heat: 10,
                max_shield: 0,
                heat_loss_rate: 1,
                shield_recharge_rate: 0,
                system_slots: 3,
            })
            .with_mobility(MovementType::Walker, speed);
        let subsystems = systems
            .into_iter()
            .map(|s| Subsystem::new(Arc::new(s), None))
            .collect();
        (Arc::new(template), subsystems)
    }

    fn cannon() -> SubsystemTemplate {
        SubsystemTemplate::weapon("cannon", EffectType::Physical, 2, 3)
    }

    fn place(session: &mut BattleSession, loyalty: Loyalty, at: HexCoord, speed: u32) -> EntityId {
        let (template, subsystems) = walker(speed, vec![cannon()]);
        session.spawn(template, subsystems, loyalty, at).unwrap()
    }

    fn moves(actions: &[PotentialAction]) -> usize {
        actions
            .iter()
            .filter(|a| matches!(a, PotentialAction::Move { .. }))
            .count()
    }

    #[test]
    fn test_fire_targets_enemy_in_range_only() {
        let mut session = session(10, 10);
        let shooter = place(&mut session, Loyalty::Player, HexCoord::new(2, 4), 0);
        place(&mut session, Loyalty::Enemy, HexCoord::new(4, 4), 0);
        place(&mut session, Loyalty::Enemy, HexCoord::new(8, 4), 0);
        place(&mut session, Loyalty::Player, HexCoord::new(2, 6), 0);

        let actions = session.legal_actions(shooter).unwrap();
        let targets: Vec<HexCoord> = actions.iter().filter_map(|a| a.target()).collect();
        assert_eq!(targets, vec![HexCoord::new(4, 4)]);
        assert_eq!(moves(&actions), 0);
    }

    #[test]
    fn test_cache_reused_until_occupancy_changes() {
        let mut session = session(10, 10);
        let unit = place(&mut session, Loyalty::Player, HexCoord::new(2, 2), 2);
        place(&mut session, Loyalty::Enemy, HexCoord::new(8, 8), 0);

        let first = session.potential_actions(unit).unwrap();
        let revision = session.entity(unit).unwrap().action_cache.as_ref().unwrap().revision;
        assert_eq!(session.potential_actions(unit).unwrap(), first);

        place(&mut session, Loyalty::Enemy, HexCoord::new(3, 2), 0);
        let second = session.potential_actions(unit).unwrap();
        let new_revision = session.entity(unit).unwrap().action_cache.as_ref().unwrap().revision;
        assert!(new_revision > revision);
        assert!(moves(&second) < moves(&first));
    }

    #[test]
    fn test_move_commit_updates_grid_and_budget() {
        let mut session = session(10, 10);
        let unit = place(&mut session, Loyalty::Player, HexCoord::new(2, 2), 3);
        place(&mut session, Loyalty::Enemy, HexCoord::new(9, 9), 0);
        session.set_terrain(HexCoord::new(4, 2), TerrainCost::Broken);

        let action = PotentialAction::Move {
            entity: unit,
            path: vec![HexCoord::new(2, 2), HexCoord::new(3, 2), HexCoord::new(4, 2)],
            cost: 3,
        };
        let outcome = session.commit(&action).unwrap();
        assert!(matches!(outcome, ActionOutcome::Moved { cost: 3, .. }));
        assert_eq!(session.grid().occupant(HexCoord::new(2, 2)), None);
        assert_eq!(session.grid().occupant(HexCoord::new(4, 2)), Some(unit));
        assert_eq!(session.entity(unit).unwrap().movement_left, 0);

        // The same move is no longer legal
        assert!(matches!(session.commit(&action), Err(TacticsError::IllegalAction(_))));
    }

    #[test]
    fn test_move_with_wrong_cost_is_illegal() {
        let mut session = session(10, 10);
        let unit = place(&mut session, Loyalty::Player, HexCoord::new(2, 2), 3);
        let action = PotentialAction::Move {
            entity: unit,
            path: vec![HexCoord::new(2, 2), HexCoord::new(3, 2)],
            cost: 0,
        };
        assert!(!session.is_legal(&action));
    }

    #[test]
    fn test_fire_spends_energy_heat_and_action() {
        let mut session = session(10, 10);
        let shooter = place(&mut session, Loyalty::Player, HexCoord::new(2, 4), 0);
        let target = place(&mut session, Loyalty::Enemy, HexCoord::new(4, 4), 0);

        let action = PotentialAction::OperateSystem {
            entity: shooter,
            subsystem: 0,
            target: HexCoord::new(4, 4),
        };
        let outcome = session.commit(&action).unwrap();
        assert_eq!(
            outcome,
            ActionOutcome::SystemOperated {
                entity: shooter,
                target: HexCoord::new(4, 4),
                struck: Some(target),
                target_destroyed: false,
            }
        );
        assert_eq!(session.entity(target).unwrap().health, 4);
        let shooter_state = session.entity(shooter).unwrap();
        assert_eq!(shooter_state.energy(), 9);
        assert_eq!(shooter_state.subsystems()[0].actions_left(), 0);
        assert!(!session.is_legal(&action));
    }

    #[test]
    fn test_direct_fire_blocked_by_friendly_screen() {
        let mut session = session(10, 10);
        let shooter = place(&mut session, Loyalty::Player, HexCoord::new(2, 4), 0);
        place(&mut session, Loyalty::Player, HexCoord::new(3, 4), 0);
        place(&mut session, Loyalty::Enemy, HexCoord::new(4, 4), 0);

        let action = PotentialAction::OperateSystem {
            entity: shooter,
            subsystem: 0,
            target: HexCoord::new(4, 4),
        };
        assert!(!session.is_legal(&action));
    }

    #[test]
    fn test_empty_hex_targeting_needs_mask() {
        let mut session = session(10, 10);
        let mortar = SubsystemTemplate::weapon("mortar", EffectType::Incendiary, 2, 3)
            .with_delivery(DeliveryMethod::Unobstructed)
            .with_targets(TargetMask::enemy().with_empty_hexes());
        let (template, subsystems) = walker(0, vec![mortar, cannon()]);
        let unit = session
            .spawn(template, subsystems, Loyalty::Player, HexCoord::new(4, 4))
            .unwrap();

        let actions = session.legal_actions(unit).unwrap();
        let mortar_targets = actions
            .iter()
            .filter(|a| matches!(a, PotentialAction::OperateSystem { subsystem: 0, .. }))
            .count();
        let cannon_targets = actions
            .iter()
            .filter(|a| matches!(a, PotentialAction::OperateSystem { subsystem: 1, .. }))
            .count();
        // Rings 1 to 3 around the mortar
        assert_eq!(mortar_targets, 36);
        assert_eq!(cannon_targets, 0);
    }

    #[test]
    fn test_spent_ammo_offers_no_fire_actions() {
        let mut session = session(10, 10);
        let one_shot =
            SubsystemTemplate::weapon("one_shot", EffectType::Physical, 1, 3).with_ammo(1);
        let (template, subsystems) = walker(0, vec![cannon(), one_shot]);
        let shooter = session
            .spawn(template, subsystems, Loyalty::Player, HexCoord::new(2, 4))
            .unwrap();
        place(&mut session, Loyalty::Enemy, HexCoord::new(4, 4), 0);

        let before = session.legal_actions(shooter).unwrap();
        assert!(before
            .iter()
            .any(|a| matches!(a, PotentialAction::OperateSystem { subsystem: 1, .. })));

        session
            .commit(&PotentialAction::OperateSystem {
                entity: shooter,
                subsystem: 1,
                target: HexCoord::new(4, 4),
            })
            .unwrap();

        let entity = session.entity(shooter).unwrap();
        assert_eq!(entity.subsystems()[1].condition(), OperationalCondition::OutOfAmmo);
        let after = session.legal_actions(shooter).unwrap();
        assert!(!after
            .iter()
            .any(|a| matches!(a, PotentialAction::OperateSystem { subsystem: 1, .. })));
        assert!(after
            .iter()
            .any(|a| matches!(a, PotentialAction::OperateSystem { subsystem: 0, .. })));
    }
}
