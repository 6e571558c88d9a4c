//! Action scoring for the greedy commander
//!
//! Fire priority: `(target value + strength) / max(1, energy + heat)`.
//! Move priority: change in position value, where position value sums
//! `value / cost` over known enemies and cost is the hex distance when a
//! weapon already reaches, otherwise the cost of walking there.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap};

use ordered_float::OrderedFloat;

use crate::battle::actions::PotentialAction;
use crate::battle::ai::TargetValuation;
use crate::battle::entity::Entity;
use crate::battle::hex::HexCoord;
use crate::battle::pathfinding::{find_approach_path, hex_distance, path_cost};
use crate::battle::session::BattleSession;
use crate::core::types::EntityId;

/// What committing an action is meant to bring about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Goal {
    DestroyTarget(EntityId),
    RestoreTarget(EntityId),
    Reposition { entity: EntityId, to: HexCoord },
}

impl Goal {
    pub fn is_achieved(&self, session: &BattleSession) -> bool {
        match self {
            Goal::DestroyTarget(target) => session.entity(*target).is_none(),
            Goal::RestoreTarget(target) => {
                session.entity(*target).map_or(true, |e| !e.is_damaged())
            }
            Goal::Reposition { entity, to } => {
                session.entity(*entity).map_or(true, |e| e.position() == *to)
            }
        }
    }
}

/// A scored candidate action
#[derive(Debug, Clone)]
pub struct EvaluatedAction {
    pub action: PotentialAction,
    pub priority: f32,
    pub goal: Goal,
}

#[derive(Debug)]
struct QueueEntry {
    priority: OrderedFloat<f32>,
    sequence: u64,
    evaluated: EvaluatedAction,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Highest priority first, earliest push on ties
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Max-priority queue of evaluated actions
#[derive(Debug, Default)]
pub struct ActionQueue {
    heap: BinaryHeap<QueueEntry>,
    sequence: u64,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, evaluated: EvaluatedAction) {
        self.sequence += 1;
        self.heap.push(QueueEntry {
            priority: OrderedFloat(evaluated.priority),
            sequence: self.sequence,
            evaluated,
        });
    }

    pub fn pop(&mut self) -> Option<EvaluatedAction> {
        self.heap.pop().map(|entry| entry.evaluated)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Hostile entities any of `units` can see (or detect, with radar)
pub fn known_enemies(
    session: &BattleSession,
    units: &[EntityId],
    use_radar: bool,
) -> BTreeSet<EntityId> {
    let mut enemies = BTreeSet::new();
    for entity in units.iter().filter_map(|id| session.entity(*id)) {
        let sight = entity.sight();
        let hexes = sight
            .seen
            .iter()
            .chain(sight.detected.iter().filter(|_| use_radar));
        for hex in hexes {
            if let Some(other) = session.entity_at(*hex) {
                if entity.is_hostile_to(other) {
                    enemies.insert(other.id());
                }
            }
        }
    }
    enemies
}

/// How good a spot `from` is for `unit` against `enemies`
///
/// Enemies the unit could not walk to are left out.
pub fn position_value(
    session: &BattleSession,
    unit: &Entity,
    from: HexCoord,
    enemies: &BTreeSet<EntityId>,
    valuation: &dyn TargetValuation,
) -> f32 {
    let Some(mobility) = unit.mobility() else {
        return 0.0;
    };

    let mut total = 0.0;
    for enemy in enemies.iter().filter_map(|id| session.entity(*id)) {
        let value = valuation.value(enemy);
        if value <= 0.0 {
            continue;
        }

        let distance = from.distance(&enemy.position());
        let in_range = unit.subsystems().iter().any(|s| {
            let template = s.template();
            s.is_operational() && template.effect.is_harmful() && template.in_range(distance)
        });
        let cost = if in_range {
            distance
        } else {
            let grid = session.grid();
            let movement = mobility.movement_type;
            let path = find_approach_path(grid, from, enemy.position(), movement, hex_distance);
            match path.ok().and_then(|p| path_cost(grid, &p, mobility.movement_type)) {
                Some(cost) => cost,
                None => continue,
            }
        };
        total += value / cost.max(1) as f32;
    }
    total
}

/// Score every legal action of one unit
pub(crate) fn evaluate_actions(
    session: &BattleSession,
    unit: &Entity,
    actions: Vec<PotentialAction>,
    enemies: &BTreeSet<EntityId>,
    valuation: &dyn TargetValuation,
    move_weight: f32,
) -> Vec<EvaluatedAction> {
    let mut evaluated = Vec::new();
    let mut here_value = None;

    for action in actions {
        match &action {
            PotentialAction::OperateSystem {
                subsystem, target, ..
            } => {
                // Empty hexes and scenery are never worth a shot
                let Some(victim) = session.entity_at(*target) else {
                    continue;
                };
                let Some(subsystem) = unit.subsystem(*subsystem) else {
                    continue;
                };
                if !victim.loyalty.is_combatant() {
                    continue;
                }
                let template = subsystem.template();
                let goal = if template.effect.is_harmful() && unit.is_hostile_to(victim) {
                    Goal::DestroyTarget(victim.id())
                } else if !template.effect.is_harmful()
                    && victim.loyalty == unit.loyalty
                    && victim.is_damaged()
                {
                    Goal::RestoreTarget(victim.id())
                } else {
                    continue;
                };
                let priority =
                    (valuation.value(victim) + template.strength as f32) / template.upkeep() as f32;
                evaluated.push(EvaluatedAction {
                    action,
                    priority,
                    goal,
                });
            }
            PotentialAction::Move { .. } => {
                let Some(to) = action.destination() else {
                    continue;
                };
                let here = *here_value.get_or_insert_with(|| {
                    position_value(session, unit, unit.position(), enemies, valuation)
                });
                let there = position_value(session, unit, to, enemies, valuation);
                evaluated.push(EvaluatedAction {
                    priority: (there - here) * move_weight,
                    goal: Goal::Reposition {
                        entity: unit.id(),
                        to,
                    },
                    action,
                });
            }
        }
    }

    evaluated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(priority: f32, target: i32) -> EvaluatedAction {
        EvaluatedAction {
            action: PotentialAction::OperateSystem {
                entity: EntityId(1),
                subsystem: 0,
                target: HexCoord::new(target, 0),
            },
            priority,
            goal: Goal::DestroyTarget(EntityId(2)),
        }
    }

    #[test]
    fn test_queue_pops_highest_first() {
        let mut queue = ActionQueue::new();
        queue.push(entry(1.0, 1));
        queue.push(entry(-3.0, 2));
        queue.push(entry(7.5, 3));

        let order: Vec<f32> = std::iter::from_fn(|| queue.pop()).map(|e| e.priority).collect();
        assert_eq!(order, vec![7.5, 1.0, -3.0]);
    }

    #[test]
    fn test_queue_ties_keep_push_order() {
        let mut queue = ActionQueue::new();
        queue.push(entry(2.0, 1));
        queue.push(entry(2.0, 2));
        queue.push(entry(2.0, 3));

        let targets: Vec<i32> = std::iter::from_fn(|| queue.pop())
            .filter_map(|e| e.action.target())
            .map(|h| h.x)
            .collect();
        assert_eq!(targets, vec![1, 2, 3]);
    }
}
