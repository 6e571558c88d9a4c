//! AI Commander - greedy battle AI
//!
//! Each pass scores every legal action of every unit, then commits them in
//! priority order. Once a committed action achieves its goal the board has
//! changed enough that the remaining scores are stale, so the commander
//! starts a fresh pass. The turn ends when a pass commits nothing that
//! achieves a goal.

use crate::battle::actions::PotentialAction;
use crate::battle::ai::evaluation::{evaluate_actions, known_enemies, ActionQueue};
use crate::battle::ai::profile::AiProfile;
use crate::battle::ai::{AiTurnReport, BattleAi, TargetValuation, UniformValuation};
use crate::battle::session::BattleSession;
use crate::core::error::Result;
use crate::core::types::EntityId;

/// Result of draining one queue
#[derive(Debug, Clone, Default)]
pub struct QueueRun {
    pub committed: Vec<PotentialAction>,
    /// A goal was achieved: re-evaluate before committing more
    pub restart: bool,
}

/// Commit positive-priority actions, best first
///
/// Stops at the first non-positive priority, or after an action that
/// achieves its goal. Actions that became illegal or whose goal was met
/// in the meantime are skipped.
pub fn commit_in_priority_order(
    session: &mut BattleSession,
    mut queue: ActionQueue,
) -> Result<QueueRun> {
    let mut run = QueueRun::default();

    while let Some(evaluated) = queue.pop() {
        if evaluated.priority <= 0.0 || session.is_finished() {
            break;
        }
        if evaluated.goal.is_achieved(session) || !session.is_legal(&evaluated.action) {
            continue;
        }

        session.commit(&evaluated.action)?;
        tracing::debug!(
            "AI committed {:?} at priority {:.2}",
            evaluated.action,
            evaluated.priority
        );
        run.committed.push(evaluated.action);

        if evaluated.goal.is_achieved(session) {
            run.restart = !session.is_finished();
            break;
        }
    }

    Ok(run)
}

/// Greedy commander implementing BattleAi
pub struct AiCommander {
    profile: AiProfile,
    valuation: Box<dyn TargetValuation>,
}

impl AiCommander {
    /// Commander valuing targets by the profile's weights
    pub fn new(profile: AiProfile) -> Self {
        let valuation = Box::new(profile.weights.clone());
        Self { profile, valuation }
    }

    /// Commander valuing every combatant at `value`
    pub fn uniform(value: f32) -> Self {
        Self::with_valuation(AiProfile::default(), Box::new(UniformValuation { value }))
    }

    pub fn with_valuation(profile: AiProfile, valuation: Box<dyn TargetValuation>) -> Self {
        Self { profile, valuation }
    }

    pub fn profile(&self) -> &AiProfile {
        &self.profile
    }

    /// Score every legal action of `units`
    fn evaluate(&self, session: &mut BattleSession, units: &[EntityId]) -> Result<ActionQueue> {
        let enemies = known_enemies(session, units, self.profile.behavior.use_radar_contacts);
        let mut queue = ActionQueue::new();

        for &id in units {
            if session.entity(id).is_none() {
                continue;
            }
            let actions = session.legal_actions(id)?;
            let Some(unit) = session.entity(id) else {
                continue;
            };
            let scored = evaluate_actions(
                session,
                unit,
                actions,
                &enemies,
                self.valuation.as_ref(),
                self.profile.behavior.move_weight,
            );
            for evaluated in scored {
                queue.push(evaluated);
            }
        }

        Ok(queue)
    }
}

impl BattleAi for AiCommander {
    fn name(&self) -> &str {
        &self.profile.name
    }

    fn act(&mut self, session: &mut BattleSession, units: &[EntityId]) -> Result<AiTurnReport> {
        let mut report = AiTurnReport::default();

        // Every restart follows a commit, and commits spend movement or actions
        while !session.is_finished() {
            let queue = self.evaluate(session, units)?;
            report.evaluations += queue.len();
            let run = commit_in_priority_order(session, queue)?;
            report.committed.extend(run.committed);
            if !run.restart {
                break;
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::battle::ai::evaluation::{EvaluatedAction, Goal};
    use crate::battle::grid::HexGrid;
    use crate::battle::hex::HexCoord;
    use crate::battle::subsystem::Subsystem;
    use crate::battle::templates::{
        ActiveTemplate, DeliveryMethod, EffectType, EntityTemplate, SubsystemTemplate, TargetMask,
    };
    use crate::battle::terrain::{MovementType, TerrainCost};
    use crate::core::config::BattleConfig;
    use crate::core::types::Loyalty;

    fn session() -> BattleSession {
        let config = BattleConfig {
            subsystem_hit_chance_per_point: 0.0,
            ..BattleConfig::default()
        };
        BattleSession::new(HexGrid::new(12, 8), config).unwrap()
    }

    fn unit(systems: Vec<SubsystemTemplate>, speed: u32) -> (Arc<EntityTemplate>, Vec<Subsystem>) {
        let template = EntityTemplate::new("unit", 8)
            .with_sensors(10, 10)
            .with_active(ActiveTemplate {
                max_energy: 10,
                max_heat: 20,
                max_shield: 0,
                heat_loss_rate: 1,
                shield_recharge_rate: 0,
                system_slots: 2,
            })
            .with_mobility(MovementType::Walker, speed);
        let subsystems = systems
            .into_iter()
            .map(|s| Subsystem::new(Arc::new(s), None))
            .collect();
        (Arc::new(template), subsystems)
    }

    fn gun(range: u32) -> SubsystemTemplate {
        SubsystemTemplate::weapon("gun", EffectType::Physical, 2, range)
    }

    fn spawn(
        session: &mut BattleSession,
        loyalty: Loyalty,
        at: HexCoord,
        systems: Vec<SubsystemTemplate>,
        speed: u32,
    ) -> EntityId {
        let (template, subsystems) = unit(systems, speed);
        session.spawn(template, subsystems, loyalty, at).unwrap()
    }

    #[test]
    fn test_only_positive_priorities_are_committed() {
        let mut session = session();
        let shooter = spawn(&mut session, Loyalty::Player, HexCoord::new(2, 4), vec![gun(3)], 3);
        let target = spawn(&mut session, Loyalty::Enemy, HexCoord::new(4, 4), vec![gun(3)], 3);

        let mut queue = ActionQueue::new();
        queue.push(EvaluatedAction {
            action: PotentialAction::Move {
                entity: shooter,
                path: vec![HexCoord::new(2, 4), HexCoord::new(1, 4)],
                cost: 1,
            },
            priority: -1.0,
            goal: Goal::Reposition {
                entity: shooter,
                to: HexCoord::new(1, 4),
            },
        });
        queue.push(EvaluatedAction {
            action: PotentialAction::OperateSystem {
                entity: shooter,
                subsystem: 0,
                target: HexCoord::new(4, 4),
            },
            priority: 5.0,
            goal: Goal::DestroyTarget(target),
        });

        let run = commit_in_priority_order(&mut session, queue).unwrap();
        assert_eq!(run.committed.len(), 1);
        assert!(!run.restart);
        assert_eq!(session.entity(shooter).unwrap().position(), HexCoord::new(2, 4));
        assert_eq!(session.entity(target).unwrap().health, 6);
    }

    #[test]
    fn test_fires_when_enemy_in_range() {
        let mut session = session();
        let shooter = spawn(&mut session, Loyalty::Player, HexCoord::new(2, 4), vec![gun(3)], 0);
        let target = spawn(&mut session, Loyalty::Enemy, HexCoord::new(4, 4), vec![gun(3)], 0);

        let mut ai = AiCommander::uniform(10.0);
        let report = ai.act(&mut session, &[shooter]).unwrap();
        assert_eq!(report.committed.len(), 1);
        assert_eq!(session.entity(target).unwrap().health, 6);
    }

    #[test]
    fn test_closes_on_enemy_out_of_range() {
        let mut session = session();
        let runner = spawn(&mut session, Loyalty::Enemy, HexCoord::new(1, 4), vec![gun(2)], 3);
        spawn(&mut session, Loyalty::Player, HexCoord::new(9, 4), vec![gun(2)], 0);

        let before = session.entity(runner).unwrap().position();
        let mut ai = AiCommander::uniform(10.0);
        ai.act(&mut session, &[runner]).unwrap();

        let after = session.entity(runner).unwrap().position();
        let enemy = HexCoord::new(9, 4);
        assert!(after.distance(&enemy) < before.distance(&enemy));
        assert_eq!(session.entity(runner).unwrap().movement_left, 0);
    }

    #[test]
    fn test_unreachable_enemy_is_ignored() {
        let mut session = session();
        // Wall off the far side completely
        for y in 0..8 {
            session.set_terrain(HexCoord::new(6, y), TerrainCost::Blocked);
        }
        let runner = spawn(&mut session, Loyalty::Enemy, HexCoord::new(1, 4), vec![gun(2)], 3);
        spawn(&mut session, Loyalty::Player, HexCoord::new(9, 4), vec![gun(2)], 0);

        let mut ai = AiCommander::uniform(10.0);
        let report = ai.act(&mut session, &[runner]).unwrap();
        assert!(report.committed.is_empty());
        assert_eq!(session.entity(runner).unwrap().position(), HexCoord::new(1, 4));
    }

    #[test]
    fn test_repairs_damaged_friend() {
        let mut session = session();
        let arm = SubsystemTemplate::weapon("arm", EffectType::Repair, 3, 1)
            .with_delivery(DeliveryMethod::Unobstructed)
            .with_targets(TargetMask::friendly());
        let medic = spawn(&mut session, Loyalty::Player, HexCoord::new(2, 4), vec![arm], 0);
        let patient = spawn(&mut session, Loyalty::Player, HexCoord::new(3, 4), vec![gun(1)], 0);
        spawn(&mut session, Loyalty::Enemy, HexCoord::new(11, 7), vec![gun(1)], 0);
        session.affect(patient, 4, EffectType::Physical).unwrap();

        let mut ai = AiCommander::uniform(10.0);
        let report = ai.act(&mut session, &[medic]).unwrap();
        assert_eq!(report.committed.len(), 1);
        assert_eq!(session.entity(patient).unwrap().health, 7);
    }

    #[test]
    fn test_healthy_friend_is_not_a_target() {
        let mut session = session();
        let arm = SubsystemTemplate::weapon("arm", EffectType::Repair, 3, 1)
            .with_delivery(DeliveryMethod::Unobstructed)
            .with_targets(TargetMask::friendly());
        let medic = spawn(&mut session, Loyalty::Player, HexCoord::new(2, 4), vec![arm], 0);
        spawn(&mut session, Loyalty::Player, HexCoord::new(3, 4), vec![gun(1)], 0);

        let mut ai = AiCommander::uniform(10.0);
        let report = ai.act(&mut session, &[medic]).unwrap();
        assert!(report.committed.is_empty());
    }

    #[test]
    fn test_radar_contact_alone_does_not_draw_default_ai() {
        let mut session = session();
        let template = EntityTemplate::new("nearsighted", 8)
            .with_sensors(2, 12)
            .with_active(ActiveTemplate {
                max_energy: 10,
                max_heat: 20,
                max_shield: 0,
                heat_loss_rate: 1,
                shield_recharge_rate: 0,
                system_slots: 1,
            })
            .with_mobility(MovementType::Walker, 3);
        let runner = session
            .spawn(
                Arc::new(template),
                vec![Subsystem::new(Arc::new(gun(2)), None)],
                Loyalty::Enemy,
                HexCoord::new(1, 4),
            )
            .unwrap();
        spawn(&mut session, Loyalty::Player, HexCoord::new(9, 4), vec![gun(2)], 0);

        let sight = session.entity(runner).unwrap().sight();
        assert!(!sight.is_seen(HexCoord::new(9, 4)));
        assert!(sight.is_detected(HexCoord::new(9, 4)));

        let mut ai = AiCommander::new(AiProfile::default());
        let report = ai.act(&mut session, &[runner]).unwrap();
        assert!(report.committed.is_empty());
        assert_eq!(session.entity(runner).unwrap().position(), HexCoord::new(1, 4));
    }

    #[test]
    fn test_kill_restarts_evaluation() {
        let mut session = session();
        let shooter = spawn(
            &mut session,
            Loyalty::Player,
            HexCoord::new(2, 4),
            vec![gun(3), gun(3)],
            0,
        );
        let wounded = spawn(&mut session, Loyalty::Enemy, HexCoord::new(2, 2), vec![gun(1)], 0);
        let healthy = spawn(&mut session, Loyalty::Enemy, HexCoord::new(4, 4), vec![gun(1)], 0);
        session.affect(wounded, 7, EffectType::Physical).unwrap();
        assert_eq!(session.entity(wounded).unwrap().health, 1);

        let mut ai = AiCommander::uniform(10.0);
        let queue = ai.evaluate(&mut session, &[shooter]).unwrap();
        assert_eq!(queue.len(), 4);

        // Equal priorities: the wounded target comes first in target order
        let run = commit_in_priority_order(&mut session, queue).unwrap();
        assert_eq!(run.committed.len(), 1);
        assert!(run.restart);
        assert!(session.entity(wounded).is_none());
        assert_eq!(session.entity(healthy).unwrap().health, 8);

        let report = ai.act(&mut session, &[shooter]).unwrap();
        assert_eq!(report.committed.len(), 1);
        assert_eq!(
            report.committed[0],
            PotentialAction::OperateSystem {
                entity: shooter,
                subsystem: 1,
                target: HexCoord::new(4, 4),
            }
        );
        assert_eq!(session.entity(healthy).unwrap().health, 6);
    }
}
