//! Turn order and turn start
//!
//! Factions take turns in registration order. Starting a turn hands it to
//! the next faction (wrapping around, which starts a new round), resets
//! sight, pulses hex effects and runs recovery for the incoming units. AI
//! factions then play their turn immediately and the turn passes on until a
//! human faction holds it or the battle ends.

use crate::battle::ai::BattleAi;
use crate::battle::events::{BattleEventKind, BattleOutcome, BattlePhase};
use crate::battle::session::BattleSession;
use crate::core::error::{Result, TacticsError};
use crate::core::types::{Loyalty, Round};

/// Who plays a faction
pub enum Controller {
    /// Actions are committed from outside, then `start_turn` is called
    Human,
    Ai(Box<dyn BattleAi>),
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Controller::Human => write!(f, "Human"),
            Controller::Ai(ai) => write!(f, "Ai({})", ai.name()),
        }
    }
}

#[derive(Debug)]
struct FactionSlot {
    loyalty: Loyalty,
    /// `None` while an AI is playing its turn
    controller: Option<Controller>,
}

/// Cyclic turn order over the registered factions
#[derive(Debug, Default)]
pub struct TurnScheduler {
    factions: Vec<FactionSlot>,
    current: Option<usize>,
    round: Round,
}

impl TurnScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_faction(&mut self, loyalty: Loyalty, controller: Controller) -> Result<()> {
        if !loyalty.is_combatant() {
            return Err(TacticsError::InvalidConfig(format!(
                "{:?} cannot take turns",
                loyalty
            )));
        }
        if self.factions.iter().any(|f| f.loyalty == loyalty) {
            return Err(TacticsError::InvalidConfig(format!(
                "{:?} is already registered",
                loyalty
            )));
        }
        self.factions.push(FactionSlot {
            loyalty,
            controller: Some(controller),
        });
        Ok(())
    }

    pub fn factions(&self) -> Vec<Loyalty> {
        self.factions.iter().map(|f| f.loyalty).collect()
    }

    pub fn current(&self) -> Option<Loyalty> {
        self.current.map(|i| self.factions[i].loyalty)
    }

    /// 0 before the first turn, then 1-based
    pub fn round(&self) -> Round {
        self.round
    }

    /// Hand the turn to the next faction; wrapping starts a new round
    fn advance(&mut self) -> Option<usize> {
        if self.factions.is_empty() {
            return None;
        }
        let next = match self.current {
            None => {
                self.round = 1;
                0
            }
            Some(i) => {
                let next = (i + 1) % self.factions.len();
                if next == 0 {
                    self.round += 1;
                }
                next
            }
        };
        self.current = Some(next);
        Some(next)
    }

    fn take_ai(&mut self, index: usize) -> Option<Box<dyn BattleAi>> {
        let slot = self.factions.get_mut(index)?;
        match slot.controller.take() {
            Some(Controller::Ai(ai)) => Some(ai),
            other => {
                slot.controller = other;
                None
            }
        }
    }

    fn restore_ai(&mut self, index: usize, ai: Box<dyn BattleAi>) {
        if let Some(slot) = self.factions.get_mut(index) {
            slot.controller = Some(Controller::Ai(ai));
        }
    }
}

impl BattleSession {
    /// End the current faction's turn and start the next one
    ///
    /// Returns once a human faction holds the turn or the battle is over.
    /// Does nothing once the battle has finished.
    pub fn start_turn(&mut self) -> Result<()> {
        loop {
            if self.is_finished() {
                return Ok(());
            }

            if let Some(outgoing) = self.scheduler.current() {
                for id in self.units_of(outgoing) {
                    if let Some(entity) = self.entities.get_mut(&id) {
                        entity.action_cache = None;
                    }
                }
            }

            let Some(index) = self.scheduler.advance() else {
                return Err(TacticsError::InvalidConfig("no factions registered".into()));
            };
            if self.phase == BattlePhase::Setup {
                self.phase = BattlePhase::Active;
                tracing::info!("Battle started with factions {:?}", self.scheduler.factions());
                self.log(BattleEventKind::BattleStarted, "Battle has begun".into());
            }
            if self.scheduler.round() > self.config.max_rounds {
                self.end_battle(BattleOutcome::Stalemate);
                return Ok(());
            }

            let Some(faction) = self.scheduler.current() else {
                return Ok(());
            };
            tracing::debug!("Round {}: {:?} turn", self.round(), faction);

            self.reset_sight();
            self.tick_hex_effects()?;
            for id in self.units_of(faction) {
                if self.is_finished() {
                    break;
                }
                self.begin_unit_turn(id)?;
            }
            self.log(
                BattleEventKind::TurnStarted { faction },
                format!("{:?} turn", faction),
            );
            if self.is_finished() {
                return Ok(());
            }

            let Some(mut ai) = self.scheduler.take_ai(index) else {
                return Ok(());
            };
            let units = self.units_of(faction);
            let result = ai.act(self, &units);
            self.scheduler.restore_ai(index, ai);
            let report = result?;
            tracing::debug!(
                "{:?} AI committed {} actions from {} evaluations",
                faction,
                report.committed.len(),
                report.evaluations
            );
        }
    }
}
