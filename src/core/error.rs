use thiserror::Error;

use crate::battle::hex::HexCoord;
use crate::core::types::EntityId;

#[derive(Error, Debug)]
pub enum TacticsError {
    #[error("Hex {hex:?} already holds {occupant:?}, cannot place {incoming:?}")]
    OccupancyConflict {
        hex: HexCoord,
        occupant: EntityId,
        incoming: EntityId,
    },

    #[error("No path from {from:?} to {to:?}")]
    NoPathExists { from: HexCoord, to: HexCoord },

    #[error("{kind} template not found: {name}")]
    TemplateNotFound { kind: &'static str, name: String },

    #[error("Entity not found: {0:?}")]
    EntityNotFound(EntityId),

    #[error("Hex not on the grid: {0:?}")]
    HexNotFound(HexCoord),

    #[error("Illegal action: {0}")]
    IllegalAction(String),

    #[error("Template {template} has {slots} system slots but {requested} subsystems were fitted")]
    SlotOverflow {
        template: String,
        slots: usize,
        requested: usize,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, TacticsError>;
