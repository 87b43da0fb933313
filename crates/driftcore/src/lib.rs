//! `driftcore`: world data and navigation rules for the driftmud web game.
//!
//! The web layer hands this crate a character and a requested location id and
//! gets back a new character state plus a response intent. Nothing in here
//! touches HTTP or the session store, so the whole transition table is
//! testable without a server.

pub mod nav;
pub mod world;

pub use nav::{decide, Character, Intent, Mode, Step};
pub use world::{EventDef, LocationDef, World};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    MissingDescription(String),
    DanglingExit { from: String, to: String },
    MissingStart(String),
    UnknownEvent(usize),
}

impl std::fmt::Display for WorldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorldError::MissingDescription(id) => {
                write!(f, "location has no area description: {id}")
            }
            WorldError::DanglingExit { from, to } => {
                write!(f, "exit points at unknown location: {from} -> {to}")
            }
            WorldError::MissingStart(id) => write!(f, "start location is not in the graph: {id}"),
            WorldError::UnknownEvent(idx) => write!(f, "unknown event index: {idx}"),
        }
    }
}

impl std::error::Error for WorldError {}
