use std::collections::HashMap;

use anyhow::Context;
use serde::Deserialize;

use crate::WorldError;

// The world is compiled in as JSON so deploys stay binary-only.
const LOCATIONS_JSON: &str = include_str!("../data/locations.json");
const AREAS_JSON: &str = include_str!("../data/areas.json");
const EVENTS_JSON: &str = include_str!("../data/events.json");

const START_LOCATION: &str = "town";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct EventDef {
    pub description: String,
    pub choices: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct LocationDef {
    pub description: String,
    /// Ids a character standing here may travel to.
    pub exits: Vec<String>,
}

/// Static location graph plus the scripted event table.
///
/// Immutable after load; shared across requests behind an `Arc`.
#[derive(Clone, Debug)]
pub struct World {
    locations: HashMap<String, LocationDef>,
    events: Vec<EventDef>,
    start_location: String,
}

impl World {
    pub fn load() -> anyhow::Result<Self> {
        let exits: HashMap<String, Vec<String>> =
            serde_json::from_str(LOCATIONS_JSON).context("parse embedded locations.json")?;
        let areas: HashMap<String, String> =
            serde_json::from_str(AREAS_JSON).context("parse embedded areas.json")?;
        let events: Vec<EventDef> =
            serde_json::from_str(EVENTS_JSON).context("parse embedded events.json")?;

        Ok(Self::from_tables(exits, areas, events, START_LOCATION)?)
    }

    /// Join the adjacency and description tables into one graph.
    ///
    /// The adjacency table's keys define the set of valid locations: every
    /// key needs a description, every exit must target a key, and the start
    /// location must be a key.
    pub fn from_tables(
        exits: HashMap<String, Vec<String>>,
        mut areas: HashMap<String, String>,
        events: Vec<EventDef>,
        start_location: &str,
    ) -> Result<Self, WorldError> {
        let mut locations = HashMap::new();
        for (id, exits) in exits {
            let description = areas
                .remove(&id)
                .ok_or_else(|| WorldError::MissingDescription(id.clone()))?;
            locations.insert(
                id,
                LocationDef {
                    description,
                    exits,
                },
            );
        }

        for (id, def) in &locations {
            for to in &def.exits {
                if !locations.contains_key(to) {
                    return Err(WorldError::DanglingExit {
                        from: id.clone(),
                        to: to.clone(),
                    });
                }
            }
        }

        if !locations.contains_key(start_location) {
            return Err(WorldError::MissingStart(start_location.to_string()));
        }

        Ok(Self {
            locations,
            events,
            start_location: start_location.to_string(),
        })
    }

    pub fn start_location(&self) -> &str {
        &self.start_location
    }

    pub fn has_location(&self, id: &str) -> bool {
        self.locations.contains_key(id)
    }

    pub fn location(&self, id: &str) -> Option<&LocationDef> {
        self.locations.get(id)
    }

    /// Exits from `id`; empty for unknown ids.
    pub fn neighbors(&self, id: &str) -> &[String] {
        self.locations
            .get(id)
            .map(|def| def.exits.as_slice())
            .unwrap_or(&[])
    }

    pub fn event(&self, idx: usize) -> Result<&EventDef, WorldError> {
        self.events.get(idx).ok_or(WorldError::UnknownEvent(idx))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{EventDef, World};
    use crate::WorldError;

    fn tables() -> (HashMap<String, Vec<String>>, HashMap<String, String>) {
        let mut exits = HashMap::new();
        exits.insert("town".to_string(), vec!["forest".to_string()]);
        exits.insert("forest".to_string(), vec!["town".to_string()]);

        let mut areas = HashMap::new();
        areas.insert("town".to_string(), "a town".to_string());
        areas.insert("forest".to_string(), "a forest".to_string());
        (exits, areas)
    }

    fn event() -> EventDef {
        EventDef {
            description: "an event".to_string(),
            choices: vec!["fight".to_string(), "flee".to_string()],
        }
    }

    #[test]
    fn embedded_world_loads_and_is_closed() {
        let w = World::load().expect("embedded world");
        assert!(w.has_location(w.start_location()));
        for (id, def) in &w.locations {
            for to in &def.exits {
                assert!(w.has_location(to), "{id} -> {to} dangles");
            }
        }
        assert!(w.event(0).is_ok());
    }

    #[test]
    fn from_tables_rejects_dangling_exit() {
        let (mut exits, areas) = tables();
        exits
            .get_mut("town")
            .unwrap()
            .push("nowhere".to_string());

        let err = World::from_tables(exits, areas, vec![event()], "town").unwrap_err();
        assert_eq!(
            err,
            WorldError::DanglingExit {
                from: "town".to_string(),
                to: "nowhere".to_string(),
            }
        );
    }

    #[test]
    fn from_tables_rejects_missing_description() {
        let (exits, mut areas) = tables();
        areas.remove("forest");

        let err = World::from_tables(exits, areas, vec![event()], "town").unwrap_err();
        assert_eq!(err, WorldError::MissingDescription("forest".to_string()));
    }

    #[test]
    fn from_tables_rejects_unknown_start() {
        let (exits, areas) = tables();
        let err = World::from_tables(exits, areas, vec![event()], "desert").unwrap_err();
        assert_eq!(err, WorldError::MissingStart("desert".to_string()));
    }

    #[test]
    fn neighbors_of_unknown_location_is_empty() {
        let (exits, areas) = tables();
        let w = World::from_tables(exits, areas, vec![event()], "town").unwrap();
        assert!(w.neighbors("nowhere").is_empty());
        assert_eq!(w.neighbors("town"), ["forest".to_string()]);
    }

    #[test]
    fn event_lookup_out_of_range() {
        let (exits, areas) = tables();
        let w = World::from_tables(exits, areas, vec![event()], "town").unwrap();
        assert_eq!(w.event(1).unwrap_err(), WorldError::UnknownEvent(1));
    }
}
