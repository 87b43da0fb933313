use crate::world::World;

/// Requesting this id starts the scripted event instead of a move.
/// It is not a location graph key.
pub const EVENT_LOCATION: &str = "event";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Idle,
    /// One-way for now: no transition back to `Idle` exists. `returning_to`
    /// remembers where the character stood when the event started.
    InEvent { returning_to: String, event: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Character {
    pub name: String,
    /// Always a location graph key, also while an event is running.
    pub location: String,
    pub mode: Mode,
}

impl Character {
    pub fn new(name: &str, location: &str) -> Self {
        Self {
            name: name.to_string(),
            location: location.to_string(),
            mode: Mode::Idle,
        }
    }

    pub fn in_event(&self) -> bool {
        matches!(self.mode, Mode::InEvent { .. })
    }
}

/// What the web layer should answer with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// 200, location view for `location`.
    ShowLocation { location: String },
    /// 200, event view for event table index `event`.
    ShowEvent { event: usize },
    /// 404, the id is neither a graph key nor the event id.
    UnknownLocation,
    /// Redirect back to the character's current location.
    Blocked { current: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub next: Character,
    pub intent: Intent,
}

/// Interpret a requested location id against the character's state.
///
/// Pure: the caller applies `next` to its session store only after deciding
/// the request produced a renderable response.
pub fn decide(world: &World, character: &Character, requested: &str) -> Step {
    if requested != EVENT_LOCATION && !world.has_location(requested) {
        return Step {
            next: character.clone(),
            intent: Intent::UnknownLocation,
        };
    }

    // A running event swallows every valid request and re-renders itself.
    if let Mode::InEvent { event, .. } = character.mode {
        return Step {
            next: character.clone(),
            intent: Intent::ShowEvent { event },
        };
    }

    if requested == EVENT_LOCATION {
        let mut next = character.clone();
        next.mode = Mode::InEvent {
            returning_to: character.location.clone(),
            event: 0,
        };
        return Step {
            next,
            intent: Intent::ShowEvent { event: 0 },
        };
    }

    let reachable = requested == character.location
        || world
            .neighbors(&character.location)
            .iter()
            .any(|n| n == requested);
    if !reachable {
        return Step {
            next: character.clone(),
            intent: Intent::Blocked {
                current: character.location.clone(),
            },
        };
    }

    let mut next = character.clone();
    next.location = requested.to_string();
    Step {
        next,
        intent: Intent::ShowLocation {
            location: requested.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{decide, Character, Intent, Mode, EVENT_LOCATION};
    use crate::world::{EventDef, World};

    fn world() -> World {
        let mut exits = HashMap::new();
        exits.insert("town".to_string(), vec!["forest".to_string()]);
        exits.insert(
            "forest".to_string(),
            vec!["town".to_string(), "desert".to_string()],
        );
        exits.insert("desert".to_string(), vec!["forest".to_string()]);

        let mut areas = HashMap::new();
        for (id, text) in [
            ("town", "a town"),
            ("forest", "a forest"),
            ("desert", "a desert"),
        ] {
            areas.insert(id.to_string(), text.to_string());
        }

        let events = vec![EventDef {
            description: "an event".to_string(),
            choices: vec!["fight".to_string(), "flee".to_string()],
        }];

        World::from_tables(exits, areas, events, "town").expect("fixture world")
    }

    fn steve() -> Character {
        Character::new("Steve", "town")
    }

    #[test]
    fn requesting_current_location_rerenders_it() {
        let w = world();
        let step = decide(&w, &steve(), "town");
        assert_eq!(
            step.intent,
            Intent::ShowLocation {
                location: "town".to_string()
            }
        );
        assert_eq!(step.next, steve());
    }

    #[test]
    fn adjacent_move_updates_location() {
        let w = world();
        let step = decide(&w, &steve(), "forest");
        assert_eq!(
            step.intent,
            Intent::ShowLocation {
                location: "forest".to_string()
            }
        );
        assert_eq!(step.next.location, "forest");
        assert_eq!(step.next.mode, Mode::Idle);
    }

    #[test]
    fn non_adjacent_move_is_blocked_and_leaves_state_alone() {
        let w = world();
        let step = decide(&w, &steve(), "desert");
        assert_eq!(
            step.intent,
            Intent::Blocked {
                current: "town".to_string()
            }
        );
        assert_eq!(step.next, steve());
    }

    #[test]
    fn unknown_location_is_not_found() {
        let w = world();
        let step = decide(&w, &steve(), "nowhere");
        assert_eq!(step.intent, Intent::UnknownLocation);
        assert_eq!(step.next, steve());
    }

    #[test]
    fn event_entry_saves_the_previous_location() {
        let w = world();
        let step = decide(&w, &steve(), EVENT_LOCATION);
        assert_eq!(step.intent, Intent::ShowEvent { event: 0 });
        assert_eq!(
            step.next.mode,
            Mode::InEvent {
                returning_to: "town".to_string(),
                event: 0,
            }
        );
        // The character keeps standing on a real graph key.
        assert_eq!(step.next.location, "town");
    }

    #[test]
    fn running_event_swallows_valid_requests() {
        let w = world();
        let entered = decide(&w, &steve(), EVENT_LOCATION).next;

        for requested in ["town", "forest", "desert", EVENT_LOCATION] {
            let step = decide(&w, &entered, requested);
            assert_eq!(step.intent, Intent::ShowEvent { event: 0 });
            assert_eq!(step.next, entered, "event mode must not change");
        }
    }

    #[test]
    fn unknown_location_is_not_found_even_during_an_event() {
        let w = world();
        let entered = decide(&w, &steve(), EVENT_LOCATION).next;

        let step = decide(&w, &entered, "fight");
        assert_eq!(step.intent, Intent::UnknownLocation);
        assert_eq!(step.next, entered);
    }

    // The walkthrough from the original game data: town -> forest works,
    // desert from town does not, junk 404s.
    #[test]
    fn town_forest_walkthrough() {
        let w = world();
        let mut ch = steve();

        let step = decide(&w, &ch, "forest");
        assert_eq!(
            step.intent,
            Intent::ShowLocation {
                location: "forest".to_string()
            }
        );
        ch = step.next;

        // desert is adjacent to forest, but town is not adjacent to desert.
        let step = decide(&w, &ch, "desert");
        assert_eq!(
            step.intent,
            Intent::ShowLocation {
                location: "desert".to_string()
            }
        );
        ch = step.next;

        let step = decide(&w, &ch, "town");
        assert_eq!(
            step.intent,
            Intent::Blocked {
                current: "desert".to_string()
            }
        );

        let step = decide(&w, &ch, "nowhere");
        assert_eq!(step.intent, Intent::UnknownLocation);
    }
}
