use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned persona identifier (one of five).
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonaId(pub u32);

impl fmt::Display for PersonaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PersonaId {
    fn from(id: u32) -> Self {
        PersonaId(id)
    }
}

impl PersonaId {
    pub fn info(&self) -> &'static PersonaInfo {
        persona_info(*self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaInfo {
    pub id: PersonaId,
    /// Category key used by the analysis pipeline.
    pub key: &'static str,
    pub display_name: &'static str,
    pub tagline: &'static str,
    /// Asset reference for the persona's portrait.
    pub asset: &'static str,
}

impl PersonaInfo {
    pub fn is_unknown(&self) -> bool {
        self.id == UNKNOWN_PERSONA.id
    }
}

pub static UNKNOWN_PERSONA: PersonaInfo = PersonaInfo {
    id: PersonaId(0),
    key: "unknown",
    display_name: "Unknown",
    tagline: "No persona matched yet",
    asset: "personas/unknown.png",
};

/// Fixed persona catalog, in the order the service presents them.
pub static PERSONAS: [PersonaInfo; 5] = [
    PersonaInfo {
        id: PersonaId(1),
        key: "pathfinder",
        display_name: "Pathfinder",
        tagline: "Goal-driven and quick to act",
        asset: "personas/pathfinder.png",
    },
    PersonaInfo {
        id: PersonaId(2),
        key: "dreamer",
        display_name: "Dreamer",
        tagline: "Imaginative and emotionally rich",
        asset: "personas/dreamer.png",
    },
    PersonaInfo {
        id: PersonaId(3),
        key: "analyst",
        display_name: "Analyst",
        tagline: "Careful, logical, detail-minded",
        asset: "personas/analyst.png",
    },
    PersonaInfo {
        id: PersonaId(4),
        key: "caretaker",
        display_name: "Caretaker",
        tagline: "Warm, supportive, people-first",
        asset: "personas/caretaker.png",
    },
    PersonaInfo {
        id: PersonaId(5),
        key: "free_spirit",
        display_name: "Free Spirit",
        tagline: "Independent and playful",
        asset: "personas/free_spirit.png",
    },
];

/// Resolve an id; unknown ids map to [`UNKNOWN_PERSONA`].
pub fn persona_info(id: PersonaId) -> &'static PersonaInfo {
    PERSONAS
        .iter()
        .find(|p| p.id == id)
        .unwrap_or(&UNKNOWN_PERSONA)
}

/// Resolve a category label from the analysis pipeline.
///
/// Accepts the category key, the display name (case-insensitive) or a
/// numeric id in string form.
pub fn persona_for_category(category: &str) -> &'static PersonaInfo {
    let category = category.trim();
    if let Ok(n) = category.parse::<u32>() {
        return persona_info(PersonaId(n));
    }
    PERSONAS
        .iter()
        .find(|p| {
            p.key.eq_ignore_ascii_case(category) || p.display_name.eq_ignore_ascii_case(category)
        })
        .unwrap_or(&UNKNOWN_PERSONA)
}
