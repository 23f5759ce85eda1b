//! Participant and side models

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{null_as_default, LocalIdentity};

/// UI color tags handed out on join
pub const COLOR_PALETTE: &[&str] = &[
    "bg-blue-500",
    "bg-green-500",
    "bg-purple-500",
    "bg-orange-500",
    "bg-pink-500",
    "bg-indigo-500",
    "bg-teal-500",
    "bg-red-500",
];

/// A position that can be argued or voted for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    For,
    Against,
}

impl Stance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stance::For => "for",
            Stance::Against => "against",
        }
    }
}

impl std::fmt::Display for Stance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A participant's side, which may not be chosen yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    For,
    Against,
    #[default]
    #[serde(rename = "none")]
    Unassigned,
}

impl Side {
    /// The stance this side argues, if any
    pub fn stance(&self) -> Option<Stance> {
        match self {
            Side::For => Some(Stance::For),
            Side::Against => Some(Stance::Against),
            Side::Unassigned => None,
        }
    }
}

impl From<Stance> for Side {
    fn from(stance: Stance) -> Self {
        match stance {
            Stance::For => Side::For,
            Stance::Against => Side::Against,
        }
    }
}

/// A roster entry, unique by `id` within a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub side: Side,
    #[serde(rename = "color", default, deserialize_with = "null_as_default")]
    pub color_tag: String,
}

impl Participant {
    /// Roster entry announced in the join handshake, with a random color
    pub fn for_identity(identity: &LocalIdentity, side: Side) -> Self {
        Self {
            id: identity.id.clone(),
            name: identity.name.clone(),
            side,
            color_tag: pick_color(&mut rand::thread_rng()),
        }
    }
}

/// First id that appears more than once in `roster`
pub fn duplicate_id(roster: &[Participant]) -> Option<&str> {
    let mut seen = HashSet::new();
    roster
        .iter()
        .map(|p| p.id.as_str())
        .find(|id| !seen.insert(*id))
}

/// How the join handshake picks a side when the caller gave none
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SidePolicy {
    /// Coin flip between for and against
    #[default]
    Random,
    /// Join without a side
    None,
}

impl SidePolicy {
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Side {
        match self {
            SidePolicy::Random => {
                if rng.gen_bool(0.5) {
                    Side::For
                } else {
                    Side::Against
                }
            }
            SidePolicy::None => Side::Unassigned,
        }
    }

    pub fn choose(&self) -> Side {
        self.pick(&mut rand::thread_rng())
    }
}

pub fn pick_color<R: Rng + ?Sized>(rng: &mut R) -> String {
    COLOR_PALETTE
        .choose(rng)
        .copied()
        .unwrap_or("bg-blue-500")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn side_none_has_no_stance() {
        assert_eq!(Side::Unassigned.stance(), None);
        assert_eq!(Side::Against.stance(), Some(Stance::Against));
    }

    #[test]
    fn participant_wire_shape() {
        let json = r#"{"id":"p1","name":"Guest-7","side":"none","color":"bg-red-500"}"#;
        let p: Participant = serde_json::from_str(json).unwrap();
        assert_eq!(p.side, Side::Unassigned);
        assert_eq!(p.color_tag, "bg-red-500");

        let back = serde_json::to_value(&p).unwrap();
        assert_eq!(back["side"], "none");
        assert_eq!(back["color"], "bg-red-500");
    }

    #[test]
    fn null_fields_fall_back_to_defaults() {
        let json = r#"[{"id":"p1","name":"Ann","side":null,"color":null},{"id":"p2","name":null}]"#;
        let roster: Vec<Participant> = serde_json::from_str(json).unwrap();
        assert_eq!(roster[0].side, Side::Unassigned);
        assert_eq!(roster[0].color_tag, "");
        assert_eq!(roster[1].name, "");
    }

    #[test]
    fn duplicate_ids_are_found() {
        let json = r#"[{"id":"a","name":"A"},{"id":"b","name":"B"},{"id":"a","name":"A2"}]"#;
        let roster: Vec<Participant> = serde_json::from_str(json).unwrap();
        assert_eq!(duplicate_id(&roster), Some("a"));
        assert_eq!(duplicate_id(&roster[..2]), None);
    }

    #[test]
    fn random_policy_never_yields_unassigned() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..64 {
            assert_ne!(SidePolicy::Random.pick(&mut rng), Side::Unassigned);
        }
        assert_eq!(SidePolicy::None.pick(&mut rng), Side::Unassigned);
    }

    #[test]
    fn colors_come_from_palette() {
        let mut rng = StdRng::seed_from_u64(1);
        let color = pick_color(&mut rng);
        assert!(COLOR_PALETTE.contains(&color.as_str()));
    }
}
