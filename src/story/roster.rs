//! Matching an imported story's cast against the character roster.
//!
//! The roster is a JSON array of [`CharacterProfile`]s. Names are compared
//! exactly. A story can only be applied when every name it mentions is in
//! the roster.

use super::StoryError;
use super::decode::ImportedStory;
use super::model::CharacterProfile;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterMatch {
    /// Name as written in the story file.
    pub yaml_name: String,
    /// Registry key when the name came from `actors:`.
    pub actor_key: Option<String>,
    pub matched: Option<CharacterProfile>,
    pub face_reference: Option<String>,
    pub chibi_reference: Option<String>,
}

impl CharacterMatch {
    pub fn is_matched(&self) -> bool {
        self.matched.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchReport {
    pub matches: Vec<CharacterMatch>,
}

impl MatchReport {
    /// False when nothing was matched at all, including an empty cast.
    pub fn all_matched(&self) -> bool {
        !self.matches.is_empty() && self.matches.iter().all(CharacterMatch::is_matched)
    }

    pub fn unmatched_count(&self) -> usize {
        self.matches.iter().filter(|m| !m.is_matched()).count()
    }
}

/// Actors first in document order, then legacy characters; each name once.
pub fn match_characters(imported: &ImportedStory, roster: &[CharacterProfile]) -> MatchReport {
    let lookup = |name: &str| roster.iter().find(|c| c.name == name).cloned();
    let mut matches: Vec<CharacterMatch> = Vec::new();
    let seen = |matches: &[CharacterMatch], name: &str| matches.iter().any(|m| m.yaml_name == name);

    for actor in &imported.actors {
        let Some(name) = actor.name.as_deref() else {
            continue;
        };
        if seen(&matches, name) {
            continue;
        }
        matches.push(CharacterMatch {
            yaml_name: name.to_string(),
            actor_key: Some(actor.key.clone()),
            matched: lookup(name),
            face_reference: actor.face_reference.clone(),
            chibi_reference: actor.chibi_reference.clone(),
        });
    }

    for character in &imported.characters {
        if seen(&matches, &character.name) {
            continue;
        }
        matches.push(CharacterMatch {
            yaml_name: character.name.clone(),
            actor_key: None,
            matched: lookup(&character.name),
            face_reference: None,
            chibi_reference: None,
        });
    }

    MatchReport { matches }
}

pub fn load_roster(path: &Path) -> Result<Vec<CharacterProfile>, StoryError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
