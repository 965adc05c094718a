//! Story YAML decoder.
//!
//! The file is parsed into a YAML tree and projected field by field into an
//! [`ImportedStory`]. Projection is tolerant: an entry of the wrong shape is
//! skipped, the rest of the story still loads, and every skip is recorded in
//! [`ImportedStory::warnings`] so nothing is dropped silently.
//!
//! Scalars are read loosely. `mob: "true"` and `panel: "2"` work, numbers
//! are accepted where text is expected, and empty strings read as absent.

use super::StoryError;
use super::model::{CharacterProfile, Guest, Panel, PanelCharacter, PanelMode, RenderMode, Story};
use log::warn;
use serde_yaml_ng::Value;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportedStory {
    pub title: Option<String>,
    /// Actor registry in document order.
    pub actors: Vec<ImportedActor>,
    /// Legacy `characters:` list.
    pub characters: Vec<ImportedCharacter>,
    pub panels: Vec<ImportedPanel>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportedActor {
    pub key: String,
    pub name: Option<String>,
    pub face_reference: Option<String>,
    pub chibi_reference: Option<String>,
    pub face: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportedCharacter {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportedPanel {
    pub number: u32,
    pub scene: Option<String>,
    pub tags: Option<String>,
    pub narration: Option<String>,
    pub mob: bool,
    pub characters: Vec<ImportedPanelCharacter>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportedPanelCharacter {
    pub actor: Option<String>,
    pub name: Option<String>,
    pub dialogue: Option<String>,
    pub features: Option<String>,
    pub position: Option<String>,
    pub render_mode: Option<String>,
    pub bubble_style: Option<String>,
    pub visible: Option<bool>,
    pub container_type: Option<String>,
    pub internal_background: Option<String>,
    pub internal_outfit: Option<String>,
    pub internal_situation: Option<String>,
    pub internal_emotion: Option<String>,
    pub guest_name: Option<String>,
    pub guest_description: Option<String>,
    pub internal_dialogue: Vec<String>,
    pub guests: Vec<ImportedGuest>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportedGuest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub dialogue: Option<String>,
}

pub fn decode(content: &str) -> Result<ImportedStory, StoryError> {
    let root: Value = serde_yaml_ng::from_str(content)?;
    let mut projector = Projector::default();
    let mut story = match &root {
        Value::Mapping(_) => projector.story(&root),
        Value::Null => {
            projector.warn("story file is empty".to_string());
            ImportedStory::default()
        }
        _ => return Err(StoryError::NotAMapping),
    };
    story.warnings = projector.warnings;
    Ok(story)
}

pub fn load(path: &Path) -> Result<ImportedStory, StoryError> {
    let content = fs::read_to_string(path)?;
    decode(&content)
}

// ============================================================================
// Projection
// ============================================================================

#[derive(Default)]
struct Projector {
    warnings: Vec<String>,
}

impl Projector {
    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }

    fn story(&mut self, root: &Value) -> ImportedStory {
        ImportedStory {
            title: self.text(root, "title", "story"),
            actors: self.actors(root),
            characters: self.legacy_characters(root),
            panels: self.panels(root),
            warnings: Vec::new(),
        }
    }

    fn actors(&mut self, root: &Value) -> Vec<ImportedActor> {
        let Some(node) = root.get("actors") else {
            return Vec::new();
        };
        let Some(mapping) = node.as_mapping() else {
            if !node.is_null() {
                self.warn("'actors' is not a mapping, ignored".to_string());
            }
            return Vec::new();
        };

        let mut actors = Vec::new();
        for (key, entry) in mapping {
            let Some(key) = scalar(key) else {
                self.warn("actor with a non-scalar key, skipped".to_string());
                continue;
            };
            if !entry.is_mapping() {
                self.warn(format!("actor '{key}' is not a mapping, skipped"));
                continue;
            }
            let ctx = format!("actor '{key}'");
            let name = self.text(entry, "name", &ctx);
            if name.is_none() {
                self.warn(format!("{ctx} has no name"));
            }
            let appearance = entry.get("appearance_compilation");
            let (face, body) = match appearance {
                Some(a) if a.is_mapping() => (
                    self.text(a, "Face", &ctx),
                    self.text(a, "Body", &ctx),
                ),
                Some(a) if !a.is_null() => {
                    self.warn(format!("{ctx}: appearance_compilation is not a mapping, ignored"));
                    (None, None)
                }
                _ => (None, None),
            };
            actors.push(ImportedActor {
                face_reference: self.text(entry, "face_reference", &ctx),
                chibi_reference: self.text(entry, "chibi_reference", &ctx),
                key,
                name,
                face,
                body,
            });
        }
        actors
    }

    fn legacy_characters(&mut self, root: &Value) -> Vec<ImportedCharacter> {
        let Some(items) = self.sequence(root, "characters", "story") else {
            return Vec::new();
        };
        let mut characters = Vec::new();
        for (i, item) in items.iter().enumerate() {
            let ctx = format!("character {}", i + 1);
            // A bare string entry is a name.
            if let Some(name) = scalar(item).filter(|s| !s.is_empty()) {
                characters.push(ImportedCharacter { id: None, name });
                continue;
            }
            if !item.is_mapping() {
                self.warn(format!("{ctx} is not a mapping, skipped"));
                continue;
            }
            match self.text(item, "name", &ctx) {
                Some(name) => characters.push(ImportedCharacter {
                    id: self.text(item, "id", &ctx),
                    name,
                }),
                None => self.warn(format!("{ctx} has no name, skipped")),
            }
        }
        characters
    }

    fn panels(&mut self, root: &Value) -> Vec<ImportedPanel> {
        let Some(items) = self.sequence(root, "panels", "story") else {
            return Vec::new();
        };
        let mut panels = Vec::new();
        for (i, item) in items.iter().enumerate() {
            let position = i as u32 + 1;
            if !item.is_mapping() {
                self.warn(format!("panel entry {position} is not a mapping, skipped"));
                continue;
            }
            let number = match item.get("panel").map(number) {
                Some(Some(n)) => n,
                Some(None) => {
                    self.warn(format!(
                        "panel entry {position}: 'panel' is not a number, using {position}"
                    ));
                    position
                }
                None => {
                    self.warn(format!(
                        "panel entry {position} has no 'panel' number, using {position}"
                    ));
                    position
                }
            };
            let ctx = format!("panel {number}");
            panels.push(ImportedPanel {
                number,
                scene: self.text(item, "scene", &ctx),
                tags: self.text(item, "tags", &ctx),
                narration: self.text(item, "narration", &ctx),
                mob: self.flag(item, "mob", &ctx).unwrap_or(false),
                characters: self.panel_characters(item, &ctx),
            });
        }
        panels
    }

    fn panel_characters(&mut self, panel: &Value, ctx: &str) -> Vec<ImportedPanelCharacter> {
        let Some(items) = self.sequence(panel, "characters", ctx) else {
            return Vec::new();
        };
        let mut characters = Vec::new();
        for (i, item) in items.iter().enumerate() {
            let ctx = format!("{ctx}, character {}", i + 1);
            if !item.is_mapping() {
                self.warn(format!("{ctx} is not a mapping, skipped"));
                continue;
            }
            let character = ImportedPanelCharacter {
                actor: self.text(item, "actor", &ctx),
                name: self.text(item, "name", &ctx),
                dialogue: self.text(item, "dialogue", &ctx),
                features: self.text(item, "features", &ctx),
                position: self.text(item, "position", &ctx),
                render_mode: self.text(item, "render_mode", &ctx),
                bubble_style: self.text(item, "bubble_style", &ctx),
                visible: self.flag(item, "visible", &ctx),
                container_type: self.text(item, "container_type", &ctx),
                internal_background: self.text(item, "internal_background", &ctx),
                internal_outfit: self.text(item, "internal_outfit", &ctx),
                internal_situation: self.text(item, "internal_situation", &ctx),
                internal_emotion: self.text(item, "internal_emotion", &ctx),
                guest_name: self.text(item, "guest_name", &ctx),
                guest_description: self.text(item, "guest_description", &ctx),
                internal_dialogue: self.internal_dialogue(item, &ctx),
                guests: self.guests(item, &ctx),
            };
            if character.actor.is_none() && character.name.is_none() {
                self.warn(format!("{ctx} has neither actor nor name, skipped"));
                continue;
            }
            characters.push(character);
        }
        characters
    }

    fn internal_dialogue(&mut self, item: &Value, ctx: &str) -> Vec<String> {
        match item.get("internal_dialogue") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Sequence(lines)) => lines
                .iter()
                .filter_map(|line| {
                    let text = scalar(line);
                    if text.is_none() {
                        self.warn(format!("{ctx}: non-scalar internal_dialogue line, skipped"));
                    }
                    text.filter(|s| !s.is_empty())
                })
                .collect(),
            Some(other) => match scalar(other) {
                Some(line) if !line.is_empty() => vec![line],
                Some(_) => Vec::new(),
                None => {
                    self.warn(format!("{ctx}: internal_dialogue is a mapping, ignored"));
                    Vec::new()
                }
            },
        }
    }

    fn guests(&mut self, item: &Value, ctx: &str) -> Vec<ImportedGuest> {
        let Some(items) = self.sequence(item, "guests", ctx) else {
            return Vec::new();
        };
        let mut guests = Vec::new();
        for (i, guest) in items.iter().enumerate() {
            let ctx = format!("{ctx}, guest {}", i + 1);
            if !guest.is_mapping() {
                self.warn(format!("{ctx} is not a mapping, skipped"));
                continue;
            }
            guests.push(ImportedGuest {
                name: self.text(guest, "name", &ctx),
                description: self.text(guest, "description", &ctx),
                dialogue: self.text(guest, "dialogue", &ctx),
            });
        }
        guests
    }

    // ------------------------------------------------------------------------
    // Field readers
    // ------------------------------------------------------------------------

    /// Scalar field as text; absent, null and empty all read as `None`.
    fn text(&mut self, map: &Value, key: &str, ctx: &str) -> Option<String> {
        let value = map.get(key)?;
        match scalar(value) {
            Some(s) if s.is_empty() => None,
            Some(s) => Some(s),
            None if value.is_null() => None,
            None => {
                self.warn(format!("{ctx}: '{key}' is not a scalar, ignored"));
                None
            }
        }
    }

    fn flag(&mut self, map: &Value, key: &str, ctx: &str) -> Option<bool> {
        let value = map.get(key)?;
        if value.is_null() {
            return None;
        }
        let parsed = match value {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" => Some(true),
                "false" | "no" | "" => Some(false),
                _ => None,
            },
            _ => None,
        };
        if parsed.is_none() {
            self.warn(format!("{ctx}: '{key}' is not a boolean, ignored"));
        }
        parsed
    }

    fn sequence<'a>(&mut self, map: &'a Value, key: &str, ctx: &str) -> Option<&'a Vec<Value>> {
        let value = map.get(key)?;
        match value {
            Value::Sequence(items) => Some(items),
            Value::Null => None,
            _ => {
                self.warn(format!("{ctx}: '{key}' is not a list, ignored"));
                None
            }
        }
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn number(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ============================================================================
// Conversion back to a story
// ============================================================================

impl ImportedStory {
    /// Character names in matching order: actors first, then legacy
    /// characters, without duplicates.
    pub fn character_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let actor_names = self.actors.iter().filter_map(|a| a.name.clone());
        let legacy_names = self.characters.iter().map(|c| c.name.clone());
        for name in actor_names.chain(legacy_names) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    pub fn actor(&self, key: &str) -> Option<&ImportedActor> {
        self.actors.iter().find(|a| a.key == key)
    }

    /// Rebuild an editable story.
    ///
    /// Characters found in `roster` by exact name take the roster profile;
    /// others are built from the actor's appearance notes. Panel characters
    /// are linked by actor key first, then by name.
    pub fn to_story(&self, roster: &[CharacterProfile]) -> Story {
        let names = self.character_names();
        let characters: Vec<CharacterProfile> = names
            .iter()
            .map(|name| {
                roster
                    .iter()
                    .find(|c| &c.name == name)
                    .cloned()
                    .unwrap_or_else(|| {
                        let actor = self.actors.iter().find(|a| a.name.as_ref() == Some(name));
                        CharacterProfile {
                            name: name.clone(),
                            face_features: actor.and_then(|a| a.face.clone()).unwrap_or_default(),
                            body_features: actor.and_then(|a| a.body.clone()).unwrap_or_default(),
                            personality: String::new(),
                        }
                    })
            })
            .collect();

        let index_of = |slot: &ImportedPanelCharacter| -> Option<usize> {
            let by_actor = slot
                .actor
                .as_deref()
                .and_then(|key| self.actor(key))
                .and_then(|a| a.name.as_ref());
            let name = by_actor.or(slot.name.as_ref())?;
            names.iter().position(|n| n == name)
        };

        let panels = self
            .panels
            .iter()
            .map(|panel| Panel {
                number: panel.number,
                scene: panel.scene.clone().unwrap_or_default(),
                narration: panel.narration.clone().unwrap_or_default(),
                mob: panel.mob,
                characters: panel
                    .characters
                    .iter()
                    .map(|slot| PanelCharacter {
                        character: index_of(slot),
                        render_mode: slot
                            .render_mode
                            .as_deref()
                            .and_then(|m| m.parse::<RenderMode>().ok())
                            .unwrap_or_default(),
                        dialogue: slot.dialogue.clone().unwrap_or_default(),
                        features: slot.features.clone().unwrap_or_default(),
                        internal_background: slot.internal_background.clone().unwrap_or_default(),
                        internal_outfit: slot.internal_outfit.clone().unwrap_or_default(),
                        internal_situation: slot.internal_situation.clone().unwrap_or_default(),
                        internal_emotion: slot.internal_emotion.clone().unwrap_or_default(),
                        internal_dialogue: slot.internal_dialogue.join("\n"),
                        guests: slot.story_guests(),
                    })
                    .collect(),
            })
            .collect::<Vec<_>>();

        let mode = if panels.len() == PanelMode::FourPanel.panel_count() {
            PanelMode::FourPanel
        } else {
            PanelMode::Single
        };

        Story {
            title: self.title.clone().unwrap_or_default(),
            mode,
            characters,
            panels,
        }
    }
}

impl ImportedPanelCharacter {
    /// Guests list, or the single legacy `guest_name` / `guest_description` pair.
    fn story_guests(&self) -> Vec<Guest> {
        if !self.guests.is_empty() {
            return self
                .guests
                .iter()
                .map(|g| Guest {
                    name: g.name.clone().unwrap_or_default(),
                    description: g.description.clone().unwrap_or_default(),
                    dialogue: g.dialogue.clone().unwrap_or_default(),
                })
                .collect();
        }
        if self.guest_name.is_none() && self.guest_description.is_none() {
            return Vec::new();
        }
        vec![Guest {
            name: self.guest_name.clone().unwrap_or_default(),
            description: self.guest_description.clone().unwrap_or_default(),
            dialogue: String::new(),
        }]
    }
}
