//! In-memory story: characters, panels and the people in each panel.
//!
//! A [`Story`] is what the encoder writes and what an imported story file is
//! turned back into. It is also the shape of the JSON draft files the CLI
//! reads, so every type here is serde-friendly with sparse defaults.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MAX_CHARACTERS_PER_PANEL: usize = 3;
pub const MAX_GUESTS_PER_INSET: usize = 2;

/// A character from the roster: identity plus appearance notes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterProfile {
    pub name: String,
    pub face_features: String,
    pub body_features: String,
    pub personality: String,
}

impl CharacterProfile {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelMode {
    #[default]
    Single,
    FourPanel,
}

impl PanelMode {
    pub fn panel_count(self) -> usize {
        match self {
            PanelMode::Single => 1,
            PanelMode::FourPanel => 4,
        }
    }
}

/// How a character appears in a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    #[default]
    FullBody,
    /// Chibi icon with a speech bubble.
    BubbleOnly,
    /// Speech bubble only.
    TextOnly,
    /// A nested scene (dream, screen, memory) with its own setting.
    InsetVisualization,
}

impl RenderMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderMode::FullBody => "full_body",
            RenderMode::BubbleOnly => "bubble_only",
            RenderMode::TextOnly => "text_only",
            RenderMode::InsetVisualization => "inset_visualization",
        }
    }

    pub fn is_inset(self) -> bool {
        self == RenderMode::InsetVisualization
    }

    /// Four-panel strips have no room for insets.
    pub fn allowed_in_four_panel(self) -> bool {
        !self.is_inset()
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "full_body" => Ok(RenderMode::FullBody),
            "bubble_only" => Ok(RenderMode::BubbleOnly),
            "text_only" => Ok(RenderMode::TextOnly),
            "inset_visualization" => Ok(RenderMode::InsetVisualization),
            other => Err(format!("unknown render mode '{other}'")),
        }
    }
}

/// Someone who only appears inside an inset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Guest {
    pub name: String,
    pub description: String,
    pub dialogue: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelCharacter {
    /// Index into [`Story::characters`].
    pub character: Option<usize>,
    pub render_mode: RenderMode,
    pub dialogue: String,
    /// Expression and pose.
    pub features: String,
    pub internal_background: String,
    pub internal_outfit: String,
    pub internal_situation: String,
    pub internal_emotion: String,
    pub internal_dialogue: String,
    pub guests: Vec<Guest>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Panel {
    pub number: u32,
    pub scene: String,
    pub narration: String,
    pub mob: bool,
    pub characters: Vec<PanelCharacter>,
}

impl Panel {
    pub fn numbered(number: u32) -> Self {
        Self {
            number,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Story {
    pub title: String,
    pub mode: PanelMode,
    pub characters: Vec<CharacterProfile>,
    pub panels: Vec<Panel>,
}

impl Default for Story {
    fn default() -> Self {
        Self {
            title: String::new(),
            mode: PanelMode::Single,
            characters: Vec::new(),
            panels: vec![Panel::numbered(1)],
        }
    }
}

/// Why a story cannot be exported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingTitle,
    NoCharacters,
    NoPanels,
    EmptyScene { panel: u32 },
    TooManyCharacters { panel: u32, count: usize },
    UnknownCharacter { panel: u32, slot: usize },
    MissingFeatures { panel: u32, slot: usize },
    IncompleteInset { panel: u32, slot: usize },
    TooManyGuests { panel: u32, slot: usize, count: usize },
    InsetInFourPanel { panel: u32, slot: usize },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingTitle => write!(f, "title is required"),
            ValidationIssue::NoCharacters => write!(f, "at least one character is required"),
            ValidationIssue::NoPanels => write!(f, "at least one panel is required"),
            ValidationIssue::EmptyScene { panel } => {
                write!(f, "panel {panel}: scene is required")
            }
            ValidationIssue::TooManyCharacters { panel, count } => write!(
                f,
                "panel {panel}: {count} characters (max {MAX_CHARACTERS_PER_PANEL})"
            ),
            ValidationIssue::UnknownCharacter { panel, slot } => {
                write!(f, "panel {panel}, character {slot}: no character selected")
            }
            ValidationIssue::MissingFeatures { panel, slot } => {
                write!(f, "panel {panel}, character {slot}: features are required")
            }
            ValidationIssue::IncompleteInset { panel, slot } => write!(
                f,
                "panel {panel}, character {slot}: inset needs background, situation and emotion"
            ),
            ValidationIssue::TooManyGuests { panel, slot, count } => write!(
                f,
                "panel {panel}, character {slot}: {count} guests (max {MAX_GUESTS_PER_INSET})"
            ),
            ValidationIssue::InsetInFourPanel { panel, slot } => write!(
                f,
                "panel {panel}, character {slot}: inset mode is not available in four-panel stories"
            ),
        }
    }
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

impl Story {
    pub fn new(title: impl Into<String>, mode: PanelMode) -> Self {
        let mut story = Story {
            title: title.into(),
            ..Story::default()
        };
        story.set_mode(mode);
        story
    }

    /// Switch panel mode, adding or dropping trailing panels to fit.
    pub fn set_mode(&mut self, mode: PanelMode) {
        self.mode = mode;
        let count = mode.panel_count();
        self.panels.truncate(count);
        while self.panels.len() < count {
            let number = self.panels.len() as u32 + 1;
            self.panels.push(Panel::numbered(number));
        }
    }

    pub fn character_for(&self, slot: &PanelCharacter) -> Option<&CharacterProfile> {
        slot.character.and_then(|i| self.characters.get(i))
    }

    /// Every problem that blocks export. Empty when the story is complete.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if is_blank(&self.title) {
            issues.push(ValidationIssue::MissingTitle);
        }
        if self.characters.is_empty() {
            issues.push(ValidationIssue::NoCharacters);
        }
        if self.panels.is_empty() {
            issues.push(ValidationIssue::NoPanels);
        }

        for panel in &self.panels {
            let p = panel.number;
            if is_blank(&panel.scene) {
                issues.push(ValidationIssue::EmptyScene { panel: p });
            }
            if panel.characters.len() > MAX_CHARACTERS_PER_PANEL {
                issues.push(ValidationIssue::TooManyCharacters {
                    panel: p,
                    count: panel.characters.len(),
                });
            }
            for (i, slot) in panel.characters.iter().enumerate() {
                let s = i + 1;
                if self.character_for(slot).is_none() {
                    issues.push(ValidationIssue::UnknownCharacter { panel: p, slot: s });
                }
                if slot.render_mode.is_inset() {
                    if self.mode == PanelMode::FourPanel {
                        issues.push(ValidationIssue::InsetInFourPanel { panel: p, slot: s });
                    }
                    if is_blank(&slot.internal_background)
                        || is_blank(&slot.internal_situation)
                        || is_blank(&slot.internal_emotion)
                    {
                        issues.push(ValidationIssue::IncompleteInset { panel: p, slot: s });
                    }
                    if slot.guests.len() > MAX_GUESTS_PER_INSET {
                        issues.push(ValidationIssue::TooManyGuests {
                            panel: p,
                            slot: s,
                            count: slot.guests.len(),
                        });
                    }
                } else if is_blank(&slot.features) {
                    issues.push(ValidationIssue::MissingFeatures { panel: p, slot: s });
                }
            }
        }
        issues
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}
