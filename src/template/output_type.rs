//! Output-type catalogue.
//!
//! Every generated document belongs to one output type. The type names its
//! block in the master template (`template_key`), and together with a few
//! mode switches picks the selection-map entry that lists its sections.
//!
//! | Output type | Selection keys |
//! |-------------|----------------|
//! | `outfit_sheet` | `outfit_sheet_reference`, `outfit_sheet_preset` |
//! | `pose` | `pose_reference`, `pose_preset` |
//! | `scene_builder` | `scene_builder_story`, `scene_builder_battle`, `scene_builder_boss_raid` |
//! | `background` | `background_with_reference`, `background_without_reference` |
//! | `style_transform` | `style_transform_transparent`, `style_transform_normal` |
//! | everything else | its template key |

use super::TemplateError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputType {
    FaceSheet,
    BodySheet,
    OutfitSheet,
    Pose,
    SceneBuilder,
    Background,
    DecorativeText,
    FourPanel,
    StyleTransform,
    Infographic,
}

impl OutputType {
    pub const ALL: [OutputType; 10] = [
        OutputType::FaceSheet,
        OutputType::BodySheet,
        OutputType::OutfitSheet,
        OutputType::Pose,
        OutputType::SceneBuilder,
        OutputType::Background,
        OutputType::DecorativeText,
        OutputType::FourPanel,
        OutputType::StyleTransform,
        OutputType::Infographic,
    ];

    /// Key of this type's block under `output_types` in the master template.
    pub fn template_key(self) -> &'static str {
        match self {
            OutputType::FaceSheet => "face_sheet",
            OutputType::BodySheet => "body_sheet",
            OutputType::OutfitSheet => "outfit_sheet",
            OutputType::Pose => "pose",
            OutputType::SceneBuilder => "scene_builder",
            OutputType::Background => "background",
            OutputType::DecorativeText => "decorative_text",
            OutputType::FourPanel => "four_panel",
            OutputType::StyleTransform => "style_transform",
            OutputType::Infographic => "infographic",
        }
    }

    /// Selection-map key for this type under the given options.
    pub fn selection_key(self, options: &SelectionOptions) -> String {
        match self {
            OutputType::OutfitSheet => {
                if options.reference {
                    "outfit_sheet_reference".into()
                } else {
                    "outfit_sheet_preset".into()
                }
            }
            OutputType::Pose => {
                if options.reference {
                    "pose_reference".into()
                } else {
                    "pose_preset".into()
                }
            }
            OutputType::SceneBuilder => format!("scene_builder_{}", options.scene.as_str()),
            OutputType::Background => {
                if options.reference {
                    "background_with_reference".into()
                } else {
                    "background_without_reference".into()
                }
            }
            OutputType::StyleTransform => {
                if options.transparent {
                    "style_transform_transparent".into()
                } else {
                    "style_transform_normal".into()
                }
            }
            other => other.template_key().into(),
        }
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.template_key())
    }
}

impl FromStr for OutputType {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        OutputType::ALL
            .into_iter()
            .find(|t| t.template_key() == wanted)
            .ok_or_else(|| TemplateError::UnknownOutputType(s.to_string()))
    }
}

/// Scene flavour for the scene builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SceneType {
    #[default]
    Story,
    Battle,
    BossRaid,
}

impl SceneType {
    pub fn as_str(self) -> &'static str {
        match self {
            SceneType::Story => "story",
            SceneType::Battle => "battle",
            SceneType::BossRaid => "boss_raid",
        }
    }
}

impl FromStr for SceneType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "story" => Ok(SceneType::Story),
            "battle" => Ok(SceneType::Battle),
            "boss_raid" => Ok(SceneType::BossRaid),
            other => Err(format!(
                "unknown scene type '{other}' (expected story, battle or boss_raid)"
            )),
        }
    }
}

/// Mode switches that pick between an output type's selection entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionOptions {
    /// A reference image drives the output (outfit, pose, background).
    pub reference: bool,
    pub scene: SceneType,
    /// Style transform onto a transparent background.
    pub transparent: bool,
}
