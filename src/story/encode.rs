//! Story YAML encoder.
//!
//! The layout is fixed and written by hand so that the file reads well and
//! diffs cleanly:
//!
//! ```text
//! # header comment
//! title: "..."
//! actors:                       # registry, actor_A .. actor_Z, actor_27 ..
//!   actor_A:
//!     name / face_reference / chibi_reference / appearance_compilation
//! characters:                   # legacy list: id + name
//! panels:
//!   - panel: N
//!     scene / narration / mob
//!     characters:
//!       - actor / name / render_mode
//!         dialogue / features                    (normal modes)
//!         internal_* / guests                    (inset mode)
//! ```
//!
//! Every string is emitted double-quoted. `\`, `"`, `\n`, `\r` and `\t` get
//! their short escapes; other control characters and the Unicode line
//! separators are written as `\xNN` or `\uNNNN`. A parser therefore reads
//! every value back byte for byte.
//!
//! Some fields are translatable. [`translatable_texts`] lists them under
//! stable keys; [`encode_with_translations`] substitutes any key found in the
//! override map.

use super::model::{PanelCharacter, Story};
use std::collections::BTreeMap;
use std::fmt::Write as _;

const RULE: &str = "# ====================================================";

/// A text that may be replaced by its translation at encode time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatableText {
    pub key: String,
    pub original: String,
}

/// Registry key for the character at `index`: `actor_A`..`actor_Z`, then `actor_27`...
pub fn actor_key(index: usize) -> String {
    const LETTERS: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    match LETTERS.get(index) {
        Some(&letter) => format!("actor_{}", letter as char),
        None => format!("actor_{}", index + 1),
    }
}

/// Escape for a double-quoted YAML scalar.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if needs_code_escape(c) => {
                let code = u32::from(c);
                if code < 0x100 {
                    let _ = write!(out, "\\x{code:02X}");
                } else {
                    let _ = write!(out, "\\u{code:04X}");
                }
            }
            c => out.push(c),
        }
    }
    out
}

/// Characters a YAML reader would reject or fold if written raw.
fn needs_code_escape(c: char) -> bool {
    c.is_control() || matches!(c, '\u{2028}' | '\u{2029}' | '\u{feff}')
}

fn scene_key(p: usize) -> String {
    format!("panel_{p}_scene")
}

fn char_key(p: usize, c: usize, field: &str) -> String {
    format!("panel_{p}_char_{c}_{field}")
}

fn guest_key(p: usize, c: usize, g: usize) -> String {
    format!("panel_{p}_char_{c}_guest_{g}_description")
}

/// Non-empty translatable fields, in document order.
pub fn translatable_texts(story: &Story) -> Vec<TranslatableText> {
    let mut texts = Vec::new();
    let mut push = |key: String, original: &str| {
        if !original.is_empty() {
            texts.push(TranslatableText {
                key,
                original: original.to_string(),
            });
        }
    };

    for (p, panel) in story.panels.iter().enumerate() {
        push(scene_key(p), &panel.scene);
        for (c, slot) in panel.characters.iter().enumerate() {
            push(char_key(p, c, "features"), &slot.features);
            if slot.render_mode.is_inset() {
                push(char_key(p, c, "internal_background"), &slot.internal_background);
                push(char_key(p, c, "internal_outfit"), &slot.internal_outfit);
                push(char_key(p, c, "internal_situation"), &slot.internal_situation);
                push(char_key(p, c, "internal_emotion"), &slot.internal_emotion);
                for (g, guest) in slot.guests.iter().enumerate() {
                    push(guest_key(p, c, g), &guest.description);
                }
            }
        }
    }
    texts
}

pub fn encode(story: &Story) -> String {
    encode_with_translations(story, &BTreeMap::new())
}

pub fn encode_with_translations(story: &Story, translations: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "# Manga story YAML");
    let _ = writeln!(out, "{RULE}");
    out.push('\n');
    let _ = writeln!(out, "title: \"{}\"", escape(&story.title));
    out.push('\n');

    write_actors(&mut out, story);
    write_characters(&mut out, story);
    write_panels(&mut out, story, translations);
    out
}

fn write_actors(out: &mut String, story: &Story) {
    if story.characters.is_empty() {
        return;
    }
    let _ = writeln!(out, "{RULE}\n# Actors (component registry)\n{RULE}");
    out.push_str("actors:\n");
    for (i, character) in story.characters.iter().enumerate() {
        let _ = writeln!(out, "  {}:", actor_key(i));
        let _ = writeln!(out, "    name: \"{}\"", escape(&character.name));
        out.push_str("    face_reference: \"\"\n");
        out.push_str("    chibi_reference: \"\"\n");
        if !character.face_features.is_empty() || !character.body_features.is_empty() {
            out.push_str("    appearance_compilation:\n");
            if !character.face_features.is_empty() {
                let _ = writeln!(out, "      Face: \"{}\"", escape(&character.face_features));
            }
            if !character.body_features.is_empty() {
                let _ = writeln!(out, "      Body: \"{}\"", escape(&character.body_features));
            }
        }
        out.push('\n');
    }
}

fn write_characters(out: &mut String, story: &Story) {
    if story.characters.is_empty() {
        return;
    }
    let _ = writeln!(out, "{RULE}\n# Characters (legacy list)\n{RULE}");
    out.push_str("characters:\n");
    for (i, character) in story.characters.iter().enumerate() {
        let _ = writeln!(out, "  - id: \"{}\"", i + 1);
        let _ = writeln!(out, "    name: \"{}\"", escape(&character.name));
    }
    out.push('\n');
}

fn write_panels(out: &mut String, story: &Story, translations: &BTreeMap<String, String>) {
    let _ = writeln!(out, "{RULE}\n# Panels\n{RULE}");
    out.push_str("panels:\n");
    for (p, panel) in story.panels.iter().enumerate() {
        let _ = writeln!(out, "  - panel: {}", panel.number);
        let scene = translated(translations, scene_key(p), &panel.scene);
        let _ = writeln!(out, "    scene: \"{}\"", escape(scene));
        if !panel.narration.is_empty() {
            let _ = writeln!(out, "    narration: \"{}\"", escape(&panel.narration));
        }
        let _ = writeln!(out, "    mob: {}", panel.mob);

        if !panel.characters.is_empty() {
            out.push_str("    characters:\n");
            for (c, slot) in panel.characters.iter().enumerate() {
                write_panel_character(out, story, slot, p, c, translations);
            }
        }
        out.push('\n');
    }
}

fn write_panel_character(
    out: &mut String,
    story: &Story,
    slot: &PanelCharacter,
    p: usize,
    c: usize,
    translations: &BTreeMap<String, String>,
) {
    match slot.character.zip(story.character_for(slot)) {
        Some((index, character)) => {
            let _ = writeln!(out, "      - actor: \"{}\"", actor_key(index));
            let _ = writeln!(out, "        name: \"{}\"", escape(&character.name));
        }
        None => {
            out.push_str("      - actor: \"\"\n");
            out.push_str("        name: \"\"\n");
        }
    }
    let _ = writeln!(out, "        render_mode: \"{}\"", slot.render_mode);

    let field = |out: &mut String, name: &str, value: &str| {
        if !value.is_empty() {
            let _ = writeln!(out, "        {name}: \"{}\"", escape(value));
        }
    };

    if !slot.render_mode.is_inset() {
        field(out, "dialogue", &slot.dialogue);
        let features = translated(translations, char_key(p, c, "features"), &slot.features);
        field(out, "features", features);
        return;
    }

    for (name, value) in [
        ("internal_background", &slot.internal_background),
        ("internal_outfit", &slot.internal_outfit),
        ("internal_situation", &slot.internal_situation),
        ("internal_emotion", &slot.internal_emotion),
    ] {
        field(out, name, translated(translations, char_key(p, c, name), value));
    }
    field(out, "internal_dialogue", &slot.internal_dialogue);

    if !slot.guests.is_empty() {
        out.push_str("        guests:\n");
        for (g, guest) in slot.guests.iter().enumerate() {
            let _ = writeln!(out, "          - name: \"{}\"", escape(&guest.name));
            let description = translated(translations, guest_key(p, c, g), &guest.description);
            let _ = writeln!(out, "            description: \"{}\"", escape(description));
            if !guest.dialogue.is_empty() {
                let _ = writeln!(out, "            dialogue: \"{}\"", escape(&guest.dialogue));
            }
        }
    }
}

fn translated<'a>(translations: &'a BTreeMap<String, String>, key: String, original: &'a str) -> &'a str {
    translations.get(&key).map_or(original, String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::model::{CharacterProfile, Guest, Panel, PanelMode, RenderMode};

    fn story() -> Story {
        Story {
            title: "Rainy \"Day\"".into(),
            mode: PanelMode::Single,
            characters: vec![CharacterProfile {
                name: "Aiko".into(),
                face_features: "short hair".into(),
                body_features: String::new(),
                personality: "calm".into(),
            }],
            panels: vec![Panel {
                number: 1,
                scene: "Bus stop".into(),
                narration: String::new(),
                mob: true,
                characters: vec![PanelCharacter {
                    character: Some(0),
                    dialogue: "Hi\nthere".into(),
                    features: "smiling".into(),
                    ..PanelCharacter::default()
                }],
            }],
        }
    }

    #[test]
    fn actor_keys() {
        assert_eq!(actor_key(0), "actor_A");
        assert_eq!(actor_key(25), "actor_Z");
        assert_eq!(actor_key(26), "actor_27");
    }

    #[test]
    fn escape_backslash_quote_newline() {
        assert_eq!(escape(r#"a\b"c"#), r#"a\\b\"c"#);
        assert_eq!(escape("x\ny"), "x\\ny");
    }

    #[test]
    fn escape_carriage_return_and_tab() {
        assert_eq!(escape("a\r\nb"), "a\\r\\nb");
        assert_eq!(escape("\tindented"), "\\tindented");
    }

    #[test]
    fn escape_other_control_characters_by_code() {
        assert_eq!(escape("bell\u{7}"), "bell\\x07");
        assert_eq!(escape("\u{1b}[0m"), "\\x1B[0m");
        assert_eq!(escape("nel\u{85}"), "nel\\x85");
        assert_eq!(escape("a\u{2028}b"), "a\\u2028b");
        assert_eq!(escape("夕暮れ"), "夕暮れ");
    }

    #[test]
    fn control_characters_parse_back_unchanged() {
        let mut s = story();
        s.title = "bell\u{7} \"q\"".into();
        s.panels[0].characters[0].dialogue = "line one\r\nline\ttwo\u{1}".into();
        let value: serde_yaml_ng::Value = serde_yaml_ng::from_str(&encode(&s)).unwrap();
        assert_eq!(value["title"].as_str(), Some("bell\u{7} \"q\""));
        assert_eq!(
            value["panels"][0]["characters"][0]["dialogue"].as_str(),
            Some("line one\r\nline\ttwo\u{1}")
        );
    }

    #[test]
    fn full_layout() {
        let yaml = encode(&story());
        let expected = "\
# ====================================================
# Manga story YAML
# ====================================================

title: \"Rainy \\\"Day\\\"\"

# ====================================================
# Actors (component registry)
# ====================================================
actors:
  actor_A:
    name: \"Aiko\"
    face_reference: \"\"
    chibi_reference: \"\"
    appearance_compilation:
      Face: \"short hair\"

# ====================================================
# Characters (legacy list)
# ====================================================
characters:
  - id: \"1\"
    name: \"Aiko\"

# ====================================================
# Panels
# ====================================================
panels:
  - panel: 1
    scene: \"Bus stop\"
    mob: true
    characters:
      - actor: \"actor_A\"
        name: \"Aiko\"
        render_mode: \"full_body\"
        dialogue: \"Hi\\nthere\"
        features: \"smiling\"

";
        assert_eq!(yaml, expected);
    }

    #[test]
    fn output_is_valid_yaml() {
        let yaml = encode(&story());
        let value: serde_yaml_ng::Value = serde_yaml_ng::from_str(&yaml).unwrap();
        assert_eq!(value["title"].as_str(), Some("Rainy \"Day\""));
        assert_eq!(
            value["panels"][0]["characters"][0]["dialogue"].as_str(),
            Some("Hi\nthere")
        );
    }

    #[test]
    fn unselected_character_writes_empty_actor() {
        let mut s = story();
        s.panels[0].characters[0].character = None;
        let yaml = encode(&s);
        assert!(yaml.contains("      - actor: \"\"\n        name: \"\"\n"));
    }

    #[test]
    fn inset_fields_and_guests() {
        let mut s = story();
        let slot = &mut s.panels[0].characters[0];
        slot.render_mode = RenderMode::InsetVisualization;
        slot.internal_background = "beach".into();
        slot.internal_situation = "surfing".into();
        slot.internal_emotion = "joy".into();
        slot.internal_dialogue = "Wheee".into();
        slot.guests = vec![Guest {
            name: "Ren".into(),
            description: "tall".into(),
            dialogue: String::new(),
        }];
        let yaml = encode(&s);
        assert!(yaml.contains("        render_mode: \"inset_visualization\"\n        internal_background: \"beach\"\n        internal_situation: \"surfing\"\n        internal_emotion: \"joy\"\n        internal_dialogue: \"Wheee\"\n        guests:\n          - name: \"Ren\"\n            description: \"tall\"\n"));
        assert!(!yaml.contains("features:"));
        assert!(!yaml.contains("internal_outfit"));
    }

    #[test]
    fn translatable_keys() {
        let mut s = story();
        s.panels[0].characters.push(PanelCharacter {
            character: Some(0),
            render_mode: RenderMode::InsetVisualization,
            internal_background: "beach".into(),
            guests: vec![Guest {
                description: "tall".into(),
                ..Guest::default()
            }],
            ..PanelCharacter::default()
        });
        let keys: Vec<String> = translatable_texts(&s).into_iter().map(|t| t.key).collect();
        assert_eq!(
            keys,
            vec![
                "panel_0_scene",
                "panel_0_char_0_features",
                "panel_0_char_1_internal_background",
                "panel_0_char_1_guest_0_description",
            ]
        );
    }

    #[test]
    fn translations_override_originals() {
        let mut translations = BTreeMap::new();
        translations.insert("panel_0_scene".to_string(), "Arrêt de bus".to_string());
        translations.insert("panel_0_char_0_features".to_string(), "souriante".to_string());
        let yaml = encode_with_translations(&story(), &translations);
        assert!(yaml.contains("scene: \"Arrêt de bus\""));
        assert!(yaml.contains("features: \"souriante\""));
        // Dialogue is never translated.
        assert!(yaml.contains("dialogue: \"Hi\\nthere\""));
    }
}
