use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use std::path::{Path, PathBuf};
use yamlsmith::api::image::load_reference_png;
use yamlsmith::api::translate::story_batch;
use yamlsmith::api::{ImageGenerator, ImageRequest, Translator};
use yamlsmith::config::{self, AppConfig};
use yamlsmith::story::{self, roster};
use yamlsmith::template::{OutputType, SceneType, SelectionOptions, TemplateEngine, Variables};
use yamlsmith::types::{ApiMode, Resolution, is_supported_aspect_ratio};
use yamlsmith::{imagerefs, output};

#[derive(Parser)]
#[command(name = "yamlsmith")]
#[command(about = "YAML prompt builder and manga story codec for image-generation APIs")]
#[command(long_about = "\
YAML prompt builder and manga story codec for image-generation APIs

Prompts are composed from two template documents:

  templates/
  ├── MasterTemplate.yaml   # Section bodies, per output type and shared
  └── SelectionMap.yaml     # Which sections make up each output, in order

Section bodies use a small placeholder syntax:

  {{name}}  {{{name}}}              substitute a variable
  {{#if name}}...{{else}}...{{/if}} keep a block when the variable is set
  {{#unless name}}...{{/unless}}    keep a block when it is not
  {{! comment }}                    removed

Stories are edited as JSON drafts and exported to the story YAML layout;
exported or hand-edited YAML can be imported back into a draft.

Run 'yamlsmith gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Directory containing config.toml; template paths are relative to it
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the sections a selection key is composed of
    Sections {
        /// Selection-map key, e.g. face_sheet or scene_builder_battle
        key: String,
    },
    /// Compose a YAML prompt from the templates
    Render(RenderArgs),
    /// Export or import story files
    #[command(subcommand)]
    Story(StoryCommand),
    /// Send a prompt to the image model and save the result
    Generate(GenerateArgs),
    /// List image files referenced by a YAML prompt
    Images {
        file: PathBuf,
        /// Only look inside `# <NAME>` comment sections (repeatable)
        #[arg(long = "section")]
        sections: Vec<String>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[derive(Args)]
struct RenderArgs {
    /// Output type, e.g. face_sheet, pose, scene_builder
    #[arg(long = "type", conflicts_with = "key", required_unless_present = "key")]
    output_type: Option<OutputType>,
    /// Use the reference-image variant (outfit_sheet, pose, background)
    #[arg(long)]
    reference: bool,
    /// Scene flavour for scene_builder: story, battle or boss_raid
    #[arg(long, default_value = "story")]
    scene: SceneType,
    /// Use the transparent-background variant of style_transform
    #[arg(long)]
    transparent: bool,
    /// Selection-map key, bypassing output-type resolution
    #[arg(long)]
    key: Option<String>,
    /// TOML file of variables
    #[arg(long)]
    vars: Option<PathBuf>,
    /// Set a variable (name=value, repeatable)
    #[arg(long = "set", value_name = "NAME=VALUE")]
    assignments: Vec<String>,
    /// Set a boolean variable to true (repeatable)
    #[arg(long = "flag", value_name = "NAME")]
    flags: Vec<String>,
    /// Write the document here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum StoryCommand {
    /// Encode a JSON draft as story YAML
    Export {
        draft: PathBuf,
        /// Translate scene and appearance fields to English first
        #[arg(long)]
        translate: bool,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Decode story YAML and match its cast against a roster
    Import {
        story: PathBuf,
        /// JSON array of character profiles
        #[arg(long)]
        roster: Option<PathBuf>,
        /// Save the imported story as a JSON draft
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct GenerateArgs {
    /// Prompt file (YAML for normal/redraw, free text for simple)
    prompt: PathBuf,
    #[arg(long)]
    mode: Option<ApiMode>,
    /// 1K, 2K or 4K
    #[arg(long)]
    resolution: Option<Resolution>,
    #[arg(long)]
    aspect_ratio: Option<String>,
    /// Composition image for redraw or simple edits
    #[arg(long)]
    composition: Option<PathBuf>,
    /// Character reference image (repeatable)
    #[arg(long = "character")]
    characters: Vec<PathBuf>,
    /// Where to save the generated image
    #[arg(long, short)]
    output: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Sections { key } => {
            let engine = load_engine(&cli.config_dir)?;
            let sections = engine.sections(&key)?;
            let output_type_key = engine.output_type_key(&key)?;
            output::print_sections(&key, output_type_key, sections, |s| engine.is_optional(s));
        }
        Command::Render(args) => run_render(&cli.config_dir, args)?,
        Command::Story(StoryCommand::Export {
            draft,
            translate,
            output,
        }) => {
            let story = story::load_draft(&draft)?;
            let issues = story.validate();
            if !issues.is_empty() {
                for line in output::format_validation_issues(&issues) {
                    eprintln!("{line}");
                }
                return Err(story::StoryError::Invalid(issues).into());
            }
            let yaml = if translate {
                let config = load_config(&cli.config_dir)?;
                let translator = Translator::from_config(&config.api)?;
                let translations = translator.translate_batch(&story_batch(&story))?;
                info!("Received {} translations", translations.len());
                story::encode_with_translations(&story, &translations)
            } else {
                story::encode(&story)
            };
            write_or_print(&yaml, output.as_deref())?;
            if output.is_some() {
                output::print_story_summary(&story);
            }
        }
        Command::Story(StoryCommand::Import {
            story: path,
            roster: roster_path,
            output,
        }) => {
            let imported = story::decode::load(&path)?;
            let roster = match &roster_path {
                Some(p) => roster::load_roster(p)?,
                None => Vec::new(),
            };
            let report = roster_path
                .is_some()
                .then(|| story::match_characters(&imported, &roster));
            output::print_import_report(&imported, report.as_ref());
            if let Some(report) = report.as_ref().filter(|r| !r.all_matched()) {
                warn!(
                    "{} character(s) are not in the roster",
                    report.unmatched_count()
                );
            }
            if let Some(dest) = output {
                story::save_draft(&imported.to_story(&roster), &dest)?;
                println!("Draft → {}", dest.display());
            }
        }
        Command::Generate(args) => run_generate(&cli.config_dir, args)?,
        Command::Images { file, sections } => {
            let yaml = std::fs::read_to_string(&file)?;
            let names = if sections.is_empty() {
                imagerefs::extract(&yaml)
            } else {
                imagerefs::extract_in_sections(&yaml, &sections)
            };
            output::print_image_refs(&names);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn load_config(config_dir: &Path) -> Result<AppConfig, config::ConfigError> {
    config::load_config(config_dir)
}

fn load_engine(config_dir: &Path) -> Result<TemplateEngine, Box<dyn std::error::Error>> {
    let config = load_config(config_dir)?;
    Ok(TemplateEngine::from_config(&config.templates, config_dir)?)
}

fn run_render(config_dir: &Path, args: RenderArgs) -> Result<(), Box<dyn std::error::Error>> {
    let engine = load_engine(config_dir)?;

    let mut vars = match &args.vars {
        Some(path) => Variables::load(path)?,
        None => Variables::new(),
    };
    for assignment in &args.assignments {
        vars.assign(assignment)?;
    }
    for flag in &args.flags {
        vars.set(flag.as_str(), true);
    }

    let composed = match (&args.key, args.output_type) {
        (Some(key), _) => engine.compose(key, &vars)?,
        (None, Some(output_type)) => {
            let options = SelectionOptions {
                reference: args.reference,
                scene: args.scene,
                transparent: args.transparent,
            };
            engine.compose_output(output_type, &options, &vars)?
        }
        (None, None) => return Err("either --type or --key is required".into()),
    };

    match &args.output {
        Some(dest) => {
            std::fs::write(dest, format!("{}\n", composed.yaml))?;
            output::print_composed(&composed, dest);
        }
        None => println!("{}", composed.yaml),
    }
    Ok(())
}

fn run_generate(config_dir: &Path, args: GenerateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_dir)?;
    let defaults = &config.generation;

    let aspect_ratio = args
        .aspect_ratio
        .unwrap_or_else(|| defaults.aspect_ratio.clone());
    if !is_supported_aspect_ratio(&aspect_ratio) {
        return Err(format!("unsupported aspect ratio '{aspect_ratio}'").into());
    }

    let composition = args
        .composition
        .as_deref()
        .map(load_reference_png)
        .transpose()?;
    let characters = args
        .characters
        .iter()
        .map(|p| load_reference_png(p))
        .collect::<Result<Vec<_>, _>>()?;

    let request = ImageRequest {
        prompt: std::fs::read_to_string(&args.prompt)?,
        mode: args.mode.unwrap_or(defaults.mode),
        resolution: args.resolution.unwrap_or(defaults.resolution),
        aspect_ratio,
        composition,
        characters,
    };

    let generator = ImageGenerator::from_config(&config.api)?;
    let image = generator.generate(&request)?;
    image.save(&args.output)?;
    output::print_generated(&image, &args.output);
    Ok(())
}

fn write_or_print(text: &str, destination: Option<&Path>) -> std::io::Result<()> {
    match destination {
        Some(path) => {
            std::fs::write(path, text)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
        None => {
            print!("{text}");
            Ok(())
        }
    }
}
