//! # yamlsmith
//!
//! Builds structured YAML prompts for image-generation models from a master
//! template, reads and writes manga story files, and sends the results to the
//! generation and translation APIs.
//!
//! # Architecture
//!
//! Two independent pipelines share the config layer and the API client:
//!
//! ```text
//! Prompts   MasterTemplate + SelectionMap + Variables ──compose──► prompt.yaml ──► image API
//! Stories   draft.json ──encode──► story.yaml ──decode──► draft.json
//!                       (optional translation pass)
//! ```
//!
//! Every stage is a pure function over in-memory values; only the API
//! clients and the `load`/`save` helpers touch the network or filesystem.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`template`] | Master template and selection map documents, the `{{...}}` renderer, section composition |
//! | [`story`] | Story model and validation, YAML encoder and tolerant decoder, roster matching |
//! | [`api`] | `generateContent` client for image generation and batch translation |
//! | [`imagerefs`] | Image file names referenced inside a generated prompt |
//! | [`config`] | Layered `config.toml` loading and validation |
//! | [`types`] | Shared enums (`ApiMode`, `Resolution`) |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Templates Are Data
//!
//! Which sections make up a document lives in `SelectionMap.yaml`, and each
//! section body lives in `MasterTemplate.yaml`. Adding an output type or
//! reordering sections is a YAML edit, not a code change.
//!
//! ## Missing Sections Are Not Fatal
//!
//! A document is still produced when a selected section is absent from the
//! master template. Optional sections are skipped quietly; required ones are
//! reported in [`template::Composed::missing`] so callers can decide.
//!
//! ## Tolerant Story Import
//!
//! Story files are often edited by hand. The decoder skips malformed entries
//! instead of rejecting the file, and records every skip as a warning.

pub mod api;
pub mod config;
pub mod imagerefs;
pub mod output;
pub mod story;
pub mod template;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
