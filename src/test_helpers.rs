//! Shared test utilities.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let engine = fixture_engine(tmp.path());
//! let composed = engine.compose("face_sheet", &Variables::new()).unwrap();
//! ```

use std::path::Path;
use tempfile::TempDir;

use crate::config;
use crate::template::TemplateEngine;

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

// =========================================================================
// Engine
// =========================================================================

/// Engine built from the fixture `config.toml` in `root`. Panics on failure.
pub fn fixture_engine(root: &Path) -> TemplateEngine {
    let config = config::load_config(root).unwrap();
    TemplateEngine::from_config(&config.templates, root)
        .unwrap_or_else(|e| panic!("fixture templates failed to load: {e}"))
}

/// Read a fixture file as text. Panics with the path on failure.
pub fn read_fixture(root: &Path, relative: &str) -> String {
    let path = root.join(relative);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}
