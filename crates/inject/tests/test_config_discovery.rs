//! Changes the process working directory, so it lives in its own test binary
//! with a single test.

use std::env;
use std::fs;

use anyhow::Result;
use inject::{RegistryConfig, CONFIG_FILE_NAME};
use tempfile::TempDir;

#[test]
fn test_load_discovers_file_in_working_directory() -> Result<()> {
    let dir = TempDir::new()?;
    fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        "max_resolution_depth = 7\nvalidate_on_build = false\n",
    )?;

    let previous = env::current_dir()?;
    env::set_current_dir(dir.path())?;
    let loaded = RegistryConfig::load();
    env::set_current_dir(previous)?;

    let config = loaded?;
    assert_eq!(config.max_resolution_depth, 7);
    assert!(!config.validate_on_build);
    Ok(())
}
