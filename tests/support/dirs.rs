use std::path::PathBuf;

use anyhow::Result;
use tempfile::TempDir;

/// Scratch directory holding the settings file and the bouncer rule document.
pub struct TestDirs {
    _temp: TempDir,
    pub config_dir: PathBuf,
    pub bouncers_path: PathBuf,
}

impl TestDirs {
    pub fn new() -> Result<Self> {
        let temp = TempDir::new()?;
        let config_dir = temp.path().join("config");
        std::fs::create_dir_all(&config_dir)?;
        let bouncers_path = config_dir.join("bouncers.yaml");

        Ok(Self {
            _temp: temp,
            config_dir,
            bouncers_path,
        })
    }

    pub fn write_bouncers(&self, document: &str) -> Result<()> {
        std::fs::write(&self.bouncers_path, document)?;
        Ok(())
    }
}
