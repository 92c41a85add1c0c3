use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".jobpilot"))
            .unwrap_or_else(|| PathBuf::from(".jobpilot"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    pub fn db_file(&self) -> PathBuf {
        self.base.join("jobpilot.db")
    }

    /// Browser user-data dirs, one per (username, platform) so cookies held by
    /// Chrome itself also survive between runs.
    pub fn profiles_dir(&self) -> PathBuf {
        self.base.join("profiles")
    }

    pub fn profile_dir(&self, username: &str, platform: &str) -> PathBuf {
        let safe = format!("{}_{}", username, platform.to_lowercase())
            .replace(['@', ':', '/', '\\'], "_");
        self.profiles_dir().join(safe)
    }

    /// Screenshots and other diagnostic artifacts.
    pub fn media_dir(&self) -> PathBuf {
        self.base.join("media")
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.base)?;
        std::fs::create_dir_all(self.profiles_dir())?;
        std::fs::create_dir_all(self.media_dir())?;
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_dir_sanitizes_key() {
        let paths = Paths::with_base(PathBuf::from("/tmp/jp"));
        let dir = paths.profile_dir("user@example.com", "LinkedIn");
        let name = dir.file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(name, "user_example.com_linkedin");
    }
}
