use serde::Deserialize;
use thiserror::Error;
use vfs::VfsPath;

pub const MANIFEST_FILE: &str = "Solder.toml";

/// A parsed Solder.toml manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub project: Project,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Project metadata section.
#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    src: Option<String>,
}

/// Analysis knobs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisConfig {
    /// Elevates unused-member warnings to errors.
    #[serde(default)]
    pub strict_unused: bool,
}

/// Errors that can occur during manifest operations.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest: {0}")]
    Fs(#[from] vfs::VfsError),

    #[error("failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("manifest not found at {0}")]
    NotFound(String),
}

impl Manifest {
    /// Load and parse the manifest at the root of a workspace.
    pub fn load(root: &VfsPath) -> Result<Self, ManifestError> {
        let path = root.join(MANIFEST_FILE)?;
        if !path.exists()? {
            return Err(ManifestError::NotFound(path.as_str().to_string()));
        }
        let content = path.read_to_string()?;
        let manifest: Manifest = toml::from_str(&content)?;
        Ok(manifest)
    }

    /// The source root directory, relative to the workspace root.
    pub fn src_dir(&self) -> &str {
        self.project.src.as_deref().unwrap_or("src")
    }
}
