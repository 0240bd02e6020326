// Detection of where this process runs: on a host or inside a container

use std::path::{Path, PathBuf};

/// Marker file docker places at the root of every container filesystem
pub const DOCKERENV_MARKER: &str = "/.dockerenv";

/// Facts about the execution environment that decide how the launched
/// container is reached
pub trait Environment {
    /// True when this process itself runs inside a container
    fn in_container(&self) -> bool;

    /// Name the runtime knows our own container by
    fn hostname(&self) -> Option<String>;
}

/// Production environment: checks the marker file and `$HOSTNAME`
#[derive(Debug, Clone)]
pub struct HostEnvironment {
    marker: PathBuf,
}

impl Default for HostEnvironment {
    fn default() -> Self {
        Self {
            marker: PathBuf::from(DOCKERENV_MARKER),
        }
    }
}

impl HostEnvironment {
    /// Use a different marker path (mainly for tests)
    pub fn with_marker(marker: impl AsRef<Path>) -> Self {
        Self {
            marker: marker.as_ref().to_path_buf(),
        }
    }
}

impl Environment for HostEnvironment {
    fn in_container(&self) -> bool {
        self.marker.exists()
    }

    fn hostname(&self) -> Option<String> {
        std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty())
    }
}

/// Environment with fixed answers
#[derive(Debug, Clone, Default)]
pub struct StaticEnvironment {
    pub in_container: bool,
    pub hostname: Option<String>,
}

impl StaticEnvironment {
    pub fn host() -> Self {
        Self::default()
    }

    pub fn container(hostname: impl Into<String>) -> Self {
        Self {
            in_container: true,
            hostname: Some(hostname.into()),
        }
    }
}

impl Environment for StaticEnvironment {
    fn in_container(&self) -> bool {
        self.in_container
    }

    fn hostname(&self) -> Option<String> {
        self.hostname.clone()
    }
}
