//! Locating the ffmpeg and ffprobe executables.
//!
//! A configured path wins when it exists on disk; otherwise the tool is
//! looked up on `PATH`. Missing tools are not an error until something
//! [`require`](ToolRegistry::require)s them.

use std::fmt;
use std::path::{Path, PathBuf};

use fp_core::config::ToolsConfig;
use serde::{Deserialize, Serialize};

/// The external programs playback depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Ffmpeg,
    Ffprobe,
}

impl Tool {
    pub const ALL: [Tool; 2] = [Tool::Ffmpeg, Tool::Ffprobe];

    pub const fn binary_name(self) -> &'static str {
        match self {
            Tool::Ffmpeg => "ffmpeg",
            Tool::Ffprobe => "ffprobe",
        }
    }

    fn configured(self, config: &ToolsConfig) -> Option<&Path> {
        match self {
            Tool::Ffmpeg => config.ffmpeg_path.as_deref(),
            Tool::Ffprobe => config.ffprobe_path.as_deref(),
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// Where a tool's path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolSource {
    Config,
    SearchPath,
}

/// A tool that was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    pub tool: Tool,
    pub path: PathBuf,
    pub source: ToolSource,
}

/// Availability report for one tool, see [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: Tool,
    pub available: bool,
    /// First line of `<tool> -version`.
    pub version: Option<String>,
    pub path: Option<PathBuf>,
    pub source: Option<ToolSource>,
}

#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    ffmpeg: Option<ToolConfig>,
    ffprobe: Option<ToolConfig>,
}

impl ToolRegistry {
    /// Resolve every [`Tool`] against `config`, then `PATH`.
    pub fn discover(config: &ToolsConfig) -> Self {
        let mut registry = Self::default();
        for tool in Tool::ALL {
            if let Some(found) = locate(tool, config) {
                tracing::debug!("Found {tool} at {} ({:?})", found.path.display(), found.source);
                *registry.slot(tool) = Some(found);
            } else {
                tracing::debug!("{tool} not found");
            }
        }
        registry
    }

    /// Registry with fixed paths and no lookup.
    pub fn with_paths(paths: impl IntoIterator<Item = (Tool, PathBuf)>) -> Self {
        let mut registry = Self::default();
        for (tool, path) in paths {
            *registry.slot(tool) = Some(ToolConfig {
                tool,
                path,
                source: ToolSource::Config,
            });
        }
        registry
    }

    pub fn get(&self, tool: Tool) -> Option<&ToolConfig> {
        match tool {
            Tool::Ffmpeg => self.ffmpeg.as_ref(),
            Tool::Ffprobe => self.ffprobe.as_ref(),
        }
    }

    /// # Errors
    ///
    /// [`fp_core::Error::Tool`] when `tool` was not found.
    pub fn require(&self, tool: Tool) -> fp_core::Result<&ToolConfig> {
        self.get(tool).ok_or_else(|| {
            fp_core::Error::tool(
                tool.binary_name(),
                format!("{tool} not found; set tools.{tool}_path or add it to PATH"),
            )
        })
    }

    /// Availability of every tool, running `-version` on the ones found.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        Tool::ALL
            .iter()
            .map(|&tool| {
                let found = self.get(tool);
                ToolInfo {
                    name: tool,
                    available: found.is_some(),
                    version: found.and_then(|t| detect_version(&t.path)),
                    path: found.map(|t| t.path.clone()),
                    source: found.map(|t| t.source),
                }
            })
            .collect()
    }

    fn slot(&mut self, tool: Tool) -> &mut Option<ToolConfig> {
        match tool {
            Tool::Ffmpeg => &mut self.ffmpeg,
            Tool::Ffprobe => &mut self.ffprobe,
        }
    }
}

fn locate(tool: Tool, config: &ToolsConfig) -> Option<ToolConfig> {
    if let Some(path) = tool.configured(config) {
        if path.exists() {
            return Some(ToolConfig {
                tool,
                path: path.to_path_buf(),
                source: ToolSource::Config,
            });
        }
        tracing::warn!(
            "Configured {tool} path {} does not exist; searching PATH",
            path.display()
        );
    }

    which::which(tool.binary_name()).ok().map(|path| ToolConfig {
        tool,
        path,
        source: ToolSource::SearchPath,
    })
}

fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg("-version")
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
}
