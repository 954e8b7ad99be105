//! Directories and external tool discovery
//!
//! Tools are looked up in this order:
//! 1. Explicit override from the settings
//! 2. Next to the running executable (bundled builds)
//! 3. System PATH
//! 4. Common installation paths (Homebrew, pip user installs, distro packages)

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// External binaries the service orchestrates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    YtDlp,
    Ffmpeg,
    Ffprobe,
    Browser,
}

impl Tool {
    /// Binary names to try, in preference order
    pub fn candidates(&self) -> &'static [&'static str] {
        match self {
            Tool::YtDlp => &["yt-dlp"],
            Tool::Ffmpeg => &["ffmpeg"],
            Tool::Ffprobe => &["ffprobe"],
            Tool::Browser => &[
                "chromium",
                "chromium-browser",
                "google-chrome",
                "google-chrome-stable",
                "microsoft-edge",
            ],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tool::YtDlp => "yt-dlp",
            Tool::Ffmpeg => "ffmpeg",
            Tool::Ffprobe => "ffprobe",
            Tool::Browser => "chromium",
        }
    }
}

/// Returns the application data directory
/// - Linux: ~/.local/share/loopforge
/// - macOS: ~/Library/Application Support/Loopforge
/// - Windows: %APPDATA%\Loopforge
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(if cfg!(target_os = "linux") {
            "loopforge"
        } else {
            "Loopforge"
        })
}

/// Returns the default artifact directory: <data dir>/uploads
pub fn default_output_dir() -> PathBuf {
    app_data_dir().join("uploads")
}

/// Resolve a tool, honoring an explicit override first
pub fn find_tool(tool: Tool, override_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        if path.exists() {
            debug!("Using configured {}: {:?}", tool.name(), path);
            return Some(path.to_path_buf());
        }
        // A bare name like "yt-dlp" is still worth a PATH lookup
        if let Ok(found) = which::which(path) {
            return Some(found);
        }
        warn!(
            "Configured {} path {:?} does not exist, searching elsewhere",
            tool.name(),
            path
        );
    }

    for name in tool.candidates() {
        if let Some(found) = find_adjacent(name) {
            info!("✓ Using bundled {}: {:?}", tool.name(), found);
            return Some(found);
        }
        if let Ok(found) = which::which(name) {
            info!("✓ Using system {}: {:?}", tool.name(), found);
            return Some(found);
        }
        if let Some(found) = find_in_common_paths(name) {
            info!("✓ Using {} from common path: {:?}", tool.name(), found);
            return Some(found);
        }
    }

    warn!("✗ {} not found anywhere!", tool.name());
    None
}

/// Resolve a tool or fall back to its bare name so spawn errors surface later
pub fn tool_path_or_name(tool: Tool, override_path: Option<&Path>) -> PathBuf {
    find_tool(tool, override_path).unwrap_or_else(|| PathBuf::from(tool.candidates()[0]))
}

fn find_adjacent(name: &str) -> Option<PathBuf> {
    let exe_path = std::env::current_exe().ok()?;
    let exe_dir = exe_path.parent()?;
    let candidate = exe_dir.join(format!("{}{}", name, exe_extension()));
    if candidate.is_file() && is_executable(&candidate) {
        return Some(candidate);
    }
    None
}

fn find_in_common_paths(name: &str) -> Option<PathBuf> {
    let mut dirs_to_check = vec![
        PathBuf::from("/opt/homebrew/bin"),
        PathBuf::from("/usr/local/bin"),
        PathBuf::from("/usr/bin"),
        PathBuf::from("/snap/bin"),
    ];
    if let Some(home) = dirs::home_dir() {
        dirs_to_check.push(home.join(".local").join("bin"));
    }

    dirs_to_check
        .into_iter()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file() && is_executable(candidate))
}

/// Check if a file is executable
fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        if let Ok(metadata) = std::fs::metadata(path) {
            return metadata.permissions().mode() & 0o111 != 0;
        }
        false
    }

    #[cfg(not(unix))]
    {
        path.exists()
    }
}

/// Platform-specific executable extension
pub fn exe_extension() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        ".exe"
    }
    #[cfg(not(target_os = "windows"))]
    {
        ""
    }
}
