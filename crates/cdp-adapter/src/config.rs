use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use which::which;

/// Profile directory used when none is configured, relative to the cwd.
pub const DEFAULT_PROFILE_DIR: &str = "./.invite-relay-profile";

#[cfg(target_os = "windows")]
const CHROME_NAMES: &[&str] = &["chrome.exe", "chromium.exe", "msedge.exe"];
#[cfg(not(target_os = "windows"))]
const CHROME_NAMES: &[&str] = &[
    "google-chrome-stable",
    "google-chrome",
    "chromium",
    "chromium-browser",
];

/// How to reach Chromium: attach to a running instance over its DevTools
/// websocket, or launch one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CdpConfig {
    /// Empty lets chromiumoxide look for a binary itself
    pub executable: PathBuf,
    pub user_data_dir: PathBuf,
    pub headless: bool,
    /// Attach instead of launching when set
    pub websocket_url: Option<String>,
    /// Upper bound for a single DevTools request
    pub default_deadline_ms: u64,
    pub launch_timeout_ms: u64,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            executable: detect_chrome_executable().unwrap_or_default(),
            user_data_dir: PathBuf::from(DEFAULT_PROFILE_DIR),
            headless: false,
            websocket_url: None,
            default_deadline_ms: 30_000,
            launch_timeout_ms: 20_000,
        }
    }
}

impl CdpConfig {
    pub fn attach(ws_url: impl Into<String>) -> Self {
        Self {
            websocket_url: Some(ws_url.into()),
            ..Self::default()
        }
    }

    pub fn is_attach(&self) -> bool {
        self.websocket_url.is_some()
    }

    /// Override fields from `RELAY_WS_URL`, `RELAY_HEADLESS`, `RELAY_CHROME`
    /// and `RELAY_CHROME_PROFILE`. Unset or blank variables change nothing.
    pub fn apply_env(&mut self) {
        if let Some(ws_url) = env_value("RELAY_WS_URL") {
            self.websocket_url = Some(ws_url);
        }
        if let Some(flag) = env_value("RELAY_HEADLESS") {
            self.headless = is_truthy(&flag);
        }
        if let Some(path) = env_value("RELAY_CHROME") {
            self.executable = PathBuf::from(path);
        }
        if let Some(path) = env_value("RELAY_CHROME_PROFILE") {
            self.user_data_dir = PathBuf::from(path);
        }
    }
}

fn env_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Chromium binary from `RELAY_CHROME`, `PATH`, or the usual install
/// locations, in that order. `RELAY_SKIP_OS_PATHS` turns off the last step.
pub fn detect_chrome_executable() -> Option<PathBuf> {
    if let Some(path) = env_value("RELAY_CHROME").map(PathBuf::from) {
        if path.exists() {
            return Some(path);
        }
    }

    if let Some(path) = CHROME_NAMES.iter().find_map(|name| which(name).ok()) {
        return Some(path);
    }

    if env_value("RELAY_SKIP_OS_PATHS").is_some() {
        return None;
    }
    install_locations().into_iter().find(|path| path.exists())
}

fn install_locations() -> Vec<PathBuf> {
    if cfg!(target_os = "windows") {
        ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
            .iter()
            .filter_map(|key| env_value(key))
            .map(|root| PathBuf::from(root).join("Google/Chrome/Application/chrome.exe"))
            .collect()
    } else if cfg!(target_os = "macos") {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    } else {
        ["google-chrome-stable", "google-chrome", "chromium-browser", "chromium"]
            .iter()
            .map(|name| PathBuf::from("/usr/bin").join(name))
            .collect()
    }
}
