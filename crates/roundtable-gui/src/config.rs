use std::env;
use std::path::PathBuf;

use anyhow::Result;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub listen_addr: String,
    pub assets_dir: PathBuf,
    pub gui_enabled: bool,
    pub auth_token: Option<String>,
    /// Core configuration file handed to the workflow; `None` uses the
    /// core loader's own discovery (env var, then `roundtable.toml`).
    pub core_config: Option<PathBuf>,
}

impl AppConfig {
    const DEFAULT_LISTEN_ADDR: &'static str = "0.0.0.0:8080";
    const DEFAULT_ASSETS_DIR: &'static str = "crates/roundtable-gui/web/dist";

    pub fn from_env() -> Result<Self> {
        let listen_addr =
            env::var("GUI_LISTEN_ADDR").unwrap_or_else(|_| Self::DEFAULT_LISTEN_ADDR.to_string());

        let assets_dir = env::var("GUI_ASSETS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(Self::DEFAULT_ASSETS_DIR));
        let assets_dir = if assets_dir.is_relative() {
            env::current_dir()
                .map(|cwd| cwd.join(assets_dir))
                .unwrap_or_else(|_| PathBuf::from(Self::DEFAULT_ASSETS_DIR))
        } else {
            assets_dir
        };

        let gui_enabled = env::var("GUI_ENABLE_GUI")
            .ok()
            .and_then(|value| parse_bool(&value))
            .unwrap_or(false);

        let auth_token = env::var("GUI_AUTH_TOKEN")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let core_config = env::var("GUI_CORE_CONFIG")
            .ok()
            .map(PathBuf::from)
            .filter(|path| !path.as_os_str().is_empty());

        // A configured token implies the GUI should be reachable.
        let gui_enabled = gui_enabled || auth_token.is_some();

        Ok(Self {
            listen_addr,
            assets_dir,
            gui_enabled,
            auth_token,
            core_config,
        })
    }
}

fn parse_bool(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
