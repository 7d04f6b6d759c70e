use std::path::PathBuf;

/// Default config file: `~/.config/xo-rotate/config.toml`.
pub fn config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("xo-rotate").join("config.toml"))
}
