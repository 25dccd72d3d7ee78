mod config;

pub use config::{CircuitConfig, Config, DrillConfig, RefreshConfig, StretchConfig};

use std::path::PathBuf;

/// Returns the data directory, creating it if needed.
///
/// `COURTSIDE_HOME` wins when set; otherwise `~/.config/courtside[-dev]/`
/// based on `COURTSIDE_ENV` (set it to `dev` for the development directory).
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("COURTSIDE_HOME") {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("COURTSIDE_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("courtside-dev")
            } else {
                base_dir.join("courtside")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
