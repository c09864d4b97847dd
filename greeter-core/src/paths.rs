// ABOUTME: Per-user locations of the greeter's store, logs, and config file
// ABOUTME: Falls back to paths under the working directory when no home is known

use directories::ProjectDirs;
use std::path::PathBuf;

fn greeter_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("tv", "greeter", "twitch-greeter")
}

/// Holds the store and the logs, e.g. `~/.local/share/twitch-greeter/`
pub fn data_dir() -> PathBuf {
    greeter_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./data"))
}

/// Daily rolling log files are written here
pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Key/value store holding settings and credentials
pub fn store_file() -> PathBuf {
    data_dir().join("store.json")
}

/// Config file consulted after `./config.toml`
pub fn config_file() -> PathBuf {
    greeter_dirs()
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

/// Expand a leading `~` in a configured store path; unknown homes leave it unchanged
pub fn expand_tilde(path: &str) -> String {
    let rest = match path.strip_prefix("~/") {
        Some(rest) => Some(rest),
        None if path == "~" => Some(""),
        None => None,
    };
    let Some(rest) = rest else {
        return path.to_string();
    };
    match directories::BaseDirs::new() {
        Some(base_dirs) => base_dirs.home_dir().join(rest).to_string_lossy().to_string(),
        None => {
            tracing::warn!(path = %path, "Failed to expand tilde: could not determine home directory");
            path.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_file_inside_data_dir() {
        assert!(store_file().starts_with(data_dir()));
        assert!(log_dir().starts_with(data_dir()));
    }

    #[test]
    fn test_config_file_is_toml() {
        assert!(config_file().ends_with("config.toml"));
    }

    #[test]
    fn test_expand_tilde_leaves_plain_paths() {
        assert_eq!(expand_tilde("/tmp/store.json"), "/tmp/store.json");
        assert_eq!(expand_tilde("relative/~/x"), "relative/~/x");
    }

    #[test]
    fn test_expand_tilde_expands_home() {
        let expanded = expand_tilde("~/store.json");
        if directories::BaseDirs::new().is_some() {
            assert!(!expanded.starts_with('~'));
            assert!(expanded.ends_with("store.json"));
        }
    }
}
