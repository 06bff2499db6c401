use std::env;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "timekeep";
const CONFIG_FILE: &str = "config.toml";
pub const LOG_FILE: &str = "timekeep.log";

pub fn resolve_state_dir(cli_path: Option<PathBuf>) -> PathBuf {
	if let Some(path) = cli_path {
		return absolutize(path);
	}

	if let Some(path) = env::var_os("TIMEKEEP_STATE_DIR") {
		let path = PathBuf::from(path);
		if !path.as_os_str().is_empty() {
			return absolutize(path);
		}
	}

	default_state_dir()
}

pub fn resolve_config_path(cli_path: Option<PathBuf>, state_dir: &Path) -> PathBuf {
	if let Some(path) = cli_path {
		return absolutize(path);
	}

	if let Some(path) = env::var_os("TIMEKEEP_CONFIG") {
		let path = PathBuf::from(path);
		if !path.as_os_str().is_empty() {
			return absolutize(path);
		}
	}

	state_dir.join(CONFIG_FILE)
}

fn default_state_dir() -> PathBuf {
	#[cfg(target_os = "windows")]
	{
		if let Some(path) = env::var_os("LOCALAPPDATA") {
			return PathBuf::from(path).join(APP_DIR);
		}
	}

	if let Some(path) = env::var_os("XDG_STATE_HOME") {
		return PathBuf::from(path).join(APP_DIR);
	}

	if let Some(path) = env::var_os("HOME") {
		return PathBuf::from(path).join(".local").join("state").join(APP_DIR);
	}

	PathBuf::from(".timekeep")
}

fn absolutize(path: PathBuf) -> PathBuf {
	if path.is_absolute() {
		path
	} else if let Ok(cwd) = env::current_dir() {
		cwd.join(path)
	} else {
		path
	}
}
