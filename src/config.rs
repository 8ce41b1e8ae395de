use anyhow::Context;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::{TerminalScript, TerminalTable, DEFAULT_TERMINAL};

pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
pub const HOME_ENV: &str = "SSHCONNECT_HOME";
pub const SESSION_HELPER: &str = "sshconnect-session";

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub default_terminal: Option<String>,
    pub session_helper: Option<PathBuf>,
    pub terminals: Vec<TerminalScript>,
}

impl Config {
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reads `config.toml` from `home`; a missing file means defaults.
    pub fn load(home: &Path) -> anyhow::Result<Self> {
        let path = home.join(CONFIG_FILE);
        if !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = fs::read_to_string(&path)?;
        Self::from_toml(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn terminal_table(&self) -> anyhow::Result<TerminalTable> {
        let default = self.default_terminal.as_deref().unwrap_or(DEFAULT_TERMINAL);
        Ok(TerminalTable::with_overrides(default, self.terminals.clone())?)
    }

    /// The configured helper, else `sshconnect-session` next to the running binary.
    pub fn session_helper(&self) -> anyhow::Result<PathBuf> {
        if let Some(helper) = &self.session_helper {
            return Ok(helper.clone());
        }

        let exe = env::current_exe()?;
        let dir = exe
            .parent()
            .with_context(|| format!("{} has no parent directory", exe.display()))?;
        Ok(dir.join(SESSION_HELPER))
    }
}

/// Directory holding the config file and the secret vault.
pub fn home_dir() -> anyhow::Result<PathBuf> {
    if let Some(home) = env::var_os(HOME_ENV) {
        return Ok(PathBuf::from(home));
    }

    let config_dir =
        dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
    Ok(config_dir.join(CRATE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_config_uses_builtins() {
        let config = Config::from_toml("").unwrap();
        let table = config.terminal_table().unwrap();

        assert_eq!(table.default_id(), DEFAULT_TERMINAL);
        assert!(table.get("com.googlecode.iterm2").is_some());
    }

    #[test]
    fn parses_terminals_and_helper() {
        let config = Config::from_toml(
            r#"
default_terminal = "net.kovidgoyal.kitty"
session_helper = "/usr/local/bin/sshconnect-session"

[[terminals]]
id = "net.kovidgoyal.kitty"
script = 'do shell script "kitty --single-instance %@"'
"#,
        )
        .unwrap();

        assert_eq!(
            config.session_helper().unwrap(),
            PathBuf::from("/usr/local/bin/sshconnect-session")
        );
        let table = config.terminal_table().unwrap();
        assert_eq!(table.resolve(None).id, "net.kovidgoyal.kitty");
    }

    #[test]
    fn unknown_default_is_fatal() {
        let config = Config::from_toml(r#"default_terminal = "com.nope""#).unwrap();
        assert!(config.terminal_table().is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::from_toml("colour = true").is_err());
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert!(config.terminals.is_empty());
        assert!(config.default_terminal.is_none());
    }

    #[test]
    fn load_reports_path_on_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "terminals = 3").unwrap();

        let err = Config::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains(CONFIG_FILE));
    }

    #[test]
    fn default_helper_sits_next_to_binary() {
        let helper = Config::default().session_helper().unwrap();
        assert!(helper.ends_with(SESSION_HELPER));
    }
}
