use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PLACEHOLDER: &str = "%@";
pub const DEFAULT_TERMINAL: &str = "com.apple.Terminal";

const APPLE_TERMINAL_SCRIPT: &str = r#"tell application "Terminal"
    activate
    do script "%@"
end tell"#;

const ITERM2_SCRIPT: &str = r#"tell application "iTerm"
    activate
    set newWindow to (create window with default profile)
    tell current session of newWindow
        write text "%@"
    end tell
end tell"#;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("template must contain exactly one `%@`, found {count}")]
pub struct TemplateError {
    pub count: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TerminalError {
    #[error("no automation script configured for default terminal `{0}`")]
    DefaultMissing(String),
    #[error("script for terminal `{id}`: {source}")]
    Placeholder {
        id: String,
        #[source]
        source: TemplateError,
    },
}

/// Substitutes `value` for the single placeholder in `template`.
pub fn fill_template(template: &str, value: &str) -> Result<String, TemplateError> {
    let count = template.matches(PLACEHOLDER).count();
    if count != 1 {
        return Err(TemplateError { count });
    }
    Ok(template.replacen(PLACEHOLDER, value, 1))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalScript {
    pub id: String,
    pub script: String,
}

impl TerminalScript {
    pub fn new(id: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            script: script.into(),
        }
    }

    pub fn builtin() -> Vec<Self> {
        vec![
            Self::new(DEFAULT_TERMINAL, APPLE_TERMINAL_SCRIPT),
            Self::new("com.googlecode.iterm2", ITERM2_SCRIPT),
        ]
    }
}

/// Terminal scripts keyed by terminal id, validated at load.
#[derive(Clone, Debug)]
pub struct TerminalTable {
    default: usize,
    scripts: Vec<TerminalScript>,
}

impl TerminalTable {
    pub fn new(
        default_id: impl Into<String>,
        scripts: Vec<TerminalScript>,
    ) -> Result<Self, TerminalError> {
        let default_id = default_id.into();

        for script in &scripts {
            let count = script.script.matches(PLACEHOLDER).count();
            if count != 1 {
                return Err(TerminalError::Placeholder {
                    id: script.id.clone(),
                    source: TemplateError { count },
                });
            }
        }

        let default = scripts
            .iter()
            .position(|script| script.id == default_id)
            .ok_or(TerminalError::DefaultMissing(default_id))?;

        Ok(Self { default, scripts })
    }

    /// Built-in scripts with `overrides` replacing entries of the same id.
    pub fn with_overrides(
        default_id: impl Into<String>,
        overrides: Vec<TerminalScript>,
    ) -> Result<Self, TerminalError> {
        let mut scripts = TerminalScript::builtin();
        for script in overrides {
            match scripts.iter_mut().find(|known| known.id == script.id) {
                Some(known) => *known = script,
                None => scripts.push(script),
            }
        }
        Self::new(default_id, scripts)
    }

    pub fn default_id(&self) -> &str {
        &self.scripts[self.default].id
    }

    pub fn scripts(&self) -> &[TerminalScript] {
        &self.scripts
    }

    pub fn get(&self, id: &str) -> Option<&TerminalScript> {
        self.scripts.iter().find(|script| script.id == id)
    }

    pub fn resolve(&self, id: Option<&str>) -> &TerminalScript {
        if let Some(script) = id.and_then(|id| self.get(id)) {
            return script;
        }

        let default = &self.scripts[self.default];
        if let Some(id) = id {
            log::debug!("no script for terminal `{}`, using `{}`", id, default.id);
        }
        default
    }
}

impl Default for TerminalTable {
    fn default() -> Self {
        // the first built-in entry is the default terminal
        Self {
            default: 0,
            scripts: TerminalScript::builtin(),
        }
    }
}
