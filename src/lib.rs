mod config;
mod db;
mod dispatch;
mod encrypt;
mod engine;
mod request;
pub mod session;
mod sshconfig;
mod terminals;
mod vault;

pub use config::{home_dir, Config, CRATE_NAME, HOME_ENV, SESSION_HELPER};
pub use db::Db;
pub use dispatch::{applescript_escape, Completion, Dispatcher, ExecutionReport, Handler};
pub use encrypt::EncryptionManager;
pub use engine::{parse_osascript_error, OsaScript, ScriptEngine, ScriptError};
pub use request::{ConnectionRequest, UrlError, SCHEME};
pub use sshconfig::*;
pub use terminals::{
    fill_template, TemplateError, TerminalError, TerminalScript, TerminalTable, DEFAULT_TERMINAL,
    PLACEHOLDER,
};
pub use vault::{CredentialStore, LookupError, Secret, Vault, SERVICE};

/// Logs to stderr at `warn` unless `RUST_LOG` says otherwise.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();
}
