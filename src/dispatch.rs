use std::{borrow::Cow, collections::BTreeMap, fmt, path::PathBuf};

use crate::{
    fill_template, ConnectionRequest, ScriptEngine, ScriptError, TerminalScript, TerminalTable,
};

/// What happened to one inbound url. Every variant means the request is finished.
#[derive(Debug, PartialEq, Eq)]
pub enum Completion {
    Opened,
    Ignored,
    Failed(ExecutionReport),
}

/// Diagnostic for a connection that could not be opened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionReport {
    pub host: String,
    pub terminal: Option<String>,
    pub message: String,
    pub details: BTreeMap<String, String>,
}

impl ExecutionReport {
    fn new(request: &ConnectionRequest, details: BTreeMap<String, String>) -> Self {
        Self {
            host: request.target_host(),
            terminal: request.terminal.clone(),
            message: format!(
                "Application cannot open connection to ssh server {}",
                request.host
            ),
            details,
        }
    }
}

impl fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.message)?;
        if let Some(terminal) = &self.terminal {
            writeln!(f, "terminal: {}", terminal)?;
        }
        for (key, value) in &self.details {
            writeln!(f, "{}: {}", key, value)?;
        }
        Ok(())
    }
}

/// Turns connection requests into terminal scripts and runs them.
pub struct Dispatcher<E> {
    engine: E,
    helper: PathBuf,
}

impl<E: ScriptEngine> Dispatcher<E> {
    /// `helper` is the program run for requests that name an account.
    pub fn new(engine: E, helper: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            helper: helper.into(),
        }
    }

    /// The shell command line the terminal is asked to run.
    pub fn invocation(&self, request: &ConnectionRequest) -> Result<String, shlex::QuoteError> {
        let helper = self.helper.to_string_lossy();
        let port = request.port.map(|port| port.to_string());
        let mut args: Vec<&str> = Vec::new();

        match &request.account {
            Some(account) => {
                args.push(&helper);
                args.push(&request.host);
                args.push(account);
            }
            None => {
                args.push("ssh");
                args.push(&request.host);
            }
        }
        if let Some(port) = &port {
            args.push("-p");
            args.push(port);
        }

        shlex::try_join(args)
    }

    pub fn dispatch(&self, request: &ConnectionRequest, template: &TerminalScript) -> Completion {
        let executed = self.script(request, template).and_then(|script| {
            log::info!("opening {} in {}", request.target_host(), template.id);
            self.engine.execute(&script)
        });

        match executed {
            Ok(()) => Completion::Opened,
            Err(error) => {
                let report = ExecutionReport::new(request, error.details);
                log::error!("{}", report);
                Completion::Failed(report)
            }
        }
    }

    fn script(
        &self,
        request: &ConnectionRequest,
        template: &TerminalScript,
    ) -> Result<String, ScriptError> {
        let invocation = self
            .invocation(request)
            .map_err(|e| ScriptError::default().with("message", e))?;
        fill_template(&template.script, &applescript_escape(&invocation))
            .map_err(|e| ScriptError::default().with("message", e).with("terminal", &template.id))
    }
}

/// Escapes `value` for use inside an AppleScript string literal.
pub fn applescript_escape(value: &str) -> Cow<'_, str> {
    if !value.contains(['\\', '"']) {
        return Cow::Borrowed(value);
    }
    Cow::Owned(value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Parses, resolves and dispatches inbound urls.
pub struct Handler<E> {
    table: TerminalTable,
    dispatcher: Dispatcher<E>,
}

impl<E: ScriptEngine> Handler<E> {
    pub fn new(table: TerminalTable, dispatcher: Dispatcher<E>) -> Self {
        Self { table, dispatcher }
    }

    pub fn handle(&self, url: &str) -> Completion {
        let request = match ConnectionRequest::parse(url) {
            Ok(request) => request,
            Err(e) => {
                log::debug!("dropping {:?}: {}", url, e);
                return Completion::Ignored;
            }
        };

        let template = self.table.resolve(request.terminal.as_deref());
        self.dispatcher.dispatch(&request, template)
    }
}
