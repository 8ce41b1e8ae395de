use std::io::{stdin, Read};

use anyhow::Context;
use clap::{Parser, Subcommand};
use sshconnect::{
    home_dir, init_logging, retrive_ssh_configs, Completion, Config, ConnectionRequest,
    CredentialStore, Dispatcher, Handler, OsaScript, Vault, SERVICE,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Opens sshconnect:// links in a terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Handle an inbound sshconnect:// url
    Open { url: String },
    /// Print the sshconnect:// url for a host
    Link {
        alias: String,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        account: Option<String>,
        #[arg(long)]
        terminal: Option<String>,
    },
    /// Print a url for every host alias in ~/.ssh/config
    Hosts {
        #[arg(long)]
        account: Option<String>,
        #[arg(long)]
        terminal: Option<String>,
    },
    /// Save the secret read from stdin under an account name
    Store { account: String },
    /// List the terminals scripts are available for
    Terminals,
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let home = home_dir()?;

    match cli.command {
        Command::Open { url } => {
            let config = Config::load(&home)?;
            let table = config.terminal_table()?;
            let dispatcher = Dispatcher::new(OsaScript::new(), config.session_helper()?);

            match Handler::new(table, dispatcher).handle(&url) {
                Completion::Opened | Completion::Ignored => {}
                Completion::Failed(report) => eprint!("{}", report),
            }
        }
        Command::Link {
            alias,
            user,
            port,
            account,
            terminal,
        } => {
            let request = ConnectionRequest {
                user,
                port,
                account,
                terminal,
                ..ConnectionRequest::for_alias(alias)
            };
            println!("{}", request.to_url());
        }
        Command::Hosts { account, terminal } => {
            for item in retrive_ssh_configs()? {
                let request = item.request(account.as_deref(), terminal.as_deref());
                println!(
                    "{}\t{}@{}\t{}",
                    item.host,
                    item.user,
                    item.hostname,
                    request.to_url()
                );
            }
        }
        Command::Store { account } => {
            let mut secret = Vec::new();
            stdin().read_to_end(&mut secret)?;
            if secret.ends_with(b"\n") {
                secret.pop();
                if secret.ends_with(b"\r") {
                    secret.pop();
                }
            }

            let mut vault = Vault::open(&home)?;
            vault
                .store(SERVICE, &account, &secret)
                .with_context(|| format!("cannot store secret for {}", account))?;
        }
        Command::Terminals => {
            let table = Config::load(&home)?.terminal_table()?;
            for script in table.scripts() {
                let marker = if script.id == table.default_id() { "*" } else { " " };
                println!("{} {}", marker, script.id);
            }
        }
    }

    Ok(())
}
