use std::{env, process::exit};

use sshconnect::{
    home_dir, init_logging,
    session::{self, CommandBuilder},
    CredentialStore, Secret, Vault, SERVICE,
};

fn secret_for(account: &str) -> anyhow::Result<Option<Secret>> {
    let vault = Vault::open(home_dir()?)?;
    Ok(vault.lookup(SERVICE, account)?)
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let mut args = env::args().skip(1);
    let (Some(host), Some(account)) = (args.next(), args.next()) else {
        eprintln!("Usage: sshconnect-session host account [ssh options]");
        exit(2);
    };
    if host.starts_with('-') {
        eprintln!("refusing host {:?}: it would be read as an ssh option", host);
        exit(2);
    }

    let secret = secret_for(&account).unwrap_or_else(|e| {
        log::error!("cannot read secret for {}: {:#}", account, e);
        None
    });
    if secret.is_none() {
        log::info!("no stored secret for {}, ssh will prompt", account);
    }

    let mut cmd = CommandBuilder::new("ssh");
    cmd.arg(&host);
    cmd.args(args);
    if let Ok(cwd) = env::current_dir() {
        cmd.cwd(cwd);
    }

    let code = session::run(cmd, secret)?;
    exit(code);
}
