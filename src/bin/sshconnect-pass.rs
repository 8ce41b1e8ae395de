use std::{
    env,
    io::{stdout, ErrorKind, Write},
    path::Path,
    process::exit,
};

use sshconnect::{home_dir, init_logging, CredentialStore, LookupError, Vault, SERVICE};

fn lookup(account: &str) -> Result<Option<Vec<u8>>, LookupError> {
    let home = home_dir()
        .map_err(|e| LookupError::Io(std::io::Error::new(ErrorKind::NotFound, e.to_string())))?;
    let vault = Vault::open(home)?;
    Ok(vault
        .lookup(SERVICE, account)?
        .map(|secret| secret.as_bytes().to_vec()))
}

fn main() {
    init_logging();

    let argv: Vec<String> = env::args().collect();
    if argv.len() != 2 {
        let name = argv
            .first()
            .and_then(|arg0| Path::new(arg0).file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sshconnect-pass".to_string());
        eprint!("Usage: {} ssh_account", name);
        exit(0);
    }

    match lookup(&argv[1]) {
        Ok(Some(secret)) => {
            let mut out = stdout();
            if out.write_all(&secret).and_then(|_| out.flush()).is_err() {
                exit(1);
            }
        }
        Ok(None) => log::debug!("no secret stored for {}", argv[1]),
        Err(e) => {
            eprint!("Error code:{}, message: {}", e.code(), e);
            exit(1);
        }
    }
}
