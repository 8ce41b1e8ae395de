use std::{
    fs,
    path::Path,
    process::{Command, Output},
};

use sshconnect::{CredentialStore, Vault, HOME_ENV, SERVICE};
use tempfile::tempdir;

fn pass(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sshconnect-pass"))
        .args(args)
        .env(HOME_ENV, home)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn prints_stored_secret_without_newline() {
    let home = tempdir().unwrap();
    Vault::open(home.path())
        .unwrap()
        .store(SERVICE, "bob", b"correct horse")
        .unwrap();

    let output = pass(home.path(), &["bob"]);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(output.stdout, b"correct horse");
    assert!(output.stderr.is_empty());
}

#[test]
fn unknown_account_prints_nothing() {
    let home = tempdir().unwrap();

    let output = pass(home.path(), &["nobody"]);

    assert_eq!(output.status.code(), Some(0));
    assert!(output.stdout.is_empty());
}

#[test]
fn wrong_argument_count_prints_usage() {
    let home = tempdir().unwrap();

    for args in [&[][..], &["a", "b"][..]] {
        let output = pass(home.path(), args);

        assert_eq!(output.status.code(), Some(0));
        assert!(output.stdout.is_empty());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.starts_with("Usage: sshconnect-pass"), "{}", stderr);
    }
}

#[test]
fn unreadable_store_fails_with_code() {
    let home = tempdir().unwrap();
    fs::write(home.path().join("secrets"), [0xff; 3]).unwrap();

    let output = pass(home.path(), &["bob"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("Error code:2, message:"), "{}", stderr);
}
