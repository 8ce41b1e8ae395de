use std::{
    io::{stdout, Read, Write},
    time::Duration,
};

use bytes::Bytes;
pub use portable_pty::CommandBuilder;
use portable_pty::{native_pty_system, MasterPty, PtySize};
use tokio::{sync::mpsc::channel, task::spawn_blocking};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};

use crate::Secret;

const REJECTED_NOTICE: &str =
    "\r\n\x1b[1;4mStored password was rejected, please type it.\x1b[0m\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    rows: u16,
    cols: u16,
}

impl Size {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }

    fn pty(self) -> PtySize {
        PtySize {
            rows: self.rows,
            cols: self.cols,
            pixel_width: 0,
            pixel_height: 0,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Reaction {
    Pass,
    Answer(Bytes),
    Rejected,
}

/// Watches ssh output, answering the first password prompt with the stored secret.
pub struct PromptWatcher {
    secret: Option<Secret>,
    answered: bool,
    validated: bool,
}

impl PromptWatcher {
    pub fn new(secret: Option<Secret>) -> Self {
        Self {
            secret,
            answered: false,
            validated: false,
        }
    }

    pub fn feed(&mut self, chunk: &str) -> Reaction {
        if self.secret.is_some() && chunk.contains("assword:") {
            if let Some(secret) = self.secret.take() {
                let mut answer = secret.as_bytes().to_vec();
                answer.push(b'\n');
                self.answered = true;
                return Reaction::Answer(Bytes::from(answer));
            }
        }

        if self.answered && !self.validated {
            // skip the whitespaces echoed after the prompt
            if chunk.trim().is_empty() {
                return Reaction::Pass;
            }
            self.validated = true;
            if chunk.contains("ermission denied") || chunk.contains("assword:") {
                return Reaction::Rejected;
            }
        }

        Reaction::Pass
    }
}

/// Bytes a key press sends to the remote side.
pub fn key_bytes(key: &KeyEvent) -> Option<Vec<u8>> {
    let mut send = match key.code {
        KeyCode::Char(ch) => {
            let mut send = ch.to_string().into_bytes();

            if key.modifiers.contains(KeyModifiers::CONTROL) {
                let upper = ch.to_ascii_uppercase();
                match upper {
                    '2' | '@' | ' ' => send = vec![0],
                    '3' | '[' => send = vec![27],
                    '4' | '\\' => send = vec![28],
                    '5' | ']' => send = vec![29],
                    '6' | '^' => send = vec![30],
                    '7' | '-' | '_' => send = vec![31],
                    // A == 65, so subtracting 64 gives the control character
                    char if ('A'..='_').contains(&char) => send = vec![char as u8 - 64],
                    _ => {}
                }
            }
            send
        }
        KeyCode::Enter => vec![b'\r'],
        KeyCode::Backspace => vec![127],
        KeyCode::Left => vec![27, 91, 68],
        KeyCode::Right => vec![27, 91, 67],
        KeyCode::Up => vec![27, 91, 65],
        KeyCode::Down => vec![27, 91, 66],
        KeyCode::Tab => vec![9],
        KeyCode::Home => vec![27, 91, 72],
        KeyCode::End => vec![27, 91, 70],
        KeyCode::PageUp => vec![27, 91, 53, 126],
        KeyCode::PageDown => vec![27, 91, 54, 126],
        KeyCode::BackTab => vec![27, 91, 90],
        KeyCode::Delete => vec![27, 91, 51, 126],
        KeyCode::Insert => vec![27, 91, 50, 126],
        KeyCode::Esc => vec![27],
        _ => return None,
    };

    if key.modifiers.contains(KeyModifiers::ALT) {
        send.insert(0, 27);
    }
    Some(send)
}

struct RawMode;

impl RawMode {
    fn enable() -> std::io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Runs `cmd` in a pseudo terminal attached to ours, typing `secret` at the
/// first password prompt. Returns the child's exit code.
pub fn run(cmd: CommandBuilder, secret: Option<Secret>) -> anyhow::Result<i32> {
    let (cols, rows) = crossterm::terminal::size().unwrap_or((80, 24));
    let size = Size::new(rows, cols);

    let rt = tokio::runtime::Runtime::new()?;
    let code = rt.block_on(relay(size, cmd, secret));
    // the stdout copier may still be parked on a read
    rt.shutdown_timeout(Duration::from_millis(100));
    code
}

async fn relay(mut size: Size, cmd: CommandBuilder, secret: Option<Secret>) -> anyhow::Result<i32> {
    let pty_pair = native_pty_system().openpty(size.pty())?;
    let mut child = pty_pair.slave.spawn_command(cmd)?;
    drop(pty_pair.slave);

    let master: Box<dyn MasterPty + Send> = pty_pair.master;
    let mut reader = master.try_clone_reader()?;
    let mut writer = master.take_writer()?;

    let (tx, mut rx) = channel::<Bytes>(32);

    // pty writer end
    spawn_blocking(move || -> std::io::Result<()> {
        while let Some(data) = rx.blocking_recv() {
            writer.write_all(&data)?;
            writer.flush()?;
        }
        Ok(())
    });

    // pty reader end
    let reader_task = {
        let tx = tx.clone();
        spawn_blocking(move || -> std::io::Result<()> {
            let mut watcher = PromptWatcher::new(secret);
            let mut out = stdout();
            let mut buf = [0; 1024];

            loop {
                let n = match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => n,
                };
                out.write_all(&buf[..n])?;

                match watcher.feed(&String::from_utf8_lossy(&buf[..n])) {
                    Reaction::Pass => {}
                    Reaction::Answer(answer) => {
                        if tx.blocking_send(answer).is_err() {
                            break;
                        }
                    }
                    Reaction::Rejected => {
                        log::warn!("stored password was rejected");
                        out.write_all(REJECTED_NOTICE.as_bytes())?;
                    }
                }
                out.flush()?;
            }
            Ok(())
        })
    };

    let waiter = spawn_blocking(move || child.wait());

    let raw = RawMode::enable()?;
    while !waiter.is_finished() {
        if !event::poll(Duration::from_millis(10))? {
            continue;
        }

        match event::read()? {
            Event::Key(key) if key.kind != KeyEventKind::Release => {
                if let Some(input) = key_bytes(&key) {
                    if tx.send(Bytes::from(input)).await.is_err() {
                        break;
                    }
                }
            }
            Event::Paste(text) => {
                if tx.send(Bytes::from(text)).await.is_err() {
                    break;
                }
            }
            Event::Resize(cols, rows) => {
                size = Size::new(rows, cols);
                master.resize(size.pty())?;
            }
            _ => {}
        }
    }
    drop(raw);
    drop(tx);

    let status = waiter.await??;
    // trailing output may still be buffered in the pty
    let _ = tokio::time::timeout(Duration::from_millis(200), reader_task).await;

    Ok(status.exit_code() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn answers_first_prompt_only() {
        let mut watcher = PromptWatcher::new(Some(Secret::new("hunter2")));

        assert_eq!(watcher.feed("Last login banner"), Reaction::Pass);
        assert_eq!(
            watcher.feed("bob@prod's password: "),
            Reaction::Answer(Bytes::from_static(b"hunter2\n"))
        );
        assert_eq!(watcher.feed("\r\n"), Reaction::Pass);
        assert_eq!(watcher.feed("Welcome to prod"), Reaction::Pass);
        assert_eq!(watcher.feed("sudo password: "), Reaction::Pass);
    }

    #[test]
    fn reports_rejected_secret() {
        let mut watcher = PromptWatcher::new(Some(Secret::new("stale")));

        watcher.feed("Password: ");
        assert_eq!(
            watcher.feed("Permission denied, please try again.\r\n"),
            Reaction::Rejected
        );
        assert_eq!(watcher.feed("Password: "), Reaction::Pass);
    }

    #[test]
    fn reprompt_counts_as_rejection() {
        let mut watcher = PromptWatcher::new(Some(Secret::new("stale")));

        watcher.feed("Password: ");
        assert_eq!(watcher.feed("Password: "), Reaction::Rejected);
    }

    #[test]
    fn no_secret_never_answers() {
        let mut watcher = PromptWatcher::new(None);
        assert_eq!(watcher.feed("Password: "), Reaction::Pass);
    }

    #[test]
    fn translates_keys() {
        assert_eq!(
            key_bytes(&key(KeyCode::Char('a'), KeyModifiers::NONE)),
            Some(b"a".to_vec())
        );
        assert_eq!(
            key_bytes(&key(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(vec![3])
        );
        assert_eq!(
            key_bytes(&key(KeyCode::Char('b'), KeyModifiers::ALT)),
            Some(vec![27, b'b'])
        );
        assert_eq!(
            key_bytes(&key(KeyCode::Enter, KeyModifiers::NONE)),
            Some(vec![b'\r'])
        );
        assert_eq!(
            key_bytes(&key(KeyCode::Up, KeyModifiers::NONE)),
            Some(vec![27, 91, 65])
        );
        assert_eq!(key_bytes(&key(KeyCode::F(5), KeyModifiers::NONE)), None);
    }
}
