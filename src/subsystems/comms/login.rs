//! Console login/registration prompts in front of the chat.
//!
//! Loops over a small menu until a login succeeds (returns the session) or
//! the user quits / input ends (returns `None`).  Field values are taken
//! verbatim, minus the line terminator.

use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, Lines};

use crate::error::AppError;
use crate::session::{Login, Registration, Session, SessionGate};

const MENU: &str = "[l]ogin, [r]egister, [q]uit > ";

pub async fn run<R, W>(
    gate: &SessionGate,
    lines: &mut Lines<R>,
    out: &mut W,
) -> Result<Option<Session>, AppError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let Some(choice) = prompt(lines, out, MENU).await? else {
            return Ok(None);
        };

        match choice.trim().to_ascii_lowercase().as_str() {
            "l" | "login" => {
                let Some((username, password)) = credentials(lines, out).await? else {
                    return Ok(None);
                };
                match gate.login(&username, &password).await? {
                    Login::LoggedIn(session) => {
                        say(out, &format!("Welcome, {}!", session.username)).await?;
                        return Ok(Some(session));
                    }
                    Login::Invalid => say(out, "Login failed: invalid username or password").await?,
                }
            }
            "r" | "register" => {
                let Some((username, password)) = credentials(lines, out).await? else {
                    return Ok(None);
                };
                let msg = match gate.register(&username, &password).await? {
                    Registration::Created(_) => "Registration successful! Please log in.",
                    Registration::AlreadyExists => "Registration failed: username already exists",
                    Registration::MissingFields => {
                        "Registration failed: please enter both username and password"
                    }
                };
                say(out, msg).await?;
            }
            "q" | "quit" => return Ok(None),
            "" => {}
            other => say(out, &format!("unknown choice: {other}")).await?,
        }
    }
}

async fn credentials<R, W>(
    lines: &mut Lines<R>,
    out: &mut W,
) -> Result<Option<(String, String)>, AppError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let Some(username) = prompt(lines, out, "Username: ").await? else {
        return Ok(None);
    };
    let Some(password) = prompt(lines, out, "Password: ").await? else {
        return Ok(None);
    };
    Ok(Some((username, password)))
}

async fn prompt<R, W>(lines: &mut Lines<R>, out: &mut W, label: &str) -> Result<Option<String>, AppError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    out.write_all(label.as_bytes()).await?;
    out.flush().await?;
    Ok(lines.next_line().await?)
}

async fn say<W: AsyncWrite + Unpin>(out: &mut W, msg: &str) -> Result<(), AppError> {
    out.write_all(msg.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tokio::io::AsyncBufReadExt;

    use crate::store::Database;

    async fn drive(gate: &SessionGate, input: &str) -> (Option<Session>, String) {
        let mut lines = input.as_bytes().lines();
        let mut out = Vec::new();
        let session = run(gate, &mut lines, &mut out).await.unwrap();
        (session, String::from_utf8(out).unwrap())
    }

    fn gate() -> SessionGate {
        SessionGate::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn register_then_login() {
        let g = gate();
        let (session, out) = drive(&g, "r\nmarios\nsecret\nl\nmarios\nsecret\n").await;
        let session = session.expect("logged in");
        assert_eq!(session.username, "marios");
        assert!(out.contains("Registration successful"));
        assert!(out.contains("Welcome, marios!"));
    }

    #[tokio::test]
    async fn wrong_password_then_eof() {
        let g = gate();
        g.register("a", "1").await.unwrap();
        let (session, out) = drive(&g, "login\na\n2\n").await;
        assert!(session.is_none());
        assert!(out.contains("invalid username or password"));
    }

    #[tokio::test]
    async fn duplicate_and_empty_registration_messages() {
        let g = gate();
        let (_, out) = drive(&g, "r\nbob\npw\nr\nbob\npw\nr\n\npw\nq\n").await;
        assert!(out.contains("username already exists"));
        assert!(out.contains("please enter both username and password"));
    }

    #[tokio::test]
    async fn quit_returns_none() {
        let (session, _) = drive(&gate(), "q\n").await;
        assert!(session.is_none());
    }
}
