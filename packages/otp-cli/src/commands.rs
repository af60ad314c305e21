//! Non-interactive subcommands: inspect and clear persisted state.

use anyhow::{Context as _, Result};
use colored::Colorize;

use otp_flow::{
    format_countdown, AuthResult, CredentialStore, FlowKind, KeyValueStore, PhoneNumber,
    SessionStore, SystemClock,
};

use crate::context::Context;

const KINDS: [FlowKind; 2] = [FlowKind::Login, FlowKind::Register];

fn parse_phone(input: &str) -> Result<PhoneNumber> {
    PhoneNumber::parse(input).with_context(|| format!("invalid phone number: {}", input))
}

/// One line per flow with a live session for `phone`.
pub fn status(ctx: &Context, phone: &str) -> Result<()> {
    let phone = parse_phone(phone)?;
    for line in session_lines(&ctx.store, &phone)? {
        println!("{}", line);
    }
    Ok(())
}

pub(crate) fn session_lines<S: KeyValueStore + Clone>(
    store: &S,
    phone: &PhoneNumber,
) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    for kind in KINDS {
        let sessions = SessionStore::new(store.clone(), SystemClock, kind);
        let line = match sessions.peek(phone)? {
            Some(session) => {
                let remaining = session.remaining_seconds(sessions.now());
                let mut line = format!(
                    "{:<9} {} resend in {}",
                    kind.namespace(),
                    "active".green(),
                    format_countdown(remaining)
                );
                if session.pending_step {
                    line.push_str(", code entry pending");
                }
                if let Some(name) = session.user_snapshot.and_then(|s| s.full_name) {
                    line.push_str(&format!(", name: {}", name));
                }
                line
            }
            None => format!("{:<9} {}", kind.namespace(), "none".dimmed()),
        };
        lines.push(line);
    }
    Ok(lines)
}

/// Clear login and register sessions for `phone`.
pub fn forget(ctx: &Context, phone: &str) -> Result<()> {
    let phone = parse_phone(phone)?;
    for kind in KINDS {
        SessionStore::new(ctx.store.clone(), SystemClock, kind)
            .clear(&phone)
            .with_context(|| format!("Failed to clear {} session", kind.namespace()))?;
    }
    println!("{} sessions cleared for {}", "✓".green(), phone);
    Ok(())
}

pub fn whoami(ctx: &Context) -> Result<()> {
    match CredentialStore::new(ctx.store.clone()).load()? {
        Some(result) => print_signed_in(&result),
        None => println!("{}", "Not signed in.".yellow()),
    }
    Ok(())
}

pub fn logout(ctx: &Context) -> Result<()> {
    CredentialStore::new(ctx.store.clone())
        .clear()
        .context("Failed to clear credentials")?;
    println!("{} Signed out.", "✓".green());
    Ok(())
}

pub fn print_signed_in(result: &AuthResult) {
    println!("{}", "Signed in.".bright_green().bold());
    if let Some(user) = &result.user {
        println!("  phone:     {}", user.phone);
        if let Some(name) = &user.full_name {
            println!("  name:      {}", name);
        }
        if let Some(user_type) = &user.user_type {
            println!("  type:      {}", user_type);
        }
    }
    println!("  access:    {}", abbreviate(&result.tokens.access));
    println!("  refresh:   {}", abbreviate(&result.tokens.refresh));
}

fn abbreviate(token: &str) -> String {
    let head: String = token.chars().take(12).collect();
    if head.len() < token.len() {
        format!("{}…", head)
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otp_flow::FileStore;

    #[test]
    fn test_session_lines_reports_each_flow() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("store.json"));
        let phone = PhoneNumber::parse("09123456789").unwrap();
        SessionStore::new(store.clone(), SystemClock, FlowKind::Register)
            .start(&phone, "tok", 120, None)
            .unwrap();

        let lines = session_lines(&store, &phone).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("login"));
        assert!(lines[0].contains("none"));
        assert!(lines[1].starts_with("register"));
        assert!(lines[1].contains("code entry pending"));
    }

    #[test]
    fn test_abbreviate() {
        assert_eq!(abbreviate("short"), "short");
        assert_eq!(abbreviate("eyJhbGciOiJIUzI1NiJ9.payload"), "eyJhbGciOiJI…");
    }

    #[test]
    fn test_invalid_phone_is_rejected() {
        assert!(parse_phone("12345").is_err());
    }
}
