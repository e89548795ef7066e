//! authenticate command - verify a username and password against the directory

use super::{CommandContext, EXIT_REJECTED, EXIT_SUCCESS, EXIT_UNAVAILABLE};
use crate::config::authenticator_config;
use anyhow::{bail, Context, Result};
use colored::Colorize;
use dirbind_auth::{AuthError, Authenticator, DirectoryEntry};
use serde::Serialize;
use std::io::BufRead;

/// Where the user's password comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordInput {
    Value(String),
    Stdin,
}

#[derive(Serialize)]
struct AuthSuccess<'a> {
    authenticated: bool,
    entry: &'a DirectoryEntry,
}

#[derive(Serialize)]
struct AuthFailure<'a> {
    authenticated: bool,
    code: &'a str,
    stage: &'a str,
    message: String,
}

pub async fn execute(
    ctx: &CommandContext,
    username: &str,
    password: Option<PasswordInput>,
) -> Result<u8> {
    let config = authenticator_config(&ctx.config)?;

    let password = match password {
        Some(PasswordInput::Value(value)) => value,
        Some(PasswordInput::Stdin) => read_password(std::io::stdin().lock())?,
        None => bail!("A password is required: use --password, --password-stdin or DIRBIND_PASSWORD"),
    };

    // Directories may accept an empty password as an unauthenticated bind
    if password.is_empty() {
        bail!("Refusing to authenticate with an empty password");
    }

    let authenticator = Authenticator::ldap(config);

    match authenticator.authenticate(username, &password).await {
        Ok(entry) => {
            print_success(ctx, username, &entry)?;
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            print_failure(ctx, username, &e)?;
            Ok(exit_status(&e))
        }
    }
}

/// Read the first line of `reader` as the password, without its line ending
pub fn read_password<R: BufRead>(mut reader: R) -> Result<String> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;

    let trimmed = line.trim_end_matches(['\n', '\r']).len();
    line.truncate(trimmed);
    Ok(line)
}

pub fn exit_status(err: &AuthError) -> u8 {
    if err.is_rejection() {
        EXIT_REJECTED
    } else {
        EXIT_UNAVAILABLE
    }
}

fn print_success(ctx: &CommandContext, username: &str, entry: &DirectoryEntry) -> Result<()> {
    if ctx.is_json() {
        let result = AuthSuccess {
            authenticated: true,
            entry,
        };
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    ctx.info(&format!("{} {}", "Authenticated".green().bold(), username));
    ctx.info(&format!("  {}: {}", "DN".cyan(), entry.dn));

    let mut names: Vec<&String> = entry.attributes.keys().collect();
    names.sort();
    for name in names {
        for value in entry.values(name) {
            ctx.info(&format!("  {}: {}", name.cyan(), value));
        }
    }

    let mut binary: Vec<(&String, usize)> = entry
        .binary_attributes
        .iter()
        .map(|(name, values)| (name, values.len()))
        .collect();
    binary.sort();
    for (name, count) in binary {
        ctx.info(&format!("  {}: <{} binary value(s)>", name.cyan(), count));
    }

    Ok(())
}

fn print_failure(ctx: &CommandContext, username: &str, err: &AuthError) -> Result<()> {
    if ctx.is_json() {
        let result = AuthFailure {
            authenticated: false,
            code: err.code(),
            stage: err.stage().as_str(),
            message: err.to_string(),
        };
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    ctx.error(&format!(
        "{} {}: {} ({})",
        "Authentication failed for".red().bold(),
        username,
        err,
        err.code()
    ));
    Ok(())
}
