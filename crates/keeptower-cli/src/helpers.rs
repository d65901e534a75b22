//! Prompt and parsing helpers for the CLI.

use std::str::FromStr;

use dialoguer::{Input, Password};
use keeptower_core::{KekAlgorithm, UsernameHashAlgorithm, VaultSecurityPolicy};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::cli::CreationPolicyArgs;
use crate::constants::env;
use crate::errors::CliError;

fn env_secret(name: &str) -> Option<Zeroizing<String>> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.is_empty())
        .map(Zeroizing::new)
}

/// Password of the user opening the vault, from `KEEPTOWER_PASSWORD` or a prompt.
pub fn prompt_password(interactive: bool, prompt: &str) -> anyhow::Result<Zeroizing<String>> {
    if let Some(value) = env_secret(env::PASSWORD) {
        return Ok(value);
    }
    if !interactive {
        return Err(CliError::auth_failed_with_hint(
            "No password provided and no TTY available.",
            format!("Hint: Set {}.", env::PASSWORD),
        )
        .into());
    }
    Password::new()
        .with_prompt(prompt)
        .interact()
        .map(Zeroizing::new)
        .map_err(|e| anyhow::anyhow!("Failed to read password: {}", e))
}

/// A password being set, from `KEEPTOWER_NEW_PASSWORD` or a confirmed prompt.
pub fn prompt_new_password(interactive: bool, prompt: &str) -> anyhow::Result<Zeroizing<String>> {
    if let Some(value) = env_secret(env::NEW_PASSWORD) {
        return Ok(value);
    }
    if !interactive {
        return Err(CliError::invalid_input(format!(
            "No new password provided and no TTY available. Set {}.",
            env::NEW_PASSWORD
        ))
        .into());
    }
    Password::new()
        .with_prompt(prompt)
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()
        .map(Zeroizing::new)
        .map_err(|e| anyhow::anyhow!("Failed to read password: {}", e))
}

/// Secret for a new account record; empty when none is given non-interactively.
pub fn prompt_record_password(interactive: bool) -> anyhow::Result<Zeroizing<String>> {
    if let Some(value) = env_secret(env::RECORD_PASSWORD) {
        return Ok(value);
    }
    if !interactive {
        return Ok(Zeroizing::new(String::new()));
    }
    Password::new()
        .with_prompt("Account password (empty for none)")
        .allow_empty_password(true)
        .interact()
        .map(Zeroizing::new)
        .map_err(|e| anyhow::anyhow!("Failed to read password: {}", e))
}

pub fn prompt_username(interactive: bool) -> anyhow::Result<String> {
    if !interactive {
        return Err(CliError::invalid_input(format!(
            "No username provided. Pass --user or set {}.",
            env::USER
        ))
        .into());
    }
    Input::<String>::new()
        .with_prompt("Username")
        .interact_text()
        .map_err(|e| anyhow::anyhow!("Failed to read username: {}", e))
}

fn parse_arg<T: FromStr>(value: &str, what: &str) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| CliError::invalid_input(format!("Invalid {}: {}", what, e)).into())
}

pub fn parse_kek(value: &str) -> anyhow::Result<KekAlgorithm> {
    parse_arg(value, "key derivation algorithm")
}

pub fn parse_username_hash(value: &str) -> anyhow::Result<UsernameHashAlgorithm> {
    parse_arg(value, "username hash algorithm")
}

/// Build a creation policy from the defaults and any flags given.
pub fn policy_from_args(args: &CreationPolicyArgs) -> anyhow::Result<VaultSecurityPolicy> {
    let mut policy = VaultSecurityPolicy::default();
    if let Some(iterations) = args.kdf_iterations {
        policy.kdf_iterations = iterations;
    }
    if let Some(length) = args.min_password_length {
        policy.min_password_length = length;
    }
    if let Some(kek) = args.kek.as_deref() {
        policy.kek_algorithm = parse_kek(kek)?;
    }
    if let Some(algorithm) = args.username_hash.as_deref() {
        policy.username_hash_algorithm = parse_username_hash(algorithm)?;
    }
    if let Some(memory) = args.argon2_memory_kib {
        policy.argon2_memory_kib = memory;
    }
    if let Some(iterations) = args.argon2_iterations {
        policy.argon2_iterations = iterations;
    }
    policy
        .validate()
        .map_err(|e| CliError::invalid_input(e.to_string()))?;
    Ok(policy)
}

/// Resolve a full UUID or a unique prefix of one.
pub fn resolve_record_id(input: &str, ids: &[Uuid]) -> anyhow::Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(input) {
        return Ok(id);
    }
    let needle = input.trim().to_ascii_lowercase();
    if needle.len() < 4 {
        return Err(CliError::invalid_input(format!(
            "Record ID prefix \"{}\" is too short (use at least 4 characters)",
            input
        ))
        .into());
    }
    let matches: Vec<&Uuid> = ids
        .iter()
        .filter(|id| id.to_string().starts_with(&needle))
        .collect();
    match matches.as_slice() {
        [one] => Ok(**one),
        [] => Err(CliError::not_found(
            format!("Record not found: {}", input),
            "Hint: Run `keeptower records list` to find record IDs.",
        )
        .into()),
        _ => Err(CliError::invalid_input(format!(
            "Record ID prefix \"{}\" matches {} records",
            input,
            matches.len()
        ))
        .into()),
    }
}
