use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use keeptower_core::VERSION;

use crate::constants::env;

/// KeepTower - a multi-user encrypted credential vault
#[derive(Parser)]
#[command(name = "keeptower")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the vault file
    #[arg(long, global = true, env = env::VAULT)]
    pub vault: Option<String>,

    /// Username to authenticate as
    #[arg(short, long, global = true, env = env::USER)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log engine activity to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Use ASCII symbols only
    #[arg(long, global = true)]
    pub ascii: bool,

    /// Never prompt; read secrets from the environment only
    #[arg(long, global = true)]
    pub no_input: bool,
}

/// Security settings chosen when a vault is created
#[derive(Args, Clone)]
pub struct CreationPolicyArgs {
    /// PBKDF2 iterations (minimum 1000)
    #[arg(long, value_name = "N")]
    pub kdf_iterations: Option<u32>,

    /// Minimum password length (8-128)
    #[arg(long, value_name = "N")]
    pub min_password_length: Option<u32>,

    /// Key derivation for user keys (pbkdf2-sha256, argon2id)
    #[arg(long, value_name = "ALG")]
    pub kek: Option<String>,

    /// How usernames are stored (plaintext, sha3-256, sha3-384, sha3-512, pbkdf2-sha256, argon2id)
    #[arg(long, value_name = "ALG")]
    pub username_hash: Option<String>,

    /// Argon2id memory cost in KiB
    #[arg(long, value_name = "KIB")]
    pub argon2_memory_kib: Option<u32>,

    /// Argon2id time cost
    #[arg(long, value_name = "N")]
    pub argon2_iterations: Option<u32>,
}

/// Arguments for the `init` command
#[derive(Args)]
pub struct InitArgs {
    /// Path where the vault will be created
    #[arg(value_name = "PATH")]
    pub path: Option<String>,

    #[command(flatten)]
    pub policy: CreationPolicyArgs,

    /// Do not write a config file
    #[arg(long)]
    pub no_config: bool,
}

/// Arguments for the `upgrade` command
#[derive(Args)]
pub struct UpgradeArgs {
    /// Administrator created for the upgraded vault
    #[arg(long, value_name = "NAME")]
    pub admin: Option<String>,

    #[command(flatten)]
    pub policy: CreationPolicyArgs,
}

#[derive(Args)]
pub struct UsersArgs {
    #[command(subcommand)]
    pub command: UsersSubcommand,
}

#[derive(Subcommand)]
pub enum UsersSubcommand {
    /// List active users
    List,

    /// Add a user with a temporary password
    Add(UserAddArgs),

    /// Remove a user
    Remove(UserTargetArgs),

    /// Set a temporary password for another user
    ResetPassword(UserTargetArgs),
}

#[derive(Args)]
pub struct UserAddArgs {
    #[arg(value_name = "USERNAME")]
    pub username: String,

    /// Grant administrator rights
    #[arg(long)]
    pub admin: bool,
}

#[derive(Args)]
pub struct UserTargetArgs {
    #[arg(value_name = "USERNAME")]
    pub username: String,
}

#[derive(Args)]
pub struct RecordsArgs {
    #[command(subcommand)]
    pub command: RecordsSubcommand,
}

#[derive(Subcommand)]
pub enum RecordsSubcommand {
    /// List account records
    List(RecordListArgs),

    /// Add an account record
    Add(RecordAddArgs),

    /// Show one record
    Show(RecordShowArgs),

    /// Remove a record
    Remove(RecordIdArgs),
}

#[derive(Args)]
pub struct RecordListArgs {
    /// Only records carrying this tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Only favorites
    #[arg(long)]
    pub favorites: bool,
}

#[derive(Args)]
pub struct RecordAddArgs {
    /// Account name
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Login name for the account
    #[arg(long)]
    pub login: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    #[arg(long)]
    pub website: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,

    #[arg(short, long, value_name = "TAG")]
    pub tag: Vec<String>,

    #[arg(long)]
    pub favorite: bool,
}

#[derive(Args)]
pub struct RecordShowArgs {
    /// Record ID (full UUID or unique prefix)
    #[arg(value_name = "ID")]
    pub id: String,

    /// Print the stored password
    #[arg(long)]
    pub reveal: bool,
}

#[derive(Args)]
pub struct RecordIdArgs {
    /// Record ID (full UUID or unique prefix)
    #[arg(value_name = "ID")]
    pub id: String,
}

#[derive(Args)]
pub struct PolicyArgs {
    #[command(subcommand)]
    pub command: PolicySubcommand,
}

#[derive(Subcommand)]
pub enum PolicySubcommand {
    /// Show the vault security policy
    Show,

    /// Change the updatable policy settings
    Set(PolicySetArgs),

    /// Start migrating stored usernames to another algorithm
    MigrateUsernames(MigrateUsernamesArgs),
}

#[derive(Args)]
pub struct PolicySetArgs {
    /// Minimum password length for new passwords
    #[arg(long, value_name = "N")]
    pub min_password_length: Option<u32>,

    /// Key derivation for keys wrapped from now on
    #[arg(long, value_name = "ALG")]
    pub kek: Option<String>,
}

#[derive(Args)]
pub struct MigrateUsernamesArgs {
    /// Target algorithm
    #[arg(value_name = "ALG")]
    pub algorithm: String,
}

#[derive(Args)]
pub struct BackupArgs {
    #[command(subcommand)]
    pub command: BackupSubcommand,
}

#[derive(Subcommand)]
pub enum BackupSubcommand {
    /// List backups, newest first
    List,

    /// Replace the vault with its newest backup
    Restore,
}

/// Arguments for the `completions` command
#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_name = "SHELL")]
    pub shell: Shell,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new vault with the first administrator
    Init(InitArgs),

    /// Show what the vault header says, without credentials
    Info,

    /// Unlock the vault and verify every layer
    Check,

    /// Manage users
    Users(UsersArgs),

    /// Change your own password
    Passwd,

    /// Manage account records
    Records(RecordsArgs),

    /// Inspect or change the security policy
    Policy(PolicyArgs),

    /// List or restore automatic backups
    Backup(BackupArgs),

    /// Convert a legacy single-user vault
    Upgrade(UpgradeArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}
