use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "passkit")]
#[command(about = "Hash, verify and migrate password hashes", long_about = None)]
pub struct Cli {
    /// Policy file (INI, or TOML with a .toml extension); defaults to
    /// PASSKIT_POLICY / config/passkit.ini plus PASSKIT__ overrides
    #[arg(long, global = true)]
    pub policy: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Hash a secret with the policy's default (or the given) scheme
    Hash(HashArgs),
    /// Check a secret against a hash; exits with 1 on mismatch
    Verify(VerifyArgs),
    /// Print the scheme that recognizes a hash
    Identify(IdentifyArgs),
    /// Report whether a hash should be re-hashed; exits with 1 if so
    NeedsUpdate(NeedsUpdateArgs),
    /// List registered schemes
    Schemes(SchemesArgs),
}

#[derive(clap::Args, Debug)]
pub struct HashArgs {
    /// Scheme to hash with instead of the default
    #[arg(long)]
    pub scheme: Option<String>,

    #[arg(long)]
    pub category: Option<String>,

    pub secret: String,
}

#[derive(clap::Args, Debug)]
pub struct VerifyArgs {
    #[arg(long)]
    pub category: Option<String>,

    pub secret: String,

    pub hash: String,
}

#[derive(clap::Args, Debug)]
pub struct IdentifyArgs {
    pub hash: String,
}

#[derive(clap::Args, Debug)]
pub struct NeedsUpdateArgs {
    #[arg(long)]
    pub category: Option<String>,

    pub hash: String,
}

#[derive(clap::Args, Debug)]
pub struct SchemesArgs {
    /// Only list schemes loaded for the policy
    #[arg(long)]
    pub loaded: bool,
}
