use std::path::Path;
use std::process::ExitCode;
use tracing::info;

use passkit::context::CryptContext;
use passkit::policy::{Policy, PolicySource};
use passkit::registry::HandlerRegistry;

use crate::cli::{Commands, HashArgs, IdentifyArgs, NeedsUpdateArgs, SchemesArgs, VerifyArgs};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn run(policy: Option<&Path>, command: Commands) -> Result<ExitCode, AnyError> {
    if let Commands::Schemes(args) = command {
        return schemes(policy, args);
    }

    let context = CryptContext::new(load_policy(policy)?)?;
    match command {
        Commands::Hash(args) => hash(&context, args),
        Commands::Verify(args) => verify(&context, args),
        Commands::Identify(args) => identify(&context, args),
        Commands::NeedsUpdate(args) => needs_update(&context, args),
        Commands::Schemes(args) => schemes(policy, args),
    }
}

fn load_policy(path: Option<&Path>) -> Result<Policy, AnyError> {
    let policy = match path {
        Some(path) => {
            info!(path = %path.display(), "Loading policy");
            Policy::from_source(PolicySource::path(path))?
        }
        None => Policy::load()?,
    };
    Ok(policy)
}

fn hash(context: &CryptContext, args: HashArgs) -> Result<ExitCode, AnyError> {
    let hash = context.hash(&args.secret, args.category.as_deref(), args.scheme.as_deref())?;
    println!("{hash}");
    Ok(ExitCode::SUCCESS)
}

fn verify(context: &CryptContext, args: VerifyArgs) -> Result<ExitCode, AnyError> {
    let matched = context.verify(&args.secret, &args.hash, args.category.as_deref())?;
    println!("{matched}");
    Ok(if matched { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn identify(context: &CryptContext, args: IdentifyArgs) -> Result<ExitCode, AnyError> {
    match context.identify(&args.hash, None)? {
        Some(scheme) => {
            println!("{scheme}");
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("hash not recognized by any enabled scheme");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn needs_update(context: &CryptContext, args: NeedsUpdateArgs) -> Result<ExitCode, AnyError> {
    let outdated = context.needs_update(&args.hash, args.category.as_deref())?;
    println!("{outdated}");
    Ok(if outdated { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn schemes(policy: Option<&Path>, args: SchemesArgs) -> Result<ExitCode, AnyError> {
    for name in scheme_names(policy, args.loaded)? {
        println!("{name}");
    }
    Ok(ExitCode::SUCCESS)
}

/// Registered names; with `loaded`, the policy's schemes are resolved first
fn scheme_names(policy: Option<&Path>, loaded: bool) -> Result<Vec<String>, AnyError> {
    if !loaded {
        return Ok(HandlerRegistry::global().list(false));
    }
    let context = CryptContext::new(load_policy(policy)?)?;
    Ok(context.registry().list(true))
}
