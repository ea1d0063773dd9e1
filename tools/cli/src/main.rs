//! PassKeep CLI - Command line interface for password credentials.
//!
//! This tool hashes and verifies passwords, inspects stored credentials,
//! and manages user records kept in JSON files.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use passkeep_account::{AuthConfig, Role, User};
use passkeep_common::SecretString;
use passkeep_crypto::{Credential, CredentialManager, KdfParams};

#[derive(Parser)]
#[command(name = "passkeep")]
#[command(about = "PassKeep - Password credential management")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// JSON configuration file (defaults apply when omitted).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash a new password and print the credential.
    Hash {
        /// KDF strength: "interactive", "moderate", "sensitive" or "legacy".
        /// Overrides the configured parameters.
        #[arg(short, long)]
        strength: Option<String>,

        /// Print a PHC string instead of JSON.
        #[arg(long)]
        phc: bool,
    },

    /// Check a password against a credential.
    Verify {
        /// Credential as a PHC string or JSON.
        #[arg(short = 'k', long)]
        credential: String,
    },

    /// Show the parameters of a credential.
    Inspect {
        /// Credential as a PHC string or JSON.
        #[arg(short = 'k', long)]
        credential: String,
    },

    /// Write the default configuration to a file.
    InitConfig {
        /// Output file.
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Create a user record with a password.
    UserCreate {
        /// Username.
        #[arg(short, long)]
        username: String,

        /// Authentication provider.
        #[arg(short, long, default_value = "local")]
        provider: String,

        /// Email address.
        #[arg(short, long)]
        email: Option<String>,

        /// First name.
        #[arg(long, default_value = "")]
        first_name: String,

        /// Last name.
        #[arg(long, default_value = "")]
        last_name: String,

        /// Role: "Admin", "Owner" or "User".
        #[arg(short, long)]
        role: Option<String>,

        /// File to store the user record in.
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Log in as a stored user, upgrading the credential if outdated.
    UserLogin {
        /// User record file.
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Change the password of a stored user.
    UserPasswd {
        /// User record file.
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print the public representation of a stored user.
    UserShow {
        /// User record file.
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Hash { strength, phc } => cmd_hash(&config, strength.as_deref(), phc).await,

        Commands::Verify { credential } => cmd_verify(&config, &credential).await,

        Commands::Inspect { credential } => cmd_inspect(&config, &credential),

        Commands::InitConfig { out } => cmd_init_config(&out),

        Commands::UserCreate {
            username,
            provider,
            email,
            first_name,
            last_name,
            role,
            out,
        } => cmd_user_create(
            &config,
            &username,
            &provider,
            email.as_deref(),
            (&first_name, &last_name),
            role.as_deref(),
            &out,
        ),

        Commands::UserLogin { file } => cmd_user_login(&config, &file),

        Commands::UserPasswd { file } => cmd_user_passwd(&config, &file),

        Commands::UserShow { file } => cmd_user_show(&file),
    }
}

/// Load configuration, falling back to defaults.
fn load_config(path: Option<&Path>) -> Result<AuthConfig> {
    match path {
        Some(path) => AuthConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(AuthConfig::default()),
    }
}

/// Map a strength name to KDF parameters.
fn strength_params(strength: &str) -> Result<KdfParams> {
    match strength {
        "interactive" => Ok(KdfParams::interactive()),
        "moderate" => Ok(KdfParams::moderate()),
        "sensitive" => Ok(KdfParams::sensitive()),
        "legacy" => Ok(KdfParams::legacy()),
        _ => anyhow::bail!("Invalid strength. Use: interactive, moderate, sensitive, or legacy"),
    }
}

/// Parse a credential given as a PHC string or JSON.
fn parse_credential(input: &str) -> Result<Credential> {
    let input = input.trim();
    let credential = if input.starts_with('$') {
        Credential::from_phc(input)?
    } else {
        Credential::from_json(input)?
    };
    Ok(credential)
}

/// Describe a credential's parameters without its salt or hash.
fn describe_credential(credential: &Credential, config: &AuthConfig) -> Vec<String> {
    let params = &credential.params;
    let mut lines = vec![
        format!("Algorithm: {}", params.algorithm),
        format!("Iterations: {}", params.iterations),
    ];
    if params.algorithm.is_memory_hard() {
        lines.push(format!("Memory: {} KiB", params.memory_cost));
        lines.push(format!("Parallelism: {}", params.parallelism));
    }
    lines.push(format!("Key length: {} bytes", params.key_length));
    let upgrade = if credential.params == config.kdf {
        "no"
    } else {
        "yes"
    };
    lines.push(format!("Needs upgrade: {}", upgrade));
    lines
}

fn load_user(path: &Path) -> Result<User> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read user record {}", path.display()))?;
    Ok(User::from_storage_json(&json)?)
}

fn save_user(user: &User, path: &Path) -> Result<()> {
    std::fs::write(path, user.to_storage_json()?)
        .with_context(|| format!("Failed to write user record {}", path.display()))
}

/// Prompt for password securely.
fn prompt_password(prompt: &str) -> Result<SecretString> {
    let password = rpassword::prompt_password(prompt).context("Failed to read password")?;
    Ok(SecretString::new(password))
}

/// Prompt for a new password twice.
fn prompt_new_password() -> Result<SecretString> {
    let password = prompt_password("Enter new password: ")?;
    let confirm = prompt_password("Confirm new password: ")?;

    if password != confirm {
        anyhow::bail!("Passwords do not match");
    }

    Ok(password)
}

/// Hash a new password.
async fn cmd_hash(config: &AuthConfig, strength: Option<&str>, phc: bool) -> Result<()> {
    let mut config = config.clone();
    if let Some(strength) = strength {
        config.kdf = strength_params(strength)?;
    }
    let manager = config
        .credential_manager()
        .context("Invalid credential parameters")?;

    let password = prompt_new_password()?;
    config.password_policy.check(password.expose())?;

    info!("Deriving credential with {}", manager.params().algorithm);
    let credential = manager
        .create_offloaded(password)
        .await
        .context("Failed to create credential")?;

    if phc {
        println!("{}", credential.to_phc()?);
    } else {
        println!("{}", credential.to_json()?);
    }

    Ok(())
}

/// Verify a password against a credential.
async fn cmd_verify(config: &AuthConfig, input: &str) -> Result<()> {
    let credential = parse_credential(input).context("Invalid credential")?;
    let manager = config.credential_manager()?;

    let password = prompt_password("Enter password: ")?;
    let matches = manager
        .verify_offloaded(password, credential)
        .await
        .context("Failed to verify credential")?;

    if !matches {
        anyhow::bail!("Password does not match");
    }

    println!("Password matches.");
    Ok(())
}

/// Show credential parameters.
fn cmd_inspect(config: &AuthConfig, input: &str) -> Result<()> {
    let credential = parse_credential(input).context("Invalid credential")?;
    credential.decode().context("Invalid credential")?;

    println!("Credential Information:");
    for line in describe_credential(&credential, config) {
        println!("  {}", line);
    }

    Ok(())
}

/// Write the default configuration.
fn cmd_init_config(out: &Path) -> Result<()> {
    AuthConfig::default()
        .save(out)
        .with_context(|| format!("Failed to write config to {}", out.display()))?;
    println!("Configuration written to {}", out.display());
    Ok(())
}

/// Create a user record.
fn cmd_user_create(
    config: &AuthConfig,
    username: &str,
    provider: &str,
    email: Option<&str>,
    (first_name, last_name): (&str, &str),
    role: Option<&str>,
    out: &Path,
) -> Result<()> {
    info!("Creating user: {}", username.trim());

    let mut user = User::new(username, provider)
        .context("Invalid user")?
        .with_name(first_name, last_name);
    if let Some(email) = email {
        user = user.with_email(email)?;
    }
    if let Some(role) = role {
        user = user.with_role(role.parse::<Role>()?);
    }

    let manager = config.credential_manager()?;
    let password = prompt_new_password()?;
    user.set_password(&manager, &config.password_policy, password.expose())?;

    save_user(&user, out)?;

    println!("User created successfully!");
    println!("{}", user.to_public_json()?);

    Ok(())
}

/// Log in as a stored user.
fn cmd_user_login(config: &AuthConfig, file: &Path) -> Result<()> {
    let mut user = load_user(file)?;
    let manager = config.credential_manager()?;

    let password = prompt_password("Enter password: ")?;
    let outdated = user
        .credential()
        .is_some_and(|c| manager.needs_upgrade(c));

    match user.authenticate_and_upgrade(&manager, password.expose()) {
        Ok(true) => {}
        Ok(false) => anyhow::bail!("Authentication failed"),
        Err(e) if e.is_authentication_failure() => {
            tracing::debug!("Login error: {}", e);
            anyhow::bail!("Authentication failed")
        }
        Err(e) => return Err(e).context("Stored credential is corrupted"),
    }

    if outdated {
        save_user(&user, file)?;
        info!("Credential upgraded to current parameters");
    }

    println!("Logged in as {}", user.username());
    Ok(())
}

/// Require the user's current password before a change.
fn check_current_password(user: &User, manager: &CredentialManager, password: &str) -> Result<()> {
    match user.authenticate(manager, password) {
        Ok(true) => Ok(()),
        Ok(false) => anyhow::bail!("Authentication failed"),
        Err(e) if e.is_authentication_failure() => {
            tracing::debug!("Password check error: {}", e);
            anyhow::bail!("Authentication failed")
        }
        Err(e) => Err(e).context("Stored credential is corrupted"),
    }
}

/// Change a stored user's password.
fn cmd_user_passwd(config: &AuthConfig, file: &Path) -> Result<()> {
    let mut user = load_user(file)?;
    let manager = config.credential_manager()?;

    if user.has_password() {
        let current = prompt_password("Enter current password: ")?;
        check_current_password(&user, &manager, current.expose())?;
    }

    let password = prompt_new_password()?;
    user.set_password(&manager, &config.password_policy, password.expose())?;
    save_user(&user, file)?;

    println!("Password changed successfully!");
    Ok(())
}

/// Show a stored user.
fn cmd_user_show(file: &Path) -> Result<()> {
    let user = load_user(file)?;
    println!("{}", user.to_public_json()?);
    Ok(())
}
