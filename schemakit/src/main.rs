//! SchemaKit command-line tool.
//!
//! Connects to a MySQL or SQLite database through `schemakit-core` and
//! prints what the portable schema layer sees: tables, sequences, the
//! reconstructed definition of a table, its indexes and constraints. Output
//! goes to stdout as JSON; logs go to stderr.
//!
//! # Security
//! - Passwords come from `SCHEMAKIT_PASSWORD` or an interactive prompt,
//!   never from a command-line argument
//! - Printed DSNs and log lines never contain credentials

mod output;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use schemakit_core::{
    ConnectionConfig, Credentials, Database, DatabaseType, LogFormat, error::redact_database_url,
    init_logging,
};
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "schemakit")]
#[command(about = "Portable schema inspection tool")]
#[command(version)]
#[command(long_about = "
SchemaKit - portable schema inspection

Reads a database through the SchemaKit portable schema layer and prints
tables, sequences, reconstructed column definitions, indexes and
constraints as JSON.

SUPPORTED DATABASES:
- MySQL  (--backend mysql --host HOST --database NAME)
- SQLite (--backend sqlite --database PATH)

EXAMPLES:
  schemakit --backend sqlite --database app.db tables
  schemakit --backend mysql --host db --database app --username app --ask-password describe orders
  schemakit --config connection.json next-id orders
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the DSN the configuration resolves to
    Dsn,
    /// Test the database connection
    Ping,
    /// List tables, excluding sequence tables
    Tables,
    /// List emulated sequences
    Sequences,
    /// Print the portable definition of a table
    Describe(TableArgs),
    /// Print the indexes and constraints of a table
    Indexes(TableArgs),
    /// Draw the next identifier from a table's sequence
    NextId(TableArgs),
    /// Check a name against the backend's naming rules
    CheckName(CheckNameArgs),
    /// List supported database types
    List,
}

#[derive(Args)]
pub struct TableArgs {
    /// Table name
    pub table: String,
}

#[derive(Args)]
pub struct CheckNameArgs {
    /// What the name is used for
    #[arg(value_enum)]
    pub kind: NameKind,

    /// Name to check
    pub name: String,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum NameKind {
    Table,
    Column,
    Index,
}

#[derive(Args)]
pub struct ConnectionArgs {
    /// JSON connection configuration; command-line values override it
    #[arg(long, env = "SCHEMAKIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database backend
    #[arg(long, env = "SCHEMAKIT_BACKEND")]
    pub backend: Option<DatabaseType>,

    /// Database host
    #[arg(long, env = "SCHEMAKIT_HOST")]
    pub host: Option<String>,

    /// Database port
    #[arg(long, env = "SCHEMAKIT_PORT")]
    pub port: Option<u16>,

    /// Database name, or file path for SQLite
    #[arg(long, env = "SCHEMAKIT_DATABASE")]
    pub database: Option<String>,

    /// Client character set
    #[arg(long, env = "SCHEMAKIT_CHARSET")]
    pub charset: Option<String>,

    /// Database user
    #[arg(short = 'u', long, env = "SCHEMAKIT_USERNAME")]
    pub username: Option<String>,

    /// Database password
    #[arg(long, env = "SCHEMAKIT_PASSWORD", hide_env_values = true, hide = true)]
    pub password: Option<String>,

    /// Prompt for the database password
    #[arg(long)]
    pub ask_password: bool,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all output except errors")]
    pub quiet: bool,

    /// Log line format on stderr (text or json)
    #[arg(long, global = true, default_value = "text", env = "SCHEMAKIT_LOG_FORMAT")]
    pub log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet, cli.global.log_format)?;

    match &cli.command {
        Command::List => {
            list_supported_databases();
            Ok(())
        }
        Command::CheckName(args) => {
            let config = resolve_config(&cli.connection).await?;
            check_name(&config, args)
        }
        Command::Dsn => {
            let config = resolve_config(&cli.connection).await?;
            let db = Database::new(config)?;
            println!("{}", redact_database_url(&db.generate_dsn()?));
            Ok(())
        }
        command => {
            let config = resolve_config(&cli.connection).await?;
            let mut db = Database::new(config)?;
            db.connect(false).await?;
            let outcome = run(&mut db, command).await;
            db.disconnect().await?;
            outcome
        }
    }
}

/// Runs a command that needs a live connection.
async fn run(db: &mut Database, command: &Command) -> Result<()> {
    match command {
        Command::Ping => {
            info!("✓ Connection test successful");
            println!("Connection to {} database successful", db.database_type());
        }
        Command::Tables => {
            let tables = db.reverse().list_tables().await?;
            info!("Found {} tables", tables.len());
            output::print_json(&tables)?;
        }
        Command::Sequences => {
            let sequences = db.reverse().list_sequences().await?;
            info!("Found {} sequences", sequences.len());
            output::print_json(&sequences)?;
        }
        Command::Describe(args) => {
            let definition = db
                .reverse()
                .get_table_definition(&args.table)
                .await
                .with_context(|| format!("Failed to describe table '{}'", args.table))?;
            output::print_json(&definition)?;
        }
        Command::Indexes(args) => {
            let report = output::IndexReport::collect(db, &args.table).await?;
            output::print_json(&report)?;
        }
        Command::NextId(args) => {
            let id = db.next_id(&args.table).await?;
            println!("{}", id);
        }
        Command::Dsn | Command::CheckName(_) | Command::List => {
            bail!("command does not need a connection")
        }
    }
    Ok(())
}

/// Builds the connection configuration from the optional config file,
/// command-line values and the password source.
async fn resolve_config(args: &ConnectionArgs) -> Result<ConnectionConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let config: ConnectionConfig = serde_json::from_str(&text)
                .with_context(|| format!("Invalid connection configuration in {}", path.display()))?;
            debug!("Loaded connection configuration from {}", path.display());
            config
        }
        None => {
            let Some(backend) = args.backend else {
                bail!("--backend or --config is required");
            };
            ConnectionConfig::new(backend, "localhost")
        }
    };

    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    if let Some(host) = &args.host {
        config.host.clone_from(host);
    }
    if let Some(port) = args.port {
        config.port = Some(port);
    }
    if let Some(database) = &args.database {
        config.database = Some(database.clone());
    }
    if let Some(charset) = &args.charset {
        config.charset.clone_from(charset);
    }

    if let Some(username) = &args.username {
        let password = if args.ask_password {
            Some(
                rpassword::prompt_password(format!("Password for {}: ", username))
                    .context("Failed to read password")?,
            )
        } else {
            args.password.clone()
        };
        config = config.with_credentials(Credentials::new(username.clone(), password));
    } else if args.ask_password {
        bail!("--ask-password requires --username");
    }

    config.validate()?;
    Ok(config)
}

/// Validates `args.name` offline against the backend's naming rules.
fn check_name(config: &ConnectionConfig, args: &CheckNameArgs) -> Result<()> {
    let db = Database::new(config.clone())?;
    let rules = db.dialect().rules();
    match args.kind {
        NameKind::Table => rules.check_table_name(&args.name)?,
        NameKind::Column => rules.check_column_name(&args.name)?,
        NameKind::Index => rules.check_index_name(&args.name)?,
    }
    println!("'{}' is a valid {:?} name for {}", args.name, args.kind, config.backend);
    Ok(())
}

/// Lists supported database types and their connection options
fn list_supported_databases() {
    println!("Supported Database Types:");
    println!();

    #[cfg(feature = "mysql")]
    {
        println!("MySQL:");
        println!("  Options: --backend mysql --host HOST [--port 3306] --database NAME");
        println!("  Example: schemakit --backend mysql --host localhost --database app -u app --ask-password tables");
        println!();
    }

    #[cfg(feature = "sqlite")]
    {
        println!("SQLite:");
        println!("  Options: --backend sqlite --database PATH (omit for in-memory)");
        println!("  Example: schemakit --backend sqlite --database /var/lib/app.db tables");
        println!();
    }

    println!("Security Features:");
    println!("  • Passwords only from SCHEMAKIT_PASSWORD or a prompt");
    println!("  • Credential sanitization in logs and printed DSNs");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("arguments parse")
    }

    #[tokio::test]
    async fn test_resolve_config_from_arguments() {
        let cli = parse(&[
            "schemakit",
            "--backend",
            "mysql",
            "--host",
            "db.internal",
            "--database",
            "app",
            "-u",
            "app",
            "tables",
        ]);
        let config = resolve_config(&cli.connection).await.expect("config");

        assert_eq!(config.backend, DatabaseType::MySQL);
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.database.as_deref(), Some("app"));
        assert_eq!(
            config.credentials.as_ref().map(|c| c.username().to_string()),
            Some("app".to_string())
        );
    }

    #[tokio::test]
    async fn test_resolve_config_file_with_override() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("connection.json");
        std::fs::write(
            &path,
            r#"{"backend": "mysql", "host": "from-file", "database": "app"}"#,
        )
        .expect("write config");

        let cli = parse(&[
            "schemakit",
            "--config",
            path.to_str().expect("utf-8 path"),
            "--port",
            "3307",
            "dsn",
        ]);
        let config = resolve_config(&cli.connection).await.expect("config");

        assert_eq!(config.host, "from-file");
        assert_eq!(config.port, Some(3307));
    }

    #[tokio::test]
    async fn test_resolve_config_requires_backend() {
        let cli = parse(&["schemakit", "tables"]);
        assert!(resolve_config(&cli.connection).await.is_err());
    }

    #[test]
    fn test_check_name() {
        let config = ConnectionConfig::sqlite_memory();
        let valid = CheckNameArgs {
            name: "orders".to_string(),
            kind: NameKind::Table,
        };
        assert!(check_name(&config, &valid).is_ok());

        let reserved = CheckNameArgs {
            name: "select".to_string(),
            kind: NameKind::Column,
        };
        assert!(check_name(&config, &reserved).is_err());
    }

    #[test]
    fn test_check_name_arguments() {
        let cli = parse(&["schemakit", "--backend", "sqlite", "check-name", "column", "total"]);
        match cli.command {
            Command::CheckName(args) => {
                assert!(matches!(args.kind, NameKind::Column));
                assert_eq!(args.name, "total");
            }
            _ => panic!("expected check-name"),
        }
    }

    #[test]
    fn test_verbosity_flags() {
        let cli = parse(&["schemakit", "-vv", "list"]);
        assert_eq!(cli.global.verbose, 2);
        assert!(!cli.global.quiet);
        assert_eq!(cli.global.log_format, LogFormat::Text);

        let cli = parse(&["schemakit", "list", "--log-format", "json"]);
        assert_eq!(cli.global.log_format, LogFormat::Json);
        assert!(Cli::try_parse_from(["schemakit", "--log-format", "xml", "list"]).is_err());
    }
}
