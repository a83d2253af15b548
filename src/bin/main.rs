//! catdb CLI - inspect join plans and slot selection for a schema
//!
//! Usage:
//!   catdb plan <schema.json> --target <table> [--join <alias>]... [--where <alias.column=value>]...
//!   catdb candidates <schema.json> --table <alias> [--directed]
//!   catdb next-slot <schema.json> --target <table> [--join <alias>]... [--where ...] [--connection <name>]
//!   catdb informativity <schema.json> [--connection <name>] [--refresh]
//!
//! Examples:
//!   catdb plan shop.json --target orders --where customers.country=US
//!   catdb candidates shop.json --table orders
//!   catdb next-slot shop.json --target orders --join customers --connection fixtures

use catdb::cache::{BaselineCache, CacheKey};
use catdb::config::Settings;
use catdb::db;
use catdb::prelude::*;
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "catdb")]
#[command(about = "catdb - join planning and slot selection over a relational schema")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the SQL planned for a target table
    Plan {
        /// Path to the schema JSON file
        schema: PathBuf,

        /// Table to select from
        #[arg(short, long)]
        target: String,

        /// Extra aliases to join
        #[arg(short, long)]
        join: Vec<String>,

        /// Equality constraints as alias.column=value
        #[arg(short = 'w', long = "where")]
        constraints: Vec<String>,

        /// SQL dialect to generate
        #[arg(short, long, default_value = "postgres")]
        dialect: DialectArg,

        /// Output format
        #[arg(short, long, default_value = "sql")]
        output: OutputFormat,
    },

    /// List the aliases that can be joined next to a table
    Candidates {
        /// Path to the schema JSON file
        schema: PathBuf,

        #[arg(short, long)]
        table: String,

        /// Follow foreign keys from holder to referenced table only
        #[arg(long)]
        directed: bool,
    },

    /// Pick the next column to ask about
    NextSlot {
        /// Path to the schema JSON file
        schema: PathBuf,

        #[arg(short, long)]
        target: String,

        #[arg(short, long)]
        join: Vec<String>,

        #[arg(short = 'w', long = "where")]
        constraints: Vec<String>,

        /// Named connection from catdb.toml (default connection, then CATDB_DB_* variables otherwise)
        #[arg(short, long)]
        connection: Option<String>,
    },

    /// Build or show the baseline informativity table
    Informativity {
        /// Path to the schema JSON file
        schema: PathBuf,

        #[arg(short, long)]
        connection: Option<String>,

        /// Recompute even when a cached baseline exists
        #[arg(long)]
        refresh: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum DialectArg {
    Postgres,
    Sqlite,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Sqlite => Dialect::Sqlite,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Output SQL only
    Sql,
    /// Output the plan as JSON
    Json,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Plan {
            schema,
            target,
            join,
            constraints,
            dialect,
            output,
        } => cmd_plan(&schema, &target, &join, &constraints, dialect, output),
        Commands::Candidates {
            schema,
            table,
            directed,
        } => cmd_candidates(&schema, &table, directed),
        Commands::NextSlot {
            schema,
            target,
            join,
            constraints,
            connection,
        } => cmd_next_slot(&schema, &target, &join, &constraints, connection.as_deref()),
        Commands::Informativity {
            schema,
            connection,
            refresh,
        } => cmd_informativity(&schema, connection.as_deref(), refresh),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

type CliResult = std::result::Result<(), Box<dyn std::error::Error>>;

fn load_schema(path: &Path) -> std::result::Result<Schema, Box<dyn std::error::Error>> {
    let json = fs::read_to_string(path)
        .map_err(|e| format!("reading schema '{}': {}", path.display(), e))?;
    Ok(Schema::from_json(&json)?)
}

/// Parse `alias.column=value` pairs into equality constraints.
fn parse_constraints(raw: &[String]) -> std::result::Result<Constraints, String> {
    let mut constraints = Constraints::new();
    for item in raw {
        let (slot, value) = item
            .split_once('=')
            .ok_or_else(|| format!("expected alias.column=value, got '{}'", item))?;
        let (alias, column) = slot
            .rsplit_once('.')
            .ok_or_else(|| format!("expected alias.column, got '{}'", slot))?;
        constraints.add(Alias::parse(alias), column, Constraint::eq(value));
    }
    Ok(constraints)
}

fn request(target: &str, joins: &[String], constraints: Constraints) -> SelectRequest {
    SelectRequest::new(Alias::parse(target))
        .joins(joins.iter().map(|j| Alias::parse(j)))
        .constraints(constraints)
}

fn cmd_plan(
    schema: &Path,
    target: &str,
    joins: &[String],
    constraints: &[String],
    dialect: DialectArg,
    output: OutputFormat,
) -> CliResult {
    let schema = load_schema(schema)?;
    let graph = DependencyGraph::from_schema(&schema);
    let request = request(target, joins, parse_constraints(constraints)?);
    let plan = JoinPlanner::new(&schema, &graph).plan(&request)?;
    let dialect: Dialect = dialect.into();

    match output {
        OutputFormat::Sql => {
            println!("{}", plan.to_sql(dialect));
            for alias in &plan.dropped_aliases {
                eprintln!("-- dropped: {}", alias);
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "sql": plan.to_sql(dialect),
                "plan": plan,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }
    Ok(())
}

fn cmd_candidates(schema: &Path, table: &str, directed: bool) -> CliResult {
    let schema = load_schema(schema)?;
    let graph = DependencyGraph::from_schema(&schema);
    let candidates =
        graph.join_candidates(&[Alias::parse(table)], schema.mapping_tables(), directed);
    if candidates.is_empty() {
        println!("No join candidates.");
    }
    for candidate in candidates {
        println!("{}", candidate);
    }
    Ok(())
}

fn open_session(
    schema: Schema,
    connection: Option<&str>,
) -> std::result::Result<(Session<Box<dyn Connection>>, Settings), Box<dyn std::error::Error>> {
    let settings = Settings::load()?;
    let conn_settings = settings.resolve_connection(connection)?;
    let conn = db::connect(&conn_settings)?;
    let session = Session::with_settings(conn, Arc::new(schema), &settings)?;
    Ok((session, settings))
}

fn open_cache(
    settings: &Settings,
) -> std::result::Result<BaselineCache, Box<dyn std::error::Error>> {
    let cache = match settings.cache.resolved_path()? {
        Some(path) => BaselineCache::open(path)?,
        None => BaselineCache::open_default()?,
    };
    Ok(cache)
}

fn cmd_next_slot(
    schema: &Path,
    target: &str,
    joins: &[String],
    constraints: &[String],
    connection: Option<&str>,
) -> CliResult {
    let schema = load_schema(schema)?;
    let (mut session, settings) = open_session(schema, connection)?;
    if settings.cache.enabled {
        session.load_or_build_informativity(&open_cache(&settings)?)?;
    } else {
        session.build_informativity()?;
    }

    let target = Alias::parse(target);
    let joined: Vec<Alias> = joins.iter().map(|j| Alias::parse(j)).collect();
    let constraints = parse_constraints(constraints)?;
    let mut scope: Vec<Alias> = std::iter::once(&target)
        .chain(joined.iter())
        .chain(constraints.tables())
        .cloned()
        .collect();
    let candidates = session
        .graph()
        .join_candidates(&scope, session.schema().mapping_tables(), true);
    scope.extend(candidates);
    let requestable = session.requestable(scope.iter());

    if session.should_join_next_table(&target, &joined, &constraints, &requestable) {
        match session.best_join_table(&target, &joined, &constraints, &requestable)? {
            Some(table) => println!("join: {}", table),
            None => println!("No informative join table."),
        }
    }

    match session.next_slot(&target, &joined, &constraints, &requestable)? {
        Some(slot) => println!("ask: {}", slot),
        None => println!("No unanswered columns."),
    }
    session.close()?;
    Ok(())
}

fn cmd_informativity(schema: &Path, connection: Option<&str>, refresh: bool) -> CliResult {
    let schema = load_schema(schema)?;
    let (mut session, settings) = open_session(schema, connection)?;

    if refresh || !settings.cache.enabled {
        session.build_informativity()?;
        if settings.cache.enabled {
            let cache = open_cache(&settings)?;
            let hash = CacheKey::schema_hash(session.schema())?;
            let key = CacheKey::informativity(
                &hash,
                settings.informativity.include_primary_keys,
            );
            cache.set(&key, session.informativity())?;
        }
    } else {
        session.load_or_build_informativity(&open_cache(&settings)?)?;
    }

    println!("{}", serde_json::to_string_pretty(session.informativity())?);
    session.close()?;
    Ok(())
}
