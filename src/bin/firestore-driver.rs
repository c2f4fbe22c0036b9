use clap::{Parser, Subcommand};
use firestore_driver::cli::{self as prog_cli, Command, OutputMode};
use firestore_driver::config::{ConfigLayer, load_config};
use firestore_driver::connection::Connection;
use firestore_driver::types::DocumentId;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "firestore-driver", version, about = "Query a document store from the command line")]
struct Cli {
    #[arg(long, help = "Path to a config file (TOML). Takes precedence over the default locations.")]
    config: Option<PathBuf>,
    #[arg(long, help = "Project id (overrides config/env)")]
    project: Option<String>,
    #[arg(long, help = "Database name (overrides config/env)")]
    database: Option<String>,
    #[arg(long, help = "Collection prefix (overrides config/env)")]
    prefix: Option<String>,
    #[arg(long, help = "Service-account credentials file (overrides config/env)")]
    credentials: Option<PathBuf>,
    #[arg(long, help = "JSON fixture to seed the in-process store with")]
    fixture: Option<PathBuf>,
    #[arg(long, default_value = "human", value_parser = ["human", "plain", "json"])]
    format: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(name = "health-check", about = "Run a limit-1 read and report connectivity")]
    HealthCheck {
        #[arg(long, help = "Collection to probe (default: configured health-check collection)")]
        collection: Option<String>,
    },
    #[command(about = "Print matching documents")]
    Get {
        collection: String,
        #[arg(long = "where", value_name = "FIELD:OP:VALUE")]
        wheres: Vec<String>,
        #[arg(long = "order-by", value_name = "FIELD[:asc|desc]")]
        order_by: Vec<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, value_delimiter = ',')]
        select: Vec<String>,
    },
    #[command(about = "Count matching documents (reads every match)")]
    Count {
        collection: String,
        #[arg(long = "where", value_name = "FIELD:OP:VALUE")]
        wheres: Vec<String>,
    },
    #[command(about = "Look up one document by id")]
    Find { collection: String, id: String },
    #[command(about = "Print one page ordered by document id")]
    Paginate {
        collection: String,
        #[arg(long = "where", value_name = "FIELD:OP:VALUE")]
        wheres: Vec<String>,
        #[arg(long, default_value_t = firestore_driver::query::DEFAULT_PER_PAGE)]
        per_page: usize,
        #[arg(long)]
        page: Option<usize>,
        #[arg(long, help = "Resume after this document id")]
        after: Option<String>,
    },
}

fn parse_wheres(raw: &[String]) -> Result<Vec<prog_cli::WhereArg>, Box<dyn std::error::Error>> {
    Ok(raw.iter().map(|s| prog_cli::parse_where(s)).collect::<Result<_, _>>()?)
}

fn to_command(cmd: Commands) -> Result<Command, Box<dyn std::error::Error>> {
    Ok(match cmd {
        Commands::HealthCheck { collection } => Command::HealthCheck { collection },
        Commands::Get { collection, wheres, order_by, limit, select } => Command::Get {
            collection,
            wheres: parse_wheres(&wheres)?,
            order_by: order_by.iter().map(|s| prog_cli::parse_order(s)).collect::<Result<_, _>>()?,
            limit,
            select,
        },
        Commands::Count { collection, wheres } => {
            Command::Count { collection, wheres: parse_wheres(&wheres)? }
        }
        Commands::Find { collection, id } => Command::Find { collection, id: DocumentId::from(id) },
        Commands::Paginate { collection, wheres, per_page, page, after } => Command::Paginate {
            collection,
            wheres: parse_wheres(&wheres)?,
            per_page,
            page,
            after: after.map(DocumentId::from),
        },
    })
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = firestore_driver::logger::configure_from_env() {
        eprintln!("warning: logging not configured: {e}");
    }
    let layer = ConfigLayer {
        project_id: cli.project,
        credentials: cli.credentials,
        database: cli.database,
        prefix: cli.prefix,
        health_check_collection: None,
        fixture: cli.fixture,
    };
    let cfg = match load_config(layer, cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    let conn = match Connection::in_memory(cfg) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    let mode = prog_cli::parse_output_mode(Some(&cli.format));
    let result = to_command(cli.command).and_then(|cmd| prog_cli::run_with_format(&conn, cmd, mode));
    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            if mode == OutputMode::Json {
                println!("{}", serde_json::json!({ "error": e.to_string() }));
            } else {
                eprintln!("error: {e}");
            }
            std::process::exit(1);
        }
    }
}
