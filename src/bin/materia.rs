//! Materia CLI: chemical identity resolution and cluster trees.
//!
//! Usage:
//!   materia ingest <rows.jsonl> [--session NAME] [--db path]
//!   materia tree [--sub-category X] [--db path]
//!   materia results [--db path]
//!   materia rules <subcommand> [--db path]
//!   materia move <node-id> <target-parent-id> [--db path]
//!   materia enrich [--db path]

use clap::{Parser, Subcommand};
use materia::{
    CategoryRule, CommonChemistryClient, HttpAssistant, JobStatus, LlmCapability, MateriaApi,
    PubChemClient, RawItem, SqliteStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "materia",
    version,
    about = "Chemical identity resolution and material cluster trees"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Registry API key (defaults to $MATERIA_REGISTRY_KEY)
    #[arg(long, global = true)]
    registry_key: Option<String>,

    /// Completion endpoint for the optional LLM assistant
    /// (defaults to $MATERIA_LLM_ENDPOINT; absent means no assistant)
    #[arg(long, global = true)]
    llm_endpoint: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve and store a batch of raw rows (JSON lines)
    Ingest {
        /// File with one JSON-encoded row per line
        file: PathBuf,
        /// Session name (defaults to the file stem)
        #[arg(long)]
        session: Option<String>,
    },
    /// Print the cluster tree as JSON
    Tree {
        /// Restrict to one sub-category
        #[arg(long)]
        sub_category: Option<String>,
    },
    /// List resolved records
    Results,
    /// Manage per-category rules
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },
    /// Move a tree node under a new parent (persisted override)
    Move {
        /// Id of the node to move
        node_id: String,
        /// Id of the new parent
        target_parent_id: String,
    },
    /// Run background enrichment over unenriched descriptions
    Enrich,
}

#[derive(Subcommand)]
enum RulesAction {
    /// List all rules
    List,
    /// Create or replace a rule from a JSON file
    Set {
        /// File containing one JSON-encoded rule
        file: PathBuf,
    },
    /// Delete the rule for a sub-category
    Delete {
        sub_category: String,
    },
}

/// Get the default database path (~/.local/share/materia/materia.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    let materia_dir = data_dir.join("materia");
    std::fs::create_dir_all(&materia_dir).ok();
    materia_dir.join("materia.db")
}

fn open_api(
    db: Option<PathBuf>,
    registry_key: Option<String>,
    llm_endpoint: Option<String>,
) -> Result<MateriaApi, String> {
    let db_path = db.unwrap_or_else(default_db_path);
    let store =
        SqliteStore::open(&db_path).map_err(|e| format!("Failed to open database: {}", e))?;

    let api_key = registry_key
        .or_else(|| std::env::var("MATERIA_REGISTRY_KEY").ok())
        .unwrap_or_default();
    let registry = CommonChemistryClient::new(api_key)
        .map_err(|e| format!("Failed to build registry client: {}", e))?;
    let synonyms =
        PubChemClient::new().map_err(|e| format!("Failed to build synonym client: {}", e))?;

    let llm = llm_endpoint
        .or_else(|| std::env::var("MATERIA_LLM_ENDPOINT").ok())
        .and_then(HttpAssistant::new)
        .map(|assistant| LlmCapability::available(Arc::new(assistant)))
        .unwrap_or_else(LlmCapability::unavailable);

    Ok(MateriaApi::new(
        Arc::new(store),
        Arc::new(registry),
        Arc::new(synonyms),
        llm,
    ))
}

async fn cmd_ingest(api: &MateriaApi, file: &PathBuf, session: Option<String>) -> i32 {
    let contents = match std::fs::read_to_string(file) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: cannot read '{}': {}", file.display(), e);
            return 1;
        }
    };

    let mut rows: Vec<RawItem> = Vec::new();
    for (number, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(row) => rows.push(row),
            Err(e) => {
                eprintln!("Error: line {}: {}", number + 1, e);
                return 1;
            }
        }
    }
    if rows.is_empty() {
        eprintln!("Error: no rows in '{}'", file.display());
        return 1;
    }

    let session = session.unwrap_or_else(|| {
        file.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "session".to_string())
    });

    match api.ingest(&session, &rows).await {
        Ok(report) => {
            println!(
                "Session '{}': {} rows, {} resolved, {} records stored",
                report.session, report.rows, report.resolved, report.records
            );
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_tree(api: &MateriaApi, sub_category: Option<&str>) -> i32 {
    match api.cluster_tree(sub_category) {
        Ok(tree) => match serde_json::to_string_pretty(&tree) {
            Ok(json) => {
                println!("{}", json);
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_results(api: &MateriaApi) -> i32 {
    let records = match api.records() {
        Ok(records) => records,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if records.is_empty() {
        println!("No records stored.");
        return 0;
    }

    println!(
        "{:<6}  {:<16}  {:>5}  {:<20}  {}",
        "ID", "IDENTIFIER", "CONF", "STATUS", "DESCRIPTION"
    );
    println!("{}", "-".repeat(90));
    for record in records {
        let mut description = record.description.clone();
        if description.chars().count() > 38 {
            description = description.chars().take(35).collect::<String>() + "...";
        }
        println!(
            "{:<6}  {:<16}  {:>4}%  {:<20}  {}",
            record.id.to_string(),
            record.identifier,
            record.confidence,
            record.validation_status.to_string(),
            description
        );
    }
    0
}

fn cmd_rules_list(api: &MateriaApi) -> i32 {
    let rules = match api.rules() {
        Ok(rules) => rules,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if rules.is_empty() {
        println!("No rules defined.");
        return 0;
    }
    println!(
        "{:<24}  {:<12}  {:<30}  {}",
        "SUB-CATEGORY", "IDENTIFIER", "PARAMETERS", "HIERARCHY"
    );
    println!("{}", "-".repeat(96));
    for rule in rules {
        println!(
            "{:<24}  {:<12}  {:<30}  {}",
            rule.sub_category,
            rule.identifier_name,
            rule.parameter_order.join(", "),
            rule.hierarchy_order.join(" > "),
        );
    }
    0
}

fn cmd_rules_set(api: &MateriaApi, file: &PathBuf) -> i32 {
    let contents = match std::fs::read_to_string(file) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: cannot read '{}': {}", file.display(), e);
            return 1;
        }
    };
    let rule: CategoryRule = match serde_json::from_str(&contents) {
        Ok(rule) => rule,
        Err(e) => {
            eprintln!("Error: invalid rule: {}", e);
            return 1;
        }
    };
    match api.set_rule(&rule) {
        Ok(()) => {
            println!("Rule for '{}' saved", rule.sub_category);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_rules_delete(api: &MateriaApi, sub_category: &str) -> i32 {
    match api.delete_rule(sub_category) {
        Ok(true) => {
            println!("Rule for '{}' deleted", sub_category);
            0
        }
        Ok(false) => {
            eprintln!("Error: no rule for '{}'", sub_category);
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_move(api: &MateriaApi, node_id: &str, target_parent_id: &str) -> i32 {
    match api.move_node(node_id, target_parent_id) {
        Ok(()) => {
            println!("Node '{}' will rebuild under '{}'", node_id, target_parent_id);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_enrich(api: &MateriaApi) -> i32 {
    let job = match api.start_enrichment() {
        Ok(job) => job,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    loop {
        let Some(progress) = api.enrichment_job(job) else {
            eprintln!("Error: enrichment job vanished");
            return 1;
        };
        match progress.status {
            JobStatus::Done => {
                println!(
                    "Enrichment done: {}/{} processed, {} errors",
                    progress.processed, progress.total, progress.errors
                );
                return 0;
            }
            JobStatus::Failed => {
                eprintln!("Enrichment failed (is an LLM endpoint configured?)");
                return 1;
            }
            _ => {
                println!("Enriching {}/{} ...", progress.current, progress.total);
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "materia=info".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let api = match open_api(cli.db, cli.registry_key, cli.llm_endpoint) {
        Ok(api) => api,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Ingest { file, session } => cmd_ingest(&api, &file, session).await,
        Commands::Tree { sub_category } => cmd_tree(&api, sub_category.as_deref()),
        Commands::Results => cmd_results(&api),
        Commands::Rules { action } => match action {
            RulesAction::List => cmd_rules_list(&api),
            RulesAction::Set { file } => cmd_rules_set(&api, &file),
            RulesAction::Delete { sub_category } => cmd_rules_delete(&api, &sub_category),
        },
        Commands::Move {
            node_id,
            target_parent_id,
        } => cmd_move(&api, &node_id, &target_parent_id),
        Commands::Enrich => cmd_enrich(&api).await,
    };
    std::process::exit(code);
}
