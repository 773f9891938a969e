// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use loan_approval::session::{MSG_BAD_LOGIN, MSG_EMPTY_FIELDS, MSG_TAKEN};
use loan_approval::{
    load_applicants_csv, AppConfig, CredentialStore, ForestModel, Predictor, RawApplicant,
    RegisterOutcome, SqliteUserStore, Verdict,
};

#[derive(Parser)]
#[command(name = "loan-approval", version, about = "Loan approval prediction gate")]
struct Cli {
    /// Config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database with users and audit events
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// JSON model artifact
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// Log level (RUST_LOG overrides)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive terminal UI (default)
    Tui,

    /// Register a new user
    Register {
        username: String,
        #[arg(long)]
        password: String,
    },

    /// List registered usernames
    Users,

    /// Check credentials and predict one applicant
    Predict {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[command(flatten)]
        applicant: ApplicantArgs,
    },

    /// Check credentials and predict every row of a CSV file
    PredictBatch {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        csv: PathBuf,
    },

    /// Show a user's audit trail
    History { username: String },
}

#[derive(Args)]
struct ApplicantArgs {
    #[arg(long, default_value = "Male")]
    gender: String,
    #[arg(long, default_value = "Yes")]
    married: String,
    #[arg(long, default_value = "0")]
    dependents: String,
    #[arg(long, default_value = "Graduate")]
    education: String,
    #[arg(long, default_value = "Yes")]
    self_employed: String,
    #[arg(long)]
    applicant_income: f64,
    #[arg(long)]
    loan_amount: f64,
    #[arg(long)]
    loan_amount_term: f64,
    #[arg(long, default_value_t = 1.0)]
    credit_history: f64,
    #[arg(long, default_value = "Urban")]
    property_area: String,
}

impl From<ApplicantArgs> for RawApplicant {
    fn from(args: ApplicantArgs) -> Self {
        RawApplicant {
            gender: args.gender,
            married: args.married,
            dependents: args.dependents,
            education: args.education,
            self_employed: args.self_employed,
            applicant_income: args.applicant_income,
            loan_amount: args.loan_amount,
            loan_amount_term: args.loan_amount_term,
            credit_history: args.credit_history,
            property_area: args.property_area,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(model) = cli.model {
        config.model_path = model;
    }

    let command = cli.command.unwrap_or(Commands::Tui);

    // The TUI owns the terminal, so its logs go to a file
    let log_file = matches!(command, Commands::Tui).then_some(config.log_file.as_path());
    init_logging(&cli.log_level, log_file)?;

    match command {
        Commands::Tui => run_ui_mode(&config),
        Commands::Register { username, password } => run_register(&config, &username, &password),
        Commands::Users => run_users(&config),
        Commands::Predict { username, password, applicant } => {
            run_predict(&config, &username, &password, applicant.into())
        }
        Commands::PredictBatch { username, password, csv } => {
            run_predict_batch(&config, &username, &password, &csv)
        }
        Commands::History { username } => run_history(&config, &username),
    }
}

fn init_logging(level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::sync::Mutex::new(file)).with_ansi(false))
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}

fn open_store(config: &AppConfig) -> Result<CredentialStore<SqliteUserStore>> {
    let store = SqliteUserStore::open(&config.db_path)?;
    Ok(CredentialStore::new(store))
}

fn load_predictor(config: &AppConfig) -> Result<Predictor> {
    let model = ForestModel::load(&config.model_path)?;
    Ok(Predictor::new(model))
}

fn authenticate(store: &CredentialStore<SqliteUserStore>, username: &str, password: &str) -> Result<()> {
    if !store.login(username, password)? {
        bail!(MSG_BAD_LOGIN);
    }
    Ok(())
}

fn run_register(config: &AppConfig, username: &str, password: &str) -> Result<()> {
    if username.is_empty() || password.is_empty() {
        bail!(MSG_EMPTY_FIELDS);
    }

    let store = open_store(config)?;
    match store.register(username, password)? {
        RegisterOutcome::Registered => println!("✅ User '{}' registered", username),
        RegisterOutcome::AlreadyExists => bail!(MSG_TAKEN),
    }
    Ok(())
}

fn run_users(config: &AppConfig) -> Result<()> {
    let store = open_store(config)?;
    let count = store.storage().count_users()?;
    let users = store.list_users()?;

    println!("👥 {} registered users", count);
    for username in users {
        println!("   {}", username);
    }
    Ok(())
}

fn run_predict(config: &AppConfig, username: &str, password: &str, raw: RawApplicant) -> Result<()> {
    let store = open_store(config)?;
    authenticate(&store, username, password)?;

    let predictor = load_predictor(config)?;
    let verdict = predictor.predict(&raw)?;
    store.record_prediction(username, verdict.as_str());

    println!("{}", verdict.message());
    Ok(())
}

fn run_predict_batch(config: &AppConfig, username: &str, password: &str, csv: &Path) -> Result<()> {
    let store = open_store(config)?;
    authenticate(&store, username, password)?;

    let predictor = load_predictor(config)?;

    println!("📂 Loading applicants from {}...", csv.display());
    let rows = load_applicants_csv(csv)?;

    let (mut approved, mut denied, mut failed) = (0usize, 0usize, 0usize);
    for (index, row) in rows.iter().enumerate() {
        // Header is line 1
        let line = index + 2;
        let result = row
            .as_ref()
            .map_err(|e| e.to_string())
            .and_then(|raw| predictor.predict(raw).map_err(|e| e.to_string()));

        match result {
            Ok(verdict) => {
                store.record_prediction(username, verdict.as_str());
                match verdict {
                    Verdict::Approved => approved += 1,
                    Verdict::Denied => denied += 1,
                }
                println!("  row {:>4}: {}", line, verdict.message());
            }
            Err(e) => {
                failed += 1;
                println!("  row {:>4}: ⚠️  {}", line, e);
            }
        }
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ {} rows: {} approved, {} denied, {} failed", rows.len(), approved, denied, failed);
    Ok(())
}

fn run_history(config: &AppConfig, username: &str) -> Result<()> {
    let store = open_store(config)?;
    let events = store.history(username)?;

    println!("📜 {} events for '{}'", events.len(), username);
    for event in events {
        println!(
            "   {}  {:<16} {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.event_type,
            event.data
        );
    }
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &AppConfig) -> Result<()> {
    println!("🖥️  Loading Loan Approval UI...\n");

    let store = open_store(config)?;
    let predictor = load_predictor(config)?;

    let mut app = ui::App::new(&store, &predictor);
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &AppConfig) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin loan-server --features server");
    std::process::exit(1);
}
