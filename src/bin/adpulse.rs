use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "adpulse", about = "Daily ad performance reports for agency brands")]
struct Cli {
    /// Database path (default: ~/.adpulse/adpulse.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Listen address (default: ADPULSE_LISTEN_ADDR or 127.0.0.1:8080)
        #[arg(long)]
        addr: Option<SocketAddr>,
    },
    /// Generate (or fetch the cached) daily report for a brand
    Report {
        /// Brand ID
        brand_id: String,
        /// User the report is generated for
        #[arg(long)]
        user: String,
        /// IANA timezone, e.g. America/New_York (default: UTC)
        #[arg(long)]
        timezone: Option<String>,
        /// Ignore the cached report
        #[arg(long)]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the aggregated metrics for a brand
    Analyze {
        /// Brand ID
        brand_id: String,
        /// Date (YYYY-MM-DD, default: today in UTC)
        #[arg(long)]
        date: Option<String>,
    },
    /// Import brands, connections and Meta metrics from a JSON snapshot
    Import {
        /// Snapshot file
        file: PathBuf,
    },
    /// Manage API sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show database status
    Status,
}

#[derive(Subcommand)]
enum SessionAction {
    /// Create a bearer token for a user
    Create {
        user_id: String,
        /// Lifetime in hours
        #[arg(long, default_value = "720")]
        ttl_hours: i64,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = adpulse::Config::from_env()?;
    if let Some(path) = &cli.db {
        config.db_path = Some(PathBuf::from(path));
    }

    let db = match &config.db_path {
        Some(path) => adpulse::Database::open_at(path).await?,
        None => adpulse::Database::open().await?,
    };

    match cli.command {
        Commands::Serve { addr } => {
            let addr = addr.unwrap_or(config.listen_addr);
            let app = build_app(db, config).await?;
            adpulse::server::serve(Arc::new(app), addr).await?;
        }
        Commands::Report {
            brand_id,
            user,
            timezone,
            force,
            json,
        } => {
            let app = build_app(db, config).await?;
            let request = adpulse::DailyReportRequest {
                brand_id,
                force_regenerate: force,
                user_timezone: timezone,
            };
            let outcome = app.daily_report(&user, request).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_report(&outcome);
            }
        }
        Commands::Analyze { brand_id, date } => {
            let date = match date {
                Some(d) => chrono::NaiveDate::parse_from_str(&d, "%Y-%m-%d")
                    .map_err(|e| anyhow::anyhow!("invalid date {d}: {e}"))?,
                None => chrono::Utc::now().date_naive(),
            };
            let app = adpulse::AdPulse::new(db, config)?;
            let analysis = app.analyze(&brand_id, date).await?;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
        Commands::Import { file } => {
            let raw = std::fs::read_to_string(&file)
                .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", file.display()))?;
            let snapshot: adpulse::models::Snapshot = serde_json::from_str(&raw)?;
            let app = adpulse::AdPulse::new(db, config)?;
            let summary = app.import_snapshot(snapshot).await?;
            println!("Imported:");
            println!("  Brands:        {}", summary.brands);
            println!("  Connections:   {}", summary.connections);
            println!("  Campaigns:     {}", summary.campaigns);
            println!("  Ad insights:   {}", summary.ad_insights);
            println!("  Daily stats:   {}", summary.daily_stats);
            println!("  Demographics:  {}", summary.demographics);
            println!("  Devices:       {}", summary.devices);
        }
        Commands::Session { action } => match action {
            SessionAction::Create { user_id, ttl_hours } => {
                let token =
                    adpulse::auth::create_session(&db, &user_id, chrono::Duration::hours(ttl_hours))
                        .await?;
                println!("{token}");
            }
        },
        Commands::Config { action } => {
            let app = adpulse::AdPulse::new(db, config)?;
            handle_config(&app, action).await?;
        }
        Commands::Status => {
            let app = adpulse::AdPulse::new(db, config)?;
            println!("Database Status");
            for (table, count) in app.status().await? {
                println!("  {table:<28} {count}");
            }
        }
    }

    Ok(())
}

async fn build_app(db: adpulse::Database, config: adpulse::Config) -> anyhow::Result<adpulse::AdPulse> {
    let writer = adpulse::llm::create_writer(&db, &config).await?;
    match &writer {
        Some(w) => log::info!("Executive summaries by {}", w.describe()),
        None => log::info!("No LLM configured; reports use the built-in narrative only"),
    }
    Ok(adpulse::AdPulse::new(db, config)?.with_writer(writer))
}

fn print_report(outcome: &adpulse::DailyReportOutcome) {
    let report = &outcome.report;
    println!(
        "{} · {} ({}){}",
        report.brand_id,
        report.date,
        report.health,
        if outcome.cached { " [cached]" } else { "" }
    );
    println!();
    println!("{}", report.headline);
    println!("{}", report.summary);

    if !report.insights.is_empty() {
        println!();
        for insight in &report.insights {
            println!("  • {insight}");
        }
    }

    if !report.analysis.issues.is_empty() {
        println!();
        println!("Issues:");
        for issue in &report.analysis.issues {
            println!("  ! {issue}");
        }
    }

    println!();
    println!("Recommendations:");
    for rec in &report.recommendations {
        println!("  [{:?}] {}: {}", rec.priority, rec.title, rec.detail);
    }

    if let Some(ai) = &report.ai_summary {
        println!();
        println!("Executive summary ({}):", ai.model);
        println!("  {}", ai.executive_summary);
        for action in &ai.key_actions {
            println!("  - {action}");
        }
        if let Some(risk) = &ai.risk_note {
            println!("  Risk: {risk}");
        }
    }
}

async fn handle_config(app: &adpulse::AdPulse, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => match app.config_get(&key).await? {
            Some(v) => println!("{key} = {v}"),
            None => println!("{key} is not set"),
        },
        ConfigAction::Set { key, value } => {
            app.config_set(&key, &value).await?;
            println!("Config updated.");
        }
        ConfigAction::List => {
            let items = app.config_list().await?;
            if items.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in items {
                    println!("{k} = {v}");
                }
            }
        }
    }
    Ok(())
}
