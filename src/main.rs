use anyhow::Context;
use clap::{Parser, Subcommand};
use fairrank::{
    open_recommender, ActionKind, Interaction, MlpClassifier, ProfileDescription, RankingConfig,
    RelevanceScorer, UserId,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Fairness-aware job recommendations
#[derive(Parser, Debug)]
#[command(name = "fairrank")]
#[command(about = "Fairness-aware job recommendation engine", long_about = None)]
struct Args {
    /// Item pool, one JSON item per line
    #[arg(short, long)]
    pool: PathBuf,

    /// Directory holding the interaction log and profile snapshots
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,

    /// JSON file overriding ranking defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON weights for the hybrid classifier
    #[arg(long)]
    classifier: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a shortlist for a user
    Recommend {
        #[arg(short, long)]
        user: String,

        /// Profile description (JSON) used when the user has no vector yet
        #[arg(long)]
        profile: Option<PathBuf>,
    },
    /// Record a like, pass or shown event
    Interact {
        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        item: String,

        /// like, pass or shown
        #[arg(short, long)]
        action: ActionKind,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // logs go to stderr so stdout stays machine-readable
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("fairrank v{}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => RankingConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RankingConfig::default(),
    };

    let scorer = match &args.classifier {
        Some(path) => {
            let model = MlpClassifier::from_json_file(path)
                .with_context(|| format!("loading classifier {}", path.display()))?;
            RelevanceScorer::with_classifier(Arc::new(model))
        }
        None => RelevanceScorer::new(),
    };

    let engine = open_recommender(&args.pool, &args.data_dir, config, scorer)
        .with_context(|| format!("opening pool {}", args.pool.display()))?;

    match args.command {
        Command::Recommend { user, profile } => {
            let description = match profile {
                Some(path) => {
                    let raw = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    Some(serde_json::from_str::<ProfileDescription>(&raw)?)
                }
                None => None,
            };

            let rec = engine.recommend(&UserId::from(user), description.as_ref())?;
            info!(
                scoring = ?rec.scoring_mode,
                rerank = ?rec.rerank_mode,
                profile = ?rec.profile_source,
                "shortlist ready"
            );
            println!("{}", serde_json::to_string_pretty(&rec.shortlist)?);
        }
        Command::Interact { user, item, action } => {
            let outcome = engine.record_interaction(Interaction::new(user, item, action))?;
            info!(?outcome, "interaction recorded");
        }
    }

    Ok(())
}
