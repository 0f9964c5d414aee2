mod console;
mod store;
mod trace;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use squat_coach::core_modules::history::RECENT_WORKOUTS;
use squat_coach::core_modules::probability::CLASS_COUNT;
use squat_coach::{
    CoachConfig, CoachPipeline, FeedbackBus, SessionEnd, SessionLoop, StreamSource, WorkoutPlan,
    control_channel,
};
use std::path::{Path, PathBuf};
use store::JsonFileStore;
use trace::TraceClassifier;
use tracing::info;

/// Squat coach trace replayer
///
/// Drives recorded classifier outputs through the rep counter, at display pace,
/// against JSON files standing in for the user store.
#[derive(Parser)]
#[command(name = "squat_replay", version, long_about = None)]
struct Cli {
    /// Directory holding preferences.json and history.json
    #[arg(long, global = true, default_value = "squat_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a user's workout plan
    Configure {
        user: String,

        /// Reps per set
        #[arg(long)]
        reps: u32,

        /// Number of sets
        #[arg(long)]
        sets: u32,
    },

    /// Replay a trace as a workout session
    Run {
        user: String,

        /// JSON-lines file of class probability vectors
        trace: PathBuf,

        /// TOML file with coach settings
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the rest between sets
        #[arg(long)]
        rest_secs: Option<u32>,

        /// Override the countdown before the first classified frame
        #[arg(long)]
        start_countdown_secs: Option<u32>,

        /// Print per-class percentages for every frame
        #[arg(long)]
        labels: bool,
    },

    /// Show the most recent workouts and lifetime totals
    History { user: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let store = JsonFileStore::new(cli.data_dir);

    match cli.command {
        Commands::Configure { user, reps, sets } => {
            let plan = WorkoutPlan::new(reps, sets)?;
            store
                .set_workout_plan(&user, plan)
                .await
                .with_context(|| format!("failed to save the plan in {}", store.dir().display()))?;
            println!("{user}: {reps} reps x {sets} sets");
        }
        Commands::Run {
            user,
            trace,
            config,
            rest_secs,
            start_countdown_secs,
            labels,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(seconds) = rest_secs {
                config.rest_seconds = seconds;
            }
            if let Some(seconds) = start_countdown_secs {
                config.start_countdown_seconds = seconds;
            }
            replay(&store, &user, &trace, config, labels).await?;
        }
        Commands::History { user } => show_history(&store, &user).await?,
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<CoachConfig> {
    let config = match path {
        Some(path) => CoachConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => CoachConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

async fn replay(
    store: &JsonFileStore,
    user: &str,
    trace: &Path,
    config: CoachConfig,
    show_labels: bool,
) -> Result<()> {
    // --- 1. Session Context ---
    let pipeline = CoachPipeline::start(user, store, &config)
        .await
        .with_context(|| format!("cannot start a session for `{user}`"))?;

    // --- 2. Frames & Classifier ---
    let frames = trace::load_trace(trace).await?;
    info!(frames = frames.len(), path = %trace.display(), "trace loaded");
    let source = StreamSource::new(futures::stream::iter(frames));
    let classifier = TraceClassifier::new(CLASS_COUNT);

    // --- 3. Feedback ---
    let bus = FeedbackBus::new(256);
    let printer = tokio::spawn(console::print_events(bus.subscribe(), show_labels));

    // --- 4. Controls ---
    let (control, signals) = control_channel();
    let interrupt = control.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });
    control.start();

    // --- 5. Run ---
    let mut session = SessionLoop::new(source, classifier, bus, config);
    let end = session.run(pipeline, store, signals).await?;
    drop(session);
    printer.await?;

    match end {
        SessionEnd::Completed(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        SessionEnd::Cancelled(counters) => {
            println!(
                "cancelled after {} reps, {} sets left",
                counters.completed_rep_count, counters.sets_remaining
            );
        }
        SessionEnd::SourceExhausted(counters) => {
            println!(
                "trace ended before the workout finished: {} reps done, {} left in this set, {} sets left",
                counters.completed_rep_count, counters.reps_remaining_in_set, counters.sets_remaining
            );
        }
    }
    Ok(())
}

async fn show_history(store: &JsonFileStore, user: &str) -> Result<()> {
    let history = store.history(user).await?;
    if history.is_empty() {
        println!("{user} has no saved workouts");
        return Ok(());
    }

    println!("Recent workouts for {user}:");
    for record in history.recent(RECENT_WORKOUTS) {
        println!(
            "  {}  {:<8} {:>3} reps x {:>2} sets  {:>4}%",
            record.timestamp.format("%Y-%m-%d %H:%M"),
            record.workout_type,
            record.total_reps,
            record.total_sets,
            record.accuracy
        );
    }
    println!(
        "Lifetime: {} workouts, {} sets, {} reps",
        history.len(),
        history.lifetime_sets(),
        history.lifetime_reps()
    );
    if let Some(latest) = history.latest_activity() {
        println!("Last active: {}", latest.format("%Y-%m-%d"));
    }
    Ok(())
}
