use std::path::Path;
use std::time::Duration;

use clap::Parser;
use pennant_telemetry::{EnvSource, PreferenceStore, TelemetryReporter, TelemetrySettings};
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod commands;

/// Packages whose installed versions are included in telemetry.
const TRACKED_PACKAGES: [&str; 3] = ["@pennant/core", "@pennant/auth", "@pennant/fields-document"];

/// How long in-flight telemetry may finish after the command completes.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "pennant", about = "Pennant project tooling", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Manage anonymous usage telemetry
    Telemetry {
        #[command(subcommand)]
        action: TelemetryAction,
    },
    /// Report a usage event for a CLI action
    Send {
        /// Event type (e.g. "dev", "build")
        event_type: String,
        /// Project directory
        #[arg(long, default_value = ".")]
        cwd: String,
        /// Database provider label (e.g. "postgresql")
        #[arg(long)]
        db_provider: Option<String>,
        /// Number of lists in the project schema
        #[arg(long)]
        lists: Option<usize>,
        /// Total number of fields across lists
        #[arg(long, requires = "lists")]
        fields: Option<usize>,
    },
}

#[derive(clap::Subcommand)]
enum TelemetryAction {
    /// Show whether telemetry is enabled
    Status,
    /// Opt in to telemetry
    Enable,
    /// Opt out of telemetry
    Disable,
    /// Forget the stored opt-out and notice
    Reset,
    /// Print the payload that would be sent
    Preview {
        /// Project directory
        #[arg(long, default_value = ".")]
        cwd: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = TelemetrySettings::from_environment()
        .with_runtime_version(env!("CARGO_PKG_VERSION"))
        .with_tracked_packages(TRACKED_PACKAGES);
    // Child tools inherit the opt-out; must happen before the runtime starts threads.
    settings.export_to_process();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(cli, settings, &EnvSource::Process));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

/// Open the user's preference store. A store that cannot be read is replaced
/// by an empty one at the same path so the telemetry commands can rewrite it.
fn open_store(env: &EnvSource) -> PreferenceStore {
    match PreferenceStore::open_default(env) {
        Ok(store) => store,
        Err(e) => {
            warn!(error = %e, "ignoring unreadable preference store");
            PreferenceStore::default_path(env)
                .map(PreferenceStore::empty_at)
                .unwrap_or_else(PreferenceStore::in_memory)
        }
    }
}

async fn run(cli: Cli, settings: TelemetrySettings, env: &EnvSource) -> anyhow::Result<()> {
    let mut store = open_store(env);
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Commands::Telemetry { action } => match action {
            TelemetryAction::Status => {
                commands::telemetry::status(&store, &settings, env, &mut stdout)?;
            }
            TelemetryAction::Enable => {
                commands::telemetry::enable(&mut store, env, &mut stdout)?;
            }
            TelemetryAction::Disable => {
                commands::telemetry::disable(&mut store, &mut stdout)?;
            }
            TelemetryAction::Reset => {
                commands::telemetry::reset(&mut store, &mut stdout)?;
            }
            TelemetryAction::Preview { cwd } => {
                let reporter = TelemetryReporter::new();
                commands::telemetry::preview(
                    &reporter,
                    &settings,
                    env,
                    Path::new(&cwd),
                    &mut stdout,
                )?;
            }
        },
        Commands::Send {
            event_type,
            cwd,
            db_provider,
            lists,
            fields,
        } => {
            let args = commands::send::SendArgs {
                event_type: &event_type,
                cwd: Path::new(&cwd),
                db_provider: db_provider.as_deref(),
                lists,
                fields,
            };
            let reporter = TelemetryReporter::new();
            let mut stderr = std::io::stderr().lock();
            commands::send::run(&args, &mut store, &reporter, &settings, &mut stderr)?;
        }
    }

    Ok(())
}
