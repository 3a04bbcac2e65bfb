//! dqmctl - DQM warehouse command-line tool
//!
//! - Schema migrations (`migrate up|down|status`)
//! - Extraction of per-lumisection 2D histograms from DQM CSV exports
//! - Loading of ML bad-lumisection facts, skipping already known rows
//! - Browsing histograms through the lookup filter set (`histos`)

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use dqm_core::DqmConfig;
use tracing::debug;

mod commands;
mod tracing_setup;
mod ui;

use commands::Context;

#[derive(Parser, Debug)]
#[command(
    name = "dqmctl",
    author,
    version,
    about = "Bulk-load DQM exports into Postgres and browse lumisection histograms",
    long_about = "Ingest DQM histogram exports and ML bad-lumisection results into the \
                  warehouse tables with COPY, manage the schema, and query 2D histograms \
                  by run, lumisection, title and entries."
)]
struct Cli {
    /// Suppress progress spinners (for script consumption)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Export traces over OTLP (requires the telemetry feature)
    #[arg(long, global = true)]
    otel: bool,

    /// Postgres URL; overrides config, DATABASE_URL and DJANGO_DATABASE_*
    #[arg(long, global = true, value_name = "URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply, revert or inspect schema migrations
    Migrate(commands::migrate::MigrateArgs),
    /// Extract per-lumisection 2D histograms of one run from a DQM CSV export
    #[command(name = "extract-lumisections-histos2d")]
    ExtractLumisectionsHistos2d(commands::ingest::ExtractArgs),
    /// Load ML bad-lumisection results, skipping rows already present
    #[command(name = "load-ml-bad-lumis")]
    LoadMlBadLumis(commands::ingest::LoadArgs),
    /// Browse lumisection 2D histograms
    Histos(commands::histos::HistosArgs),
    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    shell: Shell,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)] // PowerShell is a proper noun, not a suffix
enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_setup::init(&tracing_setup::TracingConfig {
        debug: cli.debug,
        otel: cli.otel,
    })
    .ok();
    ui::init_quiet_mode(cli.quiet);

    dqm_core::config::load_dotenv()?;
    let ctx = Context {
        config: DqmConfig::load(),
        database_url: cli.database_url,
    };
    debug!(config = ?ctx.config, "configuration loaded");

    let result = match cli.command {
        Commands::Migrate(args) => commands::run_migrate(args, &ctx).await,
        Commands::ExtractLumisectionsHistos2d(args) => commands::run_extract(args, &ctx).await,
        Commands::LoadMlBadLumis(args) => commands::run_load_bad_lumis(args, &ctx).await,
        Commands::Histos(args) => commands::run_histos(args, &ctx).await,
        Commands::Completions(args) => run_completions(args),
    };

    tracing_setup::shutdown_otel();
    result
}

fn run_completions(args: CompletionsArgs) -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::{generate, Shell as CompletionShell};
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    let shell = match args.shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    };

    generate(shell, &mut cmd, bin_name, &mut io::stdout());
    Ok(())
}
