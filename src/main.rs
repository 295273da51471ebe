// Entrypoint for the CLI application.
// - Keeps `main` small: resolve config, open a session, hand it to the loop.
// - Every failure is returned from `main`, so the process prints the error
//   chain and exits non-zero.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rbdecide::config::{Config, Settings};
use rbdecide::ui::{write_answers, ManualAsker, Mode, SelectAsker, SpinnerSession};
use rbdecide::{make_decision, start_session, RainbirdClient};

/// Answer Rainbird's questions until it reaches a decision.
#[derive(Parser, Debug)]
#[command(name = "rbdecide")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subject of the initial query
    #[arg(long, default_value = "Fred")]
    subject: String,

    /// Relationship of the initial query
    #[arg(long, default_value = "speaks")]
    relationship: String,

    /// Object of the initial query (empty asks the engine to find it)
    #[arg(long, default_value = "")]
    object: String,

    /// How questions are asked
    #[arg(long, value_enum, default_value_t = Mode::Manual)]
    mode: Mode,

    #[command(flatten)]
    settings: Settings,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::from_env(&cli.settings)?;

    let client = RainbirdClient::from_config(&config)?;
    let mut session = start_session(&client, &config)?;

    let answers = match cli.mode {
        Mode::Manual => make_decision(
            &mut session,
            &mut ManualAsker::stdio(),
            &cli.subject,
            &cli.relationship,
            &cli.object,
        )?,
        Mode::Select => make_decision(
            &mut SpinnerSession::new(session),
            &mut SelectAsker::default(),
            &cli.subject,
            &cli.relationship,
            &cli.object,
        )?,
    };

    write_answers(&mut std::io::stdout().lock(), &answers)?;
    Ok(())
}
