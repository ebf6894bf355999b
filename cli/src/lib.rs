//! herbtrace command-line surface.
//!
//! Translates commands into gateway and resolver calls on the core engine and
//! maps failures to exit codes (see [`exit_code`]).
//!
//! ## Commands
//!
//! - `herbtrace collect --actor <ID> --species <S> --quantity <KG> --method <M> --lat <LAT> --lng <LNG>`
//! - `herbtrace transport --from <TOKEN> --quantity <KG> --destination <D> ...`
//! - `herbtrace process --from <TOKEN> --received <KG> --output <KG> --method <M> ...`
//! - `herbtrace lab --from <TOKEN> --quantity <KG> --test-type <T> --result <R> ...`
//! - `herbtrace trace <TOKEN>`
//! - `herbtrace token decode <TOKEN>` / `herbtrace token encode --kind <KIND> --id <UUID>`

pub mod exit_code;
pub mod render;
mod stage_cmd;
mod token_cmd;

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use herbtrace_core::{Backend, Herbtrace, HerbtraceConfig};

pub use stage_cmd::{CollectArgs, LabArgs, LocationArgs, ProcessArgs, SubmitArgs, TransportArgs};
pub use token_cmd::{TokenCli, TokenSubcommand};

/// Record and trace chain-of-custody for harvested botanicals.
#[derive(Debug, Parser)]
#[command(name = "herbtrace", version, about)]
pub struct Cli {
    /// Config file (default: $HERBTRACE_CONFIG or ~/.config/herbtrace/config.toml).
    #[arg(long = "config", global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Record database; overrides `db_path` from the config file.
    #[arg(long = "db", global = true, env = "HERBTRACE_DB", value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Output as JSON.
    #[arg(long = "json", short = 'j', global = true)]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(long = "verbose", short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Record a harvested lot. Starts a new chain.
    Collect(CollectArgs),
    /// Record a transport leg for a collection.
    Transport(TransportArgs),
    /// Record the processing step for a collection.
    Process(ProcessArgs),
    /// Record the laboratory test for a collection.
    Lab(LabArgs),
    /// Reconstruct the chain any token belongs to.
    Trace(TraceArgs),
    /// Encode or decode record tokens.
    Token(TokenCli),
}

#[derive(Debug, clap::Args)]
pub struct TraceArgs {
    /// Token of any record in the chain.
    #[arg(value_name = "TOKEN")]
    pub token: String,
}

impl Cli {
    /// Run the selected command and return the process exit code.
    pub fn run(self) -> i32 {
        match self.execute() {
            Ok(()) => exit_code::SUCCESS,
            Err(err) => {
                let code = exit_code::for_error(&err);
                tracing::debug!(code, error = ?err, "Command failed");
                eprintln!("error: {err:#}");
                code
            }
        }
    }

    fn execute(self) -> anyhow::Result<()> {
        let json = self.json;

        if let Command::Token(token) = &self.command
            && let TokenSubcommand::Decode(args) = &token.command
        {
            return token_cmd::decode(args, json);
        }

        let config = self.load_config()?;
        match self.command {
            Command::Token(token) => token.run(&config, json),
            Command::Trace(args) => {
                let engine = open_engine(&config)?;
                cmd_trace(&engine, &args, json)
            }
            Command::Collect(args) => {
                let engine = open_engine(&config)?;
                stage_cmd::submit(&engine, args.into_submission(), json)
            }
            Command::Transport(args) => {
                let engine = open_engine(&config)?;
                stage_cmd::submit(&engine, args.into_submission(), json)
            }
            Command::Process(args) => {
                let engine = open_engine(&config)?;
                stage_cmd::submit(&engine, args.into_submission(), json)
            }
            Command::Lab(args) => {
                let engine = open_engine(&config)?;
                stage_cmd::submit(&engine, args.into_submission(), json)
            }
        }
    }

    fn load_config(&self) -> anyhow::Result<HerbtraceConfig> {
        let mut config =
            HerbtraceConfig::load(self.config.as_deref()).context("loading configuration")?;
        if let Some(db) = &self.db {
            config.db_path = db.to_string_lossy().into_owned();
            config.backend = Backend::Sqlite;
        }
        Ok(config)
    }
}

fn open_engine(config: &HerbtraceConfig) -> anyhow::Result<Herbtrace> {
    Herbtrace::open(config).with_context(|| {
        format!(
            "opening record store at {}",
            config.resolved_db_path().display()
        )
    })
}

fn cmd_trace(engine: &Herbtrace, args: &TraceArgs, json: bool) -> anyhow::Result<()> {
    let view = engine
        .resolve(&args.token)
        .with_context(|| format!("tracing {}", args.token.trim()))?;

    if json {
        print_json(&render::chain_json(&view, engine.codec()))?;
    } else {
        print!("{}", render::chain_text(&view, engine.codec()));
    }
    Ok(())
}

pub(crate) fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value).context("serializing output")?;
    println!("{text}");
    Ok(())
}

/// Install the stderr log subscriber. `RUST_LOG` wins unless `-v` was given.
pub fn init_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
