use clap::{Parser, Subcommand};
use edge_promo_app::{
    config::{CompileConfig, LoggingConfig},
    logging,
    service::CompilerService,
    source::FixtureSource,
    usage::InMemoryUsageLedger,
};
use serde::Serialize;

mod compile;
mod evaluate;

#[derive(Debug, Parser)]
#[command(
    name = "edge-promo",
    about = "Compile and evaluate restaurant promotions for offline terminals",
    long_about = None
)]
pub(crate) struct Cli {
    #[command(flatten)]
    logging: LoggingConfig,

    #[command(flatten)]
    compile: CompileConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compile the promotion documents of one store
    CompileStore(compile::CompileStoreArgs),

    /// Compile every active store of the company
    CompileCompany,

    /// Evaluate a fixture bill against its store's documents
    Evaluate(evaluate::EvaluateArgs),
}

type Service = CompilerService<FixtureSource, InMemoryUsageLedger>;

impl Cli {
    pub(crate) async fn run(self) -> Result<(), String> {
        logging::init_subscriber(&self.logging)
            .map_err(|error| format!("failed to initialise logging: {error}"))?;

        let source = FixtureSource::load(self.compile.fixtures_dir.clone(), &self.compile.set)
            .await
            .map_err(|error| format!("failed to load fixture set {}: {error}", self.compile.set))?;

        let service = CompilerService::new(source, InMemoryUsageLedger::new());

        match self.command {
            Commands::CompileStore(args) => compile::store(&service, &self.compile, args).await,
            Commands::CompileCompany => compile::company(&service, &self.compile).await,
            Commands::Evaluate(args) => evaluate::run(&service, args).await,
        }
    }
}

#[expect(
    clippy::print_stdout,
    reason = "command output is JSON on stdout; logs go to stderr"
)]
fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|error| format!("failed to serialise output: {error}"))?;

    println!("{json}");

    Ok(())
}
