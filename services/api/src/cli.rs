use crate::demo::{run_demo, run_import, DemoArgs, ImportArgs};
use crate::infra::SeedArgs;
use crate::server;
use clap::{Args, Parser, Subcommand};
use talent_ratings::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Talent Ratings",
    about = "Run and demonstrate the multi-rater performance rating engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk a response export through live scoring, generation and the talent grid
    Demo(DemoArgs),
    /// Generate ratings for a response export and print the bulk summary as JSON
    Import(ImportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Start with an empty store instead of the seeded cycle
    #[arg(long)]
    pub(crate) empty: bool,
    #[command(flatten)]
    pub(crate) seed: SeedArgs,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args).await,
        Command::Import(args) => run_import(args).await,
    }
}
