use clap::{Parser, Subcommand};

mod commands;
mod utils;

/// Consumer and producer command-line interfaces for the µDCN bulk
/// file-transfer stack.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Enable debug-level logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover and fetch files served under a producer's name prefix.
    Consumer(commands::consumer::ConsumerArgs),

    /// Serve a directory tree's metadata and content segments.
    Producer(commands::producer::ProducerArgs),

    /// Run a self-contained producer/consumer round trip over an
    /// in-process transport, without a forwarder.
    Demo(commands::demo::DemoArgs),
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "info" }),
    )
    .init();

    let code = match cli.command {
        Commands::Consumer(args) => commands::consumer::run(args),
        Commands::Producer(args) => commands::producer::run(args),
        Commands::Demo(args) => commands::demo::run(args),
    };

    std::process::exit(code);
}
