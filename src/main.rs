//! navlaunch CLI: declarative navigation bringup.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "navlaunch",
    version,
    about = "Declarative robot navigation bringup with templated parameters and conditional sub-plans"
)]
struct Cli {
    /// Log filter (tracing directives); RUST_LOG takes precedence
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: navlaunch::cli::Commands,
}

fn main() {
    let cli = Cli::parse();
    navlaunch::logging::init_logging(cli.log_level.as_deref());
    if let Err(e) = navlaunch::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
