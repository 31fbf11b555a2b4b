mod cli;
mod paths;
mod run;
mod still;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Check(args)) => run::check(args),
        Some(Command::Still(args)) => still::run(args),
        None => run::run(cli.run),
    }
}
