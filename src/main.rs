use anyhow::Result;
use clap::Parser;
use keyup::cli::{AppContext, Cli, Commands};
use keyup::infra::logging;

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.log_level, cli.no_color);

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        dry_run: cli.dry_run,
    };

    match cli.command {
        Commands::Check(args) => keyup::check_run(args, &ctx),
        Commands::Update(args) => keyup::update_run(args, &ctx),
        Commands::Export(args) => keyup::export_run(args, &ctx),
        Commands::Init(args) => keyup::infra::config::init(args, &ctx),
        Commands::Completions(args) => keyup::completion::run(args, &ctx),
    }
}
