use clap::Parser;
use prompt_chain::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_dir = cli.config_dir.as_str();

    match cli.command {
        Command::Execute(args) => cli::execute::run(args, config_dir).await,
        Command::Answer(args) => cli::execute::answer(args, config_dir).await,
        Command::Analyze(args) => cli::analyze::run(args, config_dir).await,
        Command::Validate(args) => cli::analyze::validate(args, config_dir).await,
        Command::Workflows(args) => cli::workflows::run(args, config_dir).await,
        Command::Chains => cli::chains::run(config_dir).await,
    }
}
