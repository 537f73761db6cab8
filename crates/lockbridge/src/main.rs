mod cli;
mod commands;
mod error;
mod sim;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use lockbridge_config::Defaults;

use crate::cli::{Cli, Command, GlobalOpts, LogFormat};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// Install the stderr subscriber. stdout is reserved for the protocol.
fn init_tracing(global: &GlobalOpts, defaults: &Defaults) {
    let level = match global.verbose {
        0 => defaults.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let json = global
        .log_format
        .map_or(defaults.log_format == "json", |f| f == LogFormat::Json);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(lockbridge_config::config_path)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Serve(args) => {
            let cfg = lockbridge_config::load_config_from(&config_file(&cli.global))?;
            init_tracing(&cli.global, &cfg.defaults);
            commands::serve::handle(args, &cfg).await
        }

        // Config commands must keep working when the file itself is broken
        Command::Config(args) => {
            init_tracing(&cli.global, &Defaults::default());
            commands::config_cmd::handle(args, &config_file(&cli.global))
        }

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "lockbridge", &mut std::io::stdout());
            Ok(())
        }
    }
}
