//! aws-fail2ban - fail2ban action for AWS WAF IP sets

use anyhow::Result;
use clap::Parser;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

use aws_fail2ban::cli::{Cli, Commands};
use aws_fail2ban::commands;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    // fail2ban captures the output, stdout stays for listings
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .without_time()
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set up logging: {}", err);
    }

    if let Err(err) = run(cli).await {
        error!("{:#}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::Version = cli.command {
        println!("aws-fail2ban {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut resource = commands::open_resource(&cli)?;

    match cli.command {
        Commands::Ban { ip } => commands::ban::run(&mut resource, &ip).await,
        Commands::Unban { ip } => commands::unban::run(&mut resource, &ip).await,
        Commands::List => commands::list::run(&mut resource).await,
        Commands::Flush => commands::flush::run(&mut resource).await,
        Commands::Version => Ok(()),
    }
}
