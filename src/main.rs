use anyhow::Context;
use clap::Parser;
use codegen_writeback::{
    CliArgs, LoggingConfig, MirrorConfig, init_logging, mirror_tree, mirror_tree_async,
    write_report,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = init_logging(LoggingConfig::from_env())?;

    let cli = CliArgs::parse();
    let config = MirrorConfig::from_args(cli)?;

    // Fail before touching the destination tree
    config.validate()?;

    let report = if config.cooperative {
        mirror_tree_async(&config).await?
    } else {
        let blocking_config = config.clone();
        tokio::task::spawn_blocking(move || mirror_tree(&blocking_config))
            .await
            .context("mirror task panicked")??
    };

    if let Some(path) = config.report.as_deref() {
        write_report(&report, path)?;
    }

    println!("{report}");
    anyhow::ensure!(report.failed() == 0, "{} file(s) failed", report.failed());
    Ok(())
}
