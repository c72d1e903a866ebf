mod logging;
mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use importer_engine::Importer;
use importer_logging::{import_error, import_info};

fn main() -> Result<()> {
    let args = settings::CliArgs::parse();
    let mut config = settings::load(&args.config)?;
    if args.dry_run {
        config.dry_run = true;
    }
    logging::initialize(config.verbose, args.log_file.as_deref())?;
    import_info!("Importing with {}", args.config.display());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let report = runtime.block_on(async {
        let mut importer = Importer::from_config(&config)?;
        importer.run().await
    });

    match report {
        Ok(report) => {
            println!("{report}");
            for failure in &report.pipeline.failures {
                import_error!("{}: {}", failure.url, failure.message);
            }
            Ok(())
        }
        Err(err) => Err(err).context("import failed"),
    }
}
