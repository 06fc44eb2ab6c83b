use anyhow::Result;
use clap::Parser;
use conport_import::cli::RootArgs;
use conport_import::logging;
use conport_import::output::render_summary;
use conport_import::store::ConportStore;
use conport_import::workflow::{self, RunConfig};

fn main() -> Result<()> {
    let args = RootArgs::parse();
    logging::init(args.verbose);

    let config = RunConfig::from_args(&args);
    let store = ConportStore::new(config.storage.clone());
    let summary = workflow::run(&config, &store)?;
    println!("{}", render_summary(&summary)?);
    Ok(())
}
