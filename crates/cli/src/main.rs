use clap::Parser;
use stac_map_cli::StacMap;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = StacMap::parse();
    match args.run(true).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ERROR: {err:#}");
            ExitCode::FAILURE
        }
    }
}
