use clap::Parser;
use std::path::PathBuf;
use warden_app_server::run_main;
use warden_core::ConfigOverrides;
use warden_protocol::ExecutionMode;

#[derive(Debug, Parser)]
struct AppServerArgs {
    /// Global execution mode: assisted, yolo or whitelist.
    #[arg(long = "mode", value_name = "MODE")]
    mode: Option<ExecutionMode>,

    /// Directory holding the mission snapshot.
    #[arg(long = "data-dir", value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Bytes of output kept per stream.
    #[arg(long = "max-output-bytes", value_name = "BYTES")]
    max_output_bytes: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = AppServerArgs::parse();
    run_main(ConfigOverrides {
        execution_mode: args.mode,
        data_dir: args.data_dir,
        max_output_bytes: args.max_output_bytes,
    })
    .await
}
