use std::path::PathBuf;

use clap::Parser;
use warden_app_server::init_tracing;
use warden_app_server::load_config;
use warden_app_server::run_with_io;
use warden_core::Config;
use warden_core::ConfigOverrides;
use warden_core::detect_available;
use warden_protocol::ExecutionMode;

mod exec_cmd;
mod missions_cmd;

use crate::exec_cmd::ExecCommand;
use crate::missions_cmd::MissionsCli;

/// Warden host agent
///
/// Runs shell commands under mission permissions and approval modes. If no
/// subcommand is given, the stdio server starts.
#[derive(Debug, Parser)]
#[clap(author, version, bin_name = "warden")]
struct MultitoolCli {
    #[clap(flatten)]
    overrides: OverrideArgs,

    #[clap(subcommand)]
    subcommand: Option<Subcommand>,
}

/// Flags that take precedence over `config.toml`.
#[derive(Debug, Default, clap::Args)]
struct OverrideArgs {
    /// Global execution mode: assisted, yolo or whitelist.
    #[arg(long = "mode", value_name = "MODE", global = true)]
    mode: Option<ExecutionMode>,

    /// Directory holding the mission snapshot.
    #[arg(long = "data-dir", value_name = "DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Bytes of output kept per stream.
    #[arg(long = "max-output-bytes", value_name = "BYTES", global = true)]
    max_output_bytes: Option<usize>,
}

impl From<OverrideArgs> for ConfigOverrides {
    fn from(args: OverrideArgs) -> Self {
        Self {
            execution_mode: args.mode,
            data_dir: args.data_dir,
            max_output_bytes: args.max_output_bytes,
        }
    }
}

#[derive(Debug, clap::Subcommand)]
enum Subcommand {
    /// Serve line-delimited JSON requests on stdin/stdout (default).
    Serve,

    /// Run one command under the policy engine and exit with its code.
    #[clap(visible_alias = "e")]
    Exec(ExecCommand),

    /// List the shells detected on this host.
    Shells,

    /// Inspect stored missions.
    Missions(MissionsCli),
}

fn main() -> anyhow::Result<()> {
    let cli = MultitoolCli::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let code = runtime.block_on(cli_main(cli))?;
    // Let in-flight mirror requests finish before exiting.
    runtime.shutdown_timeout(std::time::Duration::from_secs(1));
    std::process::exit(code);
}

async fn cli_main(cli: MultitoolCli) -> anyhow::Result<i32> {
    let (config, warnings) = load_config(cli.overrides.into())?;
    match cli.subcommand {
        None | Some(Subcommand::Serve) => {
            init_logging(&config, &config.log_level, &warnings);
            let shells = detect_available();
            run_with_io(config, shells, tokio::io::stdin(), tokio::io::stdout()).await?;
            Ok(0)
        }
        Some(Subcommand::Exec(cmd)) => {
            init_logging(&config, "warn", &warnings);
            exec_cmd::run(cmd, config).await
        }
        Some(Subcommand::Shells) => {
            init_logging(&config, "warn", &warnings);
            for (shell, prefix) in detect_available().iter() {
                println!("{shell}\t{}", prefix.join(" "));
            }
            Ok(0)
        }
        Some(Subcommand::Missions(cmd)) => {
            init_logging(&config, "warn", &warnings);
            missions_cmd::run(cmd, &config)
        }
    }
}

/// `RUST_LOG` wins; otherwise `default_level` applies.
fn init_logging(config: &Config, default_level: &str, warnings: &[String]) {
    init_tracing(default_level);
    for warning in warnings {
        tracing::error!("{warning}");
    }
    tracing::debug!(home = %config.warden_home.display(), "configuration loaded");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn global_flags_become_overrides() {
        let cli = MultitoolCli::parse_from([
            "warden",
            "missions",
            "list",
            "--mode",
            "whitelist",
            "--data-dir",
            "/tmp/warden-data",
        ]);
        let overrides = ConfigOverrides::from(cli.overrides);
        assert_eq!(overrides.execution_mode, Some(ExecutionMode::Whitelist));
        assert_eq!(overrides.data_dir, Some(PathBuf::from("/tmp/warden-data")));
        assert_eq!(overrides.max_output_bytes, None);
    }

    #[test]
    fn no_subcommand_serves() {
        let cli = MultitoolCli::parse_from(["warden"]);
        assert!(cli.subcommand.is_none());
    }
}
