use anyhow::Context;
use warden_core::Config;
use warden_protocol::Mission;
use warden_protocol::MissionStatus;
use warden_state::MissionStore;

#[derive(Debug, clap::Parser)]
pub struct MissionsCli {
    #[command(subcommand)]
    pub cmd: MissionsSubcommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum MissionsSubcommand {
    /// List stored missions, most recently updated first.
    List(ListArgs),

    /// Show command counts and durations for one mission.
    Stats(StatsArgs),
}

#[derive(Debug, clap::Parser)]
pub struct ListArgs {
    /// Only missions with this status.
    #[arg(long = "status", value_name = "STATUS")]
    pub status: Option<MissionStatus>,

    /// Output the missions as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, clap::Parser)]
pub struct StatsArgs {
    /// Mission id.
    pub mission_id: String,

    /// Output the stats as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run(cli: MissionsCli, config: &Config) -> anyhow::Result<i32> {
    // Read-only: no backend mirror is attached.
    let store = MissionStore::open(config.missions_path());
    match cli.cmd {
        MissionsSubcommand::List(args) => run_list(&store, args),
        MissionsSubcommand::Stats(args) => run_stats(&store, args),
    }
}

fn run_list(store: &MissionStore, args: ListArgs) -> anyhow::Result<i32> {
    let missions = store.list(args.status);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&missions)?);
        return Ok(0);
    }
    if missions.is_empty() {
        println!("No missions.");
        return Ok(0);
    }
    for line in format_rows(&missions) {
        println!("{line}");
    }
    Ok(0)
}

fn run_stats(store: &MissionStore, args: StatsArgs) -> anyhow::Result<i32> {
    let stats = store
        .stats(&args.mission_id)
        .with_context(|| format!("mission not found: {}", args.mission_id))?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(0);
    }
    println!("mission:   {}", stats.mission_id);
    println!("commands:  {}", stats.total_commands);
    println!("completed: {}", stats.completed);
    println!("failed:    {}", stats.failed);
    println!("other:     {}", stats.other);
    println!("total ms:  {}", stats.total_duration_ms);
    println!("avg ms:    {}", stats.avg_duration_ms);
    Ok(0)
}

fn format_rows(missions: &[Mission]) -> Vec<String> {
    let id_width = missions
        .iter()
        .map(|mission| mission.id.len())
        .max()
        .unwrap_or(0)
        .max("ID".len());
    let mut rows = vec![format!(
        "{:<id_width$}  {:<9}  {:<9}  {:>8}  NAME",
        "ID", "STATUS", "MODE", "COMMANDS"
    )];
    rows.extend(missions.iter().map(|mission| {
        format!(
            "{:<id_width$}  {:<9}  {:<9}  {:>8}  {}",
            mission.id,
            mission.status.to_string(),
            mission.execution_mode.to_string(),
            mission.commands.len(),
            mission.name
        )
    }));
    rows
}
