use std::error::Error;
use std::fs::File;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use diverge_sim::{Action, Config, EpisodeLogger, Simulation};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// How the controlled vehicles pick their actions.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Policy {
    /// Always keep lane and speed.
    Idle,
    /// Pick uniformly among all actions.
    Random,
}

#[derive(Parser)]
#[command(name = "diverge-sim")]
#[command(about = "Runs episodes of the exit ramp traffic simulation")]
struct Cli {
    /// Number of episodes to run
    #[arg(long, default_value = "1")]
    episodes: usize,

    /// Seed of the first episode; later episodes continue the random stream
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, value_enum, default_value = "idle")]
    policy: Policy,

    /// JSON file of configuration overrides
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write the per-tick speed log as CSV
    #[arg(long)]
    log: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => serde_json::from_reader::<_, Config>(File::open(path)?)?,
        None => Config::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    let mut policy_rng = StdRng::seed_from_u64(config.seed.wrapping_add(1));
    let mut sim = Simulation::new(config)?;

    for episode in 0..cli.episodes {
        sim.reset()?;
        let road = sim.road().ok_or("simulation has no road after reset")?;
        let mut logger = EpisodeLogger::new(road);

        loop {
            if let Some(road) = sim.road() {
                logger.record_tick(road);
            }
            let actions = sim
                .controlled_vehicles()
                .iter()
                .map(|_| match cli.policy {
                    Policy::Idle => Action::Idle,
                    Policy::Random => *Action::ALL.choose(&mut policy_rng).unwrap_or(&Action::Idle),
                })
                .collect::<Vec<_>>();
            let step = sim.step(&actions)?;
            log::debug!(
                "t = {:.1} s, rewards {:?}, terminated {:?}",
                step.info.time,
                step.rewards,
                step.terminated
            );
            if step.truncated {
                break;
            }
        }

        let road = sim.road().ok_or("simulation has no road after the episode")?;
        let summary = logger.summary(road, sim.controlled_vehicles());
        log::info!("episode {} finished after {:.1} s", episode, sim.time());
        summary.log();

        if let Some(path) = &cli.log {
            let path = episode_path(path, episode, cli.episodes);
            logger.write_csv(File::create(&path)?)?;
            log::info!("wrote speed log to {}", path.display());
        }
    }
    Ok(())
}

/// Numbers the log file of each episode when more than one is run.
fn episode_path(path: &Path, episode: usize, episodes: usize) -> PathBuf {
    if episodes <= 1 {
        return path.to_path_buf();
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("episode");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}_{}.{}", stem, episode, ext),
        None => format!("{}_{}", stem, episode),
    };
    path.with_file_name(name)
}
