use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use xrspace_environment::{
    BootstrapOrder, Environment, EnvironmentConfig, EnvironmentKind, InputScript,
    RapierPhysicsProvider, ScriptPlayer, SimulatedXrRuntime,
};
use xrspace_tools::SceneInspector;

#[derive(Parser)]
#[command(name = "xrspace-cli", about = "CLI for headless xrspace sessions")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Variant {
    Immersive,
    Basic,
}

impl From<Variant> for EnvironmentKind {
    fn from(v: Variant) -> Self {
        match v {
            Variant::Immersive => EnvironmentKind::Immersive,
            Variant::Basic => EnvironmentKind::Basic,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Print the default configuration as YAML
    Config {
        #[arg(long, value_enum, default_value = "immersive")]
        variant: Variant,
    },
    /// Bootstrap an environment and replay an input script against it
    Simulate {
        /// YAML environment config
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// JSON input script
        #[arg(short, long)]
        script: Option<PathBuf>,
        /// Override the config's variant
        #[arg(long, value_enum)]
        variant: Option<Variant>,
        /// Seconds of scene time to run; defaults to the script plus one bullet lifetime
        #[arg(long)]
        seconds: Option<f64>,
        /// Fixed step in seconds
        #[arg(long, default_value = "0.016666668")]
        dt: f32,
        /// Skip the demo world
        #[arg(long)]
        no_demo: bool,
        /// Print every node after the run
        #[arg(long)]
        list_nodes: bool,
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("xrspace-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", xrspace_common::crate_info());
            println!("physics: {}", xrspace_physics::crate_info());
            println!("scene: {}", xrspace_scene::crate_info());
            println!("input: {}", xrspace_input::crate_info());
            println!("avatar: {}", xrspace_avatar::crate_info());
            println!("environment: {}", xrspace_environment::crate_info());
            println!("tools: {}", xrspace_tools::crate_info());
        }
        Commands::Config { variant } => {
            let config = EnvironmentConfig {
                variant: variant.into(),
                ..EnvironmentConfig::default()
            };
            print!("{}", config.to_yaml()?);
        }
        Commands::Simulate {
            config,
            script,
            variant,
            seconds,
            dt,
            no_demo,
            list_nodes,
            json,
        } => {
            anyhow::ensure!(dt.is_finite() && dt > 0.0, "dt must be positive, got {dt}");

            let mut config = match &config {
                Some(path) => EnvironmentConfig::load(path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => EnvironmentConfig::default(),
            };
            if let Some(variant) = variant {
                config.variant = variant.into();
            }
            if no_demo {
                config.demo.enabled = false;
            }
            let script = match &script {
                Some(path) => InputScript::load(path)
                    .with_context(|| format!("loading script {}", path.display()))?,
                None => InputScript::default(),
            };
            let seconds = seconds.unwrap_or(script.duration() + config.bullet_lifetime);

            let mut env = Environment::new(config)?;
            let _ready = env.on_ready(|flags| {
                tracing::info!(physics = flags.physics_ready, xr = flags.xr_ready, "ready")
            });
            let physics = RapierPhysicsProvider::new(env.config().physics);
            let xr = SimulatedXrRuntime::new();
            pollster::block_on(async {
                match env.config().bootstrap {
                    BootstrapOrder::PhysicsFirst => {
                        env.initialize_physics(&physics).await?;
                        env.initialize_xr(&xr).await.map(|_| ())
                    }
                    BootstrapOrder::XrFirst => {
                        env.initialize_xr(&xr).await?;
                        env.initialize_physics(&physics).await
                    }
                }
            })?;
            if let Some(demo) = env.build_demo()? {
                tracing::info!(spheres = demo.spheres.len(), "demo world built");
            }

            let mut player = ScriptPlayer::new(script);
            let summary = env.run_script(&mut player, seconds, dt)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "Ran {:.2}s in {} ticks: {} controller events, {} moves, {} turns, {} shots, {} avatar collisions",
                    summary.clock,
                    summary.ticks,
                    summary.controller_events,
                    summary.moves,
                    summary.turns,
                    summary.shots,
                    summary.avatar_collisions
                );
                let p = summary.avatar_position;
                println!("Avatar at ({:.2}, {:.2}, {:.2})", p.x, p.y, p.z);
            }

            let scene = env.scene().borrow();
            println!("{}", SceneInspector::summary(&scene));
            if list_nodes {
                for id in SceneInspector::list_nodes(&scene) {
                    if let Some(info) = SceneInspector::inspect_node(&scene, id) {
                        println!("  {info}");
                    }
                }
            }
        }
    }

    Ok(())
}
