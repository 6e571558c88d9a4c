//! Headless Battle Runner
//!
//! Runs AI vs AI battles on a generated map and reports the result as JSON
//! or text.

use std::process::ExitCode;

use clap::Parser;
use hex_tactics::battle::ai::{load_profile, AiCommander, AiProfile};
use hex_tactics::battle::{
    BattleEventKind, BattleSession, Controller, HexCoord, HexGrid, TemplateLibrary, TerrainCost,
};
use hex_tactics::core::{BattleConfig, Loyalty, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

/// Headless Battle Runner - AI vs AI battles
#[derive(Parser, Debug)]
#[command(name = "battle_runner")]
#[command(about = "Run AI vs AI hex battles and report the outcome")]
struct Args {
    /// Player-side AI profile (loaded from data/ai_profiles/)
    #[arg(long, default_value = "default")]
    player: String,

    /// Enemy-side AI profile (loaded from data/ai_profiles/)
    #[arg(long, default_value = "aggressive")]
    enemy: String,

    /// Template library
    #[arg(long, default_value = "data/templates.toml")]
    templates: String,

    /// Optional battle config TOML
    #[arg(long)]
    config: Option<String>,

    /// Map width in hexes
    #[arg(long, default_value_t = 18)]
    map_width: u32,

    /// Map height in hexes
    #[arg(long, default_value_t = 12)]
    map_height: u32,

    /// Rounds before the battle is called a stalemate
    #[arg(long)]
    max_rounds: Option<u32>,

    /// Share of hexes given rough or blocked terrain
    #[arg(long, default_value_t = 0.15)]
    clutter: f32,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Output format: json or text
    #[arg(long, default_value = "json")]
    format: String,

    /// Print every battle event to stderr
    #[arg(long, short = 'v')]
    verbose: bool,
}

/// JSON output structure
#[derive(Serialize)]
struct BattleResult {
    outcome: String,
    rounds: u32,
    player_survivors: usize,
    enemy_survivors: usize,
    destroyed: usize,
    events: usize,
    player_profile: String,
    enemy_profile: String,
    seed: u64,
}

const PLAYER_LINEUP: [&str; 4] = ["skirmisher", "bombard", "repair_drone", "skirmisher"];
const ENEMY_LINEUP: [&str; 4] = ["skimmer", "skirmisher", "sentry_turret", "bombard"];

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hex_tactics=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(result) => {
            print_result(&args.format, &result);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Battle failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_or_default(name: &str) -> AiProfile {
    load_profile(name).unwrap_or_else(|e| {
        tracing::warn!("Failed to load AI profile '{}': {}; using default", name, e);
        AiProfile::default()
    })
}

fn run(args: &Args) -> Result<BattleResult> {
    let seed = args.seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut config = match &args.config {
        Some(path) => BattleConfig::from_toml_str(&std::fs::read_to_string(path)?)?,
        None => BattleConfig::default(),
    };
    config.seed = seed;
    if let Some(max_rounds) = args.max_rounds {
        config.max_rounds = max_rounds;
    }

    let library = TemplateLibrary::load(&args.templates)?;
    let player_profile = load_or_default(&args.player);
    let enemy_profile = load_or_default(&args.enemy);

    let mut grid = HexGrid::new(args.map_width, args.map_height);
    scatter_terrain(&mut grid, args.clutter, &mut rng);

    let mut session = BattleSession::new(grid, config)?;
    session.add_faction(
        Loyalty::Player,
        Controller::Ai(Box::new(AiCommander::new(player_profile.clone()))),
    )?;
    session.add_faction(
        Loyalty::Enemy,
        Controller::Ai(Box::new(AiCommander::new(enemy_profile.clone()))),
    )?;

    let mid = (args.map_height / 2) as i32;
    let far = args.map_width as i32 - 2;
    deploy(&mut session, &library, Loyalty::Player, &PLAYER_LINEUP, 1, mid)?;
    deploy(&mut session, &library, Loyalty::Enemy, &ENEMY_LINEUP, far, mid)?;

    // Every faction is AI-controlled, so this plays the battle out
    session.start_turn()?;

    if args.verbose {
        for event in session.events() {
            eprintln!("  [{}] {:?}: {}", event.round, event.kind, event.description);
        }
    }

    let destroyed = session
        .events()
        .iter()
        .filter(|e| matches!(e.kind, BattleEventKind::EntityDestroyed { .. }))
        .count();

    Ok(BattleResult {
        outcome: format!("{:?}", session.outcome()),
        rounds: session.round(),
        player_survivors: session.units_of(Loyalty::Player).len(),
        enemy_survivors: session.units_of(Loyalty::Enemy).len(),
        destroyed,
        events: session.events().len(),
        player_profile: player_profile.name,
        enemy_profile: enemy_profile.name,
        seed,
    })
}

/// Rough ground everywhere, walls away from the deployment columns
fn scatter_terrain(grid: &mut HexGrid, clutter: f32, rng: &mut ChaCha8Rng) {
    let width = grid.width() as i32;
    for coord in grid.coords() {
        if coord.x <= 2 || coord.x >= width - 3 || !rng.gen_bool(clutter.clamp(0.0, 1.0) as f64) {
            continue;
        }
        let terrain = match rng.gen_range(0..4) {
            0 => TerrainCost::Blocked,
            1 => TerrainCost::Broken,
            _ => TerrainCost::Uneven,
        };
        grid.set_terrain(coord, terrain);
    }
}

/// Stack a lineup in a column around `mid`
fn deploy(
    session: &mut BattleSession,
    library: &TemplateLibrary,
    loyalty: Loyalty,
    lineup: &[&str],
    x: i32,
    mid: i32,
) -> Result<()> {
    for (i, name) in lineup.iter().enumerate() {
        let sign = if i % 2 == 0 { 1 } else { -1 };
        let offset = sign * 2 * ((i as i32 + 1) / 2);
        session.spawn_named(library, name, loyalty, HexCoord::new(x, mid + offset))?;
    }
    Ok(())
}

fn print_result(format: &str, result: &BattleResult) {
    match format {
        "text" => {
            println!("Battle Result");
            println!("=============");
            println!("Outcome: {}", result.outcome);
            println!("Rounds: {}", result.rounds);
            println!("Player survivors: {}", result.player_survivors);
            println!("Enemy survivors: {}", result.enemy_survivors);
            println!("Destroyed: {}", result.destroyed);
            println!("Events: {}", result.events);
            println!();
            println!("Profiles: {} vs {}", result.player_profile, result.enemy_profile);
            println!("Seed: {}", result.seed);
        }
        other => {
            if other != "json" {
                eprintln!("Unknown format '{}', defaulting to json", other);
            }
            match serde_json::to_string_pretty(result) {
                Ok(json) => println!("{}", json),
                Err(e) => tracing::error!("Failed to serialize result: {}", e),
            }
        }
    }
}
