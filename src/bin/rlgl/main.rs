//! rlgl - run red light / green light arenas from a terminal
//!
//! Stdin stands in for the host engine: players are created by name, moved
//! with `move`, and every effect the arenas request is printed.

mod console;

use clap::{ArgAction, Parser};
use console::ConsoleHost;
use rlgl_arena::logging::{LogFormat, init_logging};
use rlgl_arena::{
    ArenaRegistry, ArenaSnapshot, DEFAULT_ARENA, GameConfig, GameContext, Host, LightState, Lobby,
    MoveVerdict, PlayerId, Pose, Position, WorldStore,
};
use std::error::Error;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[derive(Parser)]
#[command(name = "rlgl", version, about = "Red light / green light arena console", long_about = None)]
struct Cli {
    /// YAML game config; defaults apply when omitted
    #[arg(short, long, env = "RLGL_CONFIG")]
    config: Option<PathBuf>,

    /// JSON file holding roles and locations
    #[arg(short, long, env = "RLGL_DATA", default_value = "rlgl-data.json")]
    data: PathBuf,

    /// More output per occurrence (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[arg(long, value_enum, default_value_t = LogFormat::Human)]
    log_format: LogFormat,
}

enum Flow {
    Continue,
    Quit,
}

type CommandResult = Result<Flow, Box<dyn Error>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let store = WorldStore::open(&cli.data)?;
    let host = Arc::new(ConsoleHost::default());
    let registry = ArenaRegistry::new(GameContext::new(
        config,
        store,
        Host::from_shared(host.clone()),
    ));
    registry.get_or_create(DEFAULT_ARENA).await;

    println!("rlgl console");
    println!("============\n");
    print_help();

    let console = Console {
        registry: &registry,
        host: &host,
        config_path: cli.config.as_deref(),
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }

        match run_command(&console, &words).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(e) => println!("Error: {}", e),
        }
    }

    registry.shutdown().await?;
    println!("Goodbye!");
    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  arena create|delete <name>   - Manage arenas");
    println!("  arena list                   - Show every arena");
    println!("  join <player> [arena]        - Add a player (default arena if omitted)");
    println!("  leave <player>               - Remove a player from their arena");
    println!("  start|stop [arena]           - Start or stop a game");
    println!("  light green|red [arena]      - Force the light");
    println!("  move <player> <x> <y> <z> [yaw pitch]");
    println!("  pos <player>                 - Show a player's position");
    println!("  set lobby|guestlobby|finish <player>  - Use the player's position");
    println!("  set|remove admin|guest <player>");
    println!("  tp guest|admin|<player> lobby|guestlobby  - Teleport through the host");
    println!("  status [arena]               - Show one arena");
    println!("  reload                       - Re-read config and world data");
    println!("  help | quit\n");
}

fn load_config(path: Option<&Path>) -> Result<GameConfig, Box<dyn Error>> {
    Ok(match path {
        Some(path) => {
            info!("Loading config from {}", path.display());
            GameConfig::load(path)?
        }
        None => GameConfig::default(),
    })
}

fn arena_arg<'a>(rest: &[&'a str]) -> &'a str {
    rest.first().copied().unwrap_or(DEFAULT_ARENA)
}

fn known(host: &ConsoleHost, name: &str) -> Result<console::ConsolePlayer, Box<dyn Error>> {
    host.lookup(name)
        .ok_or_else(|| format!("Unknown player: {}", name).into())
}

fn parse_light(word: &str) -> Result<LightState, Box<dyn Error>> {
    match word.to_ascii_lowercase().as_str() {
        "green" => Ok(LightState::Green),
        "red" => Ok(LightState::Red),
        _ => Err(format!("Unknown light: {} (expected green or red)", word).into()),
    }
}

fn print_snapshot(host: &ConsoleHost, snapshot: &ArenaSnapshot) {
    let remaining = snapshot
        .time_remaining
        .map(|t| format!("{}s left", t))
        .unwrap_or_else(|| "idle".to_string());
    println!(
        "  {} - {} / {} ({})",
        snapshot.name, snapshot.state, snapshot.light, remaining
    );
    println!("    players: [{}]", host.names(&snapshot.players));
    if !snapshot.spectators.is_empty() {
        println!("    spectators: [{}]", host.names(&snapshot.spectators));
    }
}

struct Console<'a> {
    registry: &'a ArenaRegistry,
    host: &'a ConsoleHost,
    config_path: Option<&'a Path>,
}

impl Console<'_> {
    async fn teleport_targets(&self, who: &str) -> Result<Vec<PlayerId>, Box<dyn Error>> {
        let store = &self.registry.context().store;
        Ok(match who {
            "guest" | "guests" => store.guests().await,
            "admin" | "admins" => store.admins().await,
            name => vec![known(self.host, name)?.id],
        })
    }
}

async fn run_command(console: &Console<'_>, words: &[&str]) -> CommandResult {
    let (registry, host) = (console.registry, console.host);
    let store = &registry.context().store;

    match words {
        ["help"] => print_help(),
        ["quit"] | ["exit"] | ["q"] => return Ok(Flow::Quit),

        ["arena", "create", name] => {
            registry.create_arena(name).await?;
            println!("Arena created: {}", name);
        }
        ["arena", "delete", name] => {
            registry.delete_arena(name).await?;
            println!("Arena deleted: {}", name);
        }
        ["arena", "list"] => {
            let arenas = registry.list_arenas().await;
            if arenas.is_empty() {
                println!("No arenas");
            }
            for snapshot in &arenas {
                print_snapshot(host, snapshot);
            }
        }

        ["join", player, rest @ ..] => {
            let player = host.register(player);
            let arena = registry
                .join(arena_arg(rest), player.id, player.name.clone())
                .await?;
            println!("{} joined {}", player.name, arena.name());
        }
        ["leave", player] => {
            let player = known(host, player)?;
            match registry.arena_of(player.id).await {
                Some(arena) => {
                    arena.remove_player(player.id).await?;
                    println!("{} left {}", player.name, arena.name());
                }
                None => println!("{} is not in an arena", player.name),
            }
        }

        ["start", rest @ ..] => {
            let name = arena_arg(rest);
            if !registry.start_game(name).await? {
                println!("{} is already running", name);
            }
        }
        ["stop", rest @ ..] => {
            let arena = registry.get_arena(arena_arg(rest)).await?;
            if !arena.stop_game().await? {
                println!("{} is not running", arena.name());
            }
        }
        ["light", color, rest @ ..] => {
            let light = parse_light(color)?;
            let arena = registry.get_arena(arena_arg(rest)).await?;
            if !arena.set_light(light).await? {
                println!("{} is not running or the light is already {}", arena.name(), light);
            }
        }

        ["move", player, x, y, z, rest @ ..] => {
            let player = known(host, player)?;
            let (yaw, pitch) = match rest {
                [] => (player.pose.yaw, player.pose.pitch),
                [yaw, pitch] => (yaw.parse()?, pitch.parse()?),
                _ => return Err("Usage: move <player> <x> <y> <z> [yaw pitch]".into()),
            };
            let position = Position::new(
                player.pose.position.world.clone(),
                x.parse()?,
                y.parse()?,
                z.parse()?,
            );
            let to = Pose::new(position, yaw, pitch);

            match registry.route_movement(player.id, player.pose.clone(), to.clone()).await? {
                MoveVerdict::Allowed => host.set_pose(player.id, to),
                MoveVerdict::Denied => println!("Movement of {} cancelled", player.name),
            }
        }
        ["pos", player] => {
            let player = known(host, player)?;
            let p = &player.pose.position;
            println!(
                "{} at {} ({:.2}, {:.2}, {:.2}) yaw {:.1} pitch {:.1}, block {}",
                player.name,
                p.world,
                p.x,
                p.y,
                p.z,
                player.pose.yaw,
                player.pose.pitch,
                p.block()
            );
        }

        ["set", "lobby", player] => {
            let player = known(host, player)?;
            store.set_lobby(player.pose.position).await;
            println!("Lobby set");
        }
        ["set", "guestlobby", player] => {
            let player = known(host, player)?;
            store.set_guest_lobby(player.pose.position).await;
            println!("Guest lobby set");
        }
        ["set", "finish", player] => {
            let player = known(host, player)?;
            let block = player.pose.position.block();
            store.set_finish(block.clone()).await;
            println!("Finish set to {}", block);
        }
        ["set", "admin", player] => {
            let player = host.register(player);
            if store.add_admin(player.id).await {
                println!("{} is now an admin", player.name);
            }
        }
        ["set", "guest", player] => {
            let player = host.register(player);
            if store.add_guest(player.id).await {
                println!("{} is now a guest", player.name);
            }
        }
        ["remove", "admin", player] => {
            let player = known(host, player)?;
            if store.remove_admin(&player.id).await {
                println!("{} is no longer an admin", player.name);
            }
        }
        ["remove", "guest", player] => {
            let player = known(host, player)?;
            if store.remove_guest(&player.id).await {
                println!("{} is no longer a guest", player.name);
            }
        }

        ["tp", who, lobby] => {
            let lobby: Lobby = lobby.parse()?;
            let targets = console.teleport_targets(who).await?;
            let moved = registry.teleport(&targets, lobby).await?;
            println!("Teleported {} player(s) to the {}", moved, lobby.label());
        }
        ["reload"] => {
            registry.reload(load_config(console.config_path)?).await?;
            println!("Reloaded");
        }

        ["status", rest @ ..] => {
            let arena = registry.get_arena(arena_arg(rest)).await?;
            print_snapshot(host, &arena.snapshot().await?);
        }

        _ => return Err(format!("Unknown command: {} (try help)", words.join(" ")).into()),
    }

    Ok(Flow::Continue)
}
