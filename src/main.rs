use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use uno_rules::uno_game::api::start_api_server;
use uno_rules::uno_game::controller::GameController;
use uno_rules::uno_game::game::GameSettings;
use uno_rules::uno_game::ui::ConsoleUI;

#[derive(Parser)]
#[command(name = "uno", version, about = "UNO rules engine with a console game and an HTTP API")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the game API over HTTP
    Serve {
        #[arg(long, env = "UNO_ADDR", default_value = "127.0.0.1:3000")]
        addr: String,
        /// Directory holding one JSON file per game
        #[arg(long, env = "UNO_SESSIONS_DIR", default_value = "sessions")]
        sessions_dir: PathBuf,
    },
    /// Play a game in this terminal
    Play {
        /// Name of a human player; repeat for each seat
        #[arg(long = "player")]
        players: Vec<String>,
        /// Number of computer players
        #[arg(long, default_value_t = 0)]
        ai: usize,
        /// Forbid stacking Draw Two and Wild Draw Four penalties
        #[arg(long)]
        no_stacking: bool,
        /// Seed for a reproducible game
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Keep engine chatter out of the console game unless RUST_LOG asks for it
    let default_filter = match cli.command {
        Command::Serve { .. } => "info",
        Command::Play { .. } => "warn",
    };
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_filter));

    match cli.command {
        Command::Serve { addr, sessions_dir } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(start_api_server(&addr, sessions_dir))?;
        }
        Command::Play {
            players,
            ai,
            no_stacking,
            seed,
        } => {
            let settings = GameSettings {
                allow_stacking: !no_stacking,
            };
            let mut controller =
                GameController::new(players, ai, settings, seed, ConsoleUI::new())?;
            match controller.run()? {
                Some(winner) => info!("Game over, winner {}", winner),
                None => info!("Game stopped without a winner"),
            }
        }
    }

    Ok(())
}
