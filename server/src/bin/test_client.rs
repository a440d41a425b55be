//! Headless probe client: joins a round and flies at random.

use clap::Parser;
use rand::Rng;
use shared::{read_frame, write_frame, FrameError, InputScheme, InputState, Message, NO_WINNER};
use tokio::net::TcpStream;

#[derive(Parser, Debug)]
#[command(author, version, about = "Joins a jetpack server and plays randomly", long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:4242")]
    server: String,

    /// Chance per tick of toggling the jetpack
    #[arg(long, default_value = "0.2")]
    toggle_chance: f64,

    /// Send the jetpack on/off byte instead of a bitmask
    #[arg(long)]
    legacy_input: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let scheme = if args.legacy_input {
        InputScheme::JetpackFlag
    } else {
        InputScheme::Bitmask
    };

    let mut stream = TcpStream::connect(&args.server).await?;
    stream.set_nodelay(true)?;
    println!("Connected to {}", args.server);
    write_frame(&mut stream, &Message::Connect.encode()?).await?;

    let mut rng = rand::thread_rng();
    let mut my_id = None;
    let mut input = InputState::default();
    let mut columns = 0usize;
    let mut rows = 0usize;

    loop {
        let frame = match read_frame(&mut stream).await {
            Ok(frame) => frame,
            Err(FrameError::Closed) => {
                println!("Server closed the connection");
                break;
            }
            Err(e) => return Err(e.into()),
        };
        let message = match Message::from_frame(&frame) {
            Ok(message) => message,
            Err(e) => {
                println!("Skipping malformed frame: {}", e);
                continue;
            }
        };

        match message {
            Message::Welcome {
                accepted,
                client_id,
            } => {
                println!("Welcome: accepted={} id={}", accepted, client_id);
                my_id = Some(client_id);
            }
            Message::MapChunk { count, column, .. } => {
                columns += 1;
                rows = column.len();
                if columns == usize::from(count) {
                    println!("Received map: {} rows x {} columns", rows, columns);
                }
            }
            Message::GameStart {
                player_count,
                start_x,
                start_y,
            } => {
                println!(
                    "Game start: {} players at ({}, {})",
                    player_count, start_x, start_y
                );
            }
            Message::GameState { tick, players } => {
                let Some(id) = my_id else { continue };
                if let Some(me) = players.iter().find(|player| player.id == id) {
                    if tick % 20 == 0 {
                        println!(
                            "Tick {}: x={} y={} score={} alive={}",
                            tick, me.x, me.y, me.score, me.alive
                        );
                    }
                    if me.collected_coin {
                        println!("Tick {}: coin! score {}", tick, me.score);
                    }
                    if !me.alive {
                        continue;
                    }
                }

                if rng.gen_bool(args.toggle_chance.clamp(0.0, 1.0)) {
                    input.jetpack = !input.jetpack;
                    let message = Message::Input {
                        player_id: id,
                        flags: scheme.encode(input),
                    };
                    write_frame(&mut stream, &message.encode()?).await?;
                }
            }
            Message::GameEnd { reason, winner } => {
                if winner == NO_WINNER {
                    println!("Game over ({}): no winner", reason);
                } else if Some(winner) == my_id {
                    println!("Game over ({}): you won!", reason);
                } else {
                    println!("Game over ({}): player {} won", reason, winner);
                }
            }
            Message::DebugInfo { text } => println!("[server] {}", text),
            other => println!("Unexpected {}", other.message_type()),
        }
    }

    Ok(())
}
