use anyhow::{Result, bail};
use std::env;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use lotto_feed::config::{self, OutputFormat};
use lotto_feed::{FeedClient, Game, GameUpdate};

enum Mode {
    Load,
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let mut config = config::load()?;

    let mut mode = Mode::Load;
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "load" => mode = Mode::Load,
            "watch" => mode = Mode::Watch,
            url if url.contains("://") => config.feed_url = url.to_string(),
            other => bail!("usage: lotto-feed [load|watch] [URL] (unexpected argument {:?})", other),
        }
    }

    let client = FeedClient::from_config(&config)?;
    let cancel = CancellationToken::new();

    match mode {
        Mode::Load => {
            let games = client.load(&cancel).await?;
            for game in games.values() {
                print_game(game, config.output)?;
            }
        }
        Mode::Watch => {
            let shutdown = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Ctrl-C received, shutting down");
                }
                shutdown.cancel();
            });

            let mut updates = client.stream_updates(config.poll_interval, cancel);
            while let Some(update) = updates.recv().await {
                match update {
                    GameUpdate::Game(game) => print_game(&game, config.output)?,
                    GameUpdate::Error(e) => tracing::error!("feed update failed: {}", e),
                }
            }
        }
    }

    Ok(())
}

fn print_game(game: &Game, output: OutputFormat) -> Result<()> {
    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string(game)?);
        return Ok(());
    }

    println!("ID: {}", game.id);
    println!("Name: {}", game.name);
    println!("States/provinces:");
    for s in &game.state_provs {
        println!("\tID: {}", s.id);
        println!("\tName: {}", s.name);
        println!("\tCountry: {}", s.country);
    }
    println!("Update time: {}", game.update_time);
    println!("Last draw: {}", game.last_draw_numbers);
    println!("Last draw date: {}", game.last_draw_date.format("%Y-%m-%d"));
    println!("Next draw date: {}", game.next_draw_date.format("%Y-%m-%d"));
    if let Some(jackpot) = &game.jackpot {
        println!(
            "Jackpot: {} ({})",
            jackpot.amount,
            jackpot.date.format("%Y-%m-%d")
        );
    }
    println!();
    Ok(())
}
