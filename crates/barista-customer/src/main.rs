//! Interactive terminal customer for the barista café.
//!
//! Reads commands from stdin, forwards them to the café, and prints every
//! server line prefixed with `Server: `. Ctrl-C sends `exit` before quitting.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tracing::debug;

#[derive(Debug, Parser)]
#[command(name = "customer", version, about = "Order drinks from a barista café")]
struct Args {
    /// Café address.
    #[arg(long, env = "BARISTA_ADDR", default_value = "127.0.0.1:50000")]
    addr: String,

    /// Name to introduce yourself with; prompted for if omitted.
    #[arg(long)]
    name: Option<String>,
}

const INSTRUCTIONS: &str = "\
Welcome to the Virtual Café!
Here's how to use this program:
--------------------------------
1. Ordering drinks: Type `order <quantity> <drink>` to place an order.
   Examples: `order 2 teas`, `order 1 coffee`, `order 2 teas and 3 coffees`
2. Checking order status: Type `order status` to check your order status.
3. Collect your order: Type `collect` to collect your order.
4. To exit the café: Type `exit` to exit the café. Or press Ctrl-C to alternatively exit.
--------------------------------
Please enter your commands below. Enjoy your experience!
";

const GOODBYE_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let stream = TcpStream::connect(&args.addr)
        .await
        .with_context(|| format!("unable to connect to the café at {}", args.addr))?;
    let (read, mut write) = stream.into_split();

    println!("{INSTRUCTIONS}");
    let mut stdin = BufReader::new(io::stdin()).lines();

    let name = match args.name {
        Some(name) => name,
        None => {
            print!("Enter your name: ");
            std::io::Write::flush(&mut std::io::stdout())?;
            stdin.next_line().await?.unwrap_or_default()
        }
    };
    send(&mut write, name.trim()).await?;

    let mut listener = tokio::spawn(async move {
        let mut lines = BufReader::new(read).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => println!("Server: {line}"),
                Ok(None) => break,
                Err(e) => {
                    debug!(error = %e, "read failed");
                    println!("Connection to server lost.");
                    break;
                }
            }
        }
    });

    let server_gone = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("Received termination signal (Ctrl-C). Exiting the café gracefully...");
                send(&mut write, "exit").await?;
                break false;
            }
            line = stdin.next_line() => {
                let Some(line) = line? else {
                    // stdin closed: leave politely rather than vanish.
                    send(&mut write, "exit").await?;
                    break false;
                };
                let command = line.trim().to_lowercase();
                match command.as_str() {
                    "exit" => {
                        println!("I am now exiting the café.");
                        send(&mut write, "exit").await?;
                        break false;
                    }
                    "collect" => {
                        println!("I am now about to collect my order.");
                        send(&mut write, "collect").await?;
                    }
                    _ => send(&mut write, &command).await?,
                }
            }
            _ = &mut listener => break true,
        }
    };

    if !server_gone {
        // Let the goodbye arrive before quitting.
        let _ = tokio::time::timeout(GOODBYE_TIMEOUT, listener).await;
    }
    Ok(())
}

async fn send(write: &mut OwnedWriteHalf, line: &str) -> Result<()> {
    write
        .write_all(format!("{line}\n").as_bytes())
        .await
        .context("failed to send to the café")
}
