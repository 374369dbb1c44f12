//! The `terminal` module is the interactive client.
//!
//! `router` decides what each typed or received line means; `run` wires it
//! to stdin, stdout and a TCP connection.

pub mod router;

pub use router::{Action, CommandRouter};

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, info, warn};

use crate::utils::error::BrokerError;

/// Connect to `host:port` and relay between the user and the server until
/// either side closes the session.
pub async fn run(host: &str, port: u16) -> Result<(), BrokerError> {
    let addr = format!("{host}:{port}");
    let stream = TcpStream::connect(&addr).await?;
    info!(%addr, "connected");

    let (read_half, write_half) = stream.into_split();
    let mut server = FramedRead::new(read_half, LinesCodec::new());
    let mut sink = FramedWrite::new(write_half, LinesCodec::new());
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut router = CommandRouter::new();
    let mut reading_input = true;

    println!("--- CONNECTED TO {addr}: enter 'help' for the list of commands ---");

    loop {
        let actions = tokio::select! {
            line = server.next() => match line {
                Some(Ok(line)) => router.handle_server_line(&line),
                Some(Err(e)) => {
                    warn!(error = %e, "connection error");
                    break;
                }
                None => break,
            },

            line = input.next_line(), if reading_input => match line {
                Ok(Some(line)) => router.handle_input(&line),
                Ok(None) => {
                    debug!("stdin closed, quitting");
                    router.handle_input("quit")
                }
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    router.handle_input("quit")
                }
            },
        };

        for action in actions {
            match action {
                Action::Forward(line) => sink.send(line).await?,
                Action::Print(text) => println!("{text}"),
                Action::Quit => reading_input = false,
            }
        }
    }

    let dropped = router.discard_backlog();
    if dropped > 0 {
        println!("> Connection closed: {dropped} queued command(s) discarded");
    }
    println!("--- DISCONNECTED ---");
    Ok(())
}
