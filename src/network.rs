//! TCP accept loop and per-connection framing tasks.
//!
//! Each accepted connection gets two tasks: a reader that frames the byte
//! stream into lines and forwards parsed intents to the dispatcher, and a
//! writer that drains the session's outbound queue. The writer is the only
//! task touching the write half, so broadcasts from the dispatcher never
//! interleave their bytes on the wire.

use crate::config::ServerInfo;
use crate::dispatcher::Event;
use crate::session::Session;
use futures_util::{SinkExt, StreamExt};
use lark_proto::intent::Intent;
use lark_proto::line::LineCodec;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

/// Accept connections forever. Returns only on a listener error; failure to
/// bind is fatal at startup.
pub async fn run(
    address: SocketAddr,
    server: Arc<ServerInfo>,
    events: UnboundedSender<Event>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(address).await?;
    info!(address = %address, "Listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        info!(peer = %peer, "Client connected");

        let (read_half, write_half) = stream.into_split();
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let session = Arc::new(Session::new(
            peer,
            server.default_cloak.as_deref(),
            outgoing_tx,
        ));

        tokio::spawn(write_loop(
            write_half,
            outgoing_rx,
            Arc::clone(&session),
            events.clone(),
        ));
        tokio::spawn(read_loop(read_half, session, events.clone()));
    }
}

/// Frame inbound bytes into lines and forward each one as an intent. EOF
/// and read errors synthesize a quit so cleanup runs through the normal
/// state-machine path.
async fn read_loop(
    read_half: OwnedReadHalf,
    session: Arc<Session>,
    events: UnboundedSender<Event>,
) {
    let mut lines = FramedRead::new(read_half, LineCodec::default());

    loop {
        tokio::select! {
            _ = session.closed() => break,
            next = lines.next() => match next {
                Some(Ok(line)) => {
                    if line.is_empty() {
                        continue;
                    }
                    debug!(peer = %session.addr, raw = %line, "Line received");
                    let event = Event {
                        session: Arc::clone(&session),
                        intent: Intent::parse(&line),
                    };
                    if events.send(event).is_err() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    warn!(peer = %session.addr, error = %e, "Read error");
                    synthesize_quit(&session, &events);
                    break;
                }
                None => {
                    info!(peer = %session.addr, "Client disconnected");
                    synthesize_quit(&session, &events);
                    break;
                }
            }
        }
    }
}

/// Drain the session's outbound queue onto the socket, one line at a time.
async fn write_loop(
    write_half: OwnedWriteHalf,
    mut outgoing: UnboundedReceiver<String>,
    session: Arc<Session>,
    events: UnboundedSender<Event>,
) {
    let mut sink = FramedWrite::new(write_half, LineCodec::default());

    loop {
        tokio::select! {
            _ = session.closed() => break,
            line = outgoing.recv() => match line {
                Some(line) => {
                    if let Err(e) = sink.send(line).await {
                        debug!(peer = %session.addr, error = %e, "Write error");
                        synthesize_quit(&session, &events);
                        break;
                    }
                }
                None => break,
            }
        }
    }
}

fn synthesize_quit(session: &Arc<Session>, events: &UnboundedSender<Event>) {
    let _ = events.send(Event {
        session: Arc::clone(session),
        intent: Intent::disconnect(),
    });
}
