//! Line-delimited JSON over TCP.
//!
//! Each connection is served by its own task; requests on one connection
//! are answered in order. Listener and connections stop when the shutdown
//! signal flips.

use std::io;
use std::sync::Arc;

use lg_05_ledger_service::{handle_line, LedgerApi};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub async fn serve(
    listener: TcpListener,
    api: Arc<dyn LedgerApi>,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    info!(addr = %listener.local_addr()?, "RPC listener started");
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                        continue;
                    }
                };
                debug!(%peer, "Connection opened");
                let api = Arc::clone(&api);
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    if let Err(e) = serve_connection(stream, api, shutdown).await {
                        debug!(%peer, error = %e, "Connection closed with error");
                    }
                });
            }
            _ = shutdown.changed() => break,
        }
    }
    info!("RPC listener stopped");
    Ok(())
}

async fn serve_connection(
    stream: TcpStream,
    api: Arc<dyn LedgerApi>,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = shutdown.changed() => break,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        let mut reply = handle_line(api.as_ref(), &line).await;
        reply.push('\n');
        writer.write_all(reply.as_bytes()).await?;
    }
    Ok(())
}
