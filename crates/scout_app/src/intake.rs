//! JSON-lines bridge between the page agents and the coordinator.
//!
//! Every input line is one message object and reaches the coordinator in
//! input order. Answers are awaited on their own task, so a pending
//! `CATEGORY_DONE` never blocks the lines behind it; they are written as JSON
//! lines in completion order.

use std::time::Duration;

use anyhow::{Context, Result};
use scout_core::{decode_message, Reply, WireError};
use scout_engine::{expects_reply, CoordinatorHandle};
use scout_logging::{scout_debug, scout_error, scout_info, scout_warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Reads messages until EOF, then waits up to `grace` for outstanding replies.
pub async fn run<R, W>(
    handle: &CoordinatorHandle,
    input: R,
    mut output: W,
    grace: Duration,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<Option<Reply>>();
    let mut in_flight: usize = 0;

    loop {
        tokio::select! {
            Some(outcome) = reply_rx.recv() => {
                in_flight = in_flight.saturating_sub(1);
                if let Some(reply) = outcome {
                    write_reply(&mut output, &reply).await?;
                }
            }
            line = lines.next_line() => {
                match line.context("Failed to read input")? {
                    Some(line) => {
                        if dispatch(handle, &line, &reply_tx) {
                            in_flight += 1;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    scout_info!("Input closed");
    let drain = async {
        while in_flight > 0 {
            let Some(outcome) = reply_rx.recv().await else {
                break;
            };
            in_flight -= 1;
            if let Some(reply) = outcome {
                write_reply(&mut output, &reply).await?;
            }
        }
        Ok::<(), anyhow::Error>(())
    };
    let drained = tokio::time::timeout(grace, drain).await;
    match drained {
        Ok(result) => result?,
        Err(_) => scout_warn!("{} replies still pending at shutdown", in_flight),
    }
    Ok(())
}

/// Forwards one line to the coordinator. Returns true when a reply task was
/// started for it.
fn dispatch(
    handle: &CoordinatorHandle,
    line: &str,
    replies: &mpsc::UnboundedSender<Option<Reply>>,
) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return false;
    }

    let msg = match decode_message(line) {
        Ok(msg) => msg,
        Err(WireError::UnknownType(kind)) => {
            scout_warn!("Unknown message type received: {}", kind);
            return false;
        }
        Err(err) => {
            scout_warn!("Ignoring message: {}", err);
            return false;
        }
    };
    scout_debug!("Received {:?}", msg);

    if expects_reply(&msg) {
        let Some(pending) = handle.submit(msg) else {
            scout_error!("Coordinator is not running; message dropped");
            return false;
        };
        let replies = replies.clone();
        tokio::spawn(async move {
            let _ = replies.send(pending.await.ok());
        });
        true
    } else {
        if !handle.send(msg) {
            scout_error!("Coordinator is not running; message dropped");
        }
        false
    }
}

async fn write_reply<W: AsyncWrite + Unpin>(output: &mut W, reply: &Reply) -> Result<()> {
    let mut line = serde_json::to_string(reply).context("Failed to encode reply")?;
    line.push('\n');
    output
        .write_all(line.as_bytes())
        .await
        .context("Failed to write reply")?;
    output.flush().await.context("Failed to write reply")?;
    Ok(())
}
