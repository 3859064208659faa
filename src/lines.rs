use std::future::Future;

use log::{error, info, Level};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::hooks::ExitHooks;
use crate::transport::{LogRecord, Transport};

/// Ships every non-blank line from `reader` until EOF, `interrupt` or a read
/// error, then runs the exit hooks. The hooks run on every exit path so
/// buffered events are drained before a read error is returned.
pub async fn ship_lines<R, I>(
    reader: R,
    transport: &Transport,
    hooks: &ExitHooks,
    interrupt: I,
) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
    I: Future<Output = ()>,
{
    tokio::pin!(interrupt);
    let mut lines = reader.lines();
    let mut shipped = 0usize;

    let outcome = loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => {
                    transport.log(LogRecord::new(Level::Info, line)).await;
                    shipped += 1;
                }
                Ok(None) => break Ok(shipped),
                Err(e) => {
                    error!("Failed to read input after {} line(s): {}", shipped, e);
                    break Err(e);
                }
            },
            _ = &mut interrupt => {
                info!("Interrupted, flushing");
                break Ok(shipped);
            }
        }
    };

    info!("Submitted {} line(s), shutting down", shipped);
    hooks.run().await;
    outcome
}
