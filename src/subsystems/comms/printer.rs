//! Printer: the single writer of the display surface.
//!
//! Drains [`ChatLine`]s from the display queue and writes each one followed
//! by a blank line.  On shutdown, lines already queued are still flushed.

use std::io::Write;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::state::ChatLine;
use crate::error::AppError;
use crate::subsystems::runtime::{Component, ComponentFuture};

pub struct Printer<W> {
    rx: mpsc::Receiver<ChatLine>,
    out: W,
}

impl<W: Write + Send + 'static> Printer<W> {
    pub fn new(rx: mpsc::Receiver<ChatLine>, out: W) -> Self {
        Self { rx, out }
    }
}

impl<W: Write + Send + 'static> Component for Printer<W> {
    fn id(&self) -> &str {
        "printer"
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        let Printer { mut rx, mut out } = *self;
        Box::pin(async move {
            loop {
                tokio::select! {
                    biased;

                    line = rx.recv() => match line {
                        Some(line) => write_line(&mut out, &line)?,
                        None => break,
                    },

                    _ = shutdown.cancelled() => {
                        while let Ok(line) = rx.try_recv() {
                            write_line(&mut out, &line)?;
                        }
                        break;
                    }
                }
            }
            debug!("printer stopped");
            Ok(())
        })
    }
}

fn write_line<W: Write>(out: &mut W, line: &ChatLine) -> Result<(), AppError> {
    writeln!(out, "{line}\n")?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn flushes_queued_lines_on_shutdown() {
        let (tx, rx) = mpsc::channel(8);
        let buf = Shared::default();
        tx.send(ChatLine::Assistant("one".into())).await.unwrap();
        tx.send(ChatLine::Reminder("two".into())).await.unwrap();

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        Box::new(Printer::new(rx, buf.clone())).run(shutdown).await.unwrap();

        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text, "AI: one\n\nReminder: two\n\n");
    }
}
