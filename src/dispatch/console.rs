use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

use super::Dispatcher;
use crate::error::DispatchError;

/// Writes `[destination] plain text` lines to stdout.
///
/// Useful for trying out a configuration before pointing it at a real
/// destination.
pub struct ConsoleDispatcher {
    out: Mutex<Stdout>,
}

impl ConsoleDispatcher {
    pub fn new() -> Self {
        Self {
            out: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for ConsoleDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

pub(super) fn console_line(destination: &str, plain: &str) -> String {
    format!("[{destination}] {plain}\n")
}

#[async_trait]
impl Dispatcher for ConsoleDispatcher {
    async fn deliver(
        &self,
        destination: &str,
        _rich: &str,
        plain: &str,
    ) -> Result<(), DispatchError> {
        // Hold the lock across both calls so concurrent feeds never interleave.
        let mut out = self.out.lock().await;
        out.write_all(console_line(destination, plain).as_bytes())
            .await?;
        out.flush().await?;
        Ok(())
    }
}
