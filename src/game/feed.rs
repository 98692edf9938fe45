//! Inbound game feed.
//!
//! The host client appends one message per line to a file, or pipes them to
//! stdin. A file feed is followed like `tail -f`, starting from its current end.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncSeekExt, BufReader};
use tracing::{debug, info};

use crate::common::messages::GameMessage;

/// How often a followed file is checked for new lines at its end.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Where feed lines come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    Stdin,
    File(PathBuf),
}

impl FeedSource {
    pub fn from_config(feed: Option<&str>) -> Self {
        match feed {
            Some("-") | None => Self::Stdin,
            Some(path) => Self::File(PathBuf::from(path)),
        }
    }

    /// Whether the end of input means there will never be more.
    pub fn is_finite(&self) -> bool {
        matches!(self, Self::Stdin)
    }

    pub async fn open(&self) -> io::Result<FeedReader> {
        match self {
            Self::Stdin => {
                info!("Reading game feed from stdin");
                Ok(FeedReader::from_reader(BufReader::new(tokio::io::stdin())))
            }
            Self::File(path) => {
                let mut file = tokio::fs::File::open(path).await?;
                let position = file.seek(io::SeekFrom::End(0)).await?;
                info!(path = %path.display(), position, "Following game feed");
                Ok(FeedReader::new(
                    Box::new(BufReader::new(file)),
                    Some(path.clone()),
                    position,
                ))
            }
        }
    }
}

/// Line reader over a feed source.
pub struct FeedReader {
    reader: Box<dyn AsyncBufRead + Send + Unpin>,
    /// Set when following a file.
    follow: Option<PathBuf>,
    /// Bytes consumed from the start of the file.
    position: u64,
    /// Bytes of a line whose newline has not been written yet.
    partial: Vec<u8>,
    poll_interval: Duration,
}

impl FeedReader {
    fn new(reader: Box<dyn AsyncBufRead + Send + Unpin>, follow: Option<PathBuf>, position: u64) -> Self {
        Self {
            reader,
            follow,
            position,
            partial: Vec::new(),
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Reader over in-memory or piped input that ends at EOF.
    pub fn from_reader(reader: impl AsyncBufRead + Send + Unpin + 'static) -> Self {
        Self::new(Box::new(reader), None, 0)
    }

    #[cfg(test)]
    fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Next decoded message.
    ///
    /// `Ok(None)` only when a finite source is exhausted. A followed file
    /// that shrinks (truncated or replaced) yields an error so the caller
    /// can reopen it. Partial reads are kept, so dropping this future and
    /// calling again loses nothing.
    pub async fn next_message(&mut self) -> io::Result<Option<GameMessage>> {
        loop {
            let read = self.reader.read_until(b'\n', &mut self.partial).await?;
            self.position += read as u64;

            let complete = self.partial.last() == Some(&b'\n');
            if complete || (read == 0 && self.follow.is_none() && !self.partial.is_empty()) {
                let line = String::from_utf8_lossy(&self.partial).into_owned();
                self.partial.clear();
                match GameMessage::decode(&line) {
                    Some(message) => return Ok(Some(message)),
                    None => continue,
                }
            }

            if read > 0 {
                continue;
            }

            match &self.follow {
                None => return Ok(None),
                Some(path) => {
                    let len = tokio::fs::metadata(path).await?.len();
                    if len < self.position {
                        debug!(len, position = self.position, "Feed file shrank");
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            format!("feed file '{}' was truncated", path.display()),
                        ));
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}
