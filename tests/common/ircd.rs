//! Fake IRC server.
//!
//! Accepts the relay's connection and lets a test script both sides of the
//! conversation from the server's point of view.

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

/// A listening socket standing in for an IRC server.
pub struct FakeIrcd {
    listener: TcpListener,
}

impl FakeIrcd {
    pub async fn bind() -> anyhow::Result<Self> {
        Ok(Self {
            listener: TcpListener::bind("127.0.0.1:0").await?,
        })
    }

    pub fn port(&self) -> u16 {
        self.listener.local_addr().map(|a| a.port()).unwrap_or(0)
    }

    /// Wait for the relay to dial in.
    pub async fn accept(&self) -> anyhow::Result<ServerSide> {
        let (socket, _) = timeout(Duration::from_secs(10), self.listener.accept()).await??;
        let (read, write) = socket.into_split();
        Ok(ServerSide {
            lines: BufReader::new(read).lines(),
            writer: write,
        })
    }
}

/// The server end of one accepted relay connection.
pub struct ServerSide {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl ServerSide {
    /// Send one protocol line, CRLF appended.
    pub async fn send(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Next line from the relay.
    pub async fn recv(&mut self) -> anyhow::Result<String> {
        match timeout(Duration::from_secs(5), self.lines.next_line()).await?? {
            Some(line) => Ok(line),
            None => anyhow::bail!("relay closed the connection"),
        }
    }

    /// Read the registration burst: optional PASS, then USER and NICK.
    pub async fn expect_registration(&mut self) -> anyhow::Result<Vec<String>> {
        let mut lines = Vec::new();
        loop {
            let line = self.recv().await?;
            let done = line.starts_with("NICK ");
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
    }

    /// Wait for the relay to hang up.
    pub async fn expect_eof(&mut self) -> anyhow::Result<()> {
        loop {
            match timeout(Duration::from_secs(10), self.lines.next_line()).await?? {
                Some(_) => continue,
                None => return Ok(()),
            }
        }
    }
}
