use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use super::ChunkWriter;

/// Hands chunks to an HTTP response body through a bounded channel. Closing
/// drops the sender, which ends the receiving stream.
pub struct ChannelSink {
    tx: Option<mpsc::Sender<String>>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx: Some(tx) }
    }
}

#[async_trait]
impl ChunkWriter for ChannelSink {
    async fn write(&mut self, chunk: String) -> Result<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| anyhow!("sink already closed"))?;
        tx.send(chunk)
            .await
            .map_err(|_| anyhow!("client disconnected"))
    }

    async fn close(&mut self) {
        self.tx.take();
    }
}

pub struct StdoutSink {
    out: tokio::io::Stdout,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self {
            out: tokio::io::stdout(),
        }
    }
}

#[async_trait]
impl ChunkWriter for StdoutSink {
    async fn write(&mut self, chunk: String) -> Result<()> {
        self.out.write_all(chunk.as_bytes()).await?;
        self.out.flush().await?;
        Ok(())
    }

    async fn close(&mut self) {
        let _ = self.out.write_all(b"\n").await;
        let _ = self.out.flush().await;
    }
}

/// Accumulates the relayed chunks in memory, for callers that answer only
/// once the stream has ended.
#[derive(Debug, Default)]
pub struct CollectSink {
    pub buffer: String,
}

#[async_trait]
impl ChunkWriter for CollectSink {
    async fn write(&mut self, chunk: String) -> Result<()> {
        self.buffer.push_str(&chunk);
        Ok(())
    }

    async fn close(&mut self) {}
}

#[cfg(test)]
#[derive(Default)]
pub(crate) struct BufferSink {
    pub chunks: Vec<String>,
    pub close_count: usize,
    pub fail_after: Option<usize>,
}

#[cfg(test)]
#[async_trait]
impl ChunkWriter for BufferSink {
    async fn write(&mut self, chunk: String) -> Result<()> {
        if self.fail_after.is_some_and(|limit| self.chunks.len() >= limit) {
            return Err(anyhow!("buffer refused write"));
        }
        self.chunks.push(chunk);
        Ok(())
    }

    async fn close(&mut self) {
        self.close_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_sink_close_ends_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut sink = ChannelSink::new(tx);

        sink.write("one".to_string()).await.unwrap();
        sink.close().await;

        assert_eq!(rx.recv().await.as_deref(), Some("one"));
        assert_eq!(rx.recv().await, None);
        assert!(sink.write("late".to_string()).await.is_err());
    }

    #[tokio::test]
    async fn collect_sink_appends_chunks() {
        let mut sink = CollectSink::default();
        sink.write("Tides ".to_string()).await.unwrap();
        sink.write("turn".to_string()).await.unwrap();
        sink.close().await;
        assert_eq!(sink.buffer, "Tides turn");
    }

    #[tokio::test]
    async fn channel_sink_reports_dropped_receiver() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let mut sink = ChannelSink::new(tx);
        assert!(sink.write("x".to_string()).await.is_err());
    }
}
