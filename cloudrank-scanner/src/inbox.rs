use crate::result::CrawlResult;
use tokio::sync::mpsc;

/// Creates the channel between crawl workers and the persistence writer.
///
/// With a capacity, `ResultSink::send` waits while the writer is that many
/// results behind. Without one the inbox grows as needed.
pub fn result_channel(capacity: Option<usize>) -> (ResultSink, ResultStream) {
    match capacity {
        Some(capacity) => {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            (ResultSink::Bounded(tx), ResultStream::Bounded(rx))
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (ResultSink::Unbounded(tx), ResultStream::Unbounded(rx))
        }
    }
}

/// Sending half, cloned into every worker.
#[derive(Clone)]
pub enum ResultSink {
    Bounded(mpsc::Sender<CrawlResult>),
    Unbounded(mpsc::UnboundedSender<CrawlResult>),
}

impl ResultSink {
    /// Hands a result to the writer. Gives the result back if the writer is
    /// gone.
    pub async fn send(&self, result: CrawlResult) -> Result<(), CrawlResult> {
        match self {
            ResultSink::Bounded(tx) => tx.send(result).await.map_err(|e| e.0),
            ResultSink::Unbounded(tx) => tx.send(result).map_err(|e| e.0),
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            ResultSink::Bounded(tx) => tx.is_closed(),
            ResultSink::Unbounded(tx) => tx.is_closed(),
        }
    }
}

/// Receiving half, owned by the single writer.
pub enum ResultStream {
    Bounded(mpsc::Receiver<CrawlResult>),
    Unbounded(mpsc::UnboundedReceiver<CrawlResult>),
}

impl ResultStream {
    pub async fn recv(&mut self) -> Option<CrawlResult> {
        match self {
            ResultStream::Bounded(rx) => rx.recv().await,
            ResultStream::Unbounded(rx) => rx.recv().await,
        }
    }

    /// For writers running on a blocking thread. Must not be called from
    /// inside an async context.
    pub fn blocking_recv(&mut self) -> Option<CrawlResult> {
        match self {
            ResultStream::Bounded(rx) => rx.blocking_recv(),
            ResultStream::Unbounded(rx) => rx.blocking_recv(),
        }
    }
}
