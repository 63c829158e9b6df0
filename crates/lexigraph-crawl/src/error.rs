use lexigraph_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error("invalid crawl configuration: {0}")]
    Config(String),
    #[error("no routable seed terms")]
    NoSeeds,
    #[error("{0} queue is full")]
    QueueFull(&'static str),
    #[error("{0} queue is closed")]
    QueueClosed(&'static str),
    #[error("operation cancelled by shutdown")]
    Cancelled,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("task failed: {0}")]
    Task(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
