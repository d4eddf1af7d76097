use thiserror::Error;

#[derive(Debug, Error)]
pub enum MmError {
    #[error("websocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("float parse error: {0}")]
    FloatParse(#[from] std::num::ParseFloatError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("exchange error {code}: {msg}")]
    Api { code: i64, msg: String },

    #[error("invalid config: {0}")]
    Config(String),

    #[error("{0} environment variable is required")]
    MissingCredential(&'static str),

    #[error("malformed kline: {0}")]
    MalformedKline(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("pong timeout")]
    PongTimeout,

    #[error("stale connection: {0}ms since last message")]
    StaleConnection(u64),
}

impl From<tokio_tungstenite::tungstenite::Error> for MmError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        MmError::WebSocket(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, MmError>;
