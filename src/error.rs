use thiserror::Error;

/// Main error type for the replay engine
#[derive(Error, Debug)]
pub enum LivelineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Model errors
    #[error("No win-probability model loaded: {0}")]
    ModelUnavailable(String),

    // Replay lifecycle errors
    #[error("Replay already running for game {game_id}")]
    ReplayConflict { game_id: String },

    #[error("No active replay for game {game_id}")]
    ReplayNotFound { game_id: String },

    #[error("Game not found: {0}")]
    GameNotFound(String),

    // Play source errors
    #[error("Play source error: {0}")]
    Provider(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for LivelineError
pub type Result<T> = std::result::Result<T, LivelineError>;
