use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unable to (de)serialize drink history: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("request to backend failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend answered {status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("malformed backend row: {0}")]
    MalformedRow(String),

    #[error("drink entry not found: {0}")]
    NotFound(String),

    #[error("no signed-in user, set INTAKE_USER_ID and INTAKE_ACCESS_TOKEN")]
    NotAuthenticated,

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
