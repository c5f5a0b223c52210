use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckError {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    Deserialize(#[from] serde_json::Error),
    #[error("unable to parse coordinate {value:?}: {source}")]
    Coordinate {
        value: String,
        source: std::num::ParseFloatError,
    },
    #[error("upstream reported status {0:?}")]
    UpstreamStatus(String),
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error(transparent)]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("unable to build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("mail server connection could not be established")]
    Unavailable,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to open mail session: {0}")]
    Session(#[source] MailError),
    #[error("invalid sender address: {0}")]
    Sender(#[source] lettre::address::AddressError),
}

#[derive(Debug, Error)]
pub enum MainError {
    #[error(transparent)]
    Init(#[from] shared::error::InitializationError),
    #[error("failed to build http client: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}
