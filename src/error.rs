use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    // Session errors
    #[error("Not signed in")]
    NotSignedIn,

    #[error("Session expired, please sign in again")]
    SessionExpired,

    // Chat platform errors
    #[error("Discord API error: {message}")]
    Discord {
        status: Option<u16>,
        message: String,
    },

    #[error("Guild not found or not administrable: {id}")]
    GuildNotAdministrable { id: String },

    #[error("No guild selected")]
    NoGuildSelected,

    #[error("Settings for guild {id} are still loading")]
    StillLoading { id: String },

    // Module storage errors
    #[error("Failed to load {module} settings: {message}")]
    SettingsLoad { module: String, message: String },

    #[error("Failed to save {module} settings: {message}")]
    SettingsSave { module: String, message: String },

    #[error("Unknown module: {name}")]
    UnknownModule { name: String },

    #[error("Invalid settings: {message}")]
    Validation { message: String },

    // State errors
    #[error("Failed to save state to '{path}': {source}")]
    StateSave {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load state from '{path}': {source}")]
    StateLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse state file '{path}': {source}")]
    StateParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // Generic errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DashboardError {
    pub fn validation(message: impl Into<String>) -> Self {
        DashboardError::Validation {
            message: message.into(),
        }
    }
}

impl From<serenity::Error> for DashboardError {
    fn from(err: serenity::Error) -> Self {
        let status = match &err {
            serenity::Error::Http(serenity::http::HttpError::UnsuccessfulRequest(resp)) => {
                Some(resp.status_code.as_u16())
            }
            _ => None,
        };
        DashboardError::Discord {
            status,
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for DashboardError {
    fn from(err: reqwest::Error) -> Self {
        DashboardError::Discord {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for DashboardError {
    fn from(err: std::io::Error) -> Self {
        DashboardError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for DashboardError {
    fn from(err: serde_json::Error) -> Self {
        DashboardError::Internal {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
