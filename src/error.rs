use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Envelope is missing a monitor stamp"))]
    StampMissing,

    #[snafu(display("Stored message with uid \"{token}\" not found"))]
    MessageNotFound { token: String },

    #[snafu(display("Stored message id {id} is unknown to the store"))]
    UnknownId { id: i64 },

    #[snafu(display("{message}"))]
    Precondition { message: String },

    #[snafu(display("Monitor table does not exist yet"))]
    MissingTable {
        #[snafu(source)]
        source: sqlx::Error,
    },

    #[snafu(display("Error returned from database"))]
    Sqlx {
        #[snafu(source)]
        source: sqlx::Error,
    },

    #[snafu(display("Invalid configuration"))]
    Config {
        #[snafu(source)]
        source: envy::Error,
    },

    #[snafu(display("Internal error"))]
    Internal {
        #[snafu(source(false))]
        source: Option<eyre::Report>,
    },
}

impl From<sqlx::Error> for Error {
    fn from(source: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &source {
            // SQLite reports a missing monitor table as "no such table";
            // the store repairs this lazily outside transactions.
            if db_err.message().contains("no such table") {
                return Self::MissingTable { source };
            }
        }

        Self::Sqlx { source }
    }
}

impl From<envy::Error> for Error {
    fn from(source: envy::Error) -> Self {
        Self::Config { source }
    }
}

impl From<eyre::Report> for Error {
    fn from(e: eyre::Report) -> Self {
        Self::Internal { source: Some(e) }
    }
}

impl Error {
    pub fn internal(e: impl Into<eyre::Report>) -> Self {
        Self::Internal {
            source: Some(e.into()),
        }
    }

    pub fn message_not_found(token: impl Into<String>) -> Self {
        Self::MessageNotFound {
            token: token.into(),
        }
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    pub fn is_missing_table(&self) -> bool {
        matches!(self, Self::MissingTable { .. })
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition { .. })
    }
}
