use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] fundflow_core::ValidationError),

    #[error(transparent)]
    Config(#[from] fundflow_core::ConfigError),

    #[error(transparent)]
    Catalog(#[from] fundflow_core::CatalogError),

    #[error(transparent)]
    Logging(#[from] fundflow_core::logging::LoggingError),

    #[error("command error: {0}")]
    Command(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Warehouse(#[from] fundflow_warehouse::WarehouseError),

    #[error(transparent)]
    Store(#[from] fundflow_core::StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<fundflow_core::RunError> for CliError {
    fn from(error: fundflow_core::RunError) -> Self {
        match error {
            fundflow_core::RunError::Catalog(source) => Self::Catalog(source),
        }
    }
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Config(_) => 2,
            Self::Catalog(_) => 2,
            Self::Logging(_) => 2,
            Self::Command(_) => 2,
            Self::Serialization(_) => 4,
            Self::Warehouse(_) => 6,
            Self::Store(_) => 6,
            Self::Io(_) => 10,
        }
    }
}
