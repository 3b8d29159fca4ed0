use thiserror::Error;

/// Broad classification of pipeline failures.
///
/// None of these are retried; callers show the error message as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown product key, missing parameter or output-format link
    Configuration,
    /// The service answered but signalled failure in the body
    Remote,
    /// Network, timeout, non-2xx without usable body, local I/O
    Transport,
}

/// Errors produced by the map product pipeline.
#[derive(Debug, Error)]
pub enum GeosysError {
    #[error("unknown map product: {0}")]
    UnknownProduct(String),

    #[error("map product {product} has no difference map")]
    NoDifferenceMap { product: String },

    #[error("map product {product} requires parameter {param}")]
    MissingParameter { product: String, param: &'static str },

    #[error("parameter {param} is not accepted by map product {product}")]
    UnexpectedParameter { product: String, param: &'static str },

    #[error("parameter {param} of map product {product} must be a finite number, got {value}")]
    InvalidParameter {
        product: String,
        param: &'static str,
        value: f64,
    },

    #[error("{0} not found, choose another output format")]
    MissingOutputFormat(String),

    #[error("{0}")]
    Remote(String),

    #[error("failed to download file: {0}")]
    Download(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid geometry: {0}")]
    Geometry(String),

    #[error("failed to write layer: {0}")]
    LayerExport(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GeosysError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GeosysError::UnknownProduct(_)
            | GeosysError::NoDifferenceMap { .. }
            | GeosysError::MissingParameter { .. }
            | GeosysError::UnexpectedParameter { .. }
            | GeosysError::InvalidParameter { .. }
            | GeosysError::MissingOutputFormat(_)
            | GeosysError::Geometry(_) => ErrorKind::Configuration,
            GeosysError::Remote(_) | GeosysError::InvalidResponse(_) => ErrorKind::Remote,
            GeosysError::Download(_)
            | GeosysError::Http(_)
            | GeosysError::LayerExport(_)
            | GeosysError::Io(_) => ErrorKind::Transport,
        }
    }

    /// Builds the "field map request failed" error, appending the
    /// service-provided message when there is one.
    pub fn field_map_failed(message: Option<&str>) -> Self {
        match message {
            Some(msg) if !msg.is_empty() => {
                GeosysError::Remote(format!("Field map request failed. {}", msg))
            }
            _ => GeosysError::Remote("Field map request failed.".to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, GeosysError>;
