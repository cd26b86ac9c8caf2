use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use image::ImageError;
use thiserror::Error;

/// Reasons a face submission is refused. Every variant is recoverable: the
/// caller asks the registrant for a fresh set of images.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnrollmentError {
    #[error("at least one face image is required")]
    EmptyBatch,

    #[error("image {index} must show exactly one face (detected {faces_found})")]
    AmbiguousFace { index: usize, faces_found: usize },

    #[error("image {index} could not be decoded: {message}")]
    UnreadableImage { index: usize, message: String },

    // Never name the matching account here.
    #[error("at least one of the submitted faces is already registered")]
    DuplicateFace,
}

impl EnrollmentError {
    pub fn reason(&self) -> &'static str {
        match self {
            EnrollmentError::EmptyBatch => "empty_batch",
            EnrollmentError::AmbiguousFace { .. } => "ambiguous_face",
            EnrollmentError::UnreadableImage { .. } => "unreadable_image",
            EnrollmentError::DuplicateFace => "duplicate_face",
        }
    }

    pub fn image_index(&self) -> Option<usize> {
        match self {
            EnrollmentError::AmbiguousFace { index, .. }
            | EnrollmentError::UnreadableImage { index, .. } => Some(*index),
            EnrollmentError::EmptyBatch | EnrollmentError::DuplicateFace => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),

    #[error("invalid {field}: {}", .messages.join("; "))]
    Validation {
        field: String,
        messages: Vec<String>,
    },

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("input file not found or unreadable: {path}")]
    MissingInput { path: PathBuf },

    #[error("failed to decode image {name}: {source}")]
    ImageDecode {
        name: String,
        #[source]
        source: ImageError,
    },

    #[error("missing {kind} model; provide {flag} or set ${env}")]
    MissingModel {
        kind: &'static str,
        flag: &'static str,
        env: &'static str,
    },

    #[error("failed to load model {path}: {message}")]
    ModelLoad { path: PathBuf, message: String },

    #[error("face encoder produced an unusable encoding: {0}")]
    EncoderOutput(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to read store file {path}: {source}")]
    StoreRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write store file {path}: {source}")]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("store file {path} is invalid: {message}")]
    InvalidStore { path: PathBuf, message: String },

    #[error(
        "timed out after {waited_ms} ms waiting for write lock {path} ({})",
        lock_holder_label(.holder)
    )]
    StoreLocked {
        path: PathBuf,
        waited_ms: u128,
        holder: Option<u32>,
    },

    #[error("encoding store {path} is encrypted and requires ${env}")]
    EncryptedStoreRequiresKey { path: PathBuf, env: &'static str },

    #[error("store encryption error: {0}")]
    Encryption(String),

    #[error("store key invalid: {0}")]
    InvalidKey(String),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to read configuration file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration file {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            messages: vec![message.into()],
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            AppError::Enrollment(_) => ExitCode::from(3),
            AppError::Validation { .. } => ExitCode::from(2),
            AppError::NotFound { .. } => ExitCode::from(4),
            AppError::MissingInput { .. } => ExitCode::from(2),
            AppError::ImageDecode { .. } => ExitCode::from(2),
            AppError::MissingModel { .. } => ExitCode::from(2),
            AppError::ModelLoad { .. } => ExitCode::from(2),
            AppError::StoreRead { .. } => ExitCode::from(2),
            AppError::InvalidStore { .. } => ExitCode::from(2),
            AppError::StoreLocked { .. } => ExitCode::from(5),
            AppError::EncryptedStoreRequiresKey { .. } => ExitCode::from(2),
            AppError::InvalidKey(_) => ExitCode::from(2),
            AppError::ConfigRead { .. } => ExitCode::from(2),
            AppError::ConfigParse { .. } => ExitCode::from(2),
            _ => ExitCode::from(1),
        }
    }

    /// Stable machine-readable code for structured output.
    pub fn reason(&self) -> &'static str {
        match self {
            AppError::Enrollment(err) => err.reason(),
            AppError::Validation { .. } => "validation",
            AppError::NotFound { .. } => "not_found",
            AppError::StoreLocked { .. } => "store_locked",
            _ => "internal",
        }
    }

    pub fn human_message(&self) -> String {
        self.to_string()
    }
}

fn lock_holder_label(holder: &Option<u32>) -> String {
    match holder {
        Some(pid) => format!("held by pid {pid}"),
        None => "holder unknown".to_string(),
    }
}

pub type AppResult<T> = Result<T, AppError>;
