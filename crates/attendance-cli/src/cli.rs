use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "attendance",
    version,
    about = "Face enrollment and account administration for student attendance"
)]
pub struct Cli {
    /// Emit JSON on stdout instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl From<bool> for OutputMode {
    fn from(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        OutputMode::from(self.json)
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Inspect, check and enroll face encodings directly.
    #[command(subcommand)]
    Faces(FacesCommands),
    /// Register a student account together with its face enrollment.
    Register(RegisterArgs),
    #[command(subcommand)]
    Password(PasswordCommands),
    #[command(subcommand)]
    Instructor(InstructorCommands),
    #[command(subcommand)]
    Account(AccountCommands),
    #[command(subcommand)]
    Ficha(FichaCommands),
}

#[derive(Debug, Clone, Default, Args)]
pub struct ModelArgs {
    /// dlib 68-point landmark predictor (.dat).
    #[arg(long, value_name = "PATH")]
    pub landmark_model: Option<PathBuf>,

    /// dlib ResNet face encoding network (.dat).
    #[arg(long, value_name = "PATH")]
    pub encoder_model: Option<PathBuf>,

    /// Re-sampling passes per encoding.
    #[arg(long, value_name = "N")]
    pub jitters: Option<u32>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct StoreArgs {
    /// Directory holding the encoding store.
    #[arg(long, value_name = "DIR")]
    pub store_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum FacesCommands {
    /// Report every face the encoder finds in one image.
    Extract(FaceExtractArgs),
    /// Validate a batch and compare it against the store without writing.
    Check(FaceCheckArgs),
    /// Validate, de-duplicate and store a batch for an owner.
    Enroll(FaceEnrollArgs),
    /// List enrolled encodings.
    List(FaceListArgs),
    /// Remove every encoding of an owner.
    Remove(FaceRemoveArgs),
}

#[derive(Debug, Clone, Args)]
pub struct FaceExtractArgs {
    pub image: PathBuf,

    #[command(flatten)]
    pub models: ModelArgs,
}

#[derive(Debug, Clone, Args)]
pub struct FaceCheckArgs {
    #[arg(required = true)]
    pub images: Vec<PathBuf>,

    #[command(flatten)]
    pub models: ModelArgs,

    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Clone, Args)]
pub struct FaceEnrollArgs {
    #[arg(long)]
    pub owner: String,

    #[arg(required = true)]
    pub images: Vec<PathBuf>,

    #[command(flatten)]
    pub models: ModelArgs,

    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Clone, Args)]
pub struct FaceListArgs {
    #[arg(long)]
    pub owner: Option<String>,

    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Clone, Args)]
pub struct FaceRemoveArgs {
    #[arg(long)]
    pub owner: String,

    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Clone, Args)]
pub struct RegisterArgs {
    /// JSON registration request, `-` for stdin.
    #[arg(long, value_name = "FILE")]
    pub request: PathBuf,

    #[command(flatten)]
    pub models: ModelArgs,

    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Clone, Subcommand)]
pub enum PasswordCommands {
    /// Change the password of an account, given its current password.
    Change(PasswordChangeArgs),
    /// Issue a reset token for the account registered under an email.
    ResetRequest(ResetRequestArgs),
    /// Set a new password with a reset token.
    ResetConfirm(ResetConfirmArgs),
}

#[derive(Debug, Clone, Args)]
pub struct PasswordChangeArgs {
    #[arg(long)]
    pub username: String,

    /// JSON with `old_password`, `new_password` and `new_password2`.
    #[arg(long, value_name = "FILE")]
    pub request: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct ResetRequestArgs {
    pub email: String,
}

#[derive(Debug, Clone, Args)]
pub struct ResetConfirmArgs {
    /// JSON with `token`, `password` and `password2`.
    #[arg(long, value_name = "FILE")]
    pub request: PathBuf,
}

#[derive(Debug, Clone, Subcommand)]
pub enum InstructorCommands {
    Create(InstructorCreateArgs),
    Update(InstructorUpdateArgs),
}

#[derive(Debug, Clone, Args)]
pub struct InstructorCreateArgs {
    #[arg(long, value_name = "FILE")]
    pub request: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct InstructorUpdateArgs {
    #[arg(long)]
    pub id: String,

    #[arg(long, value_name = "FILE")]
    pub request: PathBuf,
}

#[derive(Debug, Clone, Subcommand)]
pub enum AccountCommands {
    /// Delete an account with its memberships and face encodings.
    Delete(AccountDeleteArgs),
}

#[derive(Debug, Clone, Args)]
pub struct AccountDeleteArgs {
    #[arg(long)]
    pub id: String,

    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Clone, Subcommand)]
pub enum FichaCommands {
    Create(FichaCreateArgs),
}

#[derive(Debug, Clone, Args)]
pub struct FichaCreateArgs {
    pub numero: String,
}
