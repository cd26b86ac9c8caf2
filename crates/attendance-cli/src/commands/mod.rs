use std::any::Any;
use std::process::ExitCode;

use crate::cli::{Commands, OutputMode};
use crate::errors::AppResult;

pub trait CommandHandler: Send + Sync {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode>;
    fn as_any(&self) -> &dyn Any;
}

mod account;
mod faces;
mod ficha;
mod instructor;
mod password;
mod register;

pub use account::AccountHandler;
pub use faces::{FacesHandler, FacesHandlerDeps};
pub use ficha::FichaHandler;
pub use instructor::InstructorHandler;
pub use password::{PasswordHandler, PasswordHandlerDeps};
pub use register::RegisterHandler;

impl From<Commands> for Box<dyn CommandHandler> {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Faces(cmd) => Box::new(FacesHandler::new(cmd)),
            Commands::Register(args) => Box::new(RegisterHandler::new(args)),
            Commands::Password(cmd) => Box::new(PasswordHandler::new(cmd)),
            Commands::Instructor(cmd) => Box::new(InstructorHandler::new(cmd)),
            Commands::Account(cmd) => Box::new(AccountHandler::new(cmd)),
            Commands::Ficha(cmd) => Box::new(FichaHandler::new(cmd)),
        }
    }
}
