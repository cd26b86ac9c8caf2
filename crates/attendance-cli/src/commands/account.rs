use std::any::Any;
use std::process::ExitCode;

use attendance_face_core::accounts::AccountDeletionOutcome;

use crate::accounts;
use crate::cli::{AccountCommands, AccountDeleteArgs, OutputMode};
use crate::commands::CommandHandler;
use crate::errors::AppResult;
use crate::output::render_account_deletion;

pub struct AccountHandler {
    command: AccountCommands,
    delete: Box<dyn Fn(&AccountDeleteArgs) -> AppResult<AccountDeletionOutcome> + Send + Sync>,
    render: Box<dyn Fn(&AccountDeletionOutcome, OutputMode) -> AppResult<()> + Send + Sync>,
}

impl AccountHandler {
    pub fn new(command: AccountCommands) -> Self {
        Self::with_dependencies(
            command,
            accounts::run_account_deletion,
            render_account_deletion,
        )
    }

    pub fn with_dependencies(
        command: AccountCommands,
        delete: impl Fn(&AccountDeleteArgs) -> AppResult<AccountDeletionOutcome>
            + Send
            + Sync
            + 'static,
        render: impl Fn(&AccountDeletionOutcome, OutputMode) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            command,
            delete: Box::new(delete),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for AccountHandler {
    fn execute(&self, mode: OutputMode, _verbose: bool) -> AppResult<ExitCode> {
        match &self.command {
            AccountCommands::Delete(args) => {
                let outcome = (self.delete)(args)?;
                (self.render)(&outcome, mode)?;
            }
        }
        Ok(ExitCode::SUCCESS)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
