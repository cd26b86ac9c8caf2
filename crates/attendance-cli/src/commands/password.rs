use std::any::Any;
use std::process::ExitCode;

use attendance_face_core::accounts::AccountSummary;

use crate::accounts::{self, ResetRequestOutcome};
use crate::cli::{
    OutputMode, PasswordChangeArgs, PasswordCommands, ResetConfirmArgs, ResetRequestArgs,
};
use crate::commands::CommandHandler;
use crate::errors::AppResult;
use crate::output::{render_account, render_reset_request};

pub struct PasswordHandler {
    command: PasswordCommands,
    deps: PasswordHandlerDeps,
}

pub struct PasswordHandlerDeps {
    pub change: Box<dyn Fn(&PasswordChangeArgs) -> AppResult<AccountSummary> + Send + Sync>,
    pub reset_request:
        Box<dyn Fn(&ResetRequestArgs) -> AppResult<ResetRequestOutcome> + Send + Sync>,
    pub reset_confirm: Box<dyn Fn(&ResetConfirmArgs) -> AppResult<AccountSummary> + Send + Sync>,
    pub render_account: Box<dyn Fn(&AccountSummary, OutputMode) -> AppResult<()> + Send + Sync>,
    pub render_reset_request:
        Box<dyn Fn(&ResetRequestOutcome, OutputMode) -> AppResult<()> + Send + Sync>,
}

impl PasswordHandlerDeps {
    pub fn new(
        change: impl Fn(&PasswordChangeArgs) -> AppResult<AccountSummary> + Send + Sync + 'static,
        reset_request: impl Fn(&ResetRequestArgs) -> AppResult<ResetRequestOutcome>
            + Send
            + Sync
            + 'static,
        reset_confirm: impl Fn(&ResetConfirmArgs) -> AppResult<AccountSummary> + Send + Sync + 'static,
        render_account: impl Fn(&AccountSummary, OutputMode) -> AppResult<()> + Send + Sync + 'static,
        render_reset_request: impl Fn(&ResetRequestOutcome, OutputMode) -> AppResult<()>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            change: Box::new(change),
            reset_request: Box::new(reset_request),
            reset_confirm: Box::new(reset_confirm),
            render_account: Box::new(render_account),
            render_reset_request: Box::new(render_reset_request),
        }
    }
}

impl Default for PasswordHandlerDeps {
    fn default() -> Self {
        Self::new(
            accounts::run_password_change,
            accounts::run_reset_request,
            accounts::run_reset_confirm,
            render_account,
            render_reset_request,
        )
    }
}

impl PasswordHandler {
    pub fn new(command: PasswordCommands) -> Self {
        Self {
            command,
            deps: PasswordHandlerDeps::default(),
        }
    }

    pub fn with_dependencies(command: PasswordCommands, deps: PasswordHandlerDeps) -> Self {
        Self { command, deps }
    }
}

impl CommandHandler for PasswordHandler {
    fn execute(&self, mode: OutputMode, _verbose: bool) -> AppResult<ExitCode> {
        match &self.command {
            PasswordCommands::Change(args) => {
                let summary = (self.deps.change)(args)?;
                (self.deps.render_account)(&summary, mode)?;
            }
            PasswordCommands::ResetRequest(args) => {
                let outcome = (self.deps.reset_request)(args)?;
                (self.deps.render_reset_request)(&outcome, mode)?;
            }
            PasswordCommands::ResetConfirm(args) => {
                let summary = (self.deps.reset_confirm)(args)?;
                (self.deps.render_account)(&summary, mode)?;
            }
        }
        Ok(ExitCode::SUCCESS)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
