use std::any::Any;
use std::process::ExitCode;

use attendance_face_core::accounts::AccountSummary;

use crate::accounts;
use crate::cli::{InstructorCommands, OutputMode};
use crate::commands::CommandHandler;
use crate::errors::AppResult;
use crate::output::render_account;

pub struct InstructorHandler {
    command: InstructorCommands,
    run: Box<dyn Fn(&InstructorCommands) -> AppResult<AccountSummary> + Send + Sync>,
    render: Box<dyn Fn(&AccountSummary, OutputMode) -> AppResult<()> + Send + Sync>,
}

fn run_instructor_command(command: &InstructorCommands) -> AppResult<AccountSummary> {
    match command {
        InstructorCommands::Create(args) => accounts::run_instructor_create(args),
        InstructorCommands::Update(args) => accounts::run_instructor_update(args),
    }
}

impl InstructorHandler {
    pub fn new(command: InstructorCommands) -> Self {
        Self::with_dependencies(command, run_instructor_command, render_account)
    }

    pub fn with_dependencies(
        command: InstructorCommands,
        run: impl Fn(&InstructorCommands) -> AppResult<AccountSummary> + Send + Sync + 'static,
        render: impl Fn(&AccountSummary, OutputMode) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            command,
            run: Box::new(run),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for InstructorHandler {
    fn execute(&self, mode: OutputMode, _verbose: bool) -> AppResult<ExitCode> {
        let summary = (self.run)(&self.command)?;
        (self.render)(&summary, mode)?;
        Ok(ExitCode::SUCCESS)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
