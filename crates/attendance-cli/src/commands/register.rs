use std::any::Any;
use std::process::ExitCode;

use attendance_face_core::accounts::RegistrationOutcome;
use tracing::info;

use crate::accounts;
use crate::cli::{OutputMode, RegisterArgs};
use crate::commands::CommandHandler;
use crate::errors::AppResult;
use crate::output::render_registration;

pub struct RegisterHandler {
    args: RegisterArgs,
    run: Box<dyn Fn(&RegisterArgs) -> AppResult<RegistrationOutcome> + Send + Sync>,
    render: Box<dyn Fn(&RegistrationOutcome, OutputMode) -> AppResult<()> + Send + Sync>,
}

impl RegisterHandler {
    pub fn new(args: RegisterArgs) -> Self {
        Self::with_dependencies(args, accounts::run_registration, render_registration)
    }

    pub fn with_dependencies(
        args: RegisterArgs,
        run: impl Fn(&RegisterArgs) -> AppResult<RegistrationOutcome> + Send + Sync + 'static,
        render: impl Fn(&RegistrationOutcome, OutputMode) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            args,
            run: Box::new(run),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for RegisterHandler {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode> {
        let outcome = (self.run)(&self.args)?;
        if verbose && mode == OutputMode::Json {
            for line in &outcome.logs {
                info!("{line}");
            }
        }
        (self.render)(&outcome, mode)?;
        Ok(ExitCode::SUCCESS)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
