// Copyright 2026 rancher-gitlab-deploy contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Finish a rolled out upgrade of a Rancher service.

use std::process::ExitCode;

use clap::Parser;

use rancher_deploy::cli::{self, FinishUpgradeCommand};
use rancher_deploy::report::ConsoleReporter;
use rancher_deploy::{Result, UpgradeOrchestrator};

async fn run(cmd: &FinishUpgradeCommand) -> Result<()> {
    let session = cmd.connection.session()?;
    UpgradeOrchestrator::new(session, ConsoleReporter)
        .with_cancellation(cli::cancel_on_ctrl_c())
        .finish_upgrade(&cmd.connection.target(), cmd.timeout())
        .await
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cmd = FinishUpgradeCommand::parse();
    cli::init_logging(cmd.connection.debug());
    match run(&cmd).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => cli::fail(&err),
    }
}
