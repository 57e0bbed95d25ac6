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

//! Rolling service upgrades on Rancher (1.x, Cattle) from CI pipelines.
//!
//! The crate backs three command line tools:
//!
//! * `rancher-gitlab-deploy-upgrade` upgrades (or creates) a service,
//! * `rancher-gitlab-deploy-finish-upgrade` finishes a rolled out upgrade,
//! * `rancher-gitlab-deploy-rollback` rolls it back.
//!
//! # Usage
//!
//! ```rust,no_run
//! use rancher_deploy::report::ConsoleReporter;
//! use rancher_deploy::settings::{ServiceTarget, UpgradeSettings};
//!
//! # async fn upgrade() -> rancher_deploy::Result<()> {
//! let session = rancher_deploy::Session::new(&rancher_deploy::ConnectionConfig::from_env()?)?;
//! let orchestrator = rancher_deploy::UpgradeOrchestrator::new(session, ConsoleReporter);
//! let target = ServiceTarget::new("my-group", "my-app");
//! let outcome = orchestrator.upgrade(&target, &UpgradeSettings::default()).await?;
//! println!("{:?}", outcome);
//! # Ok(()) }
//! ```

#![crate_name = "rancher_deploy"]
#![crate_type = "lib"]
// NOTE: we do not use generic deny(warnings) to avoid breakages with new
// versions of the compiler. Add more warnings here as you discover them.
#![deny(
    missing_debug_implementations,
    non_shorthand_field_patterns,
    overflowing_literals,
    path_statements,
    trivial_casts,
    unconditional_recursion,
    unsafe_code,
    unused_allocation,
    unused_comparisons,
    unused_import_braces,
    unused_parens,
    while_true
)]

#[macro_use]
extern crate serde_derive;

pub mod api;
pub mod cli;
mod error;
pub mod merge;
pub mod orchestrator;
pub mod protocol;
pub mod report;
pub mod resolve;
mod session;
pub mod settings;
#[cfg(test)]
mod test_utils;
pub mod waiter;

pub use crate::error::{Error, ErrorKind, Result};
pub use crate::orchestrator::{UpgradeOrchestrator, UpgradeOutcome};
pub use crate::session::{ApiVersion, ConnectionConfig, Session};
