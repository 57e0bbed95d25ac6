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

//! Progress reporting for the person reading the CI job log.

use colored::Colorize;

/// Receiver of user-facing progress messages.
///
/// Diagnostics go through the `log` crate, this is only for what the CI log
/// should show regardless of the log level.
pub trait Reporter: Send + Sync {
    /// Normal progress.
    fn info(&self, message: &str);

    /// Something unexpected that does not stop the run.
    fn warn(&self, message: &str);

    /// A failure that ends the run.
    fn error(&self, message: &str);
}

/// Colored output on the console.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn info(&self, message: &str) {
        println!("{}", message.green());
    }

    fn warn(&self, message: &str) {
        println!("{}", message.yellow());
    }

    fn error(&self, message: &str) {
        println!("{}", format!("Error: {}", message).red());
    }
}

/// Discards all messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn info(&self, _message: &str) {}

    fn warn(&self, _message: &str) {}

    fn error(&self, _message: &str) {}
}

impl<R: Reporter + ?Sized> Reporter for &R {
    fn info(&self, message: &str) {
        (**self).info(message)
    }

    fn warn(&self, message: &str) {
        (**self).warn(message)
    }

    fn error(&self, message: &str) {
        (**self).error(message)
    }
}
