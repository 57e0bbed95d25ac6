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

//! Command line arguments shared by the binaries.
//!
//! Every flag can be negated (`--debug`/`--no-debug`); the last one given
//! wins.

use std::collections::HashMap;
use std::fmt;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser};
use log::{warn, LevelFilter};
use tokio_util::sync::CancellationToken;

use crate::report::{ConsoleReporter, Reporter};
use crate::settings::{
    parse_key_values, parse_labels, parse_names, BatchOptions, Overrides, ServiceTarget,
    UpgradeSettings,
};
use crate::{ConnectionConfig, Error, Result, Session};

/// Rancher connection and the service to act on.
#[derive(Args, Clone)]
pub struct ConnectionArgs {
    /// The URL for your Rancher server, eg: http://rancher:8000
    #[arg(long, env = "RANCHER_URL")]
    pub rancher_url: String,

    /// The environment or account API key
    #[arg(long, env = "RANCHER_ACCESS_KEY")]
    pub rancher_key: String,

    /// The secret for the access API key
    #[arg(long, env = "RANCHER_SECRET_KEY", hide_env_values = true)]
    pub rancher_secret: String,

    /// The name or ID of the environment (only needed with an account API key)
    #[arg(long)]
    pub environment: Option<String>,

    /// The name of the stack in Rancher (defaults to the GitLab group)
    #[arg(long, env = "CI_PROJECT_NAMESPACE")]
    pub stack: String,

    /// The name of the service in Rancher (defaults to the GitLab project)
    #[arg(long, env = "CI_PROJECT_NAME")]
    pub service: String,

    /// Enable HTTP debugging
    #[arg(long, overrides_with = "no_debug")]
    debug: bool,

    /// Disable HTTP debugging
    #[arg(long, overrides_with = "debug")]
    no_debug: bool,

    /// Check the server certificate (default)
    #[arg(long, overrides_with = "no_ssl_verify")]
    ssl_verify: bool,

    /// Disable certificate checks, e.g. for a self-signed certificate
    #[arg(long, overrides_with = "ssl_verify")]
    no_ssl_verify: bool,
}

impl fmt::Debug for ConnectionArgs {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ConnectionArgs")
            .field("rancher_url", &self.rancher_url)
            .field("rancher_key", &self.rancher_key)
            .field("environment", &self.environment)
            .field("stack", &self.stack)
            .field("service", &self.service)
            .field("debug", &self.debug())
            .field("ssl_verify", &self.ssl_verify())
            .finish()
    }
}

impl ConnectionArgs {
    /// Whether `--debug` is in effect.
    pub fn debug(&self) -> bool {
        toggle(self.debug, self.no_debug, false)
    }

    /// Whether certificates are verified.
    pub fn ssl_verify(&self) -> bool {
        toggle(self.ssl_verify, self.no_ssl_verify, true)
    }

    /// Connection configuration.
    pub fn config(&self) -> ConnectionConfig {
        ConnectionConfig::new(
            self.rancher_url.clone(),
            self.rancher_key.clone(),
            self.rancher_secret.clone(),
        )
        .with_ssl_verify(self.ssl_verify())
    }

    /// Open a session to Rancher.
    pub fn session(&self) -> Result<Session> {
        Session::new(&self.config())
    }

    /// The service to act on.
    pub fn target(&self) -> ServiceTarget {
        let target = ServiceTarget::new(self.stack.clone(), self.service.clone());
        match self.environment {
            Some(ref environment) => target.with_environment(environment.clone()),
            None => target,
        }
    }
}

/// Performs an in service upgrade of the service specified on the command line.
#[derive(Parser, Debug, Clone)]
#[command(name = "rancher-gitlab-deploy-upgrade", version)]
pub struct UpgradeCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Separator for --labels where ',' could cause issues
    #[arg(long, env = "RANCHER_LABEL_SEPARATOR", default_value = ",")]
    pub rancher_label_separator: String,

    /// Start new containers before stopping the old ones
    #[arg(long, overrides_with = "no_start_before_stopping")]
    start_before_stopping: bool,

    /// Stop old containers before starting new ones (default)
    #[arg(long, overrides_with = "start_before_stopping")]
    no_start_before_stopping: bool,

    /// Number of containers to upgrade at once
    #[arg(long, default_value_t = 1)]
    pub batch_size: u32,

    /// Number of seconds to wait between upgrade batches
    #[arg(long, default_value_t = 2)]
    pub batch_interval: u64,

    /// How long to wait, in seconds, for the upgrade to finish
    #[arg(long, default_value_t = 300)]
    pub upgrade_timeout: u64,

    /// Wait for Rancher to finish the upgrade before exiting (default)
    #[arg(long, overrides_with = "no_wait_for_upgrade_to_finish")]
    wait_for_upgrade_to_finish: bool,

    /// Exit as soon as the upgrade is requested
    #[arg(long, overrides_with = "wait_for_upgrade_to_finish")]
    no_wait_for_upgrade_to_finish: bool,

    /// Roll the upgrade back if it does not complete in time
    #[arg(long, overrides_with = "no_rollback_on_error")]
    rollback_on_error: bool,

    /// Leave a timed out upgrade as it is (default)
    #[arg(long, overrides_with = "rollback_on_error")]
    no_rollback_on_error: bool,

    /// Replace the image (and :tag) with this one during the upgrade
    #[arg(long)]
    pub new_image: Option<String>,

    /// Mark the upgrade as finished after it completes (default)
    #[arg(long, overrides_with = "no_finish_upgrade")]
    finish_upgrade: bool,

    /// Leave the service in the 'upgraded' state
    #[arg(long, overrides_with = "finish_upgrade")]
    no_finish_upgrade: bool,

    /// Upgrade service sidekicks at the same time
    #[arg(long, overrides_with = "no_sidekicks")]
    sidekicks: bool,

    /// Leave sidekicks alone (default)
    #[arg(long, overrides_with = "sidekicks")]
    no_sidekicks: bool,

    /// Replace the image of the named sidekick during the upgrade
    #[arg(long, num_args = 2, value_names = ["SIDEKICK", "IMAGE"])]
    new_sidekick_image: Vec<String>,

    /// Create the stack and the service if they don't exist
    #[arg(long, overrides_with = "no_create")]
    create: bool,

    /// Fail if the stack or the service don't exist (default)
    #[arg(long, overrides_with = "create")]
    no_create: bool,

    /// List of key=value labels for the service
    #[arg(long)]
    pub labels: Option<String>,

    /// Add a label to the service
    #[arg(long, num_args = 2, value_names = ["KEY", "VALUE"])]
    label: Vec<String>,

    /// Comma separated list of key=value environment variables
    #[arg(long)]
    pub variables: Option<String>,

    /// Add an environment variable to the service
    #[arg(long, num_args = 2, value_names = ["KEY", "VALUE"])]
    variable: Vec<String>,

    /// Comma separated list of link=service service links
    #[arg(long)]
    pub service_links: Option<String>,

    /// Add a service link to the service
    #[arg(long, num_args = 2, value_names = ["NAME", "SERVICE"])]
    service_link: Vec<String>,

    /// Deploy a newly created service on this host
    #[arg(long)]
    pub host_id: Option<String>,

    /// Comma separated list of secret names
    #[arg(long)]
    pub secrets: Option<String>,

    /// Add a secret to the service
    #[arg(long)]
    pub secret: Vec<String>,
}

impl UpgradeCommand {
    /// Upgrade settings described by the arguments.
    pub fn settings(&self) -> Result<UpgradeSettings> {
        let mut labels = match self.labels {
            Some(ref labels) => to_map(parse_labels(labels, &self.rancher_label_separator)?),
            None => HashMap::new(),
        };
        labels.extend(pairs(&self.label));

        let mut environment = match self.variables {
            Some(ref variables) => to_map(parse_key_values(variables, ",")?),
            None => HashMap::new(),
        };
        environment.extend(pairs(&self.variable));

        let mut service_links = match self.service_links {
            Some(ref links) => parse_key_values(links, ",")?,
            None => Vec::new(),
        };
        service_links.extend(pairs(&self.service_link));

        let mut secrets = match self.secrets {
            Some(ref secrets) => parse_names(secrets),
            None => Vec::new(),
        };
        secrets.extend(self.secret.iter().cloned());

        Ok(UpgradeSettings {
            overrides: Overrides {
                image: self.new_image.clone(),
                sidekick_images: pairs(&self.new_sidekick_image),
                include_sidekicks: toggle(self.sidekicks, self.no_sidekicks, false),
                labels,
                environment,
                secrets,
                service_links,
                host_id: self.host_id.clone(),
            },
            batch: BatchOptions {
                batch_size: self.batch_size,
                interval: Duration::from_secs(self.batch_interval),
                start_first: toggle(
                    self.start_before_stopping,
                    self.no_start_before_stopping,
                    false,
                ),
            },
            timeout: Duration::from_secs(self.upgrade_timeout),
            wait_for_upgrade: toggle(
                self.wait_for_upgrade_to_finish,
                self.no_wait_for_upgrade_to_finish,
                true,
            ),
            rollback_on_error: toggle(self.rollback_on_error, self.no_rollback_on_error, false),
            finish_upgrade: toggle(self.finish_upgrade, self.no_finish_upgrade, true),
            create: toggle(self.create, self.no_create, false),
        })
    }
}

/// Marks a rolled out upgrade of the service as finished.
#[derive(Parser, Debug, Clone)]
#[command(name = "rancher-gitlab-deploy-finish-upgrade", version)]
pub struct FinishUpgradeCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// How long to wait, in seconds, for the upgrade to be finished
    #[arg(long, default_value_t = 300)]
    pub upgrade_timeout: u64,
}

impl FinishUpgradeCommand {
    /// Timeout for the finish.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.upgrade_timeout)
    }
}

/// Rolls back a rolled out upgrade of the service.
#[derive(Parser, Debug, Clone)]
#[command(name = "rancher-gitlab-deploy-rollback", version)]
pub struct RollbackCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// How long to wait, in seconds, for the rollback to finish
    #[arg(long, default_value_t = 300)]
    pub rollback_timeout: u64,
}

impl RollbackCommand {
    /// Timeout for the rollback.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.rollback_timeout)
    }
}

/// Set up `env_logger`.
///
/// Only warnings are logged by default, `debug` enables debug logging of
/// this crate and the HTTP client. `RUST_LOG` overrides both.
pub fn init_logging(debug: bool) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(LevelFilter::Warn);
    if debug {
        builder
            .filter_module("rancher_deploy", LevelFilter::Debug)
            .filter_module("reqwest", LevelFilter::Debug);
    }
    builder.parse_env(env_logger::Env::default());
    // Another logger may already be installed.
    builder.try_init().ok();
}

/// A token cancelled on Ctrl-C.
///
/// Must be called from within a tokio runtime.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    let _ = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, giving up");
            cancel.cancel();
        }
    });
    token
}

/// Print the error and return the failure exit code.
pub fn fail(error: &Error) -> ExitCode {
    ConsoleReporter.error(&error.to_string());
    ExitCode::FAILURE
}

#[inline]
fn toggle(on: bool, off: bool, default: bool) -> bool {
    if on {
        true
    } else if off {
        false
    } else {
        default
    }
}

fn pairs(values: &[String]) -> Vec<(String, String)> {
    values
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect()
}

fn to_map(items: Vec<(String, String)>) -> HashMap<String, String> {
    items.into_iter().collect()
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use clap::Parser;

    use super::{FinishUpgradeCommand, RollbackCommand, UpgradeCommand};
    use crate::ErrorKind;

    const CONNECTION: [&str; 11] = [
        "prog",
        "--rancher-url",
        "http://rancher:8080",
        "--rancher-key",
        "key",
        "--rancher-secret",
        "secret",
        "--stack",
        "my.group",
        "--service",
        "my-app",
    ];

    fn args(extra: &[&str]) -> Vec<String> {
        CONNECTION
            .iter()
            .chain(extra.iter())
            .map(|arg| arg.to_string())
            .collect()
    }

    fn upgrade(extra: &[&str]) -> UpgradeCommand {
        UpgradeCommand::try_parse_from(args(extra)).unwrap()
    }

    #[test]
    fn test_upgrade_defaults() {
        let cmd = upgrade(&[]);
        assert!(!cmd.connection.debug());
        assert!(cmd.connection.ssl_verify());
        let target = cmd.connection.target();
        assert_eq!(target.stack, "my.group");
        assert!(target.environment.is_none());

        let settings = cmd.settings().unwrap();
        assert_eq!(settings.timeout, Duration::from_secs(300));
        assert_eq!(settings.batch.batch_size, 1);
        assert_eq!(settings.batch.interval, Duration::from_secs(2));
        assert!(!settings.batch.start_first);
        assert!(settings.wait_for_upgrade);
        assert!(settings.finish_upgrade);
        assert!(!settings.rollback_on_error);
        assert!(!settings.create);
        assert!(!settings.overrides.include_sidekicks);
        assert!(settings.overrides.labels.is_empty());
    }

    #[test]
    fn test_negated_flags() {
        let cmd = upgrade(&[
            "--no-ssl-verify",
            "--debug",
            "--no-wait-for-upgrade-to-finish",
            "--no-finish-upgrade",
            "--rollback-on-error",
            "--create",
            "--no-create",
        ]);
        assert!(cmd.connection.debug());
        assert!(!cmd.connection.ssl_verify());
        let settings = cmd.settings().unwrap();
        assert!(!settings.wait_for_upgrade);
        assert!(!settings.finish_upgrade);
        assert!(settings.rollback_on_error);
        assert!(!settings.create);
    }

    #[test]
    fn test_labels_keep_whitespace() {
        let cmd = upgrade(&["--labels", "team= core ,tier=web", "--variables", "A= 1 "]);
        let settings = cmd.settings().unwrap();
        assert_eq!(settings.overrides.labels["team"], " core ");
        assert_eq!(settings.overrides.labels["tier"], "web");
        assert_eq!(settings.overrides.environment["A"], "1");
    }

    #[test]
    fn test_labels_and_variables() {
        let cmd = upgrade(&[
            "--labels",
            "a=1;b=x,y",
            "--rancher-label-separator",
            ";",
            "--label",
            "b",
            "2",
            "--variables",
            " MODE = production ,, DEBUG=0",
            "--variable",
            "DEBUG",
            "1",
        ]);
        let settings = cmd.settings().unwrap();
        let labels = &settings.overrides.labels;
        assert_eq!(labels.len(), 2);
        assert_eq!(labels["a"], "1");
        assert_eq!(labels["b"], "2");
        let environment = &settings.overrides.environment;
        assert_eq!(environment["MODE"], "production");
        assert_eq!(environment["DEBUG"], "1");
    }

    #[test]
    fn test_sidekicks_links_and_secrets() {
        let cmd = upgrade(&[
            "--new-image",
            "registry.example.com/web:2.0",
            "--new-sidekick-image",
            "logs",
            "fluentd:2",
            "--service-links",
            "db=postgres",
            "--service-link",
            "cache",
            "redis",
            "--secrets",
            "db-password,api-token=x",
            "--secret",
            "tls-cert",
            "--host-id",
            "1h3",
        ]);
        let overrides = cmd.settings().unwrap().overrides;
        assert_eq!(overrides.image.as_deref(), Some("registry.example.com/web:2.0"));
        assert_eq!(
            overrides.sidekick_images,
            vec![("logs".to_string(), "fluentd:2".to_string())]
        );
        assert_eq!(
            overrides.service_links,
            vec![
                ("db".to_string(), "postgres".to_string()),
                ("cache".to_string(), "redis".to_string()),
            ]
        );
        assert_eq!(overrides.secrets, vec!["db-password", "api-token", "tls-cert"]);
        assert_eq!(overrides.host_id.as_deref(), Some("1h3"));
    }

    #[test]
    fn test_invalid_labels() {
        let err = upgrade(&["--labels", "oops"]).settings().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_timeouts() {
        let cmd = FinishUpgradeCommand::try_parse_from(args(&["--upgrade-timeout", "60"])).unwrap();
        assert_eq!(cmd.timeout(), Duration::from_secs(60));

        let cmd = RollbackCommand::try_parse_from(args(&[])).unwrap();
        assert_eq!(cmd.timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_environment() {
        let cmd = RollbackCommand::try_parse_from(args(&["--environment", "Staging"])).unwrap();
        assert_eq!(cmd.connection.target().environment.as_deref(), Some("Staging"));
    }
}
