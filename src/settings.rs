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

//! What to deploy and how.

use std::collections::HashMap;
use std::time::Duration;

use crate::{Error, ErrorKind, Result};

/// Default timeout for upgrades, finishes and rollbacks.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Environment, stack and service names as given by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTarget {
    /// Environment ID or name, `None` to pick the first one.
    pub environment: Option<String>,
    /// Stack name.
    pub stack: String,
    /// Service name.
    pub service: String,
}

impl ServiceTarget {
    /// Target a service in the default environment.
    pub fn new<S1, S2>(stack: S1, service: S2) -> ServiceTarget
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        ServiceTarget {
            environment: None,
            stack: stack.into(),
            service: service.into(),
        }
    }

    /// Pick an environment by ID or name.
    pub fn with_environment<S: Into<String>>(mut self, environment: S) -> ServiceTarget {
        self.environment = Some(environment.into());
        self
    }
}

/// Rolling upgrade parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Number of containers to upgrade at once.
    pub batch_size: u32,
    /// Pause between batches.
    pub interval: Duration,
    /// Start new containers before stopping the old ones.
    pub start_first: bool,
}

impl Default for BatchOptions {
    fn default() -> BatchOptions {
        BatchOptions {
            batch_size: 1,
            interval: Duration::from_secs(2),
            start_first: false,
        }
    }
}

/// Changes to apply to the service configuration.
///
/// Empty collections and `None` mean "keep what the service has".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// New image (with tag) for the main container.
    pub image: Option<String>,
    /// New images for sidekicks, by sidekick name.
    pub sidekick_images: Vec<(String, String)>,
    /// Send sidekick configurations with the upgrade.
    pub include_sidekicks: bool,
    /// Labels replacing the current ones.
    pub labels: HashMap<String, String>,
    /// Environment variables replacing the current ones.
    pub environment: HashMap<String, String>,
    /// Names of secrets to attach.
    pub secrets: Vec<String>,
    /// Service links as (link name, target service name).
    pub service_links: Vec<(String, String)>,
    /// Host to schedule a newly created service on.
    pub host_id: Option<String>,
}

/// Everything the upgrade flow needs besides the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeSettings {
    /// Configuration changes.
    pub overrides: Overrides,
    /// Batch parameters.
    pub batch: BatchOptions,
    /// Timeout for every wait.
    pub timeout: Duration,
    /// Wait for the upgrade to be rolled out.
    pub wait_for_upgrade: bool,
    /// Roll back when the upgrade does not finish in time.
    pub rollback_on_error: bool,
    /// Finish the upgrade once rolled out.
    pub finish_upgrade: bool,
    /// Create the stack and the service if missing.
    pub create: bool,
}

impl Default for UpgradeSettings {
    fn default() -> UpgradeSettings {
        UpgradeSettings {
            overrides: Overrides::default(),
            batch: BatchOptions::default(),
            timeout: DEFAULT_TIMEOUT,
            wait_for_upgrade: true,
            rollback_on_error: false,
            finish_upgrade: true,
            create: false,
        }
    }
}

fn split_key_value(item: &str) -> Result<(&str, &str)> {
    item.split_once('=').ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidInput,
            format!("Expected key=value, got '{}'", item),
        )
    })
}

/// Parse `key=value` items separated by `separator`.
///
/// Items are trimmed and empty ones skipped; only the first `=` splits.
pub fn parse_key_values(input: &str, separator: &str) -> Result<Vec<(String, String)>> {
    input
        .split(separator)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (key, value) = split_key_value(item)?;
            Ok((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Parse labels separated by `separator`.
///
/// Keys and values are kept verbatim, so every item must contain `=`.
pub fn parse_labels(input: &str, separator: &str) -> Result<Vec<(String, String)>> {
    input
        .split(separator)
        .map(|item| {
            let (key, value) = split_key_value(item)?;
            Ok((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Parse a comma-separated list of names; `name=...` items keep the name.
pub fn parse_names(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|item| item.split('=').next().unwrap_or_default().trim())
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_key_values() {
        let parsed = parse_key_values(" A=1, B = two words ,,C=x=y", ",").unwrap();
        assert_eq!(
            parsed,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "two words".to_string()),
                ("C".to_string(), "x=y".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_key_values_custom_separator() {
        let parsed = parse_key_values("traefik.frontend.rule=Host:a.com,b.com|tier=web", "|")
            .unwrap();
        assert_eq!(parsed[0].1, "Host:a.com,b.com");
        assert_eq!(parsed[1], ("tier".to_string(), "web".to_string()));
    }

    #[test]
    fn test_parse_key_values_invalid() {
        let err = parse_key_values("A=1,oops", ",").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_parse_labels_verbatim() {
        let parsed = parse_labels("tier= web ;owner=team a", ";").unwrap();
        assert_eq!(
            parsed,
            vec![
                ("tier".to_string(), " web ".to_string()),
                ("owner".to_string(), "team a".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_labels_empty_item() {
        let err = parse_labels("a=1,,b=2", ",").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(
            parse_names("db-password, api-token=ignored,,"),
            vec!["db-password".to_string(), "api-token".to_string()]
        );
    }

    #[test]
    fn test_defaults() {
        let settings = UpgradeSettings::default();
        assert_eq!(settings.timeout, Duration::from_secs(300));
        assert_eq!(settings.batch.batch_size, 1);
        assert_eq!(settings.batch.interval, Duration::from_secs(2));
        assert!(settings.wait_for_upgrade && settings.finish_upgrade);
        assert!(!settings.rollback_on_error && !settings.create);
    }
}
