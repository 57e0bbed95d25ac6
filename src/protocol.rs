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

//! JSON structures and protocol bits for the Rancher API.
//!
//! Rancher 1.x naming is confusing: what the UI calls an *environment* is a
//! `project` in the API, and a *stack* is an `environment`. The structures
//! here use the UI names.

#![allow(non_snake_case)]

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Deserialize `null` the same way as a missing field.
fn null_as_default<'de, D, T>(des: D) -> ::std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let value: Option<T> = Deserialize::deserialize(des)?;
    Ok(value.unwrap_or_default())
}

/// A generic collection returned by list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Collection<T> {
    pub data: Vec<T>,
}

/// An environment (`project` in the API).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Environment {
    pub id: String,
    #[serde(deserialize_with = "null_as_default", default)]
    pub name: String,
}

/// A stack (`environment` in the v1 API).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Stack {
    pub id: String,
    #[serde(deserialize_with = "null_as_default", default)]
    pub name: String,
}

/// A request to create a stack.
#[derive(Debug, Clone, Serialize)]
pub struct NewStack {
    pub name: String,
}

/// A secret stored in an environment.
#[derive(Debug, Clone, Deserialize)]
pub struct Secret {
    pub id: String,
    #[serde(deserialize_with = "null_as_default", default)]
    pub name: String,
}

/// State of a service.
///
/// Only `active` and `upgraded` are meaningful for upgrades, anything else is
/// kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum ServiceState {
    /// Idle, can be upgraded.
    Active,
    /// An upgrade has been rolled out, needs finishing or a rollback.
    Upgraded,
    /// Any other (usually transient) state.
    Other(String),
}

impl ServiceState {
    /// The state as it appears in the API.
    pub fn as_str(&self) -> &str {
        match self {
            ServiceState::Active => "active",
            ServiceState::Upgraded => "upgraded",
            ServiceState::Other(s) => s,
        }
    }
}

impl From<String> for ServiceState {
    fn from(value: String) -> ServiceState {
        match value.as_str() {
            "active" => ServiceState::Active,
            "upgraded" => ServiceState::Upgraded,
            _ => ServiceState::Other(value),
        }
    }
}

impl From<&str> for ServiceState {
    fn from(value: &str) -> ServiceState {
        ServiceState::from(value.to_string())
    }
}

impl From<ServiceState> for String {
    fn from(value: ServiceState) -> String {
        match value {
            ServiceState::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reference to a secret inside a launch configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SecretReference {
    #[serde(rename = "type", default = "secret_reference_type")]
    pub kind: String,
    #[serde(deserialize_with = "null_as_default", default)]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secretId: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn secret_reference_type() -> String {
    "secretReference".to_string()
}

impl SecretReference {
    /// A reference to the named secret, not yet resolved to an ID.
    pub fn named<S: Into<String>>(name: S) -> SecretReference {
        SecretReference {
            kind: secret_reference_type(),
            name: name.into(),
            secretId: None,
            extra: Map::new(),
        }
    }
}

/// Launch configuration of a service or a sidekick.
///
/// Fields that are not modelled here are kept in `extra` and sent back as is.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LaunchConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imageUuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secrets: Option<Vec<SecretReference>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requestedHostId: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A service.
#[derive(Debug, Clone, Deserialize)]
pub struct Service {
    pub id: String,
    #[serde(deserialize_with = "null_as_default", default)]
    pub name: String,
    pub state: ServiceState,
    #[serde(deserialize_with = "null_as_default", default)]
    pub launchConfig: LaunchConfig,
    #[serde(deserialize_with = "null_as_default", default)]
    pub secondaryLaunchConfigs: Vec<LaunchConfig>,
}

/// A request to create a service.
#[derive(Debug, Clone, Serialize)]
pub struct NewService {
    pub name: String,
    pub stackId: String,
    pub startOnCreate: bool,
    pub launchConfig: LaunchConfig,
}

/// A link from one service to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceLink {
    pub name: String,
    pub serviceId: String,
}

/// Body of the `setservicelinks` action.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceLinks {
    pub serviceLinks: Vec<ServiceLink>,
}

/// Rolling upgrade parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InServiceStrategy {
    pub batchSize: u32,
    pub intervalMillis: u64,
    pub startFirst: bool,
    pub launchConfig: LaunchConfig,
    pub secondaryLaunchConfigs: Vec<LaunchConfig>,
}

/// Body of the `upgrade` action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpgradeRequest {
    pub inServiceStrategy: InServiceStrategy,
}

/// Actions that can be invoked on a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceAction {
    Upgrade,
    FinishUpgrade,
    Rollback,
    SetServiceLinks,
}

impl ServiceAction {
    /// Name of the action in the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceAction::Upgrade => "upgrade",
            ServiceAction::FinishUpgrade => "finishupgrade",
            ServiceAction::Rollback => "rollback",
            ServiceAction::SetServiceLinks => "setservicelinks",
        }
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
