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

//! In-memory doubles for unit tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;

use crate::api::RancherApi;
use crate::protocol::*;
use crate::report::Reporter;
use crate::waiter::Clock;
use crate::{Error, ErrorKind, Result};

pub const ENVIRONMENT_ID: &str = "1a5";
pub const STACK_ID: &str = "1st1";

/// A mutating call recorded by the fake.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateStack(String),
    CreateService(String),
    SetServiceLinks(String, Vec<ServiceLink>),
    Action(ServiceAction, Option<UpgradeRequest>),
}

#[derive(Debug, Default)]
struct State {
    environments: Vec<Environment>,
    stacks: Vec<Stack>,
    services: Vec<(String, Service)>,
    secrets: Vec<Secret>,
    scripted: VecDeque<ServiceState>,
    calls: Vec<Call>,
    gets: usize,
    failing_action: Option<ServiceAction>,
}

/// Fake Rancher with one environment and one stack (`my-group`).
#[derive(Debug)]
pub struct FakeRancher {
    state: Mutex<State>,
}

impl FakeRancher {
    pub fn new() -> FakeRancher {
        let state = State {
            environments: vec![Environment {
                id: ENVIRONMENT_ID.into(),
                name: "Default".into(),
            }],
            stacks: vec![Stack {
                id: STACK_ID.into(),
                name: "my-group".into(),
            }],
            ..State::default()
        };
        FakeRancher {
            state: Mutex::new(state),
        }
    }

    pub fn with_environment(self, id: &str, name: &str) -> FakeRancher {
        self.state.lock().unwrap().environments.push(Environment {
            id: id.into(),
            name: name.into(),
        });
        self
    }

    pub fn without_environments(self) -> FakeRancher {
        self.state.lock().unwrap().environments.clear();
        self
    }

    /// Add a service with a main container and a `logs` sidekick.
    pub fn with_service(self, name: &str, state: &str) -> FakeRancher {
        {
            let mut inner = self.state.lock().unwrap();
            let id = format!("1s{}", inner.services.len() + 1);
            let service: Service = serde_json::from_value(json!({
                "id": id,
                "name": name,
                "state": state,
                "launchConfig": {
                    "imageUuid": "docker:registry.example.com/web:1.0",
                    "labels": {"io.rancher.container.pull_image": "always"},
                    "environment": {"MODE": "production"},
                    "ports": ["8080:80/tcp"]
                },
                "secondaryLaunchConfigs": [
                    {"name": "logs", "imageUuid": "docker:fluentd:1"}
                ]
            }))
            .unwrap();
            inner.services.push((STACK_ID.to_string(), service));
        }
        self
    }

    pub fn with_secret(self, id: &str, name: &str) -> FakeRancher {
        self.state.lock().unwrap().secrets.push(Secret {
            id: id.into(),
            name: name.into(),
        });
        self
    }

    pub fn with_failing_action(self, action: ServiceAction) -> FakeRancher {
        self.state.lock().unwrap().failing_action = Some(action);
        self
    }

    /// States returned by consecutive `get_service` calls; the last one sticks.
    pub fn script_states<I, S>(&self, states: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<ServiceState>,
    {
        self.state
            .lock()
            .unwrap()
            .scripted
            .extend(states.into_iter().map(Into::into));
    }

    pub fn service(&self, name: &str) -> Service {
        self.state
            .lock()
            .unwrap()
            .services
            .iter()
            .find(|(_, s)| s.name == name)
            .map(|(_, s)| s.clone())
            .expect("no such service")
    }

    pub fn stacks(&self) -> Vec<Stack> {
        self.state.lock().unwrap().stacks.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn actions(&self) -> Vec<ServiceAction> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Action(action, _) => Some(action),
                _ => None,
            })
            .collect()
    }

    pub fn upgrade_requests(&self) -> Vec<UpgradeRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Action(_, Some(request)) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn get_count(&self) -> usize {
        self.state.lock().unwrap().gets
    }
}

#[async_trait]
impl RancherApi for FakeRancher {
    async fn list_environments(&self) -> Result<Vec<Environment>> {
        Ok(self.state.lock().unwrap().environments.clone())
    }

    async fn find_secrets(&self, _environment_id: &str, name: &str) -> Result<Vec<Secret>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .secrets
            .iter()
            .filter(|s| s.name == name)
            .cloned()
            .collect())
    }

    async fn list_stacks(&self, _environment_id: &str) -> Result<Vec<Stack>> {
        Ok(self.stacks())
    }

    async fn create_stack(&self, _environment_id: &str, stack: &NewStack) -> Result<Stack> {
        let mut inner = self.state.lock().unwrap();
        let created = Stack {
            id: format!("1st{}", inner.stacks.len() + 1),
            name: stack.name.clone(),
        };
        inner.stacks.push(created.clone());
        inner.calls.push(Call::CreateStack(stack.name.clone()));
        Ok(created)
    }

    async fn list_services(&self, _environment_id: &str, stack_id: &str) -> Result<Vec<Service>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .services
            .iter()
            .filter(|(stack, _)| stack == stack_id)
            .map(|(_, s)| s.clone())
            .collect())
    }

    async fn create_service(&self, _environment_id: &str, service: &NewService) -> Result<Service> {
        let mut inner = self.state.lock().unwrap();
        let created = Service {
            id: format!("1s{}", inner.services.len() + 1),
            name: service.name.clone(),
            state: ServiceState::Other("activating".into()),
            launchConfig: service.launchConfig.clone(),
            secondaryLaunchConfigs: Vec::new(),
        };
        inner
            .services
            .push((service.stackId.clone(), created.clone()));
        inner.calls.push(Call::CreateService(service.name.clone()));
        Ok(created)
    }

    async fn get_service(&self, _environment_id: &str, service_id: &str) -> Result<Service> {
        let mut inner = self.state.lock().unwrap();
        inner.gets += 1;
        let next = inner.scripted.pop_front();
        let last = inner.scripted.is_empty();
        let entry = inner
            .services
            .iter_mut()
            .find(|(_, s)| s.id == service_id)
            .ok_or_else(|| Error::new(ErrorKind::ResourceNotFound, "no such service"))?;
        if let Some(state) = next {
            entry.1.state = state.clone();
            if last {
                // Keep returning the final scripted state.
                inner.scripted.push_back(state);
            }
        }
        let found = inner
            .services
            .iter()
            .find(|(_, s)| s.id == service_id)
            .map(|(_, s)| s.clone())
            .ok_or_else(|| Error::new(ErrorKind::ResourceNotFound, "no such service"))?;
        Ok(found)
    }

    async fn set_service_links(
        &self,
        _environment_id: &str,
        service_id: &str,
        links: &[ServiceLink],
    ) -> Result<Service> {
        let mut inner = self.state.lock().unwrap();
        inner
            .calls
            .push(Call::SetServiceLinks(service_id.to_string(), links.to_vec()));
        inner
            .services
            .iter()
            .find(|(_, s)| s.id == service_id)
            .map(|(_, s)| s.clone())
            .ok_or_else(|| Error::new(ErrorKind::ResourceNotFound, "no such service"))
    }

    async fn service_action(
        &self,
        _environment_id: &str,
        _service_id: &str,
        action: ServiceAction,
        upgrade: Option<&UpgradeRequest>,
    ) -> Result<()> {
        let mut inner = self.state.lock().unwrap();
        inner.calls.push(Call::Action(action, upgrade.cloned()));
        if inner.failing_action == Some(action) {
            return Err(Error::new(ErrorKind::ActionFailed, "HTTP 422"));
        }
        Ok(())
    }
}

/// Clock that advances only when slept on.
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> ManualClock {
        ManualClock {
            start: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        *self.elapsed.lock().unwrap() += duration;
    }
}

/// Reporter that remembers messages.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    infos: Mutex<Vec<String>>,
    warnings: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn infos(&self) -> Vec<String> {
        self.infos.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().unwrap().clone()
    }
}

impl Reporter for RecordingReporter {
    fn info(&self, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }

    fn warn(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}
