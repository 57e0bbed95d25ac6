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

//! Upgrade, finish and rollback flows.
//!
//! A service goes `active` → `upgraded` when an upgrade has been rolled out,
//! then back to `active` either by finishing the upgrade or by rolling it
//! back. Every flow here dispatches one of those actions and then polls the
//! service until the expected state shows up.

use std::time::Duration;

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use crate::api::RancherApi;
use crate::merge::{build_upgrade, image_uuid};
use crate::protocol::{
    Environment, LaunchConfig, NewService, SecretReference, Service, ServiceAction, ServiceState,
    Stack,
};
use crate::report::Reporter;
use crate::resolve;
use crate::settings::{ServiceTarget, UpgradeSettings};
use crate::waiter::{wait, Clock, ServiceStateWaiter, SystemClock};
use crate::{Error, ErrorKind, Result};

/// How an upgrade run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// The service did not exist and was created instead.
    Created,
    /// The upgrade was requested, nobody waited for it.
    Started,
    /// The upgrade was rolled out but not finished.
    Upgraded,
    /// The upgrade was rolled out and finished.
    Finished,
    /// The upgrade timed out and was rolled back.
    RolledBack,
}

impl UpgradeOutcome {
    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> u8 {
        match self {
            UpgradeOutcome::RolledBack => 2,
            _ => 0,
        }
    }
}

/// A service located by name.
#[derive(Debug, Clone)]
struct Located {
    environment: Environment,
    stack: Stack,
    services: Vec<Service>,
}

/// Drives upgrades of a single service.
#[derive(Debug)]
pub struct UpgradeOrchestrator<A, R, C = SystemClock> {
    api: A,
    reporter: R,
    clock: C,
    cancel: CancellationToken,
}

impl<A: RancherApi, R: Reporter> UpgradeOrchestrator<A, R> {
    /// Create an orchestrator using the system clock.
    pub fn new(api: A, reporter: R) -> UpgradeOrchestrator<A, R> {
        UpgradeOrchestrator::with_clock(api, reporter, SystemClock)
    }
}

impl<A: RancherApi, R: Reporter, C: Clock> UpgradeOrchestrator<A, R, C> {
    /// Create an orchestrator with a custom clock.
    pub fn with_clock(api: A, reporter: R, clock: C) -> UpgradeOrchestrator<A, R, C> {
        UpgradeOrchestrator {
            api,
            reporter,
            clock,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort waits when the token is cancelled.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Underlying API.
    #[inline]
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Upgrade a service, creating it first if requested.
    pub async fn upgrade(
        &self,
        target: &ServiceTarget,
        settings: &UpgradeSettings,
    ) -> Result<UpgradeOutcome> {
        let overrides = &settings.overrides;
        let environment =
            resolve::find_environment(&self.api, target.environment.as_deref()).await?;
        let secrets =
            resolve::resolve_secrets(&self.api, &environment, &overrides.secrets).await?;
        let stack = resolve::find_stack(
            &self.api,
            &environment,
            &target.stack,
            settings.create,
            &self.reporter,
        )
        .await?;
        let services = resolve::list_services(&self.api, &environment, &stack).await?;
        let located = Located {
            environment,
            stack,
            services,
        };

        let service = match resolve::find_service(&located.services, &target.service) {
            Some(service) => service.clone(),
            None if settings.create => {
                self.create_service(&located, &target.service, settings, secrets)
                    .await?;
                return Ok(UpgradeOutcome::Created);
            }
            None => return Err(resolve::service_not_found(&target.service)),
        };

        let service = self
            .ensure_active(&located.environment, service, settings.timeout)
            .await?;

        // Build the payload from the freshest configuration.
        let service = self.refetch(&located.environment, &service).await?;
        if service.state != ServiceState::Active {
            return Err(Error::new(
                ErrorKind::PreconditionFailed,
                format!(
                    "Unable to start upgrade: current service state '{}', but it needs to be 'active'",
                    service.state
                ),
            ));
        }

        if !overrides.service_links.is_empty() {
            self.set_links(&located, &service, &overrides.service_links)
                .await?;
        }

        self.reporter.info(&format!(
            "Upgrading {}/{} in environment {}...",
            located.stack.name, service.name, located.environment.name
        ));
        let request = build_upgrade(&service, overrides, &secrets, &settings.batch);
        debug!("Upgrade request for service {}: {:?}", service.id, request);
        self.api
            .service_action(
                &located.environment.id,
                &service.id,
                ServiceAction::Upgrade,
                Some(&request),
            )
            .await
            .map_err(|e| e.with_context("Unable to request an upgrade on Rancher"))?;

        if !settings.wait_for_upgrade {
            self.reporter.info("Upgrade started");
            return Ok(UpgradeOutcome::Started);
        }

        self.reporter
            .info("Upgrade started, waiting for upgrade to complete...");
        let upgraded = self
            .wait_for_state(
                &located.environment,
                service.clone(),
                ServiceState::Upgraded,
                settings.timeout,
                "A timeout occurred while waiting for Rancher to complete the upgrade",
            )
            .await;

        let service = match upgraded {
            Ok(service) => service,
            Err(e) if e.kind() == ErrorKind::OperationTimedOut && settings.rollback_on_error => {
                self.reporter.warn(&e.to_string());
                self.rollback_after_timeout(&located.environment, service, settings.timeout)
                    .await?;
                return Ok(UpgradeOutcome::RolledBack);
            }
            Err(e) => return Err(e),
        };

        if !settings.finish_upgrade {
            self.reporter.info("Service upgraded");
            return Ok(UpgradeOutcome::Upgraded);
        }

        self.reporter.info("Finishing upgrade...");
        self.dispatch_and_wait(
            &located.environment,
            service,
            ServiceAction::FinishUpgrade,
            settings.timeout,
            "Unable to finish the upgrade in Rancher",
            "A timeout occurred while waiting for Rancher to finish the upgrade",
        )
        .await?;
        self.reporter.info("Upgrade finished");
        Ok(UpgradeOutcome::Finished)
    }

    /// Finish a rolled out upgrade.
    pub async fn finish_upgrade(&self, target: &ServiceTarget, timeout: Duration) -> Result<()> {
        let (located, service) = self.locate(target).await?;
        require_upgraded(&service, "finish upgrade")?;

        self.reporter.info(&format!(
            "Finishing upgrade of {}/{} in environment {}...",
            located.stack.name, service.name, located.environment.name
        ));
        self.dispatch_and_wait(
            &located.environment,
            service,
            ServiceAction::FinishUpgrade,
            timeout,
            "Unable to finish the upgrade in Rancher",
            "A timeout occurred while waiting for Rancher to finish the upgrade",
        )
        .await?;
        self.reporter.info("Upgrade finished");
        Ok(())
    }

    /// Roll back a rolled out upgrade.
    pub async fn rollback(&self, target: &ServiceTarget, timeout: Duration) -> Result<()> {
        let (located, service) = self.locate(target).await?;
        require_upgraded(&service, "rollback")?;

        self.reporter.info(&format!(
            "Rolling back {}/{} in environment {}...",
            located.stack.name, service.name, located.environment.name
        ));
        self.dispatch_and_wait(
            &located.environment,
            service,
            ServiceAction::Rollback,
            timeout,
            "Unable to rollback",
            "A timeout occurred while waiting for Rancher to rollback the previous upgrade",
        )
        .await?;
        self.reporter.info("Service rolled back");
        Ok(())
    }

    async fn locate(&self, target: &ServiceTarget) -> Result<(Located, Service)> {
        let environment =
            resolve::find_environment(&self.api, target.environment.as_deref()).await?;
        let stack =
            resolve::find_stack(&self.api, &environment, &target.stack, false, &self.reporter)
                .await?;
        let services = resolve::list_services(&self.api, &environment, &stack).await?;
        let service = resolve::find_service(&services, &target.service)
            .cloned()
            .ok_or_else(|| resolve::service_not_found(&target.service))?;
        Ok((
            Located {
                environment,
                stack,
                services,
            },
            service,
        ))
    }

    /// Make sure the service is `active`, finishing a previous upgrade if needed.
    async fn ensure_active(
        &self,
        environment: &Environment,
        service: Service,
        timeout: Duration,
    ) -> Result<Service> {
        match service.state {
            ServiceState::Active => Ok(service),
            ServiceState::Upgraded => {
                self.reporter.warn(
                    "The current service state is 'upgraded', marking the previous upgrade as finished before starting a new upgrade...",
                );
                self.dispatch_and_wait(
                    environment,
                    service,
                    ServiceAction::FinishUpgrade,
                    timeout,
                    "Unable to finish the previous upgrade in Rancher",
                    "A timeout occurred while waiting for Rancher to finish the previous upgrade",
                )
                .await
            }
            _ => Err(Error::new(
                ErrorKind::PreconditionFailed,
                format!(
                    "Unable to start upgrade: current service state '{}', but it needs to be 'active'",
                    service.state
                ),
            )),
        }
    }

    async fn rollback_after_timeout(
        &self,
        environment: &Environment,
        service: Service,
        timeout: Duration,
    ) -> Result<()> {
        self.reporter.warn("Processing image rollback...");
        self.dispatch_and_wait(
            environment,
            service,
            ServiceAction::Rollback,
            timeout,
            "Unable to request a rollback on Rancher",
            "A timeout occurred while waiting for Rancher to rollback the upgrade to its latest running state",
        )
        .await?;
        self.reporter.warn("Service successfully rolled back");
        Ok(())
    }

    async fn dispatch_and_wait(
        &self,
        environment: &Environment,
        service: Service,
        action: ServiceAction,
        timeout: Duration,
        dispatch_context: &str,
        timeout_message: &str,
    ) -> Result<Service> {
        info!("Requesting {} of service {}", action, service.id);
        self.api
            .service_action(&environment.id, &service.id, action, None)
            .await
            .map_err(|e| e.with_context(dispatch_context))?;
        self.wait_for_state(
            environment,
            service,
            ServiceState::Active,
            timeout,
            timeout_message,
        )
        .await
    }

    async fn wait_for_state(
        &self,
        environment: &Environment,
        service: Service,
        target: ServiceState,
        timeout: Duration,
        timeout_message: &str,
    ) -> Result<Service> {
        let mut waiter =
            ServiceStateWaiter::new(&self.api, environment.id.as_str(), service, target, timeout)
                .with_timeout_message(timeout_message);
        wait(&mut waiter, &self.clock, &self.cancel).await?;
        Ok(waiter.into_current())
    }

    async fn refetch(&self, environment: &Environment, service: &Service) -> Result<Service> {
        self.api
            .get_service(&environment.id, &service.id)
            .await
            .map_err(|e| e.with_context("Unable to fetch the service status from the Rancher API"))
    }

    async fn set_links(
        &self,
        located: &Located,
        service: &Service,
        requested: &[(String, String)],
    ) -> Result<()> {
        let links = resolve::service_links(&located.services, requested, &self.reporter);
        if links.is_empty() {
            return Ok(());
        }
        self.reporter
            .info(&format!("Setting service links for service {}...", service.name));
        self.api
            .set_service_links(&located.environment.id, &service.id, &links)
            .await
            .map_err(|e| e.with_context("Unable to set service links"))?;
        Ok(())
    }

    async fn create_service(
        &self,
        located: &Located,
        name: &str,
        settings: &UpgradeSettings,
        secrets: Vec<SecretReference>,
    ) -> Result<Service> {
        let overrides = &settings.overrides;
        let image = overrides.image.as_deref().ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidInput,
                "A new image is required to create a service",
            )
        })?;

        let mut launch_config = LaunchConfig {
            imageUuid: Some(image_uuid(image)),
            labels: Some(overrides.labels.clone()),
            environment: Some(overrides.environment.clone()),
            secrets: Some(secrets),
            ..LaunchConfig::default()
        };
        if let Some(ref host_id) = overrides.host_id {
            self.reporter.info(&format!("Scheduled host {}", host_id));
            launch_config.requestedHostId = Some(host_id.clone());
        }

        let new_service = NewService {
            name: resolve::normalize_name(name).to_lowercase(),
            stackId: located.stack.id.clone(),
            startOnCreate: true,
            launchConfig: launch_config,
        };
        self.reporter.info(&format!(
            "Creating service {} in environment {} with image {}...",
            new_service.name, located.environment.name, image
        ));
        let service = self
            .api
            .create_service(&located.environment.id, &new_service)
            .await
            .map_err(|e| e.with_context("Unable to create missing service"))?;

        if !overrides.service_links.is_empty() {
            self.set_links(located, &service, &overrides.service_links)
                .await?;
            self.reporter.info("Service links set");
        }

        self.reporter.info("Creation finished");
        Ok(service)
    }
}

fn require_upgraded(service: &Service, action: &str) -> Result<()> {
    if service.state == ServiceState::Upgraded {
        Ok(())
    } else {
        Err(Error::new(
            ErrorKind::PreconditionFailed,
            format!(
                "Unable to {}: current service state '{}', but it needs to be 'upgraded'",
                action, service.state
            ),
        ))
    }
}
