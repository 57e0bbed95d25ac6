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

//! Waiters.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, trace};
use tokio_util::sync::CancellationToken;

use crate::api::RancherApi;
use crate::protocol::{Service, ServiceState};
use crate::{Error, ErrorKind, Result};

/// Delay between two polls of a service.
pub const POLL_DELAY: Duration = Duration::from_secs(2);

/// Source of monotonic time and sleeping.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Sleep for the given duration.
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}

/// Something that can be polled until it is done.
#[async_trait]
pub trait Waiter<T>: Send {
    /// How long to wait before giving up.
    fn wait_timeout(&self) -> Duration;

    /// Delay between two polls.
    fn delay(&self) -> Duration {
        POLL_DELAY
    }

    /// Error to return on timeout.
    fn timeout_error(&self) -> Error;

    /// Check the current status, returning `Some` once done.
    async fn poll(&mut self) -> Result<Option<T>>;
}

/// Poll the waiter until it is done, times out or gets cancelled.
///
/// Every iteration sleeps first, so the waiter is always polled at least
/// once. Sleeping never extends past the deadline.
pub async fn wait<T, W, C>(waiter: &mut W, clock: &C, cancel: &CancellationToken) -> Result<T>
where
    W: Waiter<T> + ?Sized,
    C: Clock + ?Sized,
{
    let started = clock.now();
    let deadline = waiter.wait_timeout();
    let delay = waiter.delay();

    loop {
        let elapsed = clock.now().saturating_duration_since(started);
        let pause = delay.min(deadline.saturating_sub(elapsed));

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Wait cancelled after {:?}", elapsed);
                return Err(Error::new(
                    ErrorKind::OperationCancelled,
                    "Cancelled while waiting for Rancher",
                ));
            }
            _ = clock.sleep(pause) => {}
        }

        if let Some(result) = waiter.poll().await? {
            return Ok(result);
        }

        if clock.now().saturating_duration_since(started) >= deadline {
            return Err(waiter.timeout_error());
        }
    }
}

/// Wait for a service to reach a state.
#[derive(Debug)]
pub struct ServiceStateWaiter<'api, A: ?Sized> {
    api: &'api A,
    environment_id: String,
    service: Service,
    target: ServiceState,
    timeout: Duration,
    timeout_message: String,
}

impl<'api, A: RancherApi + ?Sized> ServiceStateWaiter<'api, A> {
    /// Create a waiter for `service` to reach `target` within `timeout`.
    pub fn new<S: Into<String>>(
        api: &'api A,
        environment_id: S,
        service: Service,
        target: ServiceState,
        timeout: Duration,
    ) -> ServiceStateWaiter<'api, A> {
        let timeout_message = format!(
            "Timeout waiting for service {} to reach state {}",
            service.name, target
        );
        ServiceStateWaiter {
            api,
            environment_id: environment_id.into(),
            service,
            target,
            timeout,
            timeout_message,
        }
    }

    /// Replace the message reported on timeout.
    pub fn with_timeout_message<S: Into<String>>(mut self, message: S) -> Self {
        self.timeout_message = message.into();
        self
    }

    /// The last known representation of the service.
    #[inline]
    pub fn current(&self) -> &Service {
        &self.service
    }

    /// Take the last known representation of the service.
    #[inline]
    pub fn into_current(self) -> Service {
        self.service
    }
}

#[async_trait]
impl<'api, A: RancherApi + ?Sized> Waiter<()> for ServiceStateWaiter<'api, A> {
    fn wait_timeout(&self) -> Duration {
        self.timeout
    }

    fn timeout_error(&self) -> Error {
        Error::new(ErrorKind::OperationTimedOut, self.timeout_message.clone())
    }

    async fn poll(&mut self) -> Result<Option<()>> {
        self.service = self
            .api
            .get_service(&self.environment_id, &self.service.id)
            .await
            .map_err(|e| e.with_context("Unable to fetch the service status from the Rancher API"))?;
        if self.service.state == self.target {
            debug!("Service {} reached state {}", self.service.id, self.target);
            Ok(Some(()))
        } else {
            trace!(
                "Still waiting for service {} to get to state {}, current is {}",
                self.service.id,
                self.target,
                self.service.state
            );
            Ok(None)
        }
    }
}
