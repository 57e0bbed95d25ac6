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

//! Rancher API calls used by the deployment tools.

use async_trait::async_trait;
use log::trace;
use reqwest::Method;
use serde::Serialize;

use crate::protocol::*;
use crate::session::{check, ApiVersion, Session, LIST_LIMIT};
use crate::{ErrorKind, Result};

/// The subset of the Rancher API the orchestrator talks to.
///
/// Implemented by [Session](../struct.Session.html); tests plug an in-memory
/// implementation in.
#[async_trait]
pub trait RancherApi: Send + Sync {
    /// List environments visible to the API key.
    async fn list_environments(&self) -> Result<Vec<Environment>>;

    /// Find secrets with the given name in an environment.
    async fn find_secrets(&self, environment_id: &str, name: &str) -> Result<Vec<Secret>>;

    /// List stacks in an environment.
    async fn list_stacks(&self, environment_id: &str) -> Result<Vec<Stack>>;

    /// Create a stack in an environment.
    async fn create_stack(&self, environment_id: &str, stack: &NewStack) -> Result<Stack>;

    /// List services in a stack.
    async fn list_services(&self, environment_id: &str, stack_id: &str) -> Result<Vec<Service>>;

    /// Create a service.
    async fn create_service(&self, environment_id: &str, service: &NewService) -> Result<Service>;

    /// Get a service by its ID.
    async fn get_service(&self, environment_id: &str, service_id: &str) -> Result<Service>;

    /// Replace links of a service.
    async fn set_service_links(
        &self,
        environment_id: &str,
        service_id: &str,
        links: &[ServiceLink],
    ) -> Result<Service>;

    /// Invoke an action on a service.
    ///
    /// Only [Upgrade](../protocol/enum.ServiceAction.html) carries a body.
    async fn service_action(
        &self,
        environment_id: &str,
        service_id: &str,
        action: ServiceAction,
        upgrade: Option<&UpgradeRequest>,
    ) -> Result<()>;
}

impl Session {
    async fn post_json<B: Serialize + Sync, T: serde::de::DeserializeOwned>(
        &self,
        url: reqwest::Url,
        query: &[(&str, &str)],
        body: &B,
    ) -> Result<T> {
        let resp = self
            .request(Method::POST, url)
            .query(query)
            .json(body)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }
}

#[async_trait]
impl RancherApi for Session {
    async fn list_environments(&self) -> Result<Vec<Environment>> {
        let url = self.url(ApiVersion::V1, ["projects"])?;
        let root: Collection<Environment> = self.fetch(url, &[("limit", LIST_LIMIT)]).await?;
        trace!("Received environments: {:?}", root.data);
        Ok(root.data)
    }

    async fn find_secrets(&self, environment_id: &str, name: &str) -> Result<Vec<Secret>> {
        let url = self.url(ApiVersion::V2Beta, ["projects", environment_id, "secrets"])?;
        let root: Collection<Secret> = self.fetch(url, &[("name", name)]).await?;
        trace!("Received secrets named {}: {:?}", name, root.data);
        Ok(root.data)
    }

    async fn list_stacks(&self, environment_id: &str) -> Result<Vec<Stack>> {
        let url = self.url(ApiVersion::V1, ["projects", environment_id, "environments"])?;
        let root: Collection<Stack> = self.fetch(url, &[("limit", LIST_LIMIT)]).await?;
        trace!("Received stacks: {:?}", root.data);
        Ok(root.data)
    }

    async fn create_stack(&self, environment_id: &str, stack: &NewStack) -> Result<Stack> {
        let url = self.url(ApiVersion::V1, ["projects", environment_id, "environments"])?;
        let created: Stack = self.post_json(url, &[], stack).await?;
        trace!("Created stack {:?}", created);
        Ok(created)
    }

    async fn list_services(&self, environment_id: &str, stack_id: &str) -> Result<Vec<Service>> {
        let url = self.url(
            ApiVersion::V1,
            ["projects", environment_id, "environments", stack_id, "services"],
        )?;
        let root: Collection<Service> = self.fetch(url, &[("limit", LIST_LIMIT)]).await?;
        trace!("Received services: {:?}", root.data);
        Ok(root.data)
    }

    async fn create_service(&self, environment_id: &str, service: &NewService) -> Result<Service> {
        let url = self.url(ApiVersion::V2Beta, ["projects", environment_id, "services"])?;
        let created: Service = self.post_json(url, &[], service).await?;
        trace!("Created service {:?}", created);
        Ok(created)
    }

    async fn get_service(&self, environment_id: &str, service_id: &str) -> Result<Service> {
        let url = self.url(ApiVersion::V1, ["projects", environment_id, "services", service_id])?;
        let service: Service = self.fetch(url, &[]).await?;
        trace!("Received service {} in state {}", service.id, service.state);
        Ok(service)
    }

    async fn set_service_links(
        &self,
        environment_id: &str,
        service_id: &str,
        links: &[ServiceLink],
    ) -> Result<Service> {
        let url = self.url(
            ApiVersion::V2Beta,
            ["projects", environment_id, "services", service_id, ""],
        )?;
        let body = ServiceLinks {
            serviceLinks: links.to_vec(),
        };
        let query = [("action", ServiceAction::SetServiceLinks.as_str())];
        self.post_json(url, &query, &body).await.map_err(|e| {
            if e.status().is_some() {
                e.with_kind(ErrorKind::ActionFailed)
            } else {
                e
            }
        })
    }

    async fn service_action(
        &self,
        environment_id: &str,
        service_id: &str,
        action: ServiceAction,
        upgrade: Option<&UpgradeRequest>,
    ) -> Result<()> {
        let url = self.url(
            ApiVersion::V1,
            ["projects", environment_id, "services", service_id, ""],
        )?;
        let mut request = self
            .request(Method::POST, url)
            .query(&[("action", action.as_str())]);
        if let Some(body) = upgrade {
            request = request.json(body);
        }
        let resp = request.send().await?;
        check(resp)
            .await
            .map_err(|e| e.with_kind(ErrorKind::ActionFailed))?;
        trace!("Requested {} of service {}", action, service_id);
        Ok(())
    }
}
