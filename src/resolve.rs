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

//! Resolving environment, stack, service and secret names.

use log::debug;

use crate::api::RancherApi;
use crate::protocol::{Environment, NewStack, SecretReference, Service, ServiceLink, Stack};
use crate::report::Reporter;
use crate::{Error, ErrorKind, Result};

/// Rancher does not allow dots in stack and service names.
#[inline]
pub fn normalize_name(name: &str) -> String {
    name.replace('.', "-")
}

/// Unicode case-insensitive equality.
#[inline]
fn same_name(left: &str, right: &str) -> bool {
    left.to_lowercase() == right.to_lowercase()
}

/// Case-insensitive exact match on a name.
pub fn find_by_name<'a, T, F>(items: &'a [T], name: &str, key: F) -> Option<&'a T>
where
    F: Fn(&T) -> &str,
{
    items.iter().find(|item| same_name(key(item), name))
}

/// Find an environment by ID or name, or take the first one.
pub async fn find_environment<A>(api: &A, name: Option<&str>) -> Result<Environment>
where
    A: RancherApi + ?Sized,
{
    let environments = api.list_environments().await.map_err(|e| {
        e.with_context("Unable to connect to Rancher - is the URL and API key right?")
    })?;

    let found = match name {
        Some(name) => environments
            .iter()
            .find(|e| same_name(&e.id, name) || same_name(&e.name, name)),
        None => environments.first(),
    };

    match (found, name) {
        (Some(env), _) => {
            debug!("Using environment {} ({})", env.name, env.id);
            Ok(env.clone())
        }
        (None, Some(name)) => Err(Error::new(
            ErrorKind::ResourceNotFound,
            format!(
                "The '{}' environment doesn't exist in Rancher, or your API credentials don't have access to it",
                name
            ),
        )),
        (None, None) => Err(Error::new(
            ErrorKind::ResourceNotFound,
            "No environment in Rancher matches your request",
        )),
    }
}

/// Resolve secret names into references with IDs.
pub async fn resolve_secrets<A>(
    api: &A,
    environment: &Environment,
    names: &[String],
) -> Result<Vec<SecretReference>>
where
    A: RancherApi + ?Sized,
{
    let mut result = Vec::with_capacity(names.len());
    for name in names {
        let secrets = api
            .find_secrets(&environment.id, name)
            .await
            .map_err(|e| e.with_context(format!("Unable to look up secret {}", name)))?;
        let secret = secrets.into_iter().next().ok_or_else(|| {
            Error::new(
                ErrorKind::SecretNotFound,
                format!(
                    "Cannot find secret {} in environment {}",
                    name, environment.name
                ),
            )
        })?;
        debug!("Secret {} has ID {}", name, secret.id);
        let mut reference = SecretReference::named(name.as_str());
        reference.secretId = Some(secret.id);
        result.push(reference);
    }
    Ok(result)
}

/// Find a stack by name, optionally creating it.
pub async fn find_stack<A, R>(
    api: &A,
    environment: &Environment,
    name: &str,
    create: bool,
    reporter: &R,
) -> Result<Stack>
where
    A: RancherApi + ?Sized,
    R: Reporter + ?Sized,
{
    let name = normalize_name(name);
    let stacks = api.list_stacks(&environment.id).await.map_err(|e| {
        e.with_context(format!(
            "Unable to fetch a list of stacks in the environment '{}'",
            environment.name
        ))
    })?;

    if let Some(stack) = find_by_name(&stacks, &name, |s| s.name.as_str()) {
        debug!("Using stack {} ({})", stack.name, stack.id);
        return Ok(stack.clone());
    }

    if !create {
        return Err(Error::new(
            ErrorKind::ResourceNotFound,
            format!(
                "Unable to find a stack called '{}'. Does it exist in the '{}' environment?",
                name, environment.name
            ),
        ));
    }

    let new_stack = NewStack {
        name: name.to_lowercase(),
    };
    reporter.info(&format!(
        "Creating stack {} in environment {}...",
        new_stack.name, environment.name
    ));
    api.create_stack(&environment.id, &new_stack)
        .await
        .map_err(|e| e.with_context("Unable to create missing stack"))
}

/// List services of a stack.
pub async fn list_services<A>(api: &A, environment: &Environment, stack: &Stack) -> Result<Vec<Service>>
where
    A: RancherApi + ?Sized,
{
    api.list_services(&environment.id, &stack.id)
        .await
        .map_err(|e| {
            e.with_context(
                "Unable to fetch a list of services in the stack. Does your API key have the right permissions?",
            )
        })
}

/// Find a service by (normalized) name.
pub fn find_service<'a>(services: &'a [Service], name: &str) -> Option<&'a Service> {
    find_by_name(services, &normalize_name(name), |s| s.name.as_str())
}

/// Error for a service that does not exist.
pub fn service_not_found(name: &str) -> Error {
    Error::new(
        ErrorKind::ResourceNotFound,
        format!(
            "Unable to find a service called '{}', does it exist in Rancher?",
            normalize_name(name)
        ),
    )
}

/// Resolve link targets among the stack's services.
///
/// Unknown targets are skipped with a warning.
pub fn service_links<R>(services: &[Service], links: &[(String, String)], reporter: &R) -> Vec<ServiceLink>
where
    R: Reporter + ?Sized,
{
    links
        .iter()
        .filter_map(|(name, target)| match find_by_name(services, target, |s| s.name.as_str()) {
            Some(service) => Some(ServiceLink {
                name: name.clone(),
                serviceId: service.id.clone(),
            }),
            None => {
                reporter.warn(&format!(
                    "Skipping link {}: no service called '{}' in the stack",
                    name, target
                ));
                None
            }
        })
        .collect()
}
