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

//! Building upgrade payloads from the live configuration and overrides.
//!
//! Nothing here talks to Rancher: the functions take the configuration the
//! service currently has and return a new one.

use crate::protocol::{InServiceStrategy, LaunchConfig, SecretReference, Service, UpgradeRequest};
use crate::settings::{BatchOptions, Overrides};

/// Image reference in the form Rancher expects (`docker:<image>`).
///
/// The prefix is always added: `docker:24-dind` is the `docker` image.
pub fn image_uuid(image: &str) -> String {
    format!("docker:{}", image)
}

/// Apply overrides to the main launch configuration.
///
/// `secrets` must already be resolved to IDs.
pub fn merge(base: &LaunchConfig, overrides: &Overrides, secrets: &[SecretReference]) -> LaunchConfig {
    let mut result = base.clone();
    if let Some(ref image) = overrides.image {
        result.imageUuid = Some(image_uuid(image));
    }
    if !overrides.labels.is_empty() {
        result.labels = Some(overrides.labels.clone());
    }
    if !overrides.environment.is_empty() {
        result.environment = Some(overrides.environment.clone());
    }
    if !secrets.is_empty() {
        result.secrets = Some(secrets.to_vec());
    }
    result
}

/// Replace sidekick images by sidekick name.
pub fn merge_sidekicks(base: &[LaunchConfig], images: &[(String, String)]) -> Vec<LaunchConfig> {
    base.iter()
        .map(|config| {
            let replacement = config
                .name
                .as_deref()
                .and_then(|name| images.iter().rev().find(|(n, _)| n == name));
            match replacement {
                Some((_, image)) => LaunchConfig {
                    imageUuid: Some(image_uuid(image)),
                    ..config.clone()
                },
                None => config.clone(),
            }
        })
        .collect()
}

/// Build the `upgrade` action body for a service.
pub fn build_upgrade(
    service: &Service,
    overrides: &Overrides,
    secrets: &[SecretReference],
    batch: &BatchOptions,
) -> UpgradeRequest {
    let secondary = if overrides.include_sidekicks || !overrides.sidekick_images.is_empty() {
        merge_sidekicks(&service.secondaryLaunchConfigs, &overrides.sidekick_images)
    } else {
        Vec::new()
    };

    UpgradeRequest {
        inServiceStrategy: InServiceStrategy {
            batchSize: batch.batch_size,
            intervalMillis: batch.interval.as_millis() as u64,
            startFirst: batch.start_first,
            launchConfig: merge(&service.launchConfig, overrides, secrets),
            secondaryLaunchConfigs: secondary,
        },
    }
}
