use std::collections::BTreeMap;

use serde::Deserialize;

/// A decoded `docker inspect` document for a container.
///
/// Only the fields the controller actually looks at are modeled.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InspectEntry {
    pub state: InspectState,
    /// Image ID the container was created from (sha256 reference)
    pub image: String,
    #[serde(default)]
    pub network_settings: NetworkSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InspectState {
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkSettings {
    /// Mapping from "containerPort/proto" to bound host endpoints.
    /// Unbound ports appear with a null value.
    #[serde(default)]
    pub ports: BTreeMap<String, Option<Vec<PortBinding>>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PortBinding {
    /// docker emits the host port as a string
    #[serde(default)]
    pub host_port: String,
}

/// Flattened view of a single container as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSnapshot {
    /// Raw runtime status string ("running", "exited", ...)
    pub status: String,
    /// Repo tags of the image the container runs
    pub image_tags: Vec<String>,
    /// Mapping from "containerPort/proto" to the ordered bound host ports
    pub ports: BTreeMap<String, Vec<u16>>,
}

impl ContainerSnapshot {
    /// Builds a snapshot from an inspect document plus the image's repo tags.
    pub fn from_inspect(entry: InspectEntry, image_tags: Vec<String>) -> Self {
        let ports = entry
            .network_settings
            .ports
            .into_iter()
            .map(|(key, bindings)| {
                let host_ports: Vec<u16> = bindings
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|b| b.host_port.parse().ok())
                    .collect();
                (key, host_ports)
            })
            .collect();

        Self {
            status: entry.state.status,
            image_tags,
            ports,
        }
    }
}
