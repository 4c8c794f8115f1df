//! Kubernetes API access
//!
//! Pod requests come from the core `pods` API; live usage comes from the
//! `metrics.k8s.io` API served by metrics-server.

use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity as KubeQuantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use waste_lib::{
    ContainerRequests, ContainerUsage, MetricsSource, NamespaceScope, Quantity, SourceKind,
    WasteError, WorkloadLister, WorkloadSpec, WorkloadUsage,
};

/// Which kubeconfig entries to connect with
#[derive(Debug, Clone, Default)]
pub struct ClusterOptions {
    pub kubeconfig: Option<String>,
    pub context: Option<String>,
    pub cluster: Option<String>,
    pub user: Option<String>,
}

impl ClusterOptions {
    fn kube_config_options(&self) -> KubeConfigOptions {
        KubeConfigOptions {
            context: self.context.clone(),
            cluster: self.cluster.clone(),
            user: self.user.clone(),
        }
    }

    fn overrides_entries(&self) -> bool {
        self.context.is_some() || self.cluster.is_some() || self.user.is_some()
    }
}

/// A connected API client plus the server it talks to
pub struct ClusterClient {
    pub client: Client,
    pub server: String,
    /// Namespace of the selected context, `default` when it names none
    pub namespace: String,
}

/// Build a client from kubeconfig or the in-cluster environment
pub async fn connect(options: &ClusterOptions) -> Result<ClusterClient> {
    let config = load_config(options).await?;

    let server = config.cluster_url.to_string();
    let namespace = config.default_namespace.clone();
    debug!(server = %server, namespace = %namespace, "Connecting to cluster");
    let client = Client::try_from(config).context("Failed to create Kubernetes client")?;

    Ok(ClusterClient {
        client,
        server,
        namespace,
    })
}

async fn load_config(options: &ClusterOptions) -> Result<Config> {
    let config = match &options.kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .with_context(|| format!("Failed to read kubeconfig {path}"))?;
            Config::from_custom_kubeconfig(kubeconfig, &options.kube_config_options()).await?
        }
        None if options.overrides_entries() => {
            Config::from_kubeconfig(&options.kube_config_options()).await?
        }
        None => Config::infer()
            .await
            .context("Failed to load cluster configuration")?,
    };
    Ok(config)
}

fn pods_api<K>(client: &Client, scope: &NamespaceScope) -> Api<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>,
{
    match scope.namespace() {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Lists pod resource requests from the core API
#[derive(Clone)]
pub struct KubeWorkloadLister {
    client: Client,
}

impl KubeWorkloadLister {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WorkloadLister for KubeWorkloadLister {
    async fn list(&self, scope: &NamespaceScope) -> waste_lib::Result<Vec<WorkloadSpec>> {
        let api: Api<Pod> = pods_api(&self.client, scope);
        let pods = api
            .list(&ListParams::default())
            .await
            .map_err(|e| WasteError::source_unavailable(SourceKind::WorkloadLister, e))?;

        pods.items.iter().map(workload_spec).collect()
    }
}

fn workload_spec(pod: &Pod) -> waste_lib::Result<WorkloadSpec> {
    let name = pod.metadata.name.clone().unwrap_or_default();
    let namespace = pod.metadata.namespace.clone().unwrap_or_default();

    let containers = pod
        .spec
        .iter()
        .flat_map(|spec| spec.containers.iter())
        .map(|container| container_requests(&namespace, &name, container))
        .collect::<waste_lib::Result<Vec<_>>>()?;

    Ok(WorkloadSpec {
        name,
        namespace,
        containers,
    })
}

fn container_requests(
    namespace: &str,
    pod: &str,
    container: &Container,
) -> waste_lib::Result<ContainerRequests> {
    let requests = container
        .resources
        .as_ref()
        .and_then(|r| r.requests.as_ref());
    let owner = format!("{namespace}/{pod}/{}", container.name);

    Ok(ContainerRequests {
        name: container.name.clone(),
        requested_cpu: resource_quantity(requests, "cpu", "request", &owner)?,
        requested_mem: resource_quantity(requests, "memory", "request", &owner)?,
    })
}

/// Look up one resource in a resource list; absent means zero
fn resource_quantity(
    list: Option<&BTreeMap<String, KubeQuantity>>,
    resource: &str,
    what: &str,
    owner: &str,
) -> waste_lib::Result<Quantity> {
    match list.and_then(|l| l.get(resource)) {
        Some(raw) => raw.0.parse().map_err(|e| {
            WasteError::invalid_quantity(format!("{resource} {what} of {owner}"), e)
        }),
        None => Ok(Quantity::zero()),
    }
}

/// Pod usage as served by metrics-server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodMetrics {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub window: Option<String>,
    #[serde(default)]
    pub containers: Vec<PodMetricsContainer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodMetricsContainer {
    pub name: String,
    #[serde(default)]
    pub usage: BTreeMap<String, KubeQuantity>,
}

impl k8s_openapi::Resource for PodMetrics {
    const GROUP: &'static str = "metrics.k8s.io";
    const KIND: &'static str = "PodMetrics";
    const VERSION: &'static str = "v1beta1";
    const API_VERSION: &'static str = "metrics.k8s.io/v1beta1";
    const URL_PATH_SEGMENT: &'static str = "pods";
    type Scope = k8s_openapi::NamespaceResourceScope;
}

impl k8s_openapi::Metadata for PodMetrics {
    type Ty = ObjectMeta;

    fn metadata(&self) -> &Self::Ty {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut Self::Ty {
        &mut self.metadata
    }
}

/// Reads live pod usage from the metrics API
#[derive(Clone)]
pub struct KubeMetricsSource {
    client: Client,
}

impl KubeMetricsSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetricsSource for KubeMetricsSource {
    async fn list(&self, scope: &NamespaceScope) -> waste_lib::Result<Vec<WorkloadUsage>> {
        let api: Api<PodMetrics> = pods_api(&self.client, scope);
        let metrics = api
            .list(&ListParams::default())
            .await
            .map_err(|e| WasteError::source_unavailable(SourceKind::MetricsSource, e))?;

        metrics.items.iter().map(workload_usage).collect()
    }
}

fn workload_usage(metrics: &PodMetrics) -> waste_lib::Result<WorkloadUsage> {
    let name = metrics.metadata.name.clone().unwrap_or_default();
    let namespace = metrics.metadata.namespace.clone().unwrap_or_default();

    let containers = metrics
        .containers
        .iter()
        .map(|container| {
            let owner = format!("{namespace}/{name}/{}", container.name);
            Ok(ContainerUsage {
                name: container.name.clone(),
                used_cpu: resource_quantity(Some(&container.usage), "cpu", "usage", &owner)?,
                used_mem: resource_quantity(Some(&container.usage), "memory", "usage", &owner)?,
            })
        })
        .collect::<waste_lib::Result<Vec<_>>>()?;

    Ok(WorkloadUsage {
        name,
        namespace,
        containers,
    })
}
