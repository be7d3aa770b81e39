//! Managed resource kinds.

pub mod agent;
pub mod classification;
pub mod environment;
pub mod group;
pub mod membership;
pub mod permissions;
pub mod pipeline_settings;
pub mod project;
pub mod project_features;
pub mod serviceendpoint;
pub mod team;

use crate::registry::ProviderRegistry;
use permissions::{
    AreaScope, BuildDefinitionScope, EnvironmentScope, GitScope, IterationScope, PermissionsResource, ProjectScope,
    ServiceEndpointScope,
};
use serviceendpoint::ServiceEndpointResource;
use serviceendpoint::flavors::{
    AzureRm, Bitbucket, DockerRegistry, Generic, GitHub, JFrogArtifactory, JFrogDistribution, JFrogPlatform,
    JFrogXray, Kubernetes, Npm, NuGet, SonarCloud, VsAppCenter,
};

pub fn register(registry: &mut ProviderRegistry) {
    registry.register_resource(project::ProjectResource);
    registry.register_resource(project_features::ProjectFeaturesResource);
    registry.register_resource(team::TeamResource);
    registry.register_resource(membership::TeamMembersResource);
    registry.register_resource(group::GroupResource);
    registry.register_resource(membership::GroupMembershipResource);
    registry.register_resource(agent::AgentPoolResource);
    registry.register_resource(agent::AgentQueueResource);
    registry.register_resource(environment::EnvironmentResource);
    registry.register_resource(environment::KubernetesResourceResource);
    registry.register_resource(pipeline_settings::PipelineSettingsResource);
    registry.register_resource(classification::ClassificationResource::areas());
    registry.register_resource(classification::ClassificationResource::iterations());

    registry.register_resource(PermissionsResource::<ProjectScope>::new());
    registry.register_resource(PermissionsResource::<GitScope>::new());
    registry.register_resource(PermissionsResource::<BuildDefinitionScope>::new());
    registry.register_resource(PermissionsResource::<EnvironmentScope>::new());
    registry.register_resource(PermissionsResource::<ServiceEndpointScope>::new());
    registry.register_resource(PermissionsResource::<AreaScope>::new());
    registry.register_resource(PermissionsResource::<IterationScope>::new());

    registry.register_resource(ServiceEndpointResource::<AzureRm>::new());
    registry.register_resource(ServiceEndpointResource::<Bitbucket>::new());
    registry.register_resource(ServiceEndpointResource::<GitHub>::new());
    registry.register_resource(ServiceEndpointResource::<Generic>::new());
    registry.register_resource(ServiceEndpointResource::<Kubernetes>::new());
    registry.register_resource(ServiceEndpointResource::<JFrogArtifactory>::new());
    registry.register_resource(ServiceEndpointResource::<JFrogDistribution>::new());
    registry.register_resource(ServiceEndpointResource::<JFrogPlatform>::new());
    registry.register_resource(ServiceEndpointResource::<JFrogXray>::new());
    registry.register_resource(ServiceEndpointResource::<NuGet>::new());
    registry.register_resource(ServiceEndpointResource::<Npm>::new());
    registry.register_resource(ServiceEndpointResource::<VsAppCenter>::new());
    registry.register_resource(ServiceEndpointResource::<SonarCloud>::new());
    registry.register_resource(ServiceEndpointResource::<DockerRegistry>::new());
    registry.register_resource(serviceendpoint::share::ServiceEndpointShareResource);
}
