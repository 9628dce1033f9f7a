//! Primary resource service interface.

use anyhow::Result;
use async_trait::async_trait;

use crate::model::ResourceId;

/// Arguments for creating the primary resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateResource {
    pub title: String,
    pub destination: String,
    /// Placeholder content shown until the resource renders.
    pub preview: String,
}

/// The service that owns the durable, user-visible resource.
#[async_trait]
pub trait ResourceService: Send + Sync {
    async fn create(&self, request: CreateResource) -> Result<ResourceId>;

    /// Attach a classification (flair) to an existing resource.
    async fn attach_attribute(
        &self,
        resource_id: &ResourceId,
        attribute_id: &str,
        destination: &str,
    ) -> Result<()>;
}
