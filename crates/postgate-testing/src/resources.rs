use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use postgate::{CreateResource, ResourceId, ResourceService};

/// An attribute attached through [`FakeResourceService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub resource_id: ResourceId,
    pub attribute_id: String,
    pub destination: String,
}

/// Resource service that hands out sequential ids.
#[derive(Debug, Default)]
pub struct FakeResourceService {
    next_id: AtomicU64,
    created: Mutex<Vec<(ResourceId, CreateResource)>>,
    attachments: Mutex<Vec<Attachment>>,
    create_calls: AtomicU64,
    attach_calls: AtomicU64,
    fail_create: AtomicBool,
    fail_attach: AtomicBool,
    create_delay: Mutex<Option<Duration>>,
}

impl FakeResourceService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_attach(&self, fail: bool) {
        self.fail_attach.store(fail, Ordering::SeqCst);
    }

    /// Delay every `create` call, to widen race windows.
    pub fn set_create_delay(&self, delay: Option<Duration>) {
        *self.create_delay.lock().unwrap() = delay;
    }

    /// Resources successfully created, in creation order.
    pub fn created(&self) -> Vec<(ResourceId, CreateResource)> {
        self.created.lock().unwrap().clone()
    }

    pub fn attachments(&self) -> Vec<Attachment> {
        self.attachments.lock().unwrap().clone()
    }

    pub fn create_calls(&self) -> u64 {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn attach_calls(&self) -> u64 {
        self.attach_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceService for FakeResourceService {
    async fn create(&self, request: CreateResource) -> Result<ResourceId> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.create_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_create.load(Ordering::SeqCst) {
            bail!("resource service returned 503");
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = ResourceId::new(format!("t3_{n:06}"));
        self.created.lock().unwrap().push((id.clone(), request));
        Ok(id)
    }

    async fn attach_attribute(
        &self,
        resource_id: &ResourceId,
        attribute_id: &str,
        destination: &str,
    ) -> Result<()> {
        self.attach_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_attach.load(Ordering::SeqCst) {
            bail!("attribute {attribute_id} rejected for {resource_id}");
        }
        self.attachments.lock().unwrap().push(Attachment {
            resource_id: resource_id.clone(),
            attribute_id: attribute_id.to_string(),
            destination: destination.to_string(),
        });
        Ok(())
    }
}
