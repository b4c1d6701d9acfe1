//! Shared service registry.
//!
//! A type-keyed map of `Arc`-wrapped services. Services register under any
//! `'static` type, sized or not, so capability trait objects
//! (`Arc<dyn SmsGateway>`) register under the abstraction the host resolves.
//! Cloning is cheap (the values are shared), which the plugin host uses to
//! stage each plugin's registrations and discard them on failure.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use campus_tasks::SchedulableTask;

use crate::plugin::PluginError;

/// Type-keyed service container plus the ordered task registrations.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    tasks: Vec<Arc<dyn SchedulableTask>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service under type `T`. A later registration for the same
    /// type replaces the earlier one (latest wins).
    pub fn register<T>(&mut self, service: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.services.insert(TypeId::of::<T>(), Arc::new(service));
    }

    /// Resolve a service registered under type `T`.
    pub fn get<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.downcast_ref::<Arc<T>>())
            .cloned()
    }

    /// Resolve a service the caller cannot proceed without.
    pub fn require<T>(&self, what: &'static str) -> Result<Arc<T>, PluginError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.get::<T>().ok_or(PluginError::MissingService(what))
    }

    /// Register a task for the scheduler to drive.
    pub fn register_task(&mut self, task: Arc<dyn SchedulableTask>) {
        self.tasks.push(task);
    }

    /// All registered tasks, in registration order.
    pub fn tasks(&self) -> Vec<Arc<dyn SchedulableTask>> {
        self.tasks.clone()
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.services.len())
            .field("tasks", &self.tasks.len())
            .finish()
    }
}
