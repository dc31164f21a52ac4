use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::event::{EventBus, EventDraft, SystemEvent};
use crate::kernel::error::{Error, Result};
use crate::service::error::ServiceError;
use crate::service::{
    DependencyReport, ServiceDescriptor, ServiceFactory, ServiceInstance, ServiceOptions, ServiceStatistics,
};
use crate::utils::{format_path, BoxFuture};

const EVENT_SOURCE: &str = "service-container";

struct ServiceDefinition {
    factory: ServiceFactory,
    singleton: bool,
    dependencies: Vec<String>,
    instance: Option<ServiceInstance>,
    metadata: HashMap<String, Value>,
    registered_at: DateTime<Utc>,
}

impl ServiceDefinition {
    fn descriptor(&self, id: &str) -> ServiceDescriptor {
        ServiceDescriptor {
            id: id.to_string(),
            singleton: self.singleton,
            dependencies: self.dependencies.clone(),
            metadata: self.metadata.clone(),
            resolved: self.instance.is_some(),
            registered_at: self.registered_at,
        }
    }
}

#[derive(Default)]
struct ContainerState {
    services: BTreeMap<String, ServiceDefinition>,
}

impl ContainerState {
    fn dependents_of(&self, id: &str) -> Vec<String> {
        self.services
            .iter()
            .filter(|(_, def)| def.dependencies.iter().any(|dep| dep == id))
            .map(|(other, _)| other.clone())
            .collect()
    }

    fn graph(&self) -> BTreeMap<String, Vec<String>> {
        self.services
            .iter()
            .map(|(id, def)| (id.clone(), def.dependencies.clone()))
            .collect()
    }
}

/// Thread-safe, cloneable service container handle.
///
/// Clones share the same registrations. When built with
/// [`ServiceContainer::with_event_bus`], registration changes and factory
/// resolutions are announced as `service.*` events.
#[derive(Clone)]
pub struct ServiceContainer {
    state: Arc<Mutex<ContainerState>>,
    events: Option<EventBus>,
}

impl fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.lock().services.keys().cloned().collect();
        f.debug_struct("ServiceContainer")
            .field("services", &ids)
            .field("has_event_bus", &self.events.is_some())
            .finish()
    }
}

impl ServiceContainer {
    pub fn new() -> Self {
        Self { state: Arc::new(Mutex::new(ContainerState::default())), events: None }
    }

    pub fn with_event_bus(events: EventBus) -> Self {
        Self { state: Arc::new(Mutex::new(ContainerState::default())), events: Some(events) }
    }

    fn lock(&self) -> MutexGuard<'_, ContainerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn emit(&self, event: SystemEvent, data: Value) {
        if let Some(bus) = &self.events {
            if let Err(e) = bus.publish(EventDraft::system(event, EVENT_SOURCE).with_data(data)).await {
                log::warn!("Failed to publish '{}': {}", event, e);
            }
        }
    }

    /// Register a service under a type-erased factory.
    pub async fn register_factory(&self, id: &str, factory: ServiceFactory, options: ServiceOptions) -> Result<()> {
        {
            let mut state = self.lock();
            if state.services.contains_key(id) {
                return Err(ServiceError::DuplicateService { id: id.to_string() }.into());
            }
            state.services.insert(
                id.to_string(),
                ServiceDefinition {
                    factory,
                    singleton: options.singleton,
                    dependencies: options.dependencies.clone(),
                    instance: None,
                    metadata: options.metadata,
                    registered_at: Utc::now(),
                },
            );
        }
        log::debug!(
            "Registered {} service '{}' (dependencies: {:?})",
            if options.singleton { "singleton" } else { "transient" },
            id,
            options.dependencies
        );
        self.emit(
            SystemEvent::ServiceRegistered,
            json!({ "id": id, "singleton": options.singleton, "dependencies": options.dependencies }),
        )
        .await;
        Ok(())
    }

    /// Register a service produced by an async factory returning a concrete type.
    pub async fn register<T, F, Fut>(&self, id: &str, factory: F, options: ServiceOptions) -> Result<()>
    where
        T: Any + Send + Sync,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let factory: ServiceFactory = Arc::new(move || -> BoxFuture<'static, Result<ServiceInstance>> {
            let pending = factory();
            Box::pin(async move { pending.await.map(|value| Arc::new(value) as ServiceInstance) })
        });
        self.register_factory(id, factory, options).await
    }

    pub async fn register_singleton<T, F, Fut>(&self, id: &str, factory: F, dependencies: &[&str]) -> Result<()>
    where
        T: Any + Send + Sync,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.register(id, factory, ServiceOptions::singleton().depends_on(dependencies)).await
    }

    pub async fn register_transient<T, F, Fut>(&self, id: &str, factory: F, dependencies: &[&str]) -> Result<()>
    where
        T: Any + Send + Sync,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.register(id, factory, ServiceOptions::transient().depends_on(dependencies)).await
    }

    /// Register a pre-built singleton.
    pub async fn register_instance<T: Any + Send + Sync>(&self, id: &str, instance: T) -> Result<()> {
        let shared: ServiceInstance = Arc::new(instance);
        let for_factory = Arc::clone(&shared);
        let factory: ServiceFactory = Arc::new(move || -> BoxFuture<'static, Result<ServiceInstance>> {
            let instance = Arc::clone(&for_factory);
            Box::pin(async move { Ok::<ServiceInstance, Error>(instance) })
        });
        self.register_factory(id, factory, ServiceOptions::singleton()).await?;
        if let Some(def) = self.lock().services.get_mut(id) {
            def.instance = Some(shared);
        }
        Ok(())
    }

    /// Resolve a service and downcast it to `T`.
    pub async fn resolve<T: Any + Send + Sync>(&self, id: &str) -> Result<Arc<T>> {
        let instance = self.resolve_any(id).await?;
        instance.downcast::<T>().map_err(|_| {
            ServiceError::TypeMismatch { id: id.to_string(), expected: std::any::type_name::<T>() }.into()
        })
    }

    /// Resolve a service without downcasting.
    pub async fn resolve_any(&self, id: &str) -> Result<ServiceInstance> {
        let mut path = Vec::new();
        self.resolve_with_path(id, &mut path).await
    }

    /// Resolve several services in order; the first failure is returned.
    pub async fn resolve_all(&self, ids: &[&str]) -> Result<Vec<ServiceInstance>> {
        let mut resolved = Vec::with_capacity(ids.len());
        for id in ids {
            resolved.push(self.resolve_any(id).await?);
        }
        Ok(resolved)
    }

    // `path` is the resolution chain of the current call only, so concurrent
    // top-level resolutions never see each other's ids.
    fn resolve_with_path<'a>(&'a self, id: &'a str, path: &'a mut Vec<String>) -> BoxFuture<'a, Result<ServiceInstance>> {
        Box::pin(async move {
            if path.iter().any(|p| p == id) {
                let mut cycle = path.clone();
                cycle.push(id.to_string());
                log::error!("Circular dependency: {}", format_path(&cycle));
                return Err(ServiceError::CircularDependency { id: id.to_string(), path: cycle }.into());
            }

            let (factory, singleton, dependencies) = {
                let state = self.lock();
                let def = state
                    .services
                    .get(id)
                    .ok_or_else(|| ServiceError::ServiceNotFound { id: id.to_string() })?;
                if let Some(instance) = &def.instance {
                    return Ok(Arc::clone(instance));
                }
                (Arc::clone(&def.factory), def.singleton, def.dependencies.clone())
            };

            path.push(id.to_string());
            for dependency in &dependencies {
                self.resolve_with_path(dependency, path).await?;
            }
            path.pop();

            let created = factory()
                .await
                .map_err(|e| ServiceError::FactoryFailed { id: id.to_string(), source: Box::new(e) })?;

            let instance = if singleton {
                let mut state = self.lock();
                match state.services.get_mut(id) {
                    // A concurrent resolution may have cached first; keep that one
                    Some(def) => Arc::clone(def.instance.get_or_insert(created)),
                    None => created,
                }
            } else {
                created
            };

            log::debug!("Resolved service '{}'", id);
            self.emit(SystemEvent::ServiceResolved, json!({ "id": id, "singleton": singleton })).await;
            Ok(instance)
        })
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.lock().services.contains_key(id)
    }

    /// True once a singleton has a cached instance.
    pub fn is_resolved(&self, id: &str) -> bool {
        self.lock().services.get(id).is_some_and(|def| def.instance.is_some())
    }

    pub fn services(&self) -> Vec<ServiceDescriptor> {
        self.lock().services.iter().map(|(id, def)| def.descriptor(id)).collect()
    }

    pub fn services_by_metadata(&self, key: &str, value: &Value) -> Vec<ServiceDescriptor> {
        self.lock()
            .services
            .iter()
            .filter(|(_, def)| def.metadata.get(key) == Some(value))
            .map(|(id, def)| def.descriptor(id))
            .collect()
    }

    /// Service id mapped to its declared dependency ids
    pub fn dependency_graph(&self) -> BTreeMap<String, Vec<String>> {
        self.lock().graph()
    }

    /// Ids of services that declare `id` as a dependency
    pub fn dependents(&self, id: &str) -> Vec<String> {
        self.lock().dependents_of(id)
    }

    /// Remove a service unless another registered service depends on it.
    pub async fn unregister(&self, id: &str) -> Result<bool> {
        {
            let mut state = self.lock();
            if !state.services.contains_key(id) {
                return Ok(false);
            }
            let dependents = state.dependents_of(id);
            if !dependents.is_empty() {
                return Err(ServiceError::HasDependents { id: id.to_string(), dependents }.into());
            }
            state.services.remove(id);
        }
        log::debug!("Unregistered service '{}'", id);
        self.emit(SystemEvent::ServiceUnregistered, json!({ "id": id })).await;
        Ok(true)
    }

    /// Walk the whole graph and report every cycle found. Read-only.
    pub fn validate_dependencies(&self) -> DependencyReport {
        let graph = self.dependency_graph();
        let mut cycles = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = Vec::new();
        for id in graph.keys() {
            collect_cycles(id, &graph, &mut visited, &mut stack, &mut cycles);
        }
        DependencyReport { valid: cycles.is_empty(), cycles }
    }

    /// Drop every registration and cached instance.
    pub async fn clear(&self) {
        let removed = {
            let mut state = self.lock();
            let removed = state.services.len();
            state.services.clear();
            removed
        };
        log::debug!("Cleared service container ({} services)", removed);
        self.emit(SystemEvent::ServiceContainerCleared, json!({ "removed": removed })).await;
    }

    pub fn statistics(&self) -> ServiceStatistics {
        let state = self.lock();
        let singletons = state.services.values().filter(|def| def.singleton).count();
        ServiceStatistics {
            total: state.services.len(),
            singletons,
            transients: state.services.len() - singletons,
            resolved: state.services.values().filter(|def| def.instance.is_some()).count(),
        }
    }
}

impl Default for ServiceContainer {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_cycles(
    id: &str,
    graph: &BTreeMap<String, Vec<String>>,
    visited: &mut HashSet<String>,
    stack: &mut Vec<String>,
    cycles: &mut Vec<Vec<String>>,
) {
    if let Some(position) = stack.iter().position(|on_stack| on_stack == id) {
        let mut cycle = stack[position..].to_vec();
        cycle.push(id.to_string());
        cycles.push(cycle);
        return;
    }
    if !visited.insert(id.to_string()) {
        return;
    }
    stack.push(id.to_string());
    // Dependencies on unregistered ids are not part of the graph
    for dependency in graph.get(id).into_iter().flatten() {
        collect_cycles(dependency, graph, visited, stack, cycles);
    }
    stack.pop();
}
