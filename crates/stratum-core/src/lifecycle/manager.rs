use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::Utc;
use serde_json::{json, Value};

use crate::event::{EventBus, EventDraft, SystemEvent};
use crate::kernel::error::Result;
use crate::lifecycle::error::LifecycleError;
use crate::lifecycle::{
    default_phases, HookHandler, HookInfo, HookSpec, LifecyclePhase, LifecycleStatistics, LifecycleStatus,
    PhaseState, PhaseStatus, RunState, CRITICAL_PHASE,
};

const EVENT_SOURCE: &str = "lifecycle-manager";

struct Hook {
    info: HookInfo,
    handler: HookHandler,
}

struct LifecycleState {
    phases: HashMap<String, LifecyclePhase>,
    phase_status: HashMap<String, PhaseStatus>,
    /// Registration order; ties in priority keep it
    hooks: Vec<Hook>,
    run_state: RunState,
    current_phase: Option<String>,
    started_at: Option<chrono::DateTime<Utc>>,
    hook_failures: u64,
}

impl LifecycleState {
    fn with_phases(phases: Vec<LifecyclePhase>) -> Self {
        let mut state = Self {
            phases: HashMap::new(),
            phase_status: HashMap::new(),
            hooks: Vec::new(),
            run_state: RunState::Idle,
            current_phase: None,
            started_at: None,
            hook_failures: 0,
        };
        for phase in phases {
            state.phase_status.insert(phase.name.clone(), PhaseStatus::pending(&phase.name));
            state.phases.insert(phase.name.clone(), phase);
        }
        state
    }

    /// Phase names by ascending order, then name
    fn ordered_phases(&self) -> Vec<String> {
        let mut phases: Vec<&LifecyclePhase> = self.phases.values().collect();
        phases.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
        phases.into_iter().map(|p| p.name.clone()).collect()
    }

    fn status_mut(&mut self, phase: &str) -> &mut PhaseStatus {
        self.phase_status
            .entry(phase.to_string())
            .or_insert_with(|| PhaseStatus::pending(phase))
    }
}

/// Runs registered hooks phase by phase.
///
/// Cloning yields another handle onto the same phases and hooks. Handlers
/// run with no lock held, so a hook may register further hooks.
#[derive(Clone)]
pub struct LifecycleManager {
    state: Arc<Mutex<LifecycleState>>,
    events: Option<EventBus>,
}

impl fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("LifecycleManager")
            .field("state", &state.run_state)
            .field("phases", &state.ordered_phases())
            .field("hooks", &state.hooks.len())
            .finish()
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleManager {
    /// Manager with the default phases and no event bus
    pub fn new() -> Self {
        Self { state: Arc::new(Mutex::new(LifecycleState::with_phases(default_phases()))), events: None }
    }

    pub fn with_event_bus(events: EventBus) -> Self {
        Self {
            state: Arc::new(Mutex::new(LifecycleState::with_phases(default_phases()))),
            events: Some(events),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LifecycleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn emit(&self, event: SystemEvent, data: Value) {
        if let Some(bus) = &self.events {
            if let Err(e) = bus.publish(EventDraft::system(event, EVENT_SOURCE).with_data(data)).await {
                log::warn!("Failed to publish '{}': {}", event, e);
            }
        }
    }

    /// Add a phase, replacing any phase of the same name.
    pub async fn register_phase(&self, phase: LifecyclePhase) {
        let data = json!({ "name": phase.name, "order": phase.order, "dependencies": phase.dependencies });
        {
            let mut state = self.lock();
            state.phase_status.insert(phase.name.clone(), PhaseStatus::pending(&phase.name));
            state.phases.insert(phase.name.clone(), phase);
        }
        self.emit(SystemEvent::LifecyclePhaseRegistered, data).await;
    }

    /// Register a hook and return its id.
    ///
    /// The phase must already exist. Reusing an id replaces that hook.
    pub async fn register_hook(&self, spec: HookSpec) -> Result<String> {
        let id = spec.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let info = HookInfo {
            id: id.clone(),
            phase: spec.phase,
            plugin_id: spec.plugin_id,
            priority: spec.priority,
            enabled: spec.enabled,
            direction: spec.direction,
        };
        let data = json!({
            "hookId": id,
            "phase": info.phase,
            "pluginId": info.plugin_id,
            "priority": info.priority,
        });
        {
            let mut state = self.lock();
            if !state.phases.contains_key(&info.phase) {
                return Err(LifecycleError::PhaseNotFound { phase: info.phase }.into());
            }
            let hook = Hook { info, handler: spec.handler };
            match state.hooks.iter_mut().find(|h| h.info.id == id) {
                Some(existing) => {
                    log::warn!("Replacing lifecycle hook '{}'", id);
                    *existing = hook;
                }
                None => state.hooks.push(hook),
            }
        }
        log::debug!("Registered lifecycle hook '{}'", id);
        self.emit(SystemEvent::LifecycleHookRegistered, data).await;
        Ok(id)
    }

    /// Remove a hook. Returns `false` when the id is unknown.
    pub async fn unregister_hook(&self, id: &str) -> bool {
        let removed = {
            let mut state = self.lock();
            let index = state.hooks.iter().position(|h| h.info.id == id);
            index.map(|index| state.hooks.remove(index).info)
        };
        match removed {
            Some(info) => {
                self.emit(
                    SystemEvent::LifecycleHookUnregistered,
                    json!({ "hookId": info.id, "phase": info.phase }),
                )
                .await;
                true
            }
            None => false,
        }
    }

    /// Enable or disable a hook. Returns `false` when the id is unknown.
    pub async fn set_hook_enabled(&self, id: &str, enabled: bool) -> bool {
        let found = {
            let mut state = self.lock();
            match state.hooks.iter_mut().find(|h| h.info.id == id) {
                Some(hook) => {
                    hook.info.enabled = enabled;
                    true
                }
                None => false,
            }
        };
        if found {
            self.emit(SystemEvent::LifecycleHookEnabledChanged, json!({ "hookId": id, "enabled": enabled }))
                .await;
        }
        found
    }

    /// Run every phase by ascending order.
    ///
    /// On a critical failure the manager goes back to idle and the error is
    /// returned; the phases that already completed keep their status.
    pub async fn start(&self) -> Result<()> {
        let phases = {
            let mut state = self.lock();
            if state.run_state != RunState::Idle {
                return Err(LifecycleError::AlreadyRunning { component: "lifecycle manager".to_string() }.into());
            }
            state.run_state = RunState::Starting;
            state.started_at = Some(Utc::now());
            for status in state.phase_status.values_mut() {
                *status = PhaseStatus::pending(&status.name);
            }
            state.ordered_phases()
        };

        log::info!("Starting lifecycle ({} phases)", phases.len());
        self.emit(SystemEvent::LifecycleStarting, json!({ "phases": phases })).await;
        let started = Instant::now();

        for phase in &phases {
            if let Err(e) = self.run_phase(phase, false).await {
                log::error!("Lifecycle start aborted in phase '{}': {}", phase, e);
                let mut state = self.lock();
                state.run_state = RunState::Idle;
                state.current_phase = None;
                state.started_at = None;
                return Err(e);
            }
        }

        {
            let mut state = self.lock();
            state.run_state = RunState::Running;
            state.current_phase = None;
        }
        let duration_ms = started.elapsed().as_millis() as u64;
        log::info!("Lifecycle started in {}ms", duration_ms);
        self.emit(SystemEvent::LifecycleStarted, json!({ "durationMs": duration_ms })).await;
        Ok(())
    }

    /// Run every phase by descending order with reversed hooks.
    ///
    /// Does nothing unless the manager is running. On a critical failure the
    /// manager stays running and the error is returned.
    pub async fn stop(&self) -> Result<()> {
        let phases = {
            let mut state = self.lock();
            if state.run_state != RunState::Running {
                log::debug!("Lifecycle stop requested while {:?}; ignoring", state.run_state);
                return Ok(());
            }
            state.run_state = RunState::Stopping;
            let mut phases = state.ordered_phases();
            phases.reverse();
            phases
        };

        log::info!("Stopping lifecycle");
        self.emit(SystemEvent::LifecycleStopping, json!({ "phases": phases })).await;
        let started = Instant::now();

        for phase in &phases {
            if let Err(e) = self.run_phase(phase, true).await {
                log::error!("Lifecycle stop aborted in phase '{}': {}", phase, e);
                let mut state = self.lock();
                state.run_state = RunState::Running;
                state.current_phase = None;
                return Err(e);
            }
        }

        {
            let mut state = self.lock();
            state.run_state = RunState::Idle;
            state.current_phase = None;
            state.started_at = None;
        }
        let duration_ms = started.elapsed().as_millis() as u64;
        self.emit(SystemEvent::LifecycleStopped, json!({ "durationMs": duration_ms })).await;
        Ok(())
    }

    /// Run a single phase outside of start/stop.
    pub async fn execute_phase(&self, phase: &str, reverse: bool) -> Result<()> {
        self.run_phase(phase, reverse).await
    }

    async fn run_phase(&self, phase: &str, reverse: bool) -> Result<()> {
        let hooks: Vec<(HookInfo, HookHandler)> = {
            let mut state = self.lock();
            if !state.phases.contains_key(phase) {
                return Err(LifecycleError::PhaseNotFound { phase: phase.to_string() }.into());
            }
            state.current_phase = Some(phase.to_string());
            let status = state.status_mut(phase);
            *status = PhaseStatus::pending(phase);
            status.state = PhaseState::Running;
            status.started_at = Some(Utc::now());

            let mut hooks: Vec<(HookInfo, HookHandler)> = state
                .hooks
                .iter()
                .filter(|h| h.info.phase == phase && h.info.enabled && h.info.direction.applies(reverse))
                .map(|h| (h.info.clone(), Arc::clone(&h.handler)))
                .collect();
            // Stable sort keeps registration order among equal priorities
            hooks.sort_by(|a, b| b.0.priority.cmp(&a.0.priority));
            if reverse {
                hooks.reverse();
            }
            hooks
        };

        log::debug!("Running phase '{}' with {} hook(s)", phase, hooks.len());
        self.emit(
            SystemEvent::LifecyclePhaseStarting,
            json!({ "phase": phase, "reverse": reverse, "hooks": hooks.len() }),
        )
        .await;

        let started = Instant::now();
        let critical = phase == CRITICAL_PHASE;
        let mut hooks_run = 0;
        let mut hooks_failed = 0;

        for (info, handler) in hooks {
            match handler().await {
                Ok(()) => {
                    hooks_run += 1;
                    self.emit(
                        SystemEvent::LifecycleHookCompleted,
                        json!({ "hookId": info.id, "phase": phase, "pluginId": info.plugin_id }),
                    )
                    .await;
                }
                Err(e) => {
                    hooks_failed += 1;
                    let message = e.to_string();
                    log::error!("Hook '{}' failed in phase '{}': {}", info.id, phase, message);
                    self.lock().hook_failures += 1;
                    self.emit(
                        SystemEvent::LifecycleHookError,
                        json!({ "hookId": info.id, "phase": phase, "pluginId": info.plugin_id, "error": message }),
                    )
                    .await;

                    if critical {
                        {
                            let mut state = self.lock();
                            let status = state.status_mut(phase);
                            status.state = PhaseState::Error;
                            status.completed_at = Some(Utc::now());
                            status.hooks_run = hooks_run;
                            status.hooks_failed = hooks_failed;
                            status.error = Some(message.clone());
                        }
                        self.emit(
                            SystemEvent::LifecyclePhaseError,
                            json!({ "phase": phase, "hookId": info.id, "error": message }),
                        )
                        .await;
                        return Err(LifecycleError::HookFailed {
                            hook_id: info.id,
                            phase: phase.to_string(),
                            source: Box::new(e),
                        }
                        .into());
                    }
                }
            }
        }

        {
            let mut state = self.lock();
            let status = state.status_mut(phase);
            status.state = PhaseState::Completed;
            status.completed_at = Some(Utc::now());
            status.hooks_run = hooks_run;
            status.hooks_failed = hooks_failed;
            if state.current_phase.as_deref() == Some(phase) {
                state.current_phase = None;
            }
        }
        self.emit(
            SystemEvent::LifecyclePhaseCompleted,
            json!({
                "phase": phase,
                "hooksRun": hooks_run,
                "hooksFailed": hooks_failed,
                "durationMs": started.elapsed().as_millis() as u64,
            }),
        )
        .await;
        Ok(())
    }

    pub fn status(&self) -> LifecycleStatus {
        let state = self.lock();
        let phases = state
            .ordered_phases()
            .iter()
            .filter_map(|name| state.phase_status.get(name).cloned())
            .collect();
        LifecycleStatus {
            state: state.run_state,
            current_phase: state.current_phase.clone(),
            started_at: state.started_at,
            phases,
        }
    }

    pub fn phase_status(&self, phase: &str) -> Option<PhaseStatus> {
        self.lock().phase_status.get(phase).cloned()
    }

    /// Phases in execution order
    pub fn phases(&self) -> Vec<LifecyclePhase> {
        let state = self.lock();
        state
            .ordered_phases()
            .iter()
            .filter_map(|name| state.phases.get(name).cloned())
            .collect()
    }

    /// Hooks in registration order, optionally limited to one phase
    pub fn hooks(&self, phase: Option<&str>) -> Vec<HookInfo> {
        self.lock()
            .hooks
            .iter()
            .filter(|h| phase.map_or(true, |p| h.info.phase == p))
            .map(|h| h.info.clone())
            .collect()
    }

    pub fn state(&self) -> RunState {
        self.lock().run_state
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    pub fn statistics(&self) -> LifecycleStatistics {
        let state = self.lock();
        LifecycleStatistics {
            phases: state.phases.len(),
            hooks: state.hooks.len(),
            enabled_hooks: state.hooks.iter().filter(|h| h.info.enabled).count(),
            completed_phases: state
                .phase_status
                .values()
                .filter(|s| s.state == PhaseState::Completed)
                .count(),
            failed_phases: state.phase_status.values().filter(|s| s.state == PhaseState::Error).count(),
            hook_failures: state.hook_failures,
        }
    }
}
