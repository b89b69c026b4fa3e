//! Shared context read and written by the controller and mode loops
//!
//! Every access goes through one mutex; the critical sections only copy
//! values in or out, never call collaborators.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::mode::Mode;
use crate::services::AppHandle;

/// Snapshot of the shared context
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    pub active_mode: Option<Mode>,
    pub active_application: Option<AppHandle>,
    pub last_command: Option<String>,
}

#[derive(Debug, Default)]
pub struct ContextStore {
    inner: Mutex<Context>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Context> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Context {
        self.lock().clone()
    }

    pub fn active_mode(&self) -> Option<Mode> {
        self.lock().active_mode
    }

    pub fn set_active_mode(&self, mode: Option<Mode>) {
        self.lock().active_mode = mode;
    }

    pub fn active_application(&self) -> Option<AppHandle> {
        self.lock().active_application.clone()
    }

    pub fn set_active_application(&self, app: Option<AppHandle>) {
        self.lock().active_application = app;
    }

    /// Clear the active application, returning what was there
    pub fn take_active_application(&self) -> Option<AppHandle> {
        self.lock().active_application.take()
    }

    pub fn last_command(&self) -> Option<String> {
        self.lock().last_command.clone()
    }

    pub fn set_last_command(&self, command: Option<String>) {
        self.lock().last_command = command;
    }
}
