//! Single-slot refresh coordinator.
//!
//! Collapses concurrent refresh attempts onto one in-flight future: the
//! first caller installs its refresh as the shared one, everyone else joins
//! it and observes the same outcome. Replaces the global mutable
//! refresh-promise pattern with per-client state.

use std::future::Future;
use std::sync::Mutex;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use super::RefreshError;

pub(super) type SharedRefresh = Shared<BoxFuture<'static, Result<String, RefreshError>>>;

pub(super) struct RefreshCoordinator {
    in_flight: Mutex<Option<SharedRefresh>>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(None),
        }
    }

    /// Join the in-flight refresh, or install `refresh` as the shared one.
    /// The returned future must be awaited and then passed to [`Self::clear`].
    /// If a refresh is already running, `refresh` is dropped unpolled.
    pub fn await_or_start<F>(&self, refresh: F) -> SharedRefresh
    where
        F: Future<Output = Result<String, RefreshError>> + Send + 'static,
    {
        let mut slot = self.in_flight.lock().unwrap();
        if let Some(in_flight) = slot.as_ref() {
            return in_flight.clone();
        }
        let shared = refresh.boxed().shared();
        *slot = Some(shared.clone());
        shared
    }

    /// Release the slot once `finished` has resolved. A newer refresh that
    /// already replaced it is left alone.
    pub fn clear(&self, finished: &SharedRefresh) {
        let mut slot = self.in_flight.lock().unwrap();
        if slot.as_ref().is_some_and(|current| current.ptr_eq(finished)) {
            *slot = None;
        }
    }
}
