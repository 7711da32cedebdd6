//! Versioned state cache with change notification.
//!
//! One current `Arc<State>` plus a monotonically increasing version.
//! Writers install unconditionally; the wholesale-refetch path installs
//! compare-and-swap style against the version it observed before
//! fetching, so a stale refetch can never overwrite a newer mutation
//! result. Readers hold `Arc` snapshots and are never blocked.

use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam::channel::{unbounded, Receiver, Sender};

use super::views::DerivedViews;
use crate::core::State;

/// What subscribers receive on every install.
#[derive(Clone, Debug)]
pub struct StateChange {
    pub version: u64,
    pub state: Arc<State>,
    pub views: Arc<DerivedViews>,
}

struct Inner {
    version: u64,
    state: Arc<State>,
    views: Arc<DerivedViews>,
    subscribers: Vec<Sender<StateChange>>,
}

pub struct StateCell {
    inner: Mutex<Inner>,
}

impl StateCell {
    pub fn new(state: State) -> Self {
        let views = Arc::new(DerivedViews::derive(&state));
        Self {
            inner: Mutex::new(Inner {
                version: 1,
                state: Arc::new(state),
                views,
                subscribers: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn version(&self) -> u64 {
        self.lock().version
    }

    pub fn current(&self) -> (u64, Arc<State>) {
        let inner = self.lock();
        (inner.version, Arc::clone(&inner.state))
    }

    pub fn views(&self) -> Arc<DerivedViews> {
        Arc::clone(&self.lock().views)
    }

    /// Subscribe to installs. The current snapshot is delivered
    /// immediately so subscribers never start blind.
    pub fn subscribe(&self) -> Receiver<StateChange> {
        let (tx, rx) = unbounded();
        let mut inner = self.lock();
        let change = StateChange {
            version: inner.version,
            state: Arc::clone(&inner.state),
            views: Arc::clone(&inner.views),
        };
        // A receiver dropped between creation and here is harmless.
        let _ = tx.send(change);
        inner.subscribers.push(tx);
        rx
    }

    /// Writer path: replace the snapshot unconditionally.
    pub fn install(&self, state: State) -> StateChange {
        let mut inner = self.lock();
        Self::install_locked(&mut inner, state)
    }

    /// Refetch path: replace the snapshot only if no install happened
    /// since `observed` was read. Returns the change when accepted.
    pub fn install_if_version(&self, observed: u64, state: State) -> Option<StateChange> {
        let mut inner = self.lock();
        if inner.version != observed {
            tracing::debug!(
                observed,
                current = inner.version,
                "stale refetch rejected"
            );
            return None;
        }
        Some(Self::install_locked(&mut inner, state))
    }

    fn install_locked(inner: &mut Inner, state: State) -> StateChange {
        let views = Arc::new(DerivedViews::derive(&state));
        inner.version += 1;
        inner.state = Arc::new(state);
        inner.views = views;
        let change = StateChange {
            version: inner.version,
            state: Arc::clone(&inner.state),
            views: Arc::clone(&inner.views),
        };
        inner
            .subscribers
            .retain(|tx| tx.send(change.clone()).is_ok());
        change
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::row::sample_software_row;
    use crate::core::Db;

    fn state_with_software_named(name: &str) -> State {
        let mut row = sample_software_row();
        row.name = name.to_string();
        State {
            compiled_data: Default::default(),
            db: Db {
                software_rows: vec![row],
                ..Default::default()
            },
        }
    }

    #[test]
    fn install_bumps_version_and_notifies() {
        let cell = StateCell::new(state_with_software_named("Foo"));
        let rx = cell.subscribe();

        let initial = rx.recv().expect("initial snapshot");
        assert_eq!(initial.version, 1);

        let change = cell.install(state_with_software_named("Bar"));
        assert_eq!(change.version, 2);

        let notified = rx.recv().expect("install notification");
        assert_eq!(notified.version, 2);
        assert_eq!(notified.state.db.software_rows[0].name, "Bar");
    }

    #[test]
    fn stale_refetch_is_rejected() {
        let cell = StateCell::new(state_with_software_named("Foo"));
        let (observed, _) = cell.current();

        // A write lands while the refetch is in flight.
        cell.install(state_with_software_named("Bar"));

        let rejected = cell.install_if_version(observed, state_with_software_named("Stale"));
        assert!(rejected.is_none());
        let (_, state) = cell.current();
        assert_eq!(state.db.software_rows[0].name, "Bar");
    }

    #[test]
    fn refetch_at_observed_version_is_accepted() {
        let cell = StateCell::new(state_with_software_named("Foo"));
        let (observed, _) = cell.current();
        let accepted = cell.install_if_version(observed, state_with_software_named("Fresh"));
        assert_eq!(accepted.map(|c| c.version), Some(2));
    }

    #[test]
    fn readers_keep_old_snapshots() {
        let cell = StateCell::new(state_with_software_named("Foo"));
        let (_, old) = cell.current();
        cell.install(state_with_software_named("Bar"));
        assert_eq!(old.db.software_rows[0].name, "Foo");
    }
}
