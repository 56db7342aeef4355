//! Listener hooks around reference changes.
//!
//! Managers raise an event before and after every reference add/remove. A
//! listener failing the `-ing` event vetoes the operation; failures from
//! `-ed` events propagate after the state change already happened.

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use crate::package::PackageMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageEventKind {
    ReferenceAdding,
    ReferenceAdded,
    ReferenceRemoving,
    ReferenceRemoved,
}

/// Payload handed to listeners: the package, where its files live in the
/// pool, and which project the change applies to (`None` for
/// solution-level packages).
#[derive(Debug, Clone)]
pub struct PackageOperationEvent {
    pub package: Arc<PackageMetadata>,
    pub install_path: PathBuf,
    pub project: Option<String>,
}

impl PackageOperationEvent {
    pub fn new(
        package: Arc<PackageMetadata>,
        install_path: PathBuf,
        project: Option<String>,
    ) -> Self {
        Self {
            package,
            install_path,
            project,
        }
    }
}

pub trait PackageEventListener: Send + Sync {
    fn handle(&self, kind: PackageEventKind, event: &PackageOperationEvent) -> anyhow::Result<()>;
}

/// Fans one event out to every registered listener, stopping at the first
/// failure.
#[derive(Default, Clone)]
pub struct EventDispatcher {
    listeners: Vec<Arc<dyn PackageEventListener>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Arc<dyn PackageEventListener>) {
        self.listeners.push(listener);
    }

    pub fn dispatch(&self, kind: PackageEventKind, event: &PackageOperationEvent) -> Result<()> {
        for listener in &self.listeners {
            listener.handle(kind, event)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording(Mutex<Vec<PackageEventKind>>);

    impl PackageEventListener for Recording {
        fn handle(
            &self,
            kind: PackageEventKind,
            _event: &PackageOperationEvent,
        ) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(kind);
            Ok(())
        }
    }

    struct Vetoing;

    impl PackageEventListener for Vetoing {
        fn handle(
            &self,
            kind: PackageEventKind,
            event: &PackageOperationEvent,
        ) -> anyhow::Result<()> {
            if kind == PackageEventKind::ReferenceAdding {
                anyhow::bail!("'{}' is not allowed here", event.package.id());
            }
            Ok(())
        }
    }

    fn event() -> PackageOperationEvent {
        PackageOperationEvent::new(
            Arc::new(PackageMetadata::new("A", "1.0".parse().unwrap())),
            PathBuf::from("/pool/A.1.0"),
            Some("Web".to_string()),
        )
    }

    #[test]
    fn test_dispatch_reaches_all_listeners() {
        let recorder = Arc::new(Recording(Mutex::new(Vec::new())));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(recorder.clone());

        dispatcher
            .dispatch(PackageEventKind::ReferenceAdding, &event())
            .unwrap();
        dispatcher
            .dispatch(PackageEventKind::ReferenceAdded, &event())
            .unwrap();

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![
                PackageEventKind::ReferenceAdding,
                PackageEventKind::ReferenceAdded
            ]
        );
    }

    #[test]
    fn test_listener_failure_propagates() {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(Arc::new(Vetoing));

        let error = dispatcher
            .dispatch(PackageEventKind::ReferenceAdding, &event())
            .unwrap_err();
        assert!(error.to_string().contains("not allowed"));
    }
}
