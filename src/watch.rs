use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::HostError;

/// Editors and patch tools leave backup files with this suffix; changes to
/// them never mean the program changed.
pub const BACKUP_SUFFIX: char = '~';

/// Idempotent reload flag. The notification thread only ever calls `set`;
/// the host thread consumes it with `take` on its own schedule, so any
/// number of filesystem events between two ticks collapse into one reload.
#[derive(Debug, Clone, Default)]
pub struct ReloadSignal {
    flag: Arc<AtomicBool>,
}

impl ReloadSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Watches the script directory and flips a [`ReloadSignal`] on qualifying
/// changes. Dropping the watcher unsubscribes.
pub struct ScriptDirWatcher {
    watcher: Option<RecommendedWatcher>,
}

impl ScriptDirWatcher {
    pub fn start(dir: &Path, signal: ReloadSignal) -> Result<Self, HostError> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if event_requests_reload(&event) {
                    signal.set();
                }
            }
            Err(err) => log::warn!("[watch] script watcher error: {err}"),
        })
        .map_err(HostError::Watch)?;
        watcher
            .configure(
                NotifyConfig::default()
                    .with_compare_contents(false)
                    .with_poll_interval(Duration::from_millis(300)),
            )
            .map_err(HostError::Watch)?;
        watcher.watch(dir, RecursiveMode::Recursive).map_err(HostError::Watch)?;
        Ok(Self { watcher: Some(watcher) })
    }

    pub fn stop(&mut self) {
        self.watcher = None;
    }
}

fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Name(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Create(_)
            | EventKind::Remove(_)
    )
}

pub(crate) fn event_requests_reload(event: &Event) -> bool {
    if !is_relevant(&event.kind) {
        return false;
    }
    event.paths.iter().any(|path| path_requests_reload(path))
}

pub(crate) fn path_requests_reload(path: &Path) -> bool {
    if path.is_dir() {
        return false;
    }
    match path.file_name().and_then(|name| name.to_str()) {
        Some(name) => !name.ends_with(BACKUP_SUFFIX),
        None => false,
    }
}
