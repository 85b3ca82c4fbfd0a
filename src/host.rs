use std::path::{Path, PathBuf};

use crate::assets::FontHandle;
use crate::config::ScriptConfig;
use crate::error::HostError;
use crate::fault::{self, FaultState};
use crate::scripts::{CallbackTable, HostBindings, ScriptRuntime};
use crate::time::{Tick, Time};
use crate::watch::{ReloadSignal, ScriptDirWatcher};

/// Drives the embedded script program through the application's fixed
/// lifecycle hooks. Every call into the script is contained: a failure
/// freezes script dispatch and switches rendering to the diagnostic screen
/// until a source change triggers a successful reload. Nothing here ever
/// propagates a script failure to the embedding loop.
pub struct ScriptHost {
    entry: PathBuf,
    config: ScriptConfig,
    bindings: HostBindings,
    runtime: ScriptRuntime,
    fault: FaultState,
    reload: ReloadSignal,
    watcher: Option<ScriptDirWatcher>,
    error_font: Option<FontHandle>,
}

impl ScriptHost {
    /// Starts watching `scripts_dir` and prepares the host. Watcher
    /// subscription is the only fallible step; without it the hot-reload
    /// contract cannot be honored, so the failure surfaces here rather
    /// than as a runtime fault.
    pub fn new(
        scripts_dir: &Path,
        config: ScriptConfig,
        bindings: HostBindings,
    ) -> Result<Self, HostError> {
        let reload = ReloadSignal::new();
        let watcher = ScriptDirWatcher::start(scripts_dir, reload.clone())?;
        Ok(Self::assemble(scripts_dir, config, bindings, reload, Some(watcher)))
    }

    /// Host without a filesystem watcher; reloads only happen through
    /// [`ScriptHost::request_reload`]. Used by headless harnesses.
    pub fn without_watcher(scripts_dir: &Path, config: ScriptConfig, bindings: HostBindings) -> Self {
        Self::assemble(scripts_dir, config, bindings, ReloadSignal::new(), None)
    }

    fn assemble(
        scripts_dir: &Path,
        config: ScriptConfig,
        bindings: HostBindings,
        reload: ReloadSignal,
        watcher: Option<ScriptDirWatcher>,
    ) -> Self {
        Self {
            entry: scripts_dir.join(&config.entry),
            config,
            bindings,
            runtime: ScriptRuntime::new(),
            fault: FaultState::default(),
            reload,
            watcher,
            error_font: None,
        }
    }

    /// Loads the entry script for the first time. Called exactly once by
    /// the embedding application before any tick.
    pub fn initialize(&mut self) {
        if let Err(err) = self.runtime.reload(&self.entry, &self.bindings) {
            self.contain(err);
        }
    }

    /// Resolves the fallback diagnostic font, then gives the script its
    /// content hook. Either failure faults the host; the loop keeps going.
    pub fn load_content(&mut self) {
        match self.bindings.content.load_font(&self.config.error_font) {
            Ok(font) => self.error_font = Some(font),
            Err(err) => {
                self.contain(err.into());
                return;
            }
        }
        if let Err(err) = self.runtime.invoke_load_content() {
            self.contain(err);
        }
    }

    pub fn update(&mut self, time: &Time) {
        if self.reload.take() {
            // All reload work happens here, on the caller's thread; the
            // watcher only ever set the flag.
            self.reload_now();
            return;
        }
        if self.fault.is_faulted() || self.fault.reloading() {
            return;
        }
        if let Err(err) = self.runtime.invoke_update(Tick::from(time)) {
            self.contain(err);
        }
    }

    pub fn render(&mut self, time: &Time) {
        if self.fault.is_faulted() {
            self.draw_fault_screen();
            return;
        }
        if let Err(err) = self.runtime.invoke_draw(Tick::from(time)) {
            // The frame in progress stays as drawn; the diagnostic screen
            // takes over on the next render call.
            self.contain(err);
        }
    }

    /// Stops the watcher and unloads the script program. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            watcher.stop();
        }
        self.runtime.unload();
    }

    /// Queues a reload exactly as a filesystem change would.
    pub fn request_reload(&self) {
        self.reload.set();
    }

    pub fn reload_pending(&self) -> bool {
        self.reload.is_set()
    }

    pub fn is_faulted(&self) -> bool {
        self.fault.is_faulted()
    }

    pub fn last_error(&self) -> Option<&HostError> {
        self.fault.error()
    }

    pub fn callbacks(&self) -> Option<&CallbackTable> {
        self.runtime.callbacks()
    }

    fn reload_now(&mut self) {
        if !self.fault.begin_reload() {
            return;
        }
        log::info!("[script] change detected, reloading '{}'", self.entry.display());
        self.fault.clear();
        if let Err(err) = self.runtime.reload(&self.entry, &self.bindings) {
            self.contain(err);
        } else if self.config.reload_reruns_load_content {
            // The fresh program lost whatever state its content hook had
            // built; give it the chance to rebuild before the next tick.
            self.load_content();
        }
        self.fault.end_reload();
    }

    fn draw_fault_screen(&mut self) {
        let first = self.fault.take_first_show();
        let Some(error) = self.fault.error() else { return };
        if first || !self.config.log_fault_once {
            log::error!("[script] {}", fault::format_error(error));
        }
        fault::draw_diagnostics(
            &self.bindings.surface,
            &self.bindings.batch,
            self.error_font.as_ref(),
            error,
        );
    }

    fn contain(&mut self, error: HostError) {
        self.fault.record(error);
    }
}
