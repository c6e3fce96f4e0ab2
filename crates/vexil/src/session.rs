use std::sync::Arc;
use tracing::{debug, info};
use vexil_domain::config::VexilConfig;
use vexil_domain::{FlagAccess, FlagListing, FlagState};
use vexil_engine::{
    CommandLine, FeatureRuntime, FlagsState, Registry, ResolvedSwitchSet, SentinelsMode,
    SwitchesAndFeatures,
};
use vexil_storage::{FlagsStorage, OwnershipProbe, ResolvedBackend, WriteQueue, resolve_backend};

/// One actor's view of the flags: engine plus the storage it resolved to.
///
/// Every mutating call commits the storage afterwards, so a crash never loses
/// an acknowledged write beyond what the backend itself buffers.
#[derive(Debug)]
pub struct Session {
    config: VexilConfig,
    state: FlagsState,
    storage: Box<dyn FlagsStorage + Send>,
    access: FlagAccess,
    queue: Option<WriteQueue>,
}

impl Session {
    /// Two-phase construction: resolve the storage backend for whoever the
    /// probe says is acting, then build the engine over it.
    pub async fn open<P>(config: VexilConfig, registry: Registry, probe: &P) -> Self
    where
        P: OwnershipProbe,
    {
        let ResolvedBackend { storage, access, queue } = resolve_backend(probe, &config.storage).await;
        let mut session = Self::with_storage(config, registry, storage, access);
        session.queue = queue;
        session
    }

    /// Session over an already opened backend.
    pub fn with_storage(
        config: VexilConfig,
        registry: Registry,
        storage: Box<dyn FlagsStorage + Send>,
        access: FlagAccess,
    ) -> Self {
        let state = FlagsState::new(Arc::new(registry), config.build.clone())
            .with_command_line_settings(config.command_line.clone());
        info!(?access, flags = state.registry().len(), "Flag session opened");
        Self { config, state, storage, access, queue: None }
    }

    #[must_use]
    pub const fn config(&self) -> &VexilConfig {
        &self.config
    }

    #[must_use]
    pub const fn state(&self) -> &FlagsState {
        &self.state
    }

    #[must_use]
    pub const fn access(&self) -> FlagAccess {
        self.access
    }

    #[must_use]
    pub fn storage(&self) -> &dyn FlagsStorage {
        &*self.storage
    }

    #[must_use]
    pub const fn is_restart_needed(&self) -> bool {
        self.state.is_restart_needed()
    }

    pub fn list(&mut self) -> FlagListing {
        let listing = self.state.enumerate(&mut *self.storage, self.access);
        self.commit();
        listing
    }

    #[must_use]
    pub fn state_of(&self, internal_name: &str) -> Option<FlagState> {
        self.state.state_of(&*self.storage, internal_name)
    }

    pub fn set_enabled(&mut self, name: &str, enable: bool) {
        self.state.set_entry_enabled(&mut *self.storage, name, enable);
        self.commit();
    }

    pub fn set_choice(&mut self, name: &str, index: usize) {
        self.state.set_choice(&mut *self.storage, name, index);
        self.commit();
    }

    pub fn set_string(&mut self, name: &str, value: &str) {
        self.state.set_string(&mut *self.storage, name, value);
        self.commit();
    }

    pub fn set_origin_list(&mut self, name: &str, value: &str) {
        self.state.set_origin_list(&mut *self.storage, name, value);
        self.commit();
    }

    pub fn reset_all(&mut self) {
        self.state.reset_all(&mut *self.storage);
        self.commit();
    }

    pub fn prune_stale_selections(&mut self) -> usize {
        let removed = self.state.prune_stale_selections(&mut *self.storage);
        self.commit();
        removed
    }

    pub fn materialize(&mut self, command_line: &CommandLine) -> ResolvedSwitchSet {
        self.state.materialize(&mut *self.storage, command_line)
    }

    pub fn switches_and_features(&mut self) -> SwitchesAndFeatures {
        self.state.switches_and_features(&mut *self.storage)
    }

    /// Merges the selection into `command_line`, bracketed by sentinels when
    /// configured.
    pub fn apply_to(&mut self, command_line: &mut CommandLine) {
        let sentinels =
            if self.config.command_line.sentinels { SentinelsMode::Add } else { SentinelsMode::None };
        self.state.convert_flags_to_switches(&mut *self.storage, command_line, sentinels);
    }

    /// Undoes the last [`Self::apply_to`].
    pub fn remove_from(&mut self, command_line: &mut CommandLine) {
        self.state.remove_flags_switches(command_line);
    }

    pub fn register_variations<R>(&mut self, runtime: &mut R) -> Vec<String>
    where
        R: FeatureRuntime + ?Sized,
    {
        self.state.register_all_feature_variation_parameters(&mut *self.storage, runtime)
    }

    /// Reports the current selection when telemetry is enabled.
    #[cfg(feature = "usage")]
    pub fn report_usage<S>(&mut self, sink: &S) -> Option<vexil_usage::UsageReport>
    where
        S: vexil_usage::HistogramSink + ?Sized,
    {
        if !self.config.telemetry.enabled {
            debug!("Telemetry disabled, skipping usage report");
            return None;
        }
        let histogram = self.config.telemetry.histogram.clone();
        Some(vexil_usage::record_uma_statistics(&self.state, &mut *self.storage, sink, &histogram))
    }

    /// Commits pending writes and ends the session. With background writes
    /// this blocks until the last snapshot is on disk.
    pub fn close(mut self) {
        self.commit();
        if let Some(queue) = &self.queue {
            queue.flush();
        }
        debug!("Flag session closed");
    }

    fn commit(&mut self) {
        if self.storage.is_dirty() {
            self.storage.commit_pending_writes();
        }
    }
}
