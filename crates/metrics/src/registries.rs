//! The process's named registries and which of them are reported.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex, RwLock},
};

use {tokio::sync::watch, tracing::debug};

use crate::{
    clock::{Clock, SystemClock},
    registry::MetricRegistry,
};

pub const APPLICATION: &str = "application";
pub const BASE: &str = "base";
pub const VENDOR: &str = "vendor";

/// Registries created up front, in export order.
pub const STANDARD: [&str; 3] = [APPLICATION, BASE, VENDOR];

/// Every registry the process owns, keyed by name.
pub struct Registries {
    clock: Arc<dyn Clock>,
    registries: RwLock<BTreeMap<String, Arc<MetricRegistry>>>,
    enabled: EnabledRegistries,
}

impl Registries {
    /// The standard registries, all of them enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(SystemClock::shared(), &[])
    }

    /// `enabled` lists the registries to report; empty means all of them,
    /// including registries created later.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>, enabled: &[String]) -> Self {
        let registries = STANDARD
            .iter()
            .map(|name| {
                let registry = MetricRegistry::with_clock(*name, Arc::clone(&clock));
                ((*name).to_string(), Arc::new(registry))
            })
            .collect::<BTreeMap<_, _>>();
        let enabled = if enabled.is_empty() {
            EnabledRegistries::following(registries.keys().cloned().collect())
        } else {
            EnabledRegistries::fixed(enabled.iter().cloned().collect())
        };
        Self {
            clock,
            registries: RwLock::new(registries),
            enabled,
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<MetricRegistry>> {
        self.registries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    pub fn get_or_create(&self, name: &str) -> Arc<MetricRegistry> {
        if let Some(registry) = self.get(name) {
            return registry;
        }
        let mut registries = self.registries.write().unwrap_or_else(|e| e.into_inner());
        let registry = registries
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(registry = name, "created registry");
                Arc::new(MetricRegistry::with_clock(name, Arc::clone(&self.clock)))
            })
            .clone();
        drop(registries);
        self.enabled.registry_created(name);
        registry
    }

    pub fn application(&self) -> Arc<MetricRegistry> {
        self.get_or_create(APPLICATION)
    }

    pub fn base(&self) -> Arc<MetricRegistry> {
        self.get_or_create(BASE)
    }

    pub fn vendor(&self) -> Arc<MetricRegistry> {
        self.get_or_create(VENDOR)
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.registries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    pub fn enabled(&self) -> &EnabledRegistries {
        &self.enabled
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registries")
            .field("names", &self.names())
            .field("enabled", &self.enabled.current())
            .finish_non_exhaustive()
    }
}

/// The names of the registries push reporters cover, observable through a
/// watch channel.
#[derive(Debug)]
pub struct EnabledRegistries {
    follow_all: bool,
    disabled: Mutex<BTreeSet<String>>,
    tx: watch::Sender<BTreeSet<String>>,
}

impl EnabledRegistries {
    /// Tracks every registry that exists unless explicitly disabled.
    #[must_use]
    pub fn following(initial: BTreeSet<String>) -> Self {
        Self::build(true, initial)
    }

    /// Exactly the given names, changed only by `enable`/`disable`.
    #[must_use]
    pub fn fixed(names: BTreeSet<String>) -> Self {
        Self::build(false, names)
    }

    fn build(follow_all: bool, names: BTreeSet<String>) -> Self {
        let (tx, _) = watch::channel(names);
        Self {
            follow_all,
            disabled: Mutex::new(BTreeSet::new()),
            tx,
        }
    }

    pub fn enable(&self, name: &str) {
        self.disabled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
        let changed = self.tx.send_if_modified(|names| names.insert(name.to_string()));
        if changed {
            debug!(registry = name, "registry enabled");
        }
    }

    pub fn disable(&self, name: &str) {
        self.disabled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string());
        let changed = self.tx.send_if_modified(|names| names.remove(name));
        if changed {
            debug!(registry = name, "registry disabled");
        }
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.tx.borrow().contains(name)
    }

    pub fn current(&self) -> BTreeSet<String> {
        self.tx.borrow().clone()
    }

    /// A receiver that sees every later change.
    pub fn subscribe(&self) -> watch::Receiver<BTreeSet<String>> {
        self.tx.subscribe()
    }

    fn registry_created(&self, name: &str) {
        if !self.follow_all {
            return;
        }
        let disabled = self
            .disabled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(name);
        if !disabled {
            self.enable(name);
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn standard_registries_exist_and_are_enabled() {
        let registries = Registries::new();
        assert_eq!(registries.names(), names(&STANDARD));
        assert_eq!(registries.enabled().current(), names(&STANDARD));
        assert!(Arc::ptr_eq(&registries.base(), &registries.get(BASE).unwrap()));
    }

    #[test]
    fn new_registries_are_followed_unless_disabled() {
        let registries = Registries::new();
        registries.enabled().disable("custom");
        registries.get_or_create("custom");
        assert!(!registries.enabled().is_enabled("custom"));

        registries.get_or_create("other");
        assert!(registries.enabled().is_enabled("other"));
    }

    #[test]
    fn fixed_list_ignores_new_registries() {
        let registries =
            Registries::with_clock(SystemClock::shared(), &["application".to_string()]);
        registries.get_or_create("custom");
        assert_eq!(registries.enabled().current(), names(&["application"]));
    }

    #[tokio::test]
    async fn subscribers_observe_changes() {
        let registries = Registries::new();
        let mut rx = registries.enabled().subscribe();
        registries.enabled().disable(VENDOR);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), names(&[APPLICATION, BASE]));

        registries.enabled().disable(VENDOR);
        assert!(!rx.has_changed().unwrap());
    }
}
