//! Lock-guarded device → effect map

use std::sync::Arc;
use std::time::Duration;

use hashbrown::HashMap;
use itertools::Itertools;
use parking_lot::{Mutex, MutexGuard};

use crate::device::DeviceKey;
use crate::effect::ProxyToken;
use crate::error::{EffectError, EffectResult};
use crate::proxy::DeviceEffectProxy;

/// Owns every live device effect, at most one per device.
///
/// All access goes through a guard, so a lookup followed by an insert is one
/// atomic step for as long as the guard is held.
#[derive(Default)]
pub struct DeviceEffectMap {
    effects: Mutex<HashMap<DeviceKey, Arc<DeviceEffectProxy>>>,
}

impl DeviceEffectMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> DeviceEffectMapGuard<'_> {
        DeviceEffectMapGuard {
            effects: self.effects.lock(),
        }
    }

    /// Like [`lock`](Self::lock) but gives up after `timeout`.
    pub fn try_lock_for(&self, timeout: Duration) -> Option<DeviceEffectMapGuard<'_>> {
        self.effects
            .try_lock_for(timeout)
            .map(|effects| DeviceEffectMapGuard { effects })
    }
}

pub struct DeviceEffectMapGuard<'a> {
    effects: MutexGuard<'a, HashMap<DeviceKey, Arc<DeviceEffectProxy>>>,
}

impl<'a> DeviceEffectMapGuard<'a> {
    pub fn get(&self, device: &DeviceKey) -> Option<Arc<DeviceEffectProxy>> {
        self.effects.get(device).cloned()
    }

    /// Insert `proxy` under its device unless that device already has one.
    /// Returns whether `proxy` is the one now in the map.
    pub fn insert(&mut self, proxy: Arc<DeviceEffectProxy>) -> bool {
        let current = self
            .effects
            .entry(proxy.device().clone())
            .or_insert_with(|| proxy.clone());
        Arc::ptr_eq(current, &proxy)
    }

    /// Remove `proxy` if it is the entry for its device.
    pub fn erase(&mut self, proxy: &Arc<DeviceEffectProxy>) -> bool {
        let same = self
            .effects
            .get(proxy.device())
            .map_or(false, |current| Arc::ptr_eq(current, proxy));
        if same {
            self.effects.remove(proxy.device());
        }
        same
    }

    /// Look a weak reference up again.
    pub fn resolve(&self, token: &ProxyToken) -> EffectResult<Arc<DeviceEffectProxy>> {
        self.effects
            .get(&token.device)
            .filter(|proxy| proxy.id() == token.id)
            .cloned()
            .ok_or(EffectError::StaleReference)
    }

    pub fn snapshot(&self) -> Vec<Arc<DeviceEffectProxy>> {
        self.effects.values().cloned().collect()
    }

    /// Entries ordered by device.
    pub fn iter_sorted(&self) -> impl Iterator<Item = (&DeviceKey, &Arc<DeviceEffectProxy>)> + '_ {
        self.effects.iter().sorted_by(|a, b| a.0.cmp(b.0))
    }

    /// Empty the map, returning every proxy it held.
    pub fn drain(&mut self) -> Vec<Arc<DeviceEffectProxy>> {
        self.effects.drain().map(|(_, proxy)| proxy).collect()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}
