//! The device effect manager.

use std::io;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use delegate::delegate;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::descriptor::EffectDescriptor;
use crate::device::{DeviceKey, PortConfig, PortId};
use crate::effect::{
    ClientId, DeviceEffectCallback, EffectClient, EffectEvents, EffectId, EffectTarget, HandleId,
};
use crate::error::{EffectError, EffectResult};
use crate::gate::{self, MIN_DEVICE_EFFECT_HAL_VERSION};
use crate::hal::{DeviceEffectHost, HalEffect, HalVersion, IoHandle, PatchListener, SessionId};
use crate::handle::EffectHandle;
use crate::patch::{AudioPatch, PatchHandle, PatchSnapshot};
use crate::proxy::DeviceEffectProxy;
use crate::registry::{DeviceEffectMap, DeviceEffectMapGuard};

/// Tunables for a [`DeviceEffectManager`].
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// Oldest HAL version device effects may be created on
    pub min_hal_version: HalVersion,
    /// How long [`DeviceEffectManager::dump`] waits for a lock before giving up
    pub dump_lock_timeout: Duration,
    /// Capacity of channels made by [`DeviceEffectManager::client_channel`]
    pub event_queue_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            min_hal_version: MIN_DEVICE_EFFECT_HAL_VERSION,
            dump_lock_timeout: Duration::from_secs(1),
            event_queue_capacity: 16,
        }
    }
}

impl ManagerConfig {
    pub fn with_min_hal_version(mut self, version: HalVersion) -> Self {
        self.min_hal_version = version;
        self
    }

    pub fn with_dump_lock_timeout(mut self, timeout: Duration) -> Self {
        self.dump_lock_timeout = timeout;
        self
    }

    pub fn with_event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity;
        self
    }
}

/// Everything a client supplies to get a device effect.
pub struct CreateEffectRequest {
    pub descriptor: EffectDescriptor,
    pub device: DeviceKey,
    pub client: ClientId,
    pub effect_client: EffectClient,
    /// Deliver [`EffectEvent::FramesProcessed`](crate::EffectEvent::FramesProcessed) to this client
    pub notify_frames_processed: bool,
    /// Keep the effect alive after its last handle disconnects
    pub pinned: bool,
}

impl CreateEffectRequest {
    pub fn new(
        descriptor: EffectDescriptor,
        device: DeviceKey,
        client: ClientId,
        effect_client: EffectClient,
    ) -> Self {
        Self {
            descriptor,
            device,
            client,
            effect_client,
            notify_frames_processed: false,
            pinned: false,
        }
    }

    pub fn with_frames_processed(mut self) -> Self {
        self.notify_frames_processed = true;
        self
    }

    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }
}

/// A successfully created device effect handle.
pub struct CreatedEffect {
    pub handle: EffectHandle,
    /// Whether the shared effect was already enabled by another client
    pub enabled: bool,
}

/// Manages effects attached to physical devices.
///
/// Keeps at most one [`DeviceEffectProxy`] per [`DeviceKey`], shares it between
/// all clients asking for an effect on that device, and keeps it bound to
/// whichever patch currently routes to the device.
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use devfx::*;
/// # fn host() -> Arc<dyn DeviceEffectHost> { unimplemented!() }
/// # fn descriptor() -> EffectDescriptor { unimplemented!() }
/// let manager = DeviceEffectManager::new(host());
///
/// let (events, _rx) = manager.client_channel();
/// let request = CreateEffectRequest::new(
///     descriptor(),
///     DeviceKey::new(DeviceType::Bus, "bus0"),
///     ClientId::new(1234, 1000),
///     events,
/// );
/// let created = manager.create_effect(request, &PatchSnapshot::new())?;
/// created.handle.enable()?;
///
/// // later
/// created.handle.disconnect(false);
/// # Ok::<(), EffectError>(())
/// ```
pub struct DeviceEffectManager {
    host: Arc<dyn DeviceEffectHost>,
    config: ManagerConfig,
    effects: DeviceEffectMap,
    callback: Arc<ManagerCallback>,
    next_effect_id: AtomicI32,
    next_handle_id: AtomicU64,
}

impl DeviceEffectManager {
    /// Create a manager with the default configuration and register it as a
    /// patch listener with `host`.
    pub fn new(host: Arc<dyn DeviceEffectHost>) -> Arc<Self> {
        Self::with_config(host, ManagerConfig::default())
    }

    pub fn with_config(host: Arc<dyn DeviceEffectHost>, config: ManagerConfig) -> Arc<Self> {
        let manager = Arc::new_cyclic(|weak: &Weak<DeviceEffectManager>| Self {
            host,
            config,
            effects: DeviceEffectMap::new(),
            callback: Arc::new(ManagerCallback {
                manager: weak.clone(),
            }),
            next_effect_id: AtomicI32::new(1),
            next_handle_id: AtomicU64::new(1),
        });

        let listener: Weak<dyn PatchListener> = Arc::downgrade(&manager) as Weak<dyn PatchListener>;
        manager.host.register_patch_listener(listener);
        manager
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// A client event channel sized by the configuration.
    pub fn client_channel(&self) -> (EffectClient, EffectEvents) {
        EffectClient::channel(self.config.event_queue_capacity)
    }

    delegate! {
        to self.host {
            /// Attach an effect to a hardware port through the host.
            pub fn add_effect_to_hal(&self, port: &PortConfig, effect: &Arc<dyn HalEffect>) -> EffectResult<()>;

            /// Detach an effect from a hardware port through the host.
            pub fn remove_effect_from_hal(&self, port: &PortConfig, effect: &Arc<dyn HalEffect>) -> EffectResult<()>;

            pub fn is_audio_policy_ready(&self) -> bool;
        }
    }

    /// Whether `descriptor` could be created as a device effect right now.
    /// Creates nothing.
    pub fn check_effect_compatibility(&self, descriptor: &EffectDescriptor) -> EffectResult<()> {
        let factory = self.host.effects_factory();
        gate::check_compatibility(factory.as_deref(), descriptor, self.config.min_hal_version)
    }

    /// Create a HAL effect instance for a device port.
    pub fn create_effect_hal(
        &self,
        uuid: &Uuid,
        session: SessionId,
        device_port: PortId,
    ) -> EffectResult<Arc<dyn HalEffect>> {
        let factory = self.host.effects_factory().ok_or(EffectError::Unavailable)?;
        factory.create_effect(uuid, session, IoHandle::NONE, device_port)
    }

    /// Get a handle to the effect for `request.device`, creating the effect if
    /// the device has none yet.
    ///
    /// A new effect binds immediately if `patches` already routes to the
    /// device; otherwise it stays unbound until the routing engine reports a
    /// patch for it.
    pub fn create_effect(
        &self,
        request: CreateEffectRequest,
        patches: &PatchSnapshot,
    ) -> EffectResult<CreatedEffect> {
        let CreateEffectRequest {
            descriptor,
            device,
            client,
            effect_client,
            notify_frames_processed,
            pinned,
        } = request;

        self.check_effect_compatibility(&descriptor)?;

        let (handle, proxy, status) = {
            let mut effects = self.effects.lock();
            let proxy = match effects.get(&device) {
                Some(proxy) => proxy,
                None => {
                    let id = EffectId(self.next_effect_id.fetch_add(1, Ordering::Relaxed));
                    let callback: Arc<dyn DeviceEffectCallback> = self.callback.clone();
                    Arc::new(DeviceEffectProxy::new(device.clone(), callback, descriptor, id))
                }
            };

            let handle_id = HandleId(self.next_handle_id.fetch_add(1, Ordering::Relaxed));
            let (handle, entry) = EffectHandle::create(
                handle_id,
                &proxy,
                client,
                effect_client,
                notify_frames_processed,
                self.callback.clone(),
            )?;

            let status = proxy.add_handle(entry).and_then(|()| match proxy.init(patches) {
                Err(EffectError::NotFound) | Err(EffectError::AlreadyBound) => Ok(()),
                other => other,
            });
            if status.is_ok() {
                if pinned {
                    proxy.set_pinned(true);
                }
                effects.insert(proxy.clone());
            }
            (handle, proxy, status)
        };

        match status {
            Ok(()) => {
                let enabled = proxy.is_enabled();
                debug!(device = %device, effect_id = %proxy.id(), handle = %handle.id(), "device effect handle created");
                Ok(CreatedEffect { handle, enabled })
            }
            Err(e) => {
                warn!(device = %device, error = %e, "device effect creation failed");
                // dropping the handle detaches it, which needs the lock released
                drop(handle);
                Err(e)
            }
        }
    }

    /// Forward a new patch to every device effect.
    pub fn on_create_audio_patch(&self, handle: PatchHandle, patch: &AudioPatch) {
        debug!(
            patch = handle.0,
            hal_patch = patch.hal_handle.0,
            sink = ?patch.sinks.first().map(|p| p.device().device_type()),
            "audio patch created"
        );
        let effects = self.effects.lock();
        for proxy in effects.snapshot() {
            match proxy.on_create_patch(handle, patch) {
                Ok(()) => trace!(effect_id = %proxy.id(), patch = handle.0, "onCreatePatch ok"),
                Err(e) => warn!(effect_id = %proxy.id(), device = %proxy.device(), patch = handle.0, error = %e, "onCreatePatch failed"),
            }
        }
    }

    /// Forward a patch release to every device effect.
    pub fn on_release_audio_patch(&self, handle: PatchHandle) {
        debug!(patch = handle.0, "audio patch released");
        let effects = self.effects.lock();
        for proxy in effects.snapshot() {
            proxy.on_release_patch(handle);
        }
    }

    /// Detach `handle` from its effect, destroying the effect if that was its
    /// last handle and it is not pinned (or `unpin_if_last` is set).
    ///
    /// Returns `false` if the handle's effect no longer exists.
    pub fn disconnect_effect_handle(&self, handle: &EffectHandle, unpin_if_last: bool) -> bool {
        let (proxy, last, removed) = {
            let mut effects = self.effects.lock();
            let proxy = match handle.target() {
                EffectTarget::Device(token) => match effects.resolve(token) {
                    Ok(proxy) => proxy,
                    Err(_) => {
                        debug!(handle = %handle.id(), effect_id = %token.id, "effect already gone");
                        return false;
                    }
                },
                EffectTarget::Session { .. } => return false,
            };

            let last = proxy.remove_handle(handle.id()) == 0;
            let removed = last && (!proxy.is_pinned() || unpin_if_last);
            if removed {
                let remaining = Self::remove_effect_locked(&mut effects, &proxy);
                debug!(effect_id = %proxy.id(), device = %proxy.device(), remaining, "device effect removed");
            }
            (proxy, last, removed)
        };

        if removed {
            proxy.release();
        }
        if last && handle.enabled() {
            proxy.check_suspend_on_effect_enabled(false, false);
        }
        true
    }

    /// Remove `proxy` from the registry. Returns how many effects remain.
    pub fn remove_effect(&self, proxy: &Arc<DeviceEffectProxy>) -> usize {
        let mut effects = self.effects.lock();
        Self::remove_effect_locked(&mut effects, proxy)
    }

    fn remove_effect_locked(effects: &mut DeviceEffectMapGuard<'_>, proxy: &Arc<DeviceEffectProxy>) -> usize {
        effects.erase(proxy);
        effects.len()
    }

    /// The effect currently registered for `device`.
    pub fn effect_for(&self, device: &DeviceKey) -> Option<Arc<DeviceEffectProxy>> {
        self.effects.lock().get(device)
    }

    fn resolve(&self, target: &EffectTarget) -> EffectResult<Arc<DeviceEffectProxy>> {
        let token = target.as_device().ok_or(EffectError::StaleReference)?;
        self.effects.lock().resolve(token)
    }

    /// Number of devices with a live effect.
    pub fn len(&self) -> usize {
        self.effects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.lock().is_empty()
    }

    /// Write a human-readable listing of all device effects.
    ///
    /// Never blocks longer than the configured dump timeout per lock; if the
    /// registry lock cannot be taken a warning line is written instead of the
    /// listing.
    pub fn dump(&self, out: &mut dyn io::Write) -> io::Result<()> {
        let timeout = self.config.dump_lock_timeout;
        let effects = match self.effects.try_lock_for(timeout) {
            Some(effects) => effects,
            None => {
                warn!("device effect registry lock not acquired for dump");
                return writeln!(out, "DeviceEffectManager may be deadlocked");
            }
        };

        writeln!(out, "\nDevice Effects:")?;
        for (device, proxy) in effects.iter_sorted() {
            writeln!(
                out,
                "{:indent$}Effect for device {} address {}:",
                "",
                device.device_type(),
                device.address(),
                indent = 2
            )?;
            proxy.dump(out, 4, timeout)?;
        }
        Ok(())
    }
}

impl Drop for DeviceEffectManager {
    // Proxies reach the host through a weak reference to the manager, which is
    // already dead here, so surviving HAL effects are detached directly.
    fn drop(&mut self) {
        let proxies = self.effects.lock().drain();
        for proxy in proxies {
            proxy.release_to(self.host.as_ref());
        }
    }
}

impl PatchListener for DeviceEffectManager {
    fn on_create_audio_patch(&self, handle: PatchHandle, patch: &AudioPatch) {
        DeviceEffectManager::on_create_audio_patch(self, handle, patch)
    }

    fn on_release_audio_patch(&self, handle: PatchHandle) {
        DeviceEffectManager::on_release_audio_patch(self, handle)
    }
}

/// The manager as seen by its proxies and handles.
struct ManagerCallback {
    manager: Weak<DeviceEffectManager>,
}

impl ManagerCallback {
    fn manager(&self) -> EffectResult<Arc<DeviceEffectManager>> {
        self.manager.upgrade().ok_or(EffectError::Unavailable)
    }
}

impl DeviceEffectCallback for ManagerCallback {
    fn create_effect_hal(
        &self,
        uuid: &Uuid,
        session: SessionId,
        device_port: PortId,
    ) -> EffectResult<Arc<dyn HalEffect>> {
        self.manager()?.create_effect_hal(uuid, session, device_port)
    }

    fn add_effect_to_hal(&self, port: &PortConfig, effect: &Arc<dyn HalEffect>) -> EffectResult<()> {
        self.manager()?.add_effect_to_hal(port, effect)
    }

    fn remove_effect_from_hal(&self, port: &PortConfig, effect: &Arc<dyn HalEffect>) -> EffectResult<()> {
        self.manager()?.remove_effect_from_hal(port, effect)
    }

    fn check_suspend_on_effect_enabled(&self, effect_id: EffectId, enabled: bool, thread_locked: bool) {
        if let Ok(manager) = self.manager() {
            manager
                .host
                .check_suspend_on_effect_enabled(effect_id, enabled, thread_locked);
        }
    }

    fn disconnect_effect_handle(&self, handle: &EffectHandle, unpin_if_last: bool) -> bool {
        match self.manager() {
            Ok(manager) => manager.disconnect_effect_handle(handle, unpin_if_last),
            Err(_) => false,
        }
    }

    fn resolve(&self, target: &EffectTarget) -> EffectResult<Arc<DeviceEffectProxy>> {
        self.manager()
            .map_err(|_| EffectError::StaleReference)?
            .resolve(target)
    }
}
