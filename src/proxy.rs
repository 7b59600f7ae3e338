//! Per-device effect instance.
//!
//! A [`DeviceEffectProxy`] stands for one logical effect on one device. Its
//! identity ([`EffectId`]) is stable; the HAL effect behind it is created
//! lazily and replaced whenever the routing engine moves the device to a
//! different patch.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::descriptor::EffectDescriptor;
use crate::device::{DeviceKey, PortConfig};
use crate::effect::{ClientId, DeviceEffectCallback, EffectClient, EffectEvent, EffectId, HandleId};
use crate::error::{EffectError, EffectResult};
use crate::hal::{DeviceEffectHost, HalEffect, SessionId};
use crate::patch::{AudioPatch, HalPatchHandle, PatchHandle, PatchSnapshot};

/// A handle as seen from the proxy it is attached to.
pub(crate) struct HandleEntry {
    pub(crate) id: HandleId,
    pub(crate) client: ClientId,
    pub(crate) events: EffectClient,
    pub(crate) enabled: bool,
    pub(crate) notify_frames_processed: bool,
}

impl HandleEntry {
    fn notify(&mut self, event: EffectEvent) {
        if self.events.send(event).is_err() {
            trace!(handle = %self.id, ?event, "client event queue full, dropping");
        }
    }
}

struct Binding {
    patch: PatchHandle,
    hal_patch: HalPatchHandle,
    port: PortConfig,
    effect: Arc<dyn HalEffect>,
}

/// Where a proxy is currently bound.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BindingInfo {
    pub patch: PatchHandle,
    pub hal_patch: HalPatchHandle,
    pub port: PortConfig,
    pub hal_effect_id: u64,
}

struct ProxyState {
    binding: Option<Binding>,
    handles: Vec<HandleEntry>,
    enabled: bool,
    pinned: bool,
    released: bool,
}

/// One device effect shared by every handle attached to it.
pub struct DeviceEffectProxy {
    device: DeviceKey,
    id: EffectId,
    descriptor: EffectDescriptor,
    callback: Arc<dyn DeviceEffectCallback>,
    state: Mutex<ProxyState>,
}

impl DeviceEffectProxy {
    /// Create an unbound proxy. No HAL effect exists until [`init`](Self::init)
    /// or [`on_create_patch`](Self::on_create_patch) finds a patch for `device`.
    pub(crate) fn new(
        device: DeviceKey,
        callback: Arc<dyn DeviceEffectCallback>,
        descriptor: EffectDescriptor,
        id: EffectId,
    ) -> Self {
        Self {
            device,
            id,
            descriptor,
            callback,
            state: Mutex::new(ProxyState {
                binding: None,
                handles: Vec::new(),
                enabled: false,
                pinned: false,
                released: false,
            }),
        }
    }

    pub fn device(&self) -> &DeviceKey {
        &self.device
    }

    pub fn id(&self) -> EffectId {
        self.id
    }

    pub fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    pub fn is_pinned(&self) -> bool {
        self.state.lock().pinned
    }

    /// A pinned proxy survives losing its last handle.
    pub fn set_pinned(&self, pinned: bool) {
        self.state.lock().pinned = pinned;
    }

    pub fn is_bound(&self) -> bool {
        self.state.lock().binding.is_some()
    }

    pub fn binding(&self) -> Option<BindingInfo> {
        self.state.lock().binding.as_ref().map(|b| BindingInfo {
            patch: b.patch,
            hal_patch: b.hal_patch,
            port: b.port.clone(),
            hal_effect_id: b.effect.id(),
        })
    }

    pub fn handle_count(&self) -> usize {
        self.state.lock().handles.len()
    }

    /// Bind to the first known patch that routes to this device.
    ///
    /// Returns [`EffectError::AlreadyBound`] if a binding exists and
    /// [`EffectError::NotFound`] if no patch routes to the device yet. Both
    /// leave the proxy valid; the latter binds later through
    /// [`on_create_patch`](Self::on_create_patch).
    pub fn init(&self, patches: &PatchSnapshot) -> EffectResult<()> {
        let mut state = self.state.lock();
        if state.binding.is_some() {
            return Err(EffectError::AlreadyBound);
        }

        let (handle, patch, port) = patches
            .iter()
            .find_map(|(handle, patch)| {
                patch
                    .endpoint_for(&self.device)
                    .map(|port| (*handle, patch, port.clone()))
            })
            .ok_or(EffectError::NotFound)?;

        self.bind_locked(&mut state, handle, patch.hal_handle, port)
    }

    /// React to a new patch. Patches for other devices are ignored; a patch for
    /// this device replaces any current binding.
    pub fn on_create_patch(&self, handle: PatchHandle, patch: &AudioPatch) -> EffectResult<()> {
        if patch.is_empty() {
            return Err(EffectError::BadValue(format!("patch {} has no endpoints", handle.0)));
        }
        let port = match patch.endpoint_for(&self.device) {
            Some(port) => port.clone(),
            None => return Ok(()),
        };

        let mut state = self.state.lock();
        if state.released {
            return Ok(());
        }
        self.bind_locked(&mut state, handle, patch.hal_handle, port)
    }

    /// Unbind if bound to `handle`; otherwise nothing happens.
    pub fn on_release_patch(&self, handle: PatchHandle) {
        let binding = {
            let mut state = self.state.lock();
            let bound_here = state.binding.as_ref().map_or(false, |b| b.patch == handle);
            if bound_here {
                state.binding.take()
            } else {
                None
            }
        };
        if let Some(binding) = binding {
            self.unbind(binding);
        }
    }

    pub(crate) fn add_handle(&self, entry: HandleEntry) -> EffectResult<()> {
        let mut state = self.state.lock();
        if state.released {
            return Err(EffectError::StaleReference);
        }
        trace!(effect_id = %self.id, handle = %entry.id, client = entry.client.pid, "add handle");
        state.handles.push(entry);
        Ok(())
    }

    /// Detach a handle and return how many remain.
    ///
    /// A pinned proxy left without handles keeps its enabled state, and so
    /// does its HAL effect.
    pub fn remove_handle(&self, id: HandleId) -> usize {
        let mut state = self.state.lock();
        state.handles.retain(|h| h.id != id);
        if !(state.pinned && state.handles.is_empty()) {
            self.refresh_enabled_locked(&mut state);
        }
        state.handles.len()
    }

    /// Record a handle's enabled state. Returns whether the effect as a whole
    /// changed state.
    pub(crate) fn set_handle_enabled(&self, id: HandleId, enabled: bool) -> EffectResult<bool> {
        let mut state = self.state.lock();
        let entry = state
            .handles
            .iter_mut()
            .find(|h| h.id == id)
            .ok_or(EffectError::StaleReference)?;
        entry.enabled = enabled;
        Ok(self.refresh_enabled_locked(&mut state))
    }

    /// Let the host restore or suspend other effects around this one.
    pub fn check_suspend_on_effect_enabled(&self, enabled: bool, thread_locked: bool) {
        self.callback
            .check_suspend_on_effect_enabled(self.id, enabled, thread_locked);
    }

    /// Forward a frame count to every handle that asked for it.
    pub fn notify_frames_processed(&self, frames: u32) {
        let mut state = self.state.lock();
        for entry in state.handles.iter_mut().filter(|h| h.notify_frames_processed) {
            entry.notify(EffectEvent::FramesProcessed(frames));
        }
    }

    /// Tear down: drop the HAL effect and refuse further handles.
    pub(crate) fn release(&self) {
        if let Some(binding) = self.take_for_release() {
            self.unbind(binding);
        }
        debug!(effect_id = %self.id, device = %self.device, "device effect released");
    }

    /// Like [`release`](Self::release), but detaches the HAL effect through
    /// `host` instead of the callback. Used while the manager is being dropped.
    pub(crate) fn release_to(&self, host: &dyn DeviceEffectHost) {
        if let Some(binding) = self.take_for_release() {
            if let Err(e) = host.remove_effect_from_hal(&binding.port, &binding.effect) {
                warn!(effect_id = %self.id, patch = binding.patch.0, error = %e, "remove effect from HAL failed");
            }
        }
        debug!(effect_id = %self.id, device = %self.device, "device effect released on shutdown");
    }

    fn take_for_release(&self) -> Option<Binding> {
        let mut state = self.state.lock();
        state.released = true;
        state.binding.take()
    }

    pub fn dump(&self, out: &mut dyn io::Write, indent: usize, timeout: Duration) -> io::Result<()> {
        let state = match self.state.try_lock_for(timeout) {
            Some(state) => state,
            None => {
                return writeln!(out, "{:indent$}Effect ID {}: may be deadlocked", "", self.id, indent = indent);
            }
        };

        writeln!(
            out,
            "{:indent$}Effect ID {}: enabled {} pinned {} handles {}",
            "",
            self.id,
            state.enabled,
            state.pinned,
            state.handles.len(),
            indent = indent
        )?;
        writeln!(out, "{:indent$}Descriptor: {}", "", self.descriptor, indent = indent + 2)?;
        match &state.binding {
            Some(b) => writeln!(
                out,
                "{:indent$}Bound to patch {} (HAL patch {}) port {} HAL effect {}",
                "",
                b.patch.0,
                b.hal_patch.0,
                b.port.id().0,
                b.effect.id(),
                indent = indent + 2
            )?,
            None => writeln!(out, "{:indent$}Not bound", "", indent = indent + 2)?,
        }
        for h in &state.handles {
            writeln!(
                out,
                "{:indent$}Handle {} client pid {} uid {} enabled {}",
                "",
                h.id,
                h.client.pid,
                h.client.uid,
                h.enabled,
                indent = indent + 2
            )?;
        }
        Ok(())
    }

    fn bind_locked(
        &self,
        state: &mut ProxyState,
        patch: PatchHandle,
        hal_patch: HalPatchHandle,
        port: PortConfig,
    ) -> EffectResult<()> {
        if let Some(previous) = state.binding.take() {
            self.unbind(previous);
        }

        let effect = self
            .callback
            .create_effect_hal(&self.descriptor.uuid, SessionId::DEVICE, port.id())?;
        self.callback.add_effect_to_hal(&port, &effect)?;
        if state.enabled {
            if let Err(e) = effect.set_enabled(true) {
                warn!(effect_id = %self.id, error = %e, "could not enable rebound HAL effect");
            }
        }

        debug!(effect_id = %self.id, device = %self.device, patch = patch.0, port = port.id().0, "device effect bound");
        state.binding = Some(Binding {
            patch,
            hal_patch,
            port,
            effect,
        });
        Ok(())
    }

    fn unbind(&self, binding: Binding) {
        if let Err(e) = self.callback.remove_effect_from_hal(&binding.port, &binding.effect) {
            warn!(effect_id = %self.id, patch = binding.patch.0, error = %e, "remove effect from HAL failed");
        }
        debug!(effect_id = %self.id, device = %self.device, patch = binding.patch.0, "device effect unbound");
    }

    // The effect is enabled while any attached handle is.
    fn refresh_enabled_locked(&self, state: &mut ProxyState) -> bool {
        let enabled = state.handles.iter().any(|h| h.enabled);
        if enabled == state.enabled {
            return false;
        }
        state.enabled = enabled;

        if let Some(binding) = &state.binding {
            if let Err(e) = binding.effect.set_enabled(enabled) {
                warn!(effect_id = %self.id, enabled, error = %e, "HAL effect enable failed");
            }
        }
        for entry in state.handles.iter_mut() {
            entry.notify(EffectEvent::EnableStatusChanged(enabled));
        }
        true
    }
}

impl Drop for DeviceEffectProxy {
    fn drop(&mut self) {
        if let Some(binding) = self.state.get_mut().binding.take() {
            self.unbind(binding);
        }
    }
}
