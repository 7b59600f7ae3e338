//! Client handles to device effects.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::effect::{ClientId, DeviceEffectCallback, EffectClient, EffectId, EffectTarget, HandleId, ProxyToken};
use crate::error::{EffectError, EffectResult};
#[cfg(test)]
use crate::hal::SessionId;
use crate::proxy::{DeviceEffectProxy, HandleEntry};

/// One client's reference to a shared device effect.
///
/// Handles are returned by [`DeviceEffectManager::create_effect`](crate::DeviceEffectManager::create_effect).
/// They do not keep the effect alive: the manager owns it, and a handle only
/// remembers which effect it belongs to. Every operation re-resolves that
/// reference and fails with [`EffectError::StaleReference`] once the effect
/// is gone.
///
/// Dropping a handle that was never disconnected disconnects it without
/// forcing an unpin.
pub struct EffectHandle {
    id: HandleId,
    client: ClientId,
    target: EffectTarget,
    enabled: AtomicBool,
    disconnected: AtomicBool,
    callback: Arc<dyn DeviceEffectCallback>,
}

impl EffectHandle {
    /// Build a handle for `proxy` plus the entry the proxy keeps for it.
    ///
    /// Fails if the client's event channel has no receiver any more.
    pub(crate) fn create(
        id: HandleId,
        proxy: &DeviceEffectProxy,
        client: ClientId,
        effect_client: EffectClient,
        notify_frames_processed: bool,
        callback: Arc<dyn DeviceEffectCallback>,
    ) -> EffectResult<(EffectHandle, HandleEntry)> {
        if !effect_client.is_connected() {
            return Err(EffectError::HandleInitFailure(format!(
                "client {} event channel is closed",
                client.pid
            )));
        }

        let handle = EffectHandle {
            id,
            client,
            target: EffectTarget::Device(ProxyToken {
                device: proxy.device().clone(),
                id: proxy.id(),
            }),
            enabled: AtomicBool::new(false),
            disconnected: AtomicBool::new(false),
            callback,
        };
        let entry = HandleEntry {
            id,
            client,
            events: effect_client,
            enabled: false,
            notify_frames_processed,
        };
        Ok((handle, entry))
    }

    /// A handle on a session effect rather than a device effect.
    #[cfg(test)]
    pub(crate) fn for_session(
        id: HandleId,
        client: ClientId,
        session: SessionId,
        effect_id: EffectId,
        callback: Arc<dyn DeviceEffectCallback>,
    ) -> EffectHandle {
        EffectHandle {
            id,
            client,
            target: EffectTarget::Session { session, id: effect_id },
            enabled: AtomicBool::new(false),
            disconnected: AtomicBool::new(false),
            callback,
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn client(&self) -> ClientId {
        self.client
    }

    pub fn target(&self) -> &EffectTarget {
        &self.target
    }

    /// Identity of the effect this handle was created for.
    pub fn effect_id(&self) -> EffectId {
        match &self.target {
            EffectTarget::Device(token) => token.id,
            EffectTarget::Session { id, .. } => *id,
        }
    }

    /// Whether this client has enabled the effect.
    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Acquire)
    }

    /// The effect behind this handle, if it still exists.
    pub fn effect(&self) -> EffectResult<Arc<DeviceEffectProxy>> {
        if self.is_disconnected() {
            return Err(EffectError::StaleReference);
        }
        self.callback.resolve(&self.target)
    }

    pub fn enable(&self) -> EffectResult<()> {
        self.set_enabled(true)
    }

    pub fn disable(&self) -> EffectResult<()> {
        self.set_enabled(false)
    }

    fn set_enabled(&self, enabled: bool) -> EffectResult<()> {
        let proxy = self.effect()?;
        let changed = proxy.set_handle_enabled(self.id, enabled)?;
        self.enabled.store(enabled, Ordering::Release);
        trace!(handle = %self.id, effect_id = %proxy.id(), enabled, changed, "handle enable");
        if changed {
            proxy.check_suspend_on_effect_enabled(enabled, false);
        }
        Ok(())
    }

    /// Detach from the effect.
    ///
    /// If this was the last handle and the effect is not pinned (or
    /// `unpin_if_last` is set), the effect is destroyed. Returns `false` if the
    /// effect was already gone or this handle was already disconnected.
    pub fn disconnect(&self, unpin_if_last: bool) -> bool {
        if self.disconnected.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.callback.disconnect_effect_handle(self, unpin_if_last)
    }
}

impl Drop for EffectHandle {
    fn drop(&mut self) {
        if !self.is_disconnected() {
            self.disconnect(false);
        }
    }
}
