//! Identifiers, client channels and the callback seam shared by proxies and handles.

use core::fmt;
use std::sync::Arc;

use rtrb::{Consumer, Producer, RingBuffer};
use uuid::Uuid;

use crate::device::{DeviceKey, PortConfig, PortId};
use crate::error::EffectResult;
use crate::hal::{HalEffect, SessionId};
use crate::handle::EffectHandle;
use crate::proxy::DeviceEffectProxy;

/// Process-unique identifier of an effect instance.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct EffectId(pub i32);

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a handle within the manager that created it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct HandleId(pub(crate) u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the client process owning a handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ClientId {
    pub pid: u32,
    pub uid: u32,
}

impl ClientId {
    pub fn new(pid: u32, uid: u32) -> Self {
        Self { pid, uid }
    }
}

/// Notifications delivered to a client through its [`EffectClient`] channel.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EffectEvent {
    /// The shared effect was enabled or disabled (by this or another client)
    EnableStatusChanged(bool),
    /// Frames processed since the last notification; only sent to handles
    /// created with `notify_frames_processed`
    FramesProcessed(u32),
}

/// Producer side of a client's event channel.
///
/// Events are queued in a lock-free ring buffer. If the client stops draining
/// its [`EffectEvents`] the buffer fills and further events are dropped.
pub struct EffectClient {
    sender: Producer<EffectEvent>,
}

impl EffectClient {
    /// Create a connected client channel pair.
    ///
    /// ```
    /// use devfx::{EffectClient, EffectEvent};
    ///
    /// let (mut client, mut events) = EffectClient::channel(4);
    /// client.send(EffectEvent::EnableStatusChanged(true)).ok();
    /// assert_eq!(events.recv(), Some(EffectEvent::EnableStatusChanged(true)));
    /// ```
    pub fn channel(capacity: usize) -> (EffectClient, EffectEvents) {
        let (sender, receiver) = RingBuffer::new(capacity.max(1));
        (EffectClient { sender }, EffectEvents { receiver })
    }

    /// The channel is usable as long as its receiving side is alive.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_abandoned()
    }

    /// Queue an event. Returns `Err(event)` when the queue is full.
    pub fn send(&mut self, event: EffectEvent) -> Result<(), EffectEvent> {
        self.sender.push(event).map_err(|rtrb::PushError::Full(e)| e)
    }
}

/// Consumer side of a client's event channel.
pub struct EffectEvents {
    receiver: Consumer<EffectEvent>,
}

impl EffectEvents {
    pub fn recv(&mut self) -> Option<EffectEvent> {
        self.receiver.pop().ok()
    }

    /// Drain everything currently queued.
    pub fn drain(&mut self) -> impl Iterator<Item = EffectEvent> + '_ {
        let receiver = &mut self.receiver;
        core::iter::from_fn(move || receiver.pop().ok())
    }
}

/// Weak reference from a handle to a device effect.
///
/// Holds no ownership; [`DeviceEffectCallback::resolve`] looks the proxy up again
/// and fails once the proxy for `device` is gone or has been replaced.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ProxyToken {
    pub device: DeviceKey,
    pub id: EffectId,
}

/// What a handle is attached to, tagged by effect kind.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum EffectTarget {
    Device(ProxyToken),
    /// A session-scoped effect managed elsewhere; never resolves here
    Session { session: SessionId, id: EffectId },
}

impl EffectTarget {
    pub fn as_device(&self) -> Option<&ProxyToken> {
        match self {
            EffectTarget::Device(token) => Some(token),
            EffectTarget::Session { .. } => None,
        }
    }
}

/// Services a proxy and its handles need from the manager that owns them.
pub trait DeviceEffectCallback: Send + Sync {
    fn create_effect_hal(
        &self,
        uuid: &Uuid,
        session: SessionId,
        device_port: PortId,
    ) -> EffectResult<Arc<dyn HalEffect>>;

    fn add_effect_to_hal(&self, port: &PortConfig, effect: &Arc<dyn HalEffect>) -> EffectResult<()>;

    fn remove_effect_from_hal(&self, port: &PortConfig, effect: &Arc<dyn HalEffect>) -> EffectResult<()>;

    fn check_suspend_on_effect_enabled(&self, effect_id: EffectId, enabled: bool, thread_locked: bool);

    /// Detach `handle` from its effect. See [`EffectHandle::disconnect`].
    fn disconnect_effect_handle(&self, handle: &EffectHandle, unpin_if_last: bool) -> bool;

    /// Re-resolve a weak effect reference.
    fn resolve(&self, target: &EffectTarget) -> EffectResult<Arc<DeviceEffectProxy>>;
}
