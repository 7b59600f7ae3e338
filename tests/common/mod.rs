#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use devfx::*;
use parking_lot::Mutex;
use uuid::Uuid;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub struct MockHalEffect {
    id: u64,
    pub enabled: AtomicBool,
}

impl HalEffect for MockHalEffect {
    fn id(&self) -> u64 {
        self.id
    }

    fn set_enabled(&self, enabled: bool) -> EffectResult<()> {
        self.enabled.store(enabled, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockFactory {
    version: HalVersion,
    next_id: AtomicU64,
    pub fail: AtomicBool,
    pub created: Mutex<Vec<(Arc<MockHalEffect>, PortId)>>,
}

impl MockFactory {
    pub fn new(version: HalVersion) -> Self {
        Self {
            version,
            next_id: AtomicU64::new(100),
            fail: AtomicBool::new(false),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn last_created(&self) -> Option<Arc<MockHalEffect>> {
        self.created.lock().last().map(|(e, _)| e.clone())
    }
}

impl EffectsFactory for MockFactory {
    fn version(&self) -> HalVersion {
        self.version
    }

    fn create_effect(
        &self,
        _uuid: &Uuid,
        session: SessionId,
        io: IoHandle,
        device_port: PortId,
    ) -> EffectResult<Arc<dyn HalEffect>> {
        assert_eq!(session, SessionId::DEVICE);
        assert_eq!(io, IoHandle::NONE);
        if self.fail.load(Ordering::SeqCst) {
            return Err(EffectError::Hal("factory refused".into()));
        }
        let effect = Arc::new(MockHalEffect {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            enabled: AtomicBool::new(false),
        });
        self.created.lock().push((effect.clone(), device_port));
        Ok(effect)
    }
}

/// Host that records what the manager asks of it.
pub struct MockHost {
    pub factory: Option<Arc<MockFactory>>,
    pub added: AtomicUsize,
    pub removed: AtomicUsize,
    pub suspend_calls: Mutex<Vec<(EffectId, bool)>>,
    pub listener: Mutex<Option<Weak<dyn PatchListener>>>,
    /// Runs inside `add_effect_to_hal`
    pub on_add: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl MockHost {
    pub fn new(version: HalVersion) -> Arc<Self> {
        Arc::new(Self::with_factory(Some(Arc::new(MockFactory::new(version)))))
    }

    pub fn without_factory() -> Arc<Self> {
        Arc::new(Self::with_factory(None))
    }

    fn with_factory(factory: Option<Arc<MockFactory>>) -> Self {
        Self {
            factory,
            added: AtomicUsize::new(0),
            removed: AtomicUsize::new(0),
            suspend_calls: Mutex::new(Vec::new()),
            listener: Mutex::new(None),
            on_add: Mutex::new(None),
        }
    }

    pub fn factory(&self) -> &MockFactory {
        self.factory.as_ref().expect("host has a factory")
    }

    pub fn listener(&self) -> Arc<dyn PatchListener> {
        self.listener
            .lock()
            .as_ref()
            .and_then(|l| l.upgrade())
            .expect("manager registered as patch listener")
    }

    pub fn suspend_calls(&self) -> Vec<(EffectId, bool)> {
        self.suspend_calls.lock().clone()
    }
}

impl DeviceEffectHost for MockHost {
    fn effects_factory(&self) -> Option<Arc<dyn EffectsFactory>> {
        self.factory.clone().map(|f| f as Arc<dyn EffectsFactory>)
    }

    fn add_effect_to_hal(&self, _port: &PortConfig, _effect: &Arc<dyn HalEffect>) -> EffectResult<()> {
        self.added.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = self.on_add.lock().as_ref() {
            hook();
        }
        Ok(())
    }

    fn remove_effect_from_hal(&self, _port: &PortConfig, _effect: &Arc<dyn HalEffect>) -> EffectResult<()> {
        self.removed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn check_suspend_on_effect_enabled(&self, effect_id: EffectId, enabled: bool, _thread_locked: bool) {
        self.suspend_calls.lock().push((effect_id, enabled));
    }

    fn register_patch_listener(&self, listener: Weak<dyn PatchListener>) {
        *self.listener.lock() = Some(listener);
    }
}

pub fn bus(address: &str) -> DeviceKey {
    DeviceKey::new(DeviceType::Bus, address)
}

pub fn post_proc() -> EffectDescriptor {
    EffectDescriptor::new(
        Uuid::from_u128(0x1234),
        EffectFlags::from_type(EffectType::PostProcessing).unwrap(),
        "device eq",
    )
}

pub fn request(manager: &DeviceEffectManager, device: DeviceKey) -> (CreateEffectRequest, EffectEvents) {
    let (client, events) = manager.client_channel();
    let request = CreateEffectRequest::new(post_proc(), device, ClientId::new(4242, 10_000), client);
    (request, events)
}

pub fn patch_to(device: DeviceKey, hal: i32) -> AudioPatch {
    AudioPatch::new(HalPatchHandle(hal)).with_sink(PortConfig::new(PortId(hal * 10), device))
}
