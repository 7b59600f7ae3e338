use std::sync::{Arc, Weak};

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use devfx::*;
use uuid::Uuid;

struct NullEffect;

impl HalEffect for NullEffect {
    fn id(&self) -> u64 {
        0
    }

    fn set_enabled(&self, _enabled: bool) -> EffectResult<()> {
        Ok(())
    }
}

struct NullFactory;

impl EffectsFactory for NullFactory {
    fn version(&self) -> HalVersion {
        HalVersion::aidl(1, 0)
    }

    fn create_effect(&self, _: &Uuid, _: SessionId, _: IoHandle, _: PortId) -> EffectResult<Arc<dyn HalEffect>> {
        Ok(Arc::new(NullEffect))
    }
}

struct NullHost;

impl DeviceEffectHost for NullHost {
    fn effects_factory(&self) -> Option<Arc<dyn EffectsFactory>> {
        Some(Arc::new(NullFactory))
    }

    fn add_effect_to_hal(&self, _: &PortConfig, _: &Arc<dyn HalEffect>) -> EffectResult<()> {
        Ok(())
    }

    fn remove_effect_from_hal(&self, _: &PortConfig, _: &Arc<dyn HalEffect>) -> EffectResult<()> {
        Ok(())
    }

    fn check_suspend_on_effect_enabled(&self, _: EffectId, _: bool, _: bool) {}

    fn register_patch_listener(&self, _: Weak<dyn PatchListener>) {}
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let descriptor = EffectDescriptor::new(
        Uuid::from_u128(1),
        EffectFlags::from_type(EffectType::PostProcessing).expect("named type"),
        "bench",
    );
    let device = DeviceKey::new(DeviceType::Bus, "bus0");
    let mut patches = PatchSnapshot::new();
    patches.insert(
        PatchHandle(1),
        AudioPatch::new(HalPatchHandle(1)).with_sink(PortConfig::new(PortId(1), device.clone())),
    );

    c.bench_function("create_effect + disconnect", |b| {
        let manager = DeviceEffectManager::new(Arc::new(NullHost));
        b.iter(|| {
            let (client, _events) = manager.client_channel();
            let request = CreateEffectRequest::new(descriptor.clone(), device.clone(), ClientId::new(1, 1), client);
            let created = manager.create_effect(request, &patches).unwrap();
            black_box(created.handle.disconnect(false))
        })
    });

    c.bench_function("on_create_audio_patch (16 devices)", |b| {
        let manager = DeviceEffectManager::new(Arc::new(NullHost));
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let (client, events) = manager.client_channel();
                let key = DeviceKey::new(DeviceType::Bus, format!("bus{}", i));
                let request = CreateEffectRequest::new(descriptor.clone(), key, ClientId::new(1, 1), client);
                (manager.create_effect(request, &PatchSnapshot::new()).unwrap(), events)
            })
            .collect();
        let patch = AudioPatch::new(HalPatchHandle(2)).with_sink(PortConfig::new(PortId(2), DeviceKey::new(DeviceType::Bus, "bus7")));

        b.iter(|| {
            manager.on_create_audio_patch(PatchHandle(2), black_box(&patch));
            manager.on_release_audio_patch(PatchHandle(2));
        });
        drop(handles);
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
