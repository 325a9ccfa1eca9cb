//! Device registry

use crate::device::{create_device, DeviceHandle, DeviceKind};
use crate::error::DeviceError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::{Mutex, PoisonError};

/// Registry of all devices, keyed by caller-assigned id.
///
/// Timer tasks read the map while the control surface adds devices, so
/// lookups hand out cloned handles rather than references into the map.
pub struct DeviceRegistry {
    devices: DashMap<u32, DeviceHandle>,
    /// Ids with their kinds, in insertion order. Type scans and status
    /// reports iterate this instead of the unordered map.
    order: Mutex<Vec<(u32, DeviceKind)>>,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            devices: DashMap::new(),
            order: Mutex::new(Vec::new()),
        }
    }

    /// Build a device through the factory and insert it.
    ///
    /// Rejects ids that are already taken, leaving the registry unchanged.
    pub fn add(&self, id: u32, kind: DeviceKind) -> Result<DeviceHandle, DeviceError> {
        match self.devices.entry(id) {
            Entry::Occupied(_) => Err(DeviceError::DuplicateId(id)),
            Entry::Vacant(slot) => {
                let handle = create_device(id, kind);
                slot.insert(handle.clone());
                self.order
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push((id, kind));
                tracing::debug!("registered {kind} device {id}");
                Ok(handle)
            }
        }
    }

    /// Non-owning lookup. Absent ids are `None`, never an error.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<DeviceHandle> {
        self.devices.get(&id).map(|entry| entry.value().clone())
    }

    /// All devices of a kind, in insertion order.
    #[must_use]
    pub fn list_by_kind(&self, kind: DeviceKind) -> Vec<(u32, DeviceHandle)> {
        self.ordered_ids()
            .into_iter()
            .filter(|(_, k)| *k == kind)
            .filter_map(|(id, _)| self.get(id).map(|handle| (id, handle)))
            .collect()
    }

    /// Snapshot of every device, in insertion order.
    #[must_use]
    pub fn all(&self) -> Vec<(u32, DeviceHandle)> {
        self.ordered_ids()
            .into_iter()
            .filter_map(|(id, _)| self.get(id).map(|handle| (id, handle)))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    fn ordered_ids(&self) -> Vec<(u32, DeviceKind)> {
        self.order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{lock_device, OnOffState};

    #[test]
    fn add_then_get_returns_the_same_device() {
        let registry = DeviceRegistry::new();
        registry.add(1, DeviceKind::Light).unwrap();

        let handle = registry.get(1).unwrap();
        assert_eq!(lock_device(&handle).kind(), DeviceKind::Light);
        assert!(registry.get(2).is_none());
    }

    #[test]
    fn duplicate_id_is_rejected_and_state_unchanged() {
        let registry = DeviceRegistry::new();
        let first = registry.add(1, DeviceKind::Light).unwrap();
        lock_device(&first).turn_on();

        let err = registry.add(1, DeviceKind::Thermostat).unwrap_err();
        assert!(matches!(err, DeviceError::DuplicateId(1)));
        assert_eq!(registry.len(), 1);

        // The original device is untouched by the failed add.
        let handle = registry.get(1).unwrap();
        let device = lock_device(&handle);
        assert_eq!(device.kind(), DeviceKind::Light);
        assert_eq!(device.status(), OnOffState::On);
    }

    #[test]
    fn list_by_kind_preserves_insertion_order() {
        let registry = DeviceRegistry::new();
        registry.add(5, DeviceKind::Thermostat).unwrap();
        registry.add(2, DeviceKind::Light).unwrap();
        registry.add(9, DeviceKind::Thermostat).unwrap();

        let ids: Vec<u32> = registry
            .list_by_kind(DeviceKind::Thermostat)
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec![5, 9]);

        let all: Vec<u32> = registry.all().into_iter().map(|(id, _)| id).collect();
        assert_eq!(all, vec![5, 2, 9]);
    }

    #[test]
    fn concurrent_adds_with_distinct_ids_all_land() {
        let registry = DeviceRegistry::new();
        std::thread::scope(|scope| {
            for id in 0..16 {
                let registry = &registry;
                scope.spawn(move || registry.add(id, DeviceKind::Outlet).unwrap());
            }
        });
        assert_eq!(registry.len(), 16);
        for id in 0..16 {
            assert!(registry.get(id).is_some());
        }
    }
}
