//! Device registry
//!
//! A fixed set of slots guarded by one mutex. Slot 0 is the root node and
//! never holds hardware; a device keeps its slot index until it is detached.
//!
//! Lock order is registry, then device. Code holding a device lock never
//! takes the registry lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use ckb_device::{Device, DeviceCommand};
use ckb_transport::{BoxedTransport, KnownDevice};

use crate::devnode::{ListingEntry, NodeConfig};
use crate::error::RegistryError;
use crate::input::InputSink;
use crate::worker::{spawn_workers, CancelToken, WorkerContext};

/// Number of slots, root included
pub const DEV_MAX: usize = 9;

/// Device shared between the registry and its workers
pub type SharedDevice = Arc<Mutex<Device>>;

/// One occupied hardware slot
struct Slot {
    device: SharedDevice,
    listing: ListingEntry,
    location: String,
    cancel: CancelToken,
    lost: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

type Slots = [Option<Slot>; DEV_MAX];

/// All connected devices
pub struct Registry {
    nodes: NodeConfig,
    sink: Arc<dyn InputSink>,
    slots: Mutex<Slots>,
}

fn listing(slots: &Slots) -> Vec<ListingEntry> {
    slots.iter().flatten().map(|s| s.listing.clone()).collect()
}

impl Registry {
    pub fn new(nodes: NodeConfig, sink: Arc<dyn InputSink>) -> Arc<Self> {
        Arc::new(Self {
            nodes,
            sink,
            slots: Mutex::new(std::array::from_fn(|_| None)),
        })
    }

    pub fn nodes(&self) -> &NodeConfig {
        &self.nodes
    }

    /// Create the nodes of a slot; slot 0 is the root node
    pub fn create_device_nodes(&self, slot: usize) -> Result<(), RegistryError> {
        let slots = self.slots.lock();
        if slot == 0 {
            self.nodes.create_root_nodes(&listing(&slots))?;
            return Ok(());
        }
        let entry = slots
            .get(slot)
            .and_then(Option::as_ref)
            .ok_or(RegistryError::NoSuchSlot(slot))?;
        let mut dev = entry.device.lock();
        self.nodes.create_device_nodes(slot, &mut dev)?;
        Ok(())
    }

    /// Close a slot's handles and delete its nodes
    pub fn remove_device_nodes(&self, slot: usize) -> Result<(), RegistryError> {
        let slots = self.slots.lock();
        match slots.get(slot).and_then(Option::as_ref) {
            Some(entry) => {
                let mut dev = entry.device.lock();
                self.nodes.remove_device_nodes(slot, Some(&mut *dev))?;
            }
            None => self.nodes.remove_device_nodes(slot, None)?,
        }
        Ok(())
    }

    /// Rewrite the root `connected` listing
    pub fn refresh_connected_listing(&self) -> bool {
        let slots = self.slots.lock();
        self.nodes.write_connected(&listing(&slots))
    }

    /// Rewrite `fwversion` and `pollrate` of a slot
    pub fn publish_firmware_info(&self, slot: usize) -> Result<(), RegistryError> {
        let slots = self.slots.lock();
        let entry = slots
            .get(slot)
            .and_then(Option::as_ref)
            .ok_or(RegistryError::NoSuchSlot(slot))?;
        let dev = entry.device.lock();
        self.nodes.publish_firmware_info(slot, &dev);
        Ok(())
    }

    /// Run `f` on the device in `slot`
    ///
    /// The registry lock is released before the device lock is taken.
    pub fn with_device<R>(&self, slot: usize, f: impl FnOnce(&mut Device) -> R) -> Result<R, RegistryError> {
        if slot == 0 {
            return Err(RegistryError::RootSlot);
        }
        let device = {
            let slots = self.slots.lock();
            let entry = slots
                .get(slot)
                .and_then(Option::as_ref)
                .ok_or(RegistryError::NoSuchSlot(slot))?;
            Arc::clone(&entry.device)
        };
        let mut dev = device.lock();
        Ok(f(&mut dev))
    }

    /// Run `f` with the registry lock held, for work touching device nodes
    ///
    /// Fails unless `slot` still holds `device`.
    pub(crate) fn with_nodes<R>(
        &self,
        slot: usize,
        device: &SharedDevice,
        f: impl FnOnce(&NodeConfig, &mut Device) -> R,
    ) -> Result<R, RegistryError> {
        let slots = self.slots.lock();
        match slots.get(slot).and_then(Option::as_ref) {
            Some(entry) if Arc::ptr_eq(&entry.device, device) => {
                let mut dev = device.lock();
                Ok(f(&self.nodes, &mut dev))
            }
            _ => Err(RegistryError::NoSuchSlot(slot)),
        }
    }

    /// Occupied slots and their listing entries
    pub fn listing(&self) -> Vec<ListingEntry> {
        listing(&self.slots.lock())
    }

    /// Slot holding the device at a hot-plug location
    pub fn find_location(&self, location: &str) -> Option<usize> {
        let slots = self.slots.lock();
        slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|s| s.location == location))
    }

    /// Hot-plug locations of all occupied slots
    pub fn locations(&self) -> Vec<(usize, String)> {
        let slots = self.slots.lock();
        slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (i, s.location.clone())))
            .collect()
    }

    /// Register a device, build its nodes and start its workers
    pub fn attach(self: &Arc<Self>, transport: BoxedTransport, known: &KnownDevice) -> Result<usize, RegistryError> {
        let mut slots = self.slots.lock();
        let index = (1..DEV_MAX)
            .find(|&i| slots[i].is_none())
            .ok_or(RegistryError::Full)?;

        let mut dev = Device::new(transport.clone(), known);
        self.nodes.create_device_nodes(index, &mut dev)?;

        let listing_entry = ListingEntry::new(index, &dev.identity);
        let location = dev.identity.location.clone();
        let serial = dev.identity.serial.clone();
        let device: SharedDevice = Arc::new(Mutex::new(dev));
        let cancel = CancelToken::new();
        let lost = Arc::new(AtomicBool::new(false));

        let ctx = WorkerContext {
            registry: Arc::clone(self),
            slot: index,
            device: Arc::clone(&device),
            transport,
            cancel: cancel.clone(),
            lost: Arc::clone(&lost),
            sink: Arc::clone(&self.sink),
        };
        let workers = match spawn_workers(ctx) {
            Ok(workers) => workers,
            Err(e) => {
                let mut dev = device.lock();
                let _ = self.nodes.remove_device_nodes(index, Some(&mut *dev));
                return Err(RegistryError::Worker(e));
            }
        };

        slots[index] = Some(Slot {
            device,
            listing: listing_entry,
            location,
            cancel,
            lost,
            workers,
        });
        self.nodes.write_connected(&listing(&slots));
        info!("{} attached in slot {}", serial, index);
        Ok(index)
    }

    /// Stop a device's workers and delete its nodes
    pub fn detach(&self, slot: usize) -> Result<(), RegistryError> {
        if slot == 0 {
            return Err(RegistryError::RootSlot);
        }
        let workers = {
            let mut slots = self.slots.lock();
            let entry = slots
                .get_mut(slot)
                .and_then(Option::take)
                .ok_or(RegistryError::NoSuchSlot(slot))?;
            entry.cancel.cancel();
            {
                let mut dev = entry.device.lock();
                if !entry.lost.load(Ordering::SeqCst) && dev.active {
                    let class = dev.class;
                    if let Err(e) = class.set_active(&mut dev, false) {
                        debug!("slot {}: unable to return to hardware mode: {}", slot, e);
                    }
                }
                if let Err(e) = self.nodes.remove_device_nodes(slot, Some(&mut *dev)) {
                    error!("slot {}: {}", slot, e);
                }
            }
            self.nodes.write_connected(&listing(&slots));
            info!("{} detached from slot {}", entry.listing.serial, slot);
            entry.workers
        };
        for worker in workers {
            if worker.join().is_err() {
                warn!("slot {}: worker panicked", slot);
            }
        }
        Ok(())
    }

    /// Detach every slot whose device has disconnected
    pub fn reap_lost(&self) -> Vec<usize> {
        let lost: Vec<usize> = {
            let slots = self.slots.lock();
            slots
                .iter()
                .enumerate()
                .filter(|(_, s)| s.as_ref().is_some_and(|s| s.lost.load(Ordering::SeqCst)))
                .map(|(i, _)| i)
                .collect()
        };
        for &slot in &lost {
            if let Err(e) = self.detach(slot) {
                debug!("slot {}: {}", slot, e);
            }
        }
        lost
    }

    /// Detach everything and remove the root node
    pub fn shutdown(&self) {
        for slot in 1..DEV_MAX {
            match self.detach(slot) {
                Ok(()) | Err(RegistryError::NoSuchSlot(_)) => {}
                Err(e) => warn!("slot {}: {}", slot, e),
            }
        }
        if let Err(e) = self.nodes.remove_device_nodes(0, None) {
            error!("Unable to remove root node: {}", e);
        }
    }
}
