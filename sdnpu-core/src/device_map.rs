use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeviceMap {
    ForceCpu,
    Ordinal(usize),
}

impl Default for DeviceMap {
    fn default() -> Self {
        Self::Ordinal(0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Cpu,
    Npu(usize),
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Cpu => write!(f, "cpu"),
            DeviceKind::Npu(ordinal) => write!(f, "npu:{ordinal}"),
        }
    }
}

/// A physical accelerator. At most one generation may run on it at a time.
///
/// The lock is a tokio mutex, so blocked callers are admitted in FIFO order.
#[derive(Debug)]
pub struct Device {
    kind: DeviceKind,
    lock: Mutex<()>,
}

impl Device {
    pub fn new(kind: DeviceKind) -> Self {
        Self {
            kind,
            lock: Mutex::new(()),
        }
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Blocks the current thread until the device is free.
    ///
    /// Must be called from a blocking context (a plain thread or `spawn_blocking`), never from
    /// inside an async task.
    pub fn acquire_blocking(&self) -> MutexGuard<'_, ()> {
        self.lock.blocking_lock()
    }

    pub fn is_busy(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}

pub fn select_device(device_map: DeviceMap) -> Arc<Device> {
    let kind = match device_map {
        DeviceMap::ForceCpu => DeviceKind::Cpu,
        DeviceMap::Ordinal(ordinal) => DeviceKind::Npu(ordinal),
    };
    tracing::info!(device = %kind, "selected device");
    Arc::new(Device::new(kind))
}
