//! Adapter enumeration and queue family selection

use crate::rhi::commands::QueueType;
use crate::rhi::error::{RhiError, RhiResult};

/// Coarse adapter class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterType {
    /// GPU sharing memory with the CPU
    Integrated,
    /// Discrete GPU
    Dedicated,
    /// Virtualized GPU
    Virtual,
    /// Software rasterizer
    Cpu,
    /// Anything else
    Other,
}

/// Adapter as reported by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    /// Backend device id
    pub id: u32,
    /// Human readable name
    pub name: String,
    /// PCI vendor id
    pub vendor_id: u32,
    /// Adapter class
    pub adapter_type: AdapterType,
}

/// Pick an adapter: the first dedicated one, otherwise the first listed.
pub fn select_adapter(adapters: &[AdapterInfo]) -> RhiResult<&AdapterInfo> {
    adapters
        .iter()
        .find(|adapter| adapter.adapter_type == AdapterType::Dedicated)
        .or_else(|| adapters.first())
        .ok_or(RhiError::NoSuitableAdapter)
}

/// Capabilities of one queue family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueFamilyCaps {
    /// Family index
    pub index: u32,
    /// Supports graphics
    pub graphics: bool,
    /// Supports compute
    pub compute: bool,
    /// Supports transfer
    pub transfer: bool,
}

/// Queue family chosen for each queue type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    /// Graphics family
    pub graphics: u32,
    /// Compute family (async when it differs from graphics)
    pub compute: u32,
    /// Transfer family (dedicated DMA when available)
    pub transfer: u32,
}

impl QueueFamilies {
    /// Family used for `queue`
    pub const fn family(&self, queue: QueueType) -> u32 {
        match queue {
            QueueType::Graphics => self.graphics,
            QueueType::Compute => self.compute,
            QueueType::Transfer => self.transfer,
        }
    }

    /// Distinct family indices, graphics first
    pub fn unique(&self) -> Vec<u32> {
        let mut families = vec![self.graphics];
        for family in [self.compute, self.transfer] {
            if !families.contains(&family) {
                families.push(family);
            }
        }
        families
    }

    /// Whether resources must be shared between several families
    pub fn is_concurrent(&self) -> bool {
        self.unique().len() > 1
    }
}

/// Select queue families.
///
/// Graphics is required. Compute prefers the first compute family that is not the graphics
/// family and falls back to graphics. Transfer prefers a family with transfer but neither
/// graphics nor compute and falls back to the compute family.
pub fn select_queue_families(families: &[QueueFamilyCaps]) -> RhiResult<QueueFamilies> {
    let graphics = families
        .iter()
        .find(|family| family.graphics)
        .map(|family| family.index)
        .ok_or(RhiError::MissingQueueFamily(QueueType::Graphics))?;

    let compute = families
        .iter()
        .find(|family| family.compute && family.index != graphics)
        .map_or(graphics, |family| family.index);

    let transfer = families
        .iter()
        .find(|family| family.transfer && !family.compute && !family.graphics)
        .map_or(compute, |family| family.index);

    Ok(QueueFamilies { graphics, compute, transfer })
}
