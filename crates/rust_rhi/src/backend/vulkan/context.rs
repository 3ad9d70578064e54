//! Vulkan instance, adapter and logical device
//!
//! [`VulkanContext`] owns everything with a process-wide lifetime: the loader entry, the
//! instance and its debug messenger, the chosen physical device, the logical device with one
//! queue per used family, and the extension loaders. Every RAII object created by the
//! backend holds an `Arc` to it, so the device outlives the last object.

use crate::config::DeviceConfig;
use crate::rhi::adapter::{
    select_adapter, select_queue_families, AdapterInfo, AdapterType, QueueFamilies, QueueFamilyCaps,
};
use crate::rhi::commands::QueueType;
use crate::rhi::error::{RhiError, RhiResult};
use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};
use raw_window_handle::RawDisplayHandle;
use std::ffi::{CStr, CString};

const VALIDATION_LAYER: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_KHRONOS_validation\0") };

/// Process-wide Vulkan state
pub struct VulkanContext {
    pub(crate) entry: Entry,
    pub(crate) instance: Instance,
    pub(crate) debug_utils: Option<DebugUtils>,
    debug_messenger: vk::DebugUtilsMessengerEXT,
    pub(crate) surface_loader: Surface,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub(crate) adapter: AdapterInfo,
    pub(crate) families: QueueFamilies,
    pub(crate) device: Device,
    pub(crate) swapchain_loader: SwapchainLoader,
    queues: Vec<(u32, vk::Queue)>,
}

impl VulkanContext {
    /// Create the instance, pick an adapter and create the logical device.
    ///
    /// `display` enables the surface extensions of that platform; without it the context can
    /// still create resources but not present.
    pub fn new(config: &DeviceConfig, display: Option<RawDisplayHandle>) -> RhiResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| RhiError::Backend(format!("Failed to load Vulkan: {e}")))?;

        let validation = config.validation_enabled();
        let debug_utils_enabled = validation || config.debug_names;

        let app_name = CString::new(config.application_name.as_str())
            .map_err(|_| RhiError::Backend("application name contains a NUL byte".to_string()))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(CStr::from_bytes_with_nul(b"rust_rhi\0").map_err(|e| RhiError::Backend(e.to_string()))?)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_1);

        let mut extensions: Vec<*const std::os::raw::c_char> = match display {
            Some(display) => ash_window::enumerate_required_extensions(display)?.to_vec(),
            None => Vec::new(),
        };
        if debug_utils_enabled {
            extensions.push(DebugUtils::name().as_ptr());
        }
        let layers: Vec<*const std::os::raw::c_char> =
            if validation { vec![VALIDATION_LAYER.as_ptr()] } else { Vec::new() };

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);
        let instance = unsafe { entry.create_instance(&create_info, None)? };

        let (debug_utils, debug_messenger) = if debug_utils_enabled {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let messenger = if validation {
                Self::create_debug_messenger(&debug_utils)?
            } else {
                vk::DebugUtilsMessengerEXT::null()
            };
            (Some(debug_utils), messenger)
        } else {
            (None, vk::DebugUtilsMessengerEXT::null())
        };

        let (physical_device, adapter) = Self::select_physical_device(&instance)?;
        let families = Self::select_families(&instance, physical_device)?;
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(physical_device) };

        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let device_extensions = if display.is_some() { vec![SwapchainLoader::name().as_ptr()] } else { Vec::new() };
        let features = vk::PhysicalDeviceFeatures::builder().sampler_anisotropy(true).build();
        let device_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&device_extensions)
            .enabled_features(&features);
        let device = unsafe { instance.create_device(physical_device, &device_info, None)? };

        let queues = families
            .unique()
            .into_iter()
            .map(|family| (family, unsafe { device.get_device_queue(family, 0) }))
            .collect();
        let surface_loader = Surface::new(&entry, &instance);
        let swapchain_loader = SwapchainLoader::new(&instance, &device);

        log::info!(
            "Vulkan device created on {} (validation: {validation}, families {:?})",
            adapter.name,
            families
        );

        Ok(Self {
            entry,
            instance,
            debug_utils,
            debug_messenger,
            surface_loader,
            physical_device,
            memory_properties,
            adapter,
            families,
            device,
            swapchain_loader,
            queues,
        })
    }

    fn create_debug_messenger(debug_utils: &DebugUtils) -> RhiResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));
        Ok(unsafe { debug_utils.create_debug_utils_messenger(&create_info, None)? })
    }

    fn select_physical_device(instance: &Instance) -> RhiResult<(vk::PhysicalDevice, AdapterInfo)> {
        let devices = unsafe { instance.enumerate_physical_devices()? };
        let adapters: Vec<AdapterInfo> = devices
            .iter()
            .map(|&device| {
                let properties = unsafe { instance.get_physical_device_properties(device) };
                let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy().into_owned();
                let adapter_type = match properties.device_type {
                    vk::PhysicalDeviceType::INTEGRATED_GPU => AdapterType::Integrated,
                    vk::PhysicalDeviceType::DISCRETE_GPU => AdapterType::Dedicated,
                    vk::PhysicalDeviceType::VIRTUAL_GPU => AdapterType::Virtual,
                    vk::PhysicalDeviceType::CPU => AdapterType::Cpu,
                    _ => AdapterType::Other,
                };
                AdapterInfo { id: properties.device_id, name, vendor_id: properties.vendor_id, adapter_type }
            })
            .collect();

        let adapter = select_adapter(&adapters)?;
        let index = adapters.iter().position(|candidate| candidate == adapter).ok_or(RhiError::NoSuitableAdapter)?;
        log::info!("Selected GPU: {} ({:?})", adapter.name, adapter.adapter_type);
        Ok((devices[index], adapter.clone()))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn select_families(instance: &Instance, physical_device: vk::PhysicalDevice) -> RhiResult<QueueFamilies> {
        let properties = unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
        let caps: Vec<QueueFamilyCaps> = properties
            .iter()
            .enumerate()
            .map(|(index, family)| QueueFamilyCaps {
                index: index as u32,
                graphics: family.queue_flags.contains(vk::QueueFlags::GRAPHICS),
                compute: family.queue_flags.contains(vk::QueueFlags::COMPUTE),
                transfer: family.queue_flags.contains(vk::QueueFlags::TRANSFER),
            })
            .collect();
        select_queue_families(&caps)
    }

    /// Queue of `family`
    pub(crate) fn queue_for_family(&self, family: u32) -> vk::Queue {
        self.queues
            .iter()
            .find(|(index, _)| *index == family)
            .map_or_else(vk::Queue::null, |&(_, queue)| queue)
    }

    /// Queue used for `queue`
    pub(crate) fn queue(&self, queue: QueueType) -> vk::Queue {
        self.queue_for_family(self.families.family(queue))
    }

    /// Families a buffer or image is shared across
    pub(crate) fn sharing_families(&self) -> Vec<u32> {
        self.families.unique()
    }

    /// First memory type allowed by `type_bits` with all of `properties`
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn find_memory_type(&self, type_bits: u32, properties: vk::MemoryPropertyFlags) -> RhiResult<u32> {
        let count = self.memory_properties.memory_type_count as usize;
        self.memory_properties.memory_types[..count]
            .iter()
            .enumerate()
            .find(|(index, memory_type)| {
                type_bits & (1 << index) != 0 && memory_type.property_flags.contains(properties)
            })
            .map(|(index, _)| index as u32)
            .ok_or(RhiError::NoSuitableMemoryType)
    }

    /// Allocate memory for `requirements`
    pub(crate) fn allocate(
        &self,
        requirements: vk::MemoryRequirements,
        properties: vk::MemoryPropertyFlags,
    ) -> RhiResult<vk::DeviceMemory> {
        let memory_type = self.find_memory_type(requirements.memory_type_bits, properties)?;
        let info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);
        unsafe { self.device.allocate_memory(&info, None) }.map_err(|result| match result {
            vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
                RhiError::OutOfMemory { requested: requirements.size }
            }
            other => RhiError::Vulkan(other),
        })
    }

    /// Attach a debug name to a native object. No-op without the debug-utils extension.
    pub(crate) fn set_object_name(&self, object_type: vk::ObjectType, handle: u64, name: &str) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(name) = CString::new(name) else {
            log::warn!("Debug name {name:?} contains a NUL byte");
            return;
        };
        let info = vk::DebugUtilsObjectNameInfoEXT::builder()
            .object_type(object_type)
            .object_handle(handle)
            .object_name(&name);
        if let Err(err) = unsafe { debug_utils.set_debug_utils_object_name(self.device.handle(), &info) } {
            log::warn!("Failed to set debug name {name:?}: {err:?}");
        }
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            if let Err(err) = self.device.device_wait_idle() {
                log::warn!("Device wait idle failed during shutdown: {err:?}");
            }
            self.device.destroy_device(None);
            if let Some(debug_utils) = &self.debug_utils {
                if self.debug_messenger != vk::DebugUtilsMessengerEXT::null() {
                    debug_utils.destroy_debug_utils_messenger(self.debug_messenger, None);
                }
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Validation layer callback
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {message_type:?} - {message}");
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {message_type:?} - {message}");
    } else {
        log::debug!("[Vulkan] {message_type:?} - {message}");
    }

    vk::FALSE
}
