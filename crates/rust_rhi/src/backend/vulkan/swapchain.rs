//! Window surface and presentation engine

use super::context::VulkanContext;
use crate::rhi::error::{RhiError, RhiResult};
use crate::rhi::handles::WindowHandle;
use ash::vk;
use std::sync::Arc;

/// Surface plus the swapchain presenting to it
pub struct VulkanSwapchain {
    context: Arc<VulkanContext>,
    surface: vk::SurfaceKHR,
    pub(crate) swapchain: vk::SwapchainKHR,
    pub(crate) images: Vec<vk::Image>,
    pub(crate) format: vk::Format,
    pub(crate) extent: vk::Extent2D,
    pub(crate) present_family: u32,
    image_count: u32,
}

impl VulkanSwapchain {
    pub(crate) fn new(context: &Arc<VulkanContext>, window: &WindowHandle, image_count: u32) -> RhiResult<Self> {
        let (Some(display), Some(raw_window)) = (window.raw_display_handle, window.raw_window_handle) else {
            return Err(RhiError::Backend("headless windows cannot be presented by the Vulkan backend".to_string()));
        };

        let surface = unsafe { ash_window::create_surface(&context.entry, &context.instance, display, raw_window, None)? };

        // Presentation must go through one of the queues the device created.
        let present_family = context.sharing_families().into_iter().find(|&family| unsafe {
            context
                .surface_loader
                .get_physical_device_surface_support(context.physical_device, family, surface)
                .unwrap_or(false)
        });
        let Some(present_family) = present_family else {
            unsafe { context.surface_loader.destroy_surface(surface, None) };
            return Err(RhiError::Backend("no device queue can present to this surface".to_string()));
        };

        let mut swapchain = Self {
            context: Arc::clone(context),
            surface,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            format: vk::Format::UNDEFINED,
            extent: vk::Extent2D::default(),
            present_family,
            image_count,
        };
        swapchain.build(window)?;
        Ok(swapchain)
    }

    /// Create (or replace) the native swapchain for the window's current size
    pub(crate) fn build(&mut self, window: &WindowHandle) -> RhiResult<()> {
        let context = &self.context;
        let capabilities = unsafe {
            context
                .surface_loader
                .get_physical_device_surface_capabilities(context.physical_device, self.surface)?
        };
        let formats = unsafe {
            context
                .surface_loader
                .get_physical_device_surface_formats(context.physical_device, self.surface)?
        };
        let surface_format = formats
            .iter()
            .copied()
            .find(|format| {
                format.format == vk::Format::B8G8R8A8_UNORM
                    && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
            .or_else(|| formats.first().copied())
            .ok_or_else(|| RhiError::Backend("surface reports no formats".to_string()))?;

        let extent = if capabilities.current_extent.width == u32::MAX {
            vk::Extent2D {
                width: window.width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
                height: window
                    .height
                    .clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
            }
        } else {
            capabilities.current_extent
        };

        let mut min_images = self.image_count.max(capabilities.min_image_count);
        if capabilities.max_image_count > 0 {
            min_images = min_images.min(capabilities.max_image_count);
        }

        let old_swapchain = self.swapchain;
        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(self.surface)
            .min_image_count(min_images)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(vk::PresentModeKHR::FIFO)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { context.swapchain_loader.create_swapchain(&create_info, None)? };
        if old_swapchain != vk::SwapchainKHR::null() {
            unsafe { context.swapchain_loader.destroy_swapchain(old_swapchain, None) };
        }
        self.swapchain = swapchain;
        self.images = unsafe { context.swapchain_loader.get_swapchain_images(swapchain)? };
        self.format = surface_format.format;
        self.extent = extent;

        log::debug!(
            "Swapchain built: {}x{}, {} images, {:?}",
            extent.width,
            extent.height,
            self.images.len(),
            surface_format.format
        );
        Ok(())
    }
}

impl Drop for VulkanSwapchain {
    fn drop(&mut self) {
        unsafe {
            if self.swapchain != vk::SwapchainKHR::null() {
                self.context.swapchain_loader.destroy_swapchain(self.swapchain, None);
            }
            self.context.surface_loader.destroy_surface(self.surface, None);
        }
    }
}
