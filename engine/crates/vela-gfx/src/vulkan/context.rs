use std::ffi::{CStr, CString, c_char};
use std::mem::ManuallyDrop;

use ash::vk;
use itertools::Itertools;

use crate::error::{GfxError, GfxResult};
use crate::vulkan::debug_messenger::VkDebugMsger;

/// Vulkan 的基础对象：instance、物理设备、逻辑设备、队列、内存分配器
///
/// 只使用一个 graphics queue，它同时需要支持 present
pub struct VkCore {
    /// 在 drop 之后会卸载 dll，因此需要确保该字段最后 drop
    pub(crate) entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    debug_msger: Option<VkDebugMsger>,

    pub(crate) surface_pf: ash::khr::surface::Instance,
    pub(crate) pdevice: vk::PhysicalDevice,
    pub(crate) queue_family_index: u32,

    pub(crate) device: ash::Device,
    pub(crate) swapchain_pf: ash::khr::swapchain::Device,
    debug_utils: Option<ash::ext::debug_utils::Device>,
    pub(crate) queue: vk::Queue,

    /// 所有 command buffer 都从这个 pool 分配
    pub(crate) command_pool: vk::CommandPool,

    /// 需要在 device 之前销毁
    pub(crate) allocator: ManuallyDrop<vk_mem::Allocator>,

    destroyed: bool,
}

// new & init
impl VkCore {
    /// 创建 instance 以及 surface，然后挑选一个能够 present 到 surface 的物理设备
    pub fn new(
        app_name: &str,
        raw_display_handle: raw_window_handle::RawDisplayHandle,
        raw_window_handle: raw_window_handle::RawWindowHandle,
    ) -> GfxResult<(Self, vk::SurfaceKHR)> {
        let _span = tracy_client::span!("VkCore::new");

        let entry = unsafe { ash::Entry::load()? };
        let enable_debug_utils = Self::is_instance_ext_supported(&entry, ash::ext::debug_utils::NAME)?;
        let instance = Self::create_instance(&entry, app_name, raw_display_handle, enable_debug_utils)?;
        let debug_msger = if enable_debug_utils { Some(VkDebugMsger::new(&entry, &instance)?) } else { None };

        let surface_pf = ash::khr::surface::Instance::new(&entry, &instance);
        let surface =
            unsafe { ash_window::create_surface(&entry, &instance, raw_display_handle, raw_window_handle, None)? };

        let (pdevice, queue_family_index) = Self::pick_physical_device(&instance, &surface_pf, surface)?;

        let queue_priorities = [1.0];
        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family_index)
            .queue_priorities(&queue_priorities)];
        let device = Self::create_device(&instance, pdevice, &queue_create_infos)?;
        let queue = unsafe { device.get_device_queue(queue_family_index, 0) };

        let swapchain_pf = ash::khr::swapchain::Device::new(&instance, &device);
        let debug_utils = enable_debug_utils.then(|| ash::ext::debug_utils::Device::new(&instance, &device));

        let command_pool = unsafe {
            device.create_command_pool(
                &vk::CommandPoolCreateInfo::default()
                    .queue_family_index(queue_family_index)
                    .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER),
                None,
            )?
        };

        // vma 需要引用 instance 以及 device，因此在它们之后创建
        let mut vma_ci = vk_mem::AllocatorCreateInfo::new(&instance, &device, pdevice);
        vma_ci.vulkan_api_version = vk::API_VERSION_1_2;
        let allocator = unsafe { vk_mem::Allocator::new(vma_ci)? };

        let core = Self {
            entry,
            instance,
            debug_msger,
            surface_pf,
            pdevice,
            queue_family_index,
            device,
            swapchain_pf,
            debug_utils,
            queue,
            command_pool,
            allocator: ManuallyDrop::new(allocator),
            destroyed: false,
        };
        core.set_debug_name(core.queue, "gfx-queue");
        core.set_debug_name(surface, "main");

        Ok((core, surface))
    }

    fn create_instance(
        entry: &ash::Entry,
        app_name: &str,
        raw_display_handle: raw_window_handle::RawDisplayHandle,
        enable_debug_utils: bool,
    ) -> GfxResult<ash::Instance> {
        let app_name = CString::new(app_name).unwrap_or_default();
        let engine_name = c"vela";
        let app_info = vk::ApplicationInfo::default()
            .api_version(vk::API_VERSION_1_2)
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0));

        let mut extensions: Vec<*const c_char> =
            ash_window::enumerate_required_extensions(raw_display_handle)?.to_vec();
        if enable_debug_utils {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }
        log::info!(
            "instance extensions: {}",
            extensions.iter().map(|ext| format!("\n\t{:?}", unsafe { CStr::from_ptr(*ext) })).join("")
        );

        // validation layer 交给 vulkan configurator 控制
        let mut instance_ci =
            vk::InstanceCreateInfo::default().application_info(&app_info).enabled_extension_names(&extensions);

        let mut debug_utils_messenger_ci = VkDebugMsger::debug_utils_messenger_ci();
        if enable_debug_utils {
            instance_ci = instance_ci.push_next(&mut debug_utils_messenger_ci);
        }

        Ok(unsafe { entry.create_instance(&instance_ci, None)? })
    }

    fn is_instance_ext_supported(entry: &ash::Entry, ext: &CStr) -> GfxResult<bool> {
        let all_ext_props = unsafe { entry.enumerate_instance_extension_properties(None)? };
        Ok(all_ext_props.iter().any(|props| props.extension_name_as_c_str().is_ok_and(|name| name == ext)))
    }

    /// 优先选择独立显卡，如果没有则选择第一个可用的显卡
    fn pick_physical_device(
        instance: &ash::Instance,
        surface_pf: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> GfxResult<(vk::PhysicalDevice, u32)> {
        let pdevices = unsafe { instance.enumerate_physical_devices()? };

        let mut candidates = vec![];
        for pdevice in pdevices {
            let props = unsafe { instance.get_physical_device_properties(pdevice) };
            let queue_family_props = unsafe { instance.get_physical_device_queue_family_properties(pdevice) };

            // graphics queue 需要同时支持 present
            let mut queue_family_index = None;
            for (idx, family) in queue_family_props.iter().enumerate() {
                if !family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                    continue;
                }
                let present_support =
                    unsafe { surface_pf.get_physical_device_surface_support(pdevice, idx as u32, surface)? };
                if present_support {
                    queue_family_index = Some(idx as u32);
                    break;
                }
            }

            let name = props.device_name_as_c_str().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            match queue_family_index {
                Some(idx) => {
                    log::info!("found gpu: {}, queue family: {}", name, idx);
                    candidates.push((pdevice, idx, props.device_type));
                }
                None => log::info!("skip gpu without present support: {}", name),
            }
        }

        candidates
            .into_iter()
            .find_or_first(|(_, _, ty)| *ty == vk::PhysicalDeviceType::DISCRETE_GPU)
            .map(|(pdevice, idx, _)| (pdevice, idx))
            .ok_or(GfxError::Vulkan(vk::Result::ERROR_INCOMPATIBLE_DRIVER))
    }

    fn create_device(
        instance: &ash::Instance,
        pdevice: vk::PhysicalDevice,
        queue_create_infos: &[vk::DeviceQueueCreateInfo],
    ) -> GfxResult<ash::Device> {
        let device_exts = [ash::khr::swapchain::NAME.as_ptr()];

        // 未写入的 binding（例如可选的光照）需要 PARTIALLY_BOUND
        let mut vk12_features = vk::PhysicalDeviceVulkan12Features::default().descriptor_binding_partially_bound(true);
        let mut all_features = vk::PhysicalDeviceFeatures2::default()
            .features(vk::PhysicalDeviceFeatures::default().fill_mode_non_solid(true))
            .push_next(&mut vk12_features);

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(queue_create_infos)
            .enabled_extension_names(&device_exts)
            .push_next(&mut all_features);

        Ok(unsafe { instance.create_device(pdevice, &device_create_info, None)? })
    }
}
// tools
impl VkCore {
    pub fn set_debug_name<T: vk::Handle + Copy>(&self, handle: T, name: impl AsRef<str>) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(name) = CString::new(name.as_ref()) else {
            return;
        };
        let result = unsafe {
            debug_utils.set_debug_utils_object_name(
                &vk::DebugUtilsObjectNameInfoEXT::default().object_name(&name).object_handle(handle),
            )
        };
        if let Err(e) = result {
            log::warn!("failed to set debug name {:?}: {:?}", name, e);
        }
    }

    /// 录制一次性的命令并同步等待执行完成
    pub fn one_time_exec(&self, name: &str, func: impl FnOnce(&ash::Device, vk::CommandBuffer)) -> GfxResult<()> {
        let _span = tracy_client::span!("VkCore::one_time_exec");

        let cmd = unsafe {
            self.device.allocate_command_buffers(
                &vk::CommandBufferAllocateInfo::default()
                    .command_pool(self.command_pool)
                    .level(vk::CommandBufferLevel::PRIMARY)
                    .command_buffer_count(1),
            )?[0]
        };
        self.set_debug_name(cmd, format!("one-time-{name}"));

        let result = unsafe {
            self.device
                .begin_command_buffer(
                    cmd,
                    &vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
                )
                .and_then(|_| {
                    func(&self.device, cmd);
                    self.device.end_command_buffer(cmd)
                })
                .and_then(|_| {
                    let cmds = [cmd];
                    let submit_info = vk::SubmitInfo::default().command_buffers(&cmds);
                    self.device.queue_submit(self.queue, &[submit_info], vk::Fence::null())
                })
                .and_then(|_| self.device.queue_wait_idle(self.queue))
        };

        unsafe {
            self.device.free_command_buffers(self.command_pool, &[cmd]);
        }
        Ok(result?)
    }
}
// destroy
impl VkCore {
    pub fn destroy(&mut self) {
        log::info!("destroying vulkan core");
        unsafe {
            self.device.destroy_command_pool(self.command_pool, None);
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
            if let Some(debug_msger) = self.debug_msger.take() {
                debug_msger.destroy();
            }
            self.instance.destroy_instance(None);
        }
        self.destroyed = true;
    }
}
impl Drop for VkCore {
    fn drop(&mut self) {
        debug_assert!(self.destroyed, "VkCore must be destroyed before being dropped.");
    }
}
