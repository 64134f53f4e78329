use ash::ext::debug_utils as ext_debug;
use ash::khr::{surface, swapchain};
use ash::util::read_spv;
use ash::{vk, Entry, Instance};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use std::io::Cursor;
use tracing::{error, info, warn};
use trigon_render::{
    FrameError, FrameOutcome, RenderSize, Renderer, RendererOptions, SetupError, SetupErrorKind,
    SetupStage,
};

/// Double buffering: the CPU may run at most this many frames ahead of the
/// GPU before WAIT_SLOT blocks.
const MAX_FRAMES_IN_FLIGHT: usize = 2;

const VALIDATION_LAYER: &std::ffi::CStr = c"VK_LAYER_KHRONOS_validation";

const VERT_SPV: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/tri.vert.spv"));
const FRAG_SPV: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/tri.frag.spv"));

pub struct VkRenderer {
    _entry: Entry,
    instance: Instance,
    debug: Option<(ext_debug::Instance, vk::DebugUtilsMessengerEXT)>,

    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,

    phys: vk::PhysicalDevice,
    device: ash::Device,
    graphics_family: u32,
    present_family: u32,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,

    swapchain_loader: swapchain::Device,
    res: DeviceResources,

    cursor: FrameCursor,
    paused: bool,
}

/// Swapchain plus everything derived from its images. Rebuilt wholesale on
/// invalidation, never partially patched.
#[derive(Default)]
struct PresentChain {
    swapchain: vk::SwapchainKHR,
    format: vk::Format,
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
}

/// One frame-in-flight slot: handshake semaphores, completion fence, and the
/// command buffer re-recorded each time the slot comes around.
struct FrameSlot {
    image_available: vk::Semaphore,
    render_finished: vk::Semaphore,
    in_flight: vk::Fence,
    cmd: vk::CommandBuffer,
}

/// Everything owned below the logical device, with null defaults so a
/// partially built set can be torn down with the same routine as a complete
/// one.
#[derive(Default)]
struct DeviceResources {
    chain: PresentChain,
    render_pass: vk::RenderPass,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    framebuffers: Vec<vk::Framebuffer>,
    cmd_pool: vk::CommandPool,
    frames: Vec<FrameSlot>,
}

/// Round-robin slot index over `depth` frame slots.
#[derive(Clone, Copy, Debug)]
struct FrameCursor {
    index: usize,
    depth: usize,
}

impl FrameCursor {
    fn new(depth: usize) -> Self {
        Self { index: 0, depth }
    }

    fn current(&self) -> usize {
        self.index
    }

    fn advance(&mut self) {
        self.index = (self.index + 1) % self.depth;
    }
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if !data.is_null() {
        let msg = std::ffi::CStr::from_ptr((*data).p_message).to_string_lossy();
        if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            error!("vulkan: {msg}");
        } else {
            warn!("vulkan: {msg}");
        }
    }
    vk::FALSE
}

fn vk_setup(stage: SetupStage, e: vk::Result) -> SetupError {
    SetupError::new(stage, SetupErrorKind::Api(format!("{e:?}")))
}

// --- Selection policies (pure; exercised by the tests at the bottom) ---

/// Prefer 8-bit BGRA in the standard non-linear color space; otherwise take
/// the first reported format. Deterministic fallback, not an error.
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_UNORM
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .unwrap_or(formats[0])
}

/// MAILBOX when offered (low latency, non-blocking), else FIFO, which every
/// conformant implementation supports.
fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Fixed current extent when the surface reports one; otherwise the drawable
/// pixel size clamped into the surface's min/max bounds (covers high-DPI
/// logical-vs-pixel mismatches).
fn extent_from_caps(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// One more than the minimum, capped at the maximum (0 meaning unbounded).
fn image_count_from_caps(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    if caps.max_image_count == 0 {
        caps.min_image_count + 1
    } else {
        (caps.min_image_count + 1).min(caps.max_image_count)
    }
}

/// CONCURRENT across both families when graphics and present differ,
/// EXCLUSIVE otherwise.
fn sharing_for_families(graphics: u32, present: u32) -> vk::SharingMode {
    if graphics != present {
        vk::SharingMode::CONCURRENT
    } else {
        vk::SharingMode::EXCLUSIVE
    }
}

// --- Instance-level setup ---

unsafe fn validation_layer_available(entry: &Entry) -> bool {
    entry
        .enumerate_instance_layer_properties()
        .map(|layers| {
            layers
                .iter()
                .any(|l| l.layer_name_as_c_str().map_or(false, |n| n == VALIDATION_LAYER))
        })
        .unwrap_or(false)
}

unsafe fn create_instance(
    entry: &Entry,
    display_raw: RawDisplayHandle,
    app_name: &str,
    validation: bool,
) -> Result<Instance, SetupError> {
    if validation && !validation_layer_available(entry) {
        return Err(SetupError::new(
            SetupStage::Instance,
            SetupErrorKind::ValidationUnavailable,
        ));
    }

    let app_name = std::ffi::CString::new(app_name)
        .map_err(|_| SetupError::new(SetupStage::Instance, SetupErrorKind::Api("application name contains an interior NUL".into())))?;

    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: app_name.as_ptr(),
        application_version: 0,
        p_engine_name: app_name.as_ptr(),
        engine_version: 0,
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    let mut extensions = ash_window::enumerate_required_extensions(display_raw)
        .map_err(|e| vk_setup(SetupStage::Instance, e))?
        .to_vec();
    let mut layers: Vec<*const std::os::raw::c_char> = Vec::new();
    if validation {
        extensions.push(ext_debug::NAME.as_ptr());
        layers.push(VALIDATION_LAYER.as_ptr());
    }

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_layer_count: layers.len() as u32,
        pp_enabled_layer_names: layers.as_ptr(),
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        ..Default::default()
    };

    entry
        .create_instance(&create_info, None)
        .map_err(|e| vk_setup(SetupStage::Instance, e))
}

/// Register the messenger for WARNING and above; anything below is noise for
/// this engine.
unsafe fn create_debug_messenger(
    entry: &Entry,
    instance: &Instance,
) -> Result<(ext_debug::Instance, vk::DebugUtilsMessengerEXT), SetupError> {
    let loader = ext_debug::Instance::new(entry, instance);
    let ci = vk::DebugUtilsMessengerCreateInfoEXT {
        s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
        message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        pfn_user_callback: Some(debug_callback),
        ..Default::default()
    };
    let messenger = loader
        .create_debug_utils_messenger(&ci, None)
        .map_err(|e| vk_setup(SetupStage::Instance, e))?;
    Ok((loader, messenger))
}

// --- Physical/logical device ---

unsafe fn find_queue_families(
    instance: &Instance,
    surface_loader: &surface::Instance,
    phys: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Option<(u32, u32)> {
    let props = instance.get_physical_device_queue_family_properties(phys);

    let mut graphics = None;
    let mut present = None;
    for (i, q) in props.iter().enumerate() {
        let i = i as u32;
        let has_graphics = q.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        if graphics.is_none() && has_graphics {
            graphics = Some(i);
        }
        let can_present = surface_loader
            .get_physical_device_surface_support(phys, i, surface)
            .unwrap_or(false);
        // Prefer a family that does both; otherwise take any present-capable one.
        if can_present && (present.is_none() || (has_graphics && graphics == Some(i))) {
            present = Some(i);
        }
    }
    Some((graphics?, present?))
}

unsafe fn supports_swapchain_ext(instance: &Instance, phys: vk::PhysicalDevice) -> bool {
    instance
        .enumerate_device_extension_properties(phys)
        .map(|exts| {
            exts.iter()
                .any(|e| e.extension_name_as_c_str().map_or(false, |n| n == swapchain::NAME))
        })
        .unwrap_or(false)
}

/// First device with a graphics family, a present-capable family for this
/// surface, the swapchain extension, and at least one format and present
/// mode.
unsafe fn select_physical_device(
    instance: &Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, u32, u32), SetupError> {
    let devices = instance
        .enumerate_physical_devices()
        .map_err(|e| vk_setup(SetupStage::PickDevice, e))?;

    for phys in devices {
        let Some((graphics, present)) = find_queue_families(instance, surface_loader, phys, surface)
        else {
            continue;
        };
        if !supports_swapchain_ext(instance, phys) {
            continue;
        }
        let formats = surface_loader
            .get_physical_device_surface_formats(phys, surface)
            .unwrap_or_default();
        let modes = surface_loader
            .get_physical_device_surface_present_modes(phys, surface)
            .unwrap_or_default();
        if formats.is_empty() || modes.is_empty() {
            continue;
        }
        return Ok((phys, graphics, present));
    }

    Err(SetupError::new(
        SetupStage::PickDevice,
        SetupErrorKind::NoSuitableDevice,
    ))
}

/// One queue per distinct family: a shared graphics/present family is
/// requested exactly once.
unsafe fn create_logical_device(
    instance: &Instance,
    phys: vk::PhysicalDevice,
    graphics_family: u32,
    present_family: u32,
) -> Result<(ash::Device, vk::Queue, vk::Queue), SetupError> {
    let priorities = [1.0_f32];
    let mut families = vec![graphics_family];
    if present_family != graphics_family {
        families.push(present_family);
    }
    let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
        .iter()
        .map(|&family| vk::DeviceQueueCreateInfo {
            s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
            queue_family_index: family,
            queue_count: 1,
            p_queue_priorities: priorities.as_ptr(),
            ..Default::default()
        })
        .collect();

    let device_exts = [swapchain::NAME.as_ptr()];
    let dinfo = vk::DeviceCreateInfo {
        s_type: vk::StructureType::DEVICE_CREATE_INFO,
        queue_create_info_count: queue_infos.len() as u32,
        p_queue_create_infos: queue_infos.as_ptr(),
        enabled_extension_count: device_exts.len() as u32,
        pp_enabled_extension_names: device_exts.as_ptr(),
        ..Default::default()
    };

    let device = instance.create_device(phys, &dinfo, None).map_err(|e| {
        SetupError::new(
            SetupStage::LogicalDevice,
            SetupErrorKind::DeviceCreationFailed(format!("{e:?}")),
        )
    })?;
    let graphics_queue = device.get_device_queue(graphics_family, 0);
    let present_queue = device.get_device_queue(present_family, 0);
    Ok((device, graphics_queue, present_queue))
}

// --- Presentation chain ---

unsafe fn create_chain(
    device: &ash::Device,
    surface_loader: &surface::Instance,
    swapchain_loader: &swapchain::Device,
    phys: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    graphics_family: u32,
    present_family: u32,
    hint: RenderSize,
) -> Result<PresentChain, SetupError> {
    let caps = surface_loader
        .get_physical_device_surface_capabilities(phys, surface)
        .map_err(|e| vk_setup(SetupStage::Swapchain, e))?;
    let formats = surface_loader
        .get_physical_device_surface_formats(phys, surface)
        .map_err(|e| vk_setup(SetupStage::Swapchain, e))?;
    let modes = surface_loader
        .get_physical_device_surface_present_modes(phys, surface)
        .map_err(|e| vk_setup(SetupStage::Swapchain, e))?;

    if formats.is_empty() {
        return Err(SetupError::new(
            SetupStage::Swapchain,
            SetupErrorKind::Api("no surface formats reported".into()),
        ));
    }

    let surf_format = choose_surface_format(&formats);
    let present_mode = choose_present_mode(&modes);
    let extent = extent_from_caps(&caps, hint);
    let min_count = image_count_from_caps(&caps);

    let family_indices = [graphics_family, present_family];
    let sharing = sharing_for_families(graphics_family, present_family);
    let (index_count, index_ptr) = if sharing == vk::SharingMode::CONCURRENT {
        (2, family_indices.as_ptr())
    } else {
        (0, std::ptr::null())
    };

    let swap_info = vk::SwapchainCreateInfoKHR {
        s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
        surface,
        min_image_count: min_count,
        image_format: surf_format.format,
        image_color_space: surf_format.color_space,
        image_extent: extent,
        image_array_layers: 1,
        image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
        image_sharing_mode: sharing,
        queue_family_index_count: index_count,
        p_queue_family_indices: index_ptr,
        pre_transform: caps.current_transform,
        composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
        present_mode,
        clipped: vk::TRUE,
        ..Default::default()
    };

    let sc = swapchain_loader
        .create_swapchain(&swap_info, None)
        .map_err(|e| vk_setup(SetupStage::Swapchain, e))?;

    let mut chain = PresentChain {
        swapchain: sc,
        format: surf_format.format,
        extent,
        images: Vec::new(),
        views: Vec::new(),
    };

    // On any failure below, hand back only the error; the caller tears the
    // partial chain down through the shared destroy path.
    match swapchain_loader.get_swapchain_images(sc) {
        Ok(images) => chain.images = images,
        Err(e) => {
            swapchain_loader.destroy_swapchain(sc, None);
            return Err(vk_setup(SetupStage::Swapchain, e));
        }
    }

    for &img in &chain.images {
        let iv_info = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image: img,
            view_type: vk::ImageViewType::TYPE_2D,
            format: surf_format.format,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };
        match device.create_image_view(&iv_info, None) {
            Ok(view) => chain.views.push(view),
            Err(e) => {
                for view in chain.views.drain(..) {
                    device.destroy_image_view(view, None);
                }
                swapchain_loader.destroy_swapchain(sc, None);
                return Err(vk_setup(SetupStage::Swapchain, e));
            }
        }
    }

    Ok(chain)
}

/// Single color attachment: clear on load, store on end, UNDEFINED in and
/// PRESENT_SRC out. Created once; reused across every chain rebuild.
unsafe fn create_render_pass(
    device: &ash::Device,
    format: vk::Format,
) -> Result<vk::RenderPass, SetupError> {
    let color_att = vk::AttachmentDescription {
        format,
        samples: vk::SampleCountFlags::TYPE_1,
        load_op: vk::AttachmentLoadOp::CLEAR,
        store_op: vk::AttachmentStoreOp::STORE,
        stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
        stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
        initial_layout: vk::ImageLayout::UNDEFINED,
        final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        ..Default::default()
    };
    let att_ref = vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    let subpass = vk::SubpassDescription {
        pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
        color_attachment_count: 1,
        p_color_attachments: &att_ref,
        ..Default::default()
    };
    // Gate the layout transition on the acquire semaphore's wait stage.
    let dependency = vk::SubpassDependency {
        src_subpass: vk::SUBPASS_EXTERNAL,
        dst_subpass: 0,
        src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        src_access_mask: vk::AccessFlags::empty(),
        dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        dependency_flags: vk::DependencyFlags::empty(),
    };

    let rp_info = vk::RenderPassCreateInfo {
        s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
        attachment_count: 1,
        p_attachments: &color_att,
        subpass_count: 1,
        p_subpasses: &subpass,
        dependency_count: 1,
        p_dependencies: &dependency,
        ..Default::default()
    };
    device
        .create_render_pass(&rp_info, None)
        .map_err(|e| vk_setup(SetupStage::RenderPass, e))
}

// --- Pipeline ---

/// Build the one graphics pipeline from opaque SPIR-V blobs. The triangle
/// lives in the vertex shader, so there is no vertex input state; viewport
/// and scissor are dynamic so resizes never touch the pipeline. Shader
/// modules are destroyed as soon as pipeline creation resolves, success or
/// failure.
unsafe fn create_pipeline(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    vs_bytes: &[u8],
    fs_bytes: &[u8],
) -> Result<(vk::PipelineLayout, vk::Pipeline), SetupError> {
    if vs_bytes.is_empty() {
        return Err(SetupError::new(
            SetupStage::Pipeline,
            SetupErrorKind::ShaderLoadFailed("vertex"),
        ));
    }
    if fs_bytes.is_empty() {
        return Err(SetupError::new(
            SetupStage::Pipeline,
            SetupErrorKind::ShaderLoadFailed("fragment"),
        ));
    }

    let vs_code = read_spv(&mut Cursor::new(vs_bytes))
        .map_err(|e| SetupError::new(SetupStage::Pipeline, SetupErrorKind::Api(e.to_string())))?;
    let fs_code = read_spv(&mut Cursor::new(fs_bytes))
        .map_err(|e| SetupError::new(SetupStage::Pipeline, SetupErrorKind::Api(e.to_string())))?;

    let vs_ci = vk::ShaderModuleCreateInfo {
        s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
        code_size: vs_code.len() * 4,
        p_code: vs_code.as_ptr(),
        ..Default::default()
    };
    let fs_ci = vk::ShaderModuleCreateInfo {
        s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
        code_size: fs_code.len() * 4,
        p_code: fs_code.as_ptr(),
        ..Default::default()
    };
    let vs = device
        .create_shader_module(&vs_ci, None)
        .map_err(|e| vk_setup(SetupStage::Pipeline, e))?;
    let fs = match device.create_shader_module(&fs_ci, None) {
        Ok(m) => m,
        Err(e) => {
            device.destroy_shader_module(vs, None);
            return Err(vk_setup(SetupStage::Pipeline, e));
        }
    };
    let entry = std::ffi::CString::new("main").unwrap();

    let stages = [
        vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage: vk::ShaderStageFlags::VERTEX,
            module: vs,
            p_name: entry.as_ptr(),
            ..Default::default()
        },
        vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage: vk::ShaderStageFlags::FRAGMENT,
            module: fs,
            p_name: entry.as_ptr(),
            ..Default::default()
        },
    ];

    // No bound vertex input: positions come from gl_VertexIndex.
    let vertex_input = vk::PipelineVertexInputStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
        ..Default::default()
    };
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
        topology: vk::PrimitiveTopology::TRIANGLE_LIST,
        ..Default::default()
    };
    let dyn_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
        dynamic_state_count: dyn_states.len() as u32,
        p_dynamic_states: dyn_states.as_ptr(),
        ..Default::default()
    };
    let viewport_state = vk::PipelineViewportStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
        viewport_count: 1,
        p_viewports: std::ptr::null(), // dynamic
        scissor_count: 1,
        p_scissors: std::ptr::null(), // dynamic
        ..Default::default()
    };
    let raster = vk::PipelineRasterizationStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
        polygon_mode: vk::PolygonMode::FILL,
        cull_mode: vk::CullModeFlags::BACK,
        front_face: vk::FrontFace::CLOCKWISE,
        line_width: 1.0,
        ..Default::default()
    };
    let multisample = vk::PipelineMultisampleStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
        rasterization_samples: vk::SampleCountFlags::TYPE_1,
        ..Default::default()
    };
    let color_blend_att = vk::PipelineColorBlendAttachmentState {
        color_write_mask: vk::ColorComponentFlags::R
            | vk::ColorComponentFlags::G
            | vk::ColorComponentFlags::B
            | vk::ColorComponentFlags::A,
        blend_enable: vk::FALSE,
        ..Default::default()
    };
    let color_blend = vk::PipelineColorBlendStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
        attachment_count: 1,
        p_attachments: &color_blend_att,
        ..Default::default()
    };

    // No descriptor sets, no push constants.
    let layout_info = vk::PipelineLayoutCreateInfo {
        s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
        ..Default::default()
    };
    let layout = match device.create_pipeline_layout(&layout_info, None) {
        Ok(l) => l,
        Err(e) => {
            device.destroy_shader_module(vs, None);
            device.destroy_shader_module(fs, None);
            return Err(vk_setup(SetupStage::Pipeline, e));
        }
    };

    let pipeline_info = vk::GraphicsPipelineCreateInfo {
        s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
        stage_count: stages.len() as u32,
        p_stages: stages.as_ptr(),
        p_vertex_input_state: &vertex_input,
        p_input_assembly_state: &input_assembly,
        p_viewport_state: &viewport_state,
        p_rasterization_state: &raster,
        p_multisample_state: &multisample,
        p_color_blend_state: &color_blend,
        p_dynamic_state: &dynamic_state,
        layout,
        render_pass,
        subpass: 0,
        ..Default::default()
    };

    let result = device.create_graphics_pipelines(
        vk::PipelineCache::null(),
        std::slice::from_ref(&pipeline_info),
        None,
    );
    device.destroy_shader_module(vs, None);
    device.destroy_shader_module(fs, None);

    match result {
        Ok(pipelines) => Ok((layout, pipelines[0])),
        Err((_, e)) => {
            device.destroy_pipeline_layout(layout, None);
            Err(vk_setup(SetupStage::Pipeline, e))
        }
    }
}

/// One framebuffer per chain image view, index-aligned, sized to the chain
/// extent.
unsafe fn create_framebuffers(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    views: &[vk::ImageView],
    extent: vk::Extent2D,
) -> Result<Vec<vk::Framebuffer>, SetupError> {
    let mut framebuffers = Vec::with_capacity(views.len());
    for &view in views {
        let fb_info = vk::FramebufferCreateInfo {
            s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
            render_pass,
            attachment_count: 1,
            p_attachments: &view,
            width: extent.width,
            height: extent.height,
            layers: 1,
            ..Default::default()
        };
        match device.create_framebuffer(&fb_info, None) {
            Ok(fb) => framebuffers.push(fb),
            Err(e) => {
                for fb in framebuffers.drain(..) {
                    device.destroy_framebuffer(fb, None);
                }
                return Err(vk_setup(SetupStage::Framebuffers, e));
            }
        }
    }
    Ok(framebuffers)
}

/// One slot per frame in flight: both semaphores unsignaled, the fence
/// pre-signaled so frame 0's WAIT_SLOT never blocks.
unsafe fn create_frame_slots(
    device: &ash::Device,
    cmd_bufs: &[vk::CommandBuffer],
) -> Result<Vec<FrameSlot>, SetupError> {
    let sem_ci = vk::SemaphoreCreateInfo::default();
    let fence_ci = vk::FenceCreateInfo {
        s_type: vk::StructureType::FENCE_CREATE_INFO,
        flags: vk::FenceCreateFlags::SIGNALED,
        ..Default::default()
    };

    let mut slots: Vec<FrameSlot> = Vec::with_capacity(cmd_bufs.len());

    for &cmd in cmd_bufs {
        let image_available = match device.create_semaphore(&sem_ci, None) {
            Ok(s) => s,
            Err(e) => {
                drain_slots(device, &mut slots);
                return Err(vk_setup(SetupStage::SyncObjects, e));
            }
        };
        let render_finished = match device.create_semaphore(&sem_ci, None) {
            Ok(s) => s,
            Err(e) => {
                device.destroy_semaphore(image_available, None);
                drain_slots(device, &mut slots);
                return Err(vk_setup(SetupStage::SyncObjects, e));
            }
        };
        let in_flight = match device.create_fence(&fence_ci, None) {
            Ok(f) => f,
            Err(e) => {
                device.destroy_semaphore(image_available, None);
                device.destroy_semaphore(render_finished, None);
                drain_slots(device, &mut slots);
                return Err(vk_setup(SetupStage::SyncObjects, e));
            }
        };
        slots.push(FrameSlot {
            image_available,
            render_finished,
            in_flight,
            cmd,
        });
    }
    Ok(slots)
}

unsafe fn drain_slots(device: &ash::Device, slots: &mut Vec<FrameSlot>) {
    for s in slots.drain(..) {
        device.destroy_semaphore(s.image_available, None);
        device.destroy_semaphore(s.render_finished, None);
        device.destroy_fence(s.in_flight, None);
    }
}

// --- Teardown (shared by Drop and the setup failure path) ---

// STRICT TEARDOWN ORDER:
// - Pipeline and layout before the swapchain
// - Framebuffers, then image views, then the swapchain handle
// - Free command buffers before destroying their pool
// - Sync objects and render pass before the device
// Null handles are skipped so a partially built set tears down cleanly.
unsafe fn destroy_device_resources(
    device: &ash::Device,
    swapchain_loader: &swapchain::Device,
    res: &mut DeviceResources,
) {
    if res.pipeline != vk::Pipeline::null() {
        device.destroy_pipeline(res.pipeline, None);
        res.pipeline = vk::Pipeline::null();
    }
    if res.pipeline_layout != vk::PipelineLayout::null() {
        device.destroy_pipeline_layout(res.pipeline_layout, None);
        res.pipeline_layout = vk::PipelineLayout::null();
    }

    for fb in res.framebuffers.drain(..) {
        device.destroy_framebuffer(fb, None);
    }
    for view in res.chain.views.drain(..) {
        device.destroy_image_view(view, None);
    }
    if res.chain.swapchain != vk::SwapchainKHR::null() {
        swapchain_loader.destroy_swapchain(res.chain.swapchain, None);
        res.chain.swapchain = vk::SwapchainKHR::null();
    }
    res.chain.images.clear();

    if res.cmd_pool != vk::CommandPool::null() {
        let bufs: Vec<vk::CommandBuffer> = res.frames.iter().map(|f| f.cmd).collect();
        if !bufs.is_empty() {
            device.free_command_buffers(res.cmd_pool, &bufs);
        }
        device.destroy_command_pool(res.cmd_pool, None);
        res.cmd_pool = vk::CommandPool::null();
    }

    for f in res.frames.drain(..) {
        device.destroy_semaphore(f.image_available, None);
        device.destroy_semaphore(f.render_finished, None);
        device.destroy_fence(f.in_flight, None);
    }

    if res.render_pass != vk::RenderPass::null() {
        device.destroy_render_pass(res.render_pass, None);
        res.render_pass = vk::RenderPass::null();
    }
}

unsafe fn destroy_instance_level(
    instance: &Instance,
    debug: Option<(ext_debug::Instance, vk::DebugUtilsMessengerEXT)>,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
) {
    if surface != vk::SurfaceKHR::null() {
        surface_loader.destroy_surface(surface, None);
    }
    if let Some((loader, messenger)) = debug {
        loader.destroy_debug_utils_messenger(messenger, None);
    }
    instance.destroy_instance(None);
}

// --- The renderer ---

impl VkRenderer {
    unsafe fn record_frame(
        &self,
        cmd: vk::CommandBuffer,
        framebuffer: vk::Framebuffer,
        clear: [f32; 4],
    ) -> Result<(), vk::Result> {
        let d = &self.device;
        let extent = self.res.chain.extent;

        d.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
        let begin = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            ..Default::default()
        };
        d.begin_command_buffer(cmd, &begin)?;

        let clear_value = vk::ClearValue {
            color: vk::ClearColorValue { float32: clear },
        };
        let rp_begin = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass: self.res.render_pass,
            framebuffer,
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            },
            clear_value_count: 1,
            p_clear_values: &clear_value,
            ..Default::default()
        };
        d.cmd_begin_render_pass(cmd, &rp_begin, vk::SubpassContents::INLINE);
        d.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.res.pipeline);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        d.cmd_set_viewport(cmd, 0, std::slice::from_ref(&viewport));
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        d.cmd_set_scissor(cmd, 0, std::slice::from_ref(&scissor));

        d.cmd_draw(cmd, 3, 1, 0, 0);

        d.cmd_end_render_pass(cmd);
        d.end_command_buffer(cmd)?;
        Ok(())
    }

    /// Tear down and rebuild everything the swapchain owns. The render pass
    /// and pipeline are reused; only the chain and its framebuffers change.
    /// Runs with the GPU fully idle and no frame in flight.
    unsafe fn recreate_swapchain(&mut self, size: RenderSize) -> Result<(), SetupError> {
        self.device.device_wait_idle().ok();

        let old_format = self.res.chain.format;

        for fb in self.res.framebuffers.drain(..) {
            self.device.destroy_framebuffer(fb, None);
        }
        for view in self.res.chain.views.drain(..) {
            self.device.destroy_image_view(view, None);
        }
        if self.res.chain.swapchain != vk::SwapchainKHR::null() {
            self.swapchain_loader
                .destroy_swapchain(self.res.chain.swapchain, None);
        }
        self.res.chain = PresentChain::default();

        let chain = create_chain(
            &self.device,
            &self.surface_loader,
            &self.swapchain_loader,
            self.phys,
            self.surface,
            self.graphics_family,
            self.present_family,
            size,
        )?;

        // The render pass is never rebuilt, so a surface that changes format
        // mid-session cannot be recovered from here.
        if chain.format != old_format {
            for view in &chain.views {
                self.device.destroy_image_view(*view, None);
            }
            self.swapchain_loader.destroy_swapchain(chain.swapchain, None);
            return Err(SetupError::new(
                SetupStage::Swapchain,
                SetupErrorKind::Api(format!(
                    "surface format changed across resize ({:?} -> {:?})",
                    old_format, chain.format
                )),
            ));
        }

        self.res.framebuffers = create_framebuffers(
            &self.device,
            self.res.render_pass,
            &chain.views,
            chain.extent,
        )?;
        self.res.chain = chain;

        info!(
            "vk: swapchain rebuilt ({}x{}, {} images)",
            self.res.chain.extent.width,
            self.res.chain.extent.height,
            self.res.chain.images.len()
        );
        Ok(())
    }
}

/// Stages 5 through 11, filling `res` in creation order so a failure leaves
/// only null or complete handles behind for the shared destroy path.
#[allow(clippy::too_many_arguments)]
unsafe fn build_device_level(
    device: &ash::Device,
    surface_loader: &surface::Instance,
    swapchain_loader: &swapchain::Device,
    phys: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    graphics_family: u32,
    present_family: u32,
    size: RenderSize,
    res: &mut DeviceResources,
) -> Result<(), SetupError> {
    res.chain = create_chain(
        device,
        surface_loader,
        swapchain_loader,
        phys,
        surface,
        graphics_family,
        present_family,
        size,
    )?;
    res.render_pass = create_render_pass(device, res.chain.format)?;
    let (layout, pipeline) = create_pipeline(device, res.render_pass, VERT_SPV, FRAG_SPV)?;
    res.pipeline_layout = layout;
    res.pipeline = pipeline;
    res.framebuffers =
        create_framebuffers(device, res.render_pass, &res.chain.views, res.chain.extent)?;

    let pool_info = vk::CommandPoolCreateInfo {
        s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
        flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        queue_family_index: graphics_family,
        ..Default::default()
    };
    res.cmd_pool = device
        .create_command_pool(&pool_info, None)
        .map_err(|e| vk_setup(SetupStage::CommandPool, e))?;

    let alloc_info = vk::CommandBufferAllocateInfo {
        s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
        command_pool: res.cmd_pool,
        level: vk::CommandBufferLevel::PRIMARY,
        command_buffer_count: MAX_FRAMES_IN_FLIGHT as u32,
        ..Default::default()
    };
    let cmd_bufs = device
        .allocate_command_buffers(&alloc_info)
        .map_err(|e| vk_setup(SetupStage::CommandBuffers, e))?;

    res.frames = create_frame_slots(device, &cmd_bufs)?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
unsafe fn build_renderer(
    window: &dyn HasWindowHandle,
    display: &dyn HasDisplayHandle,
    size: RenderSize,
    opts: &RendererOptions,
) -> Result<VkRenderer, SetupError> {
    let entry = Entry::load()
        .map_err(|e| SetupError::new(SetupStage::Instance, SetupErrorKind::Api(e.to_string())))?;

    let display_raw: RawDisplayHandle = display
        .display_handle()
        .map_err(|e| SetupError::new(SetupStage::Instance, SetupErrorKind::Api(e.to_string())))?
        .as_raw();
    let window_raw: RawWindowHandle = window
        .window_handle()
        .map_err(|e| SetupError::new(SetupStage::Surface, SetupErrorKind::Api(e.to_string())))?
        .as_raw();

    // Stage 1: instance (+ validation layer check and debug messenger)
    let instance = create_instance(&entry, display_raw, &opts.app_name, opts.validation)?;
    let debug = if opts.validation {
        match create_debug_messenger(&entry, &instance) {
            Ok(pair) => Some(pair),
            Err(e) => {
                instance.destroy_instance(None);
                return Err(e);
            }
        }
    } else {
        None
    };

    // Stage 2: surface
    let surface_loader = surface::Instance::new(&entry, &instance);
    let surface = match ash_window::create_surface(&entry, &instance, display_raw, window_raw, None)
    {
        Ok(s) => s,
        Err(e) => {
            destroy_instance_level(&instance, debug, &surface_loader, vk::SurfaceKHR::null());
            return Err(vk_setup(SetupStage::Surface, e));
        }
    };

    // Stage 3: physical device + queue families
    let (phys, graphics_family, present_family) =
        match select_physical_device(&instance, &surface_loader, surface) {
            Ok(picked) => picked,
            Err(e) => {
                destroy_instance_level(&instance, debug, &surface_loader, surface);
                return Err(e);
            }
        };

    // Stage 4: logical device + queues
    let (device, graphics_queue, present_queue) =
        match create_logical_device(&instance, phys, graphics_family, present_family) {
            Ok(built) => built,
            Err(e) => {
                destroy_instance_level(&instance, debug, &surface_loader, surface);
                return Err(e);
            }
        };

    // Stages 5-11: everything below the device, torn down through the shared
    // destroy path if any stage fails.
    let swapchain_loader = swapchain::Device::new(&instance, &device);
    let mut res = DeviceResources::default();
    let built = build_device_level(
        &device,
        &surface_loader,
        &swapchain_loader,
        phys,
        surface,
        graphics_family,
        present_family,
        size,
        &mut res,
    );

    if let Err(e) = built {
        destroy_device_resources(&device, &swapchain_loader, &mut res);
        device.destroy_device(None);
        destroy_instance_level(&instance, debug, &surface_loader, surface);
        return Err(e);
    }

    Ok(VkRenderer {
        _entry: entry,
        instance,
        debug,
        surface_loader,
        surface,
        phys,
        device,
        graphics_family,
        present_family,
        graphics_queue,
        present_queue,
        swapchain_loader,
        res,
        cursor: FrameCursor::new(MAX_FRAMES_IN_FLIGHT),
        paused: false,
    })
}

impl Renderer for VkRenderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        opts: &RendererOptions,
    ) -> Result<Self, SetupError> {
        unsafe {
            let r = build_renderer(window, display, size, opts)?;
            info!(
                "vk: ready ({}x{}, fmt 0x{:x}, {} images, queues {}:{})",
                r.res.chain.extent.width,
                r.res.chain.extent.height,
                r.res.chain.format.as_raw(),
                r.res.chain.images.len(),
                r.graphics_family,
                r.present_family,
            );
            Ok(r)
        }
    }

    fn resize(&mut self, size: RenderSize) -> Result<(), SetupError> {
        // A minimized window reports a zero extent; never attempt a
        // zero-sized chain, just pause until the size comes back.
        if size.is_zero() {
            if !self.paused {
                info!("vk: resize to 0x0, paused");
            }
            self.paused = true;
            return Ok(());
        }

        if self.paused {
            info!("vk: resize to {}x{}, unpaused", size.width, size.height);
        }
        self.paused = false;

        unsafe { self.recreate_swapchain(size) }
    }

    // PER-FRAME ORDER:
    // 1) wait + reset this slot's fence (reset only after a good acquire)
    // 2) acquire (signals image-available)
    // 3) record, submit (waits image-available, signals render-finished,
    //    arms the fence)
    // 4) present (waits render-finished)
    // 5) advance the slot on every path that got past acquire
    fn render(&mut self, clear: [f32; 4]) -> Result<FrameOutcome, FrameError> {
        if self.paused {
            return Ok(FrameOutcome::Stale);
        }

        unsafe {
            let slot = &self.res.frames[self.cursor.current()];
            let image_available = slot.image_available;
            let render_finished = slot.render_finished;
            let in_flight = slot.in_flight;
            let cmd = slot.cmd;

            // WAIT_SLOT: bounds the CPU to MAX_FRAMES_IN_FLIGHT submitted
            // but unretired frames.
            self.device
                .wait_for_fences(&[in_flight], true, u64::MAX)
                .map_err(|e| FrameError::Acquire(format!("wait_for_fences: {e:?}")))?;

            // ACQUIRE
            let (image_index, suboptimal) = match self.swapchain_loader.acquire_next_image(
                self.res.chain.swapchain,
                u64::MAX,
                image_available,
                vk::Fence::null(),
            ) {
                Ok(pair) => pair,
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                    // Nothing was submitted and the fence is still signaled;
                    // this slot is retried unchanged next tick, after the
                    // resize path has run.
                    return Ok(FrameOutcome::Stale);
                }
                Err(e) => {
                    return Err(FrameError::Acquire(format!("acquire_next_image: {e:?}")))
                }
            };

            // Reset the guard only after a successful acquire so it can
            // never be left unsignaled with nothing armed against it.
            self.device
                .reset_fences(&[in_flight])
                .map_err(|e| FrameError::Acquire(format!("reset_fences: {e:?}")))?;

            // RECORD
            if let Err(e) =
                self.record_frame(cmd, self.res.framebuffers[image_index as usize], clear)
            {
                self.cursor.advance();
                return Err(FrameError::Submit(format!("record: {e:?}")));
            }

            // SUBMIT
            let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
            let submit = vk::SubmitInfo {
                s_type: vk::StructureType::SUBMIT_INFO,
                wait_semaphore_count: 1,
                p_wait_semaphores: &image_available,
                p_wait_dst_stage_mask: wait_stages.as_ptr(),
                command_buffer_count: 1,
                p_command_buffers: &cmd,
                signal_semaphore_count: 1,
                p_signal_semaphores: &render_finished,
                ..Default::default()
            };
            if let Err(e) =
                self.device
                    .queue_submit(self.graphics_queue, std::slice::from_ref(&submit), in_flight)
            {
                self.cursor.advance();
                return Err(FrameError::Submit(format!("queue_submit: {e:?}")));
            }

            // PRESENT
            let present = vk::PresentInfoKHR {
                s_type: vk::StructureType::PRESENT_INFO_KHR,
                wait_semaphore_count: 1,
                p_wait_semaphores: &render_finished,
                swapchain_count: 1,
                p_swapchains: &self.res.chain.swapchain,
                p_image_indices: &image_index,
                ..Default::default()
            };
            let outcome = match self.swapchain_loader.queue_present(self.present_queue, &present)
            {
                Ok(false) if !suboptimal => Ok(FrameOutcome::Presented),
                // Suboptimal either at acquire or present: the image went to
                // the screen, but the chain wants a rebuild.
                Ok(_) => Ok(FrameOutcome::Stale),
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(FrameOutcome::Stale),
                Err(e) => Err(FrameError::Present(format!("queue_present: {e:?}"))),
            };

            // ADVANCE
            self.cursor.advance();
            outcome
        }
    }
}

// Shutdown mirrors creation in strict reverse order; see
// destroy_device_resources for the device-level sequence. Tolerates a
// renderer whose setup only partially completed.
impl Drop for VkRenderer {
    fn drop(&mut self) {
        unsafe {
            let fences: Vec<vk::Fence> = self.res.frames.iter().map(|f| f.in_flight).collect();
            if !fences.is_empty() {
                let _ = self.device.wait_for_fences(&fences, true, u64::MAX);
            }
            self.device.device_wait_idle().ok();

            destroy_device_resources(&self.device, &self.swapchain_loader, &mut self.res);
            self.device.destroy_device(None);
            destroy_instance_level(
                &self.instance,
                self.debug.take(),
                &self.surface_loader,
                self.surface,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    #[test]
    fn format_policy_prefers_bgra8_nonlinear() {
        let formats = [
            fmt(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            fmt(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = choose_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn format_policy_falls_back_to_first_reported() {
        let formats = [
            fmt(
                vk::Format::R16G16B16A16_SFLOAT,
                vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
            ),
            fmt(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(
            choose_surface_format(&formats).format,
            vk::Format::R16G16B16A16_SFLOAT
        );
    }

    #[test]
    fn present_mode_prefers_mailbox_then_fifo() {
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX]),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE]),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn fixed_current_extent_is_honored() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            ..Default::default()
        };
        let e = extent_from_caps(
            &caps,
            RenderSize {
                width: 1,
                height: 1,
            },
        );
        assert_eq!((e.width, e.height), (800, 600));
    }

    #[test]
    fn derived_extent_is_clamped_into_surface_bounds() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 2000,
                height: 1000,
            },
            ..Default::default()
        };
        for want in [
            RenderSize {
                width: 1,
                height: 5000,
            },
            RenderSize {
                width: 640,
                height: 480,
            },
            RenderSize {
                width: 9999,
                height: 1,
            },
        ] {
            let e = extent_from_caps(&caps, want);
            assert!(e.width >= 100 && e.width <= 2000);
            assert!(e.height >= 100 && e.height <= 1000);
        }
    }

    #[test]
    fn image_count_is_min_plus_one_capped_at_max() {
        let mut caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 3,
            ..Default::default()
        };
        assert_eq!(image_count_from_caps(&caps), 3);

        caps.max_image_count = 0; // unbounded
        assert_eq!(image_count_from_caps(&caps), 3);

        caps.max_image_count = 2;
        assert_eq!(image_count_from_caps(&caps), 2);
    }

    #[test]
    fn sharing_is_concurrent_only_across_distinct_families() {
        assert_eq!(sharing_for_families(0, 0), vk::SharingMode::EXCLUSIVE);
        assert_eq!(sharing_for_families(0, 1), vk::SharingMode::CONCURRENT);
    }

    #[test]
    fn cursor_rotates_through_both_slots() {
        let mut cursor = FrameCursor::new(MAX_FRAMES_IN_FLIGHT);
        for n in 0..10 {
            assert_eq!(cursor.current(), n % MAX_FRAMES_IN_FLIGHT);
            cursor.advance();
        }
    }

    #[test]
    fn embedded_shader_blobs_are_valid_spirv() {
        assert!(!VERT_SPV.is_empty());
        assert!(!FRAG_SPV.is_empty());
        // SPIR-V magic number, little-endian.
        assert_eq!(&VERT_SPV[0..4], &0x0723_0203u32.to_le_bytes());
        assert_eq!(&FRAG_SPV[0..4], &0x0723_0203u32.to_le_bytes());
    }
}
