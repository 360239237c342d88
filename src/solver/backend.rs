//! Kernel backend abstraction for the Jacobi orchestrators.
//!
//! Defines the `JacobiBackend` trait, the device-side kernel contract both
//! orchestrators are written against, and `WgpuBackend` which implements it
//! using wgpu compute shaders. The backend is the device session: it owns the
//! device, queue and compiled pipelines and is passed explicitly to every solve.

use std::cell::Cell;

use wgpu::util::DeviceExt;

use crate::error::{JacobiError, Result};

use super::gpu_shaders;
use super::workgroup::WorkSize;

/// Work-group size compiled into every kernel in `gpu_shaders`.
pub const WORKGROUP_SIZE: u32 = 64;

/// Abstract device running the Jacobi and spline kernels.
///
/// Buffers hold `f64` at the host boundary; a backend may store them at lower
/// precision on the device. Every kernel call returns only after the dispatch
/// has completed, so results are visible to the next call or readback.
///
/// `n` is always the logical problem size and `work` the padded dispatch
/// geometry from `WorkSize::plan`; kernels act only on indices `< n`.
pub trait JacobiBackend {
    type Buffer;

    /// Largest work-group size the kernels can be dispatched with.
    fn preferred_group_size(&self) -> usize;

    /// Allocate a zero-initialized buffer of `len` elements.
    fn alloc(&self, len: usize, label: &'static str) -> Result<Self::Buffer>;

    /// Write `data` to the start of `buffer`.
    fn upload(&self, data: &[f64], buffer: &Self::Buffer) -> Result<()>;

    /// Read the first `len` elements of `buffer` back to the host.
    fn download(&self, buffer: &Self::Buffer, len: usize) -> Result<Vec<f64>>;

    /// `x[i] = 0` for `i < n`.
    fn init(&self, x: &Self::Buffer, n: usize, work: WorkSize) -> Result<()>;

    /// One Jacobi sweep: `dst[i] = (b[i] - sum_{j != i} a[i][j] * src[j]) / a[i][i]`.
    ///
    /// `a` is row-major with a row stride of `work.global`.
    fn jacobi_step(
        &self,
        a: &Self::Buffer,
        b: &Self::Buffer,
        src: &Self::Buffer,
        dst: &Self::Buffer,
        n: usize,
        work: WorkSize,
    ) -> Result<()>;

    /// Per-group sum of squared differences `(x[i] - y[i])^2`, one slot per
    /// work group in `partials`.
    fn difference(
        &self,
        x: &Self::Buffer,
        y: &Self::Buffer,
        partials: &Self::Buffer,
        n: usize,
        work: WorkSize,
    ) -> Result<()>;

    /// Right-hand side of the natural spline system:
    /// `rhs[i] = 6 (y[i+1] - 2 y[i] + y[i-1]) / h^2`, zero at both ends.
    fn init_rhs(
        &self,
        y: &Self::Buffer,
        rhs: &Self::Buffer,
        h: f64,
        n: usize,
        work: WorkSize,
    ) -> Result<()>;

    /// One Jacobi sweep of `c[i-1] + 4 c[i] + c[i+1] = rhs[i]` with
    /// `dst[0] = dst[n-1] = 0`.
    fn spline_step(
        &self,
        rhs: &Self::Buffer,
        src: &Self::Buffer,
        dst: &Self::Buffer,
        n: usize,
        work: WorkSize,
    ) -> Result<()>;

    /// Per-segment coefficients for segment `i` in `1..n`:
    /// `b[i] = (y[i] - y[i-1]) / h - (c[i] - c[i-1]) h / 6` and
    /// `a[i] = (y[i] + y[i-1]) / 2 - (c[i] + c[i-1]) h^2 / 12`.
    #[allow(clippy::too_many_arguments)]
    fn compute_ab(
        &self,
        y: &Self::Buffer,
        c: &Self::Buffer,
        a: &Self::Buffer,
        b: &Self::Buffer,
        h: f64,
        n: usize,
        work: WorkSize,
    ) -> Result<()>;

    /// Kernel dispatches issued so far.
    fn dispatch_count(&self) -> u32;

    /// Buffer readbacks issued so far.
    fn readback_count(&self) -> u32;
}

/// Work groups needed to cover `work.global` items with the fixed kernel
/// group size, checked against the device's per-dimension dispatch limit.
pub(crate) fn workgroup_count(work: WorkSize, max_per_dimension: u32) -> Result<u32> {
    let groups = work.global.div_ceil(WORKGROUP_SIZE as usize).max(1);
    u32::try_from(groups)
        .ok()
        .filter(|&g| g <= max_per_dimension)
        .ok_or_else(|| {
            JacobiError::InvalidInput(format!(
                "problem of {} padded elements needs {groups} work groups, device allows {max_per_dimension}",
                work.global
            ))
        })
}

// Shader Params layout: { n: u32, stride: u32, h: f32, pad: u32 }
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct KernelParams {
    n: u32,
    stride: u32,
    h: f32,
    _pad: u32,
}

impl KernelParams {
    fn new(n: usize, work: WorkSize, h: f64) -> Self {
        Self {
            n: n as u32,
            stride: work.global as u32,
            h: h as f32,
            _pad: 0,
        }
    }
}

/// A device buffer of f32 elements.
///
/// Device memory is released as soon as the buffer is dropped.
#[derive(Debug)]
pub struct WgpuBuffer {
    pub(crate) buffer: wgpu::Buffer,
    pub(crate) len: usize,
}

impl Drop for WgpuBuffer {
    fn drop(&mut self) {
        self.buffer.destroy();
    }
}

/// GPU context holding the wgpu device, queue, and compute pipelines.
pub struct GpuContext {
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    pub(crate) limits: wgpu::Limits,
    pub(crate) adapter_name: String,
    pub(crate) init_pipeline: wgpu::ComputePipeline,
    pub(crate) jacobi_step_pipeline: wgpu::ComputePipeline,
    pub(crate) difference_pipeline: wgpu::ComputePipeline,
    pub(crate) init_rhs_pipeline: wgpu::ComputePipeline,
    pub(crate) spline_step_pipeline: wgpu::ComputePipeline,
    pub(crate) compute_ab_pipeline: wgpu::ComputePipeline,
}

impl GpuContext {
    pub fn new() -> Result<Self> {
        pollster::block_on(Self::new_async())
    }

    async fn new_async() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| JacobiError::Configuration("no GPU adapter found".into()))?;
        let adapter_name = adapter.get_info().name;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("jacobi_spline_gpu"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await
            .map_err(|e| JacobiError::Configuration(format!("failed to get GPU device: {e}")))?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("jacobi_spline_shaders"),
            source: wgpu::ShaderSource::Wgsl(gpu_shaders::SHADER_SOURCE.into()),
        });

        let make_pipeline = |entry_point: &str| -> wgpu::ComputePipeline {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry_point),
                layout: None,
                module: &shader_module,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            })
        };

        let init_pipeline = make_pipeline("init_zero");
        let jacobi_step_pipeline = make_pipeline("jacobi_step");
        let difference_pipeline = make_pipeline("difference");
        let init_rhs_pipeline = make_pipeline("init_rhs");
        let spline_step_pipeline = make_pipeline("spline_step");
        let compute_ab_pipeline = make_pipeline("compute_ab");

        if let Some(err) = device.pop_error_scope().await {
            return Err(JacobiError::Configuration(format!(
                "failed to compile kernels: {err}"
            )));
        }

        let limits = device.limits();
        tracing::info!(adapter = %adapter_name, "GPU device session ready");

        Ok(Self {
            device,
            queue,
            limits,
            adapter_name,
            init_pipeline,
            jacobi_step_pipeline,
            difference_pipeline,
            init_rhs_pipeline,
            spline_step_pipeline,
            compute_ab_pipeline,
        })
    }
}

/// Wgpu-based implementation of `JacobiBackend`.
pub struct WgpuBackend {
    pub(crate) ctx: GpuContext,
    dispatch_count: Cell<u32>,
    readback_count: Cell<u32>,
}

impl WgpuBackend {
    pub fn new() -> Result<Self> {
        Ok(Self {
            ctx: GpuContext::new()?,
            dispatch_count: Cell::new(0),
            readback_count: Cell::new(0),
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.ctx.adapter_name
    }

    /// Submit one command buffer and block until the device has finished it.
    fn submit_and_wait(&self, encoder: wgpu::CommandEncoder) -> Result<()> {
        let index = self.ctx.queue.submit(Some(encoder.finish()));
        self.ctx
            .device
            .poll(wgpu::PollType::Wait {
                submission_index: Some(index),
                timeout: None,
            })
            .map_err(|e| JacobiError::InvalidState(format!("device wait failed: {e}")))?;
        Ok(())
    }

    /// Bind `buffers` at bindings 0.., the uniform params after them, and
    /// dispatch enough work groups to cover `work.global` items.
    fn dispatch(
        &self,
        pipeline: &wgpu::ComputePipeline,
        buffers: &[&WgpuBuffer],
        params: KernelParams,
        work: WorkSize,
    ) -> Result<()> {
        let n_wg = workgroup_count(work, self.ctx.limits.max_compute_workgroups_per_dimension)?;
        let device = &self.ctx.device;

        let params_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: None,
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let mut entries: Vec<wgpu::BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(i, b)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: b.buffer.as_entire_binding(),
            })
            .collect();
        entries.push(wgpu::BindGroupEntry {
            binding: buffers.len() as u32,
            resource: params_buf.as_entire_binding(),
        });
        let bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout: &pipeline.get_bind_group_layout(0),
            entries: &entries,
        });
        let mut encoder = device.create_command_encoder(&Default::default());
        {
            let mut pass = encoder.begin_compute_pass(&Default::default());
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, Some(&bg), &[]);
            pass.dispatch_workgroups(n_wg, 1, 1);
        }
        self.dispatch_count.set(self.dispatch_count.get() + 1);
        self.submit_and_wait(encoder)
    }
}

impl JacobiBackend for WgpuBackend {
    type Buffer = WgpuBuffer;

    fn preferred_group_size(&self) -> usize {
        WORKGROUP_SIZE.min(self.ctx.limits.max_compute_invocations_per_workgroup) as usize
    }

    fn alloc(&self, len: usize, label: &'static str) -> Result<WgpuBuffer> {
        let size = (len.max(1) * std::mem::size_of::<f32>()) as u64;
        let max_binding = self.ctx.limits.max_storage_buffer_binding_size as u64;
        if size > max_binding || size > self.ctx.limits.max_buffer_size {
            return Err(JacobiError::Allocation(format!(
                "buffer '{label}' needs {size} bytes, device allows {max_binding}"
            )));
        }

        let device = &self.ctx.device;
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(JacobiError::Allocation(format!("buffer '{label}': {err}")));
        }
        Ok(WgpuBuffer { buffer, len })
    }

    fn upload(&self, data: &[f64], buffer: &WgpuBuffer) -> Result<()> {
        if data.len() > buffer.len {
            return Err(JacobiError::InvalidState(format!(
                "upload of {} elements into buffer of {}",
                data.len(),
                buffer.len
            )));
        }
        let data_f32: Vec<f32> = data.iter().map(|&v| v as f32).collect();
        self.ctx
            .queue
            .write_buffer(&buffer.buffer, 0, bytemuck::cast_slice(&data_f32));
        self.submit_and_wait(self.ctx.device.create_command_encoder(&Default::default()))
    }

    fn download(&self, buffer: &WgpuBuffer, len: usize) -> Result<Vec<f64>> {
        if len > buffer.len {
            return Err(JacobiError::InvalidState(format!(
                "readback of {} elements from buffer of {}",
                len, buffer.len
            )));
        }
        self.readback_count.set(self.readback_count.get() + 1);
        let result = read_buffer_f32(&self.ctx.device, &self.ctx.queue, &buffer.buffer, len)?;
        Ok(result.into_iter().map(|v| v as f64).collect())
    }

    fn init(&self, x: &WgpuBuffer, n: usize, work: WorkSize) -> Result<()> {
        self.dispatch(
            &self.ctx.init_pipeline,
            &[x],
            KernelParams::new(n, work, 0.0),
            work,
        )
    }

    fn jacobi_step(
        &self,
        a: &WgpuBuffer,
        b: &WgpuBuffer,
        src: &WgpuBuffer,
        dst: &WgpuBuffer,
        n: usize,
        work: WorkSize,
    ) -> Result<()> {
        self.dispatch(
            &self.ctx.jacobi_step_pipeline,
            &[a, b, src, dst],
            KernelParams::new(n, work, 0.0),
            work,
        )
    }

    fn difference(
        &self,
        x: &WgpuBuffer,
        y: &WgpuBuffer,
        partials: &WgpuBuffer,
        n: usize,
        work: WorkSize,
    ) -> Result<()> {
        self.dispatch(
            &self.ctx.difference_pipeline,
            &[x, y, partials],
            KernelParams::new(n, work, 0.0),
            work,
        )
    }

    fn init_rhs(
        &self,
        y: &WgpuBuffer,
        rhs: &WgpuBuffer,
        h: f64,
        n: usize,
        work: WorkSize,
    ) -> Result<()> {
        self.dispatch(
            &self.ctx.init_rhs_pipeline,
            &[y, rhs],
            KernelParams::new(n, work, h),
            work,
        )
    }

    fn spline_step(
        &self,
        rhs: &WgpuBuffer,
        src: &WgpuBuffer,
        dst: &WgpuBuffer,
        n: usize,
        work: WorkSize,
    ) -> Result<()> {
        self.dispatch(
            &self.ctx.spline_step_pipeline,
            &[rhs, src, dst],
            KernelParams::new(n, work, 0.0),
            work,
        )
    }

    fn compute_ab(
        &self,
        y: &WgpuBuffer,
        c: &WgpuBuffer,
        a: &WgpuBuffer,
        b: &WgpuBuffer,
        h: f64,
        n: usize,
        work: WorkSize,
    ) -> Result<()> {
        self.dispatch(
            &self.ctx.compute_ab_pipeline,
            &[y, c, a, b],
            KernelParams::new(n, work, h),
            work,
        )
    }

    fn dispatch_count(&self) -> u32 {
        self.dispatch_count.get()
    }

    fn readback_count(&self) -> u32 {
        self.readback_count.get()
    }
}

/// Read a GPU buffer back to CPU as f32 values.
fn read_buffer_f32(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    src: &wgpu::Buffer,
    count: usize,
) -> Result<Vec<f32>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let size = (count * std::mem::size_of::<f32>()) as u64;
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("read_staging"),
        size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let mut encoder = device.create_command_encoder(&Default::default());
    encoder.copy_buffer_to_buffer(src, 0, &staging, 0, size);
    queue.submit(Some(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |r| {
        let _ = sender.send(r);
    });
    device
        .poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        })
        .map_err(|e| JacobiError::InvalidState(format!("device wait failed: {e}")))?;
    receiver
        .recv()
        .map_err(|_| JacobiError::InvalidState("readback callback dropped".into()))?
        .map_err(|e| JacobiError::InvalidState(format!("buffer map failed: {e}")))?;

    let data = slice.get_mapped_range();
    let result: Vec<f32> = bytemuck::cast_slice(&data).to_vec();
    drop(data);
    staging.unmap();
    staging.destroy();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workgroup_count_covers_padded_size() {
        assert_eq!(workgroup_count(WorkSize::plan(5, 64), 65_535).unwrap(), 1);
        assert_eq!(workgroup_count(WorkSize::plan(100, 64), 65_535).unwrap(), 2);
    }

    #[test]
    fn workgroup_count_at_device_limit() {
        // 65_535 groups of 64 exactly.
        let work = WorkSize::plan(4_194_240, 64);
        assert_eq!(workgroup_count(work, 65_535).unwrap(), 65_535);
    }

    #[test]
    fn workgroup_count_over_device_limit_is_rejected() {
        let work = WorkSize::plan(4_194_305, 64);
        assert_eq!(work.global, 4_194_368);
        let err = workgroup_count(work, 65_535).unwrap_err();
        assert!(matches!(err, JacobiError::InvalidInput(_)), "got {err:?}");
        assert!(err.to_string().contains("65537"), "got: {err}");
    }
}
