//! Multi-core host backend.
//!
//! Executes the same kernel contract as the GPU shaders in f64 using rayon,
//! including the per-work-group partial sums of the `difference` kernel.
//! Serves as the `--cpu` fallback and as a device-free backend for tests.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rayon::prelude::*;

use crate::error::{JacobiError, Result};

use super::backend::{JacobiBackend, WORKGROUP_SIZE};
use super::workgroup::WorkSize;

/// A host buffer. Borrow rules make a kernel that reads and writes the same
/// buffer panic instead of silently racing.
#[derive(Debug)]
pub struct CpuBuffer {
    data: RefCell<Vec<f64>>,
    live: Rc<Cell<usize>>,
}

impl Drop for CpuBuffer {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

/// CPU implementation of `JacobiBackend`.
pub struct CpuBackend {
    group_size: usize,
    max_buffer_len: usize,
    max_live_buffers: usize,
    live: Rc<Cell<usize>>,
    dispatch_count: Cell<u32>,
    readback_count: Cell<u32>,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self {
            group_size: WORKGROUP_SIZE as usize,
            max_buffer_len: usize::MAX,
            max_live_buffers: usize::MAX,
            live: Rc::new(Cell::new(0)),
            dispatch_count: Cell::new(0),
            readback_count: Cell::new(0),
        }
    }

    /// Override the work-group size reported to the planner.
    pub fn with_group_size(mut self, group_size: usize) -> Self {
        self.group_size = group_size.max(1);
        self
    }

    /// Refuse allocations longer than `max_len` elements.
    pub fn with_max_buffer_len(mut self, max_len: usize) -> Self {
        self.max_buffer_len = max_len;
        self
    }

    /// Refuse allocations once `count` buffers are live.
    pub fn with_max_live_buffers(mut self, count: usize) -> Self {
        self.max_live_buffers = count;
        self
    }

    /// Buffers allocated by this backend that have not been dropped yet.
    pub fn live_buffers(&self) -> usize {
        self.live.get()
    }

    fn count_dispatch(&self) {
        self.dispatch_count.set(self.dispatch_count.get() + 1);
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl JacobiBackend for CpuBackend {
    type Buffer = CpuBuffer;

    fn preferred_group_size(&self) -> usize {
        self.group_size
    }

    fn alloc(&self, len: usize, label: &'static str) -> Result<CpuBuffer> {
        if len > self.max_buffer_len {
            return Err(JacobiError::Allocation(format!(
                "buffer '{label}' needs {len} elements, limit is {}",
                self.max_buffer_len
            )));
        }
        if self.live.get() >= self.max_live_buffers {
            return Err(JacobiError::Allocation(format!(
                "buffer '{label}': {} buffers already live",
                self.live.get()
            )));
        }
        self.live.set(self.live.get() + 1);
        Ok(CpuBuffer {
            data: RefCell::new(vec![0.0; len]),
            live: Rc::clone(&self.live),
        })
    }

    fn upload(&self, data: &[f64], buffer: &CpuBuffer) -> Result<()> {
        let mut dst = buffer.data.borrow_mut();
        if data.len() > dst.len() {
            return Err(JacobiError::InvalidState(format!(
                "upload of {} elements into buffer of {}",
                data.len(),
                dst.len()
            )));
        }
        dst[..data.len()].copy_from_slice(data);
        Ok(())
    }

    fn download(&self, buffer: &CpuBuffer, len: usize) -> Result<Vec<f64>> {
        let src = buffer.data.borrow();
        if len > src.len() {
            return Err(JacobiError::InvalidState(format!(
                "readback of {} elements from buffer of {}",
                len,
                src.len()
            )));
        }
        self.readback_count.set(self.readback_count.get() + 1);
        Ok(src[..len].to_vec())
    }

    fn init(&self, x: &CpuBuffer, n: usize, _work: WorkSize) -> Result<()> {
        self.count_dispatch();
        x.data.borrow_mut()[..n].fill(0.0);
        Ok(())
    }

    fn jacobi_step(
        &self,
        a: &CpuBuffer,
        b: &CpuBuffer,
        src: &CpuBuffer,
        dst: &CpuBuffer,
        n: usize,
        work: WorkSize,
    ) -> Result<()> {
        self.count_dispatch();
        let a = a.data.borrow();
        let b = b.data.borrow();
        let src = src.data.borrow();
        let mut dst = dst.data.borrow_mut();
        let (a, b, src): (&[f64], &[f64], &[f64]) = (&a, &b, &src);
        let stride = work.global;

        dst[..n].par_iter_mut().enumerate().for_each(|(i, out)| {
            let row = &a[i * stride..i * stride + n];
            let sum: f64 = row
                .iter()
                .zip(&src[..n])
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, (aij, xj))| aij * xj)
                .sum();
            *out = (b[i] - sum) / row[i];
        });
        Ok(())
    }

    fn difference(
        &self,
        x: &CpuBuffer,
        y: &CpuBuffer,
        partials: &CpuBuffer,
        n: usize,
        work: WorkSize,
    ) -> Result<()> {
        self.count_dispatch();
        let x = x.data.borrow();
        let y = y.data.borrow();
        let mut out = partials.data.borrow_mut();
        let (x, y): (&[f64], &[f64]) = (&x, &y);
        let groups = work.groups();
        if out.len() < groups {
            return Err(JacobiError::InvalidState(format!(
                "partial sum buffer has {} slots for {} work groups",
                out.len(),
                groups
            )));
        }

        out[..groups].par_iter_mut().enumerate().for_each(|(g, slot)| {
            let start = (g * work.local).min(n);
            let end = ((g + 1) * work.local).min(n);
            *slot = x[start..end]
                .iter()
                .zip(&y[start..end])
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
        });
        Ok(())
    }

    fn init_rhs(
        &self,
        y: &CpuBuffer,
        rhs: &CpuBuffer,
        h: f64,
        n: usize,
        _work: WorkSize,
    ) -> Result<()> {
        self.count_dispatch();
        let y = y.data.borrow();
        let mut rhs = rhs.data.borrow_mut();
        let y: &[f64] = &y;
        let h2 = h * h;

        rhs[..n].par_iter_mut().enumerate().for_each(|(i, out)| {
            *out = if i == 0 || i == n - 1 {
                0.0
            } else {
                6.0 * (y[i + 1] - 2.0 * y[i] + y[i - 1]) / h2
            };
        });
        Ok(())
    }

    fn spline_step(
        &self,
        rhs: &CpuBuffer,
        src: &CpuBuffer,
        dst: &CpuBuffer,
        n: usize,
        _work: WorkSize,
    ) -> Result<()> {
        self.count_dispatch();
        let rhs = rhs.data.borrow();
        let src = src.data.borrow();
        let mut dst = dst.data.borrow_mut();
        let (rhs, src): (&[f64], &[f64]) = (&rhs, &src);

        dst[..n].par_iter_mut().enumerate().for_each(|(i, out)| {
            *out = if i == 0 || i == n - 1 {
                0.0
            } else {
                (rhs[i] - src[i - 1] - src[i + 1]) / 4.0
            };
        });
        Ok(())
    }

    fn compute_ab(
        &self,
        y: &CpuBuffer,
        c: &CpuBuffer,
        a: &CpuBuffer,
        b: &CpuBuffer,
        h: f64,
        n: usize,
        _work: WorkSize,
    ) -> Result<()> {
        self.count_dispatch();
        let y = y.data.borrow();
        let c = c.data.borrow();
        let mut a = a.data.borrow_mut();
        let mut b = b.data.borrow_mut();
        let (y, c): (&[f64], &[f64]) = (&y, &c);

        a[..n]
            .par_iter_mut()
            .zip(b[..n].par_iter_mut())
            .enumerate()
            .for_each(|(i, (ai, bi))| {
                if i == 0 {
                    *ai = 0.0;
                    *bi = 0.0;
                } else {
                    *bi = (y[i] - y[i - 1]) / h - (c[i] - c[i - 1]) * h / 6.0;
                    *ai = (y[i] + y[i - 1]) / 2.0 - (c[i] + c[i - 1]) * h * h / 12.0;
                }
            });
        Ok(())
    }

    fn dispatch_count(&self) -> u32 {
        self.dispatch_count.get()
    }

    fn readback_count(&self) -> u32 {
        self.readback_count.get()
    }
}
