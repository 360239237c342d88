//! WGSL compute shader sources for the Jacobi and spline kernels.
//!
//! All kernels use f32 and a fixed work-group size of 64, matching
//! `backend::WORKGROUP_SIZE`. Every kernel returns early for indices `>= n`,
//! so the padded tail of a dispatch is never written.

/// WGSL source containing all GPU compute kernels.
///
/// Entry points:
/// - `init_zero`: x = 0
/// - `jacobi_step`: one Jacobi sweep of a dense system (row stride = params.stride)
/// - `difference`: per-workgroup sum of squared differences
/// - `init_rhs`: natural cubic spline right-hand side
/// - `spline_step`: one Jacobi sweep of the spline tridiagonal system
/// - `compute_ab`: per-segment spline coefficients
pub const SHADER_SOURCE: &str = r#"
// ============================================================
// Jacobi / spline compute shaders
// ============================================================

struct Params {
    n: u32,
    stride: u32,
    h: f32,
    pad: u32,
}

// --- init: x = 0 ---

@group(0) @binding(0) var<storage, read_write> init_x: array<f32>;
@group(0) @binding(1) var<uniform> init_params: Params;

@compute @workgroup_size(64)
fn init_zero(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    if i >= init_params.n {
        return;
    }
    init_x[i] = 0.0;
}

// --- Jacobi sweep (dense) ---
// dst[i] = (b[i] - sum_{j != i} a[i][j] * src[j]) / a[i][i]
// One thread per row.

@group(0) @binding(0) var<storage, read> js_a: array<f32>;
@group(0) @binding(1) var<storage, read> js_b: array<f32>;
@group(0) @binding(2) var<storage, read> js_src: array<f32>;
@group(0) @binding(3) var<storage, read_write> js_dst: array<f32>;
@group(0) @binding(4) var<uniform> js_params: Params;

@compute @workgroup_size(64)
fn jacobi_step(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    if i >= js_params.n {
        return;
    }
    let row = i * js_params.stride;
    var sum: f32 = 0.0;
    for (var j = 0u; j < js_params.n; j = j + 1u) {
        if j != i {
            sum = sum + js_a[row + j] * js_src[j];
        }
    }
    js_dst[i] = (js_b[i] - sum) / js_a[row + i];
}

// --- difference: parallel reduction ---
// Each workgroup reduces its chunk of (x - y)^2 and writes one partial sum.
// Final reduction across workgroups done on CPU.

const DIFF_WG_SIZE: u32 = 64u;

var<workgroup> diff_scratch: array<f32, 64>;

@group(0) @binding(0) var<storage, read> diff_x: array<f32>;
@group(0) @binding(1) var<storage, read> diff_y: array<f32>;
@group(0) @binding(2) var<storage, read_write> diff_out: array<f32>;
@group(0) @binding(3) var<uniform> diff_params: Params;

@compute @workgroup_size(64)
fn difference(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(local_invocation_id) lid: vec3<u32>,
    @builtin(workgroup_id) wid: vec3<u32>,
) {
    let i = gid.x;
    let local_id = lid.x;

    if i < diff_params.n {
        let d = diff_x[i] - diff_y[i];
        diff_scratch[local_id] = d * d;
    } else {
        diff_scratch[local_id] = 0.0;
    }
    workgroupBarrier();

    var stride = DIFF_WG_SIZE / 2u;
    while stride > 0u {
        if local_id < stride {
            diff_scratch[local_id] = diff_scratch[local_id] + diff_scratch[local_id + stride];
        }
        workgroupBarrier();
        stride = stride / 2u;
    }

    if local_id == 0u {
        diff_out[wid.x] = diff_scratch[0];
    }
}

// --- spline right-hand side ---
// rhs[i] = 6 (y[i+1] - 2 y[i] + y[i-1]) / h^2, zero at the endpoints.

@group(0) @binding(0) var<storage, read> rhs_y: array<f32>;
@group(0) @binding(1) var<storage, read_write> rhs_out: array<f32>;
@group(0) @binding(2) var<uniform> rhs_params: Params;

@compute @workgroup_size(64)
fn init_rhs(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    let n = rhs_params.n;
    if i >= n {
        return;
    }
    if i == 0u || i == n - 1u {
        rhs_out[i] = 0.0;
        return;
    }
    let h = rhs_params.h;
    rhs_out[i] = 6.0 * (rhs_y[i + 1u] - 2.0 * rhs_y[i] + rhs_y[i - 1u]) / (h * h);
}

// --- spline Jacobi sweep ---
// c[i-1] + 4 c[i] + c[i+1] = rhs[i]; endpoints pinned to zero every sweep.

@group(0) @binding(0) var<storage, read> ss_rhs: array<f32>;
@group(0) @binding(1) var<storage, read> ss_src: array<f32>;
@group(0) @binding(2) var<storage, read_write> ss_dst: array<f32>;
@group(0) @binding(3) var<uniform> ss_params: Params;

@compute @workgroup_size(64)
fn spline_step(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    let n = ss_params.n;
    if i >= n {
        return;
    }
    if i == 0u || i == n - 1u {
        ss_dst[i] = 0.0;
        return;
    }
    ss_dst[i] = (ss_rhs[i] - ss_src[i - 1u] - ss_src[i + 1u]) / 4.0;
}

// --- per-segment coefficients ---
// Segment i spans [(i-1) h, i h] for i in 1..n; slot 0 is unused.

@group(0) @binding(0) var<storage, read> ab_y: array<f32>;
@group(0) @binding(1) var<storage, read> ab_c: array<f32>;
@group(0) @binding(2) var<storage, read_write> ab_a: array<f32>;
@group(0) @binding(3) var<storage, read_write> ab_b: array<f32>;
@group(0) @binding(4) var<uniform> ab_params: Params;

@compute @workgroup_size(64)
fn compute_ab(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    if i >= ab_params.n {
        return;
    }
    if i == 0u {
        ab_a[0] = 0.0;
        ab_b[0] = 0.0;
        return;
    }
    let h = ab_params.h;
    ab_b[i] = (ab_y[i] - ab_y[i - 1u]) / h - (ab_c[i] - ab_c[i - 1u]) * h / 6.0;
    ab_a[i] = (ab_y[i] + ab_y[i - 1u]) / 2.0 - (ab_c[i] + ab_c[i - 1u]) * h * h / 12.0;
}
"#;
