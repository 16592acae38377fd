//! SPH smoothing kernels.
//!
//! All three kernels share one support radius `h`, the same value used as the
//! grid cell size, so a 3x3 cell scan always covers a particle's full support.
//! Every kernel is exactly zero at and beyond `h`.

use std::f64::consts::PI;

/// Kernel functions for a fixed smoothing radius, with the normalization
/// coefficients precomputed.
///
/// Coefficients are evaluated in `f64` and stored as `f32`; `h^9` is small
/// enough that computing it in single precision loses several digits.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphKernels {
    h: f32,
    h_sq: f32,
    poly6_coeff: f32,
    spiky_grad_coeff: f32,
    viscosity_laplacian_coeff: f32,
}

impl SphKernels {
    pub fn new(h: f32) -> Self {
        let hd = h as f64;
        Self {
            h,
            h_sq: h * h,
            poly6_coeff: (315.0 / (64.0 * PI * hd.powi(9))) as f32,
            spiky_grad_coeff: (-45.0 / (PI * hd.powi(6))) as f32,
            viscosity_laplacian_coeff: (45.0 / (PI * hd.powi(6))) as f32,
        }
    }

    /// Support radius.
    #[inline]
    pub fn radius(&self) -> f32 {
        self.h
    }

    /// Squared support radius.
    #[inline]
    pub fn radius_sq(&self) -> f32 {
        self.h_sq
    }

    /// Poly6 density kernel.
    /// W(r, h) = (315 / 64πh⁹) * (h² - r²)³ for r² ≤ h²
    #[inline]
    pub fn poly6(&self, r_sq: f32) -> f32 {
        if !(0.0..self.h_sq).contains(&r_sq) {
            return 0.0;
        }
        let diff = self.h_sq - r_sq;
        self.poly6_coeff * diff * diff * diff
    }

    /// Magnitude of the Spiky kernel gradient, used for pressure forces.
    /// |∇W(r, h)| = -(45 / πh⁶) * (h - r)² for r ≤ h
    ///
    /// Negative inside the support; multiply by the unit vector between the
    /// two particles to get the gradient.
    #[inline]
    pub fn spiky_gradient_magnitude(&self, r: f32) -> f32 {
        if !(0.0..self.h).contains(&r) {
            return 0.0;
        }
        let diff = self.h - r;
        self.spiky_grad_coeff * diff * diff
    }

    /// Laplacian of the viscosity kernel.
    /// ∇²W(r, h) = (45 / πh⁶) * (h - r) for r ≤ h
    #[inline]
    pub fn viscosity_laplacian(&self, r: f32) -> f32 {
        if !(0.0..self.h).contains(&r) {
            return 0.0;
        }
        self.viscosity_laplacian_coeff * (self.h - r)
    }
}
