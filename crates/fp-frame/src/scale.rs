//! Aspect-preserving fit of a source resolution into a bounding box.

use fp_core::{TargetSize, Viewport};

/// Scale `source_w x source_h` uniformly so it fits inside
/// `bound_w x bound_h`, touching the bound on the limiting axis.
///
/// Equivalent to `scale = min(bound_w / source_w, bound_h / source_h)` with
/// each output dimension floored, but computed in integer arithmetic so the
/// limiting axis lands exactly on the bound. Degenerate inputs (any zero)
/// produce a size with a zero dimension; callers reject those with
/// [`TargetSize::validate`].
pub fn fit(source_w: u32, source_h: u32, bound_w: u32, bound_h: u32) -> TargetSize {
    if source_w == 0 || source_h == 0 {
        // Scale is unbounded (or undefined) along the empty axis.
        return TargetSize::new(0, 0);
    }

    let (sw, sh) = (u64::from(source_w), u64::from(source_h));
    let (bw, bh) = (u64::from(bound_w), u64::from(bound_h));

    // bound_w / source_w <= bound_h / source_h  <=>  bw * sh <= bh * sw
    if bw * sh <= bh * sw {
        TargetSize::new(bound_w, clamp_u32(sh * bw / sw))
    } else {
        TargetSize::new(clamp_u32(sw * bh / sh), bound_h)
    }
}

/// [`fit`] against a [`Viewport`].
pub fn fit_within(source_w: u32, source_h: u32, viewport: Viewport) -> TargetSize {
    fit(source_w, source_h, viewport.width, viewport.height)
}

fn clamp_u32(v: u64) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}
