//!这个是给程序提供泛型支持的模块
use num_complex::Complex64;
use num_traits::identities::Zero;

//这里的trait是为了让 add_hop 可以同时满足 f64 和 Complex64 的
#[allow(non_camel_case_types)]
pub trait hop_use: Copy + Clone + Zero {
    fn to_complex(&self) -> Complex64;
}
impl hop_use for f64 {
    fn to_complex(&self) -> Complex64 {
        Complex64::new(*self, 0.0)
    }
}

impl hop_use for Complex64 {
    fn to_complex(&self) -> Complex64 {
        *self
    }
}

/// Past this many decimals rounding is skipped.
const MAX_DECIMALS: u32 = 17;

/// Rounds to `decimals` digits after the point, ties to even.
#[inline(always)]
pub fn round_to(x: f64, decimals: u32) -> f64 {
    if decimals > MAX_DECIMALS {
        return x;
    }
    let scale = 10_f64.powi(decimals as i32);
    let scaled = x * scale;
    if !scaled.is_finite() {
        return x;
    }
    scaled.round_ties_even() / scale
}

#[inline(always)]
pub fn round_complex(z: Complex64, decimals: u32) -> Complex64 {
    Complex64::new(round_to(z.re, decimals), round_to(z.im, decimals))
}
