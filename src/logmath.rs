//! Log-domain arithmetic.
//!
//! −∞ is "probability zero" and must survive every combination: the sum of
//! any number of −∞ terms is −∞, never NaN.

/// `log(exp(a) + exp(b))`.
#[inline]
pub fn log_add(a: f32, b: f32) -> f32 {
    if a == f32::NEG_INFINITY {
        b
    } else if b == f32::NEG_INFINITY {
        a
    } else {
        let max = a.max(b);
        max + ((a - max).exp() + (b - max).exp()).ln()
    }
}

/// `log(Σ exp(x))` over an iterator of log-values.
pub fn log_sum_exp<I: IntoIterator<Item = f32>>(xs: I) -> f32 {
    let xs: Vec<f32> = xs.into_iter().collect();
    let max = xs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max == f32::NEG_INFINITY {
        return f32::NEG_INFINITY;
    }
    if max == f32::INFINITY {
        return f32::INFINITY;
    }
    max + xs.iter().map(|&x| (x - max).exp()).sum::<f32>().ln()
}
