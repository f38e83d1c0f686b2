use std::f64::consts::PI;

use num_complex::Complex;

pub fn safe_arg(z: &Complex<f64>) -> f64 {
    if z.re == 0.0 && z.im == 0.0 {
        0.0
    } else {
        z.arg()
    }
}

/// Wraps an angle into (-pi, pi].
pub fn wrap_phase(phase: f64) -> f64 {
    let wrapped = (phase + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped == -PI {
        PI
    } else {
        wrapped
    }
}

/// Mean of unit phasors `exp(i*phase)`.
pub fn mean_phasor(phases: &[f64]) -> Complex<f64> {
    if phases.is_empty() {
        return Complex::new(0.0, 0.0);
    }
    let sum: Complex<f64> = phases.iter().map(|&p| Complex::from_polar(1.0, p)).sum();
    sum / phases.len() as f64
}

/// splitmix64 finaliser; decorrelates neighbouring trial indices.
#[inline(always)]
pub fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// Seed of trial `trial` under run seed `seed`. Depends on nothing else, so
/// trials can execute in any order or on any thread.
pub fn derive_trial_seed(seed: u64, trial: usize) -> u64 {
    splitmix64(splitmix64(seed) ^ (trial as u64).wrapping_mul(0xD1B5_4A32_D192_ED03))
}
