//! Формирующие импульсы в замкнутой форме.
//!
//! Время `t` измеряется в символьных интервалах, импульсы нормированы так,
//! что `p(0)` соответствует единичной энергии на символ (RRC).

use std::f64::consts::{FRAC_1_SQRT_2, PI};

use wavgen_types::FilterType;

const EPS: f64 = 1e-9;

/// Значение импульса `filter` с коэффициентом скругления `beta` в момент `t`.
pub fn pulse(
    filter: FilterType,
    t: f64,
    beta: f64,
) -> f64 {
    match filter {
        FilterType::Rrc => rrc(t, beta),
        FilterType::Rcos => rcos(t, beta),
    }
}

/// Root raised cosine.
pub fn rrc(
    t: f64,
    beta: f64,
) -> f64 {
    if t.abs() < EPS {
        return 1.0 - beta + 4.0 * beta / PI;
    }

    if beta > 0.0 && (t.abs() - 1.0 / (4.0 * beta)).abs() < EPS {
        let a = PI / (4.0 * beta);
        return beta * FRAC_1_SQRT_2 * ((1.0 + 2.0 / PI) * a.sin() + (1.0 - 2.0 / PI) * a.cos());
    }

    let num = (PI * t * (1.0 - beta)).sin() + 4.0 * beta * t * (PI * t * (1.0 + beta)).cos();
    let den = PI * t * (1.0 - (4.0 * beta * t).powi(2));

    num / den
}

/// Raised cosine.
pub fn rcos(
    t: f64,
    beta: f64,
) -> f64 {
    if beta > 0.0 && (t.abs() - 1.0 / (2.0 * beta)).abs() < EPS {
        return PI / 4.0 * sinc(1.0 / (2.0 * beta));
    }

    sinc(t) * (PI * beta * t).cos() / (1.0 - (2.0 * beta * t).powi(2))
}

/// Нормированный sinc: `sin(πx) / (πx)`.
pub fn sinc(x: f64) -> f64 {
    if x.abs() < EPS {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_rcos_zero_crossings_at_symbol_instants() {
        assert_abs_diff_eq!(rcos(0.0, 0.25), 1.0, epsilon = 1e-12);
        for k in 1..8 {
            assert_abs_diff_eq!(rcos(k as f64, 0.25), 0.0, epsilon = 1e-9);
            assert_abs_diff_eq!(rcos(-(k as f64), 0.25), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_rrc_singularity_is_finite_and_continuous() {
        let beta = 0.25;
        let t0 = 1.0 / (4.0 * beta);
        let at = rrc(t0, beta);
        let near = rrc(t0 + 1e-4, beta);

        assert!(at.is_finite());
        assert_abs_diff_eq!(at, near, epsilon = 1e-3);
    }

    #[test]
    fn test_rrc_unit_energy() {
        // ∫ p² dt ≈ 1 при шаге 1/64 символа
        let step = 1.0 / 64.0;
        let energy: f64 = (-16 * 64..=16 * 64)
            .map(|i| rrc(i as f64 * step, 0.25).powi(2) * step)
            .sum();

        assert_abs_diff_eq!(energy, 1.0, epsilon = 1e-2);
    }
}
