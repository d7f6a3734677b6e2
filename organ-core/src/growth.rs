//! Analytical growth functions mapping organ age to organ length and back.
//!
//! Every variant answers two questions for an organ with initial growth rate
//! `r` [cm/day] and maximal length `k` [cm]:
//! - [`GrowthFunction::length_at`]: length reached at a given age,
//! - [`GrowthFunction::age_at`]: age at which a given length is reached.
//!
//! The two are inverse to each other on `[0, k)`. When the inverse is not
//! finite (the length approaches `k` asymptotically) the age is reported as
//! [`PRACTICALLY_INFINITE_AGE`].

use crate::error::{Error, Result};
use crate::types::OrganId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Age [day] reported when a length can never be reached in finite time.
pub const PRACTICALLY_INFINITE_AGE: f64 = 1.0e9;

/// Closed set of growth functions, selected by an integer code in parameter files.
///
/// | code | variant |
/// |------|---------|
/// | 1 | [`GrowthFunction::NegativeExponential`] |
/// | 2 | [`GrowthFunction::Linear`] |
/// | 3 | [`GrowthFunction::CarbonLimited`] |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum GrowthFunction {
    /// Starts at rate `r` and slows down towards `k`.
    NegativeExponential,
    /// Constant rate `r` until `k` is reached.
    #[default]
    Linear,
    /// Elongation is dictated per step by an external process (e.g. a
    /// carbon allocation model). Falls back to [`GrowthFunction::Linear`]
    /// for organs the process supplied no increment for.
    CarbonLimited,
}

impl TryFrom<i32> for GrowthFunction {
    type Error = Error;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            1 => Ok(GrowthFunction::NegativeExponential),
            2 => Ok(GrowthFunction::Linear),
            3 => Ok(GrowthFunction::CarbonLimited),
            other => Err(Error::UnknownGrowthFunction(other)),
        }
    }
}

impl From<GrowthFunction> for i32 {
    fn from(gf: GrowthFunction) -> i32 {
        match gf {
            GrowthFunction::NegativeExponential => 1,
            GrowthFunction::Linear => 2,
            GrowthFunction::CarbonLimited => 3,
        }
    }
}

/// Per-organ state a growth function may consult.
///
/// Only [`GrowthFunction::CarbonLimited`] reads it; the analytical variants
/// depend on age, `r` and `k` alone.
#[derive(Clone, Copy, Debug)]
pub struct GrowthContext<'a> {
    pub organ: OrganId,
    /// Current theoretical length of the organ [cm].
    pub length: f64,
    /// Current age of the organ [day].
    pub age: f64,
    /// Size of the running time step [day].
    pub dt: f64,
    /// Length increments for this step, keyed by organ id.
    pub increments: &'a HashMap<OrganId, f64>,
}

impl GrowthFunction {
    /// Returns the organ length [cm] at organ age `age` [day].
    ///
    /// ### Errors
    /// [`Error::NegativeAge`] if `age` is negative.
    pub fn length_at(&self, age: f64, r: f64, k: f64, ctx: &GrowthContext<'_>) -> Result<f64> {
        if age < 0.0 {
            return Err(Error::NegativeAge(age));
        }
        match self {
            GrowthFunction::Linear => Ok(linear_length(age, r, k)),
            GrowthFunction::NegativeExponential => {
                if k <= 0.0 {
                    return Ok(0.0);
                }
                Ok(k * (1.0 - (-(r / k) * age).exp()))
            }
            GrowthFunction::CarbonLimited => match ctx.increments.get(&ctx.organ) {
                Some(inc) => Ok(inc + ctx.length),
                None => Ok(linear_length(age, r, k)),
            },
        }
    }

    /// Returns the organ age [day] at which length `length` [cm] is reached.
    ///
    /// ### Errors
    /// [`Error::NegativeLength`] if `length` is negative.
    pub fn age_at(&self, length: f64, r: f64, k: f64, ctx: &GrowthContext<'_>) -> Result<f64> {
        if length < 0.0 {
            return Err(Error::NegativeLength(length));
        }
        match self {
            GrowthFunction::Linear => Ok(linear_age(length, r)),
            GrowthFunction::NegativeExponential => {
                if length == 0.0 {
                    return Ok(0.0);
                }
                let age = -(k / r) * (1.0 - length / k).ln();
                if age.is_finite() {
                    Ok(age)
                } else {
                    Ok(PRACTICALLY_INFINITE_AGE)
                }
            }
            GrowthFunction::CarbonLimited => {
                if ctx.increments.contains_key(&ctx.organ) {
                    Ok(ctx.age + ctx.dt)
                } else {
                    Ok(linear_age(length, r))
                }
            }
        }
    }
}

fn linear_length(age: f64, r: f64, k: f64) -> f64 {
    k.min(r * age)
}

fn linear_age(length: f64, r: f64) -> f64 {
    if length == 0.0 {
        return 0.0;
    }
    let age = length / r;
    if age.is_finite() {
        age
    } else {
        PRACTICALLY_INFINITE_AGE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-9;

    fn ctx(increments: &HashMap<OrganId, f64>) -> GrowthContext<'_> {
        GrowthContext {
            organ: 7,
            length: 2.0,
            age: 3.0,
            dt: 0.5,
            increments,
        }
    }

    #[test]
    fn linear_growth_is_capped_at_max_length() {
        let none = HashMap::new();
        let c = ctx(&none);
        let gf = GrowthFunction::Linear;

        assert_eq!(gf.length_at(5.0, 1.0, 10.0, &c).unwrap(), 5.0);
        assert_eq!(gf.length_at(20.0, 1.0, 10.0, &c).unwrap(), 10.0);
        assert_eq!(gf.age_at(10.0, 1.0, 10.0, &c).unwrap(), 10.0);
    }

    #[test]
    fn linear_and_exponential_round_trip() {
        let none = HashMap::new();
        let c = ctx(&none);
        let (r, k) = (1.7, 23.0);

        for gf in [GrowthFunction::Linear, GrowthFunction::NegativeExponential] {
            for i in 0..50 {
                let l = k * (i as f64) / 50.0;
                let t = gf.age_at(l, r, k, &c).unwrap();
                let back = gf.length_at(t, r, k, &c).unwrap();
                assert!((back - l).abs() < TOL, "{gf:?}: l={l} back={back}");
            }
            // ages inside the range where the linear function is not capped
            for i in 0..50 {
                let t = (k / r) * (i as f64) / 50.0;
                let l = gf.length_at(t, r, k, &c).unwrap();
                let back = gf.age_at(l, r, k, &c).unwrap();
                assert!((back - t).abs() < 1e-6, "{gf:?}: t={t} back={back}");
            }
        }
    }

    #[test]
    fn exponential_age_at_max_length_is_sentinel() {
        let none = HashMap::new();
        let c = ctx(&none);
        let gf = GrowthFunction::NegativeExponential;

        assert_eq!(gf.age_at(10.0, 1.0, 10.0, &c).unwrap(), PRACTICALLY_INFINITE_AGE);
        assert_eq!(gf.age_at(12.0, 1.0, 10.0, &c).unwrap(), PRACTICALLY_INFINITE_AGE);
        assert!(gf.length_at(1.0e6, 1.0, 10.0, &c).unwrap() <= 10.0);
    }

    #[test]
    fn exponential_starts_with_initial_rate() {
        let none = HashMap::new();
        let c = ctx(&none);
        let gf = GrowthFunction::NegativeExponential;
        let l = gf.length_at(1e-4, 2.0, 50.0, &c).unwrap();
        assert!((l / 1e-4 - 2.0).abs() < 1e-3);
    }

    #[test]
    fn negative_inputs_are_rejected() {
        let none = HashMap::new();
        let c = ctx(&none);
        for gf in [
            GrowthFunction::Linear,
            GrowthFunction::NegativeExponential,
            GrowthFunction::CarbonLimited,
        ] {
            assert_eq!(gf.length_at(-1.0, 1.0, 10.0, &c), Err(Error::NegativeAge(-1.0)));
            assert_eq!(gf.age_at(-0.5, 1.0, 10.0, &c), Err(Error::NegativeLength(-0.5)));
        }
    }

    #[test]
    fn carbon_limited_without_data_behaves_linear() {
        let none = HashMap::new();
        let c = ctx(&none);
        let gf = GrowthFunction::CarbonLimited;
        assert_eq!(gf.length_at(5.0, 1.0, 10.0, &c).unwrap(), 5.0);
        assert_eq!(gf.age_at(4.0, 2.0, 10.0, &c).unwrap(), 2.0);
    }

    #[test]
    fn carbon_limited_uses_external_increment() {
        let mut inc = HashMap::new();
        inc.insert(7, 0.25);
        let c = ctx(&inc);
        let gf = GrowthFunction::CarbonLimited;

        assert_eq!(gf.length_at(100.0, 1.0, 10.0, &c).unwrap(), 2.25);
        assert_eq!(gf.age_at(1.0, 1.0, 10.0, &c).unwrap(), 3.5);

        // another organ without an entry falls back to the formula
        let other = GrowthContext { organ: 8, ..c };
        assert_eq!(gf.length_at(5.0, 1.0, 10.0, &other).unwrap(), 5.0);
    }

    #[test]
    fn codes_select_variants() {
        assert_eq!(GrowthFunction::try_from(1), Ok(GrowthFunction::NegativeExponential));
        assert_eq!(GrowthFunction::try_from(2), Ok(GrowthFunction::Linear));
        assert_eq!(GrowthFunction::try_from(3), Ok(GrowthFunction::CarbonLimited));
        assert_eq!(GrowthFunction::try_from(9), Err(Error::UnknownGrowthFunction(9)));
        assert_eq!(i32::from(GrowthFunction::CarbonLimited), 3);
    }
}
