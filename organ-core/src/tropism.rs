//! Directional growth policies ("tropisms").
//!
//! A tropism perturbs the heading of a growing organ. For every new segment
//! it dices a small rotation `(a, b)` of the local frame: `a` is the
//! deviation from the current heading, `b` the direction of that deviation
//! around it. Several trials are diced and the one minimising the tropism's
//! objective wins, so `n` controls how strongly the organ follows its
//! preferred direction and `sigma` how erratic it is.

use crate::error::{Error, Result};
use crate::organ::Organ;
use glam::{DMat3, DVec3};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

/// Added to the objective of a trial whose next node would cross the ceiling.
const CONFINEMENT_PENALTY: f64 = 10.0;

/// Closed set of tropisms, selected by an integer code in parameter files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum TropismKind {
    /// Prefers horizontal growth (code 0).
    Plagiotropism,
    /// Prefers downward growth (code 1).
    Gravitropism,
    /// Keeps the initial heading (code 2).
    Exotropism,
    /// Prefers upward growth (code 4).
    AntiGravitropism,
    /// Upward until the organ reaches `age_switch`, downward afterwards (code 6).
    AntiGraviToGravi,
}

impl TryFrom<i32> for TropismKind {
    type Error = Error;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            0 => Ok(TropismKind::Plagiotropism),
            1 => Ok(TropismKind::Gravitropism),
            2 => Ok(TropismKind::Exotropism),
            4 => Ok(TropismKind::AntiGravitropism),
            6 => Ok(TropismKind::AntiGraviToGravi),
            other => Err(Error::UnknownTropism(other)),
        }
    }
}

impl From<TropismKind> for i32 {
    fn from(kind: TropismKind) -> i32 {
        match kind {
            TropismKind::Plagiotropism => 0,
            TropismKind::Gravitropism => 1,
            TropismKind::Exotropism => 2,
            TropismKind::AntiGravitropism => 4,
            TropismKind::AntiGraviToGravi => 6,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TropismFunction {
    pub kind: TropismKind,
    /// Strength: number of trials per cm of growth.
    pub n: f64,
    /// Flexibility: expected heading change [1/cm].
    pub sigma: f64,
    /// Organ age [day] at which an age-dependent tropism changes its objective.
    #[serde(default)]
    pub age_switch: f64,
    /// Height the organ may not grow above (e.g. the soil surface for roots).
    #[serde(default)]
    pub ceiling: Option<f64>,
}

impl Default for TropismFunction {
    fn default() -> Self {
        Self {
            kind: TropismKind::Exotropism,
            n: 0.0,
            sigma: 0.0,
            age_switch: 0.0,
            ceiling: None,
        }
    }
}

impl TropismFunction {
    pub fn new(kind: TropismKind, n: f64, sigma: f64) -> Self {
        Self {
            kind,
            n,
            sigma,
            ..Self::default()
        }
    }

    /// `true` if the objective changes once the organ reaches `age_switch`.
    pub fn is_age_dependent(&self) -> bool {
        self.kind == TropismKind::AntiGraviToGravi && self.age_switch > 0.0
    }

    /// Dices the rotation `(a, b)` of `frame` for the next segment.
    ///
    /// ### Parameters
    /// - `pos` - Absolute position of the node the segment starts from.
    /// - `frame` - Orthonormal frame whose first column is the current heading.
    /// - `dx` - Maximal segment length of the organ; the heading change is
    ///   scaled by it so tropism does not depend on the growth rate.
    /// - `organ` - The growing organ (age and initial heading).
    /// - `rng` - Random source for the trials.
    ///
    /// ### Returns
    /// The angle pair to pass to [`rot_ab`].
    pub fn heading<R: Rng + ?Sized>(
        &self,
        pos: DVec3,
        frame: &DMat3,
        dx: f64,
        organ: &Organ,
        rng: &mut R,
    ) -> (f64, f64) {
        let sqrt_dx = dx.max(0.0).sqrt();
        let (mut best_a, mut best_b) = self.dice(sqrt_dx, rng);

        let mut trials = self.n * dx;
        if trials > 0.0 {
            let frac = trials - trials.floor();
            trials = if rng.random::<f64>() < frac {
                trials.ceil()
            } else {
                trials.floor()
            };

            let mut best = self.objective(pos, frame, best_a, best_b, dx, organ);
            for _ in 0..trials as usize {
                let (a, b) = self.dice(sqrt_dx, rng);
                let v = self.objective(pos, frame, a, b, dx, organ);
                if v < best {
                    best = v;
                    best_a = a;
                    best_b = b;
                }
            }
        }
        (best_a, best_b)
    }

    /// Placement vector of a new segment of length `sdx` that starts at
    /// `pos` while the organ is heading towards `heading`.
    pub fn increment<R: Rng + ?Sized>(
        &self,
        pos: DVec3,
        heading: DVec3,
        sdx: f64,
        dx: f64,
        organ: &Organ,
        rng: &mut R,
    ) -> DVec3 {
        let frame = ons(heading);
        let (a, b) = self.heading(pos, &frame, dx, organ, rng);
        frame * rot_ab(a, b) * sdx
    }

    fn dice<R: Rng + ?Sized>(&self, sqrt_dx: f64, rng: &mut R) -> (f64, f64) {
        let z: f64 = rng.sample(StandardNormal);
        let a = self.sigma * z * sqrt_dx;
        let b = rng.random::<f64>() * TAU;
        (a, b)
    }

    fn objective(&self, pos: DVec3, frame: &DMat3, a: f64, b: f64, dx: f64, organ: &Organ) -> f64 {
        let s = (*frame * rot_ab(a, b)).normalize_or_zero();
        let gravi = 0.5 * (s.z + 1.0);
        let anti_gravi = 0.5 * (1.0 - s.z);

        let mut v = match self.kind {
            TropismKind::Plagiotropism => s.z.abs(),
            TropismKind::Gravitropism => gravi,
            TropismKind::AntiGravitropism => anti_gravi,
            TropismKind::Exotropism => {
                let initial = organ.initial_heading().x_axis;
                s.dot(initial).clamp(-1.0, 1.0).acos() / PI
            }
            TropismKind::AntiGraviToGravi => {
                if organ.age() < self.age_switch {
                    anti_gravi
                } else {
                    gravi
                }
            }
        };

        if let Some(ceiling) = self.ceiling
            && (pos + s * dx).z > ceiling
        {
            v += CONFINEMENT_PENALTY;
        }
        v
    }
}

/// Direction obtained by tilting the x axis by `a` towards the direction `b`
/// in the y-z plane.
pub fn rot_ab(a: f64, b: f64) -> DVec3 {
    let sa = a.sin();
    DVec3::new(a.cos(), sa * b.cos(), sa * b.sin())
}

/// Builds an orthonormal frame whose first column is the normalized heading `h`.
///
/// The second axis lies in the plane of the dominant component of `h` and
/// one other coordinate axis, so the result is stable for a given `h`.
pub fn ons(h: DVec3) -> DMat3 {
    let v1 = h.normalize_or(DVec3::X);
    let (ax, ay, az) = (v1.x.abs(), v1.y.abs(), v1.z.abs());
    let v2 = if ay >= ax && ay >= az {
        DVec3::new(0.0, -v1.z, v1.y)
    } else {
        DVec3::new(-v1.z, 0.0, v1.x)
    }
    .normalize();
    let v3 = v1.cross(v2).normalize();
    DMat3::from_cols(v1, v2, v3)
}
