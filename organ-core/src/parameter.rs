//! Organ parameters.
//!
//! An [`OrganRandomParameter`] describes an organ *type* statistically (mean
//! and standard deviation per trait). Each organ instance owns an
//! [`OrganSpecificParameter`] diced from it by
//! [`OrganRandomParameter::realize`] when the organ is created.

use crate::error::{Error, Result};
use crate::growth::GrowthFunction;
use crate::soil::SoilLookUp;
use crate::tropism::{TropismFunction, TropismKind};
use crate::types::{OrganKind, SubType};
use glam::DVec3;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Smallest inter-branch distance a realized organ may have [cm].
pub const MIN_INTERNODE: f64 = 1e-9;

/// A normally distributed trait.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Sampled {
    pub mean: f64,
    #[serde(default)]
    pub sd: f64,
}

impl Sampled {
    pub fn new(mean: f64, sd: f64) -> Self {
        Self { mean, sd }
    }

    pub fn fixed(mean: f64) -> Self {
        Self { mean, sd: 0.0 }
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let z: f64 = rng.sample(StandardNormal);
        self.mean + z * self.sd
    }
}

/// One candidate lateral type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Successor {
    pub subtype: SubType,
    /// Organ kind of the lateral; the parent's kind if absent.
    #[serde(default)]
    pub kind: Option<OrganKind>,
    pub probability: f64,
}

impl Successor {
    pub fn new(subtype: SubType, probability: f64) -> Self {
        Self {
            subtype,
            kind: None,
            probability,
        }
    }
}

/// Type-level, statistical description of an organ.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganRandomParameter {
    pub name: String,
    pub kind: OrganKind,
    pub subtype: SubType,
    /// Basal zone, unbranched length at the organ base [cm].
    pub basal_zone: Sampled,
    /// Apical zone, unbranched length at the organ tip [cm].
    pub apical_zone: Sampled,
    /// Distance between two branches [cm].
    pub internode: Sampled,
    /// Number of branches [1].
    pub branch_count: Sampled,
    /// Initial growth rate [cm/day].
    pub growth_rate: Sampled,
    /// Radius [cm].
    pub radius: Sampled,
    /// Insertion angle towards the parent organ [rad].
    pub insertion_angle: Sampled,
    /// Lifetime [day].
    pub lifetime: Sampled,
    pub growth: GrowthFunction,
    pub tropism: TropismFunction,
    /// Maximal segment length [cm].
    pub dx: f64,
    /// Minimal segment length [cm]; shorter growth is kept as residual.
    pub dx_min: f64,
    pub successors: Vec<Successor>,
}

impl Default for OrganRandomParameter {
    fn default() -> Self {
        Self {
            name: "undefined".to_string(),
            kind: OrganKind::Root,
            subtype: -1,
            basal_zone: Sampled::fixed(0.0),
            apical_zone: Sampled::fixed(10.0),
            internode: Sampled::fixed(1.0),
            branch_count: Sampled::fixed(0.0),
            growth_rate: Sampled::fixed(1.0),
            radius: Sampled::fixed(0.1),
            insertion_angle: Sampled::fixed(1.22),
            lifetime: Sampled::fixed(1.0e9),
            growth: GrowthFunction::NegativeExponential,
            tropism: TropismFunction::new(TropismKind::Gravitropism, 1.0, 0.2),
            dx: 0.25,
            dx_min: 1e-6,
            successors: Vec::new(),
        }
    }
}

impl OrganRandomParameter {
    pub fn new(kind: OrganKind, subtype: SubType) -> Self {
        Self {
            kind,
            subtype,
            ..Self::default()
        }
    }

    /// Dices the parameters of one organ instance.
    ///
    /// Every trait is drawn independently from its normal distribution and
    /// clamped to be non-negative. The branch count is rounded; the
    /// `branch_count - 1` inter-branch distances are clamped to
    /// [`MIN_INTERNODE`].
    pub fn realize<R: Rng + ?Sized>(&self, rng: &mut R) -> OrganSpecificParameter {
        let basal_zone = self.basal_zone.draw(rng).max(0.0);
        let apical_zone = self.apical_zone.draw(rng).max(0.0);
        let branch_count = self.branch_count.draw(rng).round().max(0.0) as usize;
        let internodes = (1..branch_count)
            .map(|_| self.internode.draw(rng).max(MIN_INTERNODE))
            .collect();
        let growth_rate = self.growth_rate.draw(rng).max(0.0);
        let radius = self.radius.draw(rng).max(0.0);
        let insertion_angle = self.insertion_angle.draw(rng).max(0.0);
        let lifetime = self.lifetime.draw(rng).max(0.0);

        OrganSpecificParameter {
            subtype: self.subtype,
            basal_zone,
            apical_zone,
            branch_count,
            internodes,
            growth_rate,
            radius,
            insertion_angle,
            lifetime,
        }
    }

    /// Dices the kind and sub type of a lateral emerging at `pos`.
    ///
    /// Each successor probability is scaled by `soil.value(pos)` and the
    /// first successor whose cumulative scaled probability exceeds a uniform
    /// draw is chosen. A single successor is chosen without a draw.
    ///
    /// ### Returns
    /// `None` if there are no successors, or if the scaled probabilities do
    /// not reach the draw.
    pub fn lateral_type<S, R>(&self, pos: DVec3, soil: &S, rng: &mut R) -> Option<(OrganKind, SubType)>
    where
        S: SoilLookUp + ?Sized,
        R: Rng + ?Sized,
    {
        let pick = |s: &Successor| (s.kind.unwrap_or(self.kind), s.subtype);
        match self.successors.as_slice() {
            [] => None,
            [only] => Some(pick(only)),
            many => {
                let scale = soil.value(pos);
                let d: f64 = rng.random();
                let mut p = 0.0;
                for s in many {
                    p += s.probability * scale;
                    if p > d {
                        return Some(pick(s));
                    }
                }
                None
            }
        }
    }

    /// Mean maximal organ length [cm] implied by the zone lengths and branch count.
    pub fn max_length(&self) -> f64 {
        let branches = self.branch_count.mean.round().max(0.0);
        let internodes = (branches - 1.0).max(0.0);
        self.basal_zone.mean + self.apical_zone.mean + internodes * self.internode.mean
    }

    /// Derives the branch count from a maximal organ length.
    ///
    /// Parameter files often give the maximal length instead of the number
    /// of branches. The standard deviation is propagated from the other
    /// traits; when that approximation breaks down (not a number) it is set
    /// to zero.
    pub fn set_max_length(&mut self, max_length: Sampled) {
        let (lb, la, ln) = (self.basal_zone, self.apical_zone, self.internode);
        if ln.mean <= 0.0 {
            self.branch_count = Sampled::fixed(0.0);
            return;
        }

        let k = max_length.mean;
        let nob = ((k - la.mean - lb.mean) / ln.mean + 1.0).max(0.0);
        let mut nobs = (max_length.sd / k - ln.sd / ln.mean) * k / ln.mean;
        if la.mean > 0.0 {
            nobs -= (la.sd / la.mean - ln.sd / ln.mean) * la.mean / ln.mean;
        }
        if lb.mean > 0.0 {
            nobs -= (lb.sd / lb.mean - ln.sd / ln.mean) * lb.mean / ln.mean;
        }
        if !nobs.is_finite() {
            log::warn!(
                "{} (sub type {}): branch count deviation is {nobs}, using 0",
                self.name,
                self.subtype
            );
            nobs = 0.0;
        }
        self.branch_count = Sampled::new(nob, nobs.max(0.0));
    }
}

/// Parameters of one organ instance, fixed after realization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrganSpecificParameter {
    pub subtype: SubType,
    pub basal_zone: f64,
    pub apical_zone: f64,
    pub branch_count: usize,
    /// Distances between consecutive branches, `branch_count - 1` entries.
    pub internodes: Vec<f64>,
    pub growth_rate: f64,
    pub radius: f64,
    pub insertion_angle: f64,
    pub lifetime: f64,
}

impl Default for OrganSpecificParameter {
    fn default() -> Self {
        Self {
            subtype: -1,
            basal_zone: 0.0,
            apical_zone: 10.0,
            branch_count: 0,
            internodes: Vec::new(),
            growth_rate: 1.0,
            radius: 0.1,
            insertion_angle: 0.0,
            lifetime: 1.0e9,
        }
    }
}

impl OrganSpecificParameter {
    /// Maximal organ length [cm].
    pub fn max_length(&self) -> f64 {
        self.basal_zone + self.apical_zone + self.internodes.iter().sum::<f64>()
    }

    /// Lengths along the organ at which branches emerge.
    pub fn branching_points(&self) -> Vec<f64> {
        if self.branch_count == 0 {
            return Vec::new();
        }
        let mut s = self.basal_zone;
        let mut points = Vec::with_capacity(self.branch_count);
        points.push(s);
        for ln in &self.internodes {
            s += ln;
            points.push(s);
        }
        points
    }
}

/// Type-level parameters of all organ types of a plant, keyed by kind and sub type.
#[derive(Clone, Debug, Default)]
pub struct ParameterSet {
    types: HashMap<(OrganKind, SubType), OrganRandomParameter>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the parameters of `(p.kind, p.subtype)`.
    pub fn insert(&mut self, p: OrganRandomParameter) -> Option<OrganRandomParameter> {
        self.types.insert((p.kind, p.subtype), p)
    }

    pub fn get(&self, kind: OrganKind, subtype: SubType) -> Result<&OrganRandomParameter> {
        self.types
            .get(&(kind, subtype))
            .ok_or(Error::MissingParameter { kind, subtype })
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OrganRandomParameter> {
        self.types.values()
    }
}

impl FromIterator<OrganRandomParameter> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = OrganRandomParameter>>(iter: I) -> Self {
        let mut set = Self::new();
        for p in iter {
            set.insert(p);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn lateral_root() -> OrganRandomParameter {
        OrganRandomParameter {
            name: "lateral".to_string(),
            basal_zone: Sampled::new(1.0, 0.2),
            apical_zone: Sampled::new(2.0, 0.3),
            internode: Sampled::new(0.5, 0.1),
            branch_count: Sampled::new(8.0, 2.0),
            growth_rate: Sampled::new(1.5, 0.4),
            ..OrganRandomParameter::new(OrganKind::Root, 2)
        }
    }

    #[test]
    fn realize_without_deviation_reproduces_means() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let p = OrganRandomParameter {
            basal_zone: Sampled::fixed(1.0),
            apical_zone: Sampled::fixed(2.0),
            internode: Sampled::fixed(0.5),
            branch_count: Sampled::fixed(4.0),
            ..OrganRandomParameter::new(OrganKind::Root, 1)
        };
        let s = p.realize(&mut rng);

        assert_eq!(s.subtype, 1);
        assert_eq!(s.basal_zone, 1.0);
        assert_eq!(s.apical_zone, 2.0);
        assert_eq!(s.branch_count, 4);
        assert_eq!(s.internodes, vec![0.5, 0.5, 0.5]);
        assert_eq!(s.max_length(), 4.5);
        assert_eq!(s.branching_points(), vec![1.0, 1.5, 2.0, 2.5]);
    }

    #[test]
    fn realize_clamps_to_valid_domain() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let p = OrganRandomParameter {
            basal_zone: Sampled::fixed(-1.0),
            growth_rate: Sampled::fixed(-3.0),
            internode: Sampled::fixed(0.0),
            branch_count: Sampled::fixed(3.0),
            ..OrganRandomParameter::new(OrganKind::Stem, 1)
        };
        let s = p.realize(&mut rng);
        assert_eq!(s.basal_zone, 0.0);
        assert_eq!(s.growth_rate, 0.0);
        assert_eq!(s.internodes, vec![MIN_INTERNODE, MIN_INTERNODE]);

        let many = OrganRandomParameter {
            branch_count: Sampled::new(0.0, 5.0),
            ..p
        };
        for _ in 0..100 {
            let s = many.realize(&mut rng);
            assert_eq!(s.internodes.len(), s.branch_count.saturating_sub(1));
        }
    }

    #[test]
    fn realize_is_deterministic_for_a_seed() {
        let p = lateral_root();
        let a = p.realize(&mut Xoshiro256PlusPlus::seed_from_u64(11));
        let b = p.realize(&mut Xoshiro256PlusPlus::seed_from_u64(11));
        assert_eq!(a, b);
    }

    #[test]
    fn lateral_type_without_successors_is_none() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let p = lateral_root();
        assert_eq!(p.lateral_type(DVec3::ZERO, &1.0_f64, &mut rng), None);
    }

    #[test]
    fn single_successor_is_chosen_unconditionally() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let mut p = lateral_root();
        p.successors = vec![Successor::new(3, 0.01)];
        for _ in 0..20 {
            assert_eq!(
                p.lateral_type(DVec3::ZERO, &0.0_f64, &mut rng),
                Some((OrganKind::Root, 3))
            );
        }
    }

    #[test]
    fn lateral_type_frequencies_follow_probabilities() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2024);
        let mut p = lateral_root();
        p.successors = vec![Successor::new(2, 0.3), Successor::new(3, 0.7)];

        let draws = 20_000;
        let mut second = 0;
        for _ in 0..draws {
            match p.lateral_type(DVec3::ZERO, &1.0_f64, &mut rng) {
                Some((_, 2)) => {}
                Some((_, 3)) => second += 1,
                other => panic!("unexpected lateral {other:?}"),
            }
        }
        let freq = second as f64 / draws as f64;
        assert!((freq - 0.7).abs() < 0.02, "frequency {freq}");
    }

    #[test]
    fn scaled_down_probabilities_can_suppress_laterals() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(8);
        let mut p = lateral_root();
        p.successors = vec![
            Successor::new(2, 0.5),
            Successor {
                kind: Some(OrganKind::Leaf),
                ..Successor::new(1, 0.5)
            },
        ];
        assert_eq!(p.lateral_type(DVec3::ZERO, &0.0_f64, &mut rng), None);

        let mut leaves = 0;
        for _ in 0..1000 {
            if let Some((OrganKind::Leaf, 1)) = p.lateral_type(DVec3::ZERO, &1.0_f64, &mut rng) {
                leaves += 1;
            }
        }
        assert!(leaves > 400 && leaves < 600);
    }

    #[test]
    fn set_max_length_derives_branch_count() {
        let mut p = OrganRandomParameter {
            basal_zone: Sampled::fixed(1.0),
            apical_zone: Sampled::fixed(2.0),
            internode: Sampled::fixed(0.5),
            ..OrganRandomParameter::new(OrganKind::Root, 1)
        };
        p.set_max_length(Sampled::new(10.0, 1.0));
        assert_eq!(p.branch_count.mean, 15.0);
        assert!((p.branch_count.sd - 2.0).abs() < 1e-12);
        assert!((p.max_length() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_branch_deviation_is_coerced_to_zero() {
        let mut p = OrganRandomParameter {
            basal_zone: Sampled::fixed(0.0),
            apical_zone: Sampled::fixed(0.0),
            internode: Sampled::fixed(1.0),
            ..OrganRandomParameter::new(OrganKind::Root, 1)
        };
        p.set_max_length(Sampled::new(0.0, 0.0));
        assert_eq!(p.branch_count.mean, 1.0);
        assert_eq!(p.branch_count.sd, 0.0);
    }

    #[test]
    fn parameter_set_lookup() {
        let set: ParameterSet = [lateral_root(), OrganRandomParameter::new(OrganKind::Stem, 1)]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(OrganKind::Root, 2).unwrap().name, "lateral");
        assert_eq!(
            set.get(OrganKind::Leaf, 2),
            Err(Error::MissingParameter {
                kind: OrganKind::Leaf,
                subtype: 2
            })
        );
    }
}
