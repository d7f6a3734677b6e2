//! High-level simulation phases of an [`OrganTree`].
//!
//! One time step, see [`step`], looks like:
//! 1. [`OrganTree::abs2rel`]: stems and leaves switch to relative coordinates.
//! 2. [`OrganTree::simulate`]: every organ ages, elongates by its growth
//!    function and emits laterals at its branching points.
//! 3. [`OrganTree::rel2abs`]: world positions are resolved again, new nodes
//!    get their direction from the organ's tropism.
//!
//! [`step_limited`] runs the same step with the plant's total elongation
//! capped.

use crate::error::{Error, Result};
use crate::soil::SoilLookUp;
use crate::tree::OrganTree;
use crate::tropism::ons;
use crate::types::OrganId;
use glam::DVec3;
use rand::Rng;

/// Bisection steps of [`step_limited`].
const LIMIT_ITERATIONS: usize = 50;

/// Advances the tree by `dt` days. The tree is in absolute form afterwards.
pub fn step<R: Rng + ?Sized>(tree: &mut OrganTree, dt: f64, rng: &mut R) -> Result<()> {
    tree.abs2rel();
    tree.simulate(dt, rng)?;
    tree.rel2abs(dt, rng)
}

/// Advances the tree by `dt` days like [`step`], with the elongation of all
/// organs scaled down uniformly so that the total length of the plant grows
/// by at most `max_increment` [cm].
///
/// The scale is found by bisection over copies of the tree, each stepped
/// with a copy of `rng`. The tree itself is then stepped with the accepted
/// scale and `rng`, which reproduces the accepted trial.
///
/// ### Returns
/// The applied scale; 1 if the unconstrained step stays within the limit.
pub fn step_limited<R: Rng + Clone>(tree: &mut OrganTree, dt: f64, max_increment: f64, rng: &mut R) -> Result<f64> {
    let max_increment = max_increment.max(0.0);
    let before = tree.total_length();
    let increment = |scale: f64| -> Result<f64> {
        let mut trial = tree.clone();
        let mut trial_rng = rng.clone();
        trial.elongation_factor = scale;
        step(&mut trial, dt, &mut trial_rng)?;
        Ok(trial.total_length() - before)
    };

    let mut scale = 1.0;
    if increment(1.0)? > max_increment {
        let (mut lo, mut hi) = (0.0, 1.0);
        for _ in 0..LIMIT_ITERATIONS {
            let mid = 0.5 * (lo + hi);
            if increment(mid)? > max_increment {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        scale = lo;
        log::debug!("elongation limited to {max_increment} cm, scale {scale:.6}");
    }

    tree.elongation_factor = scale;
    let res = step(tree, dt, rng);
    tree.elongation_factor = 1.0;
    res.map(|_| scale)
}

impl OrganTree {
    /// Simulates all organs for `dt` days, depth first from the base organs.
    ///
    /// Each living organ ages by `dt`, lets its children grow and then
    /// elongates itself. Laterals emitted during elongation catch up the
    /// part of the step after their emergence. Dead organs only record their
    /// node count.
    pub fn simulate<R: Rng + ?Sized>(&mut self, dt: f64, rng: &mut R) -> Result<()> {
        for id in self.base_organs() {
            self.simulate_organ(id, dt, rng)?;
        }
        self.time += dt;
        Ok(())
    }

    pub(crate) fn simulate_organ<R: Rng + ?Sized>(&mut self, id: OrganId, dt: f64, rng: &mut R) -> Result<()> {
        let o = self.organ_mut(id)?;
        o.begin_step(dt);
        if !o.alive {
            return Ok(());
        }
        // children first, laterals created below only catch up
        for k in 0..self.organs[id].children.len() {
            let c = self.organs[id].children[k];
            self.simulate_organ(c, dt, rng)?;
        }
        self.elongate(id, dt, rng)
    }

    /// Grows organ `id`, already aged by `dt`, along its growth function.
    fn elongate<R: Rng + ?Sized>(&mut self, id: OrganId, dt: f64, rng: &mut R) -> Result<()> {
        let dx_min = self.type_parameter(id)?.dx_min;

        let o = &mut self.organs[id];
        // time since emergence within this step
        let mut grow_dt = dt.min(o.age);
        let lifetime = o.param().lifetime;
        if o.age > lifetime {
            grow_dt -= o.age - lifetime;
            o.age = lifetime;
            o.alive = false;
        }
        if !o.active || grow_dt <= 0.0 {
            o.active &= o.alive;
            return Ok(());
        }
        let (length, age) = (o.length, o.age);

        // age at which the current length is reached unimpeded
        let age_ = self.calc_age(id, length, dt)?;
        let dt_ = grow_dt.min(age - age_).max(0.0);
        let target = self.calc_length(id, age_ + dt_, dt)?;
        let tip = self.tip_position(id)?;
        let scale = self
            .elongation_scale
            .as_ref()
            .map_or(1.0, |g| g.value(tip))
            * self.elongation_factor;
        let dl = ((target - length) * scale).max(0.0);

        let points = self.organs[id].param().branching_points();
        let mut rest = dl;
        while let Some(&b) = points.get(self.organs[id].branch_points_passed) {
            let need = b - self.organs[id].length;
            if need > rest {
                break;
            }
            if need > 0.0 {
                self.create_segments(id, need, dt, None, rng)?;
                rest -= need;
            }
            self.organs[id].branch_points_passed += 1;
            self.create_lateral(id, dt, rng)?;
        }
        if rest > 0.0 {
            self.create_segments(id, rest, dt, None, rng)?;
        }

        let o = &mut self.organs[id];
        let k = o.param().max_length();
        // dead organs stay inert
        o.active = o.alive && o.length < k - dx_min / 10.0;
        Ok(())
    }

    fn tip_position(&self, id: OrganId) -> Result<DVec3> {
        let n = self.organ(id)?.number_of_nodes();
        if n == 0 {
            return Err(Error::NodeIndexOutOfRange {
                organ: id,
                index: 0,
                len: 0,
            });
        }
        self.world_position(id, n - 1)
    }

    /// Current growth direction at the tip of organ `id`.
    ///
    /// Offsets of relative-stored nodes created in this step are not
    /// directed yet, so the last node from before the step is used.
    fn growth_heading(&self, id: OrganId) -> DVec3 {
        let o = &self.organs[id];
        let n = o.number_of_nodes();
        if o.stored_relative(self.form) {
            let resolved = (1..n).rev().find(|&i| !o.is_new_node(i)).unwrap_or(0);
            o.heading(resolved, self.form)
        } else {
            o.heading(n.saturating_sub(1), self.form)
        }
    }

    /// Emits a lateral at the tip of organ `id`.
    ///
    /// The lateral type is diced from the successors of the organ type,
    /// scaled by the branching scale at the tip. The lateral emerges once
    /// the parent has grown its apical zone beyond this point.
    ///
    /// ### Returns
    /// The new organ, or `None` if no successor was chosen.
    fn create_lateral<R: Rng + ?Sized>(&mut self, id: OrganId, dt: f64, rng: &mut R) -> Result<Option<OrganId>> {
        let tip = self.tip_position(id)?;
        let tp = self.type_parameter(id)?;
        let choice = match &self.branching_scale {
            Some(grid) => tp.lateral_type(tip, grid, rng),
            None => tp.lateral_type(tip, &1.0_f64, rng),
        };
        let Some((kind, subtype)) = choice else {
            return Ok(None);
        };

        let o = &self.organs[id];
        let (length, la) = (o.length, o.param().apical_zone);
        let pni = o.number_of_nodes() - 1;
        let age_ln = self.calc_age(id, length, dt)?;
        let age_lg = self.calc_age(id, length + la, dt)?;
        let delay = (age_lg - age_ln).max(0.0);

        let frame = ons(self.growth_heading(id));
        let child = self.create_organ(Some((id, pni)), kind, subtype, delay, frame, rng)?;
        log::debug!("organ {id}: lateral {child} ({kind} {subtype}) emerges in {delay:.3} days");

        let catch_up = (self.organs[id].age - age_ln).max(0.0);
        self.simulate_organ(child, catch_up, rng)?;
        Ok(Some(child))
    }
}
