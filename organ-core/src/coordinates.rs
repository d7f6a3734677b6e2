//! Whole-tree conversion between absolute and relative node coordinates.
//!
//! Stems and leaves grow in relative form: each node holds the vector from
//! its predecessor and node 0 is zero. This way a node that moves (e.g. by
//! internodal growth) drags everything above it along. Roots always keep
//! absolute coordinates; they are only translated to their attachment point.

use crate::error::Result;
use crate::tree::OrganTree;
use crate::types::{CoordinateForm, OrganId, OrganKind};
use glam::DVec3;
use rand::Rng;

impl OrganTree {
    /// Resolves relative node coordinates to world positions.
    ///
    /// Organs are visited depth first, parents before their children, so
    /// each node 0 can be placed on the already resolved parent node. The
    /// direction of node `i` is diced anew by the organ's tropism if any of
    /// these holds, otherwise its stored offset is reused:
    /// - the node was created in the last step, appended or inserted,
    /// - the tropism is age dependent and the organ passed its switch age
    ///   within the last `dt`,
    /// - the organ is a living, active stem.
    ///
    /// Does nothing if the tree is already in absolute form.
    pub fn rel2abs<R: Rng + ?Sized>(&mut self, dt: f64, rng: &mut R) -> Result<()> {
        if self.form == CoordinateForm::Absolute {
            return Ok(());
        }
        // parents are resolved before their children read them
        self.form = CoordinateForm::Absolute;
        for id in self.base_organs() {
            self.rel2abs_organ(id, dt, rng)?;
        }
        Ok(())
    }

    fn rel2abs_organ<R: Rng + ?Sized>(&mut self, id: OrganId, dt: f64, rng: &mut R) -> Result<()> {
        let o = &self.organs[id];
        let origin = match o.parent {
            Some(p) => self.organs[p].nodes[o.parent_node_index],
            None => o.anchor,
        };

        if o.kind().stores_absolute() {
            if let Some(&first) = o.nodes.first() {
                let shift = origin - first;
                if shift != DVec3::ZERO {
                    for n in &mut self.organs[id].nodes {
                        *n += shift;
                    }
                }
            }
        } else if !o.nodes.is_empty() {
            let tp = self.type_parameter(id)?;
            let (tropism, dx) = (tp.tropism, tp.dx);
            let o = &self.organs[id];
            let switched = o.alive
                && tropism.is_age_dependent()
                && o.age - dt <= tropism.age_switch
                && tropism.age_switch <= o.age;
            let active_stem = o.kind() == OrganKind::Stem && o.alive && o.active;

            self.organs[id].nodes[0] = origin;
            for i in 1..self.organs[id].nodes.len() {
                let o = &self.organs[id];
                let prev = o.nodes[i - 1];
                let offset = o.nodes[i];
                let step = if o.is_new_node(i) || switched || active_stem {
                    let h = o.heading(i - 1, CoordinateForm::Absolute);
                    tropism.increment(prev, h, offset.length(), dx, o, rng)
                } else {
                    offset
                };
                self.organs[id].nodes[i] = prev + step;
            }
        }

        for k in 0..self.organs[id].children.len() {
            let c = self.organs[id].children[k];
            self.rel2abs_organ(c, dt, rng)?;
        }
        Ok(())
    }

    /// Converts the nodes of stems and leaves to offsets from their
    /// predecessors, the inverse of [`OrganTree::rel2abs`] for reused offsets.
    ///
    /// Does nothing if the tree is already in relative form.
    pub fn abs2rel(&mut self) {
        if self.form == CoordinateForm::Relative {
            return;
        }
        for id in self.base_organs() {
            self.abs2rel_organ(id);
        }
        self.form = CoordinateForm::Relative;
    }

    fn abs2rel_organ(&mut self, id: OrganId) {
        let o = &mut self.organs[id];
        if !o.kind().stores_absolute() && !o.nodes.is_empty() {
            o.anchor = o.nodes[0];
            // backwards, so each predecessor is still absolute when read
            for j in (1..o.nodes.len()).rev() {
                let prev = o.nodes[j - 1];
                o.nodes[j] -= prev;
            }
            o.nodes[0] = DVec3::ZERO;
        }
        for k in 0..self.organs[id].children.len() {
            let c = self.organs[id].children[k];
            self.abs2rel_organ(c);
        }
    }
}
