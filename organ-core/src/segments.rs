//! Discretization of continuous organ growth into polyline segments.
//!
//! Growth is cut into segments of the organ type's maximal length `dx`. A
//! remainder shorter than `dx_min` is not materialized; it is kept as the
//! organ's residual and added to the next growth request.

use crate::error::{Error, Result};
use crate::tree::{NodePlacement, OrganTree};
use crate::types::OrganId;
use glam::DVec3;
use rand::Rng;

/// Segments shorter than this fraction of `dx` are topped up before new
/// ones are created.
const TOP_UP_FRACTION: f64 = 0.99;

impl OrganTree {
    /// Elongates organ `id` by `l` [cm] during a step of `dt` [day].
    ///
    /// On the first call within a step the last segment is first lengthened
    /// up to `dx`, unless its end node carries a lateral and the organ keeps
    /// absolute coordinates. The rest is split into `floor(l / dx)` segments
    /// of length `dx` plus one remainder segment, which becomes the organ's
    /// residual if it is shorter than `dx_min`.
    ///
    /// ### Parameters
    /// - `id` - The growing organ.
    /// - `l` - Elongation [cm]. Zero is a no-op.
    /// - `dt` - Step size [day]; node creation times are clamped into it.
    /// - `branch` - `Some(i)` grows the internode behind the attachment of
    ///   child `i` instead of the tip; new nodes are inserted after it.
    /// - `rng` - Random source for the tropism of absolute-stored organs.
    ///
    /// ### Errors
    /// [`Error::NegativeLength`] if `l < 0`; [`Error::InvalidBranch`] if
    /// organ `id` has no child `branch`; [`Error::NodeIndexOutOfRange`] if
    /// the organ has no first node to grow from.
    pub fn create_segments<R: Rng + ?Sized>(
        &mut self,
        id: OrganId,
        l: f64,
        dt: f64,
        branch: Option<usize>,
        rng: &mut R,
    ) -> Result<()> {
        if l < 0.0 {
            return Err(Error::NegativeLength(l));
        }
        if l == 0.0 {
            log::info!("organ {id}: zero length encountered");
            return Ok(());
        }

        let tp = self.type_parameter(id)?;
        let (dx, dx_min, tropism) = (tp.dx, tp.dx_min, tp.tropism);
        let form = self.form;

        let o = &self.organs[id];
        if o.nodes.is_empty() {
            return Err(Error::NodeIndexOutOfRange {
                organ: id,
                index: 0,
                len: 0,
            });
        }
        let absolute = !o.stored_relative(form);
        let base = o.realized_length();
        let nn = match branch {
            Some(b) => {
                let c = *o.children.get(b).ok_or(Error::InvalidBranch { organ: id, branch: b })?;
                self.organs[c].parent_node_index + 1
            }
            None => o.number_of_nodes(),
        };

        let mut rest = l;
        if branch.is_none() {
            rest += o.epsilon_dx;
            self.organs[id].epsilon_dx = 0.0;
        }

        let mut shift = 0.0;
        let o = &self.organs[id];
        let top_up = (o.first_call || branch.is_some())
            && nn > 1
            && !(absolute
                && o.children
                    .iter()
                    .any(|&c| self.organs[c].parent_node_index == nn - 1));
        self.organs[id].first_call = false;

        if top_up {
            let o = &self.organs[id];
            let n1 = o.nodes[nn - 1];
            let n2 = o.nodes[nn - 2];
            let h = if absolute { n1 - n2 } else { n1 };
            let olddx = h.length();
            if olddx < TOP_UP_FRACTION * dx {
                shift = (dx - olddx).min(rest);
                let sdx = olddx + shift;
                let dir = h.normalize_or(o.iheading.x_axis);
                let ct = self.calc_creation_time(id, base + shift, dt)?;

                let o = &mut self.organs[id];
                o.nodes[nn - 1] = if absolute { n2 + dir * sdx } else { dir * sdx };
                o.node_cts[nn - 1] = ct;
                o.moved = true;
                rest -= shift;
                if rest <= 0.0 {
                    o.length += l;
                    return Ok(());
                }
            }
        }

        let n = (rest / dx).floor() as usize;
        let mut sl = 0.0;
        for i in 0..=n {
            let sdx = if i < n {
                dx
            } else {
                let last = rest - n as f64 * dx;
                if last < TOP_UP_FRACTION * dx_min {
                    if last != 0.0 {
                        log::debug!(
                            "organ {id}: increment {last} below dx_min {dx_min}, kept in memory"
                        );
                    }
                    let o = &mut self.organs[id];
                    match branch {
                        Some(_) => o.epsilon_dx += last,
                        None => o.epsilon_dx = last,
                    }
                    break;
                }
                last
            };
            sl += sdx;
            let ct = self.calc_creation_time(id, base + shift + sl, dt)?;

            let o = &self.organs[id];
            let index = match branch {
                Some(_) => nn + i,
                None => o.number_of_nodes(),
            };
            let pos = if absolute {
                let prev = o.nodes[index - 1];
                let h = o.heading(index - 1, form);
                prev + tropism.increment(prev, h, sdx, dx, o, rng)
            } else if branch.is_some() {
                o.nodes[nn - 1].normalize_or(o.iheading.x_axis) * sdx
            } else {
                DVec3::new(sdx, 0.0, 0.0)
            };
            let placement = match branch {
                Some(_) => NodePlacement::Insert(index),
                None => NodePlacement::Append,
            };
            self.add_node(id, pos, ct, placement)?;
        }

        self.organs[id].length += l;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::organ::OrganState;
    use crate::parameter::ParameterSet;
    use crate::tree::OrganTree;
    use crate::tree::tests::{organ_with_nodes, straight};
    use crate::tropism::ons;
    use crate::types::{CoordinateForm, OrganId, OrganKind};
    use glam::DVec3;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    const TOL: f64 = 1e-12;

    fn root_tree(dx_min: f64, nodes: &[DVec3]) -> (OrganTree, OrganId) {
        let mut p = straight(OrganKind::Root, 1);
        p.dx_min = dx_min;
        let mut tree = OrganTree::new([p].into_iter().collect::<ParameterSet>());
        let state = OrganState {
            age: 10.0,
            ..OrganState::default()
        };
        let mut o = organ_with_nodes(OrganKind::Root, 1, nodes, 0, 0, state);
        o.iheading = crate::tropism::ons(DVec3::NEG_Z);
        let id = tree.add_organ(None, o).unwrap();
        (tree, id)
    }

    fn segment_lengths(tree: &OrganTree, id: OrganId) -> Vec<f64> {
        let o = tree.organ(id).unwrap();
        (1..o.number_of_nodes())
            .map(|i| o.segment_vector(i, tree.form()).length())
            .collect()
    }

    #[test]
    fn remainder_above_dx_min_is_materialized() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let (mut tree, id) = root_tree(0.1, &[DVec3::ZERO]);
        tree.create_segments(id, 3.5, 1.0, None, &mut rng).unwrap();

        let lengths = segment_lengths(&tree, id);
        assert_eq!(lengths.len(), 4);
        for l in &lengths[..3] {
            assert!((l - 1.0).abs() < TOL);
        }
        assert!((lengths[3] - 0.5).abs() < TOL);
        let o = tree.organ(id).unwrap();
        assert_eq!(o.epsilon_dx(), 0.0);
        assert!((o.node(4) - DVec3::new(0.0, 0.0, -3.5)).length() < TOL);
    }

    #[test]
    fn remainder_below_dx_min_is_kept_as_residual() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let (mut tree, id) = root_tree(0.6, &[DVec3::ZERO]);
        tree.create_segments(id, 3.5, 1.0, None, &mut rng).unwrap();

        let lengths = segment_lengths(&tree, id);
        assert_eq!(lengths.len(), 3);
        let o = tree.organ(id).unwrap();
        assert!((o.epsilon_dx() - 0.5).abs() < TOL);
        assert!((o.theoretical_length() - 3.5).abs() < TOL);
        assert!((o.realized_length() - 3.0).abs() < TOL);
    }

    #[test]
    fn materialized_plus_residual_equals_request() {
        for (l, dx_min) in [(0.05, 0.1), (2.0, 0.3), (7.33, 0.5), (4.999, 0.2), (1e-3, 1e-6)] {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
            let (mut tree, id) = root_tree(dx_min, &[DVec3::ZERO]);
            tree.create_segments(id, l, 1.0, None, &mut rng).unwrap();
            let sum: f64 = segment_lengths(&tree, id).iter().sum();
            let eps = tree.organ(id).unwrap().epsilon_dx();
            assert!((sum + eps - l).abs() < 1e-9, "l={l}: {sum} + {eps}");
        }
    }

    #[test]
    fn residual_is_caught_up_later() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let (mut tree, id) = root_tree(0.6, &[DVec3::ZERO]);
        tree.create_segments(id, 0.5, 1.0, None, &mut rng).unwrap();
        assert_eq!(tree.organ(id).unwrap().number_of_nodes(), 1);

        tree.organs[id].first_call = true;
        tree.create_segments(id, 0.5, 1.0, None, &mut rng).unwrap();
        let lengths = segment_lengths(&tree, id);
        assert_eq!(lengths.len(), 1);
        assert!((lengths[0] - 1.0).abs() < TOL);
        assert_eq!(tree.organ(id).unwrap().epsilon_dx(), 0.0);
    }

    #[test]
    fn zero_is_a_no_op_and_negative_is_rejected() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(4);
        let (mut tree, id) = root_tree(0.1, &[DVec3::ZERO]);
        tree.create_segments(id, 0.0, 1.0, None, &mut rng).unwrap();
        assert_eq!(tree.organ(id).unwrap().number_of_nodes(), 1);
        assert_eq!(
            tree.create_segments(id, -1.0, 1.0, None, &mut rng),
            Err(Error::NegativeLength(-1.0))
        );
        assert_eq!(tree.organ(id).unwrap().theoretical_length(), 0.0);
    }

    #[test]
    fn short_last_segment_is_topped_up() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let (mut tree, id) = root_tree(0.1, &[DVec3::ZERO, DVec3::new(0.0, 0.0, -0.4)]);
        tree.organs[id].length = 0.4;
        tree.create_segments(id, 1.0, 1.0, None, &mut rng).unwrap();

        let o = tree.organ(id).unwrap();
        assert!(o.has_moved());
        assert!((o.node(1) - DVec3::new(0.0, 0.0, -1.0)).length() < TOL);
        let lengths = segment_lengths(&tree, id);
        assert_eq!(lengths.len(), 2);
        assert!((lengths[1] - 0.4).abs() < TOL);
        assert!((o.theoretical_length() - 1.4).abs() < TOL);
    }

    #[test]
    fn top_up_consuming_everything_creates_no_node() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let (mut tree, id) = root_tree(0.1, &[DVec3::ZERO, DVec3::new(0.0, 0.0, -0.4)]);
        tree.create_segments(id, 0.3, 1.0, None, &mut rng).unwrap();
        let o = tree.organ(id).unwrap();
        assert_eq!(o.number_of_nodes(), 2);
        assert!((o.node(1).z + 0.7).abs() < TOL);
    }

    #[test]
    fn root_does_not_move_a_lateral_base_node() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(6);
        let (mut tree, id) = root_tree(0.1, &[DVec3::ZERO, DVec3::new(0.0, 0.0, -0.4)]);
        tree.parameters.insert(straight(OrganKind::Root, 2));
        let lateral = organ_with_nodes(
            OrganKind::Root,
            2,
            &[DVec3::new(0.0, 0.0, -0.4), DVec3::new(1.0, 0.0, -0.4)],
            1,
            1,
            OrganState::default(),
        );
        tree.add_organ(Some(id), lateral).unwrap();

        tree.create_segments(id, 1.0, 1.0, None, &mut rng).unwrap();
        let o = tree.organ(id).unwrap();
        assert!(!o.has_moved());
        assert_eq!(o.node(1), DVec3::new(0.0, 0.0, -0.4));
        assert_eq!(o.number_of_nodes(), 3);
    }

    #[test]
    fn relative_organ_moves_a_lateral_base_node() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let params: ParameterSet = [straight(OrganKind::Stem, 1), straight(OrganKind::Leaf, 1)]
            .into_iter()
            .collect();
        let mut tree = OrganTree::new(params);
        let stem = organ_with_nodes(
            OrganKind::Stem,
            1,
            &[DVec3::ZERO, DVec3::Z * 0.5],
            0,
            0,
            OrganState {
                age: 2.0,
                length: 0.5,
                ..OrganState::default()
            },
        );
        let stem = tree.add_organ(None, stem).unwrap();
        let leaf = organ_with_nodes(
            OrganKind::Leaf,
            1,
            &[DVec3::Z * 0.5, DVec3::new(1.0, 0.0, 0.5)],
            1,
            1,
            OrganState::default(),
        );
        tree.add_organ(Some(stem), leaf).unwrap();
        tree.abs2rel();

        tree.create_segments(stem, 2.0, 1.0, None, &mut rng).unwrap();
        let o = tree.organ(stem).unwrap();
        assert!(o.has_moved());
        assert!((o.node(1) - DVec3::Z).length() < TOL);
        assert_eq!(o.node(2), DVec3::new(1.0, 0.0, 0.0));
        assert!((o.node(3) - DVec3::new(0.5, 0.0, 0.0)).length() < TOL);
        assert_eq!(tree.form(), CoordinateForm::Relative);
    }

    #[test]
    fn internodal_growth_inserts_behind_attachment() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(8);
        let params: ParameterSet = [straight(OrganKind::Stem, 1), straight(OrganKind::Leaf, 1)]
            .into_iter()
            .collect();
        let mut tree = OrganTree::new(params);
        let stem = organ_with_nodes(
            OrganKind::Stem,
            1,
            &[DVec3::ZERO, DVec3::Z, DVec3::Z * 2.0, DVec3::Z * 3.0],
            0,
            0,
            OrganState {
                age: 3.0,
                length: 3.0,
                ..OrganState::default()
            },
        );
        let stem = tree.add_organ(None, stem).unwrap();
        let low = organ_with_nodes(OrganKind::Leaf, 1, &[DVec3::Z, DVec3::ONE], 1, 1, OrganState::default());
        let high = organ_with_nodes(
            OrganKind::Leaf,
            1,
            &[DVec3::Z * 2.0, DVec3::new(1.0, 0.0, 2.0)],
            2,
            2,
            OrganState::default(),
        );
        let low = tree.add_organ(Some(stem), low).unwrap();
        let high = tree.add_organ(Some(stem), high).unwrap();
        tree.abs2rel();

        // internode above the first leaf: two new nodes of 1.0 and 0.5
        tree.create_segments(stem, 1.5, 1.0, Some(0), &mut rng).unwrap();
        let o = tree.organ(stem).unwrap();
        assert_eq!(o.number_of_nodes(), 6);
        assert_eq!(o.node_ids().len(), 6);
        assert_eq!(o.node_cts().len(), 6);
        assert!((o.node(2) - DVec3::Z).length() < TOL);
        assert!((o.node(3) - DVec3::Z * 0.5).length() < TOL);
        assert_eq!(tree.organ(low).unwrap().parent_node_index(), 1);
        let h = tree.organ(high).unwrap();
        assert_eq!(h.parent_node_index(), 4);
        assert_eq!(o.node_id(4), h.node_id(0));
        assert!((tree.world_position(high, 0).unwrap() - DVec3::Z * 3.5).length() < TOL);
        assert!((o.theoretical_length() - 4.5).abs() < TOL);

        assert_eq!(
            tree.create_segments(stem, 1.0, 1.0, Some(5), &mut rng),
            Err(Error::InvalidBranch {
                organ: stem,
                branch: 5
            })
        );
    }

    #[test]
    fn organ_without_nodes_cannot_grow() {
        let mut tree = OrganTree::new([straight(OrganKind::Root, 1)].into_iter().collect::<ParameterSet>());
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(4);
        let id = tree
            .create_organ(None, OrganKind::Root, 1, 0.0, ons(DVec3::NEG_Z), &mut rng)
            .unwrap();
        assert_eq!(
            tree.create_segments(id, 1.0, 1.0, None, &mut rng),
            Err(Error::NodeIndexOutOfRange {
                organ: id,
                index: 0,
                len: 0
            })
        );
        assert_eq!(tree.organ(id).unwrap().theoretical_length(), 0.0);
    }
}
