use crate::config::{BaseOrgan, Config};
use crate::error::{Error, Result};
use crate::growth::GrowthContext;
use crate::organ::{Organ, OrganState};
use crate::parameter::{OrganRandomParameter, ParameterSet};
use crate::soil::DepthGrid;
use crate::tropism::ons;
use crate::types::{CoordinateForm, NodeId, OrganId, OrganKind, SubType};
use glam::{DMat3, DVec3};
use rand::Rng;
use std::collections::HashMap;
use std::f64::consts::TAU;

/// Where [`OrganTree::add_node`] puts a new node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodePlacement {
    /// After the current last node.
    Append,
    /// At the given index, shifting the following nodes (internodal growth).
    Insert(usize),
}

/// Arena of all organs of one plant.
///
/// Organs are stored by id; parents and children refer to each other by id
/// only. The tree also plays the organism's part towards its organs: it hands
/// out global node ids, holds the type-level parameters and the scale fields
/// of the environment.
#[derive(Clone, Debug)]
pub struct OrganTree {
    pub(crate) organs: Vec<Organ>,
    pub parameters: ParameterSet,
    /// Scales the probability that a lateral emerges at a branching point.
    pub branching_scale: Option<DepthGrid>,
    /// Scales the elongation of an organ at its tip.
    pub elongation_scale: Option<DepthGrid>,
    /// Uniform factor on the elongation of all organs, see
    /// [`crate::phases::step_limited`].
    pub(crate) elongation_factor: f64,
    pub(crate) external_increments: HashMap<OrganId, f64>,
    pub(crate) form: CoordinateForm,
    pub(crate) time: f64,
    next_node_id: NodeId,
}

impl OrganTree {
    pub fn new(parameters: ParameterSet) -> Self {
        Self {
            organs: Vec::new(),
            parameters,
            branching_scale: None,
            elongation_scale: None,
            elongation_factor: 1.0,
            external_increments: HashMap::new(),
            form: CoordinateForm::Absolute,
            time: 0.0,
            next_node_id: 0,
        }
    }

    /// Creates the base organs listed in `config`.
    ///
    /// ### Returns
    /// The ids of the new organs, in the order of `config.base_organs`.
    pub fn initialize<R: Rng + ?Sized>(&mut self, config: &Config, rng: &mut R) -> Result<Vec<OrganId>> {
        config
            .base_organs
            .iter()
            .map(|base| self.add_base_organ(base, rng))
            .collect()
    }

    /// Creates a parentless organ with a single node at `base.position`.
    pub fn add_base_organ<R: Rng + ?Sized>(&mut self, base: &BaseOrgan, rng: &mut R) -> Result<OrganId> {
        let frame = ons(DVec3::from_array(base.heading));
        let id = self.create_organ(None, base.kind, base.subtype, base.delay, frame, rng)?;
        let node_id = self.next_node_id();
        let form = self.form;
        let organ = &mut self.organs[id];
        organ.push_node(DVec3::from_array(base.position), node_id, base.delay);
        if organ.stored_relative(form) {
            organ.nodes[0] = DVec3::ZERO;
        }
        Ok(id)
    }

    /// Creates an organ from its type-level parameters.
    ///
    /// The organ-specific parameters are realized with `rng` and the organ
    /// starts at age `-delay`. A lateral (`parent` is `Some((parent, node))`)
    /// gets its first node at the parent's node, sharing its node id, with
    /// creation time `parent ct + delay`; its initial heading is `frame`
    /// spun by a random angle around the parent heading and tilted by the
    /// realized insertion angle. A base organ gets `frame` as initial heading
    /// and no nodes.
    pub fn create_organ<R: Rng + ?Sized>(
        &mut self,
        parent: Option<(OrganId, usize)>,
        kind: OrganKind,
        subtype: SubType,
        delay: f64,
        frame: DMat3,
        rng: &mut R,
    ) -> Result<OrganId> {
        let param = self.parameters.get(kind, subtype)?.realize(rng);
        let state = OrganState {
            age: -delay,
            ..OrganState::default()
        };

        let Some((pid, pni)) = parent else {
            return self.add_organ(None, Organ::new(kind, param, frame, 0).with_state(state));
        };

        let p = self.organ(pid)?;
        if pni >= p.number_of_nodes() {
            return Err(Error::NodeIndexOutOfRange {
                organ: pid,
                index: pni,
                len: p.number_of_nodes(),
            });
        }
        let node_id = p.node_id(pni);
        let ct = p.node_ct(pni) + delay;

        let beta = rng.random::<f64>() * TAU;
        let iheading =
            frame * DMat3::from_rotation_x(beta) * DMat3::from_rotation_z(param.insertion_angle);
        let mut organ = Organ::new(kind, param, iheading, pni).with_state(state);
        let pos = if organ.stored_relative(self.form) {
            DVec3::ZERO
        } else {
            self.world_position(pid, pni)?
        };
        organ.push_node(pos, node_id, ct);
        self.add_organ(Some(pid), organ)
    }

    /// Adds a fully specified organ and returns its id.
    ///
    /// Children listed in `organ` are dropped; attach them with
    /// [`OrganTree::add_child`] once they are part of the tree.
    pub fn add_organ(&mut self, parent: Option<OrganId>, mut organ: Organ) -> Result<OrganId> {
        if let Some(p) = parent {
            self.organ(p)?;
        }
        let id = self.organs.len();
        organ.id = id;
        organ.parent = None;
        organ.children.clear();
        if let Some(&max) = organ.node_ids.iter().max() {
            self.next_node_id = self.next_node_id.max(max + 1);
        }
        self.organs.push(organ);
        if let Some(p) = parent {
            self.add_child(p, id)?;
        }
        Ok(id)
    }

    /// Appends `child` to the children of `parent` and points it back.
    pub fn add_child(&mut self, parent: OrganId, child: OrganId) -> Result<()> {
        let len = self.organ(parent)?.number_of_nodes();
        let pni = self.organ(child)?.parent_node_index;
        if pni >= len {
            return Err(Error::NodeIndexOutOfRange {
                organ: parent,
                index: pni,
                len,
            });
        }
        self.organs[parent].children.push(child);
        self.organs[child].parent = Some(parent);
        Ok(())
    }

    /// Adds a node with a fresh global id to organ `id`. The node counts as
    /// new until the organ's next step begins.
    ///
    /// Inserting keeps the child attachments pointing at the same nodes:
    /// children attached at `index` or beyond move up by one.
    pub fn add_node(&mut self, id: OrganId, pos: DVec3, ct: f64, placement: NodePlacement) -> Result<NodeId> {
        let len = self.organ(id)?.number_of_nodes();
        let node_id = self.next_node_id;
        match placement {
            NodePlacement::Append => {
                self.next_node_id += 1;
                self.organs[id].push_node(pos, node_id, ct);
            }
            NodePlacement::Insert(index) => {
                if index == 0 || index > len {
                    return Err(Error::NodeIndexOutOfRange {
                        organ: id,
                        index,
                        len,
                    });
                }
                self.next_node_id += 1;
                self.organs[id].insert_node(index, pos, node_id, ct);
                for k in 0..self.organs[id].children.len() {
                    let c = self.organs[id].children[k];
                    let child = &mut self.organs[c];
                    if child.parent_node_index >= index {
                        child.parent_node_index += 1;
                    }
                }
            }
        }
        self.organs[id].new_node_ids.push(node_id);
        Ok(node_id)
    }

    /// Returns a fresh global node id.
    pub fn next_node_id(&mut self) -> NodeId {
        let id = self.next_node_id;
        self.next_node_id += 1;
        id
    }

    /// Number of global node ids handed out so far.
    pub fn number_of_node_ids(&self) -> usize {
        self.next_node_id
    }

    pub fn organ(&self, id: OrganId) -> Result<&Organ> {
        self.organs.get(id).ok_or(Error::UnknownOrgan(id))
    }

    pub(crate) fn organ_mut(&mut self, id: OrganId) -> Result<&mut Organ> {
        self.organs.get_mut(id).ok_or(Error::UnknownOrgan(id))
    }

    pub fn len(&self) -> usize {
        self.organs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.organs.is_empty()
    }

    /// All organs in id order, including those without segments.
    pub fn iter(&self) -> impl Iterator<Item = &Organ> {
        self.organs.iter()
    }

    /// Ids of the organs without a parent.
    pub fn base_organs(&self) -> Vec<OrganId> {
        self.organs
            .iter()
            .filter(|o| o.parent.is_none())
            .map(|o| o.id)
            .collect()
    }

    pub fn form(&self) -> CoordinateForm {
        self.form
    }

    /// Simulated time [day].
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Organs with at least one segment, depth first from the base organs.
    ///
    /// ### Parameters
    /// - `kind` - Only organs of this kind, or all organs if `None`.
    pub fn organs(&self, kind: Option<OrganKind>) -> Vec<&Organ> {
        let mut v = Vec::new();
        for id in self.base_organs() {
            self.collect_organs(id, kind, &mut v);
        }
        v
    }

    fn collect_organs<'a>(&'a self, id: OrganId, kind: Option<OrganKind>, v: &mut Vec<&'a Organ>) {
        let o = &self.organs[id];
        if o.number_of_nodes() > 1 && kind.is_none_or(|k| k == o.kind()) {
            v.push(o);
        }
        for &c in &o.children {
            self.collect_organs(c, kind, v);
        }
    }

    /// World position of node `i` of organ `id`, whatever form the tree is in.
    pub fn world_position(&self, id: OrganId, i: usize) -> Result<DVec3> {
        let o = self.organ(id)?;
        if i >= o.number_of_nodes() {
            return Err(Error::NodeIndexOutOfRange {
                organ: id,
                index: i,
                len: o.number_of_nodes(),
            });
        }
        if !o.stored_relative(self.form) {
            return Ok(o.nodes[i]);
        }
        let base = self.relative_origin(o)?;
        Ok(base + o.nodes[1..=i].iter().sum::<DVec3>())
    }

    /// World positions of all nodes of organ `id`.
    pub fn world_nodes(&self, id: OrganId) -> Result<Vec<DVec3>> {
        let o = self.organ(id)?;
        if !o.stored_relative(self.form) || o.nodes.is_empty() {
            return Ok(o.nodes.clone());
        }
        let mut p = self.relative_origin(o)?;
        let mut v = Vec::with_capacity(o.nodes.len());
        v.push(p);
        for offset in &o.nodes[1..] {
            p += *offset;
            v.push(p);
        }
        Ok(v)
    }

    fn relative_origin(&self, o: &Organ) -> Result<DVec3> {
        match o.parent {
            Some(p) => self.world_position(p, o.parent_node_index),
            None => Ok(o.anchor),
        }
    }

    /// Sum of the theoretical lengths of all organs [cm].
    pub fn total_length(&self) -> f64 {
        self.organs.iter().map(|o| o.length).sum()
    }

    /// Number of ancestors of organ `id`; base organs have order 0.
    pub fn order(&self, id: OrganId) -> Result<usize> {
        let mut o = self.organ(id)?;
        let mut order = 0;
        while let Some(p) = o.parent {
            o = self.organ(p)?;
            order += 1;
        }
        Ok(order)
    }

    /// Number of children of organ `id` that have emerged (age > 0).
    pub fn number_of_laterals(&self, id: OrganId) -> Result<usize> {
        let o = self.organ(id)?;
        Ok(o.children
            .iter()
            .filter(|&&c| self.organs[c].age() > 0.0)
            .count())
    }

    /// Named scalar of organ `id`, see [`Organ::parameter`].
    ///
    /// Adds the properties that need the tree: `order`, `numberOfLaterals`,
    /// `dx` and `dxMin`.
    pub fn parameter(&self, id: OrganId, name: &str) -> Result<Option<f64>> {
        let v = match name {
            "order" => Some(self.order(id)? as f64),
            "numberOfLaterals" => Some(self.number_of_laterals(id)? as f64),
            "dx" => Some(self.type_parameter(id)?.dx),
            "dxMin" => Some(self.type_parameter(id)?.dx_min),
            _ => self.organ(id)?.parameter(name),
        };
        Ok(v)
    }

    /// Replaces the per-organ length increments read by the carbon-limited
    /// growth function. Call once per step before simulating.
    pub fn set_external_increments(&mut self, increments: HashMap<OrganId, f64>) {
        self.external_increments = increments;
    }

    /// Type-level parameters of organ `id`.
    pub fn type_parameter(&self, id: OrganId) -> Result<&OrganRandomParameter> {
        let o = self.organ(id)?;
        self.parameters.get(o.kind(), o.param().subtype)
    }

    fn growth_context(&self, o: &Organ, dt: f64) -> GrowthContext<'_> {
        GrowthContext {
            organ: o.id,
            length: o.length,
            age: o.age,
            dt,
            increments: &self.external_increments,
        }
    }

    /// Length [cm] organ `id` reaches at age `age`, by its growth function.
    pub fn calc_length(&self, id: OrganId, age: f64, dt: f64) -> Result<f64> {
        let o = self.organ(id)?;
        let tp = self.type_parameter(id)?;
        let p = o.param();
        tp.growth
            .length_at(age, p.growth_rate, p.max_length(), &self.growth_context(o, dt))
    }

    /// Age [day] at which organ `id` reaches length `length`, by its growth function.
    pub fn calc_age(&self, id: OrganId, length: f64, dt: f64) -> Result<f64> {
        let o = self.organ(id)?;
        let tp = self.type_parameter(id)?;
        let p = o.param();
        tp.growth
            .age_at(length, p.growth_rate, p.max_length(), &self.growth_context(o, dt))
    }

    /// Simulation time at which organ `id` reached length `length`.
    ///
    /// The unimpeded age at that length is clamped into the last step
    /// `[age - dt, age]`.
    pub fn calc_creation_time(&self, id: OrganId, length: f64, dt: f64) -> Result<f64> {
        let age_ = self.calc_age(id, length.max(0.0), dt)?;
        let o = &self.organs[id];
        let a = age_.max(o.age - dt).min(o.age);
        Ok(a + o.node_cts.first().copied().unwrap_or(0.0))
    }

    /// Deep copies the subtree rooted at `id` into `target`.
    ///
    /// The copy becomes a base organ of `target`; its descendants keep their
    /// structure, node ids and state. Node positions are stored in the form
    /// of `target`, whatever form `self` is in.
    ///
    /// ### Returns
    /// The id of the copied root organ in `target`.
    pub fn copy_subtree(&self, id: OrganId, target: &mut OrganTree) -> Result<OrganId> {
        let o = self.organ(id)?;
        let mut copy = o.clone();
        copy.nodes = self.world_nodes(id)?;
        if let Some(&first) = copy.nodes.first() {
            copy.anchor = first;
        }
        if copy.stored_relative(target.form) {
            for j in (1..copy.nodes.len()).rev() {
                let prev = copy.nodes[j - 1];
                copy.nodes[j] -= prev;
            }
            if let Some(n) = copy.nodes.first_mut() {
                *n = DVec3::ZERO;
            }
        }
        let new_id = target.add_organ(None, copy)?;
        for &c in &o.children {
            let cid = self.copy_subtree(c, target)?;
            target.add_child(new_id, cid)?;
        }
        Ok(new_id)
    }
}
