use crate::parameter::OrganSpecificParameter;
use crate::types::{CoordinateForm, NodeId, OrganId, OrganKind};
use glam::{DMat3, DVec3};
use std::f64::consts::PI;
use std::fmt;

/// Scalar state of an organ, used to restore an organ from stored data.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrganState {
    pub alive: bool,
    pub active: bool,
    /// Age [day]; negative before emergence.
    pub age: f64,
    /// Theoretical length [cm].
    pub length: f64,
    pub moved: bool,
    pub old_number_of_nodes: usize,
    /// Growth not yet materialized as a segment [cm].
    pub epsilon_dx: f64,
    /// Number of branching points the organ has grown past.
    pub branch_points_passed: usize,
}

impl Default for OrganState {
    fn default() -> Self {
        Self {
            alive: true,
            active: true,
            age: 0.0,
            length: 0.0,
            moved: false,
            old_number_of_nodes: 0,
            epsilon_dx: 0.0,
            branch_points_passed: 0,
        }
    }
}

/// One organ (root, stem or leaf) of an [`crate::tree::OrganTree`].
///
/// The organ's geometry is a polyline of nodes. Node positions, global node
/// ids and creation times are kept in three index-aligned buffers. Nodes are
/// never removed.
#[derive(Clone, Debug)]
pub struct Organ {
    pub(crate) id: OrganId,
    kind: OrganKind,
    param: OrganSpecificParameter,
    pub(crate) parent: Option<OrganId>,
    pub(crate) children: Vec<OrganId>,
    pub(crate) parent_node_index: usize,

    pub(crate) nodes: Vec<DVec3>,
    pub(crate) node_ids: Vec<NodeId>,
    pub(crate) node_cts: Vec<f64>,

    pub(crate) alive: bool,
    pub(crate) active: bool,
    pub(crate) age: f64,
    pub(crate) length: f64,
    pub(crate) moved: bool,
    pub(crate) old_number_of_nodes: usize,
    pub(crate) epsilon_dx: f64,
    pub(crate) branch_points_passed: usize,
    pub(crate) first_call: bool,
    /// Global ids of the nodes added in the current step.
    pub(crate) new_node_ids: Vec<NodeId>,
    pub(crate) iheading: DMat3,
    /// World position of node 0 while the organ is stored relative.
    pub(crate) anchor: DVec3,
}

impl Organ {
    /// Creates an organ without nodes.
    ///
    /// The organ gets its id when it is added to a tree, see
    /// [`crate::tree::OrganTree::add_organ`].
    ///
    /// ### Parameters
    /// - `kind` - Organ kind.
    /// - `param` - The organ's own parameters.
    /// - `iheading` - Initial frame; its first column is the initial growth direction.
    /// - `parent_node_index` - Index of the parent node this organ emerges from.
    pub fn new(
        kind: OrganKind,
        param: OrganSpecificParameter,
        iheading: DMat3,
        parent_node_index: usize,
    ) -> Self {
        Self {
            id: 0,
            kind,
            param,
            parent: None,
            children: Vec::new(),
            parent_node_index,
            nodes: Vec::new(),
            node_ids: Vec::new(),
            node_cts: Vec::new(),
            alive: true,
            active: true,
            age: 0.0,
            length: 0.0,
            moved: false,
            old_number_of_nodes: 0,
            epsilon_dx: 0.0,
            branch_points_passed: 0,
            first_call: true,
            new_node_ids: Vec::new(),
            iheading,
            anchor: DVec3::ZERO,
        }
    }

    pub fn with_state(mut self, state: OrganState) -> Self {
        self.alive = state.alive;
        self.active = state.active;
        self.age = state.age;
        self.length = state.length;
        self.moved = state.moved;
        self.old_number_of_nodes = state.old_number_of_nodes;
        self.epsilon_dx = state.epsilon_dx;
        self.branch_points_passed = state.branch_points_passed;
        self
    }

    pub fn state(&self) -> OrganState {
        OrganState {
            alive: self.alive,
            active: self.active,
            age: self.age,
            length: self.length,
            moved: self.moved,
            old_number_of_nodes: self.old_number_of_nodes,
            epsilon_dx: self.epsilon_dx,
            branch_points_passed: self.branch_points_passed,
        }
    }

    /// Appends a node to the end of the organ.
    pub fn push_node(&mut self, pos: DVec3, node_id: NodeId, ct: f64) {
        if self.nodes.is_empty() {
            self.anchor = pos;
        }
        self.nodes.push(pos);
        self.node_ids.push(node_id);
        self.node_cts.push(ct);
    }

    pub(crate) fn insert_node(&mut self, index: usize, pos: DVec3, node_id: NodeId, ct: f64) {
        self.nodes.insert(index, pos);
        self.node_ids.insert(index, node_id);
        self.node_cts.insert(index, ct);
    }

    /// Start-of-step bookkeeping: remembers the node count, clears the moved
    /// flag and the new nodes, and ages the organ if it is alive.
    pub(crate) fn begin_step(&mut self, dt: f64) {
        self.old_number_of_nodes = self.nodes.len();
        self.moved = false;
        self.first_call = true;
        self.new_node_ids.clear();
        if self.alive {
            self.age += dt;
        }
    }

    pub fn id(&self) -> OrganId {
        self.id
    }

    pub fn kind(&self) -> OrganKind {
        self.kind
    }

    pub fn param(&self) -> &OrganSpecificParameter {
        &self.param
    }

    pub fn parent(&self) -> Option<OrganId> {
        self.parent
    }

    pub fn children(&self) -> &[OrganId] {
        &self.children
    }

    pub fn parent_node_index(&self) -> usize {
        self.parent_node_index
    }

    pub fn nodes(&self) -> &[DVec3] {
        &self.nodes
    }

    pub fn node(&self, i: usize) -> DVec3 {
        self.nodes[i]
    }

    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }

    pub fn node_id(&self, i: usize) -> NodeId {
        self.node_ids[i]
    }

    pub fn node_cts(&self) -> &[f64] {
        &self.node_cts
    }

    pub fn node_ct(&self, i: usize) -> f64 {
        self.node_cts[i]
    }

    pub fn number_of_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn number_of_segments(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn age(&self) -> f64 {
        self.age
    }

    pub fn has_moved(&self) -> bool {
        self.moved
    }

    pub fn old_number_of_nodes(&self) -> usize {
        self.old_number_of_nodes
    }

    /// `true` if node `i` was added in the current step, appended or inserted.
    pub fn is_new_node(&self, i: usize) -> bool {
        self.new_node_ids.contains(&self.node_ids[i])
    }

    pub fn epsilon_dx(&self) -> f64 {
        self.epsilon_dx
    }

    pub fn initial_heading(&self) -> DMat3 {
        self.iheading
    }

    /// Length as if the organ were discretized without minimal resolution [cm].
    pub fn theoretical_length(&self) -> f64 {
        self.length
    }

    /// Length of the materialized segments [cm]: the theoretical length minus
    /// the residual that is still below the minimal resolution.
    pub fn realized_length(&self) -> f64 {
        self.length - self.epsilon_dx
    }

    /// `true` if node `i` holds the offset from node `i - 1` under `form`.
    pub(crate) fn stored_relative(&self, form: CoordinateForm) -> bool {
        form == CoordinateForm::Relative && !self.kind.stores_absolute()
    }

    /// Vector of the segment ending in node `i` (`i >= 1`).
    pub fn segment_vector(&self, i: usize, form: CoordinateForm) -> DVec3 {
        if self.stored_relative(form) {
            self.nodes[i]
        } else {
            self.nodes[i] - self.nodes[i - 1]
        }
    }

    /// Length from node 0 up to node `i` [cm].
    pub fn length_to_node(&self, i: usize, form: CoordinateForm) -> f64 {
        let end = i.min(self.nodes.len().saturating_sub(1));
        (1..=end)
            .map(|j| self.segment_vector(j, form).length())
            .sum()
    }

    /// Heading of the segment ending in node `n`, or the initial heading for
    /// node 0 and organs without segments.
    pub fn heading(&self, n: usize, form: CoordinateForm) -> DVec3 {
        if n > 0 && n < self.nodes.len() {
            let h = self.segment_vector(n, form).normalize_or_zero();
            if h != DVec3::ZERO {
                return h;
            }
        }
        self.iheading.x_axis
    }

    /// Segments as pairs of global node ids.
    pub fn segments(&self) -> Vec<(NodeId, NodeId)> {
        self.node_ids.windows(2).map(|w| (w[0], w[1])).collect()
    }

    /// Volume of the realized organ, a cylinder [cm³].
    pub fn volume(&self) -> f64 {
        PI * self.param.radius * self.param.radius * self.realized_length()
    }

    /// Lateral surface of the realized organ [cm²].
    pub fn surface(&self) -> f64 {
        2.0 * PI * self.param.radius * self.realized_length()
    }

    /// Looks up a scalar property by name, for post processing.
    ///
    /// Returns `None` for unknown names.
    pub fn parameter(&self, name: &str) -> Option<f64> {
        let p = &self.param;
        let v = match name {
            "id" => self.id as f64,
            "organType" => self.kind.code() as f64,
            "subType" | "type" => p.subtype as f64,
            "alive" => bool_value(self.alive),
            "active" => bool_value(self.active),
            "age" => self.age,
            "length" => self.realized_length(),
            "lengthTh" => self.theoretical_length(),
            "epsilonDx" => self.epsilon_dx,
            "volume" => self.volume(),
            "surface" => self.surface(),
            "radius" | "a" => p.radius,
            "diameter" => 2.0 * p.radius,
            "r" => p.growth_rate,
            "k" => p.max_length(),
            "lb" => p.basal_zone,
            "la" => p.apical_zone,
            "nob" => p.branch_count as f64,
            "theta" => p.insertion_angle,
            "rlt" => p.lifetime,
            "lnMean" => mean(&p.internodes)?,
            "parentNI" => self.parent_node_index as f64,
            "numberOfNodes" => self.nodes.len() as f64,
            "numberOfSegments" => self.number_of_segments() as f64,
            "numberOfChildren" => self.children.len() as f64,
            "hasMoved" => bool_value(self.moved),
            "oldNumberOfNodes" => self.old_number_of_nodes as f64,
            "creationTime" => *self.node_cts.first()?,
            "iHeadingX" => self.iheading.x_axis.x,
            "iHeadingY" => self.iheading.x_axis.y,
            "iHeadingZ" => self.iheading.x_axis.z,
            "one" => 1.0,
            _ => return None,
        };
        Some(v)
    }
}

fn bool_value(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

fn mean(v: &[f64]) -> Option<f64> {
    if v.is_empty() {
        None
    } else {
        Some(v.iter().sum::<f64>() / v.len() as f64)
    }
}

impl fmt::Display for Organ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} #{}: sub type {}, realized length {:.3} cm, theoretical length {:.3} cm, \
             age {:.3} days, alive {}, active {}, {} nodes, {} children",
            self.kind,
            self.id,
            self.param.subtype,
            self.realized_length(),
            self.theoretical_length(),
            self.age,
            self.alive,
            self.active,
            self.nodes.len(),
            self.children.len()
        )
    }
}
