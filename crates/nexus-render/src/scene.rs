//! Display tree stored as an arena of nodes
//!
//! Nodes refer to each other by [`NodeId`]; there are no owning back pointers.
//! Detaching a node from its parent is a splice of the parent's child list.

use glam::{Affine2, Vec2};
use nexus_core::Color;
use nexus_ecs::Entity;

/// Handle to a scene node. Stale after the node is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// One drawable in the tree. Transform fields are relative to the parent.
#[derive(Debug, Clone)]
pub struct SceneNode {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    pub position: Vec2,
    /// Radians
    pub rotation: f32,
    pub scale: Vec2,
    pub color: Color,
    /// Entity this node mirrors, if any
    pub entity: Option<Entity>,
}

impl SceneNode {
    fn new() -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            position: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
            color: Color::WHITE,
            entity: None,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Transform from this node's frame to its parent's.
    pub fn local_transform(&self) -> Affine2 {
        Affine2::from_scale_angle_translation(self.scale, self.rotation, self.position)
    }
}

struct Slot {
    generation: u32,
    node: Option<SceneNode>,
}

/// Arena-backed display tree with a permanent root.
pub struct Scene {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    len: usize,
}

impl Scene {
    pub fn new() -> Self {
        let mut scene = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            len: 0,
        };
        scene.root = scene.spawn();
        scene
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Allocate a detached node.
    pub fn spawn(&mut self) -> NodeId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(SceneNode::new());
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(SceneNode::new()),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    /// Every live node, attached or not, in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (NodeId, &mut SceneNode)> + '_ {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let id = NodeId {
                index: index as u32,
                generation: slot.generation,
            };
            slot.node.as_mut().map(|node| (id, node))
        })
    }

    fn is_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        while let Some(parent) = self.get(node).and_then(|n| n.parent) {
            if parent == ancestor {
                return true;
            }
            node = parent;
        }
        false
    }

    /// Append `child` to `parent`'s children, detaching it from any previous parent
    /// first. Refuses stale ids, the root as a child, and anything that would form a
    /// cycle.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if parent == child
            || child == self.root
            || !self.contains(parent)
            || !self.contains(child)
            || self.is_ancestor(child, parent)
        {
            return false;
        }
        if let Some(previous) = self.get(child).and_then(|n| n.parent) {
            self.remove_child(previous, child);
        }
        if let Some(node) = self.get_mut(parent) {
            node.children.push(child);
        }
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
        }
        true
    }

    /// Detach `child` from `parent`. No-op unless `child` is currently a child of
    /// `parent`. The detached node stays allocated.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if self.get(child).and_then(|n| n.parent) != Some(parent) {
            return false;
        }
        if let Some(node) = self.get_mut(parent) {
            node.children.retain(|&c| c != child);
        }
        if let Some(node) = self.get_mut(child) {
            node.parent = None;
        }
        true
    }

    /// Detach `id` and free it together with all its descendants. Returns the number
    /// of freed nodes. The root is never removed.
    pub fn remove_subtree(&mut self, id: NodeId) -> usize {
        if id == self.root || !self.contains(id) {
            return 0;
        }
        if let Some(parent) = self.get(id).and_then(|n| n.parent) {
            self.remove_child(parent, id);
        }
        let mut stack = vec![id];
        let mut freed = 0;
        while let Some(next) = stack.pop() {
            let slot = &mut self.slots[next.index as usize];
            if let Some(node) = slot.node.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(next.index);
                stack.extend(node.children);
                freed += 1;
            }
        }
        self.len -= freed;
        freed
    }

    /// Transform from the node's frame to scene space.
    pub fn world_transform(&self, id: NodeId) -> Option<Affine2> {
        let mut node = self.get(id)?;
        let mut transform = node.local_transform();
        while let Some(parent) = node.parent.and_then(|p| self.get(p)) {
            transform = parent.local_transform() * transform;
            node = parent;
        }
        Some(transform)
    }

    pub fn world_position(&self, id: NodeId) -> Option<Vec2> {
        self.world_transform(id).map(|t| t.translation)
    }

    /// Every node reachable from the root with its scene-space transform, children
    /// before their parent so parents draw on top.
    pub fn draw_list(&self) -> Vec<(NodeId, Affine2)> {
        let mut out = Vec::with_capacity(self.len);
        self.collect(self.root, Affine2::IDENTITY, &mut out);
        out
    }

    fn collect(&self, id: NodeId, parent: Affine2, out: &mut Vec<(NodeId, Affine2)>) {
        let Some(node) = self.get(id) else {
            return;
        };
        let transform = parent * node.local_transform();
        for &child in &node.children {
            self.collect(child, transform, out);
        }
        out.push((id, transform));
    }

    /// Entity of the closest attached node whose scene position is within `radius`
    /// of `point`.
    pub fn pick(&self, point: Vec2, radius: f32) -> Option<Entity> {
        self.draw_list()
            .into_iter()
            .filter_map(|(id, transform)| {
                let entity = self.get(id)?.entity?;
                let distance = transform.translation.distance(point);
                (distance <= radius).then_some((entity, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(entity, _)| entity)
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn add_child_reparents() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.spawn();
        let b = scene.spawn();
        let c = scene.spawn();
        assert!(scene.add_child(root, a));
        assert!(scene.add_child(root, b));
        assert!(scene.add_child(a, c));

        assert!(scene.add_child(b, c));
        assert!(scene.get(a).unwrap().children().is_empty());
        assert_eq!(scene.get(b).unwrap().children(), &[c]);
        assert_eq!(scene.get(c).unwrap().parent(), Some(b));
    }

    #[test]
    fn cycles_and_root_moves_are_refused() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.spawn();
        let b = scene.spawn();
        scene.add_child(root, a);
        scene.add_child(a, b);
        assert!(!scene.add_child(b, a));
        assert!(!scene.add_child(a, a));
        assert!(!scene.add_child(a, root));
    }

    #[test]
    fn remove_child_requires_actual_parent() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.spawn();
        let b = scene.spawn();
        scene.add_child(root, a);
        assert!(!scene.remove_child(b, a));
        assert!(scene.remove_child(root, a));
        assert!(!scene.remove_child(root, a));
        assert!(scene.contains(a));
        assert_eq!(scene.get(a).unwrap().parent(), None);
    }

    #[test]
    fn remove_subtree_frees_descendants_and_recycles() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.spawn();
        let b = scene.spawn();
        let c = scene.spawn();
        scene.add_child(root, a);
        scene.add_child(a, b);
        scene.add_child(b, c);
        assert_eq!(scene.len(), 4);

        assert_eq!(scene.remove_subtree(a), 3);
        assert_eq!(scene.len(), 1);
        assert!(!scene.contains(c));
        assert!(scene.get(root).unwrap().children().is_empty());
        assert_eq!(scene.remove_subtree(root), 0);

        // slots come back with a new generation; old handles stay dead
        let reused = scene.spawn();
        assert_ne!(reused, a);
        assert!(!scene.contains(a));
        assert!(scene.contains(reused));
    }

    #[test]
    fn world_position_composes_parents() {
        let mut scene = Scene::new();
        let root = scene.root();
        let ship = scene.spawn();
        let gun = scene.spawn();
        scene.add_child(root, ship);
        scene.add_child(ship, gun);
        {
            let node = scene.get_mut(ship).unwrap();
            node.position = Vec2::new(10.0, 0.0);
            node.rotation = FRAC_PI_2;
        }
        scene.get_mut(gun).unwrap().position = Vec2::new(5.0, 0.0);

        let world = scene.world_position(gun).unwrap();
        assert!((world - Vec2::new(10.0, 5.0)).length() < 1e-4);
    }

    #[test]
    fn draw_list_puts_children_first() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.spawn();
        let b = scene.spawn();
        let orphan = scene.spawn();
        scene.add_child(root, a);
        scene.add_child(a, b);

        let order: Vec<NodeId> = scene.draw_list().into_iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![b, a, root]);
        assert!(!order.contains(&orphan));
    }

    #[test]
    fn pick_returns_closest_entity() {
        let mut scene = Scene::new();
        let root = scene.root();
        let near = scene.spawn();
        let far = scene.spawn();
        scene.add_child(root, near);
        scene.add_child(root, far);
        let (e_near, e_far) = (Entity::from_raw(0, 0), Entity::from_raw(1, 0));
        {
            let node = scene.get_mut(near).unwrap();
            node.position = Vec2::new(1.0, 0.0);
            node.entity = Some(e_near);
        }
        {
            let node = scene.get_mut(far).unwrap();
            node.position = Vec2::new(4.0, 0.0);
            node.entity = Some(e_far);
        }
        assert_eq!(scene.pick(Vec2::ZERO, 5.0), Some(e_near));
        assert_eq!(scene.pick(Vec2::new(5.0, 0.0), 2.0), Some(e_far));
        assert_eq!(scene.pick(Vec2::new(50.0, 0.0), 2.0), None);
    }
}
