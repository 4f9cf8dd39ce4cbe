//! Keeps the display tree in step with entities that carry a visual component.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use nexus_core::Position;
use nexus_ecs::{Component, ComponentStore, Entity, NexusEvent, NexusEventListener};
use parking_lot::Mutex;
use tracing::trace;

use crate::scene::{NodeId, Scene, SceneNode};

/// A component that is drawn as a scene node.
pub trait Visual: Component {
    /// Style a node created for this component.
    fn apply(&self, node: &mut SceneNode);
}

/// Event listener that creates a scene node when a `D` is attached and removes it
/// when the `D` is detached or its entity destroyed.
///
/// The removed component is already gone when `ComponentRemoved` arrives, so the
/// mirror remembers which node it created for each entity.
pub struct SceneMirror<D> {
    scene: Arc<Mutex<Scene>>,
    parent: NodeId,
    nodes: HashMap<Entity, NodeId>,
    _marker: PhantomData<fn() -> D>,
}

impl<D: Visual> SceneMirror<D> {
    /// Mirror under the scene root.
    pub fn new(scene: Arc<Mutex<Scene>>) -> Self {
        let parent = scene.lock().root();
        Self::under(scene, parent)
    }

    /// Mirror under a specific layer node.
    pub fn under(scene: Arc<Mutex<Scene>>, parent: NodeId) -> Self {
        Self {
            scene,
            parent,
            nodes: HashMap::new(),
            _marker: PhantomData,
        }
    }

    fn added(&mut self, entity: Entity, components: &ComponentStore) {
        let Some(visual) = components.get::<D>(entity) else {
            return;
        };
        let mut scene = self.scene.lock();
        let id = scene.spawn();
        if let Some(node) = scene.get_mut(id) {
            visual.apply(node);
            node.entity = Some(entity);
            if let Some(position) = components.get::<Position>(entity) {
                node.position = position.position;
                node.rotation = position.rotation;
            }
        }
        scene.add_child(self.parent, id);
        if let Some(stale) = self.nodes.insert(entity, id) {
            scene.remove_subtree(stale);
        }
        trace!(%entity, ?id, "scene node created");
    }

    fn removed(&mut self, entity: Entity) {
        if let Some(id) = self.nodes.remove(&entity) {
            self.scene.lock().remove_subtree(id);
            trace!(%entity, ?id, "scene node removed");
        }
    }
}

impl<D: Visual> NexusEventListener for SceneMirror<D> {
    fn on_event(&mut self, event: &NexusEvent, components: &ComponentStore) {
        match *event {
            NexusEvent::ComponentAdded { component, entity } if component.is::<D>() => {
                self.added(entity, components)
            }
            NexusEvent::ComponentRemoved { component, entity } if component.is::<D>() => {
                self.removed(entity)
            }
            NexusEvent::EntityDestroyed(entity) => self.removed(entity),
            _ => {}
        }
    }
}

/// Copy every mirrored entity's [`Position`] onto its node. Returns how many nodes
/// were updated.
pub fn sync_transforms(scene: &mut Scene, components: &ComponentStore) -> usize {
    let mut synced = 0;
    for (_, node) in scene.iter_mut() {
        let Some(position) = node.entity.and_then(|e| components.get::<Position>(e)) else {
            continue;
        };
        node.position = position.position;
        node.rotation = position.rotation;
        synced += 1;
    }
    synced
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::Color;
    use nexus_ecs::Nexus;

    #[derive(Debug, Clone)]
    struct Sprite(Color);

    impl Visual for Sprite {
        fn apply(&self, node: &mut SceneNode) {
            node.color = self.0;
        }
    }

    fn mirrored() -> (Nexus, Arc<Mutex<Scene>>) {
        let mut nexus = Nexus::new();
        let scene = Arc::new(Mutex::new(Scene::new()));
        nexus.subscribe(SceneMirror::<Sprite>::new(scene.clone()));
        (nexus, scene)
    }

    #[test]
    fn attach_and_detach_mirror_nodes() {
        let (mut nexus, scene) = mirrored();
        let e = nexus.create();
        nexus.attach(e, Position::new(3.0, 4.0, 0.0)).unwrap();
        nexus.attach(e, Sprite(Color::rgb(1, 2, 3))).unwrap();
        {
            let scene = scene.lock();
            let root = scene.get(scene.root()).unwrap();
            assert_eq!(root.children().len(), 1);
            let node = scene.get(root.children()[0]).unwrap();
            assert_eq!(node.entity, Some(e));
            assert_eq!(node.color, Color::rgb(1, 2, 3));
            assert_eq!(node.position, glam::Vec2::new(3.0, 4.0));
        }

        nexus.detach::<Sprite>(e);
        assert_eq!(scene.lock().len(), 1);
    }

    #[test]
    fn unrelated_components_are_ignored() {
        let (mut nexus, scene) = mirrored();
        let e = nexus.create();
        nexus.attach(e, Position::default()).unwrap();
        nexus.detach::<Position>(e);
        assert_eq!(scene.lock().len(), 1);
    }

    #[test]
    fn destroying_entity_removes_its_node() {
        let (mut nexus, scene) = mirrored();
        let keep = nexus.create();
        let gone = nexus.create();
        nexus.attach(keep, Sprite(Color::WHITE)).unwrap();
        nexus.attach(gone, Sprite(Color::BLACK)).unwrap();
        assert_eq!(scene.lock().len(), 3);

        nexus.destroy(gone).unwrap();
        let scene = scene.lock();
        assert_eq!(scene.len(), 2);
        assert_eq!(scene.pick(glam::Vec2::ZERO, 1.0), Some(keep));
    }

    #[test]
    fn entity_destroyed_purges_a_live_entry() {
        let mut nexus = Nexus::new();
        let scene = Arc::new(Mutex::new(Scene::new()));
        let mut mirror = SceneMirror::<Sprite>::new(scene.clone());
        let e = nexus.create();
        nexus.attach(e, Sprite(Color::WHITE)).unwrap();

        let added = NexusEvent::ComponentAdded {
            component: nexus_ecs::ComponentId::of::<Sprite>(),
            entity: e,
        };
        mirror.on_event(&added, nexus.components());
        assert_eq!(scene.lock().len(), 2);

        // the sprite is still stored: only the destroy event can clear the entry
        mirror.on_event(&NexusEvent::EntityDestroyed(e), nexus.components());
        assert_eq!(scene.lock().len(), 1);
        assert!(mirror.nodes.is_empty());

        mirror.on_event(&NexusEvent::EntityDestroyed(e), nexus.components());
        assert_eq!(scene.lock().len(), 1);
    }

    #[test]
    fn sync_copies_positions() {
        let (mut nexus, scene) = mirrored();
        let e = nexus.create();
        nexus.attach(e, Position::new(0.0, 0.0, 0.0)).unwrap();
        nexus.attach(e, Sprite(Color::WHITE)).unwrap();
        nexus.get_mut::<Position>(e).unwrap().position = glam::Vec2::new(7.0, 8.0);

        let mut scene = scene.lock();
        assert_eq!(sync_transforms(&mut scene, nexus.components()), 1);
        let root = scene.root();
        let child = scene.get(root).unwrap().children()[0];
        assert_eq!(scene.world_position(child), Some(glam::Vec2::new(7.0, 8.0)));
    }
}
