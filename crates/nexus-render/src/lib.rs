//! Nexus Render - scene tree kept in sync with the ECS
//!
//! Drawing itself is left to whatever backend consumes [`Scene::draw_list`].

pub mod mirror;
pub mod scene;

pub use mirror::{sync_transforms, SceneMirror, Visual};
pub use scene::{NodeId, Scene, SceneNode};
