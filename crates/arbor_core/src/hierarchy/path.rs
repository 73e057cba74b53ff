//! Path construction.

use std::collections::HashSet;

use crate::error::{ArborError, ArborResult};
use crate::storage::{EntityId, StageContext, World};

impl World {
    /// Path of `entity` relative to `root`.
    ///
    /// Walks child-of pairs upward until `root` or an entity without a parent.
    /// `prefix` is emitted only in the second case, so a path built from the
    /// top level reads as absolute. Unnamed entities appear as their numeric
    /// id, which [`lookup`](Self::lookup) resolves. `entity == root` gives the
    /// empty string.
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::CycleDetected`] if the chain loops, and
    /// [`ArborError::DepthExceeded`] if it is longer than
    /// `max_hierarchy_depth`.
    pub fn build_path(
        &self,
        ctx: StageContext<'_>,
        root: EntityId,
        entity: EntityId,
        sep: &str,
        prefix: Option<&str>,
    ) -> ArborResult<String> {
        if entity == root {
            return Ok(String::new());
        }

        let limit = self.config().max_hierarchy_depth;
        let mut segments = Vec::new();
        let mut visited = HashSet::new();
        let mut absolute = false;
        let mut cur = entity;
        loop {
            if !visited.insert(cur) {
                return Err(ArborError::CycleDetected(cur));
            }
            if segments.len() == limit {
                return Err(ArborError::DepthExceeded { entity, limit });
            }
            segments.push(self.segment(ctx, cur));

            let parent = self.parent(ctx, cur);
            if parent.is_null() {
                absolute = true;
                break;
            }
            if parent == root {
                break;
            }
            cur = parent;
        }

        let mut path = String::new();
        if absolute {
            path.push_str(prefix.unwrap_or_default());
        }
        for (i, segment) in segments.iter().rev().enumerate() {
            if i > 0 {
                path.push_str(sep);
            }
            path.push_str(segment);
        }
        Ok(path)
    }

    /// [`build_path`](Self::build_path) with the configured separator and
    /// prefix.
    ///
    /// # Errors
    ///
    /// As [`build_path`](Self::build_path).
    pub fn build_path_default(
        &self,
        ctx: StageContext<'_>,
        root: EntityId,
        entity: EntityId,
    ) -> ArborResult<String> {
        let config = self.config();
        self.build_path(ctx, root, entity, &config.path_separator, config.path_prefix.as_deref())
    }

    fn segment(&self, ctx: StageContext<'_>, entity: EntityId) -> String {
        self.name(ctx, entity)
            .map_or_else(|| entity.to_string(), |name| name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use crate::{ArborError, EntityId, StageContext, World, WorldConfig};

    const C: StageContext<'static> = StageContext::Canonical;

    #[test]
    fn test_build_path() {
        let mut world = World::default();
        let a = world.spawn_named("A", None).unwrap();
        let b = world.spawn_named("B", Some(a)).unwrap();
        let c = world.spawn_named("C", Some(b)).unwrap();

        assert_eq!(world.build_path(C, EntityId::NULL, c, ".", None).unwrap(), "A.B.C");
        assert_eq!(world.build_path(C, a, c, "::", Some("::")).unwrap(), "B::C");
        assert_eq!(world.build_path(C, EntityId::NULL, c, "::", Some("::")).unwrap(), "::A::B::C");
        assert_eq!(world.build_path(C, b, b, ".", None).unwrap(), "");
    }

    #[test]
    fn test_unnamed_segments_are_ids() {
        let mut world = World::default();
        let anon = world.spawn();
        let child = world.spawn_named("Kid", None).unwrap();
        world.set_parent(child, anon).unwrap();

        let path = world.build_path(C, EntityId::NULL, child, ".", None).unwrap();
        assert_eq!(path, format!("{anon}.Kid"));
        assert_eq!(world.lookup_path(C, EntityId::NULL, &path, ".", None), EntityId::NULL);
        assert_eq!(world.lookup_child(C, world.lookup(C, &anon.to_string()), "Kid"), child);
    }

    #[test]
    fn test_cycle_is_an_error() {
        let mut world = World::default();
        let a = world.spawn_named("A", None).unwrap();
        let b = world.spawn_named("B", Some(a)).unwrap();
        world.set_parent(a, b).unwrap();

        assert!(matches!(
            world.build_path(C, EntityId::NULL, b, ".", None),
            Err(ArborError::CycleDetected(_))
        ));
    }

    #[test]
    fn test_depth_limit() {
        let config = WorldConfig {
            max_hierarchy_depth: 3,
            ..WorldConfig::default()
        };
        let mut world = World::new(config);
        let mut cur = world.spawn_named("L0", None).unwrap();
        for level in 1..3 {
            cur = world.spawn_named(&format!("L{level}"), Some(cur)).unwrap();
        }
        assert_eq!(world.build_path_default(C, EntityId::NULL, cur).unwrap(), "L0.L1.L2");

        let deeper = world.spawn_named("L3", Some(cur)).unwrap();
        assert_eq!(
            world.build_path_default(C, EntityId::NULL, deeper),
            Err(ArborError::DepthExceeded { entity: deeper, limit: 3 })
        );
    }
}
