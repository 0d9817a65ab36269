//! Human readable dumps of a hierarchy.

use crate::bounding_volume::{
    BoundedEntities,
    hierarchy::{BoundingVolumeHierarchy, Node, NodeID},
};
use nalgebra::Point3;
use std::fmt;

const INDENTATION: &str = "    ";

/// [`Display`](fmt::Display) adapter printing the nodes of a
/// [`BoundingVolumeHierarchy`], one per line.
///
/// Nodes are indented by depth, and children are prefixed with `L` or `R`.
/// Leaves are labeled with the quoted name of their entity and internal
/// nodes with `Volume`, followed by the corners of their bounding box.
#[derive(Debug)]
pub struct HierarchyDump<'a, E: ?Sized> {
    bvh: &'a BoundingVolumeHierarchy,
    entities: &'a E,
    start: Option<NodeID>,
    depth: usize,
}

#[derive(Copy, Clone, Debug)]
enum Branch {
    Root,
    Left,
    Right,
}

impl BoundingVolumeHierarchy {
    /// Returns an adapter for printing the whole hierarchy.
    pub fn dump<'a, E>(&'a self, entities: &'a E) -> HierarchyDump<'a, E>
    where
        E: BoundedEntities + ?Sized,
    {
        HierarchyDump {
            bvh: self,
            entities,
            start: self.root,
            depth: 0,
        }
    }

    /// Returns an adapter for printing the subtree rooted at the given node,
    /// with the first line indented as if the node were at the given depth.
    pub fn dump_subtree<'a, E>(
        &'a self,
        entities: &'a E,
        node: NodeID,
        depth: usize,
    ) -> HierarchyDump<'a, E>
    where
        E: BoundedEntities + ?Sized,
    {
        HierarchyDump {
            bvh: self,
            entities,
            start: Some(node),
            depth,
        }
    }
}

impl<E> HierarchyDump<'_, E>
where
    E: BoundedEntities + ?Sized,
{
    fn lines(&self) -> Vec<(NodeID, usize, Branch)> {
        let mut lines = Vec::new();
        let Some(start) = self.start else {
            return lines;
        };
        let mut stack = vec![(start, self.depth, Branch::Root)];
        while let Some((id, depth, branch)) = stack.pop() {
            lines.push((id, depth, branch));
            if let Some(node) = self.bvh.get_node(id) {
                if let Some(right) = node.right {
                    stack.push((right, depth + 1, Branch::Right));
                }
                if let Some(left) = node.left {
                    stack.push((left, depth + 1, Branch::Left));
                }
            }
        }
        lines
    }

    fn write_node(&self, f: &mut fmt::Formatter<'_>, node: &Node) -> fmt::Result {
        match node.entity {
            Some(entity) => match self.entities.entity_name(entity) {
                Some(name) => write!(f, "\"{name}\"")?,
                None => write!(f, "entity {entity}")?,
            },
            None => write!(f, "Volume")?,
        }
        write!(f, " max ")?;
        write_point(f, node.aabb().upper_corner())?;
        write!(f, " min ")?;
        write_point(f, node.aabb().lower_corner())
    }
}

impl<E> fmt::Display for HierarchyDump<'_, E>
where
    E: BoundedEntities + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines = self.lines();
        writeln!(f, "Bounding volume hierarchy ({} nodes):", lines.len())?;

        for (id, depth, branch) in lines {
            for _ in 0..depth {
                f.write_str(INDENTATION)?;
            }
            match branch {
                Branch::Root => {}
                Branch::Left => f.write_str("L ")?,
                Branch::Right => f.write_str("R ")?,
            }
            match self.bvh.get_node(id) {
                Some(node) => self.write_node(f, node)?,
                None => write!(f, "<released node {id}>")?,
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn write_point(f: &mut fmt::Formatter<'_>, point: &Point3<f32>) -> fmt::Result {
    write!(f, "({:.3}, {:.3}, {:.3})", point.x, point.y, point.z)
}
