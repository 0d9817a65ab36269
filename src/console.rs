//! Debug console commands.

use anyhow::{Context, Result, bail};
use g10_geometry::AxisAlignedBox;
use g10_scene::{HierarchyStats, Scene};
use nalgebra::Point3;
use std::{fmt::Write, str::FromStr};

/// A command that can be entered in the debug console.
#[derive(Clone, Debug, PartialEq)]
pub enum ConsoleCommand {
    /// `bvh.dump`: print the bounding volume hierarchy.
    DumpHierarchy,
    /// `bvh.stats`: print summary statistics for the hierarchy.
    HierarchyStats,
    /// `bvh.rebuild`: rebuild the hierarchy from scratch.
    RebuildHierarchy,
    /// `bvh.validate`: check the structure of the hierarchy.
    ValidateHierarchy,
    /// `bvh.query x0 y0 z0 x1 y1 z1`: list the entities whose bounds
    /// intersect the box with the given corners.
    QueryBox(AxisAlignedBox),
}

impl ConsoleCommand {
    /// Whether executing the command modifies the scene.
    pub fn modifies_scene(&self) -> bool {
        matches!(self, Self::RebuildHierarchy)
    }

    /// Executes a command that does not modify the scene and returns the
    /// output to show in the console.
    ///
    /// # Errors
    /// Returns an error if the command modifies the scene, or if it fails.
    pub fn execute(&self, scene: &Scene) -> Result<String> {
        match self {
            Self::DumpHierarchy => Ok(scene.hierarchy_dump().unwrap_or_else(|| {
                format!("Scene {} has no bounding volume hierarchy\n", scene.name())
            })),
            Self::HierarchyStats => Ok(format_stats(scene.name(), &scene.hierarchy_stats())),
            Self::ValidateHierarchy => {
                scene.validate_hierarchy()?;
                Ok(format!(
                    "Bounding volume hierarchy of scene {} is valid\n",
                    scene.name()
                ))
            }
            Self::QueryBox(axis_aligned_box) => {
                let mut output = String::new();
                let mut count = 0;
                scene.for_each_entity_in_box(axis_aligned_box, |id| {
                    count += 1;
                    let name = scene.entity(id).map_or("", |entity| entity.name());
                    writeln!(output, "{id} \"{name}\"").unwrap();
                });
                writeln!(output, "{count} entities intersect the box").unwrap();
                Ok(output)
            }
            Self::RebuildHierarchy => {
                bail!("Command `bvh.rebuild` modifies the scene and must be executed mutably")
            }
        }
    }

    /// Executes any command and returns the output to show in the console.
    pub fn execute_mut(&self, scene: &mut Scene) -> Result<String> {
        if let Self::RebuildHierarchy = self {
            scene.rebuild_hierarchy();
            return Ok(format_stats(scene.name(), &scene.hierarchy_stats()));
        }
        self.execute(scene)
    }
}

impl FromStr for ConsoleCommand {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self> {
        let mut words = input.split_whitespace();
        let Some(name) = words.next() else {
            bail!("Empty console command");
        };
        let args: Vec<&str> = words.collect();

        let command = match name {
            "bvh.dump" => Self::DumpHierarchy,
            "bvh.stats" => Self::HierarchyStats,
            "bvh.rebuild" => Self::RebuildHierarchy,
            "bvh.validate" => Self::ValidateHierarchy,
            "bvh.query" => {
                let coords = args
                    .iter()
                    .map(|arg| {
                        arg.parse::<f32>()
                            .with_context(|| format!("Invalid coordinate `{arg}`"))
                    })
                    .collect::<Result<Vec<_>>>()?;
                let [x0, y0, z0, x1, y1, z1] = coords[..] else {
                    bail!(
                        "Command `bvh.query` takes 6 coordinates, got {}",
                        coords.len()
                    );
                };
                let a = Point3::new(x0, y0, z0);
                let b = Point3::new(x1, y1, z1);
                return Ok(Self::QueryBox(AxisAlignedBox::new(a.inf(&b), a.sup(&b))));
            }
            _ => bail!("Unknown console command `{name}`"),
        };

        if !args.is_empty() {
            bail!("Command `{name}` takes no arguments");
        }
        Ok(command)
    }
}

fn format_stats(scene_name: &str, stats: &HierarchyStats) -> String {
    let mut output = String::new();
    writeln!(output, "Scene {scene_name}").unwrap();
    writeln!(output, "  status: {:?}", stats.status).unwrap();
    writeln!(output, "  nodes: {}", stats.node_count).unwrap();
    writeln!(output, "  leaves: {}", stats.leaf_count).unwrap();
    if let Some(depth) = stats.depth {
        writeln!(output, "  depth: {depth}").unwrap();
    }
    if let Some(aabb) = &stats.root_aabb {
        let (lower, upper) = (aabb.lower_corner(), aabb.upper_corner());
        writeln!(
            output,
            "  bounds: ({}, {}, {}) to ({}, {}, {})",
            lower.x, lower.y, lower.z, upper.x, upper.y, upper.z
        )
        .unwrap();
    }
    output
}
