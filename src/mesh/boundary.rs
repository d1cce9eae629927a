//! Extracting the exterior faces of a mesh and tagging them.

use fixedbitset as fb;
use itertools::{izip, Itertools};
use log::{debug, warn};

use super::{Mesh, MeshError};

/// The boundary facets of a mesh.
///
/// Every facet is a side of exactly one element.
/// Its nodes are listed in the element's side order,
/// so the right-hand rule gives the outward normal.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundaryMesh {
    nodes_per_facet: usize,
    /// global node indices of every facet in a flat Vec
    connectivity: Vec<usize>,
    elements: Vec<usize>,
    sides: Vec<usize>,
    tags: Vec<Option<u32>>,
    node_count: usize,
    diagnostics: Vec<MeshError>,
}

impl BoundaryMesh {
    /// Number of boundary facets.
    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the boundary has no facets.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Global node indices of a facet, in outward orientation.
    #[inline]
    pub fn facet(&self, facet: usize) -> &[usize] {
        let start = facet * self.nodes_per_facet;
        &self.connectivity[start..start + self.nodes_per_facet]
    }

    /// Iterate over the global node indices of every facet.
    #[inline]
    pub fn facets(&self) -> std::slice::ChunksExact<'_, usize> {
        self.connectivity.chunks_exact(self.nodes_per_facet.max(1))
    }

    /// The element a facet belongs to.
    #[inline]
    pub fn element(&self, facet: usize) -> usize {
        self.elements[facet]
    }

    /// The local side index of a facet within its element.
    #[inline]
    pub fn side(&self, facet: usize) -> usize {
        self.sides[facet]
    }

    /// The tag of a facet, if it has one.
    #[inline]
    pub fn tag(&self, facet: usize) -> Option<u32> {
        self.tags[facet]
    }

    /// Set or clear the tag of a facet.
    #[inline]
    pub fn set_tag(&mut self, facet: usize, tag: Option<u32>) {
        self.tags[facet] = tag;
    }

    /// Iterate over the indices of facets with the given tag.
    pub fn facets_with_tag(&self, tag: u32) -> impl '_ + Iterator<Item = usize> {
        self.tags
            .iter()
            .enumerate()
            .filter(move |(_, t)| **t == Some(tag))
            .map(|(i, _)| i)
    }

    /// The set of mesh nodes lying on the boundary.
    ///
    /// Iterate over the indices with `.ones()`.
    pub fn boundary_nodes(&self) -> fb::FixedBitSet {
        let mut nodes = fb::FixedBitSet::with_capacity(self.node_count);
        for &node in &self.connectivity {
            nodes.insert(node);
        }
        nodes
    }

    /// Problems found during extraction, such as faces shared by more than two elements.
    #[inline]
    pub fn diagnostics(&self) -> &[MeshError] {
        &self.diagnostics
    }
}

/// Find the faces of a mesh that belong to exactly one element.
///
/// Faces are identified by their sorted global node indices.
/// All face occurrences are sorted by this key and grouped,
/// so extraction takes `O(F log F)` time in the number of face occurrences.
/// Faces found in more than two elements are left out of the boundary
/// and recorded in [`BoundaryMesh::diagnostics`].
///
/// Facets are ordered by element and then by side. All facets are untagged.
pub fn extract<const DIM: usize>(mesh: &Mesh<DIM>) -> BoundaryMesh {
    let sides = mesh.side_table();
    let face_size = sides.first().map_or(0, |s| s.len());

    // sorted node indices of every face occurrence in a flat Vec,
    // plus the element and local side it came from
    let occurrence_count = mesh.element_count() * sides.len();
    let mut keys: Vec<usize> = Vec::with_capacity(occurrence_count * face_size);
    let mut owners: Vec<(usize, usize)> = Vec::with_capacity(occurrence_count);
    for (element, nodes) in mesh.elements().enumerate() {
        for (side, side_nodes) in sides.iter().enumerate() {
            let start = keys.len();
            keys.extend(side_nodes.iter().map(|&i| nodes[i]));
            keys[start..].sort_unstable();
            owners.push((element, side));
        }
    }

    let mut boundary_owners: Vec<(usize, usize)> = Vec::new();
    let mut diagnostics = Vec::new();
    if face_size > 0 {
        let grouped = izip!(keys.chunks_exact(face_size), &owners)
            .sorted_unstable_by_key(|(key, _)| *key)
            .group_by(|(key, _)| *key);
        for (key, group) in &grouped {
            let group: Vec<_> = group.collect();
            match group.len() {
                1 => boundary_owners.push(*group[0].1),
                2 => {}
                occurrences => {
                    warn!("face {key:?} is shared by {occurrences} elements, leaving it out of the boundary");
                    diagnostics.push(MeshError::InconsistentBoundaryTopology {
                        nodes: key.to_vec(),
                        occurrences,
                    });
                }
            }
        }
    }
    boundary_owners.sort_unstable();

    let mut connectivity = Vec::with_capacity(boundary_owners.len() * face_size);
    for &(element, side) in &boundary_owners {
        let nodes = mesh.element(element);
        connectivity.extend(sides[side].iter().map(|&i| nodes[i]));
    }
    debug!(
        "extracted {} boundary facets from {} elements",
        boundary_owners.len(),
        mesh.element_count()
    );

    let (elements, sides): (Vec<usize>, Vec<usize>) = boundary_owners.into_iter().unzip();
    BoundaryMesh {
        nodes_per_facet: face_size,
        connectivity,
        tags: vec![None; elements.len()],
        elements,
        sides,
        node_count: mesh.nodes().len(),
        diagnostics,
    }
}

/// Tag boundary facets by the side of the mesh's bounding box they lie on.
///
/// Tags are numbered `1..=2 * DIM` in the order
/// min-x, max-x, min-y, max-y, min-z, max-z.
/// A facet gets a tag if all of its nodes lie exactly on that side of the box.
/// A facet on more than one side takes the first such tag in this order,
/// and a facet on none is left untagged.
pub fn tag_by_bounding_box<const DIM: usize>(mesh: &Mesh<DIM>, boundary: &mut BoundaryMesh) {
    let bounds = mesh.bounds();
    let tag_nodes: Vec<fb::FixedBitSet> = (0..2 * DIM)
        .map(|t| {
            let axis = t / 2;
            let extreme = if t % 2 == 0 {
                bounds.min[axis]
            } else {
                bounds.max[axis]
            };
            let mut nodes = fb::FixedBitSet::with_capacity(mesh.nodes().len());
            for (i, node) in mesh.nodes().iter().enumerate() {
                nodes.set(i, node[axis] == extreme);
            }
            nodes
        })
        .collect();

    for facet in 0..boundary.len() {
        let facet_nodes = boundary.facet(facet);
        let tag = tag_nodes
            .iter()
            .position(|nodes| facet_nodes.iter().all(|&n| nodes.contains(n)))
            .map(|t| t as u32 + 1);
        boundary.tags[facet] = tag;
    }
}
