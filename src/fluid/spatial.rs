//! Uniform spatial hash grid for neighbor search.
//!
//! The world is split into square cells whose side equals the smoothing
//! radius. Each cell stores only the index of its most recently inserted
//! particle; the rest of the cell's particles are chained through each
//! particle's `next` link, so the grid owns no per-cell allocations and a
//! rebuild is a single pass over the particle store.

use bevy::prelude::*;

use super::particle::{Particle, NO_PARTICLE};

/// Offsets of the 3x3 block of cells around a particle's own cell.
const NEIGHBOR_OFFSETS: [IVec2; 9] = [
    IVec2::new(-1, -1),
    IVec2::new(-1, 0),
    IVec2::new(-1, 1),
    IVec2::new(0, -1),
    IVec2::new(0, 0),
    IVec2::new(0, 1),
    IVec2::new(1, -1),
    IVec2::new(1, 0),
    IVec2::new(1, 1),
];

/// Largest grid [`SphParams::validate`](super::params::SphParams::validate)
/// accepts. Cell heads take 4 bytes each, so this caps them at 64 MiB.
pub const MAX_GRID_CELLS: usize = 1 << 24;

/// Grid layout: cell size and dimensions.
///
/// `total_cells == grid_width * grid_height` always holds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridMetadata {
    pub cell_size: f32,
    pub grid_width: u32,
    pub grid_height: u32,
    pub total_cells: usize,
}

impl GridMetadata {
    /// Layout covering `world_size`. Axis counts saturate at `u32::MAX`;
    /// check [`required_cells`](Self::required_cells) first for untrusted
    /// sizes.
    pub fn new(cell_size: f32, world_size: Vec2) -> Self {
        let grid_width = cells_along(world_size.x, cell_size) as u32;
        let grid_height = cells_along(world_size.y, cell_size) as u32;
        Self {
            cell_size,
            grid_width,
            grid_height,
            total_cells: grid_width as usize * grid_height as usize,
        }
    }

    /// Cell count a layout for `world_size` would need, without truncation.
    pub fn required_cells(cell_size: f32, world_size: Vec2) -> f64 {
        cells_along(world_size.x, cell_size) * cells_along(world_size.y, cell_size)
    }

    /// Cell coordinate containing `position`.
    #[inline]
    pub fn cell_of(&self, position: Vec2) -> IVec2 {
        (position / self.cell_size).floor().as_ivec2()
    }

    /// Whether a cell coordinate lies inside the grid.
    #[inline]
    pub fn is_valid_cell(&self, cell: IVec2) -> bool {
        cell.x >= 0
            && cell.y >= 0
            && (cell.x as u32) < self.grid_width
            && (cell.y as u32) < self.grid_height
    }

    /// Row-major cell index, or `None` for coordinates outside the grid.
    ///
    /// Out-of-grid coordinates are never wrapped or clamped.
    #[inline]
    pub fn hash(&self, cell: IVec2) -> Option<usize> {
        self.is_valid_cell(cell)
            .then(|| cell.y as usize * self.grid_width as usize + cell.x as usize)
    }
}

/// Number of cells needed along one axis.
///
/// Equals `floor(extent / cell_size)` whenever the extent is a whole number
/// of cells, up to a 1e-6 relative rounding tolerance. Otherwise it is one
/// more, so the trailing partial strip of the world still hashes into the
/// grid. Never less than 1.
fn cells_along(extent: f32, cell_size: f32) -> f64 {
    let ratio = extent as f64 / cell_size as f64;
    (ratio * (1.0 - 1e-6)).ceil().max(1.0)
}

/// Cell heads of the spatial hash grid.
#[derive(Clone, Debug)]
pub struct SpatialHashGrid {
    metadata: GridMetadata,
    heads: Vec<u32>,
}

impl SpatialHashGrid {
    pub fn new(metadata: GridMetadata) -> Self {
        Self {
            metadata,
            heads: vec![NO_PARTICLE; metadata.total_cells],
        }
    }

    pub fn metadata(&self) -> GridMetadata {
        self.metadata
    }

    /// Switches to a new layout. Every cell is emptied; call
    /// [`rebuild`](Self::rebuild) before querying again.
    pub fn reconfigure(&mut self, metadata: GridMetadata) {
        self.metadata = metadata;
        self.heads.clear();
        self.heads.resize(metadata.total_cells, NO_PARTICLE);
    }

    /// Head particle index per cell, [`NO_PARTICLE`] for empty cells.
    pub fn heads(&self) -> &[u32] {
        &self.heads
    }

    /// Rebuilds every cell chain from scratch.
    ///
    /// Particles are pushed to the front of their cell's chain in store order,
    /// so each chain lists its particles from highest to lowest index.
    /// Returns the number of particles that fell outside the grid; those are
    /// left unlinked and are invisible to neighbor queries.
    pub fn rebuild(&mut self, particles: &mut [Particle]) -> usize {
        self.heads.fill(NO_PARTICLE);

        let mut outside = 0;
        for (i, particle) in particles.iter_mut().enumerate() {
            let cell = self.metadata.cell_of(particle.position);
            match self.metadata.hash(cell) {
                Some(hash) => {
                    particle.next = self.heads[hash];
                    self.heads[hash] = i as u32;
                }
                None => {
                    particle.next = NO_PARTICLE;
                    outside += 1;
                }
            }
        }
        outside
    }

    /// Walks the chain of one cell.
    pub fn chain<'a>(&'a self, particles: &'a [Particle], hash: usize) -> CellChain<'a> {
        CellChain {
            particles,
            current: self.heads.get(hash).copied().unwrap_or(NO_PARTICLE),
        }
    }

    /// Calls `visit` with every particle index in the 3x3 block of cells
    /// around `position`, skipping cells outside the grid.
    ///
    /// Candidates are not filtered by distance; the particle at `position`
    /// itself is among them.
    #[inline]
    pub fn for_each_neighbor(
        &self,
        particles: &[Particle],
        position: Vec2,
        mut visit: impl FnMut(usize),
    ) {
        let cell = self.metadata.cell_of(position);
        for offset in NEIGHBOR_OFFSETS {
            let Some(hash) = self.metadata.hash(cell + offset) else {
                continue;
            };
            for j in self.chain(particles, hash) {
                visit(j);
            }
        }
    }
}

/// Iterator over the particle indices chained in one cell.
pub struct CellChain<'a> {
    particles: &'a [Particle],
    current: u32,
}

impl Iterator for CellChain<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.current == NO_PARTICLE {
            return None;
        }
        let index = self.current as usize;
        self.current = self.particles[index].next;
        Some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particles_at(positions: &[Vec2]) -> Vec<Particle> {
        positions
            .iter()
            .map(|&p| Particle::new(p, Vec2::ZERO, 1.0))
            .collect()
    }

    #[test]
    fn test_grid_metadata_dimensions() {
        let meta = GridMetadata::new(0.5, Vec2::new(10.0, 4.0));
        assert_eq!(meta.grid_width, 20);
        assert_eq!(meta.grid_height, 8);
        assert_eq!(meta.total_cells, 160);
    }

    #[test]
    fn test_partial_cell_is_covered() {
        let meta = GridMetadata::new(0.3, Vec2::new(1.0, 1.0));
        assert_eq!(meta.grid_width, 4);
        let edge = meta.cell_of(Vec2::new(0.9999, 0.9999));
        assert!(meta.hash(edge).is_some());
    }

    #[test]
    fn test_whole_cell_world_is_floored() {
        let meta = GridMetadata::new(0.04, Vec2::splat(3.84));
        assert_eq!(meta.grid_width, 96);
        let meta = GridMetadata::new(0.1, Vec2::new(1.0, 0.5));
        assert_eq!((meta.grid_width, meta.grid_height), (10, 5));
    }

    #[test]
    fn test_required_cells_does_not_truncate() {
        assert_eq!(GridMetadata::required_cells(1.0, Vec2::new(4.0, 3.0)), 12.0);
        let huge = GridMetadata::required_cells(1e-6, Vec2::splat(3.84));
        assert!(huge > 1.0e13);
        let extreme = GridMetadata::required_cells(f32::MIN_POSITIVE, Vec2::splat(f32::MAX));
        assert!(extreme > MAX_GRID_CELLS as f64);
    }

    #[test]
    fn test_position_to_cell() {
        let meta = GridMetadata::new(1.0, Vec2::splat(4.0));
        assert_eq!(meta.cell_of(Vec2::new(0.5, 0.5)), IVec2::ZERO);
        assert_eq!(meta.cell_of(Vec2::new(1.5, 0.5)), IVec2::new(1, 0));
        assert_eq!(meta.cell_of(Vec2::new(-0.5, 0.5)), IVec2::new(-1, 0));
    }

    #[test]
    fn test_hash_is_row_major_and_rejects_outside() {
        let meta = GridMetadata::new(1.0, Vec2::new(4.0, 3.0));
        assert_eq!(meta.hash(IVec2::new(0, 0)), Some(0));
        assert_eq!(meta.hash(IVec2::new(3, 0)), Some(3));
        assert_eq!(meta.hash(IVec2::new(1, 2)), Some(9));
        assert_eq!(meta.hash(IVec2::new(4, 0)), None);
        assert_eq!(meta.hash(IVec2::new(0, 3)), None);
        assert_eq!(meta.hash(IVec2::new(-1, 0)), None);
    }

    #[test]
    fn test_rebuild_chains_are_lifo() {
        let meta = GridMetadata::new(1.0, Vec2::splat(4.0));
        let mut grid = SpatialHashGrid::new(meta);
        let mut particles = particles_at(&[
            Vec2::new(0.1, 0.1),
            Vec2::new(2.5, 2.5),
            Vec2::new(0.2, 0.9),
        ]);

        assert_eq!(grid.rebuild(&mut particles), 0);

        let chain: Vec<usize> = grid.chain(&particles, 0).collect();
        assert_eq!(chain, vec![2, 0]);
        let chain: Vec<usize> = grid.chain(&particles, 10).collect();
        assert_eq!(chain, vec![1]);
        assert_eq!(grid.heads()[5], NO_PARTICLE);
    }

    #[test]
    fn test_rebuild_resets_previous_chains() {
        let meta = GridMetadata::new(1.0, Vec2::splat(4.0));
        let mut grid = SpatialHashGrid::new(meta);
        let mut particles = particles_at(&[Vec2::new(0.5, 0.5), Vec2::new(0.6, 0.6)]);
        grid.rebuild(&mut particles);

        particles[0].position = Vec2::new(3.5, 3.5);
        grid.rebuild(&mut particles);

        assert_eq!(grid.chain(&particles, 0).collect::<Vec<_>>(), vec![1]);
        assert_eq!(grid.chain(&particles, 15).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_outside_particles_are_unlinked() {
        let meta = GridMetadata::new(1.0, Vec2::splat(2.0));
        let mut grid = SpatialHashGrid::new(meta);
        let mut particles = particles_at(&[Vec2::new(0.5, 0.5), Vec2::new(5.0, 0.5)]);

        assert_eq!(grid.rebuild(&mut particles), 1);
        assert_eq!(particles[1].next_in_cell(), None);

        let mut seen = Vec::new();
        grid.for_each_neighbor(&particles, Vec2::new(1.5, 0.5), |j| seen.push(j));
        assert_eq!(seen, vec![0]);
    }

    #[test]
    fn test_neighbor_scan_covers_3x3_block() {
        let meta = GridMetadata::new(1.0, Vec2::splat(5.0));
        let mut grid = SpatialHashGrid::new(meta);
        let mut particles = particles_at(&[
            Vec2::new(2.5, 2.5), // centre
            Vec2::new(1.1, 1.1), // diagonal neighbour cell
            Vec2::new(3.9, 2.5), // right neighbour cell
            Vec2::new(4.5, 2.5), // two cells away
            Vec2::new(0.5, 0.5), // two cells away diagonally
        ]);
        grid.rebuild(&mut particles);

        let mut seen = Vec::new();
        grid.for_each_neighbor(&particles, Vec2::new(2.5, 2.5), |j| seen.push(j));
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn test_neighbor_scan_at_corner_skips_outside_cells() {
        let meta = GridMetadata::new(1.0, Vec2::splat(3.0));
        let mut grid = SpatialHashGrid::new(meta);
        let mut particles = particles_at(&[Vec2::new(0.1, 0.1), Vec2::new(1.5, 1.5)]);
        grid.rebuild(&mut particles);

        let mut seen = Vec::new();
        grid.for_each_neighbor(&particles, Vec2::new(0.1, 0.1), |j| seen.push(j));
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1]);
    }

    #[test]
    fn test_reconfigure_resizes_heads() {
        let mut grid = SpatialHashGrid::new(GridMetadata::new(1.0, Vec2::splat(2.0)));
        assert_eq!(grid.heads().len(), 4);
        grid.reconfigure(GridMetadata::new(0.5, Vec2::splat(2.0)));
        assert_eq!(grid.heads().len(), 16);
        assert!(grid.heads().iter().all(|&h| h == NO_PARTICLE));
    }
}
