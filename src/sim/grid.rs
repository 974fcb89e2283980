//! Uniform-grid broad phase
//!
//! Rebuilt from scratch every collision pass: `clear` then `insert` each live
//! hostile. Buckets keep their capacity across passes so steady-state
//! rebuilds do not allocate.

use std::collections::HashMap;

use crate::consts::GRID_CELL_SIZE;

/// Integer cell coordinate
pub type Cell = (i32, i32);

#[derive(Debug, Clone)]
pub struct SpatialGrid<T> {
    cell_size: f32,
    cells: HashMap<Cell, Vec<T>>,
    len: usize,
}

impl<T: Copy> SpatialGrid<T> {
    /// Non-positive or non-finite sizes fall back to `GRID_CELL_SIZE`
    pub fn new(cell_size: f32) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            log::warn!("Invalid grid cell size {}, using {}", cell_size, GRID_CELL_SIZE);
            GRID_CELL_SIZE
        };
        Self {
            cell_size,
            cells: HashMap::new(),
            len: 0,
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Number of items inserted since the last `clear`
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Cell containing a point (floored, so negative coordinates work)
    #[inline]
    pub fn cell_of(&self, x: f32, y: f32) -> Cell {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    /// Empty every bucket
    pub fn clear(&mut self) {
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
        self.len = 0;
    }

    pub fn insert(&mut self, item: T, x: f32, y: f32) {
        let cell = self.cell_of(x, y);
        self.cells.entry(cell).or_default().push(item);
        self.len += 1;
    }

    /// Conservative neighborhood query written into `out` (cleared first).
    ///
    /// Scans the 3x3 block of cells around `(x, y)` row by row from the
    /// top-left, in insertion order within a cell. Every item within `radius`
    /// is returned when `radius <= cell_size`; larger radii widen the block.
    /// Results may include items farther away, so callers filter by distance.
    pub fn query_into(&self, x: f32, y: f32, radius: f32, out: &mut Vec<T>) {
        out.clear();
        if self.len == 0 {
            return;
        }
        let (cx, cy) = self.cell_of(x, y);
        let ring = if radius > self.cell_size {
            (radius / self.cell_size).ceil() as i32
        } else {
            1
        };
        for dy in -ring..=ring {
            for dx in -ring..=ring {
                if let Some(bucket) = self.cells.get(&(cx + dx, cy + dy)) {
                    out.extend_from_slice(bucket);
                }
            }
        }
    }

    /// Allocating convenience wrapper around `query_into`
    pub fn query(&self, x: f32, y: f32, radius: f32) -> Vec<T> {
        let mut out = Vec::new();
        self.query_into(x, y, radius, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_cell_of_floors_negative() {
        let grid: SpatialGrid<u32> = SpatialGrid::new(64.0);
        assert_eq!(grid.cell_of(0.0, 0.0), (0, 0));
        assert_eq!(grid.cell_of(63.9, 64.0), (0, 1));
        assert_eq!(grid.cell_of(-0.1, -64.0), (-1, -1));
        assert_eq!(grid.cell_of(-64.1, 10.0), (-2, 0));
    }

    #[test]
    fn test_invalid_cell_size_falls_back() {
        for bad in [0.0, -5.0, f32::NAN, f32::INFINITY] {
            let mut grid = SpatialGrid::new(bad);
            assert_eq!(grid.cell_size(), GRID_CELL_SIZE);
            grid.insert(1u32, 10.0, 10.0);
            grid.insert(2, 500.0, 500.0);
            assert_eq!(grid.query(12.0, 12.0, GRID_CELL_SIZE), vec![1]);
        }
    }

    #[test]
    fn test_empty_query() {
        let grid: SpatialGrid<u32> = SpatialGrid::new(64.0);
        assert!(grid.query(10.0, 10.0, 64.0).is_empty());
        assert!(grid.is_empty());
    }

    #[test]
    fn test_query_returns_neighbors_only() {
        let mut grid = SpatialGrid::new(10.0);
        grid.insert(1u32, 5.0, 5.0); // (0, 0)
        grid.insert(2, 15.0, 5.0); // (1, 0)
        grid.insert(3, 25.0, 5.0); // (2, 0): two cells away
        grid.insert(4, -5.0, -5.0); // (-1, -1)

        let mut found = grid.query(5.0, 5.0, 10.0);
        found.sort();
        assert_eq!(found, vec![1, 2, 4]);
    }

    #[test]
    fn test_query_order_is_row_major_then_insertion() {
        let mut grid = SpatialGrid::new(10.0);
        grid.insert(10u32, 15.0, 15.0); // (1, 1)
        grid.insert(11, 5.0, 5.0); // (0, 0)
        grid.insert(12, 6.0, 6.0); // (0, 0)
        grid.insert(13, 15.0, 5.0); // (1, 0)

        // Query centered on (1, 1): rows y=0..2, columns x=0..2
        assert_eq!(grid.query(15.0, 15.0, 10.0), vec![11, 12, 13, 10]);
    }

    #[test]
    fn test_clear_keeps_nothing() {
        let mut grid = SpatialGrid::new(10.0);
        grid.insert(1u32, 1.0, 1.0);
        grid.insert(2, 2.0, 2.0);
        assert_eq!(grid.len(), 2);
        grid.clear();
        assert!(grid.is_empty());
        assert!(grid.query(1.0, 1.0, 10.0).is_empty());
    }

    #[test]
    fn test_large_radius_widens_block() {
        let mut grid = SpatialGrid::new(10.0);
        grid.insert(7u32, 25.0, 5.0); // two cells right of origin cell
        assert!(grid.query(5.0, 5.0, 10.0).is_empty());
        assert_eq!(grid.query(5.0, 5.0, 20.0), vec![7]);
    }

    proptest! {
        #[test]
        fn prop_query_includes_items_within_radius(
            cell in 4.0f32..128.0,
            px in -1000.0f32..1000.0,
            py in -1000.0f32..1000.0,
            angle in 0.0f32..std::f32::consts::TAU,
            frac in 0.0f32..0.99,
            radius_frac in 0.0f32..=1.0,
        ) {
            let mut grid = SpatialGrid::new(cell);
            let radius = cell * radius_frac;
            let dist = radius * frac;
            let qx = px + angle.cos() * dist;
            let qy = py + angle.sin() * dist;
            grid.insert(42u32, px, py);
            prop_assert!(grid.query(qx, qy, radius).contains(&42));
        }
    }
}
