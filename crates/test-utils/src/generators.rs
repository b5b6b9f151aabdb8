//! Test data generators for creating synthetic raster data.
//!
//! These generators create predictable, verifiable patterns that can be
//! used across the test suite. All grids are row-major, row 0 at the top.

/// Creates a grid whose values count up from 1 in row-major order.
///
/// # Example
///
/// ```
/// use test_utils::create_sequential_grid;
///
/// let grid = create_sequential_grid(4, 4);
/// assert_eq!(grid[0], 1.0);
/// assert_eq!(grid[4], 5.0);  // row 1, col 0
/// assert_eq!(grid[15], 16.0);
/// ```
pub fn create_sequential_grid(nrows: usize, ncols: usize) -> Vec<f64> {
    (1..=nrows * ncols).map(|v| v as f64).collect()
}

/// Creates a test grid with temperature-like values in Kelvin.
///
/// The values range from approximately 250K to 310K, a gradient from
/// cold (top-left) to warm (bottom-right).
pub fn create_temperature_grid(nrows: usize, ncols: usize) -> Vec<f64> {
    let mut data = Vec::with_capacity(nrows * ncols);
    for row in 0..nrows {
        for col in 0..ncols {
            let x_factor = col as f64 / ncols.max(1) as f64;
            let y_factor = row as f64 / nrows.max(1) as f64;
            data.push(250.0 + (x_factor * 30.0) + (y_factor * 30.0));
        }
    }
    data
}

/// Creates a grid with random-ish but deterministic precipitation values.
///
/// Roughly three quarters of the cells are dry (0.0); the rest hold up to
/// 50 mm. Uses a simple hash for reproducibility.
pub fn create_precipitation_grid(nrows: usize, ncols: usize, seed: u32) -> Vec<f64> {
    let mut data = Vec::with_capacity(nrows * ncols);
    for row in 0..nrows {
        for col in 0..ncols {
            let hash = simple_hash(col as u32, row as u32, seed);
            let precip = if hash % 4 == 0 {
                (hash % 5000) as f64 / 100.0
            } else {
                0.0
            };
            data.push(precip);
        }
    }
    data
}

/// Simple deterministic hash for reproducible test data.
fn simple_hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_mul(31).wrapping_add(x);
    h = h.wrapping_mul(31).wrapping_add(y);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}

/// Replaces every cell for which `mask(row, col)` is true with NaN.
pub fn with_missing<F>(mut data: Vec<f64>, ncols: usize, mask: F) -> Vec<f64>
where
    F: Fn(usize, usize) -> bool,
{
    for (idx, value) in data.iter_mut().enumerate() {
        if mask(idx / ncols, idx % ncols) {
            *value = f64::NAN;
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_grid() {
        let grid = create_sequential_grid(2, 3);
        assert_eq!(grid, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_temperature_range() {
        let grid = create_temperature_grid(20, 30);
        assert!(grid.iter().all(|&t| (250.0..=310.0).contains(&t)));
    }

    #[test]
    fn test_precipitation_deterministic() {
        let a = create_precipitation_grid(16, 16, 7);
        let b = create_precipitation_grid(16, 16, 7);
        assert_eq!(a, b);
        assert!(a.iter().all(|&p| (0.0..50.0).contains(&p)));
    }

    #[test]
    fn test_with_missing() {
        let grid = with_missing(vec![1.0; 4], 2, |row, col| row == col);
        assert!(grid[0].is_nan());
        assert_eq!(grid[1], 1.0);
        assert_eq!(grid[2], 1.0);
        assert!(grid[3].is_nan());
    }
}
