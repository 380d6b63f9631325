//! Named placement locations and the cells they resolve to.

use crate::core::grid::Cell;

/// Location used by fallback recovery.
pub const SHELF: &str = "shelf_A";

const SHELF_CELL: Cell = Cell::new(50, 10);
const DEFAULT_CELL: Cell = Cell::new(10, 50);

/// Target cell for a named location. Unknown names share one drop-off cell.
pub fn target_cell(location: &str) -> Cell {
    if location == SHELF {
        SHELF_CELL
    } else {
        DEFAULT_CELL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shelf_and_other_locations() {
        assert_eq!(target_cell("shelf_A"), Cell::new(50, 10));
        assert_eq!(target_cell("bin1"), Cell::new(10, 50));
        assert_eq!(target_cell("table"), Cell::new(10, 50));
    }
}
