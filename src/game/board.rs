//! Board Model
//!
//! The replicated grid both peers hold a copy of, plus win and tie
//! detection seeded at the most recent placement. Both copies stay equal
//! because every placement, local or remote, runs through the same
//! validation in [`Board::place`].

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

// =============================================================================
// CELLS AND AXES
// =============================================================================

/// A grid coordinate. `x` counts columns, `y` counts rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    /// Column index.
    pub x: u16,
    /// Row index.
    pub y: u16,
}

impl Cell {
    /// Convenience constructor.
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

/// The four axes a run can lie on, in evaluation order.
///
/// The order is fixed; when a single placement completes two lines at
/// once, the first qualifying axis in this order wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// Left-right.
    Horizontal,
    /// Diagonal stepping (+1, +1).
    DiagonalUp,
    /// Top-bottom.
    Vertical,
    /// Diagonal stepping (-1, +1).
    DiagonalDown,
}

impl Axis {
    /// All axes in evaluation order.
    pub const ALL: [Axis; 4] = [
        Axis::Horizontal,
        Axis::DiagonalUp,
        Axis::Vertical,
        Axis::DiagonalDown,
    ];

    /// Unit step of this axis in grid coordinates.
    pub const fn step(self) -> (i32, i32) {
        match self {
            Axis::Horizontal => (1, 0),
            Axis::DiagonalUp => (1, 1),
            Axis::Vertical => (0, 1),
            Axis::DiagonalDown => (-1, 1),
        }
    }
}

// =============================================================================
// GAME STATUS
// =============================================================================

/// Result of a finished game. Present only once the game is over; cleared
/// by a rematch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    /// A run of the required length was completed.
    Win {
        /// The placement that completed the run.
        origin: Cell,
        /// Axis the run lies on.
        axis: Axis,
        /// Owner of the run.
        player: u8,
    },
    /// The board filled up with no qualifying run.
    Tie,
}

/// Local rejection of a placement. Never transmitted to the peer and
/// never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlaceError {
    /// The target cell already holds a stone.
    #[error("Cell ({}, {}) is already occupied", .cell.x, .cell.y)]
    Occupied {
        /// The rejected target.
        cell: Cell,
    },
    /// The target cell lies outside the grid.
    #[error("Cell ({}, {}) is outside the grid", .cell.x, .cell.y)]
    OutOfGrid {
        /// The rejected target.
        cell: Cell,
    },
}

// =============================================================================
// BOARD
// =============================================================================

/// Fixed-size grid with per-cell ownership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    width: u16,
    height: u16,
    win_length: u16,
    cells: Vec<Option<u8>>,
    occupied: usize,
    last_move: Option<(Cell, u8)>,
}

impl Board {
    /// A fresh board. A win length longer than the board's longest side
    /// can never be reached, so it is clamped down to it.
    pub fn new(width: u16, height: u16, win_length: u16) -> Self {
        let longest = width.max(height);
        let win_length = if win_length > longest {
            info!("win length decreased to {}", longest);
            longest
        } else {
            win_length
        };

        Self {
            width,
            height,
            win_length,
            cells: vec![None; width as usize * height as usize],
            occupied: 0,
            last_move: None,
        }
    }

    /// Number of columns.
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Run length required to win.
    pub fn win_length(&self) -> u16 {
        self.win_length
    }

    /// Number of occupied cells.
    pub fn occupied_count(&self) -> usize {
        self.occupied
    }

    /// The most recent placement, if any.
    pub fn last_move(&self) -> Option<(Cell, u8)> {
        self.last_move
    }

    /// Whether `cell` lies inside the grid.
    pub fn contains(&self, cell: Cell) -> bool {
        cell.x < self.width && cell.y < self.height
    }

    /// Owner of `cell`, if occupied.
    pub fn owner(&self, cell: Cell) -> Option<u8> {
        if !self.contains(cell) {
            return None;
        }
        self.cells[self.index(cell)]
    }

    /// Whether `cell` is occupied.
    pub fn is_occupied(&self, cell: Cell) -> bool {
        self.owner(cell).is_some()
    }

    /// Whether every cell is occupied.
    pub fn is_full(&self) -> bool {
        self.occupied == self.cells.len()
    }

    /// Place a stone for `player` on `cell`.
    ///
    /// An occupied target rejects the placement without mutating
    /// anything; the caller reports it locally and must not transmit it.
    pub fn place(&mut self, cell: Cell, player: u8) -> Result<(), PlaceError> {
        if !self.contains(cell) {
            return Err(PlaceError::OutOfGrid { cell });
        }
        if self.is_occupied(cell) {
            return Err(PlaceError::Occupied { cell });
        }
        let index = self.index(cell);
        self.cells[index] = Some(player);
        self.occupied += 1;
        self.last_move = Some((cell, player));
        Ok(())
    }

    /// Reset every cell for a rematch. The grid shape and win length are
    /// kept.
    pub fn clear(&mut self) {
        self.cells.fill(None);
        self.occupied = 0;
        self.last_move = None;
    }

    /// Evaluate the game status seeded at the most recent placement.
    ///
    /// Axes are checked in the fixed [`Axis::ALL`] order and the first
    /// qualifying one wins; a full board with no qualifying run is a tie;
    /// otherwise the game continues (`None`).
    pub fn evaluate_last_move(&self) -> Option<GameStatus> {
        let (origin, player) = self.last_move?;

        for axis in Axis::ALL {
            if self.run_length(origin, player, axis) >= self.win_length as u32 {
                return Some(GameStatus::Win {
                    origin,
                    axis,
                    player,
                });
            }
        }

        if self.is_full() {
            info!("board is full");
            return Some(GameStatus::Tie);
        }

        None
    }

    /// Contiguous same-owner run through `origin` along `axis`:
    /// stones in the positive direction, plus stones in the negative
    /// direction, plus the origin itself. Runs stop at the board edge, an
    /// empty cell, or an opposing stone.
    fn run_length(&self, origin: Cell, player: u8, axis: Axis) -> u32 {
        let (dx, dy) = axis.step();
        1 + self.count_direction(origin, player, (dx, dy))
            + self.count_direction(origin, player, (-dx, -dy))
    }

    fn count_direction(&self, origin: Cell, player: u8, step: (i32, i32)) -> u32 {
        let mut count = 0;
        let (mut x, mut y) = (i32::from(origin.x), i32::from(origin.y));
        loop {
            x += step.0;
            y += step.1;
            if x < 0 || y < 0 || x >= i32::from(self.width) || y >= i32::from(self.height) {
                break;
            }
            let cell = Cell::new(x as u16, y as u16);
            if self.owner(cell) != Some(player) {
                break;
            }
            count += 1;
        }
        count
    }

    fn index(&self, cell: Cell) -> usize {
        cell.y as usize * self.width as usize + cell.x as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occupied_cell_rejects_without_mutation() {
        let mut board = Board::new(15, 15, 5);
        board.place(Cell::new(3, 3), 0).unwrap();
        let before = board.clone();

        let result = board.place(Cell::new(3, 3), 1);
        assert_eq!(
            result,
            Err(PlaceError::Occupied {
                cell: Cell::new(3, 3)
            })
        );
        assert_eq!(board, before);
    }

    #[test]
    fn test_out_of_grid_rejects() {
        let mut board = Board::new(5, 5, 5);
        assert_eq!(
            board.place(Cell::new(5, 0), 0),
            Err(PlaceError::OutOfGrid {
                cell: Cell::new(5, 0)
            })
        );
        assert_eq!(board.occupied_count(), 0);
    }

    #[test]
    fn test_horizontal_win_at_fifth_stone() {
        let mut board = Board::new(15, 15, 5);
        for x in 0..4 {
            board.place(Cell::new(x, 0), 1).unwrap();
            assert_eq!(board.evaluate_last_move(), None);
        }
        board.place(Cell::new(4, 0), 1).unwrap();
        assert_eq!(
            board.evaluate_last_move(),
            Some(GameStatus::Win {
                origin: Cell::new(4, 0),
                axis: Axis::Horizontal,
                player: 1,
            })
        );
    }

    #[test]
    fn test_run_counts_both_directions_from_origin() {
        let mut board = Board::new(15, 15, 5);
        // Fill the gap last: _XX_X -> XXXXX with origin in the middle.
        for x in [0u16, 1, 3, 4] {
            board.place(Cell::new(x, 7), 0).unwrap();
        }
        board.place(Cell::new(2, 7), 0).unwrap();
        assert_eq!(
            board.evaluate_last_move(),
            Some(GameStatus::Win {
                origin: Cell::new(2, 7),
                axis: Axis::Horizontal,
                player: 0,
            })
        );
    }

    #[test]
    fn test_runs_stop_at_opposing_stones() {
        let mut board = Board::new(15, 15, 5);
        // X X O X X X X -> the O splits the row; no run reaches 5.
        board.place(Cell::new(2, 0), 1).unwrap();
        for x in [0u16, 1, 3, 4, 5, 6] {
            board.place(Cell::new(x, 0), 0).unwrap();
        }
        assert_eq!(board.evaluate_last_move(), None);
    }

    #[test]
    fn test_axis_evaluation_order_breaks_double_wins() {
        // One placement completes a vertical and a horizontal line at the
        // same time; horizontal is evaluated first and must win.
        let mut board = Board::new(15, 15, 3);
        board.place(Cell::new(0, 2), 0).unwrap();
        board.place(Cell::new(1, 2), 0).unwrap();
        board.place(Cell::new(2, 0), 0).unwrap();
        board.place(Cell::new(2, 1), 0).unwrap();
        board.place(Cell::new(2, 2), 0).unwrap();
        assert_eq!(
            board.evaluate_last_move(),
            Some(GameStatus::Win {
                origin: Cell::new(2, 2),
                axis: Axis::Horizontal,
                player: 0,
            })
        );
    }

    #[test]
    fn test_diagonal_wins() {
        let mut board = Board::new(15, 15, 5);
        for i in 0..5u16 {
            board.place(Cell::new(i, i), 0).unwrap();
        }
        assert_eq!(
            board.evaluate_last_move(),
            Some(GameStatus::Win {
                origin: Cell::new(4, 4),
                axis: Axis::DiagonalUp,
                player: 0,
            })
        );

        let mut board = Board::new(15, 15, 5);
        for i in 0..5u16 {
            board.place(Cell::new(10 - i, i), 1).unwrap();
        }
        assert_eq!(
            board.evaluate_last_move(),
            Some(GameStatus::Win {
                origin: Cell::new(6, 4),
                axis: Axis::DiagonalDown,
                player: 1,
            })
        );
    }

    #[test]
    fn test_full_board_without_run_is_a_tie() {
        // Win length 5 clamps to 3 on a 3x3 board; this layout has no
        // 3-run on any axis:
        //   0 1 0
        //   0 1 1
        //   1 0 0
        let mut board = Board::new(3, 3, 5);
        assert_eq!(board.win_length(), 3);
        let layout = [
            (0, 0, 0),
            (1, 0, 1),
            (2, 0, 0),
            (0, 1, 0),
            (1, 1, 1),
            (2, 1, 1),
            (0, 2, 1),
            (1, 2, 0),
        ];
        for (x, y, player) in layout {
            board.place(Cell::new(x, y), player).unwrap();
            assert_eq!(board.evaluate_last_move(), None);
        }
        board.place(Cell::new(2, 2), 0).unwrap();
        assert_eq!(board.evaluate_last_move(), Some(GameStatus::Tie));
    }

    #[test]
    fn test_sparse_board_is_neither_win_nor_tie() {
        // 5x5, win length 5, moves from both players with no five-run
        // on any axis and the board not full.
        let mut board = Board::new(5, 5, 5);
        for (x, y) in [(0u16, 0u16), (1, 1)] {
            board.place(Cell::new(x, y), 1).unwrap();
        }
        for (x, y) in [(0u16, 1u16), (1, 2), (2, 3), (3, 4), (4, 0)] {
            board.place(Cell::new(x, y), 0).unwrap();
        }
        assert_eq!(board.evaluate_last_move(), None);
        assert!(!board.is_full());
    }

    #[test]
    fn test_win_length_clamped_to_longest_side() {
        let board = Board::new(3, 4, 9);
        assert_eq!(board.win_length(), 4);
    }

    #[test]
    fn test_clear_resets_cells_but_keeps_shape() {
        let mut board = Board::new(7, 7, 5);
        board.place(Cell::new(1, 1), 0).unwrap();
        board.place(Cell::new(2, 2), 1).unwrap();
        board.clear();

        assert_eq!(board.occupied_count(), 0);
        assert_eq!(board.last_move(), None);
        assert!(!board.is_occupied(Cell::new(1, 1)));
        assert_eq!(board.width(), 7);
        assert_eq!(board.win_length(), 5);
    }
}
