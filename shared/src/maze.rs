//! Recursive-division maze generation.
//!
//! The playfield is a lattice: logical "space" cells (odd row, odd column)
//! are corridors, even rows/columns are potential wall positions. Chambers
//! are split by a cross of walls with three of the four resulting segments
//! reopened, which forces detours instead of leaving open rooms.
//! ref: https://en.wikipedia.org/wiki/Maze_generation_algorithm#Recursive_division_method

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One cell of the maze grid, encoded as a bare integer on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Cell {
    Empty = 0,
    Wall = 1,
    Exit = 2,
    Entrance = 3,
}

impl From<Cell> for u8 {
    fn from(cell: Cell) -> u8 {
        cell as u8
    }
}

impl TryFrom<u8> for Cell {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Cell::Empty),
            1 => Ok(Cell::Wall),
            2 => Ok(Cell::Exit),
            3 => Ok(Cell::Entrance),
            other => Err(format!("invalid maze cell value {}", other)),
        }
    }
}

/// Generation parameters carried in the lead's start command. Dimensions
/// may arrive as strings (browser `<input>.value`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MazeConfig {
    #[serde(deserialize_with = "crate::number_or_string")]
    pub width: u32,
    #[serde(deserialize_with = "crate::number_or_string")]
    pub height: u32,
    #[serde(default)]
    pub box_mode: bool,
    #[serde(default = "default_wall_height")]
    pub wall_height: f64,
}

pub fn default_wall_height() -> f64 {
    2.0
}

/// The maze snapshot sent to clients. The grid is `rows() x cols()` with the
/// outer border entirely walls except one exit in the top row and one
/// entrance in the bottom row, both on odd columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Maze {
    pub width: u32,
    pub height: u32,
    pub wall_height: f64,
    pub box_mode: bool,
    pub maze: Vec<Vec<Cell>>,
}

impl Maze {
    /// Empty placeholder used before the first start command.
    pub fn placeholder() -> Self {
        Self {
            width: 0,
            height: 0,
            wall_height: default_wall_height(),
            box_mode: false,
            maze: Vec::new(),
        }
    }

    pub fn rows(&self) -> usize {
        2 * self.height as usize + 1
    }

    pub fn cols(&self) -> usize {
        2 * self.width as usize + 1
    }

    /// Generates a maze from the config and a random source. Pure: reads no
    /// state beyond its arguments. Dimensions are clamped to at least one
    /// logical cell.
    pub fn generate(config: &MazeConfig, rng: &mut dyn MazeRand) -> Self {
        let width = config.width.max(1) as i64;
        let height = config.height.max(1) as i64;
        let rows = (2 * height + 1) as usize;
        let cols = (2 * width + 1) as usize;

        let mut grid = vec![vec![Cell::Empty; cols]; rows];

        // Initial lattice: solid top and bottom rows, side walls on odd
        // rows, walls at every even column on even rows.
        for c in 0..cols {
            grid[0][c] = Cell::Wall;
            grid[rows - 1][c] = Cell::Wall;
        }
        for (r, row) in grid.iter_mut().enumerate().take(rows - 1).skip(1) {
            if r % 2 == 1 {
                row[0] = Cell::Wall;
                row[cols - 1] = Cell::Wall;
            } else {
                for c in (0..cols).step_by(2) {
                    row[c] = Cell::Wall;
                }
            }
        }

        // One exit on top, one entrance on the bottom, both on space columns.
        let exit_col = space(rng.pick(1, width)) as usize;
        grid[0][exit_col] = Cell::Exit;
        let entrance_col = space(rng.pick(1, width)) as usize;
        grid[rows - 1][entrance_col] = Cell::Entrance;

        partition(&mut grid, rng, height, width);

        Self {
            width: width as u32,
            height: height as u32,
            wall_height: config.wall_height,
            box_mode: config.box_mode,
            maze: grid,
        }
    }
}

/// Random source for maze generation. Substitutable so tests can replay a
/// fixed partitioning.
pub trait MazeRand {
    /// Uniform integer in `[min, max]`, both ends inclusive. An empty range
    /// yields `min`.
    fn pick(&mut self, min: i64, max: i64) -> i64;

    /// Which of the four wall segments of a division cross get a gap
    /// carved. Exactly one entry is false, chosen uniformly.
    fn gap_mask(&mut self) -> [bool; 4];
}

/// Production [`MazeRand`] backed by any `rand` generator.
pub struct RngMazeRand<R: Rng>(pub R);

impl<R: Rng> MazeRand for RngMazeRand<R> {
    fn pick(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            min
        } else {
            self.0.gen_range(min..=max)
        }
    }

    fn gap_mask(&mut self) -> [bool; 4] {
        let mut mask = [true, true, true, false];
        mask.shuffle(&mut self.0);
        mask
    }
}

/// Maps a logical corridor coordinate to its grid column/row.
fn space(x: i64) -> i64 {
    2 * (x - 1) + 1
}

/// Maps a logical wall coordinate to its grid column/row.
fn wall(x: i64) -> i64 {
    2 * x
}

/// Splits chambers with a cross of walls until they are degenerate.
/// Iterates an explicit worklist of chamber bounds instead of recursing.
fn partition(grid: &mut [Vec<Cell>], rng: &mut dyn MazeRand, height: i64, width: i64) {
    let mut chambers = vec![(1, height - 1, 1, width - 1)];

    while let Some((r1, r2, c1, c2)) = chambers.pop() {
        if r2 < r1 || c2 < c1 {
            continue;
        }

        // Divider row from the middle half of the span, divider column from
        // the middle third; both avoid sitting flush against chamber edges.
        let horiz = if r1 == r2 {
            r1
        } else {
            let x = r1 + 1;
            let y = r2 - 1;
            let start = (x as f64 + (y - x) as f64 / 4.0).round() as i64;
            let end = (x as f64 + 3.0 * (y - x) as f64 / 4.0).round() as i64;
            rng.pick(start, end)
        };
        let vert = if c1 == c2 {
            c1
        } else {
            let x = c1 + 1;
            let y = c2 - 1;
            let start = (x as f64 + (y - x) as f64 / 3.0).round() as i64;
            let end = (x as f64 + 2.0 * (y - x) as f64 / 3.0).round() as i64;
            rng.pick(start, end)
        };

        for i in (wall(r1) - 1)..=(wall(r2) + 1) {
            for j in (wall(c1) - 1)..=(wall(c2) + 1) {
                if i == wall(horiz) || j == wall(vert) {
                    grid[i as usize][j as usize] = Cell::Wall;
                }
            }
        }

        // Reopen three of the four segments: left/right halves of the
        // horizontal wall, top/bottom halves of the vertical wall.
        let gaps = rng.gap_mask();
        if gaps[0] {
            let gap = rng.pick(c1, vert);
            grid[wall(horiz) as usize][space(gap) as usize] = Cell::Empty;
        }
        if gaps[1] {
            let gap = rng.pick(vert + 1, c2 + 1);
            grid[wall(horiz) as usize][space(gap) as usize] = Cell::Empty;
        }
        if gaps[2] {
            let gap = rng.pick(r1, horiz);
            grid[space(gap) as usize][wall(vert) as usize] = Cell::Empty;
        }
        if gaps[3] {
            let gap = rng.pick(horiz + 1, r2 + 1);
            grid[space(gap) as usize][wall(vert) as usize] = Cell::Empty;
        }

        chambers.push((r1, horiz - 1, c1, vert - 1));
        chambers.push((horiz + 1, r2, c1, vert - 1));
        chambers.push((r1, horiz - 1, vert + 1, c2));
        chambers.push((horiz + 1, r2, vert + 1, c2));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn config(width: u32, height: u32) -> MazeConfig {
        MazeConfig {
            width,
            height,
            box_mode: false,
            wall_height: default_wall_height(),
        }
    }

    fn generate(width: u32, height: u32) -> Maze {
        Maze::generate(&config(width, height), &mut RngMazeRand(rand::thread_rng()))
    }

    /// 4-directional flood fill from the entrance through non-wall cells.
    fn entrance_reaches_exit(maze: &Maze) -> bool {
        let grid = &maze.maze;
        let rows = maze.rows();
        let cols = maze.cols();

        let entrance = (0..cols).find(|&c| grid[rows - 1][c] == Cell::Entrance);
        let exit = (0..cols).find(|&c| grid[0][c] == Cell::Exit);
        let (Some(entrance_col), Some(exit_col)) = (entrance, exit) else {
            return false;
        };

        let mut seen = vec![vec![false; cols]; rows];
        let mut queue = VecDeque::new();
        seen[rows - 1][entrance_col] = true;
        queue.push_back((rows - 1, entrance_col));

        while let Some((r, c)) = queue.pop_front() {
            if (r, c) == (0, exit_col) {
                return true;
            }
            let neighbors = [
                (r.wrapping_sub(1), c),
                (r + 1, c),
                (r, c.wrapping_sub(1)),
                (r, c + 1),
            ];
            for (nr, nc) in neighbors {
                if nr < rows && nc < cols && !seen[nr][nc] && grid[nr][nc] != Cell::Wall {
                    seen[nr][nc] = true;
                    queue.push_back((nr, nc));
                }
            }
        }
        false
    }

    /// Stub random source: always the minimum of the requested range and a
    /// fixed gap pattern, giving a fully reproducible partitioning.
    struct MinRand;

    impl MazeRand for MinRand {
        fn pick(&mut self, min: i64, _max: i64) -> i64 {
            min
        }

        fn gap_mask(&mut self) -> [bool; 4] {
            [true, true, true, false]
        }
    }

    #[test]
    fn grid_dimensions_match_cell_counts() {
        for (w, h) in [(1, 1), (2, 3), (5, 5), (12, 8), (24, 24)] {
            let maze = generate(w, h);
            assert_eq!(maze.maze.len(), 2 * h as usize + 1);
            for row in &maze.maze {
                assert_eq!(row.len(), 2 * w as usize + 1);
            }
        }
    }

    #[test]
    fn border_is_walls_with_one_exit_and_one_entrance() {
        for (w, h) in [(1, 1), (3, 2), (12, 8)] {
            let maze = generate(w, h);
            let grid = &maze.maze;
            let rows = maze.rows();
            let cols = maze.cols();

            let exits: Vec<usize> = (0..cols).filter(|&c| grid[0][c] == Cell::Exit).collect();
            let entrances: Vec<usize> = (0..cols)
                .filter(|&c| grid[rows - 1][c] == Cell::Entrance)
                .collect();

            assert_eq!(exits.len(), 1, "maze {}x{}", w, h);
            assert_eq!(entrances.len(), 1, "maze {}x{}", w, h);
            assert_eq!(exits[0] % 2, 1, "exit must sit on a space column");
            assert_eq!(entrances[0] % 2, 1, "entrance must sit on a space column");

            for c in 0..cols {
                if c != exits[0] {
                    assert_eq!(grid[0][c], Cell::Wall);
                }
                if c != entrances[0] {
                    assert_eq!(grid[rows - 1][c], Cell::Wall);
                }
            }
            for r in 0..rows {
                assert_ne!(grid[r][0], Cell::Empty);
                assert_ne!(grid[r][cols - 1], Cell::Empty);
            }
        }
    }

    #[test]
    fn entrance_always_reaches_exit() {
        for w in 1..=8 {
            for h in 1..=8 {
                for _ in 0..3 {
                    let maze = generate(w, h);
                    assert!(
                        entrance_reaches_exit(&maze),
                        "unsolvable maze at {}x{}",
                        w,
                        h
                    );
                }
            }
        }
    }

    #[test]
    fn zero_dimensions_clamp_to_one_cell() {
        let maze = generate(0, 0);
        assert_eq!((maze.width, maze.height), (1, 1));
        assert_eq!(maze.maze.len(), 3);
        assert!(entrance_reaches_exit(&maze));
    }

    #[test]
    fn deterministic_partitioning_of_two_by_two() {
        let maze = Maze::generate(&config(2, 2), &mut MinRand);

        use Cell::{Empty as E, Entrance as N, Exit as X, Wall as W};
        let expected = vec![
            vec![W, X, W, W, W],
            vec![W, E, E, E, W],
            vec![W, E, W, E, W],
            vec![W, E, W, E, W],
            vec![W, N, W, W, W],
        ];

        assert_eq!(maze.maze, expected);
        assert!(entrance_reaches_exit(&maze));
    }

    #[test]
    fn gap_mask_omits_exactly_one_segment() {
        let mut rng = RngMazeRand(rand::thread_rng());
        for _ in 0..100 {
            let mask = rng.gap_mask();
            assert_eq!(mask.iter().filter(|&&g| !g).count(), 1);
        }
    }

    #[test]
    fn pick_handles_empty_ranges() {
        let mut rng = RngMazeRand(rand::thread_rng());
        assert_eq!(rng.pick(3, 3), 3);
        assert_eq!(rng.pick(5, 4), 5);
        let sampled = rng.pick(1, 6);
        assert!((1..=6).contains(&sampled));
    }

    #[test]
    fn cells_serialize_as_integers() {
        let row = vec![Cell::Wall, Cell::Empty, Cell::Exit, Cell::Entrance];
        assert_eq!(serde_json::to_string(&row).unwrap(), "[1,0,2,3]");

        let parsed: Vec<Cell> = serde_json::from_str("[0,1,2,3]").unwrap();
        assert_eq!(
            parsed,
            vec![Cell::Empty, Cell::Wall, Cell::Exit, Cell::Entrance]
        );
        assert!(serde_json::from_str::<Vec<Cell>>("[7]").is_err());
    }

    #[test]
    fn maze_serializes_with_wire_field_names() {
        let maze = Maze::generate(&config(1, 1), &mut MinRand);
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&maze).unwrap()).unwrap();
        let object = json.as_object().unwrap();

        assert_eq!(object["width"], serde_json::json!(1));
        assert_eq!(object["height"], serde_json::json!(1));
        assert!(object.contains_key("wallHeight"));
        assert!(object.contains_key("boxMode"));
        assert!(object["maze"].is_array());
    }
}
