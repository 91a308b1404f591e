use crate::diagram::{EdgeStyle, NodeKind};
use crate::display_width::{display_width, split_lines};
use crate::layout::{ClusterLayout, Layout, NodeLayout};
use crate::routing::{EdgeRoute, Heading, Point};

struct Grid {
    cells: Vec<Vec<char>>,
    width: usize,
    height: usize,
}

impl Grid {
    fn new(width: usize, height: usize) -> Self {
        Self {
            cells: vec![vec![' '; width]; height],
            width,
            height,
        }
    }

    fn set(&mut self, row: usize, col: usize, ch: char) {
        if row < self.height && col < self.width {
            if self.cells[row][col] == '\0' && col > 0 && self.cells[row][col - 1] != '\0' {
                self.cells[row][col - 1] = ' ';
            }
            self.cells[row][col] = ch;
        }
    }

    fn write_str(&mut self, row: usize, col: usize, s: &str) {
        let mut offset = 0;
        for ch in s.chars() {
            self.set(row, col + offset, ch);
            let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(1);
            for j in 1..w {
                self.set(row, col + offset + j, '\0');
            }
            offset += w;
        }
    }

    fn set_merge(&mut self, row: usize, col: usize, ch: char) {
        if row < self.height && col < self.width {
            let merged = merge_box_drawing(self.cells[row][col], ch);
            self.set(row, col, merged);
        }
    }

    fn render(&self) -> String {
        self.cells
            .iter()
            .map(|row| {
                let line: String = row.iter().filter(|&&ch| ch != '\0').collect();
                line.trim_end().to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn render(layout: &Layout) -> String {
    let mut grid = Grid::new(layout.width, layout.height);

    for cluster in &layout.clusters {
        draw_cluster(&mut grid, cluster);
    }
    for edge in &layout.edges {
        draw_edge_line(&mut grid, edge);
    }
    for edge in &layout.edges {
        if let Some(&last) = edge.points.last() {
            grid.set(last.row, last.col, arrow_head(edge.head));
        }
    }
    for node in &layout.nodes {
        draw_node(&mut grid, node);
    }
    for edge in &layout.edges {
        draw_attachment(&mut grid, edge);
    }
    for edge in &layout.edges {
        if let Some(label) = &edge.label {
            if label.inline {
                grid.write_str(label.at.row, label.at.col - 1, &format!(" {} ", label.text));
            } else {
                grid.write_str(label.at.row, label.at.col, &label.text);
            }
        }
    }

    let pad = layout.width.saturating_sub(display_width(&layout.title)) / 2;
    format!("{}\n\n{}{}\n", grid.render(), " ".repeat(pad), layout.title)
}

fn draw_cluster(grid: &mut Grid, cluster: &ClusterLayout) {
    let x = cluster.x;
    let y = cluster.y;
    let w = cluster.width;
    let h = cluster.height;
    let label_width = display_width(&cluster.label);

    grid.set(y, x, '┌');
    grid.set(y, x + 1, '─');
    grid.set(y, x + 2, ' ');
    grid.write_str(y, x + 3, &cluster.label);
    grid.set(y, x + 3 + label_width, ' ');
    for col in (x + 4 + label_width)..(x + w - 1) {
        grid.set(y, col, '─');
    }
    grid.set(y, x + w - 1, '┐');

    for row in (y + 1)..(y + h - 1) {
        grid.set(row, x, '│');
        grid.set(row, x + w - 1, '│');
    }

    grid.set(y + h - 1, x, '└');
    for col in (x + 1)..(x + w - 1) {
        grid.set(y + h - 1, col, '─');
    }
    grid.set(y + h - 1, x + w - 1, '┘');
}

fn draw_node(grid: &mut Grid, node: &NodeLayout) {
    let (tl, tr, bl, br) = match node.kind {
        NodeKind::Pod | NodeKind::Registry => ('╭', '╮', '╰', '╯'),
        _ => ('┌', '┐', '└', '┘'),
    };
    let (x, y, w, h) = (node.x, node.y, node.width, node.height);

    grid.set(y, x, tl);
    grid.set(y, x + w - 1, tr);
    grid.set(y + h - 1, x, bl);
    grid.set(y + h - 1, x + w - 1, br);
    for col in (x + 1)..(x + w - 1) {
        grid.set(y, col, '─');
        grid.set(y + h - 1, col, '─');
    }
    for row in (y + 1)..(y + h - 1) {
        grid.set(row, x, '│');
        for col in (x + 1)..(x + w - 1) {
            grid.set(row, col, ' ');
        }
        grid.set(row, x + w - 1, '│');
    }

    let caption = node.kind.caption();
    let lines = caption.into_iter().chain(split_lines(&node.label));
    for (i, line) in lines.enumerate() {
        let pad_left = (w - 2 - display_width(line)) / 2;
        grid.write_str(y + 1 + i, x + 1 + pad_left, line);
    }
}

const DIR_L: u8 = 1;
const DIR_R: u8 = 2;
const DIR_U: u8 = 4;
const DIR_D: u8 = 8;

fn box_connections(ch: char) -> u8 {
    match ch {
        '─' | '═' | '╌' => DIR_L | DIR_R,
        '│' | '║' | '┊' => DIR_U | DIR_D,
        '┌' => DIR_R | DIR_D,
        '┐' => DIR_L | DIR_D,
        '└' => DIR_R | DIR_U,
        '┘' => DIR_L | DIR_U,
        '┬' => DIR_L | DIR_R | DIR_D,
        '┴' => DIR_L | DIR_R | DIR_U,
        '├' => DIR_U | DIR_D | DIR_R,
        '┤' => DIR_U | DIR_D | DIR_L,
        '┼' => DIR_L | DIR_R | DIR_U | DIR_D,
        _ => 0,
    }
}

fn connections_to_char(conn: u8) -> Option<char> {
    match conn {
        c if c == DIR_L | DIR_R => Some('─'),
        c if c == DIR_U | DIR_D => Some('│'),
        c if c == DIR_R | DIR_D => Some('┌'),
        c if c == DIR_L | DIR_D => Some('┐'),
        c if c == DIR_R | DIR_U => Some('└'),
        c if c == DIR_L | DIR_U => Some('┘'),
        c if c == DIR_L | DIR_R | DIR_D => Some('┬'),
        c if c == DIR_L | DIR_R | DIR_U => Some('┴'),
        c if c == DIR_U | DIR_D | DIR_R => Some('├'),
        c if c == DIR_U | DIR_D | DIR_L => Some('┤'),
        c if c == DIR_L | DIR_R | DIR_U | DIR_D => Some('┼'),
        _ => None,
    }
}

fn merge_box_drawing(existing: char, new_char: char) -> char {
    let ec = box_connections(existing);
    let nc = box_connections(new_char);
    if ec == 0 || nc == 0 {
        return new_char;
    }
    if ec == nc {
        return existing;
    }
    connections_to_char(ec | nc).unwrap_or(new_char)
}

fn line_chars(style: EdgeStyle) -> (char, char) {
    match style {
        EdgeStyle::Solid => ('─', '│'),
        EdgeStyle::Dashed => ('╌', '┊'),
        EdgeStyle::Bold => ('═', '║'),
    }
}

fn arrow_head(heading: Heading) -> char {
    match heading {
        Heading::Right => '>',
        Heading::Left => '<',
        Heading::Down => '▼',
        Heading::Up => '▲',
    }
}

/// Direction bit pointing from `at` towards `other`.
fn toward(at: Point, other: Point) -> u8 {
    if other.col < at.col {
        DIR_L
    } else if other.col > at.col {
        DIR_R
    } else if other.row < at.row {
        DIR_U
    } else if other.row > at.row {
        DIR_D
    } else {
        0
    }
}

fn draw_edge_line(grid: &mut Grid, edge: &EdgeRoute) {
    let (horiz, vert) = line_chars(edge.style);

    for (a, b) in edge.segments() {
        if a.row == b.row {
            for col in a.col.min(b.col)..=a.col.max(b.col) {
                grid.set_merge(a.row, col, horiz);
            }
        } else {
            for row in a.row.min(b.row)..=a.row.max(b.row) {
                grid.set_merge(row, a.col, vert);
            }
        }
    }

    // Corners replace the straight pieces laid at each bend.
    for w in edge.points.windows(3) {
        let conn = toward(w[1], w[0]) | toward(w[1], w[2]);
        if let Some(corner) = connections_to_char(conn) {
            grid.set(w[1].row, w[1].col, corner);
        }
    }
}

/// Marks where an edge leaves its source box with a tee on the border.
fn draw_attachment(grid: &mut Grid, edge: &EdgeRoute) {
    let Some(&start) = edge.points.first() else {
        return;
    };
    match edge.exit {
        Heading::Right if start.col > 0 => grid.set(start.row, start.col - 1, '├'),
        Heading::Left => grid.set(start.row, start.col + 1, '┤'),
        Heading::Down if start.row > 0 => grid.set(start.row - 1, start.col, '┬'),
        Heading::Up => grid.set(start.row + 1, start.col, '┴'),
        _ => {}
    }
}
