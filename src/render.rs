use crate::types::{LayoutResult, Placement};

const MAX_COLS: f64 = 80.0;
const MAX_ROWS: f64 = 40.0;

/// ASCII preview of a layout: roll width across, consumed length down.
/// Fixed pieces are labelled with a leading `*`.
pub fn render_layout(layout: &LayoutResult) -> String {
    if layout.used_length == 0 {
        return String::new();
    }
    let width = layout.roll.width as f64;
    let length = layout.used_length as f64;
    let scale = f64::min(MAX_COLS / width, MAX_ROWS / length);
    let cols = (width * scale).round() as usize;
    let rows = (length * scale).round() as usize;
    if cols == 0 || rows == 0 {
        return String::new();
    }

    let mut grid = vec![vec![' '; cols + 1]; rows + 1];
    draw_rect(&mut grid, 0, 0, cols, rows);

    for p in &layout.placements {
        draw_piece(&mut grid, &p.placement, p.fixed, scale);
    }

    let mut out = String::new();
    for row in &grid {
        let line: String = row.iter().collect();
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

fn draw_piece(grid: &mut [Vec<char>], p: &Placement, fixed: bool, scale: f64) {
    let sx = (p.x as f64 * scale).round() as usize;
    let sy = (p.y as f64 * scale).round() as usize;
    let sw = (p.rect.w as f64 * scale).round() as usize;
    let sh = (p.rect.h as f64 * scale).round() as usize;
    if sw == 0 || sh == 0 {
        return;
    }
    draw_rect(grid, sx, sy, sw, sh);

    if sw <= 2 {
        return;
    }
    let label = if fixed {
        format!("*{}", p.rect)
    } else {
        p.rect.to_string()
    };
    let cy = sy + sh / 2;
    let start = (sx + sw / 2).saturating_sub(label.chars().count() / 2);
    for (i, ch) in label.chars().enumerate() {
        let cx = start + i;
        if cx > sx && cx < sx + sw && cy > sy && cy < sy + sh {
            grid[cy][cx] = ch;
        }
    }
}

fn stroke(cell: &mut char, edge: char) {
    *cell = match (*cell, edge) {
        ('+', _) => '+',
        ('|', '-') | ('-', '|') => '+',
        _ => edge,
    };
}

fn draw_rect(grid: &mut [Vec<char>], x: usize, y: usize, w: usize, h: usize) {
    let rows = grid.len();
    let Some(cols) = grid.first().map(Vec::len) else {
        return;
    };

    for cx in (x..=x + w).filter(|&cx| cx < cols) {
        for cy in [y, y + h].into_iter().filter(|&cy| cy < rows) {
            stroke(&mut grid[cy][cx], '-');
        }
    }
    for cy in (y..=y + h).filter(|&cy| cy < rows) {
        for cx in [x, x + w].into_iter().filter(|&cx| cx < cols) {
            stroke(&mut grid[cy][cx], '|');
        }
    }
    for cx in [x, x + w] {
        for cy in [y, y + h] {
            if cy < rows && cx < cols {
                grid[cy][cx] = '+';
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InstanceId, InstancePlacement, Rect, Roll, SpecId};

    fn layout(placements: Vec<(Placement, bool)>, used_length: u32) -> LayoutResult {
        LayoutResult {
            placements: placements
                .into_iter()
                .enumerate()
                .map(|(i, (placement, fixed))| InstancePlacement {
                    id: InstanceId::new(SpecId(1), i as u32),
                    placement,
                    fixed,
                })
                .collect(),
            used_length,
            ..LayoutResult::empty(Roll::bounded(100, 1000))
        }
    }

    #[test]
    fn test_render_single_piece() {
        let output = render_layout(&layout(
            vec![(Placement::new(0, 0, Rect::new(100, 50), false), false)],
            50,
        ));
        assert!(output.contains('+'));
        assert!(output.contains('-'));
        assert!(output.contains('|'));
        assert!(output.contains("100x50"));
    }

    #[test]
    fn test_render_marks_fixed_pieces() {
        let output = render_layout(&layout(
            vec![
                (Placement::new(0, 0, Rect::new(50, 100), false), true),
                (Placement::new(50, 0, Rect::new(50, 100), false), false),
            ],
            100,
        ));
        assert!(output.contains("*50x100"));
        assert_eq!(output.matches("50x100").count(), 2);
    }

    #[test]
    fn test_render_empty() {
        assert!(render_layout(&LayoutResult::empty(Roll::strip(1220))).is_empty());
    }
}
