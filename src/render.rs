use crate::format::format_sixteenths;

const MAX_WIDTH: f64 = 80.0;

/// Draws one stick as a three-line ASCII bar: a box per cut, labelled with
/// its length, and the drop shaded with `.`.
pub fn render_stick(stick_length: f64, cuts: &[f64], kerf: f64) -> String {
    if stick_length <= 0.0 {
        return String::new();
    }
    let scale = MAX_WIDTH / stick_length;
    let grid_w = (stick_length * scale).round() as usize;

    let mut grid = vec![vec![' '; grid_w + 1]; 3];

    // Stock outline first, drop shading inside it
    draw_segment(&mut grid, 0, grid_w);
    for cell in grid[1].iter_mut().take(grid_w).skip(1) {
        *cell = '.';
    }

    let mut pos = 0.0;
    for &cut in cuts {
        let sx = (pos * scale).round() as usize;
        let ex = (((pos + cut) * scale).round() as usize).min(grid_w);
        pos += cut + kerf;

        if ex <= sx {
            continue;
        }
        draw_segment(&mut grid, sx, ex);
        for cell in grid[1].iter_mut().take(ex).skip(sx + 1) {
            *cell = ' ';
        }

        let label: Vec<char> = format_sixteenths(cut).chars().collect();
        if ex - sx > label.len() + 1 {
            let start = sx + (ex - sx - label.len()) / 2;
            for (i, &ch) in label.iter().enumerate() {
                grid[1][start + i] = ch;
            }
        }
    }

    let mut result = String::new();
    for row in &grid {
        let line: String = row.iter().collect();
        result.push_str(line.trim_end());
        result.push('\n');
    }
    result
}

fn draw_segment(grid: &mut [Vec<char>], x0: usize, x1: usize) {
    let cols = grid[0].len();
    for i in x0..=x1.min(cols - 1) {
        for row in [0, 2] {
            if grid[row][i] != '+' {
                grid[row][i] = '-';
            }
        }
    }
    for x in [x0, x1] {
        if x < cols {
            grid[0][x] = '+';
            grid[1][x] = '|';
            grid[2][x] = '+';
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_full_stick() {
        let output = render_stick(100.0, &[100.0], 0.0);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with('+') && lines[0].ends_with('+'));
        assert!(lines[1].contains("100"));
        assert!(!lines[1].contains('.'));
    }

    #[test]
    fn test_render_with_drop() {
        let output = render_stick(239.25, &[71.6875, 71.6875, 71.6875], 0.125);
        assert!(output.contains("71 11/16"));
        assert!(output.contains('.'));
        assert_eq!(output.lines().next().unwrap().matches('+').count(), 5);
    }

    #[test]
    fn test_render_empty() {
        let output = render_stick(100.0, &[], 0.0);
        // Should still draw the stock outline
        assert!(output.contains('+'));
        assert!(output.contains('.'));
    }

    #[test]
    fn test_render_zero_length() {
        assert_eq!(render_stick(0.0, &[1.0], 0.0), "");
    }
}
