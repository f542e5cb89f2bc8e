//! Plain-text rendering of small result tables (counts, confusion matrices).

use std::fmt::Write as _;

const GAP: &str = "  ";

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| h.chars().count()).collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(clean(cell).chars().count());
        }
    }
    // A column is right-aligned when every non-empty cell is a number.
    let numeric = (0..headers.len())
        .map(|idx| {
            rows.iter()
                .filter_map(|row| row.get(idx))
                .filter(|cell| !cell.is_empty())
                .all(|cell| cell.parse::<f64>().is_ok())
        })
        .collect::<Vec<_>>();

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths, &numeric));
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &widths, &numeric));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, &numeric));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn format_row(cells: &[String], widths: &[usize], numeric: &[bool]) -> String {
    let line = cells
        .iter()
        .zip(widths.iter().zip(numeric))
        .map(|(cell, (&width, &right))| {
            let cell = clean(cell);
            if right {
                format!("{cell:>width$}")
            } else {
                format!("{cell:<width$}")
            }
        })
        .collect::<Vec<_>>()
        .join(GAP);
    line.trim_end().to_string()
}

fn clean(cell: &str) -> String {
    cell.replace(['\n', '\r', '\t'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn numbers_align_right_and_text_left() {
        let rendered = render_table(
            &strings(&["wicket_type", "count"]),
            &[strings(&["caught", "7"]), strings(&["lbw", "12"])],
        );
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "wicket_type  count");
        assert_eq!(lines[1], "-----------  -----");
        assert_eq!(lines[2], "caught           7");
        assert_eq!(lines[3], "lbw             12");
    }

    #[test]
    fn control_characters_are_flattened() {
        let rendered = render_table(&strings(&["name"]), &[strings(&["a\tb"])]);
        assert!(rendered.ends_with("a b\n"));
    }
}
