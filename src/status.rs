//! Connect status table: extraction rules and console rendering.
//!
//! The status page reports per-account metrics as an HTML table. Only the
//! first three cells of each body row matter; rows with fewer cells are
//! dropped silently.

/// Fixed column headers of the printed table.
pub const STATUS_HEADERS: [&str; 3] = ["Item", "Current", "Required"];

/// One line of the status table, reduced to (metric, current, required).
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRow {
    pub metric: String,
    pub current: String,
    pub required: String,
}

impl StatusRow {
    fn cells(&self) -> [&str; 3] {
        [&self.metric, &self.current, &self.required]
    }
}

/// Reduce raw body-row cell texts to status rows: keep rows with at least 3
/// cells, take the first 3, trim each.
pub fn extract_rows(raw: Vec<Vec<String>>) -> Vec<StatusRow> {
    raw.into_iter()
        .filter(|cells| cells.len() >= 3)
        .map(|cells| StatusRow {
            metric: cells[0].trim().to_string(),
            current: cells[1].trim().to_string(),
            required: cells[2].trim().to_string(),
        })
        .collect()
}

/// Render the rows as a bordered 3-column console table, columns padded to
/// the widest cell.
pub fn render_table(rows: &[StatusRow]) -> String {
    let mut widths = [
        STATUS_HEADERS[0].chars().count(),
        STATUS_HEADERS[1].chars().count(),
        STATUS_HEADERS[2].chars().count(),
    ];
    for row in rows {
        for (i, cell) in row.cells().iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let rule = format!(
        "+-{}-+-{}-+-{}-+",
        "-".repeat(widths[0]),
        "-".repeat(widths[1]),
        "-".repeat(widths[2]),
    );

    let render_line = |cells: [&str; 3]| {
        format!(
            "| {:<w0$} | {:<w1$} | {:<w2$} |",
            cells[0],
            cells[1],
            cells[2],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
        )
    };

    let mut out = String::new();
    out.push_str(&rule);
    out.push('\n');
    out.push_str(&render_line(STATUS_HEADERS));
    out.push('\n');
    out.push_str(&rule);
    out.push('\n');
    for row in rows {
        out.push_str(&render_line(row.cells()));
        out.push('\n');
    }
    out.push_str(&rule);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_rows_with_at_least_three_cells() {
        let raw = vec![
            vec!["a".into(), "b".into(), "c".into()],
            vec!["too".into(), "short".into()],
            vec!["d".into(), "e".into(), "f".into(), "extra".into(), "cells".into()],
        ];

        let rows = extract_rows(raw);

        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            StatusRow {
                metric: "a".into(),
                current: "b".into(),
                required: "c".into(),
            }
        );
        // Extra cells beyond the third are ignored.
        assert_eq!(rows[1].required, "f");
    }

    #[test]
    fn cell_texts_are_trimmed() {
        let rows = extract_rows(vec![vec![
            "  visits \n".into(),
            "\t12".into(),
            " 20 ".into(),
        ]]);

        assert_eq!(rows[0].metric, "visits");
        assert_eq!(rows[0].current, "12");
        assert_eq!(rows[0].required, "20");
    }

    #[test]
    fn empty_table_still_renders_headers() {
        let table = render_table(&[]);
        assert!(table.contains("Item"));
        assert!(table.contains("Required"));
        assert_eq!(table.lines().count(), 4);
    }

    #[test]
    fn columns_pad_to_widest_cell() {
        let rows = vec![StatusRow {
            metric: "topics entered".into(),
            current: "3".into(),
            required: "10".into(),
        }];

        let table = render_table(&rows);
        let lines: Vec<&str> = table.lines().collect();

        // rule, header, rule, one row, rule
        assert_eq!(lines.len(), 5);
        assert!(lines.iter().all(|l| l.chars().count() == lines[0].chars().count()));
        assert!(lines[3].contains("| topics entered |"));
    }
}
