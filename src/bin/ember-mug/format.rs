//! Terminal output helpers.

use std::fmt::Write as _;

use ember_mug::{Change, MugData};

/// Renders label/value rows as a boxed two column table.
pub fn format_table(rows: &[(&str, String)]) -> String {
    let label_width = rows
        .iter()
        .map(|(label, _)| label.chars().count())
        .max()
        .unwrap_or(0);
    let value_width = rows
        .iter()
        .map(|(_, value)| value.chars().count())
        .max()
        .unwrap_or(0);
    let border = format!("+-{}-+-{}-+", "-".repeat(label_width), "-".repeat(value_width));

    let mut out = String::new();
    out.push_str(&border);
    out.push('\n');
    for (label, value) in rows {
        let _ = writeln!(out, "| {label:<label_width$} | {value:<value_width$} |");
    }
    out.push_str(&border);
    out
}

/// Prints label/value rows.
pub fn print_table(rows: &[(&str, String)]) {
    println!("{}", format_table(rows));
}

/// Prints every attribute the model exposes.
pub fn print_info(data: &MugData, raw: bool) {
    let rows = data.formatted_rows();
    if raw {
        for (_, value) in rows {
            println!("{value}");
        }
    } else {
        println!("Device Info");
        print_table(&rows);
    }
}

/// Prints one line per change.
pub fn print_changes(changes: &[Change]) {
    for change in changes {
        println!("{change}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_table() {
        let rows = [("Name", "Mug".to_owned()), ("Liquid Level", "50.00%".to_owned())];
        let table = format_table(&rows);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "+--------------+--------+");
        assert_eq!(lines[1], "| Name         | Mug    |");
        assert_eq!(lines[2], "| Liquid Level | 50.00% |");
        assert_eq!(lines[3], lines[0]);
    }

    #[test]
    fn test_format_empty_table() {
        assert_eq!(format_table(&[]), "+--+--+\n+--+--+");
    }
}
