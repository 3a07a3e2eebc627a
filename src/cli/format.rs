//! Output formatting for CLI display.

use std::fmt::Write;

use crate::report::Report;

/// Render a report as three aligned text tables.
pub(super) fn format_report(report: &Report) -> String {
    let mut out = String::new();

    let vessels: Vec<Vec<String>> = report
        .top_vessels
        .iter()
        .map(|v| vec![v.vessel.clone(), v.total.to_string()])
        .collect();
    push_table(
        &mut out,
        "Top vessels by total passengers and crew",
        &["Vessel", "Total"],
        &vessels,
    );

    let rigs: Vec<Vec<String>> = report
        .rig_composition
        .iter()
        .map(|r| {
            vec![
                r.rig.clone(),
                r.passengers.to_string(),
                r.crew.to_string(),
                r.total.to_string(),
            ]
        })
        .collect();
    push_table(
        &mut out,
        "Passengers vs crew by rig",
        &["Rig", "Passengers", "Crew", "Total"],
        &rigs,
    );

    let averages: Vec<Vec<String>> = report
        .avg_per_trip_by_rig
        .iter()
        .map(|r| vec![r.rig.clone(), format!("{:.2}", r.avg_per_trip)])
        .collect();
    push_table(
        &mut out,
        "Average people per trip by rig",
        &["Rig", "Avg/trip"],
        &averages,
    );

    out
}

/// Append a titled table. The first column is left-aligned, the rest right.
fn push_table(out: &mut String, title: &str, headers: &[&str], rows: &[Vec<String>]) {
    if !out.is_empty() {
        out.push('\n');
    }
    let _ = writeln!(out, "{title}");

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let header: Vec<String> = headers.iter().map(|h| (*h).to_string()).collect();
    push_row(out, &header, &widths);
    for row in rows {
        push_row(out, row, &widths);
    }
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let mut line = String::from(" ");
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        let pad = width - cell.chars().count();
        line.push(' ');
        if i == 0 {
            line.push_str(cell);
            line.push_str(&" ".repeat(pad));
        } else {
            line.push_str(&" ".repeat(pad));
            line.push_str(cell);
        }
        line.push(' ');
    }
    out.push_str(line.trim_end());
    out.push('\n');
}
