use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use imms_batch::FileDisposition;

use crate::types::ProcessResult;

pub fn print_summary(result: &ProcessResult) {
    println!("Store: {}", result.store_dir.display());

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("File"),
        header_cell("Disposition"),
        header_cell("Rows"),
        header_cell("OK"),
        header_cell("Failed"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Center);
    align_column(&mut table, 2, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Right);
    align_column(&mut table, 4, CellAlignment::Right);

    let mut total_rows = 0usize;
    let mut total_ok = 0usize;
    let mut total_failed = 0usize;
    for report in &result.reports {
        total_rows += report.total_rows;
        total_ok += report.successful_rows;
        total_failed += report.failed_rows;
        table.add_row(vec![
            Cell::new(&report.file_key),
            disposition_cell(report.disposition),
            Cell::new(report.total_rows),
            count_cell(report.successful_rows, Color::Green),
            count_cell(report.failed_rows, Color::Red),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        dim_cell("-"),
        Cell::new(total_rows).add_attribute(Attribute::Bold),
        count_cell(total_ok, Color::Green).add_attribute(Attribute::Bold),
        count_cell(total_failed, Color::Red).add_attribute(Attribute::Bold),
    ]);
    println!("{table}");

    if !result.errors.is_empty() {
        eprintln!("Errors:");
        for error in &result.errors {
            eprintln!("- {error}");
        }
    }
}

pub fn print_suppliers(mappings: &[(&str, &str)]) {
    let mut table = Table::new();
    table.set_header(vec![header_cell("ODS code"), header_cell("Supplier")]);
    apply_table_style(&mut table);
    for (ods_code, supplier) in mappings {
        table.add_row(vec![Cell::new(ods_code), Cell::new(supplier)]);
    }
    println!("{table}");
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn disposition_cell(disposition: FileDisposition) -> Cell {
    let cell = Cell::new(disposition.as_str());
    match disposition {
        FileDisposition::Processed => cell.fg(Color::Green),
        FileDisposition::Queued => cell.fg(Color::Yellow),
        FileDisposition::Duplicate => cell.fg(Color::Yellow),
        FileDisposition::Rejected => cell.fg(Color::Red).add_attribute(Attribute::Bold),
    }
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color)
    } else {
        dim_cell(count)
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
