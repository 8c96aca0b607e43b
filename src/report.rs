use prettytable::{format, Cell, Row, Table};

use crate::crawl::CategoryReport;

/// Per-category table printed with `--report`
pub fn build_table(reports: &[CategoryReport]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);

    table.add_row(Row::new(vec![
        Cell::new("Category"),
        Cell::new("State"),
        Cell::new("Seen"),
        Cell::new("Saved"),
        Cell::new("Skipped"),
        Cell::new("Dupes"),
        Cell::new("Folder"),
    ]));

    for report in reports {
        table.add_row(Row::new(vec![
            Cell::new(&report.category.query),
            Cell::new(&report.state.to_string()),
            Cell::new(&format!("{}/{}", report.sources_seen, report.sources_total)),
            Cell::new(&format!("{}/{}", report.saved.len(), report.category.quota)),
            Cell::new(&report.skipped.to_string()),
            Cell::new(&report.duplicates.to_string()),
            Cell::new(&report.output_dir.display().to_string()),
        ]));
    }

    table
}

pub fn print_report(reports: &[CategoryReport]) {
    println!();
    println!("CRAWL REPORT ({} categories)", reports.len());
    println!();
    build_table(reports).printstd();
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::{Category, RunState};
    use std::path::PathBuf;

    #[test]
    fn test_one_row_per_category() {
        let report = CategoryReport {
            category: Category::new("news anchor", 15),
            output_dir: PathBuf::from("out/news_anchor"),
            state: RunState::SourcesExhausted,
            sources_total: 35,
            sources_seen: 35,
            saved: Vec::new(),
            skipped: 35,
            duplicates: 2,
            persist_failures: 0,
            error: None,
        };

        let table = build_table(&[report]);
        assert_eq!(table.len(), 2);

        let rendered = table.to_string();
        assert!(rendered.contains("news anchor"));
        assert!(rendered.contains("sources exhausted"));
        assert!(rendered.contains("35/35"));
        assert!(rendered.contains("0/15"));
    }
}
