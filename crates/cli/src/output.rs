//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;

    /// Highlight for the whole row
    fn color(&self) -> Option<Color> {
        None
    }
}

fn table<T: TableDisplay>(items: &[T]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(T::headers());
    for item in items {
        let cells: Vec<Cell> = item
            .row()
            .into_iter()
            .map(|value| match item.color() {
                Some(color) => Cell::new(value).fg(color),
                None => Cell::new(value),
            })
            .collect();
        table.add_row(cells);
    }
    table
}

fn plain<T: TableDisplay>(item: &T) -> String {
    T::headers()
        .iter()
        .zip(item.row())
        .map(|(header, value)| format!("{}: {}", header, value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a single item
pub fn render_item<T: Serialize + TableDisplay>(item: &T, format: OutputFormat) -> String {
    match format {
        OutputFormat::Table => table(std::slice::from_ref(item)).to_string(),
        OutputFormat::Json => serde_json::to_string_pretty(item).unwrap_or_default(),
        OutputFormat::Yaml => serde_yaml::to_string(item).unwrap_or_default(),
        OutputFormat::Plain => plain(item),
    }
}

/// Render a list of items
pub fn render_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) -> String {
    if items.is_empty() && matches!(format, OutputFormat::Table | OutputFormat::Plain) {
        return "No items found.".to_string();
    }
    match format {
        OutputFormat::Table => table(items).to_string(),
        OutputFormat::Json => serde_json::to_string_pretty(items).unwrap_or_default(),
        OutputFormat::Yaml => serde_yaml::to_string(items).unwrap_or_default(),
        OutputFormat::Plain => items.iter().map(plain).collect::<Vec<_>>().join("\n---\n"),
    }
}

pub fn print_item<T: Serialize + TableDisplay>(item: &T, format: OutputFormat) {
    println!("{}", render_item(item, format));
}

pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    println!("{}", render_list(items, format));
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✅".green(), message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "❌".red(), message.red());
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("{}  {}", "⚠️".yellow(), message.yellow());
}

/// Print info message
pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        name: &'static str,
        count: u32,
    }

    impl TableDisplay for Row {
        fn headers() -> Vec<&'static str> {
            vec!["Name", "Count"]
        }

        fn row(&self) -> Vec<String> {
            vec![self.name.to_string(), self.count.to_string()]
        }
    }

    #[test]
    fn test_plain_and_json_rendering() {
        let rows = [Row { name: "passed", count: 6 }, Row { name: "failed", count: 0 }];
        assert_eq!(render_item(&rows[0], OutputFormat::Plain), "Name: passed\nCount: 6");
        assert_eq!(
            render_list(&rows, OutputFormat::Plain),
            "Name: passed\nCount: 6\n---\nName: failed\nCount: 0"
        );
        let json: serde_json::Value = serde_json::from_str(&render_list(&rows, OutputFormat::Json)).unwrap();
        assert_eq!(json[1]["count"], 0);
        assert!(render_list(&rows, OutputFormat::Table).contains("passed"));
    }

    #[test]
    fn test_empty_list() {
        let rows: [Row; 0] = [];
        assert_eq!(render_list(&rows, OutputFormat::Table), "No items found.");
        assert_eq!(render_list(&rows, OutputFormat::Json), "[]");
    }
}
