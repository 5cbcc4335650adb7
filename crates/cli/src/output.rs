//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
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
}

fn table<T: TableDisplay>(items: &[T]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(T::headers());
    for item in items {
        table.add_row(item.row());
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

/// Render anything serializable as JSON or YAML
pub fn render_serialized<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
        _ => serde_json::to_string_pretty(value)?,
    })
}

/// Print a single item
pub fn print_item<T: Serialize + TableDisplay>(item: &T, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Table => println!("{}", table(std::slice::from_ref(item))),
        OutputFormat::Json | OutputFormat::Yaml => println!("{}", render_serialized(item, format)?),
        OutputFormat::Plain => println!("{}", plain(item)),
    }
    Ok(())
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json | OutputFormat::Yaml => println!("{}", render_serialized(items, format)?),
        _ if items.is_empty() => println!("No items found."),
        OutputFormat::Table => println!("{}", table(items)),
        OutputFormat::Plain => {
            let blocks: Vec<String> = items.iter().map(plain).collect();
            println!("{}", blocks.join("\n---\n"));
        }
    }
    Ok(())
}

/// Coloured pass/fail marker
pub fn status_marker(success: bool) -> String {
    if success {
        "✓ pass".green().to_string()
    } else {
        "✗ fail".red().to_string()
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "!".yellow(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        name: String,
        steps: usize,
    }

    impl TableDisplay for Row {
        fn headers() -> Vec<&'static str> {
            vec!["NAME", "STEPS"]
        }

        fn row(&self) -> Vec<String> {
            vec![self.name.clone(), self.steps.to_string()]
        }
    }

    #[test]
    fn plain_pairs_headers_and_values() {
        let row = Row { name: "registration".into(), steps: 21 };
        assert_eq!(plain(&row), "NAME: registration\nSTEPS: 21");
    }

    #[test]
    fn serialized_formats() {
        let rows = vec![Row { name: "registration".into(), steps: 21 }];
        let json = render_serialized(&rows, OutputFormat::Json).unwrap();
        assert!(json.contains("\"name\": \"registration\""));
        let yaml = render_serialized(&rows, OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("- name: registration"));
    }
}
