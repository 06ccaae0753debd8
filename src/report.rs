use std::fmt::Write;

use serde_json::Value;

use crate::pages::{Page, SectionBody, Table};

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "n/a".to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn write_markdown_table(output: &mut String, table: &Table) {
    let _ = writeln!(output, "| {} |", table.columns.join(" | "));
    let _ = writeln!(
        output,
        "|{}|",
        table
            .columns
            .iter()
            .map(|_| " --- ")
            .collect::<Vec<_>>()
            .join("|")
    );
    for row in &table.rows {
        let cells: Vec<String> = table
            .columns
            .iter()
            .map(|column| cell_text(row.get(column)).replace('|', "\\|"))
            .collect();
        let _ = writeln!(output, "| {} |", cells.join(" | "));
    }
}

pub fn render_markdown(pages: &[Page]) -> String {
    let mut output = String::new();

    for (index, page) in pages.iter().enumerate() {
        if index > 0 {
            let _ = writeln!(output);
        }
        let _ = writeln!(output, "# {}", page.title);

        for section in &page.sections {
            let _ = writeln!(output);
            let _ = writeln!(output, "## {}", section.heading);
            let _ = writeln!(output);
            match &section.body {
                SectionBody::Table(table) => write_markdown_table(&mut output, table),
                SectionBody::NoData { message } => {
                    let _ = writeln!(output, "{message}");
                }
            }
        }
    }

    output
}

pub fn render_json(pages: &[Page]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(pages)
}

/// Writes every section as a block: a heading record, the column header and
/// the rows, followed by an empty record.
pub fn render_csv(pages: &[Page]) -> anyhow::Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    for page in pages {
        for section in &page.sections {
            writer.write_record([page.title.as_str(), section.heading.as_str()])?;
            match &section.body {
                SectionBody::Table(table) => {
                    writer.write_record(&table.columns)?;
                    for row in &table.rows {
                        writer.write_record(
                            table.columns.iter().map(|column| match row.get(column) {
                                None | Some(Value::Null) => String::new(),
                                value => cell_text(value),
                            }),
                        )?;
                    }
                }
                SectionBody::NoData { message } => {
                    writer.write_record([message.as_str()])?;
                }
            }
            writer.write_record([""])?;
        }
    }

    let bytes = writer.into_inner().map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::Section;
    use serde_json::{json, Map};

    fn sample_pages() -> Vec<Page> {
        let mut row = Map::new();
        row.insert("pool_name".to_string(), json!("Java | Drive"));
        row.insert("average_score".to_string(), json!(76.7));
        row.insert("failed".to_string(), Value::Null);
        vec![Page {
            title: "Skill-2030 Dashboard - Interviews".to_string(),
            sections: vec![
                Section {
                    heading: "Performance Metrics".to_string(),
                    body: SectionBody::Table(Table {
                        columns: vec![
                            "pool_name".to_string(),
                            "average_score".to_string(),
                            "failed".to_string(),
                        ],
                        rows: vec![row],
                    }),
                },
                Section {
                    heading: "Sub-Category Performance Metrics".to_string(),
                    body: SectionBody::NoData {
                        message: "No performance data available.".to_string(),
                    },
                },
            ],
        }]
    }

    #[test]
    fn markdown_renders_tables_and_no_data() {
        let markdown = render_markdown(&sample_pages());
        assert!(markdown.starts_with("# Skill-2030 Dashboard - Interviews\n"));
        assert!(markdown.contains("| pool_name | average_score | failed |"));
        assert!(markdown.contains("| Java \\| Drive | 76.7 | n/a |"));
        assert!(markdown.contains("## Sub-Category Performance Metrics\n\nNo performance data available."));
    }

    #[test]
    fn json_tags_section_kinds() {
        let rendered = render_json(&sample_pages()).unwrap();
        let value: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value[0]["sections"][0]["body"]["kind"], json!("table"));
        assert_eq!(value[0]["sections"][1]["body"]["kind"], json!("no_data"));
    }

    #[test]
    fn csv_writes_blocks_per_section() {
        let rendered = render_csv(&sample_pages()).unwrap();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "Skill-2030 Dashboard - Interviews,Performance Metrics");
        assert_eq!(lines[1], "pool_name,average_score,failed");
        assert_eq!(lines[2], "Java | Drive,76.7,");
        assert_eq!(lines[4], "Skill-2030 Dashboard - Interviews,Sub-Category Performance Metrics");
    }
}
