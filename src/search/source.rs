//! Reading and decoding knowledge-base sources.
//!
//! Decoding is where a source can fail (unreadable file, broken quoting,
//! JSON that is not an array of objects). The builder skips such a source
//! and records a warning; chunking itself never fails.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use super::chunker::Record;
use super::store::DocType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// Comma-separated rows with a header line
    Csv,
    /// JSON array of flat objects
    JsonRecords,
    /// Long-form text split into sections
    Text,
    /// Plan file that may contain several majors, each split into sections
    Curriculum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOrigin {
    Path(PathBuf),
    Inline(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub doc_type: DocType,
    pub format: SourceFormat,
    pub origin: SourceOrigin,
}

/// Decoded rows with their columns in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceContent {
    Table(Table),
    Text(String),
}

impl Source {
    pub fn file(
        id: impl Into<String>,
        path: impl Into<PathBuf>,
        format: SourceFormat,
        doc_type: DocType,
    ) -> Self {
        Self {
            id: id.into(),
            doc_type,
            format,
            origin: SourceOrigin::Path(path.into()),
        }
    }

    pub fn inline(
        id: impl Into<String>,
        content: impl Into<String>,
        format: SourceFormat,
        doc_type: DocType,
    ) -> Self {
        Self {
            id: id.into(),
            doc_type,
            format,
            origin: SourceOrigin::Inline(content.into()),
        }
    }

    pub fn read(&self) -> Result<String> {
        match &self.origin {
            SourceOrigin::Inline(content) => Ok(content.clone()),
            SourceOrigin::Path(path) => fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    pub fn load(&self) -> Result<SourceContent> {
        let raw = self.read()?;
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(&raw);

        match self.format {
            SourceFormat::Csv => parse_csv(raw)
                .map(SourceContent::Table)
                .with_context(|| format!("Failed to parse CSV source '{}'", self.id)),
            SourceFormat::JsonRecords => parse_json_records(raw)
                .map(SourceContent::Table)
                .with_context(|| format!("Failed to parse JSON source '{}'", self.id)),
            SourceFormat::Text | SourceFormat::Curriculum => Ok(SourceContent::Text(raw.to_string())),
        }
    }
}

/// RFC 4180 style: quoted fields, doubled quotes, CRLF or LF line ends.
pub fn parse_csv(content: &str) -> Result<Table> {
    let mut records = split_csv_records(content)?.into_iter();

    let columns: Vec<String> = match records.next() {
        Some(header) => header.into_iter().map(|h| h.trim().to_string()).collect(),
        None => bail!("missing header row"),
    };

    let mut rows = Vec::new();
    for (i, fields) in records.enumerate() {
        if fields.len() == 1 && fields[0].trim().is_empty() {
            continue;
        }
        if fields.len() > columns.len() {
            bail!(
                "row {} has {} fields but the header has {}",
                i + 2,
                fields.len(),
                columns.len()
            );
        }

        // short rows leave trailing columns blank
        let row: Record = columns
            .iter()
            .cloned()
            .zip(fields.into_iter().chain(std::iter::repeat(String::new())))
            .collect();
        rows.push(row);
    }

    Ok(Table { columns, rows })
}

fn split_csv_records(content: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        bail!("unterminated quoted field");
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    Ok(records)
}

/// A JSON array of flat objects; scalars are stringified, null becomes blank.
pub fn parse_json_records(content: &str) -> Result<Table> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    let items = value
        .as_array()
        .ok_or_else(|| anyhow!("expected a JSON array of records"))?;

    let mut columns: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(items.len());

    for (i, item) in items.iter().enumerate() {
        let object = item
            .as_object()
            .ok_or_else(|| anyhow!("record {} is not an object", i))?;

        let mut row = Record::new();
        for (key, value) in object {
            let cell = match value {
                serde_json::Value::Null => String::new(),
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                other => bail!("record {} field '{}' is not a scalar: {}", i, key, other),
            };
            if !columns.contains(key) {
                columns.push(key.clone());
            }
            row.insert(key.clone(), cell);
        }
        rows.push(row);
    }

    Ok(Table { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_csv_basic() {
        let table = parse_csv("姓名,GPA,年薪\n张三,3.8,30万\n李四,3.1,\n").unwrap();
        assert_eq!(table.columns, vec!["姓名", "GPA", "年薪"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0]["姓名"], "张三");
        assert_eq!(table.rows[1]["年薪"], "");
    }

    #[test]
    fn test_parse_csv_quotes_and_crlf() {
        let table = parse_csv("name,note\r\n\"Wang, Wu\",\"said \"\"hi\"\"\nthen left\"\r\n").unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0]["name"], "Wang, Wu");
        assert_eq!(table.rows[0]["note"], "said \"hi\"\nthen left");
    }

    #[test]
    fn test_parse_csv_short_row_and_blank_lines() {
        let table = parse_csv("a,b,c\n1\n\n2,3,4").unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0]["c"], "");
        assert_eq!(table.rows[1]["c"], "4");
    }

    #[test]
    fn test_parse_csv_errors() {
        assert!(parse_csv("").is_err());
        assert!(parse_csv("a,b\n1,2,3\n").is_err());
        assert!(parse_csv("a,b\n\"1,2\n").is_err());
    }

    #[test]
    fn test_parse_json_records() {
        let table = parse_json_records(r#"[{"name":"Li","gpa":3.5,"employer":null}]"#).unwrap();
        assert_eq!(table.rows[0]["gpa"], "3.5");
        assert_eq!(table.rows[0]["employer"], "");
        assert_eq!(table.columns.len(), 3);
    }

    #[test]
    fn test_parse_json_columns_keep_source_order() {
        let table = parse_json_records(
            r#"[{"姓名":"李四","毕业年份":"2023","gpa":3.5},{"姓名":"王五","admitted":true}]"#,
        )
        .unwrap();
        assert_eq!(table.columns, vec!["姓名", "毕业年份", "gpa", "admitted"]);
    }

    #[test]
    fn test_parse_json_records_errors() {
        assert!(parse_json_records("{not json").is_err());
        assert!(parse_json_records(r#"{"a":1}"#).is_err());
        assert!(parse_json_records(r#"[1, 2]"#).is_err());
        assert!(parse_json_records(r#"[{"a":[1]}]"#).is_err());
    }

    #[test]
    fn test_load_from_file_strips_bom() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("grads.csv");
        fs::write(&path, "\u{feff}姓名\n张三\n").unwrap();

        let source = Source::file("grads", &path, SourceFormat::Csv, DocType::Graduate);
        match source.load().unwrap() {
            SourceContent::Table(table) => assert_eq!(table.columns, vec!["姓名"]),
            other => panic!("unexpected content: {:?}", other),
        }
    }

    #[test]
    fn test_load_missing_file() {
        let source = Source::file(
            "missing",
            "/definitely/not/here.txt",
            SourceFormat::Text,
            DocType::CurriculumSection,
        );
        assert!(source.load().is_err());
    }
}
