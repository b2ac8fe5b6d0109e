//! Deterministic splitting of source material into retrievable chunks.
//!
//! Two shapes of input are handled:
//! - tabular records, one chunk per row, rendered through a [`RecordSchema`]
//! - long-form text, split on known section headers with a blank-line
//!   paragraph fallback ([`SectionChunker`]), optionally grouped by major first
//!   ([`CurriculumChunker`])
//!
//! Nothing in here fails: malformed or empty input produces fewer chunks.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use super::store::{AttributeValue, Attributes, DocType};

/// Default section headers of a curriculum plan, matched in document order.
pub const DEFAULT_SECTION_HEADERS: [&str; 10] = [
    r"一、专业介绍",
    r"二、培养目标与毕业要求",
    r"三、主干学科与专业核心课",
    r"四、课程设置及学分分配表",
    r"五、课程体系配置流程图",
    r"六、指导性教学计划进程",
    r"七、实践教学",
    r"八、毕业要求",
    r"九、就业方向",
    r"十、继续深造",
];

/// Heading that opens one major inside a combined plan file. Group 1 is the major name.
pub const DEFAULT_MAJOR_HEADING: &str = r"(?m)^##\s*(.+?)\s*(?:专业)?专业培养方案\s*$";

pub const DEFAULT_MIN_SECTION_CHARS: usize = 50;

const TITLE_MAX_CHARS: usize = 50;

static PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t\r]*\n").unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static DEFAULT_HEADER_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    DEFAULT_SECTION_HEADERS
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
});

/// Text plus metadata, before an id and embedding are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub doc_type: DocType,
    pub attributes: Attributes,
}

// ============================================================================
// Records
// ============================================================================

/// One parsed row: column name to raw cell value.
pub type Record = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq)]
pub enum BlankPolicy {
    /// Leave the field out of the generated text.
    Omit,
    /// Render the field with this marker in place of the value.
    Marker(String),
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Column header in the source data
    pub column: String,
    /// Attribute key on the produced document
    pub key: String,
    /// Label used in the generated description
    pub label: String,
    pub blank: BlankPolicy,
    /// Store as a number when the value parses as one
    pub numeric: bool,
}

impl FieldSpec {
    pub fn new(column: &str, key: &str, label: &str) -> Self {
        Self {
            column: column.to_string(),
            key: key.to_string(),
            label: label.to_string(),
            blank: BlankPolicy::Marker("not provided".to_string()),
            numeric: false,
        }
    }

    pub fn omit_when_blank(mut self) -> Self {
        self.blank = BlankPolicy::Omit;
        self
    }

    pub fn marker(mut self, marker: &str) -> Self {
        self.blank = BlankPolicy::Marker(marker.to_string());
        self
    }

    pub fn numeric(mut self) -> Self {
        self.numeric = true;
        self
    }
}

/// Fixed field order and rendering rules for one kind of record.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    pub doc_type: DocType,
    pub title: String,
    pub fields: Vec<FieldSpec>,
}

impl RecordSchema {
    /// Graduate roster columns as exported by the registrar.
    pub fn graduate() -> Self {
        const MISSING: &str = "未提供";
        Self {
            doc_type: DocType::Graduate,
            title: "毕业生".to_string(),
            fields: vec![
                FieldSpec::new("姓名", "name", "姓名").marker(MISSING),
                FieldSpec::new("学号", "student_id", "学号").marker(MISSING),
                FieldSpec::new("GPA", "gpa", "GPA成绩").marker(MISSING).numeric(),
                FieldSpec::new("所在地", "location", "所在地").marker(MISSING),
                FieldSpec::new("发展方向", "career_path", "发展方向").marker(MISSING),
                FieldSpec::new("就业去向", "employer", "就业去向").omit_when_blank(),
                FieldSpec::new("年薪", "salary", "年薪").marker(MISSING).numeric(),
            ],
        }
    }

    /// Schema that keeps every column as-is, in the given order.
    pub fn from_columns(doc_type: DocType, columns: &[String]) -> Self {
        Self {
            title: doc_type.as_str().to_string(),
            fields: columns
                .iter()
                .map(|c| FieldSpec::new(c, c, c))
                .collect(),
            doc_type,
        }
    }
}

pub struct RecordChunker {
    schema: RecordSchema,
}

impl RecordChunker {
    pub fn new(schema: RecordSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// One chunk per row; rows with every field blank are skipped.
    pub fn chunk(&self, rows: &[Record]) -> Vec<Chunk> {
        rows.iter().filter_map(|row| self.describe(row)).collect()
    }

    fn describe(&self, row: &Record) -> Option<Chunk> {
        let mut parts = Vec::with_capacity(self.schema.fields.len());
        let mut attributes = Attributes::new();
        let mut any_value = false;

        for field in &self.schema.fields {
            let value = row
                .get(&field.column)
                .map(|v| clean_text(v))
                .unwrap_or_default();

            if value.is_empty() {
                attributes.insert(field.key.clone(), AttributeValue::Text(String::new()));
                if let BlankPolicy::Marker(marker) = &field.blank {
                    parts.push(format!("{}: {}", field.label, marker));
                }
                continue;
            }

            any_value = true;
            parts.push(format!("{}: {}", field.label, value));

            let attr = match value.parse::<f64>() {
                Ok(n) if field.numeric && n.is_finite() => AttributeValue::Number(n),
                _ => AttributeValue::Text(value),
            };
            attributes.insert(field.key.clone(), attr);
        }

        if !any_value {
            return None;
        }

        Some(Chunk {
            text: format!("{}. {}", self.schema.title, parts.join("; ")),
            doc_type: self.schema.doc_type.clone(),
            attributes,
        })
    }
}

/// Collapse internal whitespace runs and trim.
pub fn clean_text(value: &str) -> String {
    WHITESPACE_RUN.replace_all(value.trim(), " ").into_owned()
}

// ============================================================================
// Long-form text
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub title: String,
    pub text: String,
}

#[derive(Clone)]
pub struct SectionChunker {
    headers: Vec<Regex>,
    min_chars: usize,
}

impl Default for SectionChunker {
    fn default() -> Self {
        Self {
            headers: (*DEFAULT_HEADER_REGEXES).clone(),
            min_chars: DEFAULT_MIN_SECTION_CHARS,
        }
    }
}

impl SectionChunker {
    pub fn new(patterns: &[String], min_chars: usize) -> Result<Self> {
        let headers = patterns
            .iter()
            .map(|p| Regex::new(p).with_context(|| format!("Invalid section header pattern: {}", p)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { headers, min_chars })
    }

    pub fn min_chars(&self) -> usize {
        self.min_chars
    }

    /// Every section in document order, including short ones.
    ///
    /// Stripping whitespace from the concatenation of the returned texts gives
    /// the input with whitespace stripped.
    pub fn split_sections(&self, content: &str) -> Vec<Section> {
        let mut matches: Vec<(usize, usize)> = self
            .headers
            .iter()
            .flat_map(|re| re.find_iter(content).map(|m| (m.start(), m.end())))
            .filter(|(start, end)| end > start)
            .collect();
        matches.sort();

        // drop matches that start inside an earlier header
        let mut headers: Vec<(usize, usize)> = Vec::with_capacity(matches.len());
        for m in matches {
            match headers.last() {
                Some(&(_, last_end)) if m.0 < last_end => continue,
                _ => headers.push(m),
            }
        }

        if headers.is_empty() {
            return split_paragraphs(content);
        }

        let mut sections = Vec::with_capacity(headers.len() + 1);

        let preamble = content[..headers[0].0].trim();
        if !preamble.is_empty() {
            sections.push(Section {
                title: first_line_title(preamble),
                text: preamble.to_string(),
            });
        }

        for (i, &(start, header_end)) in headers.iter().enumerate() {
            let end = headers
                .get(i + 1)
                .map(|&(next, _)| next)
                .unwrap_or(content.len());
            let text = content[start..end].trim();
            if text.is_empty() {
                continue;
            }
            sections.push(Section {
                title: content[start..header_end].trim().to_string(),
                text: text.to_string(),
            });
        }

        sections
    }

    /// Sections long enough to be worth retrieving, paired with their
    /// position in [`split_sections`](Self::split_sections).
    pub fn chunk(&self, content: &str) -> Vec<(usize, Section)> {
        self.split_sections(content)
            .into_iter()
            .enumerate()
            .filter(|(_, s)| s.text.chars().count() >= self.min_chars)
            .collect()
    }

    /// Sections as chunks of the given type with index and title attributes.
    pub fn chunk_as(&self, content: &str, doc_type: &DocType) -> Vec<Chunk> {
        self.chunk(content)
            .into_iter()
            .map(|(index, section)| section_chunk(section, index, doc_type, None))
            .collect()
    }
}

fn split_paragraphs(content: &str) -> Vec<Section> {
    PARAGRAPH_BREAK
        .split(content)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| Section {
            title: first_line_title(p),
            text: p.to_string(),
        })
        .collect()
}

fn first_line_title(text: &str) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    if line.chars().count() > TITLE_MAX_CHARS {
        let head: String = line.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", head)
    } else {
        line.to_string()
    }
}

fn section_chunk(section: Section, index: usize, doc_type: &DocType, major: Option<&str>) -> Chunk {
    let mut attributes = Attributes::new();
    if let Some(major) = major {
        attributes.insert("major".to_string(), AttributeValue::from(major));
    }
    attributes.insert("section_index".to_string(), AttributeValue::from(index));
    attributes.insert("section_title".to_string(), AttributeValue::from(section.title));

    Chunk {
        text: section.text,
        doc_type: doc_type.clone(),
        attributes,
    }
}

// ============================================================================
// Curriculum plans
// ============================================================================

/// Splits a combined plan file by major, then each major by section.
pub struct CurriculumChunker {
    major_heading: Regex,
    sections: SectionChunker,
}

impl Default for CurriculumChunker {
    fn default() -> Self {
        Self {
            major_heading: Regex::new(DEFAULT_MAJOR_HEADING).unwrap(),
            sections: SectionChunker::default(),
        }
    }
}

impl CurriculumChunker {
    pub fn new(major_heading: &str, sections: SectionChunker) -> Result<Self> {
        let major_heading = Regex::new(major_heading)
            .with_context(|| format!("Invalid major heading pattern: {}", major_heading))?;
        Ok(Self {
            major_heading,
            sections,
        })
    }

    /// Content without any major heading is treated as a single major named
    /// `fallback_major`.
    pub fn chunk(&self, content: &str, fallback_major: &str) -> Vec<Chunk> {
        self.split_majors(content, fallback_major)
            .into_iter()
            .flat_map(|(major, body)| {
                self.sections
                    .chunk(body)
                    .into_iter()
                    .map(move |(index, section)| {
                        section_chunk(section, index, &DocType::CurriculumSection, Some(major.as_str()))
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn split_majors<'a>(&self, content: &'a str, fallback_major: &str) -> Vec<(String, &'a str)> {
        let headings: Vec<(usize, usize, String)> = self
            .major_heading
            .captures_iter(content)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let name = caps
                    .get(1)
                    .map(|m| clean_text(m.as_str()))
                    .unwrap_or_else(|| clean_text(whole.as_str()));
                Some((whole.start(), whole.end(), name))
            })
            .collect();

        if headings.is_empty() {
            return vec![(fallback_major.to_string(), content)];
        }

        let mut majors = Vec::with_capacity(headings.len() + 1);

        let preamble = &content[..headings[0].0];
        if !preamble.trim().is_empty() {
            majors.push((fallback_major.to_string(), preamble));
        }

        for (i, (_, body_start, name)) in headings.iter().enumerate() {
            let end = headings
                .get(i + 1)
                .map(|(next, _, _)| *next)
                .unwrap_or(content.len());
            majors.push((name.clone(), &content[*body_start..end]));
        }

        majors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_ws(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    fn graduate_row(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    const PLAN: &str = "一、专业介绍\n本专业培养具备计算机系统设计与开发能力的高级工程技术人才，面向国家信息产业发展需求，强调理论与实践结合。\n\n\
二、培养目标与毕业要求\n毕业生应掌握数学、自然科学和计算机专业知识，能够解决复杂工程问题，具备团队合作与终身学习能力以及国际视野。";

    #[test]
    fn test_record_one_chunk_per_row() {
        let chunker = RecordChunker::new(RecordSchema::graduate());
        let rows = vec![
            graduate_row(&[
                ("姓名", "张三"),
                ("学号", "2019001"),
                ("GPA", "3.8"),
                ("所在地", "重庆"),
                ("发展方向", "人工智能"),
                ("就业去向", "华为"),
                ("年薪", "300000"),
            ]),
            graduate_row(&[("姓名", "李四"), ("GPA", " 3.2 "), ("就业去向", "  ")]),
        ];

        let chunks = chunker.chunk(&rows);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.starts_with("毕业生. 姓名: 张三"));
        assert!(chunks[0].text.contains("就业去向: 华为"));
        assert_eq!(chunks[0].attributes["gpa"], AttributeValue::Number(3.8));
        assert_eq!(chunks[0].doc_type, DocType::Graduate);

        // blank employer is omitted from text but kept in the schema
        assert!(!chunks[1].text.contains("就业去向"));
        assert!(chunks[1].text.contains("年薪: 未提供"));
        assert!(chunks[1].text.contains("学号: 未提供"));
        assert_eq!(
            chunks[1].attributes["employer"],
            AttributeValue::Text(String::new())
        );
        assert_eq!(chunks[1].attributes.len(), 7);
    }

    #[test]
    fn test_record_field_order_is_fixed() {
        let chunker = RecordChunker::new(RecordSchema::graduate());
        let row = graduate_row(&[("年薪", "20万"), ("姓名", "王五")]);
        let chunk = &chunker.chunk(&[row])[0];
        let name_pos = chunk.text.find("姓名").unwrap();
        let salary_pos = chunk.text.find("年薪").unwrap();
        assert!(name_pos < salary_pos);
        // non-numeric salary stays text
        assert_eq!(chunk.attributes["salary"].as_text(), Some("20万"));
    }

    #[test]
    fn test_record_all_blank_row_skipped() {
        let chunker = RecordChunker::new(RecordSchema::graduate());
        let rows = vec![graduate_row(&[("姓名", " "), ("GPA", "")])];
        assert!(chunker.chunk(&rows).is_empty());
    }

    #[test]
    fn test_from_columns_schema() {
        let schema = RecordSchema::from_columns(
            DocType::Custom("course".to_string()),
            &["code".to_string(), "title".to_string()],
        );
        let chunker = RecordChunker::new(schema);
        let chunks = chunker.chunk(&[graduate_row(&[("code", "CS101"), ("title", "")])]);
        assert_eq!(chunks[0].text, "course. code: CS101; title: not provided");
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  a \n\t b  "), "a b");
    }

    #[test]
    fn test_split_on_headers() {
        let chunker = SectionChunker::default();
        let sections = chunker.split_sections(PLAN);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "一、专业介绍");
        assert_eq!(sections[1].title, "二、培养目标与毕业要求");
        assert!(sections[1].text.starts_with("二、培养目标与毕业要求"));
        assert_eq!(chunker.chunk(PLAN).len(), 2);
    }

    #[test]
    fn test_sections_in_document_order_not_pattern_order() {
        let chunker = SectionChunker::new(&["BETA".to_string(), "ALPHA".to_string()], 0).unwrap();
        let sections = chunker.split_sections("ALPHA one\nBETA two\nALPHA three");
        let titles: Vec<&str> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["ALPHA", "BETA", "ALPHA"]);
    }

    #[test]
    fn test_preamble_kept() {
        let chunker = SectionChunker::new(&["H1".to_string()], 0).unwrap();
        let sections = chunker.split_sections("intro text\nH1 body");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].text, "intro text");
    }

    #[test]
    fn test_paragraph_fallback() {
        let chunker = SectionChunker::new(&["NEVER".to_string()], 0).unwrap();
        let sections = chunker.split_sections("first para\nline two\n\n  \n second para \n\nthird");
        let texts: Vec<&str> = sections.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["first para\nline two", "second para", "third"]);
        assert_eq!(sections[0].title, "first para");
    }

    #[test]
    fn test_short_sections_dropped() {
        let chunker = SectionChunker::new(&["H".to_string()], 10).unwrap();
        let chunks = chunker.chunk("H short\nH this one is long enough");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].0, 1);
    }

    #[test]
    fn test_empty_input() {
        let chunker = SectionChunker::default();
        assert!(chunker.split_sections("").is_empty());
        assert!(chunker.chunk("   \n\n  ").is_empty());
        assert!(CurriculumChunker::default().chunk("", "x").is_empty());
    }

    #[test]
    fn test_reconstruction_property() {
        let inputs = [
            PLAN,
            "preamble\n一、专业介绍 a\n\n七、实践教学b八、毕业要求\n  c  ",
            "no headers here\n\njust paragraphs\n \n\nand more",
            "  leading space一、专业介绍",
        ];
        let pattern_sets: Vec<Vec<String>> = vec![
            DEFAULT_SECTION_HEADERS.iter().map(|s| s.to_string()).collect(),
            vec!["专业".to_string(), "a|b".to_string()],
            vec![r"\d+".to_string(), "".to_string()],
            vec![],
        ];

        for patterns in &pattern_sets {
            let chunker = SectionChunker::new(patterns, 0).unwrap();
            for input in inputs {
                let joined: String = chunker
                    .split_sections(input)
                    .iter()
                    .map(|s| s.text.as_str())
                    .collect();
                assert_eq!(strip_ws(&joined), strip_ws(input), "patterns {:?}", patterns);
            }
        }
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        assert!(SectionChunker::new(&["(unclosed".to_string()], 0).is_err());
    }

    #[test]
    fn test_curriculum_splits_majors() {
        let content = format!(
            "# 所有专业培养方案汇总\n\n## 计算机科学与技术专业专业培养方案\n\n{}\n\n## 软件工程专业专业培养方案\n\n{}",
            PLAN, PLAN
        );
        let chunks = CurriculumChunker::default().chunk(&content, "plans.txt");
        assert_eq!(chunks.len(), 4);
        assert_eq!(
            chunks[0].attributes["major"].as_text(),
            Some("计算机科学与技术")
        );
        assert_eq!(chunks[2].attributes["major"].as_text(), Some("软件工程"));
        assert_eq!(chunks[1].attributes["section_index"], AttributeValue::Number(1.0));
        assert_eq!(
            chunks[1].attributes["section_title"].as_text(),
            Some("二、培养目标与毕业要求")
        );
        assert!(chunks.iter().all(|c| c.doc_type == DocType::CurriculumSection));
    }

    #[test]
    fn test_major_name_drops_repeated_suffix() {
        let chunker = CurriculumChunker::default();
        for heading in [
            "## 计算机科学与技术 专业专业培养方案",
            "## 计算机科学与技术专业专业培养方案",
            "## 计算机科学与技术专业培养方案",
            "##计算机科学与技术 专业培养方案  ",
        ] {
            let chunks = chunker.chunk(&format!("{}\n\n{}", heading, PLAN), "plans.txt");
            assert_eq!(chunks.len(), 2, "{}", heading);
            assert_eq!(
                chunks[0].attributes["major"].as_text(),
                Some("计算机科学与技术"),
                "{}",
                heading
            );
        }
    }

    #[test]
    fn test_curriculum_without_major_heading() {
        let chunks = CurriculumChunker::default().chunk(PLAN, "cs_plan");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].attributes["major"].as_text(), Some("cs_plan"));
    }

    #[test]
    fn test_title_truncated() {
        let long = "x".repeat(80);
        let title = first_line_title(&long);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 3);
        assert!(title.ends_with("..."));
    }
}
