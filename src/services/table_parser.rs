//! 表格响应解析服务 - 业务能力层
//!
//! 只负责"把松散的两列表格文本解析为 标签→值 映射"能力。
//! 引擎的输出不保证规整：可能包围代码栅栏、混入说明文字、
//! 带表头/分隔行、行尾多出备注列——能解析多少就解析多少，
//! 单行失败只跳过该行，绝不让整个文档失败

/// 解析结果（显式带标签，而不是靠形状猜测）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// 解析出至少一行 (标签, 值)；值为 None 表示引擎明确返回 null/空
    Parsed(Vec<(String, Option<String>)>),
    /// 输入为空白
    Empty,
    /// 输入非空但没有任何可识别的表格行
    NoTable(String),
}

/// 表格分隔符
const DELIMITER: char = '|';

/// 解析引擎的原始响应
pub fn parse_table(response: &str) -> ParseOutcome {
    let stripped = strip_fences(response);
    if stripped.trim().is_empty() {
        return ParseOutcome::Empty;
    }

    let lines: Vec<&str> = stripped.lines().map(str::trim).collect();
    let body_start = skip_header_lines(&lines);

    let mut rows: Vec<(String, Option<String>)> = Vec::new();
    for line in &lines[body_start..] {
        if let Some(row) = parse_row(line) {
            rows.push(row);
        }
    }

    if rows.is_empty() {
        ParseOutcome::NoTable("响应中没有可识别的表格行".to_string())
    } else {
        ParseOutcome::Parsed(rows)
    }
}

/// 去掉首尾的代码栅栏标记
fn strip_fences(text: &str) -> String {
    let mut lines: Vec<&str> = text.trim().lines().collect();
    while lines
        .first()
        .map(|l| l.trim_start().starts_with("```"))
        .unwrap_or(false)
    {
        lines.remove(0);
    }
    while lines
        .last()
        .map(|l| l.trim_start().starts_with("```"))
        .unwrap_or(false)
    {
        lines.pop();
    }
    lines.join("\n")
}

/// 跳过开头 1-3 行表头/分隔行，返回正文起始下标
fn skip_header_lines(lines: &[&str]) -> usize {
    let mut start = 0;
    for line in lines.iter().take(3) {
        if is_header_line(line) || is_separator_line(line) {
            start += 1;
        } else {
            break;
        }
    }
    start
}

/// 表头行：同时包含 "field" 类 token 与 "value" 类 token
fn is_header_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    let has_field = lower.contains("field") || lower.contains("attribute") || lower.contains("label");
    let has_value = lower.contains("value") || lower.contains("answer");
    has_field && has_value
}

/// 纯分隔行：只由 - | : 空格 组成
fn is_separator_line(line: &str) -> bool {
    !line.is_empty()
        && line
            .chars()
            .all(|c| c == '-' || c == DELIMITER || c == ':' || c.is_whitespace())
}

/// 解析单行：必须以分隔符开头和结尾，至少两个非空单元格；
/// 第二个之后的单元格（备注列）忽略
fn parse_row(line: &str) -> Option<(String, Option<String>)> {
    if !line.starts_with(DELIMITER) || !line.ends_with(DELIMITER) || line.len() < 2 {
        return None;
    }
    if is_separator_line(line) {
        return None;
    }

    let inner = &line[1..line.len() - 1];
    let cells: Vec<&str> = inner.split(DELIMITER).map(str::trim).collect();
    if cells.len() < 2 {
        return None;
    }

    let label = cells[0];
    let value = cells[1];
    if label.is_empty() || value.is_empty() {
        // 空值单元格仍然算一行（值归一化为 None），空标签则整行跳过
        if label.is_empty() {
            return None;
        }
        return Some((label.to_string(), None));
    }

    Some((label.to_string(), normalize_null(value)))
}

/// `null`（不区分大小写）与空串归一化为 None
fn normalize_null(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(outcome: ParseOutcome) -> Vec<(String, Option<String>)> {
        match outcome {
            ParseOutcome::Parsed(rows) => rows,
            other => panic!("期望 Parsed，实际: {:?}", other),
        }
    }

    #[test]
    fn test_parse_simple_table() {
        let response = "| Status | Covered |";
        let rows = rows(parse_table(response));
        assert_eq!(rows, vec![("Status".to_string(), Some("Covered".to_string()))]);
    }

    #[test]
    fn test_parse_with_fences_and_header() {
        let response = "```markdown\n| Field | Value |\n| --- | --- |\n| Deductible | Nil |\n| CoInsurance | 10% |\n```";
        let rows = rows(parse_table(response));
        assert_eq!(
            rows,
            vec![
                ("Deductible".to_string(), Some("Nil".to_string())),
                ("CoInsurance".to_string(), Some("10%".to_string())),
            ]
        );
    }

    #[test]
    fn test_null_token_normalized() {
        let response = "| Deductible | null |\n| Maternity | NULL |\n| CoPay |  |";
        let rows = rows(parse_table(response));
        assert_eq!(rows[0].1, None);
        assert_eq!(rows[1].1, None);
        assert_eq!(rows[2].1, None);
    }

    #[test]
    fn test_bad_lines_skipped_not_fatal() {
        let response = "Here is the table you asked for:\n| Deductible | Nil |\nsome stray prose\n| broken line\n| Status | Covered | see page 12 |";
        let rows = rows(parse_table(response));
        assert_eq!(rows.len(), 2);
        // 第三列（备注）被忽略
        assert_eq!(rows[1], ("Status".to_string(), Some("Covered".to_string())));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse_table("   \n  "), ParseOutcome::Empty);
        assert_eq!(parse_table("```\n```"), ParseOutcome::Empty);
    }

    #[test]
    fn test_no_table_is_tagged_not_fatal() {
        let outcome = parse_table("I could not find any of the requested fields in this document.");
        assert!(matches!(outcome, ParseOutcome::NoTable(_)));
    }

    #[test]
    fn test_header_with_attribute_token() {
        let response = "| Attribute | Answer |\n| Deductible | Nil |";
        let rows = rows(parse_table(response));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "Deductible");
    }
}
