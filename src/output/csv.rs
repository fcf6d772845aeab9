// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use super::QueryResult;

pub struct CsvFormatter;

impl CsvFormatter {
    pub fn format(result: &QueryResult, no_headers: bool) -> String {
        let mut lines = Vec::new();

        if !no_headers {
            lines.push(result.columns.iter().map(|c| escape(c)).collect::<Vec<_>>().join(","));
        }

        for row in result.text_rows() {
            lines.push(row.iter().map(|v| escape(v)).collect::<Vec<_>>().join(","));
        }

        lines.join("\n")
    }
}

fn escape(val: &str) -> String {
    if val.contains(',') || val.contains('"') || val.contains('\n') {
        format!("\"{}\"", val.replace('"', "\"\""))
    } else {
        val.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_csv_escaping() {
        let result = QueryResult {
            columns: vec!["name".to_string(), "labels".to_string()],
            rows: vec![vec![json!("web"), json!({"app": "web", "tier": "fe"})]],
        };
        let out = CsvFormatter::format(&result, false);
        assert_eq!(out, "name,labels\nweb,\"{\"\"app\"\":\"\"web\"\",\"\"tier\"\":\"\"fe\"\"}\"");
    }

    #[test]
    fn test_csv_no_headers() {
        let result = QueryResult {
            columns: vec!["name".to_string()],
            rows: vec![vec![json!("a")], vec![serde_json::Value::Null]],
        };
        assert_eq!(CsvFormatter::format(&result, true), "a\n");
    }
}
