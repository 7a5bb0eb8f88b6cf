//! Minimal HTML page holding rows of inline SVG charts.

use std::path::Path;

use crate::error::AppError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HtmlPage {
    pub title: String,
    /// Each row is laid out left to right.
    pub rows: Vec<Vec<String>>,
}

impl HtmlPage {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, charts: Vec<String>) {
        self.rows.push(charts);
    }

    pub fn render(&self) -> String {
        let title = escape(&self.title);
        let mut out = String::new();
        out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        out.push_str(&format!("<title>{title}</title>\n"));
        out.push_str("<style>body{font-family:sans-serif}.row{display:flex;gap:8px}</style>\n");
        out.push_str("</head>\n<body>\n");
        out.push_str(&format!("<h1>{title}</h1>\n"));
        for row in &self.rows {
            out.push_str("<div class=\"row\">\n");
            for chart in row {
                out.push_str(chart);
                out.push('\n');
            }
            out.push_str("</div>\n");
        }
        out.push_str("</body>\n</html>\n");
        out
    }

    /// Write the page, creating the parent directory if needed.
    pub fn write(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| AppError::io("create directory", parent, e))?;
        }
        std::fs::write(path, self.render()).map_err(|e| AppError::io("write", path, e))?;
        log::info!("wrote {}", path.display());
        Ok(())
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
