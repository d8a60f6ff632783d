use std::path::Path;

use anyhow::{Context, Result};
use chrono::Datelike;

pub const INDEX_FILE: &str = "index.html";
pub const LICENSE_FILE: &str = "LICENSE";
pub const README_FILE: &str = "README.md";

/// Characters of markup previewed in the README.
pub const README_PREVIEW_CHARS: usize = 500;

/// MIT license text for `holder`, dated `year`.
pub fn license_text(year: i32, holder: &str) -> String {
    format!(
        r#"MIT License

Copyright (c) {year} {holder}

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in
all copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
THE SOFTWARE.
"#
    )
}

/// README summarising the task, round and the start of the markup.
pub fn readme_text(task: &str, round: u32, markup: &str) -> String {
    let preview: String = markup.chars().take(README_PREVIEW_CHARS).collect();
    format!(
        "# {}\n\nGenerated for round {}\n\nBrief:\n{}...\n\n## License\nMIT",
        task, round, preview
    )
}

/// Writes the site's entry document and metadata files.
pub struct SiteBuilder {
    license_holder: String,
}

impl SiteBuilder {
    pub fn new(license_holder: impl Into<String>) -> Self {
        Self {
            license_holder: license_holder.into(),
        }
    }

    /// Write `index.html` and `README.md`, and `LICENSE` if it is missing.
    pub fn write(&self, dir: &Path, task: &str, round: u32, markup: &str) -> Result<()> {
        write_file(&dir.join(INDEX_FILE), markup)?;

        let license = dir.join(LICENSE_FILE);
        if !license.exists() {
            let year = chrono::Utc::now().year();
            write_file(&license, &license_text(year, &self.license_holder))?;
        }

        write_file(&dir.join(README_FILE), &readme_text(task, round, markup))?;
        Ok(())
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}
