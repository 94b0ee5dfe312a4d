//! Show command implementation for Searchbook CLI.
//!
//! Runs a single file block and prints the fetched lines.

use std::path::PathBuf;

use searchbook_core::{
    Block, BlockDependencies, BlockInput, FileBlockInput, LineRange, Notebook,
};

use crate::colors;

/// Parse a 1-based inclusive `start-end` range (or a single line) into a
/// 0-based, end-exclusive range.
fn parse_line_range(text: &str) -> anyhow::Result<LineRange> {
    let parse = |part: &str| -> anyhow::Result<u32> {
        let line: u32 = part
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid line number '{}' in '{}'", part, text))?;
        if line == 0 {
            anyhow::bail!("Line numbers start at 1: '{}'", text);
        }
        Ok(line)
    };

    let (start, end) = match text.split_once('-') {
        Some((start, end)) => (parse(start)?, parse(end)?),
        None => {
            let line = parse(text)?;
            (line, line)
        }
    };
    if end < start {
        anyhow::bail!("Line range ends before it starts: '{}'", text);
    }
    Ok(LineRange::new(start - 1, end))
}

/// Undo the HTML escaping applied to fetched lines.
fn unescape_html(line: &str) -> String {
    line.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Show a file (or part of one) headlessly.
pub async fn execute(
    repository: &str,
    path: &str,
    revision: &str,
    lines: Option<&str>,
    repos_root: PathBuf,
) -> anyhow::Result<()> {
    if !repos_root.is_dir() {
        anyhow::bail!("Repository root not found: {}", repos_root.display());
    }
    let line_range = lines.map(parse_line_range).transpose()?;
    let first_line = line_range.map_or(1, |range| range.start_line + 1);

    let mut notebook = Notebook::new(
        vec![BlockInput::File(FileBlockInput {
            repository_name: repository.to_string(),
            revision: revision.to_string(),
            file_path: path.to_string(),
            line_range,
        })],
        BlockDependencies::default(),
        searchbook_server::local_services(repos_root),
    );
    let Some(block_id) = notebook.first_block_id() else {
        anyhow::bail!("Notebook has no file block");
    };
    notebook.run_block_by_id(block_id);

    let output = match notebook.block_by_id(block_id) {
        Some(Block::File(block)) => block.output.clone(),
        _ => None,
    };
    let Some(output) = output else {
        anyhow::bail!("File block produced no output");
    };

    match output.resolved().await {
        Ok(lines) => {
            for (offset, line) in lines.iter().enumerate() {
                println!(
                    "{}{:>5}{} {}",
                    colors::DIM,
                    first_line as usize + offset,
                    colors::RESET,
                    unescape_html(line)
                );
            }
            Ok(())
        }
        Err(e) => anyhow::bail!("{}: {}/{}", e, repository, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_range() {
        assert_eq!(parse_line_range("10-20").unwrap(), LineRange::new(9, 20));
        assert_eq!(parse_line_range("3").unwrap(), LineRange::new(2, 3));
        assert_eq!(parse_line_range(" 1 - 2 ").unwrap(), LineRange::new(0, 2));
    }

    #[test]
    fn test_parse_line_range_errors() {
        assert!(parse_line_range("0-4").is_err());
        assert!(parse_line_range("5-4").is_err());
        assert!(parse_line_range("a-b").is_err());
        assert!(parse_line_range("").is_err());
    }

    #[test]
    fn test_unescape_html() {
        assert_eq!(
            unescape_html("a &lt;b&gt; &amp;&amp; &quot;c&quot; &#39;d&#39;"),
            "a <b> && \"c\" 'd'"
        );
        assert_eq!(unescape_html("&amp;lt;"), "&lt;");
    }
}
