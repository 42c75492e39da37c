use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use tokio::process::Command;

use crate::models::SourceUnit;

/// One unit per non-empty page, via poppler's `pdftotext`.
pub async fn extract_pdf_units(pdf_path: &Path) -> Result<Vec<SourceUnit>> {
    if !has_command("pdftotext").await || !has_command("pdfinfo").await {
        anyhow::bail!(
            "pdftotext/pdfinfo not found on PATH; install poppler-utils to ingest {}",
            pdf_path.display()
        );
    }

    let source = pdf_path.display().to_string();
    let page_count = get_pdf_page_count(pdf_path).await?;
    let mut units = Vec::with_capacity(page_count);

    for page in 1..=page_count {
        let output = Command::new("pdftotext")
            .arg("-f")
            .arg(page.to_string())
            .arg("-l")
            .arg(page.to_string())
            .arg("-nopgbrk")
            .arg(pdf_path)
            .arg("-")
            .output()
            .await
            .with_context(|| format!("failed to run pdftotext for page {}", page))?;

        if !output.status.success() {
            tracing::warn!(%source, page, "pdftotext failed, skipping page");
            continue;
        }

        let content = normalize_text(&String::from_utf8_lossy(&output.stdout));
        if content.is_empty() {
            continue;
        }

        units.push(SourceUnit {
            source: source.clone(),
            page: Some(page as i64),
            content,
        });
    }

    Ok(units)
}

async fn get_pdf_page_count(pdf_path: &Path) -> Result<usize> {
    let output = Command::new("pdfinfo")
        .arg(pdf_path)
        .output()
        .await
        .context("failed to run pdfinfo")?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("pdfinfo exited with non-zero status"));
    }

    parse_page_count(&String::from_utf8_lossy(&output.stdout))
}

fn parse_page_count(pdfinfo_stdout: &str) -> Result<usize> {
    let regex = Regex::new(r"(?m)^Pages:\s+(\d+)\s*$")?;
    regex
        .captures(pdfinfo_stdout)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<usize>().ok())
        .ok_or_else(|| anyhow::anyhow!("unable to parse page count from pdfinfo"))
}

async fn has_command(binary: &str) -> bool {
    Command::new("which")
        .arg(binary)
        .output()
        .await
        .map(|out| out.status.success() && !out.stdout.is_empty())
        .unwrap_or(false)
}

/// Keeps line structure for the splitter; only typographic noise is folded.
pub(crate) fn normalize_text(input: &str) -> String {
    input
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{00A0}', '\u{000C}'], " ")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
