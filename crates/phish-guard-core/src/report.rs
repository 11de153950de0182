use std::fmt::Write;

use serde::Serialize;

use crate::analyzer::{CombinedResult, IndicatorMatch};

/// Format styles supported in default reporter implementations.
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Produce a report string from a `CombinedResult` using the desired format.
pub fn render_report(
    result: &CombinedResult,
    matches: &[IndicatorMatch],
    format: OutputFormat,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => render_human(result, matches),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&JsonReport {
            result,
            indicator_matches: matches,
        })?),
    }
}

fn render_human(result: &CombinedResult, matches: &[IndicatorMatch]) -> anyhow::Result<String> {
    let analysis = &result.ai_analysis.analysis;
    let mut out = String::new();
    writeln!(out, "Rule-based Score: {:.2}", result.rule_based_score)?;
    writeln!(
        out,
        "AI Score:         {:.2} (model {}, confidence {:.2})",
        result.ai_analysis.risk_score, analysis.model_version, analysis.confidence
    )?;
    writeln!(out, "Combined Risk:    {:.2}", result.combined_risk)?;
    writeln!(out)?;

    if matches.is_empty() {
        writeln!(out, "No indicator phrases matched.")?;
    } else {
        writeln!(out, "Matched Indicators:")?;
        for m in matches {
            writeln!(
                out,
                "  - {category:<12} \"{phrase}\" @ {start}..{end}",
                category = m.category,
                phrase = m.phrase,
                start = m.span.0,
                end = m.span.1,
            )?;
        }
    }

    let threats = &result.ai_analysis.detailed_threats;
    for (title, lines) in [
        ("Threat Indicators:", &threats.indicators),
        ("Reasoning:", &threats.reasoning),
        ("Recommended Actions:", &threats.actions),
    ] {
        if lines.is_empty() {
            continue;
        }
        writeln!(out)?;
        writeln!(out, "{title}")?;
        for line in lines {
            writeln!(out, "  - {}", sanitize_line(line))?;
        }
    }

    Ok(out)
}

fn sanitize_line(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\n' | '\r' => ' ',
            _ => c,
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    result: &'a CombinedResult,
    indicator_matches: &'a [IndicatorMatch],
}
