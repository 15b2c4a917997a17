//! Terminal rendering of check results and envelopes

use std::collections::BTreeMap;
use std::path::Path;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

use octp_core::checks::CheckResult;
use octp_core::envelope::Envelope;
use octp_core::integrity::{SignatureStatus, VerificationReport, VerifyOutcome};

const DETAIL_WIDTH: usize = 60;

/// Table row for a single check
#[derive(Tabled)]
struct CheckRow {
    #[tabled(rename = "Check")]
    name: String,
    #[tabled(rename = "Status")]
    status: &'static str,
    #[tabled(rename = "Tool")]
    tool: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

fn shorten(text: &str, width: usize) -> String {
    let single_line = text.lines().next().unwrap_or_default();
    if single_line.chars().count() > width {
        let cut: String = single_line.chars().take(width - 3).collect();
        format!("{cut}...")
    } else {
        single_line.to_string()
    }
}

pub fn print_check_results(results: &BTreeMap<String, CheckResult>) {
    if results.is_empty() {
        println!("\nNo checks ran (none selected or none available).\n");
        return;
    }

    let rows: Vec<CheckRow> = results
        .iter()
        .map(|(name, result)| CheckRow {
            name: name.clone(),
            status: if result.passed { "PASS" } else { "FAIL" },
            tool: result.tool_name.clone(),
            detail: shorten(&result.detail, DETAIL_WIDTH),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();

    let passed = results.values().filter(|r| r.passed).count();
    println!("\n{table}");
    println!("{passed}/{} checks passed\n", results.len());
}

pub fn print_envelope_summary(envelope: &Envelope, written_to: &Path) {
    println!("Envelope written to {}", written_to.display());
    println!("  Contribution:  {}", envelope.contribution_id);
    println!("  Repository:    {}", envelope.repository);
    println!("  Commit:        {}", envelope.commit_hash);
    println!(
        "  Provenance:    {} ({})",
        envelope.provenance.method.label(),
        envelope.provenance.human_review_level
    );
    if envelope.provenance.method.involves_ai() {
        let tools = envelope
            .provenance
            .ai_tools
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|t| format!("{} ({})", t.model, t.vendor))
            .collect::<Vec<_>>();
        let tools = if tools.is_empty() {
            "none declared".to_string()
        } else {
            tools.join(", ")
        };
        println!("  AI tools:      {tools}");
    }
    println!("  Developer:     {}", envelope.provenance.developer_id);
    println!(
        "  Tests:         {}",
        if envelope.verification.tests_passed {
            "passed"
        } else {
            "not passed"
        }
    );
    println!("  Static:        {}", envelope.verification.static_analysis);
    println!("  Dependencies:  {}", envelope.verification.dependency_check);
    if let Some(integrity) = &envelope.integrity {
        println!("  Payload hash:  {}", integrity.payload_hash);
    }
}

pub fn print_verification(report: &VerificationReport, path: &Path) {
    println!("Envelope: {}", path.display());

    if let Some(envelope) = &report.envelope {
        println!("  Contribution:  {}", envelope.contribution_id);
        println!("  Repository:    {}", envelope.repository);
        println!("  Commit:        {}", envelope.commit_hash);
        println!("  Developer:     {}", envelope.provenance.developer_id);
    }

    match &report.outcome {
        VerifyOutcome::Match => println!("  Payload hash:  MATCH"),
        VerifyOutcome::Mismatch { expected, actual } => {
            println!("  Payload hash:  MISMATCH");
            println!("    recorded:    {expected}");
            println!("    computed:    {actual}");
        }
        VerifyOutcome::MissingIntegrity => println!("  Payload hash:  MISSING (envelope is unsigned)"),
        VerifyOutcome::ParseError(message) => println!("  Unreadable:    {message}"),
    }

    let signature = match report.signature {
        SignatureStatus::NotChecked => "not checked",
        SignatureStatus::Valid => "VALID",
        SignatureStatus::Invalid => "INVALID",
    };
    println!("  Signature:     {signature}");
    println!();
    println!("{}", report.scope_note());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorten_keeps_first_line() {
        assert_eq!(shorten("3 passed\nmore", 60), "3 passed");
        assert_eq!(shorten("abcdefghij", 8), "abcde...");
        assert_eq!(shorten("", 8), "");
    }
}
