//! Terminal rendering for outcomes and rule summaries.

use pickup_core::RawUtterance;
use pickup_core::config::{DispatchRules, RulesSummary};
use pickup_engine::{Outcome, dispatch_line};

/// One line per request: the dispatch record, or `FAIL|<status>|<reason>|<addr_type>|<transcript>`.
pub fn outcome_line(outcome: &Outcome, call: &RawUtterance, rules: &DispatchRules) -> String {
    match outcome {
        Outcome::Resolved(result) => dispatch_line(result, call, rules),
        Outcome::Failed(f) => format!(
            "FAIL|{}|{}|{}|{}",
            outcome.status(),
            f.reason.code(),
            f.addr_type.code(),
            call.transcript
        ),
        Outcome::TimedOut => format!("FAIL|{}|timeout||{}", outcome.status(), call.transcript),
        Outcome::SystemError => {
            format!("FAIL|{}|system-error||{}", outcome.status(), call.transcript)
        }
    }
}

/// Card view of a single outcome, followed by its dispatch record.
pub fn print_outcome(outcome: &Outcome, call: &RawUtterance, rules: &DispatchRules) {
    println!("── Request ──");
    println!("  {:<12} {}", "transcript", call.transcript);
    println!("  {:<12} {}", "status", outcome.status());

    match outcome {
        Outcome::Resolved(r) => {
            println!();
            println!("── Resolution ──");
            println!("  {:<12} {}", "kind", r.kind.as_str());
            println!("  {:<12} {}", "address", r.display_address);
            if let Some(second) = &r.secondary_display_address {
                println!("  {:<12} {second}", "second road");
            }
            if !r.memo.is_empty() {
                println!("  {:<12} {}", "landmark", r.memo);
            }
            if !r.remark.is_empty() {
                println!("  {:<12} {}", "remark", r.remark);
            }
            println!("  {:<12} {:.6}, {:.6}", "lng, lat", r.lng, r.lat);
            println!();
            println!("── Dispatch ──");
            println!("  {}", dispatch_line(r, call, rules));
        }
        Outcome::Failed(f) => {
            println!("  {:<12} {}", "reason", f.reason.code());
            println!("  {:<12} {}", "addr type", f.addr_type.code());
        }
        Outcome::TimedOut => println!("  deadline exceeded"),
        Outcome::SystemError => println!("  backend failure, see log"),
    }
}

pub fn print_summary(summary: &RulesSummary, compiled_rules: usize) {
    println!("── Alias groups ({}) ──", summary.alias_groups);
    for (name, count) in &summary.groups {
        println!("  {name:<28} {count:>5}");
    }
    println!();
    println!("── Totals ──");
    println!("  {:<28} {:>5}", "alias rules", summary.alias_rules);
    println!("  {:<28} {:>5}", "compiled rules", compiled_rules);
    println!("  {:<28} {:>5}", "landmark targets", summary.terminal_rules);
    println!("  {:<28} {:>5}", "homophones", summary.homophones);
    println!("  {:<28} {:>5}", "filler words", summary.fillers);
    println!("  {:<28} {:>5}", "connectives", summary.connectives);
    println!("  {:<28} {:>5}", "geo zones", summary.zones);
}
