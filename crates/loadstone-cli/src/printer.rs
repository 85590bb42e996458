// crates/loadstone-cli/src/printer.rs
// ============================================================================
// Module: Result Printer
// Description: Pluggable terminal output for run aggregates.
// Purpose: Keep the output surface swappable behind one capability.
// Dependencies: loadstone-core
// ============================================================================

//! ## Overview
//! [`ResultWriter`] is the single output capability the CLI needs; the
//! shipped [`AnsiResultWriter`] targets an ANSI terminal.

// ============================================================================
// SECTION: Imports
// ============================================================================

use loadstone_core::RunAggregate;

// ============================================================================
// SECTION: Capability
// ============================================================================

/// Writes a terminal aggregate for the user.
pub trait ResultWriter {
    /// Renders the aggregate.
    fn write_results(&self, aggregate: &RunAggregate);
}

// ============================================================================
// SECTION: ANSI Implementation
// ============================================================================

/// ANSI escape for bold text.
const BOLD: &str = "\x1b[1m";
/// ANSI escape for green text.
const GREEN: &str = "\x1b[32m";
/// ANSI escape for red text.
const RED: &str = "\x1b[31m";
/// ANSI escape for dim text.
const DIM: &str = "\x1b[2m";
/// ANSI reset.
const RESET: &str = "\x1b[0m";

/// Aggregate printer for ANSI terminals.
pub struct AnsiResultWriter;

impl ResultWriter for AnsiResultWriter {
    fn write_results(&self, aggregate: &RunAggregate) {
        println!();
        println!("{BOLD}Run {}{RESET}", aggregate.run_token);
        println!("{DIM}{}{RESET}", "-".repeat(46));
        println!("  requests        {}", aggregate.total_requests);
        println!("  successful      {GREEN}{}{RESET}", aggregate.successful_requests);
        let failed_color = if aggregate.failed_requests > 0 { RED } else { GREEN };
        println!("  failed          {failed_color}{}{RESET}", aggregate.failed_requests);
        println!("  peak rps        {:.1}", aggregate.requests_per_second);
        println!("  elapsed         {} ms", aggregate.total_elapsed_time);
        println!();
        println!("  latency (ms)    avg {:.1}  min {:.1}  max {:.1}",
            aggregate.average_response_time,
            aggregate.min_response_time,
            aggregate.max_response_time
        );
        println!(
            "  percentiles     p50 {:.1}  p75 {:.1}  p90 {:.1}  p95 {:.1}  p99 {:.1}",
            aggregate.percentile50,
            aggregate.percentile75,
            aggregate.percentile90,
            aggregate.percentile95,
            aggregate.percentile99
        );
        if !aggregate.status_codes.is_empty() {
            println!();
            println!("  status codes");
            for (status, breakdown) in &aggregate.status_codes {
                let color = if (200 .. 300).contains(status) { GREEN } else { RED };
                println!(
                    "    {color}{status}{RESET}  count {}  avg {:.1} ms  p95 {:.1} ms",
                    breakdown.count, breakdown.average_response_time, breakdown.percentile95
                );
            }
        }
        println!();
    }
}
