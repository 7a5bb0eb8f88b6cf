//! Terminal output for residual statistics.

use crate::domain::{ResidualResults, SweepPlan};
use crate::report::{NskySummary, summarize_camera};

/// Run header printed before the per-camera tables.
pub fn format_run_header(plan: &SweepPlan) -> String {
    let cameras: Vec<String> = plan.cameras().iter().map(|c| c.to_string()).collect();
    let nsky: Vec<String> = plan.nsky_list().iter().map(|n| n.to_string()).collect();

    let mut out = String::new();
    out.push_str("=== skysub - sky subtraction residuals ===\n");
    out.push_str(&format!("Night: {} | Exposure: {}\n", plan.night(), plan.expid().padded()));
    out.push_str(&format!("Cameras: {}\n", cameras.join(" ")));
    out.push_str(&format!("Sky fibers: {} | Realizations: {}\n", nsky.join(" "), plan.reps()));
    out
}

/// One table per camera: nsky, realization count, mean RMS and its spread.
pub fn format_summary_table(results: &ResidualResults) -> String {
    let mut out = String::new();

    for (camera, by_nsky) in &results.cameras {
        out.push_str(&format!("\nCamera {camera}:\n"));
        out.push_str(&format_rows(&summarize_camera(by_nsky)));
    }

    out
}

fn format_rows(rows: &[NskySummary]) -> String {
    let mut out = String::new();
    out.push_str(format!("{:>6} {:>6} {:>12} {:>12}\n", "nsky", "n", "mean_rms", "std_rms").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<6} {:-<6} {:-<12} {:-<12}\n", "", "", "", "").trim_end());
    out.push('\n');

    for r in rows {
        out.push_str(
            format!(
                "{:>6} {:>6} {:>12} {:>12}\n",
                r.nsky,
                r.per_realization.len(),
                fmt_opt(r.mean),
                fmt_opt(r.std),
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

fn fmt_opt(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{v:.3}"),
        None => "-".to_string(),
    }
}
