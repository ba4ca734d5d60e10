//! Formatted terminal output.
//!
//! Formatting lives here so estimation code stays free of presentation, and
//! so output changes stay local.

use crate::artifact::ArtifactBundle;
use crate::bvar::ImpulseResponse;
use crate::io::ingest::RowError;
use crate::lp::HorizonEstimate;
use crate::service::{PredictionResponse, ValidatedRequest};

/// Summary of a finished training run.
pub fn format_training_summary(bundle: &ArtifactBundle, row_errors: &[RowError]) -> String {
    let m = &bundle.metadata;
    let bvar = &bundle.bvar;
    let mut out = String::new();

    out.push_str("=== rp - rate pass-through training ===\n");
    out.push_str(&format!("Version: {}\n", m.version));
    out.push_str(&format!("Fingerprint: {}\n", short(&m.training_fingerprint)));
    out.push_str(&format!(
        "Sample: {} .. {} | n={} | {} -> {}\n",
        m.sample_start, m.sample_end, m.n_obs, m.foreign, m.domestic
    ));
    if !row_errors.is_empty() {
        out.push_str(&format!("Skipped rows: {}\n", row_errors.len()));
        for e in row_errors.iter().take(5) {
            out.push_str(&format!("  line {}: {}\n", e.line, e.message));
        }
    }

    out.push_str("\nBVAR:\n");
    out.push_str(&format!(
        "- variables={} lags={} effective obs={}\n",
        bvar.n_vars(),
        bvar.lags(),
        bvar.diagnostics().n_obs
    ));
    out.push_str(&format!(
        "- max |eigenvalue| = {:.4} ({})\n",
        bvar.max_modulus(),
        if bvar.is_stable() { "stable" } else { "UNSTABLE" }
    ));
    if bvar.diagnostics().degraded() {
        out.push_str("- degraded: numerical recovery applied during estimation\n");
    }

    out.push_str("\nLocal projections:\n");
    out.push_str(&format!(
        "{:>3} {:>10} {:>19} {:>10} {:>10} {:>6}\n",
        "h", "beta", "beta 90% band", "lambda", "resid_sd", "n"
    ));
    out.push_str(&format!("{:-<3} {:-<10} {:-<19} {:-<10} {:-<10} {:-<6}\n", "", "", "", "", "", ""));
    for estimate in &bundle.lp.horizons {
        match estimate {
            HorizonEstimate::Available(h) => out.push_str(&format!(
                "{:>3} {:>10.4} {:>19} {:>10.2e} {:>10.3} {:>6}\n",
                h.horizon,
                h.shock_coefficient(),
                h.shock_band(0.9)
                    .map(|b| format!("[{:.3}, {:.3}]", b.lower, b.upper))
                    .unwrap_or_default(),
                h.penalty,
                h.residual_std,
                h.n_obs
            )),
            HorizonEstimate::Unavailable { horizon, reason } => {
                out.push_str(&format!("{horizon:>3} unavailable: {reason}\n"));
            }
        }
    }
    out
}

/// Per-horizon forecasts and the meeting table.
pub fn format_prediction(response: &PredictionResponse, request: &ValidatedRequest) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Foreign move: {:+} bps (shock {:+.1}) on {} | regime {:?}\n",
        request.foreign_move_bps, request.shock_bps, request.reference_date, request.regime
    ));
    out.push_str(&format!(
        "Model: {} | {}\n",
        response.metadata.model_version, response.metadata.methodology
    ));
    out.push_str(&format!(
        "Expected domestic move (h={}): {:+.1} bps\n\n",
        response.meeting_table.horizon, response.expected_move_bps
    ));

    out.push_str(&format!(
        "{:>3} {:<5} {:>9} {:>8} {:>19} {:>19} {:>7} {:>6}\n",
        "h", "model", "mean", "std", "ci80", "ci95", "P(move)", "mode"
    ));
    out.push_str(&format!(
        "{:-<3} {:-<5} {:-<9} {:-<8} {:-<19} {:-<19} {:-<7} {:-<6}\n",
        "", "", "", "", "", "", "", ""
    ));
    for o in &response.horizons {
        let model = if o.substituted {
            format!("{}*", o.model.display_name())
        } else {
            o.model.display_name().to_string()
        };
        out.push_str(&format!(
            "{:>3} {:<5} {:>+9.2} {:>8.2} {:>19} {:>19} {:>7.3} {:>6}{}\n",
            o.horizon,
            model,
            o.forecast.mean,
            o.forecast.std,
            fmt_interval(o.ci80.lower, o.ci80.upper),
            fmt_interval(o.ci95.lower, o.ci95.upper),
            o.move_probability,
            o.distribution.mode().map(|k| format!("{k:+}")).unwrap_or_default(),
            if o.degraded { " (degraded)" } else { "" },
        ));
    }
    if !response.metadata.substituted_horizons.is_empty() {
        out.push_str("  * BVAR substituted for an unavailable local projection\n");
    }

    let table = &response.meeting_table;
    out.push_str(&format!("\nMeetings after {} (h={}):\n", table.reference_date, table.horizon));
    if table.meetings.is_empty() {
        out.push_str("  (no upcoming meetings in the calendar)\n");
    }
    for meeting in &table.meetings {
        let buckets: Vec<String> = meeting
            .buckets
            .iter()
            .map(|(k, p)| format!("{k:+}:{p:.3}"))
            .collect();
        out.push_str(&format!(
            "  {}  w={:.3}  P(move)={:.3}  {}\n",
            meeting.date,
            meeting.weight,
            meeting.move_probability,
            buckets.join(" ")
        ));
    }
    out
}

/// Cumulative responses to a unit foreign shock.
pub fn format_irf(irf: &ImpulseResponse) -> String {
    let cumulative = irf.cumulative();
    let mut out = String::new();
    out.push_str(&format!(
        "Impulse response to a unit {} shock (cumulative){}\n",
        irf.shock_variable,
        if irf.degraded { " [degraded identification]" } else { "" }
    ));
    out.push_str(&format!("{:>3}", "h"));
    for name in &irf.variables {
        out.push_str(&format!(" {:>14}", truncate(name, 14)));
    }
    out.push('\n');
    for h in 0..cumulative.nrows() {
        out.push_str(&format!("{:>3}", h + 1));
        for j in 0..cumulative.ncols() {
            out.push_str(&format!(" {:>14.4}", cumulative[(h, j)]));
        }
        out.push('\n');
    }
    out
}

fn fmt_interval(lower: f64, upper: f64) -> String {
    format!("[{lower:+.1}, {upper:+.1}]")
}

fn short(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('~');
    out
}
