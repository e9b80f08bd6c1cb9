//! `p2pd run`: play a scenario and print what happened.

use std::time::Duration;

use tabled::Tabled;
use tracing::{info, warn};

use crate::cli::{OutputFormat, RunArgs};
use crate::commands::Context;
use crate::error::CliError;
use crate::output;
use crate::scenario::{self, Report, Runner, StepOutcome};

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Step")]
    step: &'static str,
    #[tabled(rename = "Iface")]
    iface: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

#[derive(Tabled)]
struct CallbackRow {
    #[tabled(rename = "Iface")]
    iface: String,
    #[tabled(rename = "Event")]
    event: String,
}

#[derive(Tabled)]
struct SignalRow {
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Member")]
    member: &'static str,
    #[tabled(rename = "Args")]
    args: String,
}

fn step_row(outcome: &StepOutcome, color: bool) -> StepRow {
    let status: &'static str = outcome.status.into();
    let mut status = output::paint_status(status, outcome.matches(), color);
    if let Some(expected) = outcome.expected.filter(|_| !outcome.matches()) {
        status.push_str(&format!(" (expected {expected})"));
    }
    let detail = match (&outcome.message, &outcome.detail) {
        (Some(message), _) => message.clone(),
        (None, Some(detail)) => detail.to_string(),
        (None, None) => String::new(),
    };
    StepRow {
        index: outcome.index,
        step: outcome.step,
        iface: outcome.iface.clone().unwrap_or_default(),
        status,
        detail,
    }
}

// ── Rendering ───────────────────────────────────────────────────────

fn render(report: &Report, format: OutputFormat, color: bool) -> String {
    if let Some(rendered) = output::render_structured(format, report) {
        return rendered;
    }

    if format == OutputFormat::Plain {
        return report
            .steps
            .iter()
            .map(|s| {
                format!(
                    "{}\t{}\t{}\t{}",
                    s.index,
                    s.step,
                    s.iface.as_deref().unwrap_or("-"),
                    s.status
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
    }

    let steps: Vec<_> = report.steps.iter().map(|s| step_row(s, color)).collect();
    let callbacks: Vec<_> = report
        .callbacks
        .iter()
        .map(|m| CallbackRow {
            iface: m.iface.clone(),
            event: m.event.name().to_owned(),
        })
        .collect();
    let signals: Vec<_> = report
        .signals
        .iter()
        .map(|s| SignalRow {
            path: s.path.clone(),
            member: s.member,
            args: s.args.to_string(),
        })
        .collect();

    [
        output::render_table("Steps", &steps),
        output::render_table("Callbacks", &callbacks),
        output::render_table("Bus signals", &signals),
    ]
    .into_iter()
    .filter(|s| !s.is_empty())
    .collect::<Vec<_>>()
    .join("\n\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: RunArgs, ctx: &Context) -> Result<(), CliError> {
    let supervisor_config = ctx
        .config
        .to_supervisor_config()
        .map_err(|e| CliError::config(&ctx.path, e))?;
    let scenario = scenario::load(&args.scenario)?;
    if let Some(description) = &scenario.description {
        info!(scenario = %args.scenario.display(), "{description}");
    }

    let runner = Runner::new(supervisor_config, Duration::from_secs(args.join_timeout));
    let report = runner.run(scenario.steps).await?;

    output::print_output(&render(&report, ctx.format, ctx.color), ctx.quiet);

    let failed = report.mismatches();
    if failed > 0 {
        warn!(failed, "steps did not match their expected status");
        if args.strict {
            return Err(CliError::Expectation { failed });
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use p2pd_core::StatusCode;

    use super::*;

    fn outcome(status: StatusCode, expected: Option<StatusCode>) -> StepOutcome {
        StepOutcome {
            index: 3,
            step: "op",
            iface: Some("p2p0".into()),
            status,
            detail: None,
            message: None,
            expected,
        }
    }

    #[test]
    fn plain_output_is_one_line_per_step() {
        let report = Report {
            steps: vec![outcome(StatusCode::Success, None)],
            ..Report::default()
        };
        assert_eq!(
            render(&report, OutputFormat::Plain, false),
            "3\top\tp2p0\tSUCCESS"
        );
    }

    #[test]
    fn mismatch_shows_expected_status() {
        let row = step_row(
            &outcome(StatusCode::FailureIfaceInvalid, Some(StatusCode::Success)),
            false,
        );
        assert_eq!(row.status, "FAILURE_IFACE_INVALID (expected SUCCESS)");
    }

    #[test]
    fn table_skips_empty_sections() {
        let report = Report {
            steps: vec![outcome(StatusCode::Success, None)],
            ..Report::default()
        };
        let table = render(&report, OutputFormat::Table, false);
        assert!(table.starts_with("Steps"));
        assert!(!table.contains("Bus signals"));
    }
}
