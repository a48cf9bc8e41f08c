//! Human-readable summary of a run, built from the ledger.

use std::fmt;

use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};

use crate::{
    ledger::{DeploymentRecord, Ledger, RecordStatus, StepStatus, WiringRecord},
    plan::{ArgRef, DeploymentPlan, WiringPlan},
    verify::VerificationSummary,
};

#[derive(Debug, Clone)]
pub struct DeploymentReport {
    pub components: Vec<DeploymentRecord>,
    pub steps: Vec<WiringRecord>,
    /// Components and steps of the plan that have no ledger record yet.
    pub untouched: usize,
    pub error: Option<String>,
    pub verification: Option<VerificationSummary>,
}

impl DeploymentReport {
    pub fn from_ledger(ledger: &Ledger, plan: &DeploymentPlan, wiring: &WiringPlan) -> Self {
        let components: Vec<DeploymentRecord> =
            ledger.records_for(plan).into_iter().cloned().collect();
        let steps: Vec<WiringRecord> = ledger.steps_for(wiring).into_iter().cloned().collect();
        let untouched = plan.len() + wiring.len() - components.len() - steps.len();

        Self {
            components,
            steps,
            untouched,
            error: None,
            verification: None,
        }
    }

    pub fn with_error(mut self, error: impl fmt::Display) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn with_verification(mut self, summary: VerificationSummary) -> Self {
        self.verification = Some(summary);
        self
    }

    /// Every component deployed and every wiring step applied.
    pub fn is_complete(&self) -> bool {
        self.untouched == 0
            && self
                .components
                .iter()
                .all(|r| r.status == RecordStatus::Deployed)
            && self.steps.iter().all(|r| r.status == StepStatus::Applied)
    }

    fn components_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Component", "Status", "Address", "Transaction"]);

        for record in &self.components {
            let tx = record
                .tx
                .or(record.in_flight.as_ref().map(|f| f.tx))
                .map(|tx| tx.to_string())
                .unwrap_or_default();
            table.add_row(vec![
                record.name.clone(),
                status_cell(record.status.to_string(), record.failure.as_deref()),
                record.address.map(|a| a.to_string()).unwrap_or_default(),
                tx,
            ]);
        }
        table
    }

    fn steps_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Step", "Status", "Transaction"]);

        for record in &self.steps {
            table.add_row(vec![
                record.id.clone(),
                status_cell(record.status.to_string(), record.failure.as_deref()),
                record
                    .tx
                    .or(record.in_flight)
                    .map(|tx| tx.to_string())
                    .unwrap_or_default(),
            ]);
        }
        table
    }
}

/// Render a plan and its wiring, with argument references unresolved.
pub fn render_plan(plan: &DeploymentPlan, wiring: &WiringPlan) -> String {
    let mut components = Table::new();
    components
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "Component", "Template", "Arguments"]);
    for (i, spec) in plan.components().iter().enumerate() {
        components.add_row(vec![
            (i + 1).to_string(),
            spec.name.clone(),
            spec.template.clone(),
            describe_args(&spec.args),
        ]);
    }

    let mut steps = Table::new();
    steps
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "Step", "Arguments"]);
    for (i, step) in wiring.steps().iter().enumerate() {
        steps.add_row(vec![
            (i + 1).to_string(),
            step.id.clone(),
            describe_args(&step.args),
        ]);
    }

    format!("{components}\n{steps}")
}

fn describe_args(args: &[ArgRef]) -> String {
    args.iter().map(describe_arg).collect::<Vec<_>>().join(", ")
}

fn describe_arg(arg: &ArgRef) -> String {
    match arg {
        ArgRef::Component(name) => name.clone(),
        ArgRef::Config(key) => format!("${key}"),
        ArgRef::Literal(value) => value.to_string(),
        ArgRef::Concat(parts) => format!("[{}]", describe_args(parts)),
    }
}

fn status_cell(status: String, failure: Option<&str>) -> String {
    match failure {
        Some(failure) => format!("{status}: {failure}"),
        None => status,
    }
}

impl fmt::Display for DeploymentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.components_table())?;
        if !self.steps.is_empty() {
            writeln!(f, "{}", self.steps_table())?;
        }

        if let Some(summary) = &self.verification {
            writeln!(
                f,
                "Verification: {} submitted, {} failed",
                summary.verified.len(),
                summary.failed.len()
            )?;
        }

        if let Some(error) = &self.error {
            writeln!(f, "Stopped: {error}")?;
        }

        if self.is_complete() {
            write!(f, "Deployment complete.")
        } else {
            write!(
                f,
                "Deployment incomplete. Confirmed work is kept in the ledger; running the same command again resumes where this run stopped."
            )
        }
    }
}
