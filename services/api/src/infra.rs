use clap::Args;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use talent_ratings::error::AppError;
use talent_ratings::ratings::{
    Competency, CompetencySnapshot, CycleId, CycleStatus, InMemoryRatingStore, MeasurementCycle,
    ResponseCsvImporter, ResponseImport, TenantId,
};
use tracing::info;

/// Response export bundled with the binary for demos and a seeded server.
pub(crate) const SAMPLE_RESPONSES: &str =
    include_str!("../../../crates/talent-ratings/fixtures/responses.csv");

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Where seed data comes from and which cycle it lands in.
#[derive(Args, Debug, Clone)]
pub(crate) struct SeedArgs {
    /// Response CSV export; the bundled sample is used when omitted
    #[arg(long)]
    pub(crate) responses: Option<PathBuf>,
    /// Tenant owning the seeded cycle
    #[arg(long, default_value = "acme")]
    pub(crate) tenant: String,
    /// Cycle id the export belongs to
    #[arg(long, default_value = "2025-h1")]
    pub(crate) cycle: String,
    /// Initial cycle status (active, in_review, completed)
    #[arg(long, default_value = "active", value_parser = parse_status)]
    pub(crate) status: CycleStatus,
}

impl Default for SeedArgs {
    fn default() -> Self {
        Self {
            responses: None,
            tenant: "acme".to_string(),
            cycle: "2025-h1".to_string(),
            status: CycleStatus::Active,
        }
    }
}

impl SeedArgs {
    pub(crate) fn tenant_id(&self) -> TenantId {
        TenantId::from(self.tenant.as_str())
    }

    pub(crate) fn cycle_id(&self) -> CycleId {
        CycleId::from(self.cycle.as_str())
    }

    pub(crate) fn load(&self) -> Result<ResponseImport, AppError> {
        let tenant_id = self.tenant_id();
        let import = match &self.responses {
            Some(path) => ResponseCsvImporter::from_path(path, &tenant_id)?,
            None => ResponseCsvImporter::from_reader(SAMPLE_RESPONSES.as_bytes(), &tenant_id)?,
        };
        Ok(import)
    }
}

pub(crate) fn parse_status(raw: &str) -> Result<CycleStatus, String> {
    match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "active" => Ok(CycleStatus::Active),
        "in_review" | "review" => Ok(CycleStatus::InReview),
        "completed" | "closed" => Ok(CycleStatus::Completed),
        other => Err(format!(
            "unknown cycle status '{other}' (expected active, in_review or completed)"
        )),
    }
}

/// Competency snapshot covering every code referenced by the export.
pub(crate) fn competencies_of(import: &ResponseImport) -> CompetencySnapshot {
    let codes: BTreeSet<&str> = import
        .assignments
        .iter()
        .flat_map(|entry| entry.responses.iter())
        .filter_map(|response| response.competency_code.as_deref())
        .collect();

    CompetencySnapshot::new(
        codes
            .into_iter()
            .map(|code| Competency {
                code: code.to_string(),
                name: code.to_string(),
                category: "imported".to_string(),
            })
            .collect(),
    )
}

/// In-memory store holding one cycle hydrated from the export. Every assignment in the
/// export must belong to the seeded cycle.
pub(crate) fn seeded_store(
    seed: &SeedArgs,
    import: ResponseImport,
) -> Result<Arc<InMemoryRatingStore>, AppError> {
    import.ensure_cycle(&seed.cycle_id())?;

    let store = Arc::new(InMemoryRatingStore::default());
    store.insert_cycle(MeasurementCycle {
        id: seed.cycle_id(),
        tenant_id: seed.tenant_id(),
        name: format!("Cycle {}", seed.cycle),
        status: seed.status,
        competencies: competencies_of(&import),
    });

    let employees = import.employees.len();
    let assignments = import.assignments.len();
    for employee in import.employees {
        store.insert_employee(employee);
    }
    store.load_assignments(import.assignments);

    info!(
        tenant_id = %seed.tenant,
        cycle_id = %seed.cycle,
        status = seed.status.label(),
        employees,
        assignments,
        "rating store seeded"
    );
    Ok(store)
}
