use crate::infra::{seeded_store, SeedArgs};
use chrono::Local;
use clap::Args;
use std::sync::Arc;
use talent_ratings::config::AppConfig;
use talent_ratings::error::AppError;
use talent_ratings::ratings::{
    ActorId, CycleStatus, InMemoryAuditLog, InMemoryRatingStore, ListRatingsRequest,
    PotentialInput, RatingListing, RatingService, RatingServiceError, RatingSort,
    RatingSortField, ReadMode, SortDirection,
};

type DemoService = RatingService<InMemoryRatingStore, InMemoryAuditLog>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    #[command(flatten)]
    pub(crate) seed: SeedArgs,
    /// Rows shown per listing
    #[arg(long, default_value_t = 10)]
    pub(crate) rows: usize,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ImportArgs {
    #[command(flatten)]
    pub(crate) seed: SeedArgs,
}

fn build_service(
    seed: &SeedArgs,
) -> Result<(Arc<DemoService>, Arc<InMemoryRatingStore>), AppError> {
    let config = AppConfig::load()?;
    let import = seed.load()?;
    let store = seeded_store(seed, import)?;
    let service = RatingService::new(
        store.clone(),
        Arc::new(InMemoryAuditLog::default()),
        config.engine,
    );
    Ok((Arc::new(service), store))
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { seed, rows } = args;
    let (service, store) = build_service(&seed)?;
    let tenant_id = seed.tenant_id();
    let cycle_id = seed.cycle_id();
    let by_score = ListRatingsRequest {
        limit: Some(rows.max(1)),
        sort: RatingSort {
            field: RatingSortField::EffectiveScore,
            direction: SortDirection::Desc,
        },
        ..ListRatingsRequest::default()
    };

    println!("Performance rating demo ({})", Local::now().date_naive());
    println!("Tenant {} | cycle {}", seed.tenant, seed.cycle);

    let live = service.list_ratings_for_cycle(&tenant_id, &cycle_id, &by_score)?;
    render_listing("Live scores", &live);

    let summary = service
        .generate_ratings_for_cycle(&tenant_id, &cycle_id)
        .await?;
    println!(
        "\nGenerated {} ratings ({} failed)",
        summary.success_count, summary.failed_count
    );
    for failure in &summary.errors {
        println!("  - {}: {}", failure.evaluatee_id, failure.message);
    }

    store
        .set_cycle_status(&cycle_id, CycleStatus::InReview)
        .map_err(RatingServiceError::from)?;
    let cached = service.list_ratings_for_cycle(&tenant_id, &cycle_id, &by_score)?;
    render_listing("Stored ratings after the cycle moved to review", &cached);

    let Some(rating_id) = cached.data.iter().find_map(|row| row.rating_id.clone()) else {
        println!("\nNo stored ratings to place on the talent grid");
        return Ok(());
    };
    let placed = service.rate_potential(
        &tenant_id,
        &rating_id,
        &PotentialInput::from_factors(3, 3, 2),
        Some("demo calibration panel".to_string()),
        ActorId::from("demo-hr"),
    )?;
    println!(
        "\nPotential rated for {} -> {:?}",
        placed.evaluatee_id, placed.nine_box
    );

    let grid = service.nine_box_data(&tenant_id, &cycle_id, None)?;
    println!(
        "Talent grid: {} placed | {} awaiting potential",
        grid.placed, grid.unplaced
    );
    for cell in grid.cells.iter().filter(|cell| cell.count > 0) {
        println!("  - [{}] {}: {}", cell.number, cell.label, cell.count);
    }

    Ok(())
}

pub(crate) async fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let (service, _) = build_service(&args.seed)?;
    let summary = service
        .generate_ratings_for_cycle(&args.seed.tenant_id(), &args.seed.cycle_id())
        .await?;

    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("failed to render summary: {err}"),
    }
    Ok(())
}

fn render_listing(title: &str, listing: &RatingListing) {
    println!(
        "\n{} [{} mode, cycle {}]",
        title,
        match listing.mode {
            ReadMode::Live => "live",
            ReadMode::Cached => "cached",
        },
        listing.cycle_status.label()
    );
    println!(
        "- {} people | {} evaluated | {} with potential",
        listing.stats.total, listing.stats.evaluated, listing.stats.potential_assigned
    );
    for row in &listing.data {
        println!(
            "  - {:<24} {:>4.2}  {}{}",
            row.evaluatee_name,
            row.effective_score,
            row.effective_level.label,
            if row.calibrated { " (calibrated)" } else { "" }
        );
    }
}
