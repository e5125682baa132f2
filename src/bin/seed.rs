#![cfg(not(tarpaulin_include))]

use chart_studio::document::{ChartMeta, SEED_ORIGIN};
use chart_studio::ingest::read_csv_file;
use chart_studio::service::create_from_dataset;
use chart_studio::{ChartKind, Config, FileChartStore};

use log::info;
use std::env;
use std::path::Path;
use std::time::Instant;

/// Seed a pre-packaged dataset as a stored chart
///
/// Usage: `seed <csv-path> <kind> <owner-id> <col>[,<col>...] [name]`
///
/// The CSV goes through the same ingest and graph builder as an upload and is
/// written to the file store under `STUDIO_DATA_DIR`.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let s = Instant::now();
    let args: Vec<String> = env::args().collect();

    if args.len() < 5 || args.len() > 6 {
        let program = args.first().map(String::as_str).unwrap_or("seed");
        return Err(format!(
            "Usage: {program} <csv-path> <scatter|line|bar> <owner-id> <col>[,<col>...] [name]"
        )
        .into());
    }

    let csv_path = Path::new(&args[1]);
    let kind: ChartKind = args[2].parse()?;
    let owner = &args[3];
    let columns: Vec<String> = args[4]
        .split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();

    let meta = ChartMeta {
        name: args.get(5).cloned(),
        description: None,
        tags: Vec::new(),
    };

    let config = Config::load()?;
    let store = FileChartStore::open(&config.data_dir).await?;

    let dataset = read_csv_file(csv_path).await?;
    info!(
        "Read {} rows with columns [{}] from {}",
        dataset.rows.len(),
        dataset.headers.join(", "),
        csv_path.display()
    );

    let source = csv_path.file_stem().and_then(|stem| stem.to_str());
    let document = create_from_dataset(
        &store,
        owner,
        &dataset,
        kind,
        &columns,
        source,
        SEED_ORIGIN,
        meta,
    )
    .await?;

    println!(
        "Seeded {} chart \"{}\" as {} ({} traces)",
        document.kind,
        document.name,
        document.id,
        document.data.len()
    );
    println!("Total elapsed time: {:.1} seconds", s.elapsed().as_secs_f64());

    Ok(())
}
