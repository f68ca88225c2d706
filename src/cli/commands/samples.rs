use anyhow::Context;
use clap::Subcommand;
use std::io::Read;
use std::path::PathBuf;
use tracing::info;

use crate::config::AppConfig;
use crate::database::{self, models::NewSample, models::Resource, models::Sample, Repository};

#[derive(Subcommand)]
pub enum SampleCommands {
    #[command(about = "Validate and insert every row of a CSV file (header line, then text,email,category)")]
    Import {
        #[arg(help = "Path to the CSV file")]
        file: PathBuf,
    },

    #[command(about = "Delete all samples")]
    Delete,
}

pub async fn handle(cmd: SampleCommands, config: &AppConfig) -> anyhow::Result<()> {
    if config.database.url.is_none() {
        anyhow::bail!("DATABASE_URL is not set; nothing to seed");
    }

    let store = database::connect(&config.database).await?;
    let samples = Repository::<Sample>::new(store.clone());

    let result = match cmd {
        SampleCommands::Import { file } => {
            let reader = std::fs::File::open(&file).with_context(|| format!("cannot open {}", file.display()))?;
            let rows = parse_samples_csv(reader)?;

            let mut inserted = 0;
            for (line, row) in rows.into_iter().enumerate() {
                let sample = Sample::build(row, &config.security)
                    .await
                    .map_err(|e| anyhow::anyhow!("row {}: {}", line + 1, e.message()))?;
                samples.insert(&sample).await.with_context(|| format!("row {}", line + 1))?;
                inserted += 1;
            }

            info!("Imported {} samples from {}", inserted, file.display());
            println!("Data successfully loaded: {} samples", inserted);
            Ok(())
        }
        SampleCommands::Delete => {
            let deleted = samples.delete_all().await?;
            println!("Data successfully deleted: {} samples", deleted);
            Ok(())
        }
    };

    store.close().await;
    result
}

/// Rows after the header line, read positionally as text, email, category.
/// Blank lines are skipped; a missing column is left unset for validation to report.
pub fn parse_samples_csv<R: Read>(input: R) -> anyhow::Result<Vec<NewSample>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context("malformed CSV")?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        let column = |index: usize| record.get(index).filter(|v| !v.is_empty()).map(str::to_string);
        rows.push(NewSample {
            text: column(0),
            email: column(1),
            category: column(2),
            flag: None,
        });
    }

    Ok(rows)
}
