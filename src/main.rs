use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use tutoring_early_warning::models::{EvaluationFilter, RiskEvaluation, RiskTier, StudentInput};
use tutoring_early_warning::students::{self, StudentReport};
use tutoring_early_warning::terms::AcademicPeriod;
use tutoring_early_warning::{db, report, risk, EngineConfig, HistoryAnalyzer, RiskScorer};

#[derive(Parser)]
#[command(name = "tutoring-early-warning")]
#[command(about = "Academic risk scoring and tutoring history analysis", long_about = None)]
struct Cli {
    /// TOML file overriding the scoring tables and thresholds
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load the fixture students and their sessions
    Seed,
    /// Import students and sessions from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Score every stored student and list them by risk
    Evaluate {
        #[arg(long)]
        tier: Option<RiskTier>,
        #[arg(long)]
        program: Option<String>,
        #[arg(long)]
        term: Option<String>,
        /// Case-insensitive match on name, surname or student id
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Risk evaluation and term-by-term history for one student
    History {
        #[arg(long)]
        student_id: String,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown cohort report
    Report {
        #[arg(long)]
        program: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Score students from a JSON file without touching the database
    Batch {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Show which terms the current academic period offers
    Terms,
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn load_students(
    pool: &PgPool,
    program: Option<&str>,
    student_id: Option<&str>,
) -> anyhow::Result<Vec<StudentInput>> {
    let records = db::fetch_students(pool, program, student_id).await?;
    let ids: Vec<_> = records.iter().map(|record| record.id).collect();
    let sessions = db::fetch_sessions(pool, &ids).await?;
    Ok(students::assemble(records, sessions))
}

fn print_ranking(evaluations: &[RiskEvaluation], limit: usize, json: bool) -> anyhow::Result<()> {
    let stats = risk::aggregate_statistics(evaluations);

    if json {
        let payload = serde_json::json!({
            "statistics": stats,
            "evaluations": evaluations,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if evaluations.is_empty() {
        println!("No students match these filters.");
        return Ok(());
    }

    println!(
        "{} students: {} high ({:.2}%), {} medium ({:.2}%), {} low ({:.2}%), average score {:.2}",
        stats.total,
        stats.high_count,
        stats.pct_high,
        stats.medium_count,
        stats.pct_medium,
        stats.low_count,
        stats.pct_low,
        stats.avg_score
    );
    println!("Top students by risk score:");
    for evaluation in evaluations.iter().take(limit) {
        println!(
            "- {} {} ({}, {}, term {}) score {} across {} sessions",
            evaluation.classification.icon,
            evaluation.full_name(),
            evaluation.student_id,
            evaluation.program,
            evaluation.term,
            evaluation.score,
            evaluation.session_count
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tutoring_early_warning=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let scorer = RiskScorer::new(config.risk.clone());
    let analyzer = HistoryAnalyzer::new(config.history.clone());

    match cli.command {
        Commands::InitDb => {
            db::init_db(&connect().await?).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&connect().await?).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&connect().await?, &csv).await?;
            println!("Inserted {inserted} sessions from {}.", csv.display());
        }
        Commands::Evaluate {
            tier,
            program,
            term,
            search,
            limit,
            json,
        } => {
            let pool = connect().await?;
            let inputs = load_students(&pool, None, None).await?;
            let evaluations = scorer.evaluate_batch(&inputs);
            let filter = EvaluationFilter {
                tier,
                program,
                term,
                search,
            };
            let evaluations = risk::filter_evaluations(evaluations, &filter);
            print_ranking(&evaluations, limit, json)?;
        }
        Commands::History { student_id, json } => {
            let pool = connect().await?;
            let inputs = load_students(&pool, None, Some(&student_id)).await?;
            let student = inputs
                .first()
                .with_context(|| format!("no student with id {student_id}"))?;
            let student_report = students::build_student_report(&scorer, &analyzer, student);

            if json {
                println!("{}", serde_json::to_string_pretty(&student_report)?);
            } else {
                print!("{}", report::render_student_report(&student_report));
            }
        }
        Commands::Report { program, out } => {
            let pool = connect().await?;
            let inputs = load_students(&pool, program.as_deref(), None).await?;
            let reports: Vec<StudentReport> = inputs
                .iter()
                .map(|student| students::build_student_report(&scorer, &analyzer, student))
                .collect();
            let rendered =
                report::build_cohort_report(program.as_deref(), Utc::now().date_naive(), &reports);
            std::fs::write(&out, rendered)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Batch { input, limit, json } => {
            let file = std::fs::File::open(&input)
                .with_context(|| format!("failed to open {}", input.display()))?;
            let inputs = students::load_batch(std::io::BufReader::new(file))?;
            let evaluations = scorer.evaluate_batch(&inputs);
            print_ranking(&evaluations, limit, json)?;
        }
        Commands::Terms => {
            let period = AcademicPeriod::current();
            println!(
                "{}: terms {}",
                period.name(),
                period.available_terms().join(", ")
            );
        }
    }

    Ok(())
}
