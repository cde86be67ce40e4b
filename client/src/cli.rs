use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use common::{DumpFamily, EtlError, LocalMirror, Task, TaskReport, DEFAULT_LANG, DEFAULT_PARALLELISM};
use master::{EtlSettings, TaskCoordinator};
use std::{env, sync::Arc};
use tracing_subscriber::EnvFilter;
use worker::{CommandEngine, PASSWORD_ENV};

const DEFAULT_LOG_FILTER: &str = "client=info,master=info,worker=info,common=info";

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Mirror con los dumps:
/// - WIKIETL_MIRROR si está definida
/// - si no, /data/dumps (volumen del contenedor)
fn default_mirror() -> String {
    env_or("WIKIETL_MIRROR", "/data/dumps")
}

fn default_engine() -> String {
    env_or("WIKIETL_ENGINE", "wikidat-etl")
}

fn default_db_user() -> String {
    env_or("WIKIETL_DB_USER", "wikidat")
}

fn default_parallelism() -> usize {
    env::var("WIKIETL_PARALLELISM")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(DEFAULT_PARALLELISM)
}

// la contraseña sólo se lee del entorno, nunca de la línea de comandos
fn db_password() -> String {
    env::var(PASSWORD_ENV).unwrap_or_default()
}

#[derive(Parser)]
#[command(name = "wikietl")]
#[command(about = "ETL paralelo de dumps de Wikipedia")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct TaskArgs {
    /// Código de la edición, ej: scowiki, enwiki
    #[arg(long, default_value = DEFAULT_LANG)]
    lang: String,

    /// Fecha de la colección (YYYYMMDD). Por defecto la última publicada
    #[arg(long)]
    date: Option<String>,

    /// pages-meta-history | stub-meta-history | pages-logging
    #[arg(long, default_value = "pages-meta-history")]
    family: DumpFamily,

    /// Ruta o URL file:// del mirror (WIKIETL_MIRROR)
    #[arg(long)]
    mirror: Option<String>,

    /// Número de pipelines ETL en paralelo (WIKIETL_PARALLELISM)
    #[arg(long)]
    parallelism: Option<usize>,
}

impl TaskArgs {
    fn task(&self) -> Task {
        Task::new(self.lang.clone(), self.date.clone()).with_family(self.family)
    }

    fn mirror(&self) -> String {
        self.mirror.clone().unwrap_or_else(default_mirror)
    }

    fn parallelism(&self) -> usize {
        self.parallelism.unwrap_or_else(default_parallelism)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Resuelve la colección de dumps y ejecuta el ETL completo
    Run {
        #[command(flatten)]
        task: TaskArgs,

        /// Workers para parsear elementos page
        #[arg(long, default_value_t = 2)]
        page_fan: u32,

        /// Workers para parsear elementos revision
        #[arg(long, default_value_t = 2)]
        rev_fan: u32,

        /// Usuario del store (WIKIETL_DB_USER)
        #[arg(long)]
        db_user: Option<String>,

        /// Programa ETL a lanzar por partición (WIKIETL_ENGINE)
        #[arg(long)]
        engine: Option<String>,

        /// Imprime el informe final en JSON
        #[arg(long)]
        json: bool,
    },

    /// Muestra cómo se repartirían los archivos, sin ejecutar nada
    Plan {
        #[command(flatten)]
        task: TaskArgs,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Run {
            task,
            page_fan,
            rev_fan,
            db_user,
            engine,
            json,
        } => {
            let engine = CommandEngine::new(engine.unwrap_or_else(default_engine));
            let coordinator = TaskCoordinator::new(Arc::new(LocalMirror), Arc::new(engine));
            let settings = EtlSettings::new(
                page_fan,
                rev_fan,
                db_user.unwrap_or_else(default_db_user),
                db_password(),
                task.mirror(),
            )
            .with_parallelism(task.parallelism());

            match coordinator.execute(&task.task(), &settings).await {
                Ok(report) => print_report(&report, json)?,
                Err(e) => {
                    if let Some(report) = e.report() {
                        print_report(report, json)?;
                    }
                    eprintln!("Error ejecutando la tarea: {e}");
                    if let EtlError::PipelineExecution { failures, .. } = &e {
                        for f in failures {
                            eprintln!("  partición {}: {:#}", f.partition, f.error);
                        }
                    }
                    std::process::exit(1);
                }
            }
        }

        Commands::Plan { task } => {
            // el plan no lanza pipelines, el engine no se usa
            let coordinator = TaskCoordinator::new(
                Arc::new(LocalMirror),
                Arc::new(CommandEngine::new(default_engine())),
            );
            let plan = coordinator
                .plan(&task.task(), &task.mirror(), task.parallelism())
                .await?;

            println!("Plan para {} ({}):", task.lang, task.family);
            println!("  fecha   : {}", plan.collection.date());
            println!("  store   : {}", plan.store);
            println!(
                "  archivos: {} ({} bytes)",
                plan.collection.len(),
                plan.collection.total_bytes()
            );
            for p in &plan.partitions {
                println!("  partición {} ({} archivos, {} bytes):", p.index, p.len(), p.bytes());
                for f in &p.files {
                    println!("    - {}", f.path.display());
                }
            }
        }
    }

    Ok(())
}

fn print_report(report: &TaskReport, json: bool) -> Result<()> {
    if json {
        println!("{}", report.to_json_pretty()?);
        return Ok(());
    }

    println!("Tarea:");
    println!("  id: {}", report.id);
    println!("  idioma: {}", report.lang);
    println!("  familia: {}", report.family);
    println!("  fecha: {}", report.date);
    println!("  store: {}", report.store);
    println!("  estado: {:?}", report.status);
    println!(
        "  particiones: total={}, completadas={}, fallidas={}",
        report.total_partitions, report.completed_partitions, report.failed_partitions
    );
    println!("  submitted_at: {}", report.submitted_at);
    if let Some(ref started) = report.started_at {
        println!("  iniciado: {}", started);
    }
    if let Some(ref done) = report.finished_at {
        println!("  finalizado: {}", done);
    }
    for p in &report.partitions {
        match &p.error {
            None => println!(
                "    - partición {}: ok ({} archivos, {} bytes, {} ms)",
                p.index, p.files, p.bytes, p.elapsed_ms
            ),
            Some(err) => println!("    - partición {}: FALLÓ tras {} ms: {}", p.index, p.elapsed_ms, err),
        }
    }
    Ok(())
}
