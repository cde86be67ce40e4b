use anyhow::anyhow;
use chrono::Utc;
use common::{
    derive_store_name, partition, Downloader, DumpCollection, EtlError, Partition, PipelineConfig,
    PipelineFactory, Task, TaskReport, DEFAULT_PARALLELISM,
};
use std::{fmt, sync::Arc};
use tracing::{info, warn};

/// Parámetros de una ejecución: fan-out del engine, credenciales del store,
/// mirror de origen y paralelismo deseado.
#[derive(Clone)]
pub struct EtlSettings {
    pub page_fan: u32,
    pub rev_fan: u32,
    pub db_user: String,
    pub db_password: String,
    /// URL base (o ruta) del mirror con los dumps
    pub mirror: String,
    pub parallelism: usize,
}

impl EtlSettings {
    pub fn new(
        page_fan: u32,
        rev_fan: u32,
        db_user: impl Into<String>,
        db_password: impl Into<String>,
        mirror: impl Into<String>,
    ) -> Self {
        Self {
            page_fan,
            rev_fan,
            db_user: db_user.into(),
            db_password: db_password.into(),
            mirror: mirror.into(),
            parallelism: DEFAULT_PARALLELISM,
        }
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    fn validate(&self) -> Result<(), EtlError> {
        if self.page_fan == 0 {
            return Err(EtlError::InvalidSettings {
                reason: "page_fan debe ser mayor que 0".to_string(),
            });
        }
        if self.rev_fan == 0 {
            return Err(EtlError::InvalidSettings {
                reason: "rev_fan debe ser mayor que 0".to_string(),
            });
        }
        Ok(())
    }

    fn pipeline_config(&self, task: &Task, store: &str, partition: &Partition) -> PipelineConfig {
        PipelineConfig {
            partition: partition.index,
            paths: partition.paths(),
            lang: task.lang.clone(),
            page_fan: self.page_fan,
            rev_fan: self.rev_fan,
            db_name: store.to_string(),
            db_user: self.db_user.clone(),
            db_password: self.db_password.clone(),
        }
    }
}

impl fmt::Debug for EtlSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EtlSettings")
            .field("page_fan", &self.page_fan)
            .field("rev_fan", &self.rev_fan)
            .field("db_user", &self.db_user)
            .field("db_password", &"***")
            .field("mirror", &self.mirror)
            .field("parallelism", &self.parallelism)
            .finish()
    }
}

/// Colección resuelta, store destino y reparto en particiones.
#[derive(Debug, Clone)]
pub struct TaskPlan {
    pub collection: DumpCollection,
    pub store: String,
    pub partitions: Vec<Partition>,
}

/// Punto de entrada: resuelve la colección, la particiona, lanza un
/// pipeline por partición y espera a que terminen todos.
///
/// No guarda estado entre ejecuciones, así que la misma tarea se puede
/// ejecutar varias veces (o en paralelo) con el mismo coordinador.
pub struct TaskCoordinator {
    downloader: Arc<dyn Downloader>,
    factory: Arc<dyn PipelineFactory>,
}

impl TaskCoordinator {
    pub fn new(downloader: Arc<dyn Downloader>, factory: Arc<dyn PipelineFactory>) -> Self {
        Self {
            downloader,
            factory,
        }
    }

    /// Resuelve la colección de dumps de la tarea contra el mirror.
    /// La fecha devuelta ya viene sin separadores finales.
    pub async fn resolve(&self, task: &Task, mirror: &str) -> Result<DumpCollection, EtlError> {
        let request = task.request(mirror);
        let downloader = self.downloader.clone();

        let acquisition = |source: anyhow::Error| EtlError::Acquisition {
            lang: task.lang.clone(),
            date: task.date.clone().unwrap_or_else(|| "latest".to_string()),
            source,
        };

        match tokio::task::spawn_blocking(move || downloader.download(&request)).await {
            Ok(Ok(collection)) => Ok(collection.normalized()),
            Ok(Err(e)) => Err(acquisition(e)),
            Err(e) => Err(acquisition(anyhow!("panic o join error en el downloader: {e}"))),
        }
    }

    /// Resuelve y particiona sin lanzar ningún pipeline.
    pub async fn plan(&self, task: &Task, mirror: &str, parallelism: usize) -> Result<TaskPlan, EtlError> {
        let collection = self.resolve(task, mirror).await?;
        let store = derive_store_name(&task.lang, collection.date());
        let partitions = partition(collection.files(), parallelism)?;

        Ok(TaskPlan {
            collection,
            store,
            partitions,
        })
    }

    pub async fn execute(&self, task: &Task, settings: &EtlSettings) -> Result<TaskReport, EtlError> {
        settings.validate()?;
        let submitted_at = Utc::now();

        info!(
            "descargando dumps {} desde {} para el idioma {}",
            task.family, settings.mirror, task.lang
        );
        let plan = self
            .plan(task, &settings.mirror, settings.parallelism)
            .await?;
        info!(
            "colección de {} con fecha {}: {} archivos, store {}, {} particiones",
            task.lang,
            plan.collection.date(),
            plan.collection.len(),
            plan.store,
            plan.partitions.len()
        );

        let mut report = TaskReport::new(
            task,
            plan.collection.date(),
            &plan.store,
            plan.partitions.len(),
            submitted_at,
        );
        report.start();

        let configs: Vec<(PipelineConfig, u64)> = plan
            .partitions
            .iter()
            .map(|p| (settings.pipeline_config(task, &plan.store, p), p.bytes()))
            .collect();

        info!("pipelines ETL definidos, procesando. Esto puede tardar...");
        let outcomes = worker::run_all(self.factory.clone(), configs).await;

        let mut failures = Vec::new();
        for outcome in outcomes {
            let (partition_report, failure) = outcome.into_report();
            report.record(partition_report);
            failures.extend(failure);
        }
        report.finish();

        if failures.is_empty() {
            info!(
                "proceso ETL terminado para {} con fecha {} ({} particiones)",
                task.lang, report.date, report.completed_partitions
            );
            return Ok(report);
        }

        warn!(
            "proceso ETL de {} con fecha {} terminó con {}/{} particiones fallidas; el store {} queda con la carga parcial",
            task.lang,
            report.date,
            report.failed_partitions,
            report.total_partitions,
            plan.store
        );
        Err(EtlError::PipelineExecution {
            store: plan.store,
            failures,
            report: Box::new(report),
        })
    }
}
