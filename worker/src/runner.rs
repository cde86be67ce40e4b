use anyhow::anyhow;
use common::{PartitionFailure, PartitionReport, PipelineConfig, PipelineFactory};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Pipeline ETL en ejecución para una partición.
///
/// El engine corre en el pool de hilos bloqueantes de tokio; el runner no
/// comparte memoria mutable con el coordinador ni con sus hermanos.
pub struct PipelineRunner {
    partition: usize,
    files: usize,
    bytes: u64,
    started: Instant,
    /// Duración medida dentro del hilo del pipeline y su resultado
    handle: JoinHandle<(Duration, anyhow::Result<()>)>,
}

/// Resultado de un runner: éxito o fallo y cuánto tardó, nada más.
#[derive(Debug)]
pub struct RunnerOutcome {
    pub partition: usize,
    pub files: usize,
    pub bytes: u64,
    pub elapsed: Duration,
    pub result: anyhow::Result<()>,
}

impl PipelineRunner {
    /// Lanza el pipeline de la partición y devuelve inmediatamente.
    pub fn launch(factory: Arc<dyn PipelineFactory>, config: PipelineConfig, bytes: u64) -> Self {
        let partition = config.partition;
        let files = config.paths.len();

        info!(
            "lanzando pipeline de la partición {} ({} archivos, {} bytes) sobre {}",
            partition, files, bytes, config.db_name
        );

        // el tiempo se mide en el propio hilo: no depende del orden en que se espera
        let handle = tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let pipeline = factory.create(config);
            let result = pipeline.run();
            (start.elapsed(), result)
        });

        Self {
            partition,
            files,
            bytes,
            started: Instant::now(),
            handle,
        }
    }

    pub fn partition(&self) -> usize {
        self.partition
    }

    /// Espera a que el pipeline termine. Un panic dentro del engine se
    /// reporta como fallo de la partición.
    pub async fn join(self) -> RunnerOutcome {
        let (elapsed, result) = match self.handle.await {
            Ok((elapsed, result)) => (elapsed, result),
            Err(e) => (
                self.started.elapsed(),
                Err(anyhow!(
                    "panic o join error en el pipeline de la partición {}: {}",
                    self.partition,
                    e
                )),
            ),
        };

        match &result {
            Ok(()) => info!(
                "partición {} terminada correctamente en {:?}",
                self.partition, elapsed
            ),
            Err(e) => warn!(
                "partición {} falló tras {:?}: {:#}",
                self.partition, elapsed, e
            ),
        }

        RunnerOutcome {
            partition: self.partition,
            files: self.files,
            bytes: self.bytes,
            elapsed,
            result,
        }
    }
}

impl RunnerOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    /// Separa el resultado en la entrada del informe y, si falló, la causa.
    pub fn into_report(self) -> (PartitionReport, Option<PartitionFailure>) {
        let (error, failure) = match self.result {
            Ok(()) => (None, None),
            Err(e) => (
                Some(format!("{e:#}")),
                Some(PartitionFailure {
                    partition: self.partition,
                    error: e,
                }),
            ),
        };

        let report = PartitionReport {
            index: self.partition,
            files: self.files,
            bytes: self.bytes,
            elapsed_ms: self.elapsed.as_millis() as u64,
            error,
        };
        (report, failure)
    }
}

/// Lanza todos los pipelines en orden de partición y espera a todos.
///
/// Un fallo no cancela a los hermanos: los resultados se devuelven en el
/// orden de lanzamiento una vez que todos han terminado.
pub async fn run_all(
    factory: Arc<dyn PipelineFactory>,
    configs: Vec<(PipelineConfig, u64)>,
) -> Vec<RunnerOutcome> {
    let runners: Vec<PipelineRunner> = configs
        .into_iter()
        .map(|(config, bytes)| PipelineRunner::launch(factory.clone(), config, bytes))
        .collect();

    let mut outcomes = Vec::with_capacity(runners.len());
    for runner in runners {
        outcomes.push(runner.join().await);
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use common::EtlPipeline;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Engine de prueba: la partición `fail` falla al instante, el resto
    /// duerme `delay` (sólo la partición `slow`, si se indica) y marca `finished`.
    struct FakeEngine {
        fail: Option<usize>,
        panic: Option<usize>,
        slow: Option<usize>,
        delay: Duration,
        created: AtomicUsize,
        finished: Arc<AtomicBool>,
    }

    struct FakePipeline {
        partition: usize,
        fail: bool,
        panic: bool,
        delay: Duration,
        finished: Arc<AtomicBool>,
    }

    impl EtlPipeline for FakePipeline {
        fn run(self: Box<Self>) -> anyhow::Result<()> {
            if self.panic {
                panic!("engine roto en la partición {}", self.partition);
            }
            if self.fail {
                bail!("dump malformado en la partición {}", self.partition);
            }
            std::thread::sleep(self.delay);
            self.finished.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    impl PipelineFactory for FakeEngine {
        fn create(&self, config: PipelineConfig) -> Box<dyn EtlPipeline> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Box::new(FakePipeline {
                partition: config.partition,
                fail: self.fail == Some(config.partition),
                panic: self.panic == Some(config.partition),
                delay: match self.slow {
                    Some(slow) if slow != config.partition => Duration::ZERO,
                    _ => self.delay,
                },
                finished: self.finished.clone(),
            })
        }
    }

    fn engine(fail: Option<usize>, panic: Option<usize>, delay_ms: u64) -> Arc<FakeEngine> {
        Arc::new(FakeEngine {
            fail,
            panic,
            slow: None,
            delay: Duration::from_millis(delay_ms),
            created: AtomicUsize::new(0),
            finished: Arc::new(AtomicBool::new(false)),
        })
    }

    fn config(partition: usize) -> PipelineConfig {
        PipelineConfig {
            partition,
            paths: vec![PathBuf::from(format!("part{partition}.7z"))],
            lang: "scowiki".into(),
            page_fan: 1,
            rev_fan: 2,
            db_name: "scowiki_20240101".into(),
            db_user: "wikidat".into(),
            db_password: "pw".into(),
        }
    }

    #[tokio::test]
    async fn run_all_espera_a_todos_los_runners() {
        let engine = engine(None, None, 50);
        let outcomes = run_all(engine.clone(), vec![(config(0), 10), (config(1), 20)]).await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(RunnerOutcome::succeeded));
        assert_eq!(engine.created.load(Ordering::SeqCst), 2);
        assert_eq!(outcomes[1].bytes, 20);
    }

    #[tokio::test]
    async fn un_fallo_no_cancela_al_hermano() {
        let engine = engine(Some(0), None, 200);
        let outcomes = run_all(engine.clone(), vec![(config(0), 1), (config(1), 1)]).await;

        assert!(!outcomes[0].succeeded());
        assert!(outcomes[1].succeeded());
        assert!(engine.finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn tiempo_de_cada_particion_no_depende_del_orden_de_espera() {
        let engine = Arc::new(FakeEngine {
            fail: None,
            panic: None,
            slow: Some(0),
            delay: Duration::from_millis(500),
            created: AtomicUsize::new(0),
            finished: Arc::new(AtomicBool::new(false)),
        });
        let outcomes = run_all(engine, vec![(config(0), 1), (config(1), 1)]).await;

        assert!(outcomes.iter().all(RunnerOutcome::succeeded));
        assert!(outcomes[0].elapsed >= Duration::from_millis(500));
        // la partición 1 termina enseguida aunque se espere después de la 0
        assert!(outcomes[1].elapsed < Duration::from_millis(100));
        let (report, _) = outcomes.into_iter().nth(1).unwrap().into_report();
        assert!(report.elapsed_ms < 100);
    }

    #[tokio::test]
    async fn panic_del_engine_se_reporta_como_fallo() {
        let engine = engine(None, Some(1), 0);
        let outcomes = run_all(engine, vec![(config(0), 1), (config(1), 1)]).await;

        assert!(outcomes[0].succeeded());
        let (report, failure) = outcomes.into_iter().nth(1).unwrap().into_report();
        assert_eq!(report.index, 1);
        assert!(report.error.unwrap().contains("panic"));
        assert_eq!(failure.unwrap().partition, 1);
    }

    #[tokio::test]
    async fn into_report_conserva_la_causa() {
        let engine = engine(Some(0), None, 0);
        let mut outcomes = run_all(engine, vec![(config(0), 64)]).await;
        let (report, failure) = outcomes.remove(0).into_report();

        assert_eq!(report.files, 1);
        assert_eq!(report.bytes, 64);
        assert!(report.error.as_deref().unwrap().contains("dump malformado"));
        assert!(failure.unwrap().error.to_string().contains("partición 0"));
    }
}
