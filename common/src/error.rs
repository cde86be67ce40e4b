use thiserror::Error;

use crate::report::TaskReport;

/// Fallo de una partición concreta, con la causa original del engine.
#[derive(Debug)]
pub struct PartitionFailure {
    pub partition: usize,
    pub error: anyhow::Error,
}

#[derive(Debug, Error)]
pub enum EtlError {
    #[error("configuración inválida: {reason}")]
    InvalidSettings { reason: String },

    /// No se pudo resolver la colección de dumps (mirror inaccesible,
    /// fecha inexistente...). Ningún pipeline llega a lanzarse.
    #[error("no se pudo obtener la colección de dumps de {lang} (fecha {date}): {source:#}")]
    Acquisition {
        lang: String,
        date: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("la colección de dumps está vacía, no hay nada que particionar")]
    EmptyCollection,

    /// Una o más particiones fallaron. Se devuelve después de esperar a
    /// todas; el informe indica qué particiones sí cargaron en el store.
    #[error(
        "{} de {} particiones fallaron cargando el store {store}",
        failures.len(),
        report.total_partitions
    )]
    PipelineExecution {
        store: String,
        failures: Vec<PartitionFailure>,
        report: Box<TaskReport>,
    },
}

impl EtlError {
    /// Informe de ejecución, si el error se produjo con pipelines ya lanzados.
    pub fn report(&self) -> Option<&TaskReport> {
        match self {
            EtlError::PipelineExecution { report, .. } => Some(&**report),
            _ => None,
        }
    }
}
