use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::{DumpFamily, Task, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Accepted,
    Running,
    Failed,
    Succeeded,
}

/// Resultado de una partición (un pipeline ETL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionReport {
    pub index: usize,
    pub files: usize,
    pub bytes: u64,
    pub elapsed_ms: u64,
    /// Mensaje de error si la partición falló
    pub error: Option<String>,
}

impl PartitionReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Estado y métricas de una ejecución de `execute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub id: TaskId,
    pub lang: String,
    pub family: DumpFamily,
    /// Fecha resuelta de la colección
    pub date: String,
    pub store: String,
    pub status: TaskStatus,

    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,

    pub total_partitions: u32,
    pub completed_partitions: u32,
    pub failed_partitions: u32,
    pub partitions: Vec<PartitionReport>,
}

impl TaskReport {
    pub fn new(
        task: &Task,
        date: &str,
        store: &str,
        total_partitions: usize,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            lang: task.lang.clone(),
            family: task.family,
            date: date.to_string(),
            store: store.to_string(),
            status: TaskStatus::Accepted,
            submitted_at,
            started_at: None,
            finished_at: None,
            total_partitions: total_partitions as u32,
            completed_partitions: 0,
            failed_partitions: 0,
            partitions: Vec::with_capacity(total_partitions),
        }
    }

    pub fn start(&mut self) {
        self.status = TaskStatus::Running;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
    }

    pub fn record(&mut self, partition: PartitionReport) {
        if partition.succeeded() {
            self.completed_partitions += 1;
        } else {
            self.failed_partitions += 1;
        }
        self.partitions.push(partition);
    }

    /// Cierra el informe: SUCCEEDED sólo si todas las particiones cargaron.
    pub fn finish(&mut self) {
        self.partitions.sort_by_key(|p| p.index);
        self.status = if self.failed_partitions == 0
            && self.completed_partitions == self.total_partitions
        {
            TaskStatus::Succeeded
        } else {
            TaskStatus::Failed
        };
        self.finished_at = Some(Utc::now());
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, TaskStatus::Succeeded)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partition(index: usize, error: Option<&str>) -> PartitionReport {
        PartitionReport {
            index,
            files: 2,
            bytes: 100,
            elapsed_ms: 5,
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn informe_completo_queda_succeeded() {
        let mut report = TaskReport::new(&Task::default(), "20240101", "scowiki_20240101", 2, Utc::now());
        report.start();
        report.record(partition(1, None));
        report.record(partition(0, None));
        report.finish();

        assert!(report.is_success());
        assert_eq!(report.completed_partitions, 2);
        assert_eq!(report.partitions[0].index, 0);
        assert!(report.started_at.is_some());
        assert!(report.finished_at.is_some());
    }

    #[test]
    fn una_particion_fallida_marca_el_informe_como_failed() {
        let mut report = TaskReport::new(&Task::default(), "20240101", "scowiki_20240101", 2, Utc::now());
        report.start();
        report.record(partition(0, None));
        report.record(partition(1, Some("exit status: 1")));
        report.finish();

        assert_eq!(report.status, TaskStatus::Failed);
        assert_eq!(report.completed_partitions, 1);
        assert_eq!(report.failed_partitions, 1);
    }

    #[test]
    fn estado_se_serializa_en_mayusculas() {
        let mut report = TaskReport::new(&Task::default(), "20240101", "scowiki_20240101", 0, Utc::now());
        report.finish();
        let json = report.to_json_pretty().unwrap();

        assert!(json.contains("\"SUCCEEDED\""));
        assert!(json.contains("\"PAGE_META_HISTORY\""));
    }
}
