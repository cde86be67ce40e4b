pub mod download;
pub mod dump;
pub mod error;
pub mod partition;
pub mod pipeline;
pub mod report;
pub mod task;

pub use download::{Downloader, LocalMirror};
pub use dump::{normalize_date, DumpCollection, DumpFile, DumpRequest};
pub use error::{EtlError, PartitionFailure};
pub use partition::{partition, Partition, DEFAULT_PARALLELISM};
pub use pipeline::{derive_store_name, EtlPipeline, PipelineConfig, PipelineFactory};
pub use report::{PartitionReport, TaskReport, TaskStatus};
pub use task::{DumpFamily, Task, TaskId, DEFAULT_LANG};
