use std::{fmt, path::PathBuf};

use crate::dump::normalize_date;

/// Nombre del store destino: `{lang}_{fecha}`, sin separadores finales en la fecha.
/// Todas las particiones de una tarea escriben en el mismo store.
pub fn derive_store_name(lang: &str, date: &str) -> String {
    format!("{}_{}", lang, normalize_date(date))
}

/// Configuración inmutable de un pipeline ETL (una partición).
#[derive(Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub partition: usize,
    pub paths: Vec<PathBuf>,
    pub lang: String,
    /// Workers para parsear elementos `page`
    pub page_fan: u32,
    /// Workers para parsear elementos `revision`
    pub rev_fan: u32,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
}

// la contraseña nunca aparece en logs
impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("partition", &self.partition)
            .field("paths", &self.paths)
            .field("lang", &self.lang)
            .field("page_fan", &self.page_fan)
            .field("rev_fan", &self.rev_fan)
            .field("db_name", &self.db_name)
            .field("db_user", &self.db_user)
            .field("db_password", &"***")
            .finish()
    }
}

/// Instancia del engine ETL ligada a una partición.
///
/// `run` bloquea hasta que todos los archivos de la partición están
/// parseados y cargados en el store.
pub trait EtlPipeline: Send {
    fn run(self: Box<Self>) -> anyhow::Result<()>;
}

/// Construye un pipeline ETL a partir de su configuración.
pub trait PipelineFactory: Send + Sync {
    fn create(&self, config: PipelineConfig) -> Box<dyn EtlPipeline>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_name_quita_separadores_finales() {
        assert_eq!(derive_store_name("enwiki", "2023-01-01/"), "enwiki_2023-01-01");
        assert_eq!(derive_store_name("enwiki", "20230101//"), "enwiki_20230101");
        assert_eq!(derive_store_name("scowiki", "20240101"), "scowiki_20240101");
    }

    #[test]
    fn debug_no_muestra_la_contrasena() {
        let cfg = PipelineConfig {
            partition: 0,
            paths: vec![PathBuf::from("a.7z")],
            lang: "scowiki".into(),
            page_fan: 1,
            rev_fan: 3,
            db_name: "scowiki_20240101".into(),
            db_user: "wikidat".into(),
            db_password: "s3cr3t".into(),
        };
        let dbg = format!("{cfg:?}");

        assert!(!dbg.contains("s3cr3t"));
        assert!(dbg.contains("scowiki_20240101"));
    }
}
