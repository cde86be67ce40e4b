use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::task::DumpFamily;

/// Fecha de colección sin `/` ni `\` finales (los listados de los mirrors
/// devuelven directorios como `20240101/`).
pub fn normalize_date(date: &str) -> &str {
    date.trim_end_matches(['/', '\\'])
}

/// Un archivo de dump ya disponible en disco local.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpFile {
    pub path: PathBuf,
    /// Tamaño en bytes, 0 si no se conoce
    pub size_bytes: u64,
}

impl DumpFile {
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
        }
    }

    /// Archivo cuyo tamaño no se conoce (pesa lo mismo que los demás al particionar).
    pub fn without_size(path: impl Into<PathBuf>) -> Self {
        Self::new(path, 0)
    }
}

/// Petición que recibe el downloader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpRequest {
    /// URL base (o ruta) del mirror que publica los dumps
    pub mirror: String,
    pub lang: String,
    pub family: DumpFamily,
    /// `None` => última fecha publicada
    pub date: Option<String>,
}

/// Resultado de resolver una tarea contra un mirror: la fecha concreta
/// y los archivos, en el orden de las partes del dump.
///
/// Es un valor inmutable; la fecha queda fija antes de particionar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpCollection {
    date: String,
    files: Vec<DumpFile>,
}

impl DumpCollection {
    pub fn new(date: impl Into<String>, files: Vec<DumpFile>) -> Self {
        Self {
            date: date.into(),
            files,
        }
    }

    /// Colección construida sólo a partir de rutas (tamaños desconocidos).
    pub fn from_paths<I, P>(date: impl Into<String>, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::new(date, paths.into_iter().map(DumpFile::without_size).collect())
    }

    /// La misma colección con la fecha sin separadores finales.
    pub fn normalized(self) -> Self {
        Self {
            date: normalize_date(&self.date).to_string(),
            files: self.files,
        }
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn files(&self) -> &[DumpFile] {
        &self.files
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|f| f.path.as_path())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size_bytes).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_paths_conserva_el_orden_y_suma_tamanos() {
        let c = DumpCollection::from_paths("20240101", ["a.7z", "b.7z", "c.7z"]);
        let paths: Vec<_> = c.paths().map(|p| p.to_string_lossy().to_string()).collect();

        assert_eq!(paths, vec!["a.7z", "b.7z", "c.7z"]);
        assert_eq!(c.len(), 3);
        assert_eq!(c.total_bytes(), 0);
        assert_eq!(c.date(), "20240101");
    }

    #[test]
    fn normalized_quita_la_barra_final_de_la_fecha() {
        let c = DumpCollection::from_paths("20230101/", ["a.7z"]).normalized();
        assert_eq!(c.date(), "20230101");
        assert_eq!(c.len(), 1);
        assert_eq!(normalize_date("2023-01-01\\"), "2023-01-01");
    }

    #[test]
    fn total_bytes_suma_los_archivos() {
        let c = DumpCollection::new(
            "20240101",
            vec![DumpFile::new("a", 10), DumpFile::new("b", 32)],
        );
        assert_eq!(c.total_bytes(), 42);
        assert!(!c.is_empty());
    }
}
