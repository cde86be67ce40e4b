use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::dump::DumpRequest;

pub type TaskId = String;

/// Edición que se procesa cuando no se indica otra
pub const DEFAULT_LANG: &str = "scowiki";

/// Familias de dumps publicadas en los mirrors de Wikimedia.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DumpFamily {
    /// Historial completo con el texto de cada revisión
    #[default]
    PageMetaHistory,
    /// Sólo metadatos de páginas y revisiones (page-stub)
    StubMetaHistory,
    /// Logs de actividad de MediaWiki (acciones administrativas)
    Logging,
}

impl DumpFamily {
    /// Fragmento que identifica a la familia en el nombre de archivo,
    /// ej: `scowiki-20240101-pages-meta-history1.xml.7z`.
    pub fn marker(&self) -> &'static str {
        match self {
            DumpFamily::PageMetaHistory => "pages-meta-history",
            DumpFamily::StubMetaHistory => "stub-meta-history",
            DumpFamily::Logging => "pages-logging",
        }
    }
}

impl fmt::Display for DumpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

impl FromStr for DumpFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pages-meta-history" | "page-meta-history" | "history" => Ok(DumpFamily::PageMetaHistory),
            "stub-meta-history" | "stub" | "page-stub" => Ok(DumpFamily::StubMetaHistory),
            "pages-logging" | "logging" => Ok(DumpFamily::Logging),
            other => Err(format!("familia de dump desconocida: {other}")),
        }
    }
}

/// Unidad de trabajo ETL: una edición de Wikipedia y, opcionalmente,
/// la fecha de publicación de la colección de dumps.
///
/// No guarda estado de ejecución; la fecha resuelta vive en la
/// `DumpCollection` que devuelve el downloader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub lang: String,
    /// `None` => la última fecha disponible en el mirror
    pub date: Option<String>,
    pub family: DumpFamily,
}

impl Task {
    pub fn new(lang: impl Into<String>, date: Option<String>) -> Self {
        Self {
            lang: lang.into(),
            date,
            family: DumpFamily::default(),
        }
    }

    /// Tarea de historial completo de revisiones.
    pub fn revision_history(lang: impl Into<String>, date: Option<String>) -> Self {
        Self::new(lang, date).with_family(DumpFamily::PageMetaHistory)
    }

    pub fn with_family(mut self, family: DumpFamily) -> Self {
        self.family = family;
        self
    }

    /// Petición para el downloader contra un mirror concreto.
    pub fn request(&self, mirror: &str) -> DumpRequest {
        DumpRequest {
            mirror: mirror.to_string(),
            lang: self.lang.clone(),
            family: self.family,
            date: self.date.clone(),
        }
    }
}

impl Default for Task {
    fn default() -> Self {
        Self::new(DEFAULT_LANG, None)
    }
}
