use anyhow::{bail, Context, Result};
use glob::{glob, Pattern};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use crate::dump::{normalize_date, DumpCollection, DumpFile, DumpRequest};

/// Formatos de compresión de los dumps, del preferido al último recurso.
const ARCHIVE_EXTENSIONS: [&str; 3] = [".7z", ".bz2", ".gz"];

/// Resuelve idioma + fecha en una colección concreta de archivos locales.
///
/// Debe ser idempotente por (idioma, familia, fecha) y fallar con un error
/// distinguible si el mirror no responde o la fecha no existe.
pub trait Downloader: Send + Sync {
    fn download(&self, request: &DumpRequest) -> Result<DumpCollection>;
}

/// Mirror local con la misma estructura que los mirrors de Wikimedia:
/// `{mirror}/{lang}/{fecha}/{lang}-{fecha}-{familia}*`.
///
/// `mirror` puede ser una ruta o una URL `file://`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalMirror;

impl Downloader for LocalMirror {
    fn download(&self, request: &DumpRequest) -> Result<DumpCollection> {
        let root = mirror_root(&request.mirror)?;
        if !root.is_dir() {
            bail!("mirror inaccesible: {}", root.display());
        }

        let lang_dir = root.join(&request.lang);
        if !lang_dir.is_dir() {
            bail!(
                "el mirror {} no publica dumps para {}",
                root.display(),
                request.lang
            );
        }

        let (date, files) = match request.date.as_deref() {
            Some(date) => {
                let date = normalize_date(date);
                if !lang_dir.join(date).is_dir() {
                    bail!("la fecha {} no existe para {}", date, request.lang);
                }
                let files = family_files(&lang_dir, request, date)?;
                if files.is_empty() {
                    bail!(
                        "{}/{} no contiene archivos {}",
                        request.lang,
                        date,
                        request.family
                    );
                }
                (date.to_string(), files)
            }
            None => latest(&lang_dir, request)?,
        };

        info!(
            "colección {} resuelta para {}: fecha {}, {} archivos",
            request.family,
            request.lang,
            date,
            files.len()
        );
        Ok(DumpCollection::new(date, files))
    }
}

fn mirror_root(mirror: &str) -> Result<PathBuf> {
    if let Some(path) = mirror.strip_prefix("file://") {
        return Ok(PathBuf::from(path));
    }
    if let Some((scheme, _)) = mirror.split_once("://") {
        bail!("el mirror {mirror} usa el esquema {scheme}, sólo se leen mirrors locales");
    }
    Ok(PathBuf::from(mirror))
}

/// Directorios de fecha (sólo dígitos, ej: 20240101), del más nuevo al más viejo.
fn date_dirs(lang_dir: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(lang_dir)
        .with_context(|| format!("no se pudo listar {}", lang_dir.display()))?;

    let mut dates: Vec<String> = entries
        .flatten()
        .filter(|e| e.file_type().map(|ft| ft.is_dir()).unwrap_or(false))
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .filter(|name| !name.is_empty() && name.chars().all(|c| c.is_ascii_digit()))
        .collect();

    dates.sort_by(|a, b| b.cmp(a));
    Ok(dates)
}

fn latest(lang_dir: &Path, request: &DumpRequest) -> Result<(String, Vec<DumpFile>)> {
    for date in date_dirs(lang_dir)? {
        let files = family_files(lang_dir, request, &date)?;
        if !files.is_empty() {
            return Ok((date, files));
        }
        debug!(
            "{}/{} sin archivos {}, probando la fecha anterior",
            request.lang, date, request.family
        );
    }

    bail!(
        "no hay ninguna colección {} publicada para {}",
        request.family,
        request.lang
    )
}

fn family_files(lang_dir: &Path, request: &DumpRequest, date: &str) -> Result<Vec<DumpFile>> {
    let dir = lang_dir.join(date);
    let prefix = format!("{}-{}-{}", request.lang, date, request.family.marker());
    let pattern = format!(
        "{}/{}*",
        Pattern::escape(&dir.to_string_lossy()),
        Pattern::escape(&prefix)
    );

    // una sola copia por parte: {parte} -> (rango del formato, archivo)
    let mut parts: HashMap<String, (usize, DumpFile)> = HashMap::new();
    for entry in glob(&pattern).with_context(|| format!("patrón inválido: {pattern}"))? {
        let path = entry?;
        if !path.is_file() {
            continue;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let Some((rank, stem)) = archive_stem(&name) else {
            debug!("{} no es un archivo de dump, se ignora", path.display());
            continue;
        };
        if parts.get(stem).is_some_and(|(kept, _)| *kept <= rank) {
            debug!("{} duplica una parte ya elegida, se ignora", path.display());
            continue;
        }
        let size_bytes = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        parts.insert(stem.to_string(), (rank, DumpFile::new(path, size_bytes)));
    }
    let mut files: Vec<DumpFile> = parts.into_values().map(|(_, file)| file).collect();

    // history2 antes que history10
    files.sort_by_cached_key(|f| {
        natural_key(
            &f.path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        )
    });
    Ok(files)
}

/// Rango del formato de compresión y nombre de la parte sin la extensión,
/// o `None` si el archivo no es un dump comprimido (checksums, feeds rss...).
fn archive_stem(name: &str) -> Option<(usize, &str)> {
    ARCHIVE_EXTENSIONS
        .iter()
        .enumerate()
        .find_map(|(rank, ext)| name.strip_suffix(ext).map(|stem| (rank, stem)))
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Chunk {
    Num(usize, String),
    Text(String),
}

fn natural_key(name: &str) -> Vec<Chunk> {
    fn chunk(s: String, digits: bool) -> Chunk {
        if digits {
            let trimmed = s.trim_start_matches('0').to_string();
            Chunk::Num(trimmed.len(), trimmed)
        } else {
            Chunk::Text(s)
        }
    }

    let mut out = Vec::new();
    let mut buf = String::new();
    let mut digits = false;

    for c in name.chars() {
        let is_digit = c.is_ascii_digit();
        if !buf.is_empty() && is_digit != digits {
            out.push(chunk(std::mem::take(&mut buf), digits));
        }
        digits = is_digit;
        buf.push(c);
    }
    if !buf.is_empty() {
        out.push(chunk(buf, digits));
    }
    out
}
