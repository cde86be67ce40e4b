use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::dump::DumpFile;
use crate::error::EtlError;

/// Número de particiones cuando no se configura otro valor
/// (división en dos mitades).
pub const DEFAULT_PARALLELISM: usize = 2;

/// Subconjunto contiguo y no vacío de los archivos de una colección.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub index: usize,
    pub files: Vec<DumpFile>,
}

impl Partition {
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size_bytes).sum()
    }
}

/// Divide los archivos en `min(desired_parallelism, n)` particiones
/// contiguas, respetando el orden y equilibradas por bytes.
///
/// Cada corte se coloca donde el acumulado de bytes queda más cerca del
/// ideal `total * k / partes`; en caso de empate gana el corte anterior,
/// así con tamaños iguales y 2 partes la primera recibe ⌊n/2⌋ archivos.
/// Si no se conocen los tamaños todos los archivos pesan 1.
pub fn partition(files: &[DumpFile], desired_parallelism: usize) -> Result<Vec<Partition>, EtlError> {
    if files.is_empty() {
        return Err(EtlError::EmptyCollection);
    }

    let parts = desired_parallelism.max(1).min(files.len());
    let cuts = cut_points(&weights(files), parts);

    Ok(cuts
        .windows(2)
        .enumerate()
        .map(|(index, w)| Partition {
            index,
            files: files[w[0]..w[1]].to_vec(),
        })
        .collect())
}

fn weights(files: &[DumpFile]) -> Vec<u64> {
    let total: u64 = files.iter().map(|f| f.size_bytes).sum();
    if total == 0 {
        vec![1; files.len()]
    } else {
        files.iter().map(|f| f.size_bytes).collect()
    }
}

/// Posiciones de corte, incluyendo 0 y n. Requiere 1 <= parts <= n.
fn cut_points(weights: &[u64], parts: usize) -> Vec<usize> {
    let n = weights.len();

    let mut prefix: Vec<i128> = Vec::with_capacity(n + 1);
    let mut acc: i128 = 0;
    prefix.push(acc);
    for w in weights {
        acc += i128::from(*w);
        prefix.push(acc);
    }
    let total = acc;
    let parts_i = parts as i128;

    let mut cuts = Vec::with_capacity(parts + 1);
    cuts.push(0);
    let mut start = 0;

    for k in 1..parts {
        let ideal = total * k as i128;
        // distancia (escalada por `parts`) entre el acumulado y el ideal
        let offset = |j: usize| prefix[j] * parts_i - ideal;

        // cada partición que falta necesita al menos un archivo
        let last = n - (parts - k);
        let mut cut = start + 1;
        while cut < last {
            let next = offset(cut + 1);
            if next <= 0 || next.abs() < offset(cut).abs() {
                cut += 1;
            } else {
                break;
            }
        }

        cuts.push(cut);
        start = cut;
    }

    cuts.push(n);
    cuts
}
