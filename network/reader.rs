//! Reader for reaction-network tables.
//!
//! Each row describes one reaction `A -> B + C` as
//! `educt, product_1, product_2, energy`. A second product that is not an
//! integer index (conventionally `[x]`) marks a rearrangement `A -> B`; it is
//! mapped to the placeholder index `highest_molecule_id + 1`, the slot that
//! [`append_rearrangement_energy`] gives a zero energy.

use ndarray::{Array1, ArrayView1};
use std::path::Path;
use thiserror::Error;

const COLUMNS: usize = 4;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("CSV error while reading reaction network: {0}")]
    Csv(#[from] csv::Error),
    #[error("Malformed reaction at line {line}: {message}")]
    Parse { line: usize, message: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReactionNetwork {
    pub educts: Array1<usize>,
    pub primary_products: Array1<usize>,
    pub secondary_products: Array1<usize>,
    pub energies: Array1<f64>,
}

impl ReactionNetwork {
    pub fn n_reactions(&self) -> usize {
        self.energies.len()
    }

    /// Number of reactions of the form `A -> B`.
    pub fn n_rearrangements(&self, highest_molecule_id: usize) -> usize {
        let placeholder = highest_molecule_id + 1;
        self.secondary_products
            .iter()
            .filter(|&&idx| idx == placeholder)
            .count()
    }
}

fn parse_index(raw: &str, line: usize, column: &str) -> Result<usize, NetworkError> {
    // Indices may be written as floats ("3.0"); they are truncated.
    let value = raw.parse::<f64>().map_err(|_| NetworkError::Parse {
        line,
        message: format!("{column} '{raw}' is not a number"),
    })?;
    if !value.is_finite() || value < 0.0 {
        return Err(NetworkError::Parse {
            line,
            message: format!("{column} '{raw}' is not a valid molecule index"),
        });
    }
    Ok(value.trunc() as usize)
}

pub fn read_reaction_network<P: AsRef<Path>>(
    path: P,
    highest_molecule_id: usize,
) -> Result<ReactionNetwork, NetworkError> {
    let path = path.as_ref();
    let placeholder = highest_molecule_id + 1;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;

    let mut educts = Vec::new();
    let mut primary = Vec::new();
    let mut secondary = Vec::new();
    let mut energies = Vec::new();

    for record in reader.records() {
        let record = record?;
        let line = record
            .position()
            .map(|pos| pos.line() as usize)
            .unwrap_or(energies.len() + 1);
        if record.iter().all(str::is_empty) {
            continue;
        }
        if record.len() < COLUMNS {
            return Err(NetworkError::Parse {
                line,
                message: format!("expected {COLUMNS} columns, found {}", record.len()),
            });
        }

        educts.push(parse_index(&record[0], line, "educt")?);
        primary.push(parse_index(&record[1], line, "product")?);
        // Strict integer parse: anything else is a rearrangement marker.
        secondary.push(record[2].parse::<usize>().unwrap_or(placeholder));

        let energy = record[3].parse::<f64>().map_err(|_| NetworkError::Parse {
            line,
            message: format!("energy '{}' is not a number", &record[3]),
        })?;
        energies.push(energy);
    }

    let network = ReactionNetwork {
        educts: Array1::from(educts),
        primary_products: Array1::from(primary),
        secondary_products: Array1::from(secondary),
        energies: Array1::from(energies),
    };
    log::info!(
        "Read {} reactions ({} rearrangements) from {}",
        network.n_reactions(),
        network.n_rearrangements(highest_molecule_id),
        path.display()
    );
    Ok(network)
}

/// Appends the zero energy of the rearrangement placeholder molecule.
pub fn append_rearrangement_energy(energies: ArrayView1<f64>) -> Array1<f64> {
    energies.iter().copied().chain(std::iter::once(0.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn network_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("tempfile");
        write!(file, "{}", content).expect("write");
        file.flush().expect("flush");
        file
    }

    #[test]
    fn rearrangements_map_to_placeholder_index() {
        let file = network_file("0,1,2,-1.5\n3,4,[x],0.25\n");
        let network = read_reaction_network(file.path(), 9).expect("read");

        assert_eq!(network.educts, array![0usize, 3]);
        assert_eq!(network.primary_products, array![1usize, 4]);
        assert_eq!(network.secondary_products, array![2usize, 10]);
        assert_eq!(network.energies, array![-1.5, 0.25]);
        assert_eq!(network.n_rearrangements(9), 1);
    }

    #[test]
    fn short_rows_are_rejected() {
        let file = network_file("0,1,2\n");
        let err = read_reaction_network(file.path(), 5).unwrap_err();
        assert!(matches!(err, NetworkError::Parse { line: 1, .. }));
    }

    #[test]
    fn appending_rearrangement_energy_adds_a_trailing_zero() {
        let energies = array![1.0, -2.0];
        assert_eq!(
            append_rearrangement_energy(energies.view()),
            array![1.0, -2.0, 0.0]
        );
    }
}
