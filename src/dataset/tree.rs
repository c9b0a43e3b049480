//! Leaf-wise transforms over the data variables of a dataset.

use super::{DataArray, Dataset, DatasetError};

/// Apply `f` to every data variable, producing a new dataset with the same
/// coordinates. The source is left untouched.
pub fn map_structure<E, F>(dataset: &Dataset, mut f: F) -> Result<Dataset, E>
where
    F: FnMut(&str, &DataArray) -> Result<DataArray, E>,
    E: From<DatasetError>,
{
    let mut out = Dataset::new();
    for (name, coord) in dataset.coords() {
        out.set_coord(name, coord.clone())?;
    }
    for (name, var) in dataset.data_vars() {
        let mapped = f(name, var)?;
        out.insert_var(name, mapped)?;
    }
    Ok(out)
}

/// Apply `f` to matching variables of two datasets holding the same variable
/// names. Coordinates are taken from `first`.
pub fn map_structure_pair<E, F>(first: &Dataset, second: &Dataset, mut f: F) -> Result<Dataset, E>
where
    F: FnMut(&str, &DataArray, &DataArray) -> Result<DataArray, E>,
    E: From<DatasetError>,
{
    if let Some(name) = first
        .data_vars()
        .keys()
        .chain(second.data_vars().keys())
        .find(|name| !(first.contains_var(name) && second.contains_var(name)))
    {
        return Err(DatasetError::MissingVariable(name.clone()).into());
    }

    let mut out = Dataset::new();
    for (name, coord) in first.coords() {
        out.set_coord(name, coord.clone())?;
    }
    for (name, var) in first.data_vars() {
        let mapped = f(name, var, second.var(name)?)?;
        out.insert_var(name, mapped)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Coordinate, LAT};
    use ndarray::Array1;

    fn dataset(names: &[&str]) -> Dataset {
        let mut ds = Dataset::new()
            .with_coord(LAT, Coordinate::float(LAT, vec![0.0, 1.0, 2.0]))
            .unwrap();
        for name in names {
            let var = DataArray::new(&[LAT], Array1::<f32>::ones(3).into_dyn()).unwrap();
            ds.insert_var(name, var).unwrap();
        }
        ds
    }

    #[test]
    fn test_map_structure_visits_every_variable() {
        let ds = dataset(&["a", "b"]);
        let mut seen = Vec::new();
        let doubled = map_structure::<DatasetError, _>(&ds, |name, var| {
            seen.push(name.to_string());
            DataArray::new(&[LAT], var.values() * 2.0)
        })
        .unwrap();

        assert_eq!(seen, vec!["a", "b"]);
        assert_eq!(doubled.var("b").unwrap().values()[[1]], 2.0);
        // source untouched
        assert_eq!(ds.var("b").unwrap().values()[[1]], 1.0);
    }

    #[test]
    fn test_map_structure_pair_requires_same_variables() {
        let left = dataset(&["a", "b"]);
        let right = dataset(&["a"]);
        let result = map_structure_pair::<DatasetError, _>(&left, &right, |_, a, _| Ok(a.clone()));
        assert_eq!(result.unwrap_err(), DatasetError::MissingVariable("b".to_string()));

        let summed = map_structure_pair::<DatasetError, _>(&left, &left, |_, a, b| {
            DataArray::new(&[LAT], a.values() + b.values())
        })
        .unwrap();
        assert_eq!(summed.var("a").unwrap().values()[[0]], 2.0);
    }
}
