use std::path::Path;

/// Loads a samples CSV into its header and one column of values per step
pub fn load_samples<P: AsRef<Path>>(path: P) -> (Vec<String>, Vec<Vec<f64>>) {
    let mut rdr = csv::Reader::from_path(path).unwrap();
    let header: Vec<String> = rdr.headers().unwrap().iter().map(|h| h.to_string()).collect();
    let mut columns = vec![Vec::new(); header.len()];
    for record in rdr.records() {
        let record = record.unwrap();
        for (column, value) in columns.iter_mut().zip(record.iter()) {
            column.push(value.parse::<f64>().unwrap());
        }
    }
    (header, columns)
}

pub fn column<'a>(header: &[String], columns: &'a [Vec<f64>], name: &str) -> &'a [f64] {
    let index = header
        .iter()
        .position(|h| h == name)
        .unwrap_or_else(|| panic!("no column {}", name));
    &columns[index]
}

pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn assert_close_abs(a: &[f64], b: &[f64], absolute_epsilon: f64) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b.iter()) {
        assert!(
            (*x - *y).abs() < absolute_epsilon,
            "{} and {} not within eps={}",
            *x,
            *y,
            absolute_epsilon
        );
    }
}
