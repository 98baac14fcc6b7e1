use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use nalgebra::DVector;

/// Column-major CSV: one header per column, shorter columns padded with
/// empty cells.
pub fn write_csv<P: AsRef<Path>, S: AsRef<str>>(
    path: P,
    headers: &[S],
    columns: &[Vec<f64>],
) -> io::Result<()> {
    if headers.len() != columns.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "Headers count ({}) doesn't match data columns ({})",
                headers.len(),
                columns.len()
            ),
        ));
    }
    let n_rows = columns.iter().map(|col| col.len()).max().unwrap_or(0);
    write_rows(
        path,
        headers,
        (0..n_rows).map(move |i| columns.iter().map(move |col| col.get(i).copied())),
    )
}

/// x-y pairs of equal length.
pub fn write_xy<P: AsRef<Path>>(
    path: P,
    x_header: &str,
    y_header: &str,
    x_data: &[f64],
    y_data: &[f64],
) -> io::Result<()> {
    if x_data.len() != y_data.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "X and Y data lengths don't match ({} vs {})",
                x_data.len(),
                y_data.len()
            ),
        ));
    }
    write_csv(path, &[x_header, y_header], &[x_data.to_vec(), y_data.to_vec()])
}

/// One row per stored state: `t`, the given extra columns, then every state
/// entry under its label.
pub fn write_trajectory<P: AsRef<Path>>(
    path: P,
    labels: &[String],
    extra: &[(&str, Vec<f64>)],
    times: &[f64],
    states: &[DVector<f64>],
) -> io::Result<()> {
    if times.len() != states.len() || extra.iter().any(|(_, col)| col.len() != times.len()) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "trajectory columns differ in length",
        ));
    }
    if let Some(bad) = states.iter().find(|y| y.len() != labels.len()) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("state of length {} for {} labels", bad.len(), labels.len()),
        ));
    }

    let mut headers: Vec<&str> = vec!["t"];
    headers.extend(extra.iter().map(|(name, _)| *name));
    headers.extend(labels.iter().map(String::as_str));

    write_rows(
        path,
        headers.as_slice(),
        times.iter().zip(states).enumerate().map(move |(i, (t, y))| {
            std::iter::once(Some(*t))
                .chain(extra.iter().map(move |(_, col)| Some(col[i])))
                .chain(y.iter().map(|v| Some(*v)))
        }),
    )
}

fn write_rows<P, S, R, C>(path: P, headers: &[S], rows: R) -> io::Result<()>
where
    P: AsRef<Path>,
    S: AsRef<str>,
    R: Iterator<Item = C>,
    C: Iterator<Item = Option<f64>>,
{
    let mut file = BufWriter::new(File::create(path)?);
    let header: Vec<&str> = headers.iter().map(AsRef::as_ref).collect();
    writeln!(file, "{}", header.join(","))?;
    for row in rows {
        let cells: Vec<String> = row
            .map(|v| v.map_or_else(String::new, |v| format!("{:.15e}", v)))
            .collect();
        writeln!(file, "{}", cells.join(","))?;
    }
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_write_csv() {
        let path = std::env::temp_dir().join("lisdae_write_csv.csv");
        let data = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0]];

        write_csv(&path, &["x", "y"], &data).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "x,y");
        assert_eq!(lines.len(), 4);
        assert!(lines[3].ends_with(','));

        fs::remove_file(&path).ok();
    }

    #[test]
    fn trajectory_rows_carry_labels() {
        let path = std::env::temp_dir().join("lisdae_trajectory.csv");
        let labels = vec!["a".to_string(), "b".to_string()];
        let states = vec![DVector::from_vec(vec![1.0, 2.0]), DVector::from_vec(vec![3.0, 4.0])];

        write_trajectory(&path, &labels, &[("V_cell", vec![2.3, 2.2])], &[0.0, 1.0], &states).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "t,V_cell,a,b");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2].split(',').count(), 4);

        let err = write_trajectory(&path, &labels[..1], &[], &[0.0, 1.0], &states).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        fs::remove_file(&path).ok();
    }
}
