//! Vertex group (`.vg`) segmented point set format.
//!
//! A `.vg` file is a whitespace separated sequence of keyed blocks:
//!
//! ```text
//! num_points: N
//! x y z              (N lines)
//! num_colors: C      (0 or N)
//! r g b              (C lines)
//! num_normals: M     (0 or N)
//! nx ny nz           (M lines)
//! num_groups: G
//! group_type: 0                 \
//! num_group_parameters: 4       |
//! group_parameters: a b c d     |
//! group_label: name             |  G times
//! group_color: r g b            |
//! group_num_point: K            |
//! i0 i1 ... iK-1                |
//! num_children: 0               /
//! ```
//!
//! Groups are numbered in file order; the stored plane parameters are not
//! used since planes are re-fitted from the member points. Child groups are
//! parsed and skipped.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;
use std::str::FromStr;

use recon_hypothesis::fit_plane;
use recon_types::{Point, Point3, PointSet, Vector3};
use tracing::{debug, info, warn};

use crate::error::{IoError, IoResult};

/// Load a segmented point set from a `.vg` file.
///
/// # Errors
///
/// Returns [`IoError::FileNotFound`] or [`IoError::Io`] if the file cannot be
/// read and [`IoError::Parse`] if its content is malformed.
///
/// # Example
///
/// ```no_run
/// use recon_io::load_vg;
///
/// let points = load_vg("building.vg").unwrap();
/// println!("{} points in {} groups", points.len(), points.groups().len());
/// ```
pub fn load_vg<P: AsRef<Path>>(path: P) -> IoResult<PointSet> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| IoError::open(path, e))?;
    let points = read_vg(BufReader::new(file))?;
    info!(
        path = %path.display(),
        points = points.len(),
        groups = points.groups().len(),
        "Loaded vertex groups"
    );
    Ok(points)
}

/// Read a segmented point set in `.vg` format.
///
/// # Errors
///
/// Returns [`IoError::Parse`] for malformed content and [`IoError::Io`] for
/// read failures.
///
/// # Example
///
/// ```
/// use recon_io::read_vg;
///
/// let text = "num_points: 3\n0 0 0\n1 0 0\n0 1 0\n\
///             num_colors: 0\nnum_normals: 0\nnum_groups: 1\n\
///             group_type: 0\nnum_group_parameters: 4\ngroup_parameters: 0 0 1 0\n\
///             group_label: floor\ngroup_color: 0.5 0.5 0.5\n\
///             group_num_point: 3\n0 1 2\nnum_children: 0\n";
/// let points = read_vg(text.as_bytes()).unwrap();
/// assert_eq!(points.len(), 3);
/// assert_eq!(points.groups()[0].indices, vec![0, 1, 2]);
/// ```
pub fn read_vg<R: BufRead>(reader: R) -> IoResult<PointSet> {
    let mut tokens = Tokens::new(reader);

    let n = tokens.keyed::<usize>("num_points")?;
    let mut positions = Vec::with_capacity(n);
    for _ in 0..n {
        positions.push(tokens.point()?);
    }

    let colors = tokens.keyed::<usize>("num_colors")?;
    check_count(&tokens, "colors", colors, n)?;
    for _ in 0..colors {
        tokens.point()?;
    }

    let normal_count = tokens.keyed::<usize>("num_normals")?;
    check_count(&tokens, "normals", normal_count, n)?;
    let mut normals = vec![Vector3::zeros(); n];
    for normal in normals.iter_mut().take(normal_count) {
        *normal = tokens.point()?.coords;
    }

    let mut labels: Vec<Option<u32>> = vec![None; n];
    let group_count = tokens.keyed::<usize>("num_groups")?;
    for g in 0..group_count {
        let label = u32::try_from(g)
            .map_err(|_| IoError::parse(tokens.line, "too many groups"))?;
        let members = read_group(&mut tokens, n)?;
        for index in members {
            if let Some(previous) = labels[index].replace(label) {
                warn!(point = index, previous, label, "Point listed in several groups, keeping the last");
            }
        }
    }

    let points = positions
        .into_iter()
        .zip(normals)
        .zip(labels)
        .map(|((position, normal), group)| Point {
            position,
            normal,
            group,
        })
        .collect();
    Ok(PointSet::new(points))
}

fn check_count<R: BufRead>(tokens: &Tokens<R>, what: &str, count: usize, n: usize) -> IoResult<()> {
    if count == 0 || count == n {
        Ok(())
    } else {
        Err(IoError::parse(
            tokens.line,
            format!("expected 0 or {n} {what}, found {count}"),
        ))
    }
}

/// Read one group block (and skip its children); returns member indices.
fn read_group<R: BufRead>(tokens: &mut Tokens<R>, n: usize) -> IoResult<Vec<usize>> {
    tokens.keyed::<i64>("group_type")?;
    let parameters = tokens.keyed::<usize>("num_group_parameters")?;
    tokens.key("group_parameters")?;
    for _ in 0..parameters {
        tokens.value::<f64>()?;
    }
    tokens.key("group_label")?;
    let name = tokens.word()?;
    tokens.key("group_color")?;
    tokens.point()?;

    let count = tokens.keyed::<usize>("group_num_point")?;
    let mut members = Vec::with_capacity(count);
    for _ in 0..count {
        let index = tokens.value::<usize>()?;
        if index >= n {
            return Err(IoError::parse(
                tokens.line,
                format!("group '{name}' references point {index} of {n}"),
            ));
        }
        members.push(index);
    }
    debug!(group = %name, points = count, "Read vertex group");

    let children = tokens.keyed::<usize>("num_children")?;
    for _ in 0..children {
        read_group(tokens, n)?;
    }
    if children > 0 {
        debug!(group = %name, children, "Skipped child groups");
    }
    Ok(members)
}

/// Whitespace tokenizer that tracks line numbers.
struct Tokens<R> {
    lines: Lines<R>,
    line: usize,
    pending: std::vec::IntoIter<String>,
}

impl<R: BufRead> Tokens<R> {
    fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
            pending: Vec::new().into_iter(),
        }
    }

    fn word(&mut self) -> IoResult<String> {
        loop {
            if let Some(token) = self.pending.next() {
                return Ok(token);
            }
            match self.lines.next() {
                Some(line) => {
                    let line = line?;
                    self.line += 1;
                    let words: Vec<String> = line.split_whitespace().map(str::to_string).collect();
                    self.pending = words.into_iter();
                }
                None => return Err(IoError::parse(0, "unexpected end of file")),
            }
        }
    }

    fn value<T: FromStr>(&mut self) -> IoResult<T> {
        let token = self.word()?;
        token
            .parse()
            .map_err(|_| IoError::parse(self.line, format!("invalid number '{token}'")))
    }

    /// Expect `key:`, also accepting `key` followed by a lone `:`.
    fn key(&mut self, key: &str) -> IoResult<()> {
        let token = self.word()?;
        match token.strip_suffix(':') {
            Some(name) if name == key => Ok(()),
            None if token == key => match self.word()?.as_str() {
                ":" => Ok(()),
                other => Err(IoError::parse(
                    self.line,
                    format!("expected ':' after '{key}', found '{other}'"),
                )),
            },
            _ => Err(IoError::parse(
                self.line,
                format!("expected '{key}:', found '{token}'"),
            )),
        }
    }

    fn keyed<T: FromStr>(&mut self, key: &str) -> IoResult<T> {
        self.key(key)?;
        self.value()
    }

    fn point(&mut self) -> IoResult<Point3<f64>> {
        Ok(Point3::new(self.value()?, self.value()?, self.value()?))
    }
}

/// Save a segmented point set in `.vg` format.
///
/// Each group's plane parameters are fitted from its members; groups too
/// degenerate to fit are written with zero parameters.
///
/// # Errors
///
/// Returns [`IoError::Io`] if the file cannot be written.
pub fn save_vg<P: AsRef<Path>>(points: &PointSet, path: P) -> IoResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_vg(points, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write a segmented point set in `.vg` format.
///
/// # Errors
///
/// Returns [`IoError::Io`] on write failure.
pub fn write_vg<W: Write>(points: &PointSet, writer: &mut W) -> IoResult<()> {
    writeln!(writer, "num_points: {}", points.len())?;
    for p in points.points() {
        writeln!(writer, "{} {} {}", p.position.x, p.position.y, p.position.z)?;
    }
    writeln!(writer, "num_colors: 0")?;
    writeln!(writer, "num_normals: {}", points.len())?;
    for p in points.points() {
        writeln!(writer, "{} {} {}", p.normal.x, p.normal.y, p.normal.z)?;
    }

    writeln!(writer, "num_groups: {}", points.groups().len())?;
    for group in points.groups() {
        let (normal, offset) = fit_plane(points, &group.indices)
            .map_or((Vector3::zeros(), 0.0), |fit| (*fit.plane.normal(), fit.plane.offset()));
        writeln!(writer, "group_type: 0")?;
        writeln!(writer, "num_group_parameters: 4")?;
        writeln!(
            writer,
            "group_parameters: {} {} {} {}",
            normal.x, normal.y, normal.z, offset
        )?;
        writeln!(writer, "group_label: group_{}", group.label)?;
        writeln!(writer, "group_color: 0.5 0.5 0.5")?;
        writeln!(writer, "group_num_point: {}", group.len())?;
        for chunk in group.indices.chunks(16) {
            let line: Vec<String> = chunk.iter().map(ToString::to_string).collect();
            writeln!(writer, "{}", line.join(" "))?;
        }
        writeln!(writer, "num_children: 0")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
num_points: 4
0 0 0
1 0 0
0 1 0
0 0 1
num_colors: 4
1 0 0
1 0 0
1 0 0
1 0 0
num_normals: 4
0 0 1
0 0 1
0 0 1
1 0 0
num_groups: 2
group_type: 0
num_group_parameters: 4
group_parameters: 0 0 1 0
group_label: floor
group_color: 0.1 0.2 0.3
group_num_point: 3
0 1
2
num_children: 0
group_type: 0
num_group_parameters: 4
group_parameters: 1 0 0 0
group_label: wall
group_color: 0.1 0.2 0.3
group_num_point: 1
3
num_children: 1
group_type: 0
num_group_parameters: 4
group_parameters: 1 0 0 0
group_label: child
group_color: 0 0 0
group_num_point: 1
3
num_children: 0
";

    #[test]
    fn test_read_sample() {
        let points = read_vg(SAMPLE.as_bytes()).unwrap();
        assert_eq!(points.len(), 4);
        assert_eq!(points.groups().len(), 2);
        assert_eq!(points.groups()[0].indices, vec![0, 1, 2]);
        assert_eq!(points.groups()[1].indices, vec![3]);
        assert_eq!(points.points()[3].normal, Vector3::x());
    }

    #[test]
    fn test_missing_normals_are_zero() {
        let text = "num_points: 1\n1 2 3\nnum_colors: 0\nnum_normals: 0\nnum_groups: 0\n";
        let points = read_vg(text.as_bytes()).unwrap();
        assert_eq!(points.points()[0].normal, Vector3::zeros());
        assert_eq!(points.points()[0].group, None);
    }

    #[test]
    fn test_split_key_and_colon() {
        let text = "num_points : 0\nnum_colors: 0\nnum_normals: 0\nnum_groups: 0\n";
        assert!(read_vg(text.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_bad_index_reports_line() {
        let text = SAMPLE.replace("0 1\n2\n", "0 1\n9\n");
        match read_vg(text.as_bytes()) {
            Err(IoError::Parse { line, reason }) => {
                assert_eq!(line, 24);
                assert!(reason.contains("point 9"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_file() {
        let text = "num_points: 2\n0 0 0\n";
        assert!(matches!(
            read_vg(text.as_bytes()),
            Err(IoError::Parse { line: 0, .. })
        ));
    }

    #[test]
    fn test_wrong_key() {
        let text = "num_vertices: 2\n";
        assert!(matches!(
            read_vg(text.as_bytes()),
            Err(IoError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_write_then_read() {
        let original = read_vg(SAMPLE.as_bytes()).unwrap();
        let mut buffer = Vec::new();
        write_vg(&original, &mut buffer).unwrap();
        let reread = read_vg(buffer.as_slice()).unwrap();

        assert_eq!(reread.len(), original.len());
        assert_eq!(reread.groups(), original.groups());
        for (a, b) in reread.points().iter().zip(original.points()) {
            assert_eq!(a.position, b.position);
            assert_eq!(a.normal, b.normal);
        }
    }
}
