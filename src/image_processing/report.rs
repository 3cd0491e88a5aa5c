/// Region report for the `--report` flag
///
/// Prints one table row per cropped face with the detector box, the final
/// region and the file it was written to.
use prettytable::{format, Cell, Row, Table};

use super::{FaceCrop, ProcessingResult};

#[derive(Debug, Clone)]
pub struct RegionEntry {
    pub input_filename: String,
    pub face_index: usize,
    pub confidence: f32,
    pub raw_box: String,
    pub region: String,
    pub side: u32,
    pub output_filename: String,
}

#[derive(Debug, Default)]
pub struct RegionReport {
    pub entries: Vec<RegionEntry>,
    pub images_without_faces: Vec<String>,
}

impl RegionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_result(&mut self, result: &ProcessingResult) {
        let input_filename = file_name(&result.input_path);

        if result.faces.is_empty() {
            self.images_without_faces.push(input_filename);
            return;
        }

        for face in &result.faces {
            self.entries.push(entry_for(&input_filename, face));
        }
    }

    pub fn build_table(&self) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_BOX_CHARS);

        table.add_row(Row::new(vec![
            Cell::new("Input"),
            Cell::new("Face"),
            Cell::new("Conf."),
            Cell::new("Detector box"),
            Cell::new("Region"),
            Cell::new("Side"),
            Cell::new("Output"),
        ]));

        for entry in &self.entries {
            table.add_row(Row::new(vec![
                Cell::new(&truncate(&entry.input_filename, 28)),
                Cell::new(&format!("#{:02}", entry.face_index)),
                Cell::new(&format!("{:.0}%", entry.confidence * 100.0)),
                Cell::new(&entry.raw_box),
                Cell::new(&entry.region),
                Cell::new(&entry.side.to_string()),
                Cell::new(&truncate(&entry.output_filename, 32)),
            ]));
        }

        table
    }

    pub fn print(&self) {
        println!();
        println!("FACE REGIONS ({} faces)\n", self.entries.len());

        if !self.entries.is_empty() {
            self.build_table().printstd();
        }

        if !self.images_without_faces.is_empty() {
            println!();
            println!("No faces selected in {} image(s):", self.images_without_faces.len());
            for name in &self.images_without_faces {
                println!("  {}", name);
            }
        }
        println!();
    }
}

fn entry_for(input_filename: &str, face: &FaceCrop) -> RegionEntry {
    let raw = &face.raw_box;
    let region = &face.region;

    RegionEntry {
        input_filename: input_filename.to_string(),
        face_index: face.index,
        confidence: face.confidence,
        raw_box: format!(
            "{:.0},{:.0} {:.0}x{:.0}",
            raw.left,
            raw.top,
            raw.right - raw.left,
            raw.bottom - raw.top
        ),
        region: format!(
            "{},{} {}x{}",
            region.left,
            region.top,
            region.width(),
            region.height()
        ),
        side: region.width().max(region.height()) as u32,
        output_filename: face
            .output_path
            .as_deref()
            .map(file_name)
            .unwrap_or_else(|| "-".to_string()),
    }
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}

/// Truncate to `max_len` characters, keeping the tail (file extensions)
fn truncate(s: &str, max_len: usize) -> String {
    let count = s.chars().count();
    if count <= max_len {
        s.to_string()
    } else {
        let tail: String = s.chars().skip(count - (max_len - 3)).collect();
        format!("...{}", tail)
    }
}
