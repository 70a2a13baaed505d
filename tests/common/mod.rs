//! Reads back the first worksheet of an xlsx workbook

use std::io::{Cursor, Read};

use zip::ZipArchive;

/// One stored cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn text(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

/// Worksheet grid, row-major; blank cells are `None`
pub type Sheet = Vec<Vec<Option<Cell>>>;

pub fn read_sheet(workbook: &[u8]) -> Sheet {
    let mut archive = ZipArchive::new(Cursor::new(workbook)).expect("workbook is a zip archive");
    let shared = read_entry(&mut archive, "xl/sharedStrings.xml")
        .map(|xml| shared_strings(&xml))
        .unwrap_or_default();
    let sheet = read_entry(&mut archive, "xl/worksheets/sheet1.xml").expect("sheet1 present");

    let mut rows: Sheet = Vec::new();
    for chunk in sheet.split("<c ").skip(1) {
        let (attrs, rest) = chunk.split_once('>').expect("cell tag closes");
        if attrs.ends_with('/') {
            continue;
        }
        let attrs = format!(" {attrs}");
        let reference = attr(&attrs, "r").expect("cell reference");
        let (row, col) = position(&reference);
        let raw = rest
            .split_once("<v>")
            .and_then(|(_, v)| v.split_once("</v>"))
            .map(|(v, _)| v)
            .expect("cell value");

        let cell = match attr(&attrs, "t").as_deref() {
            Some("s") => Cell::Text(shared[raw.parse::<usize>().expect("string index")].clone()),
            Some(other) => panic!("unexpected cell type {other}"),
            None => Cell::Number(raw.parse().expect("numeric cell")),
        };

        if rows.len() <= row {
            rows.resize(row + 1, Vec::new());
        }
        if rows[row].len() <= col {
            rows[row].resize(col + 1, None);
        }
        rows[row][col] = Some(cell);
    }
    rows
}

/// Header row as plain strings
pub fn header(sheet: &Sheet) -> Vec<String> {
    sheet[0]
        .iter()
        .map(|cell| match cell {
            Some(Cell::Text(s)) => s.clone(),
            other => panic!("header cell is not text: {other:?}"),
        })
        .collect()
}

fn read_entry(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Option<String> {
    let mut file = archive.by_name(name).ok()?;
    let mut content = String::new();
    file.read_to_string(&mut content).ok()?;
    Some(content)
}

fn shared_strings(xml: &str) -> Vec<String> {
    xml.split("<si>")
        .skip(1)
        .map(|item| {
            let text = item
                .split_once("<t")
                .and_then(|(_, t)| t.split_once('>'))
                .and_then(|(_, t)| t.split_once("</t>"))
                .map(|(t, _)| t)
                .unwrap_or_default();
            unescape(text)
        })
        .collect()
}

fn attr(attrs: &str, name: &str) -> Option<String> {
    let start = attrs.find(&format!(" {name}=\""))? + name.len() + 3;
    let len = attrs[start..].find('"')?;
    Some(attrs[start..start + len].to_string())
}

/// `"B12"` to zero-based `(row, col)`
fn position(reference: &str) -> (usize, usize) {
    let split = reference
        .find(|c: char| c.is_ascii_digit())
        .expect("row number");
    let (letters, digits) = reference.split_at(split);
    let col = letters
        .bytes()
        .fold(0usize, |acc, b| acc * 26 + usize::from(b - b'A' + 1));
    let row: usize = digits.parse().expect("row number");
    (row - 1, col - 1)
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
