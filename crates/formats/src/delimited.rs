//! CSV / TSV rows as JSON objects keyed by header, all values as text.

use csv::ReaderBuilder;
use serde_json::{Map, Value};

use crate::FormatError;

pub fn decode(bytes: &[u8], delimiter: u8) -> Result<Value, FormatError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(bytes);
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = Map::new();
        for (i, header) in headers.iter().enumerate() {
            // Short rows yield empty cells, like a missing column.
            let cell = record.get(i).unwrap_or("");
            row.insert(header.to_string(), Value::String(cell.to_string()));
        }
        rows.push(Value::Object(row));
    }
    Ok(Value::Array(rows))
}

#[cfg(test)]
mod tests {
    use super::decode;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn rows_are_keyed_by_header() {
        let csv = "name,lon,lat\nParis,2.35,48.85\n\"Saint-Denis, FR\",2.36,48.93\n";
        assert_eq!(
            decode(csv.as_bytes(), b',').unwrap(),
            json!([
                {"name": "Paris", "lon": "2.35", "lat": "48.85"},
                {"name": "Saint-Denis, FR", "lon": "2.36", "lat": "48.93"}
            ])
        );
    }

    #[test]
    fn short_rows_fill_with_empty_text() {
        let tsv = "id\tvalue\nFRA\n";
        assert_eq!(
            decode(tsv.as_bytes(), b'\t').unwrap(),
            json!([{"id": "FRA", "value": ""}])
        );
    }

    #[test]
    fn header_only_is_empty() {
        assert_eq!(decode(b"a,b\n", b',').unwrap(), json!([]));
    }
}
