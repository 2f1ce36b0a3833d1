/// Column number (1-based) to its A1 letters: 1 -> `A`, 24 -> `X`, 27 -> `AA`.
pub fn column_letter(column: u32) -> String {
    let mut n = column;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Worksheet titles are always quoted so that names with spaces or punctuation address correctly.
pub fn quote_sheet_name(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// Range covering `width` cells of a single row, starting at column A.
pub fn row_range(title: &str, row: u32, width: u32) -> String {
    format!(
        "{}!A{row}:{}{row}",
        quote_sheet_name(title),
        column_letter(width.max(1))
    )
}

pub(crate) fn column_range(title: &str, column: u32) -> String {
    let letter = column_letter(column);
    format!("{}!{letter}:{letter}", quote_sheet_name(title))
}
