use {
    anyhow::{Context as _, Result},
    prettytable::{Table, format::FormatBuilder, row},
    std::fmt::Write as _,
    tdstore_protocol::{DataReader, DownloadLocation, ImageLocation},
};

const PREVIEW_LEN: usize = 24;

/// Lists the remaining byte array fields of `stream`.
///
/// Bytes that do not frame as a field are shown as a single raw row.
pub fn fields_table(mut stream: DataReader<'_>) -> Table {
    let mut table = Table::new();
    table.set_format(FormatBuilder::new().column_separator(' ').build());
    table.set_titles(row!["#", "Size", "Bytes"]);
    for index in 0_usize.. {
        if stream.at_end() {
            break;
        }
        let rest = stream.rest();
        match stream.read_byte_array() {
            Ok(Some(bytes)) => {
                table.add_row(row![index, bytes.len(), preview(&bytes)]);
            }
            Ok(None) => {
                table.add_row(row![index, "null", ""]);
            }
            Err(_) => {
                table.add_row(row![index, format!("{} raw", rest.len()), preview(rest)]);
                break;
            }
        }
    }
    table
}

fn preview(bytes: &[u8]) -> String {
    let mut text = hex::encode(bytes.get(..PREVIEW_LEN).unwrap_or(bytes));
    if bytes.len() > PREVIEW_LEN {
        text.push_str("...");
    }
    text
}

/// Decodes a serialized location and its cache keys.
pub fn describe_location(bytes: &[u8], image: bool) -> Result<String> {
    let (location, mut text) = if image {
        let image = ImageLocation::from_serialized(bytes)
            .context("input is not a serialized image location")?;
        let text = format!("size: {}x{}\n", image.width(), image.height());
        (image.file().clone(), text)
    } else {
        let location = DownloadLocation::from_serialized(bytes)
            .context("input is not a serialized location")?;
        (location, String::new())
    };
    writeln!(text, "{location:#?}")?;
    writeln!(text, "valid: {}", location.valid())?;
    writeln!(text, "cache key: {}", location.cache_key())?;
    if let Some(key) = location.big_file_base_cache_key() {
        writeln!(text, "big file base key: {key}")?;
    }
    let memory_key = location.in_memory_key();
    write!(
        text,
        "in-memory key: {:016X}:{:016X}",
        memory_key.high, memory_key.low
    )?;
    Ok(text)
}
