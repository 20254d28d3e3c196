//! Workbook writer – turns a finished [`Sheet`] into `.xlsx` bytes using
//! `rust_xlsxwriter`.

use std::path::Path;

use rust_xlsxwriter::{ColNum, Format, FormatAlign, Image, RowNum, Workbook};

use crate::error::ReportError;
use crate::sheet::Sheet;

/// Render a sheet into workbook bytes. Nothing touches the filesystem.
pub fn render_workbook(sheet: &Sheet) -> Result<Vec<u8>, ReportError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    if !sheet.title.is_empty() {
        worksheet.set_name(&sheet.title)?;
    }

    let wrap = Format::new()
        .set_text_wrap()
        .set_align(FormatAlign::VerticalCenter);

    for (r, cells) in sheet.rows().iter().enumerate() {
        let row = row_num(r)?;
        for (c, cell) in cells.iter().enumerate() {
            let col = col_num(c)?;
            match (cell.text.is_empty(), cell.wrap) {
                (true, false) => {}
                (true, true) => {
                    worksheet.write_blank(row, col, &wrap)?;
                }
                (false, true) => {
                    worksheet.write_string_with_format(row, col, &cell.text, &wrap)?;
                }
                (false, false) => {
                    worksheet.write_string(row, col, &cell.text)?;
                }
            }
        }
    }

    for (r, height) in sheet.row_heights() {
        worksheet.set_row_height(row_num(r)?, height)?;
    }
    for (c, width) in sheet.column_widths() {
        worksheet.set_column_width(col_num(c)?, width)?;
    }

    for embedded in sheet.images() {
        if embedded.png.is_empty() {
            continue;
        }
        let image = Image::new_from_buffer(&embedded.png)?;
        worksheet.insert_image(row_num(embedded.row)?, col_num(embedded.column)?, &image)?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// Render and write the workbook. The file is only created once the whole
/// workbook has been rendered successfully.
pub fn write_workbook(sheet: &Sheet, path: &Path) -> Result<usize, ReportError> {
    let bytes = render_workbook(sheet)?;
    write_atomic(path, &bytes)?;
    Ok(bytes.len())
}

/// Write `bytes` next to `path` under a `.tmp` name, then rename into place.
/// A failed write leaves neither the target nor the temporary file behind.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ReportError> {
    let Some(name) = path.file_name() else {
        return Err(ReportError::Config(format!(
            "output path '{}' has no file name",
            path.display()
        )));
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut tmp_name = name.to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let written = std::fs::write(&tmp_path, bytes).and_then(|()| std::fs::rename(&tmp_path, path));
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

fn row_num(row: usize) -> Result<RowNum, ReportError> {
    RowNum::try_from(row).map_err(|_| ReportError::Layout(format!("row {row} is out of range")))
}

fn col_num(column: usize) -> Result<ColNum, ReportError> {
    ColNum::try_from(column)
        .map_err(|_| ReportError::Layout(format!("column {column} is out of range")))
}
