use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::XmlError;

/// Load the XML bytes out of `path`: a ZIP containing exactly one `.xml`
/// member, or a bare `.xml` file.
///
/// Grounded on `scielo_core/basic/xml_sps_zip_file.py::get_xml_content`:
/// attempt to open as ZIP first, fall back to reading the path directly on
/// `BadZipFile`.
pub fn load(path: &Path) -> Result<Vec<u8>, XmlError> {
    let path_str = path.display().to_string();
    let file = File::open(path).map_err(|source| XmlError::Io { path: path_str.clone(), source })?;

    match zip::ZipArchive::new(file) {
        Ok(mut archive) => load_from_zip(&mut archive, &path_str),
        Err(_) => load_raw(path, &path_str),
    }
}

fn load_from_zip<R: Read + std::io::Seek>(archive: &mut zip::ZipArchive<R>, path_str: &str) -> Result<Vec<u8>, XmlError> {
    let xml_names: Vec<String> = archive
        .file_names()
        .filter(|name| name.to_lowercase().ends_with(".xml"))
        .map(|name| name.to_string())
        .collect();

    let name = match xml_names.as_slice() {
        [single] => single.clone(),
        _ => return Err(XmlError::BadPackage(path_str.to_string())),
    };

    let mut entry = archive.by_name(&name).map_err(|_| XmlError::BadPackage(path_str.to_string()))?;
    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry
        .read_to_end(&mut bytes)
        .map_err(|source| XmlError::Io { path: path_str.to_string(), source })?;
    Ok(bytes)
}

fn load_raw(path: &Path, path_str: &str) -> Result<Vec<u8>, XmlError> {
    let mut bytes = Vec::new();
    File::open(path)
        .and_then(|mut f| f.read_to_end(&mut bytes))
        .map_err(|source| XmlError::Io { path: path_str.to_string(), source })?;

    if bytes.is_empty() {
        return Err(XmlError::InvalidXml(path_str.to_string()));
    }
    Ok(bytes)
}
